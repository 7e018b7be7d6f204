//! Flag registry
//!
//! Canonical map of registered flags. Entries are `Arc<FeatureFlag>`
//! snapshots: a published flag is never mutated in place, every update
//! builds a new value and swaps the slot, so concurrent readers either
//! see the old flag or the new one, never a torn one.

use crate::flag::FeatureFlag;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct FlagRegistry {
    flags: Arc<DashMap<String, Arc<FeatureFlag>>>,
}

impl FlagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the flag under its key.
    ///
    /// Callers validate before inserting; the registry itself admits
    /// anything.
    pub fn insert(&self, flag: FeatureFlag) {
        self.flags.insert(flag.key.clone(), Arc::new(flag));
    }

    pub fn get(&self, key: &str) -> Option<Arc<FeatureFlag>> {
        self.flags.get(key).map(|entry| entry.value().clone())
    }

    /// Remove a flag. Returns the removed snapshot, `None` when absent.
    pub fn remove(&self, key: &str) -> Option<Arc<FeatureFlag>> {
        self.flags.remove(key).map(|(_, flag)| flag)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.flags.contains_key(key)
    }

    /// Snapshot of all registered flags.
    pub fn all(&self) -> Vec<Arc<FeatureFlag>> {
        self.flags.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn keys(&self) -> Vec<String> {
        self.flags.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn clear(&self) {
        self.flags.clear();
    }
}
