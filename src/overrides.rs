//! Override store
//!
//! Two independent identity-keyed stores: per-user and per-plugin forced
//! values. Consulted by the engine before environment and condition
//! logic; the mirrors carried on each flag are refreshed from here.

use crate::flag::FlagValue;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct OverrideStore {
    users: Arc<DashMap<String, HashMap<String, FlagValue>>>,
    plugins: Arc<DashMap<String, HashMap<String, FlagValue>>>,
}

impl OverrideStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_user(&self, user_id: impl Into<String>, flag_key: impl Into<String>, value: FlagValue) {
        self.users
            .entry(user_id.into())
            .or_default()
            .insert(flag_key.into(), value);
    }

    pub fn set_plugin(
        &self,
        plugin_id: impl Into<String>,
        flag_key: impl Into<String>,
        value: FlagValue,
    ) {
        self.plugins
            .entry(plugin_id.into())
            .or_default()
            .insert(flag_key.into(), value);
    }

    /// Remove a user override. No-op (returns false) when absent.
    pub fn remove_user(&self, user_id: &str, flag_key: &str) -> bool {
        let removed = self
            .users
            .get_mut(user_id)
            .map(|mut entry| entry.remove(flag_key).is_some())
            .unwrap_or(false);
        self.users.remove_if(user_id, |_, flags| flags.is_empty());
        removed
    }

    /// Remove a plugin override. No-op (returns false) when absent.
    pub fn remove_plugin(&self, plugin_id: &str, flag_key: &str) -> bool {
        let removed = self
            .plugins
            .get_mut(plugin_id)
            .map(|mut entry| entry.remove(flag_key).is_some())
            .unwrap_or(false);
        self.plugins.remove_if(plugin_id, |_, flags| flags.is_empty());
        removed
    }

    pub fn user_value(&self, user_id: &str, flag_key: &str) -> Option<FlagValue> {
        self.users
            .get(user_id)
            .and_then(|entry| entry.get(flag_key).cloned())
    }

    pub fn plugin_value(&self, plugin_id: &str, flag_key: &str) -> Option<FlagValue> {
        self.plugins
            .get(plugin_id)
            .and_then(|entry| entry.get(flag_key).cloned())
    }

    /// Identity -> value map for one flag, used to refresh flag mirrors.
    pub fn user_values_for_flag(&self, flag_key: &str) -> HashMap<String, FlagValue> {
        collect_for_flag(&self.users, flag_key)
    }

    pub fn plugin_values_for_flag(&self, flag_key: &str) -> HashMap<String, FlagValue> {
        collect_for_flag(&self.plugins, flag_key)
    }

    /// Full copy of the user override mapping, for export.
    pub fn snapshot_users(&self) -> HashMap<String, HashMap<String, FlagValue>> {
        self.users
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn snapshot_plugins(&self) -> HashMap<String, HashMap<String, FlagValue>> {
        self.plugins
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Clear both stores and repopulate them wholesale (import path).
    pub fn replace_all(
        &self,
        users: HashMap<String, HashMap<String, FlagValue>>,
        plugins: HashMap<String, HashMap<String, FlagValue>>,
    ) {
        self.users.clear();
        for (id, flags) in users {
            self.users.insert(id, flags);
        }
        self.plugins.clear();
        for (id, flags) in plugins {
            self.plugins.insert(id, flags);
        }
    }

    pub fn clear(&self) {
        self.users.clear();
        self.plugins.clear();
    }
}

fn collect_for_flag(
    store: &DashMap<String, HashMap<String, FlagValue>>,
    flag_key: &str,
) -> HashMap<String, FlagValue> {
    store
        .iter()
        .filter_map(|entry| {
            entry
                .value()
                .get(flag_key)
                .map(|value| (entry.key().clone(), value.clone()))
        })
        .collect()
}
