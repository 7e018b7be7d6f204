//! Persistence seam
//!
//! The engine itself never touches disk or network; a host that wants
//! durable flags supplies a `FlagStore` and calls the engine's
//! `load_from_store` / `save_to_store` hooks outside the evaluation
//! path.

use crate::error::FlagError;
use crate::portability::ExportedConfiguration;
use async_trait::async_trait;
use parking_lot::RwLock;

/// Storage backend for engine configuration
#[async_trait]
pub trait FlagStore: Send + Sync {
    /// Load a previously saved configuration.
    ///
    /// Returns `Ok(None)` when the backend holds nothing yet.
    async fn load(&self) -> Result<Option<ExportedConfiguration>, FlagError>;

    /// Persist the given configuration snapshot.
    async fn save(&self, configuration: &ExportedConfiguration) -> Result<(), FlagError>;
}

/// In-memory store, mainly useful in tests and embedded setups
#[derive(Default)]
pub struct MemoryStore {
    snapshot: RwLock<Option<ExportedConfiguration>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FlagStore for MemoryStore {
    async fn load(&self) -> Result<Option<ExportedConfiguration>, FlagError> {
        Ok(self.snapshot.read().clone())
    }

    async fn save(&self, configuration: &ExportedConfiguration) -> Result<(), FlagError> {
        *self.snapshot.write() = Some(configuration.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flag::FeatureFlag;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load().await.unwrap().is_none());

        let doc = ExportedConfiguration::new(
            vec![FeatureFlag::boolean("a", true)],
            HashMap::new(),
            HashMap::new(),
        );
        store.save(&doc).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.flags.len(), 1);
        assert_eq!(loaded.flags[0].key, "a");
    }
}
