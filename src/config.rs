//! Engine configuration

use serde::{Deserialize, Serialize};

/// Configuration for the flag engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum evaluation results retained per flag (FIFO eviction)
    pub history_capacity: usize,
    /// Maximum distinct requester identities tracked per flag
    pub max_tracked_identities: usize,
    /// Buffer size of the change-notification channel
    pub event_buffer: usize,
    /// Environment used when no explicit context is supplied
    pub default_environment: String,
    /// System version used when no explicit context is supplied
    pub default_system_version: String,
    /// Key substrings that mark a flag as guarding a sensitive capability
    pub risky_key_hints: Vec<String>,
    /// Rollout percentage above which sensitive keys draw a warning
    pub risky_rollout_threshold: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: 1_000,
            max_tracked_identities: 1_000,
            event_buffer: 256,
            default_environment: "development".to_string(),
            default_system_version: "0.0.0".to_string(),
            risky_key_hints: vec![
                "autonomous".to_string(),
                "self_modify".to_string(),
                "auto_apply".to_string(),
                "unattended".to_string(),
            ],
            risky_rollout_threshold: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let config = EngineConfig::default();
        assert_eq!(config.history_capacity, 1_000);
        assert_eq!(config.risky_rollout_threshold, 50);
        assert!(!config.risky_key_hints.is_empty());
    }
}
