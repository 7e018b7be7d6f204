//! Configuration export/import document
//!
//! A transport-neutral snapshot of the full engine state: every flag
//! definition plus both override mappings. The engine re-validates each
//! flag on import.

use crate::error::FlagError;
use crate::flag::{FeatureFlag, FlagValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Exported engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedConfiguration {
    pub flags: Vec<FeatureFlag>,
    pub user_overrides: HashMap<String, HashMap<String, FlagValue>>,
    pub plugin_overrides: HashMap<String, HashMap<String, FlagValue>>,
    pub exported_at: DateTime<Utc>,
}

impl ExportedConfiguration {
    pub fn new(
        flags: Vec<FeatureFlag>,
        user_overrides: HashMap<String, HashMap<String, FlagValue>>,
        plugin_overrides: HashMap<String, HashMap<String, FlagValue>>,
    ) -> Self {
        Self {
            flags,
            user_overrides,
            plugin_overrides,
            exported_at: Utc::now(),
        }
    }

    /// Serialize to a pretty JSON document.
    pub fn to_json(&self) -> Result<String, FlagError> {
        serde_json::to_string_pretty(self).map_err(FlagError::from)
    }

    /// Parse a document. Fails whole, before any engine state is touched.
    pub fn from_json(json: &str) -> Result<Self, FlagError> {
        serde_json::from_str(json).map_err(|e| FlagError::Import(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_round_trip() {
        let flag = FeatureFlag::boolean("dark-mode", true).with_rollout(40);
        let mut user_overrides = HashMap::new();
        user_overrides.insert(
            "u1".to_string(),
            HashMap::from([("dark-mode".to_string(), FlagValue::Bool(false))]),
        );

        let doc = ExportedConfiguration::new(vec![flag], user_overrides, HashMap::new());
        let json = doc.to_json().unwrap();
        assert!(json.contains("\"userOverrides\""));
        assert!(json.contains("\"exportedAt\""));
        assert!(json.contains("\"rolloutPercentage\""));

        let parsed = ExportedConfiguration::from_json(&json).unwrap();
        assert_eq!(parsed.flags.len(), 1);
        assert_eq!(parsed.flags[0].key, "dark-mode");
        assert_eq!(parsed.flags[0].rollout_percentage, 40);
        assert_eq!(
            parsed.user_overrides["u1"]["dark-mode"],
            FlagValue::Bool(false)
        );
    }

    #[test]
    fn test_malformed_document_rejected() {
        let err = ExportedConfiguration::from_json("{\"flags\": 12}").unwrap_err();
        assert!(matches!(err, FlagError::Import(_)));
    }
}
