//! Feature flag model
//!
//! Defines the flag value variants, flag kinds, the flag itself, and the
//! partial-update type used by `FlagEngine::update_flag`.

use crate::condition::Condition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A flag value
///
/// One variant per flag kind. `#[serde(untagged)]` keeps the wire form a
/// plain JSON scalar or tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Num(f64),
    Str(String),
    Json(serde_json::Value),
}

impl FlagValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether this value counts as "on" for `is_enabled` purposes.
    ///
    /// `Bool(true)`, non-empty strings, non-zero numbers, and non-null
    /// JSON trees are truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Str(s) => !s.is_empty(),
            Self::Num(n) => *n != 0.0,
            Self::Json(v) => !v.is_null(),
        }
    }
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for FlagValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<f64> for FlagValue {
    fn from(value: f64) -> Self {
        Self::Num(value)
    }
}

impl From<i64> for FlagValue {
    fn from(value: i64) -> Self {
        Self::Num(value as f64)
    }
}

impl From<serde_json::Value> for FlagValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// Declared kind of a flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagKind {
    Boolean,
    String,
    Number,
    Json,
}

impl FlagKind {
    /// The "off" value a disabled or unknown flag of this kind resolves to.
    pub fn off_value(&self) -> FlagValue {
        match self {
            Self::Boolean => FlagValue::Bool(false),
            Self::String => FlagValue::Str(String::new()),
            Self::Number => FlagValue::Num(0.0),
            Self::Json => FlagValue::Json(serde_json::Value::Null),
        }
    }
}

/// Informational flag metadata
///
/// Never consulted during evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagMetadata {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub version: String,
}

impl Default for FlagMetadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            category: None,
            tags: Vec::new(),
            owner: None,
            created_at: now,
            modified_at: now,
            version: "1.0.0".to_string(),
        }
    }
}

/// Feature flag
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlag {
    /// Unique flag key. Immutable once registered.
    pub key: String,

    /// Human-readable name
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Declared value kind
    pub kind: FlagKind,

    /// Fallback value when no other source applies
    pub default_value: FlagValue,

    /// Master kill switch. When false, evaluation always yields the
    /// kind's off value, overrides included.
    pub enabled: bool,

    /// Environment name -> value
    #[serde(default)]
    pub environments: HashMap<String, FlagValue>,

    /// Per-user override mirror. The engine's override store is the
    /// write path of record; this copy exists for introspection/export.
    #[serde(default)]
    pub user_overrides: HashMap<String, FlagValue>,

    /// Per-plugin override mirror
    #[serde(default)]
    pub plugin_overrides: HashMap<String, FlagValue>,

    /// Gradual rollout share, 0-100. Only meaningful for boolean flags
    /// that resolve to true.
    #[serde(default = "default_rollout")]
    pub rollout_percentage: u8,

    /// Conditions gating the flag, evaluated in order
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default)]
    pub metadata: FlagMetadata,
}

fn default_rollout() -> u8 {
    100
}

impl FeatureFlag {
    fn new(key: impl Into<String>, kind: FlagKind, default_value: FlagValue) -> Self {
        let key = key.into();
        Self {
            name: key.clone(),
            key,
            description: None,
            kind,
            default_value,
            enabled: true,
            environments: HashMap::new(),
            user_overrides: HashMap::new(),
            plugin_overrides: HashMap::new(),
            rollout_percentage: 100,
            conditions: Vec::new(),
            metadata: FlagMetadata::default(),
        }
    }

    /// Create a boolean flag
    ///
    /// # Examples
    ///
    /// ```
    /// use pennant::FeatureFlag;
    ///
    /// let flag = FeatureFlag::boolean("new-ui", true);
    /// assert!(flag.enabled);
    /// ```
    pub fn boolean(key: impl Into<String>, default_value: bool) -> Self {
        Self::new(key, FlagKind::Boolean, FlagValue::Bool(default_value))
    }

    /// Create a string flag
    pub fn string(key: impl Into<String>, default_value: impl Into<String>) -> Self {
        Self::new(key, FlagKind::String, FlagValue::Str(default_value.into()))
    }

    /// Create a number flag
    pub fn number(key: impl Into<String>, default_value: f64) -> Self {
        Self::new(key, FlagKind::Number, FlagValue::Num(default_value))
    }

    /// Create a structured JSON flag
    pub fn json(key: impl Into<String>, default_value: serde_json::Value) -> Self {
        Self::new(key, FlagKind::Json, FlagValue::Json(default_value))
    }

    /// Set display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set an environment-specific value
    pub fn with_environment(
        mut self,
        environment: impl Into<String>,
        value: impl Into<FlagValue>,
    ) -> Self {
        self.environments.insert(environment.into(), value.into());
        self
    }

    /// Append a condition
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Set the rollout percentage
    pub fn with_rollout(mut self, percentage: u8) -> Self {
        self.rollout_percentage = percentage;
        self
    }

    /// Toggle the master switch
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Append a metadata tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.metadata.tags.push(tag.into());
        self
    }

    /// Set the owning team or person
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.metadata.owner = Some(owner.into());
        self
    }

    /// Set the metadata category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.metadata.category = Some(category.into());
        self
    }

    /// Build the flag that results from applying a partial update.
    ///
    /// The key is never replaced. Stamps a fresh `modified_at`.
    pub fn with_update(&self, update: FlagUpdate) -> Self {
        let mut next = self.clone();
        if let Some(name) = update.name {
            next.name = name;
        }
        if let Some(description) = update.description {
            next.description = Some(description);
        }
        if let Some(kind) = update.kind {
            next.kind = kind;
        }
        if let Some(default_value) = update.default_value {
            next.default_value = default_value;
        }
        if let Some(enabled) = update.enabled {
            next.enabled = enabled;
        }
        if let Some(environments) = update.environments {
            next.environments = environments;
        }
        if let Some(rollout_percentage) = update.rollout_percentage {
            next.rollout_percentage = rollout_percentage;
        }
        if let Some(conditions) = update.conditions {
            next.conditions = conditions;
        }
        if let Some(category) = update.category {
            next.metadata.category = Some(category);
        }
        if let Some(tags) = update.tags {
            next.metadata.tags = tags;
        }
        if let Some(owner) = update.owner {
            next.metadata.owner = Some(owner);
        }
        next.metadata.modified_at = Utc::now();
        next
    }
}

/// Partial flag update
///
/// `None` fields leave the existing value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub kind: Option<FlagKind>,
    #[serde(default)]
    pub default_value: Option<FlagValue>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub environments: Option<HashMap<String, FlagValue>>,
    #[serde(default)]
    pub rollout_percentage: Option<u8>,
    #[serde(default)]
    pub conditions: Option<Vec<Condition>>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub owner: Option<String>,
}
