//! Evaluation context
//!
//! The ambient facts one evaluation is performed against, plus the
//! provider seam that supplies a default context when a caller passes
//! none.

use crate::flag::FlagValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

/// Context for a single flag evaluation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationContext {
    /// Requester identity, when known
    #[serde(default)]
    pub user_id: Option<String>,

    /// Environment the evaluation runs in
    #[serde(default)]
    pub environment: String,

    /// Plugin identity, when the caller is a plugin
    #[serde(default)]
    pub plugin_id: Option<String>,

    /// Plugin category, when the caller is a plugin
    #[serde(default)]
    pub plugin_category: Option<String>,

    /// Version of the host system
    #[serde(default)]
    pub system_version: String,

    /// Free-form custom attributes, read only by conditions
    #[serde(default)]
    pub custom: HashMap<String, FlagValue>,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_plugin(mut self, plugin_id: impl Into<String>) -> Self {
        self.plugin_id = Some(plugin_id.into());
        self
    }

    pub fn with_plugin_category(mut self, category: impl Into<String>) -> Self {
        self.plugin_category = Some(category.into());
        self
    }

    pub fn with_system_version(mut self, version: impl Into<String>) -> Self {
        self.system_version = version.into();
        self
    }

    /// Add a custom attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<FlagValue>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }
}

/// Supplies the context used when a caller evaluates without one
pub trait ContextProvider: Send + Sync {
    fn default_context(&self) -> EvaluationContext;
}

/// Context provider backed by `PENNANT_`-prefixed environment variables
///
/// `PENNANT_ENVIRONMENT` and `PENNANT_SYSTEM_VERSION` take precedence;
/// the configured defaults fill the gaps.
pub struct EnvContextProvider {
    default_environment: String,
    default_system_version: String,
}

impl EnvContextProvider {
    pub fn new(
        default_environment: impl Into<String>,
        default_system_version: impl Into<String>,
    ) -> Self {
        Self {
            default_environment: default_environment.into(),
            default_system_version: default_system_version.into(),
        }
    }
}

impl ContextProvider for EnvContextProvider {
    fn default_context(&self) -> EvaluationContext {
        let environment = env::var("PENNANT_ENVIRONMENT")
            .unwrap_or_else(|_| self.default_environment.clone());
        let system_version = env::var("PENNANT_SYSTEM_VERSION")
            .unwrap_or_else(|_| self.default_system_version.clone());

        EvaluationContext::new()
            .with_environment(environment)
            .with_system_version(system_version)
    }
}

/// Context provider that always returns a fixed context
pub struct StaticContextProvider {
    context: EvaluationContext,
}

impl StaticContextProvider {
    pub fn new(context: EvaluationContext) -> Self {
        Self { context }
    }
}

impl ContextProvider for StaticContextProvider {
    fn default_context(&self) -> EvaluationContext {
        self.context.clone()
    }
}
