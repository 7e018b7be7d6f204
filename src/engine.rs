//! Flag engine
//!
//! Orchestrates the registry, override store, condition evaluator,
//! rollout bucketer, metrics collector, and change bus behind a single
//! service object. Mutation calls are strict and fail fast; evaluation
//! calls are total and degrade to the flag's default value instead of
//! surfacing an error.

use crate::config::EngineConfig;
use crate::context::{ContextProvider, EnvContextProvider, EvaluationContext};
use crate::error::FlagError;
use crate::events::{ChangeBus, FlagChangeEvent, FlagChangeKind};
use crate::flag::{FeatureFlag, FlagKind, FlagUpdate, FlagValue};
use crate::metrics::{EvaluationCollector, FlagMetrics};
use crate::overrides::OverrideStore;
use crate::portability::ExportedConfiguration;
use crate::registry::FlagRegistry;
use crate::rollout;
use crate::store::FlagStore;
use crate::validation::{self, ValidationReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Default number of history entries returned by callers that do not
/// pick their own limit.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Which precedence stage produced the final value of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationSource {
    Default,
    Environment,
    UserOverride,
    PluginOverride,
    Condition,
    Rollout,
}

impl EvaluationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Environment => "environment",
            Self::UserOverride => "user_override",
            Self::PluginOverride => "plugin_override",
            Self::Condition => "condition",
            Self::Rollout => "rollout",
        }
    }
}

/// Outcome of a single flag evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub flag_key: String,
    pub value: FlagValue,
    pub reason: String,
    pub source: EvaluationSource,
    pub evaluated_at: DateTime<Utc>,
    /// Context the evaluation ran against
    pub context: EvaluationContext,
    /// How many conditions were evaluated before the value settled
    pub conditions_evaluated: u32,
    /// Rollout bucket, when the rollout stage ran
    pub rollout_bucket: Option<u8>,
}

fn build_result(
    flag_key: &str,
    value: FlagValue,
    source: EvaluationSource,
    reason: String,
    context: &EvaluationContext,
    conditions_evaluated: u32,
    rollout_bucket: Option<u8>,
) -> EvaluationResult {
    EvaluationResult {
        flag_key: flag_key.to_string(),
        value,
        reason,
        source,
        evaluated_at: Utc::now(),
        context: context.clone(),
        conditions_evaluated,
        rollout_bucket,
    }
}

/// Builder for [`FlagEngine`]
pub struct FlagEngineBuilder {
    config: EngineConfig,
    context_provider: Option<Arc<dyn ContextProvider>>,
    store: Option<Arc<dyn FlagStore>>,
}

impl FlagEngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            context_provider: None,
            store: None,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Supply the provider used when callers evaluate without a context.
    pub fn context_provider(mut self, provider: impl ContextProvider + 'static) -> Self {
        self.context_provider = Some(Arc::new(provider));
        self
    }

    /// Attach a persistence adapter for the load/save hooks.
    pub fn store(mut self, store: impl FlagStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    pub fn build(self) -> FlagEngine {
        let context_provider = self.context_provider.unwrap_or_else(|| {
            Arc::new(EnvContextProvider::new(
                self.config.default_environment.clone(),
                self.config.default_system_version.clone(),
            ))
        });

        FlagEngine {
            registry: FlagRegistry::new(),
            overrides: OverrideStore::new(),
            collector: Arc::new(EvaluationCollector::new(
                self.config.history_capacity,
                self.config.max_tracked_identities,
            )),
            bus: ChangeBus::new(self.config.event_buffer),
            context_provider,
            store: self.store,
            config: Arc::new(self.config),
        }
    }
}

impl Default for FlagEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Feature-flag evaluation engine
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct FlagEngine {
    config: Arc<EngineConfig>,
    registry: FlagRegistry,
    overrides: OverrideStore,
    collector: Arc<EvaluationCollector>,
    bus: ChangeBus,
    context_provider: Arc<dyn ContextProvider>,
    store: Option<Arc<dyn FlagStore>>,
}

impl FlagEngine {
    /// Engine with default configuration and collaborators.
    pub fn new() -> Self {
        FlagEngineBuilder::new().build()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        FlagEngineBuilder::new().config(config).build()
    }

    pub fn builder() -> FlagEngineBuilder {
        FlagEngineBuilder::new()
    }

    // ---- mutation surface -------------------------------------------------

    /// Register a new flag.
    ///
    /// Validation errors reject the flag outright; warnings are logged
    /// and registration proceeds. Duplicate keys are rejected, use
    /// [`FlagEngine::update_flag`] to change an existing flag.
    pub fn register_flag(&self, flag: FeatureFlag) -> Result<(), FlagError> {
        let report = validation::validate_flag(&flag, &self.config);
        if !report.is_valid() {
            return Err(FlagError::Validation(report));
        }
        if self.registry.contains(&flag.key) {
            return Err(FlagError::AlreadyRegistered(flag.key));
        }
        self.log_warnings(&flag.key, &report);

        let key = flag.key.clone();
        self.registry.insert(self.with_mirrors(flag));
        info!(flag = %key, "flag registered");
        self.bus.publish(FlagChangeKind::Registered, &key);
        Ok(())
    }

    /// Merge a partial update into an existing flag.
    ///
    /// The merged result is revalidated before it is committed; on
    /// failure the prior flag stays in place untouched.
    pub fn update_flag(&self, key: &str, update: FlagUpdate) -> Result<(), FlagError> {
        let Some(current) = self.registry.get(key) else {
            return Err(FlagError::NotFound(key.to_string()));
        };

        let merged = current.with_update(update);
        let report = validation::validate_flag(&merged, &self.config);
        if !report.is_valid() {
            return Err(FlagError::Validation(report));
        }
        self.log_warnings(key, &report);

        self.registry.insert(merged);
        info!(flag = key, "flag updated");
        self.bus.publish(FlagChangeKind::Updated, key);
        Ok(())
    }

    /// Remove a flag together with its metrics and history.
    ///
    /// A no-op when the key is absent.
    pub fn unregister_flag(&self, key: &str) {
        if self.registry.remove(key).is_some() {
            self.collector.remove(key);
            info!(flag = key, "flag unregistered");
            self.bus.publish(FlagChangeKind::Unregistered, key);
        }
    }

    pub fn set_user_override(
        &self,
        user_id: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<FlagValue>,
    ) {
        let user_id = user_id.into();
        let key = key.into();
        self.overrides.set_user(user_id.as_str(), key.as_str(), value.into());
        self.refresh_mirrors(&key);
        self.bus.publish(FlagChangeKind::OverrideSet, &key);
    }

    pub fn remove_user_override(&self, user_id: &str, key: &str) {
        if self.overrides.remove_user(user_id, key) {
            self.refresh_mirrors(key);
            self.bus.publish(FlagChangeKind::OverrideRemoved, key);
        }
    }

    pub fn set_plugin_override(
        &self,
        plugin_id: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<FlagValue>,
    ) {
        let plugin_id = plugin_id.into();
        let key = key.into();
        self.overrides
            .set_plugin(plugin_id.as_str(), key.as_str(), value.into());
        self.refresh_mirrors(&key);
        self.bus.publish(FlagChangeKind::OverrideSet, &key);
    }

    pub fn remove_plugin_override(&self, plugin_id: &str, key: &str) {
        if self.overrides.remove_plugin(plugin_id, key) {
            self.refresh_mirrors(key);
            self.bus.publish(FlagChangeKind::OverrideRemoved, key);
        }
    }

    // ---- evaluation surface -----------------------------------------------

    /// Evaluate a flag for a context.
    ///
    /// Total: missing flags, malformed conditions, and internal panics
    /// all degrade to a default-sourced result instead of an error.
    /// When `context` is `None` the configured provider supplies one.
    pub fn evaluate(&self, key: &str, context: Option<&EvaluationContext>) -> EvaluationResult {
        let started = Instant::now();
        let context = context
            .cloned()
            .unwrap_or_else(|| self.context_provider.default_context());

        let result = match panic::catch_unwind(AssertUnwindSafe(|| {
            self.evaluate_inner(key, &context)
        })) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(flag = key, panic = %message, "evaluation failed, falling back to default");
                let value = self
                    .registry
                    .get(key)
                    .map(|flag| flag.default_value.clone())
                    .unwrap_or(FlagValue::Bool(false));
                build_result(
                    key,
                    value,
                    EvaluationSource::Default,
                    format!("Evaluation error: {message}"),
                    &context,
                    0,
                    None,
                )
            }
        };

        self.collector.record(&result, started.elapsed());
        result
    }

    fn evaluate_inner(&self, key: &str, context: &EvaluationContext) -> EvaluationResult {
        let Some(flag) = self.registry.get(key) else {
            return build_result(
                key,
                FlagValue::Bool(false),
                EvaluationSource::Default,
                "Flag not found".to_string(),
                context,
                0,
                None,
            );
        };

        // master kill switch dominates everything, overrides included
        if !flag.enabled {
            return build_result(
                key,
                flag.kind.off_value(),
                EvaluationSource::Default,
                format!("Flag '{key}' is globally disabled"),
                context,
                0,
                None,
            );
        }

        if let Some(user_id) = &context.user_id
            && let Some(value) = self.overrides.user_value(user_id, key)
        {
            return build_result(
                key,
                value,
                EvaluationSource::UserOverride,
                format!("User override for '{user_id}'"),
                context,
                0,
                None,
            );
        }

        if let Some(plugin_id) = &context.plugin_id
            && let Some(value) = self.overrides.plugin_value(plugin_id, key)
        {
            return build_result(
                key,
                value,
                EvaluationSource::PluginOverride,
                format!("Plugin override for '{plugin_id}'"),
                context,
                0,
                None,
            );
        }

        // an environment value becomes the candidate; conditions and
        // rollout still apply on top of it, unlike overrides
        let (mut value, mut source, mut reason) = match flag.environments.get(&context.environment)
        {
            Some(value) => (
                value.clone(),
                EvaluationSource::Environment,
                format!("Environment value for '{}'", context.environment),
            ),
            None => (
                flag.default_value.clone(),
                EvaluationSource::Default,
                "Default value".to_string(),
            ),
        };

        let mut conditions_evaluated = 0u32;
        if flag.kind == FlagKind::Boolean {
            for condition in &flag.conditions {
                conditions_evaluated += 1;
                let matched = condition.matches(context);
                if matched && value.is_truthy() {
                    continue;
                }
                let detail = condition
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("condition on {}", condition.attribute));
                let reason = if matched {
                    format!("Conditions cannot enable an already-false value ({detail})")
                } else {
                    format!("Condition not met: {detail}")
                };
                return build_result(
                    key,
                    FlagValue::Bool(false),
                    EvaluationSource::Condition,
                    reason,
                    context,
                    conditions_evaluated,
                    None,
                );
            }
        }

        let mut rollout_bucket = None;
        if flag.kind == FlagKind::Boolean && value.is_truthy() && flag.rollout_percentage < 100 {
            let identity = rollout::bucket_identity(context);
            let bucket = rollout::bucket(&flag.key, identity);
            rollout_bucket = Some(bucket);
            if bucket >= flag.rollout_percentage {
                value = FlagValue::Bool(false);
                source = EvaluationSource::Rollout;
                reason = format!(
                    "Outside {}% rollout (bucket {bucket})",
                    flag.rollout_percentage
                );
            } else {
                reason = format!("{reason}; within {}% rollout", flag.rollout_percentage);
            }
        }

        build_result(
            key,
            value,
            source,
            reason,
            context,
            conditions_evaluated,
            rollout_bucket,
        )
    }

    /// Whether the flag resolves to a truthy value for the context.
    pub fn is_enabled(&self, key: &str, context: Option<&EvaluationContext>) -> bool {
        self.evaluate(key, context).value.is_truthy()
    }

    /// The resolved value for the context.
    pub fn get_value(&self, key: &str, context: Option<&EvaluationContext>) -> FlagValue {
        self.evaluate(key, context).value
    }

    /// Evaluate several flags independently against one context.
    pub fn evaluate_multiple(
        &self,
        keys: &[&str],
        context: Option<&EvaluationContext>,
    ) -> HashMap<String, EvaluationResult> {
        keys.iter()
            .map(|key| ((*key).to_string(), self.evaluate(key, context)))
            .collect()
    }

    /// Keys of all registered flags that are enabled for the context.
    pub fn enabled_flags(&self, context: Option<&EvaluationContext>) -> Vec<String> {
        let mut keys = self.registry.keys();
        keys.sort();
        keys.retain(|key| self.is_enabled(key, context));
        keys
    }

    // ---- introspection ----------------------------------------------------

    /// Validate a flag without registering it.
    pub fn validate_flag(&self, flag: &FeatureFlag) -> ValidationReport {
        validation::validate_flag(flag, &self.config)
    }

    pub fn flag(&self, key: &str) -> Option<Arc<FeatureFlag>> {
        self.registry.get(key)
    }

    pub fn all_flags(&self) -> Vec<Arc<FeatureFlag>> {
        self.registry.all()
    }

    /// Usage metrics for one flag, or aggregated across all flags when
    /// `key` is `None`. An unknown key yields empty metrics.
    pub fn usage_metrics(&self, key: Option<&str>) -> FlagMetrics {
        match key {
            Some(key) => self.collector.metrics(key).unwrap_or_default(),
            None => self.collector.aggregate(),
        }
    }

    /// The most recent `limit` evaluation results for a flag, oldest
    /// first. Callers without a preference use
    /// [`DEFAULT_HISTORY_LIMIT`].
    pub fn evaluation_history(&self, key: &str, limit: usize) -> Vec<EvaluationResult> {
        self.collector.history(key, limit)
    }

    /// Subscribe to flag change events.
    pub fn subscribe(&self) -> broadcast::Receiver<FlagChangeEvent> {
        self.bus.subscribe()
    }

    // ---- portability ------------------------------------------------------

    /// Snapshot the full engine state as a transport-neutral document.
    pub fn export_configuration(&self) -> ExportedConfiguration {
        let flags = self
            .registry
            .all()
            .iter()
            .map(|flag| (**flag).clone())
            .collect();
        ExportedConfiguration::new(
            flags,
            self.overrides.snapshot_users(),
            self.overrides.snapshot_plugins(),
        )
    }

    /// Replace override stores wholesale and re-register every flag in
    /// the document, each revalidated.
    // TODO: roll back flags imported earlier in the loop when a later
    // entry fails validation
    pub fn import_configuration(&self, doc: ExportedConfiguration) -> Result<(), FlagError> {
        self.overrides
            .replace_all(doc.user_overrides, doc.plugin_overrides);

        for flag in doc.flags {
            let report = validation::validate_flag(&flag, &self.config);
            if !report.is_valid() {
                return Err(FlagError::Validation(report));
            }
            self.registry.insert(self.with_mirrors(flag));
        }

        info!(flags = self.registry.len(), "configuration imported");
        self.bus.publish(FlagChangeKind::ConfigurationImported, "*");
        Ok(())
    }

    /// Load and import configuration from the attached store, if any.
    ///
    /// Returns whether a configuration was found and applied.
    pub async fn load_from_store(&self) -> Result<bool, FlagError> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        match store.load().await? {
            Some(doc) => {
                self.import_configuration(doc)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Save the current configuration to the attached store, if any.
    pub async fn save_to_store(&self) -> Result<(), FlagError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        store.save(&self.export_configuration()).await
    }

    /// Drop all flags, overrides, metrics, and history.
    pub fn clear(&self) {
        self.registry.clear();
        self.overrides.clear();
        self.collector.clear();
    }

    // ---- internals --------------------------------------------------------

    fn log_warnings(&self, key: &str, report: &ValidationReport) {
        for warning in &report.warnings {
            warn!(flag = key, warning = %warning, "flag validation warning");
        }
    }

    /// Rebuild a flag's override mirrors from the override store.
    fn with_mirrors(&self, mut flag: FeatureFlag) -> FeatureFlag {
        flag.user_overrides = self.overrides.user_values_for_flag(&flag.key);
        flag.plugin_overrides = self.overrides.plugin_values_for_flag(&flag.key);
        flag
    }

    fn refresh_mirrors(&self, key: &str) {
        if let Some(current) = self.registry.get(key) {
            let refreshed = self.with_mirrors((*current).clone());
            self.registry.insert(refreshed);
        }
    }
}

impl Default for FlagEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Condition, ConditionAttribute, Operator};
    use crate::context::StaticContextProvider;
    use serde_json::json;

    fn engine() -> FlagEngine {
        FlagEngine::new()
    }

    #[test]
    fn test_register_and_evaluate_default() {
        let engine = engine();
        engine
            .register_flag(FeatureFlag::boolean("dark-mode", true))
            .unwrap();

        let result = engine.evaluate("dark-mode", Some(&EvaluationContext::new()));
        assert_eq!(result.value, FlagValue::Bool(true));
        assert_eq!(result.source, EvaluationSource::Default);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let engine = engine();
        engine
            .register_flag(FeatureFlag::boolean("dark-mode", true))
            .unwrap();
        let err = engine
            .register_flag(FeatureFlag::boolean("dark-mode", false))
            .unwrap_err();
        assert!(matches!(err, FlagError::AlreadyRegistered(_)));
    }

    #[test]
    fn test_update_missing_flag() {
        let engine = engine();
        let err = engine
            .update_flag("nope", FlagUpdate::default())
            .unwrap_err();
        assert!(matches!(err, FlagError::NotFound(_)));
    }

    #[test]
    fn test_failed_update_preserves_prior_state() {
        let engine = engine();
        engine
            .register_flag(FeatureFlag::boolean("dark-mode", true))
            .unwrap();

        let err = engine
            .update_flag(
                "dark-mode",
                FlagUpdate {
                    rollout_percentage: Some(130),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, FlagError::Validation(_)));
        assert_eq!(engine.flag("dark-mode").unwrap().rollout_percentage, 100);
    }

    #[test]
    fn test_environment_value_applies() {
        let engine = engine();
        engine
            .register_flag(
                FeatureFlag::string("banner-text", "hello").with_environment("production", "hi"),
            )
            .unwrap();

        let ctx = EvaluationContext::new().with_environment("production");
        let result = engine.evaluate("banner-text", Some(&ctx));
        assert_eq!(result.value, FlagValue::Str("hi".into()));
        assert_eq!(result.source, EvaluationSource::Environment);

        let ctx = EvaluationContext::new().with_environment("staging");
        let result = engine.evaluate("banner-text", Some(&ctx));
        assert_eq!(result.value, FlagValue::Str("hello".into()));
        assert_eq!(result.source, EvaluationSource::Default);
    }

    #[test]
    fn test_plugin_override_after_user_override() {
        let engine = engine();
        engine
            .register_flag(FeatureFlag::boolean("tool-access", false))
            .unwrap();
        engine.set_plugin_override("calc", "tool-access", true);
        engine.set_user_override("u1", "tool-access", false);

        let ctx = EvaluationContext::new().with_user_id("u1").with_plugin("calc");
        let result = engine.evaluate("tool-access", Some(&ctx));
        assert_eq!(result.source, EvaluationSource::UserOverride);
        assert_eq!(result.value, FlagValue::Bool(false));

        let ctx = EvaluationContext::new().with_plugin("calc");
        let result = engine.evaluate("tool-access", Some(&ctx));
        assert_eq!(result.source, EvaluationSource::PluginOverride);
        assert_eq!(result.value, FlagValue::Bool(true));
    }

    #[test]
    fn test_conditions_count_in_result() {
        let engine = engine();
        engine
            .register_flag(
                FeatureFlag::boolean("beta", true)
                    .with_condition(Condition::new(
                        ConditionAttribute::Environment,
                        Operator::Equals,
                        json!("production"),
                    ))
                    .with_condition(Condition::new(
                        ConditionAttribute::UserId,
                        Operator::In,
                        json!(["u1", "u2"]),
                    )),
            )
            .unwrap();

        let ctx = EvaluationContext::new()
            .with_environment("production")
            .with_user_id("u1");
        let result = engine.evaluate("beta", Some(&ctx));
        assert_eq!(result.value, FlagValue::Bool(true));
        assert_eq!(result.conditions_evaluated, 2);

        let ctx = EvaluationContext::new()
            .with_environment("staging")
            .with_user_id("u1");
        let result = engine.evaluate("beta", Some(&ctx));
        assert_eq!(result.value, FlagValue::Bool(false));
        assert_eq!(result.source, EvaluationSource::Condition);
        assert_eq!(result.conditions_evaluated, 1);
    }

    #[test]
    fn test_conditions_cannot_enable_false_candidate() {
        let engine = engine();
        engine
            .register_flag(
                FeatureFlag::boolean("beta", false).with_condition(Condition::new(
                    ConditionAttribute::Environment,
                    Operator::Equals,
                    json!("production"),
                )),
            )
            .unwrap();

        let ctx = EvaluationContext::new().with_environment("production");
        let result = engine.evaluate("beta", Some(&ctx));
        assert_eq!(result.value, FlagValue::Bool(false));
        assert_eq!(result.source, EvaluationSource::Condition);
    }

    #[test]
    fn test_rollout_records_bucket() {
        let engine = engine();
        engine
            .register_flag(FeatureFlag::boolean("gradual", true).with_rollout(50))
            .unwrap();

        let ctx = EvaluationContext::new().with_user_id("u1");
        let result = engine.evaluate("gradual", Some(&ctx));
        let bucket = result.rollout_bucket.expect("rollout stage should run");
        assert!(bucket < 100);
        if bucket >= 50 {
            assert_eq!(result.source, EvaluationSource::Rollout);
            assert_eq!(result.value, FlagValue::Bool(false));
        } else {
            assert_eq!(result.value, FlagValue::Bool(true));
        }
    }

    #[test]
    fn test_non_boolean_flags_skip_conditions_and_rollout() {
        let engine = engine();
        engine
            .register_flag(
                FeatureFlag::string("variant", "a")
                    .with_condition(Condition::new(
                        ConditionAttribute::Environment,
                        Operator::Equals,
                        json!("production"),
                    ))
                    .with_rollout(0),
            )
            .unwrap();

        let result = engine.evaluate("variant", Some(&EvaluationContext::new()));
        assert_eq!(result.value, FlagValue::Str("a".into()));
        assert_eq!(result.conditions_evaluated, 0);
        assert!(result.rollout_bucket.is_none());
    }

    #[test]
    fn test_default_context_comes_from_provider() {
        let engine = FlagEngine::builder()
            .context_provider(StaticContextProvider::new(
                EvaluationContext::new().with_environment("embedded"),
            ))
            .build();
        engine
            .register_flag(
                FeatureFlag::boolean("dark-mode", false).with_environment("embedded", true),
            )
            .unwrap();

        let result = engine.evaluate("dark-mode", None);
        assert_eq!(result.value, FlagValue::Bool(true));
        assert_eq!(result.source, EvaluationSource::Environment);
    }

    #[test]
    fn test_evaluate_multiple() {
        let engine = engine();
        engine
            .register_flag(FeatureFlag::boolean("a", true))
            .unwrap();
        engine
            .register_flag(FeatureFlag::boolean("b", false))
            .unwrap();

        let results = engine.evaluate_multiple(&["a", "b", "missing"], None);
        assert_eq!(results.len(), 3);
        assert_eq!(results["a"].value, FlagValue::Bool(true));
        assert_eq!(results["b"].value, FlagValue::Bool(false));
        assert_eq!(results["missing"].reason, "Flag not found");
    }

    #[test]
    fn test_enabled_flags() {
        let engine = engine();
        engine
            .register_flag(FeatureFlag::boolean("on", true))
            .unwrap();
        engine
            .register_flag(FeatureFlag::boolean("off", false))
            .unwrap();
        engine
            .register_flag(FeatureFlag::boolean("killed", true).with_enabled(false))
            .unwrap();

        assert_eq!(engine.enabled_flags(None), vec!["on".to_string()]);
    }

    #[test]
    fn test_unregister_discards_metrics_and_history() {
        let engine = engine();
        engine
            .register_flag(FeatureFlag::boolean("temp", true))
            .unwrap();
        engine.evaluate("temp", None);
        assert_eq!(engine.usage_metrics(Some("temp")).total_evaluations, 1);

        engine.unregister_flag("temp");
        assert!(engine.flag("temp").is_none());
        assert_eq!(engine.usage_metrics(Some("temp")).total_evaluations, 0);
        assert!(engine.evaluation_history("temp", 10).is_empty());

        // absent key is a no-op, not an error
        engine.unregister_flag("temp");
    }

    #[test]
    fn test_override_mirrors_on_flag() {
        let engine = engine();
        engine
            .register_flag(FeatureFlag::boolean("dark-mode", false))
            .unwrap();
        engine.set_user_override("u1", "dark-mode", true);
        engine.set_plugin_override("p1", "dark-mode", false);

        let flag = engine.flag("dark-mode").unwrap();
        assert_eq!(flag.user_overrides.get("u1"), Some(&FlagValue::Bool(true)));
        assert_eq!(
            flag.plugin_overrides.get("p1"),
            Some(&FlagValue::Bool(false))
        );

        engine.remove_user_override("u1", "dark-mode");
        let flag = engine.flag("dark-mode").unwrap();
        assert!(flag.user_overrides.is_empty());
    }

    #[tokio::test]
    async fn test_change_events_published() {
        let engine = engine();
        let mut rx = engine.subscribe();

        engine
            .register_flag(FeatureFlag::boolean("dark-mode", true))
            .unwrap();
        engine.set_user_override("u1", "dark-mode", false);
        engine.unregister_flag("dark-mode");

        assert_eq!(rx.recv().await.unwrap().kind, FlagChangeKind::Registered);
        assert_eq!(rx.recv().await.unwrap().kind, FlagChangeKind::OverrideSet);
        assert_eq!(rx.recv().await.unwrap().kind, FlagChangeKind::Unregistered);
    }
}
