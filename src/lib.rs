//! Pennant — feature-flag evaluation engine
//!
//! An in-memory decision engine for typed feature flags: per-user and
//! per-plugin overrides, per-environment values, rule-based conditions,
//! deterministic percentage rollout, evaluation metrics with bounded
//! history, and configuration export/import.
//!
//! # Features
//!
//! - 🚀 **Typed flags** - boolean, string, number, and JSON values
//! - 🎯 **Targeting conditions** - attribute rules with a fixed operator set
//! - 👤 **Overrides** - per-user and per-plugin forced values
//! - 🎲 **Gradual rollout** - sticky, hash-bucketed percentage rollout
//! - 📊 **Usage metrics** - per-flag counters and evaluation history
//! - 🔔 **Change events** - broadcast notifications on every mutation
//!
//! # Quick Start
//!
//! ```
//! use pennant::{EvaluationContext, FeatureFlag, FlagEngine};
//!
//! let engine = FlagEngine::new();
//! engine
//!     .register_flag(FeatureFlag::boolean("new-ui", true))
//!     .unwrap();
//!
//! let context = EvaluationContext::new().with_user_id("user-123");
//! assert!(engine.is_enabled("new-ui", Some(&context)));
//! ```
//!
//! # Targeting conditions
//!
//! ```
//! use pennant::{
//!     Condition, ConditionAttribute, EvaluationContext, FeatureFlag, FlagEngine, Operator,
//! };
//! use serde_json::json;
//!
//! let engine = FlagEngine::new();
//! let flag = FeatureFlag::boolean("beta-tools", true).with_condition(Condition::new(
//!     ConditionAttribute::Environment,
//!     Operator::Equals,
//!     json!("production"),
//! ));
//! engine.register_flag(flag).unwrap();
//!
//! let staging = EvaluationContext::new().with_environment("staging");
//! assert!(!engine.is_enabled("beta-tools", Some(&staging)));
//! ```
//!
//! # Gradual rollout
//!
//! ```
//! use pennant::{EvaluationContext, FeatureFlag, FlagEngine};
//!
//! let engine = FlagEngine::new();
//! engine
//!     .register_flag(FeatureFlag::boolean("new-algorithm", true).with_rollout(25))
//!     .unwrap();
//!
//! // the same user keeps landing in the same bucket
//! let context = EvaluationContext::new().with_user_id("user-123");
//! let first = engine.evaluate("new-algorithm", Some(&context));
//! let second = engine.evaluate("new-algorithm", Some(&context));
//! assert_eq!(first.value, second.value);
//! ```

pub mod condition;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod flag;
pub mod metrics;
pub mod overrides;
pub mod portability;
pub mod registry;
pub mod rollout;
pub mod store;
pub mod validation;

pub use condition::{Condition, ConditionAttribute, Operator};
pub use config::EngineConfig;
pub use context::{ContextProvider, EnvContextProvider, EvaluationContext, StaticContextProvider};
pub use engine::{
    EvaluationResult, EvaluationSource, FlagEngine, FlagEngineBuilder, DEFAULT_HISTORY_LIMIT,
};
pub use error::FlagError;
pub use events::{ChangeBus, FlagChangeEvent, FlagChangeKind};
pub use flag::{FeatureFlag, FlagKind, FlagMetadata, FlagUpdate, FlagValue};
pub use metrics::{EvaluationCollector, FlagMetrics};
pub use overrides::OverrideStore;
pub use portability::ExportedConfiguration;
pub use registry::FlagRegistry;
pub use store::{FlagStore, MemoryStore};
pub use validation::{validate_flag, ValidationIssue, ValidationReport};
