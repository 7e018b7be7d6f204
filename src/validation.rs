// Flag validation

use crate::config::EngineConfig;
use crate::flag::{FeatureFlag, FlagKind, FlagValue};
use crate::condition::Operator;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single validation finding for one field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Field the finding applies to
    pub field: String,

    /// Human-readable message
    pub message: String,

    /// Constraint that produced the finding
    pub constraint: String,
}

impl ValidationIssue {
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        constraint: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            constraint: constraint.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Outcome of validating one flag
///
/// Errors block registration; warnings are surfaced and logged but never
/// block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    fn error(
        &mut self,
        field: impl Into<String>,
        message: impl Into<String>,
        constraint: impl Into<String>,
    ) {
        self.errors.push(ValidationIssue::new(field, message, constraint));
    }

    fn warn(
        &mut self,
        field: impl Into<String>,
        message: impl Into<String>,
        constraint: impl Into<String>,
    ) {
        self.warnings.push(ValidationIssue::new(field, message, constraint));
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            write!(f, "valid")?;
        } else {
            let joined = self
                .errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            write!(f, "{joined}")?;
        }
        if !self.warnings.is_empty() {
            write!(f, " ({} warning(s))", self.warnings.len())?;
        }
        Ok(())
    }
}

/// Validate a flag's structure.
///
/// Kind/default mismatches are warnings, not errors: dynamic values are
/// common enough that a hard gate would reject working configurations.
pub fn validate_flag(flag: &FeatureFlag, config: &EngineConfig) -> ValidationReport {
    let mut report = ValidationReport::default();

    if flag.key.trim().is_empty() {
        report.error("key", "key must not be empty", "required");
    }
    if flag.name.trim().is_empty() {
        report.error("name", "name must not be empty", "required");
    }
    if flag.rollout_percentage > 100 {
        report.error(
            "rolloutPercentage",
            format!(
                "rollout percentage {} is outside 0-100",
                flag.rollout_percentage
            ),
            "range",
        );
    }

    for (i, condition) in flag.conditions.iter().enumerate() {
        let field = format!("conditions[{i}].value");
        if condition.value.is_null() {
            report.error(field.clone(), "condition value must not be null", "required");
        }
        if matches!(condition.operator, Operator::In | Operator::NotIn)
            && !condition.value.is_array()
        {
            report.error(field, "membership operators require a list value", "type");
        }
    }

    if !kind_matches(&flag.default_value, flag.kind) {
        report.warn(
            "defaultValue",
            format!("default value does not match declared kind {:?}", flag.kind),
            "type",
        );
    }

    let key = flag.key.to_lowercase();
    let risky = config.risky_key_hints.iter().any(|hint| key.contains(hint));
    if risky && flag.rollout_percentage > config.risky_rollout_threshold {
        report.warn(
            "key",
            format!(
                "'{}' looks like a sensitive capability rolled out above {}%",
                flag.key, config.risky_rollout_threshold
            ),
            "policy",
        );
    }

    report
}

fn kind_matches(value: &FlagValue, kind: FlagKind) -> bool {
    matches!(
        (value, kind),
        (FlagValue::Bool(_), FlagKind::Boolean)
            | (FlagValue::Str(_), FlagKind::String)
            | (FlagValue::Num(_), FlagKind::Number)
            | (FlagValue::Json(_), FlagKind::Json)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Condition, ConditionAttribute};
    use serde_json::json;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn test_valid_flag() {
        let flag = FeatureFlag::boolean("dark-mode", false);
        let report = validate_flag(&flag, &config());
        assert!(report.is_valid());
        assert!(!report.has_warnings());
    }

    #[test]
    fn test_empty_key_rejected() {
        let flag = FeatureFlag::boolean("", true);
        let report = validate_flag(&flag, &config());
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].field, "key");
    }

    #[test]
    fn test_rollout_out_of_range_rejected() {
        let flag = FeatureFlag::boolean("dark-mode", true).with_rollout(150);
        let report = validate_flag(&flag, &config());
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].constraint, "range");
    }

    #[test]
    fn test_membership_condition_needs_list() {
        let flag = FeatureFlag::boolean("dark-mode", true).with_condition(Condition::new(
            ConditionAttribute::Environment,
            Operator::In,
            json!("production"),
        ));
        let report = validate_flag(&flag, &config());
        assert!(!report.is_valid());
    }

    #[test]
    fn test_kind_mismatch_is_warning_only() {
        let mut flag = FeatureFlag::boolean("dark-mode", true);
        flag.default_value = FlagValue::Str("on".into());
        let report = validate_flag(&flag, &config());
        assert!(report.is_valid());
        assert!(report.has_warnings());
    }

    #[test]
    fn test_risky_key_with_wide_rollout_warns() {
        let flag = FeatureFlag::boolean("autonomous_refactor", true).with_rollout(80);
        let report = validate_flag(&flag, &config());
        assert!(report.is_valid());
        assert!(report
            .warnings
            .iter()
            .any(|w| w.constraint == "policy"));

        // narrow rollout on the same key stays quiet
        let flag = FeatureFlag::boolean("autonomous_refactor", true).with_rollout(10);
        let report = validate_flag(&flag, &config());
        assert!(!report.has_warnings());
    }
}
