//! Condition evaluation
//!
//! A condition compares one context attribute against a literal value.
//! Evaluation is a pure function of (condition, context) and fails closed:
//! anything malformed or unresolvable evaluates to false rather than
//! letting a flag through.

use crate::context::EvaluationContext;
use crate::flag::FlagValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Context attribute a condition reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionAttribute {
    UserId,
    Environment,
    PluginCategory,
    SystemVersion,
    /// A named entry in the context's custom attribute bag
    Custom(String),
}

impl fmt::Display for ConditionAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserId => write!(f, "user_id"),
            Self::Environment => write!(f, "environment"),
            Self::PluginCategory => write!(f, "plugin_category"),
            Self::SystemVersion => write!(f, "system_version"),
            Self::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    /// Literal must be a list; membership test
    In,
    /// Literal must be a list; negated membership test
    NotIn,
    GreaterThan,
    LessThan,
    /// Substring test on the string forms
    Contains,
}

/// A single targeting condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub attribute: ConditionAttribute,
    pub operator: Operator,
    /// Literal compared against the attribute. A JSON array for the
    /// membership operators, a scalar otherwise.
    pub value: Value,
    #[serde(default)]
    pub description: Option<String>,
}

impl Condition {
    pub fn new(attribute: ConditionAttribute, operator: Operator, value: Value) -> Self {
        Self {
            attribute,
            operator,
            value,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Evaluate this condition against a context.
    pub fn matches(&self, context: &EvaluationContext) -> bool {
        let actual = self.resolve(context);

        match self.operator {
            Operator::Equals => actual.map(|a| loose_eq(&a, &self.value)).unwrap_or(false),
            Operator::NotEquals => actual.map(|a| !loose_eq(&a, &self.value)).unwrap_or(true),
            Operator::In => match (&actual, self.value.as_array()) {
                (Some(a), Some(items)) => items.iter().any(|item| loose_eq(a, item)),
                _ => false,
            },
            Operator::NotIn => match (&actual, self.value.as_array()) {
                (Some(a), Some(items)) => !items.iter().any(|item| loose_eq(a, item)),
                (None, Some(_)) => true,
                // malformed literal fails closed
                _ => false,
            },
            Operator::GreaterThan => match (actual.and_then(|a| numeric(&a)), literal_numeric(&self.value)) {
                (Some(a), Some(b)) => a > b,
                _ => false,
            },
            Operator::LessThan => match (actual.and_then(|a| numeric(&a)), literal_numeric(&self.value)) {
                (Some(a), Some(b)) => a < b,
                _ => false,
            },
            Operator::Contains => match (actual, self.value.as_str()) {
                (Some(FlagValue::Str(haystack)), Some(needle)) => haystack.contains(needle),
                _ => false,
            },
        }
    }

    /// Resolve the context value for this condition's attribute.
    fn resolve(&self, context: &EvaluationContext) -> Option<FlagValue> {
        match &self.attribute {
            ConditionAttribute::UserId => context.user_id.clone().map(FlagValue::Str),
            ConditionAttribute::Environment => Some(FlagValue::Str(context.environment.clone())),
            ConditionAttribute::PluginCategory => {
                context.plugin_category.clone().map(FlagValue::Str)
            }
            ConditionAttribute::SystemVersion => {
                Some(FlagValue::Str(context.system_version.clone()))
            }
            ConditionAttribute::Custom(name) => context.custom.get(name).cloned(),
        }
    }
}

/// Loose scalar comparison between a context value and a condition literal.
///
/// Numbers compare numerically even when one side arrives as a string,
/// booleans compare against their string forms, everything else falls back
/// to exact JSON equality.
fn loose_eq(actual: &FlagValue, expected: &Value) -> bool {
    match (actual, expected) {
        (FlagValue::Bool(a), Value::Bool(b)) => a == b,
        (FlagValue::Bool(a), Value::String(b)) => a.to_string() == *b,
        (FlagValue::Str(a), Value::String(b)) => a == b,
        (FlagValue::Num(a), Value::Number(b)) => b.as_f64().is_some_and(|b| *a == b),
        (FlagValue::Str(a), Value::Number(b)) => {
            a.parse::<f64>().ok().zip(b.as_f64()).is_some_and(|(a, b)| a == b)
        }
        (FlagValue::Num(a), Value::String(b)) => b.parse::<f64>().is_ok_and(|b| *a == b),
        (FlagValue::Json(a), b) => a == b,
        _ => false,
    }
}

fn numeric(value: &FlagValue) -> Option<f64> {
    match value {
        FlagValue::Num(n) => Some(*n),
        FlagValue::Str(s) => s.parse::<f64>().ok(),
        FlagValue::Json(Value::Number(n)) => n.as_f64(),
        _ => None,
    }
}

fn literal_numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> EvaluationContext {
        EvaluationContext::new()
            .with_user_id("user-1")
            .with_environment("production")
            .with_system_version("2.4.0")
            .with_attribute("tier", "gold")
            .with_attribute("requests", 120.0)
    }

    #[test]
    fn test_equals() {
        let cond = Condition::new(
            ConditionAttribute::Environment,
            Operator::Equals,
            json!("production"),
        );
        assert!(cond.matches(&ctx()));
        assert!(!cond.matches(&EvaluationContext::new().with_environment("staging")));
    }

    #[test]
    fn test_not_equals_missing_attribute_passes() {
        let cond = Condition::new(
            ConditionAttribute::PluginCategory,
            Operator::NotEquals,
            json!("llm"),
        );
        // no plugin category on the context
        assert!(cond.matches(&ctx()));
    }

    #[test]
    fn test_membership() {
        let cond = Condition::new(
            ConditionAttribute::Custom("tier".into()),
            Operator::In,
            json!(["gold", "platinum"]),
        );
        assert!(cond.matches(&ctx()));

        let cond = Condition::new(
            ConditionAttribute::Custom("tier".into()),
            Operator::NotIn,
            json!(["free", "trial"]),
        );
        assert!(cond.matches(&ctx()));
    }

    #[test]
    fn test_membership_requires_list_literal() {
        // scalar literal for a membership operator fails closed
        let cond = Condition::new(
            ConditionAttribute::Custom("tier".into()),
            Operator::In,
            json!("gold"),
        );
        assert!(!cond.matches(&ctx()));
    }

    #[test]
    fn test_numeric_comparison() {
        let gt = Condition::new(
            ConditionAttribute::Custom("requests".into()),
            Operator::GreaterThan,
            json!(100),
        );
        assert!(gt.matches(&ctx()));

        let lt = Condition::new(
            ConditionAttribute::Custom("requests".into()),
            Operator::LessThan,
            json!(100),
        );
        assert!(!lt.matches(&ctx()));
    }

    #[test]
    fn test_non_numeric_comparison_fails_closed() {
        let cond = Condition::new(
            ConditionAttribute::Custom("tier".into()),
            Operator::GreaterThan,
            json!(10),
        );
        assert!(!cond.matches(&ctx()));
    }

    #[test]
    fn test_contains() {
        let cond = Condition::new(
            ConditionAttribute::SystemVersion,
            Operator::Contains,
            json!("2.4"),
        );
        assert!(cond.matches(&ctx()));

        let cond = Condition::new(
            ConditionAttribute::SystemVersion,
            Operator::Contains,
            json!("3.0"),
        );
        assert!(!cond.matches(&ctx()));
    }

    #[test]
    fn test_missing_custom_attribute_fails_closed() {
        let cond = Condition::new(
            ConditionAttribute::Custom("region".into()),
            Operator::Equals,
            json!("eu-west"),
        );
        assert!(!cond.matches(&ctx()));
    }
}
