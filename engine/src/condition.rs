//! Option condition evaluation.

use crate::context::{display_value, resolve_path};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Exists,
    NotExists,
    Contains,
    In,
}

/// Declarative condition on a context field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Dotted path into the context.
    pub field: String,

    /// Comparison operator.
    pub operator: Operator,

    /// Comparand; unused for the existence operators.
    #[serde(default)]
    pub value: Option<Value>,
}

/// Evaluate a condition against the context.
///
/// A missing field satisfies only `not_exists`; every other operator is
/// false for it. The ordering operators coerce both sides to numbers and
/// are false when either side does not coerce.
#[must_use]
pub fn evaluate(condition: &Condition, context: &Value) -> bool {
    let field = resolve_path(context, &condition.field);

    match condition.operator {
        Operator::Exists => field.is_some(),
        Operator::NotExists => field.is_none(),
        _ => {
            let Some(field) = field else {
                return false;
            };
            let expected = condition.value.as_ref().unwrap_or(&Value::Null);

            match condition.operator {
                Operator::Equals => loose_eq(field, expected),
                Operator::NotEquals => !loose_eq(field, expected),
                Operator::GreaterThan => match (as_number(field), as_number(expected)) {
                    (Some(a), Some(b)) => a > b,
                    _ => false,
                },
                Operator::LessThan => match (as_number(field), as_number(expected)) {
                    (Some(a), Some(b)) => a < b,
                    _ => false,
                },
                Operator::Contains => match field {
                    Value::String(s) => s.contains(&display_value(expected)),
                    Value::Array(items) => items.iter().any(|item| loose_eq(item, expected)),
                    _ => false,
                },
                Operator::In => match expected {
                    Value::Array(items) => items.iter().any(|item| loose_eq(field, item)),
                    _ => false,
                },
                Operator::Exists | Operator::NotExists => unreachable!(),
            }
        }
    }
}

/// Equality that tolerates number/string representation differences.
fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
        _ => display_value(a) == display_value(b),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
