//! The predicate interpreter.
//!
//! A predicate is a single boolean check over one field path. Field paths
//! index the diff verbatim; the interpreter never parses or traverses
//! them. An unsatisfied predicate is not an error: every failure mode,
//! including type anomalies in numeric comparison, is expressed as a
//! reason string. Reason strings are part of the observable contract and
//! callers match on their substrings.

use akari_core::{FieldDiff, Operator, Predicate, Value};

/// Evaluate a predicate against a field diff. Returns `None` when
/// satisfied, `Some(reason)` when not.
pub(crate) fn check(pred: &Predicate, diff: &FieldDiff) -> Option<String> {
    let value = diff.get(&pred.field);

    match pred.operator {
        Operator::Exists => match value {
            Some(_) => None,
            None => Some(format!("Field {} does not exist", pred.field)),
        },

        Operator::NotExists => match value {
            None => None,
            Some(v) => Some(format!(
                "Field {} exists but should not (value: {})",
                pred.field, v
            )),
        },

        Operator::Equals => {
            let Some(expected) = &pred.value else {
                return Some(format!("Field {} has no comparison value", pred.field));
            };
            match value {
                None => Some(format!(
                    "Field {} does not exist (expected: {})",
                    pred.field, expected
                )),
                Some(v) if v != expected => Some(format!(
                    "Field {} is '{}' (expected: {})",
                    pred.field, v, expected
                )),
                Some(_) => None,
            }
        }

        Operator::NotEquals => {
            let Some(expected) = &pred.value else {
                return Some(format!("Field {} has no comparison value", pred.field));
            };
            match value {
                None => None,
                Some(v) if v == expected => Some(format!(
                    "Field {} is '{}' (must not equal: {})",
                    pred.field, v, expected
                )),
                Some(_) => None,
            }
        }

        Operator::Gt => numeric_compare(pred, value, ">", |actual, bound| actual > bound),

        Operator::Lt => numeric_compare(pred, value, "<", |actual, bound| actual < bound),

        Operator::AnyTrue => {
            let Some(v) = value else {
                return Some(format!("Field {} does not exist", pred.field));
            };
            match v.as_seq() {
                Some(items) => {
                    if items.iter().any(Value::is_truthy) {
                        None
                    } else {
                        Some(format!("Field {} has no truthy elements", pred.field))
                    }
                }
                None if v.is_truthy() => None,
                None => Some(format!("Field {} is not true", pred.field)),
            }
        }

        Operator::AllTrue => {
            let Some(v) = value else {
                return Some(format!("Field {} does not exist", pred.field));
            };
            match v.as_seq() {
                Some([]) => Some(format!("Field {} is empty array", pred.field)),
                Some(items) => items
                    .iter()
                    .find(|item| !item.is_truthy())
                    .map(|item| {
                        format!("Field {} has non-truthy element: {}", pred.field, item)
                    }),
                None if v.is_truthy() => None,
                None => Some(format!("Field {} is not true", pred.field)),
            }
        }

        Operator::Contains => {
            let Some(expected) = &pred.value else {
                return Some(format!("Field {} has no comparison value", pred.field));
            };
            let Some(v) = value else {
                return Some(format!("Field {} does not exist", pred.field));
            };
            match v.as_seq() {
                None => Some(format!("Field {} is not an array", pred.field)),
                Some(items) if items.contains(expected) => None,
                Some(_) => Some(format!(
                    "Field {} does not contain {}",
                    pred.field, expected
                )),
            }
        }
    }
}

fn numeric_compare(
    pred: &Predicate,
    value: Option<&Value>,
    symbol: &str,
    holds: impl Fn(f64, f64) -> bool,
) -> Option<String> {
    let Some(v) = value else {
        return Some(format!("Field {} does not exist", pred.field));
    };
    let Some(actual) = v.as_f64() else {
        return Some(format!("Field {} is not numeric: {}", pred.field, v));
    };
    let Some(bound) = pred.value.as_ref().and_then(Value::as_f64) else {
        return Some("Comparison value is not numeric".to_string());
    };
    if holds(actual, bound) {
        None
    } else {
        Some(format!(
            "Field {} is {} (must be {} {})",
            pred.field, actual, symbol, bound
        ))
    }
}
