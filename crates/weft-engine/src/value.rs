//! Loose value semantics shared by the context and the expression interpreter.
//!
//! Values are plain [`serde_json::Value`]s. `null` doubles as "undefined".

use serde_json::{Number, Value};

/// Whether a value counts as true in a condition.
#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Text form of a value, as used for string concatenation and text content.
#[must_use]
pub fn to_display(value: &Value) -> String {
    match value {
        Value::Null => "null".to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => to_display(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_owned(),
    }
}

fn format_number(n: &Number) -> String {
    match (n.as_i64(), n.as_f64()) {
        (Some(i), _) => i.to_string(),
        (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{f:.0}"),
        _ => n.to_string(),
    }
}

/// Numeric form of a value. `NaN` when there is none.
pub(crate) fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse().unwrap_or(f64::NAN)
            }
        }
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

/// Build a number value. Integral results are stored as integers, non-finite
/// results become `null`.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn number(f: f64) -> Value {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
        return Value::from(f as i64);
    }
    Number::from_f64(f).map_or(Value::Null, Value::Number)
}

/// Equality without type coercion. Numbers compare by value, so `1` and
/// `1.0` are equal.
pub(crate) fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Property of a value, `null` when missing.
///
/// Arrays and strings expose `length`; arrays are indexed by decimal keys.
pub(crate) fn member(value: &Value, key: &str) -> Value {
    match value {
        Value::Object(map) => map.get(key).cloned().unwrap_or(Value::Null),
        Value::Array(items) if key == "length" => Value::from(items.len()),
        Value::Array(items) => key
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i))
            .cloned()
            .unwrap_or(Value::Null),
        Value::String(s) if key == "length" => Value::from(s.chars().count()),
        _ => Value::Null,
    }
}

/// Short type name used in error messages.
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_truthy() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!("0")));
        assert!(truthy(&json!([])));
        assert!(truthy(&json!(-1.5)));
    }

    #[test]
    fn test_to_display() {
        assert_eq!(to_display(&json!(3)), "3");
        assert_eq!(to_display(&json!(3.0)), "3");
        assert_eq!(to_display(&json!(0.5)), "0.5");
        assert_eq!(to_display(&json!([1, null, "a"])), "1,,a");
        assert_eq!(to_display(&json!({"a": 1})), "[object Object]");
    }

    #[test]
    fn test_number_normalizes_integers() {
        assert_eq!(number(2.0), json!(2));
        assert_eq!(number(2.5), json!(2.5));
        assert_eq!(number(f64::NAN), Value::Null);
        assert_eq!(number(f64::INFINITY), Value::Null);
    }

    #[test]
    fn test_strict_equals() {
        assert!(strict_equals(&json!(1), &json!(1.0)));
        assert!(!strict_equals(&json!(1), &json!("1")));
        assert!(strict_equals(&json!({"a": [1]}), &json!({"a": [1]})));
    }

    #[test]
    fn test_member() {
        let value = json!({"items": [10, 20], "name": "ada"});
        assert_eq!(member(&value, "items"), json!([10, 20]));
        assert_eq!(member(&member(&value, "items"), "1"), json!(20));
        assert_eq!(member(&member(&value, "items"), "length"), json!(2));
        assert_eq!(member(&member(&value, "name"), "length"), json!(3));
        assert_eq!(member(&value, "missing"), Value::Null);
    }
}
