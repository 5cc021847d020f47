//! Typed coercion of raw modifier values.

use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)$").expect("valid regex"));

static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?<value>[+-]?(?:\d+\.?\d*|\.\d+))(?<unit>ms|s|m)?$").expect("valid regex")
});

/// Coerced value of a typed field.
#[derive(Clone, Debug, PartialEq)]
pub enum TypedValue {
    Boolean(bool),
    Number(f64),
    Duration(Duration),
    String(String),
}

impl TypedValue {
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Duration(d) => Some(*d),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Boolean field. Accepts `yes`/`on`/`true` and `no`/`off`/`false` in any
/// case. A bare modifier (no value) takes `default`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BooleanTyping {
    pub default: bool,
    pub enforce: bool,
}

/// Numeric field with optional rounding and clamping.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NumberTyping {
    pub default: Option<f64>,
    pub enforce: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Round to the nearest integer.
    pub integer: bool,
}

/// Duration field: a number followed by `ms` (default), `s` or `m`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DurationTyping {
    pub default: Option<Duration>,
    pub enforce: bool,
}

/// Free-text field with an optional allow-list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StringTyping {
    pub default: Option<String>,
    pub enforce: bool,
    pub allowed: Vec<String>,
}

/// Schema of one modifier.
#[derive(Clone, Debug, PartialEq)]
pub enum Typing {
    Boolean(BooleanTyping),
    Number(NumberTyping),
    Duration(DurationTyping),
    String(StringTyping),
}

/// Result of a coercion, with a warning when the input was rejected.
#[derive(Clone, Debug, PartialEq)]
pub struct Coerced {
    pub value: Option<TypedValue>,
    pub warning: Option<String>,
}

impl Coerced {
    fn ok(value: Option<TypedValue>) -> Self {
        Self {
            value,
            warning: None,
        }
    }
}

impl Typing {
    fn enforce(&self) -> bool {
        match self {
            Self::Boolean(t) => t.enforce,
            Self::Number(t) => t.enforce,
            Self::Duration(t) => t.enforce,
            Self::String(t) => t.enforce,
        }
    }

    fn default_value(&self) -> Option<TypedValue> {
        match self {
            Self::Boolean(t) => Some(TypedValue::Boolean(t.default)),
            Self::Number(t) => t.default.map(TypedValue::Number),
            Self::Duration(t) => t.default.map(TypedValue::Duration),
            Self::String(t) => t
                .default
                .clone()
                .or_else(|| t.allowed.first().cloned())
                .map(TypedValue::String),
        }
    }

    /// Coerce a raw value.
    ///
    /// `raw` is `None` when the key is absent (only an enforced default
    /// applies) and `Some("")` when the key is present without a value.
    #[must_use]
    pub fn coerce(&self, raw: Option<&str>) -> Coerced {
        let Some(raw) = raw else {
            return Coerced::ok(if self.enforce() {
                self.default_value()
            } else {
                None
            });
        };
        let raw = raw.trim();

        match self {
            Self::Boolean(typing) => coerce_boolean(typing, raw),
            Self::Number(typing) => Coerced::ok(coerce_number(typing, raw).map(TypedValue::Number)),
            Self::Duration(typing) => {
                Coerced::ok(coerce_duration(typing, raw).map(TypedValue::Duration))
            }
            Self::String(typing) => {
                if raw.is_empty() || !(typing.allowed.is_empty() || typing.allowed.iter().any(|a| a == raw))
                {
                    return Coerced::ok(self.default_value());
                }
                Coerced::ok(Some(TypedValue::String(raw.to_owned())))
            }
        }
    }
}

fn coerce_boolean(typing: &BooleanTyping, raw: &str) -> Coerced {
    if raw.is_empty() {
        return Coerced::ok(Some(TypedValue::Boolean(typing.default)));
    }
    match raw.to_ascii_lowercase().as_str() {
        "yes" | "on" | "true" => Coerced::ok(Some(TypedValue::Boolean(true))),
        "no" | "off" | "false" => Coerced::ok(Some(TypedValue::Boolean(false))),
        _ => Coerced {
            value: Some(TypedValue::Boolean(typing.default)),
            warning: Some(format!(
                "invalid boolean {raw:?}, using default {}",
                typing.default
            )),
        },
    }
}

fn coerce_number(typing: &NumberTyping, raw: &str) -> Option<f64> {
    let parsed = if NUMBER.is_match(raw) {
        raw.parse::<f64>().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    };
    let mut value = if typing.integer { parsed.round() } else { parsed };
    if let Some(min) = typing.min {
        value = value.max(min);
    }
    if let Some(max) = typing.max {
        value = value.min(max);
    }
    // f64::max/min ignore NaN operands, so check the parsed value too
    if parsed.is_finite() && value.is_finite() {
        Some(value)
    } else {
        typing.default
    }
}

fn coerce_duration(typing: &DurationTyping, raw: &str) -> Option<Duration> {
    let parsed = DURATION.captures(raw).and_then(|caps| {
        let value: f64 = caps["value"].parse().ok()?;
        let factor = match caps.name("unit").map(|unit| unit.as_str()) {
            None | Some("ms") => 1.0,
            Some("s") => 1_000.0,
            Some("m") => 60_000.0,
            Some(_) => return None,
        };
        Some(value * factor)
    });
    match parsed {
        Some(ms) if ms.is_finite() && ms >= 0.0 => {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let ms = ms.round() as u64;
            Some(Duration::from_millis(ms))
        }
        _ => typing.default,
    }
}

/// Modifier schema of a directive, keyed by modifier name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Typings(BTreeMap<String, Typing>);

impl Typings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the typing of a modifier.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, typing: Typing) -> Self {
        self.0.insert(key.into(), typing);
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Typing> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Typing)> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn boolean(default: bool) -> Typing {
        Typing::Boolean(BooleanTyping {
            default,
            enforce: false,
        })
    }

    #[test]
    fn test_boolean_accepted_forms() {
        let typing = boolean(false);
        for raw in ["yes", "ON", "True"] {
            assert_eq!(typing.coerce(Some(raw)).value, Some(TypedValue::Boolean(true)));
        }
        for raw in ["no", "Off", "FALSE"] {
            assert_eq!(typing.coerce(Some(raw)).value, Some(TypedValue::Boolean(false)));
        }
    }

    #[test]
    fn test_boolean_empty_takes_default() {
        let coerced = boolean(false).coerce(Some(""));
        assert_eq!(coerced.value, Some(TypedValue::Boolean(false)));
        assert_eq!(coerced.warning, None);
        assert_eq!(boolean(true).coerce(Some("  ")).value, Some(TypedValue::Boolean(true)));
    }

    #[test]
    fn test_boolean_invalid_uses_default_and_warns() {
        let coerced = boolean(true).coerce(Some("maybe"));
        assert_eq!(coerced.value, Some(TypedValue::Boolean(true)));
        assert!(coerced.warning.unwrap().contains("maybe"));
    }

    #[test]
    fn test_absent_key_needs_enforce() {
        let plain = boolean(true);
        assert_eq!(plain.coerce(None).value, None);

        let enforced = Typing::Boolean(BooleanTyping {
            default: true,
            enforce: true,
        });
        assert_eq!(enforced.coerce(None).value, Some(TypedValue::Boolean(true)));
    }

    #[test]
    fn test_number_clamp_and_round() {
        let typing = Typing::Number(NumberTyping {
            default: Some(5.0),
            min: Some(0.0),
            max: Some(10.0),
            integer: true,
            ..Default::default()
        });
        let value = |raw| typing.coerce(Some(raw)).value;
        assert_eq!(value("-3"), Some(TypedValue::Number(0.0)));
        assert_eq!(value("42"), Some(TypedValue::Number(10.0)));
        assert_eq!(value("+2.6"), Some(TypedValue::Number(3.0)));
        assert_eq!(value(".4"), Some(TypedValue::Number(0.0)));
        assert_eq!(value("abc"), Some(TypedValue::Number(5.0)));
        assert_eq!(value("1e999"), Some(TypedValue::Number(5.0)));
        assert_eq!(value(""), Some(TypedValue::Number(5.0)));
    }

    #[test]
    fn test_number_without_default() {
        let typing = Typing::Number(NumberTyping::default());
        assert_eq!(typing.coerce(Some("1.5")).value, Some(TypedValue::Number(1.5)));
        assert_eq!(typing.coerce(Some("nope")).value, None);
    }

    #[test]
    fn test_duration_units() {
        let typing = Typing::Duration(DurationTyping {
            default: Some(Duration::from_millis(250)),
            enforce: false,
        });
        let value = |raw| typing.coerce(Some(raw)).value.and_then(|v| v.as_duration());
        assert_eq!(value("200"), Some(Duration::from_millis(200)));
        assert_eq!(value("200ms"), Some(Duration::from_millis(200)));
        assert_eq!(value("1.5s"), Some(Duration::from_millis(1500)));
        assert_eq!(value("2m"), Some(Duration::from_secs(120)));
        assert_eq!(value("0.4ms"), Some(Duration::from_millis(0)));
        assert_eq!(value("-1s"), Some(Duration::from_millis(250)));
        assert_eq!(value("3h"), Some(Duration::from_millis(250)));
        assert_eq!(value(""), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_string_allow_list() {
        let typing = Typing::String(StringTyping {
            allowed: vec!["smooth".to_owned(), "instant".to_owned()],
            ..Default::default()
        });
        let value = |raw| typing.coerce(Some(raw)).value;
        assert_eq!(value("instant"), Some(TypedValue::String("instant".to_owned())));
        assert_eq!(value("auto"), Some(TypedValue::String("smooth".to_owned())));

        let with_default = Typing::String(StringTyping {
            default: Some("auto".to_owned()),
            allowed: vec!["smooth".to_owned()],
            enforce: true,
        });
        assert_eq!(
            with_default.coerce(Some("jump")).value,
            Some(TypedValue::String("auto".to_owned()))
        );
        assert_eq!(
            with_default.coerce(None).value,
            Some(TypedValue::String("auto".to_owned()))
        );
    }

    #[test]
    fn test_free_string() {
        let typing = Typing::String(StringTyping::default());
        assert_eq!(
            typing.coerce(Some(" x ")).value,
            Some(TypedValue::String("x".to_owned()))
        );
        assert_eq!(typing.coerce(Some("")).value, None);
    }
}
