//! Runtime values for template evaluation.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// A structured value bound in a variable environment.
///
/// [`Value::Safe`] is a string tagged as already HTML-escaped: the renderer
/// emits it verbatim instead of escaping it again.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Safe(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Human-readable type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) | Self::Safe(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_safe(&self) -> bool {
        matches!(self, Self::Safe(_))
    }

    /// Truthiness: null, `""`, `0`, `false` and `[]` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0,
            Self::String(s) | Self::Safe(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Map(_) => true,
        }
    }

    /// The text of a string value, tagged or not.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Safe(s) => Some(s),
            _ => None,
        }
    }

    /// Look up one path segment: a map key, or a numeric index into a list.
    ///
    /// Anything that does not resolve yields `None`; callers map that to null.
    pub fn member(&self, segment: &str) -> Option<&Value> {
        match self {
            Self::Map(fields) => fields.get(segment),
            Self::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Text used when a value is written into output.
    ///
    /// Null renders as the empty string; integral numbers drop the
    /// fractional part; lists and maps render as compact JSON.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::String(s) | Self::Safe(s) => s.clone(),
            Self::List(_) | Self::Map(_) => self.to_json_string(),
        }
    }

    /// Compact JSON serialization.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "null".to_string())
    }

    /// Parse captured text into a structured value, if it is exactly one.
    ///
    /// JSON arrays and objects always qualify; numbers and booleans only when
    /// their canonical display reproduces the text byte for byte.
    pub fn from_captured_text(text: &str) -> Option<Value> {
        let parsed: serde_json::Value = serde_json::from_str(text).ok()?;
        let value = Value::from(parsed);
        match &value {
            Value::List(_) | Value::Map(_) if text.trim() == text => Some(value),
            Value::Number(_) | Value::Bool(_) if value.to_display_string() == text => {
                Some(value)
            }
            _ => None,
        }
    }
}

/// Format a number the way templates display it.
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl PartialEq for Value {
    /// Structural equality. Tagged and untagged strings compare by text.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (a, b) => match (a.as_str(), b.as_str()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                serializer.serialize_i64(*n as i64)
            }
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::String(s) | Self::Safe(s) => serializer.serialize_str(s),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(fields) => Self::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Self::Map(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(Value::Number(-1.5).is_truthy());
        assert!(Value::Map(BTreeMap::new()).is_truthy());
    }

    #[test]
    fn test_display_numbers() {
        assert_eq!(Value::Number(5.0).to_display_string(), "5");
        assert_eq!(Value::Number(-2.0).to_display_string(), "-2");
        assert_eq!(Value::Number(2.5).to_display_string(), "2.5");
    }

    #[test]
    fn test_display_compound_as_json() {
        let v = Value::from(json!({"b": [1, 2], "a": "x"}));
        assert_eq!(v.to_display_string(), r#"{"a":"x","b":[1,2]}"#);
    }

    #[test]
    fn test_safe_equals_string() {
        assert_eq!(Value::Safe("a".into()), Value::from("a"));
        assert_ne!(Value::from("1"), Value::Number(1.0));
    }

    #[test]
    fn test_member_lookup() {
        let v = Value::from(json!({"items": [10, 20]}));
        let items = v.member("items").unwrap();
        assert_eq!(items.member("1"), Some(&Value::Number(20.0)));
        assert_eq!(items.member("7"), None);
        assert_eq!(items.member("x"), None);
        assert_eq!(Value::Null.member("a"), None);
    }

    #[test]
    fn test_captured_text_structures() {
        assert_eq!(
            Value::from_captured_text("[1,2]"),
            Some(Value::List(vec![Value::Number(1.0), Value::Number(2.0)]))
        );
        assert_eq!(Value::from_captured_text("5"), Some(Value::Number(5.0)));
        assert_eq!(Value::from_captured_text("true"), Some(Value::Bool(true)));
    }

    #[test]
    fn test_captured_text_keeps_non_canonical_scalars_as_text() {
        assert_eq!(Value::from_captured_text(" 5 "), None);
        assert_eq!(Value::from_captured_text("5.0"), None);
        assert_eq!(Value::from_captured_text("1e3"), None);
        assert_eq!(Value::from_captured_text("\"quoted\""), None);
        assert_eq!(Value::from_captured_text("null"), None);
        assert_eq!(Value::from_captured_text("Alice"), None);
    }
}
