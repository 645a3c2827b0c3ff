//! The builtin function registry.
//!
//! The set is closed: templates cannot define functions, and a call to any
//! other name is [`EvalError::UnknownFunction`]. Arguments are never coerced;
//! a wrong type or count is [`EvalError::ArgumentType`].

use std::fmt::Write as _;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use hrml_types::Value;

use crate::error::{EvalError, EvalResult};

/// Format used by `date()` when none is given.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Every builtin function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Len,
    Upper,
    Lower,
    Trim,
    Split,
    Join,
    Default,
    Date,
    Json,
    Escape,
    Safe,
}

impl Builtin {
    pub const ALL: &'static [Builtin] = &[
        Self::Len,
        Self::Upper,
        Self::Lower,
        Self::Trim,
        Self::Split,
        Self::Join,
        Self::Default,
        Self::Date,
        Self::Json,
        Self::Escape,
        Self::Safe,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|b| b.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Len => "len",
            Self::Upper => "upper",
            Self::Lower => "lower",
            Self::Trim => "trim",
            Self::Split => "split",
            Self::Join => "join",
            Self::Default => "default",
            Self::Date => "date",
            Self::Json => "json",
            Self::Escape => "escape",
            Self::Safe => "safe",
        }
    }

    /// Accepted argument counts (inclusive).
    fn arity(self) -> (usize, usize) {
        match self {
            Self::Split | Self::Join | Self::Default => (2, 2),
            Self::Date => (1, 2),
            _ => (1, 1),
        }
    }

    /// Invoke the builtin with already-evaluated arguments.
    pub fn call(self, args: Vec<Value>) -> EvalResult<Value> {
        let (min, max) = self.arity();
        if args.len() < min || args.len() > max {
            let expected = if min == max {
                format!("{min}")
            } else {
                format!("{min} to {max}")
            };
            return Err(self.arg_error(format!(
                "expected {expected} argument{}, got {}",
                if max == 1 { "" } else { "s" },
                args.len()
            )));
        }

        let mut args = args.into_iter();
        let first = args.next().unwrap_or_default();
        let second = args.next();

        match self {
            Self::Len => match &first {
                Value::String(s) | Value::Safe(s) => Ok(Value::Number(s.chars().count() as f64)),
                Value::List(items) => Ok(Value::Number(items.len() as f64)),
                Value::Map(fields) => Ok(Value::Number(fields.len() as f64)),
                other => Err(self.expected("a string, list or map", other)),
            },
            Self::Upper => self.map_text(first, |s| s.to_uppercase()),
            Self::Lower => self.map_text(first, |s| s.to_lowercase()),
            Self::Trim => self.map_text(first, |s| s.trim().to_string()),
            Self::Split => {
                let text = self.string_arg(&first)?;
                let sep = self.string_arg(&second.unwrap_or_default())?.to_string();
                let parts: Vec<Value> = if sep.is_empty() {
                    text.chars().map(|c| Value::String(c.to_string())).collect()
                } else {
                    text.split(sep.as_str()).map(Value::from).collect()
                };
                Ok(Value::List(parts))
            }
            Self::Join => {
                let Value::List(items) = &first else {
                    return Err(self.expected("a list", &first));
                };
                let sep = self.string_arg(&second.unwrap_or_default())?.to_string();
                let joined = items
                    .iter()
                    .map(Value::to_display_string)
                    .collect::<Vec<_>>()
                    .join(&sep);
                Ok(Value::String(joined))
            }
            Self::Default => {
                let empty = first.is_null() || first.as_str() == Some("");
                Ok(if empty { second.unwrap_or_default() } else { first })
            }
            Self::Date => self.format_date(&first, second.as_ref()),
            Self::Json => Ok(Value::String(first.to_json_string())),
            Self::Escape => Ok(Value::Safe(escape_html(&first.to_display_string()))),
            Self::Safe => Ok(match first {
                Value::Safe(s) | Value::String(s) => Value::Safe(s),
                other => Value::Safe(other.to_display_string()),
            }),
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    fn arg_error(self, message: impl Into<String>) -> EvalError {
        EvalError::ArgumentType {
            function: self.name().to_string(),
            message: message.into(),
        }
    }

    fn expected(self, what: &str, got: &Value) -> EvalError {
        self.arg_error(format!("expected {what}, got {}", got.type_name()))
    }

    fn string_arg(self, value: &Value) -> EvalResult<&str> {
        value.as_str().ok_or_else(|| self.expected("a string", value))
    }

    /// Apply a text transform, keeping a pre-escaped tag if present.
    fn map_text(self, value: Value, f: impl Fn(&str) -> String) -> EvalResult<Value> {
        match value {
            Value::String(s) => Ok(Value::String(f(&s))),
            Value::Safe(s) => Ok(Value::Safe(f(&s))),
            other => Err(self.expected("a string", &other)),
        }
    }

    fn format_date(self, value: &Value, format: Option<&Value>) -> EvalResult<Value> {
        let format = match format {
            Some(f) => self.string_arg(f)?,
            None => DEFAULT_DATE_FORMAT,
        };
        let moment = match value {
            Value::Number(secs) => DateTime::<Utc>::from_timestamp(secs.floor() as i64, 0)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| self.arg_error(format!("timestamp {secs} is out of range")))?,
            Value::String(s) | Value::Safe(s) => parse_date(s.trim())
                .ok_or_else(|| self.arg_error(format!("'{s}' is not an RFC 3339 or YYYY-MM-DD date")))?,
            other => return Err(self.expected("a timestamp or date string", other)),
        };
        let mut out = String::new();
        write!(out, "{}", moment.format(format))
            .map_err(|_| self.arg_error(format!("invalid date format '{format}'")))?;
        Ok(Value::String(out))
    }
}

fn parse_date(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Call the builtin named `name`.
pub fn call_builtin(name: &str, args: Vec<Value>) -> EvalResult<Value> {
    let builtin =
        Builtin::from_name(name).ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;
    builtin.call(args)
}

/// HTML-escape text for element content and quoted attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}
