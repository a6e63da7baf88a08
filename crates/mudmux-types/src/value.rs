//! Typed setting values.
//!
//! Settings are declared with a [`SettingType`] and stored as the
//! matching [`SettingValue`] variant. Raw text written by a user is
//! coerced through [`SettingValue::parse`]; a value that does not fit
//! the declared type is rejected without touching the store.

use crate::color;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors produced while coercing raw text into a typed value.
#[derive(Debug, Error)]
pub enum ValueError {
    /// The text is not a valid integer.
    #[error("not an integer: {0:?}")]
    BadInt(String),

    /// The text is not a recognized boolean spelling.
    #[error("not a boolean: {0:?} (expected true/false, yes/no, on/off, 1/0)")]
    BadBool(String),

    /// The text is not a valid color-code string.
    #[error("not a color code: {0:?}")]
    BadColor(String),

    /// The text is not a valid duration.
    #[error("not a duration: {0:?} (expected forms like \"30s\", \"5m\", \"1h30m\")")]
    BadDuration(String),

    /// A custom type's validator rejected the text.
    #[error("not a valid {type_name}: {message}")]
    Invalid {
        /// The custom type name.
        type_name: String,
        /// The validator's diagnostic.
        message: String,
    },

    /// A custom type has no registered validator.
    #[error("no validator registered for type {0:?}")]
    NoValidator(String),
}

impl crate::ErrorCode for ValueError {
    fn code(&self) -> &'static str {
        match self {
            Self::BadInt(_) => "VALUE_BAD_INT",
            Self::BadBool(_) => "VALUE_BAD_BOOL",
            Self::BadColor(_) => "VALUE_BAD_COLOR",
            Self::BadDuration(_) => "VALUE_BAD_DURATION",
            Self::Invalid { .. } => "VALUE_INVALID",
            Self::NoValidator(_) => "VALUE_NO_VALIDATOR",
        }
    }

    fn is_recoverable(&self) -> bool {
        true
    }
}

/// The declared type of a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingType {
    /// Free text.
    Str,
    /// Signed integer.
    Int,
    /// Boolean, accepting the usual spellings.
    Bool,
    /// A color-code string validated against the code grammar.
    Color,
    /// A duration like `"30s"`, `"5m"`, `"1h30m"`, stored as seconds.
    Duration,
    /// A plugin-declared type; the settings store coerces it through
    /// the validator registered under this name.
    Custom(&'static str),
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str => f.write_str("str"),
            Self::Int => f.write_str("int"),
            Self::Bool => f.write_str("bool"),
            Self::Color => f.write_str("color"),
            Self::Duration => f.write_str("duration"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

/// A typed setting value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Duration in whole seconds.
    Duration(u64),
    /// Free text or a color-code string.
    Str(String),
}

impl SettingValue {
    /// Coerces raw text into a value of the given type.
    ///
    /// Custom types are not handled here; the settings store routes
    /// them through their registered validator.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError`] if the text does not fit the type.
    pub fn parse(ty: SettingType, raw: &str) -> Result<Self, ValueError> {
        let raw = raw.trim();
        match ty {
            SettingType::Custom(name) => Err(ValueError::NoValidator(name.to_string())),
            SettingType::Str => Ok(Self::Str(raw.to_string())),
            SettingType::Int => raw
                .parse::<i64>()
                .map(Self::Int)
                .map_err(|_| ValueError::BadInt(raw.to_string())),
            SettingType::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(Self::Bool(true)),
                "false" | "no" | "off" | "0" => Ok(Self::Bool(false)),
                _ => Err(ValueError::BadBool(raw.to_string())),
            },
            SettingType::Color => {
                if color::is_valid_code(raw) {
                    Ok(Self::Str(raw.to_string()))
                } else {
                    Err(ValueError::BadColor(raw.to_string()))
                }
            }
            SettingType::Duration => parse_duration(raw).map(Self::Duration),
        }
    }

    /// Returns the value as a boolean, if it is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as an integer, if it is one.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a string slice, if it is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as seconds, if it is a duration.
    #[must_use]
    pub fn as_seconds(&self) -> Option<u64> {
        match self {
            Self::Duration(secs) => Some(*secs),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Duration(secs) => f.write_str(&format_duration(*secs)),
            Self::Str(s) => f.write_str(s),
        }
    }
}

/// Parses a duration string into whole seconds.
///
/// Accepted grammar: a sequence of `<number><unit>` terms where the
/// unit is `d`, `h`, `m`, or `s`; a bare number is seconds.
fn parse_duration(raw: &str) -> Result<u64, ValueError> {
    if raw.is_empty() {
        return Err(ValueError::BadDuration(raw.to_string()));
    }
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(secs);
    }

    let mut total: u64 = 0;
    let mut number = String::new();
    let mut saw_term = false;

    for ch in raw.chars() {
        if ch.is_ascii_digit() {
            number.push(ch);
            continue;
        }
        let mult = match ch.to_ascii_lowercase() {
            'd' => 86_400,
            'h' => 3_600,
            'm' => 60,
            's' => 1,
            _ => return Err(ValueError::BadDuration(raw.to_string())),
        };
        let n: u64 = number
            .parse()
            .map_err(|_| ValueError::BadDuration(raw.to_string()))?;
        total = total.saturating_add(n.saturating_mul(mult));
        number.clear();
        saw_term = true;
    }

    if !number.is_empty() || !saw_term {
        return Err(ValueError::BadDuration(raw.to_string()));
    }
    Ok(total)
}

/// Formats seconds back into the compact duration grammar.
fn format_duration(mut secs: u64) -> String {
    if secs == 0 {
        return "0s".to_string();
    }
    let mut out = String::new();
    for (unit, size) in [("d", 86_400), ("h", 3_600), ("m", 60), ("s", 1)] {
        if secs >= size {
            out.push_str(&format!("{}{unit}", secs / size));
            secs %= size;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_str() {
        let v = SettingValue::parse(SettingType::Str, "  hello ").unwrap();
        assert_eq!(v.as_str(), Some("hello"));
    }

    #[test]
    fn parse_int() {
        let v = SettingValue::parse(SettingType::Int, "-42").unwrap();
        assert_eq!(v.as_int(), Some(-42));
        assert!(SettingValue::parse(SettingType::Int, "forty").is_err());
    }

    #[test]
    fn parse_bool_spellings() {
        for raw in ["true", "YES", "on", "1"] {
            let v = SettingValue::parse(SettingType::Bool, raw).unwrap();
            assert_eq!(v.as_bool(), Some(true), "raw={raw}");
        }
        for raw in ["false", "no", "OFF", "0"] {
            let v = SettingValue::parse(SettingType::Bool, raw).unwrap();
            assert_eq!(v.as_bool(), Some(false), "raw={raw}");
        }
        assert!(SettingValue::parse(SettingType::Bool, "maybe").is_err());
    }

    #[test]
    fn parse_color_validates() {
        assert!(SettingValue::parse(SettingType::Color, "@R").is_ok());
        assert!(SettingValue::parse(SettingType::Color, "@x123").is_ok());
        assert!(SettingValue::parse(SettingType::Color, "plain").is_err());
    }

    #[test]
    fn parse_duration_terms() {
        assert_eq!(
            SettingValue::parse(SettingType::Duration, "30s")
                .unwrap()
                .as_seconds(),
            Some(30)
        );
        assert_eq!(
            SettingValue::parse(SettingType::Duration, "1h30m")
                .unwrap()
                .as_seconds(),
            Some(5400)
        );
        assert_eq!(
            SettingValue::parse(SettingType::Duration, "90")
                .unwrap()
                .as_seconds(),
            Some(90)
        );
        assert!(SettingValue::parse(SettingType::Duration, "5x").is_err());
        assert!(SettingValue::parse(SettingType::Duration, "h").is_err());
    }

    #[test]
    fn duration_displays_compact() {
        assert_eq!(SettingValue::Duration(5400).to_string(), "1h30m");
        assert_eq!(SettingValue::Duration(0).to_string(), "0s");
        assert_eq!(SettingValue::Duration(86_401).to_string(), "1d1s");
    }
}
