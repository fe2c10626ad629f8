// SPDX-License-Identifier: MIT

//! Value and domain types shared by the stores, sections and list bindings.

use std::{collections::HashMap, path::PathBuf};

use chrono::{DateTime, Utc};

use crate::core::error::PrefError;

/// Seconds between the UNIX epoch and the Apple reference date (2001-01-01).
pub(crate) const APPLE_EPOCH_UNIX: i64 = 978_307_200;

/// Preferences domain (user, global or a plist file).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Domain {
    /// A user domain, e.g., "com.example.app"
    User(String),
    /// The global preferences domain / NSGlobalDomain (".GlobalPreferences")
    Global,
    /// A direct path to a plist file
    Path(PathBuf),
}

impl Domain {
    /// Parses a domain argument the way `defaults(1)` does.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "-g" | "NSGlobalDomain" => Domain::Global,
            other if other.ends_with(".plist") || other.contains('/') => {
                Domain::Path(PathBuf::from(other))
            }
            other => Domain::User(other.to_string()),
        }
    }

    /// Returns the plist file backing this domain when CoreFoundation is not used.
    pub fn get_path(&self) -> Result<PathBuf, PrefError> {
        let dir = || {
            dirs::preference_dir()
                .ok_or_else(|| PrefError::Backend("no preferences directory on this platform".into()))
        };
        match self {
            Domain::Global => Ok(dir()?.join(".GlobalPreferences.plist")),
            Domain::User(name) => Ok(dir()?.join(format!("{name}.plist"))),
            Domain::Path(path) => Ok(path.clone()),
        }
    }

    /// Returns the CoreFoundation name for a given domain.
    ///
    /// Path domains have no CoreFoundation name.
    pub fn get_cf_name(&self) -> Option<String> {
        match self {
            Domain::Global => Some(String::from(".GlobalPreferences")),
            Domain::User(name) => Some(name.clone()),
            Domain::Path(_) => None,
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Domain::User(s) => write!(f, "{s}"),
            Domain::Global => write!(f, "NSGlobalDomain"),
            Domain::Path(p) => write!(f, "{}", p.display()),
        }
    }
}

/// Value stored in preferences.
#[derive(Debug, Clone, PartialEq)]
pub enum PrefValue {
    String(String),
    Integer(i64),
    /// An integer above `i64::MAX`, as binary plists can hold.
    Unsigned(u64),
    Float(f64),
    Boolean(bool),
    Array(Vec<PrefValue>),
    Dictionary(HashMap<String, PrefValue>),
    Data(Vec<u8>),
    /// Seconds since the Apple reference date (CFAbsoluteTime).
    Date(f64),
    /// Object reference from an `NSKeyedArchiver` plist.
    Uid(u64),
}

/// The kind of a [`PrefValue`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Integer,
    Float,
    Boolean,
    Array,
    Dictionary,
    Data,
    Date,
    Uid,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Boolean => "boolean",
            ValueKind::Array => "array",
            ValueKind::Dictionary => "dictionary",
            ValueKind::Data => "data",
            ValueKind::Date => "date",
            ValueKind::Uid => "uid",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Default for PrefValue {
    fn default() -> Self {
        PrefValue::String(String::default())
    }
}

impl std::fmt::Display for PrefValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrefValue::Boolean(b) => write!(f, "{b}"),
            PrefValue::Integer(i) => write!(f, "{i}"),
            PrefValue::Unsigned(u) => write!(f, "{u}"),
            PrefValue::Float(fl) => write!(f, "{fl}"),
            PrefValue::String(s) => write!(f, "{s}"),
            PrefValue::Array(arr) => {
                write!(
                    f,
                    "[{}]",
                    arr.iter()
                        .map(|v| v.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }
            PrefValue::Dictionary(dict) => {
                let mut entries: Vec<_> = dict.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                write!(
                    f,
                    "{{{}}}",
                    entries
                        .iter()
                        .map(|(k, v)| format!("{k}: {v}"))
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }
            PrefValue::Data(data) => write!(f, "<Data: {} bytes>", data.len()),
            PrefValue::Date(dt) => match date_from_absolute(*dt) {
                Some(date) => write!(f, "{}", date.format("%Y-%m-%d %H:%M:%S %z")),
                None => write!(f, "<Date: {dt}>"),
            },
            PrefValue::Uid(uid) => write!(f, "<Uid: {uid}>"),
        }
    }
}

/// Converts a CFAbsoluteTime into a UTC timestamp.
pub(crate) fn date_from_absolute(secs: f64) -> Option<DateTime<Utc>> {
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9) as u32;
    DateTime::from_timestamp(APPLE_EPOCH_UNIX + whole as i64, nanos)
}

impl PrefValue {
    /// Returns the kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            PrefValue::String(_) => ValueKind::String,
            PrefValue::Integer(_) | PrefValue::Unsigned(_) => ValueKind::Integer,
            PrefValue::Float(_) => ValueKind::Float,
            PrefValue::Boolean(_) => ValueKind::Boolean,
            PrefValue::Array(_) => ValueKind::Array,
            PrefValue::Dictionary(_) => ValueKind::Dictionary,
            PrefValue::Data(_) => ValueKind::Data,
            PrefValue::Date(_) => ValueKind::Date,
            PrefValue::Uid(_) => ValueKind::Uid,
        }
    }

    /// Returns the name of the type for the PrefValue instance.
    pub fn get_type(&self) -> &'static str {
        self.kind().name()
    }

    /// Whether the value is a scalar (anything but an array or dictionary).
    pub fn is_scalar(&self) -> bool {
        !matches!(self, PrefValue::Array(_) | PrefValue::Dictionary(_))
    }

    /// Parses a command-line value given a `defaults(1)`-style type flag.
    pub fn from_flag(flag: &str, raw: &str) -> Result<Self, PrefError> {
        let invalid = || PrefError::InvalidValue {
            kind: flag.to_string(),
            raw: raw.to_string(),
        };
        match flag {
            "string" => Ok(PrefValue::String(raw.to_string())),
            "int" => raw.parse().map(PrefValue::Integer).map_err(|_| invalid()),
            "float" => raw.parse().map(PrefValue::Float).map_err(|_| invalid()),
            "bool" => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(PrefValue::Boolean(true)),
                "false" | "no" | "0" => Ok(PrefValue::Boolean(false)),
                _ => Err(invalid()),
            },
            _ => Err(invalid()),
        }
    }
}

impl From<String> for PrefValue {
    fn from(value: String) -> Self {
        PrefValue::String(value)
    }
}

impl From<&str> for PrefValue {
    fn from(value: &str) -> Self {
        PrefValue::String(value.to_string())
    }
}

impl From<i64> for PrefValue {
    fn from(value: i64) -> Self {
        PrefValue::Integer(value)
    }
}

impl From<i32> for PrefValue {
    fn from(value: i32) -> Self {
        PrefValue::Integer(value.into())
    }
}

impl From<f64> for PrefValue {
    fn from(value: f64) -> Self {
        PrefValue::Float(value)
    }
}

impl From<bool> for PrefValue {
    fn from(value: bool) -> Self {
        PrefValue::Boolean(value)
    }
}

impl<T: Into<PrefValue>> From<Vec<T>> for PrefValue {
    fn from(value: Vec<T>) -> Self {
        PrefValue::Array(value.into_iter().map(Into::into).collect())
    }
}

fn mismatch(expected: ValueKind, got: &PrefValue) -> PrefError {
    PrefError::TypeMismatch {
        expected,
        got: got.kind(),
    }
}

impl TryFrom<PrefValue> for String {
    type Error = PrefError;

    fn try_from(value: PrefValue) -> Result<Self, Self::Error> {
        match value {
            PrefValue::String(s) => Ok(s),
            other => Err(mismatch(ValueKind::String, &other)),
        }
    }
}

impl TryFrom<PrefValue> for i64 {
    type Error = PrefError;

    fn try_from(value: PrefValue) -> Result<Self, Self::Error> {
        match value {
            PrefValue::Integer(i) => Ok(i),
            PrefValue::Unsigned(u) => i64::try_from(u).map_err(|_| PrefError::InvalidValue {
                kind: "i64".into(),
                raw: u.to_string(),
            }),
            other => Err(mismatch(ValueKind::Integer, &other)),
        }
    }
}

impl TryFrom<PrefValue> for f64 {
    type Error = PrefError;

    fn try_from(value: PrefValue) -> Result<Self, Self::Error> {
        match value {
            PrefValue::Float(f) => Ok(f),
            // user defaults hand back whole floats as integers
            PrefValue::Integer(i) => Ok(i as f64),
            PrefValue::Unsigned(u) => Ok(u as f64),
            other => Err(mismatch(ValueKind::Float, &other)),
        }
    }
}

impl TryFrom<PrefValue> for bool {
    type Error = PrefError;

    fn try_from(value: PrefValue) -> Result<Self, Self::Error> {
        match value {
            PrefValue::Boolean(b) => Ok(b),
            PrefValue::Integer(i) => Ok(i != 0),
            PrefValue::Unsigned(u) => Ok(u != 0),
            other => Err(mismatch(ValueKind::Boolean, &other)),
        }
    }
}

impl TryFrom<PrefValue> for Vec<String> {
    type Error = PrefError;

    fn try_from(value: PrefValue) -> Result<Self, Self::Error> {
        match value {
            PrefValue::Array(items) => items.into_iter().map(String::try_from).collect(),
            other => Err(mismatch(ValueKind::Array, &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_parse_recognizes_global_and_paths() {
        assert_eq!(Domain::parse("-g"), Domain::Global);
        assert_eq!(Domain::parse("NSGlobalDomain"), Domain::Global);
        assert_eq!(
            Domain::parse("/tmp/prefs.plist"),
            Domain::Path(PathBuf::from("/tmp/prefs.plist"))
        );
        assert_eq!(
            Domain::parse("com.example.app"),
            Domain::User("com.example.app".into())
        );
        assert_eq!(Domain::Path("x.plist".into()).get_cf_name(), None);
    }

    #[test]
    fn scalar_conversions_report_mismatched_kinds() {
        assert_eq!(bool::try_from(PrefValue::Integer(1)).ok(), Some(true));
        assert_eq!(f64::try_from(PrefValue::Integer(3)).ok(), Some(3.0));
        assert!(matches!(
            String::try_from(PrefValue::Boolean(true)),
            Err(PrefError::TypeMismatch {
                expected: ValueKind::String,
                got: ValueKind::Boolean,
            })
        ));
        let list = PrefValue::from(vec!["a", "b"]);
        assert_eq!(
            Vec::<String>::try_from(list).ok(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn from_flag_parses_defaults_style_booleans() {
        assert_eq!(
            PrefValue::from_flag("bool", "YES").ok(),
            Some(PrefValue::Boolean(true))
        );
        assert_eq!(
            PrefValue::from_flag("int", "42").ok(),
            Some(PrefValue::Integer(42))
        );
        assert!(PrefValue::from_flag("int", "forty-two").is_err());
    }

    #[test]
    fn dates_render_relative_to_the_apple_epoch() {
        assert_eq!(PrefValue::Date(0.0).to_string(), "2001-01-01 00:00:00 +0000");
    }

    #[test]
    fn unsigned_integers_only_narrow_when_they_fit() {
        assert_eq!(PrefValue::Unsigned(u64::MAX).kind(), ValueKind::Integer);
        assert_eq!(i64::try_from(PrefValue::Unsigned(9)).ok(), Some(9));
        assert!(matches!(
            i64::try_from(PrefValue::Unsigned(u64::MAX)),
            Err(PrefError::InvalidValue { .. })
        ));
        assert_eq!(PrefValue::Uid(7).to_string(), "<Uid: 7>");
    }
}
