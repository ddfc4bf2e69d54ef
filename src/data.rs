//! Scalar values, resolvable type tags, and temporal parsing helpers.
//!
//! A [`Value`] is one cell of an untyped input row: the engines accept rows
//! as ordered slices of these. A [`TypeTag`] is the closed enumeration of
//! types the intuition engines can resolve a column to; tags are compared by
//! variant equality and double as map keys for per-column tallies.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use encoding_rs::{UTF_8, WINDOWS_1252};
use serde::{Deserialize, Serialize};

/// One scalar cell of an input row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Textual form used for pictures, frequency tables, and size tracking.
    /// Nulls render as the empty string.
    pub fn as_display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.is_finite() {
                    format!("{f:.1}")
                } else {
                    f.to_string()
                }
            }
            Value::Text(s) => s.clone(),
            Value::Bytes(bytes) => decode_bytes(bytes),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(Value::as_display).collect();
                format!("[{}]", parts.join(", "))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

/// Closed enumeration of resolvable column types.
///
/// `Geometry` is reserved and never produced by classification; `Object` is
/// the precedence catch-all for values no other test claims.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum TypeTag {
    Null,
    NaN,
    Int,
    Float,
    Date,
    Time,
    DateTime,
    Str,
    Geometry,
    Array,
    Bool,
    Object,
    #[default]
    Unknown,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Null => "null",
            TypeTag::NaN => "nan",
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Date => "date",
            TypeTag::Time => "time",
            TypeTag::DateTime => "datetime",
            TypeTag::Str => "str",
            TypeTag::Geometry => "geo",
            TypeTag::Array => "array",
            TypeTag::Bool => "bool",
            TypeTag::Object => "object",
            TypeTag::Unknown => "unknown",
        }
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, TypeTag::Date | TypeTag::Time | TypeTag::DateTime)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, TypeTag::Int | TypeTag::Float)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decodes raw bytes as UTF-8, falling back to Windows-1252 when the input
/// is not valid UTF-8.
pub fn decode_bytes(bytes: &[u8]) -> String {
    let (text, _, had_errors) = UTF_8.decode(bytes);
    if !had_errors {
        return text.into_owned();
    }
    let (text, _, _) = WINDOWS_1252.decode(bytes);
    text.into_owned()
}

pub fn parse_naive_date(value: &str) -> Option<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

pub fn parse_naive_datetime(value: &str) -> Option<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

pub fn parse_naive_time(value: &str) -> Option<NaiveTime> {
    const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M:%S%.f", "%H:%M"];
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(value, fmt).ok())
}
