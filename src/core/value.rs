//! Database value types
//!
//! This module defines the loosely-typed values a backend cursor hands back for a column,
//! and the destination kinds the generic conversion table converts between.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Database value that can hold different types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DatabaseValue {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Unsigned 8-bit integer
    Byte(u8),
    /// 16-bit integer
    Short(i16),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// 32-bit floating point
    Float(f32),
    /// 64-bit floating point
    Double(f64),
    /// String value
    String(String),
    /// Binary data
    Bytes(Vec<u8>),
    /// Timestamp (Unix timestamp in microseconds, UTC)
    Timestamp(i64),
    /// Exact decimal number
    Decimal(Decimal),
    /// UUID / GUID
    Uuid(uuid::Uuid),
}

/// Destination kinds understood by the generic conversion table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
    Bytes,
    Timestamp,
    Decimal,
    Uuid,
}

impl ValueKind {
    /// Name used in error messages and schema output
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::Byte => "byte",
            ValueKind::Short => "short",
            ValueKind::Int => "int",
            ValueKind::Long => "long",
            ValueKind::Float => "float",
            ValueKind::Double => "double",
            ValueKind::String => "string",
            ValueKind::Bytes => "bytes",
            ValueKind::Timestamp => "timestamp",
            ValueKind::Decimal => "decimal",
            ValueKind::Uuid => "uuid",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl DatabaseValue {
    /// Get the value as a string slice (zero-copy for String values)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DatabaseValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get the value as bytes (zero-copy)
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            DatabaseValue::Bytes(b) => Some(b),
            DatabaseValue::String(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Textual representation of the value
    ///
    /// Returns `None` for null and for binary data, which has no canonical text form.
    pub fn to_text(&self) -> Option<String> {
        match self {
            DatabaseValue::Null | DatabaseValue::Bytes(_) => None,
            DatabaseValue::Bool(v) => Some(v.to_string()),
            DatabaseValue::Byte(v) => Some(v.to_string()),
            DatabaseValue::Short(v) => Some(v.to_string()),
            DatabaseValue::Int(v) => Some(v.to_string()),
            DatabaseValue::Long(v) => Some(v.to_string()),
            DatabaseValue::Float(v) => Some(v.to_string()),
            DatabaseValue::Double(v) => Some(v.to_string()),
            DatabaseValue::String(s) => Some(s.clone()),
            DatabaseValue::Timestamp(v) => {
                DateTime::<Utc>::from_timestamp_micros(*v).map(|dt| dt.to_rfc3339())
            }
            DatabaseValue::Decimal(v) => Some(v.to_string()),
            DatabaseValue::Uuid(v) => Some(v.hyphenated().to_string()),
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Kind of the stored value, `None` for null
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            DatabaseValue::Null => None,
            DatabaseValue::Bool(_) => Some(ValueKind::Bool),
            DatabaseValue::Byte(_) => Some(ValueKind::Byte),
            DatabaseValue::Short(_) => Some(ValueKind::Short),
            DatabaseValue::Int(_) => Some(ValueKind::Int),
            DatabaseValue::Long(_) => Some(ValueKind::Long),
            DatabaseValue::Float(_) => Some(ValueKind::Float),
            DatabaseValue::Double(_) => Some(ValueKind::Double),
            DatabaseValue::String(_) => Some(ValueKind::String),
            DatabaseValue::Bytes(_) => Some(ValueKind::Bytes),
            DatabaseValue::Timestamp(_) => Some(ValueKind::Timestamp),
            DatabaseValue::Decimal(_) => Some(ValueKind::Decimal),
            DatabaseValue::Uuid(_) => Some(ValueKind::Uuid),
        }
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        self.kind().map(|kind| kind.name()).unwrap_or("null")
    }
}

impl From<bool> for DatabaseValue {
    fn from(v: bool) -> Self {
        DatabaseValue::Bool(v)
    }
}

impl From<u8> for DatabaseValue {
    fn from(v: u8) -> Self {
        DatabaseValue::Byte(v)
    }
}

impl From<i16> for DatabaseValue {
    fn from(v: i16) -> Self {
        DatabaseValue::Short(v)
    }
}

impl From<i32> for DatabaseValue {
    fn from(v: i32) -> Self {
        DatabaseValue::Int(v)
    }
}

impl From<i64> for DatabaseValue {
    fn from(v: i64) -> Self {
        DatabaseValue::Long(v)
    }
}

impl From<f32> for DatabaseValue {
    fn from(v: f32) -> Self {
        DatabaseValue::Float(v)
    }
}

impl From<f64> for DatabaseValue {
    fn from(v: f64) -> Self {
        DatabaseValue::Double(v)
    }
}

impl From<String> for DatabaseValue {
    fn from(v: String) -> Self {
        DatabaseValue::String(v)
    }
}

impl From<&str> for DatabaseValue {
    fn from(v: &str) -> Self {
        DatabaseValue::String(v.to_string())
    }
}

impl From<Vec<u8>> for DatabaseValue {
    fn from(v: Vec<u8>) -> Self {
        DatabaseValue::Bytes(v)
    }
}

impl From<DateTime<Utc>> for DatabaseValue {
    fn from(v: DateTime<Utc>) -> Self {
        DatabaseValue::Timestamp(v.timestamp_micros())
    }
}

impl From<Decimal> for DatabaseValue {
    fn from(v: Decimal) -> Self {
        DatabaseValue::Decimal(v)
    }
}

impl From<uuid::Uuid> for DatabaseValue {
    fn from(v: uuid::Uuid) -> Self {
        DatabaseValue::Uuid(v)
    }
}

impl<T: Into<DatabaseValue>> From<Option<T>> for DatabaseValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => DatabaseValue::Null,
        }
    }
}
