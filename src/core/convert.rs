//! Generic value conversion table
//!
//! Converts a [`DatabaseValue`] into another [`ValueKind`] through an explicit
//! source × destination table. Pairs missing from the table fail with
//! [`DatabaseError::InvalidCast`] instead of guessing.

use super::error::{DatabaseError, Result};
use super::value::{DatabaseValue, ValueKind};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

/// Convert `value` into the representation of `to`
///
/// Numeric narrowing is range checked, floating point values round half to even
/// before becoming integers, and text is trimmed before it is parsed.
pub fn change_type(value: &DatabaseValue, to: ValueKind) -> Result<DatabaseValue> {
    let converted = match to {
        ValueKind::Bool => to_bool(value).map(DatabaseValue::Bool),
        ValueKind::Byte => to_integer(value)
            .and_then(|v| u8::try_from(v).ok())
            .map(DatabaseValue::Byte),
        ValueKind::Short => to_integer(value)
            .and_then(|v| i16::try_from(v).ok())
            .map(DatabaseValue::Short),
        ValueKind::Int => to_integer(value)
            .and_then(|v| i32::try_from(v).ok())
            .map(DatabaseValue::Int),
        ValueKind::Long => match value {
            DatabaseValue::Timestamp(v) => Some(DatabaseValue::Long(*v)),
            other => to_integer(other).map(DatabaseValue::Long),
        },
        ValueKind::Float => to_double(value).map(|v| DatabaseValue::Float(v as f32)),
        ValueKind::Double => match value {
            // widen through the decimal text so 0.1f32 stays 0.1
            DatabaseValue::Float(v) => v.to_string().parse().ok().map(DatabaseValue::Double),
            other => to_double(other).map(DatabaseValue::Double),
        },
        ValueKind::String => match value {
            DatabaseValue::Bytes(b) => String::from_utf8(b.clone()).ok().map(DatabaseValue::String),
            other => other.to_text().map(DatabaseValue::String),
        },
        ValueKind::Bytes => match value {
            DatabaseValue::Bytes(b) => Some(DatabaseValue::Bytes(b.clone())),
            DatabaseValue::String(s) => Some(DatabaseValue::Bytes(s.as_bytes().to_vec())),
            DatabaseValue::Uuid(u) => Some(DatabaseValue::Bytes(u.as_bytes().to_vec())),
            _ => None,
        },
        ValueKind::Timestamp => to_timestamp(value).map(DatabaseValue::Timestamp),
        ValueKind::Decimal => to_decimal(value).map(DatabaseValue::Decimal),
        ValueKind::Uuid => to_uuid(value).map(DatabaseValue::Uuid),
    };

    converted.ok_or_else(|| DatabaseError::invalid_cast(value.type_name(), to.name()))
}

fn to_bool(value: &DatabaseValue) -> Option<bool> {
    match value {
        DatabaseValue::Bool(v) => Some(*v),
        DatabaseValue::Byte(v) => Some(*v != 0),
        DatabaseValue::Short(v) => Some(*v != 0),
        DatabaseValue::Int(v) => Some(*v != 0),
        DatabaseValue::Long(v) => Some(*v != 0),
        DatabaseValue::Float(v) => Some(*v != 0.0),
        DatabaseValue::Double(v) => Some(*v != 0.0),
        DatabaseValue::String(s) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("true") {
                Some(true)
            } else if s.eq_ignore_ascii_case("false") {
                Some(false)
            } else {
                None
            }
        }
        DatabaseValue::Decimal(v) => Some(!v.is_zero()),
        DatabaseValue::Null
        | DatabaseValue::Bytes(_)
        | DatabaseValue::Timestamp(_)
        | DatabaseValue::Uuid(_) => None,
    }
}

fn to_integer(value: &DatabaseValue) -> Option<i64> {
    match value {
        DatabaseValue::Bool(v) => Some(i64::from(*v)),
        DatabaseValue::Byte(v) => Some(i64::from(*v)),
        DatabaseValue::Short(v) => Some(i64::from(*v)),
        DatabaseValue::Int(v) => Some(i64::from(*v)),
        DatabaseValue::Long(v) => Some(*v),
        DatabaseValue::Float(v) => round_to_integer(f64::from(*v)),
        DatabaseValue::Double(v) => round_to_integer(*v),
        DatabaseValue::String(s) => s.trim().parse().ok(),
        DatabaseValue::Decimal(v) => v
            .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
            .to_i64(),
        DatabaseValue::Null
        | DatabaseValue::Bytes(_)
        | DatabaseValue::Timestamp(_)
        | DatabaseValue::Uuid(_) => None,
    }
}

fn round_to_integer(v: f64) -> Option<i64> {
    let rounded = v.round_ties_even();
    // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound
    if rounded.is_finite() && rounded >= i64::MIN as f64 && rounded < i64::MAX as f64 {
        Some(rounded as i64)
    } else {
        None
    }
}

fn to_double(value: &DatabaseValue) -> Option<f64> {
    match value {
        DatabaseValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
        DatabaseValue::Byte(v) => Some(f64::from(*v)),
        DatabaseValue::Short(v) => Some(f64::from(*v)),
        DatabaseValue::Int(v) => Some(f64::from(*v)),
        DatabaseValue::Long(v) => Some(*v as f64),
        DatabaseValue::Float(v) => Some(f64::from(*v)),
        DatabaseValue::Double(v) => Some(*v),
        DatabaseValue::String(s) => s.trim().parse().ok(),
        DatabaseValue::Decimal(v) => v.to_f64(),
        DatabaseValue::Null
        | DatabaseValue::Bytes(_)
        | DatabaseValue::Timestamp(_)
        | DatabaseValue::Uuid(_) => None,
    }
}

fn to_decimal(value: &DatabaseValue) -> Option<Decimal> {
    match value {
        DatabaseValue::Decimal(v) => Some(*v),
        DatabaseValue::Bool(v) => Some(Decimal::from(u8::from(*v))),
        DatabaseValue::Byte(v) => Some(Decimal::from(*v)),
        DatabaseValue::Short(v) => Some(Decimal::from(*v)),
        DatabaseValue::Int(v) => Some(Decimal::from(*v)),
        DatabaseValue::Long(v) => Some(Decimal::from(*v)),
        // through the shortest decimal text so 0.1 stays 0.1
        DatabaseValue::Float(v) => v.to_string().parse().ok(),
        DatabaseValue::Double(v) => v.to_string().parse().ok(),
        DatabaseValue::String(s) => {
            let s = s.trim();
            s.parse().ok().or_else(|| Decimal::from_scientific(s).ok())
        }
        DatabaseValue::Null
        | DatabaseValue::Bytes(_)
        | DatabaseValue::Timestamp(_)
        | DatabaseValue::Uuid(_) => None,
    }
}

fn to_uuid(value: &DatabaseValue) -> Option<Uuid> {
    match value {
        DatabaseValue::Uuid(v) => Some(*v),
        DatabaseValue::String(s) => Uuid::parse_str(s.trim()).ok(),
        DatabaseValue::Bytes(b) => Uuid::from_slice(b).ok(),
        _ => None,
    }
}

fn to_timestamp(value: &DatabaseValue) -> Option<i64> {
    match value {
        DatabaseValue::Timestamp(v) | DatabaseValue::Long(v) => Some(*v),
        DatabaseValue::Int(v) => Some(i64::from(*v)),
        DatabaseValue::String(s) => parse_timestamp(s.trim()),
        _ => None,
    }
}

/// Parse RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]` (UTC) or `YYYY-MM-DD` into microseconds
fn parse_timestamp(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_micros());
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc().timestamp_micros());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_micros())
}

/// Microseconds since the Unix epoch as a UTC date-time
pub(crate) fn timestamp_to_datetime(micros: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_micros(micros)
}
