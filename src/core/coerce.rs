//! Typed coercion of raw database values
//!
//! [`Coercer::cast`] turns a [`DatabaseValue`] into a caller-requested Rust type. The
//! order of the steps matters and is fixed:
//!
//! 1. resolve the handler key (`Option<T>` shares the key of `T`);
//! 2. run the registered handler, if any;
//! 3. return the handler output directly when it already has the requested shape;
//! 4. for enumerations, reinterpret the value as the enum's ordinal;
//! 5. a null input becomes `None` for `Option<T>` and fails otherwise;
//! 6. fall back to the generic conversion table in [`convert`](super::convert).

use super::convert::{change_type, timestamp_to_datetime};
use super::error::{DatabaseError, Result};
use super::registry::{CoercionRegistry, Handler, TypeKey};
use super::value::{DatabaseValue, ValueKind};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// A destination type for [`Coercer::cast`]
pub trait FromValue: Sized + Send + 'static {
    /// Key used for handler lookup
    fn type_key() -> TypeKey {
        TypeKey::of::<Self>()
    }

    /// Target of the generic conversion table, `None` when the table has no entry
    fn kind() -> Option<ValueKind>;

    /// Take the value as-is when its runtime shape already is `Self`
    fn from_exact(value: DatabaseValue) -> std::result::Result<Self, DatabaseValue>;

    /// Value produced for a null input, `None` when `Self` cannot represent null
    fn from_null() -> Option<Self> {
        None
    }

    /// Ordinal reinterpretation for enumerations
    ///
    /// Non-enum types return `None`. Enums return `None` only for null so the
    /// null rule still applies to them.
    fn from_enum(_value: &DatabaseValue) -> Option<Result<Self>> {
        None
    }

    /// Generic conversion through the conversion table
    fn from_converted(value: &DatabaseValue) -> Result<Self> {
        let target = Self::kind().ok_or_else(|| {
            DatabaseError::invalid_cast(value.type_name(), std::any::type_name::<Self>())
        })?;
        let converted = change_type(value, target)?;
        Self::from_exact(converted).map_err(|other| {
            DatabaseError::invalid_cast(other.type_name(), std::any::type_name::<Self>())
        })
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl FromValue for $ty {
                fn kind() -> Option<ValueKind> {
                    Some(ValueKind::$variant)
                }

                fn from_exact(value: DatabaseValue) -> std::result::Result<Self, DatabaseValue> {
                    match value {
                        DatabaseValue::$variant(v) => Ok(v),
                        other => Err(other),
                    }
                }
            }
        )+
    };
}

impl_from_value!(
    bool => Bool,
    u8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    String => String,
    Vec<u8> => Bytes,
    Decimal => Decimal,
    Uuid => Uuid,
);

impl FromValue for DateTime<Utc> {
    fn kind() -> Option<ValueKind> {
        Some(ValueKind::Timestamp)
    }

    fn from_exact(value: DatabaseValue) -> std::result::Result<Self, DatabaseValue> {
        match value {
            DatabaseValue::Timestamp(micros) => {
                timestamp_to_datetime(micros).ok_or(DatabaseValue::Timestamp(micros))
            }
            other => Err(other),
        }
    }
}

impl FromValue for DatabaseValue {
    fn kind() -> Option<ValueKind> {
        None
    }

    fn from_exact(value: DatabaseValue) -> std::result::Result<Self, DatabaseValue> {
        Ok(value)
    }

    fn from_null() -> Option<Self> {
        Some(DatabaseValue::Null)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn type_key() -> TypeKey {
        T::type_key()
    }

    fn kind() -> Option<ValueKind> {
        T::kind()
    }

    fn from_exact(value: DatabaseValue) -> std::result::Result<Self, DatabaseValue> {
        T::from_exact(value).map(Some)
    }

    fn from_null() -> Option<Self> {
        Some(None)
    }

    fn from_enum(value: &DatabaseValue) -> Option<Result<Self>> {
        T::from_enum(value).map(|result| result.map(Some))
    }

    fn from_converted(value: &DatabaseValue) -> Result<Self> {
        T::from_converted(value).map(Some)
    }
}

/// Enumerations decoded from their ordinal
///
/// Implement this and invoke [`impl_database_enum!`](crate::impl_database_enum) to make
/// the enum a [`FromValue`] destination.
pub trait DatabaseEnum: Sized + Send + 'static {
    /// Member with the given ordinal, if any
    fn from_ordinal(ordinal: i64) -> Option<Self>;
}

/// Reinterpret an integer (or integer text) value as an enum member
///
/// Returns `None` for null so the caller's null rule applies.
pub fn enum_from_value<E: DatabaseEnum>(value: &DatabaseValue) -> Option<Result<E>> {
    let ordinal = match value {
        DatabaseValue::Null => return None,
        DatabaseValue::Byte(v) => Some(i64::from(*v)),
        DatabaseValue::Short(v) => Some(i64::from(*v)),
        DatabaseValue::Int(v) => Some(i64::from(*v)),
        DatabaseValue::Long(v) => Some(*v),
        DatabaseValue::String(s) => s.trim().parse().ok(),
        _ => None,
    };

    let target = std::any::type_name::<E>();
    Some(match ordinal {
        Some(ordinal) => E::from_ordinal(ordinal)
            .ok_or_else(|| DatabaseError::invalid_cast(&format!("ordinal {ordinal}"), target)),
        None => Err(DatabaseError::invalid_cast(value.type_name(), target)),
    })
}

/// Implement [`FromValue`] for one or more [`DatabaseEnum`] types
///
/// ```rust
/// use rust_data_reader::core::{Coercer, DatabaseEnum, DatabaseValue};
/// use rust_data_reader::impl_database_enum;
///
/// #[derive(Debug, PartialEq)]
/// enum Status {
///     Active = 0,
///     Suspended = 1,
/// }
///
/// impl DatabaseEnum for Status {
///     fn from_ordinal(ordinal: i64) -> Option<Self> {
///         match ordinal {
///             0 => Some(Status::Active),
///             1 => Some(Status::Suspended),
///             _ => None,
///         }
///     }
/// }
///
/// impl_database_enum!(Status);
///
/// let coercer = Coercer::default();
/// assert_eq!(coercer.cast::<Status>(DatabaseValue::Int(1)).unwrap(), Status::Suspended);
/// ```
#[macro_export]
macro_rules! impl_database_enum {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::core::coerce::FromValue for $ty {
                fn kind() -> ::std::option::Option<$crate::core::value::ValueKind> {
                    ::std::option::Option::None
                }

                fn from_exact(
                    value: $crate::core::value::DatabaseValue,
                ) -> ::std::result::Result<Self, $crate::core::value::DatabaseValue> {
                    ::std::result::Result::Err(value)
                }

                fn from_enum(
                    value: &$crate::core::value::DatabaseValue,
                ) -> ::std::option::Option<$crate::core::error::Result<Self>> {
                    $crate::core::coerce::enum_from_value::<$ty>(value)
                }
            }
        )+
    };
}

/// Converts raw values into typed destinations using an owned handler registry
///
/// Cloning a `Coercer` shares its registry.
#[derive(Debug, Clone)]
pub struct Coercer {
    registry: Arc<CoercionRegistry>,
}

impl Coercer {
    /// Create a coercer over an existing registry
    pub fn new(registry: Arc<CoercionRegistry>) -> Self {
        Self { registry }
    }

    /// Create a coercer whose registry has no handlers
    pub fn without_handlers() -> Self {
        Self::new(Arc::new(CoercionRegistry::new()))
    }

    /// The registry consulted by [`cast`](Self::cast)
    pub fn registry(&self) -> &Arc<CoercionRegistry> {
        &self.registry
    }

    /// Register a handler on the owned registry
    pub fn add_or_update_handler(&self, key: TypeKey, handler: Handler) {
        self.registry.add_or_update(key, handler);
    }

    /// Register several handlers on the owned registry
    pub fn add_or_update_handlers<I>(&self, handlers: I)
    where
        I: IntoIterator<Item = (TypeKey, Handler)>,
    {
        self.registry.add_or_update_many(handlers);
    }

    /// Coerce `value` into `T`
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::InvalidCast`] when the value cannot be represented as `T`,
    /// including a null value requested as a non-`Option` type.
    pub fn cast<T: FromValue>(&self, value: DatabaseValue) -> Result<T> {
        let was_null = value.is_null();

        let result = match self.registry.get(T::type_key()) {
            Some(handler) => handler(value),
            None => value,
        };

        let result = match T::from_exact(result) {
            Ok(exact) => return Ok(exact),
            Err(result) => result,
        };

        if let Some(decoded) = T::from_enum(&result) {
            return decoded;
        }

        if was_null {
            if let Some(none) = T::from_null() {
                return Ok(none);
            }
        }

        T::from_converted(&result)
    }

    /// Coerce `value` into `T`, falling back to `T::default()` when the cast fails
    pub fn cast_or_default<T: FromValue + Default>(&self, value: DatabaseValue) -> T {
        self.cast(value).unwrap_or_default()
    }
}

impl Default for Coercer {
    fn default() -> Self {
        Self::new(Arc::new(CoercionRegistry::with_defaults()))
    }
}
