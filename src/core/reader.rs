//! Backend row cursor contracts
//!
//! [`DataReader`] is the blocking, positional cursor every backend exposes. [`AsyncRowCursor`]
//! adds the asynchronous hooks a backend fulfils with its native primitives, or by completing
//! the blocking call immediately when it has none.

use super::convert::timestamp_to_datetime;
use super::error::{DatabaseError, Result};
use super::value::DatabaseValue;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// One column of the current result set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Zero-based position of the column
    pub ordinal: usize,
    /// Declared column name
    pub name: String,
    /// Backend type name
    pub data_type: String,
}

/// Case-insensitive column name comparison
pub(crate) fn names_match(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// Case-folded column name
pub(crate) fn fold_name(name: &str) -> String {
    name.chars().flat_map(char::to_lowercase).collect()
}

/// Forward-only, positional cursor over one or more result sets
///
/// Once a reader is closed or exhausted, [`read`](Self::read) and
/// [`next_result`](Self::next_result) keep returning `Ok(false)`.
pub trait DataReader: Send {
    /// Nesting depth of the current row
    fn depth(&self) -> usize {
        0
    }

    /// Number of columns in the current result set
    fn field_count(&self) -> usize;

    /// True once the reader has been closed
    fn is_closed(&self) -> bool;

    /// Rows changed by the statements that produced this reader, if any changed rows
    fn records_affected(&self) -> Option<u64>;

    /// Close the reader
    fn close(&mut self);

    /// Advance to the next row of the current result set
    fn read(&mut self) -> Result<bool>;

    /// Advance to the next result set
    fn next_result(&mut self) -> Result<bool>;

    /// Declared name of the column at `ordinal`
    fn name(&self, ordinal: usize) -> Result<&str>;

    /// Backend type name of the column at `ordinal`
    fn data_type_name(&self, ordinal: usize) -> Result<String>;

    /// Raw value of the column at `ordinal` in the current row
    fn value(&self, ordinal: usize) -> Result<DatabaseValue>;

    /// Ordinal of the first column whose name matches case-insensitively
    fn find_ordinal(&self, name: &str) -> Option<usize> {
        (0..self.field_count()).find(|&i| self.name(i).map_or(false, |n| names_match(n, name)))
    }

    /// Ordinal of the named column
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::ColumnNotFound`] when no column matches.
    fn ordinal(&self, name: &str) -> Result<usize> {
        self.find_ordinal(name)
            .ok_or_else(|| DatabaseError::column_not_found(name))
    }

    /// All values of the current row
    fn values(&self) -> Result<Vec<DatabaseValue>> {
        (0..self.field_count()).map(|i| self.value(i)).collect()
    }

    /// True when the column at `ordinal` holds null
    fn is_null(&self, ordinal: usize) -> Result<bool> {
        Ok(self.value(ordinal)?.is_null())
    }

    /// Column metadata of the current result set
    fn schema(&self) -> Result<Vec<ColumnSchema>> {
        (0..self.field_count())
            .map(|ordinal| {
                Ok(ColumnSchema {
                    ordinal,
                    name: self.name(ordinal)?.to_string(),
                    data_type: self.data_type_name(ordinal)?,
                })
            })
            .collect()
    }

    /// Copy bytes of a binary or text column, starting at `offset`, into `buffer`
    ///
    /// Returns the number of bytes copied.
    fn read_bytes(&self, ordinal: usize, offset: usize, buffer: &mut [u8]) -> Result<usize> {
        let value = self.value(ordinal)?;
        let bytes = value
            .as_bytes()
            .ok_or_else(|| DatabaseError::type_mismatch("bytes", value.type_name()))?;
        let available = bytes.get(offset..).unwrap_or_default();
        let count = available.len().min(buffer.len());
        buffer[..count].copy_from_slice(&available[..count]);
        Ok(count)
    }

    /// Stored boolean, without coercion
    fn get_bool(&self, ordinal: usize) -> Result<bool> {
        match self.value(ordinal)? {
            DatabaseValue::Bool(v) => Ok(v),
            other => Err(DatabaseError::type_mismatch("bool", other.type_name())),
        }
    }

    /// Stored unsigned byte, without coercion
    fn get_byte(&self, ordinal: usize) -> Result<u8> {
        match self.value(ordinal)? {
            DatabaseValue::Byte(v) => Ok(v),
            other => Err(DatabaseError::type_mismatch("byte", other.type_name())),
        }
    }

    /// Stored 16-bit integer, without coercion
    fn get_i16(&self, ordinal: usize) -> Result<i16> {
        match self.value(ordinal)? {
            DatabaseValue::Short(v) => Ok(v),
            other => Err(DatabaseError::type_mismatch("short", other.type_name())),
        }
    }

    /// Stored 32-bit integer, without coercion
    fn get_i32(&self, ordinal: usize) -> Result<i32> {
        match self.value(ordinal)? {
            DatabaseValue::Int(v) => Ok(v),
            other => Err(DatabaseError::type_mismatch("int", other.type_name())),
        }
    }

    /// Stored 64-bit integer, without coercion
    fn get_i64(&self, ordinal: usize) -> Result<i64> {
        match self.value(ordinal)? {
            DatabaseValue::Long(v) => Ok(v),
            other => Err(DatabaseError::type_mismatch("long", other.type_name())),
        }
    }

    /// Stored 32-bit float, without coercion
    fn get_f32(&self, ordinal: usize) -> Result<f32> {
        match self.value(ordinal)? {
            DatabaseValue::Float(v) => Ok(v),
            other => Err(DatabaseError::type_mismatch("float", other.type_name())),
        }
    }

    /// Stored 64-bit float, without coercion
    fn get_f64(&self, ordinal: usize) -> Result<f64> {
        match self.value(ordinal)? {
            DatabaseValue::Double(v) => Ok(v),
            other => Err(DatabaseError::type_mismatch("double", other.type_name())),
        }
    }

    /// Stored string, without coercion
    fn get_string(&self, ordinal: usize) -> Result<String> {
        match self.value(ordinal)? {
            DatabaseValue::String(v) => Ok(v),
            other => Err(DatabaseError::type_mismatch("string", other.type_name())),
        }
    }

    /// Stored binary data, without coercion
    fn get_bytes(&self, ordinal: usize) -> Result<Vec<u8>> {
        match self.value(ordinal)? {
            DatabaseValue::Bytes(v) => Ok(v),
            other => Err(DatabaseError::type_mismatch("bytes", other.type_name())),
        }
    }

    /// Stored timestamp, without coercion
    fn get_date_time(&self, ordinal: usize) -> Result<DateTime<Utc>> {
        match self.value(ordinal)? {
            DatabaseValue::Timestamp(v) => timestamp_to_datetime(v)
                .ok_or_else(|| DatabaseError::invalid_cast("timestamp", "DateTime<Utc>")),
            other => Err(DatabaseError::type_mismatch("timestamp", other.type_name())),
        }
    }

    /// Stored decimal, without coercion
    fn get_decimal(&self, ordinal: usize) -> Result<Decimal> {
        match self.value(ordinal)? {
            DatabaseValue::Decimal(v) => Ok(v),
            other => Err(DatabaseError::type_mismatch("decimal", other.type_name())),
        }
    }

    /// Stored UUID, without coercion
    fn get_uuid(&self, ordinal: usize) -> Result<Uuid> {
        match self.value(ordinal)? {
            DatabaseValue::Uuid(v) => Ok(v),
            other => Err(DatabaseError::type_mismatch("uuid", other.type_name())),
        }
    }
}

/// Asynchronous hooks supplied by each backend
///
/// Implementations may assume the token was not yet cancelled when called through
/// [`SequentialRowCursor`](super::cursor::SequentialRowCursor), but must still honour a
/// cancellation raised while they wait.
#[async_trait]
pub trait AsyncRowCursor: DataReader {
    /// Advance to the next row
    async fn read_async(&mut self, cancel: &CancellationToken) -> Result<bool>;

    /// Advance to the next result set
    async fn next_result_async(&mut self, cancel: &CancellationToken) -> Result<bool>;

    /// True when the column at `ordinal` holds null
    async fn is_null_async(&mut self, ordinal: usize, cancel: &CancellationToken) -> Result<bool>;
}

/// Run a blocking cursor operation as an already-completed asynchronous one
///
/// For backends without native asynchronous reads. A cancelled token yields
/// [`DatabaseError::OperationCanceled`] and `op` is not run.
pub fn completed<T>(cancel: &CancellationToken, op: impl FnOnce() -> Result<T>) -> Result<T> {
    if cancel.is_cancelled() {
        return Err(DatabaseError::OperationCanceled);
    }
    op()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SingleRow {
        names: Vec<&'static str>,
        row: Vec<DatabaseValue>,
    }

    impl DataReader for SingleRow {
        fn field_count(&self) -> usize {
            self.names.len()
        }

        fn is_closed(&self) -> bool {
            false
        }

        fn records_affected(&self) -> Option<u64> {
            None
        }

        fn close(&mut self) {}

        fn read(&mut self) -> Result<bool> {
            Ok(false)
        }

        fn next_result(&mut self) -> Result<bool> {
            Ok(false)
        }

        fn name(&self, ordinal: usize) -> Result<&str> {
            self.names
                .get(ordinal)
                .copied()
                .ok_or_else(|| DatabaseError::index_out_of_range(ordinal, self.names.len()))
        }

        fn data_type_name(&self, ordinal: usize) -> Result<String> {
            Ok(self.value(ordinal)?.type_name().to_string())
        }

        fn value(&self, ordinal: usize) -> Result<DatabaseValue> {
            self.row
                .get(ordinal)
                .cloned()
                .ok_or_else(|| DatabaseError::index_out_of_range(ordinal, self.row.len()))
        }
    }

    fn sample() -> SingleRow {
        SingleRow {
            names: vec!["Id", "name", "NAME", "payload"],
            row: vec![
                DatabaseValue::Long(1),
                DatabaseValue::from("Ann"),
                DatabaseValue::from("shadowed"),
                DatabaseValue::Bytes(b"abcdef".to_vec()),
            ],
        }
    }

    #[test]
    fn test_ordinal_lookup_is_case_insensitive_first_match() {
        let reader = sample();
        assert_eq!(reader.ordinal("id").unwrap(), 0);
        assert_eq!(reader.ordinal("Name").unwrap(), 1);
        assert!(matches!(
            reader.ordinal("missing"),
            Err(DatabaseError::ColumnNotFound(_))
        ));
        assert!(names_match("ÄGE", "äge"));
        assert_eq!(fold_name("ÄGE"), "äge");
    }

    #[test]
    fn test_strict_getters() {
        let reader = sample();
        assert_eq!(reader.get_i64(0).unwrap(), 1);
        assert_eq!(reader.get_string(1).unwrap(), "Ann");
        assert!(matches!(
            reader.get_i32(0),
            Err(DatabaseError::TypeMismatch { .. })
        ));
        assert!(matches!(
            reader.get_bool(1),
            Err(DatabaseError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_strict_decimal_and_uuid_getters() {
        let id = Uuid::from_u128(7);
        let reader = SingleRow {
            names: vec!["amount", "id"],
            row: vec![DatabaseValue::Decimal(Decimal::new(995, 2)), DatabaseValue::Uuid(id)],
        };
        assert_eq!(reader.get_decimal(0).unwrap(), Decimal::new(995, 2));
        assert_eq!(reader.get_uuid(1).unwrap(), id);
        assert!(matches!(
            reader.get_uuid(0),
            Err(DatabaseError::TypeMismatch { .. })
        ));
        assert!(matches!(
            reader.get_f64(0),
            Err(DatabaseError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_read_bytes() {
        let reader = sample();
        let mut buffer = [0u8; 4];
        assert_eq!(reader.read_bytes(3, 2, &mut buffer).unwrap(), 4);
        assert_eq!(&buffer, b"cdef");
        assert_eq!(reader.read_bytes(3, 5, &mut buffer).unwrap(), 1);
        assert_eq!(reader.read_bytes(3, 10, &mut buffer).unwrap(), 0);
        assert!(reader.read_bytes(0, 0, &mut buffer).is_err());
    }

    #[test]
    fn test_schema_and_values() {
        let reader = sample();
        let schema = reader.schema().unwrap();
        assert_eq!(schema.len(), 4);
        assert_eq!(schema[3].name, "payload");
        assert_eq!(schema[3].data_type, "bytes");
        assert_eq!(reader.values().unwrap().len(), 4);
    }

    #[test]
    fn test_completed_honours_cancellation() {
        let token = CancellationToken::new();
        assert_eq!(completed(&token, || Ok(7)).unwrap(), 7);

        token.cancel();
        let mut ran = false;
        let result = completed(&token, || {
            ran = true;
            Ok(())
        });
        assert!(result.unwrap_err().is_canceled());
        assert!(!ran);
    }
}
