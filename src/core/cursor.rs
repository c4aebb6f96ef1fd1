//! Typed, column-name addressable row cursor
//!
//! [`SequentialRowCursor`] owns one backend [`AsyncRowCursor`] and layers name lookup,
//! null/default policy and coercion on top of it. The backend supplies the asynchronous
//! primitives; everything else here is backend independent.

use super::coerce::{Coercer, FromValue};
use super::error::{DatabaseError, Result};
use super::reader::{fold_name, AsyncRowCursor, ColumnSchema, DataReader};
use super::value::DatabaseValue;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const CURSOR_NAME: &str = "SequentialRowCursor";

/// Precomputed case-insensitive name to ordinal map for one result shape
///
/// Build it once per result set when reading many rows of a wide result.
#[derive(Debug, Clone, Default)]
pub struct ColumnIndex {
    ordinals: HashMap<String, usize>,
}

impl ColumnIndex {
    /// Index the columns of the reader's current result set
    pub fn build<R: DataReader + ?Sized>(reader: &R) -> Result<Self> {
        let mut ordinals = HashMap::with_capacity(reader.field_count());
        for ordinal in 0..reader.field_count() {
            ordinals
                .entry(fold_name(reader.name(ordinal)?))
                .or_insert(ordinal);
        }
        Ok(Self { ordinals })
    }

    /// Ordinal of the named column
    pub fn ordinal(&self, name: &str) -> Result<usize> {
        self.ordinals
            .get(&fold_name(name))
            .copied()
            .ok_or_else(|| DatabaseError::column_not_found(name))
    }

    /// True when the name resolves
    pub fn contains(&self, name: &str) -> bool {
        self.ordinals.contains_key(&fold_name(name))
    }

    /// Number of distinct column names
    pub fn len(&self) -> usize {
        self.ordinals.len()
    }

    /// True for a result shape without columns
    pub fn is_empty(&self) -> bool {
        self.ordinals.is_empty()
    }
}

/// Forward-only cursor with typed column access
///
/// The cursor is single-owner: all calls on one instance must be sequenced. After
/// [`dispose`](Self::dispose) every operation fails with [`DatabaseError::ObjectDisposed`].
///
/// # Example
///
/// ```rust
/// use rust_data_reader::backends::{MemoryReader, MemoryResultSet};
/// use rust_data_reader::core::{Result, SequentialRowCursor};
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let set = MemoryResultSet::new(["age", "name"]).with_row([30.into(), "Ann".into()])?;
///     let mut cursor = SequentialRowCursor::new(MemoryReader::new(vec![set]));
///
///     while cursor.read_async().await? {
///         let age: i32 = cursor.get("age")?;
///         let name: String = cursor.get("NAME")?;
///         assert_eq!((age, name.as_str()), (30, "Ann"));
///     }
///     Ok(())
/// }
/// ```
pub struct SequentialRowCursor<R: AsyncRowCursor> {
    reader: Option<R>,
    coercer: Coercer,
}

impl<R: AsyncRowCursor> SequentialRowCursor<R> {
    /// Wrap `reader` with a coercer holding the built-in handlers
    pub fn new(reader: R) -> Self {
        Self::with_coercer(reader, Coercer::default())
    }

    /// Wrap `reader` with the given coercer
    pub fn with_coercer(reader: R, coercer: Coercer) -> Self {
        Self {
            reader: Some(reader),
            coercer,
        }
    }

    /// Coercer used by the typed accessors
    pub fn coercer(&self) -> &Coercer {
        &self.coercer
    }

    fn reader(&self) -> Result<&R> {
        self.reader
            .as_ref()
            .ok_or_else(|| DatabaseError::object_disposed(CURSOR_NAME))
    }

    fn reader_mut(&mut self) -> Result<&mut R> {
        self.reader
            .as_mut()
            .ok_or_else(|| DatabaseError::object_disposed(CURSOR_NAME))
    }

    // Synchronous passthrough

    /// Nesting depth of the current row
    pub fn depth(&self) -> Result<usize> {
        Ok(self.reader()?.depth())
    }

    /// Number of columns in the current result set
    pub fn field_count(&self) -> Result<usize> {
        Ok(self.reader()?.field_count())
    }

    /// True once the backend reader is closed or the cursor disposed
    pub fn is_closed(&self) -> bool {
        self.reader.as_ref().map_or(true, |r| r.is_closed())
    }

    /// Rows changed by the command, `None` for pure queries
    pub fn records_affected(&self) -> Result<Option<u64>> {
        Ok(self.reader()?.records_affected())
    }

    /// Close the backend reader, keeping the cursor usable for inspection
    pub fn close(&mut self) -> Result<()> {
        self.reader_mut()?.close();
        Ok(())
    }

    /// Advance to the next row, blocking the caller
    pub fn read(&mut self) -> Result<bool> {
        self.reader_mut()?.read()
    }

    /// Move to the next result set of a batch
    pub fn next_result(&mut self) -> Result<bool> {
        self.reader_mut()?.next_result()
    }

    /// Column descriptions of the current result set
    pub fn schema(&self) -> Result<Vec<ColumnSchema>> {
        self.reader()?.schema()
    }

    /// Column name at `ordinal`
    pub fn name(&self, ordinal: usize) -> Result<&str> {
        self.reader()?.name(ordinal)
    }

    /// Ordinal of the first column matching `name`, ignoring case
    pub fn ordinal(&self, name: &str) -> Result<usize> {
        self.reader()?.ordinal(name)
    }

    /// Backend type name of the column
    pub fn data_type_name(&self, ordinal: usize) -> Result<String> {
        self.reader()?.data_type_name(ordinal)
    }

    /// Raw value at `ordinal`
    pub fn value(&self, ordinal: usize) -> Result<DatabaseValue> {
        self.reader()?.value(ordinal)
    }

    /// Raw value of the named column
    pub fn value_by_name(&self, name: &str) -> Result<DatabaseValue> {
        let reader = self.reader()?;
        reader.value(reader.ordinal(name)?)
    }

    /// Raw values of the whole current row
    pub fn values(&self) -> Result<Vec<DatabaseValue>> {
        self.reader()?.values()
    }

    /// True when the value at `ordinal` is null
    pub fn is_null(&self, ordinal: usize) -> Result<bool> {
        self.reader()?.is_null(ordinal)
    }

    /// Copy binary column data starting at `offset` into `buffer`
    pub fn read_bytes(&self, ordinal: usize, offset: usize, buffer: &mut [u8]) -> Result<usize> {
        self.reader()?.read_bytes(ordinal, offset, buffer)
    }

    /// Stored boolean at `ordinal`, without coercion
    pub fn get_bool(&self, ordinal: usize) -> Result<bool> {
        self.reader()?.get_bool(ordinal)
    }

    /// Stored byte at `ordinal`, without coercion
    pub fn get_byte(&self, ordinal: usize) -> Result<u8> {
        self.reader()?.get_byte(ordinal)
    }

    /// Stored 16-bit integer at `ordinal`, without coercion
    pub fn get_i16(&self, ordinal: usize) -> Result<i16> {
        self.reader()?.get_i16(ordinal)
    }

    /// Stored 32-bit integer at `ordinal`, without coercion
    pub fn get_i32(&self, ordinal: usize) -> Result<i32> {
        self.reader()?.get_i32(ordinal)
    }

    /// Stored 64-bit integer at `ordinal`, without coercion
    pub fn get_i64(&self, ordinal: usize) -> Result<i64> {
        self.reader()?.get_i64(ordinal)
    }

    /// Stored 32-bit float at `ordinal`, without coercion
    pub fn get_f32(&self, ordinal: usize) -> Result<f32> {
        self.reader()?.get_f32(ordinal)
    }

    /// Stored 64-bit float at `ordinal`, without coercion
    pub fn get_f64(&self, ordinal: usize) -> Result<f64> {
        self.reader()?.get_f64(ordinal)
    }

    /// Stored string at `ordinal`, without coercion
    pub fn get_string(&self, ordinal: usize) -> Result<String> {
        self.reader()?.get_string(ordinal)
    }

    /// Stored binary data at `ordinal`, without coercion
    pub fn get_bytes(&self, ordinal: usize) -> Result<Vec<u8>> {
        self.reader()?.get_bytes(ordinal)
    }

    /// Stored timestamp at `ordinal`, without coercion
    pub fn get_date_time(&self, ordinal: usize) -> Result<DateTime<Utc>> {
        self.reader()?.get_date_time(ordinal)
    }

    /// Stored decimal at `ordinal`, without coercion
    pub fn get_decimal(&self, ordinal: usize) -> Result<Decimal> {
        self.reader()?.get_decimal(ordinal)
    }

    /// Stored UUID at `ordinal`, without coercion
    pub fn get_uuid(&self, ordinal: usize) -> Result<Uuid> {
        self.reader()?.get_uuid(ordinal)
    }

    // Asynchronous surface

    /// Advance to the next row without a cancellation signal
    pub async fn read_async(&mut self) -> Result<bool> {
        self.read_async_with(&CancellationToken::new()).await
    }

    /// Advance to the next row
    ///
    /// A token that is already cancelled fails with [`DatabaseError::OperationCanceled`]
    /// before the backend is touched.
    pub async fn read_async_with(&mut self, cancel: &CancellationToken) -> Result<bool> {
        let reader = self.reader_mut()?;
        if cancel.is_cancelled() {
            return Err(DatabaseError::OperationCanceled);
        }
        reader.read_async(cancel).await
    }

    /// Advance to the next result set without a cancellation signal
    pub async fn next_result_async(&mut self) -> Result<bool> {
        self.next_result_async_with(&CancellationToken::new()).await
    }

    /// Advance to the next result set
    pub async fn next_result_async_with(&mut self, cancel: &CancellationToken) -> Result<bool> {
        let reader = self.reader_mut()?;
        if cancel.is_cancelled() {
            return Err(DatabaseError::OperationCanceled);
        }
        reader.next_result_async(cancel).await
    }

    /// Null check of the column at `ordinal` without a cancellation signal
    pub async fn is_null_async(&mut self, ordinal: usize) -> Result<bool> {
        self.is_null_async_with(ordinal, &CancellationToken::new())
            .await
    }

    /// Null check of the column at `ordinal`
    pub async fn is_null_async_with(
        &mut self,
        ordinal: usize,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let reader = self.reader_mut()?;
        if cancel.is_cancelled() {
            return Err(DatabaseError::OperationCanceled);
        }
        reader.is_null_async(ordinal, cancel).await
    }

    // Column-name typed surface

    /// True when a column with this name exists in the current result set
    pub fn column_exists(&self, name: &str) -> Result<bool> {
        Ok(self.reader()?.find_ordinal(name).is_some())
    }

    /// Prebuilt name index for the current result set
    pub fn column_index(&self) -> Result<ColumnIndex> {
        ColumnIndex::build(self.reader()?)
    }

    /// Coerced value of the named column, `T::default()` when null
    ///
    /// # Errors
    ///
    /// [`DatabaseError::ColumnNotFound`] for an unknown name and
    /// [`DatabaseError::InvalidCast`] when the value cannot be coerced.
    pub fn get<T: FromValue + Default>(&self, name: &str) -> Result<T> {
        self.get_at(self.ordinal(name)?)
    }

    /// Coerced value of the named column, `default` when null
    pub fn get_or<T: FromValue>(&self, name: &str, default: T) -> Result<T> {
        let value = self.value_by_name(name)?;
        if value.is_null() {
            return Ok(default);
        }
        self.coercer.cast(value)
    }

    /// Coerced value of the named column, `None` when null
    pub fn get_nullable<T: FromValue>(&self, name: &str) -> Result<Option<T>> {
        self.get_nullable_at(self.ordinal(name)?)
    }

    /// Coerced value of the named column, `Some(default)` when null
    pub fn get_nullable_or<T: FromValue>(&self, name: &str, default: T) -> Result<Option<T>> {
        let value = self.value_by_name(name)?;
        if value.is_null() {
            return Ok(Some(default));
        }
        self.coercer.cast(value).map(Some)
    }

    /// Coerced value at `ordinal`, `T::default()` when null
    pub fn get_at<T: FromValue + Default>(&self, ordinal: usize) -> Result<T> {
        let value = self.value(ordinal)?;
        if value.is_null() {
            return Ok(T::default());
        }
        self.coercer.cast(value)
    }

    /// Coerced value at `ordinal`, `None` when null
    pub fn get_nullable_at<T: FromValue>(&self, ordinal: usize) -> Result<Option<T>> {
        let value = self.value(ordinal)?;
        if value.is_null() {
            return Ok(None);
        }
        self.coercer.cast(value).map(Some)
    }

    // Disposal

    /// Close and release the backend reader; later calls are no-ops
    pub fn dispose(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            if !reader.is_closed() {
                reader.close();
            }
            tracing::debug!("row cursor disposed");
        }
    }

    /// True once [`dispose`](Self::dispose) has run
    pub fn is_disposed(&self) -> bool {
        self.reader.is_none()
    }
}

impl<R: AsyncRowCursor> Drop for SequentialRowCursor<R> {
    fn drop(&mut self) {
        self.dispose();
    }
}
