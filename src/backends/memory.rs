//! In-memory backend
//!
//! Buffered result sets served through the [`DataReader`] contract. Other buffered
//! backends reuse [`MemoryReader`] for their cursor state, and tests use it directly.

use crate::core::error::{DatabaseError, Result};
use crate::core::reader::{completed, AsyncRowCursor, DataReader};
use crate::core::value::DatabaseValue;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// One buffered result set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryResultSet {
    columns: Vec<String>,
    data_types: Vec<Option<String>>,
    rows: Vec<Vec<DatabaseValue>>,
}

impl MemoryResultSet {
    /// Create an empty result set with the given column names
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let data_types = vec![None; columns.len()];
        Self {
            columns,
            data_types,
            rows: Vec::new(),
        }
    }

    /// Declare backend type names, one per column (`None` infers from the values)
    pub fn with_data_types<I>(mut self, data_types: I) -> Result<Self>
    where
        I: IntoIterator<Item = Option<String>>,
    {
        let data_types: Vec<Option<String>> = data_types.into_iter().collect();
        if data_types.len() != self.columns.len() {
            return Err(DatabaseError::invalid_argument(format!(
                "expected {} data types, got {}",
                self.columns.len(),
                data_types.len()
            )));
        }
        self.data_types = data_types;
        Ok(self)
    }

    /// Append a row, builder style
    pub fn with_row<I>(mut self, row: I) -> Result<Self>
    where
        I: IntoIterator<Item = DatabaseValue>,
    {
        self.push_row(row.into_iter().collect())?;
        Ok(self)
    }

    /// Append a row
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::InvalidArgument`] when the row width differs from the
    /// column count.
    pub fn push_row(&mut self, row: Vec<DatabaseValue>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(DatabaseError::invalid_argument(format!(
                "row has {} values but the result set has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Column names in ordinal order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Buffered rows
    pub fn rows(&self) -> &[Vec<DatabaseValue>] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the set holds no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Cursor over buffered result sets
///
/// Starts positioned before the first row of the first set.
#[derive(Debug, Clone, Default)]
pub struct MemoryReader {
    sets: Vec<MemoryResultSet>,
    set_index: usize,
    // rows consumed by `read` in the current set; the current row is `position - 1`
    position: usize,
    closed: bool,
    records_affected: Option<u64>,
}

impl MemoryReader {
    /// Create a reader over `sets`
    pub fn new(sets: Vec<MemoryResultSet>) -> Self {
        Self {
            sets,
            ..Self::default()
        }
    }

    /// Report `count` changed rows through [`DataReader::records_affected`]
    pub fn with_records_affected(mut self, count: u64) -> Self {
        self.records_affected = Some(count);
        self
    }

    fn current_set(&self) -> Option<&MemoryResultSet> {
        if self.closed {
            return None;
        }
        self.sets.get(self.set_index)
    }

    fn current_row(&self) -> Option<&[DatabaseValue]> {
        let set = self.current_set()?;
        let index = self.position.checked_sub(1)?;
        set.rows.get(index).map(Vec::as_slice)
    }

    fn check_ordinal(&self, ordinal: usize) -> Result<()> {
        let field_count = self.field_count();
        if ordinal >= field_count {
            return Err(DatabaseError::index_out_of_range(ordinal, field_count));
        }
        Ok(())
    }
}

impl DataReader for MemoryReader {
    fn field_count(&self) -> usize {
        self.current_set().map_or(0, |set| set.columns.len())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn records_affected(&self) -> Option<u64> {
        self.records_affected
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn read(&mut self) -> Result<bool> {
        let Some(len) = self.current_set().map(MemoryResultSet::len) else {
            return Ok(false);
        };
        if self.position <= len {
            self.position += 1;
        }
        Ok(self.position <= len)
    }

    fn next_result(&mut self) -> Result<bool> {
        if self.closed {
            return Ok(false);
        }
        if self.set_index < self.sets.len() {
            self.set_index += 1;
            self.position = 0;
        }
        Ok(self.set_index < self.sets.len())
    }

    fn name(&self, ordinal: usize) -> Result<&str> {
        self.check_ordinal(ordinal)?;
        self.current_set()
            .and_then(|set| set.columns.get(ordinal))
            .map(String::as_str)
            .ok_or_else(|| DatabaseError::index_out_of_range(ordinal, self.field_count()))
    }

    fn data_type_name(&self, ordinal: usize) -> Result<String> {
        self.check_ordinal(ordinal)?;
        let Some(set) = self.current_set() else {
            return Err(DatabaseError::index_out_of_range(ordinal, 0));
        };
        if let Some(Some(declared)) = set.data_types.get(ordinal) {
            return Ok(declared.clone());
        }

        let inferred = self
            .current_row()
            .and_then(|row| row[ordinal].kind())
            .or_else(|| set.rows.iter().find_map(|row| row[ordinal].kind()));
        Ok(inferred.map_or("unknown", |kind| kind.name()).to_string())
    }

    fn value(&self, ordinal: usize) -> Result<DatabaseValue> {
        if self.closed {
            return Err(DatabaseError::invalid_operation("reader is closed"));
        }
        self.check_ordinal(ordinal)?;
        self.current_row()
            .map(|row| row[ordinal].clone())
            .ok_or_else(|| DatabaseError::invalid_operation("no current row"))
    }
}

#[async_trait]
impl AsyncRowCursor for MemoryReader {
    async fn read_async(&mut self, cancel: &CancellationToken) -> Result<bool> {
        completed(cancel, || self.read())
    }

    async fn next_result_async(&mut self, cancel: &CancellationToken) -> Result<bool> {
        completed(cancel, || self.next_result())
    }

    async fn is_null_async(&mut self, ordinal: usize, cancel: &CancellationToken) -> Result<bool> {
        completed(cancel, || self.is_null(ordinal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_sets() -> MemoryReader {
        let first = MemoryResultSet::new(["id"])
            .with_row([DatabaseValue::Long(1)])
            .unwrap()
            .with_row([DatabaseValue::Long(2)])
            .unwrap();
        let second = MemoryResultSet::new(["label", "score"])
            .with_data_types([Some("TEXT".to_string()), None])
            .unwrap()
            .with_row(["x".into(), DatabaseValue::Null])
            .unwrap();
        MemoryReader::new(vec![first, second])
    }

    #[test]
    fn test_row_arity_is_checked() {
        let result = MemoryResultSet::new(["a", "b"]).with_row([DatabaseValue::Int(1)]);
        assert!(matches!(result, Err(DatabaseError::InvalidArgument(_))));

        let result = MemoryResultSet::new(["a"]).with_data_types([None, None]);
        assert!(matches!(result, Err(DatabaseError::InvalidArgument(_))));
    }

    #[test]
    fn test_reads_across_result_sets() -> Result<()> {
        let mut reader = two_sets();
        assert!(matches!(
            reader.value(0),
            Err(DatabaseError::InvalidOperation(_))
        ));

        assert!(reader.read()?);
        assert_eq!(reader.get_i64(0)?, 1);
        assert!(reader.read()?);
        assert_eq!(reader.get_i64(0)?, 2);
        assert!(!reader.read()?);
        assert!(!reader.read()?);

        assert!(reader.next_result()?);
        assert_eq!(reader.field_count(), 2);
        assert!(reader.read()?);
        assert_eq!(reader.get_string(0)?, "x");
        assert!(reader.is_null(1)?);
        assert!(!reader.read()?);

        assert!(!reader.next_result()?);
        assert!(!reader.next_result()?);
        assert!(!reader.read()?);
        assert_eq!(reader.field_count(), 0);
        Ok(())
    }

    #[test]
    fn test_data_type_names() -> Result<()> {
        let mut reader = two_sets();
        reader.read()?;
        assert_eq!(reader.data_type_name(0)?, "long");

        reader.next_result()?;
        assert_eq!(reader.data_type_name(0)?, "TEXT");
        assert_eq!(reader.data_type_name(1)?, "unknown");
        assert!(matches!(
            reader.data_type_name(5),
            Err(DatabaseError::IndexOutOfRange { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_closed_reader_stays_exhausted() -> Result<()> {
        let mut reader = two_sets().with_records_affected(3);
        reader.close();
        assert!(reader.is_closed());
        assert!(!reader.read()?);
        assert!(!reader.next_result()?);
        assert_eq!(reader.records_affected(), Some(3));
        Ok(())
    }

    #[tokio::test]
    async fn test_async_hooks_complete_synchronously() -> Result<()> {
        let mut reader = two_sets();
        let token = CancellationToken::new();
        assert!(reader.read_async(&token).await?);
        assert!(!reader.is_null_async(0, &token).await?);

        token.cancel();
        assert!(reader.read_async(&token).await.unwrap_err().is_canceled());
        // the canceled call did not advance
        assert_eq!(reader.get_i64(0)?, 1);
        Ok(())
    }

    #[test]
    fn test_empty_reader() -> Result<()> {
        let mut reader = MemoryReader::new(Vec::new());
        assert!(!reader.read()?);
        assert!(!reader.next_result()?);
        assert_eq!(reader.field_count(), 0);
        assert!(reader.schema()?.is_empty());
        Ok(())
    }
}
