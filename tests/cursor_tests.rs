//! Cursor contract tests over the in-memory backend
//!
//! These tests exercise the typed cursor the way calling code uses it:
//! - Column lookup by name, including missing and null columns
//! - Default, fallback and nullable accessors
//! - Exhaustion and multiple result sets
//! - Cancellation before any backend work runs

use async_trait::async_trait;
use rust_data_reader::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn person_cursor() -> Result<SequentialRowCursor<MemoryReader>> {
    let set = MemoryResultSet::new(["age", "name", "manager_id"])
        .with_row([30.into(), "Ann".into(), DatabaseValue::Null])?
        .with_row([41.into(), "Bob".into(), 1.into()])?;
    Ok(SequentialRowCursor::new(MemoryReader::new(vec![set])))
}

#[tokio::test]
async fn test_typed_reads_by_column_name() -> Result<()> {
    let mut cursor = person_cursor()?;
    assert!(cursor.read_async().await?);

    let age: i32 = cursor.get("age")?;
    let name: String = cursor.get("name")?;
    assert_eq!(age, 30);
    assert_eq!(name, "Ann");

    // Narrower and wider destinations go through the conversion table
    assert_eq!(cursor.get::<i64>("Age")?, 30);
    assert_eq!(cursor.get::<f64>("AGE")?, 30.0);
    assert_eq!(cursor.get::<String>("age")?, "30");
    Ok(())
}

#[tokio::test]
async fn test_missing_column_is_reported() -> Result<()> {
    let mut cursor = person_cursor()?;
    assert!(cursor.read_async().await?);

    assert!(!cursor.column_exists("salary")?);
    assert!(matches!(
        cursor.get::<i32>("salary"),
        Err(DatabaseError::ColumnNotFound(name)) if name == "salary"
    ));
    assert!(matches!(
        cursor.get_nullable_or("salary", 5),
        Err(DatabaseError::ColumnNotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_null_column_policies() -> Result<()> {
    let mut cursor = person_cursor()?;
    assert!(cursor.read_async().await?);

    assert!(cursor.column_exists("manager_id")?);
    assert_eq!(cursor.get_nullable::<i32>("manager_id")?, None);
    assert_eq!(cursor.get_or("manager_id", -1)?, -1);
    assert_eq!(cursor.get::<i32>("manager_id")?, 0);
    assert_eq!(cursor.get_nullable_or("manager_id", -1)?, Some(-1));

    assert!(cursor.read_async().await?);
    assert_eq!(cursor.get_nullable::<i32>("manager_id")?, Some(1));
    assert_eq!(cursor.get_or("manager_id", -1)?, 1);
    Ok(())
}

#[tokio::test]
async fn test_exhausted_cursor_keeps_returning_false() -> Result<()> {
    let mut cursor = person_cursor()?;
    let mut names = Vec::new();
    while cursor.read_async().await? {
        names.push(cursor.get::<String>("name")?);
    }
    assert_eq!(names, ["Ann", "Bob"]);

    for _ in 0..3 {
        assert!(!cursor.read_async().await?);
        assert!(!cursor.read()?);
    }
    assert!(!cursor.next_result_async().await?);
    assert!(!cursor.next_result()?);
    Ok(())
}

#[tokio::test]
async fn test_multiple_result_sets() -> Result<()> {
    let first = MemoryResultSet::new(["id"]).with_row([1.into()])?;
    let second = MemoryResultSet::new(["flag", "label"])
        .with_row(["yes".into(), "  padded  ".into()])?;
    let mut cursor = SequentialRowCursor::new(MemoryReader::new(vec![first, second]));

    assert!(cursor.read_async().await?);
    assert_eq!(cursor.get::<u8>("id")?, 1);
    assert!(!cursor.column_exists("flag")?);

    assert!(cursor.next_result_async().await?);
    assert_eq!(cursor.field_count()?, 2);
    assert!(cursor.read_async().await?);
    assert!(cursor.get::<bool>("flag")?);
    assert_eq!(cursor.get::<String>("label")?, "padded");
    assert!(!cursor.column_exists("id")?);
    Ok(())
}

#[tokio::test]
async fn test_enum_columns() -> Result<()> {
    #[derive(Debug, Default, PartialEq)]
    enum Priority {
        #[default]
        Low,
        High,
    }

    impl DatabaseEnum for Priority {
        fn from_ordinal(ordinal: i64) -> Option<Self> {
            match ordinal {
                0 => Some(Priority::Low),
                1 => Some(Priority::High),
                _ => None,
            }
        }
    }

    rust_data_reader::impl_database_enum!(Priority);

    let set = MemoryResultSet::new(["priority", "as_text", "missing"])
        .with_row([1.into(), "0".into(), DatabaseValue::Null])?;
    let mut cursor = SequentialRowCursor::new(MemoryReader::new(vec![set]));
    assert!(cursor.read_async().await?);

    assert_eq!(cursor.get::<Priority>("priority")?, Priority::High);
    assert_eq!(cursor.get::<Priority>("as_text")?, Priority::Low);
    assert_eq!(cursor.get_nullable::<Priority>("missing")?, None);
    Ok(())
}

#[tokio::test]
async fn test_custom_handler_applies_to_cursor_reads() -> Result<()> {
    let registry = Arc::new(CoercionRegistry::with_defaults());
    registry.register::<i64, _>(|value| match value.as_str().map(str::len) {
        Some(len) => DatabaseValue::Long(len as i64),
        None => value,
    });

    let set = MemoryResultSet::new(["word"]).with_row(["four".into()])?;
    let mut cursor =
        SequentialRowCursor::with_coercer(MemoryReader::new(vec![set]), Coercer::new(registry));
    assert!(cursor.read_async().await?);

    assert_eq!(cursor.get::<i64>("word")?, 4);
    Ok(())
}

#[tokio::test]
async fn test_positional_strict_getters() -> Result<()> {
    let mut cursor = person_cursor()?;
    assert!(cursor.read_async().await?);

    assert_eq!(cursor.get_i32(0)?, 30);
    assert_eq!(cursor.get_string(1)?, "Ann");
    assert!(cursor.is_null(2)?);
    assert!(matches!(
        cursor.get_string(0),
        Err(DatabaseError::TypeMismatch { .. })
    ));
    assert!(matches!(
        cursor.value(7),
        Err(DatabaseError::IndexOutOfRange { ordinal: 7, field_count: 3 })
    ));
    Ok(())
}

/// Backend cursor that counts how often its read hooks actually run
struct SpyReader {
    inner: MemoryReader,
    backend_reads: Arc<AtomicUsize>,
}

impl DataReader for SpyReader {
    fn field_count(&self) -> usize {
        self.inner.field_count()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn records_affected(&self) -> Option<u64> {
        self.inner.records_affected()
    }

    fn close(&mut self) {
        self.inner.close();
    }

    fn read(&mut self) -> Result<bool> {
        self.backend_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read()
    }

    fn next_result(&mut self) -> Result<bool> {
        self.backend_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.next_result()
    }

    fn name(&self, ordinal: usize) -> Result<&str> {
        self.inner.name(ordinal)
    }

    fn data_type_name(&self, ordinal: usize) -> Result<String> {
        self.inner.data_type_name(ordinal)
    }

    fn value(&self, ordinal: usize) -> Result<DatabaseValue> {
        self.inner.value(ordinal)
    }
}

#[async_trait]
impl AsyncRowCursor for SpyReader {
    async fn read_async(&mut self, _cancel: &CancellationToken) -> Result<bool> {
        self.read()
    }

    async fn next_result_async(&mut self, _cancel: &CancellationToken) -> Result<bool> {
        self.next_result()
    }

    async fn is_null_async(&mut self, ordinal: usize, _cancel: &CancellationToken) -> Result<bool> {
        self.backend_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.is_null(ordinal)
    }
}

fn spy_cursor() -> Result<(SequentialRowCursor<SpyReader>, Arc<AtomicUsize>)> {
    let set = MemoryResultSet::new(["id"]).with_row([1.into()])?;
    let backend_reads = Arc::new(AtomicUsize::new(0));
    let reader = SpyReader {
        inner: MemoryReader::new(vec![set]),
        backend_reads: Arc::clone(&backend_reads),
    };
    Ok((SequentialRowCursor::new(reader), backend_reads))
}

#[tokio::test]
async fn test_cancelled_token_skips_backend() -> Result<()> {
    let (mut cursor, backend_reads) = spy_cursor()?;
    let token = CancellationToken::new();
    token.cancel();

    assert!(matches!(
        cursor.read_async_with(&token).await,
        Err(DatabaseError::OperationCanceled)
    ));
    assert!(matches!(
        cursor.next_result_async_with(&token).await,
        Err(DatabaseError::OperationCanceled)
    ));
    assert!(matches!(
        cursor.is_null_async_with(0, &token).await,
        Err(DatabaseError::OperationCanceled)
    ));
    assert_eq!(backend_reads.load(Ordering::SeqCst), 0);

    // The cursor is still usable with a live token
    let live = CancellationToken::new();
    assert!(cursor.read_async_with(&live).await?);
    assert!(!cursor.is_null_async_with(0, &live).await?);
    assert_eq!(backend_reads.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn test_memory_reader_honors_cancellation() -> Result<()> {
    let mut reader = MemoryReader::new(vec![MemoryResultSet::new(["id"]).with_row([1.into()])?]);
    let token = CancellationToken::new();
    token.cancel();

    let result = reader.read_async(&token).await;
    assert!(matches!(result, Err(ref e) if e.is_canceled()));
    // Nothing was consumed
    assert!(reader.read()?);
    Ok(())
}

#[tokio::test]
async fn test_disposed_cursor_rejects_every_call() -> Result<()> {
    let mut cursor = person_cursor()?;
    assert!(cursor.read_async().await?);
    cursor.dispose();

    assert!(cursor.is_closed());
    assert!(matches!(
        cursor.get::<i32>("age"),
        Err(DatabaseError::ObjectDisposed(_))
    ));
    assert!(matches!(
        cursor.column_exists("age"),
        Err(DatabaseError::ObjectDisposed(_))
    ));
    assert!(matches!(
        cursor.next_result_async().await,
        Err(DatabaseError::ObjectDisposed(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_schema_reports_declared_and_inferred_types() -> Result<()> {
    let set = MemoryResultSet::new(["id", "label"])
        .with_data_types([Some("INTEGER".to_string()), None])?
        .with_row([1.into(), "a".into()])?;
    let mut cursor = SequentialRowCursor::new(MemoryReader::new(vec![set]));
    assert!(cursor.read_async().await?);

    let schema = cursor.schema()?;
    assert_eq!(schema.len(), 2);
    assert_eq!(schema[0].name, "id");
    assert_eq!(schema[0].data_type, "INTEGER");
    assert_eq!(schema[1].ordinal, 1);
    assert_eq!(schema[1].data_type, "string");
    Ok(())
}
