//! Integration tests for the SQLite backend
//!
//! These tests drive the full stack, from command execution to typed cursor reads:
//! - Concurrent access
//! - Transaction handling
//! - Coercion of loosely typed SQLite storage
//! - Error recovery

#![cfg(feature = "sqlite")]

use chrono::{DateTime, TimeZone, Utc};
use rust_data_reader::prelude::*;
use std::sync::Arc;
use std::time::Duration;

async fn connected() -> Result<Arc<SqliteDatabase>> {
    let db = Arc::new(SqliteDatabase::new());
    db.connect(":memory:").await?;
    Ok(db)
}

#[tokio::test]
async fn test_concurrent_access() -> Result<()> {
    let db = connected().await?;
    db.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, value INTEGER)", &[])
        .await?;

    let mut handles = vec![];
    for i in 0..10i64 {
        let db = Arc::clone(&db);
        handles.push(tokio::spawn(async move {
            db.execute(
                "INSERT INTO test (id, value) VALUES (?1, ?2)",
                &[i.into(), (i * 10).into()],
            )
            .await
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| DatabaseError::other(e.to_string()))??;
    }

    let count: i64 = db.execute_scalar("SELECT COUNT(*) FROM test", &[]).await?;
    assert_eq!(count, 10);

    let total: i32 = db.execute_scalar("SELECT SUM(value) FROM test", &[]).await?;
    assert_eq!(total, 450);
    Ok(())
}

#[tokio::test]
async fn test_loosely_typed_columns() -> Result<()> {
    let db = connected().await?;
    db.execute(
        "CREATE TABLE people (
            id INTEGER PRIMARY KEY,
            name TEXT,
            active TEXT,
            score REAL,
            joined TEXT,
            manager_id INTEGER,
            avatar BLOB
        )",
        &[],
    )
    .await?;
    db.execute(
        "INSERT INTO people (name, active, score, joined, manager_id, avatar)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        &[
            "  Ann  ".into(),
            "Y".into(),
            2.5f64.into(),
            "2024-03-01 12:30:00".into(),
            DatabaseValue::Null,
            vec![1u8, 2, 3].into(),
        ],
    )
    .await?;

    let mut cursor = db.execute_reader("SELECT * FROM people", &[]).await?;
    assert!(cursor.read_async().await?);

    assert_eq!(cursor.get::<i32>("id")?, 1);
    assert_eq!(cursor.get::<String>("name")?, "Ann");
    assert!(cursor.get::<bool>("active")?);
    assert_eq!(cursor.get::<f32>("score")?, 2.5);
    // 2.5 rounds half to even
    assert_eq!(cursor.get::<i64>("score")?, 2);
    assert_eq!(
        cursor.get_nullable::<DateTime<Utc>>("joined")?,
        Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap())
    );
    assert_eq!(cursor.get_nullable::<i64>("manager_id")?, None);
    assert_eq!(cursor.get_or("manager_id", -1i64)?, -1);
    assert_eq!(cursor.get::<Vec<u8>>("avatar")?, vec![1, 2, 3]);

    assert!(!cursor.column_exists("salary")?);
    assert!(matches!(
        cursor.get::<i32>("salary"),
        Err(DatabaseError::ColumnNotFound(_))
    ));

    assert!(!cursor.read_async().await?);
    assert!(!cursor.read_async().await?);
    Ok(())
}

#[tokio::test]
async fn test_unparseable_values_fail_to_cast() -> Result<()> {
    let db = connected().await?;
    let mut cursor = db
        .execute_reader("SELECT 'maybe' AS flag, 'abc' AS amount", &[])
        .await?;
    assert!(cursor.read_async().await?);

    assert!(matches!(
        cursor.get::<bool>("flag"),
        Err(DatabaseError::InvalidCast { .. })
    ));
    assert!(matches!(
        cursor.get::<i32>("amount"),
        Err(DatabaseError::InvalidCast { .. })
    ));
    assert_eq!(
        cursor.coercer().cast_or_default::<i32>(cursor.value_by_name("amount")?),
        0
    );
    Ok(())
}

#[tokio::test]
async fn test_transaction_rollback_on_error() -> Result<()> {
    let db = connected().await?;
    db.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, value TEXT)", &[])
        .await?;

    db.begin_transaction().await?;
    db.execute("INSERT INTO test (id, value) VALUES (1, 'first')", &[])
        .await?;
    let duplicate = db
        .execute("INSERT INTO test (id, value) VALUES (1, 'again')", &[])
        .await;
    assert!(matches!(duplicate, Err(DatabaseError::SqliteError(_))));
    db.rollback().await?;

    let count: i64 = db.execute_scalar("SELECT COUNT(*) FROM test", &[]).await?;
    assert_eq!(count, 0);
    Ok(())
}

#[tokio::test]
async fn test_transaction_guard_spans_reads_and_writes() -> Result<()> {
    let db = connected().await?;
    db.execute("CREATE TABLE accounts (id INTEGER PRIMARY KEY, balance INTEGER)", &[])
        .await?;
    db.execute("INSERT INTO accounts VALUES (1, 500), (2, 0)", &[])
        .await?;

    let tx = TransactionGuard::begin(Arc::clone(&db)).await?;
    tx.execute(
        "UPDATE accounts SET balance = balance - ?1 WHERE id = 1",
        &[100.into()],
    )
    .await?;
    tx.execute(
        "UPDATE accounts SET balance = balance + ?1 WHERE id = 2",
        &[100.into()],
    )
    .await?;

    let mut cursor = tx
        .execute_reader("SELECT id, balance FROM accounts ORDER BY id", &[])
        .await?;
    let mut balances = Vec::new();
    while cursor.read_async().await? {
        balances.push(cursor.get::<i32>("balance")?);
    }
    cursor.dispose();
    assert_eq!(balances, [400, 100]);

    tx.commit().await?;
    assert!(!db.in_transaction());
    Ok(())
}

#[tokio::test]
async fn test_error_recovery() -> Result<()> {
    let db = connected().await?;

    assert!(db.execute("SELECT * FROM missing_table", &[]).await.is_err());
    assert!(db.execute_reader("THIS IS NOT SQL", &[]).await.is_err());

    // The connection is still usable afterwards
    let one: i32 = db.execute_scalar("SELECT 1", &[]).await?;
    assert_eq!(one, 1);
    Ok(())
}

#[tokio::test]
async fn test_scalar_defaults() -> Result<()> {
    let db = connected().await?;
    db.execute("CREATE TABLE empty (id INTEGER)", &[]).await?;

    let missing: i64 = db.execute_scalar("SELECT id FROM empty", &[]).await?;
    assert_eq!(missing, 0);

    let null: String = db.execute_scalar("SELECT NULL", &[]).await?;
    assert_eq!(null, "");
    Ok(())
}

#[tokio::test]
async fn test_cancelled_read() -> Result<()> {
    let db = connected().await?;
    let mut cursor = db.execute_reader("SELECT 1 AS id", &[]).await?;

    let token = CancellationToken::new();
    token.cancel();
    assert!(matches!(
        cursor.read_async_with(&token).await,
        Err(DatabaseError::OperationCanceled)
    ));

    // Cancellation consumed nothing
    assert!(cursor.read_async().await?);
    assert_eq!(cursor.get::<i32>("id")?, 1);
    Ok(())
}

#[tokio::test]
async fn test_file_database_with_options() -> Result<()> {
    let path = std::env::temp_dir().join(format!("rust_data_reader_{}.db", std::process::id()));
    let connection_string = ConnectionBuilder::new(DatabaseType::Sqlite)
        .database(path.to_string_lossy())
        .timeout(Duration::from_secs(5))
        .build_connection_string();

    let options = CommandOptions::default().with_timeout(Duration::from_secs(5));
    let db = SqliteDatabase::with_options(options);
    db.connect(&connection_string).await?;
    db.execute("CREATE TABLE IF NOT EXISTS kv (k TEXT PRIMARY KEY, v TEXT)", &[])
        .await?;
    db.execute("INSERT OR REPLACE INTO kv VALUES ('answer', '42')", &[])
        .await?;
    let answer: u8 = db
        .execute_scalar("SELECT v FROM kv WHERE k = ?1", &["answer".into()])
        .await?;
    assert_eq!(answer, 42);
    db.disconnect().await?;

    let _ = std::fs::remove_file(&path);
    Ok(())
}
