//! SQLite backend
//!
//! rusqlite is blocking, so every round trip runs on the blocking pool and is raced
//! against the command timeout. Result sets are buffered into a [`SqliteReader`] whose
//! asynchronous hooks complete immediately.

use super::memory::{MemoryReader, MemoryResultSet};
use crate::core::coerce::Coercer;
use crate::core::cursor::SequentialRowCursor;
use crate::core::database::{CommandOptions, Database};
use crate::core::database_types::DatabaseType;
use crate::core::error::{DatabaseError, Result};
use crate::core::reader::{completed, AsyncRowCursor, DataReader};
use crate::core::value::DatabaseValue;
use async_trait::async_trait;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Batch, Connection, Row};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Run `f` on the blocking pool, aborting it once `timeout` elapses
async fn run_blocking<T, F>(
    timeout: Duration,
    on_timeout: fn(u64) -> DatabaseError,
    f: F,
) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let mut task = tokio::task::spawn_blocking(f);

    tokio::select! {
        result = &mut task => {
            result.map_err(|e| DatabaseError::other(format!("Task join error: {}", e)))?
        }
        _ = tokio::time::sleep(timeout) => {
            task.abort();
            Err(on_timeout(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)))
        }
    }
}

fn not_connected() -> DatabaseError {
    DatabaseError::connection("Not connected to database")
}

/// Convert a parameter into an owned SQLite value
fn to_sql_value(value: &DatabaseValue) -> Value {
    match value {
        DatabaseValue::Null => Value::Null,
        DatabaseValue::Bool(v) => Value::Integer(i64::from(*v)),
        DatabaseValue::Byte(v) => Value::Integer(i64::from(*v)),
        DatabaseValue::Short(v) => Value::Integer(i64::from(*v)),
        DatabaseValue::Int(v) => Value::Integer(i64::from(*v)),
        DatabaseValue::Long(v) => Value::Integer(*v),
        DatabaseValue::Float(v) => Value::Real(f64::from(*v)),
        DatabaseValue::Double(v) => Value::Real(*v),
        DatabaseValue::String(v) => Value::Text(v.clone()),
        DatabaseValue::Bytes(v) => Value::Blob(v.clone()),
        DatabaseValue::Timestamp(v) => Value::Integer(*v),
        DatabaseValue::Decimal(v) => Value::Text(v.to_string()),
        DatabaseValue::Uuid(v) => Value::Text(v.hyphenated().to_string()),
    }
}

/// Rows changed by the statement that just ran
///
/// `sqlite3_changes` keeps the count of the last INSERT, UPDATE or DELETE, so a DDL
/// statement following DML would report stale rows. The connection-wide total only
/// moves when the statement itself changed rows.
fn statement_changes(conn: &Connection, total_before: u64) -> u64 {
    if conn.total_changes() == total_before {
        0
    } else {
        conn.changes()
    }
}

fn row_values(row: &Row<'_>, column_count: usize) -> rusqlite::Result<Vec<DatabaseValue>> {
    (0..column_count)
        .map(|i| {
            Ok(match row.get_ref(i)? {
                ValueRef::Null => DatabaseValue::Null,
                ValueRef::Integer(v) => DatabaseValue::Long(v),
                ValueRef::Real(v) => DatabaseValue::Double(v),
                ValueRef::Text(v) => DatabaseValue::String(String::from_utf8_lossy(v).into_owned()),
                ValueRef::Blob(v) => DatabaseValue::Bytes(v.to_vec()),
            })
        })
        .collect()
}

/// Run every statement of `sql`, buffering each one that yields columns
///
/// Parameters bind positionally to each statement, up to its parameter count.
fn run_batch(conn: &Connection, sql: &str, params: &[DatabaseValue]) -> Result<MemoryReader> {
    let mut batch = Batch::new(conn, sql);
    let mut sets = Vec::new();
    let mut affected: Option<u64> = None;

    while let Some(mut stmt) = batch.next()? {
        for (index, param) in params.iter().take(stmt.parameter_count()).enumerate() {
            stmt.raw_bind_parameter(index + 1, to_sql_value(param))?;
        }

        let column_count = stmt.column_count();
        if column_count == 0 {
            let total_before = conn.total_changes();
            stmt.raw_execute()?;
            affected = Some(affected.unwrap_or(0) + statement_changes(conn, total_before));
            continue;
        }

        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let data_types: Vec<Option<String>> = stmt
            .columns()
            .iter()
            .map(|column| column.decl_type().map(String::from))
            .collect();
        let mut set = MemoryResultSet::new(names).with_data_types(data_types)?;

        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next()? {
            set.push_row(row_values(row, column_count)?)?;
        }
        sets.push(set);
    }

    let reader = MemoryReader::new(sets);
    Ok(match affected {
        Some(count) => reader.with_records_affected(count),
        None => reader,
    })
}

/// Buffered SQLite cursor
#[derive(Debug)]
pub struct SqliteReader {
    inner: MemoryReader,
}

impl DataReader for SqliteReader {
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
        self.inner.read()
    }

    fn next_result(&mut self) -> Result<bool> {
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
impl AsyncRowCursor for SqliteReader {
    async fn read_async(&mut self, cancel: &CancellationToken) -> Result<bool> {
        completed(cancel, || self.inner.read())
    }

    async fn next_result_async(&mut self, cancel: &CancellationToken) -> Result<bool> {
        completed(cancel, || self.inner.next_result())
    }

    async fn is_null_async(&mut self, ordinal: usize, cancel: &CancellationToken) -> Result<bool> {
        completed(cancel, || self.inner.is_null(ordinal))
    }
}

/// SQLite database implementation
pub struct SqliteDatabase {
    connection: Arc<Mutex<Option<Connection>>>,
    in_transaction: Arc<Mutex<bool>>,
    options: CommandOptions,
    coercer: Coercer,
}

impl SqliteDatabase {
    /// Create a new SQLite database instance with default options
    pub fn new() -> Self {
        Self::with_options(CommandOptions::default())
    }

    /// Create a new SQLite database instance with the given command options
    pub fn with_options(options: CommandOptions) -> Self {
        Self {
            connection: Arc::new(Mutex::new(None)),
            in_transaction: Arc::new(Mutex::new(false)),
            options,
            coercer: Coercer::default(),
        }
    }

    /// Replace the coercer handed to new cursors
    pub fn with_coercer(mut self, coercer: Coercer) -> Self {
        self.coercer = coercer;
        self
    }

    /// Run `f` against the open connection on the blocking pool
    async fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let connection_arc = Arc::clone(&self.connection);
        run_blocking(self.options.timeout, DatabaseError::query_timeout, move || {
            let connection = connection_arc.blocking_lock();
            let conn = connection.as_ref().ok_or_else(not_connected)?;
            f(conn)
        })
        .await
    }

    /// Run a transaction control statement, flipping the flag only on success
    async fn transaction_control(&self, sql: &'static str, begin: bool) -> Result<()> {
        let connection_arc = Arc::clone(&self.connection);
        let in_transaction_arc = Arc::clone(&self.in_transaction);

        run_blocking(self.options.timeout, DatabaseError::query_timeout, move || {
            let mut in_transaction = in_transaction_arc.blocking_lock();
            let connection = connection_arc.blocking_lock();
            let conn = connection.as_ref().ok_or_else(not_connected)?;

            if *in_transaction == begin {
                return Err(DatabaseError::transaction(if begin {
                    "Already in a transaction"
                } else {
                    "Not in a transaction"
                }));
            }

            conn.execute_batch(sql)?;
            *in_transaction = begin;
            Ok(())
        })
        .await
    }
}

impl Default for SqliteDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    type Reader = SqliteReader;

    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn coercer(&self) -> &Coercer {
        &self.coercer
    }

    fn options(&self) -> &CommandOptions {
        &self.options
    }

    async fn connect(&self, connection_string: &str) -> Result<()> {
        if connection_string.trim().is_empty() {
            return Err(DatabaseError::invalid_argument(
                "connection string must not be blank",
            ));
        }

        *self.connection.lock().await = None;
        *self.in_transaction.lock().await = false;

        let path = connection_string.to_string();
        let connection_arc = Arc::clone(&self.connection);
        run_blocking(
            self.options.timeout,
            DatabaseError::connection_timeout,
            move || {
                let conn = Connection::open(&path)?;
                conn.execute_batch("PRAGMA foreign_keys = ON")?;
                *connection_arc.blocking_lock() = Some(conn);
                Ok(())
            },
        )
        .await?;

        tracing::debug!(path = connection_string, "sqlite connection opened");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connection
            .try_lock()
            .map(|conn| conn.is_some())
            .unwrap_or(false)
    }

    async fn disconnect(&self) -> Result<()> {
        *self.in_transaction.lock().await = false;
        *self.connection.lock().await = None;
        tracing::debug!("sqlite connection closed");
        Ok(())
    }

    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> Result<u64> {
        tracing::debug!(sql, params = params.len(), "executing sqlite command");
        let sql = sql.to_string();
        let params: Vec<Value> = params.iter().map(to_sql_value).collect();

        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let total_before = conn.total_changes();
            stmt.execute(rusqlite::params_from_iter(params.iter()))?;
            Ok(statement_changes(conn, total_before))
        })
        .await
    }

    async fn execute_reader(
        &self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> Result<SequentialRowCursor<SqliteReader>> {
        tracing::debug!(sql, params = params.len(), "opening sqlite reader");
        let sql = sql.to_string();
        let params = params.to_vec();

        let inner = self
            .with_connection(move |conn| run_batch(conn, &sql, &params))
            .await?;
        Ok(SequentialRowCursor::with_coercer(
            SqliteReader { inner },
            self.coercer.clone(),
        ))
    }

    async fn begin_transaction(&self) -> Result<()> {
        self.transaction_control("BEGIN TRANSACTION", true).await
    }

    async fn commit(&self) -> Result<()> {
        self.transaction_control("COMMIT", false).await
    }

    async fn rollback(&self) -> Result<()> {
        self.transaction_control("ROLLBACK", false).await
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
            .try_lock()
            .map(|guard| *guard)
            .unwrap_or(false)
    }
}

impl Drop for SqliteDatabase {
    fn drop(&mut self) {
        // best effort; Drop cannot await
        if let (Ok(in_transaction), Ok(connection)) =
            (self.in_transaction.try_lock(), self.connection.try_lock())
        {
            if let (true, Some(conn)) = (*in_transaction, connection.as_ref()) {
                let _ = conn.execute_batch("ROLLBACK");
            }
        }
    }
}
