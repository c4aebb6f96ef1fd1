//! PostgreSQL backend
//!
//! Rows stream from the server through tokio-postgres' native [`RowStream`], so
//! [`PostgresReader`] has real asynchronous reads. A cancellation raised while a read is
//! waiting stops the wait and forwards a cancel request to the server.

use crate::core::coerce::Coercer;
use crate::core::convert::{change_type, timestamp_to_datetime};
use crate::core::cursor::SequentialRowCursor;
use crate::core::database::{CommandOptions, Database};
use crate::core::database_types::DatabaseType;
use crate::core::error::{DatabaseError, Result};
use crate::core::reader::{completed, AsyncRowCursor, DataReader};
use crate::core::value::{DatabaseValue, ValueKind};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures_util::StreamExt;
use rust_decimal::Decimal;
use std::error::Error;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::Mutex;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::{CancelToken, Client, NoTls, Row, RowStream};
use tokio_util::bytes::BytesMut;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Conversion-table kind used to bind a parameter of the given server type
fn wire_kind(ty: &Type) -> Option<ValueKind> {
    match *ty {
        Type::BOOL => Some(ValueKind::Bool),
        Type::INT2 => Some(ValueKind::Short),
        Type::INT4 => Some(ValueKind::Int),
        Type::INT8 => Some(ValueKind::Long),
        Type::FLOAT4 => Some(ValueKind::Float),
        Type::FLOAT8 => Some(ValueKind::Double),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            Some(ValueKind::String)
        }
        Type::BYTEA => Some(ValueKind::Bytes),
        Type::TIMESTAMP | Type::TIMESTAMPTZ | Type::DATE => Some(ValueKind::Timestamp),
        Type::NUMERIC => Some(ValueKind::Decimal),
        Type::UUID => Some(ValueKind::Uuid),
        _ => None,
    }
}

impl ToSql for DatabaseValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn Error + Sync + Send>> {
        if self.is_null() {
            return Ok(IsNull::Yes);
        }
        let kind = wire_kind(ty)
            .ok_or_else(|| format!("cannot bind {} to a {} parameter", self.type_name(), ty))?;

        match change_type(self, kind)? {
            DatabaseValue::Bool(v) => v.to_sql(ty, out),
            DatabaseValue::Short(v) => v.to_sql(ty, out),
            DatabaseValue::Int(v) => v.to_sql(ty, out),
            DatabaseValue::Long(v) => v.to_sql(ty, out),
            DatabaseValue::Float(v) => v.to_sql(ty, out),
            DatabaseValue::Double(v) => v.to_sql(ty, out),
            DatabaseValue::String(v) => v.to_sql(ty, out),
            DatabaseValue::Bytes(v) => v.to_sql(ty, out),
            DatabaseValue::Timestamp(micros) => {
                let dt = timestamp_to_datetime(micros).ok_or("timestamp out of range")?;
                match *ty {
                    Type::TIMESTAMP => dt.naive_utc().to_sql(ty, out),
                    Type::DATE => dt.date_naive().to_sql(ty, out),
                    _ => dt.to_sql(ty, out),
                }
            }
            DatabaseValue::Decimal(v) => v.to_sql(ty, out),
            DatabaseValue::Uuid(v) => v.to_sql(ty, out),
            other => Err(format!("cannot bind {} to a {} parameter", other.type_name(), ty).into()),
        }
    }

    // nulls bind to any type; non-null values are checked in to_sql
    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Decode one column of a row
fn column_value(row: &Row, idx: usize, ty: &Type) -> Result<DatabaseValue> {
    let value: DatabaseValue = match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.into(),
        Type::CHAR => row
            .try_get::<_, Option<i8>>(idx)?
            .map(i16::from)
            .into(),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.into(),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.into(),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.into(),
        Type::OID => row
            .try_get::<_, Option<u32>>(idx)?
            .map(i64::from)
            .into(),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx)?.into(),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.into(),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx)?.into(),
        Type::TIMESTAMPTZ => row.try_get::<_, Option<DateTime<Utc>>>(idx)?.into(),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|naive| naive.and_utc())
            .into(),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
            .into(),
        Type::NUMERIC => row.try_get::<_, Option<Decimal>>(idx)?.into(),
        Type::UUID => row.try_get::<_, Option<Uuid>>(idx)?.into(),
        _ => row.try_get::<_, Option<String>>(idx).map_err(|_| {
            DatabaseError::unsupported(format!("column type {} cannot be decoded", ty))
        })?.into(),
    };
    Ok(value)
}

/// Streaming PostgreSQL cursor
///
/// A command yields exactly one result set. A read canceled mid-flight ends the
/// stream; later reads return `false`.
pub struct PostgresReader {
    columns: Vec<(String, Type)>,
    stream: Option<Pin<Box<RowStream>>>,
    current: Option<Row>,
    cancel_token: CancelToken,
    records_affected: Option<u64>,
    past_last_result: bool,
    closed: bool,
}

impl PostgresReader {
    fn new(columns: Vec<(String, Type)>, stream: RowStream, cancel_token: CancelToken) -> Self {
        Self {
            columns,
            stream: Some(Box::pin(stream)),
            current: None,
            cancel_token,
            records_affected: None,
            past_last_result: false,
            closed: false,
        }
    }

    fn active_stream(&mut self) -> Option<&mut Pin<Box<RowStream>>> {
        if self.closed || self.past_last_result {
            return None;
        }
        self.stream.as_mut()
    }

    fn advance(
        &mut self,
        next: Option<std::result::Result<Row, tokio_postgres::Error>>,
    ) -> Result<bool> {
        match next {
            Some(Ok(row)) => {
                self.current = Some(row);
                Ok(true)
            }
            Some(Err(e)) => {
                self.current = None;
                self.stream = None;
                Err(e.into())
            }
            None => {
                self.current = None;
                if let Some(stream) = self.stream.take() {
                    self.records_affected = stream.rows_affected();
                }
                Ok(false)
            }
        }
    }

    /// Drop the in-flight stream and ask the server to cancel the running query
    fn cancel_in_flight(&mut self) {
        self.stream = None;
        self.current = None;

        let token = self.cancel_token.clone();
        tokio::spawn(async move {
            if let Err(e) = token.cancel_query(NoTls).await {
                tracing::warn!(error = %e, "postgres cancel request failed");
            }
        });
    }

    fn check_ordinal(&self, ordinal: usize) -> Result<()> {
        let field_count = self.field_count();
        if ordinal >= field_count {
            return Err(DatabaseError::index_out_of_range(ordinal, field_count));
        }
        Ok(())
    }
}

impl DataReader for PostgresReader {
    fn field_count(&self) -> usize {
        if self.closed || self.past_last_result {
            0
        } else {
            self.columns.len()
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn records_affected(&self) -> Option<u64> {
        self.records_affected
    }

    fn close(&mut self) {
        self.closed = true;
        self.stream = None;
        self.current = None;
    }

    /// Blocking read, available on a multi-threaded tokio runtime only
    fn read(&mut self) -> Result<bool> {
        if self.active_stream().is_none() {
            return Ok(false);
        }

        let handle = Handle::try_current().map_err(|_| {
            DatabaseError::unsupported("synchronous postgres reads require a tokio runtime")
        })?;
        if !matches!(handle.runtime_flavor(), RuntimeFlavor::MultiThread) {
            return Err(DatabaseError::unsupported(
                "synchronous postgres reads require a multi-threaded runtime",
            ));
        }

        let next = match self.active_stream() {
            Some(stream) => tokio::task::block_in_place(|| handle.block_on(stream.next())),
            None => return Ok(false),
        };
        self.advance(next)
    }

    fn next_result(&mut self) -> Result<bool> {
        if !self.closed {
            self.past_last_result = true;
            self.stream = None;
            self.current = None;
        }
        Ok(false)
    }

    fn name(&self, ordinal: usize) -> Result<&str> {
        self.check_ordinal(ordinal)?;
        Ok(self.columns[ordinal].0.as_str())
    }

    fn data_type_name(&self, ordinal: usize) -> Result<String> {
        self.check_ordinal(ordinal)?;
        Ok(self.columns[ordinal].1.name().to_string())
    }

    fn value(&self, ordinal: usize) -> Result<DatabaseValue> {
        self.check_ordinal(ordinal)?;
        let row = self
            .current
            .as_ref()
            .ok_or_else(|| DatabaseError::invalid_operation("no current row"))?;
        column_value(row, ordinal, &self.columns[ordinal].1)
    }
}

#[async_trait]
impl AsyncRowCursor for PostgresReader {
    async fn read_async(&mut self, cancel: &CancellationToken) -> Result<bool> {
        let Some(stream) = self.active_stream() else {
            return Ok(false);
        };

        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            next = stream.next() => Some(next),
        };

        match next {
            Some(next) => self.advance(next),
            None => {
                self.cancel_in_flight();
                Err(DatabaseError::OperationCanceled)
            }
        }
    }

    async fn next_result_async(&mut self, cancel: &CancellationToken) -> Result<bool> {
        completed(cancel, || self.next_result())
    }

    async fn is_null_async(&mut self, ordinal: usize, cancel: &CancellationToken) -> Result<bool> {
        completed(cancel, || self.is_null(ordinal))
    }
}

/// PostgreSQL database implementation
pub struct PostgresDatabase {
    client: Arc<Mutex<Option<Client>>>,
    in_transaction: Arc<Mutex<bool>>,
    options: CommandOptions,
    coercer: Coercer,
}

impl PostgresDatabase {
    /// Create a new PostgreSQL database instance with default options
    pub fn new() -> Self {
        Self::with_options(CommandOptions::default())
    }

    /// Create a new PostgreSQL database instance with the given command options
    pub fn with_options(options: CommandOptions) -> Self {
        Self {
            client: Arc::new(Mutex::new(None)),
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

    async fn within_timeout<T, F>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.options.timeout, future)
            .await
            .map_err(|_| DatabaseError::query_timeout(self.options.timeout_ms()))?
    }

    async fn transaction_control(&self, sql: &str, begin: bool) -> Result<()> {
        let mut in_transaction = self.in_transaction.lock().await;
        if *in_transaction == begin {
            return Err(DatabaseError::transaction(if begin {
                "Already in a transaction"
            } else {
                "Not in a transaction"
            }));
        }

        let client = self.client.lock().await;
        let client = client
            .as_ref()
            .ok_or_else(|| DatabaseError::connection("Not connected to database"))?;

        self.within_timeout(async {
            client
                .batch_execute(sql)
                .await
                .map_err(|e| DatabaseError::transaction(e.to_string()))
        })
        .await?;

        *in_transaction = begin;
        Ok(())
    }
}

impl Default for PostgresDatabase {
    fn default() -> Self {
        Self::new()
    }
}

fn param_refs(params: &[DatabaseValue]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

#[async_trait]
impl Database for PostgresDatabase {
    type Reader = PostgresReader;

    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgres
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

        *self.client.lock().await = None;
        *self.in_transaction.lock().await = false;

        let (client, connection) = tokio::time::timeout(
            self.options.timeout,
            tokio_postgres::connect(connection_string, NoTls),
        )
        .await
        .map_err(|_| DatabaseError::connection_timeout(self.options.timeout_ms()))?
        .map_err(|e| DatabaseError::connection(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "postgres connection error");
            }
        });

        *self.client.lock().await = Some(client);
        tracing::debug!("postgres connection opened");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.client
            .try_lock()
            .map(|client| client.as_ref().map_or(false, |c| !c.is_closed()))
            .unwrap_or(false)
    }

    async fn disconnect(&self) -> Result<()> {
        *self.in_transaction.lock().await = false;
        *self.client.lock().await = None;
        tracing::debug!("postgres connection closed");
        Ok(())
    }

    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> Result<u64> {
        tracing::debug!(sql, params = params.len(), "executing postgres command");
        let client = self.client.lock().await;
        let client = client
            .as_ref()
            .ok_or_else(|| DatabaseError::connection("Not connected to database"))?;

        let refs = param_refs(params);
        self.within_timeout(async {
            client
                .execute(sql, &refs)
                .await
                .map_err(|e| DatabaseError::query(e.to_string()))
        })
        .await
    }

    async fn execute_reader(
        &self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> Result<SequentialRowCursor<PostgresReader>> {
        tracing::debug!(sql, params = params.len(), "opening postgres reader");
        let client = self.client.lock().await;
        let client = client
            .as_ref()
            .ok_or_else(|| DatabaseError::connection("Not connected to database"))?;

        let (columns, stream) = self
            .within_timeout(async {
                let statement = client.prepare(sql).await?;
                let columns: Vec<(String, Type)> = statement
                    .columns()
                    .iter()
                    .map(|c| (c.name().to_string(), c.type_().clone()))
                    .collect();
                let stream = client.query_raw(&statement, param_refs(params)).await?;
                Ok::<_, DatabaseError>((columns, stream))
            })
            .await?;

        let reader = PostgresReader::new(columns, stream, client.cancel_token());
        Ok(SequentialRowCursor::with_coercer(reader, self.coercer.clone()))
    }

    async fn begin_transaction(&self) -> Result<()> {
        self.transaction_control("BEGIN", true).await
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
