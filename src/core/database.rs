//! Command execution trait and connection configuration
//!
//! A [`Database`] produces [`SequentialRowCursor`]s for queries and drives the transaction
//! lifecycle. Backends implement it once; everything typed happens in the cursor.

use super::coerce::{Coercer, FromValue};
use super::cursor::SequentialRowCursor;
use super::database_types::DatabaseType;
use super::error::Result;
use super::reader::AsyncRowCursor;
use super::value::DatabaseValue;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Default timeout applied to backend commands (30 seconds)
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-connection command settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOptions {
    /// Upper bound for a single connect or command round trip
    pub timeout: Duration,
}

impl CommandOptions {
    /// Replace the command timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Timeout in whole milliseconds, as reported by timeout errors
    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

/// Command execution collaborator implemented by each backend
///
/// # Example
///
/// ```rust,no_run
/// use rust_data_reader::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let db = SqliteDatabase::new();
///     db.connect(":memory:").await?;
///
///     let mut cursor = db.execute_reader("SELECT 30 AS age, ' Ann ' AS name", &[]).await?;
///     while cursor.read_async().await? {
///         let age: i32 = cursor.get("age")?;
///         let name: String = cursor.get("name")?;
///         println!("{name} is {age}");
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait Database: Send + Sync {
    /// Backend cursor wrapped by the returned [`SequentialRowCursor`]
    type Reader: AsyncRowCursor + 'static;

    /// Get the database type
    fn database_type(&self) -> DatabaseType;

    /// Coercer handed to every cursor this database creates
    fn coercer(&self) -> &Coercer;

    /// Command settings in effect
    fn options(&self) -> &CommandOptions;

    /// Connect to the database with the given connection string
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::InvalidArgument`](super::DatabaseError::InvalidArgument)
    /// for a blank connection string.
    async fn connect(&self, connection_string: &str) -> Result<()>;

    /// Check if connected to the database
    fn is_connected(&self) -> bool;

    /// Disconnect from the database
    async fn disconnect(&self) -> Result<()>;

    /// Execute a command and return the number of changed rows
    ///
    /// Parameters bind positionally. Never format untrusted input into `sql`.
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> Result<u64>;

    /// Execute a query and return a cursor over its result sets
    async fn execute_reader(
        &self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> Result<SequentialRowCursor<Self::Reader>>;

    /// First column of the first row, coerced to `T`
    ///
    /// A null value or an empty result yields `T::default()`.
    async fn execute_scalar<T: FromValue + Default>(
        &self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> Result<T> {
        let mut cursor = self.execute_reader(sql, params).await?;
        if !cursor.read_async().await? || cursor.field_count()? == 0 {
            return Ok(T::default());
        }
        cursor.get_at(0)
    }

    /// Begin a transaction
    ///
    /// Fails when a transaction is already active on this connection.
    async fn begin_transaction(&self) -> Result<()>;

    /// Commit the current transaction
    async fn commit(&self) -> Result<()>;

    /// Rollback the current transaction
    async fn rollback(&self) -> Result<()>;

    /// Check if currently in a transaction
    fn in_transaction(&self) -> bool;
}

/// Database connection builder
#[derive(Debug, Clone)]
pub struct ConnectionBuilder {
    db_type: DatabaseType,
    host: Option<String>,
    port: Option<u16>,
    database: Option<String>,
    username: Option<String>,
    password: Option<String>,
    timeout: Option<Duration>,
    options: HashMap<String, String>,
}

impl ConnectionBuilder {
    /// Create a new connection builder for the specified database type
    pub fn new(db_type: DatabaseType) -> Self {
        Self {
            db_type,
            host: None,
            port: None,
            database: None,
            username: None,
            password: None,
            timeout: None,
            options: HashMap::new(),
        }
    }

    /// Set the database host
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the database port
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the database name (file path for SQLite)
    pub fn database<S: Into<String>>(mut self, database: S) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the username
    pub fn username<S: Into<String>>(mut self, username: S) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password
    pub fn password<S: Into<String>>(mut self, password: S) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the command timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add a custom option
    pub fn option<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Command settings derived from the builder
    pub fn command_options(&self) -> CommandOptions {
        let options = CommandOptions::default();
        match self.timeout {
            Some(timeout) => options.with_timeout(timeout),
            None => options,
        }
    }

    /// Build the connection string
    pub fn build_connection_string(&self) -> String {
        match self.db_type {
            DatabaseType::Sqlite => self
                .database
                .clone()
                .unwrap_or_else(|| ":memory:".to_string()),
            DatabaseType::Postgres => {
                let mut parts = Vec::new();
                if let Some(host) = &self.host {
                    parts.push(format!("host={}", quote_conninfo(host)));
                }
                if let Some(port) = self.port {
                    parts.push(format!("port={}", port));
                }
                if let Some(database) = &self.database {
                    parts.push(format!("dbname={}", quote_conninfo(database)));
                }
                if let Some(username) = &self.username {
                    parts.push(format!("user={}", quote_conninfo(username)));
                }
                if let Some(password) = &self.password {
                    parts.push(format!("password={}", quote_conninfo(password)));
                }
                if let Some(timeout) = self.timeout {
                    parts.push(format!("connect_timeout={}", timeout.as_secs().max(1)));
                }
                let mut extra: Vec<_> = self.options.iter().collect();
                extra.sort();
                for (key, value) in extra {
                    parts.push(format!("{}={}", key, quote_conninfo(value)));
                }
                parts.join(" ")
            }
            DatabaseType::None => String::new(),
        }
    }
}

/// Quote a `key=value` connection string value when it would not parse bare
///
/// Empty values and values holding whitespace, quotes or backslashes are wrapped in
/// single quotes with `'` and `\` escaped by a backslash.
fn quote_conninfo(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '\'' || c == '\\');
    if !needs_quotes {
        return value.to_string();
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}
