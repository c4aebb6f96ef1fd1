//! Error types for the data reader
//!
//! This module defines every error that cursor, coercion and backend operations can surface.
//! A null column value is never an error; it is resolved by the accessor variant in use.

/// Result type alias for reader and coercion operations
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Error types for reader, coercion and backend operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Invalid input to a constructor or registry call (blank identifier, bad arity)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Column name did not resolve to any ordinal in the current result shape
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Value could not be coerced to the requested type
    #[error("Invalid cast from {from} to {to}")]
    InvalidCast { from: String, to: String },

    /// Strict positional getter found a different stored type
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Ordinal outside of `0..field_count`
    #[error("Ordinal {ordinal} is out of range for {field_count} columns")]
    IndexOutOfRange { ordinal: usize, field_count: usize },

    /// Operation is not valid in the cursor's current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Asynchronous operation observed cancellation
    #[error("Operation was canceled")]
    OperationCanceled,

    /// Operation attempted after the owning object was disposed
    #[error("Object disposed: {0}")]
    ObjectDisposed(String),

    /// Connection error (generic)
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Connection timeout
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout { timeout_ms: u64 },

    /// Query execution error
    #[error("Query execution error: {0}")]
    QueryError(String),

    /// Query timeout
    #[error("Query timeout after {timeout_ms}ms")]
    QueryTimeout { timeout_ms: u64 },

    /// Transaction error
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// Unsupported operation
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// SQLite error
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// PostgreSQL error
    #[cfg(feature = "postgres")]
    #[error("PostgreSQL error: {0}")]
    PostgresError(#[from] tokio_postgres::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl DatabaseError {
    /// Create an invalid argument error
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        DatabaseError::InvalidArgument(msg.into())
    }

    /// Create a column not found error
    pub fn column_not_found<S: Into<String>>(name: S) -> Self {
        DatabaseError::ColumnNotFound(name.into())
    }

    /// Create an invalid cast error
    pub fn invalid_cast(from: &str, to: &str) -> Self {
        DatabaseError::InvalidCast {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Create a new type mismatch error
    pub fn type_mismatch(expected: &str, actual: &str) -> Self {
        DatabaseError::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create an ordinal out of range error
    pub fn index_out_of_range(ordinal: usize, field_count: usize) -> Self {
        DatabaseError::IndexOutOfRange {
            ordinal,
            field_count,
        }
    }

    /// Create an invalid operation error
    pub fn invalid_operation<S: Into<String>>(msg: S) -> Self {
        DatabaseError::InvalidOperation(msg.into())
    }

    /// Create an object disposed error
    pub fn object_disposed<S: Into<String>>(object: S) -> Self {
        DatabaseError::ObjectDisposed(object.into())
    }

    /// Create a new connection error (generic)
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        DatabaseError::ConnectionError(msg.into())
    }

    /// Create a connection timeout error
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        DatabaseError::ConnectionTimeout { timeout_ms }
    }

    /// Create a new query error
    pub fn query<S: Into<String>>(msg: S) -> Self {
        DatabaseError::QueryError(msg.into())
    }

    /// Create a query timeout error
    pub fn query_timeout(timeout_ms: u64) -> Self {
        DatabaseError::QueryTimeout { timeout_ms }
    }

    /// Create a new transaction error
    pub fn transaction<S: Into<String>>(msg: S) -> Self {
        DatabaseError::TransactionError(msg.into())
    }

    /// Create a new unsupported operation error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        DatabaseError::UnsupportedOperation(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Other(msg.into())
    }

    /// True when the error is the canceled terminal state of an async operation
    pub fn is_canceled(&self) -> bool {
        matches!(self, DatabaseError::OperationCanceled)
    }
}
