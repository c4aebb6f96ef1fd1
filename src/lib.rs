//! # Rust Data Reader
//!
//! Typed, null-safe access to forward-only query results from heterogeneous database
//! backends, with one coercion engine turning loosely typed wire values into the Rust
//! types calling code asks for.
//!
//! ## Features
//!
//! - **Coercion engine**: [`Coercer::cast`] with nullable unwrapping, enum decoding,
//!   pluggable per-type handlers and an explicit conversion table
//! - **Row cursor**: [`SequentialRowCursor`] adds column-name lookup and default/null
//!   policy over any backend cursor, synchronously or asynchronously
//! - **Cancellation**: every asynchronous cursor call takes a
//!   [`CancellationToken`](tokio_util::sync::CancellationToken)
//! - **Thread-safe registry**: handlers live behind a `parking_lot` read/write lock
//! - **Backends**: in-memory (always), SQLite (`sqlite`, default) and PostgreSQL
//!   (`postgres`)
//!
//! ## Supported Backends
//!
//! | Backend | Feature | Asynchronous reads |
//! |---------|---------|--------------------|
//! | In-memory | always | completed synchronously |
//! | SQLite | `sqlite` | buffered, completed synchronously |
//! | PostgreSQL | `postgres` | native row stream with server-side cancel |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rust_data_reader::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let db = SqliteDatabase::new();
//!     db.connect(":memory:").await?;
//!
//!     db.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, active TEXT)", &[])
//!         .await?;
//!     db.execute(
//!         "INSERT INTO users (name, active) VALUES (?1, ?2)",
//!         &["Alice".into(), "yes".into()],
//!     )
//!     .await?;
//!
//!     let mut cursor = db.execute_reader("SELECT * FROM users", &[]).await?;
//!     while cursor.read_async().await? {
//!         let name: String = cursor.get("name")?;
//!         let active: bool = cursor.get("active")?;
//!         let nickname: Option<String> = cursor.get_nullable("name")?;
//!         println!("{name} active={active} nickname={nickname:?}");
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Coercion without a cursor
//!
//! ```rust
//! use rust_data_reader::prelude::*;
//!
//! let coercer = Coercer::default();
//! assert!(coercer.cast::<bool>(" Yes ".into()).unwrap());
//! assert_eq!(coercer.cast::<String>("  hello  ".into()).unwrap(), "hello");
//! assert_eq!(coercer.cast::<Option<i32>>(DatabaseValue::Null).unwrap(), None);
//! assert!(coercer.cast::<i32>(DatabaseValue::Null).is_err());
//! ```

/// Core types and traits
pub mod core;

/// Backend adapters
pub mod backends;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::backends::{MemoryReader, MemoryResultSet};
    pub use crate::core::{
        AsyncRowCursor, Coercer, CoercionRegistry, ColumnIndex, CommandOptions,
        ConnectionBuilder, DataReader, Database, DatabaseEnum, DatabaseError, DatabaseType,
        DatabaseValue, FromValue, Result, SequentialRowCursor, TransactionGuard, TypeKey,
    };
    pub use rust_decimal::Decimal;
    pub use tokio_util::sync::CancellationToken;
    pub use uuid::Uuid;

    #[cfg(feature = "sqlite")]
    pub use crate::backends::SqliteDatabase;

    #[cfg(feature = "postgres")]
    pub use crate::backends::PostgresDatabase;
}

// Re-export at root level for convenience
pub use crate::core::{
    Coercer, CoercionRegistry, ConnectionBuilder, Database, DatabaseError, DatabaseType,
    DatabaseValue, FromValue, Result, SequentialRowCursor, TransactionGuard,
};

#[cfg(feature = "sqlite")]
pub use crate::backends::SqliteDatabase;

#[cfg(feature = "postgres")]
pub use crate::backends::PostgresDatabase;
