//! Backend adapters
//!
//! Each backend supplies a [`DataReader`](crate::core::DataReader) plus the asynchronous
//! hooks of [`AsyncRowCursor`](crate::core::AsyncRowCursor). The in-memory backend is
//! always compiled; the others sit behind their cargo features.

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::{MemoryReader, MemoryResultSet};

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteDatabase, SqliteReader};

#[cfg(feature = "postgres")]
pub use postgres::{PostgresDatabase, PostgresReader};
