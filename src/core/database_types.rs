//! Backend identifiers
//!
//! Names the backends a cursor can come from and what each one offers natively.

use super::error::DatabaseError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum DatabaseType {
    /// No backend selected
    #[default]
    None = 0,
    /// PostgreSQL through tokio-postgres
    Postgres = 1,
    /// SQLite through rusqlite
    Sqlite = 3,
}

impl DatabaseType {
    /// Convert database type to string representation
    pub fn to_str(&self) -> &'static str {
        match self {
            DatabaseType::None => "none",
            DatabaseType::Postgres => "postgres",
            DatabaseType::Sqlite => "sqlite",
        }
    }

    /// True when the backend streams rows with its own asynchronous primitive
    ///
    /// Backends without one complete their asynchronous cursor hooks synchronously.
    pub fn has_native_async_reads(&self) -> bool {
        matches!(self, DatabaseType::Postgres)
    }

    /// True when the backend's cargo feature is compiled in
    pub fn is_enabled(&self) -> bool {
        match self {
            DatabaseType::None => false,
            DatabaseType::Postgres => cfg!(feature = "postgres"),
            DatabaseType::Sqlite => cfg!(feature = "sqlite"),
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for DatabaseType {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(DatabaseType::None),
            "postgres" | "postgresql" | "pg" => Ok(DatabaseType::Postgres),
            "sqlite" | "sqlite3" => Ok(DatabaseType::Sqlite),
            _ => Err(DatabaseError::invalid_argument(format!(
                "Invalid database type: '{}'",
                s
            ))),
        }
    }
}
