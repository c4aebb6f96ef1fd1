//! Core types and traits
//!
//! Values, the coercion engine, the cursor contracts and the command collaborator
//! interfaces backends implement.

pub mod coerce;
pub mod convert;
pub mod cursor;
pub mod database;
pub mod database_types;
pub mod error;
pub mod reader;
pub mod registry;
pub mod transaction;
pub mod value;

// Re-export commonly used types
pub use coerce::{Coercer, DatabaseEnum, FromValue};
pub use convert::change_type;
pub use cursor::{ColumnIndex, SequentialRowCursor};
pub use database::{CommandOptions, ConnectionBuilder, Database, DEFAULT_COMMAND_TIMEOUT};
pub use database_types::DatabaseType;
pub use error::{DatabaseError, Result};
pub use reader::{completed, AsyncRowCursor, ColumnSchema, DataReader};
pub use registry::{parse_bool, CoercionRegistry, Handler, TypeKey};
pub use transaction::TransactionGuard;
pub use value::{DatabaseValue, ValueKind};
