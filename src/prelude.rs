//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::config::{MysqlOptions, normalize_config};
pub use crate::driver::{Driver, QueryRequest};
pub use crate::error::{DriverError, SqlMiddlewareDbError};
pub use crate::handle::ConnectionHandle;
pub use crate::lifecycle::ConnectionState;
pub use crate::manager::{ConnectionManager, ConnectionMode};
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::types::{ExecutionMode, NestTables, RowValues};

#[cfg(feature = "mysql")]
pub use crate::mysql::MysqlDriver;
