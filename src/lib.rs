//! Lazy MySQL connection management.
//!
//! A [`ConnectionManager`] owns either one reusable connection or a pool for a
//! single target, deduplicates concurrent connects, and optionally logs every
//! statement with its duration.

pub mod config;
pub mod driver;
pub mod error;
pub mod handle;
mod lifecycle;
pub mod logging;
pub mod manager;
pub mod prelude;
pub mod results;
pub mod single_flight;
pub mod types;

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{Fingerprint, MysqlOptions, MysqlOptionsBuilder, normalize_config};
pub use driver::{Driver, DriverConnection, DriverEvent, DriverPool, QueryRequest};
pub use error::{DriverError, SqlMiddlewareDbError};
pub use handle::{ConnectionHandle, HandleKind};
pub use lifecycle::ConnectionState;
pub use manager::{ConnectionManager, ConnectionMode};
pub use results::{ColumnMeta, CustomDbRow, ResultSet};
pub use types::{ExecutionMode, NestTables, RowValues};

#[cfg(feature = "mysql")]
pub use mysql::MysqlDriver;
