//! The seam between the connection manager and a concrete client library.
//!
//! A driver knows how to open a single connection, how to build a pool, and
//! how to run a SQL string on a connection. Everything else (wire protocol,
//! authentication, result decoding) stays inside the driver.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::MysqlOptions;
use crate::error::DriverError;
use crate::results::ResultSet;
use crate::types::NestTables;

/// Request handed to [`DriverConnection::query`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub sql: String,
    pub nest_tables: NestTables,
    /// Advisory per-query timeout from the `timeout` option
    pub timeout: Option<Duration>,
}

impl QueryRequest {
    #[must_use]
    pub fn new(sql: impl Into<String>, nest_tables: NestTables) -> Self {
        Self {
            sql: sql.into(),
            nest_tables,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Out-of-band notification about a single connection.
#[derive(Debug, Clone)]
pub enum DriverEvent {
    /// The connection hit an unrecoverable error.
    Error(DriverError),
    /// The server or the driver ended the connection.
    End,
}

pub type DriverEventSender = mpsc::UnboundedSender<DriverEvent>;
pub type DriverEventReceiver = mpsc::UnboundedReceiver<DriverEvent>;

/// Create the channel a driver uses to report [`DriverEvent`]s.
#[must_use]
pub fn event_channel() -> (DriverEventSender, DriverEventReceiver) {
    mpsc::unbounded_channel()
}

/// A freshly established single connection and its event stream.
pub struct Connected {
    pub connection: Arc<dyn DriverConnection>,
    pub events: DriverEventReceiver,
}

impl std::fmt::Debug for Connected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connected").finish_non_exhaustive()
    }
}

#[async_trait]
pub trait DriverConnection: Send + Sync {
    /// Run one SQL string.
    async fn query(&self, request: &QueryRequest) -> Result<ResultSet, DriverError>;

    /// Gracefully end the connection. For a pooled connection this hands it
    /// back to its pool.
    async fn end(&self) -> Result<(), DriverError>;
}

#[async_trait]
pub trait DriverPool: Send + Sync {
    /// Borrow a connection; it returns to the pool when the last reference drops.
    async fn get_connection(&self) -> Result<Arc<dyn DriverConnection>, DriverError>;

    /// Close every connection and refuse further acquisitions.
    async fn end(&self) -> Result<(), DriverError>;
}

#[async_trait]
pub trait Driver: Send + Sync {
    /// Engine name, also the URL scheme of the target fingerprint.
    fn engine(&self) -> &'static str {
        "mysql"
    }

    /// Open a single connection and wait until it is usable.
    async fn connect(&self, options: &MysqlOptions) -> Result<Connected, DriverError>;

    /// Build a pool. Connections are opened lazily on acquisition.
    fn create_pool(&self, options: &MysqlOptions) -> Result<Arc<dyn DriverPool>, DriverError>;
}
