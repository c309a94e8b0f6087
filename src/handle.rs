use std::sync::Arc;

use crate::driver::{DriverConnection, QueryRequest};
use crate::error::DriverError;
use crate::results::ResultSet;

/// Where a [`ConnectionHandle`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// The manager's own connection, reused across calls.
    Single,
    /// Borrowed from the manager's pool; goes back when the last clone drops.
    Pooled,
}

/// Shared reference to a driver connection handed out by the manager.
///
/// Clones refer to the same underlying connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: u64,
    kind: HandleKind,
    connection: Arc<dyn DriverConnection>,
}

impl ConnectionHandle {
    pub(crate) fn new(id: u64, kind: HandleKind, connection: Arc<dyn DriverConnection>) -> Self {
        Self {
            id,
            kind,
            connection,
        }
    }

    /// Manager-assigned id, unique per manager.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    #[must_use]
    pub fn is_pooled(&self) -> bool {
        self.kind == HandleKind::Pooled
    }

    /// Whether both handles point at the same driver connection.
    #[must_use]
    pub fn same_connection(&self, other: &ConnectionHandle) -> bool {
        Arc::ptr_eq(&self.connection, &other.connection)
    }

    /// Run a request directly on this connection, bypassing the manager's
    /// logging and batch-mode handling.
    ///
    /// # Errors
    /// Returns the driver's error unchanged.
    pub async fn query(&self, request: &QueryRequest) -> Result<ResultSet, DriverError> {
        self.connection.query(request).await
    }

    pub(crate) async fn end(&self) -> Result<(), DriverError> {
        self.connection.end().await
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
