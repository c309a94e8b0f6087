//! The connection manager.
//!
//! One manager per logical MySQL target. It lazily opens either a single
//! reusable connection or a pool (decided once, from `connectionLimit`), runs
//! SQL strings through the driver, and tears the resources down on `close`,
//! on connection-level errors, and after every query in batch mode.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

use serde_json::{Map, Value};

use crate::config::{Fingerprint, MysqlOptions};
use crate::driver::{Connected, Driver, DriverEvent, DriverEventReceiver, DriverPool, QueryRequest};
use crate::error::{DriverError, SqlMiddlewareDbError};
use crate::handle::{ConnectionHandle, HandleKind};
use crate::lifecycle::{ConnectionState, Held, Lifecycle, LifecycleEvent};
use crate::logging::{log_connect, log_sql};
use crate::results::ResultSet;
use crate::single_flight::SingleFlight;
use crate::types::{ExecutionMode, NestTables};

type ConnectOutcome = Result<ConnectionHandle, SqlMiddlewareDbError>;

/// Single connection or pool. Fixed when the manager is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    Single,
    Pooled,
}

/// Lazily connecting manager for one MySQL target.
///
/// Cloning is cheap and clones share the same connection state.
///
/// ```rust,no_run
/// # #[cfg(feature = "mysql")]
/// # async fn example() -> Result<(), mysql_middleware::SqlMiddlewareDbError> {
/// use mysql_middleware::prelude::*;
/// use serde_json::json;
///
/// let manager = ConnectionManager::from_value(
///     json!({ "host": "127.0.0.1", "user": "app", "pwd": "secret", "name": "shop" }),
///     MysqlDriver::shared(),
/// )?;
/// let rs = manager.query("SELECT id, title FROM posts", false).await?;
/// for row in &rs {
///     println!("{:?}", row.get("title"));
/// }
/// manager.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    options: MysqlOptions,
    fingerprint: Fingerprint,
    mode: ConnectionMode,
    execution_mode: ExecutionMode,
    driver: Arc<dyn Driver>,
    lifecycle: Mutex<Lifecycle>,
    in_flight: SingleFlight<ConnectOutcome>,
    next_id: AtomicU64,
}

impl ConnectionManager {
    /// Interactive-mode manager over already normalized options.
    #[must_use]
    pub fn new(options: MysqlOptions, driver: Arc<dyn Driver>) -> Self {
        Self::with_execution_mode(options, driver, ExecutionMode::Interactive)
    }

    #[must_use]
    pub fn with_execution_mode(
        options: MysqlOptions,
        driver: Arc<dyn Driver>,
        execution_mode: ExecutionMode,
    ) -> Self {
        let fingerprint = options.fingerprint(driver.engine());
        let mode = if options.is_pooled() {
            ConnectionMode::Pooled
        } else {
            ConnectionMode::Single
        };
        Self {
            inner: Arc::new(Inner {
                options,
                fingerprint,
                mode,
                execution_mode,
                driver,
                lifecycle: Mutex::new(Lifecycle::default()),
                in_flight: SingleFlight::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Build from a raw configuration mapping (`pwd`/`name` aliases accepted).
    ///
    /// # Errors
    /// Returns `SqlMiddlewareDbError::ConfigError` if an option cannot be coerced.
    pub fn from_config(
        raw: Map<String, Value>,
        driver: Arc<dyn Driver>,
    ) -> Result<Self, SqlMiddlewareDbError> {
        Ok(Self::new(MysqlOptions::from_map(raw)?, driver))
    }

    /// Build from a JSON object.
    ///
    /// # Errors
    /// Returns `SqlMiddlewareDbError::ConfigError` if the value is not an object or an
    /// option cannot be coerced.
    pub fn from_value(raw: Value, driver: Arc<dyn Driver>) -> Result<Self, SqlMiddlewareDbError> {
        Ok(Self::new(MysqlOptions::try_from(raw)?, driver))
    }

    #[must_use]
    pub fn options(&self) -> &MysqlOptions {
        &self.inner.options
    }

    #[must_use]
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.inner.fingerprint
    }

    #[must_use]
    pub fn mode(&self) -> ConnectionMode {
        self.inner.mode
    }

    #[must_use]
    pub fn execution_mode(&self) -> ExecutionMode {
        self.inner.execution_mode
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.lifecycle().state()
    }

    /// Return the held single connection, or obtain one.
    ///
    /// Concurrent calls for the same target share one in-flight connect (or
    /// pool acquisition) and all observe its outcome.
    ///
    /// # Errors
    /// Returns `SqlMiddlewareDbError::ConnectionError` when the driver fails to connect
    /// or the pool fails to hand out a connection. The manager's resources are
    /// closed before the error is returned.
    pub async fn get_connection(&self) -> Result<ConnectionHandle, SqlMiddlewareDbError> {
        let key = self.inner.fingerprint.key();
        match self.inner.mode {
            ConnectionMode::Single => {
                if let Some(handle) = self.inner.held_connection() {
                    return Ok(handle);
                }
                let inner = Arc::clone(&self.inner);
                self.inner
                    .in_flight
                    .run(key, move || inner.connect_single())
                    .await
            }
            ConnectionMode::Pooled => {
                let pool = self.inner.pool_or_create()?;
                let inner = Arc::clone(&self.inner);
                self.inner
                    .in_flight
                    .run(key, move || inner.acquire_pooled(pool))
                    .await
            }
        }
    }

    /// Run one SQL string and return its rows.
    ///
    /// With `log_sql` on, the statement and its duration are logged. In batch
    /// mode the manager closes its resources once the query has succeeded.
    ///
    /// # Errors
    /// Returns `SqlMiddlewareDbError::ConnectionError` if no connection could be
    /// obtained, or `SqlMiddlewareDbError::QueryError` carrying the driver's error
    /// when the query is rejected. A rejected query leaves the connection open.
    pub async fn query(
        &self,
        sql: &str,
        nest_tables: impl Into<NestTables>,
    ) -> Result<ResultSet, SqlMiddlewareDbError> {
        let connection = self.get_connection().await?;
        let request =
            QueryRequest::new(sql, nest_tables.into()).with_timeout(self.inner.options.timeout);

        let started = Instant::now();
        let rows = connection.query(&request).await.map_err(|source| {
            tracing::debug!(sql, error = %source, "query rejected");
            SqlMiddlewareDbError::QueryError {
                sql: sql.to_string(),
                source,
            }
        })?;
        if self.inner.options.log_sql {
            log_sql(sql, started);
        }

        if self.inner.execution_mode.is_batch() {
            // hand a pooled connection back before the pool is ended
            drop(connection);
            self.inner.close_logged("batch query").await;
        }
        Ok(rows)
    }

    /// Same as [`ConnectionManager::query`].
    ///
    /// # Errors
    /// See [`ConnectionManager::query`].
    pub async fn execute(
        &self,
        sql: &str,
        nest_tables: impl Into<NestTables>,
    ) -> Result<ResultSet, SqlMiddlewareDbError> {
        self.query(sql, nest_tables).await
    }

    /// End the pool or the single connection, whichever is held.
    ///
    /// Safe to call repeatedly; does nothing when nothing is held.
    ///
    /// # Errors
    /// Returns `SqlMiddlewareDbError::DriverError` if the driver fails to end the
    /// resource. The reference is cleared either way.
    pub async fn close(&self) -> Result<(), SqlMiddlewareDbError> {
        self.inner.close().await
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("fingerprint", &self.inner.fingerprint)
            .field("mode", &self.inner.mode)
            .field("execution_mode", &self.inner.execution_mode)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, event: LifecycleEvent) -> Option<Held> {
        self.lifecycle().apply(event)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn held_connection(&self) -> Option<ConnectionHandle> {
        match self.lifecycle().held() {
            Some(Held::Connection(handle)) => Some(handle.clone()),
            _ => None,
        }
    }

    fn connection_error(&self, source: DriverError) -> SqlMiddlewareDbError {
        SqlMiddlewareDbError::ConnectionError {
            fingerprint: self.fingerprint.to_string(),
            source,
        }
    }

    async fn connect_single(self: Arc<Self>) -> ConnectOutcome {
        // a connect that settled just before we registered may already be stored
        if let Some(handle) = self.held_connection() {
            return Ok(handle);
        }

        self.apply(LifecycleEvent::ConnectStarted);
        let outcome = self.driver.connect(&self.options).await;
        log_connect(&self.fingerprint, self.driver.engine());

        match outcome {
            Ok(Connected { connection, events }) => {
                let handle = ConnectionHandle::new(self.next_id(), HandleKind::Single, connection);
                let replaced = self.apply(LifecycleEvent::ConnectSucceeded(Held::Connection(
                    handle.clone(),
                )));
                if let Some(replaced) = replaced {
                    if let Err(err) = end_held(&replaced).await {
                        tracing::warn!(error = %err, "failed to end replaced connection");
                    }
                }
                watch_events(Arc::downgrade(&self), handle.id(), events);
                Ok(handle)
            }
            Err(source) => {
                self.apply(LifecycleEvent::ConnectFailed);
                self.close_logged("failed connect").await;
                Err(self.connection_error(source))
            }
        }
    }

    /// The held pool, creating it on first use.
    fn pool_or_create(&self) -> Result<Arc<dyn DriverPool>, SqlMiddlewareDbError> {
        let mut lifecycle = self.lifecycle();
        if let Some(Held::Pool(pool)) = lifecycle.held() {
            return Ok(Arc::clone(pool));
        }

        log_connect(&self.fingerprint, self.driver.engine());
        let pool = self
            .driver
            .create_pool(&self.options)
            .map_err(|source| self.connection_error(source))?;
        let replaced = lifecycle.apply(LifecycleEvent::ConnectSucceeded(Held::Pool(Arc::clone(
            &pool,
        ))));
        debug_assert!(replaced.is_none(), "pooled manager held a second resource");
        Ok(pool)
    }

    async fn acquire_pooled(self: Arc<Self>, pool: Arc<dyn DriverPool>) -> ConnectOutcome {
        match pool.get_connection().await {
            Ok(connection) => Ok(ConnectionHandle::new(
                self.next_id(),
                HandleKind::Pooled,
                connection,
            )),
            Err(source) => {
                self.close_logged("failed pool acquisition").await;
                Err(self.connection_error(source))
            }
        }
    }

    async fn close(&self) -> Result<(), SqlMiddlewareDbError> {
        let Some(held) = self.apply(LifecycleEvent::CloseRequested) else {
            return Ok(());
        };
        let outcome = end_held(&held).await;
        self.apply(LifecycleEvent::CloseCompleted);
        outcome.map_err(SqlMiddlewareDbError::from)
    }

    /// Close as a side effect of another path; failures are logged, not returned.
    async fn close_logged(&self, reason: &str) {
        if let Err(err) = self.close().await {
            tracing::warn!(error = %err, fingerprint = %self.fingerprint, "close after {reason} failed");
        }
    }

    async fn on_driver_event(&self, connection_id: u64, event: DriverEvent) {
        match event {
            DriverEvent::End => {
                self.apply(LifecycleEvent::DriverEnd(connection_id));
            }
            DriverEvent::Error(err) => {
                tracing::warn!(error = %err, fingerprint = %self.fingerprint, "connection error");
                if let Some(held) = self.apply(LifecycleEvent::DriverError(connection_id)) {
                    let outcome = end_held(&held).await;
                    self.apply(LifecycleEvent::CloseCompleted);
                    if let Err(err) = outcome {
                        tracing::warn!(error = %err, "failed to end errored connection");
                    }
                }
            }
        }
    }
}

async fn end_held(held: &Held) -> Result<(), DriverError> {
    match held {
        Held::Connection(handle) => handle.end().await,
        Held::Pool(pool) => pool.end().await,
    }
}

/// Forward a connection's driver events into the lifecycle until it ends or
/// the manager is dropped.
fn watch_events(inner: Weak<Inner>, connection_id: u64, mut events: DriverEventReceiver) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Some(inner) = inner.upgrade() else {
                break;
            };
            let ended = matches!(event, DriverEvent::End);
            inner.on_driver_event(connection_id, event).await;
            if ended {
                break;
            }
        }
    });
}
