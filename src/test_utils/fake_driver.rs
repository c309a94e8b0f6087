use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::MysqlOptions;
use crate::driver::{
    Connected, Driver, DriverConnection, DriverEvent, DriverEventSender, DriverPool,
    QueryRequest, event_channel,
};
use crate::error::DriverError;
use crate::results::ResultSet;

#[derive(Debug, Default)]
struct Script {
    connect_delay: Duration,
    acquire_delay: Duration,
    connect_error: Option<DriverError>,
    acquire_error: Option<DriverError>,
    create_pool_error: Option<DriverError>,
    query_error: Option<DriverError>,
    end_error: Option<DriverError>,
    rows: ResultSet,
}

#[derive(Debug, Default)]
struct Shared {
    script: Mutex<Script>,
    connects: AtomicUsize,
    pools_created: AtomicUsize,
    acquisitions: AtomicUsize,
    connection_ends: AtomicUsize,
    pool_ends: AtomicUsize,
    queries: Mutex<Vec<QueryRequest>>,
    senders: Mutex<Vec<DriverEventSender>>,
    opened: Mutex<Vec<Arc<FakeConnection>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scriptable in-memory driver that counts every call made through it.
///
/// ```rust
/// use mysql_middleware::prelude::*;
/// use mysql_middleware::test_utils::FakeDriver;
///
/// let driver = FakeDriver::new();
/// let manager = ConnectionManager::new(MysqlOptions::default(), driver.as_driver());
/// # let _ = manager;
/// ```
#[derive(Debug, Clone, Default)]
pub struct FakeDriver {
    shared: Arc<Shared>,
}

impl FakeDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn as_driver(&self) -> Arc<dyn Driver> {
        Arc::new(self.clone())
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        lock(&self.shared.script)
    }

    /// Delay every connect (and pool acquisition) so callers can race it.
    pub fn set_connect_delay(&self, delay: Duration) {
        let mut script = self.script();
        script.connect_delay = delay;
        script.acquire_delay = delay;
    }

    pub fn fail_connect(&self, err: Option<DriverError>) {
        self.script().connect_error = err;
    }

    pub fn fail_acquire(&self, err: Option<DriverError>) {
        self.script().acquire_error = err;
    }

    pub fn fail_create_pool(&self, err: Option<DriverError>) {
        self.script().create_pool_error = err;
    }

    pub fn fail_query(&self, err: Option<DriverError>) {
        self.script().query_error = err;
    }

    pub fn fail_end(&self, err: Option<DriverError>) {
        self.script().end_error = err;
    }

    /// Rows every successful query returns.
    pub fn set_rows(&self, rows: ResultSet) {
        self.script().rows = rows;
    }

    #[must_use]
    pub fn connects(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn pools_created(&self) -> usize {
        self.shared.pools_created.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn acquisitions(&self) -> usize {
        self.shared.acquisitions.load(Ordering::SeqCst)
    }

    /// `end` calls on single or pooled connections.
    #[must_use]
    pub fn connection_ends(&self) -> usize {
        self.shared.connection_ends.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn pool_ends(&self) -> usize {
        self.shared.pool_ends.load(Ordering::SeqCst)
    }

    /// Every request that reached a connection, in order.
    #[must_use]
    pub fn queries(&self) -> Vec<QueryRequest> {
        lock(&self.shared.queries).clone()
    }

    /// Connections opened through `connect`, oldest first.
    #[must_use]
    pub fn opened(&self) -> Vec<Arc<FakeConnection>> {
        lock(&self.shared.opened).clone()
    }

    /// Deliver an event for the most recently opened single connection.
    /// Returns `false` when there is no listener.
    pub fn emit(&self, event: DriverEvent) -> bool {
        lock(&self.shared.senders)
            .last()
            .is_some_and(|sender| sender.send(event).is_ok())
    }

    pub fn emit_end(&self) -> bool {
        self.emit(DriverEvent::End)
    }

    pub fn emit_error(&self, err: DriverError) -> bool {
        self.emit(DriverEvent::Error(err))
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn connect(&self, _options: &MysqlOptions) -> Result<Connected, DriverError> {
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        let (delay, error) = {
            let script = self.script();
            (script.connect_delay, script.connect_error.clone())
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = error {
            return Err(err);
        }

        let (sender, events) = event_channel();
        lock(&self.shared.senders).push(sender.clone());
        let connection = Arc::new(FakeConnection {
            shared: Arc::clone(&self.shared),
            events: Some(sender),
            ended: AtomicBool::new(false),
        });
        lock(&self.shared.opened).push(Arc::clone(&connection));
        Ok(Connected { connection, events })
    }

    fn create_pool(&self, _options: &MysqlOptions) -> Result<Arc<dyn DriverPool>, DriverError> {
        if let Some(err) = self.script().create_pool_error.clone() {
            return Err(err);
        }
        self.shared.pools_created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakePool {
            shared: Arc::clone(&self.shared),
            ended: AtomicBool::new(false),
        }))
    }
}

/// Connection produced by [`FakeDriver`].
#[derive(Debug, Default)]
pub struct FakeConnection {
    shared: Arc<Shared>,
    events: Option<DriverEventSender>,
    ended: AtomicBool,
}

impl FakeConnection {
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DriverConnection for FakeConnection {
    async fn query(&self, request: &QueryRequest) -> Result<ResultSet, DriverError> {
        if self.is_ended() {
            return Err(DriverError::new("Cannot enqueue Query after invoking quit.")
                .with_code("PROTOCOL_ENQUEUE_AFTER_QUIT"));
        }
        lock(&self.shared.queries).push(request.clone());
        tokio::task::yield_now().await;
        let script = lock(&self.shared.script);
        match &script.query_error {
            Some(err) => Err(err.clone()),
            None => Ok(script.rows.clone()),
        }
    }

    async fn end(&self) -> Result<(), DriverError> {
        self.shared.connection_ends.fetch_add(1, Ordering::SeqCst);
        self.ended.store(true, Ordering::SeqCst);
        if let Some(events) = &self.events {
            let _ = events.send(DriverEvent::End);
        }
        match lock(&self.shared.script).end_error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

struct FakePool {
    shared: Arc<Shared>,
    ended: AtomicBool,
}

#[async_trait]
impl DriverPool for FakePool {
    async fn get_connection(&self) -> Result<Arc<dyn DriverConnection>, DriverError> {
        self.shared.acquisitions.fetch_add(1, Ordering::SeqCst);
        let (delay, error) = {
            let script = lock(&self.shared.script);
            (script.acquire_delay, script.acquire_error.clone())
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.ended.load(Ordering::SeqCst) {
            return Err(DriverError::new("Pool is closed.").with_code("POOL_CLOSED"));
        }
        if let Some(err) = error {
            return Err(err);
        }
        Ok(Arc::new(FakeConnection {
            shared: Arc::clone(&self.shared),
            events: None,
            ended: AtomicBool::new(false),
        }))
    }

    async fn end(&self) -> Result<(), DriverError> {
        self.shared.pool_ends.fetch_add(1, Ordering::SeqCst);
        self.ended.store(true, Ordering::SeqCst);
        match lock(&self.shared.script).end_error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
