use std::sync::Arc;

use async_trait::async_trait;
use mysql_async::{Conn, Pool};
use tokio::sync::Mutex;

use super::config::{ENQUEUE_AFTER_QUIT_CODE, TIMEOUT_CODE, build_opts, driver_error, pool_opts};
use super::query::build_result_set;
use crate::config::MysqlOptions;
use crate::driver::{
    Connected, Driver, DriverConnection, DriverEvent, DriverEventSender, DriverPool,
    QueryRequest, event_channel,
};
use crate::error::DriverError;
use crate::results::ResultSet;

/// Driver backed by `mysql_async`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDriver;

impl MysqlDriver {
    #[must_use]
    pub fn shared() -> Arc<dyn Driver> {
        Arc::new(Self)
    }
}

#[async_trait]
impl Driver for MysqlDriver {
    async fn connect(&self, options: &MysqlOptions) -> Result<Connected, DriverError> {
        let conn = Conn::new(build_opts(options, None))
            .await
            .map_err(driver_error)?;
        let (sender, events) = event_channel();
        Ok(Connected {
            connection: Arc::new(MysqlConnection::single(conn, sender)),
            events,
        })
    }

    fn create_pool(&self, options: &MysqlOptions) -> Result<Arc<dyn DriverPool>, DriverError> {
        let limit = options.connection_limit.ok_or_else(|| {
            DriverError::new("connectionLimit is required for a pool").with_code("POOL_CONFIG")
        })?;
        let opts = build_opts(options, Some(pool_opts(limit)?));
        Ok(Arc::new(MysqlPool {
            pool: Pool::new(opts),
        }))
    }
}

/// A `mysql_async` connection, either owned outright or borrowed from a pool.
pub struct MysqlConnection {
    conn: Mutex<Option<Conn>>,
    /// Present for single connections only
    events: Option<DriverEventSender>,
}

impl MysqlConnection {
    fn single(conn: Conn, events: DriverEventSender) -> Self {
        Self {
            conn: Mutex::new(Some(conn)),
            events: Some(events),
        }
    }

    fn pooled(conn: Conn) -> Self {
        Self {
            conn: Mutex::new(Some(conn)),
            events: None,
        }
    }

    fn notify(&self, event: DriverEvent) {
        if let Some(events) = &self.events {
            // nobody listening once the manager has moved on
            let _ = events.send(event);
        }
    }
}

impl std::fmt::Debug for MysqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MysqlConnection")
            .field("pooled", &self.events.is_none())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DriverConnection for MysqlConnection {
    async fn query(&self, request: &QueryRequest) -> Result<ResultSet, DriverError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(|| {
            DriverError::new("Cannot enqueue Query after invoking quit.")
                .with_code(ENQUEUE_AFTER_QUIT_CODE)
        })?;

        let outcome = match request.timeout {
            Some(limit) => tokio::time::timeout(limit, build_result_set(conn, request))
                .await
                .unwrap_or_else(|_| {
                    Err(DriverError::new(format!(
                        "Query inactivity timeout ({}ms)",
                        limit.as_millis()
                    ))
                    .with_code(TIMEOUT_CODE)
                    .fatal())
                }),
            None => build_result_set(conn, request).await,
        };

        if let Err(err) = &outcome {
            if err.is_fatal() {
                // the protocol state is unknown; never reuse this socket
                guard.take();
                self.notify(DriverEvent::Error(err.clone()));
            }
        }
        outcome
    }

    async fn end(&self) -> Result<(), DriverError> {
        let conn = self.conn.lock().await.take();
        let outcome = match conn {
            // dropping a pooled `Conn` hands it back to its pool
            Some(conn) if self.events.is_none() => {
                drop(conn);
                Ok(())
            }
            Some(conn) => conn.disconnect().await.map_err(driver_error),
            None => Ok(()),
        };
        self.notify(DriverEvent::End);
        outcome
    }
}

/// A `mysql_async` pool bounded by `connectionLimit`.
pub struct MysqlPool {
    pool: Pool,
}

impl std::fmt::Debug for MysqlPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MysqlPool").finish_non_exhaustive()
    }
}

#[async_trait]
impl DriverPool for MysqlPool {
    async fn get_connection(&self) -> Result<Arc<dyn DriverConnection>, DriverError> {
        let conn = self.pool.get_conn().await.map_err(driver_error)?;
        Ok(Arc::new(MysqlConnection::pooled(conn)))
    }

    async fn end(&self) -> Result<(), DriverError> {
        self.pool.clone().disconnect().await.map_err(driver_error)
    }
}
