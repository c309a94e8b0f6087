//! Connection and SQL timing events.
//!
//! Everything goes through `tracing`; install a subscriber to see it, e.g.
//! `tracing_subscriber::fmt().with_max_level(Level::INFO).init()`.

use std::time::Instant;

use crate::config::Fingerprint;

pub const CONNECT_TARGET: &str = "mysql_middleware::connect";
pub const SQL_TARGET: &str = "mysql_middleware::sql";

/// Record a connection (or pool creation) attempt against `fingerprint`.
pub fn log_connect(fingerprint: &Fingerprint, engine: &str) {
    tracing::info!(
        target: CONNECT_TARGET,
        fingerprint = %fingerprint,
        engine,
        "connect {fingerprint}"
    );
}

/// Record an executed SQL statement and the time since `started`.
pub fn log_sql(sql: &str, started: Instant) {
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    tracing::info!(target: SQL_TARGET, elapsed_ms, "SQL: {sql}, Time: {elapsed_ms}ms");
}
