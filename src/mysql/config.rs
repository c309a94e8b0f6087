use mysql_async::{Opts, OptsBuilder, PoolConstraints, PoolOpts};

use crate::config::MysqlOptions;
use crate::error::DriverError;

/// Code reported when a query outlives the configured `timeout`.
pub const TIMEOUT_CODE: &str = "PROTOCOL_SEQUENCE_TIMEOUT";
/// Code reported when the socket to the server breaks.
pub const CONNECTION_LOST_CODE: &str = "PROTOCOL_CONNECTION_LOST";
/// Code reported when a closed connection is used.
pub const ENQUEUE_AFTER_QUIT_CODE: &str = "PROTOCOL_ENQUEUE_AFTER_QUIT";

/// Translate normalized options into `mysql_async` options.
#[must_use]
pub fn build_opts(options: &MysqlOptions, pool_opts: Option<PoolOpts>) -> Opts {
    let password = (!options.password.is_empty()).then(|| options.password.clone());
    let mut builder = OptsBuilder::default()
        .ip_or_hostname(options.host.clone())
        .tcp_port(options.port)
        .user(Some(options.user.clone()))
        .pass(password)
        .db_name(options.database.clone());
    if let Some(pool_opts) = pool_opts {
        builder = builder.pool_opts(pool_opts);
    }
    Opts::from(builder)
}

/// Pool options bounded by `connectionLimit`.
///
/// # Errors
/// Returns a `DriverError` if the limit cannot form valid pool constraints.
pub fn pool_opts(connection_limit: u32) -> Result<PoolOpts, DriverError> {
    if connection_limit == 0 {
        return Err(DriverError::new("connectionLimit must be positive").with_code("POOL_CONFIG"));
    }
    let max = usize::try_from(connection_limit).unwrap_or(usize::MAX);
    let constraints = PoolConstraints::new(0, max).ok_or_else(|| {
        DriverError::new(format!("invalid connectionLimit: {connection_limit}"))
            .with_code("POOL_CONFIG")
    })?;
    Ok(PoolOpts::default().with_constraints(constraints))
}

/// Map a `mysql_async` error, keeping it as the source.
///
/// Server errors carry the numeric MySQL error code; I/O errors are fatal
/// for the connection that produced them.
#[must_use]
pub fn driver_error(err: mysql_async::Error) -> DriverError {
    let code = match &err {
        mysql_async::Error::Server(server) => Some(server.code.to_string()),
        mysql_async::Error::Io(_) => Some(CONNECTION_LOST_CODE.to_string()),
        _ => None,
    };
    let fatal = matches!(err, mysql_async::Error::Io(_));
    let mut mapped = DriverError::from_source(err);
    if let Some(code) = code {
        mapped = mapped.with_code(code);
    }
    if fatal { mapped.fatal() } else { mapped }
}
