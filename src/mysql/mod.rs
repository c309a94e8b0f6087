// MySQL module - the production driver, backed by `mysql_async`
//
// - config: options → `mysql_async::Opts`, error mapping
// - connection: `Driver`, `DriverConnection` and `DriverPool` implementations
// - query: text-protocol execution and value decoding

pub mod config;
pub mod connection;
pub mod query;

pub use connection::{MysqlConnection, MysqlDriver, MysqlPool};
pub use query::build_result_set;
