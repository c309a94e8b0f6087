//! Helper utilities for testing and development.

use crate::config::MysqlOptions;
use crate::results::{ColumnMeta, ResultSet};
use crate::types::{NestTables, RowValues};

/// Result set with one computed column and one row per value.
#[must_use]
pub fn single_column_rows(column: &str, values: Vec<RowValues>) -> ResultSet {
    let mut rs = ResultSet::new(vec![ColumnMeta::computed(column)], &NestTables::Off);
    for value in values {
        rs.add_row_values(vec![value]);
    }
    rs
}

/// Options for a throwaway local target; `pooled` sets `connectionLimit`.
#[must_use]
pub fn test_options(pooled: bool) -> MysqlOptions {
    let builder = MysqlOptions::builder()
        .host("127.0.0.1")
        .user("tester")
        .password("secret")
        .database("testing");
    if pooled {
        builder.connection_limit(4).finish()
    } else {
        builder.finish()
    }
}
