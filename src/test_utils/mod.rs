//! Test doubles for code built on the connection manager.

mod fake_driver;
mod test_helpers;

pub use fake_driver::{FakeConnection, FakeDriver};
pub use test_helpers::{single_column_rows, test_options};
