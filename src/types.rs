use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::SqlMiddlewareDbError;

/// Environment variable consulted by [`ExecutionMode::from_env`].
pub const EXECUTION_MODE_ENV: &str = "SQL_MIDDLEWARE_MODE";

/// A single decoded column value.
///
/// ```rust
/// use mysql_middleware::prelude::*;
///
/// let value = RowValues::Int(1);
/// assert_eq!(value.as_bool(), Some(true));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Signed integer (`TINYINT` .. `BIGINT`)
    Int(i64),
    /// Unsigned integer that does not fit in `i64`
    UInt(u64),
    /// `FLOAT` / `DOUBLE`
    Float(f64),
    /// `DECIMAL`, kept as text to avoid losing precision
    Decimal(String),
    Text(String),
    Bool(bool),
    /// `DATETIME` / `TIMESTAMP`
    Timestamp(NaiveDateTime),
    /// `DATE`
    Date(NaiveDate),
    /// `TIME`, which may be negative or exceed 24h in MySQL
    Time {
        negative: bool,
        hours: u32,
        minutes: u8,
        seconds: u8,
        micros: u32,
    },
    Null,
    JSON(JsonValue),
    Blob(Vec<u8>),
}

impl RowValues {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            RowValues::Int(value) => Some(*value),
            RowValues::UInt(value) => i64::try_from(*value).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RowValues::Text(value) | RowValues::Decimal(value) => Some(value),
            _ => None,
        }
    }

    /// MySQL has no boolean column type; `TINYINT(1)` values of 0/1 count.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RowValues::Bool(value) => Some(*value),
            RowValues::Int(0) => Some(false),
            RowValues::Int(1) => Some(true),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            RowValues::Float(value) => Some(*value),
            RowValues::Decimal(text) => text.parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            RowValues::Timestamp(value) => Some(*value),
            RowValues::Date(date) => date.and_hms_opt(0, 0, 0),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            RowValues::Blob(bytes) => Some(bytes),
            RowValues::Text(text) => Some(text.as_bytes()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&JsonValue> {
        if let RowValues::JSON(value) = self {
            Some(value)
        } else {
            None
        }
    }
}

/// How result columns that share a name across joined tables are exposed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum NestTables {
    /// Plain column names; a later column shadows an earlier one with the same name.
    #[default]
    Off,
    /// Values are addressed by table and column (`CustomDbRow::get_nested`).
    ByTable,
    /// Column names are rewritten to `table{separator}column`.
    Separator(String),
}

impl From<bool> for NestTables {
    fn from(nested: bool) -> Self {
        if nested { Self::ByTable } else { Self::Off }
    }
}

impl From<&str> for NestTables {
    fn from(separator: &str) -> Self {
        Self::Separator(separator.to_string())
    }
}

/// Whether connections outlive a single query.
///
/// Batch mode is for one-shot scripts: resources are closed right after each
/// successful query so nothing keeps the process alive.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Interactive,
    Batch,
}

impl ExecutionMode {
    /// Read the mode from `SQL_MIDDLEWARE_MODE`; unset means interactive.
    ///
    /// # Errors
    /// Returns `SqlMiddlewareDbError::ConfigError` when the variable holds an unknown mode.
    pub fn from_env() -> Result<Self, SqlMiddlewareDbError> {
        Self::from_setting(std::env::var(EXECUTION_MODE_ENV).ok().as_deref())
    }

    /// Parse an optional setting; missing or blank means interactive.
    ///
    /// # Errors
    /// Returns `SqlMiddlewareDbError::ConfigError` for an unknown mode.
    pub fn from_setting(raw: Option<&str>) -> Result<Self, SqlMiddlewareDbError> {
        match raw {
            Some(raw) if !raw.trim().is_empty() => raw.parse(),
            _ => Ok(Self::Interactive),
        }
    }

    #[must_use]
    pub fn is_batch(self) -> bool {
        matches!(self, Self::Batch)
    }
}

impl FromStr for ExecutionMode {
    type Err = SqlMiddlewareDbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cli" => Ok(Self::Batch),
            other => <Self as ValueEnum>::from_str(other, true).map_err(|_| {
                SqlMiddlewareDbError::ConfigError(format!("unknown execution mode: {s}"))
            }),
        }
    }
}
