use chrono::{NaiveDate, NaiveDateTime};
use mysql_async::consts::ColumnType;
use mysql_async::prelude::Queryable;
use mysql_async::{Column, Conn, Row, Value};

use super::config::driver_error;
use crate::driver::QueryRequest;
use crate::error::DriverError;
use crate::results::{ColumnMeta, ResultSet};
use crate::types::RowValues;

/// Character set id MySQL reports for binary columns.
const BINARY_CHARSET: u16 = 63;

/// Run a request over the text protocol and decode the first result set.
///
/// Statements that produce no columns yield an empty set carrying the
/// affected-row count and last insert id.
///
/// # Errors
/// Returns the mapped `mysql_async` error.
pub async fn build_result_set(
    conn: &mut Conn,
    request: &QueryRequest,
) -> Result<ResultSet, DriverError> {
    let mut result = conn
        .query_iter(request.sql.as_str())
        .await
        .map_err(driver_error)?;

    let columns: Vec<Column> = result.columns_ref().to_vec();
    let result_set = if columns.is_empty() {
        ResultSet::affected(result.affected_rows(), result.last_insert_id())
    } else {
        let metas = columns
            .iter()
            .map(|col| ColumnMeta::new(col.name_str(), col.table_str()))
            .collect();
        let mut result_set = ResultSet::new(metas, &request.nest_tables);
        let rows: Vec<Row> = result.collect().await.map_err(driver_error)?;
        for row in rows {
            let values = row
                .unwrap_raw()
                .into_iter()
                .zip(&columns)
                .map(|(value, column)| decode_value(value.unwrap_or(Value::NULL), column))
                .collect();
            result_set.add_row_values(values);
        }
        result_set
    };

    // drain any further result sets (multi-statement queries)
    result.drop_result().await.map_err(driver_error)?;
    Ok(result_set)
}

fn decode_value(value: Value, column: &Column) -> RowValues {
    match value {
        Value::NULL => RowValues::Null,
        Value::Int(i) => RowValues::Int(i),
        Value::UInt(u) => i64::try_from(u).map_or(RowValues::UInt(u), RowValues::Int),
        Value::Float(f) => RowValues::Float(f64::from(f)),
        Value::Double(d) => RowValues::Float(d),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            let date = NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day));
            match (column.column_type(), date) {
                (ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE, Some(date)) => {
                    RowValues::Date(date)
                }
                (_, Some(date)) => date
                    .and_hms_micro_opt(
                        u32::from(hour),
                        u32::from(minute),
                        u32::from(second),
                        micros,
                    )
                    .map_or(RowValues::Null, RowValues::Timestamp),
                // zero dates such as 0000-00-00
                (_, None) => RowValues::Null,
            }
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => RowValues::Time {
            negative,
            hours: days * 24 + u32::from(hours),
            minutes,
            seconds,
            micros,
        },
        Value::Bytes(bytes) => decode_text(
            column.column_type(),
            column.character_set() == BINARY_CHARSET,
            bytes,
        ),
    }
}

/// Decode a text-protocol value using its column type.
fn decode_text(column_type: ColumnType, binary: bool, bytes: Vec<u8>) -> RowValues {
    use ColumnType::{
        MYSQL_TYPE_BIT, MYSQL_TYPE_DATE, MYSQL_TYPE_DATETIME, MYSQL_TYPE_DATETIME2,
        MYSQL_TYPE_DECIMAL, MYSQL_TYPE_DOUBLE, MYSQL_TYPE_FLOAT, MYSQL_TYPE_INT24,
        MYSQL_TYPE_JSON, MYSQL_TYPE_LONG, MYSQL_TYPE_LONGLONG, MYSQL_TYPE_NEWDATE,
        MYSQL_TYPE_NEWDECIMAL, MYSQL_TYPE_SHORT, MYSQL_TYPE_TIME, MYSQL_TYPE_TIME2,
        MYSQL_TYPE_TIMESTAMP, MYSQL_TYPE_TIMESTAMP2, MYSQL_TYPE_TINY, MYSQL_TYPE_YEAR,
    };

    if column_type == MYSQL_TYPE_BIT || (binary && column_type != MYSQL_TYPE_JSON) {
        return RowValues::Blob(bytes);
    }
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => return RowValues::Blob(err.into_bytes()),
    };

    match column_type {
        MYSQL_TYPE_TINY | MYSQL_TYPE_SHORT | MYSQL_TYPE_LONG | MYSQL_TYPE_INT24
        | MYSQL_TYPE_LONGLONG | MYSQL_TYPE_YEAR => parse_integer(text),
        MYSQL_TYPE_FLOAT | MYSQL_TYPE_DOUBLE => match text.parse::<f64>() {
            Ok(f) => RowValues::Float(f),
            Err(_) => RowValues::Text(text),
        },
        MYSQL_TYPE_DECIMAL | MYSQL_TYPE_NEWDECIMAL => RowValues::Decimal(text),
        MYSQL_TYPE_DATE | MYSQL_TYPE_NEWDATE => {
            NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_or(RowValues::Text(text), RowValues::Date)
        }
        MYSQL_TYPE_DATETIME | MYSQL_TYPE_DATETIME2 | MYSQL_TYPE_TIMESTAMP | MYSQL_TYPE_TIMESTAMP2 => {
            parse_datetime(&text).map_or(RowValues::Text(text), RowValues::Timestamp)
        }
        MYSQL_TYPE_TIME | MYSQL_TYPE_TIME2 => parse_time(&text).unwrap_or(RowValues::Text(text)),
        MYSQL_TYPE_JSON => serde_json::from_str(&text).map_or(RowValues::Text(text), RowValues::JSON),
        _ => RowValues::Text(text),
    }
}

fn parse_integer(text: String) -> RowValues {
    if let Ok(i) = text.parse::<i64>() {
        RowValues::Int(i)
    } else if let Ok(u) = text.parse::<u64>() {
        RowValues::UInt(u)
    } else {
        RowValues::Text(text)
    }
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S"))
        .ok()
}

/// `[-]HHH:MM:SS[.ffffff]`
fn parse_time(text: &str) -> Option<RowValues> {
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (clock, fraction) = rest.split_once('.').unwrap_or((rest, ""));
    let mut parts = clock.split(':');
    let hours = parts.next()?.parse().ok()?;
    let minutes = parts.next()?.parse().ok()?;
    let seconds = parts.next()?.parse().ok()?;
    if parts.next().is_some() || fraction.len() > 6 {
        return None;
    }
    let micros = if fraction.is_empty() {
        0
    } else {
        format!("{fraction:0<6}").parse().ok()?
    };
    Some(RowValues::Time {
        negative,
        hours,
        minutes,
        seconds,
        micros,
    })
}
