use std::fmt::Write;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

use crate::types::ColumnType;

/// A single typed value of one column in one row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Numeric(BigDecimal),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Json(serde_json::Value),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Returns the column type this value belongs to, [`ColumnType::Null`] for nulls.
    pub fn column_type(&self) -> ColumnType {
        match self {
            Cell::Null => ColumnType::Null,
            Cell::Bool(_) => ColumnType::Bool,
            Cell::I64(_) => ColumnType::Integer,
            Cell::F64(_) => ColumnType::Float,
            Cell::Numeric(_) => ColumnType::Numeric,
            Cell::String(_) => ColumnType::String,
            Cell::Bytes(_) => ColumnType::Bytes,
            Cell::Date(_) => ColumnType::Date,
            Cell::Timestamp(_) => ColumnType::Timestamp,
            Cell::TimestampTz(_) => ColumnType::TimestampTz,
            Cell::Json(_) => ColumnType::Json,
        }
    }

    /// Renders the value as JSON for mirror output.
    ///
    /// Numerics are rendered as strings to keep their precision, bytes as lowercase hex and
    /// temporal values in ISO 8601.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Cell::Null => serde_json::Value::Null,
            Cell::Bool(value) => serde_json::Value::Bool(*value),
            Cell::I64(value) => serde_json::Value::from(*value),
            Cell::F64(value) => serde_json::Number::from_f64(*value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Cell::Numeric(value) => serde_json::Value::String(value.normalized().to_string()),
            Cell::String(value) => serde_json::Value::String(value.clone()),
            Cell::Bytes(value) => {
                let mut hex = String::with_capacity(value.len() * 2);
                for byte in value {
                    let _ = write!(hex, "{byte:02x}");
                }
                serde_json::Value::String(hex)
            }
            Cell::Date(value) => serde_json::Value::String(value.format("%Y-%m-%d").to_string()),
            Cell::Timestamp(value) => {
                serde_json::Value::String(value.format("%Y-%m-%dT%H:%M:%S%.6f").to_string())
            }
            Cell::TimestampTz(value) => {
                serde_json::Value::String(value.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
            Cell::Json(value) => value.clone(),
        }
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::I64(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::String(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::String(value)
    }
}

impl From<DateTime<Utc>> for Cell {
    fn from(value: DateTime<Utc>) -> Self {
        Cell::TimestampTz(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}
