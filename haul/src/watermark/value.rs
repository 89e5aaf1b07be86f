use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::WatermarkKind;
use crate::bail;
use crate::error::{ErrorKind, HaulResult};
use crate::types::{Cell, ColumnType, EntityIdentity};

/// A typed watermark value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkValue {
    Integer(i64),
    Timestamp(DateTime<Utc>),
    String(String),
}

impl WatermarkValue {
    pub fn kind(&self) -> WatermarkKind {
        match self {
            WatermarkValue::Integer(_) => WatermarkKind::Integer,
            WatermarkValue::Timestamp(_) => WatermarkKind::Timestamp,
            WatermarkValue::String(_) => WatermarkKind::String,
        }
    }

    /// Converts a cell of a watermark column to a value of `kind`.
    ///
    /// Returns `Ok(None)` for nulls. Timestamps without time zone and dates are interpreted as
    /// UTC. Fails with [`ErrorKind::SchemaDrift`] when the cell does not fit `kind`.
    pub fn from_cell(kind: WatermarkKind, cell: &Cell) -> HaulResult<Option<Self>> {
        let value = match (kind, cell) {
            (_, Cell::Null) => return Ok(None),
            (WatermarkKind::Integer, Cell::I64(value)) => WatermarkValue::Integer(*value),
            (WatermarkKind::Timestamp, Cell::TimestampTz(value)) => {
                WatermarkValue::Timestamp(*value)
            }
            (WatermarkKind::Timestamp, Cell::Timestamp(value)) => {
                WatermarkValue::Timestamp(value.and_utc())
            }
            (WatermarkKind::Timestamp, Cell::Date(value)) => {
                WatermarkValue::Timestamp(value.and_time(NaiveTime::MIN).and_utc())
            }
            (WatermarkKind::String, Cell::String(value)) => WatermarkValue::String(value.clone()),
            (kind, cell) => bail!(
                ErrorKind::SchemaDrift,
                "Watermark column value does not match its kind",
                format!(
                    "expected a {kind} value, found a {} cell",
                    cell.column_type()
                )
            ),
        };

        Ok(Some(value))
    }

    /// Compares two values of the same kind: numerically, chronologically or lexically.
    ///
    /// Returns `None` when the kinds differ.
    pub fn compare(&self, other: &WatermarkValue) -> Option<Ordering> {
        match (self, other) {
            (WatermarkValue::Integer(a), WatermarkValue::Integer(b)) => Some(a.cmp(b)),
            (WatermarkValue::Timestamp(a), WatermarkValue::Timestamp(b)) => Some(a.cmp(b)),
            (WatermarkValue::String(a), WatermarkValue::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for WatermarkValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatermarkValue::Integer(value) => write!(f, "{value}"),
            WatermarkValue::Timestamp(value) => write!(f, "'{}'", value.to_rfc3339()),
            WatermarkValue::String(value) => write!(f, "'{}'", value.replace('\'', "''")),
        }
    }
}

/// Returns whether a column of type `typ` can carry a watermark of `kind`.
pub(crate) fn is_compatible(kind: WatermarkKind, typ: ColumnType) -> bool {
    match kind {
        WatermarkKind::Integer => matches!(typ, ColumnType::Integer),
        WatermarkKind::Timestamp => matches!(
            typ,
            ColumnType::Timestamp | ColumnType::TimestampTz | ColumnType::Date
        ),
        WatermarkKind::String => matches!(typ, ColumnType::String),
    }
}

/// The persisted watermark of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkState {
    pub flow: String,
    pub entity: String,
    pub column: String,
    pub value: WatermarkValue,
    pub kind: WatermarkKind,
    pub updated_at: DateTime<Utc>,
}

impl WatermarkState {
    pub fn new(identity: &EntityIdentity, column: impl Into<String>, value: WatermarkValue) -> Self {
        Self {
            flow: identity.flow().to_string(),
            entity: identity.entity().to_string(),
            column: column.into(),
            kind: value.kind(),
            value,
            updated_at: Utc::now(),
        }
    }

    pub fn identity(&self) -> EntityIdentity {
        EntityIdentity::new(&self.flow, &self.entity)
    }

    /// Checks that `value` and `kind` agree.
    pub fn validate(&self) -> HaulResult<()> {
        if self.value.kind() != self.kind {
            bail!(
                ErrorKind::JournalCorrupted,
                "Watermark value does not match its declared kind",
                format!(
                    "watermark of {}.{} declares kind {} but holds a {} value",
                    self.flow,
                    self.entity,
                    self.kind,
                    self.value.kind()
                )
            );
        }

        Ok(())
    }
}
