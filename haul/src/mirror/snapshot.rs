use std::sync::Arc;

use chrono::SecondsFormat;

use crate::error::{ErrorKind, HaulResult};
use crate::haul_error;
use crate::journal::{JournalSnapshot, RunEvent};
use crate::mirror::{MirrorManifest, TableManifest};
use crate::types::{Batch, BatchSchema, Cell, ColumnSchema, ColumnType, TableRow};
use crate::watermark::{WatermarkState, WatermarkValue};

/// Name of the published run history table.
pub const RUN_EVENTS_TABLE: &str = "run_events";

/// Name of the published watermarks table.
pub const WATERMARKS_TABLE: &str = "watermarks";

/// One published table with its manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorTable {
    pub name: String,
    pub batch: Batch,
    pub manifest: TableManifest,
}

impl MirrorTable {
    fn new(name: &str, batch: Batch) -> Self {
        Self {
            name: name.to_string(),
            manifest: TableManifest::from_batch(name, &batch),
            batch,
        }
    }

    /// Renders every row as one JSON object per line, keyed by column name.
    pub fn to_json_lines(&self) -> HaulResult<Vec<u8>> {
        let columns = self.batch.schema().columns();
        let mut output = Vec::new();

        for row in self.batch.rows() {
            let object: serde_json::Map<String, serde_json::Value> = columns
                .iter()
                .zip(row.values())
                .map(|(column, cell)| (column.name.clone(), cell.to_json()))
                .collect();

            serde_json::to_writer(&mut output, &object).map_err(|err| {
                haul_error!(
                    ErrorKind::SerializationError,
                    "Mirror row could not be serialized",
                    self.name,
                    source: err
                )
            })?;
            output.push(b'\n');
        }

        Ok(output)
    }
}

/// Everything a [`crate::mirror::MirrorTarget`] publishes in one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorSnapshot {
    pub tables: Vec<MirrorTable>,
}

impl MirrorSnapshot {
    /// Builds the run history and watermark tables from a journal snapshot.
    pub fn from_journal(snapshot: &JournalSnapshot) -> HaulResult<Self> {
        let run_events = run_events_batch(&snapshot.events)?;
        let watermarks = watermarks_batch(&snapshot.watermarks)?;

        Ok(Self {
            tables: vec![
                MirrorTable::new(RUN_EVENTS_TABLE, run_events),
                MirrorTable::new(WATERMARKS_TABLE, watermarks),
            ],
        })
    }

    pub fn table(&self, name: &str) -> Option<&MirrorTable> {
        self.tables.iter().find(|table| table.name == name)
    }

    pub fn manifest(&self) -> MirrorManifest {
        MirrorManifest {
            tables: self
                .tables
                .iter()
                .map(|table| table.manifest.clone())
                .collect(),
        }
    }
}

fn run_events_schema() -> HaulResult<BatchSchema> {
    BatchSchema::try_new(vec![
        ColumnSchema::new("event_id", ColumnType::String, false).primary_key(),
        ColumnSchema::new("run_id", ColumnType::String, false),
        ColumnSchema::new("timestamp", ColumnType::TimestampTz, false),
        ColumnSchema::new("flow", ColumnType::String, false),
        ColumnSchema::new("entity", ColumnType::String, false),
        ColumnSchema::new("kind", ColumnType::String, false),
        ColumnSchema::new("row_count", ColumnType::Integer, false),
        ColumnSchema::new("duration_ms", ColumnType::Integer, false),
        ColumnSchema::new("watermark_column", ColumnType::String, true),
        ColumnSchema::new("watermark_value", ColumnType::String, true),
        ColumnSchema::new("watermark_kind", ColumnType::String, true),
        ColumnSchema::new("metadata", ColumnType::Json, false),
    ])
}

fn watermarks_schema() -> HaulResult<BatchSchema> {
    BatchSchema::try_new(vec![
        ColumnSchema::new("flow", ColumnType::String, false).primary_key(),
        ColumnSchema::new("entity", ColumnType::String, false).primary_key(),
        ColumnSchema::new("column", ColumnType::String, false),
        ColumnSchema::new("kind", ColumnType::String, false),
        ColumnSchema::new("value", ColumnType::String, false),
        ColumnSchema::new("updated_at", ColumnType::TimestampTz, false),
    ])
}

/// Renders a watermark value without quoting, as published in the mirror.
fn watermark_text(value: &WatermarkValue) -> String {
    match value {
        WatermarkValue::Integer(value) => value.to_string(),
        WatermarkValue::Timestamp(value) => value.to_rfc3339_opts(SecondsFormat::Micros, true),
        WatermarkValue::String(value) => value.clone(),
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn run_events_batch(events: &[RunEvent]) -> HaulResult<Batch> {
    let rows = events
        .iter()
        .map(|event| {
            let watermark = event.watermark.as_ref();
            let metadata = serde_json::Value::Object(
                event
                    .metadata
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            );

            TableRow::new(vec![
                Cell::String(event.event_id.to_string()),
                Cell::String(event.run_id.to_string()),
                Cell::TimestampTz(event.timestamp),
                Cell::String(event.flow.clone()),
                Cell::String(event.entity.clone()),
                Cell::String(event.kind.as_str().to_string()),
                Cell::I64(saturating_i64(event.row_count)),
                Cell::I64(saturating_i64(event.duration_ms)),
                Cell::from(watermark.map(|w| w.column.clone())),
                Cell::from(watermark.map(|w| watermark_text(&w.value))),
                Cell::from(watermark.map(|w| w.kind.as_str())),
                Cell::Json(metadata),
            ])
        })
        .collect();

    Batch::try_new(Arc::new(run_events_schema()?), rows)
}

fn watermarks_batch(watermarks: &[WatermarkState]) -> HaulResult<Batch> {
    let rows = watermarks
        .iter()
        .map(|state| {
            TableRow::new(vec![
                Cell::String(state.flow.clone()),
                Cell::String(state.entity.clone()),
                Cell::String(state.column.clone()),
                Cell::String(state.kind.as_str().to_string()),
                Cell::String(watermark_text(&state.value)),
                Cell::TimestampTz(state.updated_at),
            ])
        })
        .collect();

    Batch::try_new(Arc::new(watermarks_schema()?), rows)
}
