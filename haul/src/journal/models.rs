use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{EntityIdentity, RunId};
use crate::watermark::WatermarkState;

/// Lifecycle step recorded by a [`RunEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEventKind {
    Start,
    Complete,
    Fail,
    Skip,
}

impl RunEventKind {
    /// Returns `true` for the kinds that end a run.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunEventKind::Start)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunEventKind::Start => "start",
            RunEventKind::Complete => "complete",
            RunEventKind::Fail => "fail",
            RunEventKind::Skip => "skip",
        }
    }
}

impl fmt::Display for RunEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the run history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub event_id: Uuid,
    pub run_id: RunId,
    pub timestamp: DateTime<Utc>,
    pub flow: String,
    pub entity: String,
    pub kind: RunEventKind,
    pub row_count: u64,
    pub duration_ms: u64,
    #[serde(default)]
    pub watermark: Option<WatermarkState>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl RunEvent {
    pub fn new(run_id: RunId, identity: &EntityIdentity, kind: RunEventKind) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            run_id,
            timestamp: Utc::now(),
            flow: identity.flow().to_string(),
            entity: identity.entity().to_string(),
            kind,
            row_count: 0,
            duration_ms: 0,
            watermark: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_row_count(mut self, row_count: u64) -> Self {
        self.row_count = row_count;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_watermark(mut self, watermark: Option<WatermarkState>) -> Self {
        self.watermark = watermark;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn identity(&self) -> EntityIdentity {
        EntityIdentity::new(&self.flow, &self.entity)
    }

    pub fn belongs_to(&self, identity: &EntityIdentity) -> bool {
        self.flow == identity.flow() && self.entity == identity.entity()
    }
}

/// Full copy of the journal in canonical order.
///
/// Events are ordered by timestamp then id, watermarks by flow then entity, so two snapshots of
/// an unchanged journal are equal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JournalSnapshot {
    pub events: Vec<RunEvent>,
    pub watermarks: Vec<WatermarkState>,
}
