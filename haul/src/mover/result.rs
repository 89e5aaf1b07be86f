use std::fmt;
use std::time::Duration;

use crate::error::HaulError;
use crate::types::{EntityIdentity, RunId};
use crate::watermark::WatermarkState;

/// Terminal status of a mover run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    Succeeded,
    Failed,
    Skipped,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one mover run.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub identity: EntityIdentity,
    pub run_id: RunId,
    pub status: RunStatus,
    /// Rows written by the successful attempt, or by the last attempt of a failed run.
    pub rows_moved: u64,
    pub batches: u64,
    pub attempts: u32,
    pub duration: Duration,
    pub error: Option<HaulError>,
    /// Watermark committed by this run, if any.
    pub watermark: Option<WatermarkState>,
    /// Highest number of batches buffered between producer and consumer.
    pub peak_queue_depth: usize,
}

impl RunResult {
    pub(crate) fn skipped(identity: EntityIdentity, run_id: RunId) -> Self {
        Self {
            identity,
            run_id,
            status: RunStatus::Skipped,
            rows_moved: 0,
            batches: 0,
            attempts: 0,
            duration: Duration::ZERO,
            error: None,
            watermark: None,
            peak_queue_depth: 0,
        }
    }

    pub(crate) fn failed(identity: EntityIdentity, run_id: RunId, error: HaulError) -> Self {
        Self {
            status: RunStatus::Failed,
            error: Some(error),
            ..Self::skipped(identity, run_id)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }
}
