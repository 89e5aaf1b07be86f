use crate::error::HaulResult;
use crate::journal::{Journal, JournalSnapshot, RunEvent};
use crate::types::EntityIdentity;
use crate::watermark::WatermarkState;

/// Journal used when history is disabled.
///
/// Every write succeeds without keeping anything and every read finds nothing, so incremental
/// flows always read their full dataset.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopJournal;

impl Journal for NoopJournal {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn record_event(&self, _event: RunEvent) -> HaulResult<()> {
        Ok(())
    }

    async fn last_run(&self, _identity: &EntityIdentity) -> HaulResult<Option<RunEvent>> {
        Ok(None)
    }

    async fn events(&self, _identity: &EntityIdentity) -> HaulResult<Vec<RunEvent>> {
        Ok(Vec::new())
    }

    async fn get_watermark(&self, _identity: &EntityIdentity) -> HaulResult<Option<WatermarkState>> {
        Ok(None)
    }

    async fn set_watermark(&self, _state: WatermarkState) -> HaulResult<()> {
        Ok(())
    }

    async fn snapshot(&self) -> HaulResult<JournalSnapshot> {
        Ok(JournalSnapshot::default())
    }
}
