use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::HaulResult;
use crate::journal::tables::JournalTables;
use crate::journal::{Journal, JournalSnapshot, RunEvent};
use crate::types::EntityIdentity;
use crate::watermark::WatermarkState;

/// In-memory journal for tests and dry runs.
///
/// History lives as long as the last clone. Cloning shares the underlying tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryJournal {
    tables: Arc<Mutex<JournalTables>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Journal for MemoryJournal {
    async fn record_event(&self, event: RunEvent) -> HaulResult<()> {
        self.tables.lock().await.record_event(event);

        Ok(())
    }

    async fn last_run(&self, identity: &EntityIdentity) -> HaulResult<Option<RunEvent>> {
        Ok(self.tables.lock().await.last_run(identity))
    }

    async fn events(&self, identity: &EntityIdentity) -> HaulResult<Vec<RunEvent>> {
        Ok(self.tables.lock().await.events(identity))
    }

    async fn get_watermark(&self, identity: &EntityIdentity) -> HaulResult<Option<WatermarkState>> {
        Ok(self.tables.lock().await.get_watermark(identity))
    }

    async fn set_watermark(&self, state: WatermarkState) -> HaulResult<()> {
        self.tables.lock().await.set_watermark(state)
    }

    async fn snapshot(&self) -> HaulResult<JournalSnapshot> {
        Ok(self.tables.lock().await.snapshot())
    }
}
