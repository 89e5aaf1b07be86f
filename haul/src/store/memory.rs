use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::RunMode;
use crate::error::HaulResult;
use crate::store::{Completion, Store};
use crate::types::{Batch, TableRow};

#[derive(Debug, Default)]
struct Inner {
    mode: RunMode,
    staging: Vec<Batch>,
    committed: Vec<Batch>,
}

/// In-memory store for testing and development purposes.
///
/// Batches are staged until [`Store::finish`], which replaces the committed data in `full_drop`
/// mode and appends to it in `incremental` mode. Cloning shares the underlying data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all committed batches in write order.
    pub async fn batches(&self) -> Vec<Batch> {
        let inner = self.inner.lock().await;
        inner.committed.clone()
    }

    /// Returns a copy of all committed rows in write order.
    pub async fn rows(&self) -> Vec<TableRow> {
        let inner = self.inner.lock().await;
        inner
            .committed
            .iter()
            .flat_map(|batch| batch.rows().iter().cloned())
            .collect()
    }

    /// Number of rows staged but not yet finished.
    pub async fn staged_row_count(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.staging.iter().map(Batch::row_count).sum()
    }
}

impl Store for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn configure_for_run(&self, mode: RunMode) -> HaulResult<()> {
        let mut inner = self.inner.lock().await;
        inner.mode = mode;

        Ok(())
    }

    async fn write(&self, batch: Batch) -> HaulResult<()> {
        let mut inner = self.inner.lock().await;
        inner.staging.push(batch);

        Ok(())
    }

    async fn finish(&self) -> HaulResult<Completion> {
        let mut inner = self.inner.lock().await;
        let staged = std::mem::take(&mut inner.staging);
        let rows: usize = staged.iter().map(Batch::row_count).sum();

        match inner.mode {
            RunMode::FullDrop => inner.committed = staged,
            RunMode::Incremental => inner.committed.extend(staged),
        }

        info!(rows, mode = %inner.mode, "memory store committed staged batches");

        Ok(Completion::Settled)
    }

    async fn cleanup_staging(&self) -> HaulResult<()> {
        let mut inner = self.inner.lock().await;
        inner.staging.clear();

        Ok(())
    }
}
