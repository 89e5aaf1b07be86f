use metrics::counter;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ErrorKind, HaulResult};
use crate::haul_error;
use crate::journal::Journal;
use crate::metrics::{HAUL_MIRROR_PUBLISHES_TOTAL, STATUS_LABEL};
use crate::mirror::handle::DirtyMarks;
use crate::mirror::{MirrorHandle, MirrorSnapshot, MirrorTarget, RUN_EVENTS_TABLE, WATERMARKS_TABLE};
use crate::types::EntityIdentity;

/// Result of a publish request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Nothing changed since the last publication; the target was not touched.
    Clean,
    /// Both tables were rewritten.
    Published { events: usize, watermarks: usize },
}

/// Publishes the journal of `J` to the target `T` when entities were marked dirty.
///
/// The dirty set is cleared only after the target accepted the publication, so a failed
/// publish is retried by the next call.
#[derive(Debug)]
pub struct MirroredPublisher<J, T> {
    journal: J,
    target: T,
    handle: MirrorHandle,
    publish_lock: Mutex<()>,
}

impl<J, T> MirroredPublisher<J, T>
where
    J: Journal,
    T: MirrorTarget,
{
    pub fn new(journal: J, target: T) -> Self {
        Self {
            journal,
            target,
            handle: MirrorHandle::new(),
            publish_lock: Mutex::new(()),
        }
    }

    /// Returns a handle movers use to mark entities dirty.
    pub fn handle(&self) -> MirrorHandle {
        self.handle.clone()
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn mark_dirty(&self, identity: &EntityIdentity) {
        self.handle.mark_dirty(identity);
    }

    pub fn is_dirty(&self) -> bool {
        self.handle.is_dirty()
    }

    /// Publishes if any entity is dirty.
    pub async fn publish(&self) -> HaulResult<PublishOutcome> {
        let _guard = self.publish_lock.lock().await;

        let marks = self.handle.marks();
        if marks.is_empty() {
            debug!("mirror is clean, skipping publish");
            return Ok(PublishOutcome::Clean);
        }

        self.publish_marks(marks).await
    }

    /// Publishes regardless of the dirty set.
    pub async fn force_publish(&self) -> HaulResult<PublishOutcome> {
        let _guard = self.publish_lock.lock().await;

        let marks = self.handle.marks();
        self.publish_marks(marks).await
    }

    async fn publish_marks(&self, marks: DirtyMarks) -> HaulResult<PublishOutcome> {
        let result = self.write_snapshot().await;

        match result {
            Ok(outcome) => {
                self.handle.clear(&marks);
                counter!(HAUL_MIRROR_PUBLISHES_TOTAL, STATUS_LABEL => "published").increment(1);

                Ok(outcome)
            }
            Err(err) => {
                counter!(HAUL_MIRROR_PUBLISHES_TOTAL, STATUS_LABEL => "failed").increment(1);
                warn!(error = %err, "mirror publish failed, entities stay dirty");

                Err(haul_error!(
                    ErrorKind::MirrorPublishFailed,
                    "Mirror could not be published",
                    source: err
                ))
            }
        }
    }

    async fn write_snapshot(&self) -> HaulResult<PublishOutcome> {
        let journal_snapshot = self.journal.snapshot().await?;
        let snapshot = MirrorSnapshot::from_journal(&journal_snapshot)?;

        self.target.replace_all(&snapshot).await?;

        let events = snapshot
            .table(RUN_EVENTS_TABLE)
            .map_or(0, |table| table.batch.row_count());
        let watermarks = snapshot
            .table(WATERMARKS_TABLE)
            .map_or(0, |table| table.batch.row_count());
        info!(events, watermarks, "mirror published");

        Ok(PublishOutcome::Published { events, watermarks })
    }
}
