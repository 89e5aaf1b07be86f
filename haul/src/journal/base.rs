use std::future::Future;

use crate::error::HaulResult;
use crate::journal::{JournalSnapshot, RunEvent};
use crate::types::EntityIdentity;
use crate::watermark::WatermarkState;

/// Trait for storing run events and watermarks.
///
/// Implementations must tolerate concurrent calls from many movers. Movers treat every journal
/// error as non-fatal: they log it and keep going.
pub trait Journal {
    /// Returns `false` for journals that keep nothing, which also disables mirror tracking.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Appends `event` to the run history.
    fn record_event(&self, event: RunEvent) -> impl Future<Output = HaulResult<()>> + Send;

    /// Returns the latest terminal event (complete, fail or skip) of `identity`.
    fn last_run(
        &self,
        identity: &EntityIdentity,
    ) -> impl Future<Output = HaulResult<Option<RunEvent>>> + Send;

    /// Returns every event of `identity` in recording order.
    fn events(
        &self,
        identity: &EntityIdentity,
    ) -> impl Future<Output = HaulResult<Vec<RunEvent>>> + Send;

    /// Returns the persisted watermark of `identity`.
    fn get_watermark(
        &self,
        identity: &EntityIdentity,
    ) -> impl Future<Output = HaulResult<Option<WatermarkState>>> + Send;

    /// Stores `state` as the watermark of the entity it names.
    fn set_watermark(&self, state: WatermarkState)
    -> impl Future<Output = HaulResult<()>> + Send;

    /// Persists anything a previous write could not persist.
    fn flush(&self) -> impl Future<Output = HaulResult<()>> + Send {
        async { Ok(()) }
    }

    /// Returns a full copy of both tables in canonical order.
    fn snapshot(&self) -> impl Future<Output = HaulResult<JournalSnapshot>> + Send;
}
