use std::fmt;
use std::future::Future;

use futures::future::BoxFuture;

use crate::RunMode;
use crate::error::HaulResult;
use crate::pool::PoolRegistry;
use crate::types::Batch;

/// Outcome of [`Store::finish`].
pub enum Completion {
    /// The store accepted every batch; nothing is left to wait for.
    Settled,
    /// The store handed the data to a remote step that settles later.
    ///
    /// In `full_drop` mode the mover gives up its concurrency slot while awaiting the future.
    Pending(BoxFuture<'static, HaulResult<()>>),
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Settled => f.write_str("Settled"),
            Completion::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// Trait for systems that batches are written to.
///
/// The mover writes batches in home order from a single consumer task, then calls
/// [`Store::finish`] once. A failed attempt is followed by [`Store::cleanup_staging`] and
/// [`Store::reset_retry_sensitive_state`] before the entity is read again from the start, so
/// implementations must not publish partial data before `finish` succeeds.
///
/// The optional hooks default to no-ops.
pub trait Store {
    /// Returns the name of the store, used in logs.
    fn name(&self) -> &str;

    /// Picks up pooled connections from `registry`. Called once when the mover is built.
    fn set_pool(&mut self, _registry: &PoolRegistry) -> HaulResult<()> {
        Ok(())
    }

    /// Prepares the store for a run in `mode`. Called before every attempt.
    fn configure_for_run(&self, _mode: RunMode) -> impl Future<Output = HaulResult<()>> + Send {
        async { Ok(()) }
    }

    /// Writes one batch.
    fn write(&self, batch: Batch) -> impl Future<Output = HaulResult<()>> + Send;

    /// Completes the attempt, making the written batches visible.
    fn finish(&self) -> impl Future<Output = HaulResult<Completion>> + Send;

    /// Drops whatever a failed attempt left staged.
    fn cleanup_staging(&self) -> impl Future<Output = HaulResult<()>> + Send {
        async { Ok(()) }
    }

    /// Resets state that must not survive into a retried attempt, such as cached sessions.
    fn reset_retry_sensitive_state(&self) -> impl Future<Output = HaulResult<()>> + Send {
        async { Ok(()) }
    }
}
