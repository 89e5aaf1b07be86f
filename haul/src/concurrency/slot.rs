use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::bail;
use crate::error::{ErrorKind, HaulResult};

/// A permit to run, taken from the orchestrator's concurrency semaphore.
///
/// A mover may [`release`](ConcurrencySlot::release) its slot while it only waits on a remote
/// step, letting another mover start, and [`reacquire`](ConcurrencySlot::reacquire) it before
/// doing more work.
#[derive(Debug)]
pub struct ConcurrencySlot {
    semaphore: Arc<Semaphore>,
    permit: Option<OwnedSemaphorePermit>,
}

impl ConcurrencySlot {
    /// Waits for a free slot on `semaphore`.
    pub async fn acquire(semaphore: Arc<Semaphore>) -> HaulResult<Self> {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => bail!(
                ErrorKind::InvalidState,
                "Concurrency semaphore closed while waiting for a slot"
            ),
        };

        Ok(Self {
            semaphore,
            permit: Some(permit),
        })
    }

    /// Gives the slot back. Returns `false` if it was not held.
    pub fn release(&mut self) -> bool {
        let released = self.permit.take().is_some();
        if released {
            debug!(
                available = self.semaphore.available_permits(),
                "released concurrency slot"
            );
        }

        released
    }

    /// Takes a slot again after [`release`](ConcurrencySlot::release). No-op if already held.
    pub async fn reacquire(&mut self) -> HaulResult<()> {
        if self.permit.is_some() {
            return Ok(());
        }

        let permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => bail!(
                ErrorKind::InvalidState,
                "Concurrency semaphore closed while reacquiring a slot"
            ),
        };
        self.permit = Some(permit);

        Ok(())
    }

    pub fn is_held(&self) -> bool {
        self.permit.is_some()
    }
}
