use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::bail;
use crate::concurrency::shutdown::{ShutdownResult, ShutdownRx, shutdown_requested};
use crate::concurrency::stream::ShutdownStream;
use crate::error::{ErrorKind, HaulError, HaulResult};
#[cfg(feature = "failpoints")]
use crate::failpoints::{MOVER_BEFORE_STORE_WRITE, haul_fail_point};
use crate::home::Home;
use crate::journal::Journal;
use crate::mover::Mover;
use crate::store::Store;
use crate::types::{Batch, EntityIdentity};
use crate::watermark::{FilterExpression, Watermark};

/// Progress of one attempt, readable after the attempt ends however it ended.
#[derive(Debug, Default)]
pub(crate) struct AttemptCounters {
    rows: AtomicU64,
    batches: AtomicU64,
    peak_queue_depth: AtomicUsize,
}

impl AttemptCounters {
    pub(crate) fn rows(&self) -> u64 {
        self.rows.load(Ordering::Acquire)
    }

    pub(crate) fn batches(&self) -> u64 {
        self.batches.load(Ordering::Acquire)
    }

    pub(crate) fn peak_queue_depth(&self) -> usize {
        self.peak_queue_depth.load(Ordering::Acquire)
    }
}

enum TaskOutput {
    Producer,
    Consumer(Option<Watermark>),
}

fn shutdown_error(identity: &EntityIdentity, step: &str) -> HaulError {
    HaulError::from((
        ErrorKind::ShutdownRequested,
        "Mover stopped by a shutdown request",
        format!("{identity} stopped while {step}"),
    ))
}

/// Reads every batch from the home into `tx` until the stream ends.
///
/// A closed channel means the consumer already stopped; its outcome decides the attempt, so
/// the producer then ends without error.
async fn produce<H: Home>(
    identity: EntityIdentity,
    home: H,
    filter: Option<FilterExpression>,
    tx: mpsc::Sender<Batch>,
    shutdown_rx: ShutdownRx,
    counters: Arc<AttemptCounters>,
) -> HaulResult<TaskOutput> {
    let mut send_shutdown_rx = shutdown_rx.clone();
    let batches = home.read_batches(filter).await?;
    let mut batches = pin!(ShutdownStream::wrap(batches, shutdown_rx));

    while let Some(item) = batches.next().await {
        let batch = match item {
            ShutdownResult::Ok(batch) => batch?,
            ShutdownResult::Shutdown(()) => return Err(shutdown_error(&identity, "reading")),
        };

        tokio::select! {
            biased;

            _ = shutdown_requested(&mut send_shutdown_rx) => {
                return Err(shutdown_error(&identity, "waiting for queue space"));
            }
            sent = tx.send(batch) => {
                if sent.is_err() {
                    debug!(%identity, "consumer stopped, producer exiting");
                    return Ok(TaskOutput::Producer);
                }
            }
        }

        let depth = tx.max_capacity() - tx.capacity();
        counters.peak_queue_depth.fetch_max(depth, Ordering::AcqRel);
    }

    debug!(%identity, "home exhausted");

    Ok(TaskOutput::Producer)
}

/// Writes every batch received on `rx` to the store, in order.
async fn consume<S: Store>(
    identity: EntityIdentity,
    store: S,
    mut watermark: Option<Watermark>,
    mut rx: mpsc::Receiver<Batch>,
    mut shutdown_rx: ShutdownRx,
    counters: Arc<AttemptCounters>,
) -> HaulResult<TaskOutput> {
    loop {
        let batch = tokio::select! {
            biased;

            _ = shutdown_requested(&mut shutdown_rx) => {
                return Err(shutdown_error(&identity, "writing"));
            }
            batch = rx.recv() => batch,
        };

        let Some(batch) = batch else {
            break;
        };

        #[cfg(feature = "failpoints")]
        haul_fail_point(MOVER_BEFORE_STORE_WRITE)?;

        if let Some(watermark) = watermark.as_mut() {
            watermark.observe(&batch)?;
        }

        let rows = batch.row_count() as u64;
        store.write(batch).await?;

        counters.rows.fetch_add(rows, Ordering::AcqRel);
        let batches = counters.batches.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(%identity, batch = batches, rows, "batch written");
    }

    Ok(TaskOutput::Consumer(watermark))
}

impl<H, S, J> Mover<H, S, J>
where
    H: Home + Clone + Send + Sync + 'static,
    S: Store + Clone + Send + Sync + 'static,
    J: Journal + Clone + Send + Sync + 'static,
{
    /// Runs the producer and consumer of one attempt and returns the consumer's watermark.
    ///
    /// The first task to fail aborts the other; batches still queued are dropped.
    pub(super) async fn transfer(
        &self,
        watermark: Option<Watermark>,
        filter: Option<FilterExpression>,
        shutdown_rx: &ShutdownRx,
        counters: &Arc<AttemptCounters>,
    ) -> HaulResult<Option<Watermark>> {
        let identity = &self.identity;
        let (tx, rx) = mpsc::channel(self.config.queue_capacity);
        let mut tasks = JoinSet::new();

        tasks.spawn(produce(
            identity.clone(),
            self.home.clone(),
            filter,
            tx,
            shutdown_rx.clone(),
            counters.clone(),
        ));
        tasks.spawn(consume(
            identity.clone(),
            self.store.clone(),
            watermark,
            rx,
            shutdown_rx.clone(),
            counters.clone(),
        ));

        let mut errors = Vec::new();
        let mut observed = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(TaskOutput::Producer)) => {}
                Ok(Ok(TaskOutput::Consumer(watermark))) => observed = Some(watermark),
                Ok(Err(err)) => {
                    if errors.is_empty() {
                        tasks.abort_all();
                    }
                    errors.push(err);
                }
                Err(join_err) if join_err.is_cancelled() => {}
                Err(join_err) => {
                    warn!(%identity, error = %join_err, "mover task panicked");
                    tasks.abort_all();
                    errors.push(HaulError::from(join_err));
                }
            }
        }

        if !errors.is_empty() {
            return Err(errors.into());
        }

        match observed {
            Some(watermark) => Ok(watermark),
            None => bail!(
                ErrorKind::InvalidState,
                "Consumer task ended without reporting its result",
                identity.to_string()
            ),
        }
    }
}
