//! Runs many movers concurrently under a shared slot limit.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use haul_config::shared::{HaulConfig, OrchestratorConfig};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::concurrency::shutdown::{
    ShutdownTx, create_shutdown_channel, is_shutdown_requested, shutdown_requested,
};
use crate::concurrency::slot::ConcurrencySlot;
use crate::error::{HaulError, HaulResult};
use crate::home::Home;
use crate::journal::{ConfiguredJournal, Journal, RunEvent, RunEventKind};
use crate::mirror::{ConfiguredMirrorTarget, MirrorTarget, MirroredPublisher};
use crate::mover::{Mover, RunResult, RunStatus};
use crate::store::Store;
use crate::types::{EntityIdentity, RunId};

/// Live counts of an orchestrator run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub pending: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub rows_moved: u64,
}

impl ProgressSnapshot {
    fn finish(&mut self, started: bool, result: &RunResult) {
        if started {
            self.running = self.running.saturating_sub(1);
        } else {
            self.pending = self.pending.saturating_sub(1);
        }

        match result.status {
            RunStatus::Succeeded => self.succeeded += 1,
            RunStatus::Failed => self.failed += 1,
            RunStatus::Skipped => self.skipped += 1,
        }
        self.rows_moved += result.rows_moved;
    }
}

/// Outcome of one orchestrator run.
#[derive(Debug, Clone)]
pub struct OrchestratorReport {
    pub run_id: RunId,
    /// One result per mover, ordered by identity.
    pub results: Vec<RunResult>,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_rows: u64,
    pub duration: Duration,
}

impl OrchestratorReport {
    fn new(run_id: RunId, mut results: Vec<RunResult>, duration: Duration) -> Self {
        results.sort_by(|a, b| a.identity.cmp(&b.identity));

        let count = |status: RunStatus| results.iter().filter(|r| r.status == status).count();
        let succeeded = count(RunStatus::Succeeded);
        let failed = count(RunStatus::Failed);
        let skipped = count(RunStatus::Skipped);
        let total_rows = results.iter().map(|r| r.rows_moved).sum();

        Self {
            run_id,
            results,
            succeeded,
            failed,
            skipped,
            total_rows,
            duration,
        }
    }

    /// Returns `true` if no mover failed.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn result(&self, identity: &EntityIdentity) -> Option<&RunResult> {
        self.results.iter().find(|r| &r.identity == identity)
    }
}

/// Schedules movers, reports their outcomes and publishes the journal mirror at the end.
///
/// At most `max_concurrent_movers` movers hold a [`ConcurrencySlot`] at once. A shutdown
/// requested through [`Orchestrator::shutdown_tx`] aborts running movers and skips the ones that
/// did not start yet.
#[derive(Debug)]
pub struct Orchestrator<J, T = ConfiguredMirrorTarget> {
    config: OrchestratorConfig,
    journal: J,
    publisher: Option<Arc<MirroredPublisher<J, T>>>,
    shutdown_tx: ShutdownTx,
    progress_tx: Arc<watch::Sender<ProgressSnapshot>>,
}

impl Orchestrator<ConfiguredJournal, ConfiguredMirrorTarget> {
    /// Builds the journal and the optional mirror described by `config`.
    pub fn from_config(config: &HaulConfig) -> HaulResult<Self> {
        config.validate()?;

        let journal = ConfiguredJournal::from_config(&config.journal)?;
        let orchestrator = Self::new(config.orchestrator.clone(), journal)?;

        match ConfiguredMirrorTarget::from_config(&config.mirror)? {
            Some(target) => Ok(orchestrator.with_mirror(target)),
            None => Ok(orchestrator),
        }
    }
}

impl<J, T> Orchestrator<J, T>
where
    J: Journal + Clone + Send + Sync + 'static,
    T: MirrorTarget + Send + Sync + 'static,
{
    pub fn new(config: OrchestratorConfig, journal: J) -> HaulResult<Self> {
        config.validate()?;

        let (shutdown_tx, _) = create_shutdown_channel();
        let (progress_tx, _) = watch::channel(ProgressSnapshot::default());

        Ok(Self {
            config,
            journal,
            publisher: None,
            shutdown_tx,
            progress_tx: Arc::new(progress_tx),
        })
    }

    /// Publishes the journal to `target` once every run finished.
    pub fn with_mirror(mut self, target: T) -> Self {
        self.publisher = Some(Arc::new(MirroredPublisher::new(self.journal.clone(), target)));
        self
    }

    pub fn journal(&self) -> &J {
        &self.journal
    }

    pub fn publisher(&self) -> Option<&Arc<MirroredPublisher<J, T>>> {
        self.publisher.as_ref()
    }

    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<ProgressSnapshot> {
        self.progress_tx.subscribe()
    }

    /// Runs every mover and waits for all of them.
    ///
    /// A panicking mover is reported as a failure of its entity; the others keep running. Once
    /// every mover finished, journal writes that failed during the run are flushed before the
    /// mirror is published.
    pub async fn run<H, S>(&self, movers: Vec<Mover<H, S, J>>) -> OrchestratorReport
    where
        H: Home + Clone + Send + Sync + 'static,
        S: Store + Clone + Send + Sync + 'static,
    {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_movers));

        info!(
            %run_id,
            movers = movers.len(),
            max_concurrent_movers = self.config.max_concurrent_movers,
            "orchestrator starting"
        );
        self.progress_tx.send_replace(ProgressSnapshot {
            pending: movers.len(),
            ..Default::default()
        });

        let mut tasks = JoinSet::new();
        let mut spawned = HashMap::new();

        for mut mover in movers {
            if let Some(publisher) = &self.publisher {
                mover.attach_mirror(publisher.handle());
            }

            let identity = mover.identity().clone();
            let has_started = Arc::new(AtomicBool::new(false));
            let task = run_mover(
                mover,
                run_id,
                semaphore.clone(),
                self.shutdown_tx.clone(),
                self.progress_tx.clone(),
                has_started.clone(),
            );
            let handle = tasks.spawn(task);
            spawned.insert(handle.id(), (identity, has_started));
        }

        let mut results = Vec::with_capacity(spawned.len());
        while let Some(joined) = tasks.join_next_with_id().await {
            let (result, has_started) = match joined {
                Ok((id, result)) => {
                    let has_started = spawned
                        .remove(&id)
                        .is_some_and(|(_, started)| started.load(Ordering::Acquire));
                    (result, has_started)
                }
                Err(join_err) => {
                    let Some((identity, started)) = spawned.remove(&join_err.id()) else {
                        error!(error = %join_err, "unknown mover task failed");
                        continue;
                    };
                    let result = self.task_failed(run_id, identity, join_err).await;
                    (result, started.load(Ordering::Acquire))
                }
            };

            self.progress_tx
                .send_modify(|progress| progress.finish(has_started, &result));
            results.push(result);
        }

        let report = OrchestratorReport::new(run_id, results, started.elapsed());
        info!(
            %run_id,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            rows = report.total_rows,
            duration_ms = report.duration.as_millis() as u64,
            "orchestrator finished"
        );

        if let Err(err) = self.journal.flush().await {
            warn!(%run_id, error = %err, "journal flush failed after run");
        }

        if self.config.publish_mirror
            && let Some(publisher) = &self.publisher
            && let Err(err) = publisher.publish().await
        {
            warn!(%run_id, error = %err, "mirror publish failed after run");
        }

        report
    }

    /// Turns a panicked mover task into a failed result and records it.
    async fn task_failed(
        &self,
        run_id: RunId,
        identity: EntityIdentity,
        join_err: tokio::task::JoinError,
    ) -> RunResult {
        error!(
            flow = identity.flow(),
            entity = identity.entity(),
            error = %join_err,
            "mover task panicked"
        );

        let err = HaulError::from(join_err);
        let event = RunEvent::new(run_id, &identity, RunEventKind::Fail)
            .with_metadata("error_kind", format!("{:?}", err.kind()))
            .with_metadata("error", err.to_string());

        match self.journal.record_event(event).await {
            Ok(()) => {
                if self.journal.is_enabled()
                    && let Some(publisher) = &self.publisher
                {
                    publisher.mark_dirty(&identity);
                }
            }
            Err(journal_err) => {
                warn!(%identity, error = %journal_err, "could not record mover panic");
            }
        }

        RunResult::failed(identity, run_id, err)
    }
}

async fn run_mover<H, S, J>(
    mover: Mover<H, S, J>,
    run_id: RunId,
    semaphore: Arc<Semaphore>,
    shutdown_tx: ShutdownTx,
    progress_tx: Arc<watch::Sender<ProgressSnapshot>>,
    has_started: Arc<AtomicBool>,
) -> RunResult
where
    H: Home + Clone + Send + Sync + 'static,
    S: Store + Clone + Send + Sync + 'static,
    J: Journal + Clone + Send + Sync + 'static,
{
    let ctx = mover.context(run_id);
    let mut shutdown_rx = shutdown_tx.subscribe();

    let slot = tokio::select! {
        biased;

        _ = shutdown_requested(&mut shutdown_rx) => None,
        slot = ConcurrencySlot::acquire(semaphore) => Some(slot),
    };

    let mut slot = match slot {
        Some(Ok(slot)) if !is_shutdown_requested(&shutdown_rx) => slot,
        Some(Err(err)) => {
            return RunResult::failed(mover.identity().clone(), run_id, err);
        }
        _ => return mover.skip(ctx, "shutdown requested before start").await,
    };

    has_started.store(true, Ordering::Release);
    progress_tx.send_modify(|progress| {
        progress.pending = progress.pending.saturating_sub(1);
        progress.running += 1;
    });

    mover.run_with(ctx, shutdown_rx, Some(&mut slot)).await
}
