use std::sync::Arc;
use std::time::Duration;

use haul_config::shared::{FlowConfig, MoverConfig, WatermarkConfig};
use metrics::{counter, histogram};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::RunMode;
use crate::concurrency::shutdown::{ShutdownRx, create_shutdown_channel, shutdown_requested};
use crate::concurrency::slot::ConcurrencySlot;
use crate::error::{ErrorKind, HaulError, HaulResult};
use crate::home::Home;
use crate::journal::{Journal, RunEvent, RunEventKind};
use crate::metrics::{
    ENTITY_LABEL, ERROR_KIND_LABEL, FLOW_LABEL, HAUL_BATCHES_WRITTEN_TOTAL,
    HAUL_JOURNAL_FAILURES_TOTAL, HAUL_MOVER_ATTEMPTS_TOTAL, HAUL_MOVER_DURATION_SECONDS,
    HAUL_MOVER_PEAK_QUEUE_DEPTH, HAUL_MOVER_RETRIES_TOTAL, HAUL_MOVER_RUNS_TOTAL,
    HAUL_ROWS_MOVED_TOTAL, STATUS_LABEL, TABLE_LABEL,
};
use crate::mirror::MirrorHandle;
use crate::mover::attempt::AttemptCounters;
use crate::mover::{RunResult, RunStatus};
use crate::pool::PoolRegistry;
use crate::retry::{RetryBudget, RetryDecision, RetryPolicy};
use crate::store::{Completion, Store};
use crate::types::{EntityIdentity, RunContext, RunId};
use crate::watermark::{FilterExpression, Watermark, WatermarkState};

/// Observable lifecycle of a [`Mover`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoverState {
    Idle,
    Running { attempt: u32 },
    Retrying { attempt: u32, delay: Duration },
    Succeeded,
    Failed,
}

/// Watermark and read filter shared by every attempt of a run.
#[derive(Debug, Clone)]
struct Prepared {
    watermark: Option<Watermark>,
    filter: Option<FilterExpression>,
}

/// What a successful attempt produced.
struct AttemptOutcome {
    watermark: Option<Watermark>,
}

/// Moves one entity from a home `H` to a store `S`, recording its runs in a journal `J`.
///
/// The entity identity is fixed at construction and carried unchanged through every attempt and
/// every journal record.
#[derive(Debug)]
pub struct Mover<H, S, J> {
    pub(super) identity: EntityIdentity,
    pub(super) mode: RunMode,
    pub(super) config: MoverConfig,
    pub(super) watermark: Option<WatermarkConfig>,
    pub(super) home: H,
    pub(super) store: S,
    pub(super) journal: J,
    pub(super) retry_policy: RetryPolicy,
    pub(super) mirror: Option<MirrorHandle>,
    pub(super) state_tx: watch::Sender<MoverState>,
}

impl<H, S, J> Mover<H, S, J>
where
    H: Home + Clone + Send + Sync + 'static,
    S: Store + Clone + Send + Sync + 'static,
    J: Journal + Clone + Send + Sync + 'static,
{
    /// Creates a mover for the entity described by `flow`.
    ///
    /// The store picks up its connections from `pools` here.
    pub fn new(
        flow: &FlowConfig,
        home: H,
        mut store: S,
        journal: J,
        pools: &PoolRegistry,
    ) -> HaulResult<Self> {
        flow.validate()?;
        store.set_pool(pools)?;

        let (state_tx, _) = watch::channel(MoverState::Idle);

        Ok(Self {
            identity: EntityIdentity::new(&flow.flow_name, &flow.entity_name),
            mode: flow.run_mode,
            config: flow.mover.clone(),
            watermark: flow.watermark.clone(),
            home,
            store,
            journal,
            retry_policy: RetryPolicy::new(flow.mover.retry.clone()),
            mirror: None,
            state_tx,
        })
    }

    /// Marks the entity dirty on `mirror` after every successful journal write.
    pub fn with_mirror(mut self, mirror: MirrorHandle) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn attach_mirror(&mut self, mirror: MirrorHandle) {
        self.mirror = Some(mirror);
    }

    pub fn identity(&self) -> &EntityIdentity {
        &self.identity
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn home(&self) -> &H {
        &self.home
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn journal(&self) -> &J {
        &self.journal
    }

    pub fn state(&self) -> MoverState {
        *self.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<MoverState> {
        self.state_tx.subscribe()
    }

    /// Returns the context of the first attempt of a run of this mover.
    pub fn context(&self, run_id: RunId) -> RunContext {
        RunContext::new(run_id, self.identity.clone(), self.mode)
    }

    /// Runs once without a shutdown signal or concurrency slot.
    pub async fn run(&self, ctx: RunContext) -> RunResult {
        let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
        self.run_with(ctx, shutdown_rx, None).await
    }

    /// Records a skipped run without touching the home or the store.
    pub async fn skip(&self, ctx: RunContext, reason: &str) -> RunResult {
        info!(
            flow = self.identity.flow(),
            entity = self.identity.entity(),
            reason,
            "mover skipped"
        );

        let event = RunEvent::new(ctx.run_id(), &self.identity, RunEventKind::Skip)
            .with_metadata("reason", reason);
        self.record(event).await;

        counter!(
            HAUL_MOVER_RUNS_TOTAL,
            FLOW_LABEL => self.identity.flow().to_string(),
            ENTITY_LABEL => self.identity.entity().to_string(),
            STATUS_LABEL => RunStatus::Skipped.as_str(),
        )
        .increment(1);

        RunResult::skipped(self.identity.clone(), ctx.run_id())
    }

    /// Runs the mover until it succeeds, fails fatally or exhausts its retries.
    ///
    /// A shutdown on `shutdown_rx` aborts the current attempt with
    /// [`ErrorKind::ShutdownRequested`]. When `slot` is given and the store settles a
    /// `full_drop` run remotely, the slot is released while waiting.
    pub async fn run_with(
        &self,
        ctx: RunContext,
        mut shutdown_rx: ShutdownRx,
        mut slot: Option<&mut ConcurrencySlot>,
    ) -> RunResult {
        let started = Instant::now();
        let run_id = ctx.run_id();
        info!(
            flow = self.identity.flow(),
            entity = self.identity.entity(),
            %run_id,
            mode = %self.mode,
            "mover starting"
        );

        self.record(RunEvent::new(run_id, &self.identity, RunEventKind::Start))
            .await;

        if let Err(err) = self.check_context(&ctx) {
            let counters = AttemptCounters::default();
            return self.fail(run_id, err, 0, &counters, 0, started).await;
        }

        let mut ctx = ctx;
        let mut budget = RetryBudget::new();
        let mut peak_queue_depth = 0;
        let mut prepared: Option<Prepared> = None;

        loop {
            let attempt = budget.record_attempt();
            let counters = Arc::new(AttemptCounters::default());
            self.state_tx.send_replace(MoverState::Running { attempt });
            counter!(
                HAUL_MOVER_ATTEMPTS_TOTAL,
                FLOW_LABEL => self.identity.flow().to_string(),
                ENTITY_LABEL => self.identity.entity().to_string(),
            )
            .increment(1);

            let result = match self.prepare_once(&mut prepared).await {
                Ok(Prepared { watermark, filter }) => {
                    self.run_attempt(
                        &ctx,
                        watermark,
                        filter,
                        &mut shutdown_rx,
                        slot.as_deref_mut(),
                        &counters,
                    )
                    .await
                }
                Err(err) => Err(err),
            };
            peak_queue_depth = peak_queue_depth.max(counters.peak_queue_depth());

            let err = match result {
                Ok(outcome) => {
                    budget.reset();
                    return self
                        .succeed(run_id, outcome, attempt, &counters, peak_queue_depth, started)
                        .await;
                }
                Err(err) => err,
            };

            let (err, delay) = match self.retry_policy.decide(err, &budget) {
                RetryDecision::Fatal(err) => {
                    return self
                        .fail(run_id, err, attempt, &counters, peak_queue_depth, started)
                        .await;
                }
                RetryDecision::Retry { error, delay } => (error, delay),
            };

            warn!(
                flow = self.identity.flow(),
                entity = self.identity.entity(),
                attempt,
                rows = counters.rows(),
                ?delay,
                error = %err,
                "attempt failed with a retryable error, retrying from the start"
            );
            counter!(
                HAUL_MOVER_RETRIES_TOTAL,
                FLOW_LABEL => self.identity.flow().to_string(),
                ENTITY_LABEL => self.identity.entity().to_string(),
                ERROR_KIND_LABEL => format!("{:?}", err.kind()),
            )
            .increment(1);
            self.state_tx
                .send_replace(MoverState::Retrying { attempt, delay });

            let backoff = tokio::select! {
                biased;

                _ = shutdown_requested(&mut shutdown_rx) => Err(HaulError::from((
                    ErrorKind::ShutdownRequested,
                    "Mover stopped by a shutdown request",
                    format!("{} stopped while waiting to retry", self.identity),
                ))),
                _ = tokio::time::sleep(delay) => Ok(()),
            };

            let resumed = match backoff {
                Ok(()) => match slot.as_deref_mut() {
                    Some(slot) => slot.reacquire().await,
                    None => Ok(()),
                },
                Err(err) => Err(err),
            };
            if let Err(err) = resumed {
                return self
                    .fail(run_id, err, attempt, &counters, peak_queue_depth, started)
                    .await;
            }

            ctx = ctx.next_attempt();
        }
    }

    /// Rejects a context built for another entity or run mode.
    fn check_context(&self, ctx: &RunContext) -> HaulResult<()> {
        if ctx.identity() != &self.identity {
            return Err(HaulError::from((
                ErrorKind::InvalidState,
                "Run context belongs to another entity",
                format!("expected {}, got {}", self.identity, ctx.identity()),
            )));
        }

        if ctx.mode() != self.mode {
            return Err(HaulError::from((
                ErrorKind::InvalidState,
                "Run context has another run mode",
                format!("{} runs {}, context asks for {}", self.identity, self.mode, ctx.mode()),
            )));
        }

        Ok(())
    }

    /// Returns the prepared watermark and filter with a fresh candidate, preparing on first use.
    ///
    /// A failed preparation is retried on the next attempt like any other attempt failure.
    async fn prepare_once(&self, prepared: &mut Option<Prepared>) -> HaulResult<Prepared> {
        let current = match prepared.take() {
            Some(current) => current,
            None => self.prepare().await?,
        };

        let mut next = current.clone();
        if let Some(watermark) = next.watermark.as_mut() {
            watermark.reset_candidate();
        }
        *prepared = Some(current);

        Ok(next)
    }

    /// Validates the home schema and the watermark, then loads the persisted watermark.
    async fn prepare(&self) -> HaulResult<Prepared> {
        let schema = self.home.validate_schema().await?;

        let Some(config) = &self.watermark else {
            return Ok(Prepared {
                watermark: None,
                filter: None,
            });
        };

        let mut watermark = Watermark::from_config(self.identity.clone(), config);
        watermark.validate_schema(&schema)?;

        if self.mode == RunMode::Incremental {
            match self.journal.get_watermark(&self.identity).await {
                Ok(state) => watermark.set_persisted(state),
                Err(err) => {
                    warn!(
                        flow = self.identity.flow(),
                        entity = self.identity.entity(),
                        error = %err,
                        "could not load the persisted watermark, reading everything"
                    );
                }
            }
        }

        let filter = match self.mode {
            RunMode::Incremental => watermark.build_filter_expression(),
            RunMode::FullDrop => None,
        };

        Ok(Prepared {
            watermark: Some(watermark),
            filter,
        })
    }

    /// One attempt: prepare the store, transfer every batch, then finish.
    async fn run_attempt(
        &self,
        ctx: &RunContext,
        watermark: Option<Watermark>,
        filter: Option<FilterExpression>,
        shutdown_rx: &mut ShutdownRx,
        slot: Option<&mut ConcurrencySlot>,
        counters: &Arc<AttemptCounters>,
    ) -> HaulResult<AttemptOutcome> {
        if ctx.attempt() > 1 {
            self.store.cleanup_staging().await?;
            self.store.reset_retry_sensitive_state().await?;
        }
        self.store.configure_for_run(self.mode).await?;

        let watermark = self.transfer(watermark, filter, shutdown_rx, counters).await?;

        match self.store.finish().await? {
            Completion::Settled => {}
            Completion::Pending(settle) => {
                if self.mode == RunMode::FullDrop
                    && let Some(slot) = slot
                    && slot.release()
                {
                    info!(
                        flow = self.identity.flow(),
                        entity = self.identity.entity(),
                        "released concurrency slot while the store settles"
                    );
                }

                tokio::select! {
                    biased;

                    _ = shutdown_requested(shutdown_rx) => {
                        return Err(HaulError::from((
                            ErrorKind::ShutdownRequested,
                            "Mover stopped by a shutdown request",
                            format!("{} stopped while the store settled", self.identity),
                        )));
                    }
                    settled = settle => settled?,
                }
            }
        }

        Ok(AttemptOutcome { watermark })
    }

    async fn succeed(
        &self,
        run_id: RunId,
        outcome: AttemptOutcome,
        attempts: u32,
        counters: &AttemptCounters,
        peak_queue_depth: usize,
        started: Instant,
    ) -> RunResult {
        let rows = counters.rows();
        let batches = counters.batches();

        let mut committed: Option<WatermarkState> = None;
        if let Some(mut watermark) = outcome.watermark {
            match watermark.commit(&self.journal, self.mode, rows).await {
                Ok(state) => {
                    if state.is_some() {
                        self.mark_dirty();
                    }
                    committed = state;
                }
                Err(err) => {
                    self.journal_failure("watermarks", &err);
                }
            }
        }

        let duration = started.elapsed();
        let event = RunEvent::new(run_id, &self.identity, RunEventKind::Complete)
            .with_row_count(rows)
            .with_duration(duration)
            .with_watermark(committed.clone())
            .with_metadata("attempts", attempts)
            .with_metadata("batches", batches);
        self.record(event).await;

        self.state_tx.send_replace(MoverState::Succeeded);
        self.emit_run_metrics(RunStatus::Succeeded, rows, batches, duration, peak_queue_depth);
        info!(
            flow = self.identity.flow(),
            entity = self.identity.entity(),
            rows,
            batches,
            attempts,
            duration_ms = duration.as_millis() as u64,
            "mover succeeded"
        );

        RunResult {
            identity: self.identity.clone(),
            run_id,
            status: RunStatus::Succeeded,
            rows_moved: rows,
            batches,
            attempts,
            duration,
            error: None,
            watermark: committed,
            peak_queue_depth,
        }
    }

    async fn fail(
        &self,
        run_id: RunId,
        err: HaulError,
        attempts: u32,
        counters: &AttemptCounters,
        peak_queue_depth: usize,
        started: Instant,
    ) -> RunResult {
        let rows = counters.rows();
        let batches = counters.batches();
        let duration = started.elapsed();

        error!(
            flow = self.identity.flow(),
            entity = self.identity.entity(),
            attempts,
            rows,
            error = %err,
            "mover failed"
        );

        let event = RunEvent::new(run_id, &self.identity, RunEventKind::Fail)
            .with_row_count(rows)
            .with_duration(duration)
            .with_metadata("attempts", attempts)
            .with_metadata("error_kind", format!("{:?}", err.kind()))
            .with_metadata("error", err.to_string());
        self.record(event).await;

        self.state_tx.send_replace(MoverState::Failed);
        self.emit_run_metrics(RunStatus::Failed, 0, 0, duration, peak_queue_depth);

        RunResult {
            identity: self.identity.clone(),
            run_id,
            status: RunStatus::Failed,
            rows_moved: rows,
            batches,
            attempts,
            duration,
            error: Some(err),
            watermark: None,
            peak_queue_depth,
        }
    }

    /// Records `event`, logging and swallowing journal failures.
    async fn record(&self, event: RunEvent) {
        let kind = event.kind;
        match self.journal.record_event(event).await {
            Ok(()) => self.mark_dirty(),
            Err(err) => {
                warn!(event = %kind, "could not record run event");
                self.journal_failure("run_events", &err);
            }
        }
    }

    fn mark_dirty(&self) {
        if self.journal.is_enabled()
            && let Some(mirror) = &self.mirror
        {
            mirror.mark_dirty(&self.identity);
        }
    }

    fn journal_failure(&self, table: &'static str, err: &HaulError) {
        warn!(
            flow = self.identity.flow(),
            entity = self.identity.entity(),
            table,
            error = %err,
            "journal write failed, continuing"
        );
        counter!(HAUL_JOURNAL_FAILURES_TOTAL, TABLE_LABEL => table).increment(1);
    }

    fn emit_run_metrics(
        &self,
        status: RunStatus,
        rows: u64,
        batches: u64,
        duration: Duration,
        peak_queue_depth: usize,
    ) {
        let flow = self.identity.flow().to_string();
        let entity = self.identity.entity().to_string();

        counter!(
            HAUL_MOVER_RUNS_TOTAL,
            FLOW_LABEL => flow.clone(),
            ENTITY_LABEL => entity.clone(),
            STATUS_LABEL => status.as_str(),
        )
        .increment(1);
        counter!(HAUL_ROWS_MOVED_TOTAL, FLOW_LABEL => flow.clone(), ENTITY_LABEL => entity.clone())
            .increment(rows);
        counter!(
            HAUL_BATCHES_WRITTEN_TOTAL,
            FLOW_LABEL => flow.clone(),
            ENTITY_LABEL => entity.clone(),
        )
        .increment(batches);
        histogram!(
            HAUL_MOVER_DURATION_SECONDS,
            FLOW_LABEL => flow.clone(),
            ENTITY_LABEL => entity.clone(),
        )
        .record(duration.as_secs_f64());
        histogram!(HAUL_MOVER_PEAK_QUEUE_DEPTH, FLOW_LABEL => flow, ENTITY_LABEL => entity)
            .record(peak_queue_depth as f64);
    }
}
