use haul::error::{ErrorKind, HaulResult};
use haul::home::memory::MemoryHome;
use haul::journal::{Journal, MemoryJournal, RunEventKind};
use haul::mirror::MemoryMirrorTarget;
use haul::mover::{Mover, RunStatus};
use haul::orchestrator::{Orchestrator, ProgressSnapshot};
use haul::pool::PoolRegistry;
use haul::store::memory::MemoryStore;
use haul::store::{Completion, Store};
use haul::test_utils::data::{orders_flow, orders_home, plain_flow};
use haul::test_utils::test_store_wrapper::TestStoreWrapper;
use haul::types::{Batch, EntityIdentity};
use haul::RunMode;
use haul_config::shared::{FlowConfig, OrchestratorConfig};
use haul_telemetry::tracing::init_test_tracing;

type TestStore = TestStoreWrapper<MemoryStore>;
type TestMover = Mover<MemoryHome, TestStore, MemoryJournal>;

fn config(max_concurrent_movers: usize) -> OrchestratorConfig {
    OrchestratorConfig {
        max_concurrent_movers,
        publish_mirror: true,
    }
}

/// An orchestrator without a mirror.
fn new_orchestrator(
    max_concurrent_movers: usize,
    journal: &MemoryJournal,
) -> Orchestrator<MemoryJournal, MemoryMirrorTarget> {
    Orchestrator::new(config(max_concurrent_movers), journal.clone()).unwrap()
}

fn mover(flow: &FlowConfig, store: &TestStore, journal: &MemoryJournal) -> TestMover {
    Mover::new(
        flow,
        orders_home(2, 50),
        store.clone(),
        journal.clone(),
        &PoolRegistry::new(),
    )
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn report_counts_every_outcome_and_publishes_once() {
    init_test_tracing();

    let journal = MemoryJournal::new();
    let target = MemoryMirrorTarget::new();
    let orchestrator = Orchestrator::new(config(2), journal.clone())
        .unwrap()
        .with_mirror(target.clone());
    let progress = orchestrator.subscribe_progress();

    let orders = TestStoreWrapper::wrap(MemoryStore::new());
    let customers = TestStoreWrapper::wrap(MemoryStore::new());
    let invoices = TestStoreWrapper::wrap(MemoryStore::new());
    invoices.fail_write_on(1, ErrorKind::InvalidData, 1);
    let movers = vec![
        mover(&orders_flow(RunMode::FullDrop), &orders, &journal),
        mover(&plain_flow("customers", RunMode::FullDrop), &customers, &journal),
        mover(&plain_flow("invoices", RunMode::Incremental), &invoices, &journal),
    ];

    let report = orchestrator.run(movers).await;

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.total_rows, 200);
    assert!(!report.is_success());

    let identities: Vec<_> = report
        .results
        .iter()
        .map(|result| result.identity.entity().to_string())
        .collect();
    assert_eq!(identities, vec!["customers", "invoices", "orders"]);
    assert!(report.results.iter().all(|result| result.run_id == report.run_id));

    let invoices = report
        .result(&EntityIdentity::new("crm", "invoices"))
        .unwrap();
    assert_eq!(invoices.status, RunStatus::Failed);
    assert_eq!(invoices.error.as_ref().unwrap().kind(), ErrorKind::InvalidData);

    assert_eq!(
        *progress.borrow(),
        ProgressSnapshot {
            pending: 0,
            running: 0,
            succeeded: 2,
            failed: 1,
            skipped: 0,
            rows_moved: 200,
        }
    );

    assert_eq!(target.publishes().len(), 1);
    assert!(!orchestrator.publisher().unwrap().is_dirty());
}

#[tokio::test(flavor = "multi_thread")]
async fn settling_full_drop_frees_its_slot_for_the_next_mover() {
    init_test_tracing();

    let journal = MemoryJournal::new();
    let orchestrator = new_orchestrator(1, &journal);

    let settling = TestStoreWrapper::wrap(MemoryStore::new());
    let gate = settling.defer_next_finish();
    let finished = settling.notify_on_finish();

    let other = TestStoreWrapper::wrap(MemoryStore::new());
    let other_rows = other.notify_on_rows(100);

    let movers = vec![
        mover(&orders_flow(RunMode::FullDrop), &settling, &journal),
        mover(&plain_flow("customers", RunMode::FullDrop), &other, &journal),
    ];
    let running = tokio::spawn(async move { orchestrator.run(movers).await });

    // With a single slot the second mover can only write while the first one settles or
    // after it completed.
    finished.notified().await;
    other_rows.notified().await;
    gate.send(()).unwrap();

    let report = running.await.unwrap();
    assert_eq!(report.succeeded, 2);
    assert_eq!(settling.wrapped().rows().await.len(), 100);
    assert_eq!(other.wrapped().rows().await.len(), 100);
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_before_start_skips_every_mover() {
    init_test_tracing();

    let journal = MemoryJournal::new();
    let orchestrator = new_orchestrator(2, &journal);
    orchestrator.shutdown_tx().shutdown();

    let store = TestStoreWrapper::wrap(MemoryStore::new());
    let movers = vec![
        mover(&orders_flow(RunMode::FullDrop), &store, &journal),
        mover(&plain_flow("customers", RunMode::FullDrop), &store, &journal),
    ];

    let report = orchestrator.run(movers).await;

    assert_eq!(report.skipped, 2);
    assert_eq!(report.total_rows, 0);
    assert!(report.is_success());
    assert_eq!(store.write_calls(), 0);

    for result in &report.results {
        assert_eq!(result.status, RunStatus::Skipped);
        let last = journal.last_run(&result.identity).await.unwrap().unwrap();
        assert_eq!(last.kind, RunEventKind::Skip);
        assert_eq!(last.run_id, report.run_id);
    }
}

/// Store that panics while preparing a run when told to.
#[derive(Debug, Clone, Default)]
struct PanickingStore {
    panic_on_configure: bool,
    store: MemoryStore,
}

impl Store for PanickingStore {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn configure_for_run(&self, mode: RunMode) -> HaulResult<()> {
        if self.panic_on_configure {
            panic!("store exploded while configuring");
        }

        self.store.configure_for_run(mode).await
    }

    async fn write(&self, batch: Batch) -> HaulResult<()> {
        self.store.write(batch).await
    }

    async fn finish(&self) -> HaulResult<Completion> {
        self.store.finish().await
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn panicking_mover_fails_alone() {
    init_test_tracing();

    let journal = MemoryJournal::new();
    let orchestrator = new_orchestrator(2, &journal);

    let healthy = PanickingStore::default();
    let movers = vec![
        Mover::new(
            &orders_flow(RunMode::FullDrop),
            orders_home(2, 50),
            PanickingStore {
                panic_on_configure: true,
                ..Default::default()
            },
            journal.clone(),
            &PoolRegistry::new(),
        )
        .unwrap(),
        Mover::new(
            &plain_flow("customers", RunMode::FullDrop),
            orders_home(2, 50),
            healthy.clone(),
            journal.clone(),
            &PoolRegistry::new(),
        )
        .unwrap(),
    ];

    let report = orchestrator.run(movers).await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded, 1);

    let orders = report.result(&EntityIdentity::new("crm", "orders")).unwrap();
    assert_eq!(orders.status, RunStatus::Failed);
    assert_eq!(orders.error.as_ref().unwrap().kind(), ErrorKind::MoverTaskPanic);

    let last = journal.last_run(&orders.identity).await.unwrap().unwrap();
    assert_eq!(last.kind, RunEventKind::Fail);
    assert_eq!(healthy.store.rows().await.len(), 100);
}
