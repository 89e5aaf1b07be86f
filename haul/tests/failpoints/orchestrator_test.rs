use haul::failpoints::JOURNAL_FLUSH_BEFORE_RENAME;
use haul::journal::{FileJournal, RUN_EVENTS_FILE, RunEvent, RunEventKind};
use haul::mirror::{MemoryMirrorTarget, RUN_EVENTS_TABLE};
use haul::mover::{Mover, RunStatus};
use haul::orchestrator::Orchestrator;
use haul::pool::PoolRegistry;
use haul::store::memory::MemoryStore;
use haul::test_utils::data::{orders_home, plain_flow};
use haul::test_utils::failpoints::CustomFailScenario;
use haul::RunMode;
use haul_config::shared::OrchestratorConfig;
use haul_telemetry::tracing::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn journal_write_failed_mid_run_is_flushed_before_publishing() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let mut scenario = CustomFailScenario::setup(&[]);
    let journal = FileJournal::open(dir.path()).unwrap();
    let target = MemoryMirrorTarget::new();
    let orchestrator: Orchestrator<FileJournal, MemoryMirrorTarget> = Orchestrator::new(
        OrchestratorConfig {
            max_concurrent_movers: 1,
            publish_mirror: true,
        },
        journal.clone(),
    )
    .unwrap()
    .with_mirror(target.clone());

    let mover = Mover::new(
        &plain_flow("customers", RunMode::FullDrop),
        orders_home(2, 10),
        MemoryStore::new(),
        journal.clone(),
        &PoolRegistry::new(),
    )
    .unwrap();
    let identity = mover.identity().clone();

    // The start event persists, the complete event does not.
    scenario.enable(JOURNAL_FLUSH_BEFORE_RENAME, "1*off->1*return->off");
    let report = orchestrator.run(vec![mover]).await;
    scenario.disable(JOURNAL_FLUSH_BEFORE_RENAME);

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.results[0].status, RunStatus::Succeeded);

    let on_disk: Vec<RunEvent> =
        serde_json::from_slice(&std::fs::read(dir.path().join(RUN_EVENTS_FILE)).unwrap())
            .unwrap();
    let kinds: Vec<_> = on_disk
        .iter()
        .filter(|event| event.entity == identity.entity())
        .map(|event| event.kind)
        .collect();
    assert_eq!(kinds, vec![RunEventKind::Start, RunEventKind::Complete]);

    let published = target.latest().unwrap();
    assert_eq!(
        published.table(RUN_EVENTS_TABLE).unwrap().batch.row_count(),
        2
    );

    scenario.teardown();
}
