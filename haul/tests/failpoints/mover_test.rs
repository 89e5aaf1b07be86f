use haul::RunMode;
use haul::failpoints::MOVER_BEFORE_STORE_WRITE;
use haul::journal::{Journal, MemoryJournal, RunEventKind};
use haul::mover::{Mover, RunStatus};
use haul::pool::PoolRegistry;
use haul::store::memory::MemoryStore;
use haul::test_utils::data::{orders_flow, orders_home};
use haul::test_utils::failpoints::CustomFailScenario;
use haul::test_utils::test_store_wrapper::TestStoreWrapper;
use haul_telemetry::tracing::init_test_tracing;
use uuid::Uuid;

#[tokio::test(flavor = "multi_thread")]
async fn transient_failure_before_write_is_retried() {
    init_test_tracing();

    let journal = MemoryJournal::new();
    let store = TestStoreWrapper::wrap(MemoryStore::new());
    let mover = Mover::new(
        &orders_flow(RunMode::FullDrop),
        orders_home(3, 100),
        store.clone(),
        journal.clone(),
        &PoolRegistry::new(),
    )
    .unwrap();

    let scenario =
        CustomFailScenario::setup(&[(MOVER_BEFORE_STORE_WRITE, "1*return(timed_retry)")]);
    let result = mover.run(mover.context(Uuid::new_v4())).await;
    scenario.teardown();

    assert_eq!(result.status, RunStatus::Succeeded);
    assert_eq!(result.attempts, 2);
    assert_eq!(result.rows_moved, 300);
    assert_eq!(store.cleanup_calls(), 1);

    let terminal = journal
        .events(mover.identity())
        .await
        .unwrap()
        .into_iter()
        .filter(|event| event.kind.is_terminal())
        .count();
    assert_eq!(terminal, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn permanent_failure_before_write_fails_the_run() {
    init_test_tracing();

    let journal = MemoryJournal::new();
    let store = TestStoreWrapper::wrap(MemoryStore::new());
    let mover = Mover::new(
        &orders_flow(RunMode::FullDrop),
        orders_home(3, 100),
        store.clone(),
        journal.clone(),
        &PoolRegistry::new(),
    )
    .unwrap();

    let scenario = CustomFailScenario::setup(&[(MOVER_BEFORE_STORE_WRITE, "return")]);
    let result = mover.run(mover.context(Uuid::new_v4())).await;
    scenario.teardown();

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.attempts, 1);
    assert_eq!(store.write_calls(), 0);

    let last = journal.last_run(mover.identity()).await.unwrap().unwrap();
    assert_eq!(last.kind, RunEventKind::Fail);
}
