use std::sync::Arc;
use std::time::Duration;

use haul::concurrency::shutdown::create_shutdown_channel;
use haul::error::ErrorKind;
use haul::home::memory::MemoryHome;
use haul::journal::{Journal, MemoryJournal, NoopJournal, RunEventKind};
use haul::mover::{Mover, MoverState, RunStatus};
use haul::pool::PoolRegistry;
use haul::store::memory::MemoryStore;
use haul::test_utils::data::{
    ORDERS_ENTITY, fast_retry, order_updated_at, orders_batches, orders_flow, orders_home,
    orders_schema,
};
use haul::test_utils::test_home_wrapper::TestHomeWrapper;
use haul::test_utils::test_store_wrapper::TestStoreWrapper;
use haul::types::{Cell, EntityIdentity, RunContext};
use haul::watermark::WatermarkValue;
use haul::{RunMode, WatermarkKind};
use haul_config::shared::WatermarkConfig;
use haul_telemetry::tracing::init_test_tracing;
use uuid::Uuid;

type TestStore = TestStoreWrapper<MemoryStore>;

fn ids(rows: &[haul::types::TableRow]) -> Vec<Cell> {
    rows.iter().map(|row| row.values()[0].clone()).collect()
}

fn expected_ids(range: std::ops::RangeInclusive<i64>) -> Vec<Cell> {
    range.map(Cell::I64).collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn full_drop_moves_every_order_in_order() {
    init_test_tracing();

    let journal = MemoryJournal::new();
    let store: TestStore = TestStoreWrapper::wrap(MemoryStore::new());
    let mover = Mover::new(
        &orders_flow(RunMode::FullDrop),
        orders_home(3, 1000),
        store.clone(),
        journal.clone(),
        &PoolRegistry::new(),
    )
    .unwrap();

    let result = mover.run(mover.context(Uuid::new_v4())).await;

    assert_eq!(result.status, RunStatus::Succeeded);
    assert_eq!(result.rows_moved, 3000);
    assert_eq!(result.batches, 3);
    assert_eq!(result.attempts, 1);
    assert!(result.error.is_none());
    assert_eq!(mover.state(), MoverState::Succeeded);

    let rows = store.wrapped().rows().await;
    assert_eq!(ids(&rows), expected_ids(1..=3000));
    assert_eq!(store.configured_modes(), vec![RunMode::FullDrop]);
    assert_eq!(store.cleanup_calls(), 0);

    let watermark = result.watermark.unwrap();
    assert_eq!(
        watermark.value,
        WatermarkValue::Timestamp(order_updated_at(3000))
    );
    assert_eq!(
        journal.get_watermark(mover.identity()).await.unwrap(),
        Some(watermark)
    );

    let events = journal.events(mover.identity()).await.unwrap();
    let kinds: Vec<_> = events.iter().map(|event| event.kind).collect();
    assert_eq!(kinds, vec![RunEventKind::Start, RunEventKind::Complete]);
    assert_eq!(events[1].row_count, 3000);
    assert!(events.iter().all(|event| event.entity == ORDERS_ENTITY));
}

#[tokio::test(flavor = "multi_thread")]
async fn retryable_write_failure_restarts_from_the_first_batch() {
    init_test_tracing();

    let journal = MemoryJournal::new();
    let home = TestHomeWrapper::wrap(orders_home(3, 1000));
    let store: TestStore = TestStoreWrapper::wrap(MemoryStore::new());
    store.fail_write_on(2, ErrorKind::ConnectionReset, 1);

    let mover = Mover::new(
        &orders_flow(RunMode::FullDrop),
        home.clone(),
        store.clone(),
        journal.clone(),
        &PoolRegistry::new(),
    )
    .unwrap();

    let result = mover.run(mover.context(Uuid::new_v4())).await;

    assert_eq!(result.status, RunStatus::Succeeded);
    assert_eq!(result.attempts, 2);
    assert_eq!(result.rows_moved, 3000);

    // The first attempt wrote one batch before failing on the second.
    assert_eq!(store.rows_written(), 4000);
    assert_eq!(store.cleanup_calls(), 1);
    assert_eq!(store.reset_calls(), 1);
    assert_eq!(store.configured_modes().len(), 2);
    assert_eq!(home.reads().len(), 2);
    assert_eq!(ids(&store.wrapped().rows().await), expected_ids(1..=3000));

    let events = journal.events(mover.identity()).await.unwrap();
    let terminal: Vec<_> = events
        .iter()
        .filter(|event| event.kind.is_terminal())
        .collect();
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0].kind, RunEventKind::Complete);
    assert_eq!(terminal[0].metadata["attempts"], 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn data_error_fails_without_retrying() {
    init_test_tracing();

    let journal = MemoryJournal::new();
    let store: TestStore = TestStoreWrapper::wrap(MemoryStore::new());
    store.fail_write_on(1, ErrorKind::InvalidData, 1);

    let mover = Mover::new(
        &orders_flow(RunMode::FullDrop),
        orders_home(3, 100),
        store.clone(),
        journal.clone(),
        &PoolRegistry::new(),
    )
    .unwrap();

    let result = mover.run(mover.context(Uuid::new_v4())).await;

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.attempts, 1);
    assert_eq!(result.error.unwrap().kind(), ErrorKind::InvalidData);
    assert_eq!(store.cleanup_calls(), 0);
    assert_eq!(mover.state(), MoverState::Failed);

    let last = journal.last_run(mover.identity()).await.unwrap().unwrap();
    assert_eq!(last.kind, RunEventKind::Fail);
    assert_eq!(last.metadata["error_kind"], "InvalidData");
    assert_eq!(last.metadata["attempts"], 1);
    assert!(journal.get_watermark(mover.identity()).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn exhausted_retries_fail_the_run() {
    init_test_tracing();

    let store: TestStore = TestStoreWrapper::wrap(MemoryStore::new());
    store.fail_write_on(1, ErrorKind::StoreConnectionFailed, 10);

    let mut flow = orders_flow(RunMode::FullDrop);
    flow.mover.retry = fast_retry(3);
    let mover = Mover::new(
        &flow,
        orders_home(2, 10),
        store.clone(),
        MemoryJournal::new(),
        &PoolRegistry::new(),
    )
    .unwrap();

    let result = mover.run(mover.context(Uuid::new_v4())).await;

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.attempts, 3);
    let err = result.error.unwrap();
    assert_eq!(err.kind(), ErrorKind::RetryExhausted);
    assert_eq!(store.cleanup_calls(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_watermark_column_is_fatal_before_any_write() {
    init_test_tracing();

    let journal = MemoryJournal::new();
    let store: TestStore = TestStoreWrapper::wrap(MemoryStore::new());
    let mut flow = orders_flow(RunMode::Incremental);
    flow.watermark = Some(WatermarkConfig {
        column: "shipped_at".to_string(),
        kind: WatermarkKind::Timestamp,
    });

    let mover = Mover::new(
        &flow,
        orders_home(1, 10),
        store.clone(),
        journal.clone(),
        &PoolRegistry::new(),
    )
    .unwrap();

    let result = mover.run(mover.context(Uuid::new_v4())).await;

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.attempts, 1);
    assert_eq!(
        result.error.unwrap().kind(),
        ErrorKind::WatermarkColumnMissing
    );
    assert!(store.configured_modes().is_empty());
    assert_eq!(store.write_calls(), 0);

    let kinds: Vec<_> = journal
        .events(mover.identity())
        .await
        .unwrap()
        .iter()
        .map(|event| event.kind)
        .collect();
    assert_eq!(kinds, vec![RunEventKind::Start, RunEventKind::Fail]);
}

#[tokio::test(flavor = "multi_thread")]
async fn connection_failure_while_validating_the_schema_is_retried() {
    init_test_tracing();

    let journal = MemoryJournal::new();
    let home = TestHomeWrapper::wrap(orders_home(2, 50));
    home.fail_validate_schema(ErrorKind::ConnectionReset, 1);
    let store: TestStore = TestStoreWrapper::wrap(MemoryStore::new());

    let mover = Mover::new(
        &orders_flow(RunMode::FullDrop),
        home.clone(),
        store.clone(),
        journal.clone(),
        &PoolRegistry::new(),
    )
    .unwrap();

    let result = mover.run(mover.context(Uuid::new_v4())).await;

    assert_eq!(result.status, RunStatus::Succeeded);
    assert_eq!(result.attempts, 2);
    assert_eq!(result.rows_moved, 100);
    assert_eq!(home.validate_calls(), 2);
    assert_eq!(home.reads().len(), 1);
    assert_eq!(store.rows_written(), 100);

    let last = journal.last_run(mover.identity()).await.unwrap().unwrap();
    assert_eq!(last.kind, RunEventKind::Complete);
    assert_eq!(last.metadata["attempts"], 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn schema_mismatch_from_the_home_is_not_retried() {
    init_test_tracing();

    let home = TestHomeWrapper::wrap(orders_home(1, 10));
    home.fail_validate_schema(ErrorKind::SchemaMismatch, 1);
    let store: TestStore = TestStoreWrapper::wrap(MemoryStore::new());

    let mover = Mover::new(
        &orders_flow(RunMode::FullDrop),
        home.clone(),
        store.clone(),
        MemoryJournal::new(),
        &PoolRegistry::new(),
    )
    .unwrap();

    let result = mover.run(mover.context(Uuid::new_v4())).await;

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.attempts, 1);
    assert_eq!(result.error.unwrap().kind(), ErrorKind::SchemaMismatch);
    assert_eq!(home.validate_calls(), 1);
    assert!(home.reads().is_empty());
    assert_eq!(store.write_calls(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn incremental_run_reads_only_rows_past_the_watermark() {
    init_test_tracing();

    let journal = MemoryJournal::new();
    let store: TestStore = TestStoreWrapper::wrap(MemoryStore::new());
    let flow = orders_flow(RunMode::Incremental);

    let first = Mover::new(
        &flow,
        orders_home(2, 1000),
        store.clone(),
        journal.clone(),
        &PoolRegistry::new(),
    )
    .unwrap();
    let result = first.run(first.context(Uuid::new_v4())).await;
    assert_eq!(result.rows_moved, 2000);

    let grown = MemoryHome::try_new(ORDERS_ENTITY, orders_schema(), orders_batches(1, 3, 1000))
        .unwrap();
    let home = TestHomeWrapper::wrap(grown);
    let second = Mover::new(
        &flow,
        home.clone(),
        store.clone(),
        journal.clone(),
        &PoolRegistry::new(),
    )
    .unwrap();
    let result = second.run(second.context(Uuid::new_v4())).await;

    assert_eq!(result.status, RunStatus::Succeeded);
    assert_eq!(result.rows_moved, 1000);
    assert_eq!(
        result.watermark.unwrap().value,
        WatermarkValue::Timestamp(order_updated_at(3000))
    );

    let filter = home.reads()[0].clone().unwrap();
    assert_eq!(filter.column(), "updated_at");
    assert_eq!(
        filter.lower_bound(),
        &WatermarkValue::Timestamp(order_updated_at(2000))
    );
    assert_eq!(ids(&store.wrapped().rows().await), expected_ids(1..=3000));
}

#[tokio::test(flavor = "multi_thread")]
async fn incremental_run_without_new_rows_keeps_the_watermark() {
    init_test_tracing();

    let journal = MemoryJournal::new();
    let flow = orders_flow(RunMode::Incremental);
    let mover = Mover::new(
        &flow,
        orders_home(1, 50),
        MemoryStore::new(),
        journal.clone(),
        &PoolRegistry::new(),
    )
    .unwrap();

    mover.run(mover.context(Uuid::new_v4())).await;
    let persisted = journal.get_watermark(mover.identity()).await.unwrap();

    let result = mover.run(mover.context(Uuid::new_v4())).await;

    assert_eq!(result.status, RunStatus::Succeeded);
    assert_eq!(result.rows_moved, 0);
    assert!(result.watermark.is_none());
    assert_eq!(
        journal.get_watermark(mover.identity()).await.unwrap(),
        persisted
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn disabled_journal_still_moves_everything() {
    init_test_tracing();

    let store: TestStore = TestStoreWrapper::wrap(MemoryStore::new());
    let full_drop = Mover::new(
        &orders_flow(RunMode::FullDrop),
        orders_home(3, 1000),
        store.clone(),
        NoopJournal,
        &PoolRegistry::new(),
    )
    .unwrap();

    let result = full_drop.run(full_drop.context(Uuid::new_v4())).await;
    assert_eq!(result.status, RunStatus::Succeeded);
    assert_eq!(result.rows_moved, 3000);
    assert_eq!(result.batches, 3);

    let home = TestHomeWrapper::wrap(orders_home(3, 1000));
    let incremental = Mover::new(
        &orders_flow(RunMode::Incremental),
        home.clone(),
        TestStoreWrapper::wrap(MemoryStore::new()),
        NoopJournal,
        &PoolRegistry::new(),
    )
    .unwrap();

    let result = incremental.run(incremental.context(Uuid::new_v4())).await;
    assert_eq!(result.status, RunStatus::Succeeded);
    assert_eq!(result.rows_moved, 3000);
    assert_eq!(home.reads(), vec![None]);
}

#[tokio::test(flavor = "multi_thread")]
async fn queue_never_holds_more_than_its_capacity() {
    init_test_tracing();

    let store: TestStore = TestStoreWrapper::wrap(MemoryStore::new());
    store.delay_writes(Duration::from_millis(2));

    let mut flow = orders_flow(RunMode::FullDrop);
    flow.mover.queue_capacity = 2;
    let mover = Mover::new(
        &flow,
        orders_home(20, 5),
        store.clone(),
        MemoryJournal::new(),
        &PoolRegistry::new(),
    )
    .unwrap();

    let result = mover.run(mover.context(Uuid::new_v4())).await;

    assert_eq!(result.status, RunStatus::Succeeded);
    assert_eq!(result.rows_moved, 100);
    assert!(result.peak_queue_depth >= 1);
    assert!(result.peak_queue_depth <= 2);
    assert_eq!(ids(&store.wrapped().rows().await), expected_ids(1..=100));
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_aborts_a_running_mover() {
    init_test_tracing();

    let journal = MemoryJournal::new();
    let store: TestStore = TestStoreWrapper::wrap(MemoryStore::new());
    store.delay_writes(Duration::from_millis(20));
    let first_rows = store.notify_on_rows(1);

    let mover = Arc::new(
        Mover::new(
            &orders_flow(RunMode::FullDrop),
            orders_home(50, 1),
            store.clone(),
            journal.clone(),
            &PoolRegistry::new(),
        )
        .unwrap(),
    );

    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let running = {
        let mover = mover.clone();
        tokio::spawn(async move {
            let ctx = mover.context(Uuid::new_v4());
            mover.run_with(ctx, shutdown_rx, None).await
        })
    };

    first_rows.notified().await;
    shutdown_tx.shutdown();
    let result = running.await.unwrap();

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.attempts, 1);
    assert_eq!(
        result.error.unwrap().kind(),
        ErrorKind::ShutdownRequested
    );
    assert!(result.rows_moved < 50);
    assert!(store.wrapped().rows().await.is_empty());

    let last = journal.last_run(mover.identity()).await.unwrap().unwrap();
    assert_eq!(last.kind, RunEventKind::Fail);
}

#[tokio::test(flavor = "multi_thread")]
async fn context_of_another_entity_is_rejected() {
    init_test_tracing();

    let mover = Mover::new(
        &orders_flow(RunMode::FullDrop),
        orders_home(1, 10),
        MemoryStore::new(),
        MemoryJournal::new(),
        &PoolRegistry::new(),
    )
    .unwrap();

    let ctx = RunContext::new(
        Uuid::new_v4(),
        EntityIdentity::new("crm", "customers"),
        RunMode::FullDrop,
    );
    let result = mover.run(ctx).await;

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.error.unwrap().kind(), ErrorKind::InvalidState);
    assert_eq!(result.identity, EntityIdentity::new("crm", "orders"));
}

#[tokio::test(flavor = "multi_thread")]
async fn context_with_another_run_mode_is_rejected() {
    init_test_tracing();

    let store: TestStore = TestStoreWrapper::wrap(MemoryStore::new());
    let mover = Mover::new(
        &orders_flow(RunMode::FullDrop),
        orders_home(1, 10),
        store.clone(),
        MemoryJournal::new(),
        &PoolRegistry::new(),
    )
    .unwrap();

    let ctx = RunContext::new(
        Uuid::new_v4(),
        mover.identity().clone(),
        RunMode::Incremental,
    );
    let result = mover.run(ctx).await;

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.attempts, 0);
    assert_eq!(result.error.unwrap().kind(), ErrorKind::InvalidState);
    assert!(store.configured_modes().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn pending_completion_settles_before_success() {
    init_test_tracing();

    let store: TestStore = TestStoreWrapper::wrap(MemoryStore::new());
    let gate = store.defer_next_finish();
    let finished = store.notify_on_finish();

    let mover = Arc::new(
        Mover::new(
            &orders_flow(RunMode::FullDrop),
            orders_home(2, 10),
            store.clone(),
            MemoryJournal::new(),
            &PoolRegistry::new(),
        )
        .unwrap(),
    );
    let mut state = mover.subscribe_state();

    let running = {
        let mover = mover.clone();
        tokio::spawn(async move { mover.run(mover.context(Uuid::new_v4())).await })
    };

    finished.notified().await;
    assert!(store.wrapped().rows().await.is_empty());
    assert!(matches!(*state.borrow_and_update(), MoverState::Running { attempt: 1 }));

    gate.send(()).unwrap();
    let result = running.await.unwrap();

    assert_eq!(result.status, RunStatus::Succeeded);
    assert_eq!(store.wrapped().rows().await.len(), 20);
}
