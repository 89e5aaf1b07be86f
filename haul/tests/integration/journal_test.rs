use haul::journal::{
    FileJournal, Journal, RUN_EVENTS_FILE, RunEventKind, WATERMARKS_FILE,
};
use haul::mover::{Mover, RunStatus};
use haul::pool::PoolRegistry;
use haul::store::memory::MemoryStore;
use haul::test_utils::data::{order_updated_at, orders_flow, orders_home};
use haul::types::EntityIdentity;
use haul::watermark::WatermarkValue;
use haul::RunMode;
use haul_telemetry::tracing::init_test_tracing;
use uuid::Uuid;

#[tokio::test(flavor = "multi_thread")]
async fn file_journal_keeps_history_across_reopen() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let identity = EntityIdentity::new("crm", "orders");

    {
        let journal = FileJournal::open(dir.path()).unwrap();
        let mover = Mover::new(
            &orders_flow(RunMode::Incremental),
            orders_home(2, 100),
            MemoryStore::new(),
            journal.clone(),
            &PoolRegistry::new(),
        )
        .unwrap();

        let result = mover.run(mover.context(Uuid::new_v4())).await;
        assert_eq!(result.status, RunStatus::Succeeded);
    }

    assert!(dir.path().join(RUN_EVENTS_FILE).is_file());
    assert!(dir.path().join(WATERMARKS_FILE).is_file());

    let journal = FileJournal::open(dir.path()).unwrap();
    let last = journal.last_run(&identity).await.unwrap().unwrap();
    assert_eq!(last.kind, RunEventKind::Complete);
    assert_eq!(last.row_count, 200);

    let watermark = journal.get_watermark(&identity).await.unwrap().unwrap();
    assert_eq!(
        watermark.value,
        WatermarkValue::Timestamp(order_updated_at(200))
    );

    // Rows already moved are filtered out by the reloaded watermark.
    let mover = Mover::new(
        &orders_flow(RunMode::Incremental),
        orders_home(2, 100),
        MemoryStore::new(),
        journal.clone(),
        &PoolRegistry::new(),
    )
    .unwrap();
    let result = mover.run(mover.context(Uuid::new_v4())).await;
    assert_eq!(result.status, RunStatus::Succeeded);
    assert_eq!(result.rows_moved, 0);

    assert_eq!(journal.events(&identity).await.unwrap().len(), 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn last_run_ignores_start_events() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let journal = FileJournal::open(dir.path()).unwrap();
    let identity = EntityIdentity::new("crm", "invoices");

    assert!(journal.last_run(&identity).await.unwrap().is_none());

    let run_id = Uuid::new_v4();
    journal
        .record_event(haul::journal::RunEvent::new(
            run_id,
            &identity,
            RunEventKind::Start,
        ))
        .await
        .unwrap();
    assert!(journal.last_run(&identity).await.unwrap().is_none());

    journal
        .record_event(
            haul::journal::RunEvent::new(run_id, &identity, RunEventKind::Skip)
                .with_metadata("reason", "shutdown requested before start"),
        )
        .await
        .unwrap();
    let last = journal.last_run(&identity).await.unwrap().unwrap();
    assert_eq!(last.kind, RunEventKind::Skip);
    assert_eq!(last.metadata["reason"], "shutdown requested before start");
}
