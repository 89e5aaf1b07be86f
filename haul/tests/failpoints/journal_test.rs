use haul::error::ErrorKind;
use haul::failpoints::JOURNAL_FLUSH_BEFORE_RENAME;
use haul::journal::{FileJournal, Journal, RUN_EVENTS_FILE, RunEvent, RunEventKind};
use haul::test_utils::failpoints::CustomFailScenario;
use haul::types::EntityIdentity;
use haul_telemetry::tracing::init_test_tracing;
use uuid::Uuid;

#[tokio::test(flavor = "multi_thread")]
async fn interrupted_flush_leaves_the_previous_snapshot_intact() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let events_path = dir.path().join(RUN_EVENTS_FILE);
    let temp_path = dir.path().join(format!(".{RUN_EVENTS_FILE}.tmp"));
    let identity = EntityIdentity::new("crm", "orders");
    let run_id = Uuid::new_v4();

    let mut scenario = CustomFailScenario::setup(&[]);
    {
        let journal = FileJournal::open(dir.path()).unwrap();
        journal
            .record_event(RunEvent::new(run_id, &identity, RunEventKind::Start))
            .await
            .unwrap();
        let before = std::fs::read(&events_path).unwrap();

        scenario.enable(JOURNAL_FLUSH_BEFORE_RENAME, "return");
        let err = journal
            .record_event(
                RunEvent::new(run_id, &identity, RunEventKind::Complete).with_row_count(10),
            )
            .await
            .unwrap_err();
        scenario.disable(JOURNAL_FLUSH_BEFORE_RENAME);

        assert_eq!(err.kind(), ErrorKind::WithNoRetry);
        // The crash happened after the temporary file was fully written.
        assert!(temp_path.is_file());
        assert_eq!(std::fs::read(&events_path).unwrap(), before);
    }

    let journal = FileJournal::open(dir.path()).unwrap();
    assert!(!temp_path.exists());

    let events = journal.events(&identity).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, RunEventKind::Start);
    assert!(journal.last_run(&identity).await.unwrap().is_none());

    scenario.teardown();
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_write_is_persisted_by_the_next_flush() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let identity = EntityIdentity::new("crm", "customers");
    let mut scenario = CustomFailScenario::setup(&[]);
    let journal = FileJournal::open(dir.path()).unwrap();

    scenario.enable(JOURNAL_FLUSH_BEFORE_RENAME, "return");
    journal
        .record_event(RunEvent::new(Uuid::new_v4(), &identity, RunEventKind::Skip))
        .await
        .unwrap_err();
    scenario.disable(JOURNAL_FLUSH_BEFORE_RENAME);

    journal.flush().await.unwrap();
    drop(journal);

    let reopened = FileJournal::open(dir.path()).unwrap();
    let last = reopened.last_run(&identity).await.unwrap().unwrap();
    assert_eq!(last.kind, RunEventKind::Skip);

    scenario.teardown();
}
