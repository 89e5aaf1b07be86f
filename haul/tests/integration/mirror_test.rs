use haul::error::ErrorKind;
use haul::journal::{Journal, MemoryJournal};
use haul::mirror::{
    DirectoryMirrorTarget, MANIFEST_FILE, MemoryMirrorTarget, MirrorTarget, MirroredPublisher,
    PublishOutcome, RUN_EVENTS_TABLE,
};
use haul::mover::Mover;
use haul::pool::PoolRegistry;
use haul::store::memory::MemoryStore;
use haul::test_utils::data::{orders_flow, orders_home};
use haul::RunMode;
use haul_telemetry::tracing::init_test_tracing;
use uuid::Uuid;

async fn run_orders<T: MirrorTarget>(
    journal: &MemoryJournal,
    publisher: &MirroredPublisher<MemoryJournal, T>,
) {
    let mover = Mover::new(
        &orders_flow(RunMode::FullDrop),
        orders_home(2, 10),
        MemoryStore::new(),
        journal.clone(),
        &PoolRegistry::new(),
    )
    .unwrap()
    .with_mirror(publisher.handle());

    mover.run(mover.context(Uuid::new_v4())).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn publishing_twice_without_changes_is_idempotent() {
    init_test_tracing();

    let journal = MemoryJournal::new();
    let target = MemoryMirrorTarget::new();
    let publisher = MirroredPublisher::new(journal.clone(), target.clone());

    run_orders(&journal, &publisher).await;
    assert!(publisher.is_dirty());

    assert_eq!(
        publisher.publish().await.unwrap(),
        PublishOutcome::Published {
            events: 2,
            watermarks: 1
        }
    );
    assert_eq!(publisher.publish().await.unwrap(), PublishOutcome::Clean);

    publisher.force_publish().await.unwrap();
    let publishes = target.publishes();
    assert_eq!(publishes.len(), 2);
    assert_eq!(publishes[0], publishes[1]);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_publish_keeps_entities_dirty() {
    init_test_tracing();

    let journal = MemoryJournal::new();
    let target = MemoryMirrorTarget::new();
    let publisher = MirroredPublisher::new(journal.clone(), target.clone());

    run_orders(&journal, &publisher).await;

    target.fail_next_publish();
    let err = publisher.publish().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MirrorPublishFailed);
    assert!(publisher.is_dirty());
    assert!(target.publishes().is_empty());

    assert!(matches!(
        publisher.publish().await.unwrap(),
        PublishOutcome::Published { .. }
    ));
    assert!(!publisher.is_dirty());
}

#[tokio::test(flavor = "multi_thread")]
async fn directory_mirror_writes_tables_and_manifest() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let journal = MemoryJournal::new();
    let target = DirectoryMirrorTarget::new(dir.path());
    let publisher = MirroredPublisher::new(journal.clone(), target.clone());

    run_orders(&journal, &publisher).await;
    publisher.publish().await.unwrap();

    let current = target.current_dir().await.unwrap().unwrap();
    let run_events = std::fs::read_to_string(current.join("run_events.jsonl")).unwrap();
    assert_eq!(run_events.lines().count(), 2);

    let mut kinds = Vec::new();
    for line in run_events.lines() {
        let event: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(event["flow"], "crm");
        assert_eq!(event["entity"], "orders");
        kinds.push(event["kind"].as_str().unwrap().to_string());
    }
    kinds.sort();
    assert_eq!(kinds, vec!["complete", "start"]);

    let watermarks = std::fs::read_to_string(current.join("watermarks.jsonl")).unwrap();
    assert_eq!(watermarks.lines().count(), 1);

    let manifest: serde_json::Value =
        serde_json::from_slice(&std::fs::read(current.join(MANIFEST_FILE)).unwrap()).unwrap();
    let tables = manifest["tables"].as_array().unwrap();
    let run_events_manifest = tables
        .iter()
        .find(|table| table["table"] == RUN_EVENTS_TABLE)
        .unwrap();
    let row_count = run_events_manifest["columns"]
        .as_array()
        .unwrap()
        .iter()
        .find(|column| column["name"] == "row_count")
        .unwrap();
    assert_eq!(row_count["type"], "INT64");
    assert_eq!(row_count["nullable"], false);

    let events = journal.snapshot().await.unwrap().events;
    assert_eq!(events.len(), 2);
}
