use haul::error::ErrorKind;
use haul::failpoints::MIRROR_BEFORE_SWAP;
use haul::journal::{Journal, MemoryJournal, RunEvent, RunEventKind};
use haul::mirror::{DirectoryMirrorTarget, MirroredPublisher};
use haul::test_utils::failpoints::CustomFailScenario;
use haul::types::EntityIdentity;
use haul_telemetry::tracing::init_test_tracing;
use uuid::Uuid;

#[tokio::test(flavor = "multi_thread")]
async fn interrupted_publish_keeps_the_published_mirror() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let journal = MemoryJournal::new();
    let target = DirectoryMirrorTarget::new(dir.path());
    let publisher = MirroredPublisher::new(journal.clone(), target.clone());
    let identity = EntityIdentity::new("crm", "orders");
    let mut scenario = CustomFailScenario::setup(&[]);

    journal
        .record_event(RunEvent::new(Uuid::new_v4(), &identity, RunEventKind::Start))
        .await
        .unwrap();
    publisher.mark_dirty(&identity);
    publisher.publish().await.unwrap();
    let published = target.current_dir().await.unwrap().unwrap();
    let before = std::fs::read(published.join("run_events.jsonl")).unwrap();

    journal
        .record_event(RunEvent::new(Uuid::new_v4(), &identity, RunEventKind::Complete))
        .await
        .unwrap();
    publisher.mark_dirty(&identity);

    scenario.enable(MIRROR_BEFORE_SWAP, "return");
    let err = publisher.publish().await.unwrap_err();
    scenario.teardown();

    assert_eq!(err.kind(), ErrorKind::MirrorPublishFailed);
    assert!(publisher.is_dirty());
    assert_eq!(target.current_dir().await.unwrap().unwrap(), published);
    assert_eq!(
        std::fs::read(published.join("run_events.jsonl")).unwrap(),
        before
    );

    let versions = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("v-"))
        .count();
    assert_eq!(versions, 1);
}
