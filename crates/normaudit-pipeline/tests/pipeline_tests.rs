//! End-to-end tests: attachment → fragments → review → requirements

use normaudit_domain::traits::{FragmentStore, RequirementStore, SourceStore};
use normaudit_domain::{
    FragmentId, FragmentStatus, RunStatus, SourceDocument, SourceId, SourceStatus,
};
use normaudit_llm::MockProvider;
use normaudit_pipeline::{Pipeline, PipelineConfig, PipelineOptions, RunWatcher};
use normaudit_store::SqliteStore;
use serde_json::json;
use std::time::Duration;

const DOCUMENT: &str = "4 Fire alarm systems\n\
    4.1 Fire detectors must be installed in every room of the building.\n\
    4.2 Manual call points must be placed at every evacuation exit.\n";

fn fragments_response() -> String {
    json!({"fragments": [
        {"raw_text": "Fire detectors must be installed in every room of the building.",
         "clause": "4.1", "modality": "must", "confidence": 0.9},
        {"raw_text": "Manual call points must be placed at every evacuation exit.",
         "clause": "4.2", "modality": "must", "confidence": 0.9}
    ]})
    .to_string()
}

fn test_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.poll_interval_ms = 10;
    config.extractor.inter_call_delay_ms = 0;
    config.extractor.extraction_timeout_secs = 5;
    config.converter.inter_call_delay_ms = 0;
    config.converter.conversion_timeout_secs = 5;
    config
}

fn setup(llm: MockProvider, with_file: bool) -> (Pipeline<SqliteStore, MockProvider>, SourceId) {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let source = SourceDocument::new("RU", "SP 484.1311500.2020", "Fire alarm systems", None);
    let source_id = store.create_source(source).unwrap();
    if with_file {
        store
            .attach_file(source_id, "sp484.txt", DOCUMENT.as_bytes().to_vec())
            .unwrap();
    }
    (Pipeline::new(store, llm, test_config()).unwrap(), source_id)
}

fn fragments(
    pipeline: &Pipeline<SqliteStore, MockProvider>,
    source: SourceId,
    status: Option<FragmentStatus>,
) -> Vec<u32> {
    let store = pipeline.store();
    let store = store.lock().unwrap();
    store
        .list_by_source(source, status)
        .unwrap()
        .iter()
        .map(|f| f.id.seq)
        .collect()
}

fn approve(pipeline: &Pipeline<SqliteStore, MockProvider>, source: SourceId, seq: u32) {
    let store = pipeline.store();
    let mut store = store.lock().unwrap();
    store
        .update_status(
            FragmentId::new(source, seq),
            FragmentStatus::Pending,
            FragmentStatus::Approved,
            Some("inspector"),
        )
        .unwrap();
}

fn source_status(pipeline: &Pipeline<SqliteStore, MockProvider>, source: SourceId) -> SourceStatus {
    let store = pipeline.store();
    let store = store.lock().unwrap();
    store.get_source(source).unwrap().unwrap().status
}

#[tokio::test]
async fn test_extraction_stores_pending_fragments() {
    let (pipeline, source) = setup(MockProvider::new(fragments_response()), true);

    let outcome = pipeline.run_extraction(source, PipelineOptions::default()).await;

    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(outcome.fragments_written, 2);
    assert_eq!(outcome.chunk_count, 1);
    assert_eq!(fragments(&pipeline, source, Some(FragmentStatus::Pending)), vec![1, 2]);
    assert_eq!(source_status(&pipeline, source), SourceStatus::Extracted);

    let runs = pipeline.runs(source).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Succeeded);
    assert_eq!(runs[0].items_written, 2);
    assert_eq!(runs[0].units_done, 1);
}

#[tokio::test]
async fn test_reextraction_replaces_pending_and_keeps_reviewed() {
    let (pipeline, source) = setup(MockProvider::new(fragments_response()), true);
    pipeline.run_extraction(source, PipelineOptions::default()).await;
    approve(&pipeline, source, 1);

    let outcome = pipeline.run_extraction(source, PipelineOptions::default()).await;

    assert!(outcome.success);
    assert_eq!(outcome.fragments_replaced, 1);
    assert_eq!(fragments(&pipeline, source, Some(FragmentStatus::Approved)), vec![1]);
    assert_eq!(fragments(&pipeline, source, Some(FragmentStatus::Pending)), vec![2, 3]);
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let (pipeline, source) = setup(MockProvider::new(fragments_response()), true);

    let outcome = pipeline.run_extraction(source, PipelineOptions::dry_run()).await;

    assert!(outcome.success);
    assert!(outcome.dry_run);
    assert_eq!(outcome.fragments_found, 2);
    assert_eq!(outcome.fragments_written, 0);
    assert_eq!(outcome.preview.len(), 2);
    assert!(outcome.preview[0].starts_with("4.1 "));
    assert!(fragments(&pipeline, source, None).is_empty());
    assert_eq!(source_status(&pipeline, source), SourceStatus::Registered);
}

#[tokio::test]
async fn test_missing_attachment_is_reported() {
    let (pipeline, source) = setup(MockProvider::default(), false);

    let outcome = pipeline.run_extraction(source, PipelineOptions::default()).await;

    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("no attached files"));
    let runs = pipeline.runs(source).unwrap();
    assert_eq!(runs[0].status, RunStatus::Failed);
    assert!(runs[0].error.is_some());
}

#[tokio::test]
async fn test_failed_extraction_marks_source() {
    // Valid JSON, but nothing usable in it
    let (pipeline, source) = setup(MockProvider::new(r#"{"fragments": []}"#), true);

    let outcome = pipeline.run_extraction(source, PipelineOptions::default()).await;

    assert!(!outcome.success);
    assert_eq!(source_status(&pipeline, source), SourceStatus::Failed);
}

#[tokio::test]
async fn test_spawned_extraction_is_polled_to_completion() {
    let (pipeline, source) = setup(MockProvider::new(fragments_response()), true);

    let run_id = pipeline.spawn_extraction(source, PipelineOptions::default()).unwrap();
    let watcher = RunWatcher::new(pipeline.clone()).with_interval(Duration::from_millis(5));
    let mut updates = 0;
    let run = tokio::time::timeout(Duration::from_secs(5), watcher.wait(run_id, |_| updates += 1))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(run.status, RunStatus::Succeeded);
    assert_eq!(run.units_done, run.units_total);
    assert!(updates >= 1);
    assert_eq!(fragments(&pipeline, source, None).len(), 2);
}

#[tokio::test]
async fn test_cancelled_run() {
    let llm = MockProvider::new(fragments_response());
    let (pipeline, source) = setup(llm.clone(), true);

    // The task cannot start before this test yields, so the flag is seen first
    let run_id = pipeline.spawn_extraction(source, PipelineOptions::default()).unwrap();
    assert!(pipeline.cancel(run_id));

    let watcher = RunWatcher::new(pipeline.clone()).with_interval(Duration::from_millis(5));
    let run = tokio::time::timeout(Duration::from_secs(5), watcher.wait(run_id, |_| {}))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(run.status, RunStatus::Cancelled);
    assert_eq!(llm.call_count(), 0);
    assert_eq!(source_status(&pipeline, source), SourceStatus::Registered);
    assert!(!pipeline.cancel(run_id));
}

#[tokio::test]
async fn test_same_source_runs_do_not_interleave() {
    let (pipeline, source) = setup(MockProvider::new(fragments_response()), true);

    let (first, second) = tokio::join!(
        pipeline.run_extraction(source, PipelineOptions::default()),
        pipeline.run_extraction(source, PipelineOptions::default()),
    );

    assert!(first.success && second.success);
    assert_eq!(fragments(&pipeline, source, None), vec![1, 2]);
}

#[tokio::test]
async fn test_extract_review_convert() {
    let llm = MockProvider::new(fragments_response());
    let (pipeline, source) = setup(llm.clone(), true);
    pipeline.run_extraction(source, PipelineOptions::default()).await;
    approve(&pipeline, source, 1);
    approve(&pipeline, source, 2);

    let requirements: Vec<_> = (1..=2)
        .map(|seq| {
            json!({"fragment_id": FragmentId::new(source, seq).to_string(),
                   "text_short": format!("Check clause 4.{}", seq),
                   "severity_hint": "major"})
        })
        .collect();
    llm.respond_when_contains("Inspection discipline", json!({ "requirements": requirements }).to_string());

    let outcome = pipeline.run_conversion(source, PipelineOptions::default()).await;

    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(outcome.system_id.as_deref(), Some("fire_alarm"));
    assert_eq!(
        outcome.requirement_ids,
        vec!["SP-484-1311500-2020-0001".to_string(), "SP-484-1311500-2020-0002".to_string()]
    );
    assert_eq!(fragments(&pipeline, source, Some(FragmentStatus::Processed)), vec![1, 2]);
    assert_eq!(source_status(&pipeline, source), SourceStatus::Converted);

    let store = pipeline.store();
    let store = store.lock().unwrap();
    assert_eq!(store.list_requirements_by_source(source).unwrap().len(), 2);
}

#[tokio::test]
async fn test_conversion_without_approvals_fails_cleanly() {
    let (pipeline, source) = setup(MockProvider::new(fragments_response()), true);
    pipeline.run_extraction(source, PipelineOptions::default()).await;

    let outcome = pipeline.run_conversion(source, PipelineOptions::default()).await;

    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("No approved fragments"));
    assert_eq!(source_status(&pipeline, source), SourceStatus::Extracted);
}

#[tokio::test]
async fn test_on_disk_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("normaudit.db");
    let source = {
        let mut store = SqliteStore::new(&path).unwrap();
        let source = store
            .create_source(SourceDocument::new("RU", "SP 1", "Evacuation routes", None))
            .unwrap();
        store.attach_file(source, "sp1.txt", DOCUMENT.as_bytes().to_vec()).unwrap();
        let pipeline = Pipeline::new(store, MockProvider::new(fragments_response()), test_config()).unwrap();
        assert!(pipeline.run_extraction(source, PipelineOptions::default()).await.success);
        source
    };

    let store = SqliteStore::new(&path).unwrap();
    assert_eq!(store.list_by_source(source, None).unwrap().len(), 2);
}
