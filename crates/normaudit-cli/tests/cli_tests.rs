//! Command-level tests against a temporary database and a scripted oracle

use normaudit_cli::cli::{
    ConvertArgs, DecisionArgs, EditArgs, ExtractArgs, FragmentsArgs, SourceRef,
};
use normaudit_cli::commands::{self, source::add_source};
use normaudit_cli::config::OutputFormat;
use normaudit_cli::{CliError, Config, Formatter, Session};
use normaudit_domain::traits::{FragmentStore, RequirementStore};
use normaudit_domain::{CheckMethod, FragmentId, FragmentStatus, SourceId};
use normaudit_llm::MockProvider;
use normaudit_store::SqliteStore;
use serde_json::json;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

const CODE: &str = "SP 484.1311500.2020";

const DOCUMENT: &str = "4 Fire alarm systems\n\
    4.1 Fire detectors must be installed in every room of the building.\n\
    4.2 Manual call points must be placed at every evacuation exit.\n";

fn fragments_response() -> String {
    json!({"fragments": [
        {"raw_text": "Fire detectors must be installed in every room of the building.",
         "clause": "4.1", "modality": "must"},
        {"raw_text": "Manual call points must be placed at every evacuation exit.",
         "clause": "4.2", "modality": "must"}
    ]})
    .to_string()
}

struct Fixture {
    session: Session<MockProvider>,
    llm: MockProvider,
    source: SourceId,
    _dir: TempDir,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.database.path = dir.path().join("normaudit.db").to_string_lossy().into_owned();
    config.extractor.inter_call_delay_ms = 0;
    config.converter.inter_call_delay_ms = 0;

    let llm = MockProvider::new(fragments_response());
    let store = SqliteStore::with_config(&config.database).unwrap();
    let session = Session::new(
        store,
        llm.clone(),
        &config,
        Formatter::new(OutputFormat::Quiet, false),
        "inspector".to_string(),
    )
    .unwrap();

    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", DOCUMENT).unwrap();
    let (source, file_id) = add_source(
        &session,
        "RU",
        CODE,
        "Fire alarm systems",
        Some("2020-12-31".to_string()),
        Some(file.path()),
    )
    .unwrap();
    assert!(file_id.is_some());

    Fixture {
        session,
        llm,
        source,
        _dir: dir,
    }
}

fn statuses(fixture: &Fixture) -> Vec<FragmentStatus> {
    fixture
        .session
        .with_store(|store| Ok(store.list_by_source(fixture.source, None)?))
        .unwrap()
        .iter()
        .map(|f| f.status)
        .collect()
}

async fn extract(fixture: &Fixture, dry_run: bool) -> normaudit_cli::Result<()> {
    commands::execute_extract(
        ExtractArgs {
            source: CODE.to_string(),
            chunk_size: None,
            overlap: None,
            file_id: None,
            dry_run,
        },
        &fixture.session,
    )
    .await
}

fn decision(ids: &[&str]) -> DecisionArgs {
    DecisionArgs {
        ids: ids.iter().map(|id| id.to_string()).collect(),
    }
}

#[tokio::test]
async fn test_extract_writes_pending_fragments() {
    let fixture = fixture();

    extract(&fixture, false).await.unwrap();

    assert_eq!(statuses(&fixture), vec![FragmentStatus::Pending, FragmentStatus::Pending]);
    let runs = fixture.session.pipeline().runs(fixture.source).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].items_written, 2);
}

#[tokio::test]
async fn test_extract_dry_run_writes_nothing() {
    let fixture = fixture();

    extract(&fixture, true).await.unwrap();

    assert!(statuses(&fixture).is_empty());
    assert_eq!(fixture.llm.call_count(), 1);
}

#[tokio::test]
async fn test_failed_extraction_is_an_error() {
    let fixture = fixture();
    fixture.llm.fail_when_contains("Fire");

    let result = extract(&fixture, false).await;

    assert!(matches!(result, Err(CliError::StageFailed { .. })));
}

#[tokio::test]
async fn test_approve_reject_and_edit_by_code() {
    let fixture = fixture();
    extract(&fixture, false).await.unwrap();

    commands::execute_approve(decision(&["SP 484.1311500.2020#1"]), &fixture.session).unwrap();
    commands::execute_reject(decision(&["SP 484.1311500.2020#2"]), &fixture.session).unwrap();
    assert_eq!(statuses(&fixture), vec![FragmentStatus::Approved, FragmentStatus::Rejected]);

    commands::execute_edit(
        EditArgs {
            id: format!("{}#1", CODE),
            tags: vec!["Detectors".to_string(), "rooms".to_string()],
            clear_tags: false,
            check_method: Some(normaudit_cli::cli::CheckMethodArg::Visual),
        },
        &fixture.session,
    )
    .unwrap();
    let fragment = fixture
        .session
        .with_store(|store| Ok(store.get_fragment(FragmentId::new(fixture.source, 1))?))
        .unwrap()
        .unwrap();
    assert_eq!(fragment.tags, vec!["detectors".to_string(), "rooms".to_string()]);
    assert_eq!(fragment.check_method, Some(CheckMethod::Visual));
    assert_eq!(fragment.reviewed_by.as_deref(), Some("inspector"));
}

#[tokio::test]
async fn test_second_decision_is_reported() {
    let fixture = fixture();
    extract(&fixture, false).await.unwrap();
    let id = format!("{}#1", CODE);

    commands::execute_reject(decision(&[&id]), &fixture.session).unwrap();
    let result = commands::execute_approve(decision(&[&id, "SP 484.1311500.2020#2"]), &fixture.session);

    assert!(matches!(result, Err(CliError::Partial { failed: 1, total: 2 })));
    assert_eq!(statuses(&fixture), vec![FragmentStatus::Rejected, FragmentStatus::Approved]);
}

#[tokio::test]
async fn test_edit_without_changes_is_rejected() {
    let fixture = fixture();
    extract(&fixture, false).await.unwrap();

    let result = commands::execute_edit(
        EditArgs {
            id: format!("{}#1", CODE),
            tags: Vec::new(),
            clear_tags: false,
            check_method: None,
        },
        &fixture.session,
    );

    assert!(matches!(result, Err(CliError::InvalidInput(_))));
}

#[tokio::test]
async fn test_convert_after_review() {
    let fixture = fixture();
    extract(&fixture, false).await.unwrap();
    commands::execute_approve(
        decision(&["SP 484.1311500.2020#1", "SP 484.1311500.2020#2"]),
        &fixture.session,
    )
    .unwrap();

    let requirements: Vec<_> = (1..=2)
        .map(|seq| {
            json!({"fragment_id": FragmentId::new(fixture.source, seq).to_string(),
                   "text_short": format!("Check clause 4.{}", seq),
                   "severity_hint": "critical"})
        })
        .collect();
    fixture
        .llm
        .respond_when_contains("Inspection discipline", json!({ "requirements": requirements }).to_string());

    commands::execute_convert(
        ConvertArgs {
            source: CODE.to_string(),
            dry_run: false,
        },
        &fixture.session,
    )
    .await
    .unwrap();

    let ids: Vec<String> = fixture
        .session
        .with_store(|store| Ok(store.list_requirements_by_source(fixture.source)?))
        .unwrap()
        .into_iter()
        .map(|r| r.requirement_id)
        .collect();
    assert_eq!(ids, vec!["SP-484-1311500-2020-0001", "SP-484-1311500-2020-0002"]);
    assert_eq!(statuses(&fixture), vec![FragmentStatus::Processed, FragmentStatus::Processed]);

    commands::execute_requirements(
        SourceRef {
            source: CODE.to_string(),
        },
        &fixture.session,
    )
    .unwrap();
}

#[tokio::test]
async fn test_convert_without_approvals_fails() {
    let fixture = fixture();
    extract(&fixture, false).await.unwrap();

    let result = commands::execute_convert(
        ConvertArgs {
            source: CODE.to_string(),
            dry_run: true,
        },
        &fixture.session,
    )
    .await;

    assert!(matches!(result, Err(CliError::StageFailed { .. })));
}

#[tokio::test]
async fn test_listing_commands() {
    let fixture = fixture();
    extract(&fixture, false).await.unwrap();

    commands::execute_fragments(
        FragmentsArgs {
            source: fixture.source.short(),
            status: Some(normaudit_cli::cli::StatusArg::Pending),
        },
        &fixture.session,
    )
    .unwrap();
    commands::execute_runs(
        SourceRef {
            source: fixture.source.to_string(),
        },
        &fixture.session,
    )
    .unwrap();
}

#[test]
fn test_unknown_source_reference() {
    let fixture = fixture();

    let result = commands::execute_runs(
        SourceRef {
            source: "SP 1.13130.2020".to_string(),
        },
        &fixture.session,
    );

    assert!(matches!(result, Err(CliError::UnknownSource(_))));
}
