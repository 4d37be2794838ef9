//! Integration tests for the RequirementConverter

#[cfg(test)]
mod tests {
    use crate::{ConversionError, ConverterConfig, RequirementConverter};
    use normaudit_domain::traits::{FragmentStore, LlmProvider, RequirementStore, SourceStore};
    use normaudit_domain::{
        CheckMethod, FragmentId, FragmentPatch, FragmentStatus, RawFragment, Requirement,
        RequirementSet, Severity, SourceDocument, SourceId,
    };
    use normaudit_extractor::CancelFlag;
    use normaudit_llm::{LlmError, MockProvider};
    use normaudit_store::SqliteStore;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Answers every batch correctly, one requirement per listed fragment
    #[derive(Default)]
    struct EchoProvider {
        calls: AtomicUsize,
    }

    impl LlmProvider for EchoProvider {
        type Error = LlmError;

        fn generate(&self, _system: &str, prompt: &str) -> Result<String, Self::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let body = prompt
                .find('{')
                .map(|start| &prompt[start..])
                .ok_or_else(|| LlmError::InvalidResponse("no fragments in prompt".into()))?;
            let parsed: Value =
                serde_json::from_str(body.trim()).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
            let requirements: Vec<Value> = parsed["fragments"]
                .as_array()
                .cloned()
                .unwrap_or_default()
                .iter()
                .map(|f| {
                    json!({
                        "fragment_id": f["fragment_id"],
                        "text_short": format!("Check: {}", f["text"].as_str().unwrap_or("")),
                        "check_method": "visual",
                        "severity_hint": "major",
                        "tags": ["fire"]
                    })
                })
                .collect();
            Ok(json!({ "requirements": requirements }).to_string())
        }
    }

    fn test_config() -> ConverterConfig {
        ConverterConfig {
            inter_call_delay_ms: 0,
            conversion_timeout_secs: 5,
            ..Default::default()
        }
    }

    /// Source with `approved` APPROVED fragments followed by one PENDING one
    fn setup(code: &str, approved: u32) -> (SqliteStore, SourceId) {
        let mut store = SqliteStore::new(":memory:").unwrap();
        let source = SourceDocument::new("RU", code, "Fire alarm systems. Design rules", None);
        let source_id = store.create_source(source).unwrap();
        add_fragments(&mut store, source_id, 1, approved + 1);
        for seq in 1..=approved {
            store
                .update_status(
                    FragmentId::new(source_id, seq),
                    FragmentStatus::Pending,
                    FragmentStatus::Approved,
                    Some("inspector"),
                )
                .unwrap();
        }
        (store, source_id)
    }

    fn add_fragments(store: &mut SqliteStore, source: SourceId, from: u32, to: u32) {
        let fragments: Vec<RawFragment> = (from..=to)
            .map(|seq| {
                let mut f = RawFragment::pending(
                    FragmentId::new(source, seq),
                    format!("Detector group {} must be tested yearly.", seq),
                );
                f.source_clause = Some(format!("4.{}", seq));
                f
            })
            .collect();
        store.upsert_batch(&fragments).unwrap();
    }

    fn approve(store: &mut SqliteStore, source: SourceId, seqs: impl IntoIterator<Item = u32>) {
        for seq in seqs {
            store
                .update_status(
                    FragmentId::new(source, seq),
                    FragmentStatus::Pending,
                    FragmentStatus::Approved,
                    Some("inspector"),
                )
                .unwrap();
        }
    }

    fn manual_requirement(set: &RequirementSet, source: SourceId, id: &str) -> Requirement {
        Requirement {
            requirement_id: id.to_string(),
            requirement_set_id: set.id.clone(),
            source_id: source,
            system_id: "fire_alarm".to_string(),
            clause: "1.1".to_string(),
            text_short: "Manual".to_string(),
            text_full: "Manual".to_string(),
            check_method: CheckMethod::Visual,
            severity_hint: Severity::Low,
            tags: Vec::new(),
            must_check: false,
            source_fragment_id: None,
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn test_convert_creates_set_and_requirements() {
        let (mut store, source) = setup("SP 484.1311500.2020", 3);
        let converter = RequirementConverter::new(EchoProvider::default(), test_config()).unwrap();

        let report = converter.convert(&mut store, source).await.unwrap();

        assert!(report.set_created);
        assert_eq!(report.system_id, "fire_alarm");
        assert_eq!(report.fragments_processed, 3);
        let ids: Vec<&str> = report.created.iter().map(|r| r.requirement_id.as_str()).collect();
        assert_eq!(ids, vec!["SP-484-1311500-2020-0001", "SP-484-1311500-2020-0002", "SP-484-1311500-2020-0003"]);

        let first = &report.created[0];
        assert_eq!(first.text_full, "Detector group 1 must be tested yearly.");
        assert_eq!(first.severity_hint, Severity::High);
        assert_eq!(first.clause, "4.1");
        assert_eq!(first.source_fragment_id, Some(FragmentId::new(source, 1)));

        let set = store.find_set_by_code(&report.requirement_set.code).unwrap().unwrap();
        assert_eq!(set.source_id, Some(source));
        assert!(set.code.starts_with("RS-"));

        let processed = store.list_by_source(source, Some(FragmentStatus::Processed)).unwrap();
        assert_eq!(processed.len(), 3);
        assert_eq!(
            processed[0].converted_requirement_id.as_deref(),
            Some("SP-484-1311500-2020-0001")
        );
        // The PENDING fragment is left alone
        assert_eq!(store.list_by_source(source, Some(FragmentStatus::Pending)).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ids_continue_after_existing_requirements() {
        let (mut store, source) = setup("NFPA 72", 2);
        let set = RequirementSet::draft("MANUAL", "Manual entries", None);
        store.create_set(set.clone()).unwrap();
        for id in ["NFPA-72-0001", "NFPA-72-0002", "NFPA-72-0003"] {
            store.insert_requirement(manual_requirement(&set, source, id)).unwrap();
        }

        let converter = RequirementConverter::new(EchoProvider::default(), test_config()).unwrap();
        let report = converter.convert(&mut store, source).await.unwrap();

        let ids: Vec<&str> = report.created.iter().map(|r| r.requirement_id.as_str()).collect();
        assert_eq!(ids, vec!["NFPA-72-0004", "NFPA-72-0005"]);
    }

    #[tokio::test]
    async fn test_repeated_conversion_reuses_set_and_never_reuses_suffix() {
        let (mut store, source) = setup("NFPA 72", 2);
        let converter = RequirementConverter::new(EchoProvider::default(), test_config()).unwrap();

        let first = converter.convert(&mut store, source).await.unwrap();
        approve(&mut store, source, [3]);
        add_fragments(&mut store, source, 4, 4);
        approve(&mut store, source, [4]);
        let second = converter.convert(&mut store, source).await.unwrap();

        assert!(!second.set_created);
        assert_eq!(first.requirement_set.id, second.requirement_set.id);
        let ids: Vec<&str> = second.created.iter().map(|r| r.requirement_id.as_str()).collect();
        assert_eq!(ids, vec!["NFPA-72-0003", "NFPA-72-0004"]);
        assert_eq!(store.list_requirements_by_source(source).unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_sources_registered_back_to_back_get_their_own_sets() {
        let (mut store, first) = setup("NFPA 72", 1);
        let second = store
            .create_source(SourceDocument::new("RU", "SP 5.13130.2009", "Fire alarm systems", None))
            .unwrap();
        add_fragments(&mut store, second, 1, 1);
        approve(&mut store, second, [1]);
        let converter = RequirementConverter::new(EchoProvider::default(), test_config()).unwrap();

        let a = converter.convert(&mut store, first).await.unwrap();
        let b = converter.convert(&mut store, second).await.unwrap();

        assert!(a.set_created);
        assert!(b.set_created);
        assert_ne!(a.requirement_set.id, b.requirement_set.id);
        assert_ne!(a.requirement_set.code, b.requirement_set.code);
        for (report, source) in [(&a, first), (&b, second)] {
            let set = store.find_set_by_code(&report.requirement_set.code).unwrap().unwrap();
            assert_eq!(set.source_id, Some(source));
            let requirements = store.list_requirements_by_source(source).unwrap();
            assert_eq!(requirements.len(), 1);
            assert_eq!(requirements[0].requirement_set_id, set.id);
        }
    }

    #[tokio::test]
    async fn test_auto_code_owned_by_another_source_is_a_conflict() {
        let (mut store, first) = setup("NFPA 72", 1);
        let second = store
            .create_source(SourceDocument::new("RU", "SP 5.13130.2009", "Fire alarm systems", None))
            .unwrap();
        add_fragments(&mut store, second, 1, 1);
        approve(&mut store, second, [1]);
        let code = store.get_source(second).unwrap().unwrap().auto_set_code();
        store
            .create_set(RequirementSet::draft(code, "Taken", Some(first)))
            .unwrap();
        let converter = RequirementConverter::new(EchoProvider::default(), test_config()).unwrap();

        let result = converter.convert(&mut store, second).await;

        assert!(matches!(result, Err(ConversionError::SetConflict { .. })));
        assert!(store.list_requirements_by_source(second).unwrap().is_empty());
        assert_eq!(store.list_by_source(second, Some(FragmentStatus::Approved)).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_no_approved_fragments_writes_nothing() {
        let (mut store, source) = setup("NFPA 72", 0);
        let llm = MockProvider::default();
        let converter = RequirementConverter::new(llm.clone(), test_config()).unwrap();

        let result = converter.convert(&mut store, source).await;

        assert_eq!(result.unwrap_err(), ConversionError::NoApprovedFragments(source));
        assert_eq!(llm.call_count(), 0);
        assert!(store.list_sets().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_source() {
        let mut store = SqliteStore::new(":memory:").unwrap();
        let converter = RequirementConverter::new(MockProvider::default(), test_config()).unwrap();
        let missing = SourceId::new();

        assert_eq!(
            converter.convert(&mut store, missing).await.unwrap_err(),
            ConversionError::SourceNotFound(missing)
        );
    }

    #[tokio::test]
    async fn test_malformed_second_batch_aborts_everything() {
        let (mut store, source) = setup("NFPA 72", 3);
        let llm = MockProvider::default();
        let first_batch: Vec<Value> = (1..=2)
            .map(|seq| json!({"fragment_id": FragmentId::new(source, seq).to_string(), "text_short": "ok"}))
            .collect();
        llm.push_response(json!({ "requirements": first_batch }).to_string());
        llm.push_response(r#"{"requirements": []}"#);

        let config = ConverterConfig {
            batch_size: 2,
            ..test_config()
        };
        let converter = RequirementConverter::new(llm.clone(), config).unwrap();

        let result = converter.convert(&mut store, source).await;

        assert!(matches!(result, Err(ConversionError::OracleMalformed { batch: 1, .. })));
        assert_eq!(llm.call_count(), 2);
        assert!(store.list_requirements_by_source(source).unwrap().is_empty());
        assert!(store.list_sets().unwrap().is_empty());
        assert_eq!(store.list_by_source(source, Some(FragmentStatus::Approved)).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_oracle_error_aborts() {
        let (mut store, source) = setup("NFPA 72", 1);
        let llm = MockProvider::default();
        llm.push_error("connection reset");
        let converter = RequirementConverter::new(llm, test_config()).unwrap();

        assert!(matches!(
            converter.convert(&mut store, source).await,
            Err(ConversionError::Llm(_))
        ));
        assert!(store.list_requirements_by_source(source).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let (mut store, source) = setup("NFPA 72", 2);
        let config = ConverterConfig {
            dry_run: true,
            ..test_config()
        };
        let converter = RequirementConverter::new(EchoProvider::default(), config).unwrap();

        let report = converter.convert(&mut store, source).await.unwrap();

        assert!(report.dry_run);
        assert_eq!(report.created.len(), 2);
        assert_eq!(report.created[0].requirement_id, "NFPA-72-0001");
        assert_eq!(report.fragments_processed, 0);
        assert!(store.list_sets().unwrap().is_empty());
        assert_eq!(store.list_by_source(source, Some(FragmentStatus::Approved)).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_batches_and_reviewer_metadata() {
        let (mut store, source) = setup("NFPA 72", 5);
        store
            .update_metadata(
                FragmentId::new(source, 2),
                &FragmentPatch {
                    tags: Some(vec!["detectors".to_string()]),
                    check_method: Some(CheckMethod::Testing),
                },
            )
            .unwrap();

        let llm = EchoProvider::default();
        let config = ConverterConfig {
            batch_size: 2,
            ..test_config()
        };
        let converter = RequirementConverter::new(llm, config).unwrap();
        let report = converter.convert(&mut store, source).await.unwrap();

        assert_eq!(report.batches, 3);
        assert_eq!(report.created.len(), 5);
        let second = &report.created[1];
        assert_eq!(second.check_method, CheckMethod::Testing);
        assert_eq!(second.tags, vec!["detectors".to_string(), "fire".to_string()]);
    }

    #[tokio::test]
    async fn test_cancel_before_first_batch() {
        let (store, source) = setup("NFPA 72", 2);
        let llm = MockProvider::default();
        let converter = RequirementConverter::new(llm.clone(), test_config()).unwrap();
        let plan = converter.plan(&store, source).unwrap();

        let cancel = CancelFlag::new();
        cancel.cancel();
        assert_eq!(
            converter.draft(&plan, &cancel, None).await.unwrap_err(),
            ConversionError::Cancelled(0)
        );
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fragment_changed_before_commit_aborts() {
        let (mut store, source) = setup("NFPA 72", 2);
        let converter = RequirementConverter::new(EchoProvider::default(), test_config()).unwrap();

        let plan = converter.plan(&store, source).unwrap();
        let drafts = converter.draft(&plan, &CancelFlag::new(), None).await.unwrap();

        // Another run consumed fragment 2 in the meantime
        store
            .update_status(
                FragmentId::new(source, 2),
                FragmentStatus::Approved,
                FragmentStatus::Processed,
                None,
            )
            .unwrap();

        assert!(matches!(
            converter.commit(&mut store, plan, drafts),
            Err(ConversionError::Store(_))
        ));
        assert!(store.list_requirements_by_source(source).unwrap().is_empty());
        assert!(store.list_sets().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_progress_per_batch() {
        let (store, source) = setup("NFPA 72", 3);
        let config = ConverterConfig {
            batch_size: 1,
            ..test_config()
        };
        let converter = RequirementConverter::new(EchoProvider::default(), config).unwrap();
        let plan = converter.plan(&store, source).unwrap();

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let progress: normaudit_extractor::ProgressFn = Arc::new(move |done, total| {
            assert!(done <= total);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        converter.draft(&plan, &CancelFlag::new(), Some(&progress)).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }
}
