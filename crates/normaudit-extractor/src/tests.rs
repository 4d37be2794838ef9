//! Integration tests for the FragmentExtractor

#[cfg(test)]
mod tests {
    use crate::{
        CancelFlag, ExtractionRequest, ExtractorConfig, ExtractorError, FragmentExtractor,
        TextChunker,
    };
    use normaudit_domain::traits::LlmProvider;
    use normaudit_domain::{FragmentStatus, Modality, SourceId};
    use normaudit_llm::{LlmError, MockProvider};
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const TWO_CLAUSES: &str = "4 Fire alarm systems\n\
        4.1 Fire detectors must be installed in every room of the building.\n\
        4.2 Manual call points must be placed at every evacuation exit.";

    fn test_config(chunk_size: usize, overlap: usize) -> ExtractorConfig {
        ExtractorConfig {
            chunk_size,
            overlap,
            inter_call_delay_ms: 0,
            extraction_timeout_secs: 5,
            ..Default::default()
        }
    }

    fn fragments_json(items: &[(&str, &str)]) -> String {
        let fragments: Vec<_> = items
            .iter()
            .map(|(clause, text)| {
                json!({
                    "raw_text": text,
                    "clause": clause,
                    "modality": "must",
                    "predicted_type": "constructive",
                    "confidence": 0.9
                })
            })
            .collect();
        json!({ "fragments": fragments }).to_string()
    }

    #[tokio::test]
    async fn test_two_clause_document() {
        let llm = MockProvider::new(fragments_json(&[
            ("4.1", "Fire detectors must be installed in every room of the building."),
            ("4.2", "Manual call points must be placed at every evacuation exit."),
        ]));
        let extractor = FragmentExtractor::new(llm, test_config(10_000, 100)).unwrap();
        let source = SourceId::new();

        let report = extractor
            .extract(ExtractionRequest::new(source, TWO_CLAUSES))
            .await
            .unwrap();

        assert_eq!(report.fragments.len(), 2);
        assert_eq!(report.chunk_count, 1);
        for (i, fragment) in report.fragments.iter().enumerate() {
            assert_eq!(fragment.id.seq, i as u32 + 1);
            assert_eq!(fragment.source_id(), source);
            assert_eq!(fragment.detected_modality, Some(Modality::Must));
            assert_eq!(fragment.status, FragmentStatus::Pending);
            assert!(TWO_CLAUSES.contains(&fragment.raw_text));
        }
        assert_eq!(report.fragments[0].source_clause.as_deref(), Some("4.1"));
        assert_eq!(report.fragments[1].source_clause.as_deref(), Some("4.2"));
        assert_eq!(report.metadata.model_name, "mock");
    }

    #[tokio::test]
    async fn test_paraphrase_is_dropped() {
        let llm = MockProvider::new(fragments_json(&[
            ("4.1", "Fire detectors must be installed in every room of the building."),
            ("4.2", "Call points are required near exits."),
        ]));
        let extractor = FragmentExtractor::new(llm, test_config(10_000, 100)).unwrap();

        let report = extractor
            .extract(ExtractionRequest::new(SourceId::new(), TWO_CLAUSES))
            .await
            .unwrap();

        assert_eq!(report.fragments.len(), 1);
        assert_eq!(report.dropped_non_verbatim, 1);
        assert_eq!(report.candidates_seen, 2);
    }

    #[tokio::test]
    async fn test_reflowed_candidate_stores_chunk_text() {
        let text = "4.1 Fire detectors must be\ninstalled in every room of the building and corridor.";
        let llm = MockProvider::new(fragments_json(&[(
            "4.1",
            "Fire detectors must be installed in every room",
        )]));
        let extractor = FragmentExtractor::new(llm, test_config(10_000, 100)).unwrap();

        let report = extractor
            .extract(ExtractionRequest::new(SourceId::new(), text))
            .await
            .unwrap();

        assert_eq!(report.fragments[0].raw_text, "Fire detectors must be\ninstalled in every room");
        assert!(text.contains(&report.fragments[0].raw_text));
    }

    #[tokio::test]
    async fn test_failed_chunk_is_skipped() {
        let text = "alpha must hold here. ".repeat(3) + &"omega must hold there. ".repeat(3);
        let llm = MockProvider::new(fragments_json(&[("1", "omega must hold there.")]));
        llm.fail_when_contains("alpha");
        let extractor = FragmentExtractor::new(llm.clone(), test_config(40, 5)).unwrap();

        let report = extractor
            .extract(ExtractionRequest::new(SourceId::new(), text.as_str()))
            .await
            .unwrap();

        assert!(!report.chunk_failures.is_empty());
        assert!(!report.fragments.is_empty());
        assert_eq!(llm.call_count(), report.chunk_count);
        let failed: Vec<usize> = report.chunk_failures.iter().map(|f| f.index).collect();
        assert!(failed.contains(&0));
    }

    #[tokio::test]
    async fn test_garbage_response_is_chunk_failure() {
        let llm = MockProvider::new("Sorry, I cannot help with that.");
        let extractor = FragmentExtractor::new(llm, test_config(10_000, 100)).unwrap();

        let result = extractor
            .extract(ExtractionRequest::new(SourceId::new(), TWO_CLAUSES))
            .await;

        assert!(matches!(
            result,
            Err(ExtractorError::NoFragmentsFound { chunks: 1, failed: 1 })
        ));
    }

    #[tokio::test]
    async fn test_no_fragments_found() {
        let llm = MockProvider::new(r#"{"fragments": []}"#);
        let extractor = FragmentExtractor::new(llm, test_config(10_000, 100)).unwrap();

        let result = extractor
            .extract(ExtractionRequest::new(SourceId::new(), TWO_CLAUSES))
            .await;

        assert!(matches!(
            result,
            Err(ExtractorError::NoFragmentsFound { chunks: 1, failed: 0 })
        ));
    }

    #[tokio::test]
    async fn test_cancel_before_first_chunk() {
        let llm = MockProvider::new("[]");
        let extractor = FragmentExtractor::new(llm.clone(), test_config(10_000, 100)).unwrap();
        let cancel = CancelFlag::new();
        cancel.cancel();

        let mut request = ExtractionRequest::new(SourceId::new(), TWO_CLAUSES);
        request.cancel = cancel;

        assert!(matches!(
            extractor.extract(request).await,
            Err(ExtractorError::Cancelled(0))
        ));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_overlap_duplicates_dropped_and_numbering_continues() {
        // The second clause sits in the overlap of both chunks
        let text = "4.1 Detectors must be installed. 4.2 Sirens must be audible. 4.3 Doors must close.";
        let chunker = TextChunker::new(62, 30).unwrap();
        let chunks = chunker.chunk(text);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.contains("Sirens must be audible."));
        assert!(chunks[1].text.starts_with("Sirens") || chunks[1].text.contains("Sirens must be audible."));

        let llm = MockProvider::default();
        llm.push_response(fragments_json(&[
            ("4.1", "Detectors must be installed."),
            ("4.2", "Sirens must be audible."),
        ]));
        llm.push_response(fragments_json(&[
            ("4.2", "Sirens must be audible."),
            ("4.3", "Doors must close."),
        ]));
        let extractor = FragmentExtractor::new(llm, test_config(62, 30)).unwrap();

        let mut request = ExtractionRequest::new(SourceId::new(), text);
        request.first_seq = 8;
        let report = extractor.extract(request).await.unwrap();

        let texts: Vec<&str> = report.fragments.iter().map(|f| f.raw_text.as_str()).collect();
        assert_eq!(texts, vec!["Detectors must be installed.", "Sirens must be audible.", "Doors must close."]);
        let seqs: Vec<u32> = report.fragments.iter().map(|f| f.id.seq).collect();
        assert_eq!(seqs, vec![8, 9, 10]);
        assert_eq!(report.dropped_duplicates, 1);
        assert_eq!(report.fragments[2].chunk_index, 1);
    }

    #[tokio::test]
    async fn test_identical_clauses_in_one_chunk_are_kept() {
        let text = "5.1 The system must be tested. 5.2 Alarms must sound. 6.1 The system must be tested.";
        let llm = MockProvider::new(fragments_json(&[
            ("5.1", "The system must be tested."),
            ("5.2", "Alarms must sound."),
            ("6.1", "The system must be tested."),
        ]));
        let extractor = FragmentExtractor::new(llm, test_config(10_000, 100)).unwrap();

        let report = extractor
            .extract(ExtractionRequest::new(SourceId::new(), text))
            .await
            .unwrap();

        let clauses: Vec<_> = report.fragments.iter().map(|f| f.source_clause.as_deref()).collect();
        assert_eq!(clauses, vec![Some("5.1"), Some("5.2"), Some("6.1")]);
        assert_eq!(report.dropped_duplicates, 0);
    }

    #[tokio::test]
    async fn test_same_span_listed_twice_is_dropped() {
        let text = "5.1 The system must be tested. 5.2 Alarms must sound.";
        let llm = MockProvider::new(fragments_json(&[
            ("5.1", "The system must be tested."),
            ("5.1", "The system must be tested."),
        ]));
        let extractor = FragmentExtractor::new(llm, test_config(10_000, 100)).unwrap();

        let report = extractor
            .extract(ExtractionRequest::new(SourceId::new(), text))
            .await
            .unwrap();

        assert_eq!(report.fragments.len(), 1);
        assert_eq!(report.dropped_duplicates, 1);
    }

    #[tokio::test]
    async fn test_repeated_sentence_past_the_overlap_is_kept() {
        let text = "1.1 The system must be tested. 1.2 Doors must close. 1.3 The system must be tested.";
        let chunks = TextChunker::new(80, 77).unwrap().chunk(text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].start, 3);

        let llm = MockProvider::default();
        llm.push_response(fragments_json(&[
            ("1.1", "The system must be tested."),
            ("1.2", "Doors must close."),
        ]));
        llm.push_response(fragments_json(&[
            ("1.1", "The system must be tested."),
            ("1.2", "Doors must close."),
            ("1.3", "The system must be tested."),
        ]));
        let extractor = FragmentExtractor::new(llm, test_config(80, 77)).unwrap();

        let report = extractor
            .extract(ExtractionRequest::new(SourceId::new(), text))
            .await
            .unwrap();

        let clauses: Vec<_> = report.fragments.iter().map(|f| f.source_clause.as_deref()).collect();
        assert_eq!(clauses, vec![Some("1.1"), Some("1.2"), Some("1.3")]);
        assert_eq!(report.fragments[2].chunk_index, 1);
        assert_eq!(report.dropped_duplicates, 2);
    }

    #[tokio::test]
    async fn test_min_confidence_floor() {
        let response = json!({"fragments": [
            {"raw_text": "Fire detectors must be installed in every room of the building.", "confidence": 0.2},
            {"raw_text": "Manual call points must be placed at every evacuation exit.", "confidence": 0.8}
        ]})
        .to_string();
        let mut config = test_config(10_000, 100);
        config.min_confidence = 0.5;
        let extractor = FragmentExtractor::new(MockProvider::new(response), config).unwrap();

        let report = extractor
            .extract(ExtractionRequest::new(SourceId::new(), TWO_CLAUSES))
            .await
            .unwrap();

        assert_eq!(report.fragments.len(), 1);
        assert_eq!(report.dropped_invalid, 1);
    }

    #[tokio::test]
    async fn test_progress_reported_per_chunk() {
        let text = "Every sprinkler must be inspected. ".repeat(10);
        let llm = MockProvider::new(fragments_json(&[("5.1", "Every sprinkler must be inspected.")]));
        let extractor = FragmentExtractor::new(llm, test_config(100, 10)).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut request = ExtractionRequest::new(SourceId::new(), text.as_str());
        request.progress = Some(Arc::new(move |done, total| {
            assert!(done <= total);
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        let report = extractor.extract(request).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), report.chunk_count);
    }

    struct SlowProvider;

    impl LlmProvider for SlowProvider {
        type Error = LlmError;

        fn generate(&self, _system: &str, _prompt: &str) -> Result<String, Self::Error> {
            std::thread::sleep(std::time::Duration::from_millis(1500));
            Ok("[]".to_string())
        }
    }

    #[tokio::test]
    async fn test_oracle_timeout_is_chunk_failure() {
        let mut config = test_config(10_000, 100);
        config.extraction_timeout_secs = 1;
        let extractor = FragmentExtractor::new(SlowProvider, config).unwrap();

        let result = extractor
            .extract(ExtractionRequest::new(SourceId::new(), TWO_CLAUSES))
            .await;

        assert!(matches!(
            result,
            Err(ExtractorError::NoFragmentsFound { failed: 1, .. })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = test_config(10, 10);
        assert!(FragmentExtractor::new(MockProvider::default(), config).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_fragments_are_verbatim_chunk_substrings(
            words in prop::collection::vec("[a-z]{1,8}", 20..120),
            picks in prop::collection::vec((0usize..120, 1usize..6), 1..6),
            size in 30usize..200,
        ) {
            let text = words.join(" ");
            let mut items: Vec<String> = picks
                .iter()
                .filter_map(|(start, len)| {
                    let end = (*start + *len).min(words.len());
                    (*start < end).then(|| words[*start..end].join(" "))
                })
                .collect();
            items.push("this sentence was invented by the oracle".to_string());

            let response = json!({
                "fragments": items.iter().map(|t| json!({"raw_text": t})).collect::<Vec<_>>()
            })
            .to_string();

            let overlap = size / 4;
            let extractor = FragmentExtractor::new(MockProvider::new(response), test_config(size, overlap)).unwrap();
            let chunks = TextChunker::new(size, overlap).unwrap().chunk(&text);

            let runtime = tokio::runtime::Runtime::new().unwrap();
            let result = runtime.block_on(extractor.extract(ExtractionRequest::new(SourceId::new(), text.as_str())));

            if let Ok(report) = result {
                let mut expected_seq = 1;
                for fragment in &report.fragments {
                    prop_assert!(chunks[fragment.chunk_index].text.contains(&fragment.raw_text));
                    prop_assert_eq!(fragment.id.seq, expected_seq);
                    expected_seq += 1;
                }
                prop_assert!(report.dropped_non_verbatim >= 1);
            }
        }
    }
}
