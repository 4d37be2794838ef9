//! Core FragmentExtractor implementation

use crate::chunking::{Chunk, TextChunker};
use crate::config::ExtractorConfig;
use crate::error::ExtractorError;
use crate::parser::parse_llm_response;
use crate::prompt::{PromptBuilder, EXTRACTION_SYSTEM_PROMPT};
use crate::text::{collapse_whitespace, locate_verbatim};
use crate::types::{
    ChunkFailure, ExtractionMetadata, ExtractionReport, ExtractionRequest, FragmentCandidate,
};
use normaudit_domain::traits::LlmProvider;
use normaudit_domain::{FragmentId, FragmentStatus, RawFragment, SourceId};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// A candidate that passed every check, located in its chunk
struct Located {
    candidate: FragmentCandidate,
    text: String,
    span: Span,
}

/// Document char offset of a match and its whitespace-collapsed text
type Span = (usize, String);

/// What one chunk produced
#[derive(Default)]
struct ChunkOutcome {
    located: Vec<Located>,
    seen: usize,
    invalid: usize,
    non_verbatim: usize,
    duplicates: usize,
}

/// The FragmentExtractor drives the oracle over every chunk of a document
pub struct FragmentExtractor<L>
where
    L: LlmProvider,
{
    llm_provider: Arc<L>,
    config: ExtractorConfig,
}

impl<L> FragmentExtractor<L>
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: std::fmt::Display,
{
    /// Create a new FragmentExtractor
    pub fn new(llm_provider: L, config: ExtractorConfig) -> Result<Self, ExtractorError> {
        Self::with_shared(Arc::new(llm_provider), config)
    }

    /// Create a FragmentExtractor around a shared provider
    pub fn with_shared(llm_provider: Arc<L>, config: ExtractorConfig) -> Result<Self, ExtractorError> {
        config.validate().map_err(ExtractorError::Config)?;
        Ok(Self { llm_provider, config })
    }

    /// Configuration in use
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract fragments from normalized text
    ///
    /// Chunks whose oracle call fails are recorded in `chunk_failures` and
    /// skipped. Fails with `NoFragmentsFound` when nothing survives and with
    /// `Cancelled` when the flag is raised between chunks.
    pub async fn extract(
        &self,
        request: ExtractionRequest,
    ) -> Result<ExtractionReport, ExtractorError> {
        let start_time = Instant::now();
        let chunker = TextChunker::new(self.config.chunk_size, self.config.overlap)?;
        let chunks = chunker.chunk(&request.text);
        let total = chunks.len();

        info!(
            "Starting extraction for source {}: {} chars in {} chunks",
            request.source_id,
            request.text.chars().count(),
            total
        );

        let mut fragments = Vec::new();
        let mut chunk_failures = Vec::new();
        let mut candidates_seen = 0;
        let mut dropped_non_verbatim = 0;
        let mut dropped_invalid = 0;
        let mut dropped_duplicates = 0;
        let mut next_seq = request.first_seq.max(1);
        let mut previous_spans: HashSet<Span> = HashSet::new();

        for chunk in &chunks {
            if request.cancel.is_cancelled() {
                info!("Extraction for source {} cancelled at chunk {}", request.source_id, chunk.index);
                return Err(ExtractorError::Cancelled(chunk.index));
            }
            if chunk.index > 0 && self.config.inter_call_delay_ms > 0 {
                tokio::time::sleep(self.config.inter_call_delay()).await;
            }

            debug!("Processing chunk {}/{}", chunk.index + 1, total);

            match self.extract_chunk(chunk, total, &previous_spans).await {
                Ok(outcome) => {
                    candidates_seen += outcome.seen;
                    dropped_invalid += outcome.invalid;
                    dropped_non_verbatim += outcome.non_verbatim;
                    dropped_duplicates += outcome.duplicates;

                    let mut current_spans = HashSet::new();
                    for located in outcome.located {
                        current_spans.insert(located.span.clone());
                        fragments.push(build_fragment(
                            request.source_id,
                            next_seq,
                            chunk.index,
                            located,
                        ));
                        next_seq += 1;
                    }
                    previous_spans = current_spans;
                }
                Err(e) => {
                    warn!("Chunk {} skipped: {}", chunk.index, e);
                    chunk_failures.push(ChunkFailure {
                        index: chunk.index,
                        reason: e.to_string(),
                    });
                    previous_spans.clear();
                }
            }

            if let Some(progress) = &request.progress {
                progress(chunk.index + 1, total);
            }
        }

        if fragments.is_empty() {
            return Err(ExtractorError::NoFragmentsFound {
                chunks: total,
                failed: chunk_failures.len(),
            });
        }

        info!(
            "Extraction complete: {} fragments, {} chunk failures, {} non-verbatim, {} invalid, {} duplicates",
            fragments.len(),
            chunk_failures.len(),
            dropped_non_verbatim,
            dropped_invalid,
            dropped_duplicates
        );

        Ok(ExtractionReport {
            fragments,
            chunk_count: total,
            chunk_failures,
            candidates_seen,
            dropped_non_verbatim,
            dropped_invalid,
            dropped_duplicates,
            metadata: ExtractionMetadata {
                source_id: request.source_id,
                model_name: self.llm_provider.model_name().to_string(),
                timestamp: normaudit_domain::current_timestamp(),
                processing_time_ms: start_time.elapsed().as_millis() as u64,
            },
        })
    }

    /// Call the oracle for one chunk and keep the verbatim candidates
    ///
    /// Each candidate takes the first occurrence of its text not taken by an
    /// earlier candidate of this chunk. It is a duplicate when no occurrence
    /// is left or when the previous chunk already kept that occurrence
    /// through the overlap.
    async fn extract_chunk(
        &self,
        chunk: &Chunk,
        total: usize,
        previous: &HashSet<Span>,
    ) -> Result<ChunkOutcome, ExtractorError> {
        let prompt = PromptBuilder::new(chunk, total).build();
        let response = self.call_llm(prompt).await?;
        debug!("LLM response length: {} chars", response.len());

        let parsed = parse_llm_response(&response)?;

        let mut outcome = ChunkOutcome {
            seen: parsed.candidates.len() + parsed.invalid,
            invalid: parsed.invalid,
            ..Default::default()
        };
        let mut claimed: HashSet<Span> = HashSet::new();

        for candidate in parsed.candidates {
            if candidate.confidence < self.config.min_confidence {
                debug!("Dropping low-confidence candidate ({})", candidate.confidence);
                outcome.invalid += 1;
                continue;
            }
            let occurrences = locate_verbatim(&chunk.text, &candidate.raw_text);
            if occurrences.is_empty() {
                warn!(
                    "Dropping non-verbatim candidate in chunk {}: {:.60}",
                    chunk.index, candidate.raw_text
                );
                outcome.non_verbatim += 1;
                continue;
            }

            let free = occurrences
                .into_iter()
                .map(|(pos, text)| {
                    let offset = chunk.start + chunk.text[..pos].chars().count();
                    ((offset, collapse_whitespace(&text)), text)
                })
                .find(|(span, _)| !claimed.contains(span));
            let Some((span, text)) = free else {
                debug!("Dropping repeated candidate in chunk {}: {:.60}", chunk.index, candidate.raw_text);
                outcome.duplicates += 1;
                continue;
            };
            claimed.insert(span.clone());
            if previous.contains(&span) {
                debug!("Dropping overlap duplicate in chunk {}: {:.60}", chunk.index, candidate.raw_text);
                outcome.duplicates += 1;
                continue;
            }
            outcome.located.push(Located { candidate, text, span });
        }

        Ok(outcome)
    }

    /// Call the LLM provider on a blocking thread, bounded by the timeout
    async fn call_llm(&self, prompt: String) -> Result<String, ExtractorError> {
        let llm = Arc::clone(&self.llm_provider);

        // Call in a blocking context since LlmProvider is not async
        let call = tokio::task::spawn_blocking(move || {
            llm.generate(EXTRACTION_SYSTEM_PROMPT, &prompt)
                .map_err(|e| ExtractorError::Llm(e.to_string()))
        });

        timeout(self.config.extraction_timeout(), call)
            .await
            .map_err(|_| ExtractorError::Timeout(self.config.extraction_timeout_secs))?
            .map_err(|e| ExtractorError::Llm(format!("Task join error: {}", e)))?
    }
}

fn build_fragment(source: SourceId, seq: u32, chunk_index: usize, located: Located) -> RawFragment {
    let candidate = located.candidate;
    RawFragment {
        id: FragmentId::new(source, seq),
        source_section: candidate.section,
        source_clause: candidate.clause,
        raw_text: located.text,
        detected_modality: candidate.modality,
        detected_conditions: candidate.conditions,
        detected_parameters: candidate.parameters,
        predicted_type: candidate.predicted_type,
        confidence: candidate.confidence,
        status: FragmentStatus::Pending,
        reviewed_by: None,
        tags: Vec::new(),
        check_method: None,
        converted_requirement_id: None,
        chunk_index,
        created_at: normaudit_domain::current_timestamp(),
    }
}
