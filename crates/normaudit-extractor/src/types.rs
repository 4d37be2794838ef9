//! Types for extraction requests and reports

use normaudit_domain::{Modality, Parameter, RawFragment, RequirementType, SourceId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag, checked before each chunk
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// New, not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress callback: `(chunks_done, chunks_total)`
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Input for fragment extraction
#[derive(Clone)]
pub struct ExtractionRequest {
    /// Source document the text belongs to
    pub source_id: SourceId,

    /// Normalized text
    pub text: String,

    /// Sequence number of the first new fragment
    pub first_seq: u32,

    /// Cancellation flag
    pub cancel: CancelFlag,

    /// Called after every chunk
    pub progress: Option<ProgressFn>,
}

impl ExtractionRequest {
    /// Request numbering fragments from 1
    pub fn new(source_id: SourceId, text: impl Into<String>) -> Self {
        Self {
            source_id,
            text: text.into(),
            first_seq: 1,
            cancel: CancelFlag::new(),
            progress: None,
        }
    }
}

/// A fragment as proposed by the oracle, before the verbatim check
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentCandidate {
    /// Proposed verbatim text
    pub raw_text: String,
    /// Section heading
    pub section: Option<String>,
    /// Clause number
    pub clause: Option<String>,
    /// Obligation strength
    pub modality: Option<Modality>,
    /// Conditions
    pub conditions: Vec<String>,
    /// Quantitative parameters
    pub parameters: Vec<Parameter>,
    /// Predicted requirement type
    pub predicted_type: RequirementType,
    /// Oracle confidence
    pub confidence: f64,
}

impl FragmentCandidate {
    /// Validate the candidate
    pub fn validate(&self) -> Result<(), String> {
        if self.raw_text.trim().is_empty() {
            return Err("raw_text is empty".to_string());
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("confidence {} outside [0.0, 1.0]", self.confidence));
        }
        if self.parameters.iter().any(|p| p.value.trim().is_empty()) {
            return Err("parameter without a value".to_string());
        }
        Ok(())
    }
}

/// A chunk whose oracle call failed and was skipped
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkFailure {
    /// Chunk index
    pub index: usize,
    /// Why it failed
    pub reason: String,
}

/// Metadata about the extraction process
#[derive(Debug, Clone)]
pub struct ExtractionMetadata {
    /// Source document
    pub source_id: SourceId,
    /// Model behind the oracle
    pub model_name: String,
    /// Timestamp of extraction
    pub timestamp: u64,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

/// Result of extracting fragments from one document
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    /// Fragments in document order, numbered consecutively
    pub fragments: Vec<RawFragment>,
    /// Chunks in the document
    pub chunk_count: usize,
    /// Chunks that were skipped
    pub chunk_failures: Vec<ChunkFailure>,
    /// Candidates the oracle returned (valid or not)
    pub candidates_seen: usize,
    /// Candidates whose text is not in the chunk
    pub dropped_non_verbatim: usize,
    /// Candidates failing schema validation or the confidence floor
    pub dropped_invalid: usize,
    /// Candidates repeated from the previous chunk's overlap
    pub dropped_duplicates: usize,
    /// Process metadata
    pub metadata: ExtractionMetadata,
}
