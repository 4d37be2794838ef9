//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the pipeline and its
//! infrastructure. Implementations live in other crates (normaudit-store,
//! normaudit-llm).

use crate::{
    FragmentId, FragmentPatch, FragmentStatus, PipelineRun, RawFragment, Requirement,
    RequirementSet, RunId, SourceDocument, SourceFile, SourceId, SourceStatus,
};

/// Common base of all store traits
///
/// Carries the single error type shared by the store traits, so a backend that
/// implements several of them has one unambiguous `Error`.
pub trait Store {
    /// Error type for store operations
    type Error;
}

/// Source documents and their attached files
pub trait SourceStore: Store {
    /// Register a new source document
    fn create_source(&mut self, source: SourceDocument) -> Result<SourceId, Self::Error>;

    /// Get a source document by ID
    fn get_source(&self, id: SourceId) -> Result<Option<SourceDocument>, Self::Error>;

    /// List all source documents in registration order
    fn list_sources(&self) -> Result<Vec<SourceDocument>, Self::Error>;

    /// Update the processing status
    fn set_source_status(&mut self, id: SourceId, status: SourceStatus) -> Result<(), Self::Error>;

    /// Attach a file and return its row id
    fn attach_file(
        &mut self,
        id: SourceId,
        filename: &str,
        content: Vec<u8>,
    ) -> Result<i64, Self::Error>;

    /// List files attached to a source document, oldest first
    fn list_files(&self, id: SourceId) -> Result<Vec<SourceFile>, Self::Error>;
}

/// Raw fragments and their review status
///
/// Implemented by the infrastructure layer (normaudit-store)
pub trait FragmentStore: Store {
    /// Insert fragments as PENDING, in bounded batches
    ///
    /// Returns the number of rows written. A failing batch does not roll back
    /// batches written before it.
    fn upsert_batch(&mut self, fragments: &[RawFragment]) -> Result<usize, Self::Error>;

    /// List fragments of a source in sequence order, optionally by status
    fn list_by_source(
        &self,
        source: SourceId,
        status: Option<FragmentStatus>,
    ) -> Result<Vec<RawFragment>, Self::Error>;

    /// Get a fragment by ID
    fn get_fragment(&self, id: FragmentId) -> Result<Option<RawFragment>, Self::Error>;

    /// Move a fragment from `expected` to `status`
    ///
    /// Fails with a conflict if the stored status is no longer `expected`.
    fn update_status(
        &mut self,
        id: FragmentId,
        expected: FragmentStatus,
        status: FragmentStatus,
        reviewed_by: Option<&str>,
    ) -> Result<(), Self::Error>;

    /// Apply a reviewer metadata edit (never touches `raw_text` or `status`)
    fn update_metadata(&mut self, id: FragmentId, patch: &FragmentPatch) -> Result<(), Self::Error>;

    /// Delete every fragment of a source
    fn delete_by_source(&mut self, source: SourceId) -> Result<usize, Self::Error>;

    /// Delete the PENDING fragments of a source (before a re-extraction)
    fn delete_pending_by_source(&mut self, source: SourceId) -> Result<usize, Self::Error>;

    /// Highest fragment sequence number stored for a source (0 if none)
    fn max_fragment_seq(&self, source: SourceId) -> Result<u32, Self::Error>;
}

/// Everything a conversion run writes, applied atomically
#[derive(Debug, Clone, Default)]
pub struct ConversionCommit {
    /// Requirement set to create first (None when an existing set is reused)
    pub new_set: Option<RequirementSet>,

    /// New requirements; each one's `source_fragment_id` is flipped
    /// APPROVED -> PROCESSED in the same transaction
    pub requirements: Vec<Requirement>,
}

/// Requirement sets and requirements
pub trait RequirementStore: Store {
    /// Find a requirement set by its code
    fn find_set_by_code(&self, code: &str) -> Result<Option<RequirementSet>, Self::Error>;

    /// Create a requirement set
    fn create_set(&mut self, set: RequirementSet) -> Result<(), Self::Error>;

    /// All requirement ids starting with `prefix`
    fn list_requirement_ids_with_prefix(&self, prefix: &str) -> Result<Vec<String>, Self::Error>;

    /// Requirements derived from a source document
    fn list_requirements_by_source(&self, source: SourceId) -> Result<Vec<Requirement>, Self::Error>;

    /// Insert a single, manually curated requirement
    fn insert_requirement(&mut self, requirement: Requirement) -> Result<(), Self::Error>;

    /// Apply a conversion all-or-nothing
    fn commit_conversion(&mut self, commit: &ConversionCommit) -> Result<(), Self::Error>;
}

/// Persisted pipeline run records
pub trait RunStore: Store {
    /// Record a new run
    fn create_run(&mut self, run: &PipelineRun) -> Result<(), Self::Error>;

    /// Overwrite the mutable fields of a run
    fn update_run(&mut self, run: &PipelineRun) -> Result<(), Self::Error>;

    /// Get a run by ID
    fn get_run(&self, id: RunId) -> Result<Option<PipelineRun>, Self::Error>;

    /// Runs for a source, newest first
    fn list_runs(&self, source: SourceId) -> Result<Vec<PipelineRun>, Self::Error>;
}

/// Trait for the extraction/classification oracle
///
/// Implemented by the infrastructure layer (normaudit-llm). Calls are blocking.
pub trait LlmProvider {
    /// Error type for LLM operations
    type Error;

    /// Generate a completion for a system prompt and a user prompt
    fn generate(&self, system: &str, prompt: &str) -> Result<String, Self::Error>;

    /// Name of the model behind the provider
    fn model_name(&self) -> &str {
        "llm"
    }
}
