//! Error types for the Extractor

use thiserror::Error;

/// Errors raised while turning attached bytes into normalized text
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngestionError {
    /// Bytes are neither a readable PDF nor text
    #[error("Unreadable document: {0}")]
    Unreadable(String),

    /// Too little text survived normalization
    #[error("Document is empty after normalization: {chars} chars (min: {min})")]
    EmptyDocument {
        /// Characters left after trimming
        chars: usize,
        /// Configured minimum
        min: usize,
    },

    /// Normalizer settings are unusable
    #[error("Invalid normalizer configuration: {0}")]
    Config(String),
}

/// Errors that can occur during extraction
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// Normalization failed
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// LLM provider error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Extraction timeout
    #[error("Extraction timeout after {0} seconds")]
    Timeout(u64),

    /// Oracle output is not the expected JSON shape
    #[error("Invalid fragment format: {0}")]
    InvalidFormat(String),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(String),

    /// Every chunk was processed (or skipped) and nothing survived
    #[error("No fragments found in {chunks} chunks ({failed} chunks failed)")]
    NoFragmentsFound {
        /// Chunks in the document
        chunks: usize,
        /// Chunks skipped because of oracle failures
        failed: usize,
    },

    /// Cancelled before the next chunk
    #[error("Extraction cancelled before chunk {0}")]
    Cancelled(usize),
}

impl From<serde_json::Error> for ExtractorError {
    fn from(e: serde_json::Error) -> Self {
        ExtractorError::JsonParse(e.to_string())
    }
}
