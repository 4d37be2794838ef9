//! Error types for the Converter

use normaudit_domain::SourceId;
use thiserror::Error;

/// Errors that abort a conversion run
///
/// Every variant means nothing was written.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    /// Unknown source document
    #[error("Source document not found: {0}")]
    SourceNotFound(SourceId),

    /// The source has no APPROVED fragment to convert
    #[error("No approved fragments for source {0}")]
    NoApprovedFragments(SourceId),

    /// The auto set code is already taken by a set of another source
    #[error("Requirement set {code} belongs to another source ({owner})")]
    SetConflict {
        /// Auto set code
        code: String,
        /// Owning source of the existing set, if any
        owner: String,
    },

    /// Oracle output failed validation
    #[error("Malformed conversion response for batch {batch}: {reason}")]
    OracleMalformed {
        /// Batch index
        batch: usize,
        /// What was wrong
        reason: String,
    },

    /// LLM provider error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Oracle call timed out
    #[error("Conversion timeout after {0} seconds")]
    Timeout(u64),

    /// Store error
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cancelled before the next batch
    #[error("Conversion cancelled before batch {0}")]
    Cancelled(usize),
}
