//! Error types for the CLI application.

use normaudit_gatekeeper::ReviewError;
use normaudit_pipeline::PipelineError;
use normaudit_store::StoreError;
use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Review decision or metadata edit refused
    #[error("Review error: {0}")]
    Review(#[from] ReviewError),

    /// Extraction or conversion failed
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Line editor could not be used
    #[error("Line editor error: {0}")]
    Editor(String),

    /// An extraction or conversion run ended without success
    #[error("{stage} failed: {message}")]
    StageFailed {
        /// `extraction` or `conversion`
        stage: String,
        /// Error recorded for the run
        message: String,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No source document matches the reference
    #[error("No source document matches '{0}'")]
    UnknownSource(String),

    /// Some items of a bulk operation failed
    #[error("{failed} of {total} fragment(s) were not updated")]
    Partial {
        /// Items that failed
        failed: usize,
        /// Items requested
        total: usize,
    },
}

impl From<rustyline::error::ReadlineError> for CliError {
    fn from(e: rustyline::error::ReadlineError) -> Self {
        CliError::Editor(e.to_string())
    }
}
