//! Error types for pipeline operations

use normaudit_converter::ConversionError;
use normaudit_domain::{RunId, SourceId};
use normaudit_extractor::{ExtractorError, IngestionError};
use thiserror::Error;

/// Errors that can occur while running a pipeline stage
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Storage layer error
    #[error("Storage error: {0}")]
    Store(String),

    /// Unknown source document
    #[error("Source document not found: {0}")]
    SourceNotFound(SourceId),

    /// Nothing attached to extract from
    #[error("Source document {0} has no attached files")]
    NoFiles(SourceId),

    /// The requested attachment does not belong to the source
    #[error("File {file_id} is not attached to source {source_id}")]
    FileNotFound {
        /// Source document
        source_id: SourceId,
        /// Requested file row id
        file_id: i64,
    },

    /// Unknown run
    #[error("Run not found: {0}")]
    RunNotFound(RunId),

    /// Text could not be obtained from the attachment
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    /// Extraction failed
    #[error(transparent)]
    Extraction(#[from] ExtractorError),

    /// Conversion failed
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Background task error (tokio runtime issues)
    #[error("Worker error: {0}")]
    Worker(String),
}

impl PipelineError {
    /// Whether the failure is a requested cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            PipelineError::Extraction(ExtractorError::Cancelled(_))
                | PipelineError::Conversion(ConversionError::Cancelled(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_detection() {
        assert!(PipelineError::Extraction(ExtractorError::Cancelled(2)).is_cancelled());
        assert!(PipelineError::Conversion(ConversionError::Cancelled(0)).is_cancelled());
        assert!(!PipelineError::NoFiles(SourceId::new()).is_cancelled());
    }
}
