//! Pipeline runs - persisted progress of extraction and conversion jobs

use crate::SourceId;
use std::fmt;

/// Identifier of a pipeline run (UUIDv7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId(u128);

impl RunId {
    /// Generate a new run id
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }

    /// Create a run id from a raw u128 value
    pub fn from_value(value: u128) -> Self {
        Self(value)
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }

    /// Parse a run id from its hyphenated form
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s.trim())
            .map(|u| Self(u.as_u128()))
            .map_err(|e| format!("Invalid run id '{}': {}", s, e))
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

/// Which stage a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunKind {
    /// Normalize, chunk, extract, store fragments
    Extraction,
    /// Convert approved fragments into requirements
    Conversion,
}

impl RunKind {
    /// Get the kind name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::Extraction => "extraction",
            RunKind::Conversion => "conversion",
        }
    }

    /// Parse a kind from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "extraction" => Some(RunKind::Extraction),
            "conversion" => Some(RunKind::Conversion),
            _ => None,
        }
    }
}

/// Progress of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    /// Accepted, not started
    Queued,
    /// In progress
    Running,
    /// Finished successfully
    Succeeded,
    /// Finished with an error
    Failed,
    /// Stopped on request before the next chunk or batch
    Cancelled,
}

impl RunStatus {
    /// Get the status name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a status from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(RunStatus::Queued),
            "running" => Some(RunStatus::Running),
            "succeeded" => Some(RunStatus::Succeeded),
            "failed" => Some(RunStatus::Failed),
            "cancelled" => Some(RunStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether the run has finished
    pub fn is_finished(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed | RunStatus::Cancelled)
    }
}

/// Persisted record of one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRun {
    /// Run identifier
    pub id: RunId,
    /// Source document the run works on
    pub source_id: SourceId,
    /// Stage
    pub kind: RunKind,
    /// Progress
    pub status: RunStatus,
    /// Chunks or batches finished so far
    pub units_done: usize,
    /// Chunks or batches in total (0 until known)
    pub units_total: usize,
    /// Fragments stored or requirements created
    pub items_written: usize,
    /// Error text for failed runs
    pub error: Option<String>,
    /// When the run was queued (timestamp)
    pub created_at: u64,
    /// Last status change (timestamp)
    pub updated_at: u64,
}

impl PipelineRun {
    /// Create a queued run
    pub fn queued(source_id: SourceId, kind: RunKind) -> Self {
        let now = crate::current_timestamp();
        Self {
            id: RunId::new(),
            source_id,
            kind,
            status: RunStatus::Queued,
            units_done: 0,
            units_total: 0,
            items_written: 0,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_finished() {
        assert!(!RunStatus::Queued.is_finished());
        assert!(!RunStatus::Running.is_finished());
        assert!(RunStatus::Succeeded.is_finished());
        assert!(RunStatus::Failed.is_finished());
        assert!(RunStatus::Cancelled.is_finished());
    }

    #[test]
    fn test_run_id_parse() {
        let id = RunId::new();
        assert_eq!(RunId::from_string(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn test_queued_run() {
        let run = PipelineRun::queued(SourceId::new(), RunKind::Extraction);
        assert_eq!(run.status, RunStatus::Queued);
        assert_eq!(RunKind::parse(run.kind.as_str()), Some(RunKind::Extraction));
    }
}
