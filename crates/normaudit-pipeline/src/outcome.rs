//! Serializable result of a pipeline stage

use serde::{Deserialize, Serialize};

/// Result of one pipeline entry point
///
/// A failed stage always carries `success: false` and the error text; it is
/// never reported as an empty success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    /// Whether the stage finished without error
    pub success: bool,

    /// `extraction` or `conversion`
    pub stage: String,

    /// Source document
    pub source_id: String,

    /// Background run, when the stage was spawned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    /// Nothing was written
    pub dry_run: bool,

    /// Chunks of the normalized text
    pub chunk_count: usize,

    /// Chunks skipped because of oracle failures
    pub chunk_failures: usize,

    /// How the operative language was isolated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isolation: Option<String>,

    /// Fragments produced by the extractor
    pub fragments_found: usize,

    /// Fragments stored as PENDING
    pub fragments_written: usize,

    /// PENDING fragments replaced by this extraction
    pub fragments_replaced: usize,

    /// Requirement set the requirements went to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirement_set: Option<String>,

    /// Inspection discipline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_id: Option<String>,

    /// Identifiers of the new (or, on a dry run, would-be) requirements
    pub requirement_ids: Vec<String>,

    /// Fragment texts or requirement summaries, for dry runs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preview: Vec<String>,

    /// Wall-clock time of the stage
    pub processing_time_ms: u64,

    /// Error text of a failed stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipelineOutcome {
    /// Start an outcome for a stage
    pub fn new(stage: &str, source_id: impl ToString) -> Self {
        Self {
            stage: stage.to_string(),
            source_id: source_id.to_string(),
            ..Default::default()
        }
    }

    /// Mark the outcome as failed
    pub fn failed(mut self, error: impl ToString) -> Self {
        self.success = false;
        self.error = Some(error.to_string());
        self
    }

    /// Human readable summary
    pub fn summary(&self) -> String {
        let mut summary = String::new();
        summary.push_str(&format!(
            "{} of {}: {}{}\n",
            self.stage,
            self.source_id,
            if self.success { "succeeded" } else { "failed" },
            if self.dry_run { " (dry run)" } else { "" }
        ));

        if let Some(error) = &self.error {
            summary.push_str(&format!("  Error: {}\n", error));
        }
        if self.chunk_count > 0 {
            summary.push_str(&format!(
                "  Chunks: {} ({} failed)\n",
                self.chunk_count, self.chunk_failures
            ));
        }
        if let Some(isolation) = &self.isolation {
            summary.push_str(&format!("  Isolation: {}\n", isolation));
        }
        if self.fragments_found > 0 {
            summary.push_str(&format!(
                "  Fragments: {} found, {} written, {} replaced\n",
                self.fragments_found, self.fragments_written, self.fragments_replaced
            ));
        }
        if let Some(set) = &self.requirement_set {
            summary.push_str(&format!(
                "  Requirements: {} in {} ({})\n",
                self.requirement_ids.len(),
                set,
                self.system_id.as_deref().unwrap_or("general")
            ));
        }
        summary.push_str(&format!("  Time: {} ms\n", self.processing_time_ms));
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_outcome_serializes_error() {
        let outcome = PipelineOutcome::new("extraction", "abc").failed("no files");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "no files");
        assert!(json.get("run_id").is_none());
    }

    #[test]
    fn test_summary() {
        let mut outcome = PipelineOutcome::new("conversion", "abc");
        outcome.success = true;
        outcome.requirement_set = Some("RS-abc".to_string());
        outcome.system_id = Some("fire_alarm".to_string());
        outcome.requirement_ids = vec!["NFPA-72-0001".to_string()];

        let summary = outcome.summary();
        assert!(summary.contains("conversion of abc: succeeded"));
        assert!(summary.contains("Requirements: 1 in RS-abc (fire_alarm)"));
        assert!(!summary.contains("Error"));
    }
}
