//! Core ReviewGate implementation

use crate::config::ReviewConfig;
use crate::error::ReviewError;
use normaudit_domain::traits::FragmentStore;
use normaudit_domain::{FragmentId, FragmentPatch, FragmentStatus, RawFragment, SourceId};
use serde::Serialize;
use std::fmt::Display;
use tracing::{debug, info, warn};

/// Result of one decision inside a batch
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    /// Fragment the decision was about
    pub id: FragmentId,
    /// New status, or why the decision was refused
    pub result: Result<FragmentStatus, ReviewError>,
}

/// Fragment counts per review status for one source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReviewSummary {
    /// Awaiting review
    pub pending: usize,
    /// Accepted, not yet converted
    pub approved: usize,
    /// Discarded
    pub rejected: usize,
    /// Converted into requirements
    pub processed: usize,
}

impl ReviewSummary {
    /// Total number of fragments
    pub fn total(&self) -> usize {
        self.pending + self.approved + self.rejected + self.processed
    }

    fn count(&mut self, status: FragmentStatus) {
        match status {
            FragmentStatus::Pending => self.pending += 1,
            FragmentStatus::Approved => self.approved += 1,
            FragmentStatus::Rejected => self.rejected += 1,
            FragmentStatus::Processed => self.processed += 1,
        }
    }
}

/// The review gate between extraction and conversion
///
/// The gate holds no state of its own; every decision is checked against the
/// stored status and written with a compare-and-set, so two reviewers racing on
/// the same fragment cannot both win.
pub struct ReviewGate {
    config: ReviewConfig,
}

impl ReviewGate {
    /// Create a gate with the given configuration
    pub fn new(config: ReviewConfig) -> Self {
        Self { config }
    }

    /// Create a gate with default configuration
    pub fn default_config() -> Self {
        Self::new(ReviewConfig::default())
    }

    /// Configuration in use
    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    /// Accept a PENDING fragment
    pub fn approve<S>(&self, store: &mut S, id: FragmentId, reviewer: &str) -> Result<(), ReviewError>
    where
        S: FragmentStore,
        S::Error: Display,
    {
        self.decide(store, id, FragmentStatus::Approved, reviewer)
    }

    /// Discard a PENDING fragment
    pub fn reject<S>(&self, store: &mut S, id: FragmentId, reviewer: &str) -> Result<(), ReviewError>
    where
        S: FragmentStore,
        S::Error: Display,
    {
        self.decide(store, id, FragmentStatus::Rejected, reviewer)
    }

    /// Approve several fragments, one outcome per id in input order
    pub fn approve_many<S>(&self, store: &mut S, ids: &[FragmentId], reviewer: &str) -> Vec<ReviewOutcome>
    where
        S: FragmentStore,
        S::Error: Display,
    {
        self.decide_many(store, ids, FragmentStatus::Approved, reviewer)
    }

    /// Reject several fragments, one outcome per id in input order
    pub fn reject_many<S>(&self, store: &mut S, ids: &[FragmentId], reviewer: &str) -> Vec<ReviewOutcome>
    where
        S: FragmentStore,
        S::Error: Display,
    {
        self.decide_many(store, ids, FragmentStatus::Rejected, reviewer)
    }

    /// Edit tags and check method of a PENDING or APPROVED fragment
    ///
    /// Never changes the status or the fragment text. Returns the updated
    /// fragment.
    pub fn edit_metadata<S>(
        &self,
        store: &mut S,
        id: FragmentId,
        patch: FragmentPatch,
    ) -> Result<RawFragment, ReviewError>
    where
        S: FragmentStore,
        S::Error: Display,
    {
        let fragment = load(store, id)?;
        if !fragment.status.allows_metadata_edit() {
            return Err(ReviewError::NotEditable {
                fragment: id,
                status: fragment.status,
            });
        }

        let patch = FragmentPatch {
            tags: patch.tags.map(|tags| self.clean_tags(tags)).transpose()?,
            check_method: patch.check_method,
        };
        if patch.is_empty() {
            return Ok(fragment);
        }

        store.update_metadata(id, &patch).map_err(store_error)?;
        debug!("Metadata of fragment {} updated", id);
        load(store, id)
    }

    /// PENDING fragments of a source in document order
    pub fn list_pending<S>(&self, store: &S, source: SourceId) -> Result<Vec<RawFragment>, ReviewError>
    where
        S: FragmentStore,
        S::Error: Display,
    {
        store
            .list_by_source(source, Some(FragmentStatus::Pending))
            .map_err(store_error)
    }

    /// Count the fragments of a source per status
    pub fn review_summary<S>(&self, store: &S, source: SourceId) -> Result<ReviewSummary, ReviewError>
    where
        S: FragmentStore,
        S::Error: Display,
    {
        let fragments = store.list_by_source(source, None).map_err(store_error)?;
        let mut summary = ReviewSummary::default();
        for fragment in &fragments {
            summary.count(fragment.status);
        }
        Ok(summary)
    }

    fn decide<S>(
        &self,
        store: &mut S,
        id: FragmentId,
        target: FragmentStatus,
        reviewer: &str,
    ) -> Result<(), ReviewError>
    where
        S: FragmentStore,
        S::Error: Display,
    {
        let reviewer = reviewer.trim();
        if reviewer.is_empty() {
            return Err(ReviewError::InvalidInput("reviewer name is empty".to_string()));
        }

        let fragment = load(store, id)?;
        fragment
            .status
            .transition(target)
            .map_err(|e| ReviewError::InvalidTransition {
                fragment: id,
                from: e.from,
                to: e.to,
            })?;

        store
            .update_status(id, fragment.status, target, Some(reviewer))
            .map_err(store_error)?;
        info!("Fragment {} {} by {}", id, target, reviewer);
        Ok(())
    }

    fn decide_many<S>(
        &self,
        store: &mut S,
        ids: &[FragmentId],
        target: FragmentStatus,
        reviewer: &str,
    ) -> Vec<ReviewOutcome>
    where
        S: FragmentStore,
        S::Error: Display,
    {
        let outcomes: Vec<ReviewOutcome> = ids
            .iter()
            .map(|&id| ReviewOutcome {
                id,
                result: self.decide(store, id, target, reviewer).map(|_| target),
            })
            .collect();

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        if failed > 0 {
            warn!("{} of {} decisions refused", failed, ids.len());
        }
        outcomes
    }

    fn clean_tags(&self, tags: Vec<String>) -> Result<Vec<String>, ReviewError> {
        let mut cleaned: Vec<String> = Vec::with_capacity(tags.len());
        for tag in tags {
            let tag = if self.config.normalize_tags {
                tag.trim().to_lowercase()
            } else {
                tag
            };
            if tag.trim().is_empty() {
                continue;
            }
            if tag.chars().count() > self.config.max_tag_len {
                return Err(ReviewError::InvalidInput(format!(
                    "tag longer than {} characters: {}",
                    self.config.max_tag_len, tag
                )));
            }
            if !cleaned.contains(&tag) {
                cleaned.push(tag);
            }
        }
        if cleaned.len() > self.config.max_tags {
            return Err(ReviewError::InvalidInput(format!(
                "{} tags given, at most {} allowed",
                cleaned.len(),
                self.config.max_tags
            )));
        }
        Ok(cleaned)
    }
}

fn load<S>(store: &S, id: FragmentId) -> Result<RawFragment, ReviewError>
where
    S: FragmentStore,
    S::Error: Display,
{
    store
        .get_fragment(id)
        .map_err(store_error)?
        .ok_or(ReviewError::NotFound(id))
}

fn store_error<E: Display>(e: E) -> ReviewError {
    ReviewError::Store(e.to_string())
}
