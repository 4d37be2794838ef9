//! Normaudit Domain Layer
//!
//! This crate contains the core data model for the normative document
//! extraction pipeline. It has no infrastructure dependencies and defines the
//! value objects, the fragment review state machine, and the trait interfaces
//! that the store, oracle and pipeline crates implement or consume.
//!
//! ## Key Concepts
//!
//! - **SourceDocument**: one regulatory text with its attached files
//! - **RawFragment**: a verbatim, unreviewed candidate normative statement
//! - **FragmentStatus**: the review state machine (pending → approved/rejected → processed)
//! - **RequirementSet**: a versioned grouping of requirements from one origin
//! - **Requirement**: the reviewed, checklist-ready unit
//!
//! ## Architecture
//!
//! - Pure data and rules only
//! - Storage and oracle access go through the traits in [`traits`]

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod fragment;
pub mod requirement;
pub mod run;
pub mod source;
pub mod status;
pub mod traits;
pub mod vocabulary;

// Re-exports for convenience
pub use fragment::{FragmentId, FragmentPatch, Parameter, RawFragment};
pub use requirement::{
    format_requirement_id, requirement_prefix, Requirement, RequirementSet, SetStatus,
};
pub use run::{PipelineRun, RunId, RunKind, RunStatus};
pub use source::{SourceDocument, SourceFile, SourceId, SourceStatus};
pub use status::{FragmentStatus, TransitionError};
pub use vocabulary::{CheckMethod, Modality, RequirementType, Severity};

/// Current timestamp in seconds since Unix epoch
pub fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
