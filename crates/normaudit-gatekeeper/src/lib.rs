//! Normaudit Gatekeeper
//!
//! The human-in-the-loop review gate between automatic extraction and
//! authoritative requirements.
//!
//! The ReviewGate provides:
//! - Approve / reject with the reviewer recorded
//! - Reviewer metadata edits (tags, check method) that never touch the text
//! - Batch decisions with per-fragment outcomes
//! - Review progress counts per source
//!
//! Fragments only move along the review state machine:
//!
//! ```text
//! PENDING ──approve──▶ APPROVED ──convert──▶ PROCESSED
//!    └─────reject────▶ REJECTED
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use normaudit_gatekeeper::{ReviewConfig, ReviewGate};
//! use normaudit_store::SqliteStore;
//! use normaudit_domain::SourceId;
//!
//! let mut store = SqliteStore::new("normaudit.db").unwrap();
//! let gate = ReviewGate::new(ReviewConfig::default());
//! for fragment in gate.list_pending(&store, SourceId::new()).unwrap() {
//!     gate.approve(&mut store, fragment.id, "inspector").unwrap();
//! }
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod review;

pub use config::ReviewConfig;
pub use error::ReviewError;
pub use review::{ReviewGate, ReviewOutcome, ReviewSummary};
