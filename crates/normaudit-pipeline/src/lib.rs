//! Normaudit Pipeline
//!
//! Runs the extraction and conversion stages of a source document, one at a
//! time per source, and records every run.
//!
//! # Overview
//!
//! - **Extraction**: attachment bytes → normalized text → PENDING fragments.
//!   PENDING fragments of an earlier extraction are replaced; reviewed ones
//!   stay and numbering continues after them.
//! - **Conversion**: APPROVED fragments → requirements, all or nothing.
//! - **Runs**: `queued → running → succeeded | failed | cancelled`, with chunk or
//!   batch counters, persisted in the store and polled by callers.
//!
//! # Usage
//!
//! ## Foreground
//!
//! ```no_run
//! use normaudit_pipeline::{Pipeline, PipelineConfig, PipelineOptions};
//! use normaudit_store::SqliteStore;
//! use normaudit_llm::MockProvider;
//! use normaudit_domain::SourceId;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteStore::new("normaudit.db")?;
//! let pipeline = Pipeline::new(store, MockProvider::default(), PipelineConfig::default())?;
//!
//! let outcome = pipeline.run_extraction(SourceId::new(), PipelineOptions::dry_run()).await;
//! println!("{}", outcome.summary());
//! # Ok(())
//! # }
//! ```
//!
//! ## Background
//!
//! `spawn_extraction` / `spawn_conversion` return a [`normaudit_domain::RunId`]
//! at once; [`RunWatcher`] polls it and turns Ctrl+C into a cancellation.
//!
//! # Configuration
//!
//! ```toml
//! poll_interval_ms = 500
//!
//! [extractor]
//! chunk_size = 80000
//! overlap = 2000
//! inter_call_delay_ms = 1000
//!
//! [converter]
//! batch_size = 40
//! dry_run = false
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod locks;
mod outcome;
mod pipeline;
mod worker;

pub use config::{PipelineConfig, PipelineOptions};
pub use error::PipelineError;
pub use locks::{SourceGuard, SourceLocks};
pub use outcome::PipelineOutcome;
pub use pipeline::Pipeline;
pub use worker::RunWatcher;
