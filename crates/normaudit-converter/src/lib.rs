//! Normaudit Converter
//!
//! Turns reviewed (APPROVED) fragments into canonically identified
//! requirements of the source's auto requirement set.
//!
//! # Architecture
//!
//! ```text
//! APPROVED fragments → batches → oracle → validation → id allocation
//!                                                   → one transaction:
//!                                                     set + requirements + PROCESSED
//! ```
//!
//! Oracle output is untrusted: a batch that names unknown fragments, skips or
//! repeats one, or leaves the vocabulary aborts the run with nothing written.
//!
//! # Example Usage
//!
//! ```no_run
//! use normaudit_converter::{ConverterConfig, RequirementConverter};
//! use normaudit_domain::SourceId;
//! use normaudit_llm::MockProvider;
//! use normaudit_store::SqliteStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = SqliteStore::new("normaudit.db")?;
//! let converter = RequirementConverter::new(MockProvider::default(), ConverterConfig::default())?;
//! let report = converter.convert(&mut store, SourceId::new()).await?;
//! println!("Created {} requirements", report.created.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod classify;
mod config;
mod converter;
mod error;
mod ids;
mod parser;
mod prompt;

#[cfg(test)]
mod tests;

pub use classify::{ClassificationRule, SystemClassifier, GENERAL_SYSTEM};
pub use config::{ConverterConfig, DEFAULT_BATCH_SIZE};
pub use converter::{ConversionPlan, ConversionReport, RequirementConverter};
pub use error::ConversionError;
pub use ids::{max_suffix, IdAllocator};
pub use parser::{parse_conversion_response, RequirementDraft};
pub use prompt::CONVERSION_SYSTEM_PROMPT;
