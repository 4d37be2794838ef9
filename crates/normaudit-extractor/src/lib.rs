//! Normaudit Extractor
//!
//! Turns the bytes of a regulatory document into verbatim candidate fragments.
//!
//! # Architecture
//!
//! ```text
//! bytes → TextNormalizer → TextChunker → FragmentExtractor → oracle (per chunk)
//!                                                          → RawFragment (PENDING)
//! ```
//!
//! # Key Features
//!
//! - **Bilingual isolation**: structural markers first, script density second,
//!   full text when neither is decisive
//! - **Bounded windows**: fixed-size chunks with overlap, counted in characters
//! - **Verbatim guarantee**: every fragment's text is a literal substring of its
//!   chunk; paraphrases are dropped
//! - **Failure isolation**: a failing chunk is logged and skipped
//!
//! # Example Usage
//!
//! ```no_run
//! use normaudit_extractor::{ExtractionRequest, ExtractorConfig, FragmentExtractor, TextNormalizer};
//! use normaudit_domain::SourceId;
//! use normaudit_llm::MockProvider;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let normalizer = TextNormalizer::default_config()?;
//! let normalized = normalizer.normalize(b"4.1 Fire detectors must be installed in every room of the building.")?;
//!
//! let extractor = FragmentExtractor::new(MockProvider::new("[]"), ExtractorConfig::default())?;
//! let report = extractor
//!     .extract(ExtractionRequest::new(SourceId::new(), normalized.text))
//!     .await?;
//!
//! println!("Fragments: {}", report.fragments.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod chunking;
mod config;
mod error;
mod extractor;
mod normalizer;
mod parser;
mod prompt;
mod text;
mod types;

#[cfg(test)]
mod tests;

pub use chunking::{Chunk, TextChunker};
pub use config::{ExtractorConfig, NormalizerConfig, Script, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
pub use error::{ExtractorError, IngestionError};
pub use extractor::FragmentExtractor;
pub use normalizer::{extract_raw_text, Half, IsolationStrategy, NormalizedText, TextNormalizer};
pub use parser::{parse_json_items, parse_llm_response, ParsedResponse};
pub use prompt::EXTRACTION_SYSTEM_PROMPT;
pub use types::{
    CancelFlag, ChunkFailure, ExtractionMetadata, ExtractionReport, ExtractionRequest,
    FragmentCandidate, ProgressFn,
};
