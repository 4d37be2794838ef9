//! TextNormalizer - bytes of an attached file to operative-language text
//!
//! Regulatory documents in the target jurisdictions are often published
//! bilingually, with a translation interleaved or prepended. Isolation is a
//! heuristic, not a parser: every step falls back to keeping more text.

use crate::config::{NormalizerConfig, Script};
use crate::error::IngestionError;
use crate::text::whitespace_tolerant_pattern;
use regex::{Regex, RegexBuilder};
use tracing::{debug, info};

/// Which half survived the statistical split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Half {
    /// Text before the midpoint
    First,
    /// Text from the midpoint on
    Second,
}

/// How the operative-language text was isolated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IsolationStrategy {
    /// Not bilingual, full text kept
    Monolingual,
    /// Cut before the earliest structural marker
    Marker(String),
    /// Kept the half with the denser operative script
    DensitySplit(Half),
    /// Bilingual, but nothing decisive: full text kept
    Inconclusive,
}

impl std::fmt::Display for IsolationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IsolationStrategy::Monolingual => f.write_str("monolingual"),
            IsolationStrategy::Marker(marker) => write!(f, "marker '{}'", marker),
            IsolationStrategy::DensitySplit(Half::First) => f.write_str("density split (first half)"),
            IsolationStrategy::DensitySplit(Half::Second) => f.write_str("density split (second half)"),
            IsolationStrategy::Inconclusive => f.write_str("inconclusive, full text"),
        }
    }
}

/// Normalized, operative-language text of one document
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedText {
    /// Text handed to the chunker
    pub text: String,
    /// Isolation step that produced `text`
    pub strategy: IsolationStrategy,
    /// Characters extracted before isolation
    pub original_chars: usize,
}

/// Extracts and cleans the text of source documents
pub struct TextNormalizer {
    config: NormalizerConfig,
    markers: Vec<(String, Regex)>,
    inline_space: Regex,
    padded_newline: Regex,
    blank_lines: Regex,
}

fn pattern(src: &str) -> Result<Regex, IngestionError> {
    Regex::new(src).map_err(|e| IngestionError::Config(e.to_string()))
}

impl TextNormalizer {
    /// Create a normalizer
    ///
    /// Only markers written in the operative script are kept: a marker of the
    /// other language would point at the wrong half.
    pub fn new(config: NormalizerConfig) -> Result<Self, IngestionError> {
        config.validate().map_err(IngestionError::Config)?;

        let mut markers = Vec::new();
        for marker in &config.markers {
            let letters = marker.chars().filter(|c| c.is_alphabetic()).count();
            if letters == 0 || config.operative_script.count(marker) * 2 < letters {
                continue;
            }
            let Some(src) = whitespace_tolerant_pattern(marker) else {
                continue;
            };
            let re = RegexBuilder::new(&src)
                .case_insensitive(true)
                .build()
                .map_err(|e| IngestionError::Config(e.to_string()))?;
            markers.push((marker.clone(), re));
        }

        Ok(Self {
            config,
            markers,
            inline_space: pattern(r"[ \t\u{00A0}\u{2007}\u{202F}]+")?,
            padded_newline: pattern(r" ?\n ?")?,
            blank_lines: pattern(r"\n{3,}")?,
        })
    }

    /// Normalizer with default settings
    pub fn default_config() -> Result<Self, IngestionError> {
        Self::new(NormalizerConfig::default())
    }

    /// Run the full normalization on the bytes of one file
    pub fn normalize(&self, bytes: &[u8]) -> Result<NormalizedText, IngestionError> {
        let raw = extract_raw_text(bytes)?;
        self.normalize_text(&raw)
    }

    /// Normalize already extracted text
    pub fn normalize_text(&self, raw: &str) -> Result<NormalizedText, IngestionError> {
        let cleaned = self.normalize_whitespace(raw);
        let original_chars = cleaned.chars().count();

        let (text, strategy) = self.isolate(&cleaned);
        let text = text.trim().to_string();
        let chars = text.chars().count();

        info!(original_chars, chars, ?strategy, "Normalized document text");

        if chars < self.config.min_chars {
            return Err(IngestionError::EmptyDocument {
                chars,
                min: self.config.min_chars,
            });
        }

        Ok(NormalizedText {
            text,
            strategy,
            original_chars,
        })
    }

    /// CRLF to LF, collapse inline whitespace, at most one blank line in a row
    pub fn normalize_whitespace(&self, text: &str) -> String {
        let text = text.replace("\r\n", "\n").replace('\r', "\n").replace('\u{000C}', "\n");
        let text = self.inline_space.replace_all(&text, " ");
        let text = self.padded_newline.replace_all(&text, "\n");
        self.blank_lines.replace_all(&text, "\n\n").into_owned()
    }

    /// Whether the secondary script makes up enough of the letters
    pub fn is_bilingual(&self, text: &str) -> bool {
        let operative = self.config.operative_script.count(text);
        let secondary = self.config.secondary_script.count(text);
        if operative == 0 || secondary == 0 {
            return false;
        }
        secondary as f64 / (operative + secondary) as f64 >= self.config.bilingual_min_share
    }

    fn isolate<'a>(&self, text: &'a str) -> (&'a str, IsolationStrategy) {
        if !self.is_bilingual(text) {
            return (text, IsolationStrategy::Monolingual);
        }

        // Earliest position wins; on a tie the higher ranked marker wins
        let earliest = self
            .markers
            .iter()
            .filter_map(|(name, re)| re.find(text).map(|m| (m.start(), name)))
            .min_by_key(|(pos, _)| *pos);

        if let Some((pos, name)) = earliest {
            debug!(marker = %name, pos, "Cutting before structural marker");
            return (&text[pos..], IsolationStrategy::Marker(name.clone()));
        }

        match self.denser_half(text) {
            Some((Half::First, mid)) => (&text[..mid], IsolationStrategy::DensitySplit(Half::First)),
            Some((Half::Second, mid)) => (&text[mid..], IsolationStrategy::DensitySplit(Half::Second)),
            None => (text, IsolationStrategy::Inconclusive),
        }
    }

    /// Pick the half with significantly denser operative script
    fn denser_half(&self, text: &str) -> Option<(Half, usize)> {
        let total_chars = text.chars().count();
        let mid = crate::text::byte_offset_of_char(text, total_chars / 2);
        let (first, second) = text.split_at(mid);

        let d1 = density(&self.config.operative_script, first);
        let d2 = density(&self.config.operative_script, second);
        debug!(first = d1, second = d2, "Operative script density per half");

        let ratio = self.config.density_ratio;
        if d1 > 0.0 && d1 >= ratio * d2 {
            Some((Half::First, mid))
        } else if d2 > 0.0 && d2 >= ratio * d1 {
            Some((Half::Second, mid))
        } else {
            None
        }
    }
}

/// Operative letters per non-whitespace character
fn density(script: &Script, text: &str) -> f64 {
    let visible = text.chars().filter(|c| !c.is_whitespace()).count();
    if visible == 0 {
        return 0.0;
    }
    script.count(text) as f64 / visible as f64
}

/// Byte-level text extraction
///
/// `%PDF` files go through the PDF text layer; anything else must be text.
pub fn extract_raw_text(bytes: &[u8]) -> Result<String, IngestionError> {
    if bytes.starts_with(b"%PDF") {
        // The PDF decoder panics on some malformed inputs
        return match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(IngestionError::Unreadable(format!("PDF extraction failed: {}", e))),
            Err(_) => Err(IngestionError::Unreadable("PDF decoder crashed".to_string())),
        };
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.trim_start_matches('\u{FEFF}').to_string()),
        Err(_) => {
            let lossy = String::from_utf8_lossy(bytes);
            if lossy.chars().any(|c| c.is_alphabetic()) {
                Ok(lossy.into_owned())
            } else {
                Err(IngestionError::Unreadable("not a PDF and not text".to_string()))
            }
        }
    }
}
