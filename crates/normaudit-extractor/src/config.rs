//! Configuration for the normalizer and the Extractor

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default chunk size in characters
pub const DEFAULT_CHUNK_SIZE: usize = 80_000;

/// Default overlap between consecutive chunks in characters
pub const DEFAULT_OVERLAP: usize = 2_000;

/// A writing system, used to tell the operative language from the interleaved one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Script {
    /// Basic and extended Latin letters
    Latin,
    /// Cyrillic and Cyrillic supplement
    Cyrillic,
    /// An explicit letter set (e.g. the letters specific to one language)
    Letters(String),
}

impl Script {
    /// Whether `c` is a letter of this script
    pub fn contains(&self, c: char) -> bool {
        match self {
            Script::Latin => {
                c.is_ascii_alphabetic() || (('\u{00C0}'..='\u{024F}').contains(&c) && c.is_alphabetic())
            }
            Script::Cyrillic => ('\u{0400}'..='\u{052F}').contains(&c) && c.is_alphabetic(),
            Script::Letters(letters) => {
                c.is_alphabetic() && letters.to_lowercase().contains(&c.to_lowercase().to_string())
            }
        }
    }

    /// Number of letters of this script in `text`
    pub fn count(&self, text: &str) -> usize {
        text.chars().filter(|&c| self.contains(c)).count()
    }
}

/// Configuration for the TextNormalizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Script of the language the requirements are written in
    pub operative_script: Script,

    /// Script of the interleaved language
    pub secondary_script: Script,

    /// Share of secondary-script letters from which a document counts as bilingual
    pub bilingual_min_share: f64,

    /// Structural markers, highest rank first
    pub markers: Vec<String>,

    /// How much denser one half must be to win the statistical split
    pub density_ratio: f64,

    /// Minimum characters left after normalization
    pub min_chars: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            operative_script: Script::Cyrillic,
            secondary_script: Script::Latin,
            bilingual_min_share: 0.1,
            markers: [
                "GENERAL PROVISIONS",
                "SCOPE",
                "NORMATIVE REFERENCES",
                "ОБЩИЕ ПОЛОЖЕНИЯ",
                "ОБЛАСТЬ ПРИМЕНЕНИЯ",
                "НОРМАТИВНЫЕ ССЫЛКИ",
            ]
            .iter()
            .map(|m| m.to_string())
            .collect(),
            density_ratio: 1.2,
            min_chars: 50,
        }
    }
}

impl NormalizerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.bilingual_min_share) {
            return Err("bilingual_min_share must be within [0.0, 1.0]".to_string());
        }
        if self.density_ratio < 1.0 {
            return Err("density_ratio must be at least 1.0".to_string());
        }
        if self.operative_script == self.secondary_script {
            return Err("operative_script and secondary_script must differ".to_string());
        }
        if self.markers.iter().any(|m| m.trim().is_empty()) {
            return Err("markers must not be blank".to_string());
        }
        Ok(())
    }
}

/// Configuration for the Extractor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Chunk size in characters
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    pub overlap: usize,

    /// Fixed pause between consecutive oracle calls (milliseconds)
    pub inter_call_delay_ms: u64,

    /// Maximum time for a single oracle call (seconds)
    pub extraction_timeout_secs: u64,

    /// Candidates below this confidence are dropped
    pub min_confidence: f64,

    /// Text normalization settings
    pub normalizer: NormalizerConfig,
}

impl ExtractorConfig {
    /// Get the extraction timeout as a Duration
    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }

    /// Get the inter-call delay as a Duration
    pub fn inter_call_delay(&self) -> Duration {
        Duration::from_millis(self.inter_call_delay_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than 0".to_string());
        }
        if self.overlap >= self.chunk_size {
            return Err("overlap must be smaller than chunk_size".to_string());
        }
        if self.extraction_timeout_secs == 0 {
            return Err("extraction_timeout_secs must be greater than 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err("min_confidence must be within [0.0, 1.0]".to_string());
        }
        self.normalizer.validate()
    }
}

impl Default for ExtractorConfig {
    /// Default configuration with balanced settings
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
            inter_call_delay_ms: 1_000,
            extraction_timeout_secs: 300,
            min_confidence: 0.0,
            normalizer: NormalizerConfig::default(),
        }
    }
}

impl ExtractorConfig {
    /// Small-context preset: smaller chunks for models with short input windows
    pub fn aggressive() -> Self {
        Self {
            chunk_size: 20_000,
            overlap: 1_000,
            inter_call_delay_ms: 500,
            extraction_timeout_secs: 120,
            ..Default::default()
        }
    }

    /// Lenient preset: longer timeouts, no throttling, keep only confident candidates
    pub fn lenient() -> Self {
        Self {
            extraction_timeout_secs: 600,
            inter_call_delay_ms: 0,
            min_confidence: 0.3,
            ..Default::default()
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ExtractorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunk_size, 80_000);
        assert_eq!(config.overlap, 2_000);
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(ExtractorConfig::aggressive().validate().is_ok());
        assert!(ExtractorConfig::lenient().validate().is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let mut config = ExtractorConfig::default();
        config.overlap = config.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let mut config = ExtractorConfig::default();
        config.chunk_size = 0;
        config.overlap = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_same_scripts_rejected() {
        let mut config = NormalizerConfig::default();
        config.secondary_script = Script::Cyrillic;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_script_membership() {
        assert!(Script::Latin.contains('a'));
        assert!(Script::Latin.contains('É'));
        assert!(!Script::Latin.contains('ж'));
        assert!(Script::Cyrillic.contains('Ж'));
        assert!(Script::Cyrillic.contains('қ'));
        assert!(!Script::Cyrillic.contains('7'));
        let kazakh = Script::Letters("әғқңөұүһі".to_string());
        assert!(kazakh.contains('Қ'));
        assert!(!kazakh.contains('к'));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = ExtractorConfig::default();
        config.normalizer.secondary_script = Script::Letters("әғқ".to_string());
        let toml_str = config.to_toml().unwrap();
        let parsed = ExtractorConfig::from_toml(&toml_str).unwrap();

        assert_eq!(config.chunk_size, parsed.chunk_size);
        assert_eq!(config.overlap, parsed.overlap);
        assert_eq!(config.normalizer, parsed.normalizer);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed = ExtractorConfig::from_toml("chunk_size = 1000\noverlap = 100\n").unwrap();
        assert_eq!(parsed.chunk_size, 1000);
        assert_eq!(parsed.extraction_timeout_secs, 300);
        assert_eq!(parsed.normalizer.min_chars, 50);
    }
}
