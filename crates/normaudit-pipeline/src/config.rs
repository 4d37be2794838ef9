//! Configuration for pipeline runs
//!
//! Bundles the stage configurations and the per-run overrides.

use normaudit_converter::ConverterConfig;
use normaudit_extractor::ExtractorConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the Pipeline
///
/// # Examples
///
/// ```
/// use normaudit_pipeline::PipelineConfig;
///
/// let config = PipelineConfig::from_toml(r#"
/// [extractor]
/// chunk_size = 20000
/// overlap = 500
///
/// [converter]
/// batch_size = 10
/// "#).unwrap();
/// assert_eq!(config.extractor.chunk_size, 20_000);
/// assert_eq!(config.converter.batch_size, 10);
/// assert_eq!(config.poll_interval_ms, 500);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// How often a watcher polls the run record (milliseconds)
    pub poll_interval_ms: u64,

    /// Extraction settings
    pub extractor: ExtractorConfig,

    /// Conversion settings
    pub converter: ConverterConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            extractor: ExtractorConfig::default(),
            converter: ConverterConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Get the poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        self.extractor.validate()?;
        self.converter.validate()?;
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be greater than 0".to_string());
        }
        Ok(())
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

/// Per-run overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Chunk size for this extraction
    pub chunk_size: Option<usize>,

    /// Chunk overlap for this extraction
    pub overlap: Option<usize>,

    /// Report without writing fragments or requirements
    pub dry_run: bool,

    /// Attachment to extract from (latest attachment when None)
    pub file_id: Option<i64>,
}

impl PipelineOptions {
    /// Options for a dry run
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Default::default()
        }
    }

    /// Extractor configuration with the overrides applied
    pub fn extractor_config(&self, base: &ExtractorConfig) -> Result<ExtractorConfig, String> {
        let config = ExtractorConfig {
            chunk_size: self.chunk_size.unwrap_or(base.chunk_size),
            overlap: self.overlap.unwrap_or(base.overlap),
            ..base.clone()
        };
        config.validate()?;
        Ok(config)
    }

    /// Converter configuration with the overrides applied
    pub fn converter_config(&self, base: &ConverterConfig) -> ConverterConfig {
        ConverterConfig {
            dry_run: base.dry_run || self.dry_run,
            ..base.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = PipelineConfig::default();
        let back = PipelineConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(back.extractor.chunk_size, config.extractor.chunk_size);
        assert_eq!(back.converter, config.converter);
        assert_eq!(back.poll_interval_ms, 500);
    }

    #[test]
    fn test_overrides_applied() {
        let options = PipelineOptions {
            chunk_size: Some(1_000),
            overlap: Some(100),
            ..Default::default()
        };
        let config = options.extractor_config(&ExtractorConfig::default()).unwrap();
        assert_eq!(config.chunk_size, 1_000);
        assert_eq!(config.overlap, 100);
    }

    #[test]
    fn test_bad_override_rejected() {
        // Default overlap is larger than this chunk size
        let options = PipelineOptions {
            chunk_size: Some(1_000),
            ..Default::default()
        };
        assert!(options.extractor_config(&ExtractorConfig::default()).is_err());
    }

    #[test]
    fn test_dry_run_reaches_converter() {
        let config = PipelineOptions::dry_run().converter_config(&ConverterConfig::default());
        assert!(config.dry_run);
    }
}
