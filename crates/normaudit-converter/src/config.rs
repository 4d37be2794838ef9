//! Configuration for the Converter

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of fragments sent to the oracle at once
pub const DEFAULT_BATCH_SIZE: usize = 40;

/// Configuration for the RequirementConverter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Fragments per oracle call
    pub batch_size: usize,

    /// Fixed pause between consecutive oracle calls (milliseconds)
    pub inter_call_delay_ms: u64,

    /// Maximum time for a single oracle call (seconds)
    pub conversion_timeout_secs: u64,

    /// Build the report without writing anything
    pub dry_run: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            inter_call_delay_ms: 1_000,
            conversion_timeout_secs: 300,
            dry_run: false,
        }
    }
}

impl ConverterConfig {
    /// Get the conversion timeout as a Duration
    pub fn conversion_timeout(&self) -> Duration {
        Duration::from_secs(self.conversion_timeout_secs)
    }

    /// Get the inter-call delay as a Duration
    pub fn inter_call_delay(&self) -> Duration {
        Duration::from_millis(self.inter_call_delay_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("batch_size must be greater than 0".to_string());
        }
        if self.conversion_timeout_secs == 0 {
            return Err("conversion_timeout_secs must be greater than 0".to_string());
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConverterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch_size, 40);
        assert!(!config.dry_run);
    }

    #[test]
    fn test_zero_batch_rejected() {
        let config = ConverterConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = ConverterConfig::from_toml("batch_size = 10\ndry_run = true").unwrap();
        assert_eq!(config.batch_size, 10);
        assert!(config.dry_run);
        assert_eq!(config.conversion_timeout_secs, 300);

        let back = ConverterConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(back, config);
    }
}
