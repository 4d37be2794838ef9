//! Store configuration

use crate::StoreError;
use serde::{Deserialize, Serialize};

/// Default database file name
pub const DEFAULT_DATABASE: &str = "normaudit.db";

/// Default number of fragments written per transaction
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Configuration for [`crate::SqliteStore`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database path, or `:memory:`
    pub path: String,

    /// Fragments per insert transaction (1..=100)
    pub batch_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_DATABASE.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl StoreConfig {
    /// In-memory database with default batching
    pub fn in_memory() -> Self {
        Self {
            path: ":memory:".to_string(),
            ..Default::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.path.trim().is_empty() {
            return Err(StoreError::InvalidData("database path is empty".to_string()));
        }
        if self.batch_size == 0 || self.batch_size > DEFAULT_BATCH_SIZE {
            return Err(StoreError::InvalidData(format!(
                "batch_size must be between 1 and {}, got {}",
                DEFAULT_BATCH_SIZE, self.batch_size
            )));
        }
        Ok(())
    }

    /// Load configuration from TOML
    pub fn from_toml(toml_str: &str) -> Result<Self, StoreError> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| StoreError::InvalidData(format!("invalid store config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> Result<String, StoreError> {
        toml::to_string_pretty(self)
            .map_err(|e| StoreError::InvalidData(format!("cannot serialize store config: {}", e)))
    }
}
