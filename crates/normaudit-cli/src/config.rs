//! Configuration management for the CLI.
//!
//! Loaded from `~/.normaudit/config.toml` unless `--config` points elsewhere.
//! Every section is optional; missing keys take their defaults.
//!
//! ```toml
//! [database]
//! path = "/var/lib/normaudit/normaudit.db"
//!
//! [llm]
//! endpoint = "http://localhost:11434"
//! model = "qwen2.5:14b"
//!
//! [extractor]
//! chunk_size = 20000
//!
//! [settings]
//! format = "json"
//! ```

use crate::error::{CliError, Result};
use normaudit_converter::ConverterConfig;
use normaudit_extractor::ExtractorConfig;
use normaudit_pipeline::PipelineConfig;
use normaudit_store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory under the home directory holding config, database and history.
pub const CONFIG_DIR: &str = ".normaudit";

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// SQLite store
    #[serde(default)]
    pub database: StoreConfig,

    /// Oracle endpoint
    #[serde(default)]
    pub llm: LlmSettings,

    /// Extraction defaults
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Conversion defaults
    #[serde(default)]
    pub converter: ConverterConfig,

    /// Global settings
    #[serde(default)]
    pub settings: Settings,
}

/// Oracle connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Ollama API endpoint
    pub endpoint: String,

    /// Model name
    pub model: String,

    /// Attempts per oracle call
    pub max_retries: u32,

    /// HTTP timeout of one request (seconds)
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: normaudit_llm::ollama::DEFAULT_ENDPOINT.to_string(),
            model: "qwen2.5:14b".to_string(),
            max_retries: normaudit_llm::ollama::DEFAULT_MAX_RETRIES,
            timeout_secs: normaudit_llm::ollama::DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Global CLI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,

    /// Name recorded on review decisions
    #[serde(default = "default_reviewer")]
    pub reviewer: String,

    /// Review session history size
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
    /// Quiet (identifiers only) format
    Quiet,
}

impl Config {
    /// Directory holding the default config, database and history.
    pub fn dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
        Ok(home.join(CONFIG_DIR))
    }

    /// Get the default configuration file path.
    pub fn path() -> Result<PathBuf> {
        Ok(Self::dir()?.join("config.toml"))
    }

    /// Load configuration from `path` (the default path when None).
    ///
    /// A relative database path is placed next to the configuration file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::path()?,
        };
        let mut config = Self::load_from(&path)?;
        let db = PathBuf::from(&config.database.path);
        if db.is_relative() && config.database.path != ":memory:" {
            if let Some(dir) = path.parent() {
                config.database.path = dir.join(&db).to_string_lossy().into_owned();
            }
        }
        Ok(config)
    }

    /// Load configuration from `path`, or defaults when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    /// Save configuration to `path`, creating its directory.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        self.database
            .validate()
            .map_err(|e| CliError::Config(e.to_string()))?;
        self.extractor.validate().map_err(CliError::Config)?;
        self.converter.validate().map_err(CliError::Config)?;
        if self.llm.endpoint.trim().is_empty() {
            return Err(CliError::Config("llm.endpoint is empty".into()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(CliError::Config("llm.model is empty".into()));
        }
        if self.settings.reviewer.trim().is_empty() {
            return Err(CliError::Config("settings.reviewer is empty".into()));
        }
        Ok(())
    }

    /// Pipeline configuration built from the stage sections.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            extractor: self.extractor.clone(),
            converter: self.converter.clone(),
            ..Default::default()
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Table,
            reviewer: default_reviewer(),
            history_size: default_history_size(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Table
}

fn default_reviewer() -> String {
    std::env::var("USER")
        .ok()
        .filter(|user| !user.trim().is_empty())
        .unwrap_or_else(|| "reviewer".to_string())
}

fn default_history_size() -> usize {
    1000
}
