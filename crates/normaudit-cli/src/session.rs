//! Everything a command needs: the pipeline, the review gate, and output settings.

use crate::config::Config;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use normaudit_domain::traits::LlmProvider;
use normaudit_gatekeeper::ReviewGate;
use normaudit_llm::{LlmError, OllamaProvider};
use normaudit_pipeline::Pipeline;
use normaudit_store::SqliteStore;
use std::time::Duration;

/// Oracle usable by the CLI
pub trait Oracle: LlmProvider<Error = LlmError> + Send + Sync + 'static {}

impl<T> Oracle for T where T: LlmProvider<Error = LlmError> + Send + Sync + 'static {}

/// Command context
pub struct Session<L: Oracle> {
    pipeline: Pipeline<SqliteStore, L>,
    gate: ReviewGate,
    formatter: Formatter,
    reviewer: String,
}

impl Session<OllamaProvider> {
    /// Open the configured store and oracle
    pub fn open(config: &Config, formatter: Formatter, reviewer: String) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let store = SqliteStore::with_config(&config.database)?;
        let llm = OllamaProvider::new(&config.llm.endpoint, &config.llm.model)
            .with_max_retries(config.llm.max_retries)
            .with_timeout(Duration::from_secs(config.llm.timeout_secs));
        Self::new(store, llm, config, formatter, reviewer)
    }
}

impl<L: Oracle> Session<L> {
    /// Build a session around an open store and oracle
    pub fn new(
        store: SqliteStore,
        llm: L,
        config: &Config,
        formatter: Formatter,
        reviewer: String,
    ) -> Result<Self> {
        if reviewer.trim().is_empty() {
            return Err(CliError::InvalidInput("reviewer name is empty".to_string()));
        }
        let pipeline = Pipeline::new(store, llm, config.pipeline_config())?;
        Ok(Self {
            pipeline,
            gate: ReviewGate::default_config(),
            formatter,
            reviewer: reviewer.trim().to_string(),
        })
    }

    /// The pipeline
    pub fn pipeline(&self) -> &Pipeline<SqliteStore, L> {
        &self.pipeline
    }

    /// The review gate
    pub fn gate(&self) -> &ReviewGate {
        &self.gate
    }

    /// The output formatter
    pub fn formatter(&self) -> &Formatter {
        &self.formatter
    }

    /// Name recorded on review decisions
    pub fn reviewer(&self) -> &str {
        &self.reviewer
    }

    /// Run `f` with exclusive access to the store
    ///
    /// The guard is released when `f` returns; do not await inside `f`.
    pub fn with_store<T>(&self, f: impl FnOnce(&mut SqliteStore) -> Result<T>) -> Result<T> {
        let store = self.pipeline.store();
        let mut guard = store
            .lock()
            .map_err(|_| CliError::Config("store lock poisoned".to_string()))?;
        f(&mut guard)
    }
}
