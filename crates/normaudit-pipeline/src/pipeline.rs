//! Core Pipeline implementation: extraction and conversion runs

use crate::config::{PipelineConfig, PipelineOptions};
use crate::error::PipelineError;
use crate::locks::SourceLocks;
use crate::outcome::PipelineOutcome;
use normaudit_converter::RequirementConverter;
use normaudit_domain::traits::{FragmentStore, LlmProvider, RequirementStore, RunStore, SourceStore};
use normaudit_domain::{
    PipelineRun, RunId, RunKind, RunStatus, SourceFile, SourceId, SourceStatus,
};
use normaudit_extractor::{CancelFlag, ExtractionRequest, FragmentExtractor, ProgressFn, TextNormalizer};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Drives extraction and conversion runs over a shared store
///
/// Every run is recorded in the run table. Runs of the same source are
/// serialized through [`SourceLocks`]; the store itself is only locked for the
/// short synchronous steps, never while the oracle is working.
///
/// # Examples
///
/// ```no_run
/// use normaudit_pipeline::{Pipeline, PipelineConfig, PipelineOptions};
/// use normaudit_store::SqliteStore;
/// use normaudit_llm::OllamaProvider;
/// use normaudit_domain::SourceId;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = SqliteStore::new("normaudit.db")?;
/// let llm = OllamaProvider::default_endpoint("qwen2.5:14b");
/// let pipeline = Pipeline::new(store, llm, PipelineConfig::default())?;
///
/// let run_id = pipeline.spawn_extraction(SourceId::new(), PipelineOptions::default())?;
/// println!("{:?}", pipeline.run_status(run_id)?.status);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<S, L>
where
    L: LlmProvider,
{
    store: Arc<Mutex<S>>,
    llm_provider: Arc<L>,
    config: PipelineConfig,
    locks: SourceLocks,
    cancels: Arc<Mutex<HashMap<RunId, CancelFlag>>>,
}

impl<S, L> Clone for Pipeline<S, L>
where
    L: LlmProvider,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            llm_provider: Arc::clone(&self.llm_provider),
            config: self.config.clone(),
            locks: self.locks.clone(),
            cancels: Arc::clone(&self.cancels),
        }
    }
}

impl<S, L> Pipeline<S, L>
where
    S: SourceStore + FragmentStore + RequirementStore + RunStore + Send + 'static,
    S::Error: Display,
    L: LlmProvider + Send + Sync + 'static,
    L::Error: Display,
{
    /// Create a pipeline owning its store and provider
    pub fn new(store: S, llm_provider: L, config: PipelineConfig) -> Result<Self, PipelineError> {
        Self::with_shared(Arc::new(Mutex::new(store)), Arc::new(llm_provider), config)
    }

    /// Create a pipeline over a shared store and provider
    pub fn with_shared(
        store: Arc<Mutex<S>>,
        llm_provider: Arc<L>,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        config.validate().map_err(PipelineError::Config)?;
        Ok(Self {
            store,
            llm_provider,
            config,
            locks: SourceLocks::new(),
            cancels: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// The shared store
    pub fn store(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.store)
    }

    /// Configuration in use
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Per-source locks
    pub fn locks(&self) -> &SourceLocks {
        &self.locks
    }

    /// Extract fragments of a source and wait for the result
    pub async fn run_extraction(&self, source_id: SourceId, options: PipelineOptions) -> PipelineOutcome {
        self.run_foreground(source_id, RunKind::Extraction, options).await
    }

    /// Convert the approved fragments of a source and wait for the result
    pub async fn run_conversion(&self, source_id: SourceId, options: PipelineOptions) -> PipelineOutcome {
        self.run_foreground(source_id, RunKind::Conversion, options).await
    }

    /// Queue an extraction on a background task
    ///
    /// Returns as soon as the run is recorded; poll [`Pipeline::run_status`].
    pub fn spawn_extraction(&self, source_id: SourceId, options: PipelineOptions) -> Result<RunId, PipelineError> {
        self.spawn(source_id, RunKind::Extraction, options)
    }

    /// Queue a conversion on a background task
    pub fn spawn_conversion(&self, source_id: SourceId, options: PipelineOptions) -> Result<RunId, PipelineError> {
        self.spawn(source_id, RunKind::Conversion, options)
    }

    /// Ask a running run to stop before its next chunk or batch
    ///
    /// Returns false when the run is not active in this process.
    pub fn cancel(&self, run_id: RunId) -> bool {
        match self.cancels_lock().get(&run_id) {
            Some(flag) => {
                info!("Cancellation requested for run {}", run_id);
                flag.cancel();
                true
            }
            None => false,
        }
    }

    /// Current record of a run
    pub fn run_status(&self, run_id: RunId) -> Result<PipelineRun, PipelineError> {
        self.with_store(|s| s.get_run(run_id))?
            .ok_or(PipelineError::RunNotFound(run_id))
    }

    /// Runs of a source, newest first
    pub fn runs(&self, source_id: SourceId) -> Result<Vec<PipelineRun>, PipelineError> {
        self.with_store(|s| s.list_runs(source_id))
    }

    fn spawn(&self, source_id: SourceId, kind: RunKind, options: PipelineOptions) -> Result<RunId, PipelineError> {
        let (run_id, cancel) = self.queue(source_id, kind)?;
        let pipeline = self.clone();
        tokio::spawn(async move {
            let outcome = pipeline.execute(run_id, source_id, kind, options, cancel).await;
            debug!("Background run {} finished:\n{}", run_id, outcome.summary());
        });
        Ok(run_id)
    }

    async fn run_foreground(&self, source_id: SourceId, kind: RunKind, options: PipelineOptions) -> PipelineOutcome {
        match self.queue(source_id, kind) {
            Ok((run_id, cancel)) => self.execute(run_id, source_id, kind, options, cancel).await,
            Err(e) => PipelineOutcome::new(kind.as_str(), source_id).failed(e),
        }
    }

    fn queue(&self, source_id: SourceId, kind: RunKind) -> Result<(RunId, CancelFlag), PipelineError> {
        let run = PipelineRun::queued(source_id, kind);
        self.with_store(|s| s.create_run(&run))?;
        let cancel = CancelFlag::new();
        self.cancels_lock().insert(run.id, cancel.clone());
        debug!("Queued {} run {} for source {}", kind.as_str(), run.id, source_id);
        Ok((run.id, cancel))
    }

    /// Run a queued run to completion and record how it ended
    async fn execute(
        &self,
        run_id: RunId,
        source_id: SourceId,
        kind: RunKind,
        options: PipelineOptions,
        cancel: CancelFlag,
    ) -> PipelineOutcome {
        self.touch_run(run_id, |run| run.status = RunStatus::Running);

        let result = match kind {
            RunKind::Extraction => self.extract(source_id, &options, run_id, cancel).await,
            RunKind::Conversion => self.convert(source_id, &options, run_id, cancel).await,
        };
        self.cancels_lock().remove(&run_id);

        let mut outcome = match result {
            Ok(outcome) => {
                let written = match kind {
                    RunKind::Extraction => outcome.fragments_written,
                    RunKind::Conversion if outcome.dry_run => 0,
                    RunKind::Conversion => outcome.requirement_ids.len(),
                };
                self.touch_run(run_id, |run| {
                    run.status = RunStatus::Succeeded;
                    run.items_written = written;
                });
                outcome
            }
            Err(e) => {
                let status = if e.is_cancelled() {
                    info!("Run {} cancelled: {}", run_id, e);
                    RunStatus::Cancelled
                } else {
                    error!("Run {} ({} of {}) failed: {}", run_id, kind.as_str(), source_id, e);
                    RunStatus::Failed
                };
                let message = e.to_string();
                self.touch_run(run_id, |run| {
                    run.status = status;
                    run.error = Some(message.clone());
                });
                PipelineOutcome::new(kind.as_str(), source_id).failed(e)
            }
        };
        outcome.run_id = Some(run_id.to_string());
        outcome
    }

    async fn extract(
        &self,
        source_id: SourceId,
        options: &PipelineOptions,
        run_id: RunId,
        cancel: CancelFlag,
    ) -> Result<PipelineOutcome, PipelineError> {
        let started = Instant::now();
        let extractor_config = options
            .extractor_config(&self.config.extractor)
            .map_err(PipelineError::Config)?;

        let _guard = self.locks.acquire(source_id).await;
        info!("Extraction of {} started", source_id);

        let (source, files) = self.with_store(|s| Ok((s.get_source(source_id)?, s.list_files(source_id)?)))?;
        let source = source.ok_or(PipelineError::SourceNotFound(source_id))?;
        let file = select_file(files, source_id, options.file_id)?;
        debug!("Extracting from {} ({} bytes)", file.filename, file.content.len());

        if !options.dry_run {
            self.with_store(|s| s.set_source_status(source_id, SourceStatus::Extracting))?;
        }

        let result = self
            .extract_file(source_id, file, extractor_config, options.dry_run, run_id, cancel, started)
            .await;

        if !options.dry_run {
            let status = match &result {
                Ok(_) => SourceStatus::Extracted,
                Err(e) if e.is_cancelled() => source.status,
                Err(_) => SourceStatus::Failed,
            };
            if let Err(e) = self.with_store(|s| s.set_source_status(source_id, status)) {
                warn!("Could not record status of source {}: {}", source_id, e);
            }
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn extract_file(
        &self,
        source_id: SourceId,
        file: SourceFile,
        extractor_config: normaudit_extractor::ExtractorConfig,
        dry_run: bool,
        run_id: RunId,
        cancel: CancelFlag,
        started: Instant,
    ) -> Result<PipelineOutcome, PipelineError> {
        let normalizer = TextNormalizer::new(extractor_config.normalizer.clone())?;
        let normalized = tokio::task::spawn_blocking(move || normalizer.normalize(&file.content))
            .await
            .map_err(|e| PipelineError::Worker(format!("Task join error: {}", e)))??;
        info!(
            "Normalized {} chars to {} ({})",
            normalized.original_chars,
            normalized.text.chars().count(),
            normalized.strategy
        );

        let replaced = if dry_run {
            0
        } else {
            self.with_store(|s| s.delete_pending_by_source(source_id))?
        };
        let first_seq = self.with_store(|s| s.max_fragment_seq(source_id))? + 1;

        let mut request = ExtractionRequest::new(source_id, normalized.text);
        request.first_seq = first_seq;
        request.cancel = cancel;
        request.progress = Some(self.progress_for(run_id));

        let extractor = FragmentExtractor::with_shared(Arc::clone(&self.llm_provider), extractor_config)?;
        let report = extractor.extract(request).await?;

        let written = if dry_run {
            0
        } else {
            self.with_store(|s| s.upsert_batch(&report.fragments))?
        };

        info!(
            "Extraction of {} finished: {} fragments found, {} written, {} pending replaced",
            source_id,
            report.fragments.len(),
            written,
            replaced
        );

        let mut outcome = PipelineOutcome::new(RunKind::Extraction.as_str(), source_id);
        outcome.success = true;
        outcome.dry_run = dry_run;
        outcome.chunk_count = report.chunk_count;
        outcome.chunk_failures = report.chunk_failures.len();
        outcome.isolation = Some(normalized.strategy.to_string());
        outcome.fragments_found = report.fragments.len();
        outcome.fragments_written = written;
        outcome.fragments_replaced = replaced;
        if dry_run {
            outcome.preview = report
                .fragments
                .iter()
                .map(|f| format!("{} {}", f.source_clause.as_deref().unwrap_or("-"), f.raw_text))
                .collect();
        }
        outcome.processing_time_ms = started.elapsed().as_millis() as u64;
        Ok(outcome)
    }

    async fn convert(
        &self,
        source_id: SourceId,
        options: &PipelineOptions,
        run_id: RunId,
        cancel: CancelFlag,
    ) -> Result<PipelineOutcome, PipelineError> {
        let started = Instant::now();
        let converter = RequirementConverter::with_shared(
            Arc::clone(&self.llm_provider),
            options.converter_config(&self.config.converter),
        )?;

        let _guard = self.locks.acquire(source_id).await;
        info!("Conversion of {} started", source_id);

        let plan = {
            let store = self.lock_store()?;
            converter.plan(&*store, source_id)?
        };
        let total = plan.batch_count(converter.config().batch_size);
        self.touch_run(run_id, |run| run.units_total = total);

        let progress = self.progress_for(run_id);
        let drafts = converter.draft(&plan, &cancel, Some(&progress)).await?;

        let report = {
            let mut store = self.lock_store()?;
            converter.commit(&mut *store, plan, drafts)?
        };
        if !report.dry_run {
            self.with_store(|s| s.set_source_status(source_id, SourceStatus::Converted))?;
        }

        let mut outcome = PipelineOutcome::new(RunKind::Conversion.as_str(), source_id);
        outcome.success = true;
        outcome.dry_run = report.dry_run;
        outcome.requirement_set = Some(report.requirement_set.code.clone());
        outcome.system_id = Some(report.system_id.clone());
        outcome.requirement_ids = report.created.iter().map(|r| r.requirement_id.clone()).collect();
        if report.dry_run {
            outcome.preview = report
                .created
                .iter()
                .map(|r| format!("{} [{}] {}", r.requirement_id, r.severity_hint.as_str(), r.text_short))
                .collect();
        }
        outcome.processing_time_ms = started.elapsed().as_millis() as u64;
        Ok(outcome)
    }

    /// Progress callback writing chunk or batch counters into the run record
    fn progress_for(&self, run_id: RunId) -> ProgressFn {
        let store = Arc::clone(&self.store);
        Arc::new(move |done, total| {
            let mut store = store.lock().unwrap_or_else(|e| e.into_inner());
            if let Err(e) = update_run(&mut *store, run_id, |run| {
                run.units_done = done;
                run.units_total = total;
            }) {
                warn!("Could not record progress of run {}: {}", run_id, e);
            }
        })
    }

    fn touch_run(&self, run_id: RunId, change: impl FnOnce(&mut PipelineRun)) {
        let result = self
            .lock_store()
            .and_then(|mut store| update_run(&mut *store, run_id, change));
        if let Err(e) = result {
            warn!("Could not update run {}: {}", run_id, e);
        }
    }

    fn lock_store(&self) -> Result<MutexGuard<'_, S>, PipelineError> {
        self.store
            .lock()
            .map_err(|_| PipelineError::Worker("store lock poisoned".to_string()))
    }

    fn with_store<T>(&self, f: impl FnOnce(&mut S) -> Result<T, S::Error>) -> Result<T, PipelineError> {
        let mut store = self.lock_store()?;
        f(&mut store).map_err(store_error)
    }

    fn cancels_lock(&self) -> MutexGuard<'_, HashMap<RunId, CancelFlag>> {
        self.cancels.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Read-modify-write of a run record
fn update_run<S>(store: &mut S, run_id: RunId, change: impl FnOnce(&mut PipelineRun)) -> Result<(), PipelineError>
where
    S: RunStore,
    S::Error: Display,
{
    let mut run = store
        .get_run(run_id)
        .map_err(store_error)?
        .ok_or(PipelineError::RunNotFound(run_id))?;
    change(&mut run);
    run.updated_at = normaudit_domain::current_timestamp();
    store.update_run(&run).map_err(store_error)
}

/// The requested attachment, or the most recent one
fn select_file(files: Vec<SourceFile>, source_id: SourceId, file_id: Option<i64>) -> Result<SourceFile, PipelineError> {
    match file_id {
        Some(file_id) => files
            .into_iter()
            .find(|f| f.id == file_id)
            .ok_or(PipelineError::FileNotFound { source_id, file_id }),
        None => files.into_iter().last().ok_or(PipelineError::NoFiles(source_id)),
    }
}

fn store_error<E: Display>(e: E) -> PipelineError {
    PipelineError::Store(e.to_string())
}
