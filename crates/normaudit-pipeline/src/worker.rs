//! Foreground watcher for background runs

use crate::{Pipeline, PipelineError};
use normaudit_domain::traits::{FragmentStore, LlmProvider, RequirementStore, RunStore, SourceStore};
use normaudit_domain::{PipelineRun, RunId};
use std::fmt::Display;
use tokio::time::{interval, Duration};

/// Polls a run record until the run finishes
///
/// Ctrl+C while waiting asks the run to cancel; the watcher keeps polling
/// until the run has actually stopped.
///
/// # Examples
///
/// ```no_run
/// use normaudit_pipeline::{Pipeline, PipelineConfig, PipelineOptions, RunWatcher};
/// use normaudit_store::SqliteStore;
/// use normaudit_llm::MockProvider;
/// use normaudit_domain::SourceId;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = SqliteStore::new("normaudit.db")?;
///     let pipeline = Pipeline::new(store, MockProvider::default(), PipelineConfig::default())?;
///     let run_id = pipeline.spawn_extraction(SourceId::new(), PipelineOptions::default())?;
///
///     let watcher = RunWatcher::new(pipeline);
///     let run = watcher.wait(run_id, |run| println!("{}/{}", run.units_done, run.units_total)).await?;
///     println!("{:?}", run.status);
///     Ok(())
/// }
/// ```
pub struct RunWatcher<S, L>
where
    L: LlmProvider,
{
    pipeline: Pipeline<S, L>,
    interval: Duration,
}

impl<S, L> RunWatcher<S, L>
where
    S: SourceStore + FragmentStore + RequirementStore + RunStore + Send + 'static,
    S::Error: Display,
    L: LlmProvider + Send + Sync + 'static,
    L::Error: Display,
{
    /// Watch runs of `pipeline` at its configured poll interval
    pub fn new(pipeline: Pipeline<S, L>) -> Self {
        let interval = pipeline.config().poll_interval();
        Self { pipeline, interval }
    }

    /// Override the poll interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Wait for `run_id` to finish
    ///
    /// `on_update` is called whenever the run record changed since the last
    /// poll.
    pub async fn wait<F>(&self, run_id: RunId, mut on_update: F) -> Result<PipelineRun, PipelineError>
    where
        F: FnMut(&PipelineRun),
    {
        let mut ticker = interval(self.interval);
        let mut last: Option<PipelineRun> = None;
        let mut cancel_sent = false;

        tracing::debug!("Watching run {} (interval: {:?})", run_id, self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let run = self.pipeline.run_status(run_id)?;
                    if last.as_ref() != Some(&run) {
                        on_update(&run);
                    }
                    if run.status.is_finished() {
                        tracing::debug!("Run {} finished with status {}", run_id, run.status.as_str());
                        return Ok(run);
                    }
                    last = Some(run);
                }
                _ = tokio::signal::ctrl_c(), if !cancel_sent => {
                    tracing::info!("Interrupt received, cancelling run {}", run_id);
                    cancel_sent = true;
                    if !self.pipeline.cancel(run_id) {
                        tracing::warn!("Run {} is not active in this process", run_id);
                    }
                }
            }
        }
    }
}
