//! Run history and run watching.

use super::resolve_source;
use crate::cli::SourceRef;
use crate::config::OutputFormat;
use crate::error::{CliError, Result};
use crate::session::{Oracle, Session};
use normaudit_domain::{PipelineRun, RunId, RunStatus};
use normaudit_pipeline::{PipelineOutcome, RunWatcher};

/// Execute the runs command.
pub fn execute_runs<L: Oracle>(args: SourceRef, session: &Session<L>) -> Result<()> {
    let source = session.with_store(|store| resolve_source(store, &args.source))?;
    let runs = session.pipeline().runs(source.id)?;
    println!("{}", session.formatter().format_runs(&runs)?);
    Ok(())
}

/// Follow a spawned run until it finishes, printing progress to stderr.
///
/// Ctrl-C cancels the run; the cancelled record is returned.
pub async fn watch_run<L: Oracle>(session: &Session<L>, run_id: RunId) -> Result<PipelineRun> {
    let formatter = session.formatter();
    let show_progress = formatter.format() == OutputFormat::Table;
    if show_progress {
        eprintln!(
            "{}",
            formatter.info(&format!("Run {} started (Ctrl-C cancels)", run_id))
        );
    }

    let watcher = RunWatcher::new(session.pipeline().clone());
    let run = watcher
        .wait(run_id, |run| {
            if show_progress && !run.status.is_finished() {
                eprintln!("{}", formatter.run_progress(run));
            }
        })
        .await?;
    Ok(run)
}

/// Print the final state of a watched run; a failed run becomes an error.
pub fn report_run<L: Oracle>(session: &Session<L>, run: &PipelineRun, done: &str) -> Result<()> {
    let formatter = session.formatter();
    match run.status {
        RunStatus::Failed => {
            return Err(CliError::StageFailed {
                stage: run.kind.as_str().to_string(),
                message: run.error.clone().unwrap_or_else(|| "unknown error".to_string()),
            })
        }
        _ if formatter.format() != OutputFormat::Table => {
            println!("{}", formatter.format_runs(std::slice::from_ref(run))?);
        }
        RunStatus::Cancelled => {
            println!(
                "{}",
                formatter.warning(&format!(
                    "Run cancelled after {}/{} unit(s); {} item(s) written",
                    run.units_done, run.units_total, run.items_written
                ))
            );
        }
        _ => println!("{}", formatter.success(done)),
    }
    Ok(())
}

/// Print the outcome of a foreground stage; a failed stage becomes an error.
pub fn report_outcome<L: Oracle>(session: &Session<L>, outcome: &PipelineOutcome) -> Result<()> {
    println!("{}", session.formatter().format_outcome(outcome)?);
    if outcome.success {
        Ok(())
    } else {
        Err(CliError::StageFailed {
            stage: outcome.stage.clone(),
            message: outcome.error.clone().unwrap_or_else(|| "unknown error".to_string()),
        })
    }
}
