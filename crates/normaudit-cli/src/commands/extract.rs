//! Extract command implementation.

use super::resolve_source;
use super::runs::{report_outcome, report_run, watch_run};
use crate::cli::ExtractArgs;
use crate::error::Result;
use crate::session::{Oracle, Session};
use normaudit_pipeline::PipelineOptions;

/// Execute the extract command.
///
/// A dry run executes in the foreground and previews the fragments; a real
/// run is spawned and watched until it finishes.
pub async fn execute_extract<L: Oracle>(args: ExtractArgs, session: &Session<L>) -> Result<()> {
    let source = session.with_store(|store| resolve_source(store, &args.source))?;
    let options = PipelineOptions {
        chunk_size: args.chunk_size,
        overlap: args.overlap,
        dry_run: args.dry_run,
        file_id: args.file_id,
    };

    if options.dry_run {
        let outcome = session.pipeline().run_extraction(source.id, options).await;
        return report_outcome(session, &outcome);
    }

    let run_id = session.pipeline().spawn_extraction(source.id, options)?;
    let run = watch_run(session, run_id).await?;
    report_run(
        session,
        &run,
        &format!(
            "Extracted {} fragment(s) from {} in {} chunk(s); review them with `normaudit review {}`",
            run.items_written, source.code, run.units_total, source.id.short()
        ),
    )
}
