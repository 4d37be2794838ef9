//! Convert and requirements commands.

use super::resolve_source;
use super::runs::{report_outcome, report_run, watch_run};
use crate::cli::{ConvertArgs, SourceRef};
use crate::error::Result;
use crate::session::{Oracle, Session};
use normaudit_domain::traits::RequirementStore;
use normaudit_pipeline::PipelineOptions;

/// Execute the convert command.
///
/// A dry run previews the requirements in the foreground; a real run is
/// spawned and watched.
pub async fn execute_convert<L: Oracle>(args: ConvertArgs, session: &Session<L>) -> Result<()> {
    let source = session.with_store(|store| resolve_source(store, &args.source))?;
    let options = PipelineOptions {
        dry_run: args.dry_run,
        ..Default::default()
    };

    if options.dry_run {
        let outcome = session.pipeline().run_conversion(source.id, options).await;
        return report_outcome(session, &outcome);
    }

    let run_id = session.pipeline().spawn_conversion(source.id, options)?;
    let run = watch_run(session, run_id).await?;
    report_run(
        session,
        &run,
        &format!(
            "Created {} requirement(s) from {}; list them with `normaudit requirements {}`",
            run.items_written, source.code, source.id.short()
        ),
    )
}

/// Execute the requirements command.
pub fn execute_requirements<L: Oracle>(args: SourceRef, session: &Session<L>) -> Result<()> {
    let requirements = session.with_store(|store| {
        let source = resolve_source(store, &args.source)?;
        Ok(store.list_requirements_by_source(source.id)?)
    })?;
    println!("{}", session.formatter().format_requirements(&requirements)?);
    Ok(())
}
