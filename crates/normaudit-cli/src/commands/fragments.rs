//! Fragments command implementation.

use super::resolve_source;
use crate::cli::FragmentsArgs;
use crate::error::Result;
use crate::session::{Oracle, Session};
use normaudit_domain::traits::FragmentStore;

/// Execute the fragments command.
pub fn execute_fragments<L: Oracle>(args: FragmentsArgs, session: &Session<L>) -> Result<()> {
    let status = args.status.map(Into::into);
    let fragments = session.with_store(|store| {
        let source = resolve_source(store, &args.source)?;
        Ok(store.list_by_source(source.id, status)?)
    })?;
    println!("{}", session.formatter().format_fragments(&fragments)?);
    Ok(())
}
