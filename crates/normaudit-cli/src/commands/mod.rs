//! Command implementations.

pub mod convert;
pub mod extract;
pub mod fragments;
pub mod review;
pub mod runs;
pub mod source;

pub use self::convert::{execute_convert, execute_requirements};
pub use self::extract::execute_extract;
pub use self::fragments::execute_fragments;
pub use self::review::{execute_approve, execute_edit, execute_reject};
pub use self::runs::execute_runs;
pub use self::source::execute_source;

use crate::error::{CliError, Result};
use normaudit_domain::traits::SourceStore;
use normaudit_domain::{FragmentId, SourceDocument, SourceId};
use normaudit_store::SqliteStore;

/// Shortest id prefix accepted as a source reference
const MIN_PREFIX: usize = 4;

/// Find a source document by full id, document code, or a leading or
/// trailing part of the id (the printed handle is the trailing part).
pub fn resolve_source(store: &SqliteStore, reference: &str) -> Result<SourceDocument> {
    let reference = reference.trim();
    if let Ok(id) = SourceId::from_string(reference) {
        return store
            .get_source(id)?
            .ok_or_else(|| CliError::UnknownSource(reference.to_string()));
    }

    let sources = store.list_sources()?;
    if let Some(source) = sources
        .iter()
        .find(|s| s.code.eq_ignore_ascii_case(reference))
    {
        return Ok(source.clone());
    }

    if reference.chars().count() < MIN_PREFIX {
        return Err(CliError::UnknownSource(reference.to_string()));
    }
    let lowered = reference.to_lowercase();
    let mut matches = sources
        .into_iter()
        .filter(|s| {
            let id = s.id.to_string();
            id.starts_with(&lowered) || id.ends_with(&lowered)
        });
    match (matches.next(), matches.next()) {
        (Some(source), None) => Ok(source),
        (Some(_), Some(_)) => Err(CliError::InvalidInput(format!(
            "'{}' matches several source documents; use more characters",
            reference
        ))),
        _ => Err(CliError::UnknownSource(reference.to_string())),
    }
}

/// Parse `<source>#<seq>`, where `<source>` is anything [`resolve_source`] accepts.
pub fn resolve_fragment_id(store: &SqliteStore, reference: &str) -> Result<FragmentId> {
    if let Ok(id) = FragmentId::parse(reference) {
        return Ok(id);
    }
    let (source, seq) = reference.trim().rsplit_once('#').ok_or_else(|| {
        CliError::InvalidInput(format!(
            "Invalid fragment id '{}': expected <source>#<seq>",
            reference
        ))
    })?;
    let seq = seq
        .parse::<u32>()
        .map_err(|e| CliError::InvalidInput(format!("Invalid fragment number in '{}': {}", reference, e)))?;
    let source = resolve_source(store, source)?;
    Ok(FragmentId::new(source.id, seq))
}
