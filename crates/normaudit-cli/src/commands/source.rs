//! Source document commands.

use super::resolve_source;
use crate::cli::{SourceAction, SourceArgs};
use crate::config::OutputFormat;
use crate::error::{CliError, Result};
use crate::session::{Oracle, Session};
use normaudit_domain::traits::{RequirementStore, SourceStore};
use normaudit_domain::{SourceDocument, SourceId};
use std::fs;
use std::path::Path;
use tracing::info;

/// Execute a source subcommand.
pub fn execute_source<L: Oracle>(args: SourceArgs, session: &Session<L>) -> Result<()> {
    let formatter = session.formatter();
    match args.action {
        SourceAction::Add {
            code,
            title,
            jurisdiction,
            edition_date,
            file,
        } => {
            let (id, file_id) = add_source(session, &jurisdiction, &code, &title, edition_date, file.as_deref())?;
            match formatter.format() {
                OutputFormat::Table => {
                    println!("{}", formatter.success(&format!("Source registered: {} ({})", code, id)));
                    if let Some(file_id) = file_id {
                        println!("{}", formatter.info(&format!("File attached with id {}", file_id)));
                    }
                }
                _ => println!("{}", id),
            }
        }
        SourceAction::Attach { source, path } => {
            let (source, file_id) = session.with_store(|store| {
                let source = resolve_source(store, &source)?;
                let file_id = attach(store, source.id, &path)?;
                Ok((source, file_id))
            })?;
            match formatter.format() {
                OutputFormat::Table => println!(
                    "{}",
                    formatter.success(&format!("Attached {} to {} (file id {})", path.display(), source.code, file_id))
                ),
                _ => println!("{}", file_id),
            }
        }
        SourceAction::List => {
            let sources = session.with_store(|store| Ok(store.list_sources()?))?;
            println!("{}", formatter.format_sources(&sources)?);
        }
        SourceAction::Show { source } => {
            let (source, files, summary, requirements) = session.with_store(|store| {
                let source = resolve_source(store, &source)?;
                let files = store.list_files(source.id)?;
                let summary = session.gate().review_summary(&*store, source.id)?;
                let requirements = store.list_requirements_by_source(source.id)?.len();
                Ok((source, files, summary, requirements))
            })?;
            println!(
                "{}",
                formatter.format_source_detail(&source, &files, &summary, requirements)?
            );
        }
    }
    Ok(())
}

/// Register a source document, optionally attaching a file in the same step.
pub fn add_source<L: Oracle>(
    session: &Session<L>,
    jurisdiction: &str,
    code: &str,
    title: &str,
    edition_date: Option<String>,
    file: Option<&Path>,
) -> Result<(SourceId, Option<i64>)> {
    if code.trim().is_empty() || title.trim().is_empty() {
        return Err(CliError::InvalidInput("code and title must not be empty".to_string()));
    }
    let content = file.map(read_file).transpose()?;

    session.with_store(|store| {
        let source = SourceDocument::new(jurisdiction.trim(), code.trim(), title.trim(), edition_date);
        let id = store.create_source(source)?;
        info!("Registered source {} as {}", code, id);

        let file_id = match (file, content) {
            (Some(path), Some(content)) => Some(store.attach_file(id, &file_name(path), content)?),
            _ => None,
        };
        Ok((id, file_id))
    })
}

fn attach(store: &mut normaudit_store::SqliteStore, source: SourceId, path: &Path) -> Result<i64> {
    let content = read_file(path)?;
    let file_id = store.attach_file(source, &file_name(path), content)?;
    info!("Attached {} to source {}", path.display(), source);
    Ok(file_id)
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    let content = fs::read(path)?;
    if content.is_empty() {
        return Err(CliError::InvalidInput(format!("{} is empty", path.display())));
    }
    Ok(content)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_file_rejects_empty() {
        let file = NamedTempFile::new().unwrap();
        assert!(matches!(read_file(file.path()), Err(CliError::InvalidInput(_))));
    }

    #[test]
    fn test_read_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "4.1 Detectors must be installed.").unwrap();
        assert_eq!(read_file(file.path()).unwrap().len(), 32);
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name(Path::new("/tmp/docs/sp484.pdf")), "sp484.pdf");
    }
}
