//! Interactive review session over the pending fragments of one source.

use crate::commands::resolve_source;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use crate::session::{Oracle, Session};
use normaudit_domain::{CheckMethod, FragmentPatch, RawFragment, SourceDocument};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;

/// One line typed by the reviewer.
#[derive(Debug, Clone, PartialEq)]
enum ReviewCommand {
    Approve,
    Reject,
    Skip,
    Back,
    Tags(Vec<String>),
    Method(CheckMethod),
    Show,
    Summary,
    Help,
    Quit,
}

/// Run the review loop for `reference` until the reviewer quits or the queue ends.
pub fn run_review<L: Oracle>(reference: &str, session: &Session<L>, history_size: usize) -> Result<()> {
    let formatter = session.formatter();
    let (source, mut queue) = session.with_store(|store| {
        let source = resolve_source(store, reference)?;
        let pending = session.gate().list_pending(&*store, source.id)?;
        Ok((source, pending))
    })?;

    if queue.is_empty() {
        println!("{}", formatter.info(&format!("No pending fragments for {}", source.code)));
        return Ok(());
    }

    println!(
        "{}",
        formatter.info(&format!(
            "Reviewing {} pending fragment(s) of {} as '{}'. Type 'help' for commands.",
            queue.len(),
            source.code,
            session.reviewer()
        ))
    );

    let config = rustyline::Config::builder()
        .max_history_size(history_size)?
        .auto_add_history(false)
        .build();
    let mut editor = DefaultEditor::with_config(config)?;
    let history_path = history_path()?;
    let _ = editor.load_history(&history_path);

    let mut index = 0;
    let mut show = true;
    while index < queue.len() {
        if show {
            println!();
            println!("[{}/{}] {}", index + 1, queue.len(), formatter.format_fragment_detail(&queue[index]));
            show = false;
        }

        let line = match editor.readline("review> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("{}", formatter.info("Use 'quit' to leave"));
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        if !line.trim().is_empty() {
            editor.add_history_entry(line.trim()).ok();
        }

        match parse_review_command(&line) {
            Ok(ReviewCommand::Quit) => break,
            Ok(ReviewCommand::Help) => print_help(formatter),
            Ok(ReviewCommand::Show) => show = true,
            Ok(ReviewCommand::Skip) => {
                index += 1;
                show = true;
            }
            Ok(ReviewCommand::Back) => {
                index = index.saturating_sub(1);
                show = true;
            }
            Ok(ReviewCommand::Summary) => print_summary(session, &source)?,
            Ok(ReviewCommand::Approve) => {
                let id = queue[index].id;
                match session.with_store(|store| Ok(session.gate().approve(store, id, session.reviewer())?)) {
                    Ok(()) => println!("{}", formatter.success(&format!("#{} approved", id.seq))),
                    Err(e) => eprintln!("{}", formatter.error(&e.to_string())),
                }
                index += 1;
                show = true;
            }
            Ok(ReviewCommand::Reject) => {
                let id = queue[index].id;
                match session.with_store(|store| Ok(session.gate().reject(store, id, session.reviewer())?)) {
                    Ok(()) => println!("{}", formatter.success(&format!("#{} rejected", id.seq))),
                    Err(e) => eprintln!("{}", formatter.error(&e.to_string())),
                }
                index += 1;
                show = true;
            }
            Ok(ReviewCommand::Tags(tags)) => {
                let patch = FragmentPatch {
                    tags: Some(tags),
                    check_method: None,
                };
                edit(session, &mut queue[index], patch);
            }
            Ok(ReviewCommand::Method(method)) => {
                let patch = FragmentPatch {
                    tags: None,
                    check_method: Some(method),
                };
                edit(session, &mut queue[index], patch);
            }
            Err(e) => eprintln!("{}", formatter.error(&e.to_string())),
        }
    }

    editor.save_history(&history_path).ok();
    print_summary(session, &source)
}

fn edit<L: Oracle>(session: &Session<L>, fragment: &mut RawFragment, patch: FragmentPatch) {
    let id = fragment.id;
    match session.with_store(|store| Ok(session.gate().edit_metadata(store, id, patch)?)) {
        Ok(updated) => {
            *fragment = updated;
            println!("{}", session.formatter().success(&format!("#{} updated", id.seq)));
        }
        Err(e) => eprintln!("{}", session.formatter().error(&e.to_string())),
    }
}

fn print_summary<L: Oracle>(session: &Session<L>, source: &SourceDocument) -> Result<()> {
    let summary = session.with_store(|store| Ok(session.gate().review_summary(&*store, source.id)?))?;
    println!(
        "{}",
        session.formatter().info(&format!(
            "{}: {} pending, {} approved, {} rejected, {} processed",
            source.code, summary.pending, summary.approved, summary.rejected, summary.processed
        ))
    );
    Ok(())
}

/// Parse one review line.
fn parse_review_command(line: &str) -> Result<ReviewCommand> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word.to_lowercase().as_str() {
        "" | "s" | "skip" | "n" | "next" => Ok(ReviewCommand::Skip),
        "a" | "approve" | "y" => Ok(ReviewCommand::Approve),
        "r" | "reject" => Ok(ReviewCommand::Reject),
        "b" | "back" | "p" | "prev" => Ok(ReviewCommand::Back),
        "show" | "l" => Ok(ReviewCommand::Show),
        "summary" => Ok(ReviewCommand::Summary),
        "help" | "?" | "h" => Ok(ReviewCommand::Help),
        "q" | "quit" | "exit" => Ok(ReviewCommand::Quit),
        "t" | "tag" | "tags" => Ok(ReviewCommand::Tags(
            rest.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
        )),
        "m" | "method" => CheckMethod::parse(rest)
            .map(ReviewCommand::Method)
            .ok_or_else(|| {
                CliError::InvalidInput(format!(
                    "Unknown check method '{}': use visual, measurement, testing or documentation",
                    rest
                ))
            }),
        other => Err(CliError::InvalidInput(format!(
            "Unknown command: {}. Type 'help' for available commands.",
            other
        ))),
    }
}

fn history_path() -> Result<PathBuf> {
    let dir = Config::dir()?;
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join("history.txt"))
}

fn print_help(formatter: &Formatter) {
    println!("{}", formatter.info("Review commands:"));
    println!();
    println!("  a, approve              - Approve the fragment and move on");
    println!("  r, reject               - Reject the fragment and move on");
    println!("  s, skip, <enter>        - Leave it pending and move on");
    println!("  b, back                 - Go back one fragment");
    println!("  t <tag>[,<tag>..]       - Replace the tags (empty clears them)");
    println!("  m <method>              - Set the check method");
    println!("                            (visual|measurement|testing|documentation)");
    println!("  show                    - Show the fragment again");
    println!("  summary                 - Counts per status for this source");
    println!("  help, ?                 - Show this help");
    println!("  q, quit                 - Leave the review");
    println!();
}
