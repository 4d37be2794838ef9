//! normaudit - command-line front end of the normative document pipeline.

use anyhow::Context;
use clap::Parser;
use normaudit_cli::commands;
use normaudit_cli::repl;
use normaudit_cli::{Cli, Command, Config, Formatter, Session};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(db) = cli.db {
        config.database.path = db;
    }

    let format = cli
        .format
        .map(Into::into)
        .unwrap_or(config.settings.format);
    let color_enabled = !cli.no_color && config.settings.color;
    let formatter = Formatter::new(format, color_enabled);
    let reviewer = cli
        .reviewer
        .unwrap_or_else(|| config.settings.reviewer.clone());

    let session = Session::open(&config, formatter, reviewer)
        .with_context(|| format!("failed to open database {}", config.database.path))?;

    match cli.command {
        Command::Source(args) => commands::execute_source(args, &session)?,
        Command::Extract(args) => commands::execute_extract(args, &session).await?,
        Command::Fragments(args) => commands::execute_fragments(args, &session)?,
        Command::Approve(args) => commands::execute_approve(args, &session)?,
        Command::Reject(args) => commands::execute_reject(args, &session)?,
        Command::Edit(args) => commands::execute_edit(args, &session)?,
        Command::Review(args) => {
            repl::run_review(&args.source, &session, config.settings.history_size)?
        }
        Command::Convert(args) => commands::execute_convert(args, &session).await?,
        Command::Requirements(args) => commands::execute_requirements(args, &session)?,
        Command::Runs(args) => commands::execute_runs(args, &session)?,
    }

    Ok(())
}

/// Log to stderr; `--verbose` forces debug, otherwise `RUST_LOG` or info.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
