//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use normaudit_domain::{CheckMethod, FragmentStatus};
use std::path::PathBuf;

/// normaudit - turn regulatory documents into reviewed inspection requirements.
#[derive(Debug, Parser)]
#[command(name = "normaudit")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "NORMAUDIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database path (overrides the configuration)
    #[arg(long, global = true, env = "NORMAUDIT_DB")]
    pub db: Option<String>,

    /// Name recorded on review decisions
    #[arg(long, global = true, env = "NORMAUDIT_REVIEWER")]
    pub reviewer: Option<String>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (IDs only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Register and inspect source documents
    Source(SourceArgs),

    /// Extract candidate fragments from a source document
    Extract(ExtractArgs),

    /// List the fragments of a source document
    Fragments(FragmentsArgs),

    /// Approve fragments
    Approve(DecisionArgs),

    /// Reject fragments
    Reject(DecisionArgs),

    /// Edit tags or check method of a fragment
    Edit(EditArgs),

    /// Review pending fragments interactively
    Review(SourceRef),

    /// Convert approved fragments into requirements
    Convert(ConvertArgs),

    /// List the requirements derived from a source document
    Requirements(SourceRef),

    /// Show the run history of a source document
    Runs(SourceRef),
}

/// A source document reference: full id, id prefix, or document code.
#[derive(Debug, Parser)]
pub struct SourceRef {
    /// Source document
    pub source: String,
}

/// Arguments for source management.
#[derive(Debug, Parser)]
pub struct SourceArgs {
    #[command(subcommand)]
    pub action: SourceAction,
}

/// Source management actions.
#[derive(Debug, Subcommand)]
pub enum SourceAction {
    /// Register a new source document
    Add {
        /// Document code (e.g. "SP 484.1311500.2020")
        #[arg(long)]
        code: String,
        /// Document title
        #[arg(long)]
        title: String,
        /// Issuing jurisdiction
        #[arg(short, long, default_value = "RU")]
        jurisdiction: String,
        /// Edition date
        #[arg(long)]
        edition_date: Option<String>,
        /// Attach this file right away
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Attach a file to a source document
    Attach {
        /// Source document
        source: String,
        /// File to attach (PDF, HTML or plain text)
        path: PathBuf,
    },

    /// List source documents
    List,

    /// Show a source document with its files and review counts
    Show {
        /// Source document
        source: String,
    },
}

/// Arguments for the extract command.
#[derive(Debug, Parser)]
pub struct ExtractArgs {
    /// Source document
    pub source: String,

    /// Chunk size in characters
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Characters shared by consecutive chunks
    #[arg(long)]
    pub overlap: Option<usize>,

    /// Attachment to extract from (latest when omitted)
    #[arg(long)]
    pub file_id: Option<i64>,

    /// Show what would be extracted without writing
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the fragments command.
#[derive(Debug, Parser)]
pub struct FragmentsArgs {
    /// Source document
    pub source: String,

    /// Only fragments with this status
    #[arg(short, long, value_enum)]
    pub status: Option<StatusArg>,
}

/// Arguments for approve and reject.
#[derive(Debug, Parser)]
pub struct DecisionArgs {
    /// Fragment ids (`<source>#<seq>`; the source part may be a prefix or code)
    #[arg(required = true)]
    pub ids: Vec<String>,
}

/// Arguments for the edit command.
#[derive(Debug, Parser)]
pub struct EditArgs {
    /// Fragment id
    pub id: String,

    /// Tag to set (repeat for several; replaces the existing tags)
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,

    /// Remove every tag
    #[arg(long, conflicts_with = "tags")]
    pub clear_tags: bool,

    /// How an inspector verifies the requirement
    #[arg(short = 'm', long, value_enum)]
    pub check_method: Option<CheckMethodArg>,
}

/// Arguments for the convert command.
#[derive(Debug, Parser)]
pub struct ConvertArgs {
    /// Source document
    pub source: String,

    /// Show the requirements that would be created without writing
    #[arg(long)]
    pub dry_run: bool,
}

/// Fragment status argument.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum StatusArg {
    /// Awaiting review
    Pending,
    /// Accepted by a reviewer
    Approved,
    /// Refused by a reviewer
    Rejected,
    /// Converted into a requirement
    Processed,
}

/// Check method argument.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CheckMethodArg {
    /// Visual inspection
    Visual,
    /// Instrument measurement
    Measurement,
    /// Functional test
    Testing,
    /// Documentation review
    Documentation,
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
            CliFormat::Quiet => crate::config::OutputFormat::Quiet,
        }
    }
}

impl From<StatusArg> for FragmentStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Pending => FragmentStatus::Pending,
            StatusArg::Approved => FragmentStatus::Approved,
            StatusArg::Rejected => FragmentStatus::Rejected,
            StatusArg::Processed => FragmentStatus::Processed,
        }
    }
}

impl From<CheckMethodArg> for CheckMethod {
    fn from(method: CheckMethodArg) -> Self {
        match method {
            CheckMethodArg::Visual => CheckMethod::Visual,
            CheckMethodArg::Measurement => CheckMethod::Measurement,
            CheckMethodArg::Testing => CheckMethod::Testing,
            CheckMethodArg::Documentation => CheckMethod::Documentation,
        }
    }
}
