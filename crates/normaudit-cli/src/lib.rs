//! normaudit CLI library.
//!
//! Configuration loading, command execution, the interactive review session,
//! and output formatting for the `normaudit` binary.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
pub mod repl;
pub mod session;

pub use cli::{Cli, Command};
pub use config::Config;
pub use error::{CliError, Result};
pub use output::Formatter;
pub use session::{Oracle, Session};
