//! Healer CLI Library
//!
//! Command-line tooling over saved HTML pages: structural paths, snapshot
//! artifacts, oracle excerpts, and single or batch locator healing.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod handlers;
pub mod logging;
mod output;

pub use commands::{
    Cli, ColorArg, Commands, ConfigArgs, HealingArgs, PathsArgs, ResolveArgs, SnapshotArgs,
    TrimArgs, ValidateArgs,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::Printer;
