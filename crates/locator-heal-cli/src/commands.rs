//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Healer: inspect, snapshot and heal element locators against saved pages
#[derive(Parser, Debug)]
#[command(name = "healer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Healer configuration file (YAML)
    #[arg(short, long, global = true, env = "HEALER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the structural path of every element in a page
    Paths(PathsArgs),

    /// Write an annotated snapshot artifact for a page
    Snapshot(SnapshotArgs),

    /// Print the excerpt the oracle would receive for damaged locators
    Trim(TrimArgs),

    /// Resolve one locator, healing it if necessary
    Resolve(ResolveArgs),

    /// Validate a batch of locators and heal the missing ones together
    Validate(ValidateArgs),

    /// Show the effective configuration
    Config(ConfigArgs),
}

/// Color output argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Colors when stdout is a terminal
    #[default]
    Auto,
    /// Always colorize
    Always,
    /// Never colorize
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Arguments for the paths command
#[derive(Parser, Debug)]
pub struct PathsArgs {
    /// Saved HTML page
    pub page: PathBuf,

    /// Print at most this many paths
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

/// Arguments for the snapshot command
#[derive(Parser, Debug)]
pub struct SnapshotArgs {
    /// Saved HTML page
    pub page: PathBuf,

    /// Directory for the artifact (overrides configuration)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

/// Arguments for the trim command
#[derive(Parser, Debug)]
pub struct TrimArgs {
    /// Saved HTML page
    pub page: PathBuf,

    /// Damaged locator as `strategy=value` (repeatable)
    #[arg(short, long = "locator", required = true)]
    pub locators: Vec<String>,
}

/// Options shared by resolve and validate
#[derive(clap::Args, Debug, Default)]
pub struct HealingArgs {
    /// Use the structural fallback instead of the HTTP oracle
    #[arg(long)]
    pub offline: bool,

    /// Directory for snapshot artifacts (overrides configuration)
    #[arg(long, conflicts_with = "no_snapshot_files")]
    pub snapshot_dir: Option<PathBuf>,

    /// Keep snapshots in memory only
    #[arg(long)]
    pub no_snapshot_files: bool,
}

/// Arguments for the resolve command
#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Saved HTML page
    pub page: PathBuf,

    /// Locator as `strategy=value`
    #[arg(short, long)]
    pub locator: String,

    /// Presence wait timeout in milliseconds (overrides configuration)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    #[command(flatten)]
    pub healing: HealingArgs,
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Saved HTML page
    pub page: PathBuf,

    /// Locator as `strategy=value` (repeatable, order is kept)
    #[arg(short, long = "locator", required = true)]
    pub locators: Vec<String>,

    /// Pause after each scroll step in milliseconds (overrides configuration)
    #[arg(long)]
    pub pause_ms: Option<u64>,

    #[command(flatten)]
    pub healing: HealingArgs,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Configuration file to show (defaults to --config)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Validate only, print nothing on success
    #[arg(long)]
    pub check: bool,
}
