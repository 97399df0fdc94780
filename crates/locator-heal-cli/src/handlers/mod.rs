//! Command handlers

pub mod config;
pub mod paths;
pub mod resolve;
pub mod snapshot;
pub mod trim;
pub mod validate;

use crate::commands::HealingArgs;
use crate::{CliError, CliResult};
use locator_heal::{HealerConfig, Locator};
use std::path::Path;

/// Read a saved page
pub fn load_page(path: &Path) -> CliResult<String> {
    std::fs::read_to_string(path).map_err(|e| {
        CliError::invalid_argument(format!("cannot read page {}: {e}", path.display()))
    })
}

/// Parse a `strategy=value` argument
pub fn parse_locator(raw: &str) -> CliResult<Locator> {
    raw.parse::<Locator>()
        .map_err(|e| CliError::invalid_argument(format!("{raw}: {e}")))
}

/// Parse every locator argument, keeping order
pub fn parse_locators(raw: &[String]) -> CliResult<Vec<Locator>> {
    raw.iter().map(|r| parse_locator(r)).collect()
}

/// Apply the snapshot overrides of a healing command
#[must_use]
pub fn with_snapshot_overrides(mut healer: HealerConfig, args: &HealingArgs) -> HealerConfig {
    if args.no_snapshot_files {
        healer.snapshot = healer.snapshot.without_persistence();
    } else if let Some(dir) = &args.snapshot_dir {
        healer.snapshot = healer.snapshot.with_output_dir(dir);
    }
    healer
}
