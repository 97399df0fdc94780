//! `healer trim`

use super::{load_page, parse_locators, snapshot::in_memory};
use crate::commands::TrimArgs;
use crate::config::CliConfig;
use crate::output::Printer;
use crate::CliResult;
use locator_heal::DocumentSnapshotter;

/// Print the excerpt sent to the oracle for the given damaged locators
pub fn execute(config: &CliConfig, printer: &Printer, args: &TrimArgs) -> CliResult<()> {
    let damaged = parse_locators(&args.locators)?;
    let markup = load_page(&args.page)?;

    let snapshot_config = in_memory()
        .with_sample_size(config.healer.snapshot.sample_size)
        .with_trim_limit(config.healer.snapshot.trim_limit);
    let snapshotter = DocumentSnapshotter::new(snapshot_config);
    let snapshot = snapshotter.capture(&markup)?;
    let excerpt = snapshotter.trim(&snapshot.artifact, &damaged);

    tracing::info!(damaged = damaged.len(), excerpt_len = excerpt.len(), "trimmed snapshot");
    printer.line(excerpt)?;
    Ok(())
}
