//! `healer paths`

use super::load_page;
use crate::commands::PathsArgs;
use crate::output::Printer;
use crate::CliResult;
use locator_heal::{DocumentSnapshotter, SnapshotConfig};

/// Print the structural path of every element, in document order
pub fn execute(printer: &Printer, args: &PathsArgs) -> CliResult<()> {
    let markup = load_page(&args.page)?;
    let snapshot = DocumentSnapshotter::new(SnapshotConfig::default().without_persistence())
        .capture(&markup)?;
    let paths = &snapshot.indexed_paths;
    let shown = args.limit.map_or(paths.len(), |n| n.min(paths.len()));

    printer.heading(&format!("{} structural paths in {}", paths.len(), args.page.display()))?;
    for path in &paths[..shown] {
        printer.line(path)?;
    }
    if shown < paths.len() {
        printer.heading(&format!("... {} more", paths.len() - shown))?;
    }
    tracing::debug!(total = paths.len(), shown, "listed structural paths");
    Ok(())
}
