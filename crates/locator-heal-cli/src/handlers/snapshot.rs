//! `healer snapshot`

use super::load_page;
use crate::commands::SnapshotArgs;
use crate::config::CliConfig;
use crate::output::Printer;
use crate::CliResult;
use locator_heal::{DocumentSnapshotter, SnapshotConfig};

/// Write the annotated artifact, or print it when persistence is off
pub fn execute(config: &CliConfig, printer: &Printer, args: &SnapshotArgs) -> CliResult<()> {
    let markup = load_page(&args.page)?;
    let snapshot_config = match &args.output_dir {
        Some(dir) => config.healer.snapshot.clone().with_output_dir(dir),
        None => config.healer.snapshot.clone(),
    };
    let snapshot = DocumentSnapshotter::new(snapshot_config).capture(&markup)?;

    match &snapshot.artifact_path {
        Some(path) => {
            printer.success(&format!(
                "Snapshot of {} written ({} paths indexed)",
                args.page.display(),
                snapshot.path_count()
            ))?;
            printer.line(path.display().to_string())?;
        }
        None => printer.line(&snapshot.artifact)?,
    }
    Ok(())
}

/// Snapshot config that never touches the filesystem
#[must_use]
pub fn in_memory() -> SnapshotConfig {
    SnapshotConfig::default().without_persistence()
}
