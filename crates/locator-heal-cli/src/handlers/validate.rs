//! `healer validate`

use super::{load_page, parse_locators, with_snapshot_overrides};
use crate::commands::ValidateArgs;
use crate::config::CliConfig;
use crate::output::Printer;
use crate::{CliError, CliResult};
use locator_heal::{Session, StaticPageDriver};

/// Validate a batch against a saved page and print the batch report
pub fn execute(config: &CliConfig, printer: &Printer, args: &ValidateArgs) -> CliResult<()> {
    let locators = parse_locators(&args.locators)?;
    let markup = load_page(&args.page)?;

    let mut healer = with_snapshot_overrides(config.healer.clone(), &args.healing);
    if let Some(pause_ms) = args.pause_ms {
        healer.scroll = healer.scroll.with_pauses(pause_ms, pause_ms);
    }
    let oracle = healer.build_oracle(args.healing.offline)?;
    let orchestrator = healer.orchestrator(oracle);
    let session = Session::new(StaticPageDriver::new(markup));

    let report = orchestrator.run(&session, &locators);
    printer.json(&report)?;

    if report.is_success() {
        Ok(())
    } else {
        let missing: Vec<String> = report
            .still_missing
            .iter()
            .map(|&i| report.locators[i].key())
            .collect();
        for key in &missing {
            printer.failure(&format!("{key} not found after healing"))?;
        }
        Err(CliError::validation(format!(
            "{} locator(s) still missing: {}",
            missing.len(),
            missing.join(", ")
        )))
    }
}
