//! `healer resolve`

use super::{load_page, parse_locator, with_snapshot_overrides};
use crate::commands::ResolveArgs;
use crate::config::CliConfig;
use crate::output::Printer;
use crate::CliResult;
use locator_heal::{ElementHandle, HealedMapping, ResolutionState, Session, StaticPageDriver};
use serde::Serialize;

/// JSON report of one resolution
#[derive(Debug, Serialize)]
pub struct ResolveReport {
    /// Canonical key of the requested locator
    pub locator: String,
    /// Whether an element was found
    pub resolved: bool,
    /// Final state
    pub state: Option<ResolutionState>,
    /// States visited
    pub trace: Vec<ResolutionState>,
    /// Locator that found the element, when it differs from the request
    pub replacement: Option<String>,
    /// Element found
    pub element: Option<ElementHandle>,
    /// Failure description
    pub error: Option<String>,
    /// Healed mappings recorded during the run
    pub healed: Vec<HealedMapping>,
}

/// Resolve one locator against a saved page and print the report
pub fn execute(config: &CliConfig, printer: &Printer, args: &ResolveArgs) -> CliResult<()> {
    let locator = parse_locator(&args.locator)?;
    let markup = load_page(&args.page)?;

    let mut healer = with_snapshot_overrides(config.healer.clone(), &args.healing);
    if let Some(timeout_ms) = args.timeout_ms {
        healer.wait = healer.wait.with_timeout(timeout_ms);
    }
    let oracle = healer.build_oracle(args.healing.offline)?;
    let resolver = healer.resolver(oracle);
    let session = Session::new(StaticPageDriver::new(markup));

    let outcome = resolver.resolve(&session, &locator);
    let healed = resolver.cache().entries();
    let report = match &outcome {
        Ok(resolution) => ResolveReport {
            locator: locator.key(),
            resolved: true,
            state: Some(resolution.state),
            trace: resolution.trace.clone(),
            replacement: (resolution.locator != locator).then(|| resolution.locator.key()),
            element: Some(resolution.element.clone()),
            error: None,
            healed,
        },
        Err(e) => ResolveReport {
            locator: locator.key(),
            resolved: false,
            state: None,
            trace: Vec::new(),
            replacement: None,
            element: None,
            error: Some(e.to_string()),
            healed,
        },
    };
    printer.json(&report)?;

    outcome.map(|_| ()).map_err(Into::into)
}
