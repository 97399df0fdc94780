//! Batch validation and healing.
//!
//! 1. **Discovery**: each locator gets up to `max_attempts` presence checks
//!    with a scroll step and a pause between them. Misses are recorded with
//!    their index and the view is reset to the top.
//! 2. **Repair**: if anything is missing, one snapshot and one
//!    `repair_many` call cover every damaged locator. Candidates replace
//!    originals positionally; a missing candidate keeps the original.
//! 3. **Final check**: the whole resulting batch is discovered again. One
//!    miss fails the batch and the result is empty.

use crate::context::Session;
use crate::driver::DocumentDriver;
use crate::locator::Locator;
use crate::oracle::RepairOracle;
use crate::result::{HealError, HealResult};
use crate::snapshot::DocumentSnapshotter;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default presence checks per locator
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default scroll step in pixels
pub const DEFAULT_SCROLL_STEP_PX: i64 = 400;

/// Default pause after each scroll step
pub const DEFAULT_PAUSE_MS: u64 = 500;

/// Default pause after scrolling back to the top
pub const DEFAULT_RESET_PAUSE_MS: u64 = 1_000;

/// Scroll-assisted discovery settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollOptions {
    /// Presence checks per locator
    pub max_attempts: u32,
    /// Vertical scroll step in pixels
    pub scroll_step_px: i64,
    /// Pause after each scroll step in milliseconds
    pub pause_ms: u64,
    /// Pause after scrolling back to the top in milliseconds
    pub reset_pause_ms: u64,
}

impl Default for ScrollOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            scroll_step_px: DEFAULT_SCROLL_STEP_PX,
            pause_ms: DEFAULT_PAUSE_MS,
            reset_pause_ms: DEFAULT_RESET_PAUSE_MS,
        }
    }
}

impl ScrollOptions {
    /// Set presence checks per locator
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set scroll step
    #[must_use]
    pub const fn with_scroll_step(mut self, px: i64) -> Self {
        self.scroll_step_px = px;
        self
    }

    /// Set both pauses in milliseconds
    #[must_use]
    pub const fn with_pauses(mut self, pause_ms: u64, reset_pause_ms: u64) -> Self {
        self.pause_ms = pause_ms;
        self.reset_pause_ms = reset_pause_ms;
        self
    }
}

/// How a batch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Every locator was present on discovery
    AllPresent,
    /// Damaged locators were repaired and the batch passed the final check
    Healed,
    /// At least one locator failed the final check
    Failed,
}

/// A positional repair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRepair {
    /// Index in the batch
    pub index: usize,
    /// Locator that was missing
    pub original: Locator,
    /// Candidate proposed by the oracle, if any
    pub replacement: Option<Locator>,
}

/// Result of one batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Resulting locators, positionally aligned with the input
    pub locators: Vec<Locator>,
    /// Indices present on discovery
    pub found: Vec<usize>,
    /// Repairs attempted, one per damaged index
    pub repairs: Vec<BatchRepair>,
    /// Indices that failed the final check
    pub still_missing: Vec<usize>,
    /// Artifact written for the repair phase
    pub snapshot_path: Option<PathBuf>,
    /// Outcome
    pub outcome: BatchOutcome,
}

impl BatchReport {
    /// Whether the batch passed
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome != BatchOutcome::Failed
    }

    /// The validated locators, or an empty list when the batch failed
    #[must_use]
    pub fn into_locators(self) -> Vec<Locator> {
        if self.is_success() {
            self.locators
        } else {
            Vec::new()
        }
    }
}

/// Validates locator batches and repairs the damaged ones together
pub struct ValidationOrchestrator {
    oracle: Arc<dyn RepairOracle>,
    snapshotter: DocumentSnapshotter,
    scroll: ScrollOptions,
}

impl std::fmt::Debug for ValidationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationOrchestrator")
            .field("snapshotter", &self.snapshotter)
            .field("scroll", &self.scroll)
            .finish_non_exhaustive()
    }
}

impl ValidationOrchestrator {
    /// Create an orchestrator with default scroll and snapshot settings
    pub fn new(oracle: Arc<dyn RepairOracle>) -> Self {
        Self {
            oracle,
            snapshotter: DocumentSnapshotter::default(),
            scroll: ScrollOptions::default(),
        }
    }

    /// Set the snapshotter
    #[must_use]
    pub fn with_snapshotter(mut self, snapshotter: DocumentSnapshotter) -> Self {
        self.snapshotter = snapshotter;
        self
    }

    /// Set scroll options
    #[must_use]
    pub const fn with_scroll(mut self, scroll: ScrollOptions) -> Self {
        self.scroll = scroll;
        self
    }

    /// Validate and heal a batch, returning the locators or an empty list
    pub fn validate_and_heal(&self, session: &Session, locators: &[Locator]) -> Vec<Locator> {
        self.run(session, locators).into_locators()
    }

    /// Validate and heal a batch with a full report
    pub fn run(&self, session: &Session, locators: &[Locator]) -> BatchReport {
        let driver = session.driver();
        tracing::info!(session = %session.id(), count = locators.len(), "batch validation started");

        let mut resolved = locators.to_vec();
        let mut found = Vec::new();
        let mut damaged = Vec::new();

        for (index, locator) in locators.iter().enumerate() {
            if self.discover(driver, locator) {
                tracing::info!(index, locator = %locator, "element found");
                found.push(index);
            } else {
                tracing::info!(index, locator = %locator, "element missing after scrolling");
                damaged.push(index);
                self.scroll_to_top(driver);
            }
        }

        let mut repairs = Vec::new();
        let mut snapshot_path = None;
        if !damaged.is_empty() {
            let missing: Vec<Locator> = damaged.iter().map(|&i| locators[i].clone()).collect();
            let candidates = if session.healing().is_enabled() {
                match self.repair(driver, &missing) {
                    Ok((candidates, path)) => {
                        snapshot_path = path;
                        candidates
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, damaged = missing.len(), "batch repair failed");
                        vec![None; missing.len()]
                    }
                }
            } else {
                tracing::debug!(session = %session.id(), "healing disabled, skipping repair");
                vec![None; missing.len()]
            };

            for (&index, candidate) in damaged.iter().zip(candidates) {
                match &candidate {
                    Some(replacement) => {
                        tracing::info!(index, replacement = %replacement, "substituted repaired locator");
                        resolved[index] = replacement.clone();
                    }
                    None => tracing::info!(index, "no candidate, keeping original locator"),
                }
                repairs.push(BatchRepair {
                    index,
                    original: locators[index].clone(),
                    replacement: candidate,
                });
            }
        }

        let still_missing: Vec<usize> = resolved
            .iter()
            .enumerate()
            .filter(|(_, locator)| !self.discover(driver, locator))
            .map(|(index, _)| index)
            .collect();

        let outcome = if !still_missing.is_empty() {
            tracing::error!(missing = ?still_missing, "batch failed final check");
            BatchOutcome::Failed
        } else if damaged.is_empty() {
            BatchOutcome::AllPresent
        } else {
            BatchOutcome::Healed
        };
        tracing::info!(outcome = ?outcome, "batch validation finished");

        BatchReport {
            locators: resolved,
            found,
            repairs,
            still_missing,
            snapshot_path,
            outcome,
        }
    }

    /// One snapshot and one oracle call for every damaged locator
    #[allow(clippy::type_complexity)]
    fn repair(
        &self,
        driver: &dyn DocumentDriver,
        damaged: &[Locator],
    ) -> HealResult<(Vec<Option<Locator>>, Option<PathBuf>)> {
        let source = driver
            .page_source()
            .map_err(|e| HealError::snapshot(format!("page source unavailable: {e}")))?;
        let snapshot = self.snapshotter.capture(&source)?;
        let excerpt = self.snapshotter.trim(&snapshot.artifact, damaged);
        tracing::info!(damaged = damaged.len(), "requesting batch repair");

        let mut candidates = self.oracle.repair_many(damaged, &excerpt)?;
        candidates.resize(damaged.len(), None);
        let candidates = candidates
            .into_iter()
            .map(|c| c.filter(|l| !l.value().trim().is_empty()))
            .collect();
        Ok((candidates, snapshot.artifact_path))
    }

    /// Presence checks with scrolling in between
    fn discover(&self, driver: &dyn DocumentDriver, locator: &Locator) -> bool {
        let attempts = self.scroll.max_attempts.max(1);
        for attempt in 1..=attempts {
            if is_present(driver, locator) {
                return true;
            }
            if attempt < attempts {
                let script = format!("window.scrollBy(0, {});", self.scroll.scroll_step_px);
                if let Err(e) = driver.execute_script(&script) {
                    tracing::warn!(attempt, locator = %locator, error = %e, "scroll attempt failed");
                }
                pause(self.scroll.pause_ms);
            }
        }
        false
    }

    fn scroll_to_top(&self, driver: &dyn DocumentDriver) {
        match driver.execute_script("window.scrollTo(0, 0);") {
            Ok(_) => pause(self.scroll.reset_pause_ms),
            Err(e) => tracing::warn!(error = %e, "failed to scroll to top"),
        }
    }
}

/// Present means at least one match and the first one displayed
fn is_present(driver: &dyn DocumentDriver, locator: &Locator) -> bool {
    match driver.find_elements(locator) {
        Ok(elements) => elements.first().is_some_and(|el| el.displayed),
        Err(e) => {
            tracing::debug!(locator = %locator, error = %e, "presence check failed");
            false
        }
    }
}

fn pause(ms: u64) {
    if ms > 0 {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::StaticPageDriver;
    use crate::oracle::ScriptedOracle;
    use crate::snapshot::SnapshotConfig;

    const PAGE: &str = r#"<html><body>
        <input name="username">
        <button id="login-btn">Log in</button>
        <div style="display:none"><a id="hidden-link">x</a></div>
        <footer data-reveal-at="800"><a id="help">Help</a></footer>
    </body></html>"#;

    fn orchestrator(oracle: Arc<ScriptedOracle>) -> ValidationOrchestrator {
        ValidationOrchestrator::new(oracle)
            .with_snapshotter(DocumentSnapshotter::new(SnapshotConfig::default().without_persistence()))
            .with_scroll(ScrollOptions::default().with_pauses(0, 0))
    }

    fn session() -> (Session, Arc<StaticPageDriver>) {
        let driver = Arc::new(StaticPageDriver::new(PAGE));
        (Session::from_arc(driver.clone()), driver)
    }

    mod discovery_tests {
        use super::*;

        #[test]
        fn test_all_present_no_oracle() {
            let oracle = Arc::new(ScriptedOracle::new());
            let (session, _) = session();
            let batch = vec![Locator::name("username"), Locator::id("login-btn")];
            let report = orchestrator(oracle.clone()).run(&session, &batch);
            assert_eq!(report.outcome, BatchOutcome::AllPresent);
            assert_eq!(report.found, vec![0, 1]);
            assert_eq!(report.locators, batch);
            assert_eq!(oracle.calls(), 0);
        }

        #[test]
        fn test_scroll_reveals_element() {
            let oracle = Arc::new(ScriptedOracle::new());
            let (session, driver) = session();
            let report = orchestrator(oracle.clone()).run(&session, &[Locator::id("help")]);
            assert_eq!(report.outcome, BatchOutcome::AllPresent);
            assert_eq!(driver.call_count("execute_script:window.scrollBy"), 2);
            assert_eq!(oracle.calls(), 0);
        }

        #[test]
        fn test_hidden_element_is_absent() {
            let oracle = Arc::new(ScriptedOracle::new());
            let (session, driver) = session();
            let orchestrator = orchestrator(oracle)
                .with_scroll(ScrollOptions::default().with_pauses(0, 0).with_max_attempts(3));
            let report = orchestrator.run(&session, &[Locator::id("hidden-link")]);
            assert_eq!(report.outcome, BatchOutcome::Failed);
            assert!(driver.was_called("execute_script:window.scrollTo(0, 0);"));
        }
    }

    mod healing_tests {
        use super::*;

        #[test]
        fn test_one_oracle_call_for_all_damaged() {
            let oracle = Arc::new(
                ScriptedOracle::new()
                    .answer(&Locator::id("user"), "//input[@name='username']")
                    .answer(&Locator::id("login"), "//button[@id='login-btn']"),
            );
            let (session, driver) = session();
            let batch = vec![Locator::id("user"), Locator::id("help"), Locator::id("login")];
            let report = orchestrator(oracle.clone()).run(&session, &batch);

            assert_eq!(report.outcome, BatchOutcome::Healed);
            assert_eq!(oracle.calls(), 1);
            assert_eq!(oracle.requests()[0], vec!["id=user".to_string(), "id=login".to_string()]);
            assert_eq!(driver.call_count("page_source"), 1);
            assert_eq!(
                report.locators,
                vec![
                    Locator::xpath("//input[@name='username']"),
                    Locator::id("help"),
                    Locator::xpath("//button[@id='login-btn']"),
                ]
            );
            assert_eq!(report.repairs.len(), 2);
            assert_eq!(report.repairs[1].index, 2);
        }

        #[test]
        fn test_partial_repair_fails_whole_batch() {
            let oracle =
                Arc::new(ScriptedOracle::new().answer(&Locator::id("user"), "//input[@name='username']"));
            let (session, _) = session();
            let batch = vec![Locator::id("user"), Locator::id("gone")];
            let report = orchestrator(oracle.clone()).run(&session, &batch);
            assert_eq!(report.outcome, BatchOutcome::Failed);
            assert_eq!(report.still_missing, vec![1]);
            assert_eq!(report.repairs[1].replacement, None);
            assert_eq!(report.locators[1], Locator::id("gone"));
            assert!(orchestrator(oracle).validate_and_heal(&session, &batch).is_empty());
        }

        #[test]
        fn test_oracle_failure_yields_empty_result() {
            let oracle = Arc::new(ScriptedOracle::new().unavailable("down"));
            let (session, _) = session();
            let out = orchestrator(oracle).validate_and_heal(&session, &[Locator::id("user")]);
            assert!(out.is_empty());
        }

        #[test]
        fn test_healing_disabled_skips_oracle() {
            let oracle =
                Arc::new(ScriptedOracle::new().answer(&Locator::id("user"), "//input[@name='username']"));
            let (session, _) = session();
            let out = session.without_healing(|| {
                orchestrator(oracle.clone()).validate_and_heal(&session, &[Locator::id("user")])
            });
            assert!(out.is_empty());
            assert_eq!(oracle.calls(), 0);
        }
    }

    #[test]
    fn test_scroll_defaults() {
        let options = ScrollOptions::default();
        assert_eq!(options.max_attempts, 5);
        assert_eq!(options.scroll_step_px, 400);
        assert_eq!(options.pause_ms, 500);
        assert_eq!(options.reset_pause_ms, 1_000);
    }
}
