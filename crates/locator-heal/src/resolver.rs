//! Self-healing locator resolution.
//!
//! # State machine
//!
//! ```text
//! Initial ──cached──────────────────────────────► ResolvedFromCache | Failed
//!    │
//!    ├──healing disabled── single attempt ──────► Resolved | Failed
//!    │
//!    ├──found──────────────────────────────────► Resolved
//!    ▼
//! Waiting ──found within timeout────────────────► ResolvedAfterWait
//!    │
//!    ▼
//! Healing ── snapshot ─ trim ─ repair_one ─ cache ─ wait ──► ResolvedAfterHeal | Failed
//! ```
//!
//! Once a replacement is cached for a key, every later resolution of that
//! key goes straight to the replacement: no wait, no snapshot, no oracle.

use crate::cache::HealedLocatorCache;
use crate::context::Session;
use crate::driver::ElementHandle;
use crate::locator::Locator;
use crate::oracle::RepairOracle;
use crate::result::{HealError, HealResult};
use crate::snapshot::DocumentSnapshotter;
use crate::wait::WaitOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Resolution state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
    /// Nothing attempted yet
    Initial,
    /// Original locator matched on the first attempt
    Resolved,
    /// Cached replacement matched
    ResolvedFromCache,
    /// Polling for the original locator
    Waiting,
    /// Original locator matched within the wait
    ResolvedAfterWait,
    /// Asking the oracle for a replacement
    Healing,
    /// Replacement matched
    ResolvedAfterHeal,
    /// Every option exhausted
    Failed,
}

impl ResolutionState {
    /// Whether this state ends resolution successfully
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(
            self,
            Self::Resolved | Self::ResolvedFromCache | Self::ResolvedAfterWait | Self::ResolvedAfterHeal
        )
    }

    /// Snake-case name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Resolved => "resolved",
            Self::ResolvedFromCache => "resolved_from_cache",
            Self::Waiting => "waiting",
            Self::ResolvedAfterWait => "resolved_after_wait",
            Self::Healing => "healing",
            Self::ResolvedAfterHeal => "resolved_after_heal",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ResolutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a successful resolution
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    /// Element found
    pub element: ElementHandle,
    /// Locator that found it (original or replacement)
    pub locator: Locator,
    /// Final state
    pub state: ResolutionState,
    /// States visited, in order
    pub trace: Vec<ResolutionState>,
}

impl Resolution {
    /// Whether a replacement locator was used
    #[must_use]
    pub const fn was_healed(&self) -> bool {
        matches!(
            self.state,
            ResolutionState::ResolvedFromCache | ResolutionState::ResolvedAfterHeal
        )
    }
}

/// Resolves locators against a session's document, healing on failure
///
/// One resolver can serve many sessions on many threads; the healed-locator
/// cache it owns is shared by all of them.
pub struct LocatorResolver {
    oracle: Arc<dyn RepairOracle>,
    cache: Arc<HealedLocatorCache>,
    snapshotter: DocumentSnapshotter,
    wait: WaitOptions,
}

impl fmt::Debug for LocatorResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocatorResolver")
            .field("cache", &self.cache)
            .field("snapshotter", &self.snapshotter)
            .field("wait", &self.wait)
            .finish_non_exhaustive()
    }
}

impl LocatorResolver {
    /// Create a resolver with default wait and snapshot settings
    pub fn new(oracle: Arc<dyn RepairOracle>) -> Self {
        Self {
            oracle,
            cache: Arc::new(HealedLocatorCache::new()),
            snapshotter: DocumentSnapshotter::default(),
            wait: WaitOptions::default(),
        }
    }

    /// Share an existing cache
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<HealedLocatorCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Set the snapshotter
    #[must_use]
    pub fn with_snapshotter(mut self, snapshotter: DocumentSnapshotter) -> Self {
        self.snapshotter = snapshotter;
        self
    }

    /// Set presence-wait options
    #[must_use]
    pub const fn with_wait(mut self, wait: WaitOptions) -> Self {
        self.wait = wait;
        self
    }

    /// The healed-locator cache
    #[must_use]
    pub const fn cache(&self) -> &Arc<HealedLocatorCache> {
        &self.cache
    }

    /// Resolve `locator`, healing it if necessary
    ///
    /// Every failure is reported as `ElementNotFound` naming the original
    /// locator, with the error that ended the last attempt as its cause.
    pub fn resolve(&self, session: &Session, locator: &Locator) -> HealResult<Resolution> {
        let key = locator.key();
        let driver = session.driver();
        let mut trace = vec![ResolutionState::Initial];

        if let Some(replacement) = self.cache.get(locator) {
            tracing::debug!(session = %session.id(), locator = %key, replacement = %replacement, "using cached replacement");
            return match driver.find_element(&replacement) {
                Ok(element) => Ok(finish(element, replacement, ResolutionState::ResolvedFromCache, trace)),
                Err(e) => {
                    tracing::warn!(session = %session.id(), locator = %key, replacement = %replacement, "cached replacement no longer matches");
                    Err(failure(locator, e))
                }
            };
        }

        if !session.healing().is_enabled() {
            return driver
                .find_element(locator)
                .map(|element| finish(element, locator.clone(), ResolutionState::Resolved, trace))
                .map_err(|e| failure(locator, e));
        }

        if let Ok(element) = driver.find_element(locator) {
            return Ok(finish(element, locator.clone(), ResolutionState::Resolved, trace));
        }

        trace.push(ResolutionState::Waiting);
        match driver.wait_for(locator, &self.wait) {
            Ok(element) => {
                return Ok(finish(element, locator.clone(), ResolutionState::ResolvedAfterWait, trace));
            }
            Err(e) => {
                tracing::info!(session = %session.id(), locator = %key, error = %e, "element issue detected, healing");
            }
        }

        trace.push(ResolutionState::Healing);
        let candidate = match self.heal(session, locator) {
            Ok(candidate) => candidate,
            Err(cause) => {
                tracing::warn!(session = %session.id(), locator = %key, error = %cause, "healing failed");
                return Err(HealError::not_found(key, Some(cause)));
            }
        };

        self.cache.insert(locator, candidate.clone());
        tracing::info!(session = %session.id(), locator = %key, replacement = %candidate, "healing successful, replacement cached");

        driver
            .wait_for(&candidate, &self.wait)
            .map(|element| finish(element, candidate, ResolutionState::ResolvedAfterHeal, trace))
            .map_err(|e| HealError::not_found(key, Some(e)))
    }

    /// Resolve and return the element
    pub fn find_element(&self, session: &Session, locator: &Locator) -> HealResult<ElementHandle> {
        self.resolve(session, locator).map(|resolution| resolution.element)
    }

    /// Resolve and return every match of the locator finally used
    ///
    /// Not-found is an empty list rather than an error.
    pub fn find_elements(&self, session: &Session, locator: &Locator) -> HealResult<Vec<ElementHandle>> {
        match self.resolve(session, locator) {
            Ok(resolution) => session.driver().find_elements(&resolution.locator),
            Err(HealError::ElementNotFound { .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Snapshot, trim and ask the oracle for one replacement
    fn heal(&self, session: &Session, locator: &Locator) -> HealResult<Locator> {
        let source = session
            .driver()
            .page_source()
            .map_err(|e| HealError::snapshot(format!("page source unavailable: {e}")))?;
        let snapshot = self.snapshotter.capture(&source)?;
        let excerpt = self
            .snapshotter
            .trim(&snapshot.artifact, std::slice::from_ref(locator));
        tracing::debug!(locator = %locator, excerpt_len = excerpt.len(), "sending excerpt to oracle");

        self.oracle
            .repair_one(locator, &excerpt)?
            .ok_or_else(|| HealError::healing_failed(format!("no replacement proposed for {locator}")))
    }
}

fn finish(
    element: ElementHandle,
    locator: Locator,
    state: ResolutionState,
    mut trace: Vec<ResolutionState>,
) -> Resolution {
    trace.push(state);
    Resolution {
        element,
        locator,
        state,
        trace,
    }
}

/// Report a lookup error against the original locator
fn failure(original: &Locator, cause: HealError) -> HealError {
    match cause {
        HealError::ElementNotFound { source, .. } => HealError::ElementNotFound {
            locator: original.key(),
            source,
        },
        other => HealError::not_found(original.key(), Some(other)),
    }
}
