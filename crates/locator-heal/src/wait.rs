//! Bounded presence waits.
//!
//! Every blocking point in the healer is bounded: lookups poll the driver
//! until the element shows up or the timeout elapses.

use crate::driver::{DocumentDriver, ElementHandle};
use crate::locator::Locator;
use crate::result::{HealError, HealResult};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for presence waits (10 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 10_000;

/// Default polling interval (250ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Timeout as a `Duration`
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Polling interval as a `Duration`
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// =============================================================================
// POLLING
// =============================================================================

/// Poll `check` until it yields a value or the timeout elapses.
///
/// The check runs at least once. `Ok(None)` means "not yet"; an error ends
/// the wait immediately.
pub fn poll_until<T, F>(options: &WaitOptions, what: &str, mut check: F) -> HealResult<T>
where
    F: FnMut() -> HealResult<Option<T>>,
{
    let start = Instant::now();
    let timeout = options.timeout();

    loop {
        if let Some(value) = check()? {
            return Ok(value);
        }
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            break;
        }
        std::thread::sleep(options.poll_interval().min(timeout - elapsed));
    }

    Err(HealError::Timeout {
        locator: what.to_string(),
        ms: options.timeout_ms,
    })
}

/// Wait until `locator` resolves to at least one element.
///
/// Lookup misses keep the poll going; an invalid locator ends it at once.
pub fn wait_for_element<D>(
    driver: &D,
    locator: &Locator,
    options: &WaitOptions,
) -> HealResult<ElementHandle>
where
    D: DocumentDriver + ?Sized,
{
    let key = locator.key();
    poll_until(options, &key, || match driver.find_element(locator) {
        Ok(element) => Ok(Some(element)),
        Err(HealError::ElementNotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    })
}
