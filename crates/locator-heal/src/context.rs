//! Per-session healing state.
//!
//! A [`Session`] ties a document driver to a [`HealingContext`]. Healing is
//! on by default and can be switched off explicitly or for the duration of
//! a closure; the scoped form restores the previous value on every exit
//! path, panics included.

use crate::driver::DocumentDriver;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Whether failed lookups may trigger a repair
#[derive(Debug)]
pub struct HealingContext {
    enabled: AtomicBool,
}

impl Default for HealingContext {
    fn default() -> Self {
        Self {
            enabled: AtomicBool::new(true),
        }
    }
}

impl HealingContext {
    /// Create a context with healing enabled
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of the flag
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Set the flag
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Disable healing until the returned guard is dropped
    #[must_use = "healing is restored as soon as the guard is dropped"]
    pub fn disable(&self) -> HealingGuard<'_> {
        let previous = self.enabled.swap(false, Ordering::SeqCst);
        HealingGuard {
            context: self,
            previous,
        }
    }

    /// Run `f` with healing disabled, then restore the previous value
    pub fn without_healing<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.disable();
        f()
    }
}

/// Restores the healing flag on drop
#[derive(Debug)]
pub struct HealingGuard<'a> {
    context: &'a HealingContext,
    previous: bool,
}

impl Drop for HealingGuard<'_> {
    fn drop(&mut self) {
        self.context.enabled.store(self.previous, Ordering::SeqCst);
    }
}

/// One automation session: a driver plus its healing flag
#[derive(Clone)]
pub struct Session {
    id: Uuid,
    driver: Arc<dyn DocumentDriver>,
    healing: Arc<HealingContext>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("healing", &self.healing.is_enabled())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session over a driver, healing enabled
    pub fn new(driver: impl DocumentDriver + 'static) -> Self {
        Self::from_arc(Arc::new(driver))
    }

    /// Create a session over a shared driver
    pub fn from_arc(driver: Arc<dyn DocumentDriver>) -> Self {
        Self {
            id: Uuid::new_v4(),
            driver,
            healing: Arc::new(HealingContext::new()),
        }
    }

    /// Session identifier
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The driver
    #[must_use]
    pub fn driver(&self) -> &dyn DocumentDriver {
        self.driver.as_ref()
    }

    /// Shared handle to the driver
    #[must_use]
    pub fn driver_arc(&self) -> Arc<dyn DocumentDriver> {
        Arc::clone(&self.driver)
    }

    /// Healing flag of this session
    #[must_use]
    pub fn healing(&self) -> &HealingContext {
        &self.healing
    }

    /// Run `f` with healing disabled for this session
    pub fn without_healing<T>(&self, f: impl FnOnce() -> T) -> T {
        self.healing.without_healing(f)
    }
}
