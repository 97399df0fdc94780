//! Healed-locator cache.
//!
//! Maps the canonical key of a locator that failed to the replacement that
//! was found for it. Entries live as long as the cache: there is no expiry,
//! so a replacement that later goes stale keeps being used (and fails as a
//! plain lookup miss) until the cache is cleared.

use crate::locator::Locator;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// One original-to-replacement mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealedMapping {
    /// Canonical key of the original locator
    pub original: String,
    /// Replacement locator
    pub replacement: Locator,
}

/// Concurrency-safe map of healed locators
#[derive(Debug, Default)]
pub struct HealedLocatorCache {
    entries: RwLock<HashMap<String, Locator>>,
}

impl HealedLocatorCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replacement recorded for `original`
    #[must_use]
    pub fn get(&self, original: &Locator) -> Option<Locator> {
        self.get_key(&original.key())
    }

    /// Replacement recorded for a canonical key
    #[must_use]
    pub fn get_key(&self, key: &str) -> Option<Locator> {
        self.entries
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(key)
            .cloned()
    }

    /// Record a replacement, returning the one it displaced
    pub fn insert(&self, original: &Locator, replacement: Locator) -> Option<Locator> {
        let key = original.key();
        tracing::debug!(original = %key, replacement = %replacement, "caching healed locator");
        self.entries
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(key, replacement)
    }

    /// Number of mappings
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All mappings, sorted by original key
    #[must_use]
    pub fn entries(&self) -> Vec<HealedMapping> {
        let mut mappings: Vec<HealedMapping> = self
            .entries
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .map(|(original, replacement)| HealedMapping {
                original: original.clone(),
                replacement: replacement.clone(),
            })
            .collect();
        mappings.sort_by(|a, b| a.original.cmp(&b.original));
        mappings
    }

    /// Drop every mapping
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .clear();
    }
}
