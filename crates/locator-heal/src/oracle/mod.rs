//! Repair oracles: turn damaged locators plus a document excerpt into
//! replacement candidates.
//!
//! - **Client**: [`ChatOracle`], an OpenAI-compatible chat completions endpoint
//! - **Fallback**: [`StructuralFallbackOracle`], deterministic and offline
//! - **Chain**: [`OracleChain`], first oracle with an answer wins
//! - **Scripted**: [`ScriptedOracle`], canned answers for tests

pub mod client;
pub mod fallback;
pub mod parse;
pub mod prompt;

pub use client::{BatchProtocol, ChatMessage, ChatOracle, ChatRequest, OracleConfig, Role};
pub use fallback::StructuralFallbackOracle;
pub use prompt::HealingRequest;

use crate::locator::Locator;
use crate::result::{HealError, HealResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Source of replacement locators
pub trait RepairOracle: Send + Sync {
    /// Propose a replacement for one damaged locator
    fn repair_one(&self, damaged: &Locator, excerpt: &str) -> HealResult<Option<Locator>>;

    /// Propose replacements for a batch; the result has one slot per input
    fn repair_many(&self, damaged: &[Locator], excerpt: &str) -> HealResult<Vec<Option<Locator>>>;
}

// =============================================================================
// ORACLE CHAIN
// =============================================================================

/// Tries oracles in order; per position, the first candidate wins
///
/// An error from one oracle is logged and the next one is asked. The chain
/// only fails when every oracle failed.
#[derive(Default)]
pub struct OracleChain {
    oracles: Vec<Box<dyn RepairOracle>>,
}

impl std::fmt::Debug for OracleChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleChain")
            .field("oracles", &self.oracles.len())
            .finish()
    }
}

impl OracleChain {
    /// Create an empty chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an oracle
    #[must_use]
    pub fn with(mut self, oracle: impl RepairOracle + 'static) -> Self {
        self.oracles.push(Box::new(oracle));
        self
    }

    /// Number of oracles
    #[must_use]
    pub fn len(&self) -> usize {
        self.oracles.len()
    }

    /// Whether the chain has no oracles
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.oracles.is_empty()
    }
}

impl RepairOracle for OracleChain {
    fn repair_one(&self, damaged: &Locator, excerpt: &str) -> HealResult<Option<Locator>> {
        let mut last_error = None;
        let mut answered = false;
        for (position, oracle) in self.oracles.iter().enumerate() {
            match oracle.repair_one(damaged, excerpt) {
                Ok(Some(candidate)) => return Ok(Some(candidate)),
                Ok(None) => answered = true,
                Err(e) => {
                    tracing::warn!(oracle = position, error = %e, "oracle failed, trying next");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) if !answered => Err(e),
            _ => Ok(None),
        }
    }

    fn repair_many(&self, damaged: &[Locator], excerpt: &str) -> HealResult<Vec<Option<Locator>>> {
        let mut results: Vec<Option<Locator>> = vec![None; damaged.len()];
        let mut last_error = None;
        let mut answered = false;

        for (position, oracle) in self.oracles.iter().enumerate() {
            let pending: Vec<usize> = (0..damaged.len()).filter(|&i| results[i].is_none()).collect();
            if pending.is_empty() {
                break;
            }
            let subset: Vec<Locator> = pending.iter().map(|&i| damaged[i].clone()).collect();
            match oracle.repair_many(&subset, excerpt) {
                Ok(candidates) => {
                    answered = true;
                    for (&i, candidate) in pending.iter().zip(candidates) {
                        results[i] = candidate;
                    }
                }
                Err(e) => {
                    tracing::warn!(oracle = position, error = %e, "oracle failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !answered => Err(e),
            _ => Ok(results),
        }
    }
}

// =============================================================================
// SCRIPTED ORACLE
// =============================================================================

/// Oracle with canned answers keyed by damaged locator key, for tests
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    answers: HashMap<String, String>,
    failure: Option<String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<String>>>,
}

impl ScriptedOracle {
    /// Create an oracle that knows no answers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `damaged` with the raw candidate text `answer`
    #[must_use]
    pub fn answer(mut self, damaged: &Locator, answer: impl Into<String>) -> Self {
        self.answers.insert(damaged.key(), answer.into());
        self
    }

    /// Fail every call as unavailable
    #[must_use]
    pub fn unavailable(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Number of oracle calls made (single or batch)
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Damaged keys of every request, in call order
    #[must_use]
    pub fn requests(&self) -> Vec<Vec<String>> {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    fn record(&self, damaged: &[Locator]) -> HealResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(damaged.iter().map(Locator::key).collect());
        match &self.failure {
            Some(message) => Err(HealError::oracle_unavailable(message.clone())),
            None => Ok(()),
        }
    }

    fn lookup(&self, damaged: &Locator) -> Option<Locator> {
        self.answers
            .get(&damaged.key())
            .map(|raw| Locator::from_candidate(raw))
    }
}

impl RepairOracle for ScriptedOracle {
    fn repair_one(&self, damaged: &Locator, _excerpt: &str) -> HealResult<Option<Locator>> {
        self.record(std::slice::from_ref(damaged))?;
        Ok(self.lookup(damaged))
    }

    fn repair_many(&self, damaged: &[Locator], _excerpt: &str) -> HealResult<Vec<Option<Locator>>> {
        self.record(damaged)?;
        Ok(damaged.iter().map(|d| self.lookup(d)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod scripted_tests {
        use super::*;

        #[test]
        fn test_answers_and_counts() {
            let oracle = ScriptedOracle::new().answer(&Locator::id("old"), "//a[@id='new']");
            assert_eq!(
                oracle.repair_one(&Locator::id("old"), "").unwrap(),
                Some(Locator::xpath("//a[@id='new']"))
            );
            assert_eq!(oracle.repair_one(&Locator::id("other"), "").unwrap(), None);
            assert_eq!(oracle.calls(), 2);
            assert_eq!(oracle.requests()[1], vec!["id=other".to_string()]);
        }

        #[test]
        fn test_unavailable() {
            let oracle = ScriptedOracle::new().unavailable("down");
            assert!(matches!(
                oracle.repair_many(&[Locator::id("a")], ""),
                Err(HealError::OracleUnavailable { .. })
            ));
            assert_eq!(oracle.calls(), 1);
        }
    }

    mod chain_tests {
        use super::*;

        #[test]
        fn test_first_answer_wins() {
            let chain = OracleChain::new()
                .with(ScriptedOracle::new().answer(&Locator::id("a"), "id=first"))
                .with(ScriptedOracle::new().answer(&Locator::id("a"), "id=second"));
            assert_eq!(
                chain.repair_one(&Locator::id("a"), "").unwrap(),
                Some(Locator::id("first"))
            );
        }

        #[test]
        fn test_error_falls_through() {
            let chain = OracleChain::new()
                .with(ScriptedOracle::new().unavailable("down"))
                .with(ScriptedOracle::new().answer(&Locator::id("a"), "id=b"));
            assert_eq!(
                chain.repair_one(&Locator::id("a"), "").unwrap(),
                Some(Locator::id("b"))
            );
        }

        #[test]
        fn test_all_failed_is_error() {
            let chain = OracleChain::new()
                .with(ScriptedOracle::new().unavailable("one"))
                .with(ScriptedOracle::new().unavailable("two"));
            let err = chain.repair_one(&Locator::id("a"), "").unwrap_err();
            assert!(err.to_string().contains("two"));
        }

        #[test]
        fn test_batch_fills_gaps_positionally() {
            let chain = OracleChain::new()
                .with(ScriptedOracle::new().answer(&Locator::id("b"), "id=b2"))
                .with(
                    ScriptedOracle::new()
                        .answer(&Locator::id("a"), "id=a2")
                        .answer(&Locator::id("b"), "id=ignored"),
                );
            let out = chain
                .repair_many(&[Locator::id("a"), Locator::id("b"), Locator::id("c")], "")
                .unwrap();
            assert_eq!(
                out,
                vec![Some(Locator::id("a2")), Some(Locator::id("b2")), None]
            );
        }

        #[test]
        fn test_empty_chain() {
            let chain = OracleChain::new();
            assert!(chain.is_empty());
            assert_eq!(chain.repair_one(&Locator::id("a"), "").unwrap(), None);
        }
    }
}
