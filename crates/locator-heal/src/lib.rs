//! locator-heal: self-healing element locators for browser tests
//!
//! When a locator stops matching, the resolver captures a structural
//! snapshot of the current document, asks a repair oracle for a replacement,
//! validates it against the page and caches it for the rest of the run.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  LOCATOR-HEAL Architecture                       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Resolver / │    │ Snapshot + │    │ Repair     │            │
//! │   │ Batch      │───►│ Structural │───►│ Oracle     │            │
//! │   │ Validator  │    │ Paths      │    │ (HTTP/AST) │            │
//! │   └─────┬──────┘    └────────────┘    └─────┬──────┘            │
//! │         │          ┌────────────┐           │                   │
//! │         └─────────►│ Healed     │◄──────────┘                   │
//! │                    │ Cache      │                               │
//! │                    └────────────┘                               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use locator_heal::prelude::*;
//! use std::sync::Arc;
//!
//! let page = r#"<html><body><button id="login-btn">Log in</button></body></html>"#;
//! let session = Session::new(StaticPageDriver::new(page));
//! let oracle = Arc::new(ScriptedOracle::new().answer(&Locator::id("login"), "//button[@id='login-btn']"));
//! let resolver = LocatorResolver::new(oracle)
//!     .with_snapshotter(DocumentSnapshotter::new(SnapshotConfig::default().without_persistence()))
//!     .with_wait(WaitOptions::default().with_timeout(50).with_poll_interval(10));
//!
//! let resolution = resolver.resolve(&session, &Locator::id("login")).unwrap();
//! assert_eq!(resolution.state, ResolutionState::ResolvedAfterHeal);
//! assert_eq!(resolution.element.text, "Log in");
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

/// Healed-locator cache
pub mod cache;
/// Healer configuration (YAML plus environment overrides)
pub mod config;
/// Sessions and the per-session healing flag
pub mod context;
/// Document driver boundary and the in-memory driver
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod driver;
/// Declarative element locators
pub mod locator;
/// Repair oracles
#[allow(clippy::missing_errors_doc, clippy::doc_markdown)]
pub mod oracle;
/// Batch validation and healing
pub mod orchestrator;
/// Single-locator resolution state machine
pub mod resolver;
/// Error types
mod result;
/// Document snapshots and excerpts
pub mod snapshot;
/// Polling waits
pub mod wait;
/// Structural paths and XPath queries
#[allow(clippy::missing_const_for_fn, clippy::struct_field_names)]
pub mod xpath;

/// CDP driver (requires the `browser` feature)
#[cfg(feature = "browser")]
#[allow(clippy::missing_errors_doc, clippy::significant_drop_tightening)]
pub mod chromium;

pub use cache::{HealedLocatorCache, HealedMapping};
pub use config::HealerConfig;
pub use context::{HealingContext, HealingGuard, Session};
pub use driver::{DocumentDriver, ElementHandle, StaticPageDriver};
pub use locator::{Locator, Strategy};
pub use oracle::{
    BatchProtocol, ChatOracle, HealingRequest, OracleChain, OracleConfig, RepairOracle,
    ScriptedOracle, StructuralFallbackOracle,
};
pub use orchestrator::{
    BatchOutcome, BatchRepair, BatchReport, ScrollOptions, ValidationOrchestrator,
};
pub use resolver::{LocatorResolver, Resolution, ResolutionState};
pub use result::{HealError, HealResult};
pub use snapshot::{DocumentSnapshot, DocumentSnapshotter, SnapshotConfig};
pub use wait::WaitOptions;
pub use xpath::{ElementQuery, StructuralPathGenerator, XPathQuery};

#[cfg(feature = "browser")]
pub use chromium::{ChromiumDriver, ChromiumOptions};

/// Common imports
pub mod prelude {
    pub use super::cache::*;
    pub use super::config::*;
    pub use super::context::*;
    pub use super::driver::*;
    pub use super::locator::*;
    pub use super::oracle::{
        BatchProtocol, ChatOracle, HealingRequest, OracleChain, OracleConfig, RepairOracle,
        ScriptedOracle, StructuralFallbackOracle,
    };
    pub use super::orchestrator::*;
    pub use super::resolver::*;
    pub use super::result::*;
    pub use super::snapshot::*;
    pub use super::wait::*;
    pub use super::xpath::{ElementQuery, StructuralPathGenerator, XPathQuery};

    #[cfg(feature = "browser")]
    pub use super::chromium::*;
}
