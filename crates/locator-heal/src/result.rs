//! Result and error types for locator healing.

use thiserror::Error;

/// Result type for healing operations
pub type HealResult<T> = Result<T, HealError>;

/// Errors that can occur while resolving or healing locators
#[derive(Debug, Error)]
pub enum HealError {
    /// Neither the original nor any healed locator resolved in time
    #[error("Element not found for locator {locator}{}", describe_cause(.source))]
    ElementNotFound {
        /// Canonical key of the original locator
        locator: String,
        /// What ended the last resolution attempt
        #[source]
        source: Option<Box<HealError>>,
    },

    /// Repair oracle could not be reached or returned a non-success status
    #[error("Repair oracle unavailable: {message}")]
    OracleUnavailable {
        /// Error message
        message: String,
    },

    /// Repair oracle answered but produced no usable candidate
    #[error("Healing failed: {message}")]
    HealingFailed {
        /// Error message
        message: String,
    },

    /// Document markup could not be captured or persisted
    #[error("Snapshot capture failed: {message}")]
    SnapshotCaptureFailed {
        /// Error message
        message: String,
    },

    /// Presence wait elapsed
    #[error("Timed out after {ms}ms waiting for {locator}")]
    Timeout {
        /// Canonical key of the locator waited for
        locator: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Locator cannot be parsed or executed
    #[error("Invalid locator: {message}")]
    InvalidLocator {
        /// Error message
        message: String,
    },

    /// Error reported by the document driver
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

fn describe_cause(cause: &Option<Box<HealError>>) -> String {
    cause
        .as_deref()
        .map(|c| format!(" (caused by: {c})"))
        .unwrap_or_default()
}

impl HealError {
    /// Element-not-found error for the given locator key
    #[must_use]
    pub fn not_found(locator: impl Into<String>, cause: Option<Self>) -> Self {
        Self::ElementNotFound {
            locator: locator.into(),
            source: cause.map(Box::new),
        }
    }

    /// Create an oracle-unavailable error
    #[must_use]
    pub fn oracle_unavailable(message: impl Into<String>) -> Self {
        Self::OracleUnavailable {
            message: message.into(),
        }
    }

    /// Create a healing-failed error
    #[must_use]
    pub fn healing_failed(message: impl Into<String>) -> Self {
        Self::HealingFailed {
            message: message.into(),
        }
    }

    /// Create a snapshot-capture error
    #[must_use]
    pub fn snapshot(message: impl Into<String>) -> Self {
        Self::SnapshotCaptureFailed {
            message: message.into(),
        }
    }

    /// Create an invalid-locator error
    #[must_use]
    pub fn invalid_locator(message: impl Into<String>) -> Self {
        Self::InvalidLocator {
            message: message.into(),
        }
    }

    /// Create a driver error
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// The cause attached to an `ElementNotFound`, if any
    #[must_use]
    pub fn cause(&self) -> Option<&Self> {
        match self {
            Self::ElementNotFound { source, .. } => source.as_deref(),
            _ => None,
        }
    }

    /// Whether this error is part of the healing taxonomy that degrades to
    /// the original lookup failure instead of aborting.
    #[must_use]
    pub const fn is_recoverable_healing_error(&self) -> bool {
        matches!(
            self,
            Self::OracleUnavailable { .. }
                | Self::HealingFailed { .. }
                | Self::SnapshotCaptureFailed { .. }
        )
    }
}
