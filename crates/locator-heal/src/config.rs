//! Healer configuration.
//!
//! Loaded from YAML, then overridden from the environment:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `HEALER_ORACLE_URL` | `oracle.endpoint` |
//! | `HEALER_ORACLE_MODEL` | `oracle.model` |
//! | `HEALER_ORACLE_TOKEN` | `oracle.api_token` |
//! | `HEALER_SNAPSHOT_DIR` | `snapshot.output_dir` |

use crate::oracle::{ChatOracle, OracleChain, OracleConfig, RepairOracle, StructuralFallbackOracle};
use crate::orchestrator::{ScrollOptions, ValidationOrchestrator};
use crate::resolver::LocatorResolver;
use crate::result::{HealError, HealResult};
use crate::snapshot::{DocumentSnapshotter, SnapshotConfig};
use crate::wait::WaitOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Environment variable overriding the oracle endpoint
pub const ENV_ORACLE_URL: &str = "HEALER_ORACLE_URL";
/// Environment variable overriding the oracle model
pub const ENV_ORACLE_MODEL: &str = "HEALER_ORACLE_MODEL";
/// Environment variable overriding the oracle token
pub const ENV_ORACLE_TOKEN: &str = "HEALER_ORACLE_TOKEN";
/// Environment variable overriding the snapshot directory
pub const ENV_SNAPSHOT_DIR: &str = "HEALER_SNAPSHOT_DIR";

/// Complete healer configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealerConfig {
    /// Repair oracle endpoint
    pub oracle: OracleConfig,
    /// Ask the structural fallback when the remote oracle has no answer
    pub structural_fallback: bool,
    /// Snapshot capture
    pub snapshot: SnapshotConfig,
    /// Presence waits
    pub wait: WaitOptions,
    /// Scroll-assisted discovery
    pub scroll: ScrollOptions,
}

impl HealerConfig {
    /// Create the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set oracle configuration
    #[must_use]
    pub fn with_oracle(mut self, oracle: OracleConfig) -> Self {
        self.oracle = oracle;
        self
    }

    /// Enable or disable the structural fallback
    #[must_use]
    pub const fn with_structural_fallback(mut self, enabled: bool) -> Self {
        self.structural_fallback = enabled;
        self
    }

    /// Set snapshot configuration
    #[must_use]
    pub fn with_snapshot(mut self, snapshot: SnapshotConfig) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Set wait options
    #[must_use]
    pub const fn with_wait(mut self, wait: WaitOptions) -> Self {
        self.wait = wait;
        self
    }

    /// Set scroll options
    #[must_use]
    pub const fn with_scroll(mut self, scroll: ScrollOptions) -> Self {
        self.scroll = scroll;
        self
    }

    /// Parse a YAML document; missing fields take their defaults
    pub fn from_yaml_str(yaml: &str) -> HealResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file and apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> HealResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&yaml)?;
        config.apply_env();
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded healer configuration");
        Ok(config)
    }

    /// Serialize as YAML
    pub fn to_yaml(&self) -> HealResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from any variable lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(endpoint) = set(ENV_ORACLE_URL) {
            self.oracle.endpoint = endpoint;
        }
        if let Some(model) = set(ENV_ORACLE_MODEL) {
            self.oracle.model = model;
        }
        if let Some(token) = set(ENV_ORACLE_TOKEN) {
            self.oracle.api_token = token;
        }
        if let Some(dir) = set(ENV_SNAPSHOT_DIR) {
            self.snapshot.output_dir = Some(PathBuf::from(dir));
        }
    }

    /// Reject settings that would make every wait or call fail immediately
    pub fn validate(&self) -> HealResult<()> {
        if self.oracle.endpoint.trim().is_empty() {
            return Err(HealError::config("oracle.endpoint must not be empty"));
        }
        if self.oracle.connect_timeout_ms == 0 || self.oracle.read_timeout_ms == 0 {
            return Err(HealError::config("oracle timeouts must be greater than zero"));
        }
        if self.wait.timeout_ms == 0 {
            return Err(HealError::config("wait.timeout_ms must be greater than zero"));
        }
        if self.wait.poll_interval_ms == 0 {
            return Err(HealError::config("wait.poll_interval_ms must be greater than zero"));
        }
        if self.scroll.max_attempts == 0 {
            return Err(HealError::config("scroll.max_attempts must be greater than zero"));
        }
        Ok(())
    }

    /// Build the repair oracle; `offline` uses only the structural fallback
    pub fn build_oracle(&self, offline: bool) -> HealResult<Arc<dyn RepairOracle>> {
        if offline {
            return Ok(Arc::new(StructuralFallbackOracle::new()));
        }
        let remote = ChatOracle::new(&self.oracle)?;
        if self.structural_fallback {
            Ok(Arc::new(
                OracleChain::new()
                    .with(remote)
                    .with(StructuralFallbackOracle::new()),
            ))
        } else {
            Ok(Arc::new(remote))
        }
    }

    /// Snapshotter for this configuration
    #[must_use]
    pub fn snapshotter(&self) -> DocumentSnapshotter {
        DocumentSnapshotter::new(self.snapshot.clone())
    }

    /// Single-locator resolver over `oracle`
    #[must_use]
    pub fn resolver(&self, oracle: Arc<dyn RepairOracle>) -> LocatorResolver {
        LocatorResolver::new(oracle)
            .with_snapshotter(self.snapshotter())
            .with_wait(self.wait)
    }

    /// Batch orchestrator over `oracle`
    #[must_use]
    pub fn orchestrator(&self, oracle: Arc<dyn RepairOracle>) -> ValidationOrchestrator {
        ValidationOrchestrator::new(oracle)
            .with_snapshotter(self.snapshotter())
            .with_scroll(self.scroll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::Locator;
    use std::collections::HashMap;

    mod yaml_tests {
        use super::*;

        #[test]
        fn test_partial_yaml_keeps_defaults() {
            let config = HealerConfig::from_yaml_str(
                "oracle:\n  endpoint: http://oracle:9000\nscroll:\n  max_attempts: 2\n",
            )
            .unwrap();
            assert_eq!(config.oracle.endpoint, "http://oracle:9000");
            assert_eq!(config.oracle.model, OracleConfig::default().model);
            assert_eq!(config.scroll.max_attempts, 2);
            assert_eq!(config.scroll.scroll_step_px, 400);
            assert_eq!(config.wait, WaitOptions::default());
        }

        #[test]
        fn test_yaml_round_trip() {
            let config = HealerConfig::new()
                .with_structural_fallback(true)
                .with_snapshot(SnapshotConfig::default().without_persistence());
            let yaml = config.to_yaml().unwrap();
            assert_eq!(HealerConfig::from_yaml_str(&yaml).unwrap(), config);
        }

        #[test]
        fn test_invalid_yaml_is_error() {
            assert!(matches!(
                HealerConfig::from_yaml_str("oracle: [1, 2"),
                Err(HealError::Yaml(_))
            ));
        }

        #[test]
        fn test_from_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("healer.yaml");
            std::fs::write(&path, "wait:\n  timeout_ms: 1500\n").unwrap();
            let config = HealerConfig::from_file(&path).unwrap();
            assert_eq!(config.wait.timeout_ms, 1500);
            assert!(matches!(
                HealerConfig::from_file(dir.path().join("missing.yaml")),
                Err(HealError::Io(_))
            ));
        }
    }

    mod override_tests {
        use super::*;

        #[test]
        fn test_overrides_apply() {
            let vars: HashMap<&str, &str> = [
                (ENV_ORACLE_URL, "http://override:1"),
                (ENV_ORACLE_MODEL, "repair-7b"),
                (ENV_ORACLE_TOKEN, "secret"),
                (ENV_SNAPSHOT_DIR, "/tmp/snaps"),
            ]
            .into_iter()
            .collect();
            let mut config = HealerConfig::new();
            config.apply_overrides(|name| vars.get(name).map(|v| (*v).to_string()));
            assert_eq!(config.oracle.endpoint, "http://override:1");
            assert_eq!(config.oracle.model, "repair-7b");
            assert_eq!(config.oracle.api_token, "secret");
            assert_eq!(config.snapshot.output_dir, Some(PathBuf::from("/tmp/snaps")));
        }

        #[test]
        fn test_blank_override_ignored() {
            let mut config = HealerConfig::new();
            config.apply_overrides(|_| Some("  ".to_string()));
            assert_eq!(config, HealerConfig::new());
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn test_default_is_valid() {
            assert!(HealerConfig::new().validate().is_ok());
        }

        #[test]
        fn test_rejects_empty_endpoint() {
            let config = HealerConfig::new().with_oracle(OracleConfig::default().with_endpoint(""));
            assert!(matches!(config.validate(), Err(HealError::Config { .. })));
        }

        #[test]
        fn test_rejects_zero_values() {
            let zero_wait = HealerConfig::new().with_wait(WaitOptions::default().with_timeout(0));
            assert!(zero_wait.validate().is_err());
            let zero_scroll =
                HealerConfig::new().with_scroll(ScrollOptions::default().with_max_attempts(0));
            assert!(zero_scroll.validate().is_err());
            let zero_oracle =
                HealerConfig::new().with_oracle(OracleConfig::default().with_timeouts(0, 10));
            assert!(zero_oracle.validate().is_err());
        }

        #[test]
        fn test_yaml_validation_error() {
            let err = HealerConfig::from_yaml_str("scroll:\n  max_attempts: 0\n").unwrap_err();
            assert!(err.to_string().contains("max_attempts"));
        }
    }

    #[test]
    fn test_offline_oracle_builds_without_network() {
        let oracle = HealerConfig::new().build_oracle(true).unwrap();
        let out = oracle
            .repair_one(&Locator::id("login"), "<html><body><button id=\"login-btn\">Log in</button></body></html>")
            .unwrap();
        assert!(out.is_some());
    }
}
