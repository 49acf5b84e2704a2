//! Console configuration
//!
//! Loaded from TOML. Every section and field has a default, so an empty file
//! is a valid configuration.
//!
//! ```toml
//! [reconciliation]
//! conflict_banner_ms = 5000
//! synthetic_banner_ms = 8000
//!
//! [policy]
//! write_routing = "parent_authority"
//! ```

use crate::backoff::BackoffStrategy;
use crate::errors::{ConsoleError, ConsoleResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Seat mutation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeatConfig {
    /// Publish a `cas_ok:false` notification when a CAS is rejected
    pub publish_conflicts: bool,
}

impl Default for SeatConfig {
    fn default() -> Self {
        Self {
            publish_conflicts: true,
        }
    }
}

/// Reconciliation loop settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Lifetime of the conflict indicator
    pub conflict_banner_ms: u64,
    /// Lifetime of the synthetic-policy warning
    pub synthetic_banner_ms: u64,
    /// First reconnect delay
    pub reconnect_initial_ms: u64,
    /// Reconnect delay cap
    pub reconnect_max_ms: u64,
    /// Reconnect delay schedule
    pub backoff: BackoffStrategy,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            conflict_banner_ms: 5_000,
            synthetic_banner_ms: 8_000,
            reconnect_initial_ms: 250,
            reconnect_max_ms: 10_000,
            backoff: BackoffStrategy::ExponentialWithJitter,
        }
    }
}

impl ReconciliationConfig {
    /// Conflict indicator lifetime
    pub fn conflict_ttl(&self) -> Duration {
        Duration::from_millis(self.conflict_banner_ms)
    }

    /// Synthetic warning lifetime
    pub fn synthetic_ttl(&self) -> Duration {
        Duration::from_millis(self.synthetic_banner_ms)
    }

    /// First reconnect delay
    pub fn reconnect_initial(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_ms)
    }

    /// Reconnect delay cap
    pub fn reconnect_max(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms)
    }
}

/// Which domain physically commits a domain's local policy slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteRouting {
    /// The parent commits; roots commit their own slot
    ParentAuthority,
    /// Every domain commits its own slot
    SelfAuthority,
}

impl Default for WriteRouting {
    fn default() -> Self {
        Self::ParentAuthority
    }
}

/// Policy engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Write-target decision rule
    pub write_routing: WriteRouting,
    /// Query path submitted to the evaluator
    pub query: String,
    /// Longest ancestor chain accepted before the tree is considered corrupt
    pub max_chain_depth: usize,
    /// Run the structural tighten-only pre-check before the evaluator
    pub structural_precheck: bool,
    /// Input document used when validating candidates
    pub representative_input: serde_json::Value,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            write_routing: WriteRouting::ParentAuthority,
            query: "data.triad.flow.allow".to_string(),
            max_chain_depth: 64,
            structural_precheck: true,
            representative_input: serde_json::json!({
                "action": "console.validate",
                "direction": "lateral",
                "parent_approved": false,
                "triad": {
                    "seats": {"terra": "OCCUPIED", "numen": "OCCUPIED", "lima": "OCCUPIED"},
                    "complete": true
                }
            }),
        }
    }
}

/// Flow evaluator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Append a receipt for every decision
    pub audit_decisions: bool,
    /// Publish a `flow.decision` notification for every decision
    pub publish_decisions: bool,
    /// Message attached to decisions made under a synthetic domain
    pub synthetic_message: String,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            audit_decisions: true,
            publish_decisions: true,
            synthetic_message: "decision made under a synthetic fallback domain".to_string(),
        }
    }
}

/// Complete console configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// `[seats]`
    pub seats: SeatConfig,
    /// `[reconciliation]`
    pub reconciliation: ReconciliationConfig,
    /// `[policy]`
    pub policy: PolicyConfig,
    /// `[flow]`
    pub flow: FlowConfig,
}

impl ConsoleConfig {
    /// Parse and validate TOML text
    pub fn from_toml_str(text: &str) -> ConsoleResult<Self> {
        let config: ConsoleConfig = toml::from_str(text)
            .map_err(|e| ConsoleError::invalid(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: &Path) -> ConsoleResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ConsoleError::invalid(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject values that would break timing or resolution
    pub fn validate(&self) -> ConsoleResult<()> {
        let r = &self.reconciliation;
        if r.conflict_banner_ms == 0 || r.synthetic_banner_ms == 0 {
            return Err(ConsoleError::invalid("banner lifetimes must be non-zero"));
        }
        if r.reconnect_initial_ms == 0 {
            return Err(ConsoleError::invalid("reconnect_initial_ms must be non-zero"));
        }
        if r.reconnect_max_ms < r.reconnect_initial_ms {
            return Err(ConsoleError::invalid(
                "reconnect_max_ms must not be below reconnect_initial_ms",
            ));
        }
        if self.policy.max_chain_depth == 0 {
            return Err(ConsoleError::invalid("max_chain_depth must be non-zero"));
        }
        if self.policy.query.trim().is_empty() {
            return Err(ConsoleError::invalid("policy query must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = ConsoleConfig::from_toml_str("").unwrap();
        assert_eq!(config, ConsoleConfig::default());
        assert_eq!(config.reconciliation.conflict_ttl(), Duration::from_secs(5));
        assert_eq!(config.reconciliation.synthetic_ttl(), Duration::from_secs(8));
        assert_eq!(config.policy.write_routing, WriteRouting::ParentAuthority);
    }

    #[test]
    fn partial_sections_override() {
        let config = ConsoleConfig::from_toml_str(
            r#"
            [policy]
            write_routing = "self_authority"

            [reconciliation]
            backoff = "fixed"
            reconnect_initial_ms = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.policy.write_routing, WriteRouting::SelfAuthority);
        assert_eq!(config.reconciliation.backoff, BackoffStrategy::Fixed);
        assert_eq!(config.reconciliation.conflict_banner_ms, 5_000);
    }

    #[test]
    fn rejects_inverted_backoff_bounds() {
        let err = ConsoleConfig::from_toml_str(
            r#"
            [reconciliation]
            reconnect_initial_ms = 500
            reconnect_max_ms = 100
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConsoleError::Invalid { .. }));
    }

    #[test]
    fn rejects_unknown_routing() {
        assert!(ConsoleConfig::from_toml_str("[policy]\nwrite_routing = \"sideways\"").is_err());
    }
}
