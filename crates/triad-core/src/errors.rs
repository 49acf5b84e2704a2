//! Unified error type for console operations
//!
//! Every component reports failures through [`ConsoleError`]. The variants map
//! one-to-one onto the failure classes callers must treat differently: a
//! conflict is a re-sync signal, a transient failure is retryable and never a
//! denial, and an evaluator failure is indeterminate.

use crate::policy::PolicyHint;
use serde::{Deserialize, Serialize};

/// Unified error type for all console operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ConsoleError {
    /// Unknown identity, domain, seat or record. Terminal, never retried.
    #[error("Not found: {message}")]
    NotFound {
        /// What was looked up
        message: String,
    },

    /// Store, bus or evaluator unreachable. Retryable.
    #[error("Transient failure: {message}")]
    Transient {
        /// Description of the unreachable collaborator
        message: String,
    },

    /// CAS base mismatch. The caller must re-fetch before writing again.
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the stale base
        message: String,
    },

    /// Candidate policy (or the merged stack) failed validation. Nothing was written.
    #[error("Validation failed with {} hint(s)", .hints.len())]
    ValidationFailure {
        /// Line-addressed hints, ascending by line
        hints: Vec<PolicyHint>,
    },

    /// The policy evaluator itself failed; the outcome is indeterminate.
    #[error("Evaluator error: {message}")]
    Evaluator {
        /// Evaluator-supplied failure description
        message: String,
    },

    /// Malformed input, illegal state transition or undecodable notification
    #[error("Invalid: {message}")]
    Invalid {
        /// Description of the invalid input
        message: String,
    },

    /// Internal invariant breach
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the breach
        message: String,
    },
}

impl ConsoleError {
    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a transient (retryable) error
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a validation failure carrying hints
    pub fn validation(hints: Vec<PolicyHint>) -> Self {
        Self::ValidationFailure { hints }
    }

    /// Create an evaluator error
    pub fn evaluator(message: impl Into<String>) -> Self {
        Self::Evaluator {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether retrying the same call later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Whether the failure is final for this input
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Invalid { .. } | Self::ValidationFailure { .. }
        )
    }

    /// Short discriminator used in logs and wire responses
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Transient { .. } => "transient",
            Self::Conflict { .. } => "conflict",
            Self::ValidationFailure { .. } => "validation_failure",
            Self::Evaluator { .. } => "evaluator_error",
            Self::Invalid { .. } => "invalid",
            Self::Internal { .. } => "internal",
        }
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid(err.to_string())
    }
}

/// Standard Result type for console operations
pub type ConsoleResult<T> = std::result::Result<T, ConsoleError>;
