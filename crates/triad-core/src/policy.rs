//! Policy text, versions and validation hints

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Which slot of a domain's policy is addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyScope {
    /// The domain's own rules
    Local,
    /// The composed ancestor stack the domain inherits
    Inherited,
}

impl std::str::FromStr for PolicyScope {
    type Err = crate::ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(PolicyScope::Local),
            "inherited" => Ok(PolicyScope::Inherited),
            other => Err(crate::ConsoleError::invalid(format!(
                "unknown policy mode '{other}'"
            ))),
        }
    }
}

/// SHA-256 digest of policy text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PolicyDigest(pub [u8; 32]);

impl PolicyDigest {
    /// Digest of the given text
    pub fn of(text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        Self(hasher.finalize().into())
    }

    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a hex rendering
    pub fn from_hex(s: &str) -> Result<Self, crate::ConsoleError> {
        let bytes = hex::decode(s)
            .map_err(|e| crate::ConsoleError::invalid(format!("bad policy digest: {e}")))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| crate::ConsoleError::invalid("policy digest must be 32 bytes"))?;
        Ok(Self(arr))
    }
}

impl fmt::Display for PolicyDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for PolicyDigest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PolicyDigest {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PolicyDigest::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Version of a stored local policy slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PolicyVersion {
    /// Number of accepted writes to the slot
    pub revision: u64,
    /// Digest of the slot's text
    pub digest: PolicyDigest,
}

impl PolicyVersion {
    /// Version of text written at a given revision
    pub fn new(revision: u64, text: &str) -> Self {
        Self {
            revision,
            digest: PolicyDigest::of(text),
        }
    }
}

/// Local policy slot as held by the policy store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPolicy {
    /// Policy text
    pub text: String,
    /// Slot version
    pub version: PolicyVersion,
}

/// Line-addressed validation hint, relative to the candidate text
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyHint {
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
    /// What is wrong
    pub message: String,
    /// Suggested replacement or action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
}

impl PolicyHint {
    /// Hint without a suggested fix
    pub fn new(line: u32, column: u32, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
            suggested_fix: None,
        }
    }

    /// Attach a suggested fix
    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }
}

/// Outcome of validating a candidate policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True iff there are no hints
    pub success: bool,
    /// Hints ordered ascending by line, then column
    pub hints: Vec<PolicyHint>,
}

impl ValidationReport {
    /// Build a report, sorting the hints and deriving `success`
    pub fn from_hints(mut hints: Vec<PolicyHint>) -> Self {
        hints.sort_by(|a, b| (a.line, a.column).cmp(&(b.line, b.column)));
        Self {
            success: hints.is_empty(),
            hints,
        }
    }

    /// Convert a failed report into a `ValidationFailure` error
    pub fn into_result(self) -> crate::ConsoleResult<()> {
        if self.success {
            Ok(())
        } else {
            Err(crate::ConsoleError::validation(self.hints))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_and_hex_encoded() {
        let a = PolicyDigest::of("allow *");
        let b = PolicyDigest::of("allow *");
        assert_eq!(a, b);
        assert_eq!(a.to_hex().len(), 64);
        assert_eq!(PolicyDigest::from_hex(&a.to_hex()).unwrap(), a);
        assert_ne!(a, PolicyDigest::of("deny *"));
    }

    #[test]
    fn report_sorts_hints_by_line() {
        let report = ValidationReport::from_hints(vec![
            PolicyHint::new(7, 1, "late"),
            PolicyHint::new(2, 5, "early"),
            PolicyHint::new(2, 1, "earliest"),
        ]);
        assert!(!report.success);
        let lines: Vec<_> = report.hints.iter().map(|h| (h.line, h.column)).collect();
        assert_eq!(lines, vec![(2, 1), (2, 5), (7, 1)]);
    }

    #[test]
    fn empty_report_succeeds() {
        let report = ValidationReport::from_hints(Vec::new());
        assert!(report.success);
        assert!(report.into_result().is_ok());
    }
}
