//! Reference stack semantics
//!
//! How a root-first stack of rule sets decides an action:
//!
//! 1. any matching `deny` in any layer denies;
//! 2. the root layer must have a matching `allow` (it is the ceiling);
//! 3. every other layer that declares allowances must also have a matching
//!    `allow`; a layer without allow rules only restricts.
//!
//! Appending a layer can therefore only remove allowances, which is the
//! tighten-only property the console relies on.

use crate::rule::RuleSet;

/// Verdict of a stack for one action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackVerdict {
    /// Granted by the whole chain
    Allow,
    /// A layer denied it (index into the stack)
    DeniedBy(usize),
    /// A layer did not grant it (index into the stack)
    NotGrantedBy(usize),
    /// Empty stack
    NoLayers,
}

impl StackVerdict {
    /// Whether the verdict grants
    pub fn is_allow(&self) -> bool {
        matches!(self, StackVerdict::Allow)
    }
}

/// Decide `action` under `input` for a root-first stack
pub fn evaluate_stack(
    layers: &[&RuleSet],
    action: &str,
    input: &serde_json::Value,
) -> StackVerdict {
    if layers.is_empty() {
        return StackVerdict::NoLayers;
    }
    for (idx, layer) in layers.iter().enumerate() {
        if layer.denies().any(|r| r.matches(action, input)) {
            return StackVerdict::DeniedBy(idx);
        }
    }
    for (idx, layer) in layers.iter().enumerate() {
        let must_grant = idx == 0 || layer.declares_allowances();
        if must_grant && !layer.allows().any(|r| r.matches(action, input)) {
            return StackVerdict::NotGrantedBy(idx);
        }
    }
    StackVerdict::Allow
}
