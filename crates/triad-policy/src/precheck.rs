//! Structural tighten-only pre-check
//!
//! Runs before the evaluator. An `allow` rule in a candidate is rejected when
//! an ancestor that declares allowances (the root always does, even when it
//! has none) has no `allow` covering it, or when an ancestor `deny` covers
//! it. Coverage is syntactic: the ancestor's pattern covers the candidate's
//! and its guards are a subset of the candidate's.

use crate::resolver::PolicyLayer;
use triad_core::PolicyHint;
use triad_rules::{Rule, RuleSet};

/// An ancestor's parsed rules
#[derive(Debug, Clone)]
pub struct AncestorRules {
    /// Ancestor domain id
    pub domain_id: String,
    /// Parsed local text
    pub rules: RuleSet,
}

impl AncestorRules {
    /// Parse a chain (nearest first) into root-first ancestor rules
    pub fn from_chain(parent_chain: &[PolicyLayer]) -> Vec<AncestorRules> {
        parent_chain
            .iter()
            .rev()
            .map(|layer| AncestorRules {
                domain_id: layer.domain_id.to_string(),
                rules: RuleSet::parse(&layer.text),
            })
            .collect()
    }
}

fn granting_gap<'a>(rule: &Rule, ancestors: &'a [AncestorRules]) -> Option<&'a AncestorRules> {
    ancestors.iter().enumerate().find_map(|(idx, ancestor)| {
        let must_grant = idx == 0 || ancestor.rules.declares_allowances();
        let granted = ancestor.rules.allows().any(|parent| parent.covers(rule));
        (must_grant && !granted).then_some(ancestor)
    })
}

fn covering_deny<'a>(
    rule: &Rule,
    ancestors: &'a [AncestorRules],
) -> Option<(&'a AncestorRules, &'a Rule)> {
    ancestors.iter().find_map(|ancestor| {
        ancestor
            .rules
            .denies()
            .find(|deny| deny.covers(rule))
            .map(|deny| (ancestor, deny))
    })
}

/// Hints for every candidate allowance the ancestors do not already grant
///
/// `ancestors` is root-first. A root candidate (no ancestors) is never
/// restricted here.
pub fn tighten_only_hints(candidate: &RuleSet, ancestors: &[AncestorRules]) -> Vec<PolicyHint> {
    if ancestors.is_empty() {
        return Vec::new();
    }
    let mut hints = Vec::new();
    for rule in candidate.allows() {
        if let Some(ancestor) = granting_gap(rule, ancestors) {
            hints.push(
                PolicyHint::new(
                    rule.line,
                    rule.column,
                    format!(
                        "'{rule}' grants more than inherited domain '{}' allows",
                        ancestor.domain_id
                    ),
                )
                .with_fix("narrow the pattern or add the parent's guards, or use 'deny' to restrict"),
            );
        } else if let Some((ancestor, deny)) = covering_deny(rule, ancestors) {
            hints.push(
                PolicyHint::new(
                    rule.line,
                    rule.column,
                    format!(
                        "'{rule}' is overridden by '{deny}' inherited from '{}'",
                        ancestor.domain_id
                    ),
                )
                .with_fix("remove the rule"),
            );
        }
    }
    hints
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ancestors(texts: &[(&str, &str)]) -> Vec<AncestorRules> {
        texts
            .iter()
            .map(|(id, text)| AncestorRules {
                domain_id: id.to_string(),
                rules: RuleSet::parse(text),
            })
            .collect()
    }

    #[test]
    fn narrower_allow_passes() {
        let chain = ancestors(&[("acme", "allow ci.*")]);
        let hints = tighten_only_hints(&RuleSet::parse("allow ci.call.*\ndeny ci.call.v0"), &chain);
        assert!(hints.is_empty());
    }

    #[test]
    fn wider_allow_is_flagged_at_its_line() {
        let chain = ancestors(&[("acme", "allow ci.*")]);
        let hints = tighten_only_hints(&RuleSet::parse("# widen\nallow *"), &chain);
        assert_eq!(hints.len(), 1);
        assert_eq!((hints[0].line, hints[0].column), (2, 1));
        assert!(hints[0].message.contains("acme"));
    }

    #[test]
    fn root_without_allows_grants_nothing() {
        let chain = ancestors(&[("acme", "deny db.*"), ("ops", "")]);
        assert_eq!(tighten_only_hints(&RuleSet::parse("allow ci.x"), &chain).len(), 1);
    }

    #[test]
    fn intermediate_allow_list_narrows() {
        let chain = ancestors(&[("acme", "allow *"), ("ops", "allow ci.read")]);
        let hints = tighten_only_hints(&RuleSet::parse("allow ci.write"), &chain);
        assert!(hints[0].message.contains("ops"));
    }

    #[test]
    fn guards_must_be_kept() {
        let chain = ancestors(&[("acme", "allow ci.* when direction == downward")]);
        assert_eq!(tighten_only_hints(&RuleSet::parse("allow ci.call"), &chain).len(), 1);
        assert!(tighten_only_hints(
            &RuleSet::parse("allow ci.call when direction == downward and parent_approved == true"),
            &chain
        )
        .is_empty());
    }

    #[test]
    fn allow_shadowed_by_ancestor_deny() {
        let chain = ancestors(&[("acme", "allow *\ndeny db.*")]);
        let hints = tighten_only_hints(&RuleSet::parse("allow db.read"), &chain);
        assert_eq!(hints.len(), 1);
        assert!(hints[0].message.contains("deny db.*"));
    }

    #[test]
    fn roots_are_unrestricted() {
        assert!(tighten_only_hints(&RuleSet::parse("allow *"), &[]).is_empty());
    }
}
