//! Action patterns
//!
//! A pattern is either an exact action name (`ci.call.v1`), a prefix ending in
//! `*` (`ci.call.*`), or the bare wildcard `*`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Parsed action pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionPattern {
    /// Matches exactly one action name
    Exact(String),
    /// Matches every action starting with the prefix (which may be empty)
    Prefix(String),
}

impl ActionPattern {
    /// Parse a pattern token; `Err` carries the offending byte offset and reason
    pub fn parse(token: &str) -> Result<Self, (usize, String)> {
        if token.is_empty() {
            return Err((0, "empty action pattern".to_string()));
        }
        for (idx, ch) in token.char_indices() {
            let valid = ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-' | '*');
            if !valid {
                return Err((idx, format!("invalid character '{ch}' in action pattern")));
            }
            if ch == '*' && idx != token.len() - 1 {
                return Err((idx, "'*' is only allowed at the end of a pattern".to_string()));
            }
        }
        Ok(match token.strip_suffix('*') {
            Some(prefix) => ActionPattern::Prefix(prefix.to_string()),
            None => ActionPattern::Exact(token.to_string()),
        })
    }

    /// Whether the pattern matches an action name
    pub fn matches(&self, action: &str) -> bool {
        match self {
            ActionPattern::Exact(name) => name == action,
            ActionPattern::Prefix(prefix) => action.starts_with(prefix.as_str()),
        }
    }

    /// Whether every action matched by `other` is matched by `self`
    pub fn covers(&self, other: &ActionPattern) -> bool {
        match (self, other) {
            (ActionPattern::Prefix(mine), ActionPattern::Prefix(theirs)) => {
                theirs.starts_with(mine.as_str())
            }
            (ActionPattern::Prefix(mine), ActionPattern::Exact(name)) => {
                name.starts_with(mine.as_str())
            }
            (ActionPattern::Exact(mine), ActionPattern::Exact(name)) => mine == name,
            (ActionPattern::Exact(_), ActionPattern::Prefix(_)) => false,
        }
    }
}

impl fmt::Display for ActionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionPattern::Exact(name) => f.write_str(name),
            ActionPattern::Prefix(prefix) => write!(f, "{prefix}*"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> ActionPattern {
        ActionPattern::parse(s).unwrap()
    }

    #[test]
    fn wildcard_matches_everything() {
        assert!(p("*").matches("ci.call.v1"));
        assert!(p("*").covers(&p("ci.*")));
    }

    #[test]
    fn prefix_coverage() {
        assert!(p("ci.*").covers(&p("ci.call.*")));
        assert!(p("ci.*").covers(&p("ci.call.v1")));
        assert!(!p("ci.call.*").covers(&p("ci.*")));
        assert!(!p("ci.call.v1").covers(&p("ci.call.*")));
        assert!(p("ci.call.v1").covers(&p("ci.call.v1")));
    }

    #[test]
    fn rejects_inner_wildcard_and_bad_chars() {
        assert_eq!(ActionPattern::parse("ci.*.v1").unwrap_err().0, 3);
        assert!(ActionPattern::parse("ci call").is_err());
        assert!(ActionPattern::parse("").is_err());
    }

    #[test]
    fn display_round_trips() {
        for raw in ["*", "ci.*", "ci.call.v1"] {
            assert_eq!(p(raw).to_string(), raw);
        }
    }
}
