//! Rule lines
//!
//! One rule per line:
//!
//! ```text
//! # comment
//! allow ci.call.*
//! allow ci.deploy.* when direction == downward and parent_approved == true
//! deny  ci.call.v0
//! ```
//!
//! Condition keys are dotted paths into the input document
//! (`direction`, `context.env`, `triad.seats.lima`). Values are bare tokens or
//! double-quoted strings and compare against the input value's string form.

use crate::pattern::ActionPattern;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rule effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    /// Grants when matched
    Allow,
    /// Forbids when matched
    Deny,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Allow => f.write_str("allow"),
            Effect::Deny => f.write_str("deny"),
        }
    }
}

/// `key == value` guard
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Condition {
    /// Dotted path into the input document
    pub key: String,
    /// Expected string form of the value
    pub value: String,
}

impl Condition {
    /// Whether the input document satisfies the guard
    pub fn holds(&self, input: &serde_json::Value) -> bool {
        let mut cursor = input;
        for segment in self.key.split('.') {
            match cursor.get(segment) {
                Some(next) => cursor = next,
                None => return false,
            }
        }
        match cursor {
            serde_json::Value::String(s) => s == &self.value,
            serde_json::Value::Bool(b) => b.to_string() == self.value,
            serde_json::Value::Number(n) => n.to_string() == self.value,
            _ => false,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.chars().all(is_bare_char) && !self.value.is_empty() {
            write!(f, "{} == {}", self.key, self.value)
        } else {
            write!(f, "{} == \"{}\"", self.key, self.value)
        }
    }
}

/// One parsed rule line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Allow or deny
    pub effect: Effect,
    /// Actions the rule applies to
    pub pattern: ActionPattern,
    /// Guards, sorted and deduplicated
    pub conditions: Vec<Condition>,
    /// 1-based line within the parsed text
    pub line: u32,
    /// 1-based column of the effect keyword
    pub column: u32,
}

impl Rule {
    /// Whether the rule applies to the action under the input document
    pub fn matches(&self, action: &str, input: &serde_json::Value) -> bool {
        self.pattern.matches(action) && self.conditions.iter().all(|c| c.holds(input))
    }

    /// Whether every (action, input) this rule applies to is also covered by `self`
    ///
    /// Holds when the pattern covers and `self` is guarded by a subset of
    /// `other`'s conditions.
    pub fn covers(&self, other: &Rule) -> bool {
        self.pattern.covers(&other.pattern)
            && self
                .conditions
                .iter()
                .all(|c| other.conditions.binary_search(c).is_ok())
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.effect, self.pattern)?;
        for (idx, condition) in self.conditions.iter().enumerate() {
            let joiner = if idx == 0 { "when" } else { "and" };
            write!(f, " {joiner} {condition}")?;
        }
        Ok(())
    }
}

/// Syntax error addressed into the parsed text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleError {
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
    /// What is wrong
    pub message: String,
    /// Suggested fix
    pub suggested_fix: Option<String>,
}

/// Rules of one text, plus any syntax errors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Successfully parsed rules in text order
    pub rules: Vec<Rule>,
    /// Syntax errors in text order
    pub errors: Vec<RuleError>,
}

impl RuleSet {
    /// Parse a policy text; never fails, errors are collected
    pub fn parse(text: &str) -> Self {
        let mut set = RuleSet::default();
        for (idx, raw) in text.lines().enumerate() {
            let line = idx as u32 + 1;
            match parse_line(raw, line) {
                Ok(Some(rule)) => set.rules.push(rule),
                Ok(None) => {}
                Err(err) => set.errors.push(err),
            }
        }
        set
    }

    /// Whether the text parsed without errors
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Allow rules in text order
    pub fn allows(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|r| r.effect == Effect::Allow)
    }

    /// Deny rules in text order
    pub fn denies(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|r| r.effect == Effect::Deny)
    }

    /// Whether the text declares any allowance
    pub fn declares_allowances(&self) -> bool {
        self.allows().next().is_some()
    }
}

fn is_bare_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-' | '*' | ':' | '/')
}

#[derive(Debug)]
struct Token {
    column: u32,
    text: String,
}

fn tokenize(raw: &str, line: u32) -> Result<Vec<Token>, RuleError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = raw.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_whitespace() {
            i += 1;
            continue;
        }
        let column = i as u32 + 1;
        if chars[i] == '"' {
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && chars[end] != '"' {
                end += 1;
            }
            if end >= chars.len() {
                return Err(RuleError {
                    line,
                    column,
                    message: "unterminated string".to_string(),
                    suggested_fix: Some("close the string with '\"'".to_string()),
                });
            }
            tokens.push(Token {
                column,
                text: chars[start..end].iter().collect(),
            });
            i = end + 1;
        } else {
            let start = i;
            while i < chars.len() && !chars[i].is_whitespace() {
                i += 1;
            }
            tokens.push(Token {
                column,
                text: chars[start..i].iter().collect(),
            });
        }
    }
    Ok(tokens)
}

fn error(line: u32, column: u32, message: impl Into<String>, fix: Option<&str>) -> RuleError {
    RuleError {
        line,
        column,
        message: message.into(),
        suggested_fix: fix.map(str::to_string),
    }
}

fn parse_line(raw: &str, line: u32) -> Result<Option<Rule>, RuleError> {
    let trimmed = raw.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let tokens = tokenize(raw, line)?;
    let mut iter = tokens.into_iter().peekable();

    let head = match iter.next() {
        Some(head) => head,
        None => return Ok(None),
    };
    let effect = match head.text.as_str() {
        "allow" => Effect::Allow,
        "deny" => Effect::Deny,
        other => {
            return Err(error(
                line,
                head.column,
                format!("expected 'allow' or 'deny', found '{other}'"),
                Some("start the rule with 'allow' or 'deny'"),
            ))
        }
    };

    let pattern_token = iter.next().ok_or_else(|| {
        error(
            line,
            head.column + head.text.len() as u32,
            format!("'{effect}' needs an action pattern"),
            Some("e.g. 'allow ci.call.*'"),
        )
    })?;
    let pattern = ActionPattern::parse(&pattern_token.text).map_err(|(offset, message)| {
        error(line, pattern_token.column + offset as u32, message, None)
    })?;

    let mut conditions = Vec::new();
    if let Some(keyword) = iter.next() {
        if keyword.text != "when" {
            return Err(error(
                line,
                keyword.column,
                format!("unexpected '{}' after the action pattern", keyword.text),
                Some("guards start with 'when <key> == <value>'"),
            ));
        }
        loop {
            let key = iter.next().ok_or_else(|| {
                error(
                    line,
                    keyword.column,
                    "'when' needs a condition",
                    Some("when <key> == <value>"),
                )
            })?;
            if key.text.is_empty()
                || !key
                    .text
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
            {
                return Err(error(
                    line,
                    key.column,
                    format!("invalid condition key '{}'", key.text),
                    None,
                ));
            }
            let op = iter.next().ok_or_else(|| {
                error(
                    line,
                    key.column,
                    format!("condition on '{}' is incomplete", key.text),
                    Some("when <key> == <value>"),
                )
            })?;
            if op.text != "==" {
                return Err(error(
                    line,
                    op.column,
                    format!("expected '==', found '{}'", op.text),
                    Some("only equality guards are supported"),
                ));
            }
            let value = iter.next().ok_or_else(|| {
                error(
                    line,
                    op.column,
                    format!("condition on '{}' has no value", key.text),
                    None,
                )
            })?;
            conditions.push(Condition {
                key: key.text,
                value: value.text,
            });
            match iter.next() {
                None => break,
                Some(joiner) if joiner.text == "and" => continue,
                Some(other) => {
                    return Err(error(
                        line,
                        other.column,
                        format!("expected 'and', found '{}'", other.text),
                        None,
                    ))
                }
            }
        }
    }

    conditions.sort();
    conditions.dedup();
    Ok(Some(Rule {
        effect,
        pattern,
        conditions,
        line,
        column: head.column,
    }))
}
