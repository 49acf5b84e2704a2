//! Layered policy documents
//!
//! An effective policy is the ancestor chain rendered root-first. Each layer
//! starts with a marker line:
//!
//! ```text
//! #@layer acme inherited
//! allow ci.*
//! #@layer acme.ops local
//! deny ci.call.v0
//! ```
//!
//! A document without markers is a single local layer, which is how a root
//! domain's effective policy (its local text, verbatim) reads.

use crate::rule::RuleSet;
use serde::{Deserialize, Serialize};

/// Prefix of a layer marker line
pub const LAYER_MARKER: &str = "#@layer";

/// Role of a layer within a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerRole {
    /// Inherited from an ancestor
    Inherited,
    /// The addressed domain's own slot
    Local,
}

impl LayerRole {
    fn as_str(&self) -> &'static str {
        match self {
            LayerRole::Inherited => "inherited",
            LayerRole::Local => "local",
        }
    }
}

/// Render the marker line introducing a layer
pub fn render_marker(domain: &str, role: LayerRole) -> String {
    format!("{LAYER_MARKER} {domain} {}", role.as_str())
}

/// One layer of a parsed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLayer {
    /// Domain named by the marker; `None` for an unmarked document
    pub domain: Option<String>,
    /// Role named by the marker
    pub role: LayerRole,
    /// Document line of the layer's first body line (1-based)
    pub first_line: u32,
    /// Number of body lines
    pub line_count: u32,
    /// Layer body text
    pub text: String,
    /// Parsed body
    pub rules: RuleSet,
}

impl DocumentLayer {
    /// Translate a body-relative line into a document line
    pub fn document_line(&self, body_line: u32) -> u32 {
        self.first_line + body_line.saturating_sub(1)
    }

    /// Whether a document line falls inside the body
    pub fn contains_line(&self, document_line: u32) -> bool {
        document_line >= self.first_line && document_line < self.first_line + self.line_count
    }
}

/// A policy document split into layers, root first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayeredDocument {
    /// Layers in document order
    pub layers: Vec<DocumentLayer>,
}

impl LayeredDocument {
    /// Split a document at marker lines
    ///
    /// Text before the first marker (if any markers exist) must be blank or
    /// comments; it is kept as an unnamed inherited layer so line numbers stay
    /// honest.
    pub fn parse(document: &str) -> Self {
        let lines: Vec<&str> = document.lines().collect();
        let has_markers = lines.iter().any(|l| l.trim_start().starts_with(LAYER_MARKER));
        if !has_markers {
            return Self {
                layers: vec![build_layer(None, LayerRole::Local, 1, &lines)],
            };
        }

        let mut layers = Vec::new();
        let mut current: Option<(Option<String>, LayerRole, u32)> = None;
        let mut body: Vec<&str> = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            let line_no = idx as u32 + 1;
            if let Some(rest) = line.trim_start().strip_prefix(LAYER_MARKER) {
                match current.take() {
                    Some((domain, role, first)) => {
                        layers.push(build_layer(domain, role, first, &body));
                    }
                    None if !body.is_empty() => {
                        layers.push(build_layer(None, LayerRole::Inherited, 1, &body));
                    }
                    None => {}
                }
                body.clear();
                let mut parts = rest.split_whitespace();
                let domain = parts.next().map(str::to_string);
                let role = match parts.next() {
                    Some("local") => LayerRole::Local,
                    _ => LayerRole::Inherited,
                };
                current = Some((domain, role, line_no + 1));
            } else {
                body.push(line);
            }
        }
        match current {
            Some((domain, role, first)) => layers.push(build_layer(domain, role, first, &body)),
            None => layers.push(build_layer(None, LayerRole::Local, 1, &body)),
        }
        Self { layers }
    }

    /// The layer holding a document line
    pub fn layer_at(&self, document_line: u32) -> Option<&DocumentLayer> {
        self.layers.iter().find(|l| l.contains_line(document_line))
    }

    /// Rule sets in document (root-first) order
    pub fn rule_sets(&self) -> Vec<&RuleSet> {
        self.layers.iter().map(|l| &l.rules).collect()
    }
}

fn build_layer(
    domain: Option<String>,
    role: LayerRole,
    first_line: u32,
    body: &[&str],
) -> DocumentLayer {
    let text = body.join("\n");
    DocumentLayer {
        domain,
        role,
        first_line,
        line_count: body.len() as u32,
        rules: RuleSet::parse(&text),
        text,
    }
}
