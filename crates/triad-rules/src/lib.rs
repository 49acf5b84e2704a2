//! # Triad Rules
//!
//! The console's policy text dialect: one `allow`/`deny` rule per line,
//! layered documents for effective stacks, pattern coverage for the
//! structural tighten-only pre-check, and the reference stack semantics used
//! by the bundled evaluator.

#![forbid(unsafe_code)]

pub mod layers;
pub mod pattern;
pub mod rule;
pub mod stack;

pub use layers::{render_marker, DocumentLayer, LayerRole, LayeredDocument, LAYER_MARKER};
pub use pattern::ActionPattern;
pub use rule::{Condition, Effect, Rule, RuleError, RuleSet};
pub use stack::{evaluate_stack, StackVerdict};
