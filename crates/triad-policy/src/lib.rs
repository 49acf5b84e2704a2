//! # Triad Policy
//!
//! Hierarchical policy engine for the console:
//!
//! - [`PolicyResolver`] walks a domain's ancestors and composes the effective
//!   document (tighten-only: descendants add restrictions, never grants)
//! - [`PolicyValidator`] checks a candidate against the full stack and
//!   returns line-addressed hints
//! - [`PolicyWriteRouter`] commits validated text to the authoritative slot

#![forbid(unsafe_code)]

pub mod precheck;
pub mod resolver;
pub mod router;
pub mod validator;

pub use precheck::{tighten_only_hints, AncestorRules};
pub use resolver::{compose, PolicyLayer, PolicyResolver, ResolvedPolicy};
pub use router::{write_target, PolicyWriteRouter, SavedPolicy};
pub use validator::PolicyValidator;
