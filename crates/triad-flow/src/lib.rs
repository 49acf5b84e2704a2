//! # Triad Flow
//!
//! Allow/deny decisions for actions: the frozen-layer veto, evaluator
//! delegation, decision receipts and notifications, and the static preview
//! scenarios.

#![forbid(unsafe_code)]

pub mod evaluator;
pub mod preview;

pub use evaluator::{evaluation_input, frozen_veto, FlowEvaluator, VETO_LAYERS};
pub use preview::preview;
