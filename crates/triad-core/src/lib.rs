//! # Triad Core - Foundation
//!
//! Types, errors, configuration, notifications and effect traits shared by
//! every console crate.
//!
//! # Architecture Constraints
//!
//! - YES domain types (seats, triads, domains, policies, decisions, receipts)
//! - YES effect trait definitions for the seat store, policy store, evaluator and bus
//! - NO effect handler implementations (those live in `triad-effects`)
//! - NO component logic (resolver, CAS protocol, reconciliation, policy engine)

#![forbid(unsafe_code)]

pub mod backoff;
pub mod config;
pub mod context;
pub mod domain;
pub mod effects;
pub mod errors;
pub mod events;
pub mod flow;
pub mod identifiers;
pub mod policy;
pub mod receipt;
pub mod seat;

pub use backoff::{Backoff, BackoffStrategy};
pub use config::{
    ConsoleConfig, FlowConfig, PolicyConfig, ReconciliationConfig, SeatConfig, WriteRouting,
};
pub use context::OperatorContext;
pub use domain::{Domain, DomainSeat, DomainSeatStatus, DomainSeatType};
pub use errors::{ConsoleError, ConsoleResult};
pub use events::{ConsoleEvent, DecisionNotice, DomainSeatNotice, SeatChange};
pub use flow::{Direction, FlowDecision, FlowReason, FlowRequest, FlowScenario};
pub use identifiers::{
    DecisionId, DomainId, DomainSeatId, IdentityId, ReceiptId, SeatId, SessionId,
};
pub use policy::{
    PolicyDigest, PolicyHint, PolicyScope, PolicyVersion, StoredPolicy, ValidationReport,
};
pub use receipt::{Receipt, ReceiptKind};
pub use seat::{Layer, Seat, SeatState, Triad, TriadSeat};
