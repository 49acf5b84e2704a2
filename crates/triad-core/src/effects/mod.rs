//! Effect traits for external collaborators
//!
//! The console never talks to storage, the change stream or the policy
//! evaluator directly; it goes through these traits. Reference handlers live
//! in `triad-effects`, test doubles in `triad-testkit`.

pub mod audit;
pub mod bus;
pub mod clock;
pub mod domains;
pub mod evaluator;
pub mod policy_store;
pub mod seats;

pub use audit::ReceiptLogEffects;
pub use bus::{BusFrame, EventBusEffects, EventSubscription};
pub use clock::ClockEffects;
pub use domains::{DomainDirectoryEffects, DomainSeatStoreEffects};
pub use evaluator::{
    EvaluationOutcome, EvaluationRequest, EvaluatorDiagnostic, PolicyEvaluatorEffects,
};
pub use policy_store::PolicyStoreEffects;
pub use seats::{CasWrite, SeatStoreEffects, StoreCasResult};
