//! # Triad Effects
//!
//! Reference handlers for the effect traits in `triad-core`: in-memory seat,
//! policy, domain and receipt stores, a tokio broadcast notification bus, the
//! bundled rule evaluator and the system clock.
//!
//! Every handler is cheap to clone and clones share state. Each carries a
//! [`FaultSwitch`] that makes calls fail with `Transient`, which is how the
//! console's degraded paths are exercised.

#![forbid(unsafe_code)]

pub mod bus;
pub mod clock;
pub mod domains;
pub mod evaluator;
pub mod fault;
pub mod policy_store;
pub mod receipts;
pub mod seat_store;

pub use bus::{BroadcastEventBus, DEFAULT_BUS_CAPACITY};
pub use clock::SystemClock;
pub use domains::{MemoryDomainDirectory, MemoryDomainSeatStore};
pub use evaluator::RuleEvaluator;
pub use fault::FaultSwitch;
pub use policy_store::{CommitRecord, MemoryPolicyStore};
pub use receipts::MemoryReceiptLog;
pub use seat_store::MemorySeatStore;
