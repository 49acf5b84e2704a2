//! # Triad Seats
//!
//! Seat-side components of the console:
//!
//! - [`TriadResolver`]: uncached reads of an identity's three seats
//! - [`SeatMutator`]: the CAS write protocol, its notifications and receipts
//! - [`DomainSeatRegistry`]: per-domain membership lifecycle

#![forbid(unsafe_code)]

pub mod domain_seats;
pub mod mutator;
pub mod resolver;

pub use domain_seats::DomainSeatRegistry;
pub use mutator::{CasOutcome, DecisionLink, SeatMutation, SeatMutator};
pub use resolver::TriadResolver;
