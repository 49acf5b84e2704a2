//! Seat store

use crate::errors::ConsoleResult;
use crate::identifiers::{IdentityId, SeatId};
use crate::seat::{Layer, Seat, SeatState};
use async_trait::async_trait;

/// A single compare-and-swap write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CasWrite {
    /// Seat to write
    pub seat_id: SeatId,
    /// Version the writer read
    pub expected_cas: u64,
    /// State to store
    pub new_state: SeatState,
    /// Write time (ms since epoch)
    pub now_ms: u64,
}

/// Store-level result of a CAS write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCasResult {
    /// The write was applied atomically
    Applied {
        /// Record before the write
        before: Seat,
        /// Record after the write
        after: Seat,
    },
    /// The stored version differed from `expected_cas`; nothing changed
    Rejected {
        /// Record as currently stored
        current: Seat,
    },
}

/// Authoritative per-identity, per-layer seat records
///
/// Implementations must make `compare_and_swap` atomic with respect to every
/// other writer; it is the only concurrency control in the system.
#[async_trait]
pub trait SeatStoreEffects: Send + Sync {
    /// Whether the identity is known to the store
    async fn identity_exists(&self, identity_id: &IdentityId) -> ConsoleResult<bool>;

    /// Latest committed seats of an identity; `NotFound` for unknown identities
    async fn load_identity_seats(&self, identity_id: &IdentityId) -> ConsoleResult<Vec<Seat>>;

    /// Latest committed record of one seat; `NotFound` when unknown
    async fn load_seat(&self, seat_id: SeatId) -> ConsoleResult<Seat>;

    /// Return the seat for `(identity, layer)`, materialising an EMPTY record at
    /// version 0 when none exists. Materialising is not a mutation.
    async fn ensure_seat(
        &self,
        identity_id: &IdentityId,
        layer: Layer,
        now_ms: u64,
    ) -> ConsoleResult<Seat>;

    /// Atomic compare-and-swap on `cas_version`
    async fn compare_and_swap(&self, write: CasWrite) -> ConsoleResult<StoreCasResult>;
}
