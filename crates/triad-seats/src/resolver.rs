//! Triad resolution

use std::sync::Arc;
use triad_core::effects::SeatStoreEffects;
use triad_core::{ConsoleResult, IdentityId, Triad};

/// Reads the latest committed triad of an identity
///
/// Holds no cache; every call goes to the seat store.
#[derive(Clone)]
pub struct TriadResolver {
    seats: Arc<dyn SeatStoreEffects>,
}

impl TriadResolver {
    /// Create a resolver over a seat store
    pub fn new(seats: Arc<dyn SeatStoreEffects>) -> Self {
        Self { seats }
    }

    /// Snapshot of the identity's three seats
    ///
    /// `NotFound` for unknown identities, `Transient` when the store is
    /// unreachable.
    pub async fn get_triad(&self, identity_id: &IdentityId) -> ConsoleResult<Triad> {
        let seats = self.seats.load_identity_seats(identity_id).await?;
        let triad = Triad::from_seats(identity_id.clone(), &seats);
        tracing::trace!(identity = %identity_id, complete = triad.is_complete(), "triad resolved");
        Ok(triad)
    }
}

impl std::fmt::Debug for TriadResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriadResolver").finish_non_exhaustive()
    }
}
