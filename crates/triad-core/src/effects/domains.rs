//! Domain tree and membership storage

use crate::domain::{Domain, DomainSeat, DomainSeatStatus};
use crate::errors::ConsoleResult;
use crate::identifiers::{DomainId, DomainSeatId};
use async_trait::async_trait;

/// Read access to the domain tree
#[async_trait]
pub trait DomainDirectoryEffects: Send + Sync {
    /// Look up a domain; `NotFound` when unknown
    async fn get_domain(&self, domain_id: &DomainId) -> ConsoleResult<Domain>;

    /// Direct children of a domain
    async fn children(&self, domain_id: &DomainId) -> ConsoleResult<Vec<Domain>>;
}

/// Storage of per-domain membership seats
#[async_trait]
pub trait DomainSeatStoreEffects: Send + Sync {
    /// Insert a freshly appointed seat
    async fn insert(&self, seat: DomainSeat) -> ConsoleResult<()>;

    /// Look up one seat; `NotFound` when unknown
    async fn load(&self, id: DomainSeatId) -> ConsoleResult<DomainSeat>;

    /// All seats of a domain, detached ones included
    async fn list_for_domain(&self, domain_id: &DomainId) -> ConsoleResult<Vec<DomainSeat>>;

    /// Move a seat from `expected` to `next`
    ///
    /// `Conflict` when the stored status is no longer `expected`.
    async fn transition(
        &self,
        id: DomainSeatId,
        expected: DomainSeatStatus,
        next: DomainSeatStatus,
    ) -> ConsoleResult<DomainSeat>;
}
