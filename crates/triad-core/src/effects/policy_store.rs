//! Local policy slot storage

use crate::errors::ConsoleResult;
use crate::identifiers::DomainId;
use crate::policy::{PolicyVersion, StoredPolicy};
use async_trait::async_trait;

/// Authoritative storage of each domain's local policy slot
#[async_trait]
pub trait PolicyStoreEffects: Send + Sync {
    /// Current local slot of a domain; `None` when never written
    async fn read_local(&self, domain_id: &DomainId) -> ConsoleResult<Option<StoredPolicy>>;

    /// Replace the local slot of `domain_id`, committed by `committed_by`
    ///
    /// Returns the new slot version; `revision` increases by one per accepted write.
    async fn commit_local(
        &self,
        committed_by: &DomainId,
        domain_id: &DomainId,
        text: String,
    ) -> ConsoleResult<PolicyVersion>;
}
