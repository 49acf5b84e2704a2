//! Stage two: re-read authoritative state

use triad_core::{ConsoleError, IdentityId, Triad};
use triad_seats::TriadResolver;

/// Result of one re-read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refetched {
    /// Latest committed triad
    Fresh(Triad),
    /// The identity no longer exists
    Gone,
    /// The read failed; previous state may be stale
    Failed(ConsoleError),
}

/// Re-reads an identity's triad through the resolver
#[derive(Debug, Clone)]
pub struct TriadRefetcher {
    resolver: TriadResolver,
}

impl TriadRefetcher {
    /// Create a refetcher
    pub fn new(resolver: TriadResolver) -> Self {
        Self { resolver }
    }

    /// Read the identity's triad
    pub async fn refetch(&self, identity_id: &IdentityId) -> Refetched {
        match self.resolver.get_triad(identity_id).await {
            Ok(triad) => Refetched::Fresh(triad),
            Err(ConsoleError::NotFound { .. }) => Refetched::Gone,
            Err(err) => {
                tracing::warn!(identity = %identity_id, error = %err, "triad refetch failed");
                Refetched::Failed(err)
            }
        }
    }
}
