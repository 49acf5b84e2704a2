//! Policy write routing
//!
//! A save validates first and writes nothing on failure. Which domain
//! physically commits the slot is decided in exactly one place,
//! [`write_target`].

use crate::validator::PolicyValidator;
use std::sync::Arc;
use triad_core::effects::{
    ClockEffects, DomainDirectoryEffects, PolicyStoreEffects, ReceiptLogEffects,
};
use triad_core::{
    ConsoleError, ConsoleResult, Domain, DomainId, OperatorContext, PolicyDigest, Receipt,
    ReceiptKind, WriteRouting,
};

/// The domain whose authority commits `domain`'s local slot
pub fn write_target(routing: WriteRouting, domain: &Domain) -> DomainId {
    match (routing, &domain.parent_id) {
        (WriteRouting::ParentAuthority, Some(parent)) => parent.clone(),
        (WriteRouting::ParentAuthority, None) | (WriteRouting::SelfAuthority, _) => {
            domain.id.clone()
        }
    }
}

/// Validated, routed policy writes
#[derive(Clone)]
pub struct PolicyWriteRouter {
    validator: PolicyValidator,
    domains: Arc<dyn DomainDirectoryEffects>,
    store: Arc<dyn PolicyStoreEffects>,
    receipts: Arc<dyn ReceiptLogEffects>,
    clock: Arc<dyn ClockEffects>,
    routing: WriteRouting,
}

impl PolicyWriteRouter {
    /// Create a router
    pub fn new(
        validator: PolicyValidator,
        domains: Arc<dyn DomainDirectoryEffects>,
        store: Arc<dyn PolicyStoreEffects>,
        receipts: Arc<dyn ReceiptLogEffects>,
        clock: Arc<dyn ClockEffects>,
        routing: WriteRouting,
    ) -> Self {
        Self {
            validator,
            domains,
            store,
            receipts,
            clock,
            routing,
        }
    }

    /// Where a save of `domain_id` would be committed
    pub async fn routed_target(&self, domain_id: &DomainId) -> ConsoleResult<DomainId> {
        let domain = self.domains.get_domain(domain_id).await?;
        Ok(write_target(self.routing, &domain))
    }

    /// Validate `candidate` against the full stack and commit it as the local
    /// policy of `domain_id`
    ///
    /// Fails with `ValidationFailure` (and writes nothing) when validation
    /// reports hints, and with `Conflict` (also writing nothing) when an
    /// ancestor's policy changed after validation. Once the slot is committed
    /// the save succeeds; a receipt that could not be appended is reported
    /// through [`SavedPolicy::recorded`].
    pub async fn save(
        &self,
        ctx: &OperatorContext,
        domain_id: &DomainId,
        candidate: &str,
    ) -> ConsoleResult<SavedPolicy> {
        let resolver = self.validator.resolver();
        let resolved = resolver.resolve(domain_id).await?;
        let report = self.validator.validate_resolved(&resolved, candidate).await?;
        if !report.success {
            tracing::info!(domain = %domain_id, hints = report.hints.len(), "policy save rejected");
            return Err(ConsoleError::validation(report.hints));
        }

        let validated_against = PolicyDigest::of(&resolved.inherited());
        let current = PolicyDigest::of(&resolver.resolve(domain_id).await?.inherited());
        if current != validated_against {
            tracing::warn!(
                domain = %domain_id,
                validated = %validated_against,
                current = %current,
                "inherited policy changed during save"
            );
            return Err(ConsoleError::conflict(format!(
                "inherited policy of {domain_id} changed while the candidate was validated; validate again"
            )));
        }

        let domain = resolved.domain;
        let target = write_target(self.routing, &domain);
        let version = self
            .store
            .commit_local(&target, &domain.id, candidate.to_string())
            .await?;

        let receipt = Receipt::new(
            ReceiptKind::PolicyCommit {
                domain_id: domain.id.clone(),
                committed_by: target.clone(),
                version,
            },
            ctx,
            self.clock.now_ms(),
        );
        let recorded = match self.receipts.append(receipt.clone()).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    domain = %domain.id,
                    receipt = %receipt.id,
                    error = %err,
                    "policy committed but receipt not recorded"
                );
                false
            }
        };
        tracing::info!(
            domain = %domain.id,
            committed_by = %target,
            revision = version.revision,
            digest = %version.digest,
            receipt = %receipt.id,
            recorded,
            "policy committed"
        );
        Ok(SavedPolicy { receipt, recorded })
    }
}

/// A committed policy save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPolicy {
    /// Commit receipt
    pub receipt: Receipt,
    /// Whether the receipt reached the receipt log
    pub recorded: bool,
}

impl std::fmt::Debug for PolicyWriteRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyWriteRouter")
            .field("routing", &self.routing)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_authority_routes_to_parent() {
        let child = Domain::child("ops", "acme", "Ops");
        assert_eq!(
            write_target(WriteRouting::ParentAuthority, &child).as_str(),
            "acme"
        );
        let root = Domain::root("acme", "Acme");
        assert_eq!(
            write_target(WriteRouting::ParentAuthority, &root).as_str(),
            "acme"
        );
    }

    #[test]
    fn self_authority_routes_to_self() {
        let child = Domain::child("ops", "acme", "Ops");
        assert_eq!(write_target(WriteRouting::SelfAuthority, &child).as_str(), "ops");
    }
}
