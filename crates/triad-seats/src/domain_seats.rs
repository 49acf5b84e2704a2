//! Domain membership seats
//!
//! Appointment creates an `active` seat; freeze and unfreeze toggle it;
//! detach is terminal but the record stays for audit. Every accepted
//! transition appends a receipt and publishes `domain_seat.change`.

use std::sync::Arc;
use triad_core::effects::{
    ClockEffects, DomainDirectoryEffects, DomainSeatStoreEffects, EventBusEffects,
    ReceiptLogEffects,
};
use triad_core::{
    ConsoleError, ConsoleEvent, ConsoleResult, DomainId, DomainSeat, DomainSeatId,
    DomainSeatNotice, DomainSeatStatus, DomainSeatType, IdentityId, OperatorContext, Receipt,
    ReceiptId, ReceiptKind,
};
use triad_policy::PolicyResolver;

/// Lifecycle of per-domain membership seats
#[derive(Clone)]
pub struct DomainSeatRegistry {
    directory: Arc<dyn DomainDirectoryEffects>,
    store: Arc<dyn DomainSeatStoreEffects>,
    policies: PolicyResolver,
    receipts: Arc<dyn ReceiptLogEffects>,
    bus: Arc<dyn EventBusEffects>,
    clock: Arc<dyn ClockEffects>,
}

impl DomainSeatRegistry {
    /// Create a registry
    pub fn new(
        directory: Arc<dyn DomainDirectoryEffects>,
        store: Arc<dyn DomainSeatStoreEffects>,
        policies: PolicyResolver,
        receipts: Arc<dyn ReceiptLogEffects>,
        bus: Arc<dyn EventBusEffects>,
        clock: Arc<dyn ClockEffects>,
    ) -> Self {
        Self {
            directory,
            store,
            policies,
            receipts,
            bus,
            clock,
        }
    }

    /// Appoint a seat in `domain_id`
    ///
    /// A domain holds at most one non-detached root seat. The seat records the
    /// domain's effective policy at appointment.
    pub async fn appoint(
        &self,
        ctx: &OperatorContext,
        domain_id: &DomainId,
        seat_type: DomainSeatType,
        member_id: Option<IdentityId>,
        scope: impl Into<String>,
    ) -> ConsoleResult<DomainSeat> {
        let domain = self.directory.get_domain(domain_id).await?;
        if seat_type == DomainSeatType::Root {
            let existing = self.store.list_for_domain(&domain.id).await?;
            if existing
                .iter()
                .any(|s| s.seat_type == DomainSeatType::Root && s.status != DomainSeatStatus::Detached)
            {
                return Err(ConsoleError::conflict(format!(
                    "domain {} already has a root seat",
                    domain.id
                )));
            }
        }
        let resolved = self.policies.resolve(&domain.id).await?;

        let now_ms = self.clock.now_ms();
        let id = DomainSeatId::new_random();
        let receipt = Receipt::new(
            ReceiptKind::DomainSeat {
                domain_seat_id: id,
                domain_id: domain.id.clone(),
                from: None,
                to: DomainSeatStatus::Active,
            },
            ctx,
            now_ms,
        );
        let seat = DomainSeat {
            id,
            domain_id: domain.id.clone(),
            seat_type,
            member_id,
            status: DomainSeatStatus::Active,
            scope: scope.into(),
            policy_version: resolved.version(),
            rego_text: resolved.effective,
            appointment_receipt: receipt.id,
        };
        self.store.insert(seat.clone()).await?;
        let receipt_id = receipt.id;
        self.receipts.append(receipt).await?;
        self.notify(&seat, None, receipt_id, now_ms).await;
        tracing::info!(domain = %seat.domain_id, seat = %seat.id, ?seat_type, "domain seat appointed");
        Ok(seat)
    }

    /// Suspend an active seat
    pub async fn freeze(
        &self,
        ctx: &OperatorContext,
        id: DomainSeatId,
    ) -> ConsoleResult<DomainSeat> {
        self.transition(ctx, id, DomainSeatStatus::Frozen).await
    }

    /// Reinstate a frozen seat
    pub async fn unfreeze(
        &self,
        ctx: &OperatorContext,
        id: DomainSeatId,
    ) -> ConsoleResult<DomainSeat> {
        self.transition(ctx, id, DomainSeatStatus::Active).await
    }

    /// End a membership; terminal
    pub async fn detach(
        &self,
        ctx: &OperatorContext,
        id: DomainSeatId,
    ) -> ConsoleResult<DomainSeat> {
        self.transition(ctx, id, DomainSeatStatus::Detached).await
    }

    /// Seats of a domain, detached ones included
    pub async fn list(&self, domain_id: &DomainId) -> ConsoleResult<Vec<DomainSeat>> {
        self.store.list_for_domain(domain_id).await
    }

    async fn transition(
        &self,
        ctx: &OperatorContext,
        id: DomainSeatId,
        next: DomainSeatStatus,
    ) -> ConsoleResult<DomainSeat> {
        let current = self.store.load(id).await?;
        if !current.status.can_transition_to(next) {
            return Err(ConsoleError::invalid(format!(
                "domain seat {id} cannot move from {} to {next}",
                current.status
            )));
        }
        let updated = self.store.transition(id, current.status, next).await?;

        let now_ms = self.clock.now_ms();
        let receipt = Receipt::new(
            ReceiptKind::DomainSeat {
                domain_seat_id: id,
                domain_id: updated.domain_id.clone(),
                from: Some(current.status),
                to: next,
            },
            ctx,
            now_ms,
        );
        let receipt_id = receipt.id;
        self.receipts.append(receipt).await?;
        self.notify(&updated, Some(current.status), receipt_id, now_ms)
            .await;
        tracing::info!(seat = %id, from = %current.status, to = %next, "domain seat transitioned");
        Ok(updated)
    }

    async fn notify(
        &self,
        seat: &DomainSeat,
        from: Option<DomainSeatStatus>,
        receipt_id: ReceiptId,
        now_ms: u64,
    ) {
        let notice = DomainSeatNotice {
            domain_id: seat.domain_id.clone(),
            domain_seat_id: seat.id,
            member_id: seat.member_id.clone(),
            from,
            to: seat.status,
            receipt_id,
            timestamp: now_ms,
        };
        if let Err(err) = self
            .bus
            .publish(&ConsoleEvent::DomainSeatChange(notice))
            .await
        {
            tracing::warn!(seat = %seat.id, error = %err, "domain seat change not published");
        }
    }
}

impl std::fmt::Debug for DomainSeatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainSeatRegistry").finish_non_exhaustive()
    }
}
