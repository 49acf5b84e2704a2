//! CAS-protected seat mutation
//!
//! Every seat write names the version it was computed against. The store
//! applies it only if that version is still current; otherwise the write is
//! rejected with `ok: false` and nothing changes. There are no locks: racing
//! writers are serialised by the store's compare-and-swap and exactly one wins
//! each version.
//!
//! After a rejection the caller must re-read and recompute. Re-submitting the
//! same stale base is answered with `ok: false` and `blind_retry: true`
//! without touching the store. Only the latest rejected base per session and
//! seat is remembered.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use triad_core::effects::{
    CasWrite, ClockEffects, EventBusEffects, ReceiptLogEffects, SeatStoreEffects, StoreCasResult,
};
use triad_core::events::SeatChange;
use triad_core::{
    ConsoleError, ConsoleEvent, ConsoleResult, DecisionId, IdentityId, Layer, OperatorContext,
    Receipt, ReceiptId, ReceiptKind, Seat, SeatConfig, SeatId, SeatState, SessionId,
};

/// Decision that caused a seat write, copied into the notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionLink {
    /// Causing decision
    pub decision_id: DecisionId,
    /// Decision was made under a synthetic domain
    pub synthetic: bool,
    /// Note for observers
    pub message: Option<String>,
}

/// One requested seat write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatMutation {
    /// Seat to write
    pub seat_id: SeatId,
    /// Version the caller computed against
    pub expected_cas: u64,
    /// Requested state
    pub new_state: SeatState,
    /// Causing decision, if any
    pub decision: Option<DecisionLink>,
}

impl SeatMutation {
    /// Plain write
    pub fn new(seat_id: SeatId, expected_cas: u64, new_state: SeatState) -> Self {
        Self {
            seat_id,
            expected_cas,
            new_state,
            decision: None,
        }
    }

    /// Attach the decision that caused the write
    pub fn caused_by(mut self, decision: DecisionLink) -> Self {
        self.decision = Some(decision);
        self
    }
}

/// Result of a CAS write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasOutcome {
    /// Seat written
    pub seat_id: SeatId,
    /// Base the caller wrote against
    pub cas_prev: u64,
    /// Stored version after the call
    pub cas_new: u64,
    /// Whether the write was applied
    pub ok: bool,
    /// Seat as stored after the call; for a blind retry, as last seen
    pub seat: Seat,
    /// Receipt of an applied write; `None` on rejection or when the receipt
    /// log was unreachable
    #[serde(default)]
    pub receipt_id: Option<ReceiptId>,
    /// The base had already been rejected for this session
    #[serde(default)]
    pub blind_retry: bool,
}

struct RejectedBase {
    expected_cas: u64,
    seen: Seat,
}

/// Applies CAS-protected seat writes and reports them
pub struct SeatMutator {
    seats: Arc<dyn SeatStoreEffects>,
    bus: Arc<dyn EventBusEffects>,
    receipts: Arc<dyn ReceiptLogEffects>,
    clock: Arc<dyn ClockEffects>,
    config: SeatConfig,
    stale_bases: Mutex<HashMap<(SessionId, SeatId), RejectedBase>>,
}

impl SeatMutator {
    /// Create a mutator
    pub fn new(
        seats: Arc<dyn SeatStoreEffects>,
        bus: Arc<dyn EventBusEffects>,
        receipts: Arc<dyn ReceiptLogEffects>,
        clock: Arc<dyn ClockEffects>,
        config: SeatConfig,
    ) -> Self {
        Self {
            seats,
            bus,
            receipts,
            clock,
            config,
            stale_bases: Mutex::new(HashMap::new()),
        }
    }

    /// Write `new_state` to a seat if its version is still `expected_cas`
    pub async fn mutate_seat(
        &self,
        ctx: &OperatorContext,
        seat_id: SeatId,
        expected_cas: u64,
        new_state: SeatState,
    ) -> ConsoleResult<CasOutcome> {
        self.apply(ctx, SeatMutation::new(seat_id, expected_cas, new_state))
            .await
    }

    /// Apply one mutation
    ///
    /// Errors: `Invalid` for an illegal transition, `NotFound` for unknown
    /// seats, `Transient` when the store is unreachable. A version mismatch is
    /// not an error; it is an outcome with `ok: false`.
    pub async fn apply(
        &self,
        ctx: &OperatorContext,
        mutation: SeatMutation,
    ) -> ConsoleResult<CasOutcome> {
        if let Some(outcome) = self.blind_retry(ctx, &mutation) {
            return Ok(outcome);
        }

        let current = self.seats.load_seat(mutation.seat_id).await?;
        if current.cas_version == mutation.expected_cas
            && !current.state.can_transition_to(mutation.new_state)
        {
            return Err(ConsoleError::invalid(format!(
                "seat {} cannot move from {} to {}",
                mutation.seat_id, current.state, mutation.new_state
            )));
        }

        let now_ms = self.clock.now_ms();
        let result = if current.cas_version == mutation.expected_cas {
            self.seats
                .compare_and_swap(CasWrite {
                    seat_id: mutation.seat_id,
                    expected_cas: mutation.expected_cas,
                    new_state: mutation.new_state,
                    now_ms,
                })
                .await?
        } else {
            StoreCasResult::Rejected { current }
        };

        match result {
            StoreCasResult::Applied { before, after } => {
                self.committed(ctx, &mutation, before, after, now_ms).await
            }
            StoreCasResult::Rejected { current } => {
                self.rejected(ctx, &mutation, current, now_ms).await
            }
        }
    }

    async fn committed(
        &self,
        ctx: &OperatorContext,
        mutation: &SeatMutation,
        before: Seat,
        after: Seat,
        now_ms: u64,
    ) -> ConsoleResult<CasOutcome> {
        let receipt = Receipt::new(
            ReceiptKind::SeatMutation {
                seat_id: after.id,
                identity_id: after.identity_id.clone(),
                layer: after.layer,
                from: before.state,
                to: after.state,
                cas_prev: before.cas_version,
                cas_new: after.cas_version,
                decision_id: mutation.decision.as_ref().map(|d| d.decision_id),
            },
            ctx,
            now_ms,
        );
        self.stale_bases.lock().remove(&(ctx.session_id, after.id));

        let minted = receipt.id;
        let receipt_id = match self.receipts.append(receipt).await {
            Ok(()) => Some(minted),
            Err(err) => {
                tracing::warn!(
                    seat = %after.id,
                    receipt = %minted,
                    error = %err,
                    "seat mutated but receipt not recorded"
                );
                None
            }
        };

        let change = seat_change(mutation, &before, &after, true, receipt_id, now_ms);
        if let Err(err) = self.bus.publish(&ConsoleEvent::SeatChange(change)).await {
            // Committed; observers re-sync when their stream recovers.
            tracing::warn!(seat = %after.id, error = %err, "seat change not published");
        }

        tracing::info!(
            seat = %after.id,
            identity = %after.identity_id,
            layer = %after.layer,
            from = %before.state,
            to = %after.state,
            cas = after.cas_version,
            "seat mutated"
        );
        Ok(CasOutcome {
            seat_id: after.id,
            cas_prev: mutation.expected_cas,
            cas_new: after.cas_version,
            ok: true,
            seat: after,
            receipt_id,
            blind_retry: false,
        })
    }

    async fn rejected(
        &self,
        ctx: &OperatorContext,
        mutation: &SeatMutation,
        current: Seat,
        now_ms: u64,
    ) -> ConsoleResult<CasOutcome> {
        self.stale_bases.lock().insert(
            (ctx.session_id, mutation.seat_id),
            RejectedBase {
                expected_cas: mutation.expected_cas,
                seen: current.clone(),
            },
        );
        tracing::info!(
            seat = %current.id,
            expected = mutation.expected_cas,
            current = current.cas_version,
            "seat write rejected on stale base"
        );

        if self.config.publish_conflicts {
            let mut change = seat_change(mutation, &current, &current, false, None, now_ms);
            change.to = mutation.new_state;
            if let Err(err) = self.bus.publish(&ConsoleEvent::SeatChange(change)).await {
                tracing::warn!(seat = %current.id, error = %err, "conflict notice not published");
            }
        }

        Ok(CasOutcome {
            seat_id: current.id,
            cas_prev: mutation.expected_cas,
            cas_new: current.cas_version,
            ok: false,
            seat: current,
            receipt_id: None,
            blind_retry: false,
        })
    }

    fn blind_retry(&self, ctx: &OperatorContext, mutation: &SeatMutation) -> Option<CasOutcome> {
        let bases = self.stale_bases.lock();
        let rejected = bases.get(&(ctx.session_id, mutation.seat_id))?;
        if rejected.expected_cas != mutation.expected_cas {
            return None;
        }
        tracing::info!(
            seat = %mutation.seat_id,
            expected = mutation.expected_cas,
            "blind retry of a rejected base refused"
        );
        Some(CasOutcome {
            seat_id: mutation.seat_id,
            cas_prev: mutation.expected_cas,
            cas_new: rejected.seen.cas_version,
            ok: false,
            seat: rejected.seen.clone(),
            receipt_id: None,
            blind_retry: true,
        })
    }

    /// Forget the rejected bases of a finished session
    pub fn end_session(&self, session_id: SessionId) {
        self.stale_bases
            .lock()
            .retain(|(session, _), _| *session != session_id);
    }

    /// Re-read, recompute and write until a write lands
    ///
    /// `recompute` sees the freshly read seat on every attempt and returns the
    /// state to write, or `None` to give up (returned as `Ok(None)`). After
    /// `max_attempts` rejected writes the call fails with `Conflict`.
    pub async fn mutate_with_rebase<F>(
        &self,
        ctx: &OperatorContext,
        seat_id: SeatId,
        mut recompute: F,
        max_attempts: usize,
    ) -> ConsoleResult<Option<CasOutcome>>
    where
        F: FnMut(&Seat) -> Option<SeatState> + Send,
    {
        for attempt in 1..=max_attempts.max(1) {
            let seat = self.seats.load_seat(seat_id).await?;
            let Some(next) = recompute(&seat) else {
                return Ok(None);
            };
            let outcome = self
                .apply(ctx, SeatMutation::new(seat_id, seat.cas_version, next))
                .await?;
            if outcome.ok {
                return Ok(Some(outcome));
            }
            tracing::debug!(seat = %seat_id, attempt, "rebasing after conflict");
        }
        Err(ConsoleError::conflict(format!(
            "seat {seat_id} kept changing after {max_attempts} attempts"
        )))
    }

    /// Assign an identity's seat on a layer, creating the record if needed
    pub async fn assign(
        &self,
        ctx: &OperatorContext,
        identity_id: &IdentityId,
        layer: Layer,
    ) -> ConsoleResult<CasOutcome> {
        let seat = self
            .seats
            .ensure_seat(identity_id, layer, self.clock.now_ms())
            .await?;
        self.mutate_seat(ctx, seat.id, seat.cas_version, SeatState::Assigned)
            .await
    }
}

fn seat_change(
    mutation: &SeatMutation,
    before: &Seat,
    after: &Seat,
    cas_ok: bool,
    receipt_id: Option<ReceiptId>,
    now_ms: u64,
) -> SeatChange {
    SeatChange {
        identity_id: after.identity_id.clone(),
        layer: after.layer,
        seat_id: Some(after.id),
        from: before.state,
        to: after.state,
        decision_id: mutation.decision.as_ref().map(|d| d.decision_id),
        receipt_id,
        cas_prev: mutation.expected_cas,
        cas_new: after.cas_version,
        cas_ok,
        synthetic: mutation.decision.as_ref().is_some_and(|d| d.synthetic),
        message: mutation.decision.as_ref().and_then(|d| d.message.clone()),
        timestamp: now_ms,
    }
}

impl std::fmt::Debug for SeatMutator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeatMutator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
