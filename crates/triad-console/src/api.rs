//! Console API facade
//!
//! Typed request/response bodies for the console endpoints and one method per
//! endpoint. Wire names follow the console's JSON contract; everything else
//! is delegated to the components.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use triad_core::effects::{
    ClockEffects, DomainDirectoryEffects, DomainSeatStoreEffects, EventBusEffects,
    PolicyEvaluatorEffects, PolicyStoreEffects, ReceiptLogEffects, SeatStoreEffects,
};
use triad_core::{
    ConsoleConfig, ConsoleError, ConsoleResult, Direction, DomainId, FlowReason, FlowRequest,
    FlowScenario, IdentityId, Layer, OperatorContext, PolicyHint, PolicyScope, Receipt, SeatId,
    SeatState, Triad,
};
use triad_flow::FlowEvaluator;
use triad_policy::{PolicyResolver, PolicyValidator, PolicyWriteRouter};
use triad_seats::{DomainSeatRegistry, SeatMutator, TriadResolver};
use triad_sync::ViewerSession;

/// Effect handlers the facade is wired over
#[derive(Clone)]
pub struct Handlers {
    /// Triad seats
    pub seats: Arc<dyn SeatStoreEffects>,
    /// Local policy slots
    pub policies: Arc<dyn PolicyStoreEffects>,
    /// Domain tree
    pub domains: Arc<dyn DomainDirectoryEffects>,
    /// Domain membership seats
    pub domain_seats: Arc<dyn DomainSeatStoreEffects>,
    /// Audit receipts
    pub receipts: Arc<dyn ReceiptLogEffects>,
    /// Notification bus
    pub bus: Arc<dyn EventBusEffects>,
    /// Policy evaluator
    pub evaluator: Arc<dyn PolicyEvaluatorEffects>,
    /// Wall clock
    pub clock: Arc<dyn ClockEffects>,
}

impl std::fmt::Debug for Handlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handlers").finish_non_exhaustive()
    }
}

/// One layer of a triad read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatView {
    /// Layer
    pub layer: Layer,
    /// Current state
    pub state: SeatState,
    /// Last update, absent for a layer with no record
    pub updated_at: Option<u64>,
    /// Seat id, needed for writes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seat_id: Option<SeatId>,
    /// Version to write against
    pub cas_version: u64,
}

/// `GET triad/{identity_id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriadResponse {
    /// Identity
    pub identity_id: IdentityId,
    /// Seats in canonical layer order
    pub seats: Vec<SeatView>,
    /// No layer is EMPTY
    pub complete: bool,
}

impl From<&Triad> for TriadResponse {
    fn from(triad: &Triad) -> Self {
        Self {
            identity_id: triad.identity_id.clone(),
            seats: seat_views(triad),
            complete: triad.is_complete(),
        }
    }
}

fn seat_views(triad: &Triad) -> Vec<SeatView> {
    Layer::ALL
        .iter()
        .map(|layer| match triad.slot(*layer) {
            Some(slot) => SeatView {
                layer: *layer,
                state: slot.state,
                updated_at: slot.updated_at,
                seat_id: slot.seat_id,
                cas_version: slot.cas_version,
            },
            None => SeatView {
                layer: *layer,
                state: SeatState::Empty,
                updated_at: None,
                seat_id: None,
                cas_version: 0,
            },
        })
        .collect()
}

/// `POST policy/validate/{domain_id}` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateRequest {
    /// Candidate local policy
    pub content: String,
}

/// `POST policy/validate/{domain_id}` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateResponse {
    /// True iff `hints` is empty
    pub success: bool,
    /// Candidate-relative hints, ascending by line
    pub hints: Vec<PolicyHint>,
}

/// `POST policy/save/{target_domain_id}` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRequest {
    /// Candidate local policy
    pub content: String,
    /// Domain whose local slot is written
    #[serde(rename = "domainId")]
    pub domain_id: DomainId,
}

/// `POST policy/save/{target_domain_id}` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResponse {
    /// Commit receipt
    pub receipt: Receipt,
    /// False when the slot was committed but the receipt log was unreachable
    pub recorded: bool,
}

/// `POST flow/eval` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEvalRequest {
    /// Acting identity
    pub identity_id: IdentityId,
    /// Domain whose effective policy applies
    pub domain_id: DomainId,
    /// Action name
    pub action: String,
    /// Direction of the action
    pub direction: Direction,
    /// Domain the action targets
    #[serde(default)]
    pub action_domain: Option<DomainId>,
    /// Domain of the acting seat
    #[serde(default)]
    pub seat_domain: Option<DomainId>,
    /// Parent approval
    #[serde(default)]
    pub parent_approved: bool,
    /// Opaque evaluator context
    #[serde(default)]
    pub context: Option<serde_json::Value>,
}

impl From<FlowEvalRequest> for FlowRequest {
    fn from(body: FlowEvalRequest) -> Self {
        FlowRequest {
            identity_id: body.identity_id,
            domain_id: body.domain_id,
            action: body.action,
            direction: body.direction,
            action_domain: body.action_domain,
            seat_domain: body.seat_domain,
            parent_approved: body.parent_approved,
            context: body.context,
        }
    }
}

/// `POST flow/eval` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEvalResponse {
    /// Verdict
    pub allow: bool,
    /// Reason discriminator
    pub reason: FlowReason,
    /// Triad the decision was made against
    pub triad_seats: Vec<SeatView>,
    /// Effective policy digest (hex)
    pub policy_version: String,
    /// Evaluation time (ms since epoch)
    pub evaluated_at: u64,
    /// Decision id
    pub decision_id: String,
    /// Made under a synthetic fallback domain
    pub synthetic: bool,
}

/// `GET flow/preview` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewResponse {
    /// Illustrative scenarios
    pub scenarios: Vec<FlowScenario>,
    /// Always false
    pub authoritative: bool,
}

/// Seat write body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatMutateRequest {
    /// Seat to write
    pub seat_id: SeatId,
    /// Version the caller read
    pub expected_cas: u64,
    /// Requested state
    pub new_state: SeatState,
}

/// Seat write response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatMutateResponse {
    /// Version written against
    pub cas_prev: u64,
    /// Stored version after the call
    pub cas_new: u64,
    /// Whether the write was applied
    pub ok: bool,
    /// The session re-sent a base that was already rejected
    #[serde(default)]
    pub blind_retry: bool,
}

/// Endpoint methods over the console components
#[derive(Clone)]
pub struct ConsoleApi {
    handlers: Handlers,
    config: ConsoleConfig,
    triads: TriadResolver,
    policies: PolicyResolver,
    validator: PolicyValidator,
    router: PolicyWriteRouter,
    flow: FlowEvaluator,
    mutator: Arc<SeatMutator>,
    domain_seats: DomainSeatRegistry,
}

impl ConsoleApi {
    /// Wire every component over `handlers`
    pub fn new(handlers: Handlers, config: ConsoleConfig) -> Self {
        let triads = TriadResolver::new(handlers.seats.clone());
        let policies = PolicyResolver::new(
            handlers.domains.clone(),
            handlers.policies.clone(),
            &config.policy,
        );
        let validator = PolicyValidator::new(
            policies.clone(),
            handlers.evaluator.clone(),
            config.policy.clone(),
        );
        let router = PolicyWriteRouter::new(
            validator.clone(),
            handlers.domains.clone(),
            handlers.policies.clone(),
            handlers.receipts.clone(),
            handlers.clock.clone(),
            config.policy.write_routing,
        );
        let flow = FlowEvaluator::new(
            triads.clone(),
            policies.clone(),
            handlers.evaluator.clone(),
            handlers.receipts.clone(),
            handlers.bus.clone(),
            handlers.clock.clone(),
            &config.policy,
            config.flow.clone(),
        );
        let mutator = Arc::new(SeatMutator::new(
            handlers.seats.clone(),
            handlers.bus.clone(),
            handlers.receipts.clone(),
            handlers.clock.clone(),
            config.seats.clone(),
        ));
        let domain_seats = DomainSeatRegistry::new(
            handlers.domains.clone(),
            handlers.domain_seats.clone(),
            policies.clone(),
            handlers.receipts.clone(),
            handlers.bus.clone(),
            handlers.clock.clone(),
        );
        Self {
            handlers,
            config,
            triads,
            policies,
            validator,
            router,
            flow,
            mutator,
            domain_seats,
        }
    }

    /// `GET triad/{identity_id}`
    pub async fn get_triad(&self, identity_id: &IdentityId) -> ConsoleResult<TriadResponse> {
        let triad = self.triads.get_triad(identity_id).await?;
        Ok(TriadResponse::from(&triad))
    }

    /// `GET policy/get/{domain_id}?mode=local|inherited`
    pub async fn policy_get(&self, domain_id: &DomainId, mode: PolicyScope) -> ConsoleResult<String> {
        self.policies.read(domain_id, mode).await
    }

    /// `POST policy/validate/{domain_id}`
    pub async fn policy_validate(
        &self,
        domain_id: &DomainId,
        body: ValidateRequest,
    ) -> ConsoleResult<ValidateResponse> {
        let report = self.validator.validate(domain_id, &body.content).await?;
        Ok(ValidateResponse {
            success: report.success,
            hints: report.hints,
        })
    }

    /// Domain that commits `domain_id`'s local policy under the configured routing
    pub async fn routed_target(&self, domain_id: &DomainId) -> ConsoleResult<DomainId> {
        self.router.routed_target(domain_id).await
    }

    /// `POST policy/save/{target_domain_id}`
    ///
    /// The path names the committing domain. It must agree with where the
    /// configured routing sends a save of `body.domain_id`.
    pub async fn policy_save(
        &self,
        ctx: &OperatorContext,
        target_domain_id: &DomainId,
        body: SaveRequest,
    ) -> ConsoleResult<SaveResponse> {
        let routed = self.router.routed_target(&body.domain_id).await?;
        if &routed != target_domain_id {
            tracing::warn!(
                domain = %body.domain_id,
                requested = %target_domain_id,
                %routed,
                "policy save addressed to the wrong authority"
            );
            return Err(ConsoleError::invalid(format!(
                "policy of {} is committed by {routed}, not {target_domain_id}",
                body.domain_id
            )));
        }
        let saved = self.router.save(ctx, &body.domain_id, &body.content).await?;
        Ok(SaveResponse {
            receipt: saved.receipt,
            recorded: saved.recorded,
        })
    }

    /// `POST flow/eval`
    pub async fn flow_eval(
        &self,
        ctx: &OperatorContext,
        body: FlowEvalRequest,
    ) -> ConsoleResult<FlowEvalResponse> {
        let decision = self.flow.evaluate(ctx, body.into()).await?;
        Ok(FlowEvalResponse {
            allow: decision.allow,
            reason: decision.reason,
            triad_seats: seat_views(&decision.triad),
            policy_version: decision.policy_version.to_hex(),
            evaluated_at: decision.evaluated_at,
            decision_id: decision.decision_id.to_string(),
            synthetic: decision.synthetic,
        })
    }

    /// `GET flow/preview`
    pub fn flow_preview(&self) -> PreviewResponse {
        PreviewResponse {
            scenarios: triad_flow::preview(),
            authoritative: false,
        }
    }

    /// CAS write to one seat
    pub async fn seat_mutate(
        &self,
        ctx: &OperatorContext,
        body: SeatMutateRequest,
    ) -> ConsoleResult<SeatMutateResponse> {
        let outcome = self
            .mutator
            .mutate_seat(ctx, body.seat_id, body.expected_cas, body.new_state)
            .await?;
        Ok(SeatMutateResponse {
            cas_prev: outcome.cas_prev,
            cas_new: outcome.cas_new,
            ok: outcome.ok,
            blind_retry: outcome.blind_retry,
        })
    }

    /// Drop per-session write state once an operator session ends
    pub fn end_session(&self, ctx: &OperatorContext) {
        self.mutator.end_session(ctx.session_id);
    }

    /// Seat id of `(identity, layer)`, creating an EMPTY record when missing
    pub async fn seat_for(&self, identity_id: &IdentityId, layer: Layer) -> ConsoleResult<SeatId> {
        let seat = self
            .handlers
            .seats
            .ensure_seat(identity_id, layer, self.handlers.clock.now_ms())
            .await?;
        Ok(seat.id)
    }

    /// Membership seats of a domain
    pub fn domain_seats(&self) -> &DomainSeatRegistry {
        &self.domain_seats
    }

    /// A viewer session over the same bus and seat store
    pub fn viewer_session(&self) -> ViewerSession {
        ViewerSession::new(
            self.handlers.bus.clone(),
            self.handlers.seats.clone(),
            self.config.reconciliation.clone(),
        )
    }
}

impl std::fmt::Debug for ConsoleApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleApi")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
