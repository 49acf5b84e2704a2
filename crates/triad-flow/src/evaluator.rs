//! Flow decisions
//!
//! A decision combines the identity's current triad with the domain's
//! effective policy. A FROZEN seat on any layer is a hard local veto: the
//! action is denied without consulting policy. Otherwise the evaluator
//! decides; the console does not interpret the input document it builds.

use serde_json::json;
use std::sync::Arc;
use triad_core::effects::{
    ClockEffects, EvaluationRequest, EventBusEffects, PolicyEvaluatorEffects, ReceiptLogEffects,
};
use triad_core::{
    ConsoleError, ConsoleEvent, ConsoleResult, DecisionId, DecisionNotice, FlowConfig,
    FlowDecision, FlowReason, FlowRequest, Layer, OperatorContext, PolicyConfig, Receipt,
    ReceiptKind, Triad,
};
use triad_policy::PolicyResolver;
use triad_seats::TriadResolver;

/// Layers whose FROZEN state vetoes every action
pub const VETO_LAYERS: [Layer; 3] = Layer::ALL;

/// The first vetoing layer of a triad, if any
pub fn frozen_veto(triad: &Triad) -> Option<Layer> {
    triad
        .frozen_layers()
        .into_iter()
        .find(|layer| VETO_LAYERS.contains(layer))
}

/// Input document handed to the evaluator
pub fn evaluation_input(request: &FlowRequest, triad: &Triad) -> serde_json::Value {
    let seats: serde_json::Map<String, serde_json::Value> = Layer::ALL
        .iter()
        .map(|layer| (layer.to_string(), json!(triad.state(*layer))))
        .collect();
    json!({
        "action": request.action,
        "direction": request.direction,
        "parent_approved": request.parent_approved,
        "action_domain": request.action_domain,
        "seat_domain": request.seat_domain,
        "context": request.context.clone().unwrap_or_else(|| json!({})),
        "triad": {
            "identity_id": triad.identity_id,
            "seats": seats,
            "complete": triad.is_complete(),
        },
    })
}

/// Computes allow/deny decisions
#[derive(Clone)]
pub struct FlowEvaluator {
    triads: TriadResolver,
    policies: PolicyResolver,
    evaluator: Arc<dyn PolicyEvaluatorEffects>,
    receipts: Arc<dyn ReceiptLogEffects>,
    bus: Arc<dyn EventBusEffects>,
    clock: Arc<dyn ClockEffects>,
    query: String,
    config: FlowConfig,
}

impl FlowEvaluator {
    /// Create an evaluator
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        triads: TriadResolver,
        policies: PolicyResolver,
        evaluator: Arc<dyn PolicyEvaluatorEffects>,
        receipts: Arc<dyn ReceiptLogEffects>,
        bus: Arc<dyn EventBusEffects>,
        clock: Arc<dyn ClockEffects>,
        policy: &PolicyConfig,
        config: FlowConfig,
    ) -> Self {
        Self {
            triads,
            policies,
            evaluator,
            receipts,
            bus,
            clock,
            query: policy.query.clone(),
            config,
        }
    }

    /// Decide one action
    ///
    /// Errors: `NotFound` for unknown identities or domains, `Transient` when
    /// a collaborator is unreachable, `Evaluator` when the evaluator fails or
    /// returns no verdict. None of these is a denial.
    pub async fn evaluate(
        &self,
        ctx: &OperatorContext,
        request: FlowRequest,
    ) -> ConsoleResult<FlowDecision> {
        let triad = self.triads.get_triad(&request.identity_id).await?;
        let resolved = self.policies.resolve(&request.domain_id).await?;
        let policy_version = resolved.digest();

        let (allow, reason) = match frozen_veto(&triad) {
            Some(layer) => {
                tracing::info!(identity = %request.identity_id, %layer, "frozen seat vetoes action");
                (false, FlowReason::FrozenVeto(layer))
            }
            None => {
                let evaluation = EvaluationRequest {
                    policy: resolved.effective.clone(),
                    input: evaluation_input(&request, &triad),
                    query: self.query.clone(),
                };
                let outcome = self.evaluator.evaluate(&evaluation).await?;
                if let Some(diag) = outcome.diagnostics.first() {
                    return Err(ConsoleError::evaluator(format!(
                        "effective policy of {} does not compile (line {}: {})",
                        request.domain_id, diag.line, diag.message
                    )));
                }
                match outcome.allow {
                    Some(true) => (true, FlowReason::PolicyAllow),
                    Some(false) => (false, FlowReason::PolicyDeny),
                    None => {
                        return Err(ConsoleError::evaluator(format!(
                            "query {} is undefined for action {}",
                            self.query, request.action
                        )))
                    }
                }
            }
        };

        let decision = FlowDecision {
            decision_id: DecisionId::new_random(),
            identity_id: request.identity_id,
            domain_id: request.domain_id,
            action: request.action,
            allow,
            reason,
            triad,
            policy_version,
            evaluated_at: self.clock.now_ms(),
            synthetic: resolved.domain.synthetic,
        };
        tracing::info!(
            decision = %decision.decision_id,
            identity = %decision.identity_id,
            domain = %decision.domain_id,
            action = %decision.action,
            allow,
            %reason,
            synthetic = decision.synthetic,
            "flow decided"
        );

        if self.config.audit_decisions {
            self.receipts
                .append(Receipt::new(
                    ReceiptKind::FlowDecision {
                        decision_id: decision.decision_id,
                        identity_id: decision.identity_id.clone(),
                        domain_id: decision.domain_id.clone(),
                        action: decision.action.clone(),
                        allow,
                        reason,
                        policy_version,
                    },
                    ctx,
                    decision.evaluated_at,
                ))
                .await?;
        }
        if self.config.publish_decisions {
            self.publish(&decision).await;
        }
        Ok(decision)
    }

    async fn publish(&self, decision: &FlowDecision) {
        let notice = DecisionNotice {
            identity_id: decision.identity_id.clone(),
            domain_id: decision.domain_id.clone(),
            decision_id: decision.decision_id,
            allow: decision.allow,
            reason: decision.reason,
            synthetic: decision.synthetic,
            message: decision
                .synthetic
                .then(|| self.config.synthetic_message.clone()),
            timestamp: decision.evaluated_at,
        };
        if let Err(err) = self.bus.publish(&ConsoleEvent::FlowDecision(notice)).await {
            tracing::warn!(decision = %decision.decision_id, error = %err, "decision notice not published");
        }
    }
}

impl std::fmt::Debug for FlowEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowEvaluator")
            .field("query", &self.query)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triad_core::{Direction, IdentityId, Seat, SeatState};

    fn triad(states: [SeatState; 3]) -> Triad {
        let seats: Vec<Seat> = Layer::ALL
            .iter()
            .zip(states)
            .map(|(layer, state)| {
                let mut seat = Seat::vacant(IdentityId::new("i"), *layer, 1);
                seat.state = state;
                seat
            })
            .collect();
        Triad::from_seats(IdentityId::new("i"), &seats)
    }

    #[test]
    fn any_frozen_layer_vetoes() {
        use SeatState::*;
        assert_eq!(frozen_veto(&triad([Occupied, Occupied, Frozen])), Some(Layer::Lima));
        assert_eq!(frozen_veto(&triad([Frozen, Occupied, Occupied])), Some(Layer::Terra));
        assert_eq!(frozen_veto(&triad([Occupied, Assigned, Empty])), None);
    }

    #[test]
    fn input_carries_triad_and_flags() {
        let request = FlowRequest::new("i", "d", "ci.call.v1", Direction::Upward)
            .parent_approved(true)
            .with_context(json!({"env": "prod"}));
        let input = evaluation_input(&request, &triad([SeatState::Occupied; 3]));
        assert_eq!(input["action"], "ci.call.v1");
        assert_eq!(input["direction"], "upward");
        assert_eq!(input["parent_approved"], true);
        assert_eq!(input["context"]["env"], "prod");
        assert_eq!(input["triad"]["seats"]["numen"], "OCCUPIED");
        assert_eq!(input["triad"]["complete"], true);
    }
}
