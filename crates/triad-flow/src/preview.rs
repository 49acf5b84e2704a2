//! Illustrative flow scenarios
//!
//! Static examples for operators learning the flow rules. They are not
//! evaluated and never describe real state.

use serde_json::json;
use triad_core::{Direction, FlowReason, FlowRequest, FlowScenario, Layer, SeatState};

fn scenario(
    name: &str,
    description: &str,
    request: FlowRequest,
    assumed: [SeatState; 3],
    expected_allow: bool,
    expected_reason: FlowReason,
) -> FlowScenario {
    FlowScenario {
        name: name.to_string(),
        description: description.to_string(),
        request,
        assumed_triad: Layer::ALL.into_iter().zip(assumed).collect(),
        expected_allow,
        expected_reason,
        authoritative: false,
    }
}

/// Sample scenarios for the preview endpoint
pub fn preview() -> Vec<FlowScenario> {
    use SeatState::*;
    vec![
        scenario(
            "frozen-lima-veto",
            "A FROZEN seat on any layer denies every action before policy is consulted.",
            FlowRequest::new("example-identity", "example.domain", "ci.call.v1", Direction::Lateral)
                .parent_approved(true),
            [Occupied, Occupied, Frozen],
            false,
            FlowReason::FrozenVeto(Layer::Lima),
        ),
        scenario(
            "downward-with-approval",
            "A complete triad acting downward with parent approval, under a policy that grants it.",
            FlowRequest::new("example-identity", "example.domain", "ci.deploy.staging", Direction::Downward)
                .parent_approved(true),
            [Occupied, Occupied, Occupied],
            true,
            FlowReason::PolicyAllow,
        ),
        scenario(
            "upward-restricted",
            "A child domain's deny rule restricts an upward action the root would allow.",
            FlowRequest::new("example-identity", "example.domain.child", "ci.deploy.prod", Direction::Upward),
            [Occupied, Assigned, Occupied],
            false,
            FlowReason::PolicyDeny,
        ),
        scenario(
            "context-guarded",
            "Evaluator context (here an environment label) can gate an allowance.",
            FlowRequest::new("example-identity", "example.domain", "db.read", Direction::Lateral)
                .with_context(json!({"env": "staging"})),
            [Occupied, Occupied, Assigned],
            true,
            FlowReason::PolicyAllow,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenarios_are_never_authoritative() {
        let scenarios = preview();
        assert!(!scenarios.is_empty());
        assert!(scenarios.iter().all(|s| !s.authoritative));
        assert!(scenarios.iter().all(|s| s.assumed_triad.len() == 3));
    }

    #[test]
    fn veto_scenario_matches_veto_rule() {
        let veto = &preview()[0];
        assert!(!veto.expected_allow);
        assert!(veto
            .assumed_triad
            .iter()
            .any(|(_, state)| *state == SeatState::Frozen));
    }
}
