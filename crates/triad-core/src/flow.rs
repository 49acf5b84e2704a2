//! Flow evaluation requests and decisions

use crate::identifiers::{DecisionId, DomainId, IdentityId};
use crate::policy::PolicyDigest;
use crate::seat::{Layer, Triad};
use crate::ConsoleError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of an action relative to the domain tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Toward an ancestor
    Upward,
    /// Toward a descendant
    Downward,
    /// Between siblings or within one domain
    Lateral,
}

impl Direction {
    /// Wire name of the direction
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Upward => "upward",
            Direction::Downward => "downward",
            Direction::Lateral => "lateral",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upward" => Ok(Direction::Upward),
            "downward" => Ok(Direction::Downward),
            "lateral" => Ok(Direction::Lateral),
            other => Err(ConsoleError::invalid(format!("unknown direction '{other}'"))),
        }
    }
}

/// Request to evaluate one action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRequest {
    /// Acting identity whose triad is consulted
    pub identity_id: IdentityId,
    /// Domain whose effective policy applies
    pub domain_id: DomainId,
    /// Action name, e.g. `ci.call.v1`
    pub action: String,
    /// Direction of the action
    pub direction: Direction,
    /// Domain the action targets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_domain: Option<DomainId>,
    /// Domain the acting seat belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seat_domain: Option<DomainId>,
    /// Whether the parent domain approved the action
    #[serde(default)]
    pub parent_approved: bool,
    /// Opaque context forwarded to the evaluator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl FlowRequest {
    /// Request with no optional fields set
    pub fn new(
        identity_id: impl Into<IdentityId>,
        domain_id: impl Into<DomainId>,
        action: impl Into<String>,
        direction: Direction,
    ) -> Self {
        Self {
            identity_id: identity_id.into(),
            domain_id: domain_id.into(),
            action: action.into(),
            direction,
            action_domain: None,
            seat_domain: None,
            parent_approved: false,
            context: None,
        }
    }

    /// Set the parent-approval flag
    pub fn parent_approved(mut self, approved: bool) -> Self {
        self.parent_approved = approved;
        self
    }

    /// Attach evaluator context
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }
}

/// Short discriminator explaining a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum FlowReason {
    /// Hard local veto: the named layer is FROZEN
    FrozenVeto(Layer),
    /// The evaluator allowed the action
    PolicyAllow,
    /// The evaluator denied the action
    PolicyDeny,
}

impl fmt::Display for FlowReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowReason::FrozenVeto(layer) => write!(f, "frozen_veto:{layer}"),
            FlowReason::PolicyAllow => f.write_str("policy_allow"),
            FlowReason::PolicyDeny => f.write_str("policy_deny"),
        }
    }
}

impl From<FlowReason> for String {
    fn from(reason: FlowReason) -> Self {
        reason.to_string()
    }
}

impl TryFrom<String> for FlowReason {
    type Error = ConsoleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "policy_allow" => Ok(FlowReason::PolicyAllow),
            "policy_deny" => Ok(FlowReason::PolicyDeny),
            other => match other.strip_prefix("frozen_veto:") {
                Some(layer) => Ok(FlowReason::FrozenVeto(layer.parse()?)),
                None => Err(ConsoleError::invalid(format!("unknown flow reason '{other}'"))),
            },
        }
    }
}

/// Ephemeral flow decision; never persisted by the console itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDecision {
    /// Decision id referenced by receipts and notifications
    pub decision_id: DecisionId,
    /// Identity evaluated
    pub identity_id: IdentityId,
    /// Domain evaluated
    pub domain_id: DomainId,
    /// Action evaluated
    pub action: String,
    /// Final verdict
    pub allow: bool,
    /// Why
    pub reason: FlowReason,
    /// Triad snapshot the decision was made against
    pub triad: Triad,
    /// Digest of the effective policy used
    pub policy_version: PolicyDigest,
    /// Evaluation time (ms since epoch)
    pub evaluated_at: u64,
    /// Decision made under a synthetic fallback domain
    pub synthetic: bool,
}

/// Illustrative scenario shown by the flow preview; never authoritative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowScenario {
    /// Short label
    pub name: String,
    /// What the scenario demonstrates
    pub description: String,
    /// Example request
    pub request: FlowRequest,
    /// Triad the example assumes
    pub assumed_triad: Vec<(Layer, crate::seat::SeatState)>,
    /// Outcome the example expects
    pub expected_allow: bool,
    /// Expected reason
    pub expected_reason: FlowReason,
    /// Always false
    pub authoritative: bool,
}
