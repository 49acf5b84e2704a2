//! Append-only audit receipts

use crate::context::OperatorContext;
use crate::domain::DomainSeatStatus;
use crate::flow::FlowReason;
use crate::identifiers::{
    DecisionId, DomainId, DomainSeatId, IdentityId, ReceiptId, SeatId, SessionId,
};
use crate::policy::{PolicyDigest, PolicyVersion};
use crate::seat::{Layer, SeatState};
use serde::{Deserialize, Serialize};

/// What a receipt records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReceiptKind {
    /// Accepted CAS write to a triad seat
    SeatMutation {
        /// Seat written
        seat_id: SeatId,
        /// Seat owner
        identity_id: IdentityId,
        /// Seat layer
        layer: Layer,
        /// State before
        from: SeatState,
        /// State after
        to: SeatState,
        /// Version written against
        cas_prev: u64,
        /// Version after the write
        cas_new: u64,
        /// Decision that caused the write, if any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        decision_id: Option<DecisionId>,
    },
    /// Accepted write to a domain's local policy slot
    PolicyCommit {
        /// Domain whose slot changed
        domain_id: DomainId,
        /// Domain that committed the write
        committed_by: DomainId,
        /// New slot version
        version: PolicyVersion,
    },
    /// Flow decision issued
    FlowDecision {
        /// Decision id
        decision_id: DecisionId,
        /// Identity evaluated
        identity_id: IdentityId,
        /// Domain evaluated
        domain_id: DomainId,
        /// Action evaluated
        action: String,
        /// Verdict
        allow: bool,
        /// Reason discriminator
        reason: FlowReason,
        /// Effective policy digest used
        policy_version: PolicyDigest,
    },
    /// Domain seat appointed or transitioned
    DomainSeat {
        /// Record id
        domain_seat_id: DomainSeatId,
        /// Domain
        domain_id: DomainId,
        /// Previous status, absent on appointment
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<DomainSeatStatus>,
        /// New status
        to: DomainSeatStatus,
    },
}

/// Immutable audit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Receipt id
    pub id: ReceiptId,
    /// Recorded event
    pub kind: ReceiptKind,
    /// Acting identity, when known
    pub actor: Option<IdentityId>,
    /// Session that issued the operation
    pub session_id: SessionId,
    /// Recording time (ms since epoch)
    pub recorded_at: u64,
}

impl Receipt {
    /// New receipt attributed to the operator context
    pub fn new(kind: ReceiptKind, ctx: &OperatorContext, recorded_at: u64) -> Self {
        Self {
            id: ReceiptId::new_random(),
            kind,
            actor: ctx.acting_identity.clone(),
            session_id: ctx.session_id,
            recorded_at,
        }
    }
}
