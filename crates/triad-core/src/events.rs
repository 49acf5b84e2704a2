//! Change notifications
//!
//! Notifications are a tagged union keyed by `type`. Decoding rejects unknown
//! tags outright instead of guessing at fields. Receivers treat every
//! notification as a dirty signal and re-read authoritative state; payloads
//! are never applied as diffs.

use crate::domain::DomainSeatStatus;
use crate::errors::{ConsoleError, ConsoleResult};
use crate::flow::FlowReason;
use crate::identifiers::{DecisionId, DomainId, DomainSeatId, IdentityId, ReceiptId, SeatId};
use crate::seat::{Layer, SeatState};
use serde::{Deserialize, Serialize};

/// Wire tag of [`SeatChange`]
pub const SEAT_CHANGE: &str = "seat.change";
/// Wire tag of [`DecisionNotice`]
pub const FLOW_DECISION: &str = "flow.decision";
/// Wire tag of [`DomainSeatNotice`]
pub const DOMAIN_SEAT_CHANGE: &str = "domain_seat.change";

/// A seat write was attempted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatChange {
    /// Seat owner
    pub identity_id: IdentityId,
    /// Seat layer
    pub layer: Layer,
    /// Seat id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seat_id: Option<SeatId>,
    /// State before the attempt
    pub from: SeatState,
    /// Requested state
    pub to: SeatState,
    /// Decision that caused the write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_id: Option<DecisionId>,
    /// Receipt of an accepted write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<ReceiptId>,
    /// Version the writer based the attempt on
    pub cas_prev: u64,
    /// Stored version after the attempt
    pub cas_new: u64,
    /// Whether the CAS was accepted
    pub cas_ok: bool,
    /// Caused by a decision under a synthetic fallback domain
    #[serde(default)]
    pub synthetic: bool,
    /// Human-readable note
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Emission time (ms since epoch)
    pub timestamp: u64,
}

/// A flow decision was issued
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionNotice {
    /// Identity evaluated
    pub identity_id: IdentityId,
    /// Domain evaluated
    pub domain_id: DomainId,
    /// Decision id
    pub decision_id: DecisionId,
    /// Verdict
    pub allow: bool,
    /// Reason discriminator
    pub reason: FlowReason,
    /// Decision came from a synthetic fallback domain
    #[serde(default)]
    pub synthetic: bool,
    /// Human-readable note
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Emission time (ms since epoch)
    pub timestamp: u64,
}

/// A domain membership seat changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSeatNotice {
    /// Domain
    pub domain_id: DomainId,
    /// Record id
    pub domain_seat_id: DomainSeatId,
    /// Member identity, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<IdentityId>,
    /// Previous status, absent on appointment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<DomainSeatStatus>,
    /// New status
    pub to: DomainSeatStatus,
    /// Receipt of the transition
    pub receipt_id: ReceiptId,
    /// Emission time (ms since epoch)
    pub timestamp: u64,
}

/// Every notification the console publishes or accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConsoleEvent {
    /// `seat.change`
    #[serde(rename = "seat.change")]
    SeatChange(SeatChange),
    /// `flow.decision`
    #[serde(rename = "flow.decision")]
    FlowDecision(DecisionNotice),
    /// `domain_seat.change`
    #[serde(rename = "domain_seat.change")]
    DomainSeatChange(DomainSeatNotice),
}

impl ConsoleEvent {
    /// Decode a wire payload, rejecting missing or unknown `type` tags
    pub fn decode(payload: &serde_json::Value) -> ConsoleResult<Self> {
        let tag = payload
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| ConsoleError::invalid("notification has no string 'type' tag"))?;
        if ![SEAT_CHANGE, FLOW_DECISION, DOMAIN_SEAT_CHANGE].contains(&tag) {
            return Err(ConsoleError::invalid(format!(
                "unknown notification type '{tag}'"
            )));
        }
        serde_json::from_value(payload.clone())
            .map_err(|e| ConsoleError::invalid(format!("malformed '{tag}' notification: {e}")))
    }

    /// Encode to a wire payload
    pub fn encode(&self) -> ConsoleResult<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| ConsoleError::internal(e.to_string()))
    }

    /// Wire tag
    pub fn tag(&self) -> &'static str {
        match self {
            ConsoleEvent::SeatChange(_) => SEAT_CHANGE,
            ConsoleEvent::FlowDecision(_) => FLOW_DECISION,
            ConsoleEvent::DomainSeatChange(_) => DOMAIN_SEAT_CHANGE,
        }
    }

    /// Identity the notification targets, if any
    pub fn identity_id(&self) -> Option<&IdentityId> {
        match self {
            ConsoleEvent::SeatChange(change) => Some(&change.identity_id),
            ConsoleEvent::FlowDecision(notice) => Some(&notice.identity_id),
            ConsoleEvent::DomainSeatChange(notice) => notice.member_id.as_ref(),
        }
    }

    /// Whether the notification reports a rejected CAS
    pub fn is_conflict(&self) -> bool {
        matches!(self, ConsoleEvent::SeatChange(change) if !change.cas_ok)
    }

    /// Whether the notification stems from a synthetic fallback domain
    pub fn is_synthetic(&self) -> bool {
        match self {
            ConsoleEvent::SeatChange(change) => change.synthetic,
            ConsoleEvent::FlowDecision(notice) => notice.synthetic,
            ConsoleEvent::DomainSeatChange(_) => false,
        }
    }

    /// Attached human-readable note
    pub fn message(&self) -> Option<&str> {
        match self {
            ConsoleEvent::SeatChange(change) => change.message.as_deref(),
            ConsoleEvent::FlowDecision(notice) => notice.message.as_deref(),
            ConsoleEvent::DomainSeatChange(_) => None,
        }
    }
}
