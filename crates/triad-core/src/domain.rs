//! Domain tree and per-domain membership seats

use crate::identifiers::{DomainId, DomainSeatId, IdentityId, ReceiptId};
use crate::policy::PolicyVersion;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Node of the domain tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    /// Domain id
    pub id: DomainId,
    /// Parent domain; `None` for roots
    pub parent_id: Option<DomainId>,
    /// Display name
    pub name: String,
    /// Non-authoritative fallback domain. Decisions made under it are flagged.
    #[serde(default)]
    pub synthetic: bool,
}

impl Domain {
    /// Create a root domain
    pub fn root(id: impl Into<DomainId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            name: name.into(),
            synthetic: false,
        }
    }

    /// Create a child domain
    pub fn child(
        id: impl Into<DomainId>,
        parent_id: impl Into<DomainId>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id: Some(parent_id.into()),
            name: name.into(),
            synthetic: false,
        }
    }

    /// Mark the domain as a synthetic fallback
    pub fn synthetic(mut self) -> Self {
        self.synthetic = true;
        self
    }

    /// Whether this is a root of the tree
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Kind of membership seat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainSeatType {
    /// The domain's single root authority seat
    Root,
    /// Ordinary member seat
    Member,
}

/// Membership status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainSeatStatus {
    /// Membership in force
    Active,
    /// Membership suspended; reversible
    Frozen,
    /// Membership ended; terminal, the record persists for audit
    Detached,
}

impl DomainSeatStatus {
    /// Whether `self -> next` is a legal membership transition
    pub fn can_transition_to(&self, next: DomainSeatStatus) -> bool {
        use DomainSeatStatus::*;
        matches!(
            (self, next),
            (Active, Frozen) | (Frozen, Active) | (Active, Detached) | (Frozen, Detached)
        )
    }

    /// Wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainSeatStatus::Active => "active",
            DomainSeatStatus::Frozen => "frozen",
            DomainSeatStatus::Detached => "detached",
        }
    }
}

impl fmt::Display for DomainSeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-domain membership record, distinct from triad-layer seats
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSeat {
    /// Record id
    pub id: DomainSeatId,
    /// Domain the seat belongs to
    pub domain_id: DomainId,
    /// Root or member
    pub seat_type: DomainSeatType,
    /// Member identity, if the seat is held by one
    pub member_id: Option<IdentityId>,
    /// Membership status
    pub status: DomainSeatStatus,
    /// Free-form scope label
    pub scope: String,
    /// Effective policy version in force at appointment
    pub policy_version: PolicyVersion,
    /// Effective policy text in force at appointment
    pub rego_text: String,
    /// Receipt written when the seat was appointed
    pub appointment_receipt: ReceiptId,
}
