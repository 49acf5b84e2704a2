//! Explicit operator context
//!
//! Every mutating or evaluating operation receives the acting identity and
//! domain through this value. No component reads ambient "current user" state.

use crate::identifiers::{DomainId, IdentityId, SessionId};
use serde::{Deserialize, Serialize};

/// Who is acting, from which domain, in which session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorContext {
    /// Session issuing the operation
    pub session_id: SessionId,
    /// Identity acting, when authenticated
    pub acting_identity: Option<IdentityId>,
    /// Domain the operator is acting from
    pub acting_domain: Option<DomainId>,
}

impl OperatorContext {
    /// Context for a fresh session with no acting identity
    pub fn new_session() -> Self {
        Self {
            session_id: SessionId::new_random(),
            acting_identity: None,
            acting_domain: None,
        }
    }

    /// Context for an identity acting from a domain
    pub fn acting(identity: impl Into<IdentityId>, domain: impl Into<DomainId>) -> Self {
        Self {
            session_id: SessionId::new_random(),
            acting_identity: Some(identity.into()),
            acting_domain: Some(domain.into()),
        }
    }

    /// Same session, different acting identity
    pub fn with_identity(mut self, identity: impl Into<IdentityId>) -> Self {
        self.acting_identity = Some(identity.into());
        self
    }

    /// Same session, different acting domain
    pub fn with_domain(mut self, domain: impl Into<DomainId>) -> Self {
        self.acting_domain = Some(domain.into());
        self
    }
}
