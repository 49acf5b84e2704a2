//! What a viewer shows

use crate::banner::Banner;
use crate::refetch::Refetched;
use triad_core::{IdentityId, Triad};

/// How far the shown triad can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// No subscription yet
    Connecting,
    /// Subscribed and re-read since the last dirty signal
    Live,
    /// Disconnected or the last re-read failed; may be out of date
    Stale,
}

/// Snapshot published to every panel of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriadView {
    /// Observed identity
    pub identity_id: IdentityId,
    /// Last triad read; `None` before the first read or once the identity is gone
    pub triad: Option<Triad>,
    /// Trust in `triad`
    pub freshness: Freshness,
    /// Why the view is stale, or why the identity is missing
    pub note: Option<String>,
    /// Visible transient indicators
    pub banners: Vec<Banner>,
    /// Completed re-reads
    pub refreshes: u64,
}

impl TriadView {
    /// Initial view before anything is known
    pub fn connecting(identity_id: IdentityId) -> Self {
        Self {
            identity_id,
            triad: None,
            freshness: Freshness::Connecting,
            note: None,
            banners: Vec::new(),
            refreshes: 0,
        }
    }

    /// Fold a re-read into the view
    ///
    /// A failed read keeps the last triad but marks it stale.
    pub fn apply(&mut self, refetched: Refetched) {
        self.refreshes += 1;
        match refetched {
            Refetched::Fresh(triad) => {
                self.triad = Some(triad);
                self.note = None;
                self.freshness = Freshness::Live;
            }
            Refetched::Gone => {
                self.triad = None;
                self.note = Some(format!("identity {} not found", self.identity_id));
                self.freshness = Freshness::Live;
            }
            Refetched::Failed(err) => {
                self.freshness = Freshness::Stale;
                self.note = Some(err.to_string());
            }
        }
    }

    /// Mark the view stale without touching the triad
    pub fn mark_stale(&mut self, reason: impl Into<String>) {
        self.freshness = Freshness::Stale;
        self.note = Some(reason.into());
    }

    /// Whether the shown triad may be presented as authoritative
    pub fn is_authoritative(&self) -> bool {
        self.freshness == Freshness::Live && self.triad.is_some()
    }
}
