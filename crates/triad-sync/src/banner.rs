//! Transient indicators
//!
//! At most one banner per kind. Raising a kind that is already showing
//! replaces its message and restarts its timer. Timing uses the runtime's
//! monotonic clock, so paused-time tests control it.

use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

/// Kind of transient indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BannerKind {
    /// A CAS write was rejected
    Conflict,
    /// A decision came from a synthetic fallback domain
    Synthetic,
}

/// One visible indicator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    /// Kind
    pub kind: BannerKind,
    /// Display text
    pub message: String,
    /// When it disappears
    pub expires_at: Instant,
}

/// Set of visible indicators with per-kind lifetimes
#[derive(Debug, Clone)]
pub struct BannerBoard {
    conflict_ttl: Duration,
    synthetic_ttl: Duration,
    banners: BTreeMap<BannerKind, Banner>,
}

impl BannerBoard {
    /// Board with the given lifetimes
    pub fn new(conflict_ttl: Duration, synthetic_ttl: Duration) -> Self {
        Self {
            conflict_ttl,
            synthetic_ttl,
            banners: BTreeMap::new(),
        }
    }

    fn ttl(&self, kind: BannerKind) -> Duration {
        match kind {
            BannerKind::Conflict => self.conflict_ttl,
            BannerKind::Synthetic => self.synthetic_ttl,
        }
    }

    /// Show (or re-show) a banner
    pub fn raise(&mut self, kind: BannerKind, message: impl Into<String>, now: Instant) {
        let banner = Banner {
            kind,
            message: message.into(),
            expires_at: now + self.ttl(kind),
        };
        self.banners.insert(kind, banner);
    }

    /// Drop banners whose time is up; true when any was dropped
    pub fn expire(&mut self, now: Instant) -> bool {
        let before = self.banners.len();
        self.banners.retain(|_, banner| banner.expires_at > now);
        self.banners.len() != before
    }

    /// Earliest pending expiry
    pub fn next_deadline(&self) -> Option<Instant> {
        self.banners.values().map(|b| b.expires_at).min()
    }

    /// Whether a kind is showing
    pub fn is_showing(&self, kind: BannerKind) -> bool {
        self.banners.contains_key(&kind)
    }

    /// Visible banners in kind order
    pub fn visible(&self) -> Vec<Banner> {
        self.banners.values().cloned().collect()
    }
}
