//! Stage one: classify incoming frames
//!
//! Pure and synchronous. Decides whether a frame concerns the observed
//! identity and which transient indicators it raises; it never looks at seat
//! states in the payload, since the payload is only a dirty signal.

use triad_core::effects::BusFrame;
use triad_core::{ConsoleEvent, IdentityId};

/// Default synthetic warning text when a notification carries none
pub const DEFAULT_SYNTHETIC_MESSAGE: &str = "synthetic fallback policy in effect";

/// Why the observed identity must be re-read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirtySignal {
    /// Tag of the triggering notification; `None` for lag
    pub tag: Option<&'static str>,
    /// A CAS was rejected
    pub conflict: bool,
    /// Synthetic-policy warning text, when the notification was synthetic
    pub synthetic: Option<String>,
}

impl DirtySignal {
    /// Signal raised by dropped frames
    pub fn lagged() -> Self {
        Self {
            tag: None,
            conflict: false,
            synthetic: None,
        }
    }
}

/// Classification of one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Not about the observed identity
    Ignore,
    /// Re-read the identity
    Dirty(DirtySignal),
    /// Undecodable or unknown notification; dropped
    Rejected(String),
}

/// Identity-scoped frame classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationFilter {
    identity_id: IdentityId,
}

impl NotificationFilter {
    /// Filter for one observed identity
    pub fn new(identity_id: IdentityId) -> Self {
        Self { identity_id }
    }

    /// Observed identity
    pub fn identity_id(&self) -> &IdentityId {
        &self.identity_id
    }

    /// Classify a bus frame
    pub fn classify_frame(&self, frame: &BusFrame) -> Verdict {
        match frame {
            BusFrame::Notification(payload) => self.classify(payload),
            BusFrame::Lagged(_) => Verdict::Dirty(DirtySignal::lagged()),
        }
    }

    /// Classify a raw notification payload
    pub fn classify(&self, payload: &serde_json::Value) -> Verdict {
        let event = match ConsoleEvent::decode(payload) {
            Ok(event) => event,
            Err(err) => return Verdict::Rejected(err.to_string()),
        };
        if event.identity_id() != Some(&self.identity_id) {
            return Verdict::Ignore;
        }
        let synthetic = event.is_synthetic().then(|| {
            event
                .message()
                .unwrap_or(DEFAULT_SYNTHETIC_MESSAGE)
                .to_string()
        });
        Verdict::Dirty(DirtySignal {
            tag: Some(event.tag()),
            conflict: event.is_conflict(),
            synthetic,
        })
    }
}
