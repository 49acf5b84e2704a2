//! Viewer sessions
//!
//! A session observes one identity at a time. Switching identity tears the
//! previous loop down before the new subscription opens, so a session never
//! holds two subscriptions.

use crate::reconcile::{LoopHandle, ReconcileDeps, ReconciliationLoop};
use crate::refetch::TriadRefetcher;
use crate::view::TriadView;
use std::sync::Arc;
use tokio::sync::watch;
use triad_core::effects::{EventBusEffects, SeatStoreEffects};
use triad_core::{IdentityId, ReconciliationConfig, SessionId};
use triad_seats::TriadResolver;

/// One operator's live view of a triad
#[derive(Debug)]
pub struct ViewerSession {
    session_id: SessionId,
    deps: ReconcileDeps,
    current: Option<LoopHandle>,
}

impl ViewerSession {
    /// Session over the given bus and seat store
    pub fn new(
        bus: Arc<dyn EventBusEffects>,
        seats: Arc<dyn SeatStoreEffects>,
        config: ReconciliationConfig,
    ) -> Self {
        Self {
            session_id: SessionId::new_random(),
            deps: ReconcileDeps {
                bus,
                refetcher: TriadRefetcher::new(TriadResolver::new(seats)),
                config,
            },
            current: None,
        }
    }

    /// Session id
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Identity currently observed
    pub fn observed(&self) -> Option<&IdentityId> {
        self.current.as_ref().map(LoopHandle::identity_id)
    }

    /// Observe `identity_id`, replacing any previous observation
    pub async fn observe(&mut self, identity_id: IdentityId) -> watch::Receiver<TriadView> {
        if let Some(previous) = self.current.take() {
            tracing::debug!(
                session = %self.session_id,
                from = %previous.identity_id(),
                to = %identity_id,
                "switching observed identity"
            );
            previous.shutdown().await;
        }
        let handle = ReconciliationLoop::spawn(identity_id, self.deps.clone());
        let views = handle.views();
        self.current = Some(handle);
        views
    }

    /// Another receiver for the current observation, for a second panel
    pub fn views(&self) -> Option<watch::Receiver<TriadView>> {
        self.current.as_ref().map(LoopHandle::views)
    }

    /// Stop observing and wait for the loop to finish
    pub async fn close(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.shutdown().await;
            tracing::debug!(session = %self.session_id, "session closed");
        }
    }
}
