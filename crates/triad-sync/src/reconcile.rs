//! Reconciliation loop
//!
//! One spawned task per observed identity. It holds a single bus
//! subscription, classifies each frame, raises banners and re-reads the
//! triad on every dirty signal. Views go out on a `watch` channel so any
//! number of panels share the one subscription.
//!
//! The loop re-reads right after (re)subscribing: anything committed while
//! disconnected is picked up without waiting for the next notification.

use crate::banner::{BannerBoard, BannerKind};
use crate::filter::{NotificationFilter, Verdict};
use crate::refetch::TriadRefetcher;
use crate::view::TriadView;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use triad_core::effects::{BusFrame, EventBusEffects, EventSubscription};
use triad_core::{Backoff, IdentityId, ReconciliationConfig};

/// Conflict indicator text
pub const CONFLICT_MESSAGE: &str = "a seat write was rejected; showing the latest committed state";

/// Stale note while the stream is down
pub const DISCONNECTED_NOTE: &str = "disconnected; reconnecting";

// Sleep target when no banner is pending; the branch is disabled anyway.
const IDLE_WAIT: Duration = Duration::from_secs(3600);

/// Collaborators shared by every loop of a session
#[derive(Clone)]
pub struct ReconcileDeps {
    /// Notification bus
    pub bus: Arc<dyn EventBusEffects>,
    /// Triad re-reads
    pub refetcher: TriadRefetcher,
    /// Timeouts and reconnect pacing
    pub config: ReconciliationConfig,
}

impl std::fmt::Debug for ReconcileDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileDeps")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Handle to a running loop
///
/// Dropping the handle stops the loop at its next await point.
#[derive(Debug)]
pub struct LoopHandle {
    identity_id: IdentityId,
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
    views: watch::Receiver<TriadView>,
}

impl LoopHandle {
    /// Identity being observed
    pub fn identity_id(&self) -> &IdentityId {
        &self.identity_id
    }

    /// A fresh receiver of published views
    pub fn views(&self) -> watch::Receiver<TriadView> {
        self.views.clone()
    }

    /// Stop the loop and wait for it to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            if let Err(err) = join.await {
                if !err.is_cancelled() {
                    tracing::warn!(identity = %self.identity_id, error = %err, "reconciliation task failed");
                }
            }
        }
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// State of one loop task
pub struct ReconciliationLoop {
    filter: NotificationFilter,
    deps: ReconcileDeps,
    board: BannerBoard,
    backoff: Backoff,
    view: TriadView,
    views: watch::Sender<TriadView>,
}

impl std::fmt::Debug for ReconciliationLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationLoop")
            .field("identity_id", self.filter.identity_id())
            .field("freshness", &self.view.freshness)
            .finish_non_exhaustive()
    }
}

enum Wake {
    Shutdown,
    Resume,
}

impl ReconciliationLoop {
    /// Spawn a loop observing `identity_id` on the current runtime
    pub fn spawn(identity_id: IdentityId, deps: ReconcileDeps) -> LoopHandle {
        let (views_tx, views_rx) = watch::channel(TriadView::connecting(identity_id.clone()));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let config = &deps.config;
        let reconcile = ReconciliationLoop {
            filter: NotificationFilter::new(identity_id.clone()),
            board: BannerBoard::new(config.conflict_ttl(), config.synthetic_ttl()),
            backoff: Backoff::new(
                config.backoff,
                config.reconnect_initial(),
                config.reconnect_max(),
            ),
            view: TriadView::connecting(identity_id.clone()),
            views: views_tx,
            deps,
        };
        let join = tokio::spawn(reconcile.run(shutdown_rx));
        tracing::debug!(identity = %identity_id, "reconciliation loop started");
        LoopHandle {
            identity_id,
            shutdown: Some(shutdown_tx),
            join: Some(join),
            views: views_rx,
        }
    }

    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        loop {
            let identity_id = self.filter.identity_id().clone();
            match self.deps.bus.subscribe(&identity_id).await {
                Ok(subscription) => {
                    self.backoff.reset();
                    tracing::debug!(identity = %identity_id, "subscribed");
                    self.refresh().await;
                    if let Wake::Shutdown = self.pump(subscription, &mut shutdown).await {
                        break;
                    }
                    self.view.mark_stale(DISCONNECTED_NOTE);
                    self.publish();
                }
                Err(err) => {
                    tracing::warn!(identity = %identity_id, error = %err, "subscribe failed");
                    self.view.mark_stale(format!("subscribe failed: {err}"));
                    self.publish();
                }
            }
            let delay = self.backoff.next_delay();
            tracing::debug!(
                identity = %identity_id,
                attempt = self.backoff.attempts(),
                delay_ms = delay.as_millis() as u64,
                "reconnecting after delay"
            );
            if let Wake::Shutdown = self.pause(delay, &mut shutdown).await {
                break;
            }
        }
        tracing::debug!(identity = %self.filter.identity_id(), "reconciliation loop stopped");
    }

    /// Drive one subscription until it ends or shutdown fires
    async fn pump(
        &mut self,
        mut subscription: EventSubscription,
        shutdown: &mut oneshot::Receiver<()>,
    ) -> Wake {
        loop {
            let deadline = self.board.next_deadline();
            let wake_at = deadline.unwrap_or_else(|| Instant::now() + IDLE_WAIT);
            tokio::select! {
                _ = &mut *shutdown => return Wake::Shutdown,
                frame = subscription.next() => match frame {
                    Some(frame) => self.on_frame(&frame).await,
                    None => {
                        tracing::info!(identity = %self.filter.identity_id(), "change stream ended");
                        return Wake::Resume;
                    }
                },
                _ = tokio::time::sleep_until(wake_at), if deadline.is_some() => self.expire_banners(),
            }
        }
    }

    /// Wait out a reconnect delay while still clearing banners
    async fn pause(&mut self, delay: Duration, shutdown: &mut oneshot::Receiver<()>) -> Wake {
        let resume_at = Instant::now() + delay;
        loop {
            let deadline = self.board.next_deadline().filter(|d| *d < resume_at);
            let wake_at = deadline.unwrap_or(resume_at);
            tokio::select! {
                _ = &mut *shutdown => return Wake::Shutdown,
                _ = tokio::time::sleep_until(resume_at) => return Wake::Resume,
                _ = tokio::time::sleep_until(wake_at), if deadline.is_some() => self.expire_banners(),
            }
        }
    }

    async fn on_frame(&mut self, frame: &BusFrame) {
        match self.filter.classify_frame(frame) {
            Verdict::Ignore => {}
            Verdict::Rejected(reason) => {
                tracing::warn!(identity = %self.filter.identity_id(), %reason, "notification rejected");
            }
            Verdict::Dirty(signal) => {
                let now = Instant::now();
                if signal.conflict {
                    self.board.raise(BannerKind::Conflict, CONFLICT_MESSAGE, now);
                }
                if let Some(message) = signal.synthetic {
                    self.board.raise(BannerKind::Synthetic, message, now);
                }
                tracing::trace!(
                    identity = %self.filter.identity_id(),
                    tag = signal.tag.unwrap_or("lagged"),
                    conflict = signal.conflict,
                    "dirty signal"
                );
                self.refresh().await;
            }
        }
    }

    async fn refresh(&mut self) {
        let refetched = self.deps.refetcher.refetch(self.filter.identity_id()).await;
        self.view.apply(refetched);
        self.publish();
    }

    fn expire_banners(&mut self) {
        if self.board.expire(Instant::now()) {
            self.publish();
        }
    }

    fn publish(&mut self) {
        self.view.banners = self.board.visible();
        self.views.send_replace(self.view.clone());
    }
}
