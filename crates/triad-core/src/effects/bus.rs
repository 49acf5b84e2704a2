//! Change notification bus

use crate::errors::ConsoleResult;
use crate::events::ConsoleEvent;
use crate::identifiers::IdentityId;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};

/// One item delivered by a subscription
#[derive(Debug, Clone, PartialEq)]
pub enum BusFrame {
    /// Raw wire payload; decoded and vetted by the receiver
    Notification(serde_json::Value),
    /// The subscriber fell behind and this many notifications were dropped
    Lagged(u64),
}

/// Live subscription; the stream ending means the connection dropped
pub struct EventSubscription {
    frames: BoxStream<'static, BusFrame>,
}

impl EventSubscription {
    /// Wrap a frame stream
    pub fn new(frames: BoxStream<'static, BusFrame>) -> Self {
        Self { frames }
    }

    /// Next frame; `None` once disconnected
    pub async fn next(&mut self) -> Option<BusFrame> {
        self.frames.next().await
    }
}

impl std::fmt::Debug for EventSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSubscription").finish_non_exhaustive()
    }
}

/// Publish/subscribe transport for change notifications
#[async_trait]
pub trait EventBusEffects: Send + Sync {
    /// Publish one notification to every subscriber
    async fn publish(&self, event: &ConsoleEvent) -> ConsoleResult<()>;

    /// Open a subscription scoped to one identity
    ///
    /// Scoping is a transport hint; receivers still filter by identity.
    async fn subscribe(&self, identity_id: &IdentityId) -> ConsoleResult<EventSubscription>;
}
