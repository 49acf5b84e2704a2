//! Broadcast change-notification bus
//!
//! Every subscriber receives every notification; identity scoping is left to
//! the receiver. A slow subscriber sees a `Lagged` frame instead of blocking
//! publishers.

use crate::fault::FaultSwitch;
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use triad_core::effects::{BusFrame, EventBusEffects, EventSubscription};
use triad_core::{ConsoleEvent, ConsoleResult, IdentityId};

/// Default number of buffered notifications per subscriber
pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// In-process notification bus on a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastEventBus {
    sender: Arc<RwLock<broadcast::Sender<serde_json::Value>>>,
    published: Arc<RwLock<Vec<ConsoleEvent>>>,
    capacity: usize,
    fault: FaultSwitch,
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastEventBus {
    /// Bus with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUS_CAPACITY)
    }

    /// Bus buffering `capacity` notifications per subscriber
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(RwLock::new(sender)),
            published: Arc::new(RwLock::new(Vec::new())),
            capacity,
            fault: FaultSwitch::new(),
        }
    }

    /// Share a reachability switch with other handlers
    pub fn with_fault(mut self, fault: FaultSwitch) -> Self {
        self.fault = fault;
        self
    }

    /// The bus's reachability switch
    pub fn fault(&self) -> &FaultSwitch {
        &self.fault
    }

    /// Push a raw payload to subscribers, bypassing encoding
    ///
    /// Lets callers deliver payloads the console would never produce, such as
    /// unknown tags.
    pub fn inject_raw(&self, payload: serde_json::Value) {
        let _ = self.sender.read().send(payload);
    }

    /// End every open subscription, as a dropped connection would
    ///
    /// New subscriptions work normally afterwards.
    pub fn sever_subscriptions(&self) {
        let (fresh, _) = broadcast::channel(self.capacity);
        *self.sender.write() = fresh;
        tracing::debug!("event bus subscriptions severed");
    }

    /// Currently open subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.sender.read().receiver_count()
    }

    /// Every notification published through [`EventBusEffects::publish`]
    pub fn published(&self) -> Vec<ConsoleEvent> {
        self.published.read().clone()
    }
}

#[async_trait]
impl EventBusEffects for BroadcastEventBus {
    async fn publish(&self, event: &ConsoleEvent) -> ConsoleResult<()> {
        self.fault.check("event bus")?;
        let payload = event.encode()?;
        self.published.write().push(event.clone());
        // No subscribers is not an error.
        let delivered = self.sender.read().send(payload).unwrap_or(0);
        tracing::trace!(tag = event.tag(), delivered, "notification published");
        Ok(())
    }

    async fn subscribe(&self, identity_id: &IdentityId) -> ConsoleResult<EventSubscription> {
        self.fault.check("event bus")?;
        let receiver = self.sender.read().subscribe();
        tracing::debug!(identity = %identity_id, "event bus subscription opened");
        let frames = BroadcastStream::new(receiver).map(|item| match item {
            Ok(payload) => BusFrame::Notification(payload),
            Err(BroadcastStreamRecvError::Lagged(missed)) => BusFrame::Lagged(missed),
        });
        Ok(EventSubscription::new(frames.boxed()))
    }
}
