//! In-memory world of handlers
//!
//! Handlers are cheap clones sharing state, so a test keeps concrete handles
//! for seeding and fault injection while components receive trait objects.

use crate::clock::ManualClock;
use std::sync::Arc;
use triad_core::effects::{
    ClockEffects, DomainDirectoryEffects, DomainSeatStoreEffects, EventBusEffects,
    PolicyEvaluatorEffects, PolicyStoreEffects, ReceiptLogEffects, SeatStoreEffects,
};
use triad_core::{Domain, IdentityId, Layer, SeatId, SeatState};
use triad_effects::{
    BroadcastEventBus, MemoryDomainDirectory, MemoryDomainSeatStore, MemoryPolicyStore,
    MemoryReceiptLog, MemorySeatStore, RuleEvaluator,
};

/// Start time of every world's clock
pub const WORLD_EPOCH_MS: u64 = 1_700_000_000_000;

/// Every reference handler, wired for one test
#[derive(Debug, Clone)]
pub struct TestWorld {
    /// Wall clock
    pub clock: ManualClock,
    /// Triad seats
    pub seats: MemorySeatStore,
    /// Local policy slots
    pub policies: MemoryPolicyStore,
    /// Domain tree
    pub domains: MemoryDomainDirectory,
    /// Domain membership seats
    pub domain_seats: MemoryDomainSeatStore,
    /// Audit receipts
    pub receipts: MemoryReceiptLog,
    /// Notification bus
    pub bus: BroadcastEventBus,
    /// Rule evaluator
    pub evaluator: RuleEvaluator,
}

impl Default for TestWorld {
    fn default() -> Self {
        Self {
            clock: ManualClock::new(WORLD_EPOCH_MS),
            seats: MemorySeatStore::new(),
            policies: MemoryPolicyStore::new(),
            domains: MemoryDomainDirectory::new(),
            domain_seats: MemoryDomainSeatStore::new(),
            receipts: MemoryReceiptLog::new(),
            bus: BroadcastEventBus::new(),
            evaluator: RuleEvaluator::new(),
        }
    }
}

impl TestWorld {
    /// Empty world
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a world
    pub fn builder() -> TestWorldBuilder {
        TestWorldBuilder::default()
    }

    /// Seat store as a trait object
    pub fn seat_store(&self) -> Arc<dyn SeatStoreEffects> {
        Arc::new(self.seats.clone())
    }

    /// Policy store as a trait object
    pub fn policy_store(&self) -> Arc<dyn PolicyStoreEffects> {
        Arc::new(self.policies.clone())
    }

    /// Domain directory as a trait object
    pub fn directory(&self) -> Arc<dyn DomainDirectoryEffects> {
        Arc::new(self.domains.clone())
    }

    /// Domain seat store as a trait object
    pub fn domain_seat_store(&self) -> Arc<dyn DomainSeatStoreEffects> {
        Arc::new(self.domain_seats.clone())
    }

    /// Receipt log as a trait object
    pub fn receipt_log(&self) -> Arc<dyn ReceiptLogEffects> {
        Arc::new(self.receipts.clone())
    }

    /// Notification bus as a trait object
    pub fn event_bus(&self) -> Arc<dyn EventBusEffects> {
        Arc::new(self.bus.clone())
    }

    /// Evaluator as a trait object
    pub fn policy_evaluator(&self) -> Arc<dyn PolicyEvaluatorEffects> {
        Arc::new(self.evaluator.clone())
    }

    /// Clock as a trait object
    pub fn clock_effects(&self) -> Arc<dyn ClockEffects> {
        Arc::new(self.clock.clone())
    }

    /// Id of the stored seat for `(identity, layer)`
    pub fn seat_id(&self, identity: &str, layer: Layer) -> Option<SeatId> {
        let identity = IdentityId::new(identity);
        self.seats.seat_for(&identity, layer).map(|seat| seat.id)
    }
}

/// Fluent setup of a [`TestWorld`]
#[derive(Debug, Default)]
pub struct TestWorldBuilder {
    domains: Vec<Domain>,
    policies: Vec<(String, String)>,
    identities: Vec<String>,
    seats: Vec<(String, Layer, SeatState, u64)>,
}

impl TestWorldBuilder {
    /// Add a domain
    pub fn domain(mut self, domain: Domain) -> Self {
        self.domains.push(domain);
        self
    }

    /// Seed a domain's local policy
    pub fn policy(mut self, domain_id: &str, text: &str) -> Self {
        self.policies.push((domain_id.to_string(), text.to_string()));
        self
    }

    /// Register an identity with no seats
    pub fn identity(mut self, identity: &str) -> Self {
        self.identities.push(identity.to_string());
        self
    }

    /// Seed a seat
    pub fn seat(mut self, identity: &str, layer: Layer, state: SeatState, cas_version: u64) -> Self {
        self.seats
            .push((identity.to_string(), layer, state, cas_version));
        self
    }

    /// Seed all three layers of an identity in the same state
    pub fn triad(mut self, identity: &str, state: SeatState) -> Self {
        for layer in Layer::ALL {
            self.seats.push((identity.to_string(), layer, state, 1));
        }
        self
    }

    /// Materialise the world
    pub fn build(self) -> TestWorld {
        let world = TestWorld::new();
        for domain in self.domains {
            world.domains.insert(domain);
        }
        for (domain_id, text) in self.policies {
            world.policies.seed(domain_id, text);
        }
        for identity in self.identities {
            world.seats.register_identity(identity);
        }
        let now = world.clock.now_ms();
        for (identity, layer, state, cas) in self.seats {
            world.seats.seed_state(identity, layer, state, cas, now);
        }
        world
    }
}
