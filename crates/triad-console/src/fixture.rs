//! TOML world fixtures
//!
//! A fixture seeds the in-memory reference handlers the CLI runs against:
//!
//! ```toml
//! [[domains]]
//! id = "acme"
//! name = "Acme"
//! policy = "allow ci.*"
//!
//! [[domains]]
//! id = "acme.ops"
//! parent = "acme"
//! policy = "deny ci.call.v0"
//!
//! [[identities]]
//! id = "alice"
//! terra = "OCCUPIED"
//! numen = "OCCUPIED"
//! lima = { state = "FROZEN", cas_version = 3 }
//! ```
//!
//! A layer left out of an identity has no seat record and reads as EMPTY.

use crate::api::Handlers;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use triad_core::effects::ClockEffects;
use triad_core::{ConsoleError, ConsoleResult, Domain, IdentityId, Layer, SeatState};
use triad_effects::{
    BroadcastEventBus, MemoryDomainDirectory, MemoryDomainSeatStore, MemoryPolicyStore,
    MemoryReceiptLog, MemorySeatStore, RuleEvaluator, SystemClock,
};

/// Parsed fixture file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorldFixture {
    /// Domain tree, parents before or after children
    #[serde(default)]
    pub domains: Vec<DomainEntry>,
    /// Identities and their seats
    #[serde(default)]
    pub identities: Vec<IdentityEntry>,
}

/// One domain
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DomainEntry {
    /// Domain id
    pub id: String,
    /// Display name; defaults to the id
    #[serde(default)]
    pub name: Option<String>,
    /// Parent domain id
    #[serde(default)]
    pub parent: Option<String>,
    /// Non-authoritative fallback domain
    #[serde(default)]
    pub synthetic: bool,
    /// Local policy text
    #[serde(default)]
    pub policy: Option<String>,
}

/// One identity
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityEntry {
    /// Identity id
    pub id: String,
    /// Terra seat
    #[serde(default)]
    pub terra: Option<SeatEntry>,
    /// Numen seat
    #[serde(default)]
    pub numen: Option<SeatEntry>,
    /// Lima seat
    #[serde(default)]
    pub lima: Option<SeatEntry>,
}

impl IdentityEntry {
    fn seats(&self) -> impl Iterator<Item = (Layer, &SeatEntry)> {
        [
            (Layer::Terra, self.terra.as_ref()),
            (Layer::Numen, self.numen.as_ref()),
            (Layer::Lima, self.lima.as_ref()),
        ]
        .into_iter()
        .filter_map(|(layer, entry)| entry.map(|e| (layer, e)))
    }
}

/// A seat, either a bare state or a table with an explicit version
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SeatEntry {
    /// `terra = "OCCUPIED"`, version 1
    State(SeatState),
    /// `lima = { state = "FROZEN", cas_version = 3 }`
    Versioned {
        /// Stored state
        state: SeatState,
        /// Stored version
        cas_version: u64,
    },
}

impl SeatEntry {
    fn state(&self) -> SeatState {
        match self {
            SeatEntry::State(state) | SeatEntry::Versioned { state, .. } => *state,
        }
    }

    fn cas_version(&self) -> u64 {
        match self {
            SeatEntry::State(_) => 1,
            SeatEntry::Versioned { cas_version, .. } => *cas_version,
        }
    }
}

impl WorldFixture {
    /// Parse fixture text
    pub fn from_toml_str(text: &str) -> ConsoleResult<Self> {
        let fixture: WorldFixture = toml::from_str(text)
            .map_err(|e| ConsoleError::invalid(format!("Failed to parse fixture: {e}")))?;
        fixture.check()?;
        Ok(fixture)
    }

    /// Read and parse a fixture file
    pub fn load(path: &Path) -> ConsoleResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ConsoleError::invalid(format!("Failed to read fixture {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    fn check(&self) -> ConsoleResult<()> {
        let mut ids = BTreeSet::new();
        for domain in &self.domains {
            if !ids.insert(domain.id.as_str()) {
                return Err(ConsoleError::invalid(format!(
                    "domain '{}' declared twice",
                    domain.id
                )));
            }
        }
        for domain in &self.domains {
            if let Some(parent) = &domain.parent {
                if !ids.contains(parent.as_str()) {
                    return Err(ConsoleError::invalid(format!(
                        "domain '{}' names unknown parent '{parent}'",
                        domain.id
                    )));
                }
            }
        }
        let mut identities = BTreeSet::new();
        for identity in &self.identities {
            if !identities.insert(identity.id.as_str()) {
                return Err(ConsoleError::invalid(format!(
                    "identity '{}' declared twice",
                    identity.id
                )));
            }
        }
        Ok(())
    }

    /// Seed a fresh set of reference handlers
    pub fn materialize(&self) -> World {
        let world = World::new();
        let now = world.clock.now_ms();
        for entry in &self.domains {
            let name = entry.name.clone().unwrap_or_else(|| entry.id.clone());
            let mut domain = match &entry.parent {
                Some(parent) => Domain::child(entry.id.as_str(), parent.as_str(), name),
                None => Domain::root(entry.id.as_str(), name),
            };
            domain.synthetic = entry.synthetic;
            world.domains.insert(domain);
            if let Some(policy) = &entry.policy {
                world.policies.seed(entry.id.as_str(), policy.as_str());
            }
        }
        for identity in &self.identities {
            world.seats.register_identity(identity.id.as_str());
            for (layer, seat) in identity.seats() {
                world.seats.seed_state(
                    IdentityId::new(identity.id.as_str()),
                    layer,
                    seat.state(),
                    seat.cas_version(),
                    now,
                );
            }
        }
        tracing::debug!(
            domains = self.domains.len(),
            identities = self.identities.len(),
            "fixture world seeded"
        );
        world
    }
}

/// Reference handlers seeded from a fixture
#[derive(Debug, Clone)]
pub struct World {
    /// Wall clock
    pub clock: SystemClock,
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

impl World {
    /// Empty world on the system clock
    pub fn new() -> Self {
        Self {
            clock: SystemClock,
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

impl World {
    /// The handlers as trait objects for [`ConsoleApi`](crate::ConsoleApi)
    pub fn handlers(&self) -> Handlers {
        Handlers {
            seats: Arc::new(self.seats.clone()),
            policies: Arc::new(self.policies.clone()),
            domains: Arc::new(self.domains.clone()),
            domain_seats: Arc::new(self.domain_seats.clone()),
            receipts: Arc::new(self.receipts.clone()),
            bus: Arc::new(self.bus.clone()),
            evaluator: Arc::new(self.evaluator.clone()),
            clock: Arc::new(self.clock),
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const FIXTURE: &str = r#"
[[domains]]
id = "acme"
policy = "allow ci.*"

[[domains]]
id = "acme.ops"
parent = "acme"
synthetic = true

[[identities]]
id = "alice"
terra = "OCCUPIED"
lima = { state = "FROZEN", cas_version = 3 }

[[identities]]
id = "carol"
"#;

    #[test]
    fn seeds_domains_policies_and_seats() {
        let world = WorldFixture::from_toml_str(FIXTURE).unwrap().materialize();
        let domains = world.domains.all();
        assert_eq!(domains.len(), 2);
        assert!(domains.iter().any(|d| d.id.as_str() == "acme.ops" && d.synthetic));

        let alice = IdentityId::new("alice");
        let lima = world.seats.seat_for(&alice, Layer::Lima).unwrap();
        assert_eq!(lima.state, SeatState::Frozen);
        assert_eq!(lima.cas_version, 3);
        assert_eq!(world.seats.seat_for(&alice, Layer::Terra).unwrap().cas_version, 1);
        assert!(world.seats.seat_for(&alice, Layer::Numen).is_none());
        assert!(world
            .seats
            .seat_for(&IdentityId::new("carol"), Layer::Terra)
            .is_none());
    }

    #[test]
    fn rejects_dangling_parent_and_duplicates() {
        let dangling = "[[domains]]\nid = \"a\"\nparent = \"ghost\"\n";
        assert_matches!(
            WorldFixture::from_toml_str(dangling),
            Err(ConsoleError::Invalid { .. })
        );
        let twice = "[[identities]]\nid = \"a\"\n[[identities]]\nid = \"a\"\n";
        assert_matches!(
            WorldFixture::from_toml_str(twice),
            Err(ConsoleError::Invalid { .. })
        );
        assert_matches!(
            WorldFixture::from_toml_str("[[domains]]\nid = \"a\"\nowner = \"x\"\n"),
            Err(ConsoleError::Invalid { .. })
        );
    }
}
