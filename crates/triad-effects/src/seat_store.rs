//! In-memory seat store
//!
//! All state sits behind one mutex so `compare_and_swap` is a single critical
//! section: read version, compare, write, bump.

use crate::fault::FaultSwitch;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use triad_core::effects::{CasWrite, SeatStoreEffects, StoreCasResult};
use triad_core::{ConsoleError, ConsoleResult, IdentityId, Layer, Seat, SeatId, SeatState};

#[derive(Debug, Default)]
struct SeatTable {
    identities: BTreeSet<IdentityId>,
    seats: HashMap<SeatId, Seat>,
    by_slot: HashMap<(IdentityId, Layer), SeatId>,
}

impl SeatTable {
    fn insert(&mut self, seat: Seat) {
        self.identities.insert(seat.identity_id.clone());
        self.by_slot
            .insert((seat.identity_id.clone(), seat.layer), seat.id);
        self.seats.insert(seat.id, seat);
    }
}

/// Seat store backed by process memory
#[derive(Debug, Clone, Default)]
pub struct MemorySeatStore {
    table: Arc<Mutex<SeatTable>>,
    fault: FaultSwitch,
}

impl MemorySeatStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Share a reachability switch with other handlers
    pub fn with_fault(mut self, fault: FaultSwitch) -> Self {
        self.fault = fault;
        self
    }

    /// The store's reachability switch
    pub fn fault(&self) -> &FaultSwitch {
        &self.fault
    }

    /// Register an identity with no seats
    pub fn register_identity(&self, identity_id: impl Into<IdentityId>) {
        self.table.lock().identities.insert(identity_id.into());
    }

    /// Seed a seat record as-is, replacing any record in the same slot
    pub fn seed(&self, seat: Seat) {
        let mut table = self.table.lock();
        if let Some(old) = table.by_slot.get(&(seat.identity_id.clone(), seat.layer)).copied() {
            table.seats.remove(&old);
        }
        table.insert(seat);
    }

    /// Seed a seat in `state` at `cas_version`, returning its id
    pub fn seed_state(
        &self,
        identity_id: impl Into<IdentityId>,
        layer: Layer,
        state: SeatState,
        cas_version: u64,
        now_ms: u64,
    ) -> SeatId {
        let mut seat = Seat::vacant(identity_id.into(), layer, now_ms);
        seat.state = state;
        seat.cas_version = cas_version;
        if state != SeatState::Empty {
            seat.assigned_at = Some(now_ms);
        }
        let id = seat.id;
        self.seed(seat);
        id
    }

    /// Snapshot of one record without going through the effect trait
    pub fn peek(&self, seat_id: SeatId) -> Option<Seat> {
        self.table.lock().seats.get(&seat_id).cloned()
    }

    /// Snapshot of the record in one slot
    pub fn seat_for(&self, identity_id: &IdentityId, layer: Layer) -> Option<Seat> {
        let table = self.table.lock();
        let id = table.by_slot.get(&(identity_id.clone(), layer))?;
        table.seats.get(id).cloned()
    }

    /// Overwrite a stored state behind the console's back, bumping the version
    ///
    /// Models a concurrent writer elsewhere in the system.
    pub fn external_write(&self, seat_id: SeatId, state: SeatState, now_ms: u64) -> Option<Seat> {
        let mut table = self.table.lock();
        let seat = table.seats.get_mut(&seat_id)?;
        seat.state = state;
        seat.cas_version += 1;
        seat.updated_at = now_ms;
        Some(seat.clone())
    }
}

#[async_trait]
impl SeatStoreEffects for MemorySeatStore {
    async fn identity_exists(&self, identity_id: &IdentityId) -> ConsoleResult<bool> {
        self.fault.check("seat store")?;
        Ok(self.table.lock().identities.contains(identity_id))
    }

    async fn load_identity_seats(&self, identity_id: &IdentityId) -> ConsoleResult<Vec<Seat>> {
        self.fault.check("seat store")?;
        let table = self.table.lock();
        if !table.identities.contains(identity_id) {
            return Err(ConsoleError::not_found(format!(
                "identity {identity_id} not found"
            )));
        }
        let mut seats: Vec<Seat> = Layer::ALL
            .iter()
            .filter_map(|layer| table.by_slot.get(&(identity_id.clone(), *layer)))
            .filter_map(|id| table.seats.get(id).cloned())
            .collect();
        seats.sort_by_key(|s| s.layer);
        Ok(seats)
    }

    async fn load_seat(&self, seat_id: SeatId) -> ConsoleResult<Seat> {
        self.fault.check("seat store")?;
        self.table
            .lock()
            .seats
            .get(&seat_id)
            .cloned()
            .ok_or_else(|| ConsoleError::not_found(format!("seat {seat_id} not found")))
    }

    async fn ensure_seat(
        &self,
        identity_id: &IdentityId,
        layer: Layer,
        now_ms: u64,
    ) -> ConsoleResult<Seat> {
        self.fault.check("seat store")?;
        let mut table = self.table.lock();
        if !table.identities.contains(identity_id) {
            return Err(ConsoleError::not_found(format!(
                "identity {identity_id} not found"
            )));
        }
        if let Some(seat) = table
            .by_slot
            .get(&(identity_id.clone(), layer))
            .and_then(|id| table.seats.get(id))
        {
            return Ok(seat.clone());
        }
        let seat = Seat::vacant(identity_id.clone(), layer, now_ms);
        table.insert(seat.clone());
        Ok(seat)
    }

    async fn compare_and_swap(&self, write: CasWrite) -> ConsoleResult<StoreCasResult> {
        self.fault.check("seat store")?;
        let mut table = self.table.lock();
        let seat = table
            .seats
            .get_mut(&write.seat_id)
            .ok_or_else(|| ConsoleError::not_found(format!("seat {} not found", write.seat_id)))?;
        if seat.cas_version != write.expected_cas {
            return Ok(StoreCasResult::Rejected {
                current: seat.clone(),
            });
        }
        let before = seat.clone();
        seat.state = write.new_state;
        seat.cas_version += 1;
        seat.updated_at = write.now_ms;
        if seat.assigned_at.is_none() && write.new_state != SeatState::Empty {
            seat.assigned_at = Some(write.now_ms);
        }
        Ok(StoreCasResult::Applied {
            before,
            after: seat.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn write(seat_id: SeatId, expected_cas: u64, new_state: SeatState) -> CasWrite {
        CasWrite {
            seat_id,
            expected_cas,
            new_state,
            now_ms: 99,
        }
    }

    #[tokio::test]
    async fn cas_applies_on_matching_version() {
        let store = MemorySeatStore::new();
        let id = store.seed_state("alice", Layer::Lima, SeatState::Assigned, 3, 1);
        let result = store
            .compare_and_swap(write(id, 3, SeatState::Occupied))
            .await
            .unwrap();
        assert_matches!(result, StoreCasResult::Applied { ref after, .. } if after.cas_version == 4);
        assert_eq!(store.peek(id).unwrap().state, SeatState::Occupied);
    }

    #[tokio::test]
    async fn cas_rejects_stale_version_without_change() {
        let store = MemorySeatStore::new();
        let id = store.seed_state("alice", Layer::Lima, SeatState::Assigned, 5, 1);
        let result = store
            .compare_and_swap(write(id, 4, SeatState::Occupied))
            .await
            .unwrap();
        assert_matches!(result, StoreCasResult::Rejected { ref current } if current.cas_version == 5);
        assert_eq!(store.peek(id).unwrap().state, SeatState::Assigned);
    }

    #[tokio::test]
    async fn concurrent_writers_have_one_winner() {
        let store = MemorySeatStore::new();
        let id = store.seed_state("alice", Layer::Terra, SeatState::Assigned, 0, 1);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.compare_and_swap(write(id, 0, SeatState::Occupied)).await
            }));
        }
        let mut applied = 0;
        for handle in handles {
            if let Ok(Ok(StoreCasResult::Applied { .. })) = handle.await {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
        assert_eq!(store.peek(id).unwrap().cas_version, 1);
    }

    #[tokio::test]
    async fn ensure_seat_materialises_once() {
        let store = MemorySeatStore::new();
        store.register_identity("bob");
        let bob = IdentityId::new("bob");
        let first = store.ensure_seat(&bob, Layer::Numen, 5).await.unwrap();
        let second = store.ensure_seat(&bob, Layer::Numen, 6).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.cas_version, 0);
        assert_eq!(first.state, SeatState::Empty);
    }

    #[tokio::test]
    async fn unknown_identity_and_fault() {
        let store = MemorySeatStore::new();
        let ghost = IdentityId::new("ghost");
        assert_matches!(
            store.load_identity_seats(&ghost).await,
            Err(ConsoleError::NotFound { .. })
        );
        store.fault().take_down();
        assert_matches!(
            store.identity_exists(&ghost).await,
            Err(ConsoleError::Transient { .. })
        );
    }
}
