//! Triad-layer seats
//!
//! A seat binds an identity to one of the three authority layers. Seats are
//! mutated only through CAS-protected writes; `cas_version` moves forward by
//! exactly one on every accepted mutation.

use crate::identifiers::{IdentityId, SeatId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The three authority planes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Terra plane
    Terra,
    /// Numen plane
    Numen,
    /// Lima plane
    Lima,
}

impl Layer {
    /// All layers in canonical order
    pub const ALL: [Layer; 3] = [Layer::Terra, Layer::Numen, Layer::Lima];

    /// Wire name of the layer
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Terra => "terra",
            Layer::Numen => "numen",
            Layer::Lima => "lima",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Layer {
    type Err = crate::ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "terra" => Ok(Layer::Terra),
            "numen" => Ok(Layer::Numen),
            "lima" => Ok(Layer::Lima),
            other => Err(crate::ConsoleError::invalid(format!("unknown layer '{other}'"))),
        }
    }
}

/// Lifecycle state of a seat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatState {
    /// Nobody holds the seat
    Empty,
    /// Seat assigned but not yet taken up
    Assigned,
    /// Seat actively held
    Occupied,
    /// Seat suspended; reversible, never deleted
    Frozen,
}

impl SeatState {
    /// Wire name of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatState::Empty => "EMPTY",
            SeatState::Assigned => "ASSIGNED",
            SeatState::Occupied => "OCCUPIED",
            SeatState::Frozen => "FROZEN",
        }
    }

    /// Whether `self -> next` is a legal seat transition
    ///
    /// Same-state writes are not transitions. A frozen seat must be thawed
    /// before it can be vacated.
    pub fn can_transition_to(&self, next: SeatState) -> bool {
        use SeatState::*;
        matches!(
            (self, next),
            (Empty, Assigned)
                | (Assigned, Empty)
                | (Assigned, Occupied)
                | (Assigned, Frozen)
                | (Occupied, Empty)
                | (Occupied, Frozen)
                | (Frozen, Assigned)
                | (Frozen, Occupied)
        )
    }
}

impl fmt::Display for SeatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SeatState {
    type Err = crate::ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EMPTY" => Ok(SeatState::Empty),
            "ASSIGNED" => Ok(SeatState::Assigned),
            "OCCUPIED" => Ok(SeatState::Occupied),
            "FROZEN" => Ok(SeatState::Frozen),
            other => Err(crate::ConsoleError::invalid(format!(
                "unknown seat state '{other}'"
            ))),
        }
    }
}

/// Authoritative seat record as held by the seat store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    /// Seat id
    pub id: SeatId,
    /// Owning identity
    pub identity_id: IdentityId,
    /// Authority layer
    pub layer: Layer,
    /// Current lifecycle state
    pub state: SeatState,
    /// When the seat was first assigned (ms since epoch)
    pub assigned_at: Option<u64>,
    /// Last accepted mutation (ms since epoch)
    pub updated_at: u64,
    /// Optimistic concurrency counter
    pub cas_version: u64,
}

impl Seat {
    /// A freshly materialised, never-mutated seat
    pub fn vacant(identity_id: IdentityId, layer: Layer, now_ms: u64) -> Self {
        Self {
            id: SeatId::new_random(),
            identity_id,
            layer,
            state: SeatState::Empty,
            assigned_at: None,
            updated_at: now_ms,
            cas_version: 0,
        }
    }
}

/// One layer slot of a triad snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriadSeat {
    /// Layer of this slot
    pub layer: Layer,
    /// Seat id, absent when no seat record exists yet
    pub seat_id: Option<SeatId>,
    /// Seat state (EMPTY when no record exists)
    pub state: SeatState,
    /// CAS version (0 when no record exists)
    pub cas_version: u64,
    /// Last update time, absent when no record exists
    pub updated_at: Option<u64>,
}

impl From<&Seat> for TriadSeat {
    fn from(seat: &Seat) -> Self {
        Self {
            layer: seat.layer,
            seat_id: Some(seat.id),
            state: seat.state,
            cas_version: seat.cas_version,
            updated_at: Some(seat.updated_at),
        }
    }
}

/// The three seats of one identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triad {
    /// Identity the snapshot belongs to
    pub identity_id: IdentityId,
    /// One slot per layer, keyed by layer
    pub seats: BTreeMap<Layer, TriadSeat>,
}

impl Triad {
    /// Build a snapshot from stored seats; layers without a record are EMPTY
    pub fn from_seats(identity_id: IdentityId, seats: &[Seat]) -> Self {
        let mut slots: BTreeMap<Layer, TriadSeat> = Layer::ALL
            .iter()
            .map(|layer| {
                (
                    *layer,
                    TriadSeat {
                        layer: *layer,
                        seat_id: None,
                        state: SeatState::Empty,
                        cas_version: 0,
                        updated_at: None,
                    },
                )
            })
            .collect();
        for seat in seats.iter().filter(|s| s.identity_id == identity_id) {
            slots.insert(seat.layer, TriadSeat::from(seat));
        }
        Self {
            identity_id,
            seats: slots,
        }
    }

    /// State of one layer
    pub fn state(&self, layer: Layer) -> SeatState {
        self.seats
            .get(&layer)
            .map(|slot| slot.state)
            .unwrap_or(SeatState::Empty)
    }

    /// Slot of one layer
    pub fn slot(&self, layer: Layer) -> Option<&TriadSeat> {
        self.seats.get(&layer)
    }

    /// A triad is complete when no layer is EMPTY
    pub fn is_complete(&self) -> bool {
        Layer::ALL
            .iter()
            .all(|layer| self.state(*layer) != SeatState::Empty)
    }

    /// Layers currently FROZEN, in canonical order
    pub fn frozen_layers(&self) -> Vec<Layer> {
        Layer::ALL
            .iter()
            .copied()
            .filter(|layer| self.state(*layer) == SeatState::Frozen)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seat(identity: &str, layer: Layer, state: SeatState) -> Seat {
        let mut seat = Seat::vacant(IdentityId::new(identity), layer, 10);
        seat.state = state;
        seat
    }

    #[test]
    fn empty_seat_only_moves_to_assigned() {
        assert!(SeatState::Empty.can_transition_to(SeatState::Assigned));
        assert!(!SeatState::Empty.can_transition_to(SeatState::Occupied));
        assert!(!SeatState::Empty.can_transition_to(SeatState::Frozen));
        assert!(!SeatState::Empty.can_transition_to(SeatState::Empty));
    }

    #[test]
    fn frozen_is_reversible_but_cannot_be_vacated() {
        assert!(SeatState::Frozen.can_transition_to(SeatState::Occupied));
        assert!(SeatState::Frozen.can_transition_to(SeatState::Assigned));
        assert!(!SeatState::Frozen.can_transition_to(SeatState::Empty));
    }

    #[test]
    fn triad_fills_missing_layers_with_empty_slots() {
        let identity = IdentityId::new("alice");
        let triad = Triad::from_seats(
            identity.clone(),
            &[seat("alice", Layer::Terra, SeatState::Occupied)],
        );
        assert_eq!(triad.seats.len(), 3);
        assert_eq!(triad.state(Layer::Terra), SeatState::Occupied);
        assert_eq!(triad.state(Layer::Lima), SeatState::Empty);
        assert!(triad.slot(Layer::Lima).unwrap().seat_id.is_none());
        assert!(!triad.is_complete());
    }

    #[test]
    fn triad_complete_and_frozen_layers() {
        let triad = Triad::from_seats(
            IdentityId::new("alice"),
            &[
                seat("alice", Layer::Terra, SeatState::Occupied),
                seat("alice", Layer::Numen, SeatState::Occupied),
                seat("alice", Layer::Lima, SeatState::Frozen),
            ],
        );
        assert!(triad.is_complete());
        assert_eq!(triad.frozen_layers(), vec![Layer::Lima]);
    }

    #[test]
    fn triad_ignores_foreign_seats() {
        let triad = Triad::from_seats(
            IdentityId::new("alice"),
            &[seat("bob", Layer::Terra, SeatState::Frozen)],
        );
        assert_eq!(triad.state(Layer::Terra), SeatState::Empty);
    }

    #[test]
    fn wire_names() {
        assert_eq!(serde_json::to_string(&Layer::Numen).unwrap(), "\"numen\"");
        assert_eq!(
            serde_json::to_string(&SeatState::Occupied).unwrap(),
            "\"OCCUPIED\""
        );
        assert_eq!("lima".parse::<Layer>().unwrap(), Layer::Lima);
        assert!("sky".parse::<Layer>().is_err());
    }
}
