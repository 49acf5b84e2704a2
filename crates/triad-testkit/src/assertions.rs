//! Assertion helpers

use triad_core::events::SeatChange;
use triad_core::{ConsoleEvent, Receipt, ReceiptKind};
use triad_effects::{BroadcastEventBus, MemoryReceiptLog};

/// `seat.change` notifications published so far
pub fn seat_changes(bus: &BroadcastEventBus) -> Vec<SeatChange> {
    bus.published()
        .into_iter()
        .filter_map(|event| match event {
            ConsoleEvent::SeatChange(change) => Some(change),
            _ => None,
        })
        .collect()
}

/// Wire tags of every published notification, in order
pub fn published_tags(bus: &BroadcastEventBus) -> Vec<&'static str> {
    bus.published().iter().map(ConsoleEvent::tag).collect()
}

/// Snake-case kind of a receipt
pub fn receipt_kind(receipt: &Receipt) -> &'static str {
    match receipt.kind {
        ReceiptKind::SeatMutation { .. } => "seat_mutation",
        ReceiptKind::PolicyCommit { .. } => "policy_commit",
        ReceiptKind::FlowDecision { .. } => "flow_decision",
        ReceiptKind::DomainSeat { .. } => "domain_seat",
    }
}

/// Assert the receipt log holds exactly these kinds, in order
pub fn assert_receipt_kinds(log: &MemoryReceiptLog, expected: &[&str]) {
    let kinds: Vec<&str> = log.snapshot().iter().map(receipt_kind).collect();
    assert_eq!(kinds, expected, "unexpected receipt sequence");
}

/// Assert a seat's stored version
#[macro_export]
macro_rules! assert_cas_version {
    ($world:expr, $identity:expr, $layer:expr, $expected:expr) => {{
        let seat = $world
            .seats
            .seat_for(&$crate::triad_core::IdentityId::new($identity), $layer)
            .expect("seat exists");
        assert_eq!(
            seat.cas_version, $expected,
            "seat {}/{} at version {}, expected {}",
            $identity, $layer, seat.cas_version, $expected
        );
    }};
}
