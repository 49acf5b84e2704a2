//! Proptest strategies

use proptest::prelude::*;
use triad_core::{Layer, SeatState};

/// Any layer
pub fn layer() -> impl Strategy<Value = Layer> {
    prop::sample::select(Layer::ALL.to_vec())
}

/// Any seat state
pub fn seat_state() -> impl Strategy<Value = SeatState> {
    prop::sample::select(vec![
        SeatState::Empty,
        SeatState::Assigned,
        SeatState::Occupied,
        SeatState::Frozen,
    ])
}

/// A single rule line in the console dialect
pub fn rule_line() -> impl Strategy<Value = String> {
    (
        prop::bool::ANY,
        prop::sample::select(vec!["*", "ci.*", "ci.call.*", "ci.call.v1", "db.*", "db.read"]),
        prop::option::of(prop::sample::select(vec!["upward", "downward", "lateral"])),
    )
        .prop_map(|(allow, pattern, direction)| {
            let effect = if allow { "allow" } else { "deny" };
            match direction {
                Some(d) => format!("{effect} {pattern} when direction == {d}"),
                None => format!("{effect} {pattern}"),
            }
        })
}

/// A policy text of up to `max_rules` rule lines
pub fn policy_text(max_rules: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(rule_line(), 0..=max_rules).prop_map(|lines| lines.join("\n"))
}
