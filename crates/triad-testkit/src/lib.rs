//! Triad Testing Infrastructure
//!
//! Shared setup for component tests: a [`TestWorld`] bundling every reference
//! handler, a deterministic [`ManualClock`], standard fixtures, proptest
//! strategies and assertion helpers.
//!
//! ```toml
//! [dev-dependencies]
//! triad-testkit = { path = "../triad-testkit" }
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod assertions;
pub mod clock;
pub mod fixtures;
pub mod strategies;
pub mod world;

pub use assertions::*;
pub use clock::ManualClock;
pub use fixtures::*;
pub use world::{TestWorld, TestWorldBuilder};

#[doc(hidden)]
pub use triad_core;
