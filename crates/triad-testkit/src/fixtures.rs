//! Standard fixtures
//!
//! A three-level domain tree with policies, plus identities covering the
//! common triad shapes.

use crate::world::TestWorld;
use triad_core::{Domain, Layer, SeatState};

/// Root domain id
pub const ROOT_DOMAIN: &str = "acme";
/// Child of [`ROOT_DOMAIN`]
pub const OPS_DOMAIN: &str = "acme.ops";
/// Child of [`OPS_DOMAIN`]
pub const CI_DOMAIN: &str = "acme.ops.ci";
/// Synthetic fallback domain under the root
pub const FALLBACK_DOMAIN: &str = "acme.fallback";

/// Identity with three OCCUPIED seats
pub const FULL_IDENTITY: &str = "alice";
/// Identity with OCCUPIED terra/numen and a FROZEN lima seat
pub const FROZEN_LIMA_IDENTITY: &str = "bob";
/// Identity known to the store with no seats
pub const BARE_IDENTITY: &str = "carol";

/// Root policy: grants `ci.*` and `db.read`
pub const ROOT_POLICY: &str = "# acme root\nallow ci.*\nallow db.read\n";
/// Ops policy: restricts the root
pub const OPS_POLICY: &str = "deny ci.call.v0\ndeny ci.deploy.* when direction == upward";
/// CI policy: narrows to calls
pub const CI_POLICY: &str = "allow ci.call.*";

/// The standard world
pub fn standard_world() -> TestWorld {
    TestWorld::builder()
        .domain(Domain::root(ROOT_DOMAIN, "Acme"))
        .domain(Domain::child(OPS_DOMAIN, ROOT_DOMAIN, "Operations"))
        .domain(Domain::child(CI_DOMAIN, OPS_DOMAIN, "Continuous integration"))
        .domain(Domain::child(FALLBACK_DOMAIN, ROOT_DOMAIN, "Fallback").synthetic())
        .policy(ROOT_DOMAIN, ROOT_POLICY)
        .policy(OPS_DOMAIN, OPS_POLICY)
        .policy(CI_DOMAIN, CI_POLICY)
        .triad(FULL_IDENTITY, SeatState::Occupied)
        .seat(FROZEN_LIMA_IDENTITY, Layer::Terra, SeatState::Occupied, 1)
        .seat(FROZEN_LIMA_IDENTITY, Layer::Numen, SeatState::Occupied, 1)
        .seat(FROZEN_LIMA_IDENTITY, Layer::Lima, SeatState::Frozen, 2)
        .identity(BARE_IDENTITY)
        .build()
}
