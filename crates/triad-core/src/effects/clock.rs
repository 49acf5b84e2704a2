//! Wall-clock time

/// Physical time source (ms since the Unix epoch)
///
/// Only used for timestamps on records and notifications. Banner expiry uses
/// the async runtime's monotonic clock instead.
pub trait ClockEffects: Send + Sync {
    /// Current time in milliseconds since the Unix epoch
    fn now_ms(&self) -> u64;
}
