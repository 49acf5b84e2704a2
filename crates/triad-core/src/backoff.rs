//! Reconnect backoff
//!
//! Delay schedule used when a change-stream subscription drops or cannot be
//! established. Only reconnects are paced by it; CAS conflicts are never
//! retried blindly.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff strategy for reconnect delays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between attempts
    Fixed,
    /// Linear increase: delay * (attempt + 1)
    Linear,
    /// Exponential increase: delay * 2^attempt
    Exponential,
    /// Exponential with up to 10% jitter
    ExponentialWithJitter,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::ExponentialWithJitter
    }
}

impl BackoffStrategy {
    /// Delay before the given zero-based attempt, capped at `max_delay`
    pub fn calculate_delay(
        &self,
        attempt: u32,
        initial_delay: Duration,
        max_delay: Duration,
    ) -> Duration {
        use rand::Rng;

        let delay = match self {
            BackoffStrategy::Fixed => initial_delay,
            BackoffStrategy::Linear => initial_delay.saturating_mul(attempt.saturating_add(1)),
            BackoffStrategy::Exponential => {
                initial_delay.saturating_mul(2u32.saturating_pow(attempt))
            }
            BackoffStrategy::ExponentialWithJitter => {
                let base = initial_delay.saturating_mul(2u32.saturating_pow(attempt));
                let jitter =
                    (base.as_millis() as f64 * 0.1 * rand::thread_rng().gen::<f64>()) as u64;
                base.saturating_add(Duration::from_millis(jitter))
            }
        };

        delay.min(max_delay)
    }
}

/// Stateful attempt counter over a strategy
#[derive(Debug, Clone)]
pub struct Backoff {
    strategy: BackoffStrategy,
    initial: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    /// New counter at attempt zero
    pub fn new(strategy: BackoffStrategy, initial: Duration, max: Duration) -> Self {
        Self {
            strategy,
            initial,
            max,
            attempt: 0,
        }
    }

    /// Delay for the current attempt; advances the counter
    pub fn next_delay(&mut self) -> Duration {
        let delay = self
            .strategy
            .calculate_delay(self.attempt, self.initial, self.max);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Number of delays handed out since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Back to attempt zero after a successful connect
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_doubles_and_caps() {
        let s = BackoffStrategy::Exponential;
        let base = Duration::from_millis(100);
        let max = Duration::from_millis(1000);
        assert_eq!(s.calculate_delay(0, base, max), Duration::from_millis(100));
        assert_eq!(s.calculate_delay(2, base, max), Duration::from_millis(400));
        assert_eq!(s.calculate_delay(10, base, max), max);
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let s = BackoffStrategy::ExponentialWithJitter;
        let base = Duration::from_millis(100);
        let d = s.calculate_delay(1, base, Duration::from_secs(60));
        assert!(d >= Duration::from_millis(200));
        assert!(d <= Duration::from_millis(220));
    }

    #[test]
    fn counter_resets() {
        let mut backoff = Backoff::new(
            BackoffStrategy::Linear,
            Duration::from_millis(50),
            Duration::from_secs(1),
        );
        assert_eq!(backoff.next_delay(), Duration::from_millis(50));
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.attempts(), 2);
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(50));
    }
}
