//! Pacing between batch chunks.

use std::fmt::Debug;
use std::time::Duration;

/// Chooses how long a batch waits before starting a chunk.
///
/// `chunk_index` counts from 0. The first chunk never waits, so the
/// orchestrator only asks for indices of 1 and above.
pub trait BackoffPolicy: Send + Sync + Debug {
    /// Returns the pause before chunk `chunk_index`, given the configured
    /// retry delay.
    fn delay(&self, base: Duration, chunk_index: u32) -> Duration;
}

/// Waits the configured retry delay before every chunk after the first.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantBackoff;

impl BackoffPolicy for ConstantBackoff {
    fn delay(&self, base: Duration, chunk_index: u32) -> Duration {
        if chunk_index == 0 {
            Duration::ZERO
        } else {
            base
        }
    }
}

/// Grows the pause geometrically with each chunk, up to a cap.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    /// Factor applied per chunk.
    pub multiplier: f64,
    /// Upper bound on any single pause.
    pub max_delay: Duration,
}

impl ExponentialBackoff {
    /// Creates a policy with the given multiplier and a 30 second cap.
    pub fn new(multiplier: f64) -> Self {
        Self {
            multiplier,
            max_delay: Duration::from_secs(30),
        }
    }

    /// Sets the cap.
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(2.0)
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn delay(&self, base: Duration, chunk_index: u32) -> Duration {
        if chunk_index == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(chunk_index - 1).unwrap_or(i32::MAX);
        let secs = base.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());
        if capped.is_finite() {
            Duration::from_secs_f64(capped)
        } else {
            self.max_delay
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_waits_only_between_chunks() {
        let base = Duration::from_millis(1000);
        assert_eq!(ConstantBackoff.delay(base, 0), Duration::ZERO);
        assert_eq!(ConstantBackoff.delay(base, 1), base);
        assert_eq!(ConstantBackoff.delay(base, 7), base);
    }

    #[test]
    fn exponential_delay_calculation() {
        let policy = ExponentialBackoff::new(2.0);
        let base = Duration::from_millis(250);

        assert_eq!(policy.delay(base, 0), Duration::ZERO);
        assert_eq!(policy.delay(base, 1), Duration::from_millis(250));
        assert_eq!(policy.delay(base, 2), Duration::from_millis(500));
        assert_eq!(policy.delay(base, 4), Duration::from_secs(2));
    }

    #[test]
    fn exponential_delay_respects_max() {
        let policy = ExponentialBackoff::new(10.0).with_max_delay(Duration::from_secs(5));
        let base = Duration::from_secs(1);

        assert_eq!(policy.delay(base, 5), Duration::from_secs(5));
        assert_eq!(policy.delay(base, u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn shrinking_multiplier_is_treated_as_constant() {
        let policy = ExponentialBackoff::new(0.5);
        let base = Duration::from_millis(500);
        assert_eq!(policy.delay(base, 3), base);
    }
}
