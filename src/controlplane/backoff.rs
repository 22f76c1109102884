//! Exponential backoff bounded by a total retry budget.

use std::time::Duration;

use crate::config::RetryConfig;

/// Default total retry budget.
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(5 * 60);

/// Default base interval between attempts.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Default growth factor between consecutive delays.
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Default cap on a single delay.
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(60);

/// Backoff policy: a pure mapping from (attempt, elapsed) to the next delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Total time budget for retrying.
    pub max_duration: Duration,
    /// Delay after the first failure.
    pub interval: Duration,
    /// Growth factor applied per attempt.
    pub multiplier: f64,
    /// Cap on a single delay.
    pub max_interval: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_duration: DEFAULT_MAX_DURATION,
            interval: DEFAULT_INTERVAL,
            multiplier: DEFAULT_MULTIPLIER,
            max_interval: DEFAULT_MAX_INTERVAL,
        }
    }
}

impl From<&RetryConfig> for BackoffPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_duration: Duration::from_secs(config.max_duration_secs),
            interval: Duration::from_secs(config.interval_secs),
            multiplier: config.multiplier,
            max_interval: Duration::from_secs(config.max_interval_secs),
        }
    }
}

impl BackoffPolicy {
    /// Creates a policy seeded by a budget and a base interval.
    #[must_use]
    pub fn new(max_duration: Duration, interval: Duration) -> Self {
        Self {
            max_duration,
            interval,
            ..Self::default()
        }
    }

    /// Returns a copy with the budget and interval overridden where given.
    #[must_use]
    pub fn with_overrides(self, max_duration: Option<Duration>, interval: Option<Duration>) -> Self {
        Self {
            max_duration: max_duration.unwrap_or(self.max_duration),
            interval: interval.unwrap_or(self.interval),
            ..self
        }
    }

    /// Returns the delay before retry number `attempt` (0-based), given the
    /// time already spent, or `None` once the budget is used up.
    ///
    /// Delays are clipped to the remaining budget, so the sum of all delays
    /// never exceeds `max_duration`.
    #[must_use]
    pub fn delay(&self, attempt: u32, elapsed: Duration) -> Option<Duration> {
        let remaining = self.max_duration.checked_sub(elapsed)?;
        if remaining.is_zero() {
            return None;
        }

        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let cap = self.max_interval.max(self.interval);
        let secs = self.interval.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        let delay = Duration::try_from_secs_f64(secs).map_or(cap, |d| d.min(cap));

        Some(delay.min(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_grow_then_cap() {
        let policy = BackoffPolicy::default();
        let elapsed = Duration::ZERO;

        assert_eq!(policy.delay(0, elapsed), Some(Duration::from_secs(5)));
        assert_eq!(policy.delay(1, elapsed), Some(Duration::from_secs(10)));
        assert_eq!(policy.delay(2, elapsed), Some(Duration::from_secs(20)));
        assert_eq!(policy.delay(3, elapsed), Some(Duration::from_secs(40)));
        assert_eq!(policy.delay(4, elapsed), Some(Duration::from_secs(60)));
        assert_eq!(policy.delay(500, elapsed), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_delay_clipped_to_remaining_budget() {
        let policy = BackoffPolicy::default();

        assert_eq!(
            policy.delay(4, Duration::from_secs(290)),
            Some(Duration::from_secs(10))
        );
        assert_eq!(policy.delay(0, Duration::from_secs(300)), None);
        assert_eq!(policy.delay(0, Duration::from_secs(301)), None);
    }

    #[test]
    fn test_overrides() {
        let policy = BackoffPolicy::default()
            .with_overrides(Some(Duration::from_secs(10)), Some(Duration::from_secs(1)));

        assert_eq!(policy.max_duration, Duration::from_secs(10));
        assert_eq!(policy.delay(0, Duration::ZERO), Some(Duration::from_secs(1)));
        assert_eq!(policy.multiplier, DEFAULT_MULTIPLIER);
    }

    #[test]
    fn test_multiplier_below_one_is_constant() {
        let policy = BackoffPolicy {
            multiplier: 0.5,
            ..BackoffPolicy::new(Duration::from_secs(60), Duration::from_secs(2))
        };

        assert_eq!(policy.delay(3, Duration::ZERO), Some(Duration::from_secs(2)));
    }
}
