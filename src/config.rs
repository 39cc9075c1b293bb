//! Transport configuration

use std::time::Duration;

/// Backoff schedule for retried requests.
///
/// The three delay knobs are independent: the wait before retry `n` is
/// `floor + step * 2^n`, capped at `cap`. The defaults reproduce a schedule
/// that starts at six seconds and grows by doubling increments of one
/// second, never exceeding a minute.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Clamped to at least 1.
    pub max_attempts: u32,
    /// Smallest delay between attempts
    pub floor: Duration,
    /// Growth increment, doubled per retry
    pub step: Duration,
    /// Largest delay between attempts
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            floor: Duration::from_secs(5),
            step: Duration::from_secs(1),
            cap: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Total attempts, never less than one
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait before retry number `retry` (zero-based)
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        let delay = self
            .floor
            .saturating_add(self.step.saturating_mul(factor));
        delay.min(self.cap)
    }
}

/// Configuration for the resilient transport
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Per-attempt request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Retry behavior
    pub retry: RetryPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            user_agent: format!("multipin/{}", env!("CARGO_PKG_VERSION")),
            retry: RetryPolicy::default(),
        }
    }
}

impl TransportConfig {
    /// Set the per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule_strictly_increases() {
        let policy = RetryPolicy::default();
        let delays: Vec<_> = (0..4).map(|n| policy.delay(n)).collect();
        assert_eq!(delays[0], Duration::from_secs(6));
        assert_eq!(delays[1], Duration::from_secs(7));
        assert_eq!(delays[2], Duration::from_secs(9));
        assert_eq!(delays[3], Duration::from_secs(13));
        for pair in delays.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn test_schedule_caps_at_ceiling() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(10), Duration::from_secs(60));
        assert_eq!(policy.delay(200), Duration::from_secs(60));
    }

    #[test]
    fn test_zero_attempts_clamps_to_one() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..Default::default()
        };
        assert_eq!(policy.attempts(), 1);
    }
}
