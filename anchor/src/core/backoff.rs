//! Exponential backoff schedule for rate-limited model calls.

use std::time::Duration;

/// Attempts made before a persistent rate limit is surfaced.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Wait after the first rate-limited attempt.
    pub base: Duration,
    pub max_attempts: u32,
}

impl BackoffPolicy {
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Wait that follows the rate-limited attempt `attempt` (0-indexed):
    /// `base * 2^attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base
            .saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
    }

    pub fn is_last(&self, attempt: u32) -> bool {
        attempt + 1 >= self.max_attempts
    }

    /// Full schedule of waits for `max_attempts` consecutive rate limits.
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.max_attempts).map(|a| self.delay(a)).collect()
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_doubles_from_ten_seconds() {
        let secs: Vec<u64> = BackoffPolicy::default()
            .schedule()
            .iter()
            .map(Duration::as_secs)
            .collect();
        assert_eq!(secs, vec![10, 20, 40, 80, 160]);
    }

    #[test]
    fn last_attempt_is_the_fifth() {
        let policy = BackoffPolicy::default();
        assert!(!policy.is_last(3));
        assert!(policy.is_last(4));
    }

    #[test]
    fn huge_attempt_saturates() {
        let policy = BackoffPolicy::new(Duration::from_secs(1));
        assert!(policy.delay(64) >= policy.delay(31));
    }
}
