//! Retry policy for cached reads.
//!
//! Whether an error is retryable comes from the classifier; this module only
//! caps the number of attempts and computes the backoff.

use crate::classifier::classify;
use crate::config::CacheConfig;
use crate::error::TodoError;
use std::time::Duration;

/// Exponential backoff with a hard cap.
///
/// `delay(attempt_index) = min(base * 2^attempt_index, max)` where the index
/// is zero-based (first retry waits `base`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries (used for mutations).
    pub fn never() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    /// Backoff before the retry with the given zero-based index.
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt_index).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Decides whether a read should go again after `err`, given the number
    /// of retries already performed.
    pub fn should_retry(&self, failures: u32, err: &TodoError) -> bool {
        failures < self.max_retries && classify(err).should_retry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    #[test]
    fn test_delay_sequence_is_capped() {
        let policy = RetryPolicy::default();
        let delays: Vec<u128> = (0..5).map(|i| policy.delay_for(i).as_millis()).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 10_000]);
    }

    #[test]
    fn test_delay_never_exceeds_cap_for_large_attempts() {
        let policy = RetryPolicy::default();
        for attempt in [10, 31, 32, 64, u32::MAX] {
            assert_eq!(policy.delay_for(attempt), Duration::from_millis(10_000));
        }
    }

    #[test]
    fn test_should_retry_respects_classifier_and_cap() {
        let policy = RetryPolicy::default();
        let server: TodoError = ApiError::new(500, "SERVER_ERROR", "down").into();
        let forbidden: TodoError = ApiError::new(403, "FORBIDDEN", "no").into();

        assert!(policy.should_retry(0, &server));
        assert!(policy.should_retry(2, &server));
        assert!(!policy.should_retry(3, &server));
        assert!(!policy.should_retry(0, &forbidden));
    }

    #[test]
    fn test_never_policy() {
        let server: TodoError = ApiError::network("offline").into();
        assert!(!RetryPolicy::never().should_retry(0, &server));
    }

    #[test]
    fn test_from_config() {
        let config = CacheConfig {
            max_retries: 1,
            retry_base_delay_ms: 10,
            retry_max_delay_ms: 15,
            ..CacheConfig::default()
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.delay_for(0), Duration::from_millis(10));
        assert_eq!(policy.delay_for(1), Duration::from_millis(15));
        assert_eq!(policy.max_retries, 1);
    }
}
