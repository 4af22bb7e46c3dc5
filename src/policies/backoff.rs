//! # Linear backoff for health-check retries.
//!
//! [`BackoffPolicy`] controls how long the supervisor waits before re-checking
//! an empty overlay. The delay for attempt `n` (1-based) is `step × n`,
//! clamped to `max`: a slow remote warm-up is tolerated without hammering
//! the probe.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use mountvisor::BackoffPolicy;
//!
//! let backoff = BackoffPolicy {
//!     step: Duration::from_secs(5),
//!     max: Duration::from_secs(60),
//! };
//!
//! assert_eq!(backoff.next(1), Duration::from_secs(5));
//! assert_eq!(backoff.next(3), Duration::from_secs(15));
//! // 5s × 100 = 500s → capped at max=60s
//! assert_eq!(backoff.next(100), Duration::from_secs(60));
//! ```

use std::time::Duration;

/// Linear retry backoff policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay added per attempt.
    pub step: Duration,
    /// Maximum delay cap.
    pub max: Duration,
}

impl Default for BackoffPolicy {
    /// Returns a policy with `step = 5s` and `max = 5min`.
    fn default() -> Self {
        Self {
            step: Duration::from_secs(5),
            max: Duration::from_secs(300),
        }
    }
}

impl BackoffPolicy {
    /// Creates a policy with the given step and the default cap.
    pub fn linear(step: Duration) -> Self {
        Self {
            step,
            ..Self::default()
        }
    }

    /// Computes the delay before attempt `attempt` (1-based).
    ///
    /// Attempt `0` yields `Duration::ZERO`. Overflow clamps to [`BackoffPolicy::max`].
    pub fn next(&self, attempt: u32) -> Duration {
        self.step
            .checked_mul(attempt)
            .map_or(self.max, |d| d.min(self.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_growth() {
        let policy = BackoffPolicy::linear(Duration::from_secs(5));
        assert_eq!(policy.next(1), Duration::from_secs(5));
        assert_eq!(policy.next(2), Duration::from_secs(10));
        assert_eq!(policy.next(3), Duration::from_secs(15));
        assert_eq!(policy.next(4), Duration::from_secs(20));
    }

    #[test]
    fn test_attempt_zero_is_immediate() {
        assert_eq!(BackoffPolicy::default().next(0), Duration::ZERO);
    }

    #[test]
    fn test_clamped_to_max() {
        let policy = BackoffPolicy {
            step: Duration::from_secs(5),
            max: Duration::from_secs(12),
        };
        assert_eq!(policy.next(2), Duration::from_secs(10));
        assert_eq!(policy.next(3), Duration::from_secs(12));
    }

    #[test]
    fn test_overflow_clamps_to_max() {
        let policy = BackoffPolicy {
            step: Duration::from_secs(u64::MAX / 2),
            max: Duration::from_secs(10),
        };
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(10));
    }
}
