//! # Retry budget for one health-check cycle.
//!
//! A [`RetryBudget`] is created fresh whenever the overlay is found empty and
//! dropped once the cycle resolves (content appeared, or the budget ran out).

use std::time::Duration;

use super::BackoffPolicy;

/// Bounded retry counter with a backoff schedule.
#[derive(Clone, Debug)]
pub struct RetryBudget {
    attempts: u32,
    max: u32,
    backoff: BackoffPolicy,
}

impl RetryBudget {
    /// Creates an untouched budget of `max` retries.
    pub fn new(max: u32, backoff: BackoffPolicy) -> Self {
        Self {
            attempts: 0,
            max,
            backoff,
        }
    }

    /// Retries spent so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Maximum number of retries.
    pub fn max(&self) -> u32 {
        self.max
    }

    /// `true` once every retry has been spent.
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max
    }

    /// Spends one retry and returns the delay to wait before it,
    /// or `None` when the budget is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.attempts += 1;
        Some(self.backoff.next(self.attempts))
    }
}
