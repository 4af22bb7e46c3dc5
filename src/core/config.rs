//! # Control loop tuning.
//!
//! [`SupervisorConfig`] holds the knobs of the supervisor state machine only;
//! mount and move tuning lives with the components that use it.

use std::time::Duration;

use crate::events::DEFAULT_CAPACITY;
use crate::policies::BackoffPolicy;

/// Supervisor configuration.
///
/// ## Field semantics
/// - `poll_interval`: how often task liveness is checked while Watching
/// - `health_interval`: time between two overlay content checks
/// - `max_overlay_retries`: re-checks of an empty overlay before a full restart
/// - `backoff`: delay before each re-check (`step × attempt`)
/// - `health_timeout`: limit on one overlay listing; a timeout counts as empty
/// - `bus_capacity`: event bus ring buffer size
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Liveness poll interval.
    pub poll_interval: Duration,
    /// Interval between health checks.
    pub health_interval: Duration,
    /// Retries spent on an empty overlay before restarting everything.
    pub max_overlay_retries: u32,
    /// Backoff between health-check retries.
    pub backoff: BackoffPolicy,
    /// Limit on a single overlay content check.
    pub health_timeout: Duration,
    /// Capacity of the event bus.
    pub bus_capacity: usize,
}

impl Default for SupervisorConfig {
    /// Provides a default configuration:
    /// - `poll_interval = 1s`
    /// - `health_interval = 30s`
    /// - `max_overlay_retries = 5`
    /// - `backoff = 5s linear`
    /// - `health_timeout = 10s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            health_interval: Duration::from_secs(30),
            max_overlay_retries: 5,
            backoff: BackoffPolicy::linear(Duration::from_secs(5)),
            health_timeout: Duration::from_secs(10),
            bus_capacity: DEFAULT_CAPACITY,
        }
    }
}
