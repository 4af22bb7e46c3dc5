//! Retry policies.
//!
//! - [`BackoffPolicy`] how long to wait before each overlay health re-check.
//! - [`RetryBudget`] a bounded counter of re-checks, created per health-check cycle.
//!
//! ## Quick wiring
//! ```text
//! Supervisor::health_check()
//!      └─► RetryBudget::new(max_overlay_retries, backoff)
//!           └─► budget.next_delay() → Some(step × attempt) ... None when exhausted
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → step=5s, max=5min (linear: 5s, 10s, 15s, ...).

mod backoff;
mod budget;

pub use backoff::BackoffPolicy;
pub use budget::RetryBudget;
