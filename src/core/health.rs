//! # Overlay health check.
//!
//! An overlay that lists no entries after a supposedly successful mount chain
//! usually means a wedged remote client. The check tolerates a slow warm-up
//! with a bounded, linearly backed-off retry loop before declaring the stack
//! unhealthy.
//!
//! This is a policy, not a proven detector: a healthy but genuinely empty
//! remote will also end up restarted.
//!
//! Listing a wedged FUSE mount may never return, so every content check is
//! bounded by a timeout (counted as empty) and raced against shutdown.
//!
//! ```text
//! has_content? ── yes ──► Healthy
//!      │ no
//!      ▼
//! RetryBudget::next_delay() ── None ──► Exhausted(OverlayEmpty)
//!      │ Some(step × n)
//!      ▼
//! sleep (shutdown aborts) → reconfirm tasks → has_content? ── yes ──► Healthy (recovered)
//!      └───────────────────────── no ───────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::{BackoffPolicy, RetryBudget};
use crate::probe::MountProbe;

/// Result of one health-check cycle.
#[derive(Debug)]
pub enum HealthOutcome {
    /// Overlay shows content.
    Healthy,
    /// Budget spent with the overlay still empty.
    Exhausted(RuntimeError),
    /// Shutdown arrived while waiting for a check or a re-check.
    Interrupted,
}

/// Overlay content check with a bounded retry budget.
pub struct HealthCheck {
    probe: Arc<dyn MountProbe>,
    overlay: PathBuf,
    max_retries: u32,
    backoff: BackoffPolicy,
    check_timeout: Duration,
    bus: Bus,
}

impl HealthCheck {
    /// Creates a check for the overlay mounted at `overlay`.
    ///
    /// A single content check taking longer than `check_timeout` counts as empty.
    pub fn new(
        probe: Arc<dyn MountProbe>,
        overlay: PathBuf,
        max_retries: u32,
        backoff: BackoffPolicy,
        check_timeout: Duration,
        bus: Bus,
    ) -> Self {
        Self {
            probe,
            overlay,
            max_retries,
            backoff,
            check_timeout,
            bus,
        }
    }

    /// Runs one cycle. `reconfirm` is called before every re-check.
    pub async fn run(
        &self,
        stop: &CancellationToken,
        mut reconfirm: impl FnMut(),
    ) -> HealthOutcome {
        let Some(found) = self.has_content(stop).await else {
            return HealthOutcome::Interrupted;
        };
        if found {
            self.bus
                .publish(Event::new(EventKind::HealthCheckPassed).with_mount_point(&self.overlay));
            return HealthOutcome::Healthy;
        }
        self.publish_empty(0);

        let mut budget = RetryBudget::new(self.max_retries, self.backoff);
        while let Some(delay) = budget.next_delay() {
            let attempt = budget.attempts();
            self.bus.publish(
                Event::new(EventKind::RetryScheduled)
                    .with_attempt(attempt)
                    .with_delay(delay),
            );
            tokio::select! {
                _ = stop.cancelled() => return HealthOutcome::Interrupted,
                _ = time::sleep(delay) => {}
            }

            reconfirm();
            let Some(found) = self.has_content(stop).await else {
                return HealthOutcome::Interrupted;
            };
            if found {
                self.bus.publish(
                    Event::new(EventKind::OverlayRecovered)
                        .with_mount_point(&self.overlay)
                        .with_attempt(attempt),
                );
                return HealthOutcome::Healthy;
            }
            self.publish_empty(attempt);
        }

        HealthOutcome::Exhausted(RuntimeError::OverlayEmpty {
            attempts: budget.attempts(),
        })
    }

    /// Bounded content check; `None` when shutdown arrived first.
    async fn has_content(&self, stop: &CancellationToken) -> Option<bool> {
        tokio::select! {
            _ = stop.cancelled() => None,
            res = time::timeout(self.check_timeout, self.probe.has_content(&self.overlay)) => {
                Some(res.unwrap_or_else(|_| {
                    tracing::warn!(
                        mount_point = %self.overlay.display(),
                        timeout_ms = self.check_timeout.as_millis() as u64,
                        "overlay listing timed out, counting it as empty"
                    );
                    false
                }))
            }
        }
    }

    fn publish_empty(&self, attempt: u32) {
        self.bus.publish(
            Event::new(EventKind::OverlayEmpty)
                .with_mount_point(&self.overlay)
                .with_attempt(attempt),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::TaskError;

    /// Answers `has_content` from a script, then `true` forever.
    struct Scripted(Mutex<Vec<bool>>);

    #[async_trait]
    impl MountProbe for Scripted {
        async fn is_busy(&self, _task: &str, _path: &Path) -> Result<bool, TaskError> {
            Ok(false)
        }

        async fn has_content(&self, _path: &Path) -> bool {
            let mut script = self.0.lock().unwrap();
            if script.is_empty() {
                true
            } else {
                script.remove(0)
            }
        }
    }

    fn check(script: Vec<bool>, max: u32) -> HealthCheck {
        HealthCheck::new(
            Arc::new(Scripted(Mutex::new(script))),
            PathBuf::from("/mnt/union"),
            max,
            BackoffPolicy::linear(Duration::from_millis(1)),
            Duration::from_secs(5),
            Bus::default(),
        )
    }

    #[tokio::test]
    async fn content_passes_immediately() {
        let hc = check(vec![true], 3);
        let outcome = hc.run(&CancellationToken::new(), || {}).await;
        assert!(matches!(outcome, HealthOutcome::Healthy));
    }

    #[tokio::test]
    async fn recovers_within_budget() {
        let hc = check(vec![false, false, true], 3);
        let mut reconfirmed = 0;
        let outcome = hc.run(&CancellationToken::new(), || reconfirmed += 1).await;
        assert!(matches!(outcome, HealthOutcome::Healthy));
        assert_eq!(reconfirmed, 2);
    }

    #[tokio::test]
    async fn exhausts_after_max_retries() {
        let hc = check(vec![false; 4], 3);
        let mut rx = hc.bus.subscribe();
        let outcome = hc.run(&CancellationToken::new(), || {}).await;
        assert!(matches!(
            outcome,
            HealthOutcome::Exhausted(RuntimeError::OverlayEmpty { attempts: 3 })
        ));

        let mut delays = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::RetryScheduled {
                delays.push(ev.delay_ms.unwrap());
            }
        }
        assert_eq!(delays, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn shutdown_interrupts_backoff() {
        let hc = HealthCheck::new(
            Arc::new(Scripted(Mutex::new(vec![false; 10]))),
            PathBuf::from("/mnt/union"),
            5,
            BackoffPolicy::linear(Duration::from_secs(60)),
            Duration::from_secs(5),
            Bus::default(),
        );
        let stop = CancellationToken::new();
        stop.cancel();
        let outcome = hc.run(&stop, || {}).await;
        assert!(matches!(outcome, HealthOutcome::Interrupted));
    }

    /// Listing never completes, like a wedged FUSE mount.
    struct Hung;

    #[async_trait]
    impl MountProbe for Hung {
        async fn is_busy(&self, _task: &str, _path: &Path) -> Result<bool, TaskError> {
            Ok(false)
        }

        async fn has_content(&self, _path: &Path) -> bool {
            std::future::pending().await
        }
    }

    fn hung_check(max: u32) -> HealthCheck {
        HealthCheck::new(
            Arc::new(Hung),
            PathBuf::from("/mnt/union"),
            max,
            BackoffPolicy::linear(Duration::from_millis(1)),
            Duration::from_millis(20),
            Bus::default(),
        )
    }

    #[tokio::test]
    async fn hung_listing_counts_as_empty() {
        let hc = hung_check(2);
        let mut rx = hc.bus.subscribe();
        let outcome = time::timeout(
            Duration::from_secs(5),
            hc.run(&CancellationToken::new(), || {}),
        )
        .await
        .unwrap();
        assert!(matches!(
            outcome,
            HealthOutcome::Exhausted(RuntimeError::OverlayEmpty { attempts: 2 })
        ));

        let mut empty = 0;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::OverlayEmpty {
                empty += 1;
            }
        }
        assert_eq!(empty, 3);
    }

    #[tokio::test]
    async fn shutdown_interrupts_hung_listing() {
        let hc = HealthCheck::new(
            Arc::new(Hung),
            PathBuf::from("/mnt/union"),
            5,
            BackoffPolicy::linear(Duration::from_millis(1)),
            Duration::from_secs(3600),
            Bus::default(),
        );
        let stop = CancellationToken::new();
        let trigger = stop.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });
        let outcome = time::timeout(Duration::from_secs(5), hc.run(&stop, || {}))
            .await
            .unwrap();
        assert!(matches!(outcome, HealthOutcome::Interrupted));
    }
}
