//! # LogWriter: events rendered through `tracing`
//!
//! Every state transition, retry attempt and teardown step becomes one
//! structured log record carrying the task name, attempt and backoff delay,
//! so a wedged mount chain can be diagnosed from logs alone.
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO  supervisor state state="watching"
//! INFO  task starting task="remote" attempt=1
//! INFO  mount launched task="remote" mount_point="/home/u/mnt/GoogleDriveCrypt" command="rclone mount ..."
//! WARN  overlay empty mount_point="/home/u/mnt/union" attempt=0
//! INFO  health retry scheduled attempt=1 delay_ms=5000
//! ERROR full restart requested reason="overlay still empty after 5 health-check retries"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Subscriber that writes every event to the `tracing` stream.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task_name();
        let reason = e.reason_text();
        let mount_point = e
            .mount_point
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        match e.kind {
            EventKind::StateChanged => tracing::info!(state = reason, "supervisor state"),
            EventKind::ShutdownRequested => tracing::info!("shutdown requested"),
            EventKind::AllStopped => tracing::info!("all tasks stopped and mounts released"),
            EventKind::TaskStarting => {
                tracing::info!(task, attempt = e.attempt, "task starting")
            }
            EventKind::TaskStopped => {
                tracing::info!(task, attempt = e.attempt, "task stopped")
            }
            EventKind::TaskFailed => {
                tracing::error!(task, attempt = e.attempt, error = reason, "task failed")
            }
            EventKind::TaskDied => tracing::warn!(task, "task not alive; relaunching"),
            EventKind::HealthCheckPassed => {
                tracing::debug!(mount_point = %mount_point, "overlay has content")
            }
            EventKind::OverlayEmpty => {
                tracing::warn!(mount_point = %mount_point, attempt = e.attempt, "overlay empty")
            }
            EventKind::RetryScheduled => tracing::info!(
                attempt = e.attempt,
                delay_ms = e.delay_ms,
                "health retry scheduled"
            ),
            EventKind::OverlayRecovered => {
                tracing::info!(mount_point = %mount_point, attempt = e.attempt, "overlay recovered")
            }
            EventKind::RestartRequested => {
                tracing::error!(reason, "full restart requested")
            }
            EventKind::MountStateChanged => {
                tracing::info!(task, mount_point = %mount_point, state = reason, "mount state")
            }
            EventKind::MountLaunched => {
                tracing::info!(task, mount_point = %mount_point, command = reason, "mount launched")
            }
            EventKind::MountSkippedBusy => tracing::warn!(
                task,
                mount_point = %mount_point,
                retry_in_ms = e.delay_ms,
                reason,
                "mount point busy; attempt skipped"
            ),
            EventKind::ReadinessSignaled => {
                tracing::info!(task, mount_point = %mount_point, "readiness signalled")
            }
            EventKind::TeardownUnmount => {
                tracing::info!(task, mount_point = %mount_point, "unmounted during teardown")
            }
            EventKind::MoveStarted => tracing::info!(task, bwlimit = reason, "move started"),
            EventKind::MoveCompleted => tracing::info!(task, "move completed"),
            EventKind::MoveFailed => {
                tracing::warn!(task, error = reason, "move failed; retrying next period")
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(subscriber = task, reason, "subscriber overflow")
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(subscriber = task, info = reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
