//! # Runtime events emitted by the supervisor, the mounters and the mover.
//!
//! The [`EventKind`] enum classifies events into:
//! - **Supervisor events**: state machine transitions and shutdown
//! - **Task lifecycle events**: attempts starting, stopping, failing, dying
//! - **Health events**: overlay content checks and the bounded retry loop
//! - **Mount events**: per-mounter state, launches, busy skips, readiness
//! - **Mover events**: scheduled migration runs
//!
//! The [`Event`] struct carries optional metadata (task name, attempt,
//! delay, mount point, reason) set depending on the kind.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order across publishers.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use mountvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RetryScheduled)
//!     .with_attempt(2)
//!     .with_delay(Duration::from_secs(10));
//!
//! assert_eq!(ev.kind, EventKind::RetryScheduled);
//! assert_eq!(ev.delay_ms, Some(10_000));
//! ```

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets `task` (subscriber name) and `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets `task` (subscriber name) and `reason`.
    SubscriberOverflow,

    // === Supervisor events ===
    /// Supervisor entered a new state.
    ///
    /// Sets `reason` (state label).
    StateChanged,

    /// Shutdown requested (termination signal observed).
    ShutdownRequested,

    /// Teardown finished; every task has exited and both mounts are released.
    AllStopped,

    // === Task lifecycle events ===
    /// A task attempt is starting.
    ///
    /// Sets `task` and `attempt` (1-based, counted per task across restarts).
    TaskStarting,

    /// A task attempt returned `Ok` or was cancelled.
    ///
    /// Sets `task` and `attempt`.
    TaskStopped,

    /// A task attempt returned an error.
    ///
    /// Sets `task`, `attempt` and `reason`.
    TaskFailed,

    /// Watching found a task no longer alive; it will be relaunched.
    ///
    /// Sets `task`.
    TaskDied,

    // === Health events ===
    /// Overlay has visible content.
    ///
    /// Sets `mount_point`.
    HealthCheckPassed,

    /// Overlay listing was empty.
    ///
    /// Sets `mount_point` and `attempt` (0 for the first check of a cycle).
    OverlayEmpty,

    /// Next overlay content check scheduled.
    ///
    /// Sets `attempt` and `delay_ms`.
    RetryScheduled,

    /// Overlay content appeared within the retry budget.
    ///
    /// Sets `mount_point` and `attempt`.
    OverlayRecovered,

    /// Retry budget exhausted; full cold restart of the stack.
    ///
    /// Sets `reason`.
    RestartRequested,

    // === Mount events ===
    /// A mounter moved to a new state.
    ///
    /// Sets `task`, `mount_point` and `reason` (state label).
    MountStateChanged,

    /// The mount command was launched.
    ///
    /// Sets `task`, `mount_point` and `reason` (command line).
    MountLaunched,

    /// Mount attempt skipped because the point is (or may be) busy.
    ///
    /// Sets `task`, `mount_point`, `delay_ms` and `reason`.
    MountSkippedBusy,

    /// Remote mounter signalled readiness to the overlay.
    ///
    /// Sets `task` and `mount_point`.
    ReadinessSignaled,

    /// Supervisor released a mount point during teardown.
    ///
    /// Sets `task` and `mount_point`.
    TeardownUnmount,

    // === Mover events ===
    /// A move run started.
    ///
    /// Sets `task` and `reason` (bandwidth limit or `off`).
    MoveStarted,

    /// A move run finished successfully.
    ///
    /// Sets `task`.
    MoveCompleted,

    /// A move run failed; the next scheduled run retries.
    ///
    /// Sets `task` and `reason`.
    MoveFailed,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the task, if applicable.
    pub task: Option<Arc<str>>,
    /// Attempt count.
    pub attempt: Option<u32>,
    /// Delay before the next action in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Mount point concerned, if any.
    pub mount_point: Option<Arc<Path>>,
    /// Human-readable detail (errors, states, command lines).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            attempt: None,
            delay_ms: None,
            mount_point: None,
            reason: None,
        }
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a mount point.
    #[inline]
    pub fn with_mount_point(mut self, path: &Path) -> Self {
        self.mount_point = Some(Arc::from(path));
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }

    /// Task name or `""`.
    pub fn task_name(&self) -> &str {
        self.task.as_deref().unwrap_or("")
    }

    /// Reason or `""`.
    pub fn reason_text(&self) -> &str {
        self.reason.as_deref().unwrap_or("")
    }
}
