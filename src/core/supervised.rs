//! # Supervised task slot.
//!
//! A [`SupervisedTask`] pairs one [`TaskRef`] with the handle of its current
//! attempt. The supervisor is its only owner, so state changes need no locking.
//!
//! ```text
//! NotStarted ──start()──► Running ──(attempt ends)──► Terminated ──start()──► Running ...
//!                            └──────terminate()──────────┘
//! ```

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::runner::run_once;
use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::tasks::TaskRef;

/// Lifecycle of a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// Never launched.
    NotStarted,
    /// An attempt is in flight.
    Running,
    /// The last attempt has ended.
    Terminated,
}

/// One supervised unit of concurrency.
pub struct SupervisedTask {
    task: TaskRef,
    handle: Option<JoinHandle<Result<(), TaskError>>>,
    token: Option<CancellationToken>,
    state: TaskState,
    attempts: u32,
}

impl SupervisedTask {
    /// Creates an idle slot.
    pub fn new(task: TaskRef) -> Self {
        Self {
            task,
            handle: None,
            token: None,
            state: TaskState::NotStarted,
            attempts: 0,
        }
    }

    /// Task name.
    pub fn name(&self) -> &str {
        self.task.name()
    }

    /// Current state.
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Attempts launched so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Launches a new attempt under a child of `generation`.
    ///
    /// Calls [`Task::prepare`](crate::Task::prepare) synchronously before spawning.
    /// No-op if an attempt is already running.
    pub fn start(&mut self, generation: &CancellationToken, bus: &Bus) {
        if self.state == TaskState::Running {
            return;
        }
        self.attempts += 1;
        let attempt = self.attempts;
        let token = generation.child_token();

        self.task.prepare();
        bus.publish(
            Event::new(EventKind::TaskStarting)
                .with_task(self.task.name())
                .with_attempt(attempt),
        );

        let task = self.task.clone();
        let bus = bus.clone();
        let child = token.clone();
        self.handle = Some(tokio::spawn(async move {
            run_once(task.as_ref(), child, attempt, &bus).await
        }));
        self.token = Some(token);
        self.state = TaskState::Running;
    }

    /// Non-blocking liveness poll. Reaps a finished attempt.
    ///
    /// A panicked attempt is reported as `TaskFailed`.
    pub fn is_alive(&mut self, bus: &Bus) -> bool {
        let finished = match &self.handle {
            Some(handle) => handle.is_finished(),
            None => true,
        };
        if !finished {
            return true;
        }
        if let Some(handle) = self.handle.take() {
            if let Some(Err(join)) = handle.now_or_never() {
                if join.is_panic() {
                    bus.publish(
                        Event::new(EventKind::TaskFailed)
                            .with_task(self.task.name())
                            .with_attempt(self.attempts)
                            .with_reason("task panicked"),
                    );
                }
            }
        }
        self.token = None;
        if self.state == TaskState::Running {
            self.state = TaskState::Terminated;
        }
        false
    }

    /// Cancels the current attempt and waits until it has fully exited.
    pub async fn terminate(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
        if let Some(handle) = self.handle.take() {
            if let Err(join) = handle.await {
                tracing::warn!(task = %self.task.name(), error = %join, "task did not exit cleanly");
            }
        }
        if self.state == TaskState::Running {
            self.state = TaskState::Terminated;
        }
    }
}
