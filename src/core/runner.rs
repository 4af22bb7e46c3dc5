//! # Run a single attempt of a task.
//!
//! Executes one attempt of a [`Task`] and publishes its terminal event to the [`Bus`].
//!
//! ## Event flow
//!
//! ```text
//! Success / cancellation:
//!   task.run() → Ok(()) | Err(Canceled) → publish TaskStopped
//!
//! Failure:
//!   task.run() → Err(Launch | MountFailed | ...) → publish TaskFailed
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** terminal event: `TaskStopped` or `TaskFailed`
//! - `Canceled` is a graceful exit, never a failure
//! - The task gets a **child token** of the generation token: cancelling the
//!   generation stops it, stopping it never touches the generation

use tokio_util::sync::CancellationToken;

use crate::{
    error::TaskError,
    events::{Bus, Event, EventKind},
    tasks::Task,
};

/// Executes a single attempt of `task`, publishing lifecycle events to `bus`.
pub async fn run_once<T: Task + ?Sized>(
    task: &T,
    token: CancellationToken,
    attempt: u32,
    bus: &Bus,
) -> Result<(), TaskError> {
    match task.run(token).await {
        Ok(()) | Err(TaskError::Canceled) => {
            publish_stopped(bus, task.name(), attempt);
            Ok(())
        }
        Err(e) => {
            publish_failed(bus, task.name(), attempt, &e);
            Err(e)
        }
    }
}

/// Publishes `TaskStopped` event (success or graceful cancellation).
fn publish_stopped(bus: &Bus, name: &str, attempt: u32) {
    bus.publish(
        Event::new(EventKind::TaskStopped)
            .with_task(name)
            .with_attempt(attempt),
    );
}

/// Publishes `TaskFailed` event with error details.
fn publish_failed(bus: &Bus, name: &str, attempt: u32, err: &TaskError) {
    bus.publish(
        Event::new(EventKind::TaskFailed)
            .with_task(name)
            .with_attempt(attempt)
            .with_reason(format!("{}: {err}", err.as_label())),
    );
}
