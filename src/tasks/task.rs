//! # Task abstraction.
//!
//! A [`Task`] is one supervised unit of concurrency: the remote mounter loop,
//! the overlay mounter loop, or the mover loop. The supervisor runs one
//! attempt at a time and relaunches the task whenever an attempt ends.
//!
//! A task receives a [`CancellationToken`]; when it fires the task must stop
//! any external process it owns, wait for it, and return.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Shared handle to a task.
pub type TaskRef = Arc<dyn Task>;

/// # Asynchronous, cancelable unit.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use async_trait::async_trait;
/// use mountvisor::{Task, TaskError};
///
/// struct Heartbeat;
///
/// #[async_trait]
/// impl Task for Heartbeat {
///     fn name(&self) -> &str { "heartbeat" }
///
///     async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
///         ctx.cancelled().await;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Returns a stable, human-readable task name.
    fn name(&self) -> &str;

    /// Called synchronously by the supervisor right before an attempt is spawned.
    ///
    /// Used to discard state left over from a previous attempt. Default: no-op.
    fn prepare(&self) {}

    /// Runs one attempt until it ends on its own or `ctx` is cancelled.
    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError>;
}
