//! Runtime core: orchestration and lifecycle.
//!
//! The public entry point is [`Supervisor`], which starts the mount stack,
//! keeps it alive, checks the overlay's health and tears everything down in
//! order on shutdown.
//!
//! Internal modules:
//! - [`runner`]: executes one attempt and publishes its terminal event;
//! - [`supervised`]: a task slot with its handle and lifecycle state;
//! - [`health`]: the overlay content check with its retry budget;
//! - [`shutdown`]: termination signal handling;
//! - [`supervisor`]: the state machine tying it all together.

mod config;
mod health;
mod runner;
mod shutdown;
mod stack;
mod supervised;
mod supervisor;

pub use config::SupervisorConfig;
pub use health::{HealthCheck, HealthOutcome};
pub use runner::run_once;
pub use shutdown::ShutdownSignal;
pub use stack::Stack;
pub use supervised::{SupervisedTask, TaskState};
pub use supervisor::{Supervisor, SupervisorState};
