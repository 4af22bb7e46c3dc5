//! # Task abstractions.
//!
//! - [`Task`] trait for async, cancelable units (mounters, the mover);
//! - [`TaskFn`] closure-backed implementation;
//! - [`TaskRef`] shared handle (`Arc<dyn Task>`).

mod task;
mod task_fn;

pub use task::{Task, TaskRef};
pub use task_fn::TaskFn;
