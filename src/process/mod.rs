//! External process plumbing.
//!
//! - [`CommandSpec`] an immutable program + arguments + working directory;
//! - [`ProcessHandle`] a running child: wait, poll liveness, terminate;
//! - [`ProcessOutput`] exit status plus the captured stdout/stderr.
//!
//! Captured output is routed to `tracing` line by line, attributed to the
//! task that launched the process, and never written to raw stdout.

mod command;
mod handle;

pub use command::CommandSpec;
pub use handle::{ProcessHandle, ProcessOutput};
