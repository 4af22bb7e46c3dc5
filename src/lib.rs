//! # mountvisor
//!
//! **Mountvisor** keeps a three-part storage stack alive:
//!
//! - a **remote mount**: cloud storage mounted read-only by an external client;
//! - an **overlay mount**: a copy-on-write union of a local cache over the remote;
//! - a **mover**: periodically migrates what was written to the cache up to the remote.
//!
//! The external tools do all the filesystem work. This crate only owns the
//! orchestration: ordering mounts, handing readiness from the remote to the
//! overlay, detecting a wedged stack and tearing it down cleanly.
//!
//! ## Architecture
//! ```text
//!        ┌──────────────┐ readiness  ┌───────────────┐     ┌──────────────┐
//!        │ Mounter      │ ─────────► │ Mounter       │     │ Mover        │
//!        │ (remote)     │  (mpsc 1)  │ (overlay)     │     │ (schedule)   │
//!        └──────┬───────┘            └───────┬───────┘     └──────┬───────┘
//!               │ SupervisedTask             │ SupervisedTask     │ SupervisedTask
//!               ▼                            ▼                    ▼
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │  Supervisor                                                               │
//! │  Starting → Watching → HealthCheck → (Watching | Restarting)              │
//! │  signal → Terminating → Stopped  (overlay unmounted before remote)        │
//! └─────────────────────────────────────┬─────────────────────────────────────┘
//!                                       │ every component publishes Events
//!                                       ▼
//!                          Bus ──► SubscriberSet ──► LogWriter (tracing)
//! ```
//!
//! ## Features
//! | Area              | Description                                             | Key types                               |
//! |-------------------|---------------------------------------------------------|-----------------------------------------|
//! | **Supervision**   | Start, watch, health-check, restart, tear down.         | [`Supervisor`], [`SupervisedTask`]      |
//! | **Mounts**        | Per-mount-point lifecycle loop and readiness handshake. | [`Mounter`], [`MountSpec`]              |
//! | **Migration**     | Scheduled cache-to-remote move with bandwidth windows.  | [`Mover`], [`schedule::ScheduleSpec`]   |
//! | **Probing**       | Busy and content checks on mount points.                | [`MountProbe`], [`LsofProbe`]           |
//! | **Events**        | Typed runtime events and fan-out to subscribers.        | [`Event`], [`Bus`], [`Subscribe`]       |
//! | **Errors**        | Typed errors with stable labels.                        | [`ConfigError`], [`TaskError`], [`RuntimeError`] |
//! | **Configuration** | File + environment, resolved once into settings.        | [`config::Config`], [`config::Settings`] |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use mountvisor::{Bus, LogWriter, LsofProbe, MountProbe, Stack, Subscribe, Supervisor};
//! use mountvisor::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Config::load(None)?.resolve()?;
//!     let bus = Bus::default();
//!     let probe: Arc<dyn MountProbe> = Arc::new(LsofProbe::new(settings.tools.lsof.clone()));
//!     let stack = Stack::from_settings(&settings, probe.clone(), &bus);
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!
//!     Supervisor::new(settings.supervisor_config(), bus, stack, probe, subs)
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod config;
mod core;
pub mod duration;
mod error;
mod events;
pub mod mount;
mod mover;
pub mod platform;
mod policies;
mod probe;
mod process;
pub mod schedule;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use core::{
    HealthCheck, HealthOutcome, ShutdownSignal, Stack, SupervisedTask, Supervisor,
    SupervisorConfig, SupervisorState, TaskState, run_once,
};
pub use error::{ConfigError, RuntimeError, TaskError};
pub use events::{Bus, DEFAULT_CAPACITY, Event, EventKind};
pub use mount::{MountSpec, MountState, MountTiming, Mounter, Role};
pub use mover::Mover;
pub use policies::{BackoffPolicy, RetryBudget};
pub use probe::{LsofProbe, MountProbe};
pub use process::{CommandSpec, ProcessHandle, ProcessOutput};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use tasks::{Task, TaskFn, TaskRef};
