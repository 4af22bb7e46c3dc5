//! # Mounters: one owner per mount point.
//!
//! ```text
//!   RemoteMounter                         OverlayMounter
//!   ─────────────                         ──────────────
//!   Idle                                  Idle ◄── blocks on ReadinessReceiver
//!    └► Unmounting (idempotent)             └► Unmounting
//!        └► ProbingBusy ── busy ─► skip        └► ProbingBusy ── busy ─► skip
//!            └► Mounting (spawn)                   └► Mounting (spawn)
//!                └► settle delay                       └► Mounted
//!                    └► ReadinessSender::signal() ─────────┘ (wakes overlay)
//!                        └► Mounted
//!                            └► clean exit ─► Detached ─► Unmounting (loop)
//!                                 (overlay: Detached until the next readiness)
//!   cancellation at any point ─► Stopped
//! ```
//!
//! Only the owning mounter ever issues mount/unmount commands for its point,
//! and the busy probe runs immediately before every mount attempt.

mod mounter;
mod readiness;
mod spec;

pub use mounter::{MountState, MountTiming, Mounter};
pub use readiness::{ReadinessReceiver, ReadinessSender, readiness_channel};
pub use spec::{MountSpec, Role};
