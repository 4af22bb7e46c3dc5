//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the supervisor, the supervised task
//! slots, the mounters, the mover and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Supervisor`, `SupervisedTask`, `runner::run_once`, `Mounter`,
//!   `Mover`, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: `Supervisor::subscriber_listener()` (fans out to `SubscriberSet`),
//!   and anything holding a `Bus::subscribe()` receiver (tests, embedders).

mod bus;
mod event;

pub use bus::{Bus, DEFAULT_CAPACITY};
pub use event::{Event, EventKind};
