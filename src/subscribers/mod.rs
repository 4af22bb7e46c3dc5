//! # Event subscribers.
//!
//! - [`Subscribe`] the extension point for event handlers;
//! - [`SubscriberSet`] non-blocking fan-out with per-subscriber queues;
//! - [`LogWriter`] renders events through `tracing`.
//!
//! ```text
//! Bus ──► Supervisor::subscriber_listener ──► SubscriberSet::emit(&Event)
//!                                                 ├──► LogWriter
//!                                                 └──► custom subscribers
//! ```

mod log;
mod subscribe;
mod subscriber_set;

pub use log::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
