//! # Core subscriber trait
//!
//! `Subscribe` plugs event handlers into the runtime: structured logging,
//! alerting, an operator dashboard. Each subscriber is driven by a dedicated
//! worker fed by a bounded queue owned by the
//! [`SubscriberSet`](crate::subscribers::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow; they never block the supervisor, the mounters
//!   or other subscribers.
//! - If a subscriber's queue overflows, events for that subscriber are dropped
//!   and a `SubscriberOverflow` event is published.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use mountvisor::{Event, EventKind, Subscribe};
//!
//! struct RestartAlarm;
//!
//! #[async_trait]
//! impl Subscribe for RestartAlarm {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::RestartRequested {
//!             // page someone...
//!         }
//!     }
//!     fn name(&self) -> &'static str { "restart-alarm" }
//!     fn queue_capacity(&self) -> usize { 64 }
//! }
//! ```

use crate::events::Event;
use async_trait::async_trait;

/// Contract for event subscribers.
///
/// Called from a subscriber-dedicated worker task.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
