//! Event system for the mudmux proxy.
//!
//! This crate holds the data side of the event bus: event definitions
//! with priority-bucketed callback registrations, the keyed data
//! records passed to callbacks, per-raise invocation state, and the
//! bounded per-event raise history.
//!
//! # Dispatch split
//!
//! Actually *invoking* callbacks requires re-entrant access to the
//! whole engine (a callback may raise further events, call capability
//! endpoints, or mutate the current line), so the dispatch loop lives
//! in the runtime crate next to the engine state. The bus here owns
//! everything dispatch needs to read and update: ordered callback
//! snapshots, raise counters, and history rings.
//!
//! # Priority semantics
//!
//! Lower number runs earlier. Ties within a bucket run in
//! registration order; that order is not a stable contract between
//! plugins.
//!
//! # Example
//!
//! ```
//! use mudmux_event::{EventBus, EventSpec};
//! use mudmux_types::PluginId;
//!
//! let mut bus = EventBus::new();
//! let owner = PluginId::new("plugins.core.proxy");
//! bus.register_event(EventSpec::new("ev_mud_connected", owner.clone(), "mud link up"))
//!     .unwrap();
//!
//! let added = bus
//!     .register_callback("ev_mud_connected", owner.clone(), "on_connect", 50)
//!     .unwrap();
//! assert!(added);
//!
//! // Idempotent per (event, callback).
//! let again = bus
//!     .register_callback("ev_mud_connected", owner, "on_connect", 50)
//!     .unwrap();
//! assert!(!again);
//! ```

mod bus;
mod data;
mod definition;
mod invocation;
pub mod names;

pub use bus::EventBus;
pub use data::{DataValue, EventDataRecord, SharedEventData};
pub use definition::{CallbackRef, Event, EventSpec, DEFAULT_PRIORITY};
pub use invocation::{EventInvocation, InvocationSummary};

use mudmux_types::ErrorCode;
use thiserror::Error;

/// Errors from event registration and lookup.
#[derive(Debug, Error)]
pub enum EventError {
    /// An event with this name already exists.
    #[error("event {0:?} already exists")]
    DuplicateEvent(String),

    /// No event with this name is registered.
    #[error("unknown event {0:?}")]
    UnknownEvent(String),
}

impl ErrorCode for EventError {
    fn code(&self) -> &'static str {
        match self {
            Self::DuplicateEvent(_) => "EVENT_DUPLICATE",
            Self::UnknownEvent(_) => "EVENT_UNKNOWN",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnknownEvent(_))
    }
}
