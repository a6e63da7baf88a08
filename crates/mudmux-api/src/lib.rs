//! Capability registry for the mudmux proxy.
//!
//! A flat table of callable endpoints keyed by fully-qualified name
//! `<top-level>:<dotted.path>`, e.g. `plugins.core.events:raise`.
//! Plugins register endpoints for cross-plugin invocation; the engine
//! registers its built-in operations the same way, so every call site
//! goes through one table with uniform accounting.
//!
//! The registry is generic over the target payload `T` - it stores
//! *routing data*, not closures. The runtime instantiates it with its
//! endpoint-target type and performs the actual invocation, which
//! keeps this crate free of engine dependencies and directly testable.
//!
//! # Instance scoping
//!
//! An entry may be instance-scoped; such entries shadow a same-named
//! process-wide entry when the lookup asks for the instance view.
//!
//! # Example
//!
//! ```
//! use mudmux_api::CapabilityRegistry;
//! use mudmux_types::PluginId;
//!
//! let mut reg: CapabilityRegistry<u32> = CapabilityRegistry::new();
//! let owner = PluginId::new("plugins.core.events");
//!
//! reg.add("plugins.core.events", "raise", owner, 7, "raise an event", false, false)
//!     .unwrap();
//!
//! let target = reg.resolve("plugins.core.events:raise", "plugins.test").unwrap();
//! assert_eq!(*target, 7);
//! ```

mod entry;
mod registry;

pub use entry::{CapabilityDetail, CapabilityEntry};
pub use registry::CapabilityRegistry;

use mudmux_types::ErrorCode;
use thiserror::Error;

/// Errors from capability registration and lookup.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The full name is already taken and `force` was not given.
    #[error("endpoint {0:?} already exists (pass force to overwrite)")]
    Duplicate(String),

    /// No endpoint with this name.
    #[error("unknown endpoint {0:?}")]
    Unknown(String),

    /// The name is not `<top-level>:<sub.name>`.
    #[error("malformed endpoint name {0:?}")]
    Malformed(String),
}

impl ErrorCode for ApiError {
    fn code(&self) -> &'static str {
        match self {
            Self::Duplicate(_) => "API_DUPLICATE",
            Self::Unknown(_) => "API_UNKNOWN",
            Self::Malformed(_) => "API_MALFORMED",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Malformed(_))
    }
}
