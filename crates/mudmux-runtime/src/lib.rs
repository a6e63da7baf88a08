//! The mudmux proxy engine.
//!
//! This crate assembles the core: the dispatcher-owned [`ProxyCore`]
//! (event bus, capability registry, plugin table, settings, commands,
//! triggers, timers, network router), the plugin loader, the record
//! pipeline, and the telnet shims.
//!
//! # Concurrency model
//!
//! One dispatcher task owns all engine state. Network read/write
//! loops run as separate tokio tasks and talk to the dispatcher over
//! channels:
//!
//! ```text
//!   mud read loop ──┐                       ┌── mud write loop
//!                   │  ProxyMessage         │   (outbound queue)
//!   client reads ───┼────────► dispatcher ──┼── client write loops
//!                   │          (ProxyCore)  │   (per-client queues)
//!   timer tick ─────┘                       │
//! ```
//!
//! Plugin callbacks are synchronous and run on the dispatcher only;
//! they see a consistent snapshot of every registry, and record
//! mutation cannot race socket writes because writes happen after the
//! send stage locks the container.

pub mod commands;
pub mod config;
mod core;
pub mod engine;
pub mod net;
pub mod pipeline;
pub mod settings;
pub mod timers;
pub mod triggers;

pub use crate::core::{CoreOp, EndpointTarget, ProxyCore};
pub use config::ProxyConfig;
pub use engine::{ProxyEngine, ProxyMessage};

/// Engine subsystem ids used as owners for built-in registrations.
pub mod ids {
    /// The proxy plugin id: prefix/separator/preamble settings.
    pub const PROXY: &str = "plugins.core.proxy";
    /// The command engine.
    pub const COMMANDS: &str = "plugins.core.commands";
    /// The event subsystem.
    pub const EVENTS: &str = "plugins.core.events";
    /// The settings subsystem.
    pub const SETTINGS: &str = "plugins.core.settings";
    /// The trigger engine.
    pub const TRIGGERS: &str = "plugins.core.triggers";
    /// The timer scheduler.
    pub const TIMERS: &str = "plugins.core.timers";
    /// The capability registry surface.
    pub const API: &str = "plugins.core.api";
    /// The plugin manager.
    pub const PLUGINM: &str = "plugins.core.pluginm";
    /// Client connection management (listing, bans).
    pub const CLIENTS: &str = "plugins.core.clients";
}
