//! Plugin SDK for the mudmux proxy.
//!
//! Plugins are in-process Rust types implementing [`Plugin`]. They
//! declare everything they register - capability endpoints, event
//! callbacks, commands, triggers, timers, settings - in a static
//! manifest of [`Registration`] entries; the loader walks the
//! manifest, so there is no runtime reflection and unload can remove
//! everything a plugin owns atomically.
//!
//! # Dispatch model
//!
//! The engine routes work back to a plugin by `(plugin id, handler
//! name)`: event callbacks via [`Plugin::handle_event`], capability
//! calls via [`Plugin::call_endpoint`], commands via
//! [`Plugin::run_command`], timers via [`Plugin::fire_timer`]. Every
//! dispatch hands the plugin a `&mut dyn CoreApi` - the full engine
//! surface - so callbacks can raise further events, call endpoints,
//! mutate the current line, or schedule timers.
//!
//! # State
//!
//! Handlers take `&self`; plugins keep their mutable state behind
//! interior mutability (a `parking_lot::Mutex` works - everything
//! runs on the single dispatcher task, so the lock is uncontended).
//! Do not hold your own state lock across a [`CoreApi`] call that can
//! re-enter you.
//!
//! # Hot-reload
//!
//! Plugins that want state to survive a reload list attribute names in
//! [`PluginMeta::attrs_to_save_on_reload`] and implement
//! [`Plugin::snapshot_attrs`] / [`Plugin::restore_attrs`]. The loader
//! snapshots before unload and restores onto the fresh instance before
//! its `initialize` runs.

mod core_api;
mod error;
mod info;
mod manifest;
mod meta;
mod plugin;
mod snapshot;

pub use core_api::{CoreApi, SettingValidator};
pub use error::{CoreError, PluginError};
pub use info::{PluginInfo, PluginState};
pub use manifest::{
    ArgSpec, ArgType, ArgValue, CommandArgs, CommandOutcome, CommandSpec, Nargs, Registration,
    SettingSpec, TimerSpec, TriggerSpec,
};
pub use meta::PluginMeta;
pub use plugin::{Plugin, PluginFactory};
pub use snapshot::PluginSnapshot;

#[cfg(any(test, feature = "test-utils"))]
pub use plugin::testing;
