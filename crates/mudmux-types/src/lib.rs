//! Shared types for the mudmux proxy.
//!
//! This crate is the bottom of the workspace dependency graph. It holds
//! the identifier types, the text origin/kind enums that classify every
//! line moving through the proxy, the typed setting values, and the
//! color-code helpers.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  mudmux-cli                                          │
//! ├──────────────────────────────────────────────────────┤
//! │  mudmux-runtime   (engine, loader, net, pipeline)    │
//! ├──────────────────────────────────────────────────────┤
//! │  mudmux-plugin    (Plugin trait, manifests, CoreApi) │
//! ├──────────────────────────────────────────────────────┤
//! │  mudmux-event     mudmux-api     mudmux-record       │
//! ├──────────────────────────────────────────────────────┤
//! │  mudmux-types  ◄── HERE                              │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod color;
mod error;
mod id;
mod origin;
mod target;
mod value;

pub use error::ErrorCode;
pub use id::{ClientId, PluginId, RecordId};
pub use origin::{LineKind, TextOrigin};
pub use target::ClientTarget;
pub use value::{SettingType, SettingValue, ValueError};
