//! Identifier types for mudmux.
//!
//! Plugin identifiers are dotted paths (`plugins.core.proxy`) so they
//! sort and display predictably; record and client identifiers are
//! UUID-based so they stay unique across reconnects and reloads.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier for a plugin.
///
/// A plugin id is a dotted lowercase path, conventionally rooted at
/// `plugins.`, e.g. `plugins.core.proxy` or `plugins.client.alias`.
/// The id doubles as the top-level namespace for the plugin's
/// capability endpoints and as the prefix of its setting-change events.
///
/// # Example
///
/// ```
/// use mudmux_types::PluginId;
///
/// let id = PluginId::new("plugins.core.proxy");
/// assert_eq!(id.as_str(), "plugins.core.proxy");
/// assert_eq!(id.short_name(), "proxy");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginId(String);

impl PluginId {
    /// Creates a plugin id from a dotted path.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the last dotted segment, used in command syntax
    /// (`#bp.<short-name>.<command>`).
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PluginId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PluginId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Identifier for one line record moving through the pipeline.
///
/// Generated once at record creation and never reassigned; the update
/// log references it so a delivered line can be traced back to the
/// bytes it was born from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generates a fresh record id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for one downstream client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(Uuid);

impl ClientId {
    /// Generates a fresh client id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The first segment is enough for log lines.
        let s = self.0.to_string();
        f.write_str(s.split('-').next().unwrap_or(&s))
    }
}
