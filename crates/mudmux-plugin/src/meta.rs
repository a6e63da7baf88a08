//! Static plugin metadata.

use mudmux_types::PluginId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Static metadata a plugin factory declares up front.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginMeta {
    /// Dotted id, e.g. `plugins.client.alias`.
    pub id: PluginId,
    /// Human-readable name.
    pub name: String,
    /// Author.
    pub author: String,
    /// Integer version, bumped on incompatible change.
    pub version: u32,
    /// One-line purpose.
    pub purpose: String,
    /// Required plugins cannot be unloaded while the proxy runs.
    pub required: bool,
    /// Where the plugin's source lives, for diagnostics.
    pub source_path: Option<PathBuf>,
    /// Plugin ids that must load before this one.
    pub dependencies: Vec<PluginId>,
    /// Whether a reload of this plugin also reloads its dependents.
    pub reload_dependents: bool,
    /// Attribute names snapshotted across hot-reload.
    pub attrs_to_save_on_reload: Vec<String>,
}

impl PluginMeta {
    /// Creates metadata with the common defaults (not required, no
    /// dependencies, nothing saved on reload).
    #[must_use]
    pub fn new(id: impl Into<PluginId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            author: String::new(),
            version: 1,
            purpose: String::new(),
            required: false,
            source_path: None,
            dependencies: Vec::new(),
            reload_dependents: false,
            attrs_to_save_on_reload: Vec::new(),
        }
    }

    /// Sets the author.
    #[must_use]
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Sets the version.
    #[must_use]
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Sets the purpose line.
    #[must_use]
    pub fn purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = purpose.into();
        self
    }

    /// Marks the plugin required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Adds a dependency.
    #[must_use]
    pub fn depends_on(mut self, id: impl Into<PluginId>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    /// Reloading this plugin also reloads its dependents.
    #[must_use]
    pub fn reload_dependents(mut self) -> Self {
        self.reload_dependents = true;
        self
    }

    /// Declares attributes carried across hot-reload.
    #[must_use]
    pub fn save_on_reload<I, S>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attrs_to_save_on_reload = attrs.into_iter().map(Into::into).collect();
        self
    }
}
