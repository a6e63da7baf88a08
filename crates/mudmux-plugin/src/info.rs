//! Runtime plugin state.

use crate::meta::PluginMeta;
use chrono::{DateTime, Utc};
use std::fmt;

/// Where a plugin is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    /// Discovered but not instantiated.
    NotImported,
    /// Instantiated; registration walk not yet complete.
    ImportedOnly,
    /// Fully loaded and registered.
    Loaded,
    /// Instantiation or a lifecycle stage failed; skipped.
    Failed,
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotImported => "not-imported",
            Self::ImportedOnly => "imported-only",
            Self::Loaded => "loaded",
            Self::Failed => "failed",
        })
    }
}

/// Metadata plus runtime state for one plugin.
///
/// Retained after unload for diagnostics; the instance itself is
/// dropped at unload, which is what actually frees the plugin's
/// resources.
#[derive(Debug, Clone)]
pub struct PluginInfo {
    /// The static metadata.
    pub meta: PluginMeta,
    /// Current lifecycle state.
    pub state: PluginState,
    /// When the instance was created, if it was.
    pub imported_at: Option<DateTime<Utc>>,
}

impl PluginInfo {
    /// Info for a freshly discovered plugin.
    #[must_use]
    pub fn discovered(meta: PluginMeta) -> Self {
        Self {
            meta,
            state: PluginState::NotImported,
            imported_at: None,
        }
    }

    /// Whether the plugin is fully loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.state == PluginState::Loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_display() {
        assert_eq!(PluginState::NotImported.to_string(), "not-imported");
        assert_eq!(PluginState::Loaded.to_string(), "loaded");
    }

    #[test]
    fn discovered_starts_unimported() {
        let info = PluginInfo::discovered(PluginMeta::new("plugins.x", "X"));
        assert_eq!(info.state, PluginState::NotImported);
        assert!(!info.is_loaded());
        assert!(info.imported_at.is_none());
    }
}
