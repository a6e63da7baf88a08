//! Error types crossing the plugin boundary.

use mudmux_api::ApiError;
use mudmux_event::EventError;
use mudmux_record::RecordError;
use mudmux_types::{ErrorCode, PluginId, ValueError};
use thiserror::Error;

/// Errors raised by plugin code itself.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The plugin has no handler by this name.
    #[error("plugin has no handler {0:?}")]
    UnknownHandler(String),

    /// Snapshot serialization failed.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// A lifecycle stage failed.
    #[error("lifecycle fault: {0}")]
    Lifecycle(String),

    /// Anything else the plugin wants to report.
    #[error("{0}")]
    Message(String),
}

impl PluginError {
    /// Convenience constructor for ad-hoc plugin failures.
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

impl ErrorCode for PluginError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnknownHandler(_) => "PLUGIN_UNKNOWN_HANDLER",
            Self::Snapshot(_) => "PLUGIN_SNAPSHOT",
            Self::Lifecycle(_) => "PLUGIN_LIFECYCLE",
            Self::Message(_) => "PLUGIN_FAULT",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Errors returned across the [`CoreApi`](crate::CoreApi) surface.
///
/// Subsystem-internal error types map into these at the boundary so
/// plugins see one error vocabulary.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Event registration or lookup failed.
    #[error(transparent)]
    Event(#[from] EventError),

    /// Capability registration or lookup failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A record operation was rejected.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// A raw value did not coerce to its declared type.
    #[error(transparent)]
    Value(#[from] ValueError),

    /// A plugin handler faulted.
    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// No plugin with this id is loaded.
    #[error("no loaded plugin {0}")]
    UnknownPlugin(PluginId),

    /// Setting name not registered for this plugin.
    #[error("plugin {plugin} has no setting {name:?}")]
    UnknownSetting {
        /// Plugin that was queried.
        plugin: PluginId,
        /// Setting name.
        name: String,
    },

    /// Setting names are globally unique; this one is taken.
    #[error("setting name {name:?} already registered by {owner}")]
    DuplicateSetting {
        /// The colliding name.
        name: String,
        /// Who owns it.
        owner: PluginId,
    },

    /// The setting rejects writes.
    #[error("setting {plugin}.{name} is read-only")]
    ReadonlySetting {
        /// Owning plugin.
        plugin: PluginId,
        /// Setting name.
        name: String,
    },

    /// A trigger with this name already exists for the owner.
    #[error("trigger {0:?} already exists")]
    DuplicateTrigger(String),

    /// No such trigger for the owner.
    #[error("unknown trigger {0:?}")]
    UnknownTrigger(String),

    /// The trigger pattern did not compile.
    #[error("trigger {name:?}: bad pattern: {error}")]
    BadPattern {
        /// Trigger name.
        name: String,
        /// Compiler diagnostic.
        error: String,
    },

    /// A timer with this name already exists for the owner.
    #[error("timer {0:?} already exists")]
    DuplicateTimer(String),

    /// No such timer for the owner.
    #[error("unknown timer {0:?}")]
    UnknownTimer(String),

    /// A time-of-day anchor was not `HHMM`.
    #[error("bad time-of-day anchor {0:?} (expected HHMM)")]
    BadTimeAnchor(String),

    /// A mud-bound line was emitted while the upstream link is down.
    #[error("mud connection is down")]
    MudNotConnected,

    /// Plugin dependency resolution found a cycle.
    #[error("dependency cycle involving {0}")]
    DependencyCycle(PluginId),

    /// A declared dependency is not available.
    #[error("plugin {plugin} requires {dependency}, which is not available")]
    MissingDependency {
        /// The dependent plugin.
        plugin: PluginId,
        /// What it needs.
        dependency: PluginId,
    },
}

impl ErrorCode for CoreError {
    fn code(&self) -> &'static str {
        match self {
            Self::Event(e) => e.code(),
            Self::Api(e) => e.code(),
            Self::Record(e) => e.code(),
            Self::Value(e) => e.code(),
            Self::Plugin(e) => e.code(),
            Self::UnknownPlugin(_) => "CORE_UNKNOWN_PLUGIN",
            Self::UnknownSetting { .. } => "SETTING_UNKNOWN",
            Self::DuplicateSetting { .. } => "SETTING_DUPLICATE",
            Self::ReadonlySetting { .. } => "SETTING_READONLY",
            Self::DuplicateTrigger(_) => "TRIGGER_DUPLICATE",
            Self::UnknownTrigger(_) => "TRIGGER_UNKNOWN",
            Self::BadPattern { .. } => "TRIGGER_BAD_PATTERN",
            Self::DuplicateTimer(_) => "TIMER_DUPLICATE",
            Self::UnknownTimer(_) => "TIMER_UNKNOWN",
            Self::BadTimeAnchor(_) => "TIMER_BAD_ANCHOR",
            Self::MudNotConnected => "NET_MUD_DOWN",
            Self::DependencyCycle(_) => "PLUGIN_DEPENDENCY_CYCLE",
            Self::MissingDependency { .. } => "PLUGIN_MISSING_DEPENDENCY",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Event(e) => e.is_recoverable(),
            Self::Api(e) => e.is_recoverable(),
            Self::Record(e) => e.is_recoverable(),
            Self::Value(e) => e.is_recoverable(),
            Self::Plugin(e) => e.is_recoverable(),
            Self::UnknownSetting { .. }
            | Self::UnknownTrigger(_)
            | Self::UnknownTimer(_)
            | Self::MudNotConnected => true,
            _ => false,
        }
    }
}
