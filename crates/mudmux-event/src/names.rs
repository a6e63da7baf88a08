//! Well-known event names raised by the engine.
//!
//! These constitute the public boundary of the pipeline; plugins bind
//! to them by name. Setting-change events are generated per setting as
//! `ev_{plugin_id}_var_{setting}_modified` - see [`setting_modified`].

/// A plugin finished loading.
pub const PLUGIN_LOADED: &str = "ev_plugin_loaded";
/// A plugin was unloaded.
pub const PLUGIN_UNLOADED: &str = "ev_plugin_unloaded";
/// Plugins should persist their state.
pub const PLUGIN_SAVE: &str = "ev_plugin_save";
/// Plugins should reset to registered defaults.
pub const PLUGIN_RESET: &str = "ev_plugin_reset";

/// A client→mud line is open for modification.
pub const TO_MUD_MODIFY: &str = "ev_to_mud_data_modify";
/// A client→mud line was written upstream (observation only).
pub const TO_MUD_READ: &str = "ev_to_mud_data_read";
/// A mud→client line is open for modification.
pub const TO_CLIENT_MODIFY: &str = "ev_to_client_data_modify";
/// A mud→client line was delivered (observation only).
pub const TO_CLIENT_READ: &str = "ev_to_client_data_read";

/// The upstream mud connection came up.
pub const MUD_CONNECTED: &str = "ev_mud_connected";
/// The upstream mud connection went down.
pub const MUD_DISCONNECTED: &str = "ev_mud_disconnected";
/// A client socket connected (not yet authenticated).
pub const CLIENT_CONNECTED: &str = "ev_client_connected";
/// A client passed the proxy password.
pub const CLIENT_LOGGED_IN: &str = "ev_client_logged_in";
/// A client socket disconnected.
pub const CLIENT_DISCONNECTED: &str = "ev_client_disconnected";

/// The key under which pipeline modify/read events bind the current
/// line.
pub const LINE_KEY: &str = "line";

/// Builds the change-event name for a setting.
#[must_use]
pub fn setting_modified(plugin_id: &str, setting: &str) -> String {
    format!("ev_{plugin_id}_var_{setting}_modified")
}

/// Builds the default event name for a trigger id.
#[must_use]
pub fn trigger_event(trigger_id: &str) -> String {
    format!("ev_core.triggers_{trigger_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setting_event_name_shape() {
        assert_eq!(
            setting_modified("plugins.core.proxy", "command_prefix"),
            "ev_plugins.core.proxy_var_command_prefix_modified"
        );
    }

    #[test]
    fn trigger_event_name_shape() {
        assert_eq!(
            trigger_event("t_plugins.test_gag"),
            "ev_core.triggers_t_plugins.test_gag"
        );
    }
}
