//! The engine surface handed to plugin code.

use crate::error::CoreError;
use crate::info::PluginInfo;
use crate::manifest::{TimerSpec, TriggerSpec};
use mudmux_api::CapabilityDetail;
use mudmux_event::{EventDataRecord, EventSpec, SharedEventData};
use mudmux_types::{ClientTarget, PluginId, SettingValue};
use serde_json::Value;

/// A validator/coercer pair for a plugin-declared setting type:
/// raw text in, typed value (or a diagnostic) out.
pub type SettingValidator = Box<dyn Fn(&str) -> Result<SettingValue, String> + Send>;

/// Everything a plugin can ask of the engine.
///
/// Every dispatch into plugin code - event callback, capability call,
/// command, timer fire, lifecycle stage - receives `&mut dyn CoreApi`.
/// Calls are synchronous and run on the dispatcher task; re-entrant
/// raises are supported and stack.
///
/// This is the Rust rendering of the capability surface: the engine's
/// own operations are also reachable by name through
/// [`call`](Self::call), which routes through the registry and keeps
/// call-site accounting; the typed methods here are the direct,
/// cheaper path for the common cases.
pub trait CoreApi {
    // ── Events ───────────────────────────────────────────────

    /// Creates an event. Fails if the name exists.
    fn register_event(&mut self, spec: EventSpec) -> Result<(), CoreError>;

    /// Binds `(owner, handler)` to an event at `priority`.
    ///
    /// Idempotent; returns whether the callback was newly added.
    fn register_callback(
        &mut self,
        event: &str,
        owner: &PluginId,
        handler: &str,
        priority: i32,
    ) -> Result<bool, CoreError>;

    /// Removes a callback binding; returns whether it was present.
    fn unregister_callback(
        &mut self,
        event: &str,
        owner: &PluginId,
        handler: &str,
    ) -> Result<bool, CoreError>;

    /// Raises an event and dispatches synchronously; returns the
    /// final data record.
    fn raise_event(
        &mut self,
        event: &str,
        data: EventDataRecord,
        actor: &str,
    ) -> Result<SharedEventData, CoreError>;

    /// The data record of the innermost active raise.
    fn current_event_record(&self) -> Option<SharedEventData>;

    /// Active raises, outermost first.
    fn event_stack(&self) -> Vec<String>;

    // ── Capability registry ──────────────────────────────────

    /// Invokes an endpoint by fully-qualified name.
    fn call(
        &mut self,
        full_name: &str,
        caller: &PluginId,
        args: Value,
    ) -> Result<Value, CoreError>;

    /// Whether the name resolves.
    fn has_endpoint(&self, full_name: &str) -> bool;

    /// Sorted endpoint names, optionally per top-level namespace.
    fn list_endpoints(&self, top_level: Option<&str>) -> Vec<String>;

    /// Introspection snapshot for an endpoint.
    fn endpoint_detail(&self, full_name: &str) -> Option<CapabilityDetail>;

    // ── Settings ─────────────────────────────────────────────

    /// Reads a setting, coerced to its declared type.
    fn setting_get(&self, plugin: &PluginId, name: &str) -> Result<SettingValue, CoreError>;

    /// Validates and writes a setting; `"default"` resets to the
    /// registered default. Raises the change event unless hidden.
    fn setting_set(
        &mut self,
        plugin: &PluginId,
        name: &str,
        raw: &str,
        actor: &str,
    ) -> Result<(), CoreError>;

    /// Registers a validator for `SettingType::Custom(type_name)`
    /// settings.
    fn register_setting_validator(&mut self, type_name: &'static str, validator: SettingValidator);

    // ── Timers ───────────────────────────────────────────────

    /// Registers a timer owned by `owner`.
    fn add_timer(&mut self, owner: &PluginId, spec: TimerSpec) -> Result<(), CoreError>;

    /// Removes a timer; returns whether it existed.
    fn remove_timer(&mut self, owner: &PluginId, name: &str) -> bool;

    /// Enables or disables a timer.
    fn set_timer_enabled(
        &mut self,
        owner: &PluginId,
        name: &str,
        enabled: bool,
    ) -> Result<(), CoreError>;

    // ── Triggers ─────────────────────────────────────────────

    /// Registers a trigger; returns the event name raised on match.
    fn add_trigger(&mut self, owner: &PluginId, spec: TriggerSpec) -> Result<String, CoreError>;

    /// Removes a trigger.
    fn remove_trigger(&mut self, owner: &PluginId, name: &str) -> Result<(), CoreError>;

    /// Enables or disables a trigger.
    fn set_trigger_enabled(
        &mut self,
        owner: &PluginId,
        name: &str,
        enabled: bool,
    ) -> Result<(), CoreError>;

    /// Enables or disables every trigger in a group; returns how many
    /// were touched.
    fn set_trigger_group_enabled(&mut self, group: &str, enabled: bool) -> usize;

    // ── Pipeline ─────────────────────────────────────────────

    /// Emits lines upstream, bypassing modification events.
    fn send_to_mud(&mut self, lines: Vec<String>, actor: &str) -> Result<(), CoreError>;

    /// Emits lines upstream through the full modify pipeline.
    fn process_to_mud(&mut self, lines: Vec<String>, actor: &str) -> Result<(), CoreError>;

    /// Emits internal lines to clients, bypassing modification
    /// events.
    fn send_to_clients(
        &mut self,
        lines: Vec<String>,
        target: ClientTarget,
        actor: &str,
    ) -> Result<(), CoreError>;

    /// Emits lines to clients through the full modify pipeline.
    fn process_to_clients(&mut self, lines: Vec<String>, actor: &str) -> Result<(), CoreError>;

    // ── Plugins ──────────────────────────────────────────────

    /// Ids of all known plugins, sorted.
    fn plugin_ids(&self) -> Vec<PluginId>;

    /// Metadata and state for one plugin.
    fn plugin_info(&self, id: &PluginId) -> Option<PluginInfo>;

    /// Whether the plugin is fully loaded.
    fn is_loaded(&self, id: &PluginId) -> bool;
}
