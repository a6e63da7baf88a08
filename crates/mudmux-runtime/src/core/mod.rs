//! The dispatcher-owned engine state.
//!
//! [`ProxyCore`] holds every process-wide table: the event bus, the
//! capability registry, the plugin table, settings, commands,
//! triggers, timers, and the network router. All access happens on
//! the dispatcher task, so none of it is locked.
//!
//! The core implements [`CoreApi`], the surface plugins program
//! against; the dispatch machinery lives in `dispatch.rs`, plugin
//! lifecycle in `lifecycle.rs`, and connection/login handling in
//! `clients.rs`.

mod clients;
mod dispatch;
mod lifecycle;

use crate::commands::{CommandEngine, CommandTarget, CoreCommand};
use crate::config::ProxyConfig;
use crate::ids;
use crate::net::NetRouter;
use crate::pipeline::{client_input_container, ProcessClientToMud, SendClientToMud, SendMudToClient};
use crate::settings::{SettingsBackend, SettingsEngine};
use crate::timers::TimerWheel;
use crate::triggers::{TriggerEngine, PSEUDO_ALL, PSEUDO_BEALL, PSEUDO_EMPTYLINE};
use mudmux_api::{CapabilityDetail, CapabilityRegistry};
use mudmux_event::{
    names, EventBus, EventDataRecord, EventInvocation, EventSpec, SharedEventData,
};
use mudmux_plugin::{
    ArgSpec, ArgType, ArgValue, CommandSpec, CoreApi, CoreError, Plugin, PluginFactory,
    PluginInfo, PluginSnapshot, SettingSpec, TimerSpec, TriggerSpec,
};
use mudmux_record::{LineRecord, RecordContainer, UpdateContext};
use mudmux_types::{ClientTarget, PluginId, SettingType, SettingValue, TextOrigin};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// What the registry invokes for an endpoint.
#[derive(Debug, Clone)]
pub enum EndpointTarget {
    /// Route to the owning plugin's `call_endpoint`.
    Plugin {
        /// Owning plugin.
        owner: PluginId,
        /// Handler name within the plugin.
        handler: String,
    },
    /// A built-in engine operation.
    Core(CoreOp),
}

/// Built-in capability operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreOp {
    /// `plugins.core.events:raise`
    EventRaise,
    /// `plugins.core.events:register.event`
    EventRegister,
    /// `plugins.core.events:register.callback`
    CallbackRegister,
    /// `plugins.core.events:unregister.callback`
    CallbackUnregister,
    /// `plugins.core.events:current.record`
    CurrentRecord,
    /// `plugins.core.events:stack`
    EventStack,
    /// `plugins.core.settings:get`
    SettingGet,
    /// `plugins.core.settings:set`
    SettingSet,
    /// `plugins.core.triggers:toggle`
    TriggerToggle,
    /// `plugins.core.triggers:group.toggle`
    TriggerGroupToggle,
    /// `plugins.core.timers:toggle`
    TimerToggle,
    /// `plugins.core.pluginm:list`
    PluginList,
}

/// The engine core.
pub struct ProxyCore {
    pub(crate) config: ProxyConfig,
    pub(crate) bus: EventBus,
    pub(crate) registry: CapabilityRegistry<EndpointTarget>,
    pub(crate) factories: HashMap<PluginId, Arc<dyn PluginFactory>>,
    pub(crate) infos: HashMap<PluginId, PluginInfo>,
    pub(crate) instances: HashMap<PluginId, Arc<dyn Plugin>>,
    pub(crate) load_order: Vec<PluginId>,
    pub(crate) settings: SettingsEngine,
    pub(crate) commands: CommandEngine,
    pub(crate) triggers: TriggerEngine,
    pub(crate) timers: TimerWheel,
    pub(crate) router: NetRouter,
    pub(crate) stack: Vec<EventInvocation>,
    pub(crate) reload_scratch: HashMap<PluginId, PluginSnapshot>,
}

/// Command-history capacity.
const HISTORY_CAP: usize = 50;

impl ProxyCore {
    /// Builds a core over the given settings backend and registers
    /// everything the engine itself owns: boundary events, proxy
    /// settings, built-in endpoints, commands, and the command/trigger
    /// pipeline callbacks.
    #[must_use]
    pub fn new(config: ProxyConfig, backend: Box<dyn SettingsBackend>) -> Self {
        let mut core = Self {
            config,
            bus: EventBus::new(),
            registry: CapabilityRegistry::new(),
            factories: HashMap::new(),
            infos: HashMap::new(),
            instances: HashMap::new(),
            load_order: Vec::new(),
            settings: SettingsEngine::new(backend),
            commands: CommandEngine::new(HISTORY_CAP),
            triggers: TriggerEngine::new(),
            timers: TimerWheel::new(),
            router: NetRouter::new(),
            stack: Vec::new(),
            reload_scratch: HashMap::new(),
        };
        core.bootstrap();
        core
    }

    fn bootstrap(&mut self) {
        self.register_core_events();
        self.register_core_settings();
        self.register_core_endpoints();
        self.register_core_commands();

        // The command engine and trigger engine are pipeline
        // callbacks at priority 1, ahead of plugin callbacks.
        let commands = PluginId::new(ids::COMMANDS);
        let triggers = PluginId::new(ids::TRIGGERS);
        if let Err(err) =
            self.bus
                .register_callback(names::TO_MUD_MODIFY, commands, "check_command", 1)
        {
            tracing::error!(%err, "failed to hook command engine");
        }
        if let Err(err) =
            self.bus
                .register_callback(names::TO_CLIENT_MODIFY, triggers, "check_line", 1)
        {
            tracing::error!(%err, "failed to hook trigger engine");
        }
    }

    fn register_core_events(&mut self) {
        let events: [(&str, &str, &str); 13] = [
            (names::PLUGIN_LOADED, ids::PLUGINM, "a plugin finished loading"),
            (names::PLUGIN_UNLOADED, ids::PLUGINM, "a plugin was unloaded"),
            (names::PLUGIN_SAVE, ids::PLUGINM, "plugins should persist state"),
            (names::PLUGIN_RESET, ids::PLUGINM, "a plugin was reset to defaults"),
            (names::TO_MUD_MODIFY, ids::PROXY, "a client line is open for modification"),
            (names::TO_MUD_READ, ids::PROXY, "client lines were written upstream"),
            (names::TO_CLIENT_MODIFY, ids::PROXY, "a mud line is open for modification"),
            (names::TO_CLIENT_READ, ids::PROXY, "mud lines were delivered to clients"),
            (names::MUD_CONNECTED, ids::PROXY, "the mud link came up"),
            (names::MUD_DISCONNECTED, ids::PROXY, "the mud link went down"),
            (names::CLIENT_CONNECTED, ids::PROXY, "a client socket connected"),
            (names::CLIENT_LOGGED_IN, ids::PROXY, "a client authenticated"),
            (names::CLIENT_DISCONNECTED, ids::PROXY, "a client socket closed"),
        ];
        for (name, creator, description) in events {
            let spec = EventSpec::new(name, PluginId::new(creator), description);
            if let Err(err) = self.bus.register_event(spec) {
                tracing::error!(%err, "core event registration failed");
            }
        }

        // Pseudo-trigger events.
        let triggers = PluginId::new(ids::TRIGGERS);
        for pseudo in [PSEUDO_BEALL, PSEUDO_ALL, PSEUDO_EMPTYLINE] {
            let spec = EventSpec::new(
                self.triggers.pseudo_event(pseudo),
                triggers.clone(),
                format!("pseudo-trigger {pseudo}"),
            )
            .with_arg("line", "the color-stripped line text")
            .with_arg("record", "the shared line record");
            if let Err(err) = self.bus.register_event(spec) {
                tracing::error!(%err, "pseudo-trigger event registration failed");
            }
        }
    }

    fn register_core_settings(&mut self) {
        let proxy = PluginId::new(ids::PROXY);
        let specs = [
            SettingSpec::new(
                "command_prefix",
                SettingType::Str,
                SettingValue::Str("#bp".into()),
                "prefix that marks a client line as a proxy command",
            ),
            SettingSpec::new(
                "command_separator",
                SettingType::Str,
                SettingValue::Str("|".into()),
                "separator splitting one client line into several commands",
            ),
            SettingSpec::new(
                "preamble",
                SettingType::Str,
                SettingValue::Str("#BP:".into()),
                "marker prepended to proxy-generated lines",
            ),
            SettingSpec::new(
                "preamble_color",
                SettingType::Color,
                SettingValue::Str("@C".into()),
                "color of the preamble marker",
            ),
            SettingSpec::new(
                "preamble_error_color",
                SettingType::Color,
                SettingValue::Str("@R".into()),
                "color of the preamble marker on error output",
            ),
            SettingSpec::new(
                "ban_duration",
                SettingType::Duration,
                SettingValue::Duration(600),
                "how long a failed-password ban lasts",
            ),
        ];
        for spec in specs {
            if let Err(err) = self.register_setting(&proxy, spec) {
                tracing::error!(%err, "core setting registration failed");
            }
        }
    }

    fn register_core_endpoints(&mut self) {
        let entries: [(&str, &str, CoreOp, &str); 12] = [
            (ids::EVENTS, "raise", CoreOp::EventRaise, "raise an event"),
            (
                ids::EVENTS,
                "register.event",
                CoreOp::EventRegister,
                "create an event",
            ),
            (
                ids::EVENTS,
                "register.callback",
                CoreOp::CallbackRegister,
                "bind a handler to an event",
            ),
            (
                ids::EVENTS,
                "unregister.callback",
                CoreOp::CallbackUnregister,
                "remove a handler binding",
            ),
            (
                ids::EVENTS,
                "current.record",
                CoreOp::CurrentRecord,
                "the innermost active event record",
            ),
            (ids::EVENTS, "stack", CoreOp::EventStack, "the active event stack"),
            (ids::SETTINGS, "get", CoreOp::SettingGet, "read a setting"),
            (ids::SETTINGS, "set", CoreOp::SettingSet, "write a setting"),
            (ids::TRIGGERS, "toggle", CoreOp::TriggerToggle, "enable or disable a trigger"),
            (
                ids::TRIGGERS,
                "group.toggle",
                CoreOp::TriggerGroupToggle,
                "enable or disable a trigger group",
            ),
            (ids::TIMERS, "toggle", CoreOp::TimerToggle, "enable or disable a timer"),
            (ids::PLUGINM, "list", CoreOp::PluginList, "list known plugins"),
        ];
        for (top, sub, op, description) in entries {
            if let Err(err) = self.registry.add(
                top,
                sub,
                PluginId::new(top),
                EndpointTarget::Core(op),
                description,
                false,
                false,
            ) {
                tracing::error!(%err, "core endpoint registration failed");
            }
        }
    }

    fn register_core_commands(&mut self) {
        let mut add = |owner: &str, spec: CommandSpec, cmd: CoreCommand| {
            self.commands
                .register(PluginId::new(owner), spec, CommandTarget::Core(cmd));
        };

        add(
            ids::COMMANDS,
            CommandSpec::new("list", "")
                .description("list plugins with commands, or one plugin's commands")
                .arg(
                    ArgSpec::new("plugin", ArgType::Str)
                        .default_value(ArgValue::Str(String::new()))
                        .help("plugin to list commands for"),
                ),
            CoreCommand::CommandList,
        );
        add(
            ids::COMMANDS,
            CommandSpec::new("help", "")
                .description("show help for a command")
                .arg(ArgSpec::new("plugin", ArgType::Str).help("plugin identifier"))
                .arg(ArgSpec::new("command", ArgType::Str).help("command name")),
            CoreCommand::CommandHelp,
        );
        add(
            ids::COMMANDS,
            CommandSpec::new("history", "")
                .description("show or clear the command history")
                .no_history()
                .arg(
                    ArgSpec::new("clear", ArgType::Bool)
                        .default_value(ArgValue::Bool(false))
                        .help("clear instead of show"),
                ),
            CoreCommand::History,
        );
        add(
            ids::PLUGINM,
            CommandSpec::new("list", "").description("list known plugins"),
            CoreCommand::PluginList,
        );
        add(
            ids::PLUGINM,
            CommandSpec::new("reload", "")
                .description("hot-reload a plugin, preserving declared state")
                .arg(ArgSpec::new("plugin", ArgType::Str).help("plugin identifier")),
            CoreCommand::PluginReload,
        );
        add(
            ids::PLUGINM,
            CommandSpec::new("reset", "")
                .description("reset a plugin's settings to defaults")
                .arg(ArgSpec::new("plugin", ArgType::Str).help("plugin identifier")),
            CoreCommand::PluginReset,
        );
        add(
            ids::SETTINGS,
            CommandSpec::new("list", "")
                .description("list a plugin's settings")
                .arg(ArgSpec::new("plugin", ArgType::Str).help("plugin identifier")),
            CoreCommand::SettingList,
        );
        add(
            ids::SETTINGS,
            CommandSpec::new("set", "")
                .description("write a setting (\"default\" resets it)")
                .arg(ArgSpec::new("plugin", ArgType::Str).help("plugin identifier"))
                .arg(ArgSpec::new("name", ArgType::Str).help("setting name"))
                .arg(ArgSpec::new("value", ArgType::Str).remainder().help("new value")),
            CoreCommand::SettingSet,
        );
        add(
            ids::TRIGGERS,
            CommandSpec::new("list", "").description("list registered triggers"),
            CoreCommand::TriggerList,
        );
        add(
            ids::TIMERS,
            CommandSpec::new("list", "").description("list registered timers"),
            CoreCommand::TimerList,
        );
        add(
            ids::EVENTS,
            CommandSpec::new("detail", "")
                .description("show an event's registrations and raise stats")
                .arg(ArgSpec::new("event", ArgType::Str).help("event name")),
            CoreCommand::EventDetail,
        );
        add(
            ids::API,
            CommandSpec::new("list", "")
                .description("list capability endpoints")
                .arg(
                    ArgSpec::new("toplevel", ArgType::Str)
                        .default_value(ArgValue::Str(String::new()))
                        .help("restrict to one top-level namespace"),
                ),
            CoreCommand::ApiList,
        );
        add(
            ids::API,
            CommandSpec::new("detail", "")
                .description("show an endpoint's call statistics")
                .arg(ArgSpec::new("name", ArgType::Str).help("fully-qualified endpoint name")),
            CoreCommand::ApiDetail,
        );
        add(
            ids::CLIENTS,
            CommandSpec::new("list", "").description("list connected clients and active bans"),
            CoreCommand::ClientList,
        );
        add(
            ids::CLIENTS,
            CommandSpec::new("ban", "")
                .description("permanently ban a peer address")
                .arg(ArgSpec::new("ip", ArgType::Str).help("peer address to ban")),
            CoreCommand::ClientBan,
        );
        add(
            ids::CLIENTS,
            CommandSpec::new("unban", "")
                .description("lift a ban, temporary or permanent")
                .arg(ArgSpec::new("ip", ArgType::Str).help("peer address to unban")),
            CoreCommand::ClientUnban,
        );
    }

    // ── Small helpers used across the core ───────────────────

    /// An update context carrying the current event stack.
    pub(crate) fn update_ctx(&self, subsystem: &str) -> UpdateContext {
        UpdateContext::new(subsystem).with_event_stack(self.event_stack())
    }

    /// The startup configuration.
    #[must_use]
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Read access to the event table.
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    /// Read access to the command engine.
    #[must_use]
    pub fn command_engine(&self) -> &CommandEngine {
        &self.commands
    }

    /// Read access to the trigger table.
    #[must_use]
    pub fn trigger_engine(&self) -> &TriggerEngine {
        &self.triggers
    }

    /// Read access to the timer table.
    #[must_use]
    pub fn timer_wheel(&self) -> &TimerWheel {
        &self.timers
    }

    /// Read access to the connection router.
    #[must_use]
    pub fn net_router(&self) -> &NetRouter {
        &self.router
    }

    fn proxy_setting(&self, name: &str, fallback: &str) -> String {
        self.settings
            .get(&PluginId::new(ids::PROXY), name)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| fallback.to_string())
    }

    /// The live command prefix.
    #[must_use]
    pub fn command_prefix(&self) -> String {
        self.proxy_setting("command_prefix", "#bp")
    }

    /// The live command separator.
    #[must_use]
    pub fn command_separator(&self) -> String {
        self.proxy_setting("command_separator", "|")
    }

    /// The colored preamble marker for internal lines.
    #[must_use]
    pub fn formatted_preamble(&self) -> String {
        format!(
            "{}{}@.",
            self.proxy_setting("preamble_color", "@C"),
            self.proxy_setting("preamble", "#BP:")
        )
    }

    /// Registers a setting and (unless hidden) creates its change
    /// event.
    pub(crate) fn register_setting(
        &mut self,
        owner: &PluginId,
        spec: SettingSpec,
    ) -> Result<(), CoreError> {
        let event_name = names::setting_modified(owner.as_str(), &spec.name);
        let hidden = spec.hidden;
        let description = format!("setting {} of {owner} changed", spec.name);
        self.settings.register(owner, spec)?;
        if !hidden && !self.bus.has_event(&event_name) {
            let spec = EventSpec::new(event_name, owner.clone(), description)
                .with_arg("var", "the setting name")
                .with_arg("oldvalue", "value before the write")
                .with_arg("newvalue", "value after the write");
            if let Err(err) = self.bus.register_event(spec) {
                tracing::warn!(%err, "setting change event registration failed");
            }
        }
        Ok(())
    }

    /// Emits internal message lines to a client target.
    pub(crate) fn deliver_internal(
        &mut self,
        messages: Vec<String>,
        target: ClientTarget,
        error: bool,
        preamble: bool,
        actor: &str,
    ) -> Result<(), CoreError> {
        if messages.is_empty() {
            return Ok(());
        }
        let ctx = self.update_ctx(actor);
        let error_color = self.proxy_setting("preamble_error_color", "@R");

        let mut container = RecordContainer::new(TextOrigin::Internal);
        for message in messages {
            let mut record = LineRecord::internal(message);
            if !preamble {
                let _ = record.set_preamble(false, &ctx);
            }
            if error {
                let _ = record.set_color(Some(error_color.clone()), &ctx);
            }
            container.append_record(record, &ctx);
        }
        SendMudToClient {
            container,
            actor: actor.to_string(),
            target,
        }
        .execute(self)
    }

    /// Emits prelogin lines (banner, password prompt) to one client.
    pub(crate) fn deliver_prelogin(
        &mut self,
        messages: Vec<(String, bool)>,
        target: ClientTarget,
        actor: &str,
    ) -> Result<(), CoreError> {
        let ctx = self.update_ctx(actor);
        let mut container = RecordContainer::new(TextOrigin::Internal);
        for (message, is_prompt) in messages {
            let mut record = LineRecord::internal(message);
            let _ = record.set_prelogin(true, &ctx);
            if is_prompt {
                let _ = record.set_prompt(true, &ctx);
            }
            container.append_record(record, &ctx);
        }
        SendMudToClient {
            container,
            actor: actor.to_string(),
            target,
        }
        .execute(self)
    }
}

impl CoreApi for ProxyCore {
    fn register_event(&mut self, spec: EventSpec) -> Result<(), CoreError> {
        self.bus.register_event(spec).map_err(CoreError::from)
    }

    fn register_callback(
        &mut self,
        event: &str,
        owner: &PluginId,
        handler: &str,
        priority: i32,
    ) -> Result<bool, CoreError> {
        let event = event.replace("{plugin_id}", owner.as_str());
        self.bus
            .register_callback(&event, owner.clone(), handler, priority)
            .map_err(CoreError::from)
    }

    fn unregister_callback(
        &mut self,
        event: &str,
        owner: &PluginId,
        handler: &str,
    ) -> Result<bool, CoreError> {
        let event = event.replace("{plugin_id}", owner.as_str());
        self.bus
            .unregister_callback(&event, owner, handler)
            .map_err(CoreError::from)
    }

    fn raise_event(
        &mut self,
        event: &str,
        data: EventDataRecord,
        actor: &str,
    ) -> Result<SharedEventData, CoreError> {
        self.raise_event_record(event, data, actor)
    }

    fn current_event_record(&self) -> Option<SharedEventData> {
        self.stack.last().map(|inv| inv.data.clone())
    }

    fn event_stack(&self) -> Vec<String> {
        self.stack.iter().map(|inv| inv.event_name.clone()).collect()
    }

    fn call(
        &mut self,
        full_name: &str,
        caller: &PluginId,
        args: Value,
    ) -> Result<Value, CoreError> {
        self.call_endpoint_target(full_name, caller, args)
    }

    fn has_endpoint(&self, full_name: &str) -> bool {
        self.registry.has(full_name)
    }

    fn list_endpoints(&self, top_level: Option<&str>) -> Vec<String> {
        self.registry.list(top_level)
    }

    fn endpoint_detail(&self, full_name: &str) -> Option<CapabilityDetail> {
        self.registry.detail(full_name, 5)
    }

    fn setting_get(&self, plugin: &PluginId, name: &str) -> Result<SettingValue, CoreError> {
        self.settings.get(plugin, name)
    }

    fn setting_set(
        &mut self,
        plugin: &PluginId,
        name: &str,
        raw: &str,
        actor: &str,
    ) -> Result<(), CoreError> {
        self.apply_setting(plugin, name, raw, actor).map(|_| ())
    }

    fn register_setting_validator(
        &mut self,
        type_name: &'static str,
        validator: mudmux_plugin::SettingValidator,
    ) {
        self.settings.register_validator(type_name, validator);
    }

    fn add_timer(&mut self, owner: &PluginId, spec: TimerSpec) -> Result<(), CoreError> {
        self.timers.add(owner, spec, chrono::Utc::now())
    }

    fn remove_timer(&mut self, owner: &PluginId, name: &str) -> bool {
        self.timers.remove(owner, name)
    }

    fn set_timer_enabled(
        &mut self,
        owner: &PluginId,
        name: &str,
        enabled: bool,
    ) -> Result<(), CoreError> {
        self.timers
            .set_enabled(owner, name, enabled, chrono::Utc::now())
    }

    fn add_trigger(&mut self, owner: &PluginId, spec: TriggerSpec) -> Result<String, CoreError> {
        let event_name = self.triggers.add(owner, spec)?;
        if !self.bus.has_event(&event_name) {
            let spec = EventSpec::new(event_name.clone(), owner.clone(), "trigger match")
                .with_arg("trigger_name", "the matched trigger")
                .with_arg("line", "the color-stripped line")
                .with_arg("record", "the shared line record");
            if let Err(err) = self.bus.register_event(spec) {
                tracing::warn!(%err, "trigger event registration failed");
            }
        }
        Ok(event_name)
    }

    fn remove_trigger(&mut self, owner: &PluginId, name: &str) -> Result<(), CoreError> {
        self.triggers.remove(owner, name)
    }

    fn set_trigger_enabled(
        &mut self,
        owner: &PluginId,
        name: &str,
        enabled: bool,
    ) -> Result<(), CoreError> {
        self.triggers.set_enabled(owner, name, enabled)
    }

    fn set_trigger_group_enabled(&mut self, group: &str, enabled: bool) -> usize {
        self.triggers.set_group_enabled(group, enabled)
    }

    fn send_to_mud(&mut self, lines: Vec<String>, actor: &str) -> Result<(), CoreError> {
        if !self.router.mud_connected() {
            return Err(CoreError::MudNotConnected);
        }
        let ctx = self.update_ctx(actor);
        let mut container = RecordContainer::new(TextOrigin::Internal);
        for text in lines {
            let mut record = LineRecord::internal(text);
            let _ = record.set_preamble(false, &ctx);
            container.append_record(record, &ctx);
        }
        SendClientToMud {
            container,
            actor: actor.to_string(),
        }
        .execute(self)
    }

    fn process_to_mud(&mut self, lines: Vec<String>, actor: &str) -> Result<(), CoreError> {
        if !self.router.mud_connected() {
            return Err(CoreError::MudNotConnected);
        }
        // Process-path lines take the direction's origin so the
        // modify event (and the command engine) see them.
        let container = RecordContainer::from_texts(TextOrigin::Client, lines);
        ProcessClientToMud {
            container,
            actor: actor.to_string(),
            source: None,
        }
        .execute(self)
    }

    fn send_to_clients(
        &mut self,
        lines: Vec<String>,
        target: ClientTarget,
        actor: &str,
    ) -> Result<(), CoreError> {
        self.deliver_internal(lines, target, false, true, actor)
    }

    fn process_to_clients(&mut self, lines: Vec<String>, actor: &str) -> Result<(), CoreError> {
        let container = RecordContainer::from_texts(TextOrigin::Mud, lines);
        crate::pipeline::ProcessMudToClient {
            container,
            actor: actor.to_string(),
        }
        .execute(self)
    }

    fn plugin_ids(&self) -> Vec<PluginId> {
        let mut ids: Vec<PluginId> = self.infos.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn plugin_info(&self, id: &PluginId) -> Option<PluginInfo> {
        self.infos.get(id).cloned()
    }

    fn is_loaded(&self, id: &PluginId) -> bool {
        self.infos.get(id).is_some_and(PluginInfo::is_loaded)
    }
}

/// Builds a client→mud processing record for raw client input.
impl ProxyCore {
    /// Splits raw client input on the live separator and runs it
    /// through the full client→mud pipeline.
    pub fn handle_client_input(
        &mut self,
        input: &str,
        source: Option<mudmux_types::ClientId>,
    ) -> Result<(), CoreError> {
        let separator = self.command_separator();
        let container = client_input_container(input, &separator);
        let actor = source
            .map(|id| format!("client:{id}"))
            .unwrap_or_else(|| "client".to_string());
        ProcessClientToMud {
            container,
            actor,
            source: source.map(|id| {
                serde_json::to_string(&id).unwrap_or_default().trim_matches('"').to_string()
            }),
        }
        .execute(self)
    }
}
