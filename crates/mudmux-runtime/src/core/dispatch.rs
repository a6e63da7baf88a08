//! Event dispatch, capability invocation, and the engine's own
//! pipeline callbacks.

use super::{CoreOp, EndpointTarget, ProxyCore};
use crate::commands::{
    parse_args, split_invocation, tokenize, usage, CommandTarget, CoreCommand, FuzzyResult,
    PluginResolution, RegisteredCommand,
};
use crate::triggers::{PSEUDO_ALL, PSEUDO_BEALL, PSEUDO_EMPTYLINE};
use mudmux_event::{
    names, CallbackRef, EventDataRecord, EventError, EventInvocation, SharedEventData,
};
use mudmux_plugin::{CommandArgs, CommandOutcome, CoreApi, CoreError};
use mudmux_record::SharedLine;
use mudmux_types::{ClientId, ClientTarget, LineKind, PluginId, TextOrigin};
use serde_json::{json, Value};

impl ProxyCore {
    // ── Event dispatch ───────────────────────────────────────

    /// Raises an event: pushes an invocation, runs dispatch passes,
    /// pops, and records the raise in the event's history ring.
    pub fn raise_event_record(
        &mut self,
        event: &str,
        data: EventDataRecord,
        actor: &str,
    ) -> Result<SharedEventData, CoreError> {
        if !self.bus.has_event(event) {
            return Err(EventError::UnknownEvent(event.to_string()).into());
        }
        let shared = data.shared();
        self.stack
            .push(EventInvocation::new(event, actor, shared.clone()));
        self.run_passes(event);
        self.finish_invocation(event);
        Ok(shared)
    }

    /// Raises an event once per line: the same invocation record is
    /// reused, with the `key` field rebound and per-callback executed
    /// flags cleared for each line.
    pub(crate) fn raise_for_lines(
        &mut self,
        event: &str,
        data: EventDataRecord,
        actor: &str,
        lines: Vec<SharedLine>,
        key: &str,
    ) -> Result<SharedEventData, CoreError> {
        if !self.bus.has_event(event) {
            return Err(EventError::UnknownEvent(event.to_string()).into());
        }
        let shared = data.shared();
        self.stack
            .push(EventInvocation::new(event, actor, shared.clone()));

        for line in lines {
            shared.lock().set(key, line);
            if let Some(top) = self.stack.last_mut() {
                top.executed.clear();
            }
            self.run_passes(event);
        }

        self.finish_invocation(event);
        Ok(shared)
    }

    /// The pass loop: scan priority buckets ascending, run every
    /// not-yet-executed callback, restart until a full scan finds
    /// nothing. Callbacks registered mid-dispatch join the next pass.
    fn run_passes(&mut self, event: &str) {
        loop {
            if let Some(top) = self.stack.last_mut() {
                top.passes += 1;
            }
            let executed = self
                .stack
                .last()
                .map(|top| top.executed.clone())
                .unwrap_or_default();

            let pending: Vec<CallbackRef> = self
                .bus
                .ordered_callbacks(event)
                .into_iter()
                .map(|(_, cb)| cb)
                .filter(|cb| !executed.contains(cb))
                .collect();
            if pending.is_empty() {
                break;
            }

            for cb in pending {
                if let Some(top) = self.stack.last_mut() {
                    top.executed.insert(cb.clone());
                    top.current_callback = Some(cb.clone());
                    top.callbacks_run += 1;
                }
                self.invoke_callback(event, &cb);
                if let Some(top) = self.stack.last_mut() {
                    top.current_callback = None;
                }
            }
        }
    }

    fn finish_invocation(&mut self, event: &str) {
        let Some(invocation) = self.stack.pop() else {
            return;
        };
        if invocation.passes > 2 {
            tracing::warn!(
                event,
                passes = invocation.passes,
                "callbacks were registered during dispatch"
            );
        }
        if let Some(ev) = self.bus.get_mut(event) {
            ev.note_raise(invocation.summarize());
        }
    }

    fn invoke_callback(&mut self, event: &str, cb: &CallbackRef) {
        if let Some(instance) = self.instances.get(&cb.owner).cloned() {
            if let Err(err) = instance.handle_event(&cb.handler, self) {
                tracing::warn!(
                    event,
                    owner = %cb.owner,
                    handler = %cb.handler,
                    %err,
                    "event callback faulted"
                );
            }
            return;
        }

        // Engine-owned pipeline callbacks.
        match (cb.owner.as_str(), cb.handler.as_str()) {
            (crate::ids::COMMANDS, "check_command") => {
                if let Err(err) = self.command_check() {
                    tracing::warn!(%err, "command engine fault");
                }
            }
            (crate::ids::TRIGGERS, "check_line") => {
                if let Err(err) = self.trigger_check() {
                    tracing::warn!(%err, "trigger engine fault");
                }
            }
            _ => {
                tracing::debug!(owner = %cb.owner, handler = %cb.handler, "callback owner not loaded, skipping");
            }
        }
    }

    // ── Timer firing ─────────────────────────────────────────

    /// Fires every timer due at `now`, synchronously on the
    /// dispatcher. Plugin timers route through `fire_timer`;
    /// engine-owned timers (ban expiry) are handled in-core. A
    /// faulting timer function is logged and the schedule continues.
    pub fn run_due_timers(&mut self, now: chrono::DateTime<chrono::Utc>) {
        let fires = self.timers.due(now);
        for fire in fires {
            if fire.log {
                tracing::debug!(owner = %fire.owner, timer = %fire.name, "timer fired");
            }
            if let Some(instance) = self.instances.get(&fire.owner).cloned() {
                if let Err(err) = instance.fire_timer(&fire.handler, self) {
                    tracing::warn!(
                        owner = %fire.owner,
                        timer = %fire.name,
                        %err,
                        "timer function faulted"
                    );
                }
            } else if !self.fire_core_timer(&fire.owner, &fire.handler) {
                tracing::debug!(owner = %fire.owner, timer = %fire.name, "timer owner not loaded");
            }
        }
    }

    /// Runs an engine-owned timer; returns whether the handler was
    /// recognized.
    fn fire_core_timer(&mut self, owner: &PluginId, handler: &str) -> bool {
        if owner.as_str() != crate::ids::PROXY {
            return false;
        }
        let Some(ip) = handler.strip_prefix("ban_expire:") else {
            return false;
        };
        match ip.parse::<std::net::IpAddr>() {
            Ok(ip) => {
                if self.router.unban(ip) {
                    tracing::info!(%ip, "failed-password ban expired");
                }
            }
            Err(err) => tracing::warn!(handler, %err, "malformed ban expiry timer"),
        }
        true
    }

    // ── Capability invocation ────────────────────────────────

    /// Resolves an endpoint (recording caller stats) and invokes it.
    pub(crate) fn call_endpoint_target(
        &mut self,
        full_name: &str,
        caller: &PluginId,
        args: Value,
    ) -> Result<Value, CoreError> {
        let target = self
            .registry
            .resolve(full_name, caller.as_str())?
            .clone();
        match target {
            EndpointTarget::Plugin { owner, handler } => {
                let instance = self
                    .instances
                    .get(&owner)
                    .cloned()
                    .ok_or_else(|| CoreError::UnknownPlugin(owner.clone()))?;
                Ok(instance.call_endpoint(&handler, self, args)?)
            }
            EndpointTarget::Core(op) => self.run_core_op(op, caller, args),
        }
    }

    fn run_core_op(
        &mut self,
        op: CoreOp,
        caller: &PluginId,
        args: Value,
    ) -> Result<Value, CoreError> {
        let str_arg = |key: &str| -> String {
            args.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let bool_arg =
            |key: &str| -> bool { args.get(key).and_then(Value::as_bool).unwrap_or(true) };

        match op {
            CoreOp::EventRaise => {
                let event = str_arg("event");
                let mut data = EventDataRecord::new(&event);
                if let Some(map) = args.get("data").and_then(Value::as_object) {
                    for (key, value) in map {
                        data.set(key.clone(), value.clone());
                    }
                }
                self.raise_event_record(&event, data, caller.as_str())?;
                Ok(json!({ "event": event, "raised": true }))
            }
            CoreOp::EventRegister => {
                let spec = mudmux_event::EventSpec::new(
                    str_arg("event"),
                    caller.clone(),
                    str_arg("description"),
                );
                self.register_event(spec)?;
                Ok(Value::Bool(true))
            }
            CoreOp::CallbackRegister => {
                let priority = args
                    .get("priority")
                    .and_then(Value::as_i64)
                    .unwrap_or(i64::from(mudmux_event::DEFAULT_PRIORITY));
                let added = self.register_callback(
                    &str_arg("event"),
                    caller,
                    &str_arg("handler"),
                    priority as i32,
                )?;
                Ok(Value::Bool(added))
            }
            CoreOp::CallbackUnregister => {
                let removed =
                    self.unregister_callback(&str_arg("event"), caller, &str_arg("handler"))?;
                Ok(Value::Bool(removed))
            }
            CoreOp::CurrentRecord => match self.current_event_record() {
                Some(record) => {
                    let r = record.lock();
                    Ok(json!({
                        "event": r.event(),
                        "keys": r.keys().collect::<Vec<_>>(),
                    }))
                }
                None => Ok(Value::Null),
            },
            CoreOp::EventStack => Ok(json!(self.event_stack())),
            CoreOp::SettingGet => {
                let plugin = PluginId::new(str_arg("plugin"));
                let value = self.settings.get(&plugin, &str_arg("name"))?;
                Ok(json!(value))
            }
            CoreOp::SettingSet => {
                let plugin = PluginId::new(str_arg("plugin"));
                self.apply_setting(&plugin, &str_arg("name"), &str_arg("value"), caller.as_str())?;
                Ok(Value::Bool(true))
            }
            CoreOp::TriggerToggle => {
                self.triggers
                    .set_enabled(caller, &str_arg("name"), bool_arg("enabled"))?;
                Ok(Value::Bool(true))
            }
            CoreOp::TriggerGroupToggle => {
                let touched = self
                    .triggers
                    .set_group_enabled(&str_arg("group"), bool_arg("enabled"));
                Ok(json!(touched))
            }
            CoreOp::TimerToggle => {
                self.timers.set_enabled(
                    caller,
                    &str_arg("name"),
                    bool_arg("enabled"),
                    chrono::Utc::now(),
                )?;
                Ok(Value::Bool(true))
            }
            CoreOp::PluginList => {
                let ids: Vec<String> = self
                    .plugin_ids()
                    .into_iter()
                    .map(|id| id.as_str().to_string())
                    .collect();
                Ok(json!(ids))
            }
        }
    }

    // ── Settings write path ──────────────────────────────────

    /// Writes a setting and raises its change event (unless hidden).
    /// Returns the user-facing confirmation lines.
    pub(crate) fn apply_setting(
        &mut self,
        plugin: &PluginId,
        name: &str,
        raw: &str,
        actor: &str,
    ) -> Result<Vec<String>, CoreError> {
        let change = self.settings.set(plugin, name, raw)?;

        if !change.hidden {
            let event = names::setting_modified(plugin.as_str(), name);
            if self.bus.has_event(&event) {
                let data = EventDataRecord::new(&event)
                    .with("var", change.name.as_str())
                    .with("oldvalue", change.old.to_string())
                    .with("newvalue", change.new.to_string());
                self.raise_event_record(&event, data, actor)?;
            }
        }

        let mut messages = vec![format!(
            "{}.{} is now {}",
            plugin.as_str(),
            change.name,
            change.new
        )];
        if let Some(after) = change.after_set_message {
            messages.push(after);
        }
        Ok(messages)
    }

    // ── The trigger pipeline callback ────────────────────────

    /// Checks the current to-client line against the trigger table:
    /// `beall`, then real triggers (or `emptyline`), then `all`.
    pub(crate) fn trigger_check(&mut self) -> Result<(), CoreError> {
        let Some(record) = self.current_event_record() else {
            return Ok(());
        };
        let Some(line) = record.lock().get_line(names::LINE_KEY) else {
            return Ok(());
        };

        let (origin, kind, plain, colored) = {
            let l = line.lock();
            (l.origin(), l.kind(), l.noansi(), l.colorcoded())
        };
        if kind != LineKind::Io || origin == TextOrigin::Internal {
            return Ok(());
        }

        self.raise_pseudo(PSEUDO_BEALL, &plain, &line)?;

        if plain.is_empty() {
            self.raise_pseudo(PSEUDO_EMPTYLINE, &plain, &line)?;
        } else {
            let plan = self.triggers.scan(&plain, &colored);
            for fire in plan {
                let mut data = EventDataRecord::new(&fire.event_name);
                data.set("trigger_name", fire.trigger_name.as_str());
                data.set("trigger_id", fire.trigger_id.as_str());
                data.set(names::LINE_KEY, plain.as_str());
                data.set("colorline", colored.as_str());
                data.set("record", line.clone());
                for (group, value) in &fire.matches {
                    match value {
                        crate::triggers::GroupValue::Str(s) => data.set(group.clone(), s.as_str()),
                        crate::triggers::GroupValue::Int(i) => data.set(group.clone(), *i),
                        crate::triggers::GroupValue::Bool(b) => data.set(group.clone(), *b),
                    }
                }

                self.raise_event_record(&fire.event_name, data, crate::ids::TRIGGERS)?;

                if fire.omit {
                    let ctx = self.update_ctx(crate::ids::TRIGGERS);
                    let _ = line.lock().set_send(false, &ctx);
                }
            }
        }

        self.raise_pseudo(PSEUDO_ALL, &plain, &line)?;
        Ok(())
    }

    fn raise_pseudo(&mut self, pseudo: &str, plain: &str, line: &SharedLine) -> Result<(), CoreError> {
        let event = self.triggers.pseudo_event(pseudo);
        let data = EventDataRecord::new(&event)
            .with("trigger_name", pseudo)
            .with(names::LINE_KEY, plain)
            .with("record", line.clone());
        self.raise_event_record(&event, data, crate::ids::TRIGGERS)?;
        Ok(())
    }

    // ── The command pipeline callback ────────────────────────

    /// Intercepts to-mud lines starting with the command prefix.
    pub(crate) fn command_check(&mut self) -> Result<(), CoreError> {
        let Some(record) = self.current_event_record() else {
            return Ok(());
        };
        let (line, client) = {
            let r = record.lock();
            (
                r.get_line(names::LINE_KEY),
                r.get_str("client").and_then(client_from_str),
            )
        };
        let Some(line) = line else {
            return Ok(());
        };

        let text = line.lock().text().to_string();
        let prefix = self.command_prefix();
        if !text.starts_with(&prefix) {
            return Ok(());
        }

        // Command lines never reach the mud, valid or not.
        let ctx = self.update_ctx(crate::ids::COMMANDS);
        let _ = line.lock().set_send(false, &ctx);

        let target = client.map_or(ClientTarget::All, ClientTarget::Only);
        self.execute_command_line(&text, &prefix, target, false);
        Ok(())
    }

    /// Parses and runs one command line, delivering output to
    /// `target`.
    pub(crate) fn execute_command_line(
        &mut self,
        text: &str,
        prefix: &str,
        target: ClientTarget,
        from_rerun: bool,
    ) {
        let rest = text[prefix.len()..].trim_start_matches('.');

        // `<prefix>.!` reruns a history entry by offset.
        if let Some(tail) = rest.strip_prefix('!') {
            if from_rerun {
                self.command_error(vec!["history rerun cannot recurse".into()], target);
                return;
            }
            let offset = tail
                .trim()
                .trim_start_matches('-')
                .parse::<usize>()
                .unwrap_or(1)
                .max(1);
            let Some(recalled) = self.commands.history.recall(offset).map(String::from) else {
                self.command_error(
                    vec![format!("no history entry at offset {offset}")],
                    target,
                );
                return;
            };
            self.execute_command_line(&recalled, prefix, target, true);
            return;
        }

        let Some(invocation) = split_invocation(rest) else {
            self.command_error(vec![format!("usage: {prefix}.<plugin>.<command> [args]")], target);
            return;
        };

        let owner = match self.commands.resolve_plugin(&invocation.plugin_path) {
            PluginResolution::Match(owner) => owner,
            PluginResolution::Ambiguous(owners) => {
                let mut messages =
                    vec![format!("'{}' matches several plugins:", invocation.plugin_path)];
                messages.extend(owners.iter().map(|id| format!("  {id}")));
                self.command_error(messages, target);
                return;
            }
            PluginResolution::None => {
                self.command_error(
                    vec![format!("no plugin matches '{}'", invocation.plugin_path)],
                    target,
                );
                return;
            }
        };

        // A bare plugin identifier lists that plugin's commands.
        if invocation.command.is_empty() {
            let messages = self.format_command_list(&owner);
            self.command_output(messages, target, true);
            return;
        }

        let command_name = match self.commands.resolve_command(&owner, &invocation.command) {
            FuzzyResult::Match(name) => name,
            FuzzyResult::Ambiguous(names) => {
                let mut messages = vec![format!(
                    "'{}' matches several commands of {owner}:",
                    invocation.command
                )];
                messages.extend(names.iter().map(|name| format!("  {name}")));
                self.command_error(messages, target);
                return;
            }
            FuzzyResult::None => {
                self.command_error(
                    vec![format!("{owner} has no command matching '{}'", invocation.command)],
                    target,
                );
                return;
            }
        };

        let Some(registered) = self.commands.get(&owner, &command_name).cloned() else {
            return;
        };

        let tokens = tokenize(&invocation.tail);
        let args = match parse_args(&registered.spec.args, &tokens) {
            Ok(args) => args,
            Err(err) => {
                let mut messages = vec![err.to_string()];
                messages.extend(usage(
                    owner.short_name(),
                    &command_name,
                    &registered.spec.description,
                    &registered.spec.args,
                ));
                self.command_error(messages, target);
                return;
            }
        };

        let outcome = self.run_command_target(&registered, &args, &target);
        match outcome {
            Ok(outcome) => {
                if registered.spec.show_in_history && !from_rerun {
                    self.commands.history.push(text);
                }
                let messages = if registered.spec.format {
                    outcome.messages
                } else {
                    // Unformatted commands deliver their text
                    // verbatim; escape the color-code marker.
                    outcome
                        .messages
                        .into_iter()
                        .map(|m| m.replace('@', "@@"))
                        .collect()
                };
                if outcome.success {
                    self.command_output(messages, target, registered.spec.preamble);
                } else {
                    self.command_error(messages, target);
                }
            }
            Err(err) => {
                tracing::warn!(owner = %owner, command = %command_name, %err, "command faulted");
                self.command_error(vec![format!("{command_name}: {err}")], target);
            }
        }
    }

    fn run_command_target(
        &mut self,
        registered: &RegisteredCommand,
        args: &CommandArgs,
        target: &ClientTarget,
    ) -> Result<CommandOutcome, CoreError> {
        match &registered.target {
            CommandTarget::Plugin { handler } => {
                let instance = self
                    .instances
                    .get(&registered.owner)
                    .cloned()
                    .ok_or_else(|| CoreError::UnknownPlugin(registered.owner.clone()))?;
                Ok(instance.run_command(handler, self, args)?)
            }
            CommandTarget::Core(core_cmd) => self.run_core_command(*core_cmd, args, target),
        }
    }

    fn command_output(&mut self, messages: Vec<String>, target: ClientTarget, preamble: bool) {
        if let Err(err) =
            self.deliver_internal(messages, target, false, preamble, crate::ids::COMMANDS)
        {
            tracing::warn!(%err, "command output delivery failed");
        }
    }

    fn command_error(&mut self, messages: Vec<String>, target: ClientTarget) {
        if let Err(err) =
            self.deliver_internal(messages, target, true, true, crate::ids::COMMANDS)
        {
            tracing::warn!(%err, "command error delivery failed");
        }
    }

    // ── Built-in command implementations ─────────────────────

    fn run_core_command(
        &mut self,
        command: CoreCommand,
        args: &CommandArgs,
        _target: &ClientTarget,
    ) -> Result<CommandOutcome, CoreError> {
        let str_arg = |key: &str| -> String {
            args.get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };

        match command {
            CoreCommand::PluginList => {
                let mut messages = vec!["known plugins:".to_string()];
                for id in self.plugin_ids() {
                    if let Some(info) = self.infos.get(&id) {
                        messages.push(format!(
                            "  {:<32} {:<20} v{:<3} {}",
                            id.as_str(),
                            info.meta.name,
                            info.meta.version,
                            info.state
                        ));
                    }
                }
                Ok(CommandOutcome::ok(messages))
            }
            CoreCommand::PluginReload => {
                let plugin = self.resolve_plugin_arg(&str_arg("plugin"))?;
                self.reload_plugin(&plugin)?;
                Ok(CommandOutcome::ok([format!("{plugin} reloaded")]))
            }
            CoreCommand::PluginReset => {
                let plugin = self.resolve_plugin_arg(&str_arg("plugin"))?;
                let reset = self.reset_plugin_settings(&plugin)?;
                Ok(CommandOutcome::ok([format!(
                    "{plugin}: {reset} settings reset to defaults"
                )]))
            }
            CoreCommand::CommandList => {
                let plugin = str_arg("plugin");
                if plugin.is_empty() {
                    let mut messages = vec!["plugins with commands:".to_string()];
                    for owner in self.commands.owners() {
                        messages.push(format!(
                            "  {:<32} {} commands",
                            owner.as_str(),
                            self.commands.list(owner).len()
                        ));
                    }
                    Ok(CommandOutcome::ok(messages))
                } else {
                    let owner = self.resolve_plugin_arg(&plugin)?;
                    Ok(CommandOutcome::ok(self.format_command_list(&owner)))
                }
            }
            CoreCommand::CommandHelp => {
                let owner = self.resolve_plugin_arg(&str_arg("plugin"))?;
                let command = str_arg("command");
                match self.commands.resolve_command(&owner, &command) {
                    FuzzyResult::Match(name) => {
                        let registered = self
                            .commands
                            .get(&owner, &name)
                            .expect("resolved name exists");
                        Ok(CommandOutcome::ok(usage(
                            owner.short_name(),
                            &name,
                            &registered.spec.description,
                            &registered.spec.args,
                        )))
                    }
                    _ => Ok(CommandOutcome::fail([format!(
                        "{owner} has no command matching '{command}'"
                    )])),
                }
            }
            CoreCommand::History => {
                if args.get("clear").and_then(|v| v.as_bool()).unwrap_or(false) {
                    self.commands.history.clear();
                    return Ok(CommandOutcome::ok(["history cleared".to_string()]));
                }
                let mut messages = vec!["command history (most recent last):".to_string()];
                for (n, entry) in self.commands.history.entries().enumerate() {
                    messages.push(format!("  {:>3}  {entry}", n + 1));
                }
                Ok(CommandOutcome::ok(messages))
            }
            CoreCommand::SettingList => {
                let plugin = self.resolve_plugin_arg_settings(&str_arg("plugin"))?;
                let mut messages = vec![format!("settings of {plugin}:")];
                for (spec, value) in self.settings.list(&plugin) {
                    let ro = if spec.readonly { " [readonly]" } else { "" };
                    messages.push(format!(
                        "  {:<24} = {:<16} ({}){ro}  {}",
                        spec.name, value, spec.setting_type, spec.help
                    ));
                }
                Ok(CommandOutcome::ok(messages))
            }
            CoreCommand::SettingSet => {
                let plugin = self.resolve_plugin_arg_settings(&str_arg("plugin"))?;
                let name = str_arg("name");
                let value = str_arg("value");
                match self.apply_setting(&plugin, &name, &value, crate::ids::SETTINGS) {
                    Ok(messages) => Ok(CommandOutcome::ok(messages)),
                    Err(err) => Ok(CommandOutcome::fail([err.to_string()])),
                }
            }
            CoreCommand::TriggerList => {
                let mut messages = vec![format!(
                    "{:<24} {:<28} {:<8} {:<6} id",
                    "name", "owner", "enabled", "hits"
                )];
                for trigger in self.triggers.list() {
                    messages.push(format!(
                        "{:<24} {:<28} {:<8} {:<6} {}",
                        trigger.name,
                        trigger.owner.as_str(),
                        trigger.enabled,
                        trigger.hits,
                        trigger.id
                    ));
                }
                Ok(CommandOutcome::ok(messages))
            }
            CoreCommand::TimerList => {
                let mut messages = vec![format!(
                    "{:<20} {:<28} {:<8} {:<6} next fire",
                    "name", "owner", "enabled", "fired"
                )];
                for timer in self.timers.list() {
                    messages.push(format!(
                        "{:<20} {:<28} {:<8} {:<6} {}",
                        timer.name,
                        timer.owner.as_str(),
                        timer.enabled,
                        timer.raised_count,
                        timer.next_fire.format("%H:%M:%S")
                    ));
                }
                Ok(CommandOutcome::ok(messages))
            }
            CoreCommand::EventDetail => {
                let event = str_arg("event");
                let Some(ev) = self.bus.get(&event) else {
                    return Ok(CommandOutcome::fail([format!("unknown event '{event}'")]));
                };
                let mut messages = vec![
                    format!("event       : {event}"),
                    format!("created by  : {}", ev.spec().creator),
                    format!("description : {}", ev.spec().description),
                    format!("raised      : {} times", ev.raise_count()),
                    format!("history     : {} retained raises", ev.history().len()),
                ];
                if ev.is_empty() {
                    messages.push("no callbacks registered".to_string());
                } else {
                    messages.push("callbacks:".to_string());
                    for (priority, cb) in ev.ordered_callbacks() {
                        messages.push(format!(
                            "  prio {:<4} {} :: {}",
                            priority, cb.owner, cb.handler
                        ));
                    }
                }
                Ok(CommandOutcome::ok(messages))
            }
            CoreCommand::ApiList => {
                let top = str_arg("toplevel");
                let filter = if top.is_empty() { None } else { Some(top.as_str()) };
                let mut messages = vec!["capability endpoints:".to_string()];
                messages.extend(
                    self.registry
                        .list(filter)
                        .into_iter()
                        .map(|name| format!("  {name}")),
                );
                Ok(CommandOutcome::ok(messages))
            }
            CoreCommand::ClientList => {
                let mut messages = vec!["connected clients:".to_string()];
                for client in self.router.clients() {
                    let mode = if client.view_only {
                        "view-only"
                    } else if client.logged_in {
                        "logged in"
                    } else {
                        "at password"
                    };
                    messages.push(format!(
                        "  {:<22} {:<10} since {}",
                        client.addr,
                        mode,
                        client.connected_at.format("%H:%M:%S")
                    ));
                }
                let bans = self.router.bans();
                if !bans.is_empty() {
                    messages.push("active bans:".to_string());
                    for (ip, kind) in bans {
                        let label = match kind {
                            crate::net::BanKind::Temporary => "temporary",
                            crate::net::BanKind::Permanent => "permanent",
                        };
                        messages.push(format!("  {ip:<22} {label}"));
                    }
                }
                Ok(CommandOutcome::ok(messages))
            }
            CoreCommand::ClientBan => {
                let raw = str_arg("ip");
                let Ok(ip) = raw.parse::<std::net::IpAddr>() else {
                    return Ok(CommandOutcome::fail([format!(
                        "{raw:?} is not an address"
                    )]));
                };
                self.router.ban_permanently(ip);
                // An expiry timer from an earlier automatic ban must
                // not lift this one later.
                let proxy = PluginId::new(crate::ids::PROXY);
                self.timers.remove(&proxy, &format!("banremove_{ip}"));
                // Cut any live connections from that peer.
                let connected: Vec<ClientId> = self
                    .router
                    .clients()
                    .filter(|client| client.addr.ip() == ip)
                    .map(|client| client.id)
                    .collect();
                for id in &connected {
                    self.router.remove_client(*id);
                }
                Ok(CommandOutcome::ok([format!(
                    "{ip} permanently banned ({} connection(s) dropped)",
                    connected.len()
                )]))
            }
            CoreCommand::ClientUnban => {
                let raw = str_arg("ip");
                let Ok(ip) = raw.parse::<std::net::IpAddr>() else {
                    return Ok(CommandOutcome::fail([format!(
                        "{raw:?} is not an address"
                    )]));
                };
                let proxy = PluginId::new(crate::ids::PROXY);
                self.timers.remove(&proxy, &format!("banremove_{ip}"));
                if self.router.pardon(ip) {
                    Ok(CommandOutcome::ok([format!("{ip} unbanned")]))
                } else {
                    Ok(CommandOutcome::fail([format!("{ip} is not banned")]))
                }
            }
            CoreCommand::ApiDetail => {
                let name = str_arg("name");
                let Some(detail) = self.registry.detail(&name, 5) else {
                    return Ok(CommandOutcome::fail([format!("unknown endpoint '{name}'")]));
                };
                let mut messages = vec![
                    format!("endpoint    : {}", detail.full_name),
                    format!("owner       : {}", detail.owner),
                    format!("description : {}", detail.description),
                    format!("calls       : {}", detail.call_count),
                ];
                if let Some(previous) = detail.overwrote {
                    messages.push(format!("overwrote   : entry owned by {previous}"));
                }
                for (caller, count) in detail.top_callers {
                    messages.push(format!("  {caller:<32} {count}"));
                }
                Ok(CommandOutcome::ok(messages))
            }
        }
    }

    fn format_command_list(&self, owner: &PluginId) -> Vec<String> {
        let mut messages = vec![format!("commands of {owner}:")];
        for registered in self.commands.list(owner) {
            messages.push(format!(
                "  {:<16} {}",
                registered.spec.name, registered.spec.description
            ));
        }
        messages
    }

    /// Fuzzy-resolves a plugin argument against command owners.
    fn resolve_plugin_arg(&self, ident: &str) -> Result<PluginId, CoreError> {
        // Loaded plugins come first; engine subsystems are reachable
        // through the command engine's alias table.
        if let Some(id) = self
            .infos
            .keys()
            .find(|id| id.as_str() == ident || id.short_name() == ident)
        {
            return Ok(id.clone());
        }
        match self.commands.resolve_plugin(ident) {
            PluginResolution::Match(owner) => Ok(owner),
            _ => Err(CoreError::UnknownPlugin(PluginId::new(ident))),
        }
    }

    /// Fuzzy-resolves a plugin argument against settings owners too.
    fn resolve_plugin_arg_settings(&self, ident: &str) -> Result<PluginId, CoreError> {
        if let Ok(id) = self.resolve_plugin_arg(ident) {
            return Ok(id);
        }
        self.settings
            .plugins()
            .into_iter()
            .find(|id| {
                id.as_str() == ident
                    || id.short_name() == ident
                    || id.as_str().ends_with(ident)
            })
            .cloned()
            .ok_or_else(|| CoreError::UnknownPlugin(PluginId::new(ident)))
    }
}

/// Parses a client id back out of an event data record.
fn client_from_str(s: &str) -> Option<ClientId> {
    serde_json::from_value(Value::String(s.to_string())).ok()
}
