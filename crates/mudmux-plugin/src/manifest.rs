//! Declarative registration manifests.
//!
//! Each plugin exposes a static list of [`Registration`] entries; the
//! loader walks the list at load time and registers each item with the
//! owning subsystem, tagged with the plugin's id. Unload removes
//! everything by that tag. This replaces runtime reflection entirely:
//! what a plugin hooks into is visible in one place.

use mudmux_event::EventSpec;
use mudmux_types::{SettingType, SettingValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One manifest entry.
#[derive(Debug, Clone)]
pub enum Registration {
    /// Create an event owned by this plugin.
    Event(EventSpec),

    /// Bind a handler to an existing event.
    Callback {
        /// Event name; `{plugin_id}` expands to the owner's id.
        event: String,
        /// Handler routed through `Plugin::handle_event`.
        handler: String,
        /// Dispatch priority, lower first.
        priority: i32,
    },

    /// Register a capability endpoint under the plugin's namespace.
    Endpoint {
        /// Sub-name under the plugin id, e.g. `alias.add`.
        sub_name: String,
        /// Handler routed through `Plugin::call_endpoint`.
        handler: String,
        /// Human description for the listing surface.
        description: String,
        /// Instance-scoped entries shadow process-wide ones.
        instance_scoped: bool,
        /// Overwrite an existing entry, keeping it as predecessor.
        force: bool,
    },

    /// Register a client command.
    Command(CommandSpec),

    /// Register a regex trigger.
    Trigger(TriggerSpec),

    /// Register a timer.
    Timer(TimerSpec),

    /// Register a persisted setting.
    Setting(SettingSpec),
}

// ── Commands ─────────────────────────────────────────────────

/// Argument value types a command can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgType {
    /// Free text token.
    Str,
    /// Signed integer.
    Int,
    /// Boolean spellings.
    Bool,
}

/// How many tokens an argument consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Nargs {
    /// Exactly one token (errors when missing and no default).
    #[default]
    One,
    /// Zero or one token.
    Optional,
    /// Everything left on the line, joined.
    Remainder,
}

/// One declared command argument.
#[derive(Debug, Clone)]
pub struct ArgSpec {
    /// Argument name, also the key in [`CommandArgs`].
    pub name: String,
    /// Value type.
    pub arg_type: ArgType,
    /// Used when the token is absent.
    pub default: Option<ArgValue>,
    /// When non-empty, the token must be one of these.
    pub choices: Vec<String>,
    /// Token consumption.
    pub nargs: Nargs,
    /// Help text for the usage message.
    pub help: String,
}

impl ArgSpec {
    /// A required single-token string argument.
    #[must_use]
    pub fn new(name: impl Into<String>, arg_type: ArgType) -> Self {
        Self {
            name: name.into(),
            arg_type,
            default: None,
            choices: Vec::new(),
            nargs: Nargs::One,
            help: String::new(),
        }
    }

    /// Sets the default (making the argument optional).
    #[must_use]
    pub fn default_value(mut self, value: ArgValue) -> Self {
        self.default = Some(value);
        self.nargs = Nargs::Optional;
        self
    }

    /// Restricts the token to a choice set.
    #[must_use]
    pub fn choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    /// Consumes the rest of the line.
    #[must_use]
    pub fn remainder(mut self) -> Self {
        self.nargs = Nargs::Remainder;
        self
    }

    /// Sets the help text.
    #[must_use]
    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }
}

/// A parsed argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    /// Text.
    Str(String),
    /// Integer.
    Int(i64),
    /// Boolean.
    Bool(bool),
}

impl ArgValue {
    /// Text accessor.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer accessor.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Boolean accessor.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Parsed arguments handed to a command handler.
pub type CommandArgs = BTreeMap<String, ArgValue>;

/// What a command handler returns: success plus output lines.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// Whether the command succeeded.
    pub success: bool,
    /// Lines delivered back to the invoking client.
    pub messages: Vec<String>,
}

impl CommandOutcome {
    /// Successful outcome with messages.
    #[must_use]
    pub fn ok<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            success: true,
            messages: messages.into_iter().map(Into::into).collect(),
        }
    }

    /// Failed outcome with messages.
    #[must_use]
    pub fn fail<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            success: false,
            messages: messages.into_iter().map(Into::into).collect(),
        }
    }
}

/// A declared client command.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Command name as typed after the plugin segment.
    pub name: String,
    /// Handler routed through `Plugin::run_command`.
    pub handler: String,
    /// One-line description.
    pub description: String,
    /// Declared arguments, in token order.
    pub args: Vec<ArgSpec>,
    /// Optional group label for listings.
    pub group: Option<String>,
    /// Whether invocations enter the history ring.
    pub show_in_history: bool,
    /// Whether output lines get color-code conversion.
    pub format: bool,
    /// Whether output lines carry the proxy preamble.
    pub preamble: bool,
}

impl CommandSpec {
    /// Creates a command with the common defaults.
    #[must_use]
    pub fn new(name: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handler: handler.into(),
            description: String::new(),
            args: Vec::new(),
            group: None,
            show_in_history: true,
            format: true,
            preamble: true,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, arg: ArgSpec) -> Self {
        self.args.push(arg);
        self
    }

    /// Sets the group label.
    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Keeps invocations out of the history ring.
    #[must_use]
    pub fn no_history(mut self) -> Self {
        self.show_in_history = false;
        self
    }
}

// ── Triggers ─────────────────────────────────────────────────

/// A declared regex trigger.
#[derive(Debug, Clone)]
pub struct TriggerSpec {
    /// Trigger name, unique per owner.
    pub name: String,
    /// The regular expression, may contain named groups.
    pub pattern: String,
    /// Evaluation priority, lower first.
    pub priority: i32,
    /// Whether the trigger starts enabled.
    pub enabled: bool,
    /// Optional group label; groups toggle as one unit.
    pub group: Option<String>,
    /// Suppress the matched line from clients.
    pub omit: bool,
    /// Match against the colorcoded surface instead of plain text.
    pub match_with_color: bool,
    /// Stop evaluating lower-priority triggers on match.
    pub stop_evaluating: bool,
    /// Named-group coercions applied to the match values.
    pub argtypes: BTreeMap<String, ArgType>,
    /// Event raised on match; derived from the trigger id if `None`.
    pub event_name: Option<String>,
}

impl TriggerSpec {
    /// Creates an enabled trigger at the default priority.
    #[must_use]
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            priority: 100,
            enabled: true,
            group: None,
            omit: false,
            match_with_color: false,
            stop_evaluating: false,
            argtypes: BTreeMap::new(),
            event_name: None,
        }
    }

    /// Sets the priority.
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Suppresses matched lines.
    #[must_use]
    pub fn omit(mut self) -> Self {
        self.omit = true;
        self
    }

    /// Stops evaluation after a match.
    #[must_use]
    pub fn stop_evaluating(mut self) -> Self {
        self.stop_evaluating = true;
        self
    }

    /// Matches against the colorcoded surface.
    #[must_use]
    pub fn match_with_color(mut self) -> Self {
        self.match_with_color = true;
        self
    }

    /// Assigns a group label.
    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Declares a named-group coercion.
    #[must_use]
    pub fn argtype(mut self, group: impl Into<String>, ty: ArgType) -> Self {
        self.argtypes.insert(group.into(), ty);
        self
    }

    /// Starts disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

// ── Timers ───────────────────────────────────────────────────

/// A declared timer.
#[derive(Debug, Clone)]
pub struct TimerSpec {
    /// Timer name, unique per owner.
    pub name: String,
    /// Handler routed through `Plugin::fire_timer`.
    pub handler: String,
    /// Interval between fires, seconds. Ignored for time-of-day
    /// timers.
    pub interval_secs: u64,
    /// Whether the timer starts enabled.
    pub enabled: bool,
    /// Remove after the first fire.
    pub one_shot: bool,
    /// `HHMM` UTC anchor; fires once per wall-clock match.
    pub time_of_day: Option<String>,
    /// Log each fire at debug level.
    pub log: bool,
}

impl TimerSpec {
    /// Creates an enabled repeating timer.
    #[must_use]
    pub fn every(name: impl Into<String>, handler: impl Into<String>, interval_secs: u64) -> Self {
        Self {
            name: name.into(),
            handler: handler.into(),
            interval_secs,
            enabled: true,
            one_shot: false,
            time_of_day: None,
            log: false,
        }
    }

    /// Creates a one-shot timer.
    #[must_use]
    pub fn once(name: impl Into<String>, handler: impl Into<String>, delay_secs: u64) -> Self {
        let mut spec = Self::every(name, handler, delay_secs);
        spec.one_shot = true;
        spec
    }

    /// Creates a daily time-of-day timer anchored at `HHMM` UTC.
    #[must_use]
    pub fn daily_at(
        name: impl Into<String>,
        handler: impl Into<String>,
        anchor: impl Into<String>,
    ) -> Self {
        let mut spec = Self::every(name, handler, 86_400);
        spec.time_of_day = Some(anchor.into());
        spec
    }

    /// Starts disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

// ── Settings ─────────────────────────────────────────────────

/// A declared persisted setting.
#[derive(Debug, Clone)]
pub struct SettingSpec {
    /// Setting name, globally unique across plugins.
    pub name: String,
    /// Declared type.
    pub setting_type: SettingType,
    /// Default value, also the `default` sentinel target.
    pub default: SettingValue,
    /// Help text.
    pub help: String,
    /// Rejects writes.
    pub readonly: bool,
    /// Hidden settings skip listings and the change event.
    pub hidden: bool,
    /// Extra message shown after a successful write.
    pub after_set_message: Option<String>,
}

impl SettingSpec {
    /// Creates a visible writable setting.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        setting_type: SettingType,
        default: SettingValue,
        help: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            setting_type,
            default,
            help: help.into(),
            readonly: false,
            hidden: false,
            after_set_message: None,
        }
    }

    /// Marks the setting read-only.
    #[must_use]
    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    /// Hides the setting.
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Adds an after-set message.
    #[must_use]
    pub fn after_set(mut self, message: impl Into<String>) -> Self {
        self.after_set_message = Some(message.into());
        self
    }
}
