//! The client command engine.
//!
//! Commands arrive as client→mud lines beginning with the command
//! prefix (`#bp` by default) and never reach the mud: the engine is a
//! callback on the to-mud modify event at priority 1, resolves
//! `<prefix>.<plugin>.<command>` by fuzzy match, parses the remaining
//! tokens against the command's argument spec, runs the handler, and
//! clears the line's send flag.
//!
//! This module owns registration, name resolution, and history; the
//! dispatch glue (reading the current event, delivering output to the
//! originating client) lives on the engine core.

mod fuzzy;
mod history;
mod parser;

pub use fuzzy::{resolve, FuzzyResult};
pub use history::CommandHistory;
pub use parser::{parse_args, tokenize, usage, ArgParseError};

use mudmux_plugin::CommandSpec;
use mudmux_types::PluginId;
use std::collections::{BTreeMap, HashMap};

/// Built-in operations the engine provides without a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreCommand {
    /// List loaded plugins.
    PluginList,
    /// Hot-reload a plugin.
    PluginReload,
    /// Reset a plugin's settings to their defaults.
    PluginReset,
    /// List a plugin's commands.
    CommandList,
    /// Show help for one command.
    CommandHelp,
    /// Show or clear the history ring.
    History,
    /// List a plugin's settings.
    SettingList,
    /// Write a setting.
    SettingSet,
    /// List registered triggers.
    TriggerList,
    /// List registered timers.
    TimerList,
    /// Show one event's registrations and raise stats.
    EventDetail,
    /// List capability endpoints.
    ApiList,
    /// Show one endpoint's stats.
    ApiDetail,
    /// List connected clients and active bans.
    ClientList,
    /// Permanently ban a peer address.
    ClientBan,
    /// Lift a ban of either kind.
    ClientUnban,
}

/// What runs when a command dispatches.
#[derive(Debug, Clone)]
pub enum CommandTarget {
    /// Route to the owning plugin's `run_command`.
    Plugin {
        /// Handler name within the plugin.
        handler: String,
    },
    /// A built-in engine operation.
    Core(CoreCommand),
}

/// One registered command.
#[derive(Debug, Clone)]
pub struct RegisteredCommand {
    /// Owning plugin (or engine subsystem id).
    pub owner: PluginId,
    /// The declared spec.
    pub spec: CommandSpec,
    /// Dispatch target.
    pub target: CommandTarget,
}

/// A parsed `<prefix>.<plugin>.<command> args` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// The plugin identifier as typed (may be abbreviated).
    pub plugin_path: String,
    /// The command name as typed (may be abbreviated, may be empty
    /// when only a plugin was given).
    pub command: String,
    /// Everything after the head token.
    pub tail: String,
}

/// Splits the text after `<prefix>.` into an [`Invocation`].
///
/// The last dotted segment of the head token is the command name;
/// everything before it is the plugin identifier. A single segment is
/// a plugin identifier alone.
#[must_use]
pub fn split_invocation(rest: &str) -> Option<Invocation> {
    let rest = rest.trim_start();
    if rest.is_empty() {
        return None;
    }
    let (head, tail) = match rest.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, tail.trim().to_string()),
        None => (rest, String::new()),
    };

    match head.rsplit_once('.') {
        Some((plugin_path, command)) if !plugin_path.is_empty() => Some(Invocation {
            plugin_path: plugin_path.to_string(),
            command: command.to_string(),
            tail,
        }),
        _ => Some(Invocation {
            plugin_path: head.to_string(),
            command: String::new(),
            tail,
        }),
    }
}

/// How a plugin identifier resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginResolution {
    /// One plugin matched.
    Match(PluginId),
    /// The abbreviation fit several plugins.
    Ambiguous(Vec<PluginId>),
    /// Nothing matched.
    None,
}

/// The command registration table plus history.
pub struct CommandEngine {
    commands: HashMap<PluginId, BTreeMap<String, RegisteredCommand>>,
    /// The bounded history ring.
    pub history: CommandHistory,
}

impl CommandEngine {
    /// Creates an engine with the given history capacity.
    #[must_use]
    pub fn new(history_cap: usize) -> Self {
        Self {
            commands: HashMap::new(),
            history: CommandHistory::new(history_cap),
        }
    }

    /// Registers a command; an existing `(owner, name)` entry is
    /// replaced with a warning.
    pub fn register(&mut self, owner: PluginId, spec: CommandSpec, target: CommandTarget) {
        let entry = self.commands.entry(owner.clone()).or_default();
        if entry.contains_key(&spec.name) {
            tracing::warn!(owner = %owner, command = %spec.name, "command re-registered, replacing");
        }
        entry.insert(
            spec.name.clone(),
            RegisteredCommand {
                owner,
                spec,
                target,
            },
        );
    }

    /// Removes every command owned by `owner`; returns how many.
    pub fn remove_owner(&mut self, owner: &PluginId) -> usize {
        self.commands
            .remove(owner)
            .map(|commands| commands.len())
            .unwrap_or(0)
    }

    /// Resolves a possibly-abbreviated plugin identifier.
    ///
    /// Each command-owning plugin is known under three aliases: its
    /// full id, the id with the leading `plugins.` stripped, and its
    /// short name. `commands`, `core.commands`, and
    /// `plugins.core.commands` all reach the same owner.
    #[must_use]
    pub fn resolve_plugin(&self, ident: &str) -> PluginResolution {
        let mut aliases: Vec<(String, PluginId)> = Vec::new();
        for owner in self.commands.keys() {
            let full = owner.as_str().to_string();
            let stripped = full.strip_prefix("plugins.").unwrap_or(&full).to_string();
            let short = owner.short_name().to_string();
            for alias in [full, stripped, short] {
                aliases.push((alias, owner.clone()));
            }
        }

        match resolve(ident, aliases.iter().map(|(alias, _)| alias.as_str())) {
            FuzzyResult::Match(alias) => {
                // Two plugins can share a short name; a matched alias
                // is only unambiguous if one owner claims it.
                let mut owners: Vec<PluginId> = aliases
                    .iter()
                    .filter(|(a, _)| *a == alias)
                    .map(|(_, owner)| owner.clone())
                    .collect();
                owners.sort();
                owners.dedup();
                match owners.len() {
                    1 => PluginResolution::Match(owners.remove(0)),
                    _ => PluginResolution::Ambiguous(owners),
                }
            }
            FuzzyResult::Ambiguous(matched) => {
                let mut owners: Vec<PluginId> = matched
                    .iter()
                    .filter_map(|alias| {
                        aliases
                            .iter()
                            .find(|(a, _)| a == alias)
                            .map(|(_, owner)| owner.clone())
                    })
                    .collect();
                owners.sort();
                owners.dedup();
                match owners.len() {
                    1 => PluginResolution::Match(owners.remove(0)),
                    _ => PluginResolution::Ambiguous(owners),
                }
            }
            FuzzyResult::None => PluginResolution::None,
        }
    }

    /// Resolves a possibly-abbreviated command name within an owner.
    #[must_use]
    pub fn resolve_command(&self, owner: &PluginId, ident: &str) -> FuzzyResult {
        let Some(commands) = self.commands.get(owner) else {
            return FuzzyResult::None;
        };
        resolve(ident, commands.keys().map(String::as_str))
    }

    /// Looks up a command by exact name.
    #[must_use]
    pub fn get(&self, owner: &PluginId, name: &str) -> Option<&RegisteredCommand> {
        self.commands.get(owner).and_then(|m| m.get(name))
    }

    /// A plugin's commands, name-sorted.
    #[must_use]
    pub fn list(&self, owner: &PluginId) -> Vec<&RegisteredCommand> {
        self.commands
            .get(owner)
            .map(|m| m.values().collect())
            .unwrap_or_default()
    }

    /// Plugins owning at least one command, sorted.
    #[must_use]
    pub fn owners(&self) -> Vec<&PluginId> {
        let mut owners: Vec<&PluginId> = self.commands.keys().collect();
        owners.sort();
        owners
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> CommandEngine {
        let mut engine = CommandEngine::new(10);
        engine.register(
            PluginId::new("plugins.core.commands"),
            CommandSpec::new("list", ""),
            CommandTarget::Core(CoreCommand::PluginList),
        );
        engine.register(
            PluginId::new("plugins.core.triggers"),
            CommandSpec::new("list", ""),
            CommandTarget::Core(CoreCommand::TriggerList),
        );
        engine.register(
            PluginId::new("plugins.client.alias"),
            CommandSpec::new("add", "cmd_add"),
            CommandTarget::Plugin {
                handler: "cmd_add".into(),
            },
        );
        engine
    }

    #[test]
    fn split_full_invocation() {
        let inv = split_invocation("commands.list core").unwrap();
        assert_eq!(inv.plugin_path, "commands");
        assert_eq!(inv.command, "list");
        assert_eq!(inv.tail, "core");
    }

    #[test]
    fn split_dotted_plugin_path() {
        let inv = split_invocation("plugins.core.commands.list").unwrap();
        assert_eq!(inv.plugin_path, "plugins.core.commands");
        assert_eq!(inv.command, "list");
    }

    #[test]
    fn split_plugin_only() {
        let inv = split_invocation("alias").unwrap();
        assert_eq!(inv.plugin_path, "alias");
        assert_eq!(inv.command, "");
    }

    #[test]
    fn resolve_plugin_by_short_name() {
        let engine = engine();
        assert_eq!(
            engine.resolve_plugin("alias"),
            PluginResolution::Match(PluginId::new("plugins.client.alias"))
        );
    }

    #[test]
    fn resolve_plugin_abbreviation() {
        let engine = engine();
        assert_eq!(
            engine.resolve_plugin("comm"),
            PluginResolution::Match(PluginId::new("plugins.core.commands"))
        );
    }

    #[test]
    fn resolve_plugin_unknown() {
        assert_eq!(engine().resolve_plugin("nothere"), PluginResolution::None);
    }

    #[test]
    fn resolve_command_within_owner() {
        let engine = engine();
        let owner = PluginId::new("plugins.client.alias");
        assert_eq!(
            engine.resolve_command(&owner, "a"),
            FuzzyResult::Match("add".into())
        );
    }

    #[test]
    fn remove_owner_drops_commands() {
        let mut engine = engine();
        let owner = PluginId::new("plugins.client.alias");
        assert_eq!(engine.remove_owner(&owner), 1);
        assert_eq!(engine.resolve_plugin("alias"), PluginResolution::None);
    }
}
