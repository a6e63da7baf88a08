//! The regex trigger engine.
//!
//! Every client-bound line is checked against the registered triggers
//! via a single union regex per match surface - one named group per
//! deduplicated pattern, `(?P<reg_1>pat)|(?P<reg_2>pat)|...` - so the
//! common case (no trigger matches) costs one regex scan. On a union
//! hit, the individual triggers sharing the matched pattern re-match
//! with their original named-group pattern to extract values.
//!
//! The engine computes a *fire plan* - which trigger events to raise,
//! in priority order, honoring `stop_evaluating` - and the engine
//! core executes the plan so raises go through normal dispatch.

use mudmux_event::names;
use mudmux_plugin::{ArgType, CoreError, TriggerSpec};
use mudmux_types::PluginId;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};

/// The three pseudo-triggers raised around every line.
pub const PSEUDO_BEALL: &str = "beall";
/// After every real trigger.
pub const PSEUDO_ALL: &str = "all";
/// For lines that are empty after color stripping.
pub const PSEUDO_EMPTYLINE: &str = "emptyline";

/// Builds the unique trigger id for an owner/name pair.
#[must_use]
pub fn trigger_id(owner: &PluginId, name: &str) -> String {
    format!("t_{}_{name}", owner.as_str())
}

/// A value extracted from a named group, after coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupValue {
    /// Uncoerced text.
    Str(String),
    /// Coerced integer.
    Int(i64),
    /// Coerced boolean.
    Bool(bool),
}

/// One planned trigger firing.
#[derive(Debug, Clone)]
pub struct TriggerFire {
    /// The trigger's unique id.
    pub trigger_id: String,
    /// The trigger's declared name.
    pub trigger_name: String,
    /// Owning plugin.
    pub owner: PluginId,
    /// Event to raise.
    pub event_name: String,
    /// Suppress the line on match.
    pub omit: bool,
    /// Extracted named-group values.
    pub matches: BTreeMap<String, GroupValue>,
}

/// One registered trigger.
#[derive(Debug)]
pub struct TriggerEntry {
    /// Unique id, `t_{owner}_{name}`.
    pub id: String,
    /// Declared name.
    pub name: String,
    /// Owning plugin.
    pub owner: PluginId,
    /// Original pattern with named groups; pseudo-triggers have none.
    pub pattern: Option<String>,
    compiled: Option<Regex>,
    regex_id: Option<String>,
    /// Evaluation priority, lower first.
    pub priority: i32,
    /// Whether the trigger participates in matching.
    pub enabled: bool,
    /// Group label.
    pub group: Option<String>,
    /// Suppress matched lines.
    pub omit: bool,
    /// Match on the colorcoded surface.
    pub match_with_color: bool,
    /// Stop evaluating lower-priority triggers.
    pub stop_evaluating: bool,
    argtypes: BTreeMap<String, ArgType>,
    /// Event raised on match.
    pub event_name: String,
    /// Times this trigger matched.
    pub hits: u64,
}

#[derive(Debug)]
struct RegexGroup {
    pattern: String,
    trigger_ids: Vec<String>,
    hits: u64,
}

/// The trigger table and union matcher.
pub struct TriggerEngine {
    triggers: HashMap<String, TriggerEntry>,
    regexes: HashMap<String, RegexGroup>,
    pattern_to_regex: HashMap<String, String>,
    next_regex_id: u64,
    union: Option<Regex>,
    union_dirty: bool,
}

impl Default for TriggerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerEngine {
    /// Creates an engine pre-seeded with the three pseudo-triggers.
    #[must_use]
    pub fn new() -> Self {
        let mut engine = Self {
            triggers: HashMap::new(),
            regexes: HashMap::new(),
            pattern_to_regex: HashMap::new(),
            next_regex_id: 0,
            union: None,
            union_dirty: false,
        };
        let owner = PluginId::new(crate::ids::TRIGGERS);
        for name in [PSEUDO_BEALL, PSEUDO_ALL, PSEUDO_EMPTYLINE] {
            let id = trigger_id(&owner, name);
            engine.triggers.insert(
                id.clone(),
                TriggerEntry {
                    id: id.clone(),
                    name: name.to_string(),
                    owner: owner.clone(),
                    pattern: None,
                    compiled: None,
                    regex_id: None,
                    priority: 0,
                    enabled: true,
                    group: None,
                    omit: false,
                    match_with_color: false,
                    stop_evaluating: false,
                    argtypes: BTreeMap::new(),
                    event_name: names::trigger_event(&id),
                    hits: 0,
                },
            );
        }
        engine
    }

    /// The event name of a pseudo-trigger.
    #[must_use]
    pub fn pseudo_event(&self, name: &str) -> String {
        let owner = PluginId::new(crate::ids::TRIGGERS);
        names::trigger_event(&trigger_id(&owner, name))
    }

    /// Registers a trigger; returns the event name raised on match.
    ///
    /// # Errors
    ///
    /// - [`CoreError::DuplicateTrigger`] for an existing owner/name
    /// - [`CoreError::BadPattern`] when the pattern does not compile
    pub fn add(&mut self, owner: &PluginId, spec: TriggerSpec) -> Result<String, CoreError> {
        let id = trigger_id(owner, &spec.name);
        if self.triggers.contains_key(&id) {
            return Err(CoreError::DuplicateTrigger(spec.name));
        }

        let compiled = Regex::new(&spec.pattern).map_err(|err| CoreError::BadPattern {
            name: spec.name.clone(),
            error: err.to_string(),
        })?;

        let stripped = strip_named_groups(&spec.pattern);
        let regex_id = self.intern_pattern(&stripped);
        let event_name = spec
            .event_name
            .clone()
            .unwrap_or_else(|| names::trigger_event(&id));

        if spec.enabled {
            self.attach_to_regex(&regex_id, &id);
        }

        self.triggers.insert(
            id.clone(),
            TriggerEntry {
                id,
                name: spec.name,
                owner: owner.clone(),
                pattern: Some(spec.pattern),
                compiled: Some(compiled),
                regex_id: Some(regex_id),
                priority: spec.priority,
                enabled: spec.enabled,
                group: spec.group,
                omit: spec.omit,
                match_with_color: spec.match_with_color,
                stop_evaluating: spec.stop_evaluating,
                argtypes: spec.argtypes,
                event_name: event_name.clone(),
                hits: 0,
            },
        );
        Ok(event_name)
    }

    /// Removes a trigger.
    ///
    /// # Errors
    ///
    /// [`CoreError::UnknownTrigger`] when the owner/name pair is not
    /// registered.
    pub fn remove(&mut self, owner: &PluginId, name: &str) -> Result<(), CoreError> {
        let id = trigger_id(owner, name);
        let entry = self
            .triggers
            .remove(&id)
            .ok_or_else(|| CoreError::UnknownTrigger(name.to_string()))?;
        if let Some(regex_id) = &entry.regex_id {
            self.detach_from_regex(regex_id, &id);
        }
        Ok(())
    }

    /// Removes every trigger owned by `owner`; returns how many.
    pub fn remove_owner(&mut self, owner: &PluginId) -> usize {
        let ids: Vec<String> = self
            .triggers
            .values()
            .filter(|t| &t.owner == owner && t.pattern.is_some())
            .map(|t| t.id.clone())
            .collect();
        for id in &ids {
            if let Some(entry) = self.triggers.remove(id) {
                if let Some(regex_id) = &entry.regex_id {
                    self.detach_from_regex(regex_id, id);
                }
            }
        }
        ids.len()
    }

    /// Enables or disables a trigger.
    ///
    /// # Errors
    ///
    /// [`CoreError::UnknownTrigger`] for unknown owner/name.
    pub fn set_enabled(
        &mut self,
        owner: &PluginId,
        name: &str,
        enabled: bool,
    ) -> Result<(), CoreError> {
        let id = trigger_id(owner, name);
        let (regex_id, was_enabled) = {
            let entry = self
                .triggers
                .get_mut(&id)
                .ok_or_else(|| CoreError::UnknownTrigger(name.to_string()))?;
            let was = entry.enabled;
            entry.enabled = enabled;
            (entry.regex_id.clone(), was)
        };
        if was_enabled == enabled {
            return Ok(());
        }
        if let Some(regex_id) = regex_id {
            if enabled {
                self.attach_to_regex(&regex_id, &id);
            } else {
                self.detach_from_regex(&regex_id, &id);
            }
        }
        Ok(())
    }

    /// Enables or disables every trigger in a group; returns how many
    /// were touched.
    pub fn set_group_enabled(&mut self, group: &str, enabled: bool) -> usize {
        let members: Vec<(PluginId, String)> = self
            .triggers
            .values()
            .filter(|t| t.group.as_deref() == Some(group))
            .map(|t| (t.owner.clone(), t.name.clone()))
            .collect();
        for (owner, name) in &members {
            let _ = self.set_enabled(owner, name, enabled);
        }
        members.len()
    }

    /// Looks up a trigger by owner and name.
    #[must_use]
    pub fn get(&self, owner: &PluginId, name: &str) -> Option<&TriggerEntry> {
        self.triggers.get(&trigger_id(owner, name))
    }

    /// All real (non-pseudo) triggers, id-sorted.
    #[must_use]
    pub fn list(&self) -> Vec<&TriggerEntry> {
        let mut entries: Vec<&TriggerEntry> = self
            .triggers
            .values()
            .filter(|t| t.pattern.is_some())
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }

    /// Whether any enabled trigger wants the colorcoded surface.
    #[must_use]
    pub fn wants_color(&self) -> bool {
        self.triggers
            .values()
            .any(|t| t.enabled && t.match_with_color)
    }

    /// Computes the fire plan for one line.
    ///
    /// Candidates from every matching union group are collected, then
    /// ordered by `(priority, id)`; a matching trigger with
    /// `stop_evaluating` truncates the plan. Hit counters update here.
    pub fn scan(&mut self, plain: &str, colored: &str) -> Vec<TriggerFire> {
        self.rebuild_union_if_dirty();
        let Some(union) = &self.union else {
            return Vec::new();
        };
        let Some(caps) = union.captures(plain) else {
            return Vec::new();
        };

        let matched_regexes: Vec<String> = union
            .capture_names()
            .flatten()
            .filter(|name| caps.name(name).is_some())
            .map(String::from)
            .collect();

        let mut candidates: Vec<String> = Vec::new();
        for regex_id in &matched_regexes {
            if let Some(group) = self.regexes.get_mut(regex_id) {
                group.hits += 1;
                candidates.extend(group.trigger_ids.iter().cloned());
            }
        }
        candidates.sort_by(|a, b| {
            let pa = self.triggers.get(a).map_or(i32::MAX, |t| t.priority);
            let pb = self.triggers.get(b).map_or(i32::MAX, |t| t.priority);
            pa.cmp(&pb).then_with(|| a.cmp(b))
        });

        let mut plan = Vec::new();
        for id in candidates {
            let Some(entry) = self.triggers.get_mut(&id) else {
                continue;
            };
            if !entry.enabled {
                continue;
            }
            let Some(compiled) = &entry.compiled else {
                continue;
            };
            let surface = if entry.match_with_color { colored } else { plain };
            let Some(m) = compiled.captures(surface) else {
                continue;
            };

            entry.hits += 1;
            let mut matches = BTreeMap::new();
            for name in compiled.capture_names().flatten() {
                if let Some(value) = m.name(name) {
                    let coerced = coerce_group(
                        value.as_str(),
                        entry.argtypes.get(name).copied(),
                    );
                    matches.insert(name.to_string(), coerced);
                }
            }

            let stop = entry.stop_evaluating;
            plan.push(TriggerFire {
                trigger_id: entry.id.clone(),
                trigger_name: entry.name.clone(),
                owner: entry.owner.clone(),
                event_name: entry.event_name.clone(),
                omit: entry.omit,
                matches,
            });
            if stop {
                break;
            }
        }
        plan
    }

    fn intern_pattern(&mut self, stripped: &str) -> String {
        if let Some(id) = self.pattern_to_regex.get(stripped) {
            return id.clone();
        }
        self.next_regex_id += 1;
        let id = format!("reg_{}", self.next_regex_id);
        self.regexes.insert(
            id.clone(),
            RegexGroup {
                pattern: stripped.to_string(),
                trigger_ids: Vec::new(),
                hits: 0,
            },
        );
        self.pattern_to_regex.insert(stripped.to_string(), id.clone());
        id
    }

    fn attach_to_regex(&mut self, regex_id: &str, trigger: &str) {
        if let Some(group) = self.regexes.get_mut(regex_id) {
            if !group.trigger_ids.contains(&trigger.to_string()) {
                group.trigger_ids.push(trigger.to_string());
                self.union_dirty = true;
            }
        }
    }

    fn detach_from_regex(&mut self, regex_id: &str, trigger: &str) {
        if let Some(group) = self.regexes.get_mut(regex_id) {
            let before = group.trigger_ids.len();
            group.trigger_ids.retain(|id| id != trigger);
            if group.trigger_ids.len() < before {
                self.union_dirty = true;
            }
        }
    }

    fn rebuild_union_if_dirty(&mut self) {
        if !self.union_dirty && self.union.is_some() {
            return;
        }
        self.union_dirty = false;

        let mut parts: Vec<String> = self
            .regexes
            .iter()
            .filter(|(_, group)| !group.trigger_ids.is_empty())
            .map(|(id, group)| format!("(?P<{id}>{})", group.pattern))
            .collect();
        parts.sort_unstable();

        if parts.is_empty() {
            self.union = None;
            return;
        }
        match Regex::new(&parts.join("|")) {
            Ok(union) => self.union = Some(union),
            Err(err) => {
                tracing::error!(%err, "union trigger regex failed to compile");
                self.union = None;
            }
        }
    }
}

/// Removes `?P<name>` group markers so patterns dedupe structurally
/// and the union regex has no duplicate group names.
fn strip_named_groups(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(pos) = rest.find("(?P<") {
        out.push_str(&rest[..pos]);
        out.push('(');
        match rest[pos..].find('>') {
            Some(end) => rest = &rest[pos + end + 1..],
            None => {
                rest = &rest[pos + 4..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn coerce_group(value: &str, ty: Option<ArgType>) -> GroupValue {
    match ty {
        Some(ArgType::Int) => value
            .parse::<i64>()
            .map(GroupValue::Int)
            .unwrap_or_else(|_| GroupValue::Str(value.to_string())),
        Some(ArgType::Bool) => match value.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => GroupValue::Bool(true),
            "false" | "no" | "off" | "0" => GroupValue::Bool(false),
            _ => GroupValue::Str(value.to_string()),
        },
        _ => GroupValue::Str(value.to_string()),
    }
}
