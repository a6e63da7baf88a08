//! Event definitions and their priority-bucketed registrations.

use crate::invocation::InvocationSummary;
use mudmux_types::PluginId;
use std::collections::{BTreeMap, VecDeque};

/// Default callback priority when the registrant does not care.
pub const DEFAULT_PRIORITY: i32 = 50;

/// How many past raises an event keeps for introspection.
pub const DEFAULT_HISTORY: usize = 1000;

/// Static description of an event.
#[derive(Debug, Clone)]
pub struct EventSpec {
    /// Event name, e.g. `ev_to_client_data_modify`.
    pub name: String,
    /// The plugin (or engine subsystem id) that created the event.
    pub creator: PluginId,
    /// What the event means.
    pub description: String,
    /// Declared data-record keys and what they carry.
    pub arg_schema: BTreeMap<String, String>,
}

impl EventSpec {
    /// Creates a spec with an empty argument schema.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        creator: PluginId,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            creator,
            description: description.into(),
            arg_schema: BTreeMap::new(),
        }
    }

    /// Declares a data-record key.
    #[must_use]
    pub fn with_arg(mut self, key: impl Into<String>, help: impl Into<String>) -> Self {
        self.arg_schema.insert(key.into(), help.into());
        self
    }
}

/// Identity of one registered callback.
///
/// Callbacks are routed declaratively: the owner's plugin instance is
/// resolved at dispatch time and asked to run the named handler. The
/// pair is the idempotency key for registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallbackRef {
    /// Owning plugin.
    pub owner: PluginId,
    /// Handler name within the plugin.
    pub handler: String,
}

impl CallbackRef {
    /// Creates a callback reference.
    #[must_use]
    pub fn new(owner: PluginId, handler: impl Into<String>) -> Self {
        Self {
            owner,
            handler: handler.into(),
        }
    }
}

/// One event: its spec, registrations, and raise history.
#[derive(Debug)]
pub struct Event {
    spec: EventSpec,
    /// priority → callbacks in registration order.
    buckets: BTreeMap<i32, Vec<CallbackRef>>,
    raise_count: u64,
    history: VecDeque<InvocationSummary>,
    history_cap: usize,
}

impl Event {
    /// Creates an event with the default history capacity.
    #[must_use]
    pub fn new(spec: EventSpec) -> Self {
        Self::with_history(spec, DEFAULT_HISTORY)
    }

    /// Creates an event keeping at most `history_cap` past raises.
    #[must_use]
    pub fn with_history(spec: EventSpec, history_cap: usize) -> Self {
        Self {
            spec,
            buckets: BTreeMap::new(),
            raise_count: 0,
            history: VecDeque::new(),
            history_cap: history_cap.max(1),
        }
    }

    /// The static description.
    #[must_use]
    pub fn spec(&self) -> &EventSpec {
        &self.spec
    }

    /// Registers a callback at `priority`.
    ///
    /// Idempotent per `(owner, handler)` - a second registration at
    /// any priority is a no-op. Returns whether the callback was newly
    /// added.
    pub fn register(&mut self, callback: CallbackRef, priority: i32) -> bool {
        if self.contains(&callback) {
            return false;
        }
        self.buckets.entry(priority).or_default().push(callback);
        true
    }

    /// Unregisters a callback. Returns whether it was present.
    pub fn unregister(&mut self, callback: &CallbackRef) -> bool {
        let mut removed = false;
        self.buckets.retain(|_, bucket| {
            let before = bucket.len();
            bucket.retain(|cb| cb != callback);
            removed |= bucket.len() < before;
            !bucket.is_empty()
        });
        removed
    }

    /// Removes every callback owned by `owner`; returns how many.
    pub fn remove_owner(&mut self, owner: &PluginId) -> usize {
        let mut removed = 0;
        self.buckets.retain(|_, bucket| {
            let before = bucket.len();
            bucket.retain(|cb| &cb.owner != owner);
            removed += before - bucket.len();
            !bucket.is_empty()
        });
        removed
    }

    /// Whether the callback is registered at any priority.
    #[must_use]
    pub fn contains(&self, callback: &CallbackRef) -> bool {
        self.buckets.values().any(|b| b.contains(callback))
    }

    /// Whether no callbacks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// All callbacks in dispatch order: ascending priority, then
    /// registration order within a bucket.
    #[must_use]
    pub fn ordered_callbacks(&self) -> Vec<(i32, CallbackRef)> {
        self.buckets
            .iter()
            .flat_map(|(prio, bucket)| bucket.iter().map(move |cb| (*prio, cb.clone())))
            .collect()
    }

    /// How many times the event has been raised.
    #[must_use]
    pub fn raise_count(&self) -> u64 {
        self.raise_count
    }

    /// The retained raise summaries, oldest first.
    #[must_use]
    pub fn history(&self) -> &VecDeque<InvocationSummary> {
        &self.history
    }

    /// Records a completed raise, evicting the oldest entry once the
    /// ring is full.
    pub fn note_raise(&mut self, summary: InvocationSummary) {
        self.raise_count += 1;
        if self.history.len() == self.history_cap {
            self.history.pop_front();
        }
        self.history.push_back(summary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn spec(name: &str) -> EventSpec {
        EventSpec::new(name, PluginId::new("plugins.test"), "test event")
    }

    fn cb(owner: &str, handler: &str) -> CallbackRef {
        CallbackRef::new(PluginId::new(owner), handler)
    }

    fn summary() -> InvocationSummary {
        InvocationSummary {
            actor: "test".into(),
            started: Utc::now(),
            finished: Utc::now(),
            passes: 2,
            callbacks_run: 1,
        }
    }

    #[test]
    fn register_is_idempotent() {
        let mut ev = Event::new(spec("ev_x"));
        assert!(ev.register(cb("plugins.a", "h"), 50));
        assert!(!ev.register(cb("plugins.a", "h"), 50));
        // Even at a different priority the pair stays unique.
        assert!(!ev.register(cb("plugins.a", "h"), 10));
        assert_eq!(ev.callback_count(), 1);
    }

    #[test]
    fn register_then_unregister_restores() {
        let mut ev = Event::new(spec("ev_x"));
        ev.register(cb("plugins.a", "h"), 50);
        assert!(ev.unregister(&cb("plugins.a", "h")));
        assert!(!ev.unregister(&cb("plugins.a", "h")));
        assert!(ev.is_empty());
    }

    #[test]
    fn ordered_by_priority_then_registration() {
        let mut ev = Event::new(spec("ev_x"));
        ev.register(cb("plugins.late", "h"), 75);
        ev.register(cb("plugins.first", "h"), 10);
        ev.register(cb("plugins.second", "h"), 10);

        let order: Vec<String> = ev
            .ordered_callbacks()
            .into_iter()
            .map(|(_, cb)| cb.owner.as_str().to_string())
            .collect();
        assert_eq!(order, ["plugins.first", "plugins.second", "plugins.late"]);
    }

    #[test]
    fn remove_owner_strips_all_buckets() {
        let mut ev = Event::new(spec("ev_x"));
        ev.register(cb("plugins.a", "h1"), 10);
        ev.register(cb("plugins.a", "h2"), 60);
        ev.register(cb("plugins.b", "h"), 60);

        assert_eq!(ev.remove_owner(&PluginId::new("plugins.a")), 2);
        assert_eq!(ev.callback_count(), 1);
    }

    #[test]
    fn history_ring_is_bounded() {
        let mut ev = Event::with_history(spec("ev_x"), 3);
        for _ in 0..5 {
            ev.note_raise(summary());
        }
        assert_eq!(ev.raise_count(), 5);
        assert_eq!(ev.history().len(), 3);
    }
}
