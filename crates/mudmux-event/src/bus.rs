//! The event table: name → definition, registrations, history.

use crate::definition::{CallbackRef, Event, EventSpec};
use crate::EventError;
use mudmux_types::PluginId;
use std::collections::HashMap;

/// The process-wide event table.
///
/// Initialized once at engine startup; writes happen only during
/// plugin load/unload and explicit registration calls, all on the
/// dispatcher task.
#[derive(Debug, Default)]
pub struct EventBus {
    events: HashMap<String, Event>,
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an event.
    ///
    /// # Errors
    ///
    /// [`EventError::DuplicateEvent`] if the name already exists.
    pub fn register_event(&mut self, spec: EventSpec) -> Result<(), EventError> {
        if self.events.contains_key(&spec.name) {
            return Err(EventError::DuplicateEvent(spec.name));
        }
        tracing::debug!(event = %spec.name, creator = %spec.creator, "event registered");
        self.events.insert(spec.name.clone(), Event::new(spec));
        Ok(())
    }

    /// Whether the named event exists.
    #[must_use]
    pub fn has_event(&self, name: &str) -> bool {
        self.events.contains_key(name)
    }

    /// Looks up an event.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Event> {
        self.events.get(name)
    }

    /// Looks up an event mutably (dispatch bookkeeping).
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Event> {
        self.events.get_mut(name)
    }

    /// Registers a callback on an event.
    ///
    /// Returns whether the callback was newly added.
    ///
    /// # Errors
    ///
    /// [`EventError::UnknownEvent`] if the event does not exist.
    pub fn register_callback(
        &mut self,
        event: &str,
        owner: PluginId,
        handler: &str,
        priority: i32,
    ) -> Result<bool, EventError> {
        let ev = self
            .events
            .get_mut(event)
            .ok_or_else(|| EventError::UnknownEvent(event.to_string()))?;
        Ok(ev.register(CallbackRef::new(owner, handler), priority))
    }

    /// Unregisters a callback. Returns whether it was present.
    ///
    /// # Errors
    ///
    /// [`EventError::UnknownEvent`] if the event does not exist.
    pub fn unregister_callback(
        &mut self,
        event: &str,
        owner: &PluginId,
        handler: &str,
    ) -> Result<bool, EventError> {
        let ev = self
            .events
            .get_mut(event)
            .ok_or_else(|| EventError::UnknownEvent(event.to_string()))?;
        Ok(ev.unregister(&CallbackRef::new(owner.clone(), handler)))
    }

    /// Removes every callback owned by `owner` across all events.
    ///
    /// Event definitions created by the owner stay - other plugins
    /// may still be bound to them - with the creator retained for
    /// diagnostics.
    pub fn remove_owner(&mut self, owner: &PluginId) -> usize {
        self.events
            .values_mut()
            .map(|ev| ev.remove_owner(owner))
            .sum()
    }

    /// All event names, sorted.
    #[must_use]
    pub fn event_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.events.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Dispatch-ordered callbacks for an event, or an empty list if
    /// the event is unknown.
    #[must_use]
    pub fn ordered_callbacks(&self, event: &str) -> Vec<(i32, CallbackRef)> {
        self.events
            .get(event)
            .map(Event::ordered_callbacks)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus_with(name: &str) -> EventBus {
        let mut bus = EventBus::new();
        bus.register_event(EventSpec::new(name, PluginId::new("plugins.test"), "t"))
            .unwrap();
        bus
    }

    #[test]
    fn duplicate_event_rejected() {
        let mut bus = bus_with("ev_x");
        let err = bus
            .register_event(EventSpec::new("ev_x", PluginId::new("plugins.other"), "t"))
            .unwrap_err();
        assert!(matches!(err, EventError::DuplicateEvent(_)));
    }

    #[test]
    fn callback_to_unknown_event_fails() {
        let mut bus = EventBus::new();
        let err = bus
            .register_callback("ev_missing", PluginId::new("plugins.a"), "h", 50)
            .unwrap_err();
        assert!(matches!(err, EventError::UnknownEvent(_)));
    }

    #[test]
    fn register_unregister_round_trip() {
        let mut bus = bus_with("ev_x");
        let owner = PluginId::new("plugins.a");

        assert!(bus.register_callback("ev_x", owner.clone(), "h", 50).unwrap());
        assert!(!bus.register_callback("ev_x", owner.clone(), "h", 50).unwrap());
        assert!(bus.unregister_callback("ev_x", &owner, "h").unwrap());
        assert!(bus.get("ev_x").unwrap().is_empty());
    }

    #[test]
    fn remove_owner_spans_events() {
        let mut bus = bus_with("ev_a");
        bus.register_event(EventSpec::new("ev_b", PluginId::new("plugins.test"), "t"))
            .unwrap();
        let owner = PluginId::new("plugins.a");
        bus.register_callback("ev_a", owner.clone(), "h", 50).unwrap();
        bus.register_callback("ev_b", owner.clone(), "h", 50).unwrap();
        bus.register_callback("ev_b", PluginId::new("plugins.b"), "h", 50)
            .unwrap();

        assert_eq!(bus.remove_owner(&owner), 2);
        assert_eq!(bus.get("ev_b").unwrap().callback_count(), 1);
    }
}
