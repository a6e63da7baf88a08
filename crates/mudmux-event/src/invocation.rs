//! Per-raise invocation state.
//!
//! Re-entrant raises of the same event are supported by keeping all
//! dispatch state here, per invocation, never on the event itself.
//! The engine stacks invocations: a callback that raises another
//! event pushes a new record on top.

use crate::data::SharedEventData;
use crate::definition::CallbackRef;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// One raise in progress.
#[derive(Debug)]
pub struct EventInvocation {
    /// Which event is being raised.
    pub event_name: String,
    /// Who raised it.
    pub actor: String,
    /// The data record callbacks read and write.
    pub data: SharedEventData,
    /// When dispatch began.
    pub started: DateTime<Utc>,
    /// Callbacks already executed in this invocation.
    pub executed: HashSet<CallbackRef>,
    /// The callback currently running, if any.
    pub current_callback: Option<CallbackRef>,
    /// Completed scan passes.
    pub passes: u32,
    /// Total callback invocations.
    pub callbacks_run: u32,
}

impl EventInvocation {
    /// Starts a fresh invocation.
    #[must_use]
    pub fn new(event_name: impl Into<String>, actor: impl Into<String>, data: SharedEventData) -> Self {
        Self {
            event_name: event_name.into(),
            actor: actor.into(),
            data,
            started: Utc::now(),
            executed: HashSet::new(),
            current_callback: None,
            passes: 0,
            callbacks_run: 0,
        }
    }

    /// Condenses the finished invocation for the history ring.
    #[must_use]
    pub fn summarize(&self) -> InvocationSummary {
        InvocationSummary {
            actor: self.actor.clone(),
            started: self.started,
            finished: Utc::now(),
            passes: self.passes,
            callbacks_run: self.callbacks_run,
        }
    }
}

/// A completed raise, retained in the event's bounded history.
#[derive(Debug, Clone)]
pub struct InvocationSummary {
    /// Who raised the event.
    pub actor: String,
    /// Dispatch start.
    pub started: DateTime<Utc>,
    /// Dispatch end.
    pub finished: DateTime<Utc>,
    /// Scan passes taken.
    pub passes: u32,
    /// Callbacks executed.
    pub callbacks_run: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::EventDataRecord;
    use mudmux_types::PluginId;

    #[test]
    fn invocation_tracks_execution() {
        let data = EventDataRecord::new("ev_x").shared();
        let mut inv = EventInvocation::new("ev_x", "test", data);

        let cb = CallbackRef::new(PluginId::new("plugins.a"), "h");
        assert!(inv.executed.insert(cb.clone()));
        assert!(!inv.executed.insert(cb));

        inv.passes = 2;
        inv.callbacks_run = 1;
        let summary = inv.summarize();
        assert_eq!(summary.passes, 2);
        assert_eq!(summary.callbacks_run, 1);
    }
}
