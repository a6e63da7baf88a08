//! The append-only update log attached to records and containers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who is mutating a record and under which event stack.
///
/// Constructed by the dispatcher for each callback invocation; code
/// outside event dispatch (the network shims, the engine itself) uses
/// [`UpdateContext::system`].
#[derive(Debug, Clone, Default)]
pub struct UpdateContext {
    /// The acting party - a plugin id, `"mud"`, `"client:<id>"`, or
    /// an engine subsystem name.
    pub actor: String,
    /// The active event raises, outermost first, at mutation time.
    pub event_stack: Vec<String>,
}

impl UpdateContext {
    /// Context for a named actor with no active events.
    #[must_use]
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            event_stack: Vec::new(),
        }
    }

    /// Context for engine-internal bookkeeping.
    #[must_use]
    pub fn system(subsystem: &str) -> Self {
        Self::new(subsystem)
    }

    /// Attaches the current event stack.
    #[must_use]
    pub fn with_event_stack(mut self, stack: Vec<String>) -> Self {
        self.event_stack = stack;
        self
    }
}

/// What kind of change an update entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateAction {
    /// Record creation.
    Create,
    /// Payload or flag change.
    Modify,
    /// The record was locked.
    Lock,
    /// A mutation was attempted on a locked record and rejected.
    Rejected,
    /// The record was formatted for output.
    Format,
    /// The record was handed to a socket queue.
    Sent,
    /// The record was dropped before delivery.
    Dropped,
    /// Informational note.
    Info,
}

impl fmt::Display for UpdateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Modify => "modify",
            Self::Lock => "lock",
            Self::Rejected => "rejected",
            Self::Format => "format",
            Self::Sent => "sent",
            Self::Dropped => "dropped",
            Self::Info => "info",
        };
        f.write_str(s)
    }
}

/// One entry in a record's update log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEntry {
    /// What happened.
    pub action: UpdateAction,
    /// Human-readable detail, e.g. `"send=false"`.
    pub detail: String,
    /// Who did it.
    pub actor: String,
    /// The event stack at the time, outermost first.
    pub event_stack: Vec<String>,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
    /// Optional snapshot of relevant data.
    pub data: Option<serde_json::Value>,
}

impl UpdateEntry {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn new(action: UpdateAction, detail: impl Into<String>, ctx: &UpdateContext) -> Self {
        Self {
            action,
            detail: detail.into(),
            actor: ctx.actor.clone(),
            event_stack: ctx.event_stack.clone(),
            timestamp: Utc::now(),
            data: None,
        }
    }

    /// Attaches a data snapshot.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}
