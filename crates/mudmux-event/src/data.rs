//! Keyed data records passed to event callbacks.

use mudmux_record::SharedLine;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// An event data record shared between the dispatcher and callbacks.
///
/// The innermost active record is reachable from any callback via the
/// engine's `current_event_record`; the mutex keeps it `Send` across
/// the dispatcher's await points and is uncontended in practice.
pub type SharedEventData = Arc<Mutex<EventDataRecord>>;

/// A value stored under a key of an event data record.
///
/// Lines are shared by reference so a callback's mutation is visible
/// to the pipeline stage that raised the event.
#[derive(Clone)]
pub enum DataValue {
    /// Absent / null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Text.
    Str(String),
    /// Arbitrary structured data.
    Json(serde_json::Value),
    /// A shared pipeline line.
    Line(SharedLine),
    /// An ordered list of shared lines (read events carry the
    /// delivered set).
    Lines(Vec<SharedLine>),
}

impl fmt::Debug for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Int(i) => write!(f, "Int({i})"),
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::Json(v) => write!(f, "Json({v})"),
            Self::Line(line) => write!(f, "Line({})", line.lock().id()),
            Self::Lines(lines) => write!(f, "Lines(len={})", lines.len()),
        }
    }
}

impl PartialEq for DataValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Json(a), Self::Json(b)) => a == b,
            (Self::Line(a), Self::Line(b)) => Arc::ptr_eq(a, b),
            (Self::Lines(a), Self::Lines(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Arc::ptr_eq(x, y))
            }
            _ => false,
        }
    }
}

impl From<bool> for DataValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for DataValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<&str> for DataValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for DataValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<serde_json::Value> for DataValue {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl From<SharedLine> for DataValue {
    fn from(line: SharedLine) -> Self {
        Self::Line(line)
    }
}

impl From<Vec<SharedLine>> for DataValue {
    fn from(lines: Vec<SharedLine>) -> Self {
        Self::Lines(lines)
    }
}

/// The keyed container a raise carries through dispatch.
///
/// Callbacks read and write keys whose meaning is declared by the
/// event's argument schema. The record remembers which event it
/// belongs to so introspection surfaces can label it.
#[derive(Debug, Clone, Default)]
pub struct EventDataRecord {
    event: String,
    values: BTreeMap<String, DataValue>,
}

impl EventDataRecord {
    /// Creates an empty record for the named event.
    #[must_use]
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            values: BTreeMap::new(),
        }
    }

    /// The event this record belongs to.
    #[must_use]
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Sets a key, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<DataValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<DataValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Reads a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&DataValue> {
        self.values.get(key)
    }

    /// Reads a key as text.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(DataValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Reads a key as a boolean.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key) {
            Some(DataValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Reads a key as an integer.
    #[must_use]
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.values.get(key) {
            Some(DataValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    /// Reads a key as a shared line.
    #[must_use]
    pub fn get_line(&self, key: &str) -> Option<SharedLine> {
        match self.values.get(key) {
            Some(DataValue::Line(line)) => Some(Arc::clone(line)),
            _ => None,
        }
    }

    /// Reads a key as a line list.
    #[must_use]
    pub fn get_lines(&self, key: &str) -> Option<Vec<SharedLine>> {
        match self.values.get(key) {
            Some(DataValue::Lines(lines)) => Some(lines.clone()),
            _ => None,
        }
    }

    /// Registered keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Wraps the record for shared access.
    #[must_use]
    pub fn shared(self) -> SharedEventData {
        Arc::new(Mutex::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mudmux_record::LineRecord;

    #[test]
    fn typed_accessors() {
        let rec = EventDataRecord::new("ev_test")
            .with("name", "gag_spam")
            .with("count", 3i64)
            .with("enabled", true);

        assert_eq!(rec.get_str("name"), Some("gag_spam"));
        assert_eq!(rec.get_int("count"), Some(3));
        assert_eq!(rec.get_bool("enabled"), Some(true));
        assert_eq!(rec.get_str("missing"), None);
        // Wrong-typed reads return None rather than panicking.
        assert_eq!(rec.get_bool("name"), None);
    }

    #[test]
    fn line_values_share_the_record() {
        let line = LineRecord::from_mud("hello").shared();
        let rec = EventDataRecord::new("ev_test").with("line", line.clone());

        let fetched = rec.get_line("line").unwrap();
        assert!(Arc::ptr_eq(&fetched, &line));
    }

    #[test]
    fn set_replaces() {
        let mut rec = EventDataRecord::new("ev_test");
        rec.set("k", 1i64);
        rec.set("k", 2i64);
        assert_eq!(rec.get_int("k"), Some(2));
        assert_eq!(rec.keys().count(), 1);
    }
}
