//! Attribute snapshots carried across hot-reload.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A bag of named attribute values saved before unload and restored
/// onto the fresh instance before its `initialize` runs.
///
/// Values are JSON so the snapshot survives the old instance being
/// dropped; plugins serialize whatever state they declared in
/// `attrs_to_save_on_reload`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginSnapshot {
    attrs: BTreeMap<String, Value>,
}

impl PluginSnapshot {
    /// An empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a serializable attribute.
    ///
    /// # Errors
    ///
    /// Returns the serialization error if the value cannot be encoded.
    pub fn put<T: Serialize>(
        &mut self,
        name: impl Into<String>,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        self.attrs.insert(name.into(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Reads an attribute back, if present and decodable.
    #[must_use]
    pub fn get<T: for<'de> Deserialize<'de>>(&self, name: &str) -> Option<T> {
        self.attrs
            .get(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Whether the snapshot holds the attribute.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    /// Whether anything was saved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Saved attribute names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attrs.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let mut snap = PluginSnapshot::new();
        snap.put("counter", &42u64).unwrap();
        snap.put("names", &vec!["a".to_string(), "b".to_string()])
            .unwrap();

        assert_eq!(snap.get::<u64>("counter"), Some(42));
        assert_eq!(
            snap.get::<Vec<String>>("names"),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(snap.get::<u64>("missing"), None);
    }

    #[test]
    fn wrong_type_reads_none() {
        let mut snap = PluginSnapshot::new();
        snap.put("counter", &"text").unwrap();
        assert_eq!(snap.get::<u64>("counter"), None);
    }
}
