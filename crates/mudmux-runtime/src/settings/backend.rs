//! Storage backends for the settings store.
//!
//! The engine only needs get/put/iterate/flush; the on-disk format is
//! an implementation detail of the backend. The default backend keeps
//! one JSON file per plugin id under the settings directory.

use mudmux_types::PluginId;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io;
use std::path::PathBuf;

/// Keyed persistence for one plugin's settings.
pub trait SettingsBackend: Send {
    /// Reads a stored value.
    fn get(&self, plugin: &PluginId, key: &str) -> Option<Value>;

    /// Stores a value; durable after the next [`flush`](Self::flush).
    fn put(&mut self, plugin: &PluginId, key: &str, value: Value);

    /// All stored pairs for a plugin.
    fn iterate(&self, plugin: &PluginId) -> Vec<(String, Value)>;

    /// Makes pending writes for a plugin durable.
    ///
    /// # Errors
    ///
    /// I/O errors from the underlying store.
    fn flush(&mut self, plugin: &PluginId) -> io::Result<()>;
}

/// One JSON file per plugin id under a directory.
///
/// Files are written atomically (temp file + rename) so a crash
/// mid-flush never leaves a torn store.
#[derive(Debug)]
pub struct JsonFileBackend {
    dir: PathBuf,
    cache: HashMap<PluginId, BTreeMap<String, Value>>,
    dirty: HashSet<PluginId>,
}

impl JsonFileBackend {
    /// Opens (creating if needed) a backend rooted at `dir`.
    ///
    /// # Errors
    ///
    /// I/O errors creating the directory.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            cache: HashMap::new(),
            dirty: HashSet::new(),
        })
    }

    fn file_for(&self, plugin: &PluginId) -> PathBuf {
        self.dir.join(format!("{}.json", plugin.as_str()))
    }

    fn load(&mut self, plugin: &PluginId) -> &mut BTreeMap<String, Value> {
        if !self.cache.contains_key(plugin) {
            let path = self.file_for(plugin);
            let map = fs::read_to_string(&path)
                .ok()
                .and_then(|text| serde_json::from_str(&text).ok())
                .unwrap_or_default();
            self.cache.insert(plugin.clone(), map);
        }
        self.cache.get_mut(plugin).expect("just inserted")
    }
}

impl SettingsBackend for JsonFileBackend {
    fn get(&self, plugin: &PluginId, key: &str) -> Option<Value> {
        if let Some(map) = self.cache.get(plugin) {
            return map.get(key).cloned();
        }
        // Cold read without populating the cache mutably.
        let path = self.file_for(plugin);
        let map: BTreeMap<String, Value> = fs::read_to_string(path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())?;
        map.get(key).cloned()
    }

    fn put(&mut self, plugin: &PluginId, key: &str, value: Value) {
        self.load(plugin).insert(key.to_string(), value);
        self.dirty.insert(plugin.clone());
    }

    fn iterate(&self, plugin: &PluginId) -> Vec<(String, Value)> {
        if let Some(map) = self.cache.get(plugin) {
            return map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        }
        fs::read_to_string(self.file_for(plugin))
            .ok()
            .and_then(|text| serde_json::from_str::<BTreeMap<String, Value>>(&text).ok())
            .map(|map| map.into_iter().collect())
            .unwrap_or_default()
    }

    fn flush(&mut self, plugin: &PluginId) -> io::Result<()> {
        if !self.dirty.remove(plugin) {
            return Ok(());
        }
        let map = self.load(plugin).clone();
        let path = self.file_for(plugin);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&map)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// In-memory backend for tests.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    store: HashMap<PluginId, BTreeMap<String, Value>>,
    /// Flush invocations, observable by tests.
    pub flushes: usize,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsBackend for MemoryBackend {
    fn get(&self, plugin: &PluginId, key: &str) -> Option<Value> {
        self.store.get(plugin).and_then(|m| m.get(key)).cloned()
    }

    fn put(&mut self, plugin: &PluginId, key: &str, value: Value) {
        self.store
            .entry(plugin.clone())
            .or_default()
            .insert(key.to_string(), value);
    }

    fn iterate(&self, plugin: &PluginId) -> Vec<(String, Value)> {
        self.store
            .get(plugin)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    fn flush(&mut self, _plugin: &PluginId) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_backend_round_trips_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = PluginId::new("plugins.test");

        {
            let mut backend = JsonFileBackend::open(dir.path()).unwrap();
            backend.put(&plugin, "prefix", json!("#bp"));
            backend.put(&plugin, "limit", json!(10));
            backend.flush(&plugin).unwrap();
        }

        let backend = JsonFileBackend::open(dir.path()).unwrap();
        assert_eq!(backend.get(&plugin, "prefix"), Some(json!("#bp")));
        assert_eq!(backend.iterate(&plugin).len(), 2);
    }

    #[test]
    fn flush_without_changes_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = PluginId::new("plugins.test");
        let mut backend = JsonFileBackend::open(dir.path()).unwrap();
        backend.flush(&plugin).unwrap();
        assert!(!dir.path().join("plugins.test.json").exists());
    }

    #[test]
    fn memory_backend_counts_flushes() {
        let plugin = PluginId::new("plugins.test");
        let mut backend = MemoryBackend::new();
        backend.put(&plugin, "k", json!(true));
        backend.flush(&plugin).unwrap();
        assert_eq!(backend.flushes, 1);
        assert_eq!(backend.get(&plugin, "k"), Some(json!(true)));
    }
}
