//! The endpoint table.

use crate::entry::{CapabilityDetail, CapabilityEntry};
use crate::ApiError;
use mudmux_types::PluginId;
use std::collections::HashMap;

/// Placeholder expanded to the owner's id at registration time.
const PLUGIN_ID_PLACEHOLDER: &str = "{plugin_id}";

/// The capability registry: fully-qualified name → endpoint.
///
/// Two layers: process-wide entries and instance-scoped entries; a
/// lookup consults the instance layer first, so instance entries
/// shadow process-wide ones of the same name.
#[derive(Debug)]
pub struct CapabilityRegistry<T> {
    process: HashMap<String, CapabilityEntry<T>>,
    instance: HashMap<String, CapabilityEntry<T>>,
}

impl<T> Default for CapabilityRegistry<T> {
    fn default() -> Self {
        Self {
            process: HashMap::new(),
            instance: HashMap::new(),
        }
    }
}

impl<T> CapabilityRegistry<T> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an endpoint.
    ///
    /// `{plugin_id}` placeholders in either name part expand to the
    /// owner's id. With `force`, an existing entry is replaced and
    /// retained as the new entry's predecessor.
    ///
    /// # Errors
    ///
    /// - [`ApiError::Malformed`] for empty name parts
    /// - [`ApiError::Duplicate`] if the name is taken and `force` is
    ///   not set
    #[allow(clippy::too_many_arguments)]
    pub fn add(
        &mut self,
        top_level: &str,
        sub_name: &str,
        owner: PluginId,
        target: T,
        description: impl Into<String>,
        instance_scoped: bool,
        force: bool,
    ) -> Result<(), ApiError> {
        if top_level.is_empty() || sub_name.is_empty() {
            return Err(ApiError::Malformed(format!("{top_level}:{sub_name}")));
        }
        let top_level = top_level.replace(PLUGIN_ID_PLACEHOLDER, owner.as_str());
        let sub_name = sub_name.replace(PLUGIN_ID_PLACEHOLDER, owner.as_str());
        let full_name = format!("{top_level}:{sub_name}");

        let table = if instance_scoped {
            &mut self.instance
        } else {
            &mut self.process
        };

        let predecessor = match table.get(&full_name) {
            Some(existing) if !force => {
                return Err(ApiError::Duplicate(existing.full_name.clone()));
            }
            Some(_) => table.remove(&full_name).map(Box::new),
            None => None,
        };

        let mut entry =
            CapabilityEntry::new(full_name.clone(), owner, target, description, instance_scoped);
        if let Some(prev) = predecessor {
            tracing::debug!(endpoint = %full_name, previous_owner = %prev.owner, "endpoint overwritten");
            entry.overwritten = Some(prev);
        }
        table.insert(full_name, entry);
        Ok(())
    }

    /// Whether the name resolves in either layer.
    #[must_use]
    pub fn has(&self, full_name: &str) -> bool {
        self.instance.contains_key(full_name) || self.process.contains_key(full_name)
    }

    /// Resolves a name, recording the call against `caller`.
    ///
    /// # Errors
    ///
    /// [`ApiError::Unknown`] if the name does not resolve.
    pub fn resolve(&mut self, full_name: &str, caller: &str) -> Result<&T, ApiError> {
        let entry = self
            .instance
            .get_mut(full_name)
            .or_else(|| self.process.get_mut(full_name))
            .ok_or_else(|| ApiError::Unknown(full_name.to_string()))?;
        entry.record_call(caller);
        Ok(&entry.target)
    }

    /// Removes every entry under a top-level namespace; returns how
    /// many were removed.
    pub fn remove_top_level(&mut self, top_level: &str) -> usize {
        let prefix = format!("{top_level}:");
        let mut removed = 0;
        for table in [&mut self.process, &mut self.instance] {
            let before = table.len();
            table.retain(|name, _| !name.starts_with(&prefix));
            removed += before - table.len();
        }
        removed
    }

    /// Removes every entry owned by `owner`, restoring any predecessor
    /// a forced registration displaced (unless the predecessor is also
    /// owned by `owner`).
    pub fn remove_owner(&mut self, owner: &PluginId) -> usize {
        let mut removed = 0;
        for table in [&mut self.process, &mut self.instance] {
            let names: Vec<String> = table
                .iter()
                .filter(|(_, e)| &e.owner == owner)
                .map(|(name, _)| name.clone())
                .collect();
            for name in names {
                if let Some(entry) = table.remove(&name) {
                    removed += 1;
                    if let Some(prev) = entry.overwritten {
                        if &prev.owner != owner {
                            table.insert(name, *prev);
                        }
                    }
                }
            }
        }
        removed
    }

    /// Sorted names, optionally limited to one top-level namespace.
    #[must_use]
    pub fn list(&self, top_level: Option<&str>) -> Vec<String> {
        let prefix = top_level.map(|t| format!("{t}:"));
        let mut names: Vec<String> = self
            .process
            .keys()
            .chain(self.instance.keys())
            .filter(|name| {
                prefix
                    .as_ref()
                    .map_or(true, |p| name.starts_with(p.as_str()))
            })
            .cloned()
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Introspection snapshot for a name, instance layer first.
    #[must_use]
    pub fn detail(&self, full_name: &str, top_callers: usize) -> Option<CapabilityDetail> {
        self.instance
            .get(full_name)
            .or_else(|| self.process.get(full_name))
            .map(|entry| entry.detail(top_callers))
    }

    /// Total number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.process.len() + self.instance.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.process.is_empty() && self.instance.is_empty()
    }
}
