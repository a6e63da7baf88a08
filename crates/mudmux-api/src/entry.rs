//! Registry entries and their call-site accounting.

use mudmux_types::PluginId;
use std::collections::BTreeMap;

/// One registered endpoint.
#[derive(Debug, Clone)]
pub struct CapabilityEntry<T> {
    /// Fully-qualified name, `<top-level>:<sub.name>`.
    pub full_name: String,
    /// Owning plugin.
    pub owner: PluginId,
    /// What the runtime invokes for this entry.
    pub target: T,
    /// Human description.
    pub description: String,
    /// Instance-scoped entries shadow process-wide ones.
    pub instance_scoped: bool,
    /// Total calls.
    pub call_count: u64,
    /// Calls per caller id.
    pub callers: BTreeMap<String, u64>,
    /// The entry this one overwrote via `force`, if any.
    pub overwritten: Option<Box<CapabilityEntry<T>>>,
}

impl<T> CapabilityEntry<T> {
    /// Creates an entry with zeroed statistics.
    #[must_use]
    pub fn new(
        full_name: impl Into<String>,
        owner: PluginId,
        target: T,
        description: impl Into<String>,
        instance_scoped: bool,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            owner,
            target,
            description: description.into(),
            instance_scoped,
            call_count: 0,
            callers: BTreeMap::new(),
            overwritten: None,
        }
    }

    /// Records one call from `caller`.
    pub fn record_call(&mut self, caller: &str) {
        self.call_count += 1;
        *self.callers.entry(caller.to_string()).or_insert(0) += 1;
    }

    /// Snapshot for the detail surface.
    #[must_use]
    pub fn detail(&self, top_callers: usize) -> CapabilityDetail {
        let mut callers: Vec<(String, u64)> = self
            .callers
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        callers.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        callers.truncate(top_callers);

        CapabilityDetail {
            full_name: self.full_name.clone(),
            owner: self.owner.clone(),
            description: self.description.clone(),
            instance_scoped: self.instance_scoped,
            call_count: self.call_count,
            top_callers: callers,
            overwrote: self
                .overwritten
                .as_ref()
                .map(|prev| prev.owner.clone()),
        }
    }
}

/// Introspection snapshot of an entry.
#[derive(Debug, Clone)]
pub struct CapabilityDetail {
    /// Fully-qualified name.
    pub full_name: String,
    /// Owning plugin.
    pub owner: PluginId,
    /// Human description.
    pub description: String,
    /// Whether the entry is instance-scoped.
    pub instance_scoped: bool,
    /// Total calls.
    pub call_count: u64,
    /// Heaviest callers, descending.
    pub top_callers: Vec<(String, u64)>,
    /// Owner of the entry this one replaced, if any.
    pub overwrote: Option<PluginId>,
}
