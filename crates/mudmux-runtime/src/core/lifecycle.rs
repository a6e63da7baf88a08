//! Plugin lifecycle: discovery, dependency-ordered load, unload,
//! hot-reload with state carry-over, and teardown.

use super::{EndpointTarget, ProxyCore};
use crate::commands::CommandTarget;
use mudmux_event::{names, EventDataRecord};
use mudmux_plugin::{
    CoreApi, CoreError, PluginError, PluginFactory, PluginInfo, PluginState, Registration,
};
use mudmux_types::PluginId;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

impl ProxyCore {
    // ── Discovery ────────────────────────────────────────────

    /// Registers a plugin factory; the plugin starts `not-imported`.
    pub fn register_factory(&mut self, factory: Arc<dyn PluginFactory>) {
        let meta = factory.meta();
        let id = meta.id.clone();
        tracing::debug!(plugin = %id, "plugin discovered");
        self.infos.insert(id.clone(), PluginInfo::discovered(meta));
        self.factories.insert(id, factory);
    }

    // ── Load ─────────────────────────────────────────────────

    /// Loads every `not-imported` plugin in dependency order, then
    /// runs `initialize` on the batch.
    pub fn load_all(&mut self) -> Result<(), CoreError> {
        let batch: Vec<PluginId> = self
            .infos
            .iter()
            .filter(|(_, info)| info.state == PluginState::NotImported)
            .map(|(id, _)| id.clone())
            .collect();
        self.load_batch(batch)
    }

    /// Loads the given plugins in dependency order.
    ///
    /// A missing dependency skips that plugin (it stays
    /// `not-imported`); a dependency cycle aborts the whole batch.
    /// After every plugin loads, reload snapshots are restored and
    /// `initialize` runs for each - so initialize always sees all
    /// peers of its batch.
    pub fn load_batch(&mut self, batch: Vec<PluginId>) -> Result<(), CoreError> {
        let order = self.dependency_order(&batch)?;

        let mut loaded = Vec::new();
        for id in order {
            match self.load_one(&id) {
                Ok(()) => loaded.push(id),
                Err(err) => {
                    tracing::error!(plugin = %id, %err, "plugin load failed");
                }
            }
        }

        for id in &loaded {
            let Some(instance) = self.instances.get(id).cloned() else {
                continue;
            };
            if let Some(snapshot) = self.reload_scratch.remove(id) {
                if let Err(err) = instance.restore_attrs(&snapshot) {
                    tracing::warn!(plugin = %id, %err, "reload snapshot restore failed");
                }
            }
            if let Err(err) = instance.initialize(self) {
                tracing::error!(plugin = %id, %err, "initialize hook faulted");
            }
        }
        Ok(())
    }

    /// Topological order of `batch` by declared dependencies.
    ///
    /// Dependencies outside the batch must already be loaded.
    fn dependency_order(&self, batch: &[PluginId]) -> Result<Vec<PluginId>, CoreError> {
        let in_batch: HashSet<&PluginId> = batch.iter().collect();
        let mut admitted: Vec<&PluginId> = Vec::new();

        // Reject plugins whose out-of-batch dependencies are absent.
        for id in batch {
            let Some(info) = self.infos.get(id) else {
                return Err(CoreError::UnknownPlugin(id.clone()));
            };
            let missing = info.meta.dependencies.iter().find(|dep| {
                !in_batch.contains(dep) && !self.is_loaded(dep)
            });
            match missing {
                Some(dep) => {
                    tracing::error!(
                        plugin = %id,
                        dependency = %dep,
                        "dependency not available, plugin stays not-imported"
                    );
                }
                None => admitted.push(id),
            }
        }

        // Kahn's algorithm over the admitted subset.
        let admitted_set: HashSet<&PluginId> = admitted.iter().copied().collect();
        let mut indegree: HashMap<&PluginId, usize> = HashMap::new();
        let mut dependents: HashMap<&PluginId, Vec<&PluginId>> = HashMap::new();
        for &id in &admitted {
            let info = self.infos.get(id).expect("admitted above");
            let in_batch_deps = info
                .meta
                .dependencies
                .iter()
                .filter(|dep| admitted_set.contains(dep))
                .count();
            indegree.insert(id, in_batch_deps);
            for dep in &info.meta.dependencies {
                if let Some(dep_key) = admitted_set.get(dep) {
                    dependents.entry(*dep_key).or_default().push(id);
                }
            }
        }

        let mut ready: VecDeque<&PluginId> = {
            let mut zero: Vec<&PluginId> = indegree
                .iter()
                .filter(|(_, n)| **n == 0)
                .map(|(id, _)| *id)
                .collect();
            zero.sort();
            zero.into()
        };

        let mut order = Vec::new();
        while let Some(id) = ready.pop_front() {
            order.push(id.clone());
            for dependent in dependents.get(id).cloned().unwrap_or_default() {
                let n = indegree.get_mut(dependent).expect("admitted");
                *n -= 1;
                if *n == 0 {
                    ready.push_back(dependent);
                }
            }
        }

        if order.len() != admitted.len() {
            let stuck = admitted
                .iter()
                .map(|id| (*id).clone())
                .find(|id| !order.contains(id))
                .unwrap_or_else(|| PluginId::new("unknown"));
            return Err(CoreError::DependencyCycle(stuck));
        }
        Ok(order)
    }

    /// Loads one plugin: build, `init`, manifest walk, mark loaded,
    /// raise `ev_plugin_loaded`. `initialize` runs later, after the
    /// whole batch.
    fn load_one(&mut self, id: &PluginId) -> Result<(), CoreError> {
        let factory = self
            .factories
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::UnknownPlugin(id.clone()))?;

        let instance = match factory.build() {
            Ok(instance) => instance,
            Err(err) => {
                self.mark_state(id, PluginState::Failed);
                return Err(err.into());
            }
        };

        self.mark_state(id, PluginState::ImportedOnly);
        if let Some(info) = self.infos.get_mut(id) {
            info.imported_at = Some(chrono::Utc::now());
        }
        self.instances.insert(id.clone(), instance.clone());

        if let Err(err) = instance.init(self) {
            // A failed init aborts this plugin's load only.
            self.instances.remove(id);
            self.mark_state(id, PluginState::Failed);
            return Err(err.into());
        }

        for registration in instance.registrations() {
            if let Err(err) = self.apply_registration(id, registration) {
                tracing::error!(plugin = %id, %err, "registration failed");
            }
        }

        self.mark_state(id, PluginState::Loaded);
        self.load_order.push(id.clone());
        tracing::info!(plugin = %id, "plugin loaded");

        let data = EventDataRecord::new(names::PLUGIN_LOADED).with("plugin_id", id.as_str());
        self.raise_event_record(names::PLUGIN_LOADED, data, id.as_str())?;
        Ok(())
    }

    fn apply_registration(
        &mut self,
        owner: &PluginId,
        registration: Registration,
    ) -> Result<(), CoreError> {
        match registration {
            Registration::Event(mut spec) => {
                spec.creator = owner.clone();
                spec.name = spec.name.replace("{plugin_id}", owner.as_str());
                // Definitions survive unload, so a reload re-creates
                // its own events; that is not a collision.
                match self.bus.get(&spec.name) {
                    Some(existing) if existing.spec().creator == *owner => {
                        tracing::debug!(event = %spec.name, "event already exists from a previous load");
                    }
                    _ => self.bus.register_event(spec)?,
                }
            }
            Registration::Callback {
                event,
                handler,
                priority,
            } => {
                self.register_callback(&event, owner, &handler, priority)?;
            }
            Registration::Endpoint {
                sub_name,
                handler,
                description,
                instance_scoped,
                force,
            } => {
                self.registry.add(
                    owner.as_str(),
                    &sub_name,
                    owner.clone(),
                    EndpointTarget::Plugin {
                        owner: owner.clone(),
                        handler,
                    },
                    description,
                    instance_scoped,
                    force,
                )?;
            }
            Registration::Command(spec) => {
                let handler = spec.handler.clone();
                self.commands
                    .register(owner.clone(), spec, CommandTarget::Plugin { handler });
            }
            Registration::Trigger(spec) => {
                self.add_trigger(owner, spec)?;
            }
            Registration::Timer(spec) => {
                self.add_timer(owner, spec)?;
            }
            Registration::Setting(spec) => {
                self.register_setting(owner, spec)?;
            }
        }
        Ok(())
    }

    // ── Unload ───────────────────────────────────────────────

    /// Unloads one plugin, removing everything it owns atomically
    /// from the perspective of later dispatches.
    pub fn unload_one(&mut self, id: &PluginId) -> Result<(), CoreError> {
        let instance = self
            .instances
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::UnknownPlugin(id.clone()))?;

        if self
            .infos
            .get(id)
            .is_some_and(|info| info.meta.required)
        {
            return Err(
                PluginError::Lifecycle(format!("{id} is required and cannot be unloaded")).into(),
            );
        }

        if let Err(err) = instance.uninitialize(self) {
            tracing::warn!(plugin = %id, %err, "uninitialize hook faulted");
        }
        if let Err(err) = instance.save(self) {
            tracing::warn!(plugin = %id, %err, "save hook faulted");
        }

        let endpoints = self.registry.remove_owner(id);
        let callbacks = self.bus.remove_owner(id);
        let commands = self.commands.remove_owner(id);
        let triggers = self.triggers.remove_owner(id);
        let timers = self.timers.remove_owner(id);
        self.settings.remove_owner(id);

        self.instances.remove(id);
        self.load_order.retain(|loaded| loaded != id);
        self.mark_state(id, PluginState::NotImported);
        if let Some(info) = self.infos.get_mut(id) {
            info.imported_at = None;
        }

        tracing::info!(
            plugin = %id,
            endpoints,
            callbacks,
            commands,
            triggers,
            timers,
            "plugin unloaded"
        );

        let data = EventDataRecord::new(names::PLUGIN_UNLOADED).with("plugin_id", id.as_str());
        self.raise_event_record(names::PLUGIN_UNLOADED, data, id.as_str())?;
        Ok(())
    }

    // ── Hot-reload ───────────────────────────────────────────

    /// Hot-reloads a plugin: snapshot declared attributes, unload,
    /// re-instantiate, reload, restore before `initialize`.
    ///
    /// With `reload_dependents` set on the plugin's metadata, loaded
    /// dependents reload too. `initialize` hooks run only after every
    /// plugin in the reload set has been re-loaded.
    pub fn reload_plugin(&mut self, id: &PluginId) -> Result<(), CoreError> {
        let meta = self
            .infos
            .get(id)
            .map(|info| info.meta.clone())
            .ok_or_else(|| CoreError::UnknownPlugin(id.clone()))?;

        let mut reload_set = vec![id.clone()];
        if meta.reload_dependents {
            reload_set.extend(self.loaded_dependents_of(id));
        }

        // Snapshot declared attributes into the scratch store.
        for pid in &reload_set {
            let attrs = self
                .infos
                .get(pid)
                .map(|info| info.meta.attrs_to_save_on_reload.clone())
                .unwrap_or_default();
            if attrs.is_empty() {
                continue;
            }
            if let Some(instance) = self.instances.get(pid) {
                self.reload_scratch
                    .insert(pid.clone(), instance.snapshot_attrs(&attrs));
            }
        }

        // Unload in reverse load order.
        let mut unload_order: Vec<PluginId> = self
            .load_order
            .iter()
            .filter(|loaded| reload_set.contains(loaded))
            .cloned()
            .collect();
        unload_order.reverse();
        for pid in unload_order {
            if let Err(err) = self.unload_one(&pid) {
                tracing::error!(plugin = %pid, %err, "unload during reload failed");
            }
        }

        self.load_batch(reload_set)
    }

    /// Loaded plugins that (transitively) depend on `id`, in load
    /// order.
    fn loaded_dependents_of(&self, id: &PluginId) -> Vec<PluginId> {
        let mut closure: HashSet<PluginId> = HashSet::new();
        closure.insert(id.clone());
        let mut changed = true;
        while changed {
            changed = false;
            for loaded in &self.load_order {
                if closure.contains(loaded) {
                    continue;
                }
                let depends = self
                    .infos
                    .get(loaded)
                    .map(|info| {
                        info.meta
                            .dependencies
                            .iter()
                            .any(|dep| closure.contains(dep))
                    })
                    .unwrap_or(false);
                if depends {
                    closure.insert(loaded.clone());
                    changed = true;
                }
            }
        }
        self.load_order
            .iter()
            .filter(|loaded| *loaded != id && closure.contains(*loaded))
            .cloned()
            .collect()
    }

    // ── Save / reset / teardown ──────────────────────────────

    /// Raises `ev_plugin_save`, runs every save hook, flushes all
    /// settings.
    pub fn save_all(&mut self) {
        let data = EventDataRecord::new(names::PLUGIN_SAVE);
        if let Err(err) = self.raise_event_record(names::PLUGIN_SAVE, data, crate::ids::PLUGINM) {
            tracing::warn!(%err, "plugin save event failed");
        }
        for id in self.load_order.clone() {
            if let Some(instance) = self.instances.get(&id).cloned() {
                if let Err(err) = instance.save(self) {
                    tracing::warn!(plugin = %id, %err, "save hook faulted");
                }
            }
        }
        self.settings.flush_all();
    }

    /// Resets every visible setting of a plugin to its default and
    /// raises `ev_plugin_reset`. Returns how many settings changed.
    pub fn reset_plugin_settings(&mut self, id: &PluginId) -> Result<usize, CoreError> {
        let settings: Vec<String> = self
            .settings
            .list(id)
            .into_iter()
            .map(|(spec, _)| spec.name.clone())
            .collect();
        if settings.is_empty() {
            return Err(CoreError::UnknownSetting {
                plugin: id.clone(),
                name: "*".to_string(),
            });
        }

        let mut reset = 0;
        for name in settings {
            match self.apply_setting(id, &name, crate::settings::DEFAULT_SENTINEL, crate::ids::PLUGINM)
            {
                Ok(_) => reset += 1,
                Err(err) => tracing::warn!(plugin = %id, setting = %name, %err, "reset failed"),
            }
        }

        let data = EventDataRecord::new(names::PLUGIN_RESET).with("plugin_id", id.as_str());
        self.raise_event_record(names::PLUGIN_RESET, data, crate::ids::PLUGINM)?;
        Ok(reset)
    }

    /// Unloads every plugin in reverse load order and flushes
    /// settings; runs at proxy shutdown before sockets close.
    pub fn shutdown(&mut self) {
        let mut order = self.load_order.clone();
        order.reverse();
        for id in order {
            // Required plugins do come down at shutdown.
            if let Some(info) = self.infos.get_mut(&id) {
                info.meta.required = false;
            }
            if let Err(err) = self.unload_one(&id) {
                tracing::warn!(plugin = %id, %err, "unload at shutdown failed");
            }
        }
        self.settings.flush_all();
    }

    fn mark_state(&mut self, id: &PluginId, state: PluginState) {
        if let Some(info) = self.infos.get_mut(id) {
            info.state = state;
        }
    }
}
