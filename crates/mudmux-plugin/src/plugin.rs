//! The `Plugin` trait and factory.

use crate::core_api::CoreApi;
use crate::error::PluginError;
use crate::manifest::{CommandArgs, CommandOutcome, Registration};
use crate::meta::PluginMeta;
use crate::snapshot::PluginSnapshot;
use serde_json::Value;
use std::sync::Arc;

/// An in-process extension of the proxy.
///
/// Handlers take `&self`: plugins own their mutable state behind
/// interior mutability so the engine can re-enter them (a callback
/// raising an event that dispatches back into the same plugin is
/// legal). All handlers run synchronously on the dispatcher task and
/// must not block; long-running work belongs on a timer.
///
/// # Example
///
/// ```
/// use mudmux_plugin::{
///     CommandArgs, CommandOutcome, CoreApi, Plugin, PluginError, Registration, TriggerSpec,
/// };
///
/// struct GagPlugin;
///
/// impl Plugin for GagPlugin {
///     fn registrations(&self) -> Vec<Registration> {
///         vec![Registration::Trigger(
///             TriggerSpec::new("gag_spam", r"^\[SPAM\]").omit(),
///         )]
///     }
/// }
/// ```
pub trait Plugin: Send + Sync {
    /// The static manifest the loader walks at load time.
    fn registrations(&self) -> Vec<Registration> {
        Vec::new()
    }

    /// Runs right after instantiation, before the manifest walk.
    fn init(&self, _core: &mut dyn CoreApi) -> Result<(), PluginError> {
        Ok(())
    }

    /// Runs after the whole load batch completes - peers exist and
    /// may be called.
    fn initialize(&self, _core: &mut dyn CoreApi) -> Result<(), PluginError> {
        Ok(())
    }

    /// Persist state; invoked by `ev_plugin_save` and at unload.
    fn save(&self, _core: &mut dyn CoreApi) -> Result<(), PluginError> {
        Ok(())
    }

    /// Runs first during unload, while every registration is still in
    /// place.
    fn uninitialize(&self, _core: &mut dyn CoreApi) -> Result<(), PluginError> {
        Ok(())
    }

    /// Runs an event callback declared in the manifest.
    ///
    /// The current event's data record is reachable via
    /// [`CoreApi::current_event_record`].
    fn handle_event(&self, handler: &str, _core: &mut dyn CoreApi) -> Result<(), PluginError> {
        Err(PluginError::UnknownHandler(handler.to_string()))
    }

    /// Runs a capability endpoint declared in the manifest.
    fn call_endpoint(
        &self,
        handler: &str,
        _core: &mut dyn CoreApi,
        _args: Value,
    ) -> Result<Value, PluginError> {
        Err(PluginError::UnknownHandler(handler.to_string()))
    }

    /// Runs a command declared in the manifest.
    fn run_command(
        &self,
        handler: &str,
        _core: &mut dyn CoreApi,
        _args: &CommandArgs,
    ) -> Result<CommandOutcome, PluginError> {
        Err(PluginError::UnknownHandler(handler.to_string()))
    }

    /// Runs a timer callback declared in the manifest.
    fn fire_timer(&self, handler: &str, _core: &mut dyn CoreApi) -> Result<(), PluginError> {
        Err(PluginError::UnknownHandler(handler.to_string()))
    }

    /// Captures the attributes named in `attrs_to_save_on_reload`.
    fn snapshot_attrs(&self, _attrs: &[String]) -> PluginSnapshot {
        PluginSnapshot::new()
    }

    /// Restores a snapshot onto a freshly built instance.
    fn restore_attrs(&self, _snapshot: &PluginSnapshot) -> Result<(), PluginError> {
        Ok(())
    }
}

/// Builds plugin instances.
///
/// The factory is the Rust stand-in for importing a plugin package
/// from disk: discovery collects factories, load calls
/// [`build`](Self::build), and hot-reload calls it again for a fresh
/// instance.
pub trait PluginFactory: Send + Sync {
    /// The plugin's static metadata.
    fn meta(&self) -> PluginMeta;

    /// Creates a new instance.
    ///
    /// # Errors
    ///
    /// A construction failure marks the plugin failed; peers continue
    /// loading.
    fn build(&self) -> Result<Arc<dyn Plugin>, PluginError>;
}

/// Test utilities for plugin-hosting code.
#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::{BTreeMap, HashMap};

    type Handler = Box<dyn Fn(&ScriptedPlugin, &mut dyn CoreApi) -> Result<(), PluginError> + Send + Sync>;
    type CommandHandler =
        Box<dyn Fn(&ScriptedPlugin, &mut dyn CoreApi, &CommandArgs) -> Result<CommandOutcome, PluginError> + Send + Sync>;
    type EndpointHandler =
        Box<dyn Fn(&ScriptedPlugin, &mut dyn CoreApi, Value) -> Result<Value, PluginError> + Send + Sync>;

    /// A scriptable plugin for tests.
    ///
    /// Tracks per-handler invocation counts and carries a JSON state
    /// bag that participates in snapshot/restore, so reload tests can
    /// assert state carry-over.
    pub struct ScriptedPlugin {
        registrations: Vec<Registration>,
        calls: Mutex<BTreeMap<String, usize>>,
        state: Mutex<BTreeMap<String, Value>>,
        event_handlers: HashMap<String, Handler>,
        command_handlers: HashMap<String, CommandHandler>,
        endpoint_handlers: HashMap<String, EndpointHandler>,
        timer_handlers: HashMap<String, Handler>,
    }

    impl ScriptedPlugin {
        /// Creates a plugin with the given manifest and no behaviors.
        #[must_use]
        pub fn new(registrations: Vec<Registration>) -> Self {
            Self {
                registrations,
                calls: Mutex::new(BTreeMap::new()),
                state: Mutex::new(BTreeMap::new()),
                event_handlers: HashMap::new(),
                command_handlers: HashMap::new(),
                endpoint_handlers: HashMap::new(),
                timer_handlers: HashMap::new(),
            }
        }

        /// Attaches behavior to an event handler name.
        #[must_use]
        pub fn on_event(
            mut self,
            handler: &str,
            f: impl Fn(&ScriptedPlugin, &mut dyn CoreApi) -> Result<(), PluginError>
                + Send
                + Sync
                + 'static,
        ) -> Self {
            self.event_handlers.insert(handler.to_string(), Box::new(f));
            self
        }

        /// Attaches behavior to a command handler name.
        #[must_use]
        pub fn on_command(
            mut self,
            handler: &str,
            f: impl Fn(&ScriptedPlugin, &mut dyn CoreApi, &CommandArgs) -> Result<CommandOutcome, PluginError>
                + Send
                + Sync
                + 'static,
        ) -> Self {
            self.command_handlers.insert(handler.to_string(), Box::new(f));
            self
        }

        /// Attaches behavior to an endpoint handler name.
        #[must_use]
        pub fn on_endpoint(
            mut self,
            handler: &str,
            f: impl Fn(&ScriptedPlugin, &mut dyn CoreApi, Value) -> Result<Value, PluginError>
                + Send
                + Sync
                + 'static,
        ) -> Self {
            self.endpoint_handlers.insert(handler.to_string(), Box::new(f));
            self
        }

        /// Attaches behavior to a timer handler name.
        #[must_use]
        pub fn on_timer(
            mut self,
            handler: &str,
            f: impl Fn(&ScriptedPlugin, &mut dyn CoreApi) -> Result<(), PluginError>
                + Send
                + Sync
                + 'static,
        ) -> Self {
            self.timer_handlers.insert(handler.to_string(), Box::new(f));
            self
        }

        /// How many times `handler` ran (any dispatch kind).
        #[must_use]
        pub fn calls(&self, handler: &str) -> usize {
            self.calls.lock().get(handler).copied().unwrap_or(0)
        }

        /// Writes a state attribute.
        pub fn put_state(&self, name: &str, value: Value) {
            self.state.lock().insert(name.to_string(), value);
        }

        /// Reads a state attribute.
        #[must_use]
        pub fn get_state(&self, name: &str) -> Option<Value> {
            self.state.lock().get(name).cloned()
        }

        fn count(&self, handler: &str) {
            *self.calls.lock().entry(handler.to_string()).or_insert(0) += 1;
        }
    }

    impl Plugin for ScriptedPlugin {
        fn registrations(&self) -> Vec<Registration> {
            self.registrations.clone()
        }

        fn handle_event(&self, handler: &str, core: &mut dyn CoreApi) -> Result<(), PluginError> {
            self.count(handler);
            match self.event_handlers.get(handler) {
                Some(f) => f(self, core),
                None => Ok(()),
            }
        }

        fn call_endpoint(
            &self,
            handler: &str,
            core: &mut dyn CoreApi,
            args: Value,
        ) -> Result<Value, PluginError> {
            self.count(handler);
            match self.endpoint_handlers.get(handler) {
                Some(f) => f(self, core, args),
                None => Ok(Value::Null),
            }
        }

        fn run_command(
            &self,
            handler: &str,
            core: &mut dyn CoreApi,
            args: &CommandArgs,
        ) -> Result<CommandOutcome, PluginError> {
            self.count(handler);
            match self.command_handlers.get(handler) {
                Some(f) => f(self, core, args),
                None => Ok(CommandOutcome::ok(Vec::<String>::new())),
            }
        }

        fn fire_timer(&self, handler: &str, core: &mut dyn CoreApi) -> Result<(), PluginError> {
            self.count(handler);
            match self.timer_handlers.get(handler) {
                Some(f) => f(self, core),
                None => Ok(()),
            }
        }

        fn snapshot_attrs(&self, attrs: &[String]) -> PluginSnapshot {
            let state = self.state.lock();
            let mut snap = PluginSnapshot::new();
            for name in attrs {
                if let Some(value) = state.get(name) {
                    // Value is already JSON; storing it cannot fail.
                    let _ = snap.put(name, value);
                }
            }
            snap
        }

        fn restore_attrs(&self, snapshot: &PluginSnapshot) -> Result<(), PluginError> {
            let mut state = self.state.lock();
            for name in snapshot.names() {
                if let Some(value) = snapshot.get::<Value>(name) {
                    state.insert(name.to_string(), value);
                }
            }
            Ok(())
        }
    }

    /// A factory producing [`ScriptedPlugin`]s from a closure.
    pub struct ScriptedFactory {
        meta: PluginMeta,
        build: Box<dyn Fn() -> Arc<dyn Plugin> + Send + Sync>,
    }

    impl ScriptedFactory {
        /// Creates a factory from metadata and a builder closure.
        #[must_use]
        pub fn new(
            meta: PluginMeta,
            build: impl Fn() -> Arc<dyn Plugin> + Send + Sync + 'static,
        ) -> Self {
            Self {
                meta,
                build: Box::new(build),
            }
        }
    }

    impl PluginFactory for ScriptedFactory {
        fn meta(&self) -> PluginMeta {
            self.meta.clone()
        }

        fn build(&self) -> Result<Arc<dyn Plugin>, PluginError> {
            Ok((self.build)())
        }
    }

    /// A factory whose `build` always fails, for lifecycle-fault
    /// tests.
    pub struct FailingFactory {
        meta: PluginMeta,
    }

    impl FailingFactory {
        /// Creates the failing factory.
        #[must_use]
        pub fn new(meta: PluginMeta) -> Self {
            Self { meta }
        }
    }

    impl PluginFactory for FailingFactory {
        fn meta(&self) -> PluginMeta {
            self.meta.clone()
        }

        fn build(&self) -> Result<Arc<dyn Plugin>, PluginError> {
            Err(PluginError::Lifecycle("construction failed".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedPlugin;
    use super::*;
    use serde_json::json;

    #[test]
    fn scripted_plugin_counts_calls() {
        let plugin = ScriptedPlugin::new(Vec::new());
        assert_eq!(plugin.calls("on_line"), 0);
    }

    #[test]
    fn scripted_snapshot_round_trip() {
        let plugin = ScriptedPlugin::new(Vec::new());
        plugin.put_state("counter", json!(42));
        plugin.put_state("ignored", json!("x"));

        let snap = plugin.snapshot_attrs(&["counter".to_string()]);
        assert!(snap.contains("counter"));
        assert!(!snap.contains("ignored"));

        let fresh = ScriptedPlugin::new(Vec::new());
        fresh.restore_attrs(&snap).unwrap();
        assert_eq!(fresh.get_state("counter"), Some(json!(42)));
    }

    struct Bare;
    impl Plugin for Bare {}

    #[test]
    fn default_handlers_reject_unknown() {
        let plugin = Bare;
        assert!(plugin.registrations().is_empty());
        // A default plugin has no handlers at all.
        let snap = plugin.snapshot_attrs(&["x".to_string()]);
        assert!(snap.is_empty());
    }
}
