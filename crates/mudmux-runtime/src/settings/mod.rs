//! The typed, persisted, per-plugin settings store.
//!
//! Setting names are globally unique across plugins. Reads return the
//! current value coerced to the declared type; writes validate, update
//! the store, and flush. The change event is raised by the core after
//! a successful write (unless the setting is hidden) so the raise goes
//! through the normal dispatch path.

mod backend;

pub use backend::{JsonFileBackend, MemoryBackend, SettingsBackend};

use mudmux_plugin::{CoreError, SettingSpec, SettingValidator};
use mudmux_types::{PluginId, SettingType, SettingValue, ValueError};
use std::collections::{BTreeMap, HashMap};

/// Sentinel write value meaning "reset to the registered default".
pub const DEFAULT_SENTINEL: &str = "default";

/// The result of a successful write, used by the core to raise the
/// change event and compose user feedback.
#[derive(Debug, Clone)]
pub struct SettingChange {
    /// Owning plugin.
    pub plugin: PluginId,
    /// Setting name.
    pub name: String,
    /// Value before the write.
    pub old: SettingValue,
    /// Value after the write.
    pub new: SettingValue,
    /// Hidden settings skip the change event.
    pub hidden: bool,
    /// Message shown to the writer after the set.
    pub after_set_message: Option<String>,
}

/// The settings registry and value store.
pub struct SettingsEngine {
    backend: Box<dyn SettingsBackend>,
    specs: HashMap<PluginId, BTreeMap<String, SettingSpec>>,
    /// Global name uniqueness: name → owner.
    names: HashMap<String, PluginId>,
    values: HashMap<PluginId, BTreeMap<String, SettingValue>>,
    /// Custom-type validators by type name.
    validators: HashMap<&'static str, SettingValidator>,
}

impl SettingsEngine {
    /// Creates an engine over the given backend.
    #[must_use]
    pub fn new(backend: Box<dyn SettingsBackend>) -> Self {
        Self {
            backend,
            specs: HashMap::new(),
            names: HashMap::new(),
            values: HashMap::new(),
            validators: HashMap::new(),
        }
    }

    /// Registers a validator for a custom setting type. Settings
    /// declared as `SettingType::Custom(name)` coerce through it.
    pub fn register_validator(&mut self, type_name: &'static str, validator: SettingValidator) {
        self.validators.insert(type_name, validator);
    }

    /// Coerces raw text through the declared type, routing custom
    /// types to their validator.
    fn coerce(&self, ty: SettingType, raw: &str) -> Result<SettingValue, ValueError> {
        match ty {
            SettingType::Custom(name) => match self.validators.get(name) {
                Some(validator) => {
                    validator(raw).map_err(|message| ValueError::Invalid {
                        type_name: name.to_string(),
                        message,
                    })
                }
                None => Err(ValueError::NoValidator(name.to_string())),
            },
            _ => SettingValue::parse(ty, raw),
        }
    }

    /// Registers a setting for a plugin.
    ///
    /// The initial value is the persisted one when present and valid,
    /// otherwise the default.
    ///
    /// # Errors
    ///
    /// [`CoreError::DuplicateSetting`] when the name is taken by any
    /// plugin.
    pub fn register(&mut self, owner: &PluginId, spec: SettingSpec) -> Result<(), CoreError> {
        if let Some(existing_owner) = self.names.get(&spec.name) {
            return Err(CoreError::DuplicateSetting {
                name: spec.name.clone(),
                owner: existing_owner.clone(),
            });
        }

        // A persisted value re-enters through the type's own coercer;
        // anything that no longer fits falls back to the default.
        let initial = self
            .backend
            .get(owner, &spec.name)
            .and_then(|stored| serde_json::from_value::<SettingValue>(stored).ok())
            .and_then(|value| self.coerce(spec.setting_type, &value.to_string()).ok())
            .unwrap_or_else(|| spec.default.clone());

        self.names.insert(spec.name.clone(), owner.clone());
        self.values
            .entry(owner.clone())
            .or_default()
            .insert(spec.name.clone(), initial);
        self.specs
            .entry(owner.clone())
            .or_default()
            .insert(spec.name.clone(), spec);
        Ok(())
    }

    /// Reads a setting.
    ///
    /// # Errors
    ///
    /// [`CoreError::UnknownSetting`] when the plugin has no such
    /// setting.
    pub fn get(&self, plugin: &PluginId, name: &str) -> Result<SettingValue, CoreError> {
        self.values
            .get(plugin)
            .and_then(|m| m.get(name))
            .cloned()
            .ok_or_else(|| CoreError::UnknownSetting {
                plugin: plugin.clone(),
                name: name.to_string(),
            })
    }

    /// The spec for a setting, if registered.
    #[must_use]
    pub fn spec(&self, plugin: &PluginId, name: &str) -> Option<&SettingSpec> {
        self.specs.get(plugin).and_then(|m| m.get(name))
    }

    /// Validates and writes a setting; `"default"` resets to the
    /// registered default. The value is persisted and flushed before
    /// this returns.
    ///
    /// # Errors
    ///
    /// - [`CoreError::UnknownSetting`] for unregistered names
    /// - [`CoreError::ReadonlySetting`] for read-only settings
    /// - [`CoreError::Value`] when the raw text fails coercion
    pub fn set(
        &mut self,
        plugin: &PluginId,
        name: &str,
        raw: &str,
    ) -> Result<SettingChange, CoreError> {
        let spec = self
            .specs
            .get(plugin)
            .and_then(|m| m.get(name))
            .ok_or_else(|| CoreError::UnknownSetting {
                plugin: plugin.clone(),
                name: name.to_string(),
            })?;

        if spec.readonly {
            return Err(CoreError::ReadonlySetting {
                plugin: plugin.clone(),
                name: name.to_string(),
            });
        }

        let new = if raw == DEFAULT_SENTINEL {
            spec.default.clone()
        } else {
            self.coerce(spec.setting_type, raw)?
        };
        let hidden = spec.hidden;
        let after_set_message = spec.after_set_message.clone();

        let slot = self
            .values
            .get_mut(plugin)
            .and_then(|m| m.get_mut(name))
            .expect("spec exists, value map populated at registration");
        let old = std::mem::replace(slot, new.clone());

        self.backend.put(
            plugin,
            name,
            serde_json::to_value(&new).unwrap_or(serde_json::Value::Null),
        );
        if let Err(err) = self.backend.flush(plugin) {
            tracing::warn!(plugin = %plugin, setting = name, %err, "settings flush failed");
        }

        Ok(SettingChange {
            plugin: plugin.clone(),
            name: name.to_string(),
            old,
            new,
            hidden,
            after_set_message,
        })
    }

    /// Visible settings for a plugin, name-sorted.
    #[must_use]
    pub fn list(&self, plugin: &PluginId) -> Vec<(&SettingSpec, &SettingValue)> {
        let Some(specs) = self.specs.get(plugin) else {
            return Vec::new();
        };
        let values = self.values.get(plugin);
        specs
            .values()
            .filter(|spec| !spec.hidden)
            .filter_map(|spec| {
                values
                    .and_then(|m| m.get(&spec.name))
                    .map(|value| (spec, value))
            })
            .collect()
    }

    /// Plugins that have registered settings.
    #[must_use]
    pub fn plugins(&self) -> Vec<&PluginId> {
        self.specs.keys().collect()
    }

    /// Flushes one plugin's store.
    pub fn flush(&mut self, plugin: &PluginId) {
        if let Err(err) = self.backend.flush(plugin) {
            tracing::warn!(plugin = %plugin, %err, "settings flush failed");
        }
    }

    /// Flushes every plugin's store.
    pub fn flush_all(&mut self) {
        let plugins: Vec<PluginId> = self.specs.keys().cloned().collect();
        for plugin in plugins {
            self.flush(&plugin);
        }
    }

    /// Flushes and forgets a plugin's registrations. The persisted
    /// file stays for the next load.
    pub fn remove_owner(&mut self, plugin: &PluginId) {
        self.flush(plugin);
        if let Some(specs) = self.specs.remove(plugin) {
            for name in specs.keys() {
                self.names.remove(name);
            }
        }
        self.values.remove(plugin);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mudmux_types::SettingType;

    fn engine() -> SettingsEngine {
        SettingsEngine::new(Box::new(MemoryBackend::new()))
    }

    fn owner() -> PluginId {
        PluginId::new("plugins.test")
    }

    fn prefix_spec() -> SettingSpec {
        SettingSpec::new(
            "command_prefix",
            SettingType::Str,
            SettingValue::Str("#bp".into()),
            "client command prefix",
        )
    }

    #[test]
    fn register_read_default() {
        let mut engine = engine();
        engine.register(&owner(), prefix_spec()).unwrap();
        assert_eq!(
            engine.get(&owner(), "command_prefix").unwrap(),
            SettingValue::Str("#bp".into())
        );
    }

    #[test]
    fn names_are_globally_unique() {
        let mut engine = engine();
        engine.register(&owner(), prefix_spec()).unwrap();
        let err = engine
            .register(&PluginId::new("plugins.other"), prefix_spec())
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateSetting { .. }));
    }

    #[test]
    fn write_then_read_returns_coerced_value() {
        let mut engine = engine();
        engine
            .register(
                &owner(),
                SettingSpec::new(
                    "retries",
                    SettingType::Int,
                    SettingValue::Int(3),
                    "retry count",
                ),
            )
            .unwrap();

        let change = engine.set(&owner(), "retries", " 7 ").unwrap();
        assert_eq!(change.old, SettingValue::Int(3));
        assert_eq!(change.new, SettingValue::Int(7));
        assert_eq!(engine.get(&owner(), "retries").unwrap(), SettingValue::Int(7));
    }

    #[test]
    fn default_sentinel_resets() {
        let mut engine = engine();
        engine.register(&owner(), prefix_spec()).unwrap();
        engine.set(&owner(), "command_prefix", "@px").unwrap();

        let change = engine.set(&owner(), "command_prefix", "default").unwrap();
        assert_eq!(change.old, SettingValue::Str("@px".into()));
        assert_eq!(change.new, SettingValue::Str("#bp".into()));
    }

    #[test]
    fn bad_value_rejected_without_state_change() {
        let mut engine = engine();
        engine
            .register(
                &owner(),
                SettingSpec::new("limit", SettingType::Int, SettingValue::Int(5), ""),
            )
            .unwrap();

        assert!(engine.set(&owner(), "limit", "many").is_err());
        assert_eq!(engine.get(&owner(), "limit").unwrap(), SettingValue::Int(5));
    }

    #[test]
    fn readonly_rejects_writes() {
        let mut engine = engine();
        engine
            .register(
                &owner(),
                SettingSpec::new(
                    "proto",
                    SettingType::Str,
                    SettingValue::Str("telnet".into()),
                    "",
                )
                .readonly(),
            )
            .unwrap();
        assert!(matches!(
            engine.set(&owner(), "proto", "x"),
            Err(CoreError::ReadonlySetting { .. })
        ));
    }

    #[test]
    fn unregister_frees_the_name() {
        let mut engine = engine();
        engine.register(&owner(), prefix_spec()).unwrap();
        engine.remove_owner(&owner());
        assert!(engine
            .register(&PluginId::new("plugins.other"), prefix_spec())
            .is_ok());
    }

    #[test]
    fn persisted_value_survives_reregistration() {
        let mut engine = engine();
        engine.register(&owner(), prefix_spec()).unwrap();
        engine.set(&owner(), "command_prefix", "@px").unwrap();
        engine.remove_owner(&owner());

        engine.register(&owner(), prefix_spec()).unwrap();
        assert_eq!(
            engine.get(&owner(), "command_prefix").unwrap(),
            SettingValue::Str("@px".into())
        );
    }

    #[test]
    fn custom_type_routes_through_validator() {
        let mut engine = engine();
        engine.register_validator(
            "direction",
            Box::new(|raw| match raw {
                "n" | "s" | "e" | "w" => Ok(SettingValue::Str(raw.to_string())),
                other => Err(format!("{other:?} is not a compass direction")),
            }),
        );
        engine
            .register(
                &owner(),
                SettingSpec::new(
                    "home_dir",
                    SettingType::Custom("direction"),
                    SettingValue::Str("n".into()),
                    "direction of home",
                ),
            )
            .unwrap();

        engine.set(&owner(), "home_dir", "s").unwrap();
        assert_eq!(
            engine.get(&owner(), "home_dir").unwrap(),
            SettingValue::Str("s".into())
        );
        assert!(engine.set(&owner(), "home_dir", "up").is_err());
    }

    #[test]
    fn custom_type_without_validator_rejects_writes() {
        let mut engine = engine();
        engine
            .register(
                &owner(),
                SettingSpec::new(
                    "odd",
                    SettingType::Custom("unregistered"),
                    SettingValue::Str(String::new()),
                    "",
                ),
            )
            .unwrap();
        assert!(engine.set(&owner(), "odd", "x").is_err());
    }

    #[test]
    fn hidden_settings_skip_listing() {
        let mut engine = engine();
        engine
            .register(
                &owner(),
                SettingSpec::new(
                    "secret",
                    SettingType::Str,
                    SettingValue::Str(String::new()),
                    "",
                )
                .hidden(),
            )
            .unwrap();
        engine.register(&owner(), prefix_spec()).unwrap();

        let listed: Vec<&str> = engine
            .list(&owner())
            .into_iter()
            .map(|(spec, _)| spec.name.as_str())
            .collect();
        assert_eq!(listed, vec!["command_prefix"]);
    }
}
