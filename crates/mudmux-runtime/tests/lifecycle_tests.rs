//! Plugin lifecycle: dependency ordering, unload cleanup, and
//! hot-reload state carry-over.

mod common;

use common::*;
use mudmux_event::EventSpec;
use mudmux_plugin::testing::{FailingFactory, ScriptedFactory, ScriptedPlugin};
use mudmux_plugin::{
    CommandSpec, CoreApi, PluginMeta, PluginState, Registration, SettingSpec, TimerSpec,
    TriggerSpec,
};
use mudmux_types::{PluginId, SettingType, SettingValue};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

fn full_manifest() -> Vec<Registration> {
    vec![
        Registration::Event(EventSpec::new(
            "ev_{plugin_id}_something_happened",
            PluginId::new("placeholder"),
            "demo event",
        )),
        Registration::Callback {
            event: "ev_to_client_data_modify".into(),
            handler: "on_line".into(),
            priority: 50,
        },
        Registration::Endpoint {
            sub_name: "poke".into(),
            handler: "ep_poke".into(),
            description: "poke the demo plugin".into(),
            instance_scoped: false,
            force: false,
        },
        Registration::Command(CommandSpec::new("poke", "cmd_poke").description("poke")),
        Registration::Trigger(TriggerSpec::new("watch", r"^watched:")),
        Registration::Timer(TimerSpec::every("tick", "on_tick", 60)),
        Registration::Setting(SettingSpec::new(
            "demo_limit",
            SettingType::Int,
            SettingValue::Int(10),
            "a demo limit",
        )),
    ]
}

fn factory_with(
    id: &str,
    deps: &[&str],
    registrations: Vec<Registration>,
) -> (Arc<ScriptedFactory>, Arc<Mutex<Vec<Arc<ScriptedPlugin>>>>) {
    let mut meta = PluginMeta::new(id, id);
    for dep in deps {
        meta = meta.depends_on(*dep);
    }
    let built: Arc<Mutex<Vec<Arc<ScriptedPlugin>>>> = Arc::new(Mutex::new(Vec::new()));
    let built_in_closure = built.clone();
    let regs = registrations;
    let factory = ScriptedFactory::new(meta, move || {
        let plugin = Arc::new(ScriptedPlugin::new(regs.clone()));
        built_in_closure.lock().push(plugin.clone());
        plugin
    });
    (Arc::new(factory), built)
}

#[test]
fn load_then_unload_restores_every_table() {
    let mut core = test_core();
    let id = PluginId::new("plugins.test.full");

    let endpoints_before = core.list_endpoints(None);
    let events_before = core.event_bus().event_names().len();
    let triggers_before = core.trigger_engine().list().len();
    let timers_before = core.timer_wheel().list().len();

    let (factory, _built) = factory_with("plugins.test.full", &[], full_manifest());
    core.register_factory(factory);
    core.load_all().unwrap();

    assert!(core.is_loaded(&id));
    assert!(core.has_endpoint("plugins.test.full:poke"));
    assert!(core
        .event_bus()
        .has_event("ev_plugins.test.full_something_happened"));
    assert_eq!(core.trigger_engine().list().len(), triggers_before + 1);
    assert_eq!(core.timer_wheel().list().len(), timers_before + 1);
    assert_eq!(
        core.setting_get(&id, "demo_limit").unwrap(),
        SettingValue::Int(10)
    );

    core.unload_one(&id).unwrap();

    // Pointwise equality with the pre-load state, modulo event
    // definitions the plugin created (its declared event, its
    // trigger's event, its setting's change event) - definitions
    // survive; callbacks do not.
    assert_eq!(core.list_endpoints(None), endpoints_before);
    assert_eq!(core.event_bus().event_names().len(), events_before + 3);
    assert_eq!(core.trigger_engine().list().len(), triggers_before);
    assert_eq!(core.timer_wheel().list().len(), timers_before);
    assert!(core.setting_get(&id, "demo_limit").is_err());
    assert!(core
        .event_bus()
        .ordered_callbacks("ev_to_client_data_modify")
        .iter()
        .all(|(_, cb)| cb.owner != id));
    assert!(!core.is_loaded(&id));
}

#[test]
fn dependencies_load_first() {
    let mut core = test_core();
    let order: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    for (id, deps) in [
        ("plugins.test.c", vec!["plugins.test.b"]),
        ("plugins.test.a", vec![]),
        ("plugins.test.b", vec!["plugins.test.a"]),
    ] {
        let mut meta = PluginMeta::new(id, id);
        for dep in deps {
            meta = meta.depends_on(dep);
        }
        let order_handle = order.clone();
        let id_owned = id.to_string();
        let factory = ScriptedFactory::new(meta, move || {
            order_handle.lock().push(id_owned.clone());
            Arc::new(ScriptedPlugin::new(Vec::new()))
        });
        core.register_factory(Arc::new(factory));
    }

    core.load_all().unwrap();
    assert_eq!(
        order.lock().clone(),
        vec!["plugins.test.a", "plugins.test.b", "plugins.test.c"]
    );
}

#[test]
fn missing_dependency_skips_plugin_only() {
    let mut core = test_core();

    let (ok_factory, _) = factory_with("plugins.test.ok", &[], Vec::new());
    let (broken_factory, _) =
        factory_with("plugins.test.broken", &["plugins.test.absent"], Vec::new());
    core.register_factory(ok_factory);
    core.register_factory(broken_factory);

    core.load_all().unwrap();

    assert!(core.is_loaded(&PluginId::new("plugins.test.ok")));
    let broken = core
        .plugin_info(&PluginId::new("plugins.test.broken"))
        .unwrap();
    assert_eq!(broken.state, PluginState::NotImported);
}

#[test]
fn dependency_cycle_aborts_batch() {
    let mut core = test_core();

    let (a, _) = factory_with("plugins.test.a", &["plugins.test.b"], Vec::new());
    let (b, _) = factory_with("plugins.test.b", &["plugins.test.a"], Vec::new());
    core.register_factory(a);
    core.register_factory(b);

    assert!(core.load_all().is_err());
    assert!(!core.is_loaded(&PluginId::new("plugins.test.a")));
    assert!(!core.is_loaded(&PluginId::new("plugins.test.b")));
}

#[test]
fn failed_construction_marks_failed_and_peers_continue() {
    let mut core = test_core();

    core.register_factory(Arc::new(FailingFactory::new(PluginMeta::new(
        "plugins.test.bad",
        "Bad",
    ))));
    let (ok, _) = factory_with("plugins.test.ok", &[], Vec::new());
    core.register_factory(ok);

    core.load_all().unwrap();

    assert!(core.is_loaded(&PluginId::new("plugins.test.ok")));
    assert_eq!(
        core.plugin_info(&PluginId::new("plugins.test.bad"))
            .unwrap()
            .state,
        PluginState::Failed
    );
}

#[test]
fn reload_preserves_declared_attributes() {
    let mut core = test_core();
    let id = PluginId::new("plugins.test.stateful");

    let meta = PluginMeta::new("plugins.test.stateful", "Stateful").save_on_reload(["counter"]);
    let built: Arc<Mutex<Vec<Arc<ScriptedPlugin>>>> = Arc::new(Mutex::new(Vec::new()));
    let built_handle = built.clone();
    let factory = ScriptedFactory::new(meta, move || {
        let plugin = Arc::new(ScriptedPlugin::new(vec![Registration::Endpoint {
            sub_name: "probe".into(),
            handler: "ep_probe".into(),
            description: String::new(),
            instance_scoped: false,
            force: false,
        }]));
        built_handle.lock().push(plugin.clone());
        plugin
    });
    core.register_factory(Arc::new(factory));
    core.load_all().unwrap();

    built.lock()[0].put_state("counter", json!(42));
    built.lock()[0].put_state("scratch", json!("gone"));

    core.reload_plugin(&id).unwrap();

    let instances = built.lock();
    assert_eq!(instances.len(), 2, "reload built a fresh instance");
    let fresh = &instances[1];
    assert!(!Arc::ptr_eq(&instances[0], fresh));

    // Declared attribute carried over; undeclared did not.
    assert_eq!(fresh.get_state("counter"), Some(json!(42)));
    assert_eq!(fresh.get_state("scratch"), None);

    // Endpoints were re-registered.
    assert!(core.has_endpoint("plugins.test.stateful:probe"));
    assert!(core.is_loaded(&id));
}

#[test]
fn reload_without_reload_dependents_keeps_peer_callbacks() {
    let mut core = test_core();
    let p = PluginId::new("plugins.test.p");

    let (p_factory, _) = factory_with("plugins.test.p", &[], Vec::new());
    core.register_factory(p_factory);

    // Q depends on P and watches the to-client pipeline.
    let (q_factory, q_built) = factory_with(
        "plugins.test.q",
        &["plugins.test.p"],
        vec![Registration::Callback {
            event: "ev_to_client_data_modify".into(),
            handler: "on_line".into(),
            priority: 50,
        }],
    );
    core.register_factory(q_factory);
    core.load_all().unwrap();

    core.reload_plugin(&p).unwrap();

    // Q was not reloaded and its callback still runs.
    assert_eq!(q_built.lock().len(), 1);
    let _client = logged_in_client(&mut core);
    mud_says(&mut core, "a line");
    assert_eq!(q_built.lock()[0].calls("on_line"), 1);
}

#[test]
fn reload_dependents_cascades() {
    let mut core = test_core();
    let p = PluginId::new("plugins.test.p");

    let meta = PluginMeta::new("plugins.test.p", "P").reload_dependents();
    let p_built: Arc<Mutex<Vec<Arc<ScriptedPlugin>>>> = Arc::new(Mutex::new(Vec::new()));
    let p_handle = p_built.clone();
    core.register_factory(Arc::new(ScriptedFactory::new(meta, move || {
        let plugin = Arc::new(ScriptedPlugin::new(Vec::new()));
        p_handle.lock().push(plugin.clone());
        plugin
    })));

    let (q_factory, q_built) = factory_with("plugins.test.q", &["plugins.test.p"], Vec::new());
    core.register_factory(q_factory);
    core.load_all().unwrap();

    core.reload_plugin(&p).unwrap();

    assert_eq!(p_built.lock().len(), 2);
    assert_eq!(q_built.lock().len(), 2, "dependent was reloaded too");
}

#[test]
fn required_plugins_refuse_unload() {
    let mut core = test_core();
    let id = PluginId::new("plugins.test.vital");

    let meta = PluginMeta::new("plugins.test.vital", "Vital").required();
    core.register_factory(Arc::new(ScriptedFactory::new(meta, || {
        Arc::new(ScriptedPlugin::new(Vec::new()))
    })));
    core.load_all().unwrap();

    assert!(core.unload_one(&id).is_err());
    assert!(core.is_loaded(&id));
}

#[test]
fn duplicate_setting_name_across_plugins_fails() {
    let mut core = test_core();

    let shared_setting = || {
        vec![Registration::Setting(SettingSpec::new(
            "shared_name",
            SettingType::Bool,
            SettingValue::Bool(true),
            "",
        ))]
    };
    let (first, _) = factory_with("plugins.test.first", &[], shared_setting());
    let (second, _) = factory_with("plugins.test.second", &[], shared_setting());
    core.register_factory(first);
    core.register_factory(second);
    core.load_all().unwrap();

    // Both plugins load; the second's colliding registration was
    // rejected, so only the first owns the name.
    let first_id = PluginId::new("plugins.test.first");
    let second_id = PluginId::new("plugins.test.second");
    let owners: Vec<bool> = [&first_id, &second_id]
        .iter()
        .map(|id| core.setting_get(id, "shared_name").is_ok())
        .collect();
    assert_eq!(owners.iter().filter(|ok| **ok).count(), 1);
}
