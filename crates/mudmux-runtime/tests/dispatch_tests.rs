//! Event dispatch semantics through the full core: ordering,
//! re-entrancy, fault isolation, and capability invocation.

mod common;

use common::*;
use mudmux_event::{EventDataRecord, EventSpec};
use mudmux_plugin::testing::{ScriptedFactory, ScriptedPlugin};
use mudmux_plugin::{CoreApi, PluginError, PluginMeta, Registration};
use mudmux_types::PluginId;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

fn install_as(
    core: &mut mudmux_runtime::ProxyCore,
    id: &str,
    plugin: Arc<ScriptedPlugin>,
) -> PluginId {
    let factory = ScriptedFactory::new(PluginMeta::new(id, id), move || plugin.clone());
    core.register_factory(Arc::new(factory));
    core.load_all().unwrap();
    PluginId::new(id)
}

fn demo_event(core: &mut mudmux_runtime::ProxyCore, name: &str) {
    core.register_event(EventSpec::new(name, PluginId::new("plugins.test.host"), "demo"))
        .unwrap();
}

#[test]
fn callbacks_run_in_priority_then_registration_order() {
    let mut core = test_core();
    demo_event(&mut core, "ev_demo");

    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let o1 = order.clone();
    let o2 = order.clone();
    let o3 = order.clone();

    let plugin = Arc::new(
        ScriptedPlugin::new(vec![
            Registration::Callback {
                event: "ev_demo".into(),
                handler: "late".into(),
                priority: 75,
            },
            Registration::Callback {
                event: "ev_demo".into(),
                handler: "first_at_ten".into(),
                priority: 10,
            },
            Registration::Callback {
                event: "ev_demo".into(),
                handler: "second_at_ten".into(),
                priority: 10,
            },
        ])
        .on_event("late", move |_, _| {
            o1.lock().push("late");
            Ok(())
        })
        .on_event("first_at_ten", move |_, _| {
            o2.lock().push("first_at_ten");
            Ok(())
        })
        .on_event("second_at_ten", move |_, _| {
            o3.lock().push("second_at_ten");
            Ok(())
        }),
    );
    install_as(&mut core, "plugins.test.order", plugin);

    core.raise_event("ev_demo", EventDataRecord::new("ev_demo"), "test")
        .unwrap();

    assert_eq!(
        order.lock().clone(),
        vec!["first_at_ten", "second_at_ten", "late"]
    );
}

#[test]
fn faulting_callback_does_not_stop_dispatch() {
    let mut core = test_core();
    demo_event(&mut core, "ev_demo");

    let plugin = Arc::new(
        ScriptedPlugin::new(vec![
            Registration::Callback {
                event: "ev_demo".into(),
                handler: "boom".into(),
                priority: 10,
            },
            Registration::Callback {
                event: "ev_demo".into(),
                handler: "after".into(),
                priority: 50,
            },
        ])
        .on_event("boom", |_, _| Err(PluginError::msg("deliberate fault"))),
    );
    install_as(&mut core, "plugins.test.faulty", plugin.clone());

    core.raise_event("ev_demo", EventDataRecord::new("ev_demo"), "test")
        .unwrap();

    assert_eq!(plugin.calls("boom"), 1);
    assert_eq!(plugin.calls("after"), 1);
}

#[test]
fn reentrant_raise_stacks_current_event_records() {
    let mut core = test_core();
    demo_event(&mut core, "ev_outer");
    demo_event(&mut core, "ev_inner");

    let plugin = Arc::new(
        ScriptedPlugin::new(vec![
            Registration::Callback {
                event: "ev_outer".into(),
                handler: "outer".into(),
                priority: 50,
            },
            Registration::Callback {
                event: "ev_inner".into(),
                handler: "inner".into(),
                priority: 50,
            },
        ])
        .on_event("outer", |plugin, core| {
            plugin.put_state("stack_in_outer", json!(core.event_stack()));
            core.raise_event("ev_inner", EventDataRecord::new("ev_inner"), "outer")
                .map_err(|e| PluginError::msg(e.to_string()))?;
            // Back out of the inner raise, the outer record is the
            // current one again.
            let current = core.current_event_record().expect("outer record");
            plugin.put_state("current_after_inner", json!(current.lock().event()));
            Ok(())
        })
        .on_event("inner", |plugin, core| {
            plugin.put_state("stack_in_inner", json!(core.event_stack()));
            let current = core.current_event_record().expect("inner record");
            plugin.put_state("current_in_inner", json!(current.lock().event()));
            Ok(())
        }),
    );
    install_as(&mut core, "plugins.test.nested", plugin.clone());

    core.raise_event("ev_outer", EventDataRecord::new("ev_outer"), "test")
        .unwrap();

    assert_eq!(
        plugin.get_state("stack_in_outer"),
        Some(json!(["ev_outer"]))
    );
    assert_eq!(
        plugin.get_state("stack_in_inner"),
        Some(json!(["ev_outer", "ev_inner"]))
    );
    assert_eq!(plugin.get_state("current_in_inner"), Some(json!("ev_inner")));
    assert_eq!(
        plugin.get_state("current_after_inner"),
        Some(json!("ev_outer"))
    );
    // Dispatch fully unwound.
    assert!(core.event_stack().is_empty());
}

#[test]
fn callback_registered_mid_dispatch_runs_in_same_raise() {
    let mut core = test_core();
    demo_event(&mut core, "ev_demo");

    let plugin = Arc::new(
        ScriptedPlugin::new(vec![Registration::Callback {
            event: "ev_demo".into(),
            handler: "registrar".into(),
            priority: 50,
        }])
        .on_event("registrar", |_, core| {
            let owner = PluginId::new("plugins.test.mid");
            core.register_callback("ev_demo", &owner, "late_joiner", 10)
                .map_err(|e| PluginError::msg(e.to_string()))?;
            Ok(())
        }),
    );
    install_as(&mut core, "plugins.test.mid", plugin.clone());

    core.raise_event("ev_demo", EventDataRecord::new("ev_demo"), "test")
        .unwrap();

    // The late joiner ran in a later pass of the same raise, despite
    // its earlier priority.
    assert_eq!(plugin.calls("registrar"), 1);
    assert_eq!(plugin.calls("late_joiner"), 1);

    // On the next raise it runs normally (and only once).
    core.raise_event("ev_demo", EventDataRecord::new("ev_demo"), "test")
        .unwrap();
    assert_eq!(plugin.calls("late_joiner"), 2);
}

#[test]
fn register_unregister_round_trip_via_core_api() {
    let mut core = test_core();
    demo_event(&mut core, "ev_demo");
    let owner = PluginId::new("plugins.test.rt");

    assert!(core.register_callback("ev_demo", &owner, "h", 50).unwrap());
    assert!(!core.register_callback("ev_demo", &owner, "h", 50).unwrap());
    assert!(core.unregister_callback("ev_demo", &owner, "h").unwrap());
    assert!(!core.unregister_callback("ev_demo", &owner, "h").unwrap());
    assert!(core
        .event_bus()
        .get("ev_demo")
        .unwrap()
        .is_empty());
}

#[test]
fn duplicate_event_registration_is_rejected() {
    let mut core = test_core();
    demo_event(&mut core, "ev_demo");
    let err = core
        .register_event(EventSpec::new(
            "ev_demo",
            PluginId::new("plugins.test.other"),
            "clash",
        ))
        .unwrap_err();
    assert!(err.to_string().contains("already exists"));
}

#[test]
fn raise_counts_and_history_accumulate() {
    let mut core = test_core();
    demo_event(&mut core, "ev_demo");

    for _ in 0..3 {
        core.raise_event("ev_demo", EventDataRecord::new("ev_demo"), "test")
            .unwrap();
    }

    let event = core.event_bus().get("ev_demo").unwrap();
    assert_eq!(event.raise_count(), 3);
    assert_eq!(event.history().len(), 3);
}

#[test]
fn endpoint_call_routes_to_plugin_and_counts_callers() {
    let mut core = test_core();

    let plugin = Arc::new(
        ScriptedPlugin::new(vec![Registration::Endpoint {
            sub_name: "alias.expand".into(),
            handler: "ep_expand".into(),
            description: "expand an alias".into(),
            instance_scoped: false,
            force: false,
        }])
        .on_endpoint("ep_expand", |_, _, args| {
            let input = args.get("input").and_then(|v| v.as_str()).unwrap_or("");
            Ok(json!({ "expanded": format!("{input} expanded") }))
        }),
    );
    install_as(&mut core, "plugins.test.alias", plugin);

    let caller = PluginId::new("plugins.test.caller");
    let result = core
        .call(
            "plugins.test.alias:alias.expand",
            &caller,
            json!({ "input": "gg" }),
        )
        .unwrap();
    assert_eq!(result, json!({ "expanded": "gg expanded" }));

    let detail = core.endpoint_detail("plugins.test.alias:alias.expand").unwrap();
    assert_eq!(detail.call_count, 1);
    assert_eq!(
        detail.top_callers,
        vec![("plugins.test.caller".to_string(), 1)]
    );
}

#[test]
fn core_endpoints_are_callable_by_name() {
    let mut core = test_core();
    let caller = PluginId::new("plugins.test.caller");

    let result = core
        .call(
            "plugins.core.settings:get",
            &caller,
            json!({ "plugin": "plugins.core.proxy", "name": "command_prefix" }),
        )
        .unwrap();
    assert_eq!(result, json!("#bp"));

    core.call(
        "plugins.core.settings:set",
        &caller,
        json!({ "plugin": "plugins.core.proxy", "name": "command_prefix", "value": "@px" }),
    )
    .unwrap();
    let prefix = core
        .setting_get(&PluginId::new("plugins.core.proxy"), "command_prefix")
        .unwrap();
    assert_eq!(prefix.as_str(), Some("@px"));
}

#[test]
fn unknown_endpoint_is_an_error() {
    let mut core = test_core();
    let caller = PluginId::new("plugins.test.caller");
    assert!(core.call("plugins.missing:nope", &caller, json!({})).is_err());
}
