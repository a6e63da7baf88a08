//! End-to-end pipeline scenarios: commands, aliases, gags, trigger
//! priorities, settings changes, and the login gates.

mod common;

use common::*;
use mudmux_plugin::testing::{ScriptedFactory, ScriptedPlugin};
use mudmux_plugin::{CoreApi, PluginMeta, Registration, TriggerSpec};
use mudmux_record::UpdateContext;
use mudmux_runtime::net::TelnetFrame;
use mudmux_types::PluginId;
use serde_json::json;
use std::sync::Arc;

/// Installs a prebuilt scripted plugin and loads it.
fn install(core: &mut mudmux_runtime::ProxyCore, plugin: Arc<ScriptedPlugin>) {
    let factory = ScriptedFactory::new(PluginMeta::new("plugins.test.demo", "Demo"), move || {
        plugin.clone()
    });
    core.register_factory(Arc::new(factory));
    core.load_all().unwrap();
}

// ── Scenario: client types a command ─────────────────────────

#[test]
fn command_line_reaches_client_not_mud() {
    let mut core = test_core();
    let mut mud = connect_mud(&mut core);
    let mut client = logged_in_client(&mut core);

    client_says(&mut core, &client, "#bp.commands.list");

    // The mud receives nothing.
    assert_eq!(drain_mud(&mut mud), "");

    // The client receives a preambled, CRLF-terminated listing.
    let output = client.drain();
    assert!(output.contains("#BP:"), "missing preamble: {output:?}");
    assert!(output.contains("plugins.core.commands"), "{output:?}");
    assert!(output.contains("\r\n"));
}

#[test]
fn unknown_plugin_command_errors_to_client() {
    let mut core = test_core();
    let mut mud = connect_mud(&mut core);
    let mut client = logged_in_client(&mut core);

    client_says(&mut core, &client, "#bp.nosuchplugin.do");

    assert_eq!(drain_mud(&mut mud), "");
    let output = client.drain();
    assert!(output.contains("no plugin matches"), "{output:?}");
}

#[test]
fn ambiguous_abbreviation_lists_candidates() {
    let mut core = test_core();
    let mut client = logged_in_client(&mut core);

    // "t" is a prefix of both "triggers" and "timers".
    client_says(&mut core, &client, "#bp.t.list");

    let output = client.drain();
    assert!(output.contains("matches several plugins"), "{output:?}");
    assert!(output.contains("plugins.core.triggers"), "{output:?}");
    assert!(output.contains("plugins.core.timers"), "{output:?}");
}

#[test]
fn history_rerun_repeats_last_command() {
    let mut core = test_core();
    let mut client = logged_in_client(&mut core);

    client_says(&mut core, &client, "#bp.pluginm.list");
    let first = client.drain();
    assert!(first.contains("known plugins"));

    client_says(&mut core, &client, "#bp.!");
    let rerun = client.drain();
    assert!(rerun.contains("known plugins"), "{rerun:?}");
}

#[test]
fn non_historable_commands_stay_out_of_history() {
    let mut core = test_core();
    let mut client = logged_in_client(&mut core);

    client_says(&mut core, &client, "#bp.pluginm.list");
    client_says(&mut core, &client, "#bp.commands.history");
    client.drain();

    // `history` itself is flagged no-history: rerunning repeats
    // `pluginm.list`, not `history`.
    client_says(&mut core, &client, "#bp.!");
    let rerun = client.drain();
    assert!(rerun.contains("known plugins"), "{rerun:?}");
}

// ── Scenario: alias expansion ────────────────────────────────

#[test]
fn alias_plugin_rewrites_client_line() {
    let mut core = test_core();
    let mut mud = connect_mud(&mut core);

    let plugin = Arc::new(
        ScriptedPlugin::new(vec![Registration::Callback {
            event: "ev_to_mud_data_modify".into(),
            handler: "expand".into(),
            priority: 50,
        }])
        .on_event("expand", |_, core| {
            let Some(record) = core.current_event_record() else {
                return Ok(());
            };
            let Some(line) = record.lock().get_line("line") else {
                return Ok(());
            };
            let ctx = UpdateContext::new("plugins.test.demo");
            let mut l = line.lock();
            if l.text() == "gg" {
                l.set_text("get gold from corpse", &ctx).ok();
            }
            Ok(())
        }),
    );
    install(&mut core, plugin);

    let mut client = logged_in_client(&mut core);
    client_says(&mut core, &client, "gg");

    assert_eq!(drain_mud(&mut mud), "get gold from corpse\r\n");
    client.drain();
}

#[test]
fn separator_splits_into_multiple_mud_commands() {
    let mut core = test_core();
    let mut mud = connect_mud(&mut core);
    let client = logged_in_client(&mut core);

    client_says(&mut core, &client, "n|s|look");
    assert_eq!(drain_mud(&mut mud), "n\r\ns\r\nlook\r\n");
}

// ── Scenario: gag ────────────────────────────────────────────

#[test]
fn gag_trigger_suppresses_line_and_fires_once() {
    let mut core = test_core();

    let gag_event = "ev_core.triggers_t_plugins.test.demo_gag_spam";
    let plugin = Arc::new(
        ScriptedPlugin::new(vec![
            Registration::Trigger(TriggerSpec::new("gag_spam", r"^\[SPAM\]").omit()),
            Registration::Callback {
                event: gag_event.into(),
                handler: "on_gag".into(),
                priority: 50,
            },
            Registration::Callback {
                event: "ev_to_client_data_read".into(),
                handler: "on_read".into(),
                priority: 50,
            },
        ])
        .on_event("on_gag", |plugin, core| {
            let record = core.current_event_record().expect("current record");
            let name = record.lock().get_str("trigger_name").map(String::from);
            plugin.put_state("fired_for", json!(name));
            Ok(())
        })
        .on_event("on_read", |plugin, core| {
            let record = core.current_event_record().expect("current record");
            let count = record.lock().get_lines("lines").map_or(0, |l| l.len());
            plugin.put_state("delivered", json!(count));
            Ok(())
        }),
    );
    install(&mut core, plugin.clone());

    let mut client = logged_in_client(&mut core);
    mud_says(&mut core, "[SPAM]buy gold");

    // No client receives the line.
    let output = client.drain();
    assert!(!output.contains("buy gold"), "{output:?}");

    // The trigger's event fired exactly once with its name bound.
    assert_eq!(plugin.calls("on_gag"), 1);
    assert_eq!(plugin.get_state("fired_for"), Some(json!("gag_spam")));

    // The read event still fired, with an empty delivered set.
    assert!(plugin.calls("on_read") >= 1);
    assert_eq!(plugin.get_state("delivered"), Some(json!(0)));
}

#[test]
fn ungagged_mud_lines_reach_clients() {
    let mut core = test_core();
    let mut client = logged_in_client(&mut core);

    mud_says(&mut core, "You are standing in a field.");
    let output = client.drain();
    assert!(output.contains("You are standing in a field.\r\n"), "{output:?}");
}

// ── Scenario: trigger priority tie-break ─────────────────────

#[test]
fn lower_priority_number_fires_first_and_stop_wins() {
    let mut core = test_core();

    let early = "ev_core.triggers_t_plugins.test.demo_early";
    let late = "ev_core.triggers_t_plugins.test.demo_late";
    let plugin = Arc::new(
        ScriptedPlugin::new(vec![
            Registration::Trigger(
                TriggerSpec::new("early", r"^\[ALERT\]")
                    .priority(10)
                    .stop_evaluating(),
            ),
            Registration::Trigger(TriggerSpec::new("late", r"^\[ALERT\]").priority(50)),
            Registration::Callback {
                event: early.into(),
                handler: "on_early".into(),
                priority: 50,
            },
            Registration::Callback {
                event: late.into(),
                handler: "on_late".into(),
                priority: 50,
            },
        ]),
    );
    install(&mut core, plugin.clone());

    let _client = logged_in_client(&mut core);
    mud_says(&mut core, "[ALERT]dragon incoming");

    assert_eq!(plugin.calls("on_early"), 1);
    assert_eq!(plugin.calls("on_late"), 0);
}

// ── Scenario: settings change ────────────────────────────────

#[test]
fn prefix_change_raises_event_and_takes_effect() {
    let mut core = test_core();

    let plugin = Arc::new(
        ScriptedPlugin::new(vec![Registration::Callback {
            event: "ev_plugins.core.proxy_var_command_prefix_modified".into(),
            handler: "on_change".into(),
            priority: 50,
        }])
        .on_event("on_change", |plugin, core| {
            let record = core.current_event_record().expect("current record");
            let r = record.lock();
            plugin.put_state("var", json!(r.get_str("var")));
            plugin.put_state("old", json!(r.get_str("oldvalue")));
            plugin.put_state("new", json!(r.get_str("newvalue")));
            Ok(())
        }),
    );
    install(&mut core, plugin.clone());

    let mut mud = connect_mud(&mut core);
    let mut client = logged_in_client(&mut core);

    client_says(&mut core, &client, "#bp.settings.set proxy command_prefix @px");
    client.drain();

    assert_eq!(plugin.get_state("var"), Some(json!("command_prefix")));
    assert_eq!(plugin.get_state("old"), Some(json!("#bp")));
    assert_eq!(plugin.get_state("new"), Some(json!("@px")));

    // The old prefix is now a plain mud command...
    client_says(&mut core, &client, "#bp.commands.list");
    assert_eq!(drain_mud(&mut mud), "#bp.commands.list\r\n");

    // ...and the new prefix is intercepted.
    client_says(&mut core, &client, "@px.commands.list");
    assert_eq!(drain_mud(&mut mud), "");
    assert!(client.drain().contains("plugins.core.commands"));
}

#[test]
fn setting_default_sentinel_restores_registered_default() {
    let mut core = test_core();
    let proxy = PluginId::new("plugins.core.proxy");

    core.setting_set(&proxy, "command_prefix", "@px", "test").unwrap();
    core.setting_set(&proxy, "command_prefix", "default", "test").unwrap();

    let value = core.setting_get(&proxy, "command_prefix").unwrap();
    assert_eq!(value.as_str(), Some("#bp"));
}

// ── Login gates ──────────────────────────────────────────────

#[test]
fn prelogin_client_sees_prompt_but_not_mud_stream() {
    let mut core = test_core();
    let mut client = connect_client(&mut core);

    let banner = client.drain();
    assert!(banner.contains("proxy password"), "{banner:?}");

    mud_says(&mut core, "secret mud output");
    let output = client.drain();
    assert!(!output.contains("secret mud output"), "{output:?}");
}

#[test]
fn wrong_password_reprompts_then_bans_with_expiry() {
    let mut core = test_core();
    let mut client = connect_client(&mut core);
    client.drain();

    for _ in 0..4 {
        client_says(&mut core, &client, "nope");
    }
    assert!(client.drain().contains("proxy password"));

    client_says(&mut core, &client, "nope");
    let output = client.drain();
    assert!(output.contains("Too many failed attempts"), "{output:?}");
    assert!(core.net_router().client(client.id).is_none());

    let ip: std::net::IpAddr = "127.0.0.1".parse().unwrap();
    assert!(core.net_router().is_banned(ip));

    // The ban is temporary: a removal timer is scheduled for the
    // configured duration (ten minutes by default) and lifts it.
    let proxy = PluginId::new("plugins.core.proxy");
    assert!(core.timer_wheel().get(&proxy, "banremove_127.0.0.1").is_some());

    core.run_due_timers(chrono::Utc::now() + chrono::Duration::seconds(601));
    assert!(!core.net_router().is_banned(ip));
    assert!(core.timer_wheel().get(&proxy, "banremove_127.0.0.1").is_none());
}

#[test]
fn ban_duration_setting_controls_expiry_timer() {
    let mut core = test_core();
    core.setting_set(
        &PluginId::new("plugins.core.proxy"),
        "ban_duration",
        "30s",
        "test",
    )
    .unwrap();

    let mut client = connect_client(&mut core);
    client.drain();
    for _ in 0..5 {
        client_says(&mut core, &client, "nope");
    }

    let ip: std::net::IpAddr = "127.0.0.1".parse().unwrap();
    assert!(core.net_router().is_banned(ip));
    core.run_due_timers(chrono::Utc::now() + chrono::Duration::seconds(31));
    assert!(!core.net_router().is_banned(ip));
}

#[test]
fn explicit_ban_is_permanent_until_unbanned() {
    let mut core = test_core();
    let mut client = logged_in_client(&mut core);
    let ip: std::net::IpAddr = "10.9.9.9".parse().unwrap();

    client_says(&mut core, &client, "#bp.clients.ban 10.9.9.9");
    assert!(client.drain().contains("permanently banned"));
    assert!(core.net_router().is_banned(ip));

    // No timer ever lifts an operator ban.
    core.run_due_timers(chrono::Utc::now() + chrono::Duration::days(30));
    assert!(core.net_router().is_banned(ip));

    client_says(&mut core, &client, "#bp.clients.unban 10.9.9.9");
    assert!(client.drain().contains("unbanned"));
    assert!(!core.net_router().is_banned(ip));
}

#[test]
fn view_only_client_sees_stream_but_cannot_command() {
    let mut core = test_core();
    let mut mud = connect_mud(&mut core);

    let mut client = connect_client(&mut core);
    client.drain();
    client_says(&mut core, &client, "viewer");
    let greeting = client.drain();
    assert!(greeting.contains("view mode"), "{greeting:?}");

    // The stream flows...
    mud_says(&mut core, "a goblin arrives.");
    assert!(client.drain().contains("a goblin arrives."));

    // ...but input is refused and never reaches the mud.
    client_says(&mut core, &client, "kill goblin");
    assert_eq!(drain_mud(&mut mud), "");

    // The refusal notice is internal; view-only clients do not
    // receive internal lines.
    assert_eq!(client.drain(), "");
}

#[test]
fn empty_mud_line_raises_emptyline_pseudo_trigger() {
    let mut core = test_core();

    let plugin = Arc::new(
        ScriptedPlugin::new(vec![Registration::Callback {
            event: "ev_core.triggers_t_plugins.core.triggers_emptyline".into(),
            handler: "on_empty".into(),
            priority: 50,
        }]),
    );
    install(&mut core, plugin.clone());

    let _client = logged_in_client(&mut core);
    mud_says(&mut core, "");

    assert_eq!(plugin.calls("on_empty"), 1);
}

#[test]
fn prompt_lines_end_with_crlf_and_go_ahead() {
    let mut core = test_core();
    let mut client = logged_in_client(&mut core);

    core.handle_mud_frame(TelnetFrame::Prompt("HP 100>".to_string()));

    let mut bytes = Vec::new();
    while let Ok(chunk) = client.rx.try_recv() {
        bytes.extend_from_slice(&chunk);
    }
    assert!(bytes.starts_with(b"HP 100>"), "{bytes:?}");
    // Line ending, then IAC GA marking the prompt's end.
    assert!(bytes.ends_with(&[b'\r', b'\n', 255, 249]), "{bytes:?}");
}

#[test]
fn telnet_command_frames_pass_through_unmodified() {
    let mut core = test_core();
    let mut client = logged_in_client(&mut core);

    // IAC WILL GMCP
    core.handle_mud_frame(TelnetFrame::Command(vec![255, 251, 201]));

    let mut bytes = Vec::new();
    while let Ok(chunk) = client.rx.try_recv() {
        bytes.extend_from_slice(&chunk);
    }
    assert_eq!(bytes, vec![255, 251, 201]);
}
