//! A small end-to-end demo: a plugin that gags spam lines, counts
//! them, and exposes the count through a command.
//!
//! Run with `cargo run -p mudmux-runtime --example gag_plugin`. The
//! demo drives the core directly instead of opening sockets, the same
//! way the integration tests do.

use mudmux_plugin::{
    CommandArgs, CommandOutcome, CommandSpec, CoreApi, Plugin, PluginError, PluginFactory,
    PluginMeta, Registration, TriggerSpec,
};
use mudmux_record::LineRecord;
use mudmux_runtime::pipeline::ProcessMudToClient;
use mudmux_runtime::settings::MemoryBackend;
use mudmux_runtime::{ProxyConfig, ProxyCore};
use parking_lot::Mutex;
use std::sync::Arc;

struct GagPlugin {
    gagged: Mutex<u64>,
}

impl GagPlugin {
    const ID: &'static str = "plugins.client.gag";
}

impl Plugin for GagPlugin {
    fn registrations(&self) -> Vec<Registration> {
        vec![
            Registration::Trigger(TriggerSpec::new("spam", r"^\[SPAM\]").omit()),
            Registration::Callback {
                event: "ev_core.triggers_t_{plugin_id}_spam".into(),
                handler: "on_spam".into(),
                priority: 50,
            },
            Registration::Command(
                CommandSpec::new("count", "cmd_count").description("how many lines were gagged"),
            ),
        ]
    }

    fn handle_event(&self, handler: &str, _core: &mut dyn CoreApi) -> Result<(), PluginError> {
        match handler {
            "on_spam" => {
                *self.gagged.lock() += 1;
                Ok(())
            }
            other => Err(PluginError::UnknownHandler(other.to_string())),
        }
    }

    fn run_command(
        &self,
        handler: &str,
        _core: &mut dyn CoreApi,
        _args: &CommandArgs,
    ) -> Result<CommandOutcome, PluginError> {
        match handler {
            "cmd_count" => Ok(CommandOutcome::ok([format!(
                "gagged {} spam lines so far",
                self.gagged.lock()
            )])),
            other => Err(PluginError::UnknownHandler(other.to_string())),
        }
    }
}

struct GagFactory;

impl PluginFactory for GagFactory {
    fn meta(&self) -> PluginMeta {
        PluginMeta::new(GagPlugin::ID, "Spam gag")
            .author("mudmux")
            .purpose("drop [SPAM] lines before clients see them")
    }

    fn build(&self) -> Result<Arc<dyn Plugin>, PluginError> {
        Ok(Arc::new(GagPlugin {
            gagged: Mutex::new(0),
        }))
    }
}

fn main() {
    let config = ProxyConfig::for_base_dir("/tmp/mudmux-demo");
    let mut core = ProxyCore::new(config, Box::new(MemoryBackend::new()));

    core.register_factory(Arc::new(GagFactory));
    core.load_all().expect("demo plugin loads");

    for text in ["[SPAM]buy gold now", "You wake up.", "[SPAM]cheap swords"] {
        let mut container =
            mudmux_record::RecordContainer::new(mudmux_types::TextOrigin::Mud);
        container.append_record(
            LineRecord::from_mud(text),
            &mudmux_record::UpdateContext::new("demo"),
        );
        ProcessMudToClient {
            container,
            actor: "demo".to_string(),
        }
        .execute(&mut core)
        .expect("pipeline runs");
    }

    for trigger in core.trigger_engine().list() {
        println!(
            "{:<24} owner={:<20} hits={}",
            trigger.name,
            trigger.owner.as_str(),
            trigger.hits
        );
    }
}
