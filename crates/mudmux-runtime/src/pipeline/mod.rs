//! The record pipeline stages.
//!
//! Four processing records move lines between the mud and clients:
//!
//! | Record | Direction | Raises |
//! |--------|-----------|--------|
//! | [`ProcessClientToMud`] | client → mud | `ev_to_mud_data_modify` |
//! | [`SendClientToMud`] | client → mud | `ev_to_mud_data_read` |
//! | [`ProcessMudToClient`] | mud → client | `ev_to_client_data_modify` |
//! | [`SendMudToClient`] | mud → client | `ev_to_client_data_read` |
//!
//! A `Process*` record raises the modify event one line at a time
//! (each callback sees exactly one line under the `line` key), then
//! hands its container to the matching `Send*` record. The send
//! record locks the container, formats and queues each still-sendable
//! line, then raises the read event with the delivered set - at that
//! point the lines are frozen and callbacks observe only.

mod filter;

pub use filter::filter_reason;

use crate::core::ProxyCore;
use crate::net::telnet;
use mudmux_event::{names, DataValue, EventDataRecord};
use mudmux_plugin::CoreError;
use mudmux_record::{RecordContainer, SharedLine};
use mudmux_types::{ClientTarget, TextOrigin};

/// Client → mud, through modification events.
#[derive(Debug)]
pub struct ProcessClientToMud {
    /// The lines to process.
    pub container: RecordContainer,
    /// Who emitted them - a client id string or plugin id.
    pub actor: String,
    /// The originating client, when the lines came from a socket.
    pub source: Option<String>,
}

impl ProcessClientToMud {
    /// Runs the modify phase and the send phase.
    pub fn execute(self, core: &mut ProxyCore) -> Result<(), CoreError> {
        let eligible = self.container.modifiable(TextOrigin::Client);

        if !eligible.is_empty() {
            let mut base = EventDataRecord::new(names::TO_MUD_MODIFY);
            if let Some(client) = &self.source {
                base.set("client", client.as_str());
            }
            core.raise_for_lines(
                names::TO_MUD_MODIFY,
                base,
                &self.actor,
                eligible,
                names::LINE_KEY,
            )?;
        }

        SendClientToMud {
            container: self.container,
            actor: self.actor,
        }
        .execute(core)
    }
}

/// Client → mud, send phase (modification already done or bypassed).
#[derive(Debug)]
pub struct SendClientToMud {
    /// The lines to emit upstream.
    pub container: RecordContainer,
    /// Who emitted them.
    pub actor: String,
}

impl SendClientToMud {
    /// Locks, formats, queues upstream, raises the read event.
    pub fn execute(mut self, core: &mut ProxyCore) -> Result<(), CoreError> {
        let ctx = core.update_ctx("pipeline.send_to_mud");
        self.container.lock_all(&ctx);

        let mut delivered: Vec<SharedLine> = Vec::new();
        for shared in self.container.lines() {
            let mut line = shared.lock();
            if !line.send() {
                line.mark_dropped("send flag cleared", &ctx);
                continue;
            }
            line.note_format(&ctx);
            let bytes = line.format_bytes("");
            if core.router.send_to_mud(bytes) {
                line.mark_sent(&ctx);
                drop(line);
                delivered.push(shared.clone());
            } else {
                line.mark_dropped("mud link down", &ctx);
            }
        }

        let data = EventDataRecord::new(names::TO_MUD_READ)
            .with("lines", DataValue::Lines(delivered));
        core.raise_event_record(names::TO_MUD_READ, data, &self.actor)?;
        Ok(())
    }
}

/// Mud → client, through modification events.
#[derive(Debug)]
pub struct ProcessMudToClient {
    /// The lines to process.
    pub container: RecordContainer,
    /// Who emitted them - `"mud"` or a plugin id.
    pub actor: String,
}

impl ProcessMudToClient {
    /// Runs the modify phase and the send phase.
    pub fn execute(self, core: &mut ProxyCore) -> Result<(), CoreError> {
        let eligible = self.container.modifiable(TextOrigin::Mud);

        if !eligible.is_empty() {
            core.raise_for_lines(
                names::TO_CLIENT_MODIFY,
                EventDataRecord::new(names::TO_CLIENT_MODIFY),
                &self.actor,
                eligible,
                names::LINE_KEY,
            )?;
        }

        SendMudToClient {
            container: self.container,
            actor: self.actor,
            target: ClientTarget::All,
        }
        .execute(core)
    }
}

/// Mud → client, send phase.
#[derive(Debug)]
pub struct SendMudToClient {
    /// The lines to deliver.
    pub container: RecordContainer,
    /// Who emitted them.
    pub actor: String,
    /// Which clients to address before filtering.
    pub target: ClientTarget,
}

impl SendMudToClient {
    /// Locks, formats, fans out per recipient, raises the read event.
    ///
    /// Prompt lines are terminated with IAC GA after the line ending
    /// so clients can tell where the prompt stops.
    pub fn execute(mut self, core: &mut ProxyCore) -> Result<(), CoreError> {
        let ctx = core.update_ctx("pipeline.send_to_client");
        self.container.lock_all(&ctx);
        let preamble = core.formatted_preamble();

        let mut delivered: Vec<SharedLine> = Vec::new();
        for shared in self.container.lines() {
            let mut line = shared.lock();
            if !line.send() {
                line.mark_dropped("send flag cleared", &ctx);
                continue;
            }
            line.note_format(&ctx);
            let mut bytes = line.format_bytes(&preamble);
            if line.is_prompt() {
                bytes.extend_from_slice(&[telnet::IAC, telnet::GA]);
            }

            let mut reached_any = false;
            for client in core.router.clients() {
                match filter_reason(&line, client, &self.target) {
                    None => {
                        if core.router.send_to_client(client.id, bytes.clone()) {
                            reached_any = true;
                        }
                    }
                    Some(reason) => line.mark_dropped(reason, &ctx),
                }
            }
            if reached_any {
                line.mark_sent(&ctx);
                drop(line);
                delivered.push(shared.clone());
            }
        }

        let data = EventDataRecord::new(names::TO_CLIENT_READ)
            .with("lines", DataValue::Lines(delivered));
        core.raise_event_record(names::TO_CLIENT_READ, data, &self.actor)?;
        Ok(())
    }
}

/// Splits one client input line on the command separator.
///
/// Each segment becomes its own line record so `n|s|look` walks and
/// looks in three mud commands. The separator is configurable; an
/// empty separator disables splitting.
#[must_use]
pub fn split_on_separator(input: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return vec![input.to_string()];
    }
    input.split(separator).map(str::to_string).collect()
}

/// Builds a client→mud container from one raw input line.
#[must_use]
pub fn client_input_container(input: &str, separator: &str) -> RecordContainer {
    RecordContainer::from_texts(TextOrigin::Client, split_on_separator(input, separator))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_splits_segments() {
        assert_eq!(
            split_on_separator("n|s|look", "|"),
            vec!["n".to_string(), "s".to_string(), "look".to_string()]
        );
        assert_eq!(split_on_separator("plain", "|"), vec!["plain".to_string()]);
        assert_eq!(split_on_separator("a|b", ""), vec!["a|b".to_string()]);
    }

    #[test]
    fn input_container_coerces_client_lines() {
        let container = client_input_container("n|s", "|");
        assert_eq!(container.len(), 2);
        assert_eq!(container.lines()[0].lock().origin(), TextOrigin::Client);
    }
}
