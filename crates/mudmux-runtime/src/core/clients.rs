//! Client connection and login handling, plus the mud-side message
//! handlers. Driven by the dispatcher loop in `engine.rs`.

use super::ProxyCore;
use crate::net::{ClientHandle, TelnetFrame};
use crate::pipeline::ProcessMudToClient;
use mudmux_event::{names, EventDataRecord};
use mudmux_plugin::TimerSpec;
use mudmux_record::{LineRecord, RecordContainer};
use mudmux_types::{ClientId, ClientTarget, PluginId, TextOrigin};
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// Failed password attempts before the peer is banned.
const MAX_BAD_PASSWORDS: u32 = 5;

impl ProxyCore {
    // ── Mud side ─────────────────────────────────────────────

    /// The upstream link came up.
    pub fn handle_mud_connected(&mut self, tx: mpsc::Sender<Vec<u8>>) {
        self.router.set_mud(tx);
        let data = EventDataRecord::new(names::MUD_CONNECTED);
        if let Err(err) = self.raise_event_record(names::MUD_CONNECTED, data, "mud") {
            tracing::warn!(%err, "mud connected event failed");
        }
        let _ = self.deliver_internal(
            vec!["connected to the mud".to_string()],
            ClientTarget::All,
            false,
            true,
            crate::ids::PROXY,
        );
    }

    /// A frame arrived from the mud.
    pub fn handle_mud_frame(&mut self, frame: TelnetFrame) {
        let ctx = self.update_ctx("net.mud");
        let mut container = RecordContainer::new(TextOrigin::Mud);
        match frame {
            TelnetFrame::Line(text) => {
                container.append_record(LineRecord::from_mud(text), &ctx);
            }
            TelnetFrame::Prompt(text) => {
                let mut record = LineRecord::from_mud(text);
                let _ = record.set_prompt(true, &ctx);
                container.append_record(record, &ctx);
            }
            TelnetFrame::Command(bytes) => {
                let mut record = LineRecord::telnet_command(bytes, TextOrigin::Mud);
                // Negotiation frames flow to clients that have not
                // authenticated yet.
                let _ = record.set_prelogin(true, &ctx);
                container.append_record(record, &ctx);
            }
        }

        let record = ProcessMudToClient {
            container,
            actor: "mud".to_string(),
        };
        if let Err(err) = record.execute(self) {
            tracing::warn!(%err, "mud frame processing failed");
        }
    }

    /// The upstream link went down.
    pub fn handle_mud_closed(&mut self, reason: &str) {
        self.router.clear_mud();
        let data = EventDataRecord::new(names::MUD_DISCONNECTED).with("reason", reason);
        if let Err(err) = self.raise_event_record(names::MUD_DISCONNECTED, data, "mud") {
            tracing::warn!(%err, "mud disconnected event failed");
        }
        let _ = self.deliver_internal(
            vec![format!("lost the mud connection: {reason}")],
            ClientTarget::All,
            true,
            true,
            crate::ids::PROXY,
        );
    }

    // ── Client side ──────────────────────────────────────────

    /// A client socket connected; send the banner and password
    /// prompt. Banned peers are cut immediately.
    pub fn handle_client_connected(
        &mut self,
        id: ClientId,
        addr: SocketAddr,
        tx: mpsc::Sender<Vec<u8>>,
    ) {
        if self.router.is_banned(addr.ip()) {
            tracing::info!(client = %id, %addr, "banned peer rejected");
            let _ = tx.try_send(b"You are banned from this proxy.\r\n".to_vec());
            return;
        }

        self.router.add_client(ClientHandle::new(id, addr, tx));

        let data = EventDataRecord::new(names::CLIENT_CONNECTED)
            .with("client", client_key(id))
            .with("addr", addr.to_string());
        if let Err(err) = self.raise_event_record(names::CLIENT_CONNECTED, data, "client") {
            tracing::warn!(%err, "client connected event failed");
        }

        let _ = self.deliver_prelogin(
            vec![
                ("mudmux proxy".to_string(), false),
                ("Please enter the proxy password:".to_string(), true),
            ],
            ClientTarget::Only(id),
            crate::ids::PROXY,
        );
    }

    /// A frame arrived from a client.
    pub fn handle_client_frame(&mut self, id: ClientId, frame: TelnetFrame) {
        let Some(client) = self.router.client(id) else {
            return;
        };
        let logged_in = client.logged_in;
        let view_only = client.view_only;

        match frame {
            TelnetFrame::Command(bytes) => {
                // Option negotiation passes through to the mud once
                // the client is in; pre-login frames are dropped.
                if logged_in && !view_only {
                    self.router.send_to_mud(bytes);
                }
            }
            TelnetFrame::Line(text) | TelnetFrame::Prompt(text) => {
                if !logged_in {
                    self.handle_password_attempt(id, text.trim());
                } else if view_only {
                    let _ = self.deliver_internal(
                        vec!["You are connected in view mode and cannot send commands.".into()],
                        ClientTarget::Only(id),
                        true,
                        true,
                        crate::ids::PROXY,
                    );
                } else if let Err(err) = self.handle_client_input(&text, Some(id)) {
                    tracing::warn!(client = %id, %err, "client input processing failed");
                }
            }
        }
    }

    fn handle_password_attempt(&mut self, id: ClientId, attempt: &str) {
        let password = self.config.password.clone();
        let view_password = self.config.view_password.clone();

        if attempt == password {
            self.complete_login(id, false);
            return;
        }
        if view_password.as_deref() == Some(attempt) {
            self.complete_login(id, true);
            return;
        }

        let (bad_count, addr) = match self.router.client_mut(id) {
            Some(client) => {
                client.bad_passwords += 1;
                (client.bad_passwords, client.addr)
            }
            None => return,
        };
        tracing::info!(client = %id, %addr, bad_count, "bad proxy password");

        if bad_count >= MAX_BAD_PASSWORDS {
            let _ = self.deliver_prelogin(
                vec![("Too many failed attempts; goodbye.".to_string(), false)],
                ClientTarget::Only(id),
                crate::ids::PROXY,
            );
            self.ban_with_expiry(addr.ip());
            // Dropping the handle closes the outbound queue, which
            // ends the client's write loop.
            self.router.remove_client(id);
            return;
        }

        let _ = self.deliver_prelogin(
            vec![("Please enter the proxy password:".to_string(), true)],
            ClientTarget::Only(id),
            crate::ids::PROXY,
        );
    }

    fn complete_login(&mut self, id: ClientId, view_only: bool) {
        let Some(client) = self.router.client_mut(id) else {
            return;
        };
        client.logged_in = true;
        client.view_only = view_only;
        client.bad_passwords = 0;
        let addr = client.addr;

        tracing::info!(client = %id, %addr, view_only, "client logged in");

        let data = EventDataRecord::new(names::CLIENT_LOGGED_IN)
            .with("client", client_key(id))
            .with("view_only", view_only);
        if let Err(err) = self.raise_event_record(names::CLIENT_LOGGED_IN, data, "client") {
            tracing::warn!(%err, "client login event failed");
        }

        let greeting = if view_only {
            "You are connected in view mode."
        } else {
            "You are connected."
        };
        let _ = self.deliver_internal(
            vec![greeting.to_string()],
            ClientTarget::Only(id),
            false,
            true,
            crate::ids::PROXY,
        );
        let _ = self.deliver_internal(
            vec![format!("{addr}: client connected")],
            ClientTarget::Exclude(vec![id]),
            false,
            true,
            crate::ids::PROXY,
        );
    }

    /// Bans a peer temporarily and schedules the removal timer.
    ///
    /// The duration comes from the `ban_duration` setting (default
    /// ten minutes). A permanent ban needs the explicit
    /// `clients.ban` command.
    pub(crate) fn ban_with_expiry(&mut self, ip: std::net::IpAddr) {
        self.router.ban_temporarily(ip);

        let duration = self
            .settings
            .get(&PluginId::new(crate::ids::PROXY), "ban_duration")
            .ok()
            .and_then(|value| value.as_seconds())
            .unwrap_or(600);

        let proxy = PluginId::new(crate::ids::PROXY);
        let timer_name = format!("banremove_{ip}");
        // Re-banning the same peer restarts the clock.
        self.timers.remove(&proxy, &timer_name);
        let spec = TimerSpec::once(timer_name, format!("ban_expire:{ip}"), duration);
        if let Err(err) = self.timers.add(&proxy, spec, chrono::Utc::now()) {
            tracing::warn!(%ip, %err, "ban removal timer registration failed");
        }
        tracing::info!(%ip, duration, "peer banned after failed passwords");
    }

    /// A client socket closed.
    pub fn handle_client_closed(&mut self, id: ClientId) {
        let Some(client) = self.router.remove_client(id) else {
            return;
        };

        let data = EventDataRecord::new(names::CLIENT_DISCONNECTED)
            .with("client", client_key(id))
            .with("addr", client.addr.to_string());
        if let Err(err) = self.raise_event_record(names::CLIENT_DISCONNECTED, data, "client") {
            tracing::warn!(%err, "client disconnected event failed");
        }

        if client.logged_in {
            let _ = self.deliver_internal(
                vec![format!("{}: client disconnected", client.addr)],
                ClientTarget::All,
                false,
                true,
                crate::ids::PROXY,
            );
        }
    }
}

/// The stable string form of a client id used in event data records.
fn client_key(id: ClientId) -> String {
    serde_json::to_string(&id)
        .unwrap_or_default()
        .trim_matches('"')
        .to_string()
}
