#![allow(dead_code)] // not every test file uses every helper

//! Shared harness for runtime integration tests.
//!
//! Builds a core over the in-memory settings backend and fakes
//! connections by driving the same handlers the dispatcher loop uses,
//! with channel receivers standing in for the socket write loops.

use mudmux_runtime::net::TelnetFrame;
use mudmux_runtime::settings::MemoryBackend;
use mudmux_runtime::{ProxyConfig, ProxyCore};
use mudmux_types::ClientId;
use tokio::sync::mpsc;

/// The password baked into the test config.
pub const PASSWORD: &str = "mudmux";

/// A fresh core with no plugins loaded.
pub fn test_core() -> ProxyCore {
    let mut config = ProxyConfig::for_base_dir("/tmp/mudmux-test");
    config.view_password = Some("viewer".to_string());
    ProxyCore::new(config, Box::new(MemoryBackend::new()))
}

/// A fake connected client.
pub struct TestClient {
    /// Connection id.
    pub id: ClientId,
    /// What the client's write loop would have received.
    pub rx: mpsc::Receiver<Vec<u8>>,
}

impl TestClient {
    /// Everything queued to the client so far, as lossy UTF-8.
    pub fn drain(&mut self) -> String {
        let mut out = Vec::new();
        while let Ok(bytes) = self.rx.try_recv() {
            out.extend_from_slice(&bytes);
        }
        String::from_utf8_lossy(&out).into_owned()
    }
}

/// Connects a fake client socket (not yet logged in).
pub fn connect_client(core: &mut ProxyCore) -> TestClient {
    let (tx, rx) = mpsc::channel(256);
    let id = ClientId::new();
    core.handle_client_connected(id, "127.0.0.1:5555".parse().unwrap(), tx);
    TestClient { id, rx }
}

/// Connects and authenticates a fake client, draining the banner.
pub fn logged_in_client(core: &mut ProxyCore) -> TestClient {
    let mut client = connect_client(core);
    core.handle_client_frame(client.id, TelnetFrame::Line(PASSWORD.to_string()));
    client.drain();
    client
}

/// Sends a text line as if typed by the client.
pub fn client_says(core: &mut ProxyCore, client: &TestClient, text: &str) {
    core.handle_client_frame(client.id, TelnetFrame::Line(text.to_string()));
}

/// Brings the fake mud link up; the receiver observes upstream bytes.
pub fn connect_mud(core: &mut ProxyCore) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel(256);
    core.handle_mud_connected(tx);
    rx
}

/// Everything queued upstream so far, as lossy UTF-8.
pub fn drain_mud(rx: &mut mpsc::Receiver<Vec<u8>>) -> String {
    let mut out = Vec::new();
    while let Ok(bytes) = rx.try_recv() {
        out.extend_from_slice(&bytes);
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// A mud line arriving at the proxy.
pub fn mud_says(core: &mut ProxyCore, text: &str) {
    core.handle_mud_frame(TelnetFrame::Line(text.to_string()));
}
