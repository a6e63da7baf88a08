//! Outbound routing state for the dispatcher.
//!
//! No plugin owns a socket: all outbound bytes go through the router,
//! which holds the upstream queue and one queue per client. Queues
//! are bounded; a full queue drops the write with a warning rather
//! than blocking the dispatcher.

use chrono::{DateTime, Utc};
use mudmux_types::ClientId;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use tokio::sync::mpsc;

/// Outbound queue capacity per connection.
pub const OUTBOUND_CAPACITY: usize = 1024;

/// Per-client connection state.
#[derive(Debug)]
pub struct ClientHandle {
    /// Connection id.
    pub id: ClientId,
    /// Peer address.
    pub addr: SocketAddr,
    /// Outbound byte queue drained by the client's write loop.
    pub tx: mpsc::Sender<Vec<u8>>,
    /// Terminal rows, when the client told us.
    pub rows: u16,
    /// View-only clients receive the stream but cannot command.
    pub view_only: bool,
    /// Whether the client has passed the password gate.
    pub logged_in: bool,
    /// Failed password attempts.
    pub bad_passwords: u32,
    /// When the socket connected.
    pub connected_at: DateTime<Utc>,
}

impl ClientHandle {
    /// Creates state for a fresh, unauthenticated connection.
    #[must_use]
    pub fn new(id: ClientId, addr: SocketAddr, tx: mpsc::Sender<Vec<u8>>) -> Self {
        Self {
            id,
            addr,
            tx,
            rows: 24,
            view_only: false,
            logged_in: false,
            bad_passwords: 0,
            connected_at: Utc::now(),
        }
    }
}

/// How a peer address came to be banned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanKind {
    /// Automatic, from failed password attempts; removed by a timer.
    Temporary,
    /// Operator-issued; lasts for the proxy's lifetime.
    Permanent,
}

/// The dispatcher's view of every live connection.
#[derive(Debug, Default)]
pub struct NetRouter {
    mud_tx: Option<mpsc::Sender<Vec<u8>>>,
    clients: HashMap<ClientId, ClientHandle>,
    temp_bans: Vec<IpAddr>,
    perm_bans: Vec<IpAddr>,
}

impl NetRouter {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the upstream queue when the mud link comes up.
    pub fn set_mud(&mut self, tx: mpsc::Sender<Vec<u8>>) {
        self.mud_tx = Some(tx);
    }

    /// Drops the upstream queue when the link goes down.
    pub fn clear_mud(&mut self) {
        self.mud_tx = None;
    }

    /// Whether the upstream link is up.
    #[must_use]
    pub fn mud_connected(&self) -> bool {
        self.mud_tx.is_some()
    }

    /// Queues bytes upstream; returns `false` when the link is down
    /// or the queue is full.
    pub fn send_to_mud(&self, bytes: Vec<u8>) -> bool {
        let Some(tx) = &self.mud_tx else {
            return false;
        };
        match tx.try_send(bytes) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(%err, "mud outbound queue rejected write");
                false
            }
        }
    }

    /// Registers a client connection.
    pub fn add_client(&mut self, handle: ClientHandle) {
        self.clients.insert(handle.id, handle);
    }

    /// Removes a client; returns its state.
    pub fn remove_client(&mut self, id: ClientId) -> Option<ClientHandle> {
        self.clients.remove(&id)
    }

    /// Looks up a client.
    #[must_use]
    pub fn client(&self, id: ClientId) -> Option<&ClientHandle> {
        self.clients.get(&id)
    }

    /// Looks up a client mutably (login state transitions).
    pub fn client_mut(&mut self, id: ClientId) -> Option<&mut ClientHandle> {
        self.clients.get_mut(&id)
    }

    /// All connected client ids.
    #[must_use]
    pub fn client_ids(&self) -> Vec<ClientId> {
        self.clients.keys().copied().collect()
    }

    /// All client states.
    pub fn clients(&self) -> impl Iterator<Item = &ClientHandle> {
        self.clients.values()
    }

    /// Queues bytes to one client; returns `false` if gone or full.
    pub fn send_to_client(&self, id: ClientId, bytes: Vec<u8>) -> bool {
        let Some(handle) = self.clients.get(&id) else {
            return false;
        };
        match handle.tx.try_send(bytes) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(client = %id, %err, "client outbound queue rejected write");
                false
            }
        }
    }

    /// Bans a peer address until [`unban`](Self::unban) runs; the
    /// engine schedules that on a one-shot timer.
    pub fn ban_temporarily(&mut self, addr: IpAddr) {
        if !self.temp_bans.contains(&addr) {
            self.temp_bans.push(addr);
        }
    }

    /// Lifts a temporary ban; returns whether one was present.
    /// Permanent bans are untouched.
    pub fn unban(&mut self, addr: IpAddr) -> bool {
        let before = self.temp_bans.len();
        self.temp_bans.retain(|banned| *banned != addr);
        self.temp_bans.len() < before
    }

    /// Bans a peer address for the proxy's lifetime. Only reachable
    /// through the explicit ban command.
    pub fn ban_permanently(&mut self, addr: IpAddr) {
        if !self.perm_bans.contains(&addr) {
            self.perm_bans.push(addr);
        }
    }

    /// Lifts a ban of either kind; returns whether one was present.
    pub fn pardon(&mut self, addr: IpAddr) -> bool {
        let lifted = self.unban(addr);
        let before = self.perm_bans.len();
        self.perm_bans.retain(|banned| *banned != addr);
        lifted || self.perm_bans.len() < before
    }

    /// Whether a peer address is banned, either way.
    #[must_use]
    pub fn is_banned(&self, addr: IpAddr) -> bool {
        self.temp_bans.contains(&addr) || self.perm_bans.contains(&addr)
    }

    /// Every active ban, for the listing surface.
    #[must_use]
    pub fn bans(&self) -> Vec<(IpAddr, BanKind)> {
        let mut bans: Vec<(IpAddr, BanKind)> = self
            .temp_bans
            .iter()
            .map(|addr| (*addr, BanKind::Temporary))
            .chain(self.perm_bans.iter().map(|addr| (*addr, BanKind::Permanent)))
            .collect();
        bans.sort_by_key(|(addr, _)| *addr);
        bans
    }
}
