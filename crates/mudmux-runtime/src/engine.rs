//! The proxy engine: one dispatcher task owning the core, fed by the
//! network shims and the timer tick.

use crate::config::ProxyConfig;
use crate::core::ProxyCore;
use crate::net::{connect_mud, run_client_listener, TelnetFrame};
use crate::settings::{JsonFileBackend, SettingsBackend};
use mudmux_plugin::{CoreError, PluginFactory};
use mudmux_types::ClientId;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Dispatcher inbox capacity.
const INBOX_CAPACITY: usize = 4096;

/// Shutdown drain grace.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Everything the shims tell the dispatcher.
#[derive(Debug)]
pub enum ProxyMessage {
    /// The mud link is up; carries the upstream outbound queue.
    MudConnected {
        /// Sender drained by the mud write loop.
        tx: mpsc::Sender<Vec<u8>>,
    },
    /// A frame arrived from the mud.
    MudFrame(TelnetFrame),
    /// The mud link went down.
    MudClosed {
        /// Human-readable cause.
        reason: String,
    },
    /// A client socket connected.
    ClientConnected {
        /// Connection id.
        id: ClientId,
        /// Peer address.
        addr: SocketAddr,
        /// Sender drained by the client's write loop.
        tx: mpsc::Sender<Vec<u8>>,
    },
    /// A frame arrived from a client.
    ClientFrame {
        /// Connection id.
        id: ClientId,
        /// The frame.
        frame: TelnetFrame,
    },
    /// A client socket closed.
    ClientClosed {
        /// Connection id.
        id: ClientId,
    },
    /// Stop the proxy.
    Shutdown,
}

/// The proxy engine.
pub struct ProxyEngine {
    core: ProxyCore,
    rx: mpsc::Receiver<ProxyMessage>,
    tx: mpsc::Sender<ProxyMessage>,
}

impl ProxyEngine {
    /// Creates an engine with the JSON-file settings backend under
    /// the configured base directory.
    ///
    /// # Errors
    ///
    /// I/O errors creating the settings directory.
    pub fn new(config: ProxyConfig) -> io::Result<Self> {
        let backend = JsonFileBackend::open(config.settings_dir())?;
        Ok(Self::with_backend(config, Box::new(backend)))
    }

    /// Creates an engine over an explicit settings backend.
    #[must_use]
    pub fn with_backend(config: ProxyConfig, backend: Box<dyn SettingsBackend>) -> Self {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        Self {
            core: ProxyCore::new(config, backend),
            rx,
            tx,
        }
    }

    /// Registers a plugin factory for the next load.
    pub fn register_plugin(&mut self, factory: Arc<dyn PluginFactory>) {
        self.core.register_factory(factory);
    }

    /// A sender into the dispatcher inbox (for shims and tests).
    #[must_use]
    pub fn handle(&self) -> mpsc::Sender<ProxyMessage> {
        self.tx.clone()
    }

    /// Direct access to the core (tests and embedding).
    pub fn core_mut(&mut self) -> &mut ProxyCore {
        &mut self.core
    }

    /// Loads all plugins, spawns the network shims, and runs the
    /// dispatcher loop until shutdown.
    ///
    /// # Errors
    ///
    /// A dependency cycle in the initial plugin batch.
    pub async fn run(mut self) -> Result<(), CoreError> {
        self.core.load_all()?;

        let mud_addr = self.core.config().mud_addr();
        let listen_addr = self.core.config().listen_addr();
        tokio::spawn(connect_mud(mud_addr, self.tx.clone()));
        tokio::spawn(run_client_listener(listen_addr, self.tx.clone()));

        let shutdown_tx = self.tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(ProxyMessage::Shutdown).await;
            }
        });

        loop {
            let next_due = self.core.timers.next_due();
            tokio::select! {
                message = self.rx.recv() => {
                    match message {
                        Some(ProxyMessage::Shutdown) | None => break,
                        Some(message) => self.dispatch(message),
                    }
                }
                () = sleep_until_due(next_due) => {
                    self.fire_due_timers();
                }
            }
        }

        tracing::info!("proxy shutting down");
        self.core.save_all();
        self.core.shutdown();
        // Best-effort drain of the outbound queues before sockets
        // drop with the runtime.
        tokio::time::sleep(DRAIN_GRACE).await;
        Ok(())
    }

    /// Routes one inbox message to the core.
    fn dispatch(&mut self, message: ProxyMessage) {
        match message {
            ProxyMessage::MudConnected { tx } => self.core.handle_mud_connected(tx),
            ProxyMessage::MudFrame(frame) => self.core.handle_mud_frame(frame),
            ProxyMessage::MudClosed { reason } => self.core.handle_mud_closed(&reason),
            ProxyMessage::ClientConnected { id, addr, tx } => {
                self.core.handle_client_connected(id, addr, tx);
            }
            ProxyMessage::ClientFrame { id, frame } => self.core.handle_client_frame(id, frame),
            ProxyMessage::ClientClosed { id } => self.core.handle_client_closed(id),
            ProxyMessage::Shutdown => {}
        }
    }

    /// Fires every due timer on the dispatcher.
    fn fire_due_timers(&mut self) {
        self.core.run_due_timers(chrono::Utc::now());
    }
}

/// Sleeps until `when`, or forever when no timer is scheduled.
async fn sleep_until_due(when: Option<chrono::DateTime<chrono::Utc>>) {
    match when {
        Some(when) => {
            let now = chrono::Utc::now();
            let delta = (when - now).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(delta).await;
        }
        None => std::future::pending().await,
    }
}
