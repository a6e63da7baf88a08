//! The downstream (client) shim.

use super::{read_loop, write_loop, OUTBOUND_CAPACITY};
use crate::engine::ProxyMessage;
use mudmux_types::ClientId;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Accepts client connections and spawns per-connection loops.
///
/// Each accepted socket produces `ClientConnected` carrying the
/// connection's outbound queue; the dispatcher owns login state and
/// decides what the client may receive.
pub async fn run_client_listener(addr: String, to_dispatcher: mpsc::Sender<ProxyMessage>) {
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%addr, %err, "client listener failed to bind");
            return;
        }
    };
    tracing::info!(%addr, "listening for clients");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                tracing::warn!(%err, "accept failed");
                continue;
            }
        };
        if let Err(err) = stream.set_nodelay(true) {
            tracing::debug!(%err, "set_nodelay failed");
        }

        let id = ClientId::new();
        tracing::info!(client = %id, %peer, "client connected");

        let (read_half, write_half) = stream.into_split();
        let (out_tx, out_rx) = mpsc::channel::<Vec<u8>>(OUTBOUND_CAPACITY);

        if to_dispatcher
            .send(ProxyMessage::ClientConnected {
                id,
                addr: peer,
                tx: out_tx,
            })
            .await
            .is_err()
        {
            return;
        }

        tokio::spawn(write_loop(write_half, out_rx));

        let dispatcher = to_dispatcher.clone();
        tokio::spawn(async move {
            read_loop(read_half, dispatcher.clone(), move |frame| {
                ProxyMessage::ClientFrame { id, frame }
            })
            .await;
            let _ = dispatcher.send(ProxyMessage::ClientClosed { id }).await;
        });
    }
}
