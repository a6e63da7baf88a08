//! The upstream (mud) shim.

use super::{read_loop, write_loop, OUTBOUND_CAPACITY};
use crate::engine::ProxyMessage;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Connects to the mud and spawns its read/write loops.
///
/// On success the dispatcher receives `MudConnected` carrying the
/// outbound queue, then a `MudFrame` per inbound frame, and finally
/// `MudClosed` when the link drops. A connection failure produces
/// `MudClosed` directly so reconnect policy (external) can observe
/// it.
pub async fn connect_mud(addr: String, to_dispatcher: mpsc::Sender<ProxyMessage>) {
    let stream = match TcpStream::connect(&addr).await {
        Ok(stream) => stream,
        Err(err) => {
            tracing::warn!(%addr, %err, "mud connect failed");
            let _ = to_dispatcher
                .send(ProxyMessage::MudClosed {
                    reason: err.to_string(),
                })
                .await;
            return;
        }
    };
    if let Err(err) = stream.set_nodelay(true) {
        tracing::debug!(%err, "set_nodelay failed");
    }
    tracing::info!(%addr, "mud connected");

    let (read_half, write_half) = stream.into_split();
    let (out_tx, out_rx) = mpsc::channel::<Vec<u8>>(OUTBOUND_CAPACITY);

    if to_dispatcher
        .send(ProxyMessage::MudConnected { tx: out_tx })
        .await
        .is_err()
    {
        return;
    }

    let writer = tokio::spawn(write_loop(write_half, out_rx));

    read_loop(read_half, to_dispatcher.clone(), ProxyMessage::MudFrame).await;

    writer.abort();
    let _ = to_dispatcher
        .send(ProxyMessage::MudClosed {
            reason: "connection closed".to_string(),
        })
        .await;
}
