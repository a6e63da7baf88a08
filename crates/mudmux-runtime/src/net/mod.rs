//! Network shims: telnet framing and the per-connection read/write
//! loops.
//!
//! Each connection runs two tasks: a read loop that frames inbound
//! bytes and forwards them to the dispatcher as [`ProxyMessage`]s, and
//! a write loop that drains the connection's outbound queue. The
//! dispatcher never touches a socket.

mod client;
mod mud;
mod router;
pub mod telnet;

pub use client::run_client_listener;
pub use mud::connect_mud;
pub use router::{BanKind, ClientHandle, NetRouter, OUTBOUND_CAPACITY};
pub use telnet::{LineFramer, TelnetFrame};

use crate::engine::ProxyMessage;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;

/// Read-side buffer size.
const READ_BUF: usize = 8 * 1024;

/// Runs a framed read loop until EOF or error; forwards frames via
/// `to_dispatcher` using `wrap` to build the message.
pub(crate) async fn read_loop<F>(
    mut half: OwnedReadHalf,
    to_dispatcher: mpsc::Sender<ProxyMessage>,
    mut wrap: F,
) where
    F: FnMut(TelnetFrame) -> ProxyMessage,
{
    let mut framer = LineFramer::new();
    let mut buf = vec![0u8; READ_BUF];

    loop {
        match half.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for frame in framer.push(&buf[..n]) {
                    if to_dispatcher.send(wrap(frame)).await.is_err() {
                        return;
                    }
                }
            }
            Err(err) => {
                tracing::debug!(%err, "read loop terminated");
                break;
            }
        }
    }

    if let Some(frame) = framer.finish() {
        let _ = to_dispatcher.send(wrap(frame)).await;
    }
}

/// Drains an outbound queue into the socket until the queue closes.
pub(crate) async fn write_loop(mut half: OwnedWriteHalf, mut outbound: mpsc::Receiver<Vec<u8>>) {
    while let Some(bytes) = outbound.recv().await {
        if let Err(err) = half.write_all(&bytes).await {
            tracing::debug!(%err, "write loop terminated");
            break;
        }
    }
    let _ = half.shutdown().await;
}
