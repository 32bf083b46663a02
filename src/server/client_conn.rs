//! Per-connection state for control clients.
//!
//! Each accepted TCP connection gets a [`ClientConn`] owning a write task,
//! plus a read task started by [`spawn_reader`] once the connection is in
//! the live set. The read task frames lines with [`LineDecoder`] and forwards
//! them to the hub; the write task drains a bounded outbound queue.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{ClientId, ClientSet};
use crate::constants::{OUTBOUND_QUEUE_DEPTH, READ_BUFFER_SIZE};
use crate::hub::{HubEvent, HubEventSender};
use crate::protocol::LineDecoder;

/// Hub-side handle for a single control client.
pub struct ClientConn {
    client_id: ClientId,
    /// Distinguishes this connection from a later one reusing `client_id`.
    serial: u64,
    peer: SocketAddr,
    outbound_tx: mpsc::Sender<String>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for ClientConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConn")
            .field("client_id", &self.client_id)
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

impl ClientConn {
    /// Wrap the write half of an accepted connection and spawn its write task.
    pub(crate) fn new(
        client_id: ClientId,
        peer: SocketAddr,
        writer: OwnedWriteHalf,
        cancel: CancellationToken,
    ) -> Self {
        static SERIAL: AtomicU64 = AtomicU64::new(0);

        let (outbound_tx, outbound_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE_DEPTH);
        tokio::spawn(write_loop(
            client_id,
            writer,
            outbound_rx,
            cancel.clone(),
        ));

        Self {
            client_id,
            serial: SERIAL.fetch_add(1, Ordering::Relaxed),
            peer,
            outbound_tx,
            cancel,
        }
    }

    /// Queue `msg` for this client without waiting.
    ///
    /// Returns `false` if the client is gone or its queue is full; the
    /// message is dropped in both cases.
    pub fn send(&self, msg: &str) -> bool {
        match self.outbound_tx.try_send(msg.to_string()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!("[Client {}] Outbound queue full, dropping message", self.client_id);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Connection id.
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub(crate) fn serial(&self) -> u64 {
        self.serial
    }

    /// Stop both tasks. The socket closes once they observe the signal.
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ClientConn {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Start the read task for a registered connection.
pub(crate) fn spawn_reader(
    client_id: ClientId,
    serial: u64,
    reader: OwnedReadHalf,
    clients: ClientSet,
    hub_event_tx: HubEventSender,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(read_loop(
        client_id,
        serial,
        reader,
        clients,
        hub_event_tx,
        cancel,
    ))
}

/// Read loop: frames lines and forwards them to the hub until EOF.
async fn read_loop(
    client_id: ClientId,
    serial: u64,
    mut reader: OwnedReadHalf,
    clients: ClientSet,
    hub_event_tx: HubEventSender,
    cancel: CancellationToken,
) {
    let mut decoder = LineDecoder::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let read = tokio::select! {
            () = cancel.cancelled() => {
                log::debug!("[Client {}] Read loop cancelled", client_id);
                break;
            }
            read = reader.read(&mut buf) => read,
        };

        match read {
            Ok(0) => {
                log::info!("[Client {}] Disconnected", client_id);
                break;
            }
            Ok(n) => {
                let lines = match decoder.feed(&buf[..n]) {
                    Ok(lines) => lines,
                    Err(e) => {
                        log::warn!("[Client {}] Dropping connection: {e}", client_id);
                        cancel.cancel();
                        break;
                    }
                };
                for line in lines {
                    let event = HubEvent::ClientLine { client_id, line };
                    if hub_event_tx.send(event).is_err() {
                        log::warn!("[Client {}] Hub event channel closed", client_id);
                        return;
                    }
                }
            }
            Err(e) => {
                log::warn!("[Client {}] Read error: {e}", client_id);
                break;
            }
        }
    }

    // Already absent when the server stopped and cleared the set.
    if clients.remove(client_id, serial) {
        let _ = hub_event_tx.send(HubEvent::ClientDisconnected { client_id });
    }
}

/// Write loop: drains the outbound queue onto the socket.
async fn write_loop(
    client_id: ClientId,
    mut writer: OwnedWriteHalf,
    mut outbound_rx: mpsc::Receiver<String>,
    cancel: CancellationToken,
) {
    loop {
        let msg = tokio::select! {
            () = cancel.cancelled() => break,
            msg = outbound_rx.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        let written = tokio::select! {
            () = cancel.cancelled() => break,
            written = writer.write_all(msg.as_bytes()) => written,
        };
        if let Err(e) = written {
            log::warn!("[Client {}] Write error: {e}", client_id);
            cancel.cancel();
            break;
        }
    }

    let _ = writer.shutdown().await;
}
