//! TCP control server.
//!
//! Listens on the control port and creates a [`ClientConn`] for each
//! accepted connection. Each connection is announced to the hub via
//! `HubEvent::ClientConnected`, and every complete line it sends arrives as
//! `HubEvent::ClientLine`.
//!
//! # Architecture
//!
//! ```text
//! ControlServer ──spawn──► accept loop ──► ClientSet (shared, Arc<Mutex>)
//!                              │                │
//!                              │          per client: read task ──► HubEvent
//!                              │                      write task ◄── send / broadcast
//!                              ▼
//!                        HubEvent::ClientConnected
//! ```
//!
//! # Lifecycle
//!
//! `Stopped` ──start()──► `Running` ──stop()──► `Stopped`. Stopping cancels
//! the accept loop, waits for it to release the listening socket, and
//! disconnects every client. Both transitions are idempotent.

mod client_conn;
mod clients;

use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};
use tokio::net::{TcpListener, TcpSocket};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::constants::{ACCEPT_RETRY_DELAY, LISTEN_BACKLOG};
use crate::hub::{HubEvent, HubEventSender};

pub use client_conn::ClientConn;
pub use clients::ClientSet;

/// Connection id, unique among live connections and reused after disconnect.
pub type ClientId = u32;

/// Server lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// No listener; no clients.
    Stopped,
    /// Accepting connections.
    Running,
}

#[derive(Debug)]
struct RunningServer {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    accept_handle: JoinHandle<()>,
}

/// TCP control server and its live client set.
#[derive(Debug)]
pub struct ControlServer {
    bind_address: String,
    port: u16,
    max_clients: usize,
    clients: ClientSet,
    hub_event_tx: HubEventSender,
    running: Option<RunningServer>,
}

impl ControlServer {
    /// Create a stopped server.
    pub fn new(config: &Config, hub_event_tx: HubEventSender) -> Self {
        Self {
            bind_address: config.bind_address.clone(),
            port: config.port,
            max_clients: config.max_clients,
            clients: ClientSet::new(),
            hub_event_tx,
            running: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        if self.running.is_some() {
            ServerState::Running
        } else {
            ServerState::Stopped
        }
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    /// The live client set.
    pub fn clients(&self) -> &ClientSet {
        &self.clients
    }

    /// Bind the listener and spawn the accept loop.
    ///
    /// Must be called from within a tokio runtime. Returns the bound address;
    /// calling it while already running returns the existing address.
    ///
    /// # Errors
    ///
    /// Returns an error if the bind address is invalid or the port cannot be
    /// bound.
    pub fn start(&mut self) -> Result<SocketAddr> {
        if let Some(running) = &self.running {
            return Ok(running.local_addr);
        }

        let ip: IpAddr = self
            .bind_address
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.bind_address))?;
        let addr = SocketAddr::new(ip, self.port);
        let listener = bind_listener(addr)
            .with_context(|| format!("Failed to bind control port: {addr}"))?;
        let local_addr = listener.local_addr()?;
        // Restarts after a link bounce reuse the port actually bound.
        self.port = local_addr.port();

        log::info!("[Server] Listening on {}", local_addr);

        let cancel = CancellationToken::new();
        let accept_handle = tokio::spawn(accept_loop(
            listener,
            self.clients.clone(),
            self.hub_event_tx.clone(),
            cancel.clone(),
            self.max_clients,
        ));

        self.running = Some(RunningServer {
            local_addr,
            cancel,
            accept_handle,
        });
        Ok(local_addr)
    }

    /// Stop accepting, release the port and disconnect every client.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        running.cancel.cancel();
        if let Err(e) = running.accept_handle.await {
            log::warn!("[Server] Accept loop ended abnormally: {e}");
        }

        let dropped = self.clients.disconnect_all();
        log::info!("[Server] Stopped ({} client(s) disconnected)", dropped);
    }

    /// Send `msg` to every live client. Returns the number reached.
    pub fn broadcast(&self, msg: &str) -> usize {
        self.clients.broadcast_except(msg, None)
    }

    /// Send `msg` to every live client except `except`.
    pub fn broadcast_except(&self, msg: &str, except: ClientId) -> usize {
        self.clients.broadcast_except(msg, Some(except))
    }

    /// Send `msg` to one client. A no-op for clients that are gone.
    pub fn send_to(&self, client_id: ClientId, msg: &str) -> bool {
        self.clients.send_to(client_id, msg)
    }
}

fn bind_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    // Rebinding after a link bounce must not wait out TIME_WAIT.
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(LISTEN_BACKLOG)
}

/// Accept loop, runs as a tokio task until `cancel` fires.
async fn accept_loop(
    listener: TcpListener,
    clients: ClientSet,
    hub_event_tx: HubEventSender,
    cancel: CancellationToken,
    max_clients: usize,
) {
    loop {
        let accepted = tokio::select! {
            () = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        let (stream, peer) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                log::error!("[Server] Failed to accept connection: {e}");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(ACCEPT_RETRY_DELAY) => continue,
                }
            }
        };

        if clients.len() >= max_clients {
            log::warn!(
                "[Server] Rejecting {}: {} clients already connected",
                peer,
                max_clients
            );
            drop(stream);
            continue;
        }

        if let Err(e) = stream.set_nodelay(true) {
            log::debug!("[Server] set_nodelay failed for {}: {e}", peer);
        }

        let (reader, writer) = stream.into_split();
        let conn_cancel = cancel.child_token();
        let Some((client_id, serial)) = clients
            .insert_with(|client_id| ClientConn::new(client_id, peer, writer, conn_cancel.clone()))
        else {
            log::warn!("[Server] No free connection id for {}", peer);
            continue;
        };

        log::info!("[Server] New connection from {} (client {})", peer, client_id);

        if hub_event_tx
            .send(HubEvent::ClientConnected { client_id })
            .is_err()
        {
            log::warn!("[Server] Hub event channel closed, stopping accept loop");
            break;
        }

        client_conn::spawn_reader(
            client_id,
            serial,
            reader,
            clients.clone(),
            hub_event_tx.clone(),
            conn_cancel,
        );
    }

    log::info!("[Server] Accept loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;
    use tokio::sync::mpsc;

    fn local_config() -> Config {
        Config {
            bind_address: "127.0.0.1".into(),
            port: 0,
            ..Config::default()
        }
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<HubEvent>) -> HubEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("Timed out waiting for hub event")
            .expect("Channel closed")
    }

    #[tokio::test]
    async fn test_server_accepts_connection_and_fires_event() {
        let (hub_tx, mut hub_rx) = mpsc::unbounded_channel::<HubEvent>();
        let mut server = ControlServer::new(&local_config(), hub_tx);
        assert_eq!(server.state(), ServerState::Stopped);

        let addr = server.start().unwrap();
        assert_eq!(server.state(), ServerState::Running);
        let _stream = TcpStream::connect(addr).await.unwrap();

        assert_eq!(
            next_event(&mut hub_rx).await,
            HubEvent::ClientConnected { client_id: 1 }
        );
        assert_eq!(server.clients().len(), 1);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_lines_arrive_as_hub_events() {
        let (hub_tx, mut hub_rx) = mpsc::unbounded_channel::<HubEvent>();
        let mut server = ControlServer::new(&local_config(), hub_tx);
        let addr = server.start().unwrap();

        let mut stream = TcpStream::connect(addr).await.unwrap();
        next_event(&mut hub_rx).await;

        stream.write_all(b"PO").await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        stream.write_all(b"LL\nSET A TRUE\n").await.unwrap();

        assert_eq!(
            next_event(&mut hub_rx).await,
            HubEvent::ClientLine { client_id: 1, line: "POLL".into() }
        );
        assert_eq!(
            next_event(&mut hub_rx).await,
            HubEvent::ClientLine { client_id: 1, line: "SET A TRUE".into() }
        );

        drop(stream);
        assert_eq!(
            next_event(&mut hub_rx).await,
            HubEvent::ClientDisconnected { client_id: 1 }
        );
        assert!(server.clients().is_empty());
        assert!(!server.send_to(1, "gone\n\n"));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_restartable() {
        let (hub_tx, mut hub_rx) = mpsc::unbounded_channel::<HubEvent>();
        let mut server = ControlServer::new(&local_config(), hub_tx);

        server.stop().await;
        let addr = server.start().unwrap();
        let _stream = TcpStream::connect(addr).await.unwrap();
        next_event(&mut hub_rx).await;

        server.stop().await;
        server.stop().await;
        assert_eq!(server.state(), ServerState::Stopped);
        assert!(server.clients().is_empty());
        assert!(server.local_addr().is_none());

        assert_eq!(server.start().unwrap(), addr);
        assert_eq!(server.state(), ServerState::Running);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_connections_beyond_limit_are_closed() {
        let (hub_tx, mut hub_rx) = mpsc::unbounded_channel::<HubEvent>();
        let config = Config {
            max_clients: 1,
            ..local_config()
        };
        let mut server = ControlServer::new(&config, hub_tx);
        let addr = server.start().unwrap();

        let _first = TcpStream::connect(addr).await.unwrap();
        next_event(&mut hub_rx).await;

        let mut second = TcpStream::connect(addr).await.unwrap();
        let mut buf = [0u8; 1];
        let n = tokio::time::timeout(
            Duration::from_secs(2),
            tokio::io::AsyncReadExt::read(&mut second, &mut buf),
        )
        .await
        .expect("Timed out waiting for rejection")
        .unwrap_or(0);
        assert_eq!(n, 0);
        assert_eq!(server.clients().len(), 1);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_invalid_bind_address() {
        let (hub_tx, _hub_rx) = mpsc::unbounded_channel::<HubEvent>();
        let config = Config {
            bind_address: "not-an-ip".into(),
            ..local_config()
        };
        let mut server = ControlServer::new(&config, hub_tx);
        assert!(server.start().is_err());
        assert_eq!(server.state(), ServerState::Stopped);
    }
}
