//! Live client set shared by the accept loop, read tasks and the hub.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::client_conn::ClientConn;
use super::ClientId;

/// Connected clients keyed by connection id.
///
/// Sends never block (see [`ClientConn::send`]), so holding the lock across
/// a broadcast cannot stall a concurrent removal for long.
#[derive(Debug, Clone, Default)]
pub struct ClientSet {
    inner: Arc<Mutex<BTreeMap<ClientId, ClientConn>>>,
}

impl ClientSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<ClientId, ClientConn>> {
        self.inner.lock().expect("ClientSet mutex poisoned")
    }

    /// Register a connection under the lowest free id.
    ///
    /// Returns the id and the connection serial, or `None` if every id is
    /// taken.
    pub(crate) fn insert_with(
        &self,
        build: impl FnOnce(ClientId) -> ClientConn,
    ) -> Option<(ClientId, u64)> {
        let mut clients = self.lock();
        let client_id = (1..=ClientId::MAX).find(|id| !clients.contains_key(id))?;
        let conn = build(client_id);
        let serial = conn.serial();
        clients.insert(client_id, conn);
        Some((client_id, serial))
    }

    /// Remove `client_id` if it still refers to the connection `serial`.
    pub(crate) fn remove(&self, client_id: ClientId, serial: u64) -> bool {
        let mut clients = self.lock();
        if clients.get(&client_id).is_some_and(|c| c.serial() == serial) {
            clients.remove(&client_id);
            true
        } else {
            false
        }
    }

    /// Send to one client. Unknown or closed clients are a no-op.
    pub fn send_to(&self, client_id: ClientId, msg: &str) -> bool {
        self.lock().get(&client_id).is_some_and(|c| c.send(msg))
    }

    /// Send to every live client except `except`.
    ///
    /// Returns the number of clients the message was queued for. Failed
    /// sends are skipped.
    pub fn broadcast_except(&self, msg: &str, except: Option<ClientId>) -> usize {
        let clients = self.lock();
        clients
            .values()
            .filter(|c| Some(c.client_id()) != except)
            .filter(|c| c.send(msg))
            .count()
    }

    /// Disconnect and forget every client. Returns how many there were.
    pub fn disconnect_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.lock());
        for conn in drained.values() {
            conn.disconnect();
        }
        drained.len()
    }

    /// Returns `true` if `client_id` is live.
    pub fn contains(&self, client_id: ClientId) -> bool {
        self.lock().contains_key(&client_id)
    }

    /// Live connection ids in ascending order.
    pub fn ids(&self) -> Vec<ClientId> {
        self.lock().keys().copied().collect()
    }

    /// Number of live clients.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no clients are connected.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
