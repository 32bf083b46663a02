//! Unified event channel for the Hub event loop.
//!
//! Every producer (the accept loop, per-connection read tasks, the device
//! edge source, signal handlers) sends through one
//! `mpsc::UnboundedSender<HubEvent>`. The hub is the only consumer, which
//! linearizes all controller mutation.

use tokio::sync::mpsc::UnboundedSender;

use crate::panel::{ButtonId, VolumeDirection};
use crate::server::ClientId;

/// Sender half of the hub event channel.
pub type HubEventSender = UnboundedSender<HubEvent>;

/// Event delivered to the Hub event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    /// A control client was accepted and registered in the live set.
    ClientConnected {
        /// Connection id.
        client_id: ClientId,
    },

    /// A complete command line arrived from a client.
    ClientLine {
        /// Connection id.
        client_id: ClientId,
        /// Line with its `\n` stripped.
        line: String,
    },

    /// A client's transport closed; it is already gone from the live set.
    ClientDisconnected {
        /// Connection id.
        client_id: ClientId,
    },

    /// Raw press/release edge from the device.
    ButtonEdge {
        /// Device button id.
        button: ButtonId,
        /// `true` on press, `false` on release.
        pressed: bool,
    },

    /// Edge on a hardware volume key.
    VolumeButton {
        /// Which key.
        direction: VolumeDirection,
        /// `true` on press, `false` on release.
        pressed: bool,
    },

    /// Volume level reported by the device's own control.
    VolumeLevel(u16),

    /// Network link went down: stop serving.
    LinkDown,

    /// Network link came up: serve again.
    LinkUp,

    /// Process is stopping.
    Shutdown,
}
