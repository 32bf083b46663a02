//! tcp-buttons - TCP control server for a bank of LED push buttons.
//!
//! Remote clients configure and observe the panel over a line-based TCP
//! protocol. Physical presses are mapped through per-button modes and
//! interlock groups, and every state change is broadcast to all clients.
//!
//! # Architecture
//!
//! - **Hub** - single owner of the panel state, runs the event loop
//! - **Controller** - button/LED state machine
//! - **Dispatch** - command parsing and execution
//! - **Server** - TCP accept loop and per-client connections
//! - **Panel** - device boundary: registry, output sink, console simulator
//!
//! # Modules
//!
//! - [`controller`] - modes, interlock groups and LED state
//! - [`protocol`] - line framing and wire formatting
//! - [`dispatch`] - control commands
//! - [`server`] - control server and client set
//! - [`config`] - configuration loading

pub mod config;
pub mod constants;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod hub;
pub mod panel;
pub mod protocol;
pub mod server;

// Re-export commonly used types
pub use config::Config;
pub use controller::{ButtonController, ButtonMode, Notification};
pub use error::{CommandError, ControllerError};
pub use hub::{Hub, HubEvent, Panel};
pub use panel::{ButtonRegistry, DeviceButton, PanelDevice, VirtualPanel};
pub use server::{ControlServer, ServerState};
