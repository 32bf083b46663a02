//! Hub - single owner of the panel state and the control server.
//!
//! Every producer (accept loop, client read tasks, device edge source,
//! signal handlers) sends a [`HubEvent`] into one channel. The hub is the
//! only consumer, so controller mutation is linearized without locking:
//! two clients racing `SETGROUP` and a physical interlock press are applied
//! one after another in arrival order.

pub mod events;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::constants::RESPONSE_UNSUPPORTED;
use crate::controller::ButtonController;
use crate::dispatch;
use crate::panel::{ButtonId, ButtonRegistry, DeviceButton, PanelDevice, VolumeDirection};
use crate::protocol;
use crate::server::{ClientId, ControlServer};

pub use events::{HubEvent, HubEventSender};

/// A bound panel: the state machine plus the device it drives.
#[derive(Debug)]
pub struct Panel {
    controller: ButtonController,
    device: Arc<dyn PanelDevice>,
}

impl Panel {
    /// Build the registry from the device enumeration and attach `device`.
    ///
    /// Volume keys in `buttons` are handled by the hub and do not enter the
    /// registry.
    pub fn new(buttons: &[DeviceButton], device: Arc<dyn PanelDevice>) -> Self {
        let registry = ButtonRegistry::from_device(buttons);
        let controller = ButtonController::new(registry, Arc::clone(&device));
        Self { controller, device }
    }

    /// The button state machine.
    pub fn controller(&self) -> &ButtonController {
        &self.controller
    }

    /// The device handle.
    pub fn device(&self) -> &Arc<dyn PanelDevice> {
        &self.device
    }
}

/// Event loop owning the panel and the control server.
#[derive(Debug)]
pub struct Hub {
    prompt: String,
    volume_step: u16,
    panel: Option<Panel>,
    server: ControlServer,
    event_tx: HubEventSender,
    event_rx: mpsc::UnboundedReceiver<HubEvent>,
    /// Last level reported by the device's volume slider.
    last_level: Option<u16>,
}

impl Hub {
    /// Create a hub. `panel` is `None` on platforms without panel hardware;
    /// clients are then told the device is unsupported.
    pub fn new(config: &Config, panel: Option<Panel>) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let server = ControlServer::new(config, event_tx.clone());
        Self {
            prompt: config.prompt.clone(),
            volume_step: config.volume_step,
            panel,
            server,
            event_tx,
            event_rx,
            last_level: None,
        }
    }

    /// Sender for device, simulator and signal events.
    pub fn event_sender(&self) -> HubEventSender {
        self.event_tx.clone()
    }

    /// The control server.
    pub fn server(&self) -> &ControlServer {
        &self.server
    }

    /// The bound panel, if any.
    pub fn panel(&self) -> Option<&Panel> {
        self.panel.as_ref()
    }

    /// Light the panel and start listening. Returns the bound address.
    ///
    /// # Errors
    ///
    /// Returns an error if the control port cannot be bound.
    pub fn start(&mut self) -> Result<SocketAddr> {
        if let Some(panel) = &self.panel {
            panel.device.set_backlight(true);
            panel.device.set_beep(true);
        }
        self.server.start()
    }

    /// Process events until [`HubEvent::Shutdown`].
    ///
    /// Starts the server first if [`Hub::start`] has not been called.
    pub async fn run(mut self) -> Result<()> {
        if self.server.local_addr().is_none() {
            self.start()?;
        }

        while let Some(event) = self.event_rx.recv().await {
            if !self.handle_event(event).await {
                break;
            }
        }

        log::info!("[Hub] Event loop stopped");
        Ok(())
    }

    /// Apply one event. Returns `false` once the hub should exit.
    pub async fn handle_event(&mut self, event: HubEvent) -> bool {
        match event {
            HubEvent::ClientConnected { client_id } => self.handle_client_connected(client_id),
            HubEvent::ClientLine { client_id, line } => self.handle_client_line(client_id, &line),
            HubEvent::ClientDisconnected { client_id } => {
                log::debug!("[Hub] Client {} left", client_id);
            }
            HubEvent::ButtonEdge { button, pressed } => self.handle_button_edge(button, pressed),
            HubEvent::VolumeButton { direction, pressed } => {
                self.handle_volume_button(direction, pressed);
            }
            HubEvent::VolumeLevel(level) => self.handle_volume_level(level),
            HubEvent::LinkDown => {
                log::info!("[Hub] Link down, stopping control server");
                self.server.stop().await;
            }
            HubEvent::LinkUp => {
                log::info!("[Hub] Link up, starting control server");
                if let Err(e) = self.server.start() {
                    log::error!("[Hub] Failed to restart control server: {e:#}");
                }
            }
            HubEvent::Shutdown => {
                log::info!("[Hub] Shutting down");
                self.server.stop().await;
                return false;
            }
        }
        true
    }

    fn handle_client_connected(&mut self, client_id: ClientId) {
        let mut greeting = protocol::welcome(&self.prompt);
        match &self.panel {
            Some(panel) => greeting.push_str(&panel.controller.summarize()),
            None => greeting.push_str(RESPONSE_UNSUPPORTED),
        }
        self.server.send_to(client_id, &greeting);
    }

    fn handle_client_line(&mut self, client_id: ClientId, line: &str) {
        let Some(panel) = &mut self.panel else {
            self.server.send_to(client_id, RESPONSE_UNSUPPORTED);
            return;
        };

        log::debug!("[Hub] Client {} -> {:?}", client_id, line);
        let outcome = dispatch::handle_line(line, &mut panel.controller, panel.device.as_ref());
        self.server.send_to(client_id, &outcome.response);
        if let Some(update) = outcome.broadcast {
            self.server.broadcast_except(&update, client_id);
        }
        self.flush_notifications();
    }

    fn handle_button_edge(&mut self, button: ButtonId, pressed: bool) {
        let Some(panel) = &mut self.panel else {
            return;
        };
        panel.controller.on_edge(button, pressed);
        self.flush_notifications();
    }

    fn handle_volume_button(&mut self, direction: VolumeDirection, pressed: bool) {
        let Some(panel) = &self.panel else {
            return;
        };
        if !pressed || panel.controller.is_disabled() {
            return;
        }

        let level = direction.apply(panel.device.volume(), self.volume_step);
        panel.device.set_volume(level);
        self.server.broadcast(&protocol::volume_update(level));
    }

    fn handle_volume_level(&mut self, level: u16) {
        let Some(panel) = &self.panel else {
            return;
        };
        if self.last_level == Some(level) {
            return;
        }

        self.last_level = Some(level);
        panel.device.set_volume(level);
        self.server.broadcast(&protocol::volume_update(level));
    }

    /// Broadcast every queued controller notification to all clients.
    fn flush_notifications(&mut self) {
        let Some(panel) = &mut self.panel else {
            return;
        };
        for notification in panel.controller.drain_notifications() {
            self.server.broadcast(&notification.to_message());
        }
    }
}
