//! Console edge source for running without panel hardware.
//!
//! Reads one command per line and forwards the resulting device events to
//! the hub:
//!
//! ```text
//! press <name>      button down
//! release <name>    button up
//! tap <name>        press then release
//! level <n>         volume slider report
//! link up|down      network link change
//! ```

use anyhow::{anyhow, bail, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::{ButtonRole, DeviceButton, VolumeDirection};
use crate::hub::{HubEvent, HubEventSender};

/// Turns console lines into [`HubEvent`]s for a fixed button enumeration.
#[derive(Debug)]
pub struct Simulator {
    buttons: Vec<DeviceButton>,
    hub_event_tx: HubEventSender,
}

impl Simulator {
    /// Simulate the device reporting `buttons`.
    pub fn new(buttons: Vec<DeviceButton>, hub_event_tx: HubEventSender) -> Self {
        Self {
            buttons,
            hub_event_tx,
        }
    }

    /// Parse one console line. Blank lines produce no events.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown verbs, unknown button names and
    /// unparsable levels.
    pub fn parse_line(&self, line: &str) -> Result<Vec<HubEvent>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(Vec::new());
        };
        let arg = words.collect::<Vec<_>>().join(" ");

        match verb.to_ascii_lowercase().as_str() {
            "press" => Ok(vec![self.edge(&arg, true)?]),
            "release" => Ok(vec![self.edge(&arg, false)?]),
            "tap" => Ok(vec![self.edge(&arg, true)?, self.edge(&arg, false)?]),
            "level" => {
                let level = arg
                    .parse::<u16>()
                    .map_err(|e| anyhow!("invalid level {arg:?}: {e}"))?;
                Ok(vec![HubEvent::VolumeLevel(level)])
            }
            "link" => match arg.to_ascii_lowercase().as_str() {
                "up" => Ok(vec![HubEvent::LinkUp]),
                "down" => Ok(vec![HubEvent::LinkDown]),
                _ => bail!("expected `link up` or `link down`"),
            },
            _ => bail!("unknown command {verb:?}"),
        }
    }

    fn edge(&self, name: &str, pressed: bool) -> Result<HubEvent> {
        let button = self
            .find(name)
            .ok_or_else(|| anyhow!("unknown button {name:?}"))?;

        Ok(match button.role {
            ButtonRole::Button => HubEvent::ButtonEdge {
                button: button.id,
                pressed,
            },
            ButtonRole::VolumeUp => HubEvent::VolumeButton {
                direction: VolumeDirection::Up,
                pressed,
            },
            ButtonRole::VolumeDown => HubEvent::VolumeButton {
                direction: VolumeDirection::Down,
                pressed,
            },
        })
    }

    fn find(&self, name: &str) -> Option<&DeviceButton> {
        self.buttons
            .iter()
            .find(|b| b.name == name)
            .or_else(|| self.buttons.iter().find(|b| b.name.eq_ignore_ascii_case(name)))
    }

    /// Forward events for every line of `reader` until EOF or the hub goes
    /// away.
    pub async fn run<R: AsyncBufRead + Unpin>(self, reader: R) {
        let mut lines = reader.lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    log::warn!("[Panel] Simulator input error: {e}");
                    break;
                }
            };

            let events = match self.parse_line(&line) {
                Ok(events) => events,
                Err(e) => {
                    log::warn!("[Panel] Ignoring {:?}: {e}", line.trim());
                    continue;
                }
            };
            for event in events {
                if self.hub_event_tx.send(event).is_err() {
                    return;
                }
            }
        }
        log::debug!("[Panel] Simulator input closed");
    }
}
