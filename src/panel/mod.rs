//! Physical panel boundary.
//!
//! Everything the core needs from the hardware side lives here: the button
//! enumeration reported at startup, the [`ButtonRegistry`] built from it, the
//! [`PanelDevice`] sink for LEDs/backlight/beep/volume, and a console
//! [`simulator`] that stands in for the edge source when no hardware is
//! attached.
//!
//! ```text
//! device enumeration ──► ButtonRegistry ──► ButtonController
//! device edges ───────► HubEvent::ButtonEdge / VolumeButton / VolumeLevel
//! ButtonController ───► PanelDevice::set_led
//! Hub ────────────────► PanelDevice::set_backlight / set_beep / set_volume
//! ```

pub mod device;
pub mod registry;
pub mod simulator;

use serde::{Deserialize, Serialize};

pub use device::{PanelDevice, VirtualPanel};
pub use registry::{Button, ButtonRegistry};

/// Numeric button identifier reported by the device.
pub type ButtonId = u32;

/// Interlock group identifier. `0` means "no group".
pub type GroupId = u32;

/// What a physical button is wired to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonRole {
    /// Ordinary programmable button with LED feedback.
    #[default]
    Button,
    /// Hardware volume-up key, handled outside the controller.
    VolumeUp,
    /// Hardware volume-down key, handled outside the controller.
    VolumeDown,
}

impl ButtonRole {
    /// Returns `true` for the reserved volume keys.
    pub fn is_volume(self) -> bool {
        matches!(self, Self::VolumeUp | Self::VolumeDown)
    }
}

/// One entry of the device's startup button enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceButton {
    /// Device-assigned button number.
    pub id: ButtonId,
    /// Stable display name.
    pub name: String,
    /// Wiring role.
    #[serde(default)]
    pub role: ButtonRole,
}

impl DeviceButton {
    /// Ordinary programmable button.
    pub fn new(id: ButtonId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            role: ButtonRole::Button,
        }
    }

    /// Button with an explicit role.
    pub fn with_role(id: ButtonId, name: impl Into<String>, role: ButtonRole) -> Self {
        Self {
            id,
            name: name.into(),
            role,
        }
    }
}

/// Direction of a hardware volume key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeDirection {
    /// Volume up.
    Up,
    /// Volume down.
    Down,
}

impl VolumeDirection {
    /// Apply one step in this direction, saturating at the device range.
    pub fn apply(self, level: u16, step: u16) -> u16 {
        match self {
            Self::Up => level.saturating_add(step),
            Self::Down => level.saturating_sub(step),
        }
    }
}
