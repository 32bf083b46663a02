//! Output side of the physical panel.
//!
//! [`PanelDevice`] is the sink the core writes to. Real drivers queue the
//! writes to hardware; [`VirtualPanel`] keeps them in memory and logs them,
//! which is what the binary uses when running without hardware and what the
//! tests assert against.

use std::collections::HashMap;
use std::sync::Mutex;

use super::ButtonId;

/// Writes accepted by a button panel.
///
/// Methods take `&self` so one device handle can be shared between the
/// controller (LED writes) and the hub (backlight, beep, volume).
pub trait PanelDevice: Send + Sync + std::fmt::Debug {
    /// Drive the feedback LED of `button`.
    fn set_led(&self, button: ButtonId, on: bool);

    /// Full brightness when `on`, dark otherwise.
    fn set_backlight(&self, on: bool);

    /// Enable or disable the key-press beep.
    fn set_beep(&self, on: bool);

    /// Enable or disable the device's own volume control.
    fn set_volume_control(&self, enabled: bool);

    /// Current volume feedback level.
    fn volume(&self) -> u16;

    /// Set the volume feedback level.
    fn set_volume(&self, level: u16);
}

#[derive(Debug)]
struct VirtualPanelState {
    leds: HashMap<ButtonId, bool>,
    backlight: bool,
    beep: bool,
    volume_control: bool,
    volume: u16,
}

/// In-memory panel used when no hardware driver is attached.
#[derive(Debug)]
pub struct VirtualPanel {
    state: Mutex<VirtualPanelState>,
}

impl VirtualPanel {
    /// New panel: all LEDs off, backlight/beep off, volume 0.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(VirtualPanelState {
                leds: HashMap::new(),
                backlight: false,
                beep: false,
                volume_control: false,
                volume: 0,
            }),
        }
    }

    /// Last LED value written for `button` (`false` if never written).
    pub fn led(&self, button: ButtonId) -> bool {
        let state = self.state.lock().expect("VirtualPanel mutex poisoned");
        state.leds.get(&button).copied().unwrap_or(false)
    }

    /// Backlight state.
    pub fn backlight(&self) -> bool {
        self.state.lock().expect("VirtualPanel mutex poisoned").backlight
    }

    /// Beep state.
    pub fn beep(&self) -> bool {
        self.state.lock().expect("VirtualPanel mutex poisoned").beep
    }

    /// Volume-control enable state.
    pub fn volume_control(&self) -> bool {
        self.state
            .lock()
            .expect("VirtualPanel mutex poisoned")
            .volume_control
    }
}

impl Default for VirtualPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl PanelDevice for VirtualPanel {
    fn set_led(&self, button: ButtonId, on: bool) {
        log::trace!("[Panel] LED {button} -> {on}");
        self.state
            .lock()
            .expect("VirtualPanel mutex poisoned")
            .leds
            .insert(button, on);
    }

    fn set_backlight(&self, on: bool) {
        log::debug!("[Panel] Backlight -> {on}");
        self.state.lock().expect("VirtualPanel mutex poisoned").backlight = on;
    }

    fn set_beep(&self, on: bool) {
        log::debug!("[Panel] Beep -> {on}");
        self.state.lock().expect("VirtualPanel mutex poisoned").beep = on;
    }

    fn set_volume_control(&self, enabled: bool) {
        log::debug!("[Panel] Volume control -> {enabled}");
        self.state
            .lock()
            .expect("VirtualPanel mutex poisoned")
            .volume_control = enabled;
    }

    fn volume(&self) -> u16 {
        self.state.lock().expect("VirtualPanel mutex poisoned").volume
    }

    fn set_volume(&self, level: u16) {
        log::debug!("[Panel] Volume -> {level}");
        self.state.lock().expect("VirtualPanel mutex poisoned").volume = level;
    }
}
