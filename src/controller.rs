//! Button/LED state machine.
//!
//! [`ButtonController`] owns the per-button mode, group membership and LED
//! state, plus the per-group selection. Raw press/release edges go in via
//! [`ButtonController::on_edge`]; LED writes go out to the [`PanelDevice`]
//! and state changes are queued as [`Notification`]s for the hub to drain.
//!
//! # Interlock groups
//!
//! Membership is decided by each button's stored group field alone, not by
//! its mode. Selecting a button in a group lights it and darkens every other
//! member. A group's entry in the selection table appears the first time a
//! button is configured as `Interlock` in it (or the first time it is
//! selected explicitly) and is kept in that discovery order.
//!
//! [`ButtonController::set_led`] writes the LED directly and does not touch
//! the group table, so it can leave a group with zero or several lit
//! members. Only interlock presses and [`ButtonController::set_group_selection`]
//! enforce exclusivity.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::ControllerError;
use crate::panel::{ButtonId, ButtonRegistry, GroupId, PanelDevice};
use crate::protocol;

/// Behavior of a button in response to edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ButtonMode {
    /// LED follows the physical button.
    #[default]
    Momentary,
    /// Each press flips the LED.
    Toggle,
    /// Each press selects the button within its group.
    Interlock,
    /// Edges are ignored and the LED is held dark.
    Disabled,
}

impl ButtonMode {
    /// Upper-case wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Momentary => "MOMENTARY",
            Self::Toggle => "TOGGLE",
            Self::Interlock => "INTERLOCK",
            Self::Disabled => "DISABLED",
        }
    }
}

impl fmt::Display for ButtonMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State change produced by an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A momentary or toggle button changed (or re-reported) its LED.
    ButtonState {
        /// Button id.
        button: ButtonId,
        /// Button display name.
        name: String,
        /// New LED state.
        state: bool,
    },
    /// An interlock press selected a button in a group.
    ButtonGroup {
        /// Group id.
        group: GroupId,
        /// Selected button id.
        button: ButtonId,
        /// Selected button display name.
        name: String,
    },
}

impl Notification {
    /// Wire form broadcast to control clients.
    pub fn to_message(&self) -> String {
        match self {
            Self::ButtonState { name, state, .. } => protocol::button_update(name, *state),
            Self::ButtonGroup { group, name, .. } => protocol::group_update(*group, name),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ButtonSlot {
    mode: ButtonMode,
    group: GroupId,
    led: bool,
}

/// Mode, group and LED state for every registered button.
#[derive(Debug)]
pub struct ButtonController {
    registry: ButtonRegistry,
    /// Same key order as the registry.
    slots: IndexMap<ButtonId, ButtonSlot>,
    /// Group -> selected button, in discovery order.
    groups: IndexMap<GroupId, ButtonId>,
    disabled: bool,
    device: Arc<dyn PanelDevice>,
    notifications: Vec<Notification>,
}

impl ButtonController {
    /// Every button starts `Momentary`, group 0, LED off.
    pub fn new(registry: ButtonRegistry, device: Arc<dyn PanelDevice>) -> Self {
        let slots = registry
            .ids()
            .map(|id| (id, ButtonSlot::default()))
            .collect();
        Self {
            registry,
            slots,
            groups: IndexMap::new(),
            disabled: false,
            device,
            notifications: Vec::new(),
        }
    }

    // =========================================================================
    // Edges
    // =========================================================================

    /// Handle a raw press (`pressed = true`) or release edge.
    ///
    /// Ignored entirely while the panel is disabled or when `button` is not
    /// registered.
    pub fn on_edge(&mut self, button: ButtonId, pressed: bool) {
        if self.disabled {
            return;
        }
        let Some(slot) = self.slots.get(&button).copied() else {
            return;
        };

        match slot.mode {
            ButtonMode::Disabled => {}
            ButtonMode::Momentary => {
                self.write_led(button, pressed);
                self.notify_state(button, pressed);
            }
            ButtonMode::Toggle => {
                if !pressed {
                    return;
                }
                let next = !slot.led;
                self.write_led(button, next);
                self.notify_state(button, next);
            }
            ButtonMode::Interlock => {
                if !pressed {
                    return;
                }
                self.select(slot.group, button);
                let name = self.name_of(button);
                self.notifications.push(Notification::ButtonGroup {
                    group: slot.group,
                    button,
                    name,
                });
            }
        }
    }

    // =========================================================================
    // Remote operations
    // =========================================================================

    /// Reconfigure `button`.
    ///
    /// `Disabled` forces the LED off. `Interlock` into a group that has no
    /// selection yet seeds that group with this button.
    pub fn set_mode(
        &mut self,
        button: ButtonId,
        mode: ButtonMode,
        group: GroupId,
    ) -> Result<(), ControllerError> {
        let slot = self
            .slots
            .get_mut(&button)
            .ok_or(ControllerError::UnknownButtonId(button))?;
        slot.mode = mode;
        slot.group = group;

        if mode == ButtonMode::Disabled {
            self.write_led(button, false);
        }
        if mode == ButtonMode::Interlock && !self.groups.contains_key(&group) {
            self.select(group, button);
        }
        Ok(())
    }

    /// Overwrite the LED of `button`, bypassing mode and group logic.
    pub fn set_led(&mut self, button: ButtonId, state: bool) -> Result<(), ControllerError> {
        if !self.slots.contains_key(&button) {
            return Err(ControllerError::UnknownButtonId(button));
        }
        self.write_led(button, state);
        Ok(())
    }

    /// Mark `button` as the selection of `group`.
    ///
    /// `button` is lit; every other button whose group field is `group` is
    /// darkened.
    pub fn set_group_selection(
        &mut self,
        group: GroupId,
        button: ButtonId,
    ) -> Result<(), ControllerError> {
        if !self.slots.contains_key(&button) {
            return Err(ControllerError::UnknownButtonId(button));
        }
        self.select(group, button);
        Ok(())
    }

    /// Suppress all edge handling.
    pub fn disable_all(&mut self) {
        self.disabled = true;
    }

    /// Resume edge handling.
    pub fn enable_all(&mut self) {
        self.disabled = false;
    }

    /// Returns `true` while edges are suppressed.
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Returns `true` if `name` resolves to a registered button.
    pub fn has_button(&self, name: &str) -> bool {
        self.registry.exists(name)
    }

    /// Resolve a wire name to a button id.
    pub fn resolve_name(&self, name: &str) -> Result<ButtonId, ControllerError> {
        self.registry
            .resolve_name(name)
            .ok_or_else(|| ControllerError::UnknownButtonName(name.to_string()))
    }

    /// The button registry.
    pub fn registry(&self) -> &ButtonRegistry {
        &self.registry
    }

    /// Current mode of `button`.
    pub fn mode(&self, button: ButtonId) -> Option<ButtonMode> {
        self.slots.get(&button).map(|s| s.mode)
    }

    /// Stored group of `button`.
    pub fn group(&self, button: ButtonId) -> Option<GroupId> {
        self.slots.get(&button).map(|s| s.group)
    }

    /// Current LED state of `button`.
    pub fn led(&self, button: ButtonId) -> Option<bool> {
        self.slots.get(&button).map(|s| s.led)
    }

    /// Selected button of `group`, if the group has been initialized.
    pub fn group_selection(&self, group: GroupId) -> Option<ButtonId> {
        self.groups.get(&group).copied()
    }

    /// Take every notification queued since the last drain.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    // =========================================================================
    // Summaries
    // =========================================================================

    /// `CONFIG:` section: one line per button in registration order.
    pub fn summarize_config(&self) -> String {
        let mut out = String::from("CONFIG:\n");
        for (id, slot) in &self.slots {
            let group = (slot.mode == ButtonMode::Interlock).then_some(slot.group);
            out.push_str(&protocol::config_line(&self.name_of(*id), slot.mode, group));
        }
        out.push('\n');
        out
    }

    /// `STATE:` section: LEDs in registration order, then group selections
    /// in discovery order.
    pub fn summarize_state(&self) -> String {
        let mut out = String::from("STATE:\n");
        for (id, slot) in &self.slots {
            out.push_str(&protocol::button_line(&self.name_of(*id), slot.led));
        }
        for (group, selected) in &self.groups {
            out.push_str(&protocol::group_line(*group, &self.name_of(*selected)));
        }
        out.push('\n');
        out
    }

    /// Full dump: configuration followed by state.
    pub fn summarize(&self) -> String {
        let mut out = self.summarize_config();
        out.push_str(&self.summarize_state());
        out
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn select(&mut self, group: GroupId, button: ButtonId) {
        self.groups.insert(group, button);
        let members: Vec<ButtonId> = self
            .slots
            .iter()
            .filter(|(id, slot)| slot.group == group || **id == button)
            .map(|(id, _)| *id)
            .collect();
        for id in members {
            self.write_led(id, id == button);
        }
    }

    fn write_led(&mut self, button: ButtonId, on: bool) {
        if let Some(slot) = self.slots.get_mut(&button) {
            slot.led = on;
            self.device.set_led(button, on);
        }
    }

    fn notify_state(&mut self, button: ButtonId, state: bool) {
        let name = self.name_of(button);
        self.notifications.push(Notification::ButtonState {
            button,
            name,
            state,
        });
    }

    fn name_of(&self, button: ButtonId) -> String {
        self.registry.name(button).unwrap_or_default().to_string()
    }
}
