//! Static button identity.
//!
//! Built once from the device enumeration and never mutated afterwards.
//! Iteration order is registration order, which is also the order used by
//! the summary dump.

use indexmap::IndexMap;

use super::{ButtonId, DeviceButton};

/// A registered, controllable button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    /// Device-assigned id.
    pub id: ButtonId,
    /// Display name used on the wire.
    pub name: String,
}

/// Immutable id/name table for the controllable buttons of a panel.
#[derive(Debug, Clone, Default)]
pub struct ButtonRegistry {
    buttons: IndexMap<ButtonId, Button>,
}

impl ButtonRegistry {
    /// Build the registry from the device enumeration.
    ///
    /// Volume keys are skipped. A repeated id or name keeps the first entry.
    pub fn from_device(device_buttons: &[DeviceButton]) -> Self {
        let mut buttons: IndexMap<ButtonId, Button> = IndexMap::new();
        for entry in device_buttons {
            if entry.role.is_volume() {
                continue;
            }
            if buttons.contains_key(&entry.id) || buttons.values().any(|b| b.name == entry.name) {
                log::warn!(
                    "[Panel] Ignoring duplicate button {} ({:?})",
                    entry.id,
                    entry.name
                );
                continue;
            }
            buttons.insert(
                entry.id,
                Button {
                    id: entry.id,
                    name: entry.name.clone(),
                },
            );
        }
        Self { buttons }
    }

    /// Exact, case-sensitive name lookup.
    pub fn lookup_by_name(&self, name: &str) -> Option<ButtonId> {
        self.buttons.values().find(|b| b.name == name).map(|b| b.id)
    }

    /// Name lookup as accepted from the wire.
    ///
    /// An exact match wins. Otherwise a case-insensitive match is accepted
    /// only when it is unambiguous.
    pub fn resolve_name(&self, name: &str) -> Option<ButtonId> {
        if let Some(id) = self.lookup_by_name(name) {
            return Some(id);
        }
        let mut matches = self
            .buttons
            .values()
            .filter(|b| b.name.eq_ignore_ascii_case(name));
        match (matches.next(), matches.next()) {
            (Some(button), None) => Some(button.id),
            _ => None,
        }
    }

    /// Returns `true` if `name` resolves to a button.
    pub fn exists(&self, name: &str) -> bool {
        self.resolve_name(name).is_some()
    }

    /// Returns `true` if `id` is registered.
    pub fn contains(&self, id: ButtonId) -> bool {
        self.buttons.contains_key(&id)
    }

    /// Button by id.
    pub fn get(&self, id: ButtonId) -> Option<&Button> {
        self.buttons.get(&id)
    }

    /// Display name by id.
    pub fn name(&self, id: ButtonId) -> Option<&str> {
        self.buttons.get(&id).map(|b| b.name.as_str())
    }

    /// Buttons in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Button> {
        self.buttons.values()
    }

    /// Ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = ButtonId> + '_ {
        self.buttons.keys().copied()
    }

    /// Number of registered buttons.
    pub fn len(&self) -> usize {
        self.buttons.len()
    }

    /// Returns `true` if no buttons are registered.
    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }
}
