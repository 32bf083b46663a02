//! Command parsing and execution.
//!
//! One line in, one response out. Keywords match case-insensitively:
//!
//! | Command | Effect |
//! |---|---|
//! | `POLL` | full summary |
//! | `ENABLE` / `DISABLE` | panel lock, backlight, beep, volume control |
//! | `CONFIGURE <name> MOMENTARY\|TOGGLE\|DISABLED` | set mode |
//! | `CONFIGURE <name> INTERLOCK GROUP <n>` | set interlock mode |
//! | `SET <name> TRUE\|FALSE` | direct LED write |
//! | `SETGROUP <n> <name>` | select within group |
//! | `SETVOLUME <n>` | volume level, clamped to the device range |
//!
//! [`handle_line`] is the single-command error boundary: every
//! [`CommandError`] becomes a response line there and nothing propagates.

use std::sync::LazyLock;

use regex::Regex;

use crate::constants::{
    RESPONSE_CONFIGURED, RESPONSE_DISABLED, RESPONSE_ENABLED, RESPONSE_UPDATED,
};
use crate::controller::{ButtonController, ButtonMode};
use crate::error::CommandError;
use crate::panel::{GroupId, PanelDevice};
use crate::protocol;

static CONFIGURE_COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^CONFIGURE ([^ ]+) (TOGGLE|MOMENTARY|DISABLED|INTERLOCK GROUP ([0-9]+))$")
        .expect("CONFIGURE pattern is valid")
});

static SET_BUTTON_COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^SET ([^ ]+) (TRUE|FALSE)$").expect("SET pattern is valid")
});

static SET_GROUP_COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^SETGROUP ([0-9]+) (.+)$").expect("SETGROUP pattern is valid")
});

static SET_VOLUME_COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^SETVOLUME ([0-9]+)$").expect("SETVOLUME pattern is valid")
});

/// A parsed control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Dump configuration and state.
    Poll,
    /// Unlock the panel.
    Enable,
    /// Lock the panel.
    Disable,
    /// Change a button's mode.
    Configure {
        /// Button name as sent by the client.
        name: String,
        /// New mode.
        mode: ButtonMode,
        /// Interlock group, `0` for the other modes.
        group: GroupId,
    },
    /// Write a button LED directly.
    Set {
        /// Button name as sent by the client.
        name: String,
        /// LED state.
        state: bool,
    },
    /// Select a button within a group.
    SetGroup {
        /// Group id.
        group: GroupId,
        /// Button name as sent by the client.
        name: String,
    },
    /// Set the volume level.
    SetVolume {
        /// Level, already clamped to the device range.
        level: u16,
    },
}

/// Result of a successfully executed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Reply to the issuing client.
    pub response: String,
    /// Update for every other client, if the command changed visible state.
    pub broadcast: Option<String>,
}

impl Outcome {
    fn reply(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            broadcast: None,
        }
    }

    fn updated(broadcast: String) -> Self {
        Self {
            response: RESPONSE_UPDATED.to_string(),
            broadcast: Some(broadcast),
        }
    }
}

/// Parse one command line.
///
/// A trailing `\r` and surrounding whitespace are ignored.
pub fn parse(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();

    if line.eq_ignore_ascii_case("POLL") {
        return Ok(Command::Poll);
    }
    if line.eq_ignore_ascii_case("ENABLE") {
        return Ok(Command::Enable);
    }
    if line.eq_ignore_ascii_case("DISABLE") {
        return Ok(Command::Disable);
    }

    if let Some(caps) = CONFIGURE_COMMAND.captures(line) {
        let name = caps[1].to_string();
        let mode_word = caps[2].to_ascii_uppercase();
        let (mode, group) = match mode_word.as_str() {
            "MOMENTARY" => (ButtonMode::Momentary, 0),
            "TOGGLE" => (ButtonMode::Toggle, 0),
            "DISABLED" => (ButtonMode::Disabled, 0),
            _ => (ButtonMode::Interlock, parse_group(&caps[3])?),
        };
        return Ok(Command::Configure { name, mode, group });
    }

    if let Some(caps) = SET_BUTTON_COMMAND.captures(line) {
        return Ok(Command::Set {
            name: caps[1].to_string(),
            state: caps[2].eq_ignore_ascii_case("TRUE"),
        });
    }

    if let Some(caps) = SET_GROUP_COMMAND.captures(line) {
        return Ok(Command::SetGroup {
            group: parse_group(&caps[1])?,
            name: caps[2].to_string(),
        });
    }

    if let Some(caps) = SET_VOLUME_COMMAND.captures(line) {
        let requested: u64 = caps[1]
            .parse()
            .map_err(|e| CommandError::Malformed(format!("volume {:?}: {e}", &caps[1])))?;
        let level = u16::try_from(requested).unwrap_or(u16::MAX);
        return Ok(Command::SetVolume { level });
    }

    Err(CommandError::Unrecognized)
}

fn parse_group(digits: &str) -> Result<GroupId, CommandError> {
    digits
        .parse()
        .map_err(|e| CommandError::Malformed(format!("group {digits:?}: {e}")))
}

/// Apply a parsed command to the panel.
pub fn execute(
    command: Command,
    controller: &mut ButtonController,
    device: &dyn PanelDevice,
) -> Result<Outcome, CommandError> {
    match command {
        Command::Poll => Ok(Outcome::reply(controller.summarize())),
        Command::Enable => {
            controller.enable_all();
            set_panel_active(device, true);
            Ok(Outcome::reply(RESPONSE_ENABLED))
        }
        Command::Disable => {
            controller.disable_all();
            set_panel_active(device, false);
            Ok(Outcome::reply(RESPONSE_DISABLED))
        }
        Command::Configure { name, mode, group } => {
            let id = controller.resolve_name(&name)?;
            controller.set_mode(id, mode, group)?;
            Ok(Outcome::reply(RESPONSE_CONFIGURED))
        }
        Command::Set { name, state } => {
            let id = controller.resolve_name(&name)?;
            controller.set_led(id, state)?;
            let canonical = controller.registry().name(id).unwrap_or(&name);
            Ok(Outcome::updated(protocol::button_update(canonical, state)))
        }
        Command::SetGroup { group, name } => {
            let id = controller.resolve_name(&name)?;
            controller.set_group_selection(group, id)?;
            let canonical = controller.registry().name(id).unwrap_or(&name);
            Ok(Outcome::updated(protocol::group_update(group, canonical)))
        }
        Command::SetVolume { level } => {
            device.set_volume(level);
            Ok(Outcome::updated(protocol::volume_update(level)))
        }
    }
}

/// Parse and execute one line, converting any failure into its response.
pub fn handle_line(
    line: &str,
    controller: &mut ButtonController,
    device: &dyn PanelDevice,
) -> Outcome {
    match parse(line).and_then(|command| execute(command, controller, device)) {
        Ok(outcome) => outcome,
        Err(e) => {
            log::debug!("[Dispatch] {:?} rejected: {e}", line);
            Outcome::reply(e.response())
        }
    }
}

/// Backlight, beep and volume control follow the panel lock.
pub(crate) fn set_panel_active(device: &dyn PanelDevice, on: bool) {
    device.set_backlight(on);
    device.set_beep(on);
    device.set_volume_control(on);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{RESPONSE_INVALID, RESPONSE_UNRECOGNIZED};
    use crate::panel::{ButtonId, ButtonRegistry, DeviceButton, VirtualPanel};
    use std::sync::Arc;

    const A: ButtonId = 1;
    const B: ButtonId = 2;
    const C: ButtonId = 3;

    fn setup() -> (ButtonController, Arc<VirtualPanel>) {
        let registry = ButtonRegistry::from_device(&[
            DeviceButton::new(A, "A"),
            DeviceButton::new(B, "B"),
            DeviceButton::new(C, "C"),
        ]);
        let panel = Arc::new(VirtualPanel::new());
        let device: Arc<dyn PanelDevice> = panel.clone();
        (ButtonController::new(registry, device), panel)
    }

    fn run(line: &str, controller: &mut ButtonController, panel: &VirtualPanel) -> Outcome {
        handle_line(line, controller, panel)
    }

    #[test]
    fn test_parse_keywords_case_insensitive() {
        assert_eq!(parse("poll"), Ok(Command::Poll));
        assert_eq!(parse("Enable"), Ok(Command::Enable));
        assert_eq!(parse("DISABLE\r"), Ok(Command::Disable));
        assert_eq!(
            parse("configure Power interlock group 12"),
            Ok(Command::Configure {
                name: "Power".into(),
                mode: ButtonMode::Interlock,
                group: 12
            })
        );
        assert_eq!(
            parse("set Mute false"),
            Ok(Command::Set { name: "Mute".into(), state: false })
        );
        assert_eq!(
            parse("SetGroup 3 Button 1"),
            Ok(Command::SetGroup { group: 3, name: "Button 1".into() })
        );
    }

    #[test]
    fn test_parse_rejects_unknown_shapes() {
        for line in [
            "",
            "POLLX",
            "CONFIGURE A BLINK",
            "CONFIGURE A INTERLOCK GROUP",
            "CONFIGURE A INTERLOCK GROUP -1",
            "SET A MAYBE",
            "SETGROUP X A",
            "SETVOLUME -5",
            "SETVOLUME loud",
            "xx POLL",
        ] {
            assert_eq!(parse(line), Err(CommandError::Unrecognized), "{line:?}");
        }
    }

    #[test]
    fn test_parse_numeric_overflow_is_malformed() {
        assert!(matches!(
            parse("CONFIGURE A INTERLOCK GROUP 99999999999"),
            Err(CommandError::Malformed(_))
        ));
        assert!(matches!(
            parse("SETGROUP 99999999999 A"),
            Err(CommandError::Malformed(_))
        ));
        assert!(matches!(
            parse("SETVOLUME 999999999999999999999999"),
            Err(CommandError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_volume_is_clamped() {
        assert_eq!(parse("SETVOLUME 70000"), Ok(Command::SetVolume { level: u16::MAX }));
        assert_eq!(parse("SETVOLUME 0"), Ok(Command::SetVolume { level: 0 }));
    }

    #[test]
    fn test_poll_at_startup() {
        let (mut c, panel) = setup();
        let outcome = run("POLL", &mut c, &panel);
        assert!(outcome.response.starts_with("CONFIG:\n  BUTTON<A> = MOMENTARY\n"));
        assert!(outcome.response.contains("  BUTTON<C> = False\n"));
        assert!(!outcome.response.contains("GROUP<"));
        assert!(outcome.broadcast.is_none());
    }

    #[test]
    fn test_configure_responses() {
        let (mut c, panel) = setup();
        assert_eq!(run("CONFIGURE A TOGGLE", &mut c, &panel).response, RESPONSE_CONFIGURED);
        assert_eq!(c.mode(A), Some(ButtonMode::Toggle));

        assert_eq!(
            run("configure b interlock group 4", &mut c, &panel).response,
            RESPONSE_CONFIGURED
        );
        assert_eq!(c.mode(B), Some(ButtonMode::Interlock));
        assert_eq!(c.group_selection(4), Some(B));

        assert_eq!(run("CONFIGURE Nope TOGGLE", &mut c, &panel).response, RESPONSE_INVALID);
        assert_eq!(run("CONFIGURE A BLINK", &mut c, &panel).response, RESPONSE_UNRECOGNIZED);
    }

    #[test]
    fn test_set_bypasses_exclusivity_but_setgroup_enforces_it() {
        let (mut c, panel) = setup();
        run("CONFIGURE B INTERLOCK GROUP 1", &mut c, &panel);
        run("CONFIGURE C INTERLOCK GROUP 1", &mut c, &panel);
        assert_eq!(c.led(B), Some(true));
        assert_eq!(c.led(C), Some(false));

        let outcome = run("SET C TRUE", &mut c, &panel);
        assert_eq!(outcome.response, RESPONSE_UPDATED);
        assert_eq!(
            outcome.broadcast.as_deref(),
            Some("UPDATE:\n  BUTTON<C> = True\n\n")
        );
        assert_eq!(c.led(B), Some(true));
        assert_eq!(c.led(C), Some(true));
        assert_eq!(c.group_selection(1), Some(B));

        let outcome = run("SETGROUP 1 C", &mut c, &panel);
        assert_eq!(outcome.response, RESPONSE_UPDATED);
        assert_eq!(outcome.broadcast.as_deref(), Some("UPDATE:\n  GROUP<1> = C\n\n"));
        assert_eq!(c.led(B), Some(false));
        assert_eq!(c.led(C), Some(true));
        assert_eq!(c.led(A), Some(false));
    }

    #[test]
    fn test_unknown_button_is_invalid() {
        let (mut c, panel) = setup();
        assert_eq!(run("SET Z TRUE", &mut c, &panel).response, RESPONSE_INVALID);
        assert_eq!(run("SETGROUP 1 Z", &mut c, &panel).response, RESPONSE_INVALID);
        assert!(c.group_selection(1).is_none());
    }

    #[test]
    fn test_wire_name_case_folds_to_registered_name() {
        let (mut c, panel) = setup();
        let outcome = run("SET a TRUE", &mut c, &panel);
        assert_eq!(
            outcome.broadcast.as_deref(),
            Some("UPDATE:\n  BUTTON<A> = True\n\n")
        );
        assert_eq!(c.led(A), Some(true));
    }

    #[test]
    fn test_enable_disable_drive_panel() {
        let (mut c, panel) = setup();
        assert_eq!(run("DISABLE", &mut c, &panel).response, RESPONSE_DISABLED);
        assert!(c.is_disabled());
        assert!(!panel.backlight());
        assert!(!panel.beep());
        assert!(!panel.volume_control());

        assert_eq!(run("enable", &mut c, &panel).response, RESPONSE_ENABLED);
        assert!(!c.is_disabled());
        assert!(panel.backlight());
        assert!(panel.beep());
        assert!(panel.volume_control());
    }

    #[test]
    fn test_set_volume_forwards_and_broadcasts() {
        let (mut c, panel) = setup();
        let outcome = run("SETVOLUME 80000", &mut c, &panel);
        assert_eq!(outcome.response, RESPONSE_UPDATED);
        assert_eq!(
            outcome.broadcast.as_deref(),
            Some("UPDATE:\n  VOLUME = 65535\n\n")
        );
        assert_eq!(panel.volume(), u16::MAX);

        assert_eq!(
            run("SETVOLUME 99999999999999999999999", &mut c, &panel).response,
            RESPONSE_INVALID
        );
        assert_eq!(panel.volume(), u16::MAX);
    }
}
