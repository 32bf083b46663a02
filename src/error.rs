//! Typed errors for the controller and command layers.
//!
//! Transport and listener failures never surface as values: they are logged
//! where they happen. Everything here is converted into a response line at the
//! single-command boundary in [`crate::dispatch`].

use crate::panel::ButtonId;

/// Errors raised by [`crate::controller::ButtonController`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    /// No button with this id is registered.
    #[error("unknown button id: {0}")]
    UnknownButtonId(ButtonId),
    /// No button with this name is registered.
    #[error("unknown button name: {0:?}")]
    UnknownButtonName(String),
}

/// Errors raised while parsing or executing a single command line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The line matches no known command.
    #[error("unrecognized command")]
    Unrecognized,
    /// The line matches a command shape but a field is unusable.
    #[error("malformed command: {0}")]
    Malformed(String),
    /// The controller rejected the operation.
    #[error(transparent)]
    Controller(#[from] ControllerError),
}

impl CommandError {
    /// Wire response for this error.
    pub fn response(&self) -> &'static str {
        match self {
            Self::Unrecognized => crate::constants::RESPONSE_UNRECOGNIZED,
            Self::Malformed(_) | Self::Controller(_) => crate::constants::RESPONSE_INVALID,
        }
    }
}
