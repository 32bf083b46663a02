//! Application-wide constants for tcp-buttons.
//!
//! Centralizes protocol strings, network defaults and timing values so the
//! server, hub and dispatcher agree on them.

use std::time::Duration;

// ============================================================================
// Network
// ============================================================================

/// Default TCP control port.
pub const DEFAULT_PORT: u16 = 9023;

/// Default bind address (all interfaces).
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Default maximum number of simultaneously connected control clients.
pub const DEFAULT_MAX_CLIENTS: usize = 32;

/// Delay before the accept loop retries after a failed `accept()`.
pub const ACCEPT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Listen backlog passed to `listen(2)`.
pub const LISTEN_BACKLOG: u32 = 64;

/// Size of the per-connection read buffer.
pub const READ_BUFFER_SIZE: usize = 4 * 1024;

/// Longest unterminated line a client may send before it is disconnected.
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

/// Depth of each client's outbound message queue.
///
/// Sends beyond this depth are dropped for that client only.
pub const OUTBOUND_QUEUE_DEPTH: usize = 256;

// ============================================================================
// Panel
// ============================================================================

/// Default banner name announced to new connections.
pub const DEFAULT_PROMPT: &str = "TCP-BUTTONS";

/// Volume change applied per press of a hardware volume button.
pub const DEFAULT_VOLUME_STEP: u16 = 5459;

// ============================================================================
// Protocol responses
// ============================================================================

/// Sent after a successful `CONFIGURE`.
pub const RESPONSE_CONFIGURED: &str = "CONFIGURATION SUCCESS\n\n";

/// Sent after a successful `SET`, `SETGROUP` or `SETVOLUME`.
pub const RESPONSE_UPDATED: &str = "UPDATED\n\n";

/// Sent after `ENABLE`.
pub const RESPONSE_ENABLED: &str = "PANEL ENABLED\n\n";

/// Sent after `DISABLE`.
pub const RESPONSE_DISABLED: &str = "PANEL DISABLED\n\n";

/// Recognized command with an unknown button or unparsable field.
pub const RESPONSE_INVALID: &str = "! INVALID COMMAND\n\n";

/// Input that matches no command.
pub const RESPONSE_UNRECOGNIZED: &str = "! UNRECOGNIZED COMMAND\n\n";

/// Sent in place of the summary when no panel is bound.
pub const RESPONSE_UNSUPPORTED: &str = "! Device platform not supported.\n\n";
