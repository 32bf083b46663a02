//! Wire protocol codec for the TCP control channel.
//!
//! Inbound: newline-delimited ASCII commands.
//!
//! ```text
//! POLL\n
//! CONFIGURE Power TOGGLE\n
//! ```
//!
//! Outbound: every message (response, banner, broadcast) ends with a blank
//! line so a line-oriented client can find message boundaries.
//!
//! ```text
//! UPDATE:\n
//!   BUTTON<Power> = True\n
//! \n
//! ```

use anyhow::{bail, Result};

use crate::constants::MAX_LINE_LENGTH;
use crate::controller::ButtonMode;
use crate::panel::GroupId;

/// Incremental line decoder that handles partial reads.
///
/// Feed bytes via [`LineDecoder::feed`] and receive every complete line.
/// Whatever follows the last `\n` is buffered for the next call, so the
/// output does not depend on how the transport chunks the stream.
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
}

impl LineDecoder {
    /// Create a new decoder with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and extract all complete lines, terminators stripped.
    ///
    /// Empty lines are returned as empty strings. Non-UTF-8 bytes are
    /// replaced rather than rejected.
    ///
    /// # Errors
    ///
    /// Fails once the unterminated tail exceeds [`MAX_LINE_LENGTH`]. The
    /// stream cannot be resynchronized after that.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<String>> {
        self.pending.extend_from_slice(bytes);

        let lines = match self.pending.iter().rposition(|b| *b == b'\n') {
            Some(last_newline) => {
                let rest = self.pending.split_off(last_newline + 1);
                let complete = std::mem::replace(&mut self.pending, rest);
                complete[..last_newline]
                    .split(|b| *b == b'\n')
                    .map(|line| String::from_utf8_lossy(line).into_owned())
                    .collect()
            }
            None => Vec::new(),
        };

        if self.pending.len() > MAX_LINE_LENGTH {
            let length = self.pending.len();
            self.pending.clear();
            bail!("Line too long: {length} bytes without newline (max {MAX_LINE_LENGTH})");
        }

        Ok(lines)
    }

    /// The buffered partial line.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Returns true if the decoder has buffered partial data.
    pub fn has_partial(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Boolean as rendered on the wire.
pub fn format_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// `  BUTTON<name> = MODE[ GROUP n]\n`
pub fn config_line(name: &str, mode: ButtonMode, group: Option<GroupId>) -> String {
    match group {
        Some(group) => format!("  BUTTON<{name}> = {mode} GROUP {group}\n"),
        None => format!("  BUTTON<{name}> = {mode}\n"),
    }
}

/// `  BUTTON<name> = True|False\n`
pub fn button_line(name: &str, state: bool) -> String {
    format!("  BUTTON<{name}> = {}\n", format_bool(state))
}

/// `  GROUP<n> = name\n`
pub fn group_line(group: GroupId, name: &str) -> String {
    format!("  GROUP<{group}> = {name}\n")
}

/// Broadcast for a button LED change.
pub fn button_update(name: &str, state: bool) -> String {
    format!("UPDATE:\n{}\n", button_line(name, state))
}

/// Broadcast for a group selection change.
pub fn group_update(group: GroupId, name: &str) -> String {
    format!("UPDATE:\n{}\n", group_line(group, name))
}

/// Broadcast for a volume change.
pub fn volume_update(level: u16) -> String {
    format!("UPDATE:\n  VOLUME = {level}\n\n")
}

/// Banner sent when a client connects.
pub fn welcome(prompt: &str) -> String {
    format!("# Welcome to {prompt}\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_complete_line() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.feed(b"POLL\n").unwrap(), vec!["POLL"]);
        assert!(!decoder.has_partial());
    }

    #[test]
    fn test_partial_line_is_retained() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.feed(b"CONFIG").unwrap().is_empty());
        assert_eq!(decoder.pending(), b"CONFIG");
        assert_eq!(decoder.feed(b"URE A TOGGLE\nSE").unwrap(), vec!["CONFIGURE A TOGGLE"]);
        assert_eq!(decoder.pending(), b"SE");
    }

    #[test]
    fn test_burst_with_empty_lines() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.feed(b"POLL\n\nSET A TRUE\n\nDIS").unwrap();
        assert_eq!(lines, vec!["POLL", "", "SET A TRUE", ""]);
        assert_eq!(decoder.pending(), b"DIS");
    }

    #[test]
    fn test_carriage_return_is_preserved() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.feed(b"POLL\r\n").unwrap(), vec!["POLL\r"]);
    }

    #[test]
    fn test_chunking_does_not_change_output() {
        let stream: &[u8] = b"POLL\nCONFIGURE B INTERLOCK GROUP 1\n\nSETGROUP 1 C\nSETVOL";

        let mut whole = LineDecoder::new();
        let all_at_once = whole.feed(stream).unwrap();

        for chunk_size in [1, 2, 3, 7, 16] {
            let mut decoder = LineDecoder::new();
            let mut lines = Vec::new();
            for chunk in stream.chunks(chunk_size) {
                lines.extend(decoder.feed(chunk).unwrap());
            }
            assert_eq!(lines, all_at_once, "chunk size {chunk_size}");
            assert_eq!(decoder.pending(), whole.pending());
        }

        assert_eq!(whole.feed(b"UME 10\n").unwrap(), vec!["SETVOLUME 10"]);
    }

    #[test]
    fn test_split_multibyte_character() {
        let mut decoder = LineDecoder::new();
        let bytes = "caf\u{e9}\n".as_bytes();
        let mut lines = Vec::new();
        for byte in bytes {
            lines.extend(decoder.feed(std::slice::from_ref(byte)).unwrap());
        }
        assert_eq!(lines, vec!["caf\u{e9}"]);
    }

    #[test]
    fn test_oversized_line_rejected() {
        let mut decoder = LineDecoder::new();
        let chunk = vec![b'A'; MAX_LINE_LENGTH / 2];
        assert!(decoder.feed(&chunk).unwrap().is_empty());
        assert!(decoder.feed(&chunk).unwrap().is_empty());
        assert!(decoder.feed(b"A").is_err());
        assert!(!decoder.has_partial());
    }

    #[test]
    fn test_long_stream_of_short_lines_accepted() {
        let mut decoder = LineDecoder::new();
        let mut total = 0;
        for _ in 0..(MAX_LINE_LENGTH / 4) {
            total += decoder.feed(b"POLL\nPO").unwrap().len();
            total += decoder.feed(b"LL\n").unwrap().len();
        }
        assert_eq!(total, MAX_LINE_LENGTH / 2);
        assert!(!decoder.has_partial());
    }

    #[test]
    fn test_formatting() {
        assert_eq!(
            config_line("Power", ButtonMode::Interlock, Some(2)),
            "  BUTTON<Power> = INTERLOCK GROUP 2\n"
        );
        assert_eq!(config_line("Mute", ButtonMode::Toggle, None), "  BUTTON<Mute> = TOGGLE\n");
        assert_eq!(button_update("Mute", false), "UPDATE:\n  BUTTON<Mute> = False\n\n");
        assert_eq!(group_update(1, "Power"), "UPDATE:\n  GROUP<1> = Power\n\n");
        assert_eq!(volume_update(5459), "UPDATE:\n  VOLUME = 5459\n\n");
        assert_eq!(welcome("PANEL-1"), "# Welcome to PANEL-1\n\n");
    }
}
