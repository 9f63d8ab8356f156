//! Byte-at-a-time line assembly for serial consoles.

use heapless::{String, Vec};

/// Maximum number of bytes accepted on a single line (excluding terminator).
pub const MAX_LINE_LEN: usize = 96;

/// Result of feeding one byte.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Feed<const N: usize> {
    /// Byte stored; echo it back.
    Stored,
    /// Last byte removed; echo a destructive backspace.
    Erased,
    /// Nothing changed.
    Ignored,
    Line(String<N>),
    /// Line exceeded `N` bytes and was dropped; input resumes after the next terminator.
    Overflow,
    InvalidUtf8,
}

/// Accumulates input until `\r` or `\n`.
pub struct LineBuffer<const N: usize = MAX_LINE_LEN> {
    buffer: Vec<u8, N>,
    discarding: bool,
}

impl<const N: usize> LineBuffer<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            discarding: false,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drops any partial line, e.g. when the host closes the port.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }

    pub fn push(&mut self, byte: u8) -> Feed<N> {
        match byte {
            b'\r' | b'\n' => {
                if self.discarding {
                    self.discarding = false;
                    return Feed::Ignored;
                }
                if self.buffer.is_empty() {
                    return Feed::Ignored;
                }
                let bytes = core::mem::take(&mut self.buffer);
                match String::from_utf8(bytes) {
                    Ok(line) => Feed::Line(line),
                    Err(_) => Feed::InvalidUtf8,
                }
            }
            0x08 | 0x7f => {
                if self.discarding || self.buffer.pop().is_none() {
                    Feed::Ignored
                } else {
                    Feed::Erased
                }
            }
            _ if self.discarding => Feed::Ignored,
            value => {
                if self.buffer.push(value).is_err() {
                    self.buffer.clear();
                    self.discarding = true;
                    return Feed::Overflow;
                }
                Feed::Stored
            }
        }
    }
}

impl<const N: usize> Default for LineBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
