//! Newline framing for the arm link
//!
//! Bytes arrive from the serial driver in arbitrary chunks. [`LineBuffer`]
//! accumulates them and yields complete lines with the terminator removed.

use std::collections::VecDeque;

/// Longest line we keep before discarding the partial buffer
pub const MAX_LINE_LEN: usize = 4096;

/// Accumulates raw bytes and splits them on `\n`
///
/// A trailing `\r` is stripped so CRLF firmware output frames the same as LF.
/// Empty lines are dropped. Lines are returned as raw bytes: decoding is the
/// caller's job, and garbage is passed through untouched.
pub struct LineBuffer {
    partial: Vec<u8>,
    ready: VecDeque<Vec<u8>>,
    overflowed: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self {
            partial: Vec::with_capacity(256),
            ready: VecDeque::new(),
            overflowed: false,
        }
    }

    /// Ingest a chunk read from the port
    pub fn push(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if b == b'\n' {
                if self.overflowed {
                    // Tail of an oversized line, drop it
                    self.overflowed = false;
                    self.partial.clear();
                    continue;
                }
                if self.partial.last() == Some(&b'\r') {
                    self.partial.pop();
                }
                if !self.partial.iter().all(u8::is_ascii_whitespace) {
                    self.ready.push_back(std::mem::take(&mut self.partial));
                } else {
                    self.partial.clear();
                }
            } else if !self.overflowed {
                self.partial.push(b);
                if self.partial.len() > MAX_LINE_LEN {
                    log::warn!(
                        "Discarding line longer than {} bytes without terminator",
                        MAX_LINE_LEN
                    );
                    self.partial.clear();
                    self.overflowed = true;
                }
            }
        }
    }

    /// Pop the oldest complete line
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        self.ready.pop_front()
    }

    /// Number of complete lines waiting
    pub fn pending(&self) -> usize {
        self.ready.len()
    }

    /// Drop everything, including any partial line
    pub fn clear(&mut self) {
        self.partial.clear();
        self.ready.clear();
        self.overflowed = false;
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}
