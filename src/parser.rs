//! Line splitting and line classification for the chat event protocol

use bytes::{Buf, BytesMut};
use bytes_utils::Str;

use crate::constants::{BOM_CHAR, CR, DATA_PREFIX, EVENT_PREFIX, LF};

/// A single protocol line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// `event: <type>`, the type already trimmed
    Event(&'a str),
    /// `data: <payload>`, the raw payload
    Data(&'a str),
    /// Blank lines, comments and anything else, all ignored
    Other,
}

/// Classifies a line with its EOL already removed
pub fn parse_line(line: &str) -> Line<'_> {
    if let Some(event_type) = line.strip_prefix(EVENT_PREFIX) {
        Line::Event(event_type.trim())
    } else if let Some(data) = line.strip_prefix(DATA_PREFIX) {
        Line::Data(data)
    } else {
        Line::Other
    }
}

/// Growable text buffer that hands out complete `\n`-terminated lines and keeps the unterminated tail.
///
/// Only whole decoded text is ever appended, and lines are only split at ASCII bytes, so the
/// buffer is valid UTF-8 at every split point.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: BytesMut,
    started: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append decoded text. A byte order mark at the very start of the stream is dropped.
    pub fn push(&mut self, text: &str) {
        let text = if !self.started && !text.is_empty() {
            self.started = true;
            text.strip_prefix(BOM_CHAR).unwrap_or(text)
        } else {
            text
        };
        self.buffer.extend_from_slice(text.as_bytes());
    }

    /// Take the next complete line, without its `\n` (or `\r\n`).
    /// Returns [None] when the buffer holds no complete line.
    pub fn next_line(&mut self) -> Option<Str> {
        let line_end = memchr::memchr(LF, &self.buffer)?;
        let line = self.buffer.split_to(line_end).freeze();
        self.buffer.advance(1);
        Some(strip_cr(line))
    }

    /// Take the unterminated remainder as a final line, if there is one
    pub fn take_remainder(&mut self) -> Option<Str> {
        if self.buffer.is_empty() {
            return None;
        }
        Some(strip_cr(self.buffer.split().freeze()))
    }

    /// Bytes currently buffered
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

fn strip_cr(mut line: bytes::Bytes) -> Str {
    if line.last() == Some(&CR) {
        line.truncate(line.len() - 1);
    }
    // Safety: the buffer only ever holds whole `&str`s and we only cut at ASCII bytes
    unsafe { Str::from_inner_unchecked(line) }
}
