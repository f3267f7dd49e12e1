//! Incremental, lossy UTF-8 decoding of a chunked byte source

use bytes::{Buf, BufMut, BytesMut};
use bytes_utils::Str;

use crate::constants::REPLACEMENT;

/// Converts byte chunks of arbitrary size into text.
///
/// A multi-byte sequence cut by a chunk boundary is held back and prefixed onto the next chunk,
/// so no boundary ever corrupts a character. Malformed sequences decode to U+FFFD instead of
/// failing.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: BytesMut,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `pending + chunk` as possible. Any trailing incomplete sequence stays buffered.
    pub fn decode(&mut self, chunk: &[u8]) -> Str {
        self.pending.extend_from_slice(chunk);

        match core::str::from_utf8(&self.pending) {
            Ok(_) => {
                // Safety: we just checked the buffer is valid utf8
                unsafe { Str::from_inner_unchecked(self.pending.split().freeze()) }
            }
            Err(e) if e.error_len().is_none() => {
                let valid = self.pending.split_to(e.valid_up_to()).freeze();
                // Safety: we just split off the valid section of utf8
                unsafe { Str::from_inner_unchecked(valid) }
            }
            Err(_) => self.decode_lossy(false),
        }
    }

    /// Flush whatever is still held. An incomplete sequence at the very end becomes U+FFFD.
    pub fn finish(&mut self) -> Str {
        if self.pending.is_empty() {
            return Str::from_static("");
        }
        self.decode_lossy(true)
    }

    /// Bytes held back waiting for the rest of a character
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn decode_lossy(&mut self, at_end: bool) -> Str {
        let mut out = BytesMut::with_capacity(self.pending.len() + REPLACEMENT.len());

        loop {
            match core::str::from_utf8(&self.pending) {
                Ok(_) => {
                    out.put_slice(&self.pending);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid_to = e.valid_up_to();
                    out.put_slice(&self.pending[..valid_to]);
                    match e.error_len() {
                        Some(invalid_len) => {
                            out.put_slice(REPLACEMENT);
                            self.pending.advance(valid_to + invalid_len);
                        }
                        None if at_end => {
                            out.put_slice(REPLACEMENT);
                            self.pending.clear();
                            break;
                        }
                        None => {
                            self.pending.advance(valid_to);
                            break;
                        }
                    }
                }
            }
        }

        // Safety: only validated prefixes and whole replacement characters were written
        unsafe { Str::from_inner_unchecked(out.freeze()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(chunks: &[&[u8]]) -> Vec<Str> {
        let mut decoder = Utf8Decoder::new();
        let mut out: Vec<Str> = chunks.iter().map(|chunk| decoder.decode(chunk)).collect();
        out.push(decoder.finish());
        out
    }

    #[test]
    fn valid_chunks() {
        assert_eq!(
            decode_all(&[b"Hello", b", world!"]),
            vec![Str::from("Hello"), Str::from(", world!"), Str::from("")]
        );

        assert_eq!(
            decode_all(&[&[240, 159, 145, 141]]),
            vec![Str::from("👍"), Str::from("")]
        );
    }

    #[test]
    fn split_characters() {
        // Emoji split across two chunks
        assert_eq!(
            decode_all(&[&[240, 159], &[145, 141]]),
            vec![Str::from(""), Str::from("👍"), Str::from("")]
        );

        // Split emoji followed by a complete one
        assert_eq!(
            decode_all(&[&[240, 159], &[145, 141, 240, 159, 145, 141]]),
            vec![Str::from(""), Str::from("👍👍"), Str::from("")]
        );

        // One byte at a time through a mixed string
        let text = "héllo, 世界 👍";
        let mut decoder = Utf8Decoder::new();
        let mut joined = String::new();
        for byte in text.as_bytes() {
            joined.push_str(&decoder.decode(core::slice::from_ref(byte)));
        }
        joined.push_str(&decoder.finish());
        assert_eq!(joined, text);
    }

    #[test]
    fn incomplete_sequence_is_held() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"ab\xE4\xB8"), Str::from("ab"));
        assert_eq!(decoder.pending(), 2);
        assert_eq!(decoder.decode(b"\x96c"), Str::from("世c"));
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn malformed_bytes_are_replaced() {
        assert_eq!(
            decode_all(&[b"Hello ", &[0xFF], b"world"]),
            vec![
                Str::from("Hello "),
                Str::from("\u{FFFD}"),
                Str::from("world"),
                Str::from("")
            ]
        );

        // Invalid byte in the middle of a chunk that also ends mid-character
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"a\xFFb\xF0\x9F"), Str::from("a\u{FFFD}b"));
        assert_eq!(decoder.decode(b"\x91\x8D"), Str::from("👍"));
    }

    #[test]
    fn truncated_tail_is_replaced_on_finish() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&[240, 159]), Str::from(""));
        assert_eq!(decoder.finish(), Str::from("\u{FFFD}"));
        assert_eq!(decoder.finish(), Str::from(""));
    }
}
