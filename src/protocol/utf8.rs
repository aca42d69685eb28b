//! Incremental UTF-8 validation for text messages (RFC 6455 Section 8.1).
//!
//! A multi-byte code point may straddle a frame or read-chunk boundary, so
//! the validator keeps the trailing incomplete sequence between calls and
//! only rejects it if the message ends before it completes.

use crate::error::{Error, Result};

/// Number of bytes the lead byte promises, or `None` for an invalid lead.
const fn sequence_len(lead: u8) -> Option<usize> {
    match lead {
        0x00..=0x7f => Some(1),
        0xc2..=0xdf => Some(2),
        0xe0..=0xef => Some(3),
        0xf0..=0xf4 => Some(4),
        _ => None,
    }
}

/// Streaming UTF-8 validator carrying partial code points across chunks.
#[derive(Debug, Clone, Default)]
pub struct Utf8Validator {
    pending: [u8; 4],
    pending_len: usize,
}

impl Utf8Validator {
    /// Create a validator with no pending bytes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk of a text message.
    ///
    /// `is_final` marks the last chunk of the message; a code point still
    /// incomplete at that point is an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUtf8`] on any malformed sequence.
    pub fn feed(&mut self, mut data: &[u8], is_final: bool) -> Result<()> {
        if self.pending_len > 0 {
            let expected = sequence_len(self.pending[0]).unwrap_or(1);
            while self.pending_len < expected {
                let Some((&byte, rest)) = data.split_first() else {
                    if is_final {
                        return Err(Error::InvalidUtf8);
                    }
                    return Ok(());
                };
                if byte & 0xc0 != 0x80 {
                    return Err(Error::InvalidUtf8);
                }
                self.pending[self.pending_len] = byte;
                self.pending_len += 1;
                data = rest;
            }
            std::str::from_utf8(&self.pending[..self.pending_len])
                .map_err(|_| Error::InvalidUtf8)?;
            self.pending_len = 0;
        }

        match std::str::from_utf8(data) {
            Ok(_) => Ok(()),
            Err(e) => {
                // error_len() is None only for a truncated sequence at the
                // very end of the chunk, which a later chunk may complete.
                if !is_final && e.error_len().is_none() {
                    let tail = &data[e.valid_up_to()..];
                    self.pending[..tail.len()].copy_from_slice(tail);
                    self.pending_len = tail.len();
                    Ok(())
                } else {
                    Err(Error::InvalidUtf8)
                }
            }
        }
    }

    /// Drop any pending bytes, ready for a fresh message.
    pub fn reset(&mut self) {
        self.pending_len = 0;
    }

    /// Whether a partial code point is waiting for continuation bytes.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending_len > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_complete_chunks() {
        let mut v = Utf8Validator::new();
        assert!(v.feed(b"Hello, World!", true).is_ok());

        v.reset();
        assert!(v.feed("こんにちは".as_bytes(), true).is_ok());

        v.reset();
        assert!(v.feed("Hello 世界 🌍".as_bytes(), true).is_ok());
    }

    #[test]
    fn test_invalid_sequences() {
        let mut v = Utf8Validator::new();
        assert!(v.feed(&[0x80], true).is_err());

        v.reset();
        assert!(v.feed(&[0xc0, 0x80], true).is_err());

        v.reset();
        assert!(v.feed(&[0xff], true).is_err());

        v.reset();
        assert!(v.feed(&[0xe0, 0x80, 0x80], true).is_err());
    }

    #[test]
    fn test_split_three_byte_sequence() {
        // Euro sign: E2 82 AC
        let mut v = Utf8Validator::new();
        assert!(v.feed(&[0xe2], false).is_ok());
        assert!(v.has_pending());
        assert!(v.feed(&[0x82, 0xac], true).is_ok());
        assert!(!v.has_pending());
    }

    #[test]
    fn test_split_four_byte_sequence() {
        // 🎉 = F0 9F 8E 89, every split point
        let bytes = [0xf0u8, 0x9f, 0x8e, 0x89];
        for split in 1..4 {
            let mut v = Utf8Validator::new();
            assert!(v.feed(&bytes[..split], false).is_ok(), "split {split}");
            assert!(v.feed(&bytes[split..], true).is_ok(), "split {split}");
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let text = "He𐍈llo".as_bytes();
        let mut v = Utf8Validator::new();
        for (i, byte) in text.iter().enumerate() {
            let is_final = i == text.len() - 1;
            assert!(v.feed(&[*byte], is_final).is_ok(), "byte {i}");
        }
    }

    #[test]
    fn test_truncated_at_message_end_fails() {
        let mut v = Utf8Validator::new();
        assert!(v.feed(&[0xe2], true).is_err());

        // Pending sequence never completed before the final empty chunk.
        let mut v = Utf8Validator::new();
        assert!(v.feed(&[0xe2, 0x82], false).is_ok());
        assert!(v.feed(&[], true).is_err());
    }

    #[test]
    fn test_invalid_continuation_detected() {
        let mut v = Utf8Validator::new();
        assert!(v.feed(&[0xe2], false).is_ok());
        // 'A' is not a continuation byte
        assert!(v.feed(&[0x41], false).is_err());
    }

    #[test]
    fn test_empty_chunks_preserve_pending() {
        let mut v = Utf8Validator::new();
        assert!(v.feed(&[], false).is_ok());
        assert!(v.feed(&[0xe2], false).is_ok());
        assert!(v.feed(&[], false).is_ok());
        assert!(v.has_pending());
        assert!(v.feed(&[0x82, 0xac], true).is_ok());
    }

    #[test]
    fn test_reset_discards_pending() {
        let mut v = Utf8Validator::new();
        assert!(v.feed(&[0xf0, 0x9f], false).is_ok());
        v.reset();
        assert!(!v.has_pending());
        assert!(v.feed(b"fresh", true).is_ok());
    }

    #[test]
    fn test_invalid_in_middle_of_chunk() {
        let mut v = Utf8Validator::new();
        let data = [0x48, 0x65, 0x80, 0x6c, 0x6f];
        assert!(v.feed(&data, false).is_err());
    }

    #[test]
    fn test_overlong_across_boundary() {
        // C0 AF is an overlong encoding of '/'; C0 is already an invalid
        // lead byte and must fail no matter how it is split.
        let mut v = Utf8Validator::new();
        assert!(v.feed(&[0xc0], false).is_err() || v.feed(&[0xaf], true).is_err());
    }
}
