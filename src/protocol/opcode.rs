//! WebSocket frame opcodes as defined in RFC 6455.

use crate::error::{Error, Result};

/// WebSocket frame opcode.
///
/// Defines the interpretation of the payload data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Continuation frame (0x0).
    ///
    /// Carries the next fragment of the message in flight.
    Continuation = 0x0,

    /// Text frame (0x1).
    ///
    /// The reassembled message payload must be valid UTF-8.
    Text = 0x1,

    /// Binary frame (0x2).
    Binary = 0x2,

    /// Close frame (0x8).
    ///
    /// Starts or answers the closing handshake. May carry a status code and
    /// reason.
    Close = 0x8,

    /// Ping frame (0x9).
    Ping = 0x9,

    /// Pong frame (0xA).
    ///
    /// Answer to a ping, or an unsolicited heartbeat.
    Pong = 0xA,
}

impl OpCode {
    /// Decode an opcode from the low nibble of the first frame byte.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] for the reserved ranges 0x3-0x7 and
    /// 0xB-0xF; frames carrying them are a protocol violation.
    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            other => Err(Error::Protocol(format!("reserved opcode {other:#x}"))),
        }
    }

    /// Whether a raw opcode nibble falls in a reserved range.
    #[inline]
    #[must_use]
    pub const fn is_reserved(byte: u8) -> bool {
        matches!(byte, 0x3..=0x7 | 0xB..=0xF)
    }

    /// Raw nibble value of this opcode.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether this is a control opcode (Close, Ping, Pong).
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }

    /// Whether this is a data opcode (Continuation, Text, Binary).
    #[inline]
    #[must_use]
    pub const fn is_data(self) -> bool {
        matches!(self, OpCode::Continuation | OpCode::Text | OpCode::Binary)
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OpCode::Continuation => "Continuation",
            OpCode::Text => "Text",
            OpCode::Binary => "Binary",
            OpCode::Close => "Close",
            OpCode::Ping => "Ping",
            OpCode::Pong => "Pong",
        };
        write!(f, "{name}")
    }
}
