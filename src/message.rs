//! Message types and close status codes as defined in RFC 6455.

use crate::protocol::OpCode;

/// The kind of WebSocket message, data or control.
///
/// Data messages (`Text`, `Binary`) flow through the streaming reader and
/// writer. Control messages (`Close`, `Ping`, `Pong`) use the control path
/// and are never fragmented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// UTF-8 text message (opcode 0x1).
    Text = 0x1,
    /// Arbitrary binary message (opcode 0x2).
    Binary = 0x2,
    /// Close control message (opcode 0x8).
    Close = 0x8,
    /// Ping control message (opcode 0x9).
    Ping = 0x9,
    /// Pong control message (opcode 0xA).
    Pong = 0xA,
}

impl MessageType {
    /// Returns `true` for text and binary messages.
    #[inline]
    #[must_use]
    pub const fn is_data(self) -> bool {
        matches!(self, MessageType::Text | MessageType::Binary)
    }

    /// Returns `true` for close, ping, and pong messages.
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        matches!(
            self,
            MessageType::Close | MessageType::Ping | MessageType::Pong
        )
    }

    /// The wire opcode carried by the first frame of this message.
    #[inline]
    #[must_use]
    pub const fn opcode(self) -> OpCode {
        match self {
            MessageType::Text => OpCode::Text,
            MessageType::Binary => OpCode::Binary,
            MessageType::Close => OpCode::Close,
            MessageType::Ping => OpCode::Ping,
            MessageType::Pong => OpCode::Pong,
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MessageType::Text => "Text",
            MessageType::Binary => "Binary",
            MessageType::Close => "Close",
            MessageType::Ping => "Ping",
            MessageType::Pong => "Pong",
        };
        write!(f, "{name}")
    }
}

/// WebSocket close status code per RFC 6455 Section 7.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CloseCode {
    /// Normal closure (1000). The connection completed its purpose.
    #[default]
    Normal,
    /// Going away (1001). Endpoint is leaving (server shutdown, tab closing).
    GoingAway,
    /// Protocol error (1002). Peer violated the framing rules.
    ProtocolError,
    /// Unsupported data (1003). Peer sent a data type the endpoint cannot accept.
    UnsupportedData,
    /// No status present (1005). Local-only: the peer's close frame carried no
    /// code. Never transmitted; mirrored as an empty close payload.
    NoStatus,
    /// Invalid frame payload data (1007). Non-UTF-8 bytes in a text message.
    InvalidPayload,
    /// Policy violation (1008).
    PolicyViolation,
    /// Message too big (1009).
    MessageTooBig,
    /// Mandatory extension missing (1010).
    MandatoryExtension,
    /// Internal error (1011).
    InternalError,
    /// Service restart (1012).
    ServiceRestart,
    /// Try again later (1013).
    TryAgainLater,
    /// Registered or application-defined code (3000-4999), or anything else
    /// seen on the wire.
    Other(u16),
}

impl CloseCode {
    /// Build a `CloseCode` from its numeric value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1005 => CloseCode::NoStatus,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalError,
            1012 => CloseCode::ServiceRestart,
            1013 => CloseCode::TryAgainLater,
            other => CloseCode::Other(other),
        }
    }

    /// The numeric value of this close code.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::NoStatus => 1005,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::ServiceRestart => 1012,
            CloseCode::TryAgainLater => 1013,
            CloseCode::Other(code) => *code,
        }
    }

    /// Whether this code may appear on the wire per RFC 6455 Section 7.4.
    ///
    /// Valid: 1000-1003, 1007-1013, and the 3000-4999 range. The reserved
    /// codes 1004, 1005, 1006, and 1015 must never be transmitted.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self.as_u16(), 1000..=1003 | 1007..=1013 | 3000..=4999)
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// Build the payload of a close frame: 2-byte big-endian code followed by the
/// UTF-8 reason.
///
/// `CloseCode::NoStatus` yields an empty payload, keeping 1005 off the wire.
#[must_use]
pub fn close_payload(code: CloseCode, reason: &str) -> Vec<u8> {
    if matches!(code, CloseCode::NoStatus) {
        return Vec::new();
    }
    let mut payload = Vec::with_capacity(2 + reason.len());
    payload.extend_from_slice(&code.as_u16().to_be_bytes());
    payload.extend_from_slice(reason.as_bytes());
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_classification() {
        assert!(MessageType::Text.is_data());
        assert!(MessageType::Binary.is_data());
        assert!(!MessageType::Ping.is_data());

        assert!(MessageType::Close.is_control());
        assert!(MessageType::Ping.is_control());
        assert!(MessageType::Pong.is_control());
        assert!(!MessageType::Text.is_control());
    }

    #[test]
    fn test_message_type_opcode() {
        assert_eq!(MessageType::Text.opcode(), OpCode::Text);
        assert_eq!(MessageType::Binary.opcode(), OpCode::Binary);
        assert_eq!(MessageType::Close.opcode(), OpCode::Close);
        assert_eq!(MessageType::Ping.opcode(), OpCode::Ping);
        assert_eq!(MessageType::Pong.opcode(), OpCode::Pong);
    }

    #[test]
    fn test_close_code_roundtrip() {
        for code in [1000, 1001, 1002, 1003, 1007, 1008, 1009, 1010, 1011, 1012, 1013] {
            assert_eq!(CloseCode::from_u16(code).as_u16(), code);
        }
        assert_eq!(CloseCode::from_u16(3000), CloseCode::Other(3000));
        assert_eq!(CloseCode::Other(4999).as_u16(), 4999);
    }

    #[test]
    fn test_close_code_validity() {
        for code in [1000, 1001, 1002, 1003, 1007, 1008, 1009, 1010, 1011, 1012, 1013] {
            assert!(CloseCode::from_u16(code).is_valid(), "{code} must be valid");
        }
        assert!(CloseCode::from_u16(3000).is_valid());
        assert!(CloseCode::from_u16(4999).is_valid());

        for code in [0, 999, 1004, 1005, 1006, 1014, 1015, 1016, 2999, 5000] {
            assert!(
                !CloseCode::from_u16(code).is_valid(),
                "{code} must be invalid"
            );
        }
    }

    #[test]
    fn test_close_payload_layout() {
        let payload = close_payload(CloseCode::Normal, "bye");
        assert_eq!(&payload[..2], &[0x03, 0xe8]);
        assert_eq!(&payload[2..], b"bye");
    }

    #[test]
    fn test_close_payload_no_status_is_empty() {
        assert!(close_payload(CloseCode::NoStatus, "ignored").is_empty());
    }

    #[test]
    fn test_close_code_display() {
        assert_eq!(CloseCode::Normal.to_string(), "1000");
        assert_eq!(CloseCode::Other(4001).to_string(), "4001");
    }
}
