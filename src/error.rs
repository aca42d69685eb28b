//! Error types for the WebSocket endpoint implementation.
//!
//! Every fatal error kind carries the close code the connection sends to the
//! peer before tearing down the transport, following RFC 6455 Section 7.4.

use thiserror::Error;

use crate::message::CloseCode;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during WebSocket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// URL, header, or status mismatch during the opening handshake.
    ///
    /// Handshake errors never touch the transport; the caller owns cleanup.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Wire-format violation. Fatal; the connection closes with code 1002.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Invalid UTF-8 in a text message or close reason. Fatal; closes with 1007.
    #[error("invalid UTF-8 in text payload")]
    InvalidUtf8,

    /// Invalid close code received on the wire. Fatal; closes with 1002.
    #[error("invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// Message size exceeds the configured maximum. Fatal; closes with 1009.
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Accumulated message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Underlying byte transport failure. Fatal; closes with 1011 when possible.
    #[error("I/O error: {0}")]
    Io(String),

    /// Both close frames have been exchanged, or the peer finished the close
    /// handshake. End-of-stream, not a failure.
    #[error("connection closed")]
    ConnectionClosed,

    /// The peer did not answer our close frame within the close-wait deadline.
    #[error("timed out waiting for close frame")]
    CloseTimeout,

    /// API misuse: wrong message type for the data path, control payload over
    /// 125 bytes, or writing after close was initiated.
    #[error("misuse: {0}")]
    Misuse(String),
}

impl Error {
    /// The close code this error sends to the peer, if it is a fatal
    /// protocol-level failure.
    #[must_use]
    pub const fn close_code(&self) -> Option<CloseCode> {
        match self {
            Error::Protocol(_) | Error::InvalidCloseCode(_) => Some(CloseCode::ProtocolError),
            Error::InvalidUtf8 => Some(CloseCode::InvalidPayload),
            Error::MessageTooLarge { .. } => Some(CloseCode::MessageTooBig),
            Error::Io(_) => Some(CloseCode::InternalError),
            _ => None,
        }
    }

    /// Whether this error means the connection ended cleanly rather than
    /// failed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Error::ConnectionClosed)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}
