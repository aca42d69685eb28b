//! Configuration for WebSocket connections.

use std::time::Duration;

/// Floor for the outgoing frame buffer: control payloads (up to 125 bytes of
/// application data plus the header) must always fit.
pub const MIN_WRITE_BUFFER_SIZE: usize = 4096;

/// Connection configuration.
///
/// The defaults suit general-purpose use; buffer sizes trade memory for
/// fewer, larger frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Size of the outgoing frame buffer in bytes. A message writer emits a
    /// non-final frame each time the buffer fills. Values below
    /// [`MIN_WRITE_BUFFER_SIZE`] are raised to it.
    ///
    /// Default: 4096.
    pub write_buffer_size: usize,

    /// Initial capacity of the incoming byte buffer.
    ///
    /// Default: 8 KB.
    pub read_buffer_size: usize,

    /// Maximum size of a reassembled incoming message. Exceeding it fails
    /// the connection with close code 1009.
    ///
    /// Default: 64 MiB.
    pub max_message_size: usize,

    /// How long to wait for the peer's close frame after sending ours.
    ///
    /// Default: 15 seconds.
    pub close_timeout: Duration,

    /// Subprotocols advertised in the client handshake. Never negotiated;
    /// the server ignores unknown offers.
    ///
    /// Default: empty.
    pub subprotocols: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            write_buffer_size: MIN_WRITE_BUFFER_SIZE,
            read_buffer_size: 8192,
            max_message_size: 64 * 1024 * 1024,
            close_timeout: Duration::from_secs(15),
            subprotocols: Vec::new(),
        }
    }
}

impl Config {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the outgoing frame buffer size (floored at
    /// [`MIN_WRITE_BUFFER_SIZE`]).
    #[must_use]
    pub fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size.max(MIN_WRITE_BUFFER_SIZE);
        self
    }

    /// Set the initial incoming buffer capacity.
    #[must_use]
    pub const fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set the maximum incoming message size.
    #[must_use]
    pub const fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the close-wait deadline.
    #[must_use]
    pub const fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Set the subprotocols to advertise from the client.
    #[must_use]
    pub fn with_subprotocols(mut self, protocols: Vec<String>) -> Self {
        self.subprotocols = protocols;
        self
    }
}
