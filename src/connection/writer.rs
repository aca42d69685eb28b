//! Streaming message writer.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::connection::connection::Connection;
use crate::error::Result;

/// Streaming writer for one outgoing message.
///
/// Obtained from [`Connection::next_writer`]. Bytes accumulate in the
/// connection's write buffer; each time it fills, a non-final frame goes out
/// (the first carries the message opcode, the rest are continuations).
/// [`close`](MessageWriter::close) emits the final frame with whatever is
/// buffered, possibly empty.
///
/// The writer borrows the connection, which is what guarantees at most one
/// writer exists at a time. Dropping it without closing leaves the message
/// open; the next [`Connection::next_writer`] call finishes it first.
pub struct MessageWriter<'c, T> {
    conn: &'c mut Connection<T>,
}

impl<T> std::fmt::Debug for MessageWriter<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageWriter").finish_non_exhaustive()
    }
}

impl<'c, T> MessageWriter<'c, T> {
    pub(super) fn new(conn: &'c mut Connection<T>) -> Self {
        Self { conn }
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> MessageWriter<'_, T> {
    /// Append `data` to the message.
    ///
    /// All bytes are accepted; frames are emitted on buffer boundaries along
    /// the way. Returns `data.len()`.
    pub async fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.conn.writer_write(data).await
    }

    /// Finish the message: emit the final frame and detach the writer.
    pub async fn close(self) -> Result<()> {
        self.conn.flush_writer_frame(true).await
    }
}
