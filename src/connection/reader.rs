//! Streaming message reader.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::connection::connection::Connection;
use crate::error::Result;

/// Streaming reader for one incoming message.
///
/// Obtained from [`Connection::next_reader`]. Payload bytes arrive in wire
/// order across fragment boundaries; control frames interleaved between
/// fragments are consumed and answered transparently, so the reader observes
/// one continuous byte stream.
///
/// The reader borrows the connection, which is what guarantees at most one
/// reader exists at a time. Dropping it mid-message is fine: the next call
/// to [`Connection::next_reader`] discards the unread remainder.
pub struct MessageReader<'c, T> {
    conn: &'c mut Connection<T>,
}

impl<'c, T> MessageReader<'c, T> {
    pub(super) fn new(conn: &'c mut Connection<T>) -> Self {
        Self { conn }
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> MessageReader<'_, T> {
    /// Read up to `buf.len()` payload bytes.
    ///
    /// Returns the number of bytes read, or 0 at end of message. Subsequent
    /// calls after end of message keep returning 0.
    ///
    /// # Errors
    ///
    /// Fatal connection errors (protocol violation, invalid UTF-8, transport
    /// failure) surface here and are replayed by every later operation.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.conn.read_chunk(buf).await
    }

    /// Read the rest of the message, appending to `buf`.
    ///
    /// Returns the number of bytes appended.
    pub async fn read_to_end(&mut self, buf: &mut Vec<u8>) -> Result<usize> {
        let mut total = 0;
        let mut scratch = [0u8; 4096];
        loop {
            let n = self.conn.read_chunk(&mut scratch).await?;
            if n == 0 {
                return Ok(total);
            }
            buf.extend_from_slice(&scratch[..n]);
            total += n;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::connection::{Connection, Role};
    use crate::message::MessageType;
    use tokio::io::{duplex, AsyncWriteExt};

    #[tokio::test]
    async fn test_read_in_small_chunks() {
        let (local, mut peer) = duplex(1024);
        let mut conn = Connection::new(local, Role::Client, Config::default());

        peer.write_all(&[0x81, 0x05, b'H', b'e', b'l', b'l', b'o'])
            .await
            .unwrap();

        let (kind, mut reader) = conn.next_reader().await.unwrap();
        assert_eq!(kind, MessageType::Text);

        let mut collected = Vec::new();
        let mut buf = [0u8; 2];
        loop {
            let n = reader.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            collected.extend_from_slice(&buf[..n]);
        }
        assert_eq!(collected, b"Hello");

        // End of message is sticky.
        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_read_to_end_spans_fragments() {
        let (local, mut peer) = duplex(1024);
        let mut conn = Connection::new(local, Role::Client, Config::default());

        peer.write_all(&[0x02, 0x03, 1, 2, 3]).await.unwrap();
        peer.write_all(&[0x00, 0x02, 4, 5]).await.unwrap();
        peer.write_all(&[0x80, 0x01, 6]).await.unwrap();

        let (kind, mut reader) = conn.next_reader().await.unwrap();
        assert_eq!(kind, MessageType::Binary);

        let mut data = Vec::new();
        let n = reader.read_to_end(&mut data).await.unwrap();
        assert_eq!(n, 6);
        assert_eq!(data, [1, 2, 3, 4, 5, 6]);
    }
}
