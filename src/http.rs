//! Minimal HTTP/1.1 plumbing for the opening handshake: read one header
//! section off a stream, keeping any bytes that followed it.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};

/// Upper bound on the HTTP header section read during the handshake.
pub(crate) const MAX_HEAD_SIZE: usize = 8192;

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|pos| pos + 4)
}

/// Read up to and including the blank line ending an HTTP header section.
///
/// Returns the header bytes and any surplus already read past them. The
/// surplus must be handed to the connection: a fast peer may start sending
/// frames immediately after its handshake message.
pub(crate) async fn read_head<T: AsyncRead + Unpin>(stream: &mut T) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut buf: Vec<u8> = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        if let Some(end) = find_head_end(&buf) {
            let leftover = buf.split_off(end);
            return Ok((buf, leftover));
        }
        if buf.len() > MAX_HEAD_SIZE {
            return Err(Error::Handshake("HTTP header section too large".into()));
        }
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| Error::Handshake(format!("transport failed during handshake: {e}")))?;
        if n == 0 {
            return Err(Error::Handshake(
                "connection closed during handshake".into(),
            ));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}
