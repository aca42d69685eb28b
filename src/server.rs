//! Server-side upgrade.
//!
//! Reads the client's HTTP/1.1 upgrade request off an accepted stream,
//! validates it, answers `101 Switching Protocols` (or `400 Bad Request`
//! when validation fails), and hands the stream to a [`Connection`]. Bytes
//! the client sent after its request are preserved.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::config::Config;
use crate::connection::{Connection, Role};
use crate::error::Result;
use crate::http;
use crate::protocol::handshake::{write_rejection, HandshakeRequest, HandshakeResponse};

/// Accept a WebSocket upgrade with the default configuration.
pub async fn accept<T>(stream: T) -> Result<Connection<T>>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    accept_with(stream, Config::default()).await
}

/// Accept a WebSocket upgrade with a custom configuration.
///
/// On a handshake failure a `400 Bad Request` is written to the stream and
/// the failure is returned; the stream itself stays open for the caller to
/// dispose of.
///
/// # Errors
///
/// [`crate::Error::Handshake`] when the request is not a well-formed
/// WebSocket upgrade.
pub async fn accept_with<T>(mut stream: T, config: Config) -> Result<Connection<T>>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let (head, leftover) = http::read_head(&mut stream).await?;

    let request = match HandshakeRequest::parse(&head) {
        Ok(request) => request,
        Err(err) => {
            debug!(error = %err, "rejecting websocket upgrade");
            let mut reply = Vec::new();
            write_rejection(&mut reply, &err.to_string());
            let _ = stream.write_all(&reply).await;
            let _ = stream.flush().await;
            return Err(err);
        }
    };

    let mut reply = Vec::new();
    HandshakeResponse::from_request(&request).write(&mut reply);
    stream.write_all(&reply).await?;
    stream.flush().await?;

    debug!(path = %request.path, host = %request.host, "accepted websocket upgrade");
    Ok(Connection::with_buffered(
        stream,
        Role::Server,
        config,
        &leftover,
    ))
}
