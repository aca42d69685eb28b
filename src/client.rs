//! Client-side handshake and dialing.
//!
//! [`Dialer`] opens `ws://` endpoints over TCP directly. For `wss://` (or
//! any other pre-established transport such as a TLS stream or a proxy
//! tunnel), establish the stream yourself and run
//! [`Dialer::handshake`] over it; the protocol core never does TLS.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::connection::{Connection, Role};
use crate::error::{Error, Result};
use crate::http;
use crate::protocol::handshake::{HandshakeRequest, HandshakeResponse};

/// Pieces of a WebSocket URL relevant to the handshake.
struct Endpoint {
    host: String,
    port: u16,
    /// Whether the scheme was `wss`.
    secure: bool,
    /// Host header value: host plus port when the port is non-default.
    authority: String,
    /// Request target: path plus query string.
    target: String,
}

fn parse_endpoint(url: &str) -> Result<Endpoint> {
    let parsed =
        Url::parse(url).map_err(|e| Error::Handshake(format!("invalid URL {url:?}: {e}")))?;

    let secure = match parsed.scheme() {
        "ws" => false,
        "wss" => true,
        other => {
            return Err(Error::Handshake(format!(
                "URL scheme must be ws or wss, got {other:?}"
            )));
        }
    };

    let host = parsed
        .host_str()
        .ok_or_else(|| Error::Handshake(format!("URL {url:?} has no host")))?
        .to_string();
    let port = parsed
        .port_or_known_default()
        .ok_or_else(|| Error::Handshake(format!("URL {url:?} has no port")))?;

    let authority = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.clone(),
    };

    let mut target = parsed.path().to_string();
    if target.is_empty() {
        target.push('/');
    }
    if let Some(query) = parsed.query() {
        target.push('?');
        target.push_str(query);
    }

    Ok(Endpoint {
        host,
        port,
        secure,
        authority,
        target,
    })
}

/// Opens client connections.
///
/// Carries the connection [`Config`] (including advertised subprotocols)
/// and any extra headers to put on the upgrade request.
#[derive(Debug, Clone, Default)]
pub struct Dialer {
    config: Config,
    extra_headers: Vec<(String, String)>,
}

impl Dialer {
    /// A dialer with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A dialer with a custom configuration.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            extra_headers: Vec::new(),
        }
    }

    /// Add a header to the upgrade request.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    /// Connect over TCP and upgrade.
    ///
    /// Only `ws://` URLs dial directly; port defaults to 80. For `wss://`
    /// establish the TLS stream first and use
    /// [`handshake`](Dialer::handshake).
    ///
    /// # Errors
    ///
    /// [`Error::Handshake`] for URL or upgrade failures, [`Error::Io`] when
    /// the TCP connection cannot be established.
    pub async fn dial(&self, url: &str) -> Result<Connection<TcpStream>> {
        let endpoint = parse_endpoint(url)?;
        if endpoint.secure {
            return Err(Error::Handshake(
                "wss URLs need an established TLS transport; use Dialer::handshake".into(),
            ));
        }

        debug!(host = %endpoint.host, port = endpoint.port, "dialing websocket server");
        let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
            .await
            .map_err(|e| Error::Io(format!("failed to connect: {e}")))?;

        self.handshake(stream, url).await
    }

    /// Run the client handshake over an established transport.
    ///
    /// On failure the transport is returned to the caller's ownership
    /// implicitly by drop; no close frame or shutdown is attempted.
    ///
    /// # Errors
    ///
    /// [`Error::Handshake`] when the server's response is not a valid 101
    /// with a matching Sec-WebSocket-Accept.
    pub async fn handshake<T>(&self, mut stream: T, url: &str) -> Result<Connection<T>>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let endpoint = parse_endpoint(url)?;

        let mut request = HandshakeRequest::new(endpoint.authority, endpoint.target)?;
        request.protocols = self.config.subprotocols.clone();
        request.extra_headers = self.extra_headers.clone();

        let mut buf = Vec::new();
        request.write(&mut buf);
        stream
            .write_all(&buf)
            .await
            .map_err(|e| Error::Handshake(format!("failed to send upgrade request: {e}")))?;
        stream
            .flush()
            .await
            .map_err(|e| Error::Handshake(format!("failed to send upgrade request: {e}")))?;

        let (head, leftover) = http::read_head(&mut stream).await?;
        let response = HandshakeResponse::parse(&head)?;
        response.validate(&request.key)?;

        debug!(url, "websocket handshake complete");
        Ok(Connection::with_buffered(
            stream,
            Role::Client,
            self.config.clone(),
            &leftover,
        ))
    }
}

/// Dial a `ws://` URL with the default configuration.
///
/// Shorthand for `Dialer::new().dial(url)`.
pub async fn dial(url: &str) -> Result<Connection<TcpStream>> {
    Dialer::new().dial(url).await
}
