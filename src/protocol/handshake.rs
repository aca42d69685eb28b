//! Opening handshake (RFC 6455 Section 4).
//!
//! The HTTP Upgrade exchange that moves a byte stream from HTTP/1.1 into the
//! WebSocket frame protocol. Both directions are covered: the client emits a
//! request and validates the response; the server parses a request and emits
//! the 101 reply.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};
use crate::protocol::random_array;

/// The GUID concatenated with the client key in the Sec-WebSocket-Accept
/// calculation (RFC 6455 Section 1.3).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// WebSocket protocol version carried in Sec-WebSocket-Version.
pub const WS_VERSION: &str = "13";

/// Compute the Sec-WebSocket-Accept value for a client key.
///
/// Defined as `Base64(SHA-1(key || GUID))`.
///
/// # Example
///
/// ```
/// use wsproto::protocol::compute_accept_key;
///
/// let accept = compute_accept_key("dGhlIHNhbXBsZSBub25jZQ==");
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Generate a fresh Sec-WebSocket-Key: 16 random bytes, base64-encoded.
///
/// # Errors
///
/// Returns [`Error::Io`] if the system random source is unavailable.
pub fn generate_key() -> Result<String> {
    let nonce: [u8; 16] = random_array()?;
    Ok(BASE64.encode(nonce))
}

/// Parse HTTP header lines into a map keyed by lowercase header name.
fn parse_headers<'a, I>(lines: I) -> HashMap<String, String>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_lowercase(), value.trim().to_string());
        }
    }
    headers
}

fn require<'a>(headers: &'a HashMap<String, String>, name: &str) -> Result<&'a str> {
    headers
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| Error::Handshake(format!("missing {name} header")))
}

fn expect_header(headers: &HashMap<String, String>, name: &str, want: &str) -> Result<()> {
    let got = require(headers, name)?;
    if got.eq_ignore_ascii_case(want) {
        Ok(())
    } else {
        Err(Error::Handshake(format!(
            "{name} header must be {want:?}, got {got:?}"
        )))
    }
}

/// A client's upgrade request.
///
/// Built by the dialer and written to the transport, or parsed from the
/// transport on the server side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// Request target (path and query), e.g. `/chat`.
    pub path: String,
    /// Host header value.
    pub host: String,
    /// Sec-WebSocket-Key value.
    pub key: String,
    /// Subprotocols offered via Sec-WebSocket-Protocol.
    pub protocols: Vec<String>,
    /// Extra headers the caller wants on the request (client side only).
    pub extra_headers: Vec<(String, String)>,
}

impl HandshakeRequest {
    /// Build a request for the given host and path with a fresh random key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the random source fails.
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Result<Self> {
        Ok(Self {
            path: path.into(),
            host: host.into(),
            key: generate_key()?,
            protocols: Vec::new(),
            extra_headers: Vec::new(),
        })
    }

    /// Serialize the upgrade request as an HTTP/1.1 GET.
    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(format!("GET {} HTTP/1.1\r\n", self.path).as_bytes());
        buf.extend_from_slice(format!("Host: {}\r\n", self.host).as_bytes());
        buf.extend_from_slice(b"Upgrade: websocket\r\n");
        buf.extend_from_slice(b"Connection: Upgrade\r\n");
        buf.extend_from_slice(format!("Sec-WebSocket-Version: {WS_VERSION}\r\n").as_bytes());
        buf.extend_from_slice(format!("Sec-WebSocket-Key: {}\r\n", self.key).as_bytes());
        if !self.protocols.is_empty() {
            let joined = self.protocols.join(", ");
            buf.extend_from_slice(format!("Sec-WebSocket-Protocol: {joined}\r\n").as_bytes());
        }
        for (name, value) in &self.extra_headers {
            buf.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        buf.extend_from_slice(b"\r\n");
    }

    /// Parse and validate a client upgrade request (server side).
    ///
    /// Unknown Sec-WebSocket-Protocol offers are recorded but never selected;
    /// Sec-WebSocket-Extensions is ignored entirely.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Handshake`] when the method is not GET, the version
    /// is not HTTP/1.1, a required header is missing or mismatched, or the
    /// key does not decode to exactly 16 bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text =
            std::str::from_utf8(data).map_err(|_| Error::Handshake("non-UTF-8 request".into()))?;
        let mut lines = text.lines();

        let request_line = lines
            .next()
            .ok_or_else(|| Error::Handshake("empty request".into()))?;
        let mut parts = request_line.split_whitespace();
        let (method, path, version) = match (parts.next(), parts.next(), parts.next(), parts.next())
        {
            (Some(m), Some(p), Some(v), None) => (m, p, v),
            _ => return Err(Error::Handshake("malformed request line".into())),
        };

        if method != "GET" {
            return Err(Error::Handshake(format!(
                "method must be GET, got {method:?}"
            )));
        }
        if !version.starts_with("HTTP/1.1") {
            return Err(Error::Handshake(format!(
                "version must be HTTP/1.1, got {version:?}"
            )));
        }

        let headers = parse_headers(lines);

        expect_header(&headers, "upgrade", "websocket")?;
        expect_header(&headers, "connection", "Upgrade")?;
        expect_header(&headers, "sec-websocket-version", WS_VERSION)?;

        let host = require(&headers, "host")?.to_string();
        let key = require(&headers, "sec-websocket-key")?.to_string();

        match BASE64.decode(&key) {
            Ok(decoded) if decoded.len() == 16 => {}
            Ok(decoded) => {
                return Err(Error::Handshake(format!(
                    "Sec-WebSocket-Key must decode to 16 bytes, got {}",
                    decoded.len()
                )));
            }
            Err(_) => {
                return Err(Error::Handshake(
                    "Sec-WebSocket-Key is not valid base64".into(),
                ));
            }
        }

        let protocols = headers
            .get("sec-websocket-protocol")
            .map(|p| p.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();

        Ok(Self {
            path: path.to_string(),
            host,
            key,
            protocols,
            extra_headers: Vec::new(),
        })
    }

    /// The Sec-WebSocket-Accept value this request's key demands.
    #[must_use]
    pub fn accept_key(&self) -> String {
        compute_accept_key(&self.key)
    }
}

/// The server's 101 reply to an upgrade request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// Sec-WebSocket-Accept value.
    pub accept: String,
}

impl HandshakeResponse {
    /// Build the reply for a validated request.
    #[must_use]
    pub fn from_request(req: &HandshakeRequest) -> Self {
        Self {
            accept: req.accept_key(),
        }
    }

    /// Serialize the 101 Switching Protocols response.
    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(b"HTTP/1.1 101 Switching Protocols\r\n");
        buf.extend_from_slice(b"Upgrade: websocket\r\n");
        buf.extend_from_slice(b"Connection: Upgrade\r\n");
        buf.extend_from_slice(format!("Sec-WebSocket-Accept: {}\r\n", self.accept).as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    /// Parse and validate a server response (client side).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Handshake`] when the status is not 101 or the
    /// Upgrade/Connection/Sec-WebSocket-Accept headers are missing or wrong.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text =
            std::str::from_utf8(data).map_err(|_| Error::Handshake("non-UTF-8 response".into()))?;
        let mut lines = text.lines();

        let status_line = lines
            .next()
            .ok_or_else(|| Error::Handshake("empty response".into()))?;
        if !status_line.starts_with("HTTP/1.1 101") {
            return Err(Error::Handshake(format!(
                "status must be 101, got {status_line:?}"
            )));
        }

        let headers = parse_headers(lines);
        expect_header(&headers, "upgrade", "websocket")?;
        expect_header(&headers, "connection", "Upgrade")?;
        let accept = require(&headers, "sec-websocket-accept")?.to_string();

        Ok(Self { accept })
    }

    /// Check the accept value against the key the client sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Handshake`] on mismatch.
    pub fn validate(&self, key: &str) -> Result<()> {
        let expected = compute_accept_key(key);
        if self.accept == expected {
            Ok(())
        } else {
            Err(Error::Handshake(
                "Sec-WebSocket-Accept does not match the sent key".into(),
            ))
        }
    }
}

/// The 400 reply sent when an upgrade request fails validation.
pub(crate) fn write_rejection(buf: &mut Vec<u8>, reason: &str) {
    buf.extend_from_slice(b"HTTP/1.1 400 Bad Request\r\n");
    buf.extend_from_slice(b"Content-Type: text/plain\r\n");
    buf.extend_from_slice(format!("Content-Length: {}\r\n", reason.len()).as_bytes());
    buf.extend_from_slice(b"Connection: close\r\n\r\n");
    buf.extend_from_slice(reason.as_bytes());
}
