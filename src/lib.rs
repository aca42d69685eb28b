//! # wsproto - RFC 6455 WebSocket endpoint library
//!
//! `wsproto` implements the WebSocket protocol (version 13) for both roles:
//! the client that dials and the server that upgrades. It runs over any
//! reliable, ordered byte stream implementing tokio's `AsyncRead` +
//! `AsyncWrite`; TCP dialing is built in, TLS is the caller's business.
//!
//! ## Features
//!
//! - **Streaming messages**: [`Connection::next_reader`] and
//!   [`Connection::next_writer`] expose messages as byte streams, so neither
//!   side ever has to hold a whole message in memory.
//! - **Strict validation**: reserved bits, reserved opcodes, masking
//!   direction, control-frame limits, close-code validity, and incremental
//!   UTF-8 checking of text messages.
//! - **Transparent control traffic**: pings are answered, pongs observed,
//!   and close frames mirrored by replaceable handlers.
//! - **Graceful shutdown**: a bilateral close handshake with a deadline.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use wsproto::{dial, MessageType};
//!
//! let mut conn = dial("ws://127.0.0.1:9001/echo").await?;
//! conn.write_message(MessageType::Text, b"Hello").await?;
//! let (kind, data) = conn.next_message().await?;
//! conn.close().await?;
//! ```
//!
//! On the server, accept a TCP connection and upgrade it:
//!
//! ```rust,ignore
//! let (stream, _addr) = listener.accept().await?;
//! let mut conn = wsproto::accept(stream).await?;
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod protocol;
pub mod server;

mod http;

pub use client::{dial, Dialer};
pub use config::Config;
pub use connection::{
    CloseHandler, Connection, MessageReader, MessageWriter, PingHandler, PongHandler, Role,
};
pub use error::{Error, Result};
pub use message::{CloseCode, MessageType};
pub use protocol::{compute_accept_key, OpCode, WS_GUID};
pub use server::{accept, accept_with};
