//! Connection management: roles, the connection state machine, and the
//! streaming message reader/writer.
//!
//! ## Connection lifecycle
//!
//! 1. **Open** - after a successful handshake ([`crate::client`] or
//!    [`crate::server`]) the connection exchanges messages.
//! 2. **Closing** - one side sent its close frame and waits for the mirror.
//! 3. **Closed** - both close frames exchanged, transport torn down.
//!
//! ## Example
//!
//! ```rust,ignore
//! use wsproto::{Config, Connection, MessageType, Role};
//!
//! let mut conn = Connection::new(stream, Role::Server, Config::default());
//! while let Ok((kind, data)) = conn.next_message().await {
//!     conn.write_message(kind, &data).await?;
//! }
//! ```

mod role;

#[allow(clippy::module_inception)]
mod connection;
mod reader;
mod writer;

pub use connection::{CloseHandler, Connection, PingHandler, PongHandler};
pub use reader::MessageReader;
pub use role::Role;
pub use writer::MessageWriter;
