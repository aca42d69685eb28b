//! Wire-protocol core (RFC 6455): opcodes, masking, frame codec, opening
//! handshake, and UTF-8 validation.

pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;
pub mod utf8;

pub use frame::{encode_frame, FrameHeader, MAX_CONTROL_PAYLOAD};
pub use handshake::{
    compute_accept_key, generate_key, HandshakeRequest, HandshakeResponse, WS_GUID, WS_VERSION,
};
pub use mask::apply_mask;
pub use opcode::OpCode;
pub use utf8::Utf8Validator;

use crate::error::{Error, Result};

/// Draw `N` bytes from the system's cryptographically strong random source.
///
/// Used for handshake nonces and per-frame masking keys.
pub(crate) fn random_array<const N: usize>() -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    getrandom::getrandom(&mut buf)
        .map_err(|e| Error::Io(format!("random source unavailable: {e}")))?;
    Ok(buf)
}
