//! Payload masking (RFC 6455 Section 5.3).
//!
//! Masking XORs each payload byte with one byte of a 4-byte key, cycling by
//! position. The transform is self-inverse. The `offset` parameter carries
//! the key phase across chunked reads of a single frame, so a payload
//! received in pieces unmasks identically to one received whole.

/// Scalar byte-by-byte definition of the masking transform.
///
/// `data[i]` becomes `data[i] ^ key[(i + offset) % 4]`.
#[inline]
fn apply_mask_scalar(data: &mut [u8], key: [u8; 4], offset: usize) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[(i + offset) % 4];
    }
}

/// Word-at-a-time implementation processing 4 bytes per XOR.
///
/// The key must already be phase-aligned to the start of `data`.
#[inline]
fn apply_mask_word(data: &mut [u8], key: [u8; 4]) {
    let key_word = u32::from_ne_bytes(key);
    let mut chunks = data.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        chunk.copy_from_slice(&(word ^ key_word).to_ne_bytes());
    }
    for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

/// XOR-mask `data` with `key`, starting at key phase `offset`.
///
/// Bit-identical to the scalar definition; the word path only changes how
/// many bytes are touched per operation.
///
/// # Example
///
/// ```
/// use wsproto::protocol::apply_mask;
///
/// let key = [0x37, 0xfa, 0x21, 0x3d];
/// let mut data = b"Hello".to_vec();
/// apply_mask(&mut data, key, 0);
/// assert_eq!(data, [0x7f, 0x9f, 0x4d, 0x51, 0x58]);
/// ```
#[inline]
pub fn apply_mask(data: &mut [u8], key: [u8; 4], offset: usize) {
    // Rotating the key by the phase lets the word path start at index 0.
    let phase = offset % 4;
    let aligned = [
        key[phase],
        key[(phase + 1) % 4],
        key[(phase + 2) % 4],
        key[(phase + 3) % 4],
    ];
    apply_mask_word(data, aligned);
}
