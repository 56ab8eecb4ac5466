#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! Hex and integer encodings used by ACVP vector sets and the subject protocol.
//!
//! Vector sets carry byte strings as hex text with a separate bit-length
//! declaration; subject arguments carry lengths as 4-byte little-endian integers.

use crate::error::CodecError;

/// Decodes hex text into bytes.
///
/// # Errors
///
/// Returns [`CodecError::MalformedEncoding`] if the text has odd length or
/// contains a non-hex character.
pub fn decode_hex(text: &str) -> Result<Vec<u8>, CodecError> {
    Ok(hex::decode(text)?)
}

/// Encodes bytes as lowercase hex text.
#[must_use]
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Length of `bytes` in bits.
#[must_use]
pub fn bit_length(bytes: &[u8]) -> u64 {
    (bytes.len() as u64).saturating_mul(8)
}

/// Encodes `value` as 4 little-endian bytes.
#[must_use]
pub fn uint32_le(value: u32) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

/// Decodes exactly 4 little-endian bytes.
///
/// # Errors
///
/// Returns [`CodecError::InvalidLength`] unless `bytes` is exactly 4 bytes long.
pub fn read_uint32_le(bytes: &[u8]) -> Result<u32, CodecError> {
    let fixed: [u8; 4] = bytes
        .try_into()
        .map_err(|_| CodecError::InvalidLength { expected: 4, actual: bytes.len() })?;
    Ok(u32::from_le_bytes(fixed))
}
