//! Byte-level conversion helpers for advertisement payloads.
//!
//! The beacon firmware writes identifier bytes as raw character codes,
//! so the string conversions here map each byte to its code point
//! directly instead of going through UTF-8.

use crate::error::{ByteConvertError, ConvertResult};

/// Maps each byte to its char code point. Used to compare the decoded
/// UUID region against a configured target identifier, never for
/// display of arbitrary payloads.
pub fn bytes_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Big-endian unsigned accumulation, up to 4 bytes.
pub fn bytes_to_uint_be(bytes: &[u8]) -> ConvertResult<u32> {
    if bytes.len() > 4 {
        return Err(ByteConvertError::TooManyBytes(bytes.len()));
    }

    let mut res: u32 = 0;
    for &b in bytes {
        res = (res << 8) | u32::from(b);
    }
    Ok(res)
}

/// Big-endian two's-complement signed decoding, up to 4 bytes. The
/// sign is taken from bit 0x80 of the first byte and extended.
pub fn bytes_to_int_be(bytes: &[u8]) -> ConvertResult<i32> {
    if bytes.len() > 4 {
        return Err(ByteConvertError::TooManyBytes(bytes.len()));
    }
    if bytes.is_empty() {
        return Ok(0);
    }

    let mut res: u32 = 0;
    for &b in bytes {
        res = (res << 8) | u32::from(b);
    }

    if bytes[0] & 0x80 != 0 {
        // Sign-extend values shorter than 4 bytes.
        let shift = 32 - 8 * bytes.len() as u32;
        Ok(((res << shift) as i32) >> shift)
    } else {
        Ok(res as i32)
    }
}

/// Colon-separated lowercase hex, for diagnostic logging.
pub fn bytes_to_hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Raw byte copy of a 16-character identifier string.
pub fn string_to_uuid_bytes(s: &str) -> ConvertResult<[u8; 16]> {
    let raw = s.as_bytes();
    if raw.len() != 16 {
        return Err(ByteConvertError::BadUuidLength(raw.len()));
    }

    let mut uuid = [0u8; 16];
    uuid.copy_from_slice(raw);
    Ok(uuid)
}
