//! iBeacon-style advertisement frame decoding.
//!
//! The beacon broadcasts a fixed 30-byte frame:
//!
//! - bytes 0..9: prefix (flags, header, company id, type, length)
//! - bytes 9..25: 16-byte identifier region
//! - bytes 25..27: major (the O3 reading, big-endian)
//! - bytes 27..29: minor (big-endian)
//! - byte 29: calibrated TX power
//!
//! Parsing is positional slicing only; there is no checksum. Anything
//! shorter than 30 bytes is rejected, trailing bytes are ignored.

use crate::bytes::bytes_to_string;
use crate::error::{DecodeError, DecodeResult};

/// Minimum payload length for a complete frame.
pub const FRAME_LEN: usize = 30;

/// One decoded advertisement. Transient: built per scan result, read
/// once, discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisementFrame {
    prefix: [u8; 9],
    uuid: [u8; 16],
    major: [u8; 2],
    minor: [u8; 2],
    tx_power: i8,
}

impl AdvertisementFrame {
    /// Decodes a raw advertisement payload.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::TooShort`] if `bytes` holds fewer than
    /// [`FRAME_LEN`] bytes. No partial frame is ever produced.
    pub fn parse(bytes: &[u8]) -> DecodeResult<Self> {
        if bytes.len() < FRAME_LEN {
            return Err(DecodeError::TooShort {
                actual: bytes.len(),
                min: FRAME_LEN,
            });
        }

        let mut prefix = [0u8; 9];
        prefix.copy_from_slice(&bytes[0..9]);

        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(&bytes[9..25]);

        Ok(Self {
            prefix,
            uuid,
            major: [bytes[25], bytes[26]],
            minor: [bytes[27], bytes[28]],
            tx_power: bytes[29] as i8,
        })
    }

    pub fn prefix(&self) -> &[u8; 9] {
        &self.prefix
    }

    pub fn uuid(&self) -> &[u8; 16] {
        &self.uuid
    }

    pub fn major(&self) -> &[u8; 2] {
        &self.major
    }

    pub fn minor(&self) -> &[u8; 2] {
        &self.minor
    }

    pub fn tx_power(&self) -> i8 {
        self.tx_power
    }

    pub fn adv_flags(&self) -> &[u8] {
        &self.prefix[0..3]
    }

    pub fn adv_header(&self) -> &[u8] {
        &self.prefix[3..5]
    }

    pub fn company_id(&self) -> &[u8] {
        &self.prefix[5..7]
    }

    pub fn ibeacon_type(&self) -> u8 {
        self.prefix[7]
    }

    pub fn ibeacon_length(&self) -> u8 {
        self.prefix[8]
    }

    /// Identifier region as a code-point string, for comparison with a
    /// configured target identifier.
    pub fn uuid_string(&self) -> String {
        bytes_to_string(&self.uuid)
    }

    /// Major field, big-endian. Carries the O3 reading.
    pub fn major_value(&self) -> u16 {
        u16::from_be_bytes(self.major)
    }

    /// Minor field, big-endian.
    pub fn minor_value(&self) -> u16 {
        u16::from_be_bytes(self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_bytes(uuid: &[u8; 16], major: u16, minor: u16) -> Vec<u8> {
        let mut bytes = vec![0x02, 0x01, 0x06, 0x1A, 0xFF, 0x4C, 0x00, 0x02, 0x15];
        bytes.extend_from_slice(uuid);
        bytes.extend_from_slice(&major.to_be_bytes());
        bytes.extend_from_slice(&minor.to_be_bytes());
        bytes.push(0xC5);
        bytes
    }

    #[test]
    fn test_parse_too_short() {
        for len in 0..FRAME_LEN {
            let err = AdvertisementFrame::parse(&vec![0u8; len]).unwrap_err();
            assert_eq!(
                err,
                DecodeError::TooShort {
                    actual: len,
                    min: FRAME_LEN
                }
            );
        }
    }

    #[test]
    fn test_parse_extracts_fields() {
        let bytes = frame_bytes(b"AERO-TEST-NODE-1", 120, 25);
        let frame = AdvertisementFrame::parse(&bytes).unwrap();

        assert_eq!(frame.uuid_string(), "AERO-TEST-NODE-1");
        assert_eq!(frame.major_value(), 120);
        assert_eq!(frame.minor_value(), 25);
        assert_eq!(frame.tx_power(), 0xC5u8 as i8);

        assert_eq!(frame.adv_flags(), &[0x02, 0x01, 0x06]);
        assert_eq!(frame.adv_header(), &[0x1A, 0xFF]);
        assert_eq!(frame.company_id(), &[0x4C, 0x00]);
        assert_eq!(frame.ibeacon_type(), 0x02);
        assert_eq!(frame.ibeacon_length(), 0x15);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let bytes = frame_bytes(b"AERO-TEST-NODE-1", 999, 42);
        let a = AdvertisementFrame::parse(&bytes).unwrap();
        let b = AdvertisementFrame::parse(&bytes).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_ignores_trailing_bytes() {
        let mut bytes = frame_bytes(b"AERO-TEST-NODE-1", 7, 0);
        let frame = AdvertisementFrame::parse(&bytes).unwrap();

        bytes.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let padded = AdvertisementFrame::parse(&bytes).unwrap();
        assert_eq!(frame, padded);
    }
}
