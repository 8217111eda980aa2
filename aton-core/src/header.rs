//! Fixed-size header that frames every Aton message.
//!
//! ```text
//! magic:          [u8; 4]  "ATN0"
//! message_type:   u32      see [`MessageType`](crate::MessageType)
//! checksum:       u32      first 4 bytes of blake3(payload), 0 if empty
//! payload_length: u32      bytes following the header
//! ```
//!
//! All integers are little-endian.

use crate::error::AtonError;

pub const MAGIC: [u8; 4] = *b"ATN0";
pub const HEADER_SIZE: usize = 16;

pub type HeaderBytes = [u8; HEADER_SIZE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    message_type: u32,
    checksum: u32,
    payload_length: u32,
}

impl MessageHeader {
    /// Build a header for `payload`, computing its checksum.
    pub fn for_payload(message_type: u32, payload: &[u8]) -> Self {
        Self {
            message_type,
            checksum: checksum(payload),
            payload_length: payload.len() as u32,
        }
    }

    pub fn to_bytes(&self) -> HeaderBytes {
        let mut buf: HeaderBytes = [0; HEADER_SIZE];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..8].copy_from_slice(&self.message_type.to_le_bytes());
        buf[8..12].copy_from_slice(&self.checksum.to_le_bytes());
        buf[12..16].copy_from_slice(&self.payload_length.to_le_bytes());
        buf
    }

    pub fn from_bytes(bytes: &HeaderBytes) -> Result<Self, AtonError> {
        if bytes[0..4] != MAGIC {
            return Err(AtonError::InvalidMagic);
        }
        Ok(Self {
            message_type: read_u32(bytes, 4),
            checksum: read_u32(bytes, 8),
            payload_length: read_u32(bytes, 12),
        })
    }

    pub fn message_type(&self) -> u32 {
        self.message_type
    }

    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    pub fn payload_length(&self) -> usize {
        self.payload_length as usize
    }

    /// Check `payload` against the checksum carried in this header.
    pub fn validate(&self, payload: &[u8]) -> bool {
        checksum(payload) == self.checksum
    }
}

/// Truncated blake3 digest of a payload; empty payloads hash to 0.
pub fn checksum(payload: &[u8]) -> u32 {
    if payload.is_empty() {
        return 0;
    }
    let digest = blake3::hash(payload);
    let bytes = digest.as_bytes();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn read_u32(bytes: &HeaderBytes, at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let header = MessageHeader::for_payload(1, &[1, 2, 3]);
        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..4], b"ATN0");
        assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &3u32.to_le_bytes());
        assert_eq!(MessageHeader::from_bytes(&bytes).unwrap(), header);
    }

    #[test]
    fn bad_magic_rejected() {
        let mut bytes = MessageHeader::for_payload(2, &[]).to_bytes();
        bytes[0] = b'X';
        assert!(matches!(
            MessageHeader::from_bytes(&bytes),
            Err(AtonError::InvalidMagic)
        ));
    }

    #[test]
    fn empty_payload_has_zero_checksum() {
        let header = MessageHeader::for_payload(9, &[]);
        assert_eq!(header.checksum(), 0);
        assert!(header.validate(&[]));
    }

    #[test]
    fn checksum_detects_corruption() {
        let header = MessageHeader::for_payload(0, &[7; 12]);
        assert!(header.validate(&[7; 12]));
        let mut corrupted = [7; 12];
        corrupted[5] = 8;
        assert!(!header.validate(&corrupted));
    }
}
