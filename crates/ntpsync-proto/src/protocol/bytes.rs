//! Slice-based encode and decode of the 48-byte header, with length checks
//! reported as [`ParseError`] instead of `io::Error`.

use super::{ConstPackedSizeBytes, Packet, ReadBytes, WriteBytes};
use crate::error::ParseError;

/// Decode from the front of a byte slice.
///
/// Bytes past the header are ignored, so a reply carrying extension fields
/// or a MAC still decodes.
pub trait FromBytes: Sized {
    /// Returns the value and how many bytes of `buf` it used.
    fn from_bytes(buf: &[u8]) -> Result<(Self, usize), ParseError>;
}

/// Encode into the front of a byte slice.
pub trait ToBytes {
    /// Returns the number of bytes written, or
    /// [`ParseError::BufferTooShort`] if `buf` cannot hold the value.
    fn to_bytes(&self, buf: &mut [u8]) -> Result<usize, ParseError>;
}

fn check_len(needed: usize, available: usize) -> Result<(), ParseError> {
    if available < needed {
        return Err(ParseError::BufferTooShort { needed, available });
    }
    Ok(())
}

impl FromBytes for Packet {
    fn from_bytes(buf: &[u8]) -> Result<(Self, usize), ParseError> {
        check_len(Packet::PACKED_SIZE_BYTES, buf.len())?;
        let mut reader = &buf[..Packet::PACKED_SIZE_BYTES];
        // Every field is fixed width and every bit pattern maps to a value, so the
        // reader can only fail on length, which was checked above.
        let packet = reader
            .read_bytes::<Packet>()
            .map_err(|_| ParseError::BufferTooShort {
                needed: Packet::PACKED_SIZE_BYTES,
                available: buf.len(),
            })?;
        Ok((packet, Packet::PACKED_SIZE_BYTES))
    }
}

impl ToBytes for Packet {
    fn to_bytes(&self, buf: &mut [u8]) -> Result<usize, ParseError> {
        let available = buf.len();
        check_len(Packet::PACKED_SIZE_BYTES, available)?;
        let mut writer = &mut buf[..Packet::PACKED_SIZE_BYTES];
        writer
            .write_bytes(self)
            .map_err(|_| ParseError::BufferTooShort {
                needed: Packet::PACKED_SIZE_BYTES,
                available,
            })?;
        Ok(Packet::PACKED_SIZE_BYTES)
    }
}
