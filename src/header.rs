use byteorder::{BigEndian, ReadBytesExt};
use std::io::{self, Read};

pub const MAGIC: &[u8; 4] = b"PXMD";
/// magic (4) + payload length (4) + CRC32 (4)
pub const HEADER_SIZE: usize = 12;

/// Fixed-size prefix written in front of every payload.
///
/// All multi-byte fields are big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    pub magic: [u8; 4],
    pub payload_len: u32,
    pub checksum: u32,
}

impl PayloadHeader {
    pub fn for_payload(payload: &[u8]) -> Option<Self> {
        let payload_len = u32::try_from(payload.len()).ok()?;
        Some(Self {
            magic: *MAGIC,
            payload_len,
            checksum: crc32(payload),
        })
    }

    pub fn has_valid_magic(&self) -> bool {
        &self.magic == MAGIC
    }

    /// Reads the raw fields. Magic is not validated here; callers decide
    /// which error to raise.
    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        Ok(Self {
            magic,
            payload_len: reader.read_u32::<BigEndian>()?,
            checksum: reader.read_u32::<BigEndian>()?,
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..4].copy_from_slice(&self.magic);
        out[4..8].copy_from_slice(&self.payload_len.to_be_bytes());
        out[8..].copy_from_slice(&self.checksum.to_be_bytes());
        out
    }
}

pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_big_endian() {
        let header = PayloadHeader { magic: *MAGIC, payload_len: 0x0102_0304, checksum: 0xAABB_CCDD };
        let bytes = header.to_bytes();
        assert_eq!(&bytes[..4], b"PXMD");
        assert_eq!(&bytes[4..8], &[1, 2, 3, 4]);
        assert_eq!(&bytes[8..], &[0xAA, 0xBB, 0xCC, 0xDD]);

        assert_eq!(PayloadHeader::read(&bytes[..]).unwrap(), header);
    }

    #[test]
    fn checksum_covers_payload_only() {
        let header = PayloadHeader::for_payload(b"hello").unwrap();
        assert_eq!(header.payload_len, 5);
        assert_eq!(header.checksum, 0x3610_A686);
        assert!(header.has_valid_magic());
    }
}
