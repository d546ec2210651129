use crate::codec::get_i64;
use crate::error::{Error, Result};

/// Size of a block header in bytes (fixed).
pub const HEADER_SIZE: usize = 8 * 3; // 24 bytes

/// Smallest payload a freshly grown block gets: one free-list entry.
pub const MIN_PAYLOAD: usize = 16;

/// Header at the start of every block.
///
/// ```text
/// ┌──────────────────────────────────────┐
/// │ length (8B)      total, header incl. │
/// │ data_used (8B)   payload bytes valid │
/// │ next (8B)        next block, 0 = end │
/// ├──────────────────────────────────────┤
/// │ payload (length - 24 bytes)          │
/// └──────────────────────────────────────┘
/// ```
///
/// All three words are big-endian signed 64-bit integers on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub length: u64,
    pub data_used: u64,
    pub next: u64,
}

impl BlockHeader {
    /// Payload bytes this block can hold.
    pub fn capacity(&self) -> usize {
        (self.length as usize).saturating_sub(HEADER_SIZE)
    }

    /// Encode header to bytes.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..8].copy_from_slice(&(self.length as i64).to_be_bytes());
        buf[8..16].copy_from_slice(&(self.data_used as i64).to_be_bytes());
        buf[16..24].copy_from_slice(&(self.next as i64).to_be_bytes());
        buf
    }

    /// Decode the header of the block at `position`.
    ///
    /// Only checks what the bytes alone can tell: signs and the
    /// length/data_used relation. Bounds against the file are the
    /// storage engine's job.
    pub fn decode(position: u64, data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::CorruptChain {
                position,
                reason: "block header truncated".into(),
            });
        }
        let mut cursor = data;
        let length = get_i64(&mut cursor, "block length")?;
        let data_used = get_i64(&mut cursor, "block data_used")?;
        let next = get_i64(&mut cursor, "block next")?;

        if length < HEADER_SIZE as i64 {
            return Err(Error::CorruptChain {
                position,
                reason: format!("block length {length} shorter than header"),
            });
        }
        if data_used < 0 || data_used > length - HEADER_SIZE as i64 {
            return Err(Error::CorruptChain {
                position,
                reason: format!("data_used {data_used} outside block of length {length}"),
            });
        }
        if next < 0 {
            return Err(Error::CorruptChain {
                position,
                reason: format!("negative next offset {next}"),
            });
        }

        Ok(BlockHeader {
            length: length as u64,
            data_used: data_used as u64,
            next: next as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let header = BlockHeader { length: 4096, data_used: 100, next: 8192 };
        let encoded = header.encode();
        assert_eq!(encoded.len(), HEADER_SIZE);
        // big-endian length word
        assert_eq!(&encoded[0..8], &[0, 0, 0, 0, 0, 0, 0x10, 0]);
        assert_eq!(BlockHeader::decode(0, &encoded).unwrap(), header);
    }

    #[test]
    fn header_data_used_beyond_length() {
        let encoded = BlockHeader { length: 40, data_used: 17, next: 0 }.encode();
        assert!(matches!(
            BlockHeader::decode(64, &encoded),
            Err(Error::CorruptChain { position: 64, .. })
        ));
    }

    #[test]
    fn header_too_short() {
        assert!(matches!(
            BlockHeader::decode(0, &[0u8; 10]),
            Err(Error::CorruptChain { position: 0, .. })
        ));
    }
}
