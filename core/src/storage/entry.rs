use crate::error::{Error, Result};

/// Bytes per dictionary slot: offset (8) + length (4) + secondary hash (4).
pub const ENTRY_SIZE: usize = 16;

/// Location of one postings blob in the data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub offset: u64,
    pub length: u32,
    pub secondary_hash: i32,
}

impl Entry {
    pub fn new(offset: u64, length: u32, secondary_hash: i32) -> Self {
        Self { offset, length, secondary_hash }
    }

    /// Big-endian `[offset][length][secondary_hash]`.
    pub fn encode(&self) -> [u8; ENTRY_SIZE] {
        let mut buf = [0u8; ENTRY_SIZE];
        buf[0..8].copy_from_slice(&self.offset.to_be_bytes());
        buf[8..12].copy_from_slice(&self.length.to_be_bytes());
        buf[12..16].copy_from_slice(&self.secondary_hash.to_be_bytes());
        buf
    }

    /// `Ok(None)` for an unoccupied slot (offset and length both zero).
    pub fn decode(bytes: &[u8]) -> Result<Option<Entry>> {
        if bytes.len() < ENTRY_SIZE {
            return Err(Error::corrupt(format!(
                "dictionary slot holds {} bytes, expected {ENTRY_SIZE}",
                bytes.len()
            )));
        }
        let mut offset = [0u8; 8];
        let mut length = [0u8; 4];
        let mut secondary_hash = [0u8; 4];
        offset.copy_from_slice(&bytes[0..8]);
        length.copy_from_slice(&bytes[8..12]);
        secondary_hash.copy_from_slice(&bytes[12..16]);
        let offset = u64::from_be_bytes(offset);
        let length = u32::from_be_bytes(length);
        let secondary_hash = i32::from_be_bytes(secondary_hash);
        if offset == 0 && length == 0 {
            return Ok(None);
        }
        Ok(Some(Entry { offset, length, secondary_hash }))
    }
}
