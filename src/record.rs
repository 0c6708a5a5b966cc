//! On-disk record format for the append-only log.
//!
//! Records sit back to back in the file with no padding or framing beyond
//! their own fields:
//!
//! ```text
//! ┌───────────────┬──────────┬─────────────┬────────────────┐
//! │ checksum (4B) │ key (4B) │ length (4B) │ value (length) │
//! └───────────────┴──────────┴─────────────┴────────────────┘
//! ```
//!
//! All integers are little-endian. A `length` of [`TOMBSTONE`] marks a
//! deletion and carries no value bytes. The checksum covers the key, the
//! length field, and the value bytes when present; recovery recomputes it
//! record by record to find where the valid prefix of a crashed log ends.

/// Sentinel stored in the length field to mark a deleted key.
pub const TOMBSTONE: u32 = u32::MAX;

/// Largest value the store accepts, in bytes.
pub const MAX_VALUE_SIZE: usize = 4096;

/// Byte offset of a record's length field relative to the record start,
/// just past the checksum and key. A record's *value offset* (the datum
/// the index stores and `get` seeks to) is its start offset plus this.
pub const LENGTH_FIELD_OFFSET: u64 = 8;

/// Computes the checksum persisted in a record: the crc32 of the key, the
/// length field, and the value bytes folded together. Tombstones carry no
/// value term.
pub fn checksum(key: u32, length: u32, value: Option<&[u8]>) -> u32 {
    crc32fast::hash(&key.to_le_bytes())
        ^ crc32fast::hash(&length.to_le_bytes())
        ^ value.map_or(0, crc32fast::hash)
}

/// A record ready to be appended: a put carrying value bytes, or a
/// tombstone.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    /// the key this record belongs to
    pub key: u32,
    /// the value bytes, or `None` for a tombstone
    pub value: Option<&'a [u8]>,
}

impl<'a> Record<'a> {
    /// Creates a record storing `value` under `key`.
    pub fn put(key: u32, value: &'a [u8]) -> Self {
        Record {
            key,
            value: Some(value),
        }
    }

    /// Creates a deletion marker for `key`.
    pub fn tombstone(key: u32) -> Self {
        Record { key, value: None }
    }

    /// Serializes this record, checksum first, ready for the log.
    pub fn encode(&self) -> Vec<u8> {
        let length = self.value.map_or(TOMBSTONE, |v| v.len() as u32);
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.extend_from_slice(&checksum(self.key, length, self.value).to_le_bytes());
        buf.extend_from_slice(&self.key.to_le_bytes());
        buf.extend_from_slice(&length.to_le_bytes());
        if let Some(value) = self.value {
            buf.extend_from_slice(value);
        }
        buf
    }

    /// Size of this record once serialized.
    pub fn encoded_len(&self) -> usize {
        LENGTH_FIELD_OFFSET as usize + 4 + self.value.map_or(0, |v| v.len())
    }
}
