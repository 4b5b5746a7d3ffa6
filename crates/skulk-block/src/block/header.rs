//! Fixed block header.
//!
//! ## Header Layout (56 bytes, little-endian)
//!
//! ```text
//! Offset  Size    Field
//! ------  ----    -----
//! 0x00    4       magic "SKBL"
//! 0x04    2       version (u16)
//! 0x06    2       reserved (zero)
//! 0x08    8       series_id (u64)
//! 0x10    4       sample_count (u32)
//! 0x14    4       ts_offset (u32)
//! 0x18    4       ts_len (u32)
//! 0x1C    4       val_offset (u32)
//! 0x20    4       val_len (u32)
//! 0x24    8       first_timestamp (i64)
//! 0x2C    8       first_value_bits (u64)
//! 0x34    4       block_crc32 (u32)
//! ```
//!
//! The CRC covers header bytes `0x00..0x34` followed by the payload
//! (everything from the end of the header up to the end of the last stream).

use crate::block::{SeriesId, Timestamp};
use crate::error::{Corruption, Result};

/// Magic bytes at the start of every block: "SKBL".
pub const BLOCK_MAGIC: [u8; 4] = *b"SKBL";

/// Current block format version.
pub const BLOCK_VERSION: u16 = 1;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 56;

const CRC_OFFSET: usize = 0x34;

/// Byte range of one stream inside a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamRange {
    /// Offset from the start of the block.
    pub offset: u32,
    /// Length in bytes.
    pub len: u32,
}

impl StreamRange {
    /// Creates a new stream range.
    pub fn new(offset: u32, len: u32) -> Self {
        Self { offset, len }
    }

    /// Exclusive end offset.
    pub fn end(&self) -> usize {
        self.offset as usize + self.len as usize
    }

    /// The range as a `usize` range for slicing.
    pub fn as_range(&self) -> std::ops::Range<usize> {
        self.offset as usize..self.end()
    }
}

/// Parsed block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Series this block belongs to.
    pub series_id: SeriesId,
    /// Number of samples in the block.
    pub count: u32,
    /// Location of the timestamp stream.
    pub timestamps: StreamRange,
    /// Location of the value stream.
    pub values: StreamRange,
    /// First timestamp, stored verbatim.
    pub first_timestamp: Timestamp,
    /// Raw IEEE 754 bits of the first value.
    pub first_value_bits: u64,
    /// CRC32 of header and payload.
    pub checksum: u32,
}

impl BlockHeader {
    /// End of the payload, i.e. the total block size in bytes.
    pub fn block_len(&self) -> usize {
        HEADER_SIZE
            .max(self.timestamps.end())
            .max(self.values.end())
    }

    /// Serializes the header into the front of `block` and stores the CRC32
    /// of the header and payload in both `block` and `self.checksum`.
    ///
    /// `block` must be exactly the sealed block: header plus streams.
    pub fn write_to(&mut self, block: &mut [u8]) {
        debug_assert!(block.len() >= HEADER_SIZE);

        let header = &mut block[..HEADER_SIZE];
        header[0x00..0x04].copy_from_slice(&BLOCK_MAGIC);
        header[0x04..0x06].copy_from_slice(&BLOCK_VERSION.to_le_bytes());
        header[0x06..0x08].copy_from_slice(&[0, 0]);
        header[0x08..0x10].copy_from_slice(&self.series_id.to_le_bytes());
        header[0x10..0x14].copy_from_slice(&self.count.to_le_bytes());
        header[0x14..0x18].copy_from_slice(&self.timestamps.offset.to_le_bytes());
        header[0x18..0x1C].copy_from_slice(&self.timestamps.len.to_le_bytes());
        header[0x1C..0x20].copy_from_slice(&self.values.offset.to_le_bytes());
        header[0x20..0x24].copy_from_slice(&self.values.len.to_le_bytes());
        header[0x24..0x2C].copy_from_slice(&self.first_timestamp.to_le_bytes());
        header[0x2C..0x34].copy_from_slice(&self.first_value_bits.to_le_bytes());

        self.checksum = calculate_crc(block);
        block[CRC_OFFSET..HEADER_SIZE].copy_from_slice(&self.checksum.to_le_bytes());
    }

    /// Parses and validates the header at the front of `buf`.
    ///
    /// Checks magic and version, that both streams lie after the header and
    /// within `buf`, and that they hold at least one bit per stream for
    /// every sample after the first. The checksum is parsed but not verified; see
    /// [`verify_crc`](Self::verify_crc).
    ///
    /// # Errors
    ///
    /// Returns the matching [`Corruption`] wrapped in `CodecError::Corrupt`.
    pub fn read_from(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Corruption::Truncated.into());
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&buf[0x00..0x04]);
        if magic != BLOCK_MAGIC {
            return Err(Corruption::InvalidMagic(magic).into());
        }

        let version = u16::from_le_bytes([buf[0x04], buf[0x05]]);
        if version != BLOCK_VERSION {
            return Err(Corruption::UnsupportedVersion(version).into());
        }

        let header = Self {
            series_id: le_u64(buf, 0x08),
            count: le_u32(buf, 0x10),
            timestamps: StreamRange::new(le_u32(buf, 0x14), le_u32(buf, 0x18)),
            values: StreamRange::new(le_u32(buf, 0x1C), le_u32(buf, 0x20)),
            first_timestamp: le_u64(buf, 0x24) as i64,
            first_value_bits: le_u64(buf, 0x2C),
            checksum: le_u32(buf, CRC_OFFSET),
        };

        for stream in [header.timestamps, header.values] {
            if (stream.offset as usize) < HEADER_SIZE {
                return Err(Corruption::InvalidLayout.into());
            }
            if stream.end() > buf.len() {
                return Err(Corruption::Truncated.into());
            }
        }
        if header.timestamps.end() > header.values.offset as usize {
            return Err(Corruption::InvalidLayout.into());
        }
        if header.count <= 1 && (header.timestamps.len != 0 || header.values.len != 0) {
            return Err(Corruption::InvalidLayout.into());
        }
        // Every sample after the first takes at least one bit in each stream
        let encoded = u64::from(header.count.saturating_sub(1));
        let min_stream_bits = u64::from(header.timestamps.len.min(header.values.len)) * 8;
        if encoded > min_stream_bits {
            return Err(Corruption::InvalidLayout.into());
        }

        Ok(header)
    }

    /// Verifies the stored CRC32 against `buf`, which must start with this
    /// header.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt(ChecksumMismatch)` if the checksum does not match.
    pub fn verify_crc(&self, buf: &[u8]) -> Result<()> {
        let actual = calculate_crc(&buf[..self.block_len()]);
        if actual != self.checksum {
            return Err(Corruption::ChecksumMismatch {
                expected: self.checksum,
                actual,
            }
            .into());
        }
        Ok(())
    }
}

fn calculate_crc(block: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&block[..CRC_OFFSET]);
    hasher.update(&block[HEADER_SIZE..]);
    hasher.finalize()
}

fn le_u32(buf: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(bytes)
}

fn le_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}
