//! Block writer.
//!
//! [`DataBlockWriter`] appends samples of one series to a caller-owned
//! buffer until it is full, then seals it into a self-describing block.
//!
//! # Example
//!
//! ```rust
//! use skulk_block::block::{DataBlockWriter, HEADER_SIZE};
//! use skulk_block::CodecError;
//!
//! let mut buf = vec![0u8; HEADER_SIZE + 4];
//! let mut writer = DataBlockWriter::new(7, &mut buf).unwrap();
//!
//! let mut ts = 0;
//! loop {
//!     match writer.put(ts, ts as f64 * 1.5) {
//!         Ok(()) => ts += 10,
//!         Err(CodecError::Overflow) => break, // flush and open a new block
//!         Err(e) => panic!("unexpected: {e}"),
//!     }
//! }
//!
//! let size = writer.commit();
//! assert!(size <= HEADER_SIZE + 4);
//! assert_eq!(writer.commit(), size);
//! ```

use crate::block::buffer::{BlockBuffer, Stream};
use crate::block::chunk::UncompressedChunk;
use crate::block::gorilla::CodecState;
use crate::block::header::BlockHeader;
use crate::block::{SeriesId, Timestamp};
use crate::error::{CodecError, Result};
use tracing::debug;

/// Configuration for block writing.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Maximum number of samples per block. Reaching it reports `Overflow`.
    pub max_samples: u32,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_samples: u32::MAX,
        }
    }
}

impl WriterConfig {
    /// Creates a writer configuration with a custom sample limit.
    pub fn new(max_samples: u32) -> Self {
        Self { max_samples }
    }
}

/// Encodes samples of one series into a fixed-capacity block.
#[derive(Debug)]
pub struct DataBlockWriter<'a> {
    series_id: SeriesId,
    buffer: BlockBuffer<'a>,
    config: WriterConfig,
    /// `None` until the first sample has been put.
    state: Option<CodecState>,
    first: (Timestamp, u64),
    count: u32,
    header: Option<BlockHeader>,
}

impl<'a> DataBlockWriter<'a> {
    /// Creates a writer for `series_id` over `buf` with default settings.
    ///
    /// # Errors
    ///
    /// Returns `CapacityTooSmall` / `CapacityTooLarge` if `buf` cannot host
    /// a block.
    pub fn new(series_id: SeriesId, buf: &'a mut [u8]) -> Result<Self> {
        Self::with_config(series_id, buf, WriterConfig::default())
    }

    /// Creates a writer with a custom configuration.
    pub fn with_config(
        series_id: SeriesId,
        buf: &'a mut [u8],
        config: WriterConfig,
    ) -> Result<Self> {
        Ok(Self {
            series_id,
            buffer: BlockBuffer::new(buf)?,
            config,
            state: None,
            first: (0, 0),
            count: 0,
            header: None,
        })
    }

    /// Series this block belongs to.
    pub fn series_id(&self) -> SeriesId {
        self.series_id
    }

    /// Number of samples accepted so far.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Returns `true` once the block has been committed.
    pub fn is_sealed(&self) -> bool {
        self.header.is_some()
    }

    /// Current block size in bytes, header included.
    ///
    /// Before commit this is the size the block would have if sealed now.
    pub fn size(&self) -> usize {
        self.buffer.used()
    }

    /// Whole bytes still free in the buffer.
    pub fn remaining(&self) -> usize {
        self.buffer.remaining()
    }

    /// Encodes one sample.
    ///
    /// A failed call leaves the block exactly as it was, so the caller can
    /// commit it and retry the sample in a fresh block.
    ///
    /// # Errors
    ///
    /// Returns `Overflow` if the encoded sample does not fit, the configured
    /// sample limit is reached, or the block is already sealed.
    pub fn put(&mut self, timestamp: Timestamp, value: f64) -> Result<()> {
        if self.header.is_some() {
            debug!(series_id = self.series_id, "put on sealed block rejected");
            return Err(CodecError::Overflow);
        }
        if self.count >= self.config.max_samples {
            debug!(
                series_id = self.series_id,
                count = self.count,
                "block sample limit reached"
            );
            return Err(CodecError::Overflow);
        }

        let Some(state) = self.state else {
            // The reference sample goes into the header, which is reserved
            self.first = (timestamp, value.to_bits());
            self.state = Some(CodecState::seeded(timestamp, value));
            self.count = 1;
            return Ok(());
        };

        let mark = self.buffer.mark();
        let mut next = state;
        match encode_sample(&mut self.buffer, &mut next, timestamp, value) {
            Ok(()) => {
                self.state = Some(next);
                self.count += 1;
                Ok(())
            }
            Err(e) => {
                self.buffer.rollback(mark);
                debug!(
                    series_id = self.series_id,
                    count = self.count,
                    size = self.buffer.used(),
                    "block full"
                );
                Err(e)
            }
        }
    }

    /// Puts samples from `chunk` in order until the block is full.
    ///
    /// Returns the number of samples accepted; anything less than
    /// `chunk.len()` means the rest belongs in the next block.
    pub fn put_chunk(&mut self, chunk: &UncompressedChunk) -> usize {
        chunk
            .iter()
            .take_while(|&(ts, value)| self.put(ts, value).is_ok())
            .count()
    }

    /// Seals the block and returns its size in bytes.
    ///
    /// Writes the header and compacts the streams on the first call; later
    /// calls return the same size without touching the buffer.
    pub fn commit(&mut self) -> usize {
        if self.header.is_some() {
            return self.buffer.used();
        }

        let (timestamps, values) = self.buffer.seal();
        let mut header = BlockHeader {
            series_id: self.series_id,
            count: self.count,
            timestamps,
            values,
            first_timestamp: self.first.0,
            first_value_bits: self.first.1,
            checksum: 0,
        };
        header.write_to(self.buffer.block_mut());
        debug!(
            series_id = self.series_id,
            count = self.count,
            size = header.block_len(),
            capacity = self.buffer.capacity(),
            "block sealed"
        );
        self.header = Some(header);

        debug_assert_eq!(header.block_len(), self.buffer.used());
        self.buffer.used()
    }

    /// Header written by [`commit`](Self::commit), if sealed.
    pub fn header(&self) -> Option<&BlockHeader> {
        self.header.as_ref()
    }

    /// Commits the block and hands back the sealed bytes.
    pub fn finish(mut self) -> &'a [u8] {
        self.commit();
        self.buffer.into_block()
    }
}

fn encode_sample(
    buffer: &mut BlockBuffer<'_>,
    state: &mut CodecState,
    timestamp: Timestamp,
    value: f64,
) -> Result<()> {
    state
        .timestamps
        .encode(timestamp, &mut buffer.sink(Stream::Timestamps))?;
    state.values.encode(value, &mut buffer.sink(Stream::Values))
}
