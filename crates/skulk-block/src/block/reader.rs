//! Block reader.
//!
//! [`DataBlockReader`] parses a sealed block and yields its samples one at a
//! time, in the order they were written. Reading is strictly sequential:
//! both streams can only be decoded by replaying every earlier sample.

use crate::block::buffer::BitReader;
use crate::block::chunk::UncompressedChunk;
use crate::block::gorilla::CodecState;
use crate::block::header::BlockHeader;
use crate::block::{Sample, SeriesId};
use crate::error::{CodecError, Corruption, Result};
use tracing::warn;

/// Configuration for block reading.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Verify the header CRC32 before decoding.
    ///
    /// Without it, a count that overstates the samples by a few can still
    /// pass header validation. The stream padding then decodes as samples
    /// that repeat the last delta and value before the reader reports
    /// `Corrupt(Truncated)`.
    pub verify_checksum: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            verify_checksum: true,
        }
    }
}

/// Sequential decoder over one sealed block.
#[derive(Debug, Clone)]
pub struct DataBlockReader<'a> {
    header: BlockHeader,
    timestamps: BitReader<'a>,
    values: BitReader<'a>,
    state: CodecState,
    position: u32,
    failure: Option<Corruption>,
    fused: bool,
}

impl<'a> DataBlockReader<'a> {
    /// Opens the block at the front of `buf`, verifying its checksum.
    ///
    /// `buf` may be longer than the block; trailing bytes are ignored.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` if the header is invalid, a stream lies outside
    /// `buf`, or the checksum does not match.
    pub fn new(buf: &'a [u8]) -> Result<Self> {
        Self::with_config(buf, ReaderConfig::default())
    }

    /// Opens a block with a custom configuration.
    pub fn with_config(buf: &'a [u8], config: ReaderConfig) -> Result<Self> {
        let header = BlockHeader::read_from(buf).map_err(|e| {
            warn!(len = buf.len(), error = %e, "rejecting block with invalid header");
            e
        })?;

        if config.verify_checksum {
            header.verify_crc(buf).map_err(|e| {
                warn!(series_id = header.series_id, error = %e, "rejecting block");
                e
            })?;
        }

        Ok(Self {
            header,
            timestamps: BitReader::new(&buf[header.timestamps.as_range()]),
            values: BitReader::new(&buf[header.values.as_range()]),
            state: CodecState::from_reference(header.first_timestamp, header.first_value_bits),
            position: 0,
            failure: None,
            fused: false,
        })
    }

    /// Parsed block header.
    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    /// Series this block belongs to.
    pub fn series_id(&self) -> SeriesId {
        self.header.series_id
    }

    /// Number of samples recorded in the header.
    pub fn len(&self) -> usize {
        self.header.count as usize
    }

    /// Returns `true` if the block holds no samples.
    pub fn is_empty(&self) -> bool {
        self.header.count == 0
    }

    /// Number of samples returned so far.
    pub fn position(&self) -> usize {
        self.position as usize
    }

    /// Restarts decoding from the first sample.
    pub fn rewind(&mut self) {
        self.timestamps.rewind();
        self.values.rewind();
        self.state =
            CodecState::from_reference(self.header.first_timestamp, self.header.first_value_bits);
        self.position = 0;
        self.failure = None;
        self.fused = false;
    }

    /// Decodes the next sample.
    ///
    /// # Errors
    ///
    /// - `EndOfStream` once all recorded samples have been returned.
    /// - `Corrupt` if the streams violate the encoding grammar. The reader
    ///   does not advance past a corruption; every later call returns the
    ///   same error.
    pub fn next_sample(&mut self) -> Result<Sample> {
        if let Some(kind) = self.failure {
            return Err(CodecError::Corrupt(kind));
        }

        if self.position >= self.header.count {
            // Anything beyond byte padding means the lengths lie
            if self.timestamps.remaining() >= 8 || self.values.remaining() >= 8 {
                return Err(self.fail(Corruption::TrailingData.into()));
            }
            return Err(CodecError::EndOfStream);
        }

        let sample = if self.position == 0 {
            (
                self.header.first_timestamp,
                f64::from_bits(self.header.first_value_bits),
            )
        } else {
            match self.decode_next() {
                Ok(sample) => sample,
                Err(e) => return Err(self.fail(e)),
            }
        };

        self.position += 1;
        Ok(sample)
    }

    /// Decodes all remaining samples.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` if any remaining sample fails to decode.
    pub fn read_all(&mut self) -> Result<UncompressedChunk> {
        // A corrupt count must not drive the allocation
        let remaining = (self.header.count - self.position) as usize;
        let mut chunk =
            UncompressedChunk::with_capacity(remaining.min(self.timestamps.remaining() + 1));

        loop {
            match self.next_sample() {
                Ok((ts, value)) => chunk.push(ts, value),
                Err(CodecError::EndOfStream) => return Ok(chunk),
                Err(e) => return Err(e),
            }
        }
    }

    fn decode_next(&mut self) -> Result<Sample> {
        let ts = self.state.timestamps.decode(&mut self.timestamps)?;
        let value = self.state.values.decode(&mut self.values)?;
        Ok((ts, value))
    }

    fn fail(&mut self, err: CodecError) -> CodecError {
        if let CodecError::Corrupt(kind) = err {
            warn!(
                series_id = self.header.series_id,
                position = self.position,
                count = self.header.count,
                error = %err,
                "corrupt block"
            );
            self.failure = Some(kind);
        }
        err
    }
}

/// Yields samples until the end of the block. A corruption is yielded once,
/// after which the iterator is exhausted.
impl Iterator for DataBlockReader<'_> {
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fused {
            return None;
        }
        match self.next_sample() {
            Ok(sample) => Some(Ok(sample)),
            Err(CodecError::EndOfStream) => None,
            Err(e) => {
                self.fused = true;
                Some(Err(e))
            }
        }
    }
}
