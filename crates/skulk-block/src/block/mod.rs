//! Fixed-capacity compressed blocks of time series samples.
//!
//! A block holds the samples of a single series. The first sample is stored
//! verbatim in the header; the rest are Gorilla-encoded into two bit streams,
//! one for timestamps (delta-of-delta) and one for values (XOR).
//!
//! ## Block Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Header (56 bytes)                                           │
//! │  - Magic "SKBL", version, series id, sample count            │
//! │  - Timestamp / value stream offsets and lengths              │
//! │  - Reference timestamp and value bits, CRC32                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Timestamp stream (byte aligned)                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Value stream (byte aligned)                                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use skulk_block::block::{max_block_size, DataBlockReader, DataBlockWriter};
//!
//! let mut buf = vec![0u8; max_block_size(3)];
//! let mut writer = DataBlockWriter::new(42, &mut buf).unwrap();
//! writer.put(1000, 1.5).unwrap();
//! writer.put(1010, 1.5).unwrap();
//! writer.put(1020, 2.0).unwrap();
//! let block = writer.finish();
//!
//! let reader = DataBlockReader::new(block).unwrap();
//! let samples: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
//! assert_eq!(samples, vec![(1000, 1.5), (1010, 1.5), (1020, 2.0)]);
//! ```

pub mod buffer;
pub mod chunk;
pub mod gorilla;
pub mod header;
pub mod reader;
pub mod writer;

pub use buffer::{BitReader, BitSink, BlockBuffer, Stream};
pub use chunk::UncompressedChunk;
pub use gorilla::{CodecState, TimestampCodec, ValueCodec};
pub use header::{BlockHeader, StreamRange, HEADER_SIZE};
pub use reader::{DataBlockReader, ReaderConfig};
pub use writer::{DataBlockWriter, WriterConfig};

/// Opaque key of the series a block belongs to.
pub type SeriesId = u64;

/// Sample timestamp. Units are chosen by the caller.
pub type Timestamp = i64;

/// One decoded `(timestamp, value)` pair.
pub type Sample = (Timestamp, f64);

/// Largest number of bits a single timestamp can take in the stream.
pub const MAX_TIMESTAMP_BITS: usize = 5 + 64;

/// Largest number of bits a single value can take in the stream.
pub const MAX_VALUE_BITS: usize = 2 + 6 + 6 + 64;

/// Returns a buffer size that is guaranteed to hold `samples` samples of any
/// content.
///
/// The first sample lives in the header, so only the remaining ones are
/// charged the worst-case stream cost.
pub fn max_block_size(samples: usize) -> usize {
    let encoded = samples.saturating_sub(1);
    HEADER_SIZE
        + (encoded * MAX_TIMESTAMP_BITS).div_ceil(8)
        + (encoded * MAX_VALUE_BITS).div_ceil(8)
}
