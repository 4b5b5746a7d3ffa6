//! Skulk Block - compressed sample blocks for the Alopex Skulk time series engine
//!
//! This crate packs ordered `(timestamp, value)` samples of one series into
//! fixed-capacity binary blocks and restores them exactly: decoded values are
//! bit-identical to the originals.
//!
//! # Components
//!
//! - [`DataBlockWriter`]: encodes samples into a caller-owned buffer
//! - [`DataBlockReader`]: decodes a sealed block sample by sample
//! - [`TimestampCodec`] / [`ValueCodec`]: Gorilla delta-of-delta and XOR codecs
//! - [`BlockBuffer`] / [`BitReader`]: fixed-capacity bit streams
//!
//! # Example
//!
//! ```rust
//! use skulk_block::{max_block_size, CodecError, DataBlockReader, DataBlockWriter};
//!
//! let mut buf = vec![0u8; max_block_size(100)];
//! let mut writer = DataBlockWriter::new(1, &mut buf)?;
//! for i in 0..100 {
//!     writer.put(1_700_000_000 + i * 10, 20.0 + (i % 3) as f64)?;
//! }
//! let block = writer.finish();
//!
//! let mut reader = DataBlockReader::new(block)?;
//! let (ts, value) = reader.next_sample()?;
//! assert_eq!((ts, value), (1_700_000_000, 20.0));
//! # Ok::<(), CodecError>(())
//! ```
//!
//! Every operation reports its outcome through [`CodecError`]:
//! `Overflow` tells the writer's caller to seal the block and start a new
//! one, `EndOfStream` ends a read, and `Corrupt` marks a block that must be
//! discarded.

#![deny(missing_docs)]

pub mod block;
pub mod error;

pub use block::{
    max_block_size, BitReader, BlockBuffer, BlockHeader, CodecState, DataBlockReader,
    DataBlockWriter, ReaderConfig, Sample, SeriesId, Timestamp, TimestampCodec,
    UncompressedChunk, ValueCodec, WriterConfig, HEADER_SIZE,
};
pub use error::{CodecError, Corruption, Result};
