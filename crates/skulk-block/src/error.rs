//! Error and Result types for Skulk block encoding and decoding.
//!
//! Every codec operation reports its outcome through [`CodecError`]. `Ok(..)`
//! is success; the three runtime statuses (`Overflow`, `EndOfStream` and
//! `Corrupt`) are ordinary values that callers match on. Capacity errors are
//! only produced by constructors and indicate a caller bug.

use thiserror::Error;

/// A convenience `Result` type for block codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// The error type for block codec operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The block cannot hold the next sample. Seal it and start a new one.
    #[error("Block capacity exhausted")]
    Overflow,

    /// All samples recorded in the block header have been read.
    #[error("End of block reached")]
    EndOfStream,

    /// The block violates the encoding grammar and must be discarded.
    #[error("Corrupt block: {0}")]
    Corrupt(Corruption),

    /// The supplied buffer is smaller than the fixed block header.
    #[error("Buffer too small: need at least {required} bytes, got {actual}")]
    CapacityTooSmall {
        /// Minimum buffer size in bytes.
        required: usize,
        /// Size of the supplied buffer.
        actual: usize,
    },

    /// The supplied buffer cannot be addressed by the 32-bit header offsets.
    #[error("Buffer too large: at most {max} bytes, got {actual}")]
    CapacityTooLarge {
        /// Maximum buffer size in bytes.
        max: usize,
        /// Size of the supplied buffer.
        actual: usize,
    },
}

impl CodecError {
    /// Returns `true` for statuses the caller is expected to handle in the
    /// normal course of ingestion or reading.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Overflow | Self::EndOfStream)
    }

    /// Returns `true` if the error signals an untrustworthy block.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt(_))
    }
}

impl From<Corruption> for CodecError {
    fn from(kind: Corruption) -> Self {
        Self::Corrupt(kind)
    }
}

/// What exactly was wrong with a corrupt block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Corruption {
    /// A header field or stream extends past the end of the buffer.
    #[error("data truncated")]
    Truncated,

    /// Header does not start with the block magic.
    #[error("invalid magic bytes: expected SKBL, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Header carries a format version this build cannot read.
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u16),

    /// Stream offsets or lengths are inconsistent with each other.
    #[error("invalid stream layout")]
    InvalidLayout,

    /// Stored CRC32 does not match the block contents.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// CRC32 stored in the header.
        expected: u32,
        /// CRC32 computed over the block.
        actual: u32,
    },

    /// A bit pattern does not parse against the stream grammar.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(&'static str),

    /// Whole unread bytes remain after the last recorded sample.
    #[error("trailing data after last sample")]
    TrailingData,
}
