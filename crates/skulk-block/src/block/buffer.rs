//! Fixed-capacity bit buffers for block encoding and decoding.
//!
//! [`BlockBuffer`] wraps a caller-owned byte slice and hosts the two sample
//! streams of a block while it is being written:
//!
//! ```text
//! ┌──────────┬─────────────────────┬─────────────┬─────────────────────┐
//! │  header  │ timestamps ──────▶  │    free     │  ◀────── values     │
//! └──────────┴─────────────────────┴─────────────┴─────────────────────┘
//! ```
//!
//! Timestamps grow forward from the end of the reserved header region and
//! values grow backward from the end of the slice, so neither stream needs a
//! size estimate up front. Sealing moves the value stream next to the
//! timestamp stream, leaving a compact block at the front of the slice.
//!
//! [`BitReader`] is the read side: a bounds-checked cursor over an
//! MSB-first bit stream.

use crate::block::header::{StreamRange, HEADER_SIZE};
use crate::error::{CodecError, Corruption, Result};
use bitvec::prelude::*;

/// Destination for MSB-first bit output.
pub trait BitSink {
    /// Appends the low `count` bits of `value`, most significant first.
    ///
    /// Implementations either write all `count` bits or none and return
    /// [`CodecError::Overflow`].
    fn write_bits(&mut self, value: u64, count: u32) -> Result<()>;

    /// Appends a single bit.
    fn write_bit(&mut self, bit: bool) -> Result<()> {
        self.write_bits(u64::from(bit), 1)
    }
}

/// Growable sink, used to exercise the codecs without a block.
impl BitSink for BitVec<u8, Msb0> {
    fn write_bits(&mut self, value: u64, count: u32) -> Result<()> {
        for i in (0..count).rev() {
            self.push((value >> i) & 1 == 1);
        }
        Ok(())
    }
}

/// The two sample streams of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Delta-of-delta encoded timestamps.
    Timestamps,
    /// XOR encoded values.
    Values,
}

/// Saved stream positions, see [`BlockBuffer::mark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    ts_bits: usize,
    val_bits: usize,
}

/// Fixed-capacity write buffer for one block.
#[derive(Debug)]
pub struct BlockBuffer<'a> {
    data: &'a mut [u8],
    ts_bits: usize,
    val_bits: usize,
    sealed: Option<(StreamRange, StreamRange)>,
}

impl<'a> BlockBuffer<'a> {
    /// Wraps `data`, reserving its first [`HEADER_SIZE`] bytes for the header.
    ///
    /// # Errors
    ///
    /// Returns `CapacityTooSmall` if `data` cannot hold the header and
    /// `CapacityTooLarge` if it cannot be addressed with 32-bit offsets.
    pub fn new(data: &'a mut [u8]) -> Result<Self> {
        check_capacity(data.len())?;
        Ok(Self {
            data,
            ts_bits: 0,
            val_bits: 0,
            sealed: None,
        })
    }

    /// Total size of the underlying slice in bytes.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of bits written to `stream`.
    pub fn stream_bits(&self, stream: Stream) -> usize {
        match stream {
            Stream::Timestamps => self.ts_bits,
            Stream::Values => self.val_bits,
        }
    }

    /// Size of the block in bytes if it were sealed now.
    pub fn used(&self) -> usize {
        HEADER_SIZE + self.ts_bits.div_ceil(8) + self.val_bits.div_ceil(8)
    }

    /// Whole bytes not claimed by the header or either stream.
    pub fn remaining(&self) -> usize {
        self.capacity() - self.used()
    }

    /// Returns `true` once [`seal`](Self::seal) has run.
    pub fn is_sealed(&self) -> bool {
        self.sealed.is_some()
    }

    /// Returns `true` if `count` more bits fit into `stream`.
    pub fn fits(&self, stream: Stream, count: u32) -> bool {
        if self.sealed.is_some() {
            return false;
        }
        let count = count as usize;
        let (ts_bits, val_bits) = match stream {
            Stream::Timestamps => (self.ts_bits + count, self.val_bits),
            Stream::Values => (self.ts_bits, self.val_bits + count),
        };
        ts_bits.div_ceil(8) + val_bits.div_ceil(8) <= self.capacity() - HEADER_SIZE
    }

    /// Records the current stream positions.
    pub fn mark(&self) -> Mark {
        Mark {
            ts_bits: self.ts_bits,
            val_bits: self.val_bits,
        }
    }

    /// Discards everything written after `mark`.
    ///
    /// Bits past the cursors are overwritten by later writes and cleared on
    /// seal, so only the cursors need restoring.
    pub fn rollback(&mut self, mark: Mark) {
        debug_assert!(self.sealed.is_none(), "rollback after seal");
        self.ts_bits = mark.ts_bits;
        self.val_bits = mark.val_bits;
    }

    /// Appends the low `count` bits of `value` to `stream`.
    ///
    /// # Errors
    ///
    /// Returns `Overflow` without writing anything if the bits do not fit or
    /// the buffer is sealed.
    pub fn write_bits(&mut self, stream: Stream, value: u64, count: u32) -> Result<()> {
        if !self.fits(stream, count) {
            return Err(CodecError::Overflow);
        }

        let bits = self.data.view_bits_mut::<Msb0>();
        let end = bits.len();
        for i in 0..count {
            let bit = (value >> (count - 1 - i)) & 1 == 1;
            let index = match stream {
                Stream::Timestamps => HEADER_SIZE * 8 + self.ts_bits + i as usize,
                // Value stream bit n lives at bit n from the end of the slice
                Stream::Values => end - 1 - (self.val_bits + i as usize),
            };
            bits.set(index, bit);
        }

        match stream {
            Stream::Timestamps => self.ts_bits += count as usize,
            Stream::Values => self.val_bits += count as usize,
        }
        Ok(())
    }

    /// Returns a [`BitSink`] appending to `stream`.
    pub fn sink(&mut self, stream: Stream) -> StreamSink<'_, 'a> {
        StreamSink {
            buffer: self,
            stream,
        }
    }

    /// Compacts the streams into their final layout and returns their byte
    /// ranges (timestamps, values).
    ///
    /// Padding bits are zeroed and the value stream is turned into forward
    /// order directly after the timestamp stream. Calling `seal` again
    /// returns the same ranges without touching the data.
    pub fn seal(&mut self) -> (StreamRange, StreamRange) {
        if let Some(ranges) = self.sealed {
            return ranges;
        }

        let capacity = self.data.len();
        let ts_len = self.ts_bits.div_ceil(8);
        let val_len = self.val_bits.div_ceil(8);

        let bits = self.data.view_bits_mut::<Msb0>();
        let ts_start = HEADER_SIZE * 8;
        bits[ts_start + self.ts_bits..ts_start + ts_len * 8].fill(false);

        let tail = &mut bits[(capacity - val_len) * 8..];
        tail.reverse();
        tail[self.val_bits..].fill(false);

        let ts_end = HEADER_SIZE + ts_len;
        self.data.copy_within(capacity - val_len..capacity, ts_end);

        let ranges = (
            StreamRange::new(HEADER_SIZE as u32, ts_len as u32),
            StreamRange::new(ts_end as u32, val_len as u32),
        );
        self.sealed = Some(ranges);
        ranges
    }

    /// The block bytes: header plus streams. Only meaningful after sealing.
    pub fn block(&self) -> &[u8] {
        &self.data[..self.used()]
    }

    /// Mutable view of the block bytes, used to write the header on seal.
    pub fn block_mut(&mut self) -> &mut [u8] {
        let used = self.used();
        &mut self.data[..used]
    }

    /// Releases the underlying slice, truncated to the block bytes.
    pub fn into_block(self) -> &'a [u8] {
        let used = self.used();
        let data: &'a [u8] = self.data;
        &data[..used]
    }
}

/// Largest buffer whose stream offsets fit the header's `u32` fields.
const MAX_CAPACITY: usize = u32::MAX as usize;

fn check_capacity(len: usize) -> Result<()> {
    if len < HEADER_SIZE {
        return Err(CodecError::CapacityTooSmall {
            required: HEADER_SIZE,
            actual: len,
        });
    }
    if len > MAX_CAPACITY {
        return Err(CodecError::CapacityTooLarge {
            max: MAX_CAPACITY,
            actual: len,
        });
    }
    Ok(())
}

/// [`BitSink`] for one stream of a [`BlockBuffer`].
#[derive(Debug)]
pub struct StreamSink<'b, 'a> {
    buffer: &'b mut BlockBuffer<'a>,
    stream: Stream,
}

impl BitSink for StreamSink<'_, '_> {
    fn write_bits(&mut self, value: u64, count: u32) -> Result<()> {
        self.buffer.write_bits(self.stream, value, count)
    }
}

/// Bounds-checked MSB-first bit cursor.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    bits: &'a BitSlice<u8, Msb0>,
    pos: usize,
}

impl<'a> BitReader<'a> {
    /// Creates a reader over whole bytes.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::from_bits(bytes.view_bits::<Msb0>())
    }

    /// Creates a reader over an exact bit slice.
    pub fn from_bits(bits: &'a BitSlice<u8, Msb0>) -> Self {
        Self { bits, pos: 0 }
    }

    /// Current bit position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bits left to read.
    pub fn remaining(&self) -> usize {
        self.bits.len() - self.pos
    }

    /// Moves the cursor back to the first bit.
    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    /// Reads one bit.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt(Truncated)` at the end of the stream.
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.pos >= self.bits.len() {
            return Err(Corruption::Truncated.into());
        }
        let bit = self.bits[self.pos];
        self.pos += 1;
        Ok(bit)
    }

    /// Reads `count` bits (at most 64) as an unsigned integer, most
    /// significant first.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt(Truncated)` without moving the cursor if fewer than
    /// `count` bits remain.
    pub fn read_bits(&mut self, count: u32) -> Result<u64> {
        debug_assert!(count <= 64);
        let count = count as usize;
        if count > self.remaining() {
            return Err(Corruption::Truncated.into());
        }
        let mut value: u64 = 0;
        for bit in self.bits[self.pos..self.pos + count].iter().by_vals() {
            value = (value << 1) | u64::from(bit);
        }
        self.pos += count;
        Ok(value)
    }
}
