//! Gorilla compression for the sample streams of a block.
//!
//! # Algorithm Overview
//!
//! The first sample of a block is stored verbatim in the header and seeds
//! both codecs. Every later sample is encoded against the running state.
//!
//! ## Timestamp Encoding (Delta-of-Delta)
//!
//! `delta = ts - prev_ts`, `dod = delta - prev_delta` (wrapping), and the
//! zig-zag mapped `z = zigzag(dod)` is written as:
//!   - `dod == 0`: `'0'` (1 bit)
//!   - `z < 2^7`: `'10'` + 7 bits
//!   - `z < 2^9`: `'110'` + 9 bits
//!   - `z < 2^12`: `'1110'` + 12 bits
//!   - `z < 2^32`: `'11110'` + 32 bits
//!   - else: `'11111'` + 64 bits
//!
//! Wrapping arithmetic makes every `i64` sequence round-trip, including
//! decreasing timestamps and jumps across the whole range.
//!
//! ## Value Encoding (XOR-based)
//!
//! Float values are encoded using XOR with the previous value's bits:
//!   - XOR = 0: `'0'` (1 bit)
//!   - Fits the previous window: `'10'` + meaningful bits
//!   - New window: `'11'` + 6 bits leading + 6 bits (length - 1) + meaningful bits

use crate::block::buffer::{BitReader, BitSink};
use crate::block::Timestamp;
use crate::error::{Corruption, Result};

/// Payload widths of the non-zero delta-of-delta buckets, in prefix order.
const DOD_PAYLOAD_BITS: [u32; 5] = [7, 9, 12, 32, 64];

/// Maps signed integers to unsigned so that small magnitudes stay small.
pub fn zigzag_encode(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
pub fn zigzag_decode(z: u64) -> i64 {
    ((z >> 1) as i64) ^ -((z & 1) as i64)
}

/// Running delta-of-delta state for the timestamp stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampCodec {
    prev_ts: Timestamp,
    prev_delta: i64,
}

impl TimestampCodec {
    /// Creates a codec seeded with the block's reference timestamp.
    pub fn seeded(first: Timestamp) -> Self {
        Self {
            prev_ts: first,
            prev_delta: 0,
        }
    }

    /// Last timestamp encoded or decoded.
    pub fn prev_timestamp(&self) -> Timestamp {
        self.prev_ts
    }

    /// Encodes `timestamp` and advances the state.
    ///
    /// On error the sink may hold part of the code and the state is left
    /// untouched; callers roll the sink back (see
    /// [`BlockBuffer::mark`](crate::block::BlockBuffer::mark)).
    pub fn encode<S: BitSink>(&mut self, timestamp: Timestamp, output: &mut S) -> Result<()> {
        let delta = timestamp.wrapping_sub(self.prev_ts);
        let delta_of_delta = delta.wrapping_sub(self.prev_delta);

        if delta_of_delta == 0 {
            output.write_bit(false)?;
        } else {
            let z = zigzag_encode(delta_of_delta);
            let bucket = DOD_PAYLOAD_BITS
                .iter()
                .position(|&bits| bits == 64 || z < (1u64 << bits))
                .unwrap_or(DOD_PAYLOAD_BITS.len() - 1);

            // bucket k has k + 1 leading ones, terminated by a zero except
            // for the last bucket
            let (prefix, prefix_bits) = if bucket == DOD_PAYLOAD_BITS.len() - 1 {
                (0b11111, 5)
            } else {
                let ones = bucket as u32 + 1;
                (((1u64 << ones) - 1) << 1, ones + 1)
            };

            output.write_bits(prefix, prefix_bits)?;
            output.write_bits(z, DOD_PAYLOAD_BITS[bucket])?;
        }

        self.prev_delta = delta;
        self.prev_ts = timestamp;
        Ok(())
    }

    /// Decodes the next timestamp and advances the state.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` if the stream ends early or holds a non-canonical
    /// code.
    pub fn decode(&mut self, input: &mut BitReader<'_>) -> Result<Timestamp> {
        let delta_of_delta = if !input.read_bit()? {
            0
        } else {
            let mut ones = 1;
            while ones < DOD_PAYLOAD_BITS.len() && input.read_bit()? {
                ones += 1;
            }
            let z = input.read_bits(DOD_PAYLOAD_BITS[ones - 1])?;
            if z == 0 {
                return Err(
                    Corruption::InvalidEncoding("zero delta-of-delta with payload").into(),
                );
            }
            zigzag_decode(z)
        };

        let delta = self.prev_delta.wrapping_add(delta_of_delta);
        let ts = self.prev_ts.wrapping_add(delta);
        self.prev_delta = delta;
        self.prev_ts = ts;

        Ok(ts)
    }
}

/// Leading/trailing zero window of the last XOR written with a `'11'` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    leading: u32,
    trailing: u32,
}

impl Window {
    fn meaningful_bits(&self) -> u32 {
        64 - self.leading - self.trailing
    }
}

/// Running XOR state for the value stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueCodec {
    prev_bits: u64,
    window: Option<Window>,
}

impl ValueCodec {
    /// Creates a codec seeded with the raw bits of the block's first value.
    pub fn seeded(first_bits: u64) -> Self {
        Self {
            prev_bits: first_bits,
            window: None,
        }
    }

    /// Raw bits of the last value encoded or decoded.
    pub fn prev_bits(&self) -> u64 {
        self.prev_bits
    }

    /// Encodes `value` and advances the state.
    pub fn encode<S: BitSink>(&mut self, value: f64, output: &mut S) -> Result<()> {
        let bits = value.to_bits();
        let xor = bits ^ self.prev_bits;

        if xor == 0 {
            output.write_bit(false)?;
        } else {
            let leading = xor.leading_zeros();
            let trailing = xor.trailing_zeros();

            match self.window {
                Some(window) if leading >= window.leading && trailing >= window.trailing => {
                    output.write_bits(0b10, 2)?;
                    output.write_bits(xor >> window.trailing, window.meaningful_bits())?;
                }
                _ => {
                    let window = Window { leading, trailing };
                    let meaningful_bits = window.meaningful_bits();
                    let control = (0b11 << 12)
                        | (u64::from(leading) << 6)
                        | u64::from(meaningful_bits - 1);
                    output.write_bits(control, 14)?;
                    output.write_bits(xor >> trailing, meaningful_bits)?;
                    self.window = Some(window);
                }
            }
        }

        self.prev_bits = bits;
        Ok(())
    }

    /// Decodes the next value and advances the state.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` if the stream ends early or a window code is
    /// impossible for the encoder to have produced.
    pub fn decode(&mut self, input: &mut BitReader<'_>) -> Result<f64> {
        let xor = if !input.read_bit()? {
            0
        } else if !input.read_bit()? {
            let window = self
                .window
                .ok_or(Corruption::InvalidEncoding("window reuse before any window"))?;
            let meaningful = input.read_bits(window.meaningful_bits())?;
            if meaningful == 0 {
                return Err(Corruption::InvalidEncoding("empty xor in reused window").into());
            }
            meaningful << window.trailing
        } else {
            let leading = input.read_bits(6)? as u32;
            let meaningful_bits = input.read_bits(6)? as u32 + 1;
            if leading + meaningful_bits > 64 {
                return Err(Corruption::InvalidEncoding("value window exceeds 64 bits").into());
            }
            let meaningful = input.read_bits(meaningful_bits)?;
            if meaningful & 1 == 0 || meaningful >> (meaningful_bits - 1) == 0 {
                return Err(Corruption::InvalidEncoding("value window not tight").into());
            }
            let trailing = 64 - leading - meaningful_bits;
            self.window = Some(Window { leading, trailing });
            meaningful << trailing
        };

        let bits = self.prev_bits ^ xor;
        self.prev_bits = bits;

        Ok(f64::from_bits(bits))
    }
}

/// Combined encoder/decoder state of a block: previous timestamp, previous
/// delta and previous value bits.
///
/// The same state drives both directions, so a writer and a reader that
/// have processed the same samples hold equal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecState {
    /// Timestamp stream state.
    pub timestamps: TimestampCodec,
    /// Value stream state.
    pub values: ValueCodec,
}

impl CodecState {
    /// Seeds both codecs from the block's reference sample.
    pub fn seeded(first_timestamp: Timestamp, first_value: f64) -> Self {
        Self::from_reference(first_timestamp, first_value.to_bits())
    }

    /// Seeds both codecs from the raw reference fields of a block header.
    pub fn from_reference(first_timestamp: Timestamp, first_value_bits: u64) -> Self {
        Self {
            timestamps: TimestampCodec::seeded(first_timestamp),
            values: ValueCodec::seeded(first_value_bits),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;
    use bitvec::prelude::*;

    fn encode_timestamps(timestamps: &[i64]) -> BitVec<u8, Msb0> {
        let mut output = BitVec::<u8, Msb0>::new();
        let mut codec = TimestampCodec::seeded(timestamps[0]);
        for &ts in &timestamps[1..] {
            codec.encode(ts, &mut output).unwrap();
        }
        output
    }

    fn assert_timestamps_roundtrip(timestamps: &[i64]) -> usize {
        let output = encode_timestamps(timestamps);
        let mut input = BitReader::from_bits(&output);
        let mut codec = TimestampCodec::seeded(timestamps[0]);
        for &expected in &timestamps[1..] {
            assert_eq!(codec.decode(&mut input).unwrap(), expected);
        }
        assert_eq!(input.remaining(), 0);
        output.len()
    }

    fn encode_values(values: &[f64]) -> BitVec<u8, Msb0> {
        let mut output = BitVec::<u8, Msb0>::new();
        let mut codec = ValueCodec::seeded(values[0].to_bits());
        for &val in &values[1..] {
            codec.encode(val, &mut output).unwrap();
        }
        output
    }

    fn assert_values_roundtrip(values: &[f64]) -> usize {
        let output = encode_values(values);
        let mut input = BitReader::from_bits(&output);
        let mut codec = ValueCodec::seeded(values[0].to_bits());
        for &expected in &values[1..] {
            let decoded = codec.decode(&mut input).unwrap();
            assert_eq!(decoded.to_bits(), expected.to_bits());
        }
        assert_eq!(input.remaining(), 0);
        output.len()
    }

    #[test]
    fn test_zigzag() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        assert_eq!(zigzag_encode(i64::MAX), u64::MAX - 1);
        assert_eq!(zigzag_encode(i64::MIN), u64::MAX);
        for n in [0, 1, -1, 63, -64, 1 << 40, i64::MIN, i64::MAX] {
            assert_eq!(zigzag_decode(zigzag_encode(n)), n);
        }
    }

    #[test]
    fn test_timestamp_zero_delta_of_delta() {
        // Constant interval: first delta costs a bucket, the rest one bit each
        let bits = assert_timestamps_roundtrip(&[1000, 1010, 1020, 1030, 1040]);
        assert_eq!(bits, 2 + 7 + 3);
    }

    #[test]
    fn test_timestamp_buckets() {
        // delta-of-delta 5 -> '10' + 7
        assert_eq!(encode_timestamps(&[0, 5]).len(), 9);
        // delta-of-delta 100 -> z = 200 -> '110' + 9
        assert_eq!(encode_timestamps(&[0, 100]).len(), 12);
        // delta-of-delta 2000 -> z = 4000 -> '1110' + 12
        assert_eq!(encode_timestamps(&[0, 2000]).len(), 16);
        // delta-of-delta 1e6 -> '11110' + 32
        assert_eq!(encode_timestamps(&[0, 1_000_000]).len(), 37);
        // delta-of-delta 2^40 -> '11111' + 64
        assert_eq!(encode_timestamps(&[0, 1 << 40]).len(), 69);
    }

    #[test]
    fn test_timestamp_irregular_intervals() {
        assert_timestamps_roundtrip(&[1000, 1010, 1025, 1035, 1055]);
        assert_timestamps_roundtrip(&[1000, 1100, 1350, 1400]);
        assert_timestamps_roundtrip(&[1000, 2000, 5000, 5500]);
        assert_timestamps_roundtrip(&[0, 1_000_000, 100_000_000, 100_001_000]);
    }

    #[test]
    fn test_timestamp_decreasing() {
        let timestamps: Vec<i64> = (0..100).map(|i| 100 - i).collect();
        assert_timestamps_roundtrip(&timestamps);
        assert_timestamps_roundtrip(&[-1_000_000_000, -999_999_000, -999_998_000, 0, 1000]);
    }

    #[test]
    fn test_timestamp_extremes() {
        // Deltas beyond i32 and across the whole i64 range
        assert_timestamps_roundtrip(&[i64::MIN, i64::MAX, i64::MIN, 0, i64::MAX, -1]);
        assert_timestamps_roundtrip(&[0, i64::MAX, i64::MAX, i64::MAX]);
    }

    #[test]
    fn test_timestamp_truncated_stream() {
        let output = encode_timestamps(&[0, 1_000_000]);
        let truncated = &output[..output.len() - 1];
        let mut input = BitReader::from_bits(truncated);
        let mut codec = TimestampCodec::seeded(0);
        assert_eq!(
            codec.decode(&mut input),
            Err(CodecError::Corrupt(Corruption::Truncated))
        );
    }

    #[test]
    fn test_timestamp_rejects_zero_payload() {
        let mut output = BitVec::<u8, Msb0>::new();
        output.write_bits(0b10, 2).unwrap();
        output.write_bits(0, 7).unwrap();
        let mut codec = TimestampCodec::seeded(0);
        assert!(matches!(
            codec.decode(&mut BitReader::from_bits(&output)),
            Err(CodecError::Corrupt(Corruption::InvalidEncoding(_)))
        ));
    }

    #[test]
    fn test_value_identical() {
        let bits = assert_values_roundtrip(&[42.5; 10]);
        assert_eq!(bits, 9);
    }

    #[test]
    fn test_value_varying() {
        assert_values_roundtrip(&[1.0, 1.5, 2.0, 2.5, 3.0, 100.0, -50.0, 0.0]);
        assert_values_roundtrip(&[-100.0, -50.0, -1.0, -0.5, 0.0, 0.5, 1.0, 50.0, 100.0]);
    }

    #[test]
    fn test_value_window_reuse() {
        let values = [1.0, 1.0000001, 1.0000002, 1.0000003];
        let output = encode_values(&values);
        let mut input = BitReader::from_bits(&output);
        // first xor opens a window
        assert_eq!(input.read_bits(2).unwrap(), 0b11);
        assert_values_roundtrip(&values);
    }

    #[test]
    fn test_value_special_floats() {
        assert_values_roundtrip(&[
            0.0,
            -0.0,
            f64::MIN,
            f64::MAX,
            f64::MIN_POSITIVE,
            f64::EPSILON,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NAN,
            -f64::NAN,
            f64::from_bits(1),
            f64::from_bits(u64::MAX),
        ]);
    }

    #[test]
    fn test_value_full_width_xor() {
        // XOR with both the top and bottom bit set needs all 64 meaningful bits
        let a = f64::from_bits(0);
        let b = f64::from_bits(0x8000_0000_0000_0001);
        let bits = assert_values_roundtrip(&[a, b, a]);
        assert_eq!(bits, (14 + 64) + (2 + 64));
    }

    #[test]
    fn test_value_rejects_reuse_without_window() {
        let mut output = BitVec::<u8, Msb0>::new();
        output.write_bits(0b10, 2).unwrap();
        output.write_bits(u64::MAX, 64).unwrap();
        let mut codec = ValueCodec::seeded(0);
        assert!(matches!(
            codec.decode(&mut BitReader::from_bits(&output)),
            Err(CodecError::Corrupt(Corruption::InvalidEncoding(_)))
        ));
    }

    #[test]
    fn test_value_rejects_oversized_window() {
        let mut output = BitVec::<u8, Msb0>::new();
        // leading 10, length 60 -> 70 bits
        output.write_bits((0b11 << 12) | (10 << 6) | 59, 14).unwrap();
        output.write_bits(u64::MAX, 60).unwrap();
        let mut codec = ValueCodec::seeded(0);
        assert!(matches!(
            codec.decode(&mut BitReader::from_bits(&output)),
            Err(CodecError::Corrupt(Corruption::InvalidEncoding(_)))
        ));
    }

    #[test]
    fn test_codec_state_symmetry() {
        let samples = [(100_i64, 1.0_f64), (110, 1.25), (125, 1.25), (90, -3.5)];
        let mut ts_out = BitVec::<u8, Msb0>::new();
        let mut val_out = BitVec::<u8, Msb0>::new();
        let mut encoder = CodecState::seeded(samples[0].0, samples[0].1);
        for &(ts, val) in &samples[1..] {
            encoder.timestamps.encode(ts, &mut ts_out).unwrap();
            encoder.values.encode(val, &mut val_out).unwrap();
        }

        let mut ts_in = BitReader::from_bits(&ts_out);
        let mut val_in = BitReader::from_bits(&val_out);
        let mut decoder = CodecState::from_reference(samples[0].0, samples[0].1.to_bits());
        for _ in 1..samples.len() {
            decoder.timestamps.decode(&mut ts_in).unwrap();
            decoder.values.decode(&mut val_in).unwrap();
        }

        assert_eq!(encoder, decoder);
        assert_eq!(decoder.timestamps.prev_timestamp(), 90);
        assert_eq!(decoder.values.prev_bits(), (-3.5f64).to_bits());
    }
}
