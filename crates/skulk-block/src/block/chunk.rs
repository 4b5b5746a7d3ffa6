//! Decoded, index-aligned form of a block's samples.

use crate::block::{Sample, Timestamp};

/// Two parallel sequences of timestamps and values.
///
/// Index `i` of `timestamps` belongs to index `i` of `values`. This is the
/// form query processing consumes; codec state never leaks into it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UncompressedChunk {
    /// Sample timestamps in block order.
    pub timestamps: Vec<Timestamp>,
    /// Sample values in block order.
    pub values: Vec<f64>,
}

impl UncompressedChunk {
    /// Creates an empty chunk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty chunk with room for `capacity` samples.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            timestamps: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    /// Appends one sample.
    pub fn push(&mut self, timestamp: Timestamp, value: f64) {
        self.timestamps.push(timestamp);
        self.values.push(value);
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        debug_assert_eq!(self.timestamps.len(), self.values.len());
        self.timestamps.len()
    }

    /// Returns `true` if the chunk holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the sample at `index`.
    pub fn get(&self, index: usize) -> Option<Sample> {
        Some((*self.timestamps.get(index)?, *self.values.get(index)?))
    }

    /// Iterates over `(timestamp, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = Sample> + '_ {
        self.timestamps
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }

    /// Compares two chunks with exact bit equality on values, so `NaN`
    /// payloads and signed zeros must match too.
    pub fn bitwise_eq(&self, other: &Self) -> bool {
        self.timestamps == other.timestamps
            && self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl FromIterator<Sample> for UncompressedChunk {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        let mut chunk = Self::new();
        chunk.extend(iter);
        chunk
    }
}

impl Extend<Sample> for UncompressedChunk {
    fn extend<I: IntoIterator<Item = Sample>>(&mut self, iter: I) {
        for (ts, value) in iter {
            self.push(ts, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_iterate() {
        let mut chunk = UncompressedChunk::with_capacity(2);
        chunk.push(10, 1.0);
        chunk.push(20, 2.0);

        assert_eq!(chunk.len(), 2);
        assert_eq!(chunk.get(1), Some((20, 2.0)));
        assert_eq!(chunk.get(2), None);
        assert_eq!(chunk.iter().collect::<Vec<_>>(), vec![(10, 1.0), (20, 2.0)]);
    }

    #[test]
    fn test_bitwise_eq() {
        let a: UncompressedChunk = [(1, f64::NAN), (2, 0.0)].into_iter().collect();
        let b: UncompressedChunk = [(1, f64::NAN), (2, 0.0)].into_iter().collect();
        let c: UncompressedChunk = [(1, f64::NAN), (2, -0.0)].into_iter().collect();

        assert!(a.bitwise_eq(&b));
        assert!(!a.bitwise_eq(&c));
        // PartialEq follows IEEE semantics
        assert_ne!(a, b);
        assert!(UncompressedChunk::new().is_empty());
    }
}
