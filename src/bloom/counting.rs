use crate::bloom::Filter;
use crate::hash::Fingerprint;
use crate::shape::Shape;

/// One saturating counter per bit position.
///
/// A bit is "on" while its counter is non-zero, so fingerprints can be
/// taken back out with [`CountingFilter::remove_fingerprint`]. Gated
/// collections never do that to their gate; the method is for callers
/// that own a counting filter directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountingFilter {
    shape: Shape,
    counts: Vec<u32>,
}

impl CountingFilter {
    pub fn new(shape: Shape) -> Self {
        CountingFilter {
            shape,
            counts: vec![0u32; shape.number_of_bits() as usize],
        }
    }

    /// Current counter at `bit`.
    pub fn count(&self, bit: u32) -> u32 {
        self.counts.get(bit as usize).copied().unwrap_or(0)
    }

    /// Decrement every counter the fingerprint activates.
    ///
    /// Returns false, changing nothing, if any of those counters is already
    /// zero: the fingerprint was never merged in.
    pub fn remove_fingerprint(&mut self, fingerprint: &Fingerprint) -> bool {
        let bits: Vec<u32> = fingerprint.activated_bits(&self.shape).collect();

        // Duplicate positions were incremented once per occurrence
        let mut needed = bits.clone();
        needed.sort_unstable();
        for chunk in needed.chunk_by(|a, b| a == b) {
            if self.counts[chunk[0] as usize] < chunk.len() as u32 {
                return false;
            }
        }

        for bit in bits {
            self.counts[bit as usize] -= 1;
        }
        true
    }
}

impl Filter for CountingFilter {
    fn shape(&self) -> &Shape {
        &self.shape
    }

    fn is_set(&self, bit: u32) -> bool {
        self.count(bit) > 0
    }

    fn set(&mut self, bit: u32) {
        let slot = &mut self.counts[bit as usize];
        *slot = slot.saturating_add(1);
    }

    fn set_bits(&self) -> Vec<u32> {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, c)| **c > 0)
            .map(|(i, _)| i as u32)
            .collect()
    }

    fn cardinality(&self) -> u32 {
        self.counts.iter().filter(|c| **c > 0).count() as u32
    }

    fn clear(&mut self) {
        self.counts.fill(0);
    }
}
