use crate::bloom::Filter;
use crate::shape::Shape;

/// Bit array packed into `u64` words.
///
/// Bit `i` lives in word `i / 64` at position `i % 64`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitSetFilter {
    shape: Shape,
    bits: Vec<u64>,
}

impl BitSetFilter {
    pub fn new(shape: Shape) -> Self {
        let num_u64s = (shape.number_of_bits() as usize).div_ceil(64);
        BitSetFilter {
            shape,
            bits: vec![0u64; num_u64s],
        }
    }

    pub(crate) fn union_with(&mut self, other: &BitSetFilter) {
        for (a, b) in self.bits.iter_mut().zip(&other.bits) {
            *a |= b;
        }
    }

    pub(crate) fn is_superset(&self, other: &BitSetFilter) -> bool {
        self.bits.iter().zip(&other.bits).all(|(a, b)| a & b == *b)
    }

    pub(crate) fn intersects(&self, other: &BitSetFilter) -> bool {
        self.bits.iter().zip(&other.bits).any(|(a, b)| a & b != 0)
    }

    pub(crate) fn xor_cardinality(&self, other: &BitSetFilter) -> u32 {
        self.bits
            .iter()
            .zip(&other.bits)
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }
}

impl Filter for BitSetFilter {
    fn shape(&self) -> &Shape {
        &self.shape
    }

    fn is_set(&self, bit: u32) -> bool {
        if bit >= self.shape.number_of_bits() {
            return false;
        }
        let word_index = (bit / 64) as usize;
        let bit_index = bit % 64;
        (self.bits[word_index] >> bit_index) & 1 == 1
    }

    fn set(&mut self, bit: u32) {
        debug_assert!(bit < self.shape.number_of_bits());
        let word_index = (bit / 64) as usize;
        let bit_index = bit % 64;
        self.bits[word_index] |= 1 << bit_index;
    }

    fn set_bits(&self) -> Vec<u32> {
        let mut out = Vec::with_capacity(self.cardinality() as usize);
        for (word_index, &word) in self.bits.iter().enumerate() {
            let mut w = word;
            while w != 0 {
                let bit = w.trailing_zeros();
                out.push(word_index as u32 * 64 + bit);
                w &= w - 1;
            }
        }
        out
    }

    fn cardinality(&self) -> u32 {
        self.bits.iter().map(|w| w.count_ones()).sum()
    }

    fn clear(&mut self) {
        self.bits.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_bits_ascending() {
        let shape = Shape::from_parts(10, 10, 130, 3).unwrap();
        let mut f = BitSetFilter::new(shape);
        for bit in [129, 0, 64, 63] {
            f.set(bit);
        }
        assert_eq!(f.set_bits(), vec![0, 63, 64, 129]);
        assert_eq!(f.cardinality(), 4);
        assert!(!f.is_set(500));
    }
}
