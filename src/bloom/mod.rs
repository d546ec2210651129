pub mod bitset;
pub mod builder;
pub mod compressed;
pub mod counting;

use crate::error::{Error, Result};
use crate::hash::Fingerprint;
use crate::shape::Shape;

pub use bitset::BitSetFilter;
pub use builder::BloomFilterBuilder;
pub use compressed::CompressedFilter;
pub use counting::CountingFilter;

/// Probabilistic set summary: "could this be in the set?"
///
/// - If any bit is 0 → DEFINITELY NOT in the set
/// - If all bits are 1 → PROBABLY in the set (false positive possible)
///
/// Every variant stores the same logical thing, a set of bit indices in
/// `[0, shape.number_of_bits())`, and differs only in representation.
/// Set-level operations (`contains`, `hamming_distance`, ...) are written
/// against this trait so any two variants can be compared.
pub trait Filter {
    /// Sizing this filter was built for.
    fn shape(&self) -> &Shape;

    /// Whether `bit` is on.
    fn is_set(&self, bit: u32) -> bool;

    /// Turn `bit` on.
    fn set(&mut self, bit: u32);

    /// Indices of all bits that are on, ascending.
    fn set_bits(&self) -> Vec<u32>;

    /// Number of bits that are on.
    fn cardinality(&self) -> u32;

    /// Turn every bit off.
    fn clear(&mut self);

    /// OR a fingerprint's activated bits into the filter.
    fn merge_fingerprint(&mut self, fingerprint: &Fingerprint) {
        let shape = *self.shape();
        for bit in fingerprint.activated_bits(&shape) {
            self.set(bit);
        }
    }
}

/// Representation picked when a filter is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterKind {
    /// Packed `u64` words. Fast, fixed `m / 8` bytes.
    #[default]
    BitSet,
    /// One counter per bit; supports removing fingerprints.
    Counting,
    /// Roaring bitmap; small when sparse.
    Compressed,
}

/// A Bloom filter of any [`FilterKind`].
#[derive(Debug, Clone)]
pub enum BloomFilter {
    BitSet(BitSetFilter),
    Counting(CountingFilter),
    Compressed(CompressedFilter),
}

impl BloomFilter {
    /// Empty filter of the given kind.
    pub fn new(kind: FilterKind, shape: Shape) -> Self {
        match kind {
            FilterKind::BitSet => BloomFilter::BitSet(BitSetFilter::new(shape)),
            FilterKind::Counting => BloomFilter::Counting(CountingFilter::new(shape)),
            FilterKind::Compressed => BloomFilter::Compressed(CompressedFilter::new(shape)),
        }
    }

    /// Filter holding exactly one fingerprint.
    pub fn from_fingerprint(kind: FilterKind, shape: Shape, fingerprint: &Fingerprint) -> Self {
        let mut filter = BloomFilter::new(kind, shape);
        filter.merge_fingerprint(fingerprint);
        filter
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            BloomFilter::BitSet(_) => FilterKind::BitSet,
            BloomFilter::Counting(_) => FilterKind::Counting,
            BloomFilter::Compressed(_) => FilterKind::Compressed,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cardinality() == 0
    }

    /// OR `other` into this filter.
    pub fn merge(&mut self, other: &BloomFilter) -> Result<()> {
        self.check_shape(other)?;
        match (self, other) {
            (BloomFilter::BitSet(a), BloomFilter::BitSet(b)) => a.union_with(b),
            (BloomFilter::Compressed(a), BloomFilter::Compressed(b)) => a.union_with(b),
            (this, other) => {
                for bit in other.set_bits() {
                    this.set(bit);
                }
            }
        }
        Ok(())
    }

    /// True iff every bit of `other` is on here (`self & other == other`).
    pub fn contains(&self, other: &BloomFilter) -> Result<bool> {
        self.check_shape(other)?;
        Ok(match (self, other) {
            (BloomFilter::BitSet(a), BloomFilter::BitSet(b)) => a.is_superset(b),
            (BloomFilter::Compressed(a), BloomFilter::Compressed(b)) => a.is_superset(b),
            _ => other.set_bits().into_iter().all(|bit| self.is_set(bit)),
        })
    }

    /// True iff every bit the fingerprint activates under this shape is on.
    pub fn contains_fingerprint(&self, fingerprint: &Fingerprint) -> bool {
        fingerprint.activated_bits(self.shape()).all(|bit| self.is_set(bit))
    }

    /// Number of bit positions on in exactly one of the two filters.
    pub fn hamming_distance(&self, other: &BloomFilter) -> Result<u32> {
        self.check_shape(other)?;
        Ok(match (self, other) {
            (BloomFilter::BitSet(a), BloomFilter::BitSet(b)) => a.xor_cardinality(b),
            (BloomFilter::Compressed(a), BloomFilter::Compressed(b)) => a.xor_cardinality(b),
            _ => symmetric_difference_len(&self.set_bits(), &other.set_bits()),
        })
    }

    /// True iff the two filters share at least one on bit.
    pub fn intersects(&self, other: &BloomFilter) -> Result<bool> {
        self.check_shape(other)?;
        Ok(match (self, other) {
            (BloomFilter::BitSet(a), BloomFilter::BitSet(b)) => a.intersects(b),
            _ => other.set_bits().into_iter().any(|bit| self.is_set(bit)),
        })
    }

    fn check_shape(&self, other: &BloomFilter) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::ShapeMismatch {
                expected: *self.shape(),
                actual: *other.shape(),
            });
        }
        Ok(())
    }

    fn inner(&self) -> &dyn Filter {
        match self {
            BloomFilter::BitSet(f) => f,
            BloomFilter::Counting(f) => f,
            BloomFilter::Compressed(f) => f,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Filter {
        match self {
            BloomFilter::BitSet(f) => f,
            BloomFilter::Counting(f) => f,
            BloomFilter::Compressed(f) => f,
        }
    }
}

impl Filter for BloomFilter {
    fn shape(&self) -> &Shape {
        self.inner().shape()
    }

    fn is_set(&self, bit: u32) -> bool {
        self.inner().is_set(bit)
    }

    fn set(&mut self, bit: u32) {
        self.inner_mut().set(bit)
    }

    fn set_bits(&self) -> Vec<u32> {
        self.inner().set_bits()
    }

    fn cardinality(&self) -> u32 {
        self.inner().cardinality()
    }

    fn clear(&mut self) {
        self.inner_mut().clear()
    }
}

/// Size of the symmetric difference of two ascending index lists.
fn symmetric_difference_len(a: &[u32], b: &[u32]) -> u32 {
    let (mut i, mut j, mut diff) = (0usize, 0usize, 0u32);
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            i += 1;
            j += 1;
        } else if a[i] < b[j] {
            diff += 1;
            i += 1;
        } else {
            diff += 1;
            j += 1;
        }
    }
    diff + (a.len() - i) as u32 + (b.len() - j) as u32
}
