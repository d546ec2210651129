use crate::bloom::{BloomFilter, Filter, FilterKind};
use crate::hash::{Digest, Fingerprint};
use crate::shape::Shape;

/// Convenience builder for query filters.
///
/// Usage:
/// 1. Create a builder for the shape the filter will be compared under
/// 2. Call add_fingerprint()/add_content() for everything the query covers
/// 3. Call build() to get the final BloomFilter
pub struct BloomFilterBuilder {
    filter: BloomFilter,
}

impl BloomFilterBuilder {
    /// Start an empty bit-set filter of `shape`.
    pub fn new(shape: Shape) -> Self {
        BloomFilterBuilder {
            filter: BloomFilter::new(FilterKind::BitSet, shape),
        }
    }

    /// Switch representation. Bits already added are carried over.
    pub fn kind(mut self, kind: FilterKind) -> Self {
        if kind != self.filter.kind() {
            let mut filter = BloomFilter::new(kind, *self.filter.shape());
            for bit in self.filter.set_bits() {
                filter.set(bit);
            }
            self.filter = filter;
        }
        self
    }

    pub fn add_fingerprint(mut self, fingerprint: &Fingerprint) -> Self {
        self.filter.merge_fingerprint(fingerprint);
        self
    }

    pub fn add_content(self, content: &[u8], digest: &dyn Digest) -> Self {
        let fingerprint = Fingerprint::from_content(content, digest);
        self.add_fingerprint(&fingerprint)
    }

    /// Finalize and return the bloom filter.
    pub fn build(self) -> BloomFilter {
        self.filter
    }
}
