pub mod bucket;

use std::collections::BTreeMap;

use crate::bloom::{BloomFilter, FilterKind};
use crate::hash::Fingerprint;
use crate::types::InsertOutcome;

pub use bucket::Bucket;

/// Sorted collision structure: fingerprint → every item that produced it.
///
/// ```text
///   (h1, h2) ascending
///   ┌──────────────┬─────────────────────┐
///   │ 0x03.., 0x91 │ [ "cat" ]           │
///   │ 0x7a.., 0x02 │ [ "dog", "god" ]    │ ← collision chain
///   │ 0xf0.., 0x44 │ [ "emu" ]           │
///   └──────────────┴─────────────────────┘
/// ```
///
/// Exact lookups go straight to one bucket. Candidate lookups walk every
/// bucket in fingerprint order and keep those whose derived filter sits
/// inside the query filter: more results than exact lookups, never fewer.
#[derive(Debug)]
pub struct BucketIndex<T> {
    buckets: BTreeMap<Fingerprint, Bucket<T>>,
    len: usize,
    filter_kind: FilterKind,
    cache_capacity: usize,
}

impl<T> BucketIndex<T> {
    /// Empty index whose buckets derive `filter_kind` filters and cache up
    /// to `cache_capacity` of them each.
    pub fn new(filter_kind: FilterKind, cache_capacity: usize) -> Self {
        BucketIndex {
            buckets: BTreeMap::new(),
            len: 0,
            filter_kind,
            cache_capacity,
        }
    }

    /// Add `item` under `fingerprint`, creating the bucket if needed.
    pub fn insert(&mut self, fingerprint: Fingerprint, item: T) -> InsertOutcome {
        self.len += 1;
        match self.buckets.get_mut(&fingerprint) {
            Some(bucket) => {
                bucket.push(item);
                InsertOutcome::AppendedToExisting
            }
            None => {
                let mut bucket = Bucket::new(fingerprint, self.filter_kind, self.cache_capacity);
                bucket.push(item);
                self.buckets.insert(fingerprint, bucket);
                InsertOutcome::NewBucket
            }
        }
    }

    /// Remove one item equal to `item` from the bucket of `fingerprint`.
    /// A bucket left empty is dropped from the index.
    pub fn remove(&mut self, fingerprint: &Fingerprint, item: &T) -> bool
    where
        T: PartialEq,
    {
        let Some(bucket) = self.buckets.get_mut(fingerprint) else {
            return false;
        };
        if !bucket.remove_one(item) {
            return false;
        }
        if bucket.is_empty() {
            self.buckets.remove(fingerprint);
        }
        self.len -= 1;
        true
    }

    /// Items whose fingerprint equals `fingerprint`.
    ///
    /// The index does not compare content: two different items sharing a
    /// fingerprint are both returned.
    pub fn exact_matches(&self, fingerprint: &Fingerprint) -> impl Iterator<Item = &T> {
        self.buckets
            .get(fingerprint)
            .into_iter()
            .flat_map(|bucket| bucket.items().iter())
    }

    /// Items of every bucket whose derived filter the query contains,
    /// in ascending fingerprint order.
    pub fn candidates<'a>(&'a self, query: &'a BloomFilter) -> impl Iterator<Item = &'a T> + 'a {
        self.buckets
            .values()
            .filter(move |bucket| bucket.matches(query))
            .flat_map(|bucket| bucket.items().iter())
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&Bucket<T>> {
        self.buckets.get(fingerprint)
    }

    /// First bucket whose fingerprint is `>= fingerprint`.
    pub fn ceiling(&self, fingerprint: &Fingerprint) -> Option<&Bucket<T>> {
        self.buckets.range(fingerprint..).next().map(|(_, bucket)| bucket)
    }

    /// Buckets in ascending fingerprint order.
    pub fn buckets(&self) -> impl Iterator<Item = &Bucket<T>> {
        self.buckets.values()
    }

    /// Total items across all buckets.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.len = 0;
    }
}

impl<T> Default for BucketIndex<T> {
    fn default() -> Self {
        BucketIndex::new(FilterKind::BitSet, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceiling_finds_next_bucket() {
        let mut index = BucketIndex::default();
        index.insert(Fingerprint::new(1, 5), "a");
        index.insert(Fingerprint::new(3, 0), "b");

        let next = index.ceiling(&Fingerprint::new(1, 6)).unwrap();
        assert_eq!(next.fingerprint(), &Fingerprint::new(3, 0));
        assert!(index.ceiling(&Fingerprint::new(3, 1)).is_none());
    }
}
