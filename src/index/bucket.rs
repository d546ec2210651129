use std::cell::RefCell;

use crate::bloom::{BloomFilter, Filter, FilterKind};
use crate::cache::FilterCache;
use crate::hash::Fingerprint;

/// One index entry: a fingerprint and every item that produced it.
///
/// Colliding items are a normal case, so `items` is a multiset kept in
/// insertion order. Buckets compare by fingerprint only.
#[derive(Debug)]
pub struct Bucket<T> {
    fingerprint: Fingerprint,
    items: Vec<T>,
    kind: FilterKind,
    /// Derived filters per query shape. Wrapped in RefCell so lookups
    /// through `&self` can fill it.
    derived: RefCell<FilterCache>,
}

impl<T> Bucket<T> {
    pub(crate) fn new(fingerprint: Fingerprint, kind: FilterKind, cache_capacity: usize) -> Self {
        Bucket {
            fingerprint,
            items: Vec::new(),
            kind,
            derived: RefCell::new(FilterCache::new(cache_capacity)),
        }
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn push(&mut self, item: T) {
        self.items.push(item);
    }

    /// Remove the first item equal to `item`.
    pub(crate) fn remove_one(&mut self, item: &T) -> bool
    where
        T: PartialEq,
    {
        match self.items.iter().position(|x| x == item) {
            Some(idx) => {
                self.items.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Whether the filter this bucket's fingerprint produces under the
    /// query's shape is a subset of the query.
    pub fn matches(&self, query: &BloomFilter) -> bool {
        let shape = *query.shape();
        self.derived.borrow_mut().with_filter(
            &shape,
            || BloomFilter::from_fingerprint(self.kind, shape, &self.fingerprint),
            |derived| matches!(query.contains(derived), Ok(true)),
        )
    }

    /// Derived-filter cache, exposed for inspection.
    pub fn cached_filters(&self) -> usize {
        self.derived.borrow().len()
    }
}

impl<T> PartialEq for Bucket<T> {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
    }
}

impl<T> Eq for Bucket<T> {}

impl<T> PartialOrd for Bucket<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Bucket<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.fingerprint.cmp(&other.fingerprint)
    }
}
