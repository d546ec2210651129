use std::sync::Arc;

use tracing::trace;

use crate::bloom::{BloomFilter, BloomFilterBuilder, Filter};
use crate::config::Options;
use crate::error::Result;
use crate::hash::{ContentFingerprinter, Fingerprint, Fingerprinter};
use crate::index::BucketIndex;
use crate::shape::Shape;
use crate::stats::CollectionStats;
use crate::types::InsertOutcome;

/// A gate Bloom filter in front of a bucket index.
///
/// Invariants every implementation keeps:
/// - the gate is the OR of every fingerprint inserted since the last
///   `clear()`. Removal never retracts bits, so removed items keep
///   producing gate hits (accepted false positives).
/// - `stats().live_count()` equals the number of items held.
/// - `is_full()` is a soft signal. A full collection still accepts items,
///   its false positive rate just climbs past the shape's target.
pub trait GatedCollection<T> {
    fn shape(&self) -> &Shape;

    fn gate(&self) -> &BloomFilter;

    fn stats(&self) -> &CollectionStats;

    /// Fingerprint `item` the way this collection indexes it.
    fn fingerprint(&self, item: &T) -> Fingerprint;

    /// Insert with a precomputed fingerprint: merge the gate, index the
    /// item, count the insert.
    fn insert(&mut self, fingerprint: Fingerprint, item: T) -> Result<InsertOutcome>;

    /// Remove one item equal to `item`. The gate is left untouched.
    fn remove(&mut self, item: &T) -> Result<bool>;

    /// Items whose bucket filter is contained in `query`. May include false
    /// positives, never misses a match.
    fn candidates(&self, query: &BloomFilter) -> Result<Vec<T>>;

    /// Items stored under exactly `fingerprint`.
    fn exact_matches(&self, fingerprint: &Fingerprint) -> Result<Vec<T>>;

    /// Empty the gate, the index and the stats.
    fn clear(&mut self) -> Result<()>;

    fn add(&mut self, item: T) -> Result<InsertOutcome> {
        let fingerprint = self.fingerprint(&item);
        self.insert(fingerprint, item)
    }

    fn len(&self) -> u64 {
        self.stats().live_count()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_full(&self) -> bool {
        self.len() >= self.shape().number_of_items() as u64
    }

    /// Approximate: does the gate contain every bit of `query`?
    fn matches(&self, query: &BloomFilter) -> Result<bool> {
        self.gate().contains(query)
    }

    /// Approximate: could `item` have been inserted?
    fn might_contain(&self, item: &T) -> bool {
        self.gate().contains_fingerprint(&self.fingerprint(item))
    }

    /// Query filter holding just `item`, in this collection's shape.
    fn item_filter(&self, item: &T) -> BloomFilter {
        BloomFilterBuilder::new(*self.shape())
            .kind(self.gate().kind())
            .add_fingerprint(&self.fingerprint(item))
            .build()
    }
}

/// In-memory gated collection.
pub struct BloomCollection<T> {
    shape: Shape,
    gate: BloomFilter,
    stats: CollectionStats,
    index: BucketIndex<T>,
    fingerprinter: Arc<dyn Fingerprinter<T>>,
}

impl<T> BloomCollection<T> {
    pub fn new(shape: Shape, fingerprinter: Arc<dyn Fingerprinter<T>>) -> Self {
        Self::with_options(shape, fingerprinter, &Options::default())
    }

    pub fn with_options(shape: Shape, fingerprinter: Arc<dyn Fingerprinter<T>>, options: &Options) -> Self {
        BloomCollection {
            shape,
            gate: BloomFilter::new(options.filter_kind, shape),
            stats: CollectionStats::new(),
            index: BucketIndex::new(options.filter_kind, options.filter_cache_capacity),
            fingerprinter,
        }
    }

    /// Collection of byte-like items fingerprinted with the default digest.
    pub fn content(shape: Shape) -> Self
    where
        T: AsRef<[u8]>,
    {
        Self::new(shape, Arc::new(ContentFingerprinter::default()))
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn gate(&self) -> &BloomFilter {
        &self.gate
    }

    pub fn stats(&self) -> &CollectionStats {
        &self.stats
    }

    pub fn index(&self) -> &BucketIndex<T> {
        &self.index
    }

    pub fn fingerprinter(&self) -> &Arc<dyn Fingerprinter<T>> {
        &self.fingerprinter
    }

    /// Borrowing variant of `exact_matches`.
    pub fn iter_exact_matches<'a>(&'a self, fingerprint: &'a Fingerprint) -> impl Iterator<Item = &'a T> + 'a {
        // Gate miss means the fingerprint was never inserted
        let hit = self.gate.contains_fingerprint(fingerprint);
        self.index
            .exact_matches(fingerprint)
            .filter(move |_| hit)
    }

    /// Borrowing variant of `candidates`.
    pub fn iter_candidates<'a>(&'a self, query: &'a BloomFilter) -> Result<impl Iterator<Item = &'a T> + 'a> {
        let possible = query.shape() != &self.shape || self.gate.intersects(query)?;
        Ok(self.index.candidates(query).filter(move |_| possible))
    }

    /// Rebuild state from already-indexed content: used when a persisted
    /// snapshot is loaded.
    pub(crate) fn restore(&mut self, fingerprint: Fingerprint, item: T) {
        self.gate.merge_fingerprint(&fingerprint);
        self.index.insert(fingerprint, item);
        self.stats.record_insert();
    }

    /// Gate and stats as they are now.
    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            gate: self.gate.clone(),
            stats: self.stats,
        }
    }

    /// Take back an insert of `item` made after `checkpoint` was taken.
    pub(crate) fn undo_insert(&mut self, checkpoint: Checkpoint, fingerprint: &Fingerprint, item: &T)
    where
        T: PartialEq,
    {
        self.index.remove(fingerprint, item);
        self.gate = checkpoint.gate;
        self.stats = checkpoint.stats;
    }

    /// Put back an item removed while the stats read `stats`.
    pub(crate) fn undo_remove(&mut self, stats: CollectionStats, fingerprint: Fingerprint, item: T) {
        self.index.insert(fingerprint, item);
        self.stats = stats;
    }
}

/// Saved gate and stats for rolling back one insert.
pub(crate) struct Checkpoint {
    gate: BloomFilter,
    stats: CollectionStats,
}

impl<T: Clone + PartialEq> GatedCollection<T> for BloomCollection<T> {
    fn shape(&self) -> &Shape {
        &self.shape
    }

    fn gate(&self) -> &BloomFilter {
        &self.gate
    }

    fn stats(&self) -> &CollectionStats {
        &self.stats
    }

    fn fingerprint(&self, item: &T) -> Fingerprint {
        self.fingerprinter.fingerprint(item)
    }

    fn insert(&mut self, fingerprint: Fingerprint, item: T) -> Result<InsertOutcome> {
        self.gate.merge_fingerprint(&fingerprint);
        let outcome = self.index.insert(fingerprint, item);
        self.stats.record_insert();
        trace!(%fingerprint, ?outcome, live = self.stats.live_count(), "inserted item");
        Ok(outcome)
    }

    fn remove(&mut self, item: &T) -> Result<bool> {
        let fingerprint = self.fingerprinter.fingerprint(item);
        let removed = self.index.remove(&fingerprint, item);
        if removed {
            self.stats.record_delete();
        }
        Ok(removed)
    }

    fn candidates(&self, query: &BloomFilter) -> Result<Vec<T>> {
        Ok(self.iter_candidates(query)?.cloned().collect())
    }

    fn exact_matches(&self, fingerprint: &Fingerprint) -> Result<Vec<T>> {
        Ok(self.iter_exact_matches(fingerprint).cloned().collect())
    }

    fn clear(&mut self) -> Result<()> {
        self.gate.clear();
        self.index.clear();
        self.stats.reset();
        Ok(())
    }
}
