pub mod persist;

use std::sync::Arc;

use tracing::debug;

use crate::bloom::{BloomFilter, FilterKind};
use crate::codec::Codec;
use crate::collection::{BloomCollection, GatedCollection};
use crate::config::{Options, PlacementPolicy};
use crate::error::{Error, Result};
use crate::file::BloomFile;
use crate::hash::Fingerprinter;
use crate::shape::Shape;
use crate::storage::SharedStorage;

/// Builds the empty collections a partitioned table spreads items over.
pub trait BucketFactory<T, C> {
    /// Fingerprinter shared by every bucket this factory builds.
    fn fingerprinter(&self) -> Arc<dyn Fingerprinter<T>>;

    fn create(&mut self, shape: &Shape) -> Result<C>;
}

/// In-memory buckets.
pub struct MemoryBuckets<T> {
    fingerprinter: Arc<dyn Fingerprinter<T>>,
    options: Options,
}

impl<T> MemoryBuckets<T> {
    pub fn new(fingerprinter: Arc<dyn Fingerprinter<T>>, options: &Options) -> Self {
        MemoryBuckets {
            fingerprinter,
            options: options.clone(),
        }
    }
}

impl<T> BucketFactory<T, BloomCollection<T>> for MemoryBuckets<T> {
    fn fingerprinter(&self) -> Arc<dyn Fingerprinter<T>> {
        Arc::clone(&self.fingerprinter)
    }

    fn create(&mut self, shape: &Shape) -> Result<BloomCollection<T>> {
        Ok(BloomCollection::with_options(*shape, Arc::clone(&self.fingerprinter), &self.options))
    }
}

/// Storage-backed buckets: one snapshot record each, all in one file.
pub struct FileBuckets<T> {
    storage: SharedStorage,
    fingerprinter: Arc<dyn Fingerprinter<T>>,
    options: Options,
}

impl<T> FileBuckets<T> {
    pub fn new(storage: SharedStorage, fingerprinter: Arc<dyn Fingerprinter<T>>, options: &Options) -> Self {
        FileBuckets {
            storage,
            fingerprinter,
            options: options.clone(),
        }
    }
}

impl<T: Codec> BucketFactory<T, BloomFile<T>> for FileBuckets<T> {
    fn fingerprinter(&self) -> Arc<dyn Fingerprinter<T>> {
        Arc::clone(&self.fingerprinter)
    }

    fn create(&mut self, shape: &Shape) -> Result<BloomFile<T>> {
        BloomFile::create(
            Arc::clone(&self.storage),
            *shape,
            Arc::clone(&self.fingerprinter),
            &self.options,
        )
    }
}

/// Table of gated collections sized by one per-bucket shape.
///
/// `put` fingerprints the item once, picks a non-full bucket by the
/// configured [`PlacementPolicy`], and inserts there. When a bucket fills
/// up and auto-grow is on, a fresh bucket is appended so later puts always
/// find room. Without auto-grow a table with no room left fails with
/// `CapacityExhausted`.
///
/// Concurrent puts must be serialized by the caller; `&mut self` already
/// enforces that within safe code.
pub struct PartitionedTable<T, C> {
    shape: Shape,
    buckets: Vec<C>,
    factory: Box<dyn BucketFactory<T, C>>,
    fingerprinter: Arc<dyn Fingerprinter<T>>,
    placement: PlacementPolicy,
    filter_kind: FilterKind,
    auto_grow: bool,
}

/// Table of in-memory buckets.
pub type MemoryTable<T> = PartitionedTable<T, BloomCollection<T>>;

/// Table of storage-backed buckets.
pub type FileTable<T> = PartitionedTable<T, BloomFile<T>>;

impl<T, C: GatedCollection<T>> PartitionedTable<T, C> {
    /// Table with `options.initial_buckets` empty buckets.
    pub fn new(shape: Shape, factory: impl BucketFactory<T, C> + 'static, options: &Options) -> Result<Self> {
        let mut table = Self::from_buckets(shape, Vec::new(), factory, options);
        for _ in 0..options.initial_buckets {
            table.spawn()?;
        }
        Ok(table)
    }

    /// Table over existing buckets, e.g. reopened from storage.
    pub fn from_buckets(
        shape: Shape,
        buckets: Vec<C>,
        factory: impl BucketFactory<T, C> + 'static,
        options: &Options,
    ) -> Self {
        let fingerprinter = factory.fingerprinter();
        PartitionedTable {
            shape,
            buckets,
            factory: Box::new(factory),
            fingerprinter,
            placement: options.placement,
            filter_kind: options.filter_kind,
            auto_grow: options.auto_grow,
        }
    }

    /// Insert `item` and return the index of the bucket it landed in.
    pub fn put(&mut self, item: T) -> Result<usize> {
        // Step 1: fingerprint once
        let fingerprint = self.fingerprinter.fingerprint(&item);
        let query = BloomFilter::from_fingerprint(self.filter_kind, self.shape, &fingerprint);

        // Step 2: pick a bucket with room
        let idx = match self.select(&query)? {
            Some(idx) => idx,
            None if self.auto_grow => self.spawn()?,
            None => {
                return Err(Error::CapacityExhausted {
                    buckets: self.buckets.len(),
                });
            }
        };

        // Step 3: insert; keep spare capacity around
        self.buckets[idx].insert(fingerprint, item)?;
        if self.auto_grow && self.buckets[idx].is_full() {
            self.spawn()?;
        }
        Ok(idx)
    }

    /// Candidates from every bucket, in bucket order. Not deduplicated:
    /// an item stored twice is returned twice.
    pub fn candidates(&self, item: &T) -> Result<Vec<T>> {
        let query = self.item_filter(item);
        let mut out = Vec::new();
        for bucket in &self.buckets {
            out.extend(bucket.candidates(&query)?);
        }
        Ok(out)
    }

    /// Items stored under exactly `item`'s fingerprint, across buckets.
    pub fn exact_matches(&self, item: &T) -> Result<Vec<T>> {
        let fingerprint = self.fingerprinter.fingerprint(item);
        let mut out = Vec::new();
        for bucket in &self.buckets {
            out.extend(bucket.exact_matches(&fingerprint)?);
        }
        Ok(out)
    }

    /// Remove one copy of `item` from the first bucket holding it.
    pub fn remove(&mut self, item: &T) -> Result<bool> {
        for bucket in &mut self.buckets {
            if bucket.might_contain(item) && bucket.remove(item)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Approximate membership across all gates.
    pub fn might_contain(&self, item: &T) -> bool {
        self.buckets.iter().any(|bucket| bucket.might_contain(item))
    }

    /// Query filter holding just `item`, in the per-bucket shape.
    pub fn item_filter(&self, item: &T) -> BloomFilter {
        BloomFilter::from_fingerprint(self.filter_kind, self.shape, &self.fingerprinter.fingerprint(item))
    }

    /// Empty every bucket. The bucket count is kept.
    pub fn clear(&mut self) -> Result<()> {
        for bucket in &mut self.buckets {
            bucket.clear()?;
        }
        Ok(())
    }

    /// Live items across all buckets.
    pub fn len(&self) -> u64 {
        self.buckets.iter().map(|bucket| bucket.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn buckets(&self) -> &[C] {
        &self.buckets
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn placement(&self) -> PlacementPolicy {
        self.placement
    }

    /// Choose a non-full bucket for an item whose filter is `query`.
    fn select(&self, query: &BloomFilter) -> Result<Option<usize>> {
        let mut open = self
            .buckets
            .iter()
            .enumerate()
            .filter(|(_, bucket)| !bucket.is_full());

        match self.placement {
            PlacementPolicy::FirstAvailable => Ok(open.next().map(|(idx, _)| idx)),
            PlacementPolicy::LeastLoaded => Ok(open.min_by_key(|(_, bucket)| bucket.len()).map(|(idx, _)| idx)),
            PlacementPolicy::MinHammingDistance => {
                let mut best: Option<(usize, u32)> = None;
                for (idx, bucket) in open {
                    let distance = bucket.gate().hamming_distance(query)?;
                    // Strict less-than: ties go to the first bucket seen
                    if best.is_none_or(|(_, d)| distance < d) {
                        best = Some((idx, distance));
                    }
                }
                Ok(best.map(|(idx, _)| idx))
            }
        }
    }

    /// Append an empty bucket and return its index.
    fn spawn(&mut self) -> Result<usize> {
        let bucket = self.factory.create(&self.shape)?;
        self.buckets.push(bucket);
        debug!(buckets = self.buckets.len(), shape = %self.shape, "spawned bucket");
        Ok(self.buckets.len() - 1)
    }
}

impl<T: Clone + PartialEq + 'static> MemoryTable<T> {
    /// In-memory table; convenience over `new` with [`MemoryBuckets`].
    pub fn in_memory(shape: Shape, fingerprinter: Arc<dyn Fingerprinter<T>>, options: &Options) -> Result<Self> {
        Self::new(shape, MemoryBuckets::new(fingerprinter, options), options)
    }
}
