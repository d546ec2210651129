use crate::bloom::BloomFilter;
use crate::shape::Shape;

/// Bounded LRU of filters derived for different shapes.
///
/// A bucket's derived filter depends only on its fingerprint and the
/// shape it is projected into, so a miss just recomputes it. Entries are
/// kept most-recent-first; the tail is evicted once `capacity` is reached.
/// A capacity of 0 caches nothing.
#[derive(Debug, Clone)]
pub struct FilterCache {
    entries: Vec<(Shape, BloomFilter)>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl FilterCache {
    pub fn new(capacity: usize) -> Self {
        FilterCache {
            entries: Vec::with_capacity(capacity),
            capacity,
            hits: 0,
            misses: 0,
        }
    }

    /// Run `f` against the filter for `shape`, building it with `build` on
    /// a miss.
    pub fn with_filter<R>(
        &mut self,
        shape: &Shape,
        build: impl FnOnce() -> BloomFilter,
        f: impl FnOnce(&BloomFilter) -> R,
    ) -> R {
        if let Some(idx) = self.entries.iter().position(|(s, _)| s == shape) {
            self.hits += 1;
            // Move to front
            let entry = self.entries.remove(idx);
            self.entries.insert(0, entry);
            return f(&self.entries[0].1);
        }

        self.misses += 1;
        let filter = build();
        if self.capacity == 0 {
            return f(&filter);
        }
        if self.entries.len() >= self.capacity {
            self.entries.pop();
        }
        self.entries.insert(0, (*shape, filter));
        f(&self.entries[0].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
