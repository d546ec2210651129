use crate::bloom::FilterKind;
use crate::error::{Error, Result};
use crate::hash::DEFAULT_DIGEST;
use crate::storage::block::{HEADER_SIZE, MIN_PAYLOAD};

/// Controls when block storage is fsync'd to disk.
///
/// Trade-off: durability vs throughput.
///   - EveryWrite: last completed write is always durable, slowest
///   - EveryNWrites: lose up to N mutating calls on crash
///   - Manual: caller decides via `BlockStorage::sync()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// fsync after every append/write/delete.
    EveryWrite,
    /// fsync every N mutating calls.
    EveryNWrites(usize),
    /// Never fsync implicitly.
    Manual,
}

/// How a partitioned table picks the bucket for a new item.
///
/// `MinHammingDistance` groups similar fingerprints, which keeps each
/// gate sparse for related content. It is a heuristic, not a proven
/// optimum for false-positive rate, so the alternatives stay available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlacementPolicy {
    /// Non-full bucket whose gate is closest to the item's filter.
    #[default]
    MinHammingDistance,
    /// Non-full bucket with the fewest live items.
    LeastLoaded,
    /// First non-full bucket in table order.
    FirstAvailable,
}

/// Tuning knobs shared by collections, tables and block storage.
#[derive(Debug, Clone)]
pub struct Options {
    /// Upper bound of a block grown at the end of the file, header included.
    pub block_size: usize,
    /// fsync cadence for block storage.
    pub sync_policy: SyncPolicy,
    /// Variant used for gates and derived filters.
    pub filter_kind: FilterKind,
    /// Derived filters cached per bucket (0 disables the cache).
    pub filter_cache_capacity: usize,
    /// Let a partitioned table append buckets instead of failing.
    pub auto_grow: bool,
    /// Buckets a partitioned table starts with.
    pub initial_buckets: usize,
    /// Bucket selection for `PartitionedTable::put`.
    pub placement: PlacementPolicy,
    /// Persist a storage-backed collection after every mutation.
    pub write_through: bool,
    /// Registry name of the digest used by content fingerprinters.
    pub digest: String,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            block_size: 4096,
            sync_policy: SyncPolicy::EveryWrite,
            filter_kind: FilterKind::BitSet,
            filter_cache_capacity: 2,
            auto_grow: true,
            initial_buckets: 1,
            placement: PlacementPolicy::MinHammingDistance,
            write_through: true,
            digest: DEFAULT_DIGEST.to_string(),
        }
    }
}

impl Options {
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_sync_policy(mut self, policy: SyncPolicy) -> Self {
        self.sync_policy = policy;
        self
    }

    pub fn with_filter_kind(mut self, kind: FilterKind) -> Self {
        self.filter_kind = kind;
        self
    }

    pub fn with_filter_cache_capacity(mut self, capacity: usize) -> Self {
        self.filter_cache_capacity = capacity;
        self
    }

    pub fn with_auto_grow(mut self, auto_grow: bool) -> Self {
        self.auto_grow = auto_grow;
        self
    }

    pub fn with_initial_buckets(mut self, buckets: usize) -> Self {
        self.initial_buckets = buckets;
        self
    }

    pub fn with_placement(mut self, placement: PlacementPolicy) -> Self {
        self.placement = placement;
        self
    }

    pub fn with_write_through(mut self, write_through: bool) -> Self {
        self.write_through = write_through;
        self
    }

    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = digest.into();
        self
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<()> {
        if self.block_size < HEADER_SIZE + MIN_PAYLOAD {
            return Err(Error::Config(format!(
                "block_size {} is below the minimum of {}",
                self.block_size,
                HEADER_SIZE + MIN_PAYLOAD
            )));
        }
        if self.block_size > i64::MAX as usize {
            return Err(Error::Config("block_size does not fit a block header".into()));
        }
        if self.sync_policy == SyncPolicy::EveryNWrites(0) {
            return Err(Error::Config("EveryNWrites needs a positive batch".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Options::default().validate().is_ok());
    }

    #[test]
    fn tiny_block_rejected() {
        let opts = Options::default().with_block_size(HEADER_SIZE);
        assert!(matches!(opts.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn zero_batch_rejected() {
        let opts = Options::default().with_sync_policy(SyncPolicy::EveryNWrites(0));
        assert!(opts.validate().is_err());
    }
}
