//! # Bloom-gated collections
//!
//! Collections that put a Bloom filter (the *gate*) in front of an index
//! of items keyed by content fingerprint, plus a block-chained file store
//! that persists them.
//!
//! ## Core idea
//! Most lookups against a large set are misses. A gate answers "definitely
//! not here" from a few bit tests, so only probable hits pay for walking
//! the index. Items sharing a fingerprint are kept together in one bucket,
//! which makes hash collisions visible instead of silently merged.
//!
//! ## Layers
//! - [`shape`], [`hash`], [`bloom`]: filter sizing, fingerprints, filters
//! - [`index`], [`collection`]: the bucket index and the gated collection
//! - [`table`]: several collections of one shape behind a placement policy
//! - [`storage`], [`file`]: chained blocks with a free list, and collections
//!   snapshotted into them

pub mod bloom;
pub mod cache;
pub mod codec;
pub mod collection;
pub mod config;
pub mod error;
pub mod file;
pub mod hash;
pub mod index;
pub mod shape;
pub mod stats;
pub mod storage;
pub mod table;
pub mod types;

// Public re-exports for the top-level API
pub use bloom::{BloomFilter, BloomFilterBuilder, Filter, FilterKind};
pub use codec::Codec;
pub use collection::{BloomCollection, GatedCollection};
pub use config::{Options, PlacementPolicy, SyncPolicy};
pub use error::{Error, Result};
pub use file::BloomFile;
pub use hash::{ContentFingerprinter, Fingerprint, Fingerprinter, HashRegistry};
pub use shape::Shape;
pub use stats::CollectionStats;
pub use storage::{BlockStorage, SharedStorage};
pub use table::{BucketFactory, FileBuckets, FileTable, MemoryBuckets, MemoryTable, PartitionedTable};
pub use types::{InsertOutcome, Position};
