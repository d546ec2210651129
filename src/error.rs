use std::io;

use thiserror::Error;

use crate::shape::Shape;

/// Unified error type for gated collections and the block store.
#[derive(Debug, Error)]
pub enum Error {
    /// Shape or options parameters that cannot produce a usable filter.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Two filters (or a filter and a fingerprint) built for different shapes.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: Shape, actual: Shape },

    /// IO error from disk operations. Never retried internally.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Partitioned table has no bucket with room and may not grow.
    #[error("no bucket space left in a table of {buckets} buckets")]
    CapacityExhausted { buckets: usize },

    /// A block header disagrees with the file bounds or the chain loops.
    #[error("corrupt block chain at offset {position}: {reason}")]
    CorruptChain { position: u64, reason: String },

    /// A decoded record is malformed (bad counts, truncated payload, ...).
    #[error("corruption: {0}")]
    Corruption(String),

    /// Digest name not present in the hash registry.
    #[error("unknown digest: {0}")]
    UnknownDigest(String),

    /// Position that callers may not address (e.g. the free list record).
    #[error("invalid record position: {0}")]
    InvalidPosition(u64),
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
