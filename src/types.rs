use std::fmt;

/// Opaque handle to a record in block storage: the file offset of the
/// record's first block.
///
/// Callers never interpret the number. They hand back whatever
/// `append` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position(pub(crate) u64);

impl Position {
    /// The reserved position of the free list record.
    pub const FREE_LIST: Position = Position(0);

    /// Raw file offset, for logging and persisted directories.
    pub fn offset(self) -> u64 {
        self.0
    }

    /// Rebuild a handle from a persisted offset.
    pub fn from_offset(offset: u64) -> Self {
        Position(offset)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Result of inserting an item into a bucket index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// First item with this fingerprint; a bucket was created.
    NewBucket,
    /// Fingerprint already present; the item joined its bucket.
    AppendedToExisting,
}
