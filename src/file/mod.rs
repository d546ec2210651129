pub mod snapshot;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::bloom::BloomFilter;
use crate::codec::Codec;
use crate::collection::{BloomCollection, GatedCollection};
use crate::config::Options;
use crate::error::Result;
use crate::hash::{Fingerprint, Fingerprinter};
use crate::shape::Shape;
use crate::stats::CollectionStats;
use crate::storage::SharedStorage;
use crate::types::{InsertOutcome, Position};

/// Gated collection persisted as one snapshot record in block storage.
///
/// The working copy lives in memory. Every mutation rewrites the snapshot
/// in place when `write_through` is on; otherwise the record is only
/// updated by `flush()`. A write-through mutation whose snapshot write
/// fails is undone before the error is returned. Opening a file reads the record back and rebuilds
/// gate, index and stats from it.
///
/// The gate is not persisted: after a reopen it holds the bits of live
/// items only, so bits left behind by earlier removals are gone.
pub struct BloomFile<T> {
    storage: SharedStorage,
    root: Position,
    inner: BloomCollection<T>,
    write_through: bool,
    dirty: bool,
}

impl<T: Codec> BloomFile<T> {
    /// Start an empty collection and append its snapshot record.
    pub fn create(
        storage: SharedStorage,
        shape: Shape,
        fingerprinter: Arc<dyn Fingerprinter<T>>,
        options: &Options,
    ) -> Result<Self> {
        let inner = BloomCollection::with_options(shape, fingerprinter, options);
        let bytes = snapshot::encode_empty(&shape);
        let root = storage.lock().append(&bytes)?;
        debug!(%root, %shape, "created bloom file");
        Ok(BloomFile {
            storage,
            root,
            inner,
            write_through: options.write_through,
            dirty: false,
        })
    }

    /// Load the collection whose snapshot record starts at `root`.
    pub fn open(
        storage: SharedStorage,
        root: Position,
        fingerprinter: Arc<dyn Fingerprinter<T>>,
        options: &Options,
    ) -> Result<Self> {
        let bytes = storage.lock().read(root)?;
        let snapshot = snapshot::decode::<T>(&bytes)?;

        let mut inner = BloomCollection::with_options(snapshot.shape, fingerprinter, options);
        for (fingerprint, items) in snapshot.buckets {
            for item in items {
                inner.restore(fingerprint, item);
            }
        }
        debug!(%root, shape = %snapshot.shape, size = snapshot.size, "opened bloom file");

        Ok(BloomFile {
            storage,
            root,
            inner,
            write_through: options.write_through,
            dirty: false,
        })
    }

    /// Write the snapshot if anything changed since the last write.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let bytes = snapshot::encode(self.inner.shape(), self.inner.index())?;
        self.storage.lock().write(self.root, &bytes)?;
        self.dirty = false;
        debug!(root = %self.root, bytes = bytes.len(), "persisted bloom file");
        Ok(())
    }

    /// Delete the snapshot record, giving its blocks back to the free list.
    pub fn destroy(self) -> Result<()> {
        self.storage.lock().delete(self.root)
    }

    /// Persist a mutation already applied to the working copy. With
    /// write-through on, a failed write runs `undo` and returns the error.
    fn persist_or_undo(&mut self, undo: impl FnOnce(&mut BloomCollection<T>)) -> Result<()> {
        let was_dirty = self.dirty;
        self.dirty = true;
        if !self.write_through {
            return Ok(());
        }
        if let Err(e) = self.flush() {
            undo(&mut self.inner);
            self.dirty = was_dirty;
            warn!(root = %self.root, error = %e, "snapshot write failed, mutation undone");
            return Err(e);
        }
        Ok(())
    }
}

impl<T> BloomFile<T> {
    /// Position of the snapshot record; hand it to `open` later.
    pub fn root(&self) -> Position {
        self.root
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn collection(&self) -> &BloomCollection<T> {
        &self.inner
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }
}

impl<T: Codec + Clone + PartialEq> GatedCollection<T> for BloomFile<T> {
    fn shape(&self) -> &Shape {
        self.inner.shape()
    }

    fn gate(&self) -> &BloomFilter {
        self.inner.gate()
    }

    fn stats(&self) -> &CollectionStats {
        self.inner.stats()
    }

    fn fingerprint(&self, item: &T) -> Fingerprint {
        self.inner.fingerprint(item)
    }

    fn insert(&mut self, fingerprint: Fingerprint, item: T) -> Result<InsertOutcome> {
        if !self.write_through {
            let outcome = self.inner.insert(fingerprint, item)?;
            self.dirty = true;
            return Ok(outcome);
        }
        let checkpoint = self.inner.checkpoint();
        let kept = item.clone();
        let outcome = self.inner.insert(fingerprint, item)?;
        self.persist_or_undo(move |inner| inner.undo_insert(checkpoint, &fingerprint, &kept))?;
        Ok(outcome)
    }

    fn remove(&mut self, item: &T) -> Result<bool> {
        let stats = *self.inner.stats();
        if !self.inner.remove(item)? {
            return Ok(false);
        }
        let fingerprint = self.inner.fingerprint(item);
        let kept = item.clone();
        self.persist_or_undo(move |inner| inner.undo_remove(stats, fingerprint, kept))?;
        Ok(true)
    }

    fn candidates(&self, query: &BloomFilter) -> Result<Vec<T>> {
        self.inner.candidates(query)
    }

    fn exact_matches(&self, fingerprint: &Fingerprint) -> Result<Vec<T>> {
        self.inner.exact_matches(fingerprint)
    }

    fn clear(&mut self) -> Result<()> {
        if self.write_through {
            // Persist the empty record before dropping the contents
            let bytes = snapshot::encode_empty(self.inner.shape());
            self.storage.lock().write(self.root, &bytes)?;
            self.inner.clear()?;
            self.dirty = false;
            return Ok(());
        }
        self.inner.clear()?;
        self.dirty = true;
        Ok(())
    }
}
