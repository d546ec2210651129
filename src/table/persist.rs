use std::sync::Arc;

use tracing::debug;

use crate::codec::{Codec, get_i64};
use crate::collection::GatedCollection;
use crate::config::Options;
use crate::error::{Error, Result};
use crate::file::BloomFile;
use crate::hash::Fingerprinter;
use crate::shape::Shape;
use crate::storage::SharedStorage;
use crate::types::Position;

use super::{FileBuckets, FileTable};

impl<T: Codec + Clone + PartialEq + 'static> FileTable<T> {
    /// Empty storage-backed table; buckets are appended to `storage`.
    pub fn create(
        storage: SharedStorage,
        shape: Shape,
        fingerprinter: Arc<dyn Fingerprinter<T>>,
        options: &Options,
    ) -> Result<Self> {
        Self::new(shape, FileBuckets::new(storage, fingerprinter, options), options)
    }

    /// Write the directory record: every bucket root, in bucket order.
    ///
    /// Format: `[root(8B, big-endian)]*`
    ///
    /// Pass the position of an earlier directory to rewrite it in place;
    /// buckets spawned since then are only reachable after a new save.
    pub fn save_directory(&mut self, storage: &SharedStorage, previous: Option<Position>) -> Result<Position> {
        let mut bytes = Vec::with_capacity(self.buckets.len() * 8);
        for bucket in &mut self.buckets {
            bucket.flush()?;
            bytes.extend_from_slice(&(bucket.root().offset() as i64).to_be_bytes());
        }

        let mut storage = storage.lock();
        let directory = match previous {
            Some(position) => {
                storage.write(position, &bytes)?;
                position
            }
            None => storage.append(&bytes)?,
        };
        debug!(%directory, buckets = self.buckets.len(), "saved table directory");
        Ok(directory)
    }

    /// Reopen a table from its directory record.
    ///
    /// Every bucket must have been created with `shape`; a bucket of any
    /// other shape fails with `ShapeMismatch`.
    pub fn open(
        storage: SharedStorage,
        directory: Position,
        shape: Shape,
        fingerprinter: Arc<dyn Fingerprinter<T>>,
        options: &Options,
    ) -> Result<Self> {
        let bytes = storage.lock().read(directory)?;
        if bytes.len() % 8 != 0 {
            return Err(Error::Corruption(format!(
                "table directory of {} bytes is not a list of positions",
                bytes.len()
            )));
        }

        let mut cursor = bytes.as_slice();
        let mut buckets = Vec::with_capacity(bytes.len() / 8);
        while !cursor.is_empty() {
            let root = get_i64(&mut cursor, "bucket root")?;
            if root <= 0 {
                return Err(Error::Corruption(format!("bucket root {root} in table directory")));
            }
            let bucket = BloomFile::open(
                Arc::clone(&storage),
                Position::from_offset(root as u64),
                Arc::clone(&fingerprinter),
                options,
            )?;
            if bucket.shape() != &shape {
                return Err(Error::ShapeMismatch {
                    expected: shape,
                    actual: *bucket.shape(),
                });
            }
            buckets.push(bucket);
        }

        debug!(%directory, buckets = buckets.len(), "opened table");
        let factory = FileBuckets::new(storage, fingerprinter, options);
        Ok(Self::from_buckets(shape, buckets, factory, options))
    }
}
