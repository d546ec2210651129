pub mod block;
pub mod free_list;

use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::config::{Options, SyncPolicy};
use crate::error::{Error, Result};
use crate::types::Position;

pub use block::{BlockHeader, HEADER_SIZE, MIN_PAYLOAD};
pub use free_list::{FreeList, Span};

/// Block storage shared by several storage-backed collections. The mutex
/// serializes every free-list read-modify-write.
pub type SharedStorage = Arc<Mutex<BlockStorage>>;

/// Append-only file of chained blocks with free-space reuse.
///
/// ```text
///  0            block_size
///  ┌────────────┬──────────┬─────────────────┬──────────┬─────
///  │ free list  │ rec A #1 │ rec B           │ rec A #2 │ ...
///  │ record     │ next ────┼─────────────────┼─►        │
///  └────────────┴──────────┴─────────────────┴──────────┴─────
/// ```
///
/// A record is a singly linked chain of blocks; callers only ever hold the
/// position of its first block. Deleted blocks go to the free list and are
/// handed out whole (first fit) before the file grows. The free list itself
/// is a record at offset 0, rewritten after every change to it.
pub struct BlockStorage {
    /// Path to the backing file (for debugging/error messages).
    path: PathBuf,
    /// Open file handle. RefCell so reads can seek through `&self`.
    file: RefCell<File>,
    /// Logical end of file: where the next grown block starts.
    file_len: u64,
    /// Upper bound for a block grown at the end of the file.
    block_size: usize,
    free: FreeList,
    sync_policy: SyncPolicy,
    writes_since_sync: usize,
}

impl BlockStorage {
    /// Create (or truncate) a storage file holding only an empty free list.
    pub fn create(path: &Path, options: &Options) -> Result<Self> {
        options.validate()?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let mut storage = BlockStorage {
            path: path.to_path_buf(),
            file: RefCell::new(file),
            file_len: 0,
            block_size: options.block_size,
            free: FreeList::new(),
            sync_policy: options.sync_policy,
            writes_since_sync: 0,
        };

        // Free list record at the well-known position 0
        let root = storage.grow(storage.max_payload())?;
        debug_assert_eq!(root.offset, Position::FREE_LIST.offset());
        storage.write_block(root.offset, &BlockHeader { length: root.length, data_used: 0, next: 0 }, &[])?;
        storage.sync()?;

        debug!(path = %storage.path.display(), block_size = storage.block_size, "created block storage");
        Ok(storage)
    }

    /// Open an existing storage file and load its free list.
    pub fn open(path: &Path, options: &Options) -> Result<Self> {
        options.validate()?;
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let file_len = file.metadata()?.len();

        let mut storage = BlockStorage {
            path: path.to_path_buf(),
            file: RefCell::new(file),
            file_len,
            block_size: options.block_size,
            free: FreeList::new(),
            sync_policy: options.sync_policy,
            writes_since_sync: 0,
        };

        let record = storage.read(Position::FREE_LIST)?;
        let free = FreeList::decode(&record)?;
        for span in free.spans() {
            if span.offset + span.length > file_len {
                return Err(Error::CorruptChain {
                    position: span.offset,
                    reason: format!("free span of {} bytes runs past end of file {file_len}", span.length),
                });
            }
        }
        storage.free = free;

        debug!(
            path = %storage.path.display(),
            file_len,
            free_spans = storage.free.len(),
            "opened block storage"
        );
        Ok(storage)
    }

    /// Open `path` if it exists, otherwise create it.
    pub fn open_or_create(path: &Path, options: &Options) -> Result<Self> {
        if path.exists() {
            Self::open(path, options)
        } else {
            Self::create(path, options)
        }
    }

    /// Wrap into the shared, mutex-guarded form.
    pub fn into_shared(self) -> SharedStorage {
        Arc::new(Mutex::new(self))
    }

    /// Store `data` as a new record and return its position.
    ///
    /// Blocks come from the free list first (lowest offset that fits the
    /// next chunk), then from growing the file.
    pub fn append(&mut self, data: &[u8]) -> Result<Position> {
        let free_before = self.free.len();

        let first = self.allocate(data.len())?;
        let mut current = first;
        let mut remaining = data;
        loop {
            let take = current.capacity().min(remaining.len());
            let (now, rest) = remaining.split_at(take);
            remaining = rest;

            let next = if remaining.is_empty() {
                None
            } else {
                Some(self.allocate(remaining.len())?)
            };
            let header = BlockHeader {
                length: current.length,
                data_used: take as u64,
                next: next.map_or(0, |span| span.offset),
            };
            self.write_block(current.offset, &header, now)?;

            match next {
                Some(span) => current = span,
                None => break,
            }
        }

        if self.free.len() != free_before {
            self.persist_free_list()?;
        }
        self.after_write()?;

        trace!(position = first.offset, len = data.len(), "appended record");
        Ok(Position(first.offset))
    }

    /// Overwrite the record at `position` in place.
    ///
    /// The existing chain is reused block by block. Leftover blocks of a
    /// longer old chain go to the free list; a longer payload gets extra
    /// blocks linked on.
    pub fn write(&mut self, position: Position, data: &[u8]) -> Result<()> {
        if position == Position::FREE_LIST {
            return Err(Error::InvalidPosition(position.offset()));
        }
        // Validate the whole old chain before touching anything
        let old_chain = self.chain(position.offset())?;
        let free_before = self.free.clone();

        let mut old = old_chain.into_iter();
        let mut current = match old.next() {
            Some((offset, header)) => Span { offset, length: header.length },
            None => return Err(Error::InvalidPosition(position.offset())),
        };
        let mut remaining = data;
        loop {
            let take = current.capacity().min(remaining.len());
            let (now, rest) = remaining.split_at(take);
            remaining = rest;

            if remaining.is_empty() {
                let header = BlockHeader { length: current.length, data_used: take as u64, next: 0 };
                self.write_block(current.offset, &header, now)?;
                for (offset, header) in old.by_ref() {
                    self.free.insert(Span { offset, length: header.length })?;
                }
                break;
            }

            let next = match old.next() {
                Some((offset, header)) => Span { offset, length: header.length },
                None => self.allocate(remaining.len())?,
            };
            let header = BlockHeader {
                length: current.length,
                data_used: take as u64,
                next: next.offset,
            };
            self.write_block(current.offset, &header, now)?;
            current = next;
        }

        if self.free != free_before {
            self.persist_free_list()?;
        }
        self.after_write()?;

        trace!(%position, len = data.len(), "rewrote record");
        Ok(())
    }

    /// Read the whole record starting at `position`.
    pub fn read(&self, position: Position) -> Result<Vec<u8>> {
        let chain = self.chain(position.offset())?;
        let total: u64 = chain.iter().map(|(_, header)| header.data_used).sum();
        let mut out = Vec::with_capacity(total as usize);

        let mut file = self.file.borrow_mut();
        for (offset, header) in chain {
            if header.data_used == 0 {
                continue;
            }
            let start = out.len();
            out.resize(start + header.data_used as usize, 0);
            file.seek(SeekFrom::Start(offset + HEADER_SIZE as u64))?;
            file.read_exact(&mut out[start..])?;
        }
        Ok(out)
    }

    /// Free every block of the record at `position`.
    pub fn delete(&mut self, position: Position) -> Result<()> {
        if position == Position::FREE_LIST {
            return Err(Error::InvalidPosition(position.offset()));
        }
        let chain = self.chain(position.offset())?;

        // Stage on a copy so a double free leaves the list untouched
        let mut free = self.free.clone();
        for (offset, header) in &chain {
            free.insert(Span { offset: *offset, length: header.length })?;
        }
        self.free = free;

        self.persist_free_list()?;
        self.after_write()?;

        trace!(%position, blocks = chain.len(), "deleted record");
        Ok(())
    }

    /// Flush and fsync the file now.
    pub fn sync(&mut self) -> Result<()> {
        let mut file = self.file.borrow_mut();
        file.flush()?;
        file.sync_all()?;
        self.writes_since_sync = 0;
        Ok(())
    }

    /// Free spans currently available, ascending offset.
    pub fn free_spans(&self) -> Vec<Span> {
        self.free.spans()
    }

    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mutating calls since the last fsync.
    pub fn writes_since_sync(&self) -> usize {
        self.writes_since_sync
    }

    /// Largest payload of a block grown at the end of the file.
    fn max_payload(&self) -> usize {
        self.block_size - HEADER_SIZE
    }

    /// Span for the next chunk of a record that still has `remaining` bytes.
    fn allocate(&mut self, remaining: usize) -> Result<Span> {
        let chunk = remaining.min(self.max_payload());
        if let Some(span) = self.free.take_first_fit(chunk) {
            trace!(offset = span.offset, length = span.length, chunk, "reusing free span");
            return Ok(span);
        }
        self.grow(chunk)
    }

    /// Extend the file by one block able to hold `chunk` payload bytes.
    fn grow(&mut self, chunk: usize) -> Result<Span> {
        let length = (HEADER_SIZE + chunk.max(MIN_PAYLOAD)) as u64;
        let span = Span { offset: self.file_len, length };
        self.file.borrow_mut().set_len(span.offset + length)?;
        self.file_len += length;
        trace!(offset = span.offset, length, "grew file");
        Ok(span)
    }

    fn write_block(&mut self, offset: u64, header: &BlockHeader, payload: &[u8]) -> Result<()> {
        debug_assert!(payload.len() <= header.capacity());
        let mut file = self.file.borrow_mut();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&header.encode())?;
        file.write_all(payload)?;
        Ok(())
    }

    fn read_header(&self, offset: u64) -> Result<BlockHeader> {
        if offset + HEADER_SIZE as u64 > self.file_len {
            return Err(Error::CorruptChain {
                position: offset,
                reason: format!("block header past end of file {}", self.file_len),
            });
        }
        let mut buf = [0u8; HEADER_SIZE];
        {
            let mut file = self.file.borrow_mut();
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut buf)?;
        }
        let header = BlockHeader::decode(offset, &buf)?;
        if offset + header.length > self.file_len {
            return Err(Error::CorruptChain {
                position: offset,
                reason: format!("block of {} bytes runs past end of file {}", header.length, self.file_len),
            });
        }
        Ok(header)
    }

    /// Walk and validate the chain starting at `offset`.
    ///
    /// A block sitting on the free list belongs to no live record, so
    /// reaching one (a stale or mid-chain handle) is `InvalidPosition`.
    fn chain(&self, offset: u64) -> Result<Vec<(u64, BlockHeader)>> {
        // Every block is at least one header long, so a longer walk must loop
        let max_blocks = self.file_len / HEADER_SIZE as u64 + 1;
        let mut chain = Vec::new();
        let mut current = offset;
        loop {
            if self.free.contains(current) {
                warn!(position = offset, block = current, "chain runs into a freed block");
                return Err(Error::InvalidPosition(current));
            }
            let header = self.read_header(current).inspect_err(|e| {
                warn!(position = offset, error = %e, "corrupt block chain");
            })?;
            chain.push((current, header));
            if header.next == 0 {
                return Ok(chain);
            }
            if chain.len() as u64 >= max_blocks {
                warn!(position = offset, "block chain loops");
                return Err(Error::CorruptChain {
                    position: current,
                    reason: "chain does not terminate".into(),
                });
            }
            current = header.next;
        }
    }

    /// Rewrite the free list record at offset 0.
    ///
    /// Its chain only ever grows, at the end of the file and never from
    /// the free list, so persisting cannot change the list being persisted.
    /// Surplus blocks stay linked with `data_used = 0`.
    fn persist_free_list(&mut self) -> Result<()> {
        let bytes = self.free.encode();
        let mut blocks = self.chain(Position::FREE_LIST.offset())?;
        let mut remaining = bytes.as_slice();

        let mut i = 0;
        while i < blocks.len() {
            let (offset, header) = blocks[i];
            let take = header.capacity().min(remaining.len());
            let (now, rest) = remaining.split_at(take);
            remaining = rest;

            let next = if i + 1 < blocks.len() {
                blocks[i + 1].0
            } else if !remaining.is_empty() {
                let span = self.grow(remaining.len().min(self.max_payload()))?;
                blocks.push((span.offset, BlockHeader { length: span.length, data_used: 0, next: 0 }));
                span.offset
            } else {
                0
            };
            self.write_block(offset, &BlockHeader { length: header.length, data_used: take as u64, next }, now)?;
            i += 1;
        }
        trace!(spans = self.free.len(), "persisted free list");
        Ok(())
    }

    fn after_write(&mut self) -> Result<()> {
        self.writes_since_sync += 1;
        match self.sync_policy {
            SyncPolicy::EveryWrite => self.sync()?,
            SyncPolicy::EveryNWrites(n) => {
                if self.writes_since_sync >= n {
                    self.sync()?;
                }
            }
            SyncPolicy::Manual => {}
        }
        Ok(())
    }
}
