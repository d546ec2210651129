use std::collections::BTreeMap;

use crate::codec::get_i64;
use crate::error::{Error, Result};
use crate::storage::block::HEADER_SIZE;

/// A reclaimed block: file offset and total length (header included).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Span {
    pub offset: u64,
    pub length: u64,
}

impl Span {
    /// Payload bytes a block occupying this span can hold.
    pub fn capacity(&self) -> usize {
        (self.length as usize).saturating_sub(HEADER_SIZE)
    }

    fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// In-memory index of free spans, sorted by offset.
///
/// This is the source of truth for free space. It is serialized whole into
/// the free list record after every structural change; the file is never
/// re-walked to find holes.
///
/// Record format: repeated `[offset(8B)][length(8B)]`, big-endian signed,
/// no count prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreeList {
    spans: BTreeMap<u64, u64>,
}

impl FreeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a span to the list. Overlap with a span already present means
    /// a block is being freed twice, which is reported as a corrupt chain.
    pub fn insert(&mut self, span: Span) -> Result<()> {
        if let Some((&offset, &length)) = self.spans.range(..span.offset).next_back() {
            if offset + length > span.offset {
                return Err(overlap(span, Span { offset, length }));
            }
        }
        if let Some((&offset, &length)) = self.spans.range(span.offset..).next() {
            if offset < span.end() {
                return Err(overlap(span, Span { offset, length }));
            }
        }
        self.spans.insert(span.offset, span.length);
        Ok(())
    }

    /// Remove and return the lowest-offset span whose payload capacity is at
    /// least `min_capacity`. The span is handed out whole even when it is
    /// larger than needed.
    pub fn take_first_fit(&mut self, min_capacity: usize) -> Option<Span> {
        let found = self
            .spans
            .iter()
            .map(|(&offset, &length)| Span { offset, length })
            .find(|span| span.capacity() >= min_capacity)?;
        self.spans.remove(&found.offset);
        Some(found)
    }

    /// Whether a free span starts at `offset`.
    pub fn contains(&self, offset: u64) -> bool {
        self.spans.contains_key(&offset)
    }

    pub fn spans(&self) -> Vec<Span> {
        self.spans
            .iter()
            .map(|(&offset, &length)| Span { offset, length })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Total bytes held by free spans.
    pub fn free_bytes(&self) -> u64 {
        self.spans.values().sum()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.spans.len() * 16);
        for (&offset, &length) in &self.spans {
            buf.extend_from_slice(&(offset as i64).to_be_bytes());
            buf.extend_from_slice(&(length as i64).to_be_bytes());
        }
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() % 16 != 0 {
            return Err(Error::Corruption(format!(
                "free list record of {} bytes is not a whole number of spans",
                data.len()
            )));
        }
        let mut list = FreeList::new();
        let mut cursor = data;
        while !cursor.is_empty() {
            let offset = get_i64(&mut cursor, "free span offset")?;
            let length = get_i64(&mut cursor, "free span length")?;
            if offset <= 0 || length < HEADER_SIZE as i64 {
                return Err(Error::Corruption(format!(
                    "invalid free span ({offset}, {length})"
                )));
            }
            list.insert(Span {
                offset: offset as u64,
                length: length as u64,
            })?;
        }
        Ok(list)
    }
}

fn overlap(new: Span, existing: Span) -> Error {
    Error::CorruptChain {
        position: new.offset,
        reason: format!(
            "span of {} bytes overlaps free span at {} of {} bytes",
            new.length, existing.offset, existing.length
        ),
    }
}
