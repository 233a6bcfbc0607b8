//! Index block implementation for SSTable.
//!
//! The index block maps the last key of every data block to the block's
//! location, which lets a range scan skip blocks that end before its start.

use crate::error::{Error, Result};
use crate::mvcc::MvccKey;
use crate::sstable::block::{Block, BlockBuilder};
use crate::sstable::footer::BlockHandle;
use bytes::Bytes;

/// IndexEntry represents a single entry in the index block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// The last key in the data block
    pub key: MvccKey,
    /// Handle to the data block
    pub handle: BlockHandle,
}

impl IndexEntry {
    /// Create a new IndexEntry
    pub fn new(key: MvccKey, handle: BlockHandle) -> Self {
        Self { key, handle }
    }
}

/// Decoded index of an SSTable.
#[derive(Debug, Clone)]
pub struct IndexBlock {
    entries: Vec<IndexEntry>,
}

impl IndexBlock {
    /// Decode an IndexBlock from raw block data.
    ///
    /// Fails if a key does not decode or the entries are not strictly
    /// ascending.
    pub fn new(data: Bytes) -> Result<Self> {
        let block = Block::new(data)?;
        let mut iter = block.iter();
        let mut entries: Vec<IndexEntry> = Vec::new();

        while iter.advance()? {
            let key = MvccKey::decode(iter.key())
                .ok_or_else(|| Error::corruption("Undecodable index key"))?;
            let handle = BlockHandle::decode(iter.value())?;

            if let Some(prev) = entries.last() {
                if prev.key >= key {
                    return Err(Error::corruption(format!(
                        "Index keys out of order: {} then {}",
                        prev.key, key
                    )));
                }
            }
            entries.push(IndexEntry::new(key, handle));
        }

        Ok(Self { entries })
    }

    /// Returns the position of the first data block that may hold a key at
    /// or after `user_key`. Equal to `len()` if every block ends before it.
    pub fn seek(&self, user_key: &[u8]) -> usize {
        self.entries.partition_point(|entry| entry.key.key.as_slice() < user_key)
    }

    /// Get the entry at `position`
    pub fn get(&self, position: usize) -> Option<&IndexEntry> {
        self.entries.get(position)
    }

    /// All index entries in order
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Get the number of data blocks
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// IndexBlockBuilder builds an index block.
pub struct IndexBlockBuilder {
    builder: BlockBuilder,
}

impl IndexBlockBuilder {
    /// Create a new IndexBlockBuilder
    pub fn new() -> Self {
        Self { builder: BlockBuilder::new(1) }
    }

    /// Add an index entry
    pub fn add_entry(&mut self, entry: &IndexEntry) {
        self.builder.add(&entry.key.encode(), &entry.handle.encode());
    }

    /// Finish building and return the block data
    pub fn finish(self) -> Bytes {
        self.builder.finish()
    }
}

impl Default for IndexBlockBuilder {
    fn default() -> Self {
        Self::new()
    }
}
