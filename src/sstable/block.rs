//! Data and index blocks.
//!
//! A block is a run of prefix-compressed entries followed by a restart
//! array. Every `restart_interval` entries the full key is written again so
//! a reader can start decoding there. Keys are opaque bytes at this level;
//! ordering is enforced by the [`SSTableBuilder`](super::SSTableBuilder).

use crate::error::{Error, Result};
use crate::sstable::coding::{get_varint32, put_varint32};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::ops::Range;

/// A decoded block.
///
/// Format:
/// ```text
/// [entry]*
/// [restart offset: u32 LE]*
/// [restart count: u32 LE]
///
/// entry := [shared: varint32][unshared: varint32][value_len: varint32]
///          [key suffix][value]
/// ```
/// `shared` is the length of the prefix reused from the previous key and is
/// always zero at a restart point.
#[derive(Debug, Clone)]
pub struct Block {
    data: Bytes,
    entries_end: usize,
    restarts: u32,
}

impl Block {
    /// Parses the restart array of `data`.
    pub fn new(data: Bytes) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::corruption(format!("block of {} bytes is too small", data.len())));
        }

        let mut tail = &data[data.len() - 4..];
        let restarts = tail.get_u32_le();
        let entries_end = (restarts as usize)
            .checked_mul(4)
            .and_then(|array_len| (data.len() - 4).checked_sub(array_len))
            .ok_or_else(|| {
                Error::corruption(format!("block restart count {} exceeds block size", restarts))
            })?;

        Ok(Self { data, entries_end, restarts })
    }

    /// Number of restart points.
    pub fn num_restarts(&self) -> u32 {
        self.restarts
    }

    /// Returns a cursor positioned before the first entry.
    pub fn iter(&self) -> BlockIterator {
        BlockIterator { block: self.clone(), offset: 0, key: Vec::new(), value: None }
    }
}

/// Accumulates entries into a block.
pub struct BlockBuilder {
    buffer: BytesMut,
    restarts: Vec<u32>,
    since_restart: usize,
    restart_interval: usize,
    last_key: Vec<u8>,
}

impl BlockBuilder {
    /// Creates a builder writing a restart point every `restart_interval`
    /// entries.
    pub fn new(restart_interval: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            restarts: vec![0],
            since_restart: 0,
            restart_interval: restart_interval.max(1),
            last_key: Vec::new(),
        }
    }

    /// Appends an entry.
    pub fn add(&mut self, key: &[u8], value: &[u8]) {
        let shared = if self.since_restart == self.restart_interval {
            self.restarts.push(self.buffer.len() as u32);
            self.since_restart = 0;
            0
        } else {
            self.last_key.iter().zip(key).take_while(|(a, b)| a == b).count()
        };

        put_varint32(&mut self.buffer, shared as u32);
        put_varint32(&mut self.buffer, (key.len() - shared) as u32);
        put_varint32(&mut self.buffer, value.len() as u32);
        self.buffer.put_slice(&key[shared..]);
        self.buffer.put_slice(value);

        self.last_key.truncate(shared);
        self.last_key.extend_from_slice(&key[shared..]);
        self.since_restart += 1;
    }

    /// Appends the restart array and returns the finished block.
    pub fn finish(mut self) -> Bytes {
        for &restart in &self.restarts {
            self.buffer.put_u32_le(restart);
        }
        self.buffer.put_u32_le(self.restarts.len() as u32);
        self.buffer.freeze()
    }

    /// Size the block would have if finished now.
    pub fn current_size(&self) -> usize {
        self.buffer.len() + 4 * (self.restarts.len() + 1)
    }

    /// Returns true if no entries were added.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Forward cursor over the entries of a [`Block`].
pub struct BlockIterator {
    block: Block,
    offset: usize,
    key: Vec<u8>,
    value: Option<Range<usize>>,
}

impl BlockIterator {
    /// Moves back before the first entry.
    pub fn seek_to_first(&mut self) {
        self.offset = 0;
        self.key.clear();
        self.value = None;
    }

    /// Moves to the next entry.
    ///
    /// Returns `Ok(false)` past the last entry and an error if the entry at
    /// the current position is malformed.
    pub fn advance(&mut self) -> Result<bool> {
        self.value = None;
        if self.offset >= self.block.entries_end {
            return Ok(false);
        }

        let mut input = &self.block.data[self.offset..self.block.entries_end];
        let shared = get_varint32(&mut input)? as usize;
        let unshared = get_varint32(&mut input)? as usize;
        let value_len = get_varint32(&mut input)? as usize;
        if shared > self.key.len() || input.len() < unshared + value_len {
            return Err(Error::corruption(format!(
                "malformed block entry at offset {}",
                self.offset
            )));
        }

        let suffix_start = self.block.entries_end - input.len();
        let value_start = suffix_start + unshared;
        self.key.truncate(shared);
        self.key.extend_from_slice(&self.block.data[suffix_start..value_start]);
        self.value = Some(value_start..value_start + value_len);
        self.offset = value_start + value_len;
        Ok(true)
    }

    /// Returns true if positioned on an entry.
    pub fn valid(&self) -> bool {
        self.value.is_some()
    }

    /// Key of the current entry; empty when not positioned on one.
    pub fn key(&self) -> &[u8] {
        if self.valid() {
            &self.key
        } else {
            &[]
        }
    }

    /// Value of the current entry; empty when not positioned on one.
    pub fn value(&self) -> &[u8] {
        match &self.value {
            Some(range) => &self.block.data[range.clone()],
            None => &[],
        }
    }
}
