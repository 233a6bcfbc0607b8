//! SSTable reader implementation.
//!
//! The reader holds the whole table in memory as [`Bytes`], so the same code
//! serves tables read from a local file and tables fetched from any other
//! [`ExternalStorage`](crate::storage::ExternalStorage) backend.

use crate::error::{Error, Result};
use crate::mvcc::{MvccKey, MvccKeyValue};
use crate::sstable::block::{Block, BlockIterator};
use crate::sstable::footer::{BlockHandle, Footer};
use crate::sstable::index::IndexBlock;
use crate::sstable::properties::TableProperties;
use crate::sstable::{CompressionType, BLOCK_TRAILER_SIZE, FOOTER_SIZE};
use bytes::Bytes;
use std::path::Path;

/// SSTableReader provides read access to an SSTable.
///
/// Opening a table validates its structure: footer magic, index and
/// properties checksums, index ordering, block bounds, and agreement between
/// the properties and the index. Data block checksums are verified as the
/// blocks are read.
///
/// Usage:
/// ```no_run
/// use kvimport::sstable::SSTableReader;
///
/// let reader = SSTableReader::open("table.sst").unwrap();
/// for kv in reader.iter() {
///     let kv = kv.unwrap();
///     println!("{} => {} bytes", kv.key, kv.value.len());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SSTableReader {
    name: String,
    data: Bytes,
    index_block: IndexBlock,
    properties: TableProperties,
}

impl SSTableReader {
    /// Open an SSTable file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        Self::from_bytes(path.display().to_string(), Bytes::from(data))
    }

    /// Open an SSTable from its complete contents.
    ///
    /// `name` identifies the table in log messages.
    pub fn from_bytes(name: impl Into<String>, data: Bytes) -> Result<Self> {
        let name = name.into();
        if data.len() < FOOTER_SIZE {
            return Err(Error::corruption("File too small to be a valid SSTable"));
        }

        let footer_offset = (data.len() - FOOTER_SIZE) as u64;
        let footer = Footer::decode(&data[data.len() - FOOTER_SIZE..])?;

        let index_data = read_block(&data, &footer.index_handle, footer_offset)?;
        let index_block = IndexBlock::new(index_data)?;

        let properties_data = read_block(&data, &footer.properties_handle, footer_offset)?;
        let properties = TableProperties::decode(&properties_data)?;

        for entry in index_block.entries() {
            check_bounds(&entry.handle, footer.properties_handle.offset)?;
        }
        Self::check_properties(&index_block, &properties)?;

        log::debug!(
            "Opened SSTable {}: {} entries in {} blocks",
            name,
            properties.num_entries,
            index_block.len()
        );

        Ok(Self { name, data, index_block, properties })
    }

    fn check_properties(index: &IndexBlock, properties: &TableProperties) -> Result<()> {
        if properties.num_data_blocks != index.len() as u64 {
            return Err(Error::corruption(format!(
                "Properties claim {} data blocks, index has {}",
                properties.num_data_blocks,
                index.len()
            )));
        }
        if (properties.num_entries == 0) != index.is_empty() {
            return Err(Error::corruption("Entry count disagrees with index"));
        }

        let largest = properties.largest()?;
        let index_last = index.entries().last().map(|entry| entry.key.clone());
        if largest != index_last {
            return Err(Error::corruption("Largest key disagrees with index"));
        }
        if let (Some(smallest), Some(largest)) = (properties.smallest()?, largest) {
            if smallest > largest {
                return Err(Error::corruption("Smallest key sorts after largest key"));
            }
        }
        Ok(())
    }

    /// Name given to the table when it was opened
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table properties recorded by the builder
    pub fn properties(&self) -> &TableProperties {
        &self.properties
    }

    /// Get the number of data blocks
    pub fn num_blocks(&self) -> usize {
        self.index_block.len()
    }

    /// Get the table size in bytes
    pub fn file_size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Create an iterator over all entries
    pub fn iter(&self) -> SSTableIterator {
        SSTableIterator::new(self.clone(), Vec::new(), Vec::new())
    }

    /// Create an iterator over entries whose user key lies in `[start, end)`.
    ///
    /// An empty `end` means no upper bound.
    pub fn iter_range(&self, start: &[u8], end: &[u8]) -> SSTableIterator {
        SSTableIterator::new(self.clone(), start.to_vec(), end.to_vec())
    }

    fn read_data_block(&self, handle: &BlockHandle) -> Result<Block> {
        let contents = read_block(&self.data, handle, self.data.len() as u64)?;
        Block::new(contents)
    }
}

fn check_bounds(handle: &BlockHandle, limit: u64) -> Result<()> {
    match handle.end_offset() {
        Some(end) if end <= limit && handle.size >= BLOCK_TRAILER_SIZE as u64 => Ok(()),
        _ => Err(Error::corruption(format!(
            "Block at offset {} with size {} is out of bounds",
            handle.offset, handle.size
        ))),
    }
}

/// Read a block, verifying its checksum and decompressing it
fn read_block(data: &Bytes, handle: &BlockHandle, limit: u64) -> Result<Bytes> {
    check_bounds(handle, limit)?;

    // Layout: [data...][compression_type: 1 byte][checksum: 4 bytes]
    let start = handle.offset as usize;
    let trailer = start + handle.size as usize - BLOCK_TRAILER_SIZE;
    let contents = data.slice(start..trailer);
    let compression_type = data[trailer];
    let mut checksum_bytes = [0u8; 4];
    checksum_bytes.copy_from_slice(&data[trailer + 1..trailer + BLOCK_TRAILER_SIZE]);
    let stored_checksum = u32::from_le_bytes(checksum_bytes);

    let computed_checksum = crc32fast::hash(&contents);
    if computed_checksum != stored_checksum {
        return Err(Error::ChecksumMismatch { expected: stored_checksum, actual: computed_checksum });
    }

    let compression = CompressionType::from_u8(compression_type)
        .ok_or_else(|| Error::corruption("Invalid compression type"))?;

    match compression {
        CompressionType::None => Ok(contents),
        #[cfg(feature = "snappy")]
        CompressionType::Snappy => snap::raw::Decoder::new()
            .decompress_vec(&contents)
            .map(Bytes::from)
            .map_err(|e| Error::corruption(format!("Decompression failed: {}", e))),
    }
}

/// Iterator over the entries of an SSTable within a user key range.
///
/// Yields entries in ascending `MvccKey` order and fails with a corruption
/// error if the table is not actually sorted.
pub struct SSTableIterator {
    reader: SSTableReader,
    start: Vec<u8>,
    end: Vec<u8>,
    next_block: usize,
    block_iter: Option<BlockIterator>,
    last_key: Option<MvccKey>,
    done: bool,
}

impl SSTableIterator {
    fn new(reader: SSTableReader, start: Vec<u8>, end: Vec<u8>) -> Self {
        let next_block = reader.index_block.seek(&start);
        Self { reader, start, end, next_block, block_iter: None, last_key: None, done: false }
    }

    fn next_entry(&mut self) -> Result<Option<MvccKeyValue>> {
        loop {
            if self.block_iter.is_none() {
                let Some(entry) = self.reader.index_block.get(self.next_block) else {
                    return Ok(None);
                };
                let handle = entry.handle;
                self.next_block += 1;
                let block = self.reader.read_data_block(&handle)?;
                self.block_iter = Some(block.iter());
            }
            let Some(iter) = self.block_iter.as_mut() else {
                continue;
            };

            if !iter.advance()? {
                self.block_iter = None;
                continue;
            }

            let key = MvccKey::decode(iter.key())
                .ok_or_else(|| Error::corruption("Undecodable data key"))?;
            if let Some(last) = &self.last_key {
                if key <= *last {
                    return Err(Error::corruption(format!(
                        "Keys out of order: {} after {}",
                        key, last
                    )));
                }
            }
            self.last_key = Some(key.clone());

            if key.key < self.start {
                continue;
            }
            if !self.end.is_empty() && key.key >= self.end {
                return Ok(None);
            }
            return Ok(Some(MvccKeyValue::new(key, iter.value().to_vec())));
        }
    }
}

impl Iterator for SSTableIterator {
    type Item = Result<MvccKeyValue>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_entry() {
            Ok(Some(kv)) => Some(Ok(kv)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
