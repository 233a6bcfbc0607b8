//! SSTable builder implementation.
//!
//! Builds an SSTable from a sequence of versioned key-value pairs added in
//! ascending [`MvccKey`] order. Producers of import files use this; the
//! import path itself only reads.

use crate::config::ImportOptions;
use crate::error::{Error, Result};
use crate::mvcc::MvccKey;
use crate::sstable::block::BlockBuilder;
use crate::sstable::footer::{BlockHandle, Footer};
use crate::sstable::index::{IndexBlockBuilder, IndexEntry};
use crate::sstable::properties::TableProperties;
use crate::sstable::{CompressionType, BLOCK_TRAILER_SIZE, DEFAULT_BLOCK_SIZE, FOOTER_SIZE};
use bytes::Bytes;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// SSTableBuilder builds an SSTable into any writer.
///
/// Usage:
/// ```no_run
/// use kvimport::mvcc::{MvccKey, Timestamp, Value};
/// use kvimport::sstable::SSTableBuilder;
///
/// let mut builder = SSTableBuilder::new("table.sst").unwrap();
/// let ts = Timestamp::new(100, 0);
/// builder.add(&MvccKey::new(b"key1".to_vec(), ts), Value::from_string("v1").raw_bytes()).unwrap();
/// builder.add(&MvccKey::new(b"key2".to_vec(), ts), Value::from_string("v2").raw_bytes()).unwrap();
/// builder.finish().unwrap();
/// ```
pub struct SSTableBuilder<W: Write = BufWriter<File>> {
    writer: W,
    data_block_builder: BlockBuilder,
    index_block_builder: IndexBlockBuilder,
    last_key: Option<MvccKey>,
    offset: u64,
    properties: TableProperties,
    block_size: usize,
    compression: CompressionType,
    pending_handle: Option<BlockHandle>,
}

impl SSTableBuilder<BufWriter<File>> {
    /// Create a new SSTableBuilder writing to a file at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::with_writer(BufWriter::new(file)))
    }
}

impl SSTableBuilder<Vec<u8>> {
    /// Create a new SSTableBuilder that builds the table in memory
    pub fn in_memory() -> Self {
        Self::with_writer(Vec::new())
    }

    /// Finish building and return the table contents
    pub fn finish_to_bytes(mut self) -> Result<Bytes> {
        self.write_trailing_blocks()?;
        Ok(Bytes::from(self.writer))
    }
}

impl<W: Write> SSTableBuilder<W> {
    /// Create a new SSTableBuilder writing to `writer`
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer,
            data_block_builder: BlockBuilder::new(16),
            index_block_builder: IndexBlockBuilder::new(),
            last_key: None,
            offset: 0,
            properties: TableProperties::default(),
            block_size: DEFAULT_BLOCK_SIZE,
            compression: CompressionType::None,
            pending_handle: None,
        }
    }

    /// Set the block size (default: 4KB)
    pub fn set_block_size(&mut self, size: usize) {
        self.block_size = size;
    }

    /// Set the compression type
    pub fn set_compression(&mut self, compression: CompressionType) {
        self.compression = compression;
    }

    /// Apply the block size and compression of `options`.
    ///
    /// Without this a builder writes uncompressed 4KB blocks.
    pub fn set_options(&mut self, options: &ImportOptions) {
        self.set_block_size(options.block_size);
        self.set_compression(options.compression);
    }

    /// Add a versioned key-value pair to the SSTable.
    ///
    /// Keys must be added in strictly ascending `MvccKey` order.
    pub fn add(&mut self, key: &MvccKey, value: &[u8]) -> Result<()> {
        if key.key.is_empty() {
            return Err(Error::invalid_argument("Key cannot be empty"));
        }

        if let Some(last) = &self.last_key {
            if key <= last {
                return Err(Error::invalid_argument(format!(
                    "Keys must be added in sorted order: {} after {}",
                    key, last
                )));
            }
        }

        if let Some(handle) = self.pending_handle.take() {
            self.add_index_entry(handle);
        }

        let encoded = key.encode();
        self.data_block_builder.add(&encoded, value);

        if self.properties.smallest_key.is_none() {
            self.properties.smallest_key = Some(encoded.clone());
        }
        self.properties.num_entries += 1;
        self.properties.raw_key_size += encoded.len() as u64;
        self.properties.raw_value_size += value.len() as u64;
        self.last_key = Some(key.clone());

        if self.data_block_builder.current_size() >= self.block_size {
            self.flush_data_block()?;
        }

        Ok(())
    }

    fn add_index_entry(&mut self, handle: BlockHandle) {
        if let Some(last) = &self.last_key {
            self.index_block_builder.add_entry(&IndexEntry::new(last.clone(), handle));
        }
    }

    /// Flush the current data block
    fn flush_data_block(&mut self) -> Result<()> {
        if self.data_block_builder.is_empty() {
            return Ok(());
        }

        let old_builder = std::mem::replace(&mut self.data_block_builder, BlockBuilder::new(16));
        let block_data = old_builder.finish();
        let compression = self.compression;
        let handle = self.write_block(&block_data, compression)?;
        self.properties.num_data_blocks += 1;
        self.pending_handle = Some(handle);
        Ok(())
    }

    /// Write a block followed by its compression type and checksum
    fn write_block(&mut self, data: &[u8], compression: CompressionType) -> Result<BlockHandle> {
        let contents = match compression {
            CompressionType::None => data.to_vec(),
            #[cfg(feature = "snappy")]
            CompressionType::Snappy => snap::raw::Encoder::new()
                .compress_vec(data)
                .map_err(|e| Error::internal(format!("Compression failed: {}", e)))?,
        };

        self.writer.write_all(&contents)?;
        self.writer.write_all(&[compression as u8])?;
        let checksum = crc32fast::hash(&contents);
        self.writer.write_all(&checksum.to_le_bytes())?;

        let size = contents.len() as u64 + BLOCK_TRAILER_SIZE as u64;
        let handle = BlockHandle::new(self.offset, size);
        self.offset += size;
        Ok(handle)
    }

    /// Write the last data block, properties, index and footer
    fn write_trailing_blocks(&mut self) -> Result<u64> {
        self.flush_data_block()?;

        if let Some(handle) = self.pending_handle.take() {
            self.add_index_entry(handle);
        }
        self.properties.largest_key = self.last_key.as_ref().map(MvccKey::encode);

        let properties_data = self.properties.encode()?;
        let properties_handle = self.write_block(&properties_data, CompressionType::None)?;

        let index_builder = std::mem::take(&mut self.index_block_builder);
        let index_data = index_builder.finish();
        let index_handle = self.write_block(&index_data, CompressionType::None)?;

        let footer = Footer::new(properties_handle, index_handle);
        self.writer.write_all(&footer.encode())?;
        self.writer.flush()?;

        Ok(self.offset + FOOTER_SIZE as u64)
    }

    /// Finish building the SSTable, returning the total file size.
    pub fn finish(mut self) -> Result<u64> {
        self.write_trailing_blocks()
    }

    /// Get the number of entries added
    pub fn num_entries(&self) -> u64 {
        self.properties.num_entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mvcc::{Timestamp, Value};
    use crate::sstable::SSTableReader;
    use tempfile::NamedTempFile;

    fn mk(key: &str, wall: u64) -> MvccKey {
        MvccKey::new(key.as_bytes().to_vec(), Timestamp::new(wall, 0))
    }

    #[test]
    fn test_sstable_builder_empty() {
        let builder = SSTableBuilder::in_memory();
        assert_eq!(builder.num_entries(), 0);
        let bytes = builder.finish_to_bytes().unwrap();
        assert!(bytes.len() >= FOOTER_SIZE);
    }

    #[test]
    fn test_sstable_builder_to_file() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut builder = SSTableBuilder::new(temp_file.path()).unwrap();

        builder.add(&mk("apple", 10), Value::from_string("red").raw_bytes()).unwrap();
        builder.add(&mk("banana", 10), Value::from_string("yellow").raw_bytes()).unwrap();
        assert_eq!(builder.num_entries(), 2);

        let size = builder.finish().unwrap();
        assert_eq!(std::fs::metadata(temp_file.path()).unwrap().len(), size);
    }

    #[test]
    fn test_sstable_builder_versions_newest_first() {
        let mut builder = SSTableBuilder::in_memory();
        builder.add(&mk("key", 20), b"new").unwrap();
        builder.add(&mk("key", 10), b"old").unwrap();

        // An older-then-newer sequence of the same key is out of order
        let result = builder.add(&mk("key", 15), b"mid");
        assert!(result.is_err());
    }

    #[test]
    fn test_sstable_builder_sorted_keys() {
        let mut builder = SSTableBuilder::in_memory();
        builder.add(&mk("a", 1), b"1").unwrap();
        builder.add(&mk("b", 1), b"2").unwrap();

        assert!(builder.add(&mk("a", 1), b"3").is_err());
        assert!(builder.add(&mk("b", 1), b"dup").is_err());
    }

    #[test]
    fn test_sstable_builder_empty_key() {
        let mut builder = SSTableBuilder::in_memory();
        assert!(builder.add(&mk("", 1), b"value").is_err());
    }

    #[test]
    fn test_sstable_builder_multiple_blocks() {
        let mut builder = SSTableBuilder::in_memory();
        builder.set_block_size(256);

        for i in 0..500 {
            let key = mk(&format!("key{:08}", i), 7);
            builder.add(&key, Value::from_string("payload").raw_bytes()).unwrap();
        }
        assert_eq!(builder.num_entries(), 500);
        let bytes = builder.finish_to_bytes().unwrap();
        assert!(bytes.len() > 256 * 4);
    }

    #[test]
    fn test_sstable_builder_set_options() {
        let build = |options: &ImportOptions| {
            let mut builder = SSTableBuilder::in_memory();
            builder.set_options(options);
            for i in 0..100 {
                let key = mk(&format!("key{:08}", i), 7);
                builder.add(&key, Value::from_string("payload").raw_bytes()).unwrap();
            }
            SSTableReader::from_bytes("t", builder.finish_to_bytes().unwrap()).unwrap()
        };

        let defaults = build(&ImportOptions::default());
        let small = build(&ImportOptions::default().block_size(64));
        assert!(small.num_blocks() > defaults.num_blocks());
        assert!(small.num_blocks() > 10);
        assert_eq!(small.iter().count(), 100);
    }

    #[cfg(feature = "snappy")]
    #[test]
    fn test_sstable_builder_snappy_shrinks_blocks() {
        let payload = Value::from_string(&"x".repeat(64));
        let build = |compression: CompressionType| {
            let mut builder = SSTableBuilder::in_memory();
            builder.set_options(&ImportOptions::default().compression(compression));
            for i in 0..200 {
                let key = mk(&format!("key{:08}", i), 7);
                builder.add(&key, payload.raw_bytes()).unwrap();
            }
            builder.finish_to_bytes().unwrap()
        };

        let plain = build(CompressionType::None);
        let snappy = build(CompressionType::Snappy);
        assert!(snappy.len() < plain.len());

        let reader = SSTableReader::from_bytes("snappy", snappy).unwrap();
        let values: Vec<Vec<u8>> = reader.iter().map(|kv| kv.unwrap().value).collect();
        assert_eq!(values.len(), 200);
        assert!(values.iter().all(|v| v.as_slice() == payload.raw_bytes()));
    }
}
