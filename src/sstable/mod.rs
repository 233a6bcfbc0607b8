//! Immutable sorted table files.
//!
//! Tables are the externally produced input files of an import. Each entry
//! is an encoded [`MvccKey`](crate::mvcc::MvccKey) and the raw bytes of its
//! value, stored in ascending `MvccKey` order: user key ascending, newer
//! versions of a key first.
//!
//! ## File Format
//!
//! ```text
//! [Data Block 1]
//! ...
//! [Data Block N]
//! [Properties Block] // bincode-encoded TableProperties
//! [Index Block]      // Last key of every data block
//! [Footer: 48B]      // Handles of the properties and index blocks, magic
//! ```
//!
//! Every block carries a 5 byte trailer `[compression: u8][crc32: u32 LE]`
//! whose checksum covers the block as stored, before decompression.
//!
//! Opening a table validates the footer, properties and index eagerly. Data
//! blocks are checked when a scan reaches them.

pub mod block;
pub mod builder;
mod coding;
pub mod footer;
pub mod index;
pub mod properties;
pub mod reader;

pub use block::{Block, BlockBuilder, BlockIterator};
pub use builder::SSTableBuilder;
pub use footer::{BlockHandle, Footer};
pub use index::{IndexBlock, IndexEntry};
pub use properties::TableProperties;
pub use reader::{SSTableIterator, SSTableReader};

pub use crate::config::CompressionType;

/// Default target size of a data block before it is flushed.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Size of the footer at the end of every table.
pub const FOOTER_SIZE: usize = 48;

/// Size of the trailer following every block.
pub const BLOCK_TRAILER_SIZE: usize = 5;

/// Last eight bytes of every table file ("KVIMPSST" as little-endian).
pub const MAGIC_NUMBER: u64 = u64::from_le_bytes(*b"KVIMPSST");
