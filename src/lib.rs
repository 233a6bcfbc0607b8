//! # kvimport - Bulk Import for a Versioned Key-Value Store
//!
//! kvimport loads immutable sorted table files into a multi-version
//! key-value store, moving every key into a new keyspace on the way in.
//!
//! ## Architecture
//!
//! The engine consists of three pieces:
//!
//! - **KeyRewriter**: Maps source keys to destination keys by replacing a
//!   leading prefix, preserving byte order
//! - **Merge-Scanner**: Reads several overlapping table files and keeps only
//!   the newest version of each rewritten key
//! - **Importer**: Validates a request, drives the scan and applies the
//!   result to the store as one atomic, retry-safe batch
//!
//! Around them sit the table file format ([`sstable`]), the places files are
//! read from ([`storage`]) and the in-memory versioned store ([`store`]).
//!
//! ## Example Usage
//!
//! ```rust
//! use kvimport::import::{ImportRequest, Importer, KeyRewrite};
//! use kvimport::keys::Span;
//! use kvimport::mvcc::{MvccKey, Timestamp, Value};
//! use kvimport::sstable::SSTableBuilder;
//! use kvimport::storage::{DefaultStorageFactory, ExternalStorage, StorageConf};
//! use kvimport::{ImportOptions, MvccStore};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), kvimport::Error> {
//! // Produce an input file under the old table prefix
//! let factory = Arc::new(DefaultStorageFactory::new());
//! let mut builder = SSTableBuilder::in_memory();
//! let mut value = Value::from_string("hello");
//! value.init_checksum(b"/t/51/k1");
//! builder.add(&MvccKey::new(b"/t/51/k1".to_vec(), Timestamp::new(10, 0)), value.raw_bytes())?;
//! factory.bucket("backup").write_file("1.sst", builder.finish_to_bytes()?)?;
//!
//! // Import it under a new prefix
//! let store = Arc::new(MvccStore::new());
//! let importer = Importer::new(store.clone(), factory, ImportOptions::default())?;
//! let request = ImportRequest::new(
//!     Span::new(b"/t/51/".to_vec(), b"/t/510".to_vec()),
//!     vec![KeyRewrite::new(b"/t/51/".to_vec(), b"/t/100/".to_vec())],
//! )?
//! .with_file(StorageConf::Memory { bucket: "backup".into() }, "1.sst");
//!
//! let summary = importer.import(&request)?;
//! assert_eq!(summary.entries, 1);
//! assert!(store.get(b"/t/100/k1")?.is_some());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod config;
pub mod error;
pub mod import;
pub mod keys;
pub mod mvcc;
pub mod sstable;
pub mod storage;
pub mod store;

// Re-exports
pub use config::{CompressionType, ImportOptions};
pub use error::{Error, Result};
pub use import::{CancelToken, ImportRequest, ImportSummary, Importer, KeyRewrite, KeyRewriter};
pub use store::{BatchApplier, MvccStore, WriteBatch};
