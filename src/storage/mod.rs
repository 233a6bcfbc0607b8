//! External storage holding import input files.
//!
//! Input files live outside the store: in a local directory, in memory, or
//! in any other backend that implements [`ExternalStorage`]. The import path
//! only ever calls [`ExternalStorage::open_table`], so it never branches on
//! where a file actually lives.

mod local;
mod memory;

pub use local::LocalStorage;
pub use memory::MemoryStorage;

use crate::error::{Error, Result};
use crate::sstable::SSTableReader;
use bytes::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// A place input files can be read from and written to.
pub trait ExternalStorage: Send + Sync {
    /// Human-readable identity of this storage, used in errors and logs.
    fn describe(&self) -> String;

    /// Reads the complete contents of the file at `path`.
    fn read_file(&self, path: &str) -> Result<Bytes>;

    /// Writes `data` as the file at `path`, replacing any existing file.
    fn write_file(&self, path: &str, data: Bytes) -> Result<()>;

    /// Reads and validates the SSTable at `path`.
    ///
    /// Failures carry the file identity (`FileRead` or `CorruptFile`).
    fn open_table(&self, path: &str) -> Result<SSTableReader> {
        let name = format!("{}/{}", self.describe(), path);
        let data = self.read_file(path).map_err(|e| e.with_file(name.as_str()))?;
        SSTableReader::from_bytes(name.as_str(), data).map_err(|e| e.with_file(name))
    }
}

/// Where a set of import files is stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum StorageConf {
    /// A directory on the local filesystem.
    LocalFile {
        /// Directory holding the files.
        dir: PathBuf,
    },
    /// A named in-memory bucket.
    Memory {
        /// Bucket name.
        bucket: String,
    },
}

impl StorageConf {
    /// Parses a storage URI.
    ///
    /// Accepted forms: `nodelocal:///dir`, `file:///dir`, `mem://bucket`, or a
    /// bare filesystem path.
    pub fn from_uri(uri: &str) -> Result<Self> {
        if uri.is_empty() {
            return Err(Error::invalid_argument("empty storage URI"));
        }
        match uri.split_once("://") {
            None => Ok(StorageConf::LocalFile { dir: PathBuf::from(uri) }),
            Some(("nodelocal", path)) | Some(("file", path)) => {
                if path.is_empty() {
                    return Err(Error::invalid_argument(format!("missing path in {}", uri)));
                }
                Ok(StorageConf::LocalFile { dir: PathBuf::from(path) })
            }
            Some(("mem", bucket)) => {
                if bucket.is_empty() || bucket.contains('/') {
                    return Err(Error::invalid_argument(format!("invalid bucket in {}", uri)));
                }
                Ok(StorageConf::Memory { bucket: bucket.to_string() })
            }
            Some((scheme, _)) => {
                Err(Error::invalid_argument(format!("unsupported storage scheme {:?}", scheme)))
            }
        }
    }
}

/// Turns a [`StorageConf`] into a usable storage handle.
pub trait StorageFactory: Send + Sync {
    /// Returns the storage described by `conf`.
    fn make_storage(&self, conf: &StorageConf) -> Result<Arc<dyn ExternalStorage>>;
}

/// Resolves local directories directly and memory buckets from its own
/// registry.
#[derive(Default)]
pub struct DefaultStorageFactory {
    buckets: RwLock<HashMap<String, Arc<MemoryStorage>>>,
}

impl DefaultStorageFactory {
    /// Creates a factory with no memory buckets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the memory bucket called `name`, creating it if needed.
    pub fn bucket(&self, name: &str) -> Arc<MemoryStorage> {
        if let Some(bucket) = self.buckets.read().get(name) {
            return Arc::clone(bucket);
        }
        let mut buckets = self.buckets.write();
        Arc::clone(
            buckets
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(MemoryStorage::new(name))),
        )
    }
}

impl StorageFactory for DefaultStorageFactory {
    fn make_storage(&self, conf: &StorageConf) -> Result<Arc<dyn ExternalStorage>> {
        match conf {
            StorageConf::LocalFile { dir } => Ok(Arc::new(LocalStorage::new(dir))),
            StorageConf::Memory { bucket } => match self.buckets.read().get(bucket) {
                Some(storage) => Ok(Arc::clone(storage) as Arc<dyn ExternalStorage>),
                None => Err(Error::FileRead {
                    file: format!("mem://{}", bucket),
                    source: Box::new(Error::invalid_argument("unknown memory bucket")),
                }),
            },
        }
    }
}
