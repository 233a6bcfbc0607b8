//! In-memory external storage.

use super::ExternalStorage;
use crate::error::Result;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io;

/// A named bucket of files held in memory.
///
/// Cloning a file out is cheap since contents are shared [`Bytes`].
#[derive(Debug)]
pub struct MemoryStorage {
    bucket: String,
    files: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStorage {
    /// Creates an empty bucket.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self { bucket: bucket.into(), files: RwLock::new(HashMap::new()) }
    }

    /// Removes the file at `path`, returning true if it existed.
    pub fn delete_file(&self, path: &str) -> bool {
        self.files.write().remove(path).is_some()
    }

    /// Paths of all files, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.read().keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl ExternalStorage for MemoryStorage {
    fn describe(&self) -> String {
        format!("mem://{}", self.bucket)
    }

    fn read_file(&self, path: &str) -> Result<Bytes> {
        self.files.read().get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such file: {}", path)).into()
        })
    }

    fn write_file(&self, path: &str, data: Bytes) -> Result<()> {
        self.files.write().insert(path.to_string(), data);
        Ok(())
    }
}
