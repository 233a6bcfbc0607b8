//! WriteBatch groups versioned writes that must be applied atomically.
//!
//! # Example
//!
//! ```rust
//! use kvimport::keys::Span;
//! use kvimport::mvcc::{MvccKey, Timestamp, Value};
//! use kvimport::store::{BatchApplier, MvccStore, WriteBatch};
//!
//! # fn main() -> Result<(), kvimport::Error> {
//! let store = MvccStore::new();
//! let mut batch = WriteBatch::new();
//!
//! let key = MvccKey::new(b"key1".to_vec(), Timestamp::new(100, 0));
//! let mut value = Value::from_string("value1");
//! value.init_checksum(&key.key);
//! batch.put(key, value.into_raw());
//!
//! store.apply_batch(&Span::new(b"key".to_vec(), b"kez".to_vec()), batch)?;
//! # Ok(())
//! # }
//! ```

use crate::mvcc::{MvccKey, MvccKeyValue};

/// WriteBatch accumulates versioned puts to be applied atomically.
///
/// Every put names its own timestamp, so applying the same batch twice
/// writes the same versions twice rather than adding new ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    operations: Vec<MvccKeyValue>,
    approximate_size: usize,
}

impl WriteBatch {
    /// Creates a new empty WriteBatch.
    pub fn new() -> Self {
        Self { operations: Vec::new(), approximate_size: 0 }
    }

    /// Adds a versioned put to the batch.
    pub fn put(&mut self, key: MvccKey, value: Vec<u8>) {
        self.approximate_size += key.encoded_size() + value.len() + 8; // Approximate overhead
        self.operations.push(MvccKeyValue::new(key, value));
    }

    /// Clears all operations from the batch.
    pub fn clear(&mut self) {
        self.operations.clear();
        self.approximate_size = 0;
    }

    /// Returns the number of operations in the batch.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns true if the batch contains no operations.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Returns the approximate size of the batch in bytes.
    pub fn approximate_size(&self) -> usize {
        self.approximate_size
    }

    /// Returns an iterator over the operations in the batch.
    pub fn iter(&self) -> impl Iterator<Item = &MvccKeyValue> {
        self.operations.iter()
    }

    /// Consumes the batch, returning its operations in insertion order.
    pub fn into_operations(self) -> Vec<MvccKeyValue> {
        self.operations
    }
}

impl FromIterator<MvccKeyValue> for WriteBatch {
    fn from_iter<I: IntoIterator<Item = MvccKeyValue>>(iter: I) -> Self {
        let mut batch = WriteBatch::new();
        for kv in iter {
            batch.put(kv.key, kv.value);
        }
        batch
    }
}
