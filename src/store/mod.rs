//! # Versioned store
//!
//! The store is the destination of an import. Imports only need one
//! capability from it, [`BatchApplier::apply_batch`], which writes a set of
//! versioned entries atomically. [`MvccStore`] is the in-memory
//! implementation: a crossbeam SkipMap ordered by [`MvccKey`], with a
//! commit guard so readers never observe half of a batch.
//!
//! ## Idempotence
//!
//! Writing a value at a `(key, timestamp)` that already holds the identical
//! value is a no-op. Writing a *different* value there is a conflict and the
//! whole batch is rejected with `WriteConflict`.

mod write_batch;

pub use write_batch::WriteBatch;

use crate::error::{Error, Result};
use crate::keys::{pretty_key, Span};
use crate::mvcc::{MvccKey, MvccKeyValue, Timestamp, Value};
use crossbeam_skiplist::map::Entry;
use crossbeam_skiplist::SkipMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Atomically applies batches of versioned writes addressed to a key span.
///
/// Implementations must make retries safe: applying the same batch again
/// leaves the store as if it had been applied once.
pub trait BatchApplier: Send + Sync {
    /// Applies every write in `batch`, or none of them.
    fn apply_batch(&self, span: &Span, batch: WriteBatch) -> Result<()>;
}

impl<T: BatchApplier + ?Sized> BatchApplier for Arc<T> {
    fn apply_batch(&self, span: &Span, batch: WriteBatch) -> Result<()> {
        (**self).apply_batch(span, batch)
    }
}

/// In-memory multi-version key-value store.
///
/// Owned by the caller: create it with [`MvccStore::new`], share it through
/// an `Arc`, and [`close`](MvccStore::close) it when done. Every operation
/// on a closed store fails with `InvalidState`.
pub struct MvccStore {
    data: SkipMap<MvccKey, Vec<u8>>,
    commit_guard: RwLock<()>,
    closed: AtomicBool,
    batches_applied: AtomicU64,
}

impl MvccStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self {
            data: SkipMap::new(),
            commit_guard: RwLock::new(()),
            closed: AtomicBool::new(false),
            batches_applied: AtomicU64::new(0),
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::invalid_state("store is closed"));
        }
        Ok(())
    }

    /// Writes a single versioned value.
    ///
    /// The value's checksum is initialized for `key` if it is unset.
    pub fn put(&self, key: &[u8], timestamp: Timestamp, mut value: Value) -> Result<()> {
        value.init_checksum(key);
        let mut batch = WriteBatch::new();
        batch.put(MvccKey::new(key.to_vec(), timestamp), value.into_raw());
        self.apply_batch(&Span::new(key.to_vec(), Vec::new()), batch)
    }

    /// Returns the newest version of `key`.
    pub fn get(&self, key: &[u8]) -> Result<Option<MvccKeyValue>> {
        self.check_open()?;
        let _guard = self.commit_guard.read();

        let newest = MvccKey::new(key.to_vec(), Timestamp::new(u64::MAX, u32::MAX));
        Ok(self
            .data
            .range(newest..)
            .next()
            .filter(|entry| entry.key().key == key)
            .map(|entry| MvccKeyValue::new(entry.key().clone(), entry.value().clone())))
    }

    /// Returns the newest version of every key in `[start, end)`, in key
    /// order. An empty `end` means no upper bound; `max_results == 0` means
    /// no limit.
    pub fn scan(&self, start: &[u8], end: &[u8], max_results: usize) -> Result<Vec<MvccKeyValue>> {
        self.check_open()?;
        let _guard = self.commit_guard.read();

        let mut results: Vec<MvccKeyValue> = Vec::new();
        for entry in self.range_entries(start) {
            let key = entry.key();
            if !end.is_empty() && key.key.as_slice() >= end {
                break;
            }
            // Versions of a key are adjacent, newest first
            if results.last().is_some_and(|last| last.key.key == key.key) {
                continue;
            }
            results.push(MvccKeyValue::new(key.clone(), entry.value().clone()));
            if max_results > 0 && results.len() == max_results {
                break;
            }
        }
        Ok(results)
    }

    /// Returns every version of every key in `[start, end)`.
    pub fn scan_versions(&self, start: &[u8], end: &[u8]) -> Result<Vec<MvccKeyValue>> {
        self.check_open()?;
        let _guard = self.commit_guard.read();

        Ok(self
            .range_entries(start)
            .take_while(|entry| end.is_empty() || entry.key().key.as_slice() < end)
            .map(|entry| MvccKeyValue::new(entry.key().clone(), entry.value().clone()))
            .collect())
    }

    fn range_entries(&self, start: &[u8]) -> impl Iterator<Item = Entry<'_, MvccKey, Vec<u8>>> + '_ {
        let lower = MvccKey::new(start.to_vec(), Timestamp::new(u64::MAX, u32::MAX));
        self.data.range(lower..)
    }

    /// Number of stored versions across all keys.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of batches applied successfully, including no-op re-applies.
    pub fn batches_applied(&self) -> u64 {
        self.batches_applied.load(Ordering::Relaxed)
    }

    /// Closes the store. Further operations fail.
    pub fn close(&self) -> Result<()> {
        let _guard = self.commit_guard.write();
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(Error::invalid_state("store already closed"));
        }
        log::info!("Store closed with {} versions", self.data.len());
        Ok(())
    }

    /// Returns true once the store has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Checks a batch against the span, the value checksums, and existing
    /// versions without writing anything.
    fn validate_batch(&self, span: &Span, batch: &WriteBatch) -> Result<()> {
        let mut seen: HashMap<&MvccKey, &[u8]> = HashMap::with_capacity(batch.len());

        for kv in batch.iter() {
            if kv.key.key.is_empty() {
                return Err(Error::invalid_argument("cannot write an empty key"));
            }
            if !span.contains_key(&kv.key.key) {
                return Err(Error::KeyOutsideSpan { key: pretty_key(&kv.key.key) });
            }
            Value::from_raw(&kv.key.key, kv.value.clone())?.verify(&kv.key.key)?;

            let conflicting = match seen.insert(&kv.key, kv.value.as_slice()) {
                Some(previous) => previous != kv.value.as_slice(),
                None => self.data.get(&kv.key).is_some_and(|e| e.value() != &kv.value),
            };
            if conflicting {
                return Err(Error::WriteConflict { key: kv.key.to_string() });
            }
        }
        Ok(())
    }
}

impl Default for MvccStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchApplier for MvccStore {
    fn apply_batch(&self, span: &Span, batch: WriteBatch) -> Result<()> {
        self.check_open()?;
        if span.is_inverted() {
            return Err(Error::invalid_argument(format!("inverted span {}", span)));
        }

        let _guard = self.commit_guard.write();
        // Checked again under the guard since close() takes it too
        self.check_open()?;
        self.validate_batch(span, &batch)?;

        let entries = batch.len();
        for kv in batch.into_operations() {
            self.data.insert(kv.key, kv.value);
        }
        self.batches_applied.fetch_add(1, Ordering::Relaxed);

        log::debug!("Applied batch of {} entries to {}", entries, span);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(key: &[u8], data: &str) -> Vec<u8> {
        let mut value = Value::from_string(data);
        value.init_checksum(key);
        value.into_raw()
    }

    fn batch_of(entries: &[(&[u8], u64, &str)]) -> WriteBatch {
        entries
            .iter()
            .map(|(key, wall, data)| {
                MvccKeyValue::new(
                    MvccKey::new(key.to_vec(), Timestamp::new(*wall, 0)),
                    tagged(key, data),
                )
            })
            .collect()
    }

    fn span() -> Span {
        Span::new(b"a".to_vec(), b"z".to_vec())
    }

    #[test]
    fn test_store_put_get() {
        let store = MvccStore::new();
        store.put(b"key", Timestamp::new(1, 0), Value::from_string("v1")).unwrap();
        store.put(b"key", Timestamp::new(2, 0), Value::from_string("v2")).unwrap();

        let latest = store.get(b"key").unwrap().unwrap();
        assert_eq!(latest.key.timestamp, Timestamp::new(2, 0));
        let value = Value::from_raw(b"key", latest.value).unwrap();
        assert_eq!(value.data(), b"v2");
        assert!(value.verify(b"key").is_ok());

        assert!(store.get(b"ke").unwrap().is_none());
        assert!(store.get(b"keyz").unwrap().is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_store_scan_latest_versions() {
        let store = MvccStore::new();
        store
            .apply_batch(
                &span(),
                batch_of(&[(b"b", 1, "b1"), (b"b", 3, "b3"), (b"c", 2, "c2"), (b"d", 1, "d1")]),
            )
            .unwrap();

        let scanned = store.scan(b"b", b"d", 0).unwrap();
        assert_eq!(scanned.len(), 2);
        assert_eq!(scanned[0].key, MvccKey::new(b"b".to_vec(), Timestamp::new(3, 0)));
        assert_eq!(scanned[1].key.key, b"c".to_vec());

        assert_eq!(store.scan(b"a", b"", 2).unwrap().len(), 2);
        assert_eq!(store.scan_versions(b"a", b"z").unwrap().len(), 4);
    }

    #[test]
    fn test_store_reapply_is_noop() {
        let store = MvccStore::new();
        let batch = batch_of(&[(b"b", 1, "x"), (b"c", 1, "y")]);

        for _ in 0..3 {
            store.apply_batch(&span(), batch.clone()).unwrap();
        }
        assert_eq!(store.len(), 2);
        assert_eq!(store.batches_applied(), 3);
    }

    #[test]
    fn test_store_conflicting_version_rejected_atomically() {
        let store = MvccStore::new();
        store.apply_batch(&span(), batch_of(&[(b"b", 1, "x")])).unwrap();

        let conflicting = batch_of(&[(b"c", 1, "new"), (b"b", 1, "different")]);
        for _ in 0..3 {
            let err = store.apply_batch(&span(), conflicting.clone()).unwrap_err();
            assert!(matches!(err, Error::WriteConflict { .. }));
            assert!(!err.is_retryable());
        }

        // Nothing from the failed batch was written
        assert!(store.get(b"c").unwrap().is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_rejects_keys_outside_span() {
        let store = MvccStore::new();
        let err = store
            .apply_batch(
                &Span::new(b"b".to_vec(), b"c".to_vec()),
                batch_of(&[(b"b", 1, "ok"), (b"d", 1, "no")]),
            )
            .unwrap_err();
        assert!(matches!(err, Error::KeyOutsideSpan { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_rejects_stale_checksums() {
        let store = MvccStore::new();
        let mut batch = WriteBatch::new();
        batch.put(MvccKey::new(b"b".to_vec(), Timestamp::new(1, 0)), tagged(b"other", "x"));

        let err = store.apply_batch(&span(), batch).unwrap_err();
        assert!(matches!(err, Error::IntegrityMismatch { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_close() {
        let store = MvccStore::new();
        store.put(b"k", Timestamp::new(1, 0), Value::from_string("v")).unwrap();
        store.close().unwrap();

        assert!(store.is_closed());
        assert!(matches!(store.get(b"k"), Err(Error::InvalidState(_))));
        assert!(store.apply_batch(&span(), WriteBatch::new()).is_err());
        assert!(store.close().is_err());
    }
}
