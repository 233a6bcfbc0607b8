//! Merge-scan of import files.
//!
//! Every input file is read within the data span, each record's key is
//! rewritten and its value re-tagged for the new key, and the records of all
//! files are reduced to one entry per destination key: the version with the
//! greatest timestamp. When two files hold the same key at the same
//! timestamp, the file listed first wins.
//!
//! Files may be read by several worker threads, but the reduction always
//! runs on the calling thread in file order, so the result does not depend
//! on how reads were scheduled.

use crate::config::ImportOptions;
use crate::error::{Error, Result};
use crate::import::{CancelToken, KeyRewriter};
use crate::keys::{pretty_key, Span};
use crate::mvcc::{MvccKey, MvccKeyValue, Value};
use crate::storage::ExternalStorage;
use crossbeam::channel;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Records between cancellation checks while reading a file.
const CANCEL_CHECK_INTERVAL: u64 = 256;

/// One file to scan and the storage it lives in.
#[derive(Clone)]
pub struct ScanInput {
    /// Storage holding the file.
    pub storage: Arc<dyn ExternalStorage>,
    /// Path of the file within the storage.
    pub path: String,
}

impl ScanInput {
    /// Creates a scan input.
    pub fn new(storage: Arc<dyn ExternalStorage>, path: impl Into<String>) -> Self {
        Self { storage, path: path.into() }
    }

    /// Identity used in logs and errors.
    pub fn identity(&self) -> String {
        format!("{}/{}", self.storage.describe(), self.path)
    }
}

/// The reduced output of a merge-scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedRecords {
    /// One entry per destination key, ascending by key.
    pub entries: Vec<MvccKeyValue>,
    /// Number of records read across all files, before reduction.
    pub records_read: u64,
}

/// Reads, rewrites and merges `inputs`.
///
/// Only records whose source key lies in `data_span` are considered. Any
/// read failure, unrewritable key, or integrity failure aborts the whole
/// scan; no partial result is returned.
pub fn scan_files(
    inputs: &[ScanInput],
    data_span: &Span,
    rewriter: &KeyRewriter,
    options: &ImportOptions,
    cancel: &CancelToken,
) -> Result<MergedRecords> {
    let threads = options.scan_threads.clamp(1, inputs.len().max(1));
    let mut records_read = 0u64;
    let mut merged: BTreeMap<Vec<u8>, MvccKeyValue> = BTreeMap::new();

    if threads > 1 {
        for records in read_parallel(inputs, data_span, rewriter, options, cancel, threads)? {
            records_read += records.len() as u64;
            for record in records {
                merge_record(&mut merged, record);
            }
        }
    } else {
        for input in inputs {
            records_read += read_file(input, data_span, rewriter, options, cancel, |record| {
                merge_record(&mut merged, record)
            })?;
        }
    }

    cancel.check()?;

    log::debug!(
        "merge-scan of {} files read {} records into {} keys",
        inputs.len(),
        records_read,
        merged.len()
    );

    Ok(MergedRecords { entries: merged.into_values().collect(), records_read })
}

/// Keeps `record` unless `merged` already holds a version of its key that is
/// at least as new. Records must be offered in file order for ties to go to
/// the first file.
fn merge_record(merged: &mut BTreeMap<Vec<u8>, MvccKeyValue>, record: MvccKeyValue) {
    match merged.entry(record.key.key.clone()) {
        Entry::Vacant(slot) => {
            slot.insert(record);
        }
        Entry::Occupied(mut slot) => {
            if record.key.timestamp > slot.get().key.timestamp {
                slot.insert(record);
            }
        }
    }
}

/// Reads files on `threads` workers and returns their records in file order.
///
/// When several files fail, the error of the earliest listed file among
/// those read is returned.
fn read_parallel(
    inputs: &[ScanInput],
    data_span: &Span,
    rewriter: &KeyRewriter,
    options: &ImportOptions,
    cancel: &CancelToken,
    threads: usize,
) -> Result<Vec<Vec<MvccKeyValue>>> {
    let (job_tx, job_rx) = channel::unbounded::<usize>();
    let (result_tx, result_rx) = channel::unbounded::<(usize, Result<Vec<MvccKeyValue>>)>();
    for idx in 0..inputs.len() {
        // Receivers are alive until the end of this function.
        let _ = job_tx.send(idx);
    }
    drop(job_tx);

    // Workers stop taking new files once any read fails.
    let abort = CancelToken::new();

    let panicked = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..threads)
            .map(|_| {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let abort = &abort;
                scope.spawn(move || {
                    while let Ok(idx) = job_rx.recv() {
                        if abort.is_cancelled() {
                            break;
                        }
                        let mut records = Vec::new();
                        let result = read_file(
                            &inputs[idx],
                            data_span,
                            rewriter,
                            options,
                            cancel,
                            |record| records.push(record),
                        )
                        .map(|_| records);
                        if result.is_err() {
                            abort.cancel();
                        }
                        if result_tx.send((idx, result)).is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join()).filter(|r| r.is_err()).count()
    });
    drop(result_tx);

    if panicked > 0 {
        return Err(Error::internal(format!("{} scan workers panicked", panicked)));
    }

    let mut slots: Vec<Option<Result<Vec<MvccKeyValue>>>> =
        std::iter::repeat_with(|| None).take(inputs.len()).collect();
    for (idx, result) in result_rx.iter() {
        slots[idx] = Some(result);
    }

    if let Some(err) = slots.iter_mut().find_map(|slot| match slot.take() {
        Some(Err(e)) => Some(e),
        other => {
            *slot = other;
            None
        }
    }) {
        return Err(err);
    }

    slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| Err(Error::Cancelled)))
        .collect()
}

/// Reads one file, rewriting and re-tagging every record in the data span
/// and handing each to `emit` in file order. Returns the number of records
/// emitted.
fn read_file(
    input: &ScanInput,
    data_span: &Span,
    rewriter: &KeyRewriter,
    options: &ImportOptions,
    cancel: &CancelToken,
    mut emit: impl FnMut(MvccKeyValue),
) -> Result<u64> {
    cancel.check()?;
    let identity = input.identity();

    let reader = input.storage.open_table(&input.path).inspect_err(|e| {
        log::error!("failed to open import file {}: {}", identity, e);
    })?;

    let mut seen = 0u64;
    for item in reader.iter_range(&data_span.key, &data_span.end_key) {
        seen += 1;
        if seen % CANCEL_CHECK_INTERVAL == 0 {
            cancel.check()?;
        }

        let record = item.map_err(|e| e.with_file(identity.as_str())).inspect_err(|e| {
            log::error!("failed to read import file {}: {}", identity, e);
        })?;
        let rewritten = rewrite_record(record, rewriter, options).inspect_err(|e| {
            log::error!("rejecting import file {}: {}", identity, e);
        })?;
        emit(rewritten);
    }

    log::debug!("read {} records from {}", seen, identity);
    Ok(seen)
}

/// Moves one record to its destination key and binds its value's
/// checksum to that key.
fn rewrite_record(
    record: MvccKeyValue,
    rewriter: &KeyRewriter,
    options: &ImportOptions,
) -> Result<MvccKeyValue> {
    let MvccKeyValue { key: MvccKey { key: old_key, timestamp }, value } = record;

    let mut value = Value::from_raw(&old_key, value)?;
    if options.verify_source_checksums {
        value.verify(&old_key)?;
    }

    let new_key = rewriter
        .rewrite_key(&old_key)
        .ok_or_else(|| Error::UnrewritableKey { key: pretty_key(&old_key) })?;

    value.clear_checksum();
    value.init_checksum(&new_key);

    Ok(MvccKeyValue::new(MvccKey::new(new_key, timestamp), value.into_raw()))
}
