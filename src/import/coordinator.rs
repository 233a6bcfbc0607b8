//! The import coordinator.
//!
//! An import validates its request, merge-scans every input file into one
//! ordered set of rewritten records, checks that set against the destination
//! span, and hands it to the store as a single atomic batch. Nothing reaches
//! the store unless every step before the apply succeeded.

use crate::config::ImportOptions;
use crate::error::{Error, Result};
use crate::import::scan::{scan_files, ScanInput};
use crate::import::{CancelToken, ImportRequest, ImportSummary};
use crate::keys::pretty_key;
use crate::storage::StorageFactory;
use crate::store::{BatchApplier, WriteBatch};
use std::sync::Arc;
use std::time::Instant;

/// Runs import requests against a store.
///
/// Imports are idempotent: every written record keeps its source
/// timestamp and its value is re-tagged deterministically, so applying the
/// same request again rewrites identical versions and leaves the store
/// unchanged. A caller that sees a retryable error can simply re-issue the
/// request.
pub struct Importer {
    applier: Arc<dyn BatchApplier>,
    storage: Arc<dyn StorageFactory>,
    options: ImportOptions,
}

impl Importer {
    /// Creates an importer writing through `applier` and opening input
    /// storage through `storage`.
    pub fn new(
        applier: Arc<dyn BatchApplier>,
        storage: Arc<dyn StorageFactory>,
        options: ImportOptions,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self { applier, storage, options })
    }

    /// The options this importer runs with.
    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Runs `request` to completion.
    pub fn import(&self, request: &ImportRequest) -> Result<ImportSummary> {
        self.import_with_cancel(request, &CancelToken::new())
    }

    /// Runs `request`, giving up with `Error::Cancelled` if `cancel` fires
    /// before the batch is applied.
    ///
    /// # Errors
    ///
    /// Validation and scan failures (`InvalidArgument`, `UnrewritableKey`,
    /// `FileRead`, `CorruptFile`, `IntegrityMismatch`, `KeyOutsideSpan`) and
    /// cancellation abort the import with no effect on the store. Errors from
    /// the applier are returned unchanged.
    pub fn import_with_cancel(
        &self,
        request: &ImportRequest,
        cancel: &CancelToken,
    ) -> Result<ImportSummary> {
        let started = Instant::now();
        let rewriter = request.validate()?;

        let inputs = request
            .files
            .iter()
            .map(|file| {
                let storage = self.storage.make_storage(&file.storage)?;
                Ok(ScanInput::new(storage, file.path.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        cancel.check()?;
        let merged = scan_files(&inputs, &request.data_span, &rewriter, &self.options, cancel)?;

        if let Some(outside) = merged.entries.iter().find(|e| !request.span.contains_key(&e.key.key))
        {
            log::error!(
                "import into {} produced key {} outside the span",
                request.span,
                pretty_key(&outside.key.key)
            );
            return Err(Error::KeyOutsideSpan { key: pretty_key(&outside.key.key) });
        }

        let summary = ImportSummary {
            files: inputs.len(),
            records_read: merged.records_read,
            entries: merged.entries.len() as u64,
            data_size: merged
                .entries
                .iter()
                .map(|e| (e.key.encoded_size() + e.value.len()) as u64)
                .sum(),
        };
        let batch: WriteBatch = merged.entries.into_iter().collect();

        if batch.approximate_size() > self.options.max_batch_bytes {
            return Err(Error::invalid_argument(format!(
                "import batch of {} bytes exceeds max_batch_bytes {}",
                batch.approximate_size(),
                self.options.max_batch_bytes
            )));
        }

        cancel.check()?;
        if batch.is_empty() {
            log::debug!("import into {} found no records in {} files", request.span, summary.files);
            return Ok(summary);
        }

        self.applier.apply_batch(&request.span, batch).inspect_err(|e| {
            log::warn!("applying import batch to {} failed: {}", request.span, e);
        })?;

        log::info!(
            "imported {} entries ({} bytes) from {} files into {} in {:?}",
            summary.entries,
            summary.data_size,
            summary.files,
            request.span,
            started.elapsed()
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::KeyRewrite;
    use crate::keys::Span;
    use crate::mvcc::{MvccKey, Timestamp, Value};
    use crate::sstable::SSTableBuilder;
    use crate::storage::{DefaultStorageFactory, ExternalStorage, StorageConf};
    use crate::store::MvccStore;

    fn setup() -> (Arc<MvccStore>, Arc<DefaultStorageFactory>) {
        (Arc::new(MvccStore::new()), Arc::new(DefaultStorageFactory::new()))
    }

    fn write_table(factory: &DefaultStorageFactory, path: &str, rows: &[(&str, u64)]) {
        let mut builder = SSTableBuilder::in_memory();
        for (key, wall) in rows {
            let mut v = Value::from_string(&format!("{}@{}", key, wall));
            v.init_checksum(key.as_bytes());
            builder
                .add(&MvccKey::new(key.as_bytes().to_vec(), Timestamp::new(*wall, 0)), v.raw_bytes())
                .unwrap();
        }
        factory.bucket("b").write_file(path, builder.finish_to_bytes().unwrap()).unwrap();
    }

    fn request(paths: &[&str]) -> ImportRequest {
        let mut request = ImportRequest::new(
            Span::new(b"old/".to_vec(), b"old0".to_vec()),
            vec![KeyRewrite::new(b"old/".to_vec(), b"new/".to_vec())],
        )
        .unwrap();
        for path in paths {
            request.add_file(StorageConf::Memory { bucket: "b".into() }, *path);
        }
        request
    }

    #[test]
    fn test_import_writes_rewritten_records() {
        let (store, factory) = setup();
        write_table(&factory, "1.sst", &[("old/a", 3), ("old/b", 4)]);
        let importer = Importer::new(store.clone(), factory, ImportOptions::default()).unwrap();

        let summary = importer.import(&request(&["1.sst"])).unwrap();
        assert_eq!(summary.files, 1);
        assert_eq!(summary.entries, 2);
        assert_eq!(summary.records_read, 2);
        assert!(summary.data_size > 0);

        let got = store.get(b"new/a").unwrap().unwrap();
        assert_eq!(got.key.timestamp, Timestamp::new(3, 0));
        assert!(store.get(b"old/a").unwrap().is_none());
    }

    #[test]
    fn test_import_is_idempotent() {
        let (store, factory) = setup();
        write_table(&factory, "1.sst", &[("old/a", 3), ("old/b", 4)]);
        write_table(&factory, "2.sst", &[("old/a", 5)]);
        let importer = Importer::new(store.clone(), factory, ImportOptions::default()).unwrap();
        let req = request(&["1.sst", "2.sst"]);

        importer.import(&req).unwrap();
        let first = store.scan_versions(b"", b"").unwrap();
        importer.import(&req).unwrap();
        importer.import(&req).unwrap();
        assert_eq!(store.scan_versions(b"", b"").unwrap(), first);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_import_no_files() {
        let (store, factory) = setup();
        let importer = Importer::new(store.clone(), factory, ImportOptions::default()).unwrap();
        let summary = importer.import(&request(&[])).unwrap();
        assert_eq!(summary, ImportSummary::default());
        assert!(store.is_empty());
        assert_eq!(store.batches_applied(), 0);
    }

    #[test]
    fn test_import_failure_has_no_effect() {
        let (store, factory) = setup();
        write_table(&factory, "1.sst", &[("old/a", 3)]);
        let importer = Importer::new(store.clone(), factory, ImportOptions::default()).unwrap();

        let result = importer.import(&request(&["1.sst", "missing.sst"]));
        assert!(matches!(result, Err(Error::FileRead { .. })));
        assert!(store.is_empty());
    }

    #[test]
    fn test_import_batch_limit() {
        let (store, factory) = setup();
        write_table(&factory, "1.sst", &[("old/a", 3), ("old/b", 4)]);
        let options = ImportOptions::default().max_batch_bytes(8);
        let importer = Importer::new(store.clone(), factory, options).unwrap();

        assert!(matches!(
            importer.import(&request(&["1.sst"])),
            Err(Error::InvalidArgument(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_import_cancelled() {
        let (store, factory) = setup();
        write_table(&factory, "1.sst", &[("old/a", 3)]);
        let importer = Importer::new(store.clone(), factory, ImportOptions::default()).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let result = importer.import_with_cancel(&request(&["1.sst"]), &cancel);
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_import_key_outside_span() {
        let (store, factory) = setup();
        write_table(&factory, "1.sst", &[("old/a", 3), ("old/m", 3)]);
        let importer = Importer::new(store.clone(), factory, ImportOptions::default()).unwrap();

        // Destination span narrower than what the data span rewrites to.
        let mut req = request(&["1.sst"]);
        req.data_span.end_key = Vec::new();
        req.span.end_key = b"new/c".to_vec();

        assert!(matches!(importer.import(&req), Err(Error::KeyOutsideSpan { .. })));
        assert!(store.is_empty());
    }

    #[test]
    fn test_importer_rejects_invalid_options() {
        let (store, factory) = setup();
        let result = Importer::new(store, factory, ImportOptions::default().scan_threads(0));
        assert!(result.is_err());
    }
}
