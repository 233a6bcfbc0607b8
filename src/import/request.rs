//! Import requests and their validation.

use crate::error::{Error, Result};
use crate::import::{KeyRewrite, KeyRewriter};
use crate::keys::{pretty_key, Span};
use crate::storage::StorageConf;
use serde::{Deserialize, Serialize};

/// One input file of an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportFile {
    /// Where the file is stored.
    pub storage: StorageConf,
    /// Path of the file within that storage.
    pub path: String,
}

/// A request to import a set of files into one destination span.
///
/// `data_span` selects records in the source keyspace; `span` is where the
/// rewritten records land. Requests are plain data and can be sent between
/// processes as JSON:
///
/// ```rust
/// use kvimport::import::{ImportRequest, KeyRewrite};
/// use kvimport::keys::Span;
/// use kvimport::storage::StorageConf;
///
/// let mut request = ImportRequest::new(
///     Span::new(b"/t/51/".to_vec(), b"/t/510".to_vec()),
///     vec![KeyRewrite::new(b"/t/51/".to_vec(), b"/t/100/".to_vec())],
/// )
/// .unwrap();
/// request.add_file(StorageConf::Memory { bucket: "backup".into() }, "1.sst");
///
/// let json = request.to_json().unwrap();
/// assert_eq!(ImportRequest::from_json(&json).unwrap(), request);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    /// Destination span the import writes into.
    pub span: Span,
    /// Source span of the records to import.
    pub data_span: Span,
    /// Prefix rewrite rules mapping source keys to destination keys.
    pub key_rewrites: Vec<KeyRewrite>,
    /// Input files, in priority order for equal-timestamp ties.
    #[serde(default)]
    pub files: Vec<ImportFile>,
}

impl ImportRequest {
    /// Creates a request with no files, deriving `span` by rewriting
    /// `data_span`.
    pub fn new(data_span: Span, key_rewrites: Vec<KeyRewrite>) -> Result<Self> {
        let span = KeyRewriter::new(key_rewrites.clone())?.rewrite_span(&data_span)?;
        Ok(Self { span, data_span, key_rewrites, files: Vec::new() })
    }

    /// Appends an input file.
    pub fn add_file(&mut self, storage: StorageConf, path: impl Into<String>) {
        self.files.push(ImportFile { storage, path: path.into() });
    }

    /// Appends an input file, builder style.
    pub fn with_file(mut self, storage: StorageConf, path: impl Into<String>) -> Self {
        self.add_file(storage, path);
        self
    }

    /// Checks that the request is self-consistent and returns its rewriter.
    ///
    /// The rewrite rules must be unambiguous and non-empty, neither span may
    /// be inverted, the start of `data_span` must rewrite to the start of
    /// `span`, and when both ends are set, the end of `data_span` must
    /// rewrite to the end of `span`.
    pub fn validate(&self) -> Result<KeyRewriter> {
        if self.key_rewrites.is_empty() {
            return Err(Error::invalid_argument("import request has no key rewrites"));
        }
        if self.data_span.is_inverted() {
            return Err(Error::invalid_argument(format!(
                "inverted data span {}",
                self.data_span
            )));
        }
        if self.span.is_inverted() {
            return Err(Error::invalid_argument(format!("inverted span {}", self.span)));
        }

        let rewriter = KeyRewriter::new(self.key_rewrites.clone())?;

        let start = rewriter
            .rewrite_key(&self.data_span.key)
            .ok_or_else(|| Error::UnrewritableKey { key: pretty_key(&self.data_span.key) })?;
        if start != self.span.key {
            return Err(Error::invalid_argument(format!(
                "data span start {} rewrites to {}, not span start {}",
                pretty_key(&self.data_span.key),
                pretty_key(&start),
                pretty_key(&self.span.key)
            )));
        }

        if !self.span.end_key.is_empty() && !self.data_span.end_key.is_empty() {
            let end = rewriter.rewrite_end_key(&self.data_span.end_key)?;
            if end != self.span.end_key {
                return Err(Error::invalid_argument(format!(
                    "data span end {} rewrites to {}, not span end {}",
                    pretty_key(&self.data_span.end_key),
                    pretty_key(&end),
                    pretty_key(&self.span.end_key)
                )));
            }
        }

        if let Some(file) = self.files.iter().find(|f| f.path.is_empty()) {
            return Err(Error::invalid_argument(format!(
                "import file in {:?} has an empty path",
                file.storage
            )));
        }

        Ok(rewriter)
    }

    /// Decodes and validates a JSON request.
    pub fn from_json(json: &str) -> Result<Self> {
        let request: Self = serde_json::from_str(json)?;
        request.validate()?;
        Ok(request)
    }

    /// Encodes the request as JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// What an import did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Number of input files read.
    pub files: usize,
    /// Records read across all files before merging.
    pub records_read: u64,
    /// Entries written (one per destination key).
    pub entries: u64,
    /// Total size of the written keys and values.
    pub data_size: u64,
}
