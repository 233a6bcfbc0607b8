//! Bulk import of versioned key-value files.
//!
//! The pieces, bottom up:
//!
//! - [`KeyRewriter`] maps source keys into the destination keyspace by
//!   swapping a leading prefix.
//! - [`scan_files`] reads every input file, rewrites and re-tags each record,
//!   and reduces them to the newest version per destination key.
//! - [`Importer`] ties it together: validate, scan, check, then apply one
//!   atomic batch.

mod cancel;
mod coordinator;
mod request;
mod rewrite;
mod scan;

pub use cancel::CancelToken;
pub use coordinator::Importer;
pub use request::{ImportFile, ImportRequest, ImportSummary};
pub use rewrite::{KeyRewrite, KeyRewriter};
pub use scan::{scan_files, MergedRecords, ScanInput};
