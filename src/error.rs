//! Error types for the bulk import engine.

use std::io;
use thiserror::Error;

/// The result type used throughout kvimport.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for import operations.
///
/// Scan-time variants (`UnrewritableKey`, `FileRead`, `CorruptFile`,
/// `IntegrityMismatch`, `KeyOutsideSpan`) abort an import before anything is
/// written. `Apply` is the only variant a retry layer should retry;
/// `WriteConflict` fails the same way every time.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Data corruption was detected.
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// An invalid argument was provided.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The store or reader is in an invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A block checksum mismatch was detected.
    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// The expected checksum value.
        expected: u32,
        /// The actual checksum value.
        actual: u32,
    },

    /// A source key matched none of the rewrite rules.
    #[error("could not rewrite key: {key}")]
    UnrewritableKey {
        /// Printable form of the offending key.
        key: String,
    },

    /// An input file could not be read.
    #[error("failed to read {file}: {source}")]
    FileRead {
        /// Identity of the file (storage description and path).
        file: String,
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// An input file failed structural validation.
    #[error("corrupt file {file}: {reason}")]
    CorruptFile {
        /// Identity of the file.
        file: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A value's integrity tag could not be verified or produced.
    #[error("integrity mismatch for key {key}: {reason}")]
    IntegrityMismatch {
        /// Printable form of the key the value belongs to.
        key: String,
        /// Why verification failed.
        reason: String,
    },

    /// A rewritten key fell outside the destination span.
    #[error("rewritten key {key} is outside the destination span")]
    KeyOutsideSpan {
        /// Printable form of the rewritten key.
        key: String,
    },

    /// A write would replace an existing value at the same key and version.
    ///
    /// Retrying reproduces it, so it is not retryable.
    #[error("write conflict at {key}: a different value already exists at this version")]
    WriteConflict {
        /// The conflicting versioned key.
        key: String,
    },

    /// The storage substrate failed to apply a batch.
    #[error("apply failed: {0}")]
    Apply(String),

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a new corruption error.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates a new invalid state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Creates a new internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Creates a new apply error.
    pub fn apply(msg: impl Into<String>) -> Self {
        Error::Apply(msg.into())
    }

    /// Wraps this error with the identity of the file it came from.
    ///
    /// Structural problems become `CorruptFile`; everything else becomes
    /// `FileRead`. Errors that already carry a file identity, or that are not
    /// about the file at all, pass through unchanged.
    pub fn with_file(self, file: impl Into<String>) -> Self {
        match self {
            Error::Corruption(reason) => Error::CorruptFile { file: file.into(), reason },
            e @ Error::ChecksumMismatch { .. } => {
                Error::CorruptFile { file: file.into(), reason: e.to_string() }
            }
            e @ (Error::Io(_)
            | Error::Serialization(_)
            | Error::InvalidState(_)
            | Error::InvalidArgument(_)) => {
                Error::FileRead { file: file.into(), source: Box::new(e) }
            }
            other => other,
        }
    }

    /// Returns true if a caller may retry the failed operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Apply(_))
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
