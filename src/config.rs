//! Configuration options for the import engine.

/// Options controlling how an import scans its inputs and builds its batch.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Number of worker threads used to read input files.
    /// Merging always happens on the calling thread.
    /// Default: 1
    pub scan_threads: usize,

    /// Verify each source value's checksum against its original key before
    /// rewriting it.
    /// Default: true
    pub verify_source_checksums: bool,

    /// Upper bound on the approximate size of the batch handed to the store
    /// (in bytes). The batch is applied atomically, so larger merged sets are
    /// rejected instead of split.
    /// Default: 64MB
    pub max_batch_bytes: usize,

    /// Block size for SSTables written by producers (in bytes), applied
    /// through `SSTableBuilder::set_options`.
    /// Default: 4KB
    pub block_size: usize,

    /// Compression algorithm for SSTables written by producers, applied
    /// through `SSTableBuilder::set_options`.
    /// Default: CompressionType::Snappy when the feature is enabled
    pub compression: CompressionType,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            scan_threads: 1,
            verify_source_checksums: true,
            max_batch_bytes: 64 * 1024 * 1024, // 64MB
            block_size: 4 * 1024,              // 4KB
            compression: CompressionType::default(),
        }
    }
}

/// Compression algorithms supported for SSTable data blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionType {
    /// No compression.
    None = 0,

    /// Snappy compression (fast, moderate compression ratio).
    #[cfg(feature = "snappy")]
    Snappy = 1,
}

impl CompressionType {
    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CompressionType::None),
            #[cfg(feature = "snappy")]
            1 => Some(CompressionType::Snappy),
            _ => None,
        }
    }
}

impl Default for CompressionType {
    fn default() -> Self {
        #[cfg(feature = "snappy")]
        return CompressionType::Snappy;

        #[cfg(not(feature = "snappy"))]
        CompressionType::None
    }
}

impl ImportOptions {
    /// Creates a new ImportOptions with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of file reader threads.
    pub fn scan_threads(mut self, threads: usize) -> Self {
        self.scan_threads = threads;
        self
    }

    /// Enables or disables source checksum verification.
    pub fn verify_source_checksums(mut self, value: bool) -> Self {
        self.verify_source_checksums = value;
        self
    }

    /// Sets the maximum batch size.
    pub fn max_batch_bytes(mut self, size: usize) -> Self {
        self.max_batch_bytes = size;
        self
    }

    /// Sets the block size for SSTables.
    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    /// Sets the compression algorithm.
    pub fn compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> crate::Result<()> {
        if self.scan_threads == 0 {
            return Err(crate::Error::invalid_argument("scan_threads must be > 0"));
        }
        if self.max_batch_bytes == 0 {
            return Err(crate::Error::invalid_argument("max_batch_bytes must be > 0"));
        }
        if self.block_size == 0 {
            return Err(crate::Error::invalid_argument("block_size must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = ImportOptions::default();
        assert_eq!(opts.scan_threads, 1);
        assert!(opts.verify_source_checksums);
        assert_eq!(opts.block_size, 4 * 1024);
    }

    #[test]
    fn test_options_builder() {
        let opts = ImportOptions::new()
            .scan_threads(4)
            .block_size(8 * 1024)
            .verify_source_checksums(false);

        assert_eq!(opts.scan_threads, 4);
        assert_eq!(opts.block_size, 8 * 1024);
        assert!(!opts.verify_source_checksums);
    }

    #[test]
    fn test_options_validation() {
        let mut opts = ImportOptions::default();
        assert!(opts.validate().is_ok());

        opts.scan_threads = 0;
        assert!(opts.validate().is_err());

        opts.scan_threads = 2;
        opts.max_batch_bytes = 0;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_compression_from_u8() {
        assert_eq!(CompressionType::from_u8(0), Some(CompressionType::None));
        assert_eq!(CompressionType::from_u8(7), None);
    }
}
