//! Values with a key-bound integrity tag.
//!
//! ## Format
//!
//! ```text
//! [checksum: u32 BE] [tag: u8] [data: bytes]
//! ```
//!
//! The checksum covers the key the value is stored under followed by the tag
//! and data, so moving a value to a different key invalidates it. A checksum
//! of zero means "not set".

use crate::error::{Error, Result};
use crate::keys::pretty_key;

/// Size of the checksum and tag header.
pub const VALUE_HEADER_SIZE: usize = 5;

const CHECKSUM_SIZE: usize = 4;

/// The type of data a value holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueTag {
    /// Unknown or unset.
    Unknown = 0,
    /// Arbitrary bytes.
    Bytes = 3,
}

impl ValueTag {
    /// Converts a u8 to a ValueTag.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ValueTag::Unknown),
            3 => Some(ValueTag::Bytes),
            _ => None,
        }
    }
}

/// The raw bytes of a stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    raw: Vec<u8>,
}

impl Value {
    /// Creates a value holding `data`, with an unset checksum.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut raw = Vec::with_capacity(VALUE_HEADER_SIZE + data.len());
        raw.extend_from_slice(&[0u8; CHECKSUM_SIZE]);
        raw.push(ValueTag::Bytes as u8);
        raw.extend_from_slice(data);
        Self { raw }
    }

    /// Creates a value holding the bytes of `s`, with an unset checksum.
    pub fn from_string(s: &str) -> Self {
        Self::from_bytes(s.as_bytes())
    }

    /// Wraps raw bytes read from a file or the store.
    ///
    /// # Errors
    ///
    /// Returns `IntegrityMismatch` if the bytes are too short to hold the
    /// header. `key` is only used for the error message.
    pub fn from_raw(key: &[u8], raw: Vec<u8>) -> Result<Self> {
        if raw.len() < VALUE_HEADER_SIZE {
            return Err(Error::IntegrityMismatch {
                key: pretty_key(key),
                reason: format!("value of {} bytes is shorter than its header", raw.len()),
            });
        }
        Ok(Self { raw })
    }

    /// Returns the raw bytes, including the header.
    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Consumes the value, returning its raw bytes.
    pub fn into_raw(self) -> Vec<u8> {
        self.raw
    }

    /// Returns the data portion of the value.
    pub fn data(&self) -> &[u8] {
        &self.raw[VALUE_HEADER_SIZE..]
    }

    /// Returns the tag byte.
    pub fn tag(&self) -> ValueTag {
        ValueTag::from_u8(self.raw[CHECKSUM_SIZE]).unwrap_or(ValueTag::Unknown)
    }

    /// Returns the stored checksum (zero when unset).
    pub fn checksum(&self) -> u32 {
        u32::from_be_bytes([self.raw[0], self.raw[1], self.raw[2], self.raw[3]])
    }

    fn set_checksum(&mut self, checksum: u32) {
        self.raw[..CHECKSUM_SIZE].copy_from_slice(&checksum.to_be_bytes());
    }

    /// Resets the checksum to unset.
    pub fn clear_checksum(&mut self) {
        self.set_checksum(0);
    }

    /// Computes and stores the checksum for `key` if none is set.
    ///
    /// A stale checksum is left in place; call [`Value::clear_checksum`]
    /// first when the key has changed.
    pub fn init_checksum(&mut self, key: &[u8]) {
        if self.checksum() == 0 {
            let sum = self.compute_checksum(key);
            self.set_checksum(sum);
        }
    }

    /// Verifies the stored checksum against `key`.
    ///
    /// An unset checksum always verifies.
    pub fn verify(&self, key: &[u8]) -> Result<()> {
        let stored = self.checksum();
        if stored == 0 {
            return Ok(());
        }
        let computed = self.compute_checksum(key);
        if computed != stored {
            return Err(Error::IntegrityMismatch {
                key: pretty_key(key),
                reason: format!("checksum {:#010x} does not match computed {:#010x}", stored, computed),
            });
        }
        Ok(())
    }

    fn compute_checksum(&self, key: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(key);
        hasher.update(&self.raw[CHECKSUM_SIZE..]);
        match hasher.finalize() {
            // Zero is reserved for "unset"
            0 => 1,
            sum => sum,
        }
    }
}
