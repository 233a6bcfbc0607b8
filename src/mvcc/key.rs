//! Versioned key format.
//!
//! ## Encoding
//!
//! ```text
//! MvccKey:
//!   [user_key: bytes] [wall_time: u64 BE] [logical: u32 BE] [ts_len: u8 = 12]
//!   [user_key: bytes] [ts_len: u8 = 0]            // zero timestamp
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

const TIMESTAMP_ENCODED_LEN: usize = 12;

/// A hybrid timestamp: physical wall time in nanoseconds plus a logical
/// counter that orders events sharing a wall time.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp {
    /// Wall clock time in nanoseconds since the Unix epoch.
    pub wall_time: u64,
    /// Logical component.
    pub logical: u32,
}

impl Timestamp {
    /// The zero timestamp, used for unversioned keys.
    pub const ZERO: Timestamp = Timestamp { wall_time: 0, logical: 0 };

    /// Creates a new Timestamp.
    pub fn new(wall_time: u64, logical: u32) -> Self {
        Self { wall_time, logical }
    }

    /// Returns a timestamp for the current wall clock time.
    pub fn now() -> Self {
        let wall_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self { wall_time, logical: 0 }
    }

    /// Returns true for the zero timestamp.
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.wall_time / 1_000_000_000;
        let nanos = self.wall_time % 1_000_000_000;
        write!(f, "{}.{:09},{}", secs, nanos, self.logical)
    }
}

/// A user key at a specific timestamp.
///
/// Two MvccKeys with equal `key` bytes are versions of the same logical
/// entry. The newest version sorts first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MvccKey {
    /// The user key.
    pub key: Vec<u8>,
    /// The version of this entry.
    pub timestamp: Timestamp,
}

impl MvccKey {
    /// Creates a new MvccKey.
    ///
    /// # Example
    ///
    /// ```rust
    /// use kvimport::mvcc::{MvccKey, Timestamp};
    ///
    /// let key = MvccKey::new(b"user_key".to_vec(), Timestamp::new(42, 0));
    /// ```
    pub fn new(key: Vec<u8>, timestamp: Timestamp) -> Self {
        Self { key, timestamp }
    }

    /// Encodes the MvccKey into bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_size());
        buf.extend_from_slice(&self.key);
        if self.timestamp.is_zero() {
            buf.push(0);
        } else {
            buf.extend_from_slice(&self.timestamp.wall_time.to_be_bytes());
            buf.extend_from_slice(&self.timestamp.logical.to_be_bytes());
            buf.push(TIMESTAMP_ENCODED_LEN as u8);
        }
        buf
    }

    /// Decodes an MvccKey from bytes.
    ///
    /// Returns None if the trailing length byte is invalid or the data is too
    /// short to hold the timestamp it announces.
    pub fn decode(data: &[u8]) -> Option<Self> {
        let (&ts_len, rest) = data.split_last()?;
        match ts_len as usize {
            0 => Some(Self { key: rest.to_vec(), timestamp: Timestamp::ZERO }),
            TIMESTAMP_ENCODED_LEN => {
                if rest.len() < TIMESTAMP_ENCODED_LEN {
                    return None;
                }
                let key_len = rest.len() - TIMESTAMP_ENCODED_LEN;
                let wall_time = u64::from_be_bytes(rest[key_len..key_len + 8].try_into().ok()?);
                let logical = u32::from_be_bytes(rest[key_len + 8..].try_into().ok()?);
                Some(Self {
                    key: rest[..key_len].to_vec(),
                    timestamp: Timestamp { wall_time, logical },
                })
            }
            _ => None,
        }
    }

    /// Returns the total encoded size of this MvccKey.
    pub fn encoded_size(&self) -> usize {
        if self.timestamp.is_zero() {
            self.key.len() + 1
        } else {
            self.key.len() + TIMESTAMP_ENCODED_LEN + 1
        }
    }
}

impl PartialOrd for MvccKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MvccKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Keys ascending, then timestamps descending
        self.key.cmp(&other.key).then_with(|| other.timestamp.cmp(&self.timestamp))
    }
}

impl fmt::Display for MvccKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", crate::keys::pretty_key(&self.key), self.timestamp)
    }
}

/// A versioned key together with the raw bytes of its [`super::Value`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MvccKeyValue {
    /// The versioned key.
    pub key: MvccKey,
    /// Raw value bytes, including the integrity header.
    pub value: Vec<u8>,
}

impl MvccKeyValue {
    /// Creates a new MvccKeyValue.
    pub fn new(key: MvccKey, value: Vec<u8>) -> Self {
        Self { key, value }
    }
}
