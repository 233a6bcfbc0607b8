//! Table properties stored alongside the data blocks.

use crate::error::{Error, Result};
use crate::mvcc::MvccKey;
use serde::{Deserialize, Serialize};

/// Summary of an SSTable's contents, written by the builder and checked by
/// the reader when the file is opened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableProperties {
    /// Number of key-value entries.
    pub num_entries: u64,
    /// Number of data blocks.
    pub num_data_blocks: u64,
    /// Total size of the encoded keys.
    pub raw_key_size: u64,
    /// Total size of the raw values.
    pub raw_value_size: u64,
    /// Encoded smallest key, if any entries exist.
    pub smallest_key: Option<Vec<u8>>,
    /// Encoded largest key, if any entries exist.
    pub largest_key: Option<Vec<u8>>,
}

impl TableProperties {
    /// Serializes the properties with bincode.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserializes properties written by [`TableProperties::encode`].
    pub fn decode(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| Error::corruption(format!("Invalid table properties: {}", e)))
    }

    /// Returns the decoded smallest key.
    pub fn smallest(&self) -> Result<Option<MvccKey>> {
        decode_key(self.smallest_key.as_deref())
    }

    /// Returns the decoded largest key.
    pub fn largest(&self) -> Result<Option<MvccKey>> {
        decode_key(self.largest_key.as_deref())
    }

    /// Total size of keys and values.
    pub fn data_size(&self) -> u64 {
        self.raw_key_size + self.raw_value_size
    }
}

fn decode_key(encoded: Option<&[u8]>) -> Result<Option<MvccKey>> {
    encoded
        .map(|data| {
            MvccKey::decode(data).ok_or_else(|| Error::corruption("Undecodable boundary key"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mvcc::Timestamp;

    #[test]
    fn test_properties_encode_decode() {
        let smallest = MvccKey::new(b"a".to_vec(), Timestamp::new(10, 0));
        let largest = MvccKey::new(b"z".to_vec(), Timestamp::new(10, 0));
        let props = TableProperties {
            num_entries: 2,
            num_data_blocks: 1,
            raw_key_size: 28,
            raw_value_size: 16,
            smallest_key: Some(smallest.encode()),
            largest_key: Some(largest.encode()),
        };

        let decoded = TableProperties::decode(&props.encode().unwrap()).unwrap();
        assert_eq!(decoded, props);
        assert_eq!(decoded.smallest().unwrap(), Some(smallest));
        assert_eq!(decoded.largest().unwrap(), Some(largest));
        assert_eq!(decoded.data_size(), 44);
    }

    #[test]
    fn test_properties_decode_garbage() {
        assert!(TableProperties::decode(&[0xFF, 0x01]).is_err());
    }
}
