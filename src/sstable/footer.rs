//! Block handles and the table footer.

use crate::error::{Error, Result};
use crate::sstable::coding::{get_varint64, put_varint64, MAX_VARINT64_LEN};
use crate::sstable::{FOOTER_SIZE, MAGIC_NUMBER};

/// Longest encoding of a [`BlockHandle`].
pub const MAX_BLOCK_HANDLE_LEN: usize = 2 * MAX_VARINT64_LEN;

/// Location of a block in a table file. `size` includes the block trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHandle {
    /// Offset of the block in the file
    pub offset: u64,
    /// Size of the block in bytes
    pub size: u64,
}

impl BlockHandle {
    /// Create a new BlockHandle
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// Appends the varint encoding of the handle to `buf`.
    pub fn encode_to(&self, buf: &mut Vec<u8>) {
        put_varint64(buf, self.offset);
        put_varint64(buf, self.size);
    }

    /// Encodes the handle as two varints.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(MAX_BLOCK_HANDLE_LEN);
        self.encode_to(&mut buf);
        buf
    }

    /// Decodes a handle from the front of `input`, advancing past it.
    pub fn decode_from(input: &mut &[u8]) -> Result<Self> {
        let offset = get_varint64(input)?;
        let size = get_varint64(input)?;
        Ok(Self { offset, size })
    }

    /// Decodes a handle that makes up all of `data`.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut input = data;
        let handle = Self::decode_from(&mut input)?;
        if !input.is_empty() {
            return Err(Error::corruption(format!(
                "{} trailing bytes after block handle",
                input.len()
            )));
        }
        Ok(handle)
    }

    /// End offset of the block, or None on overflow
    pub fn end_offset(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }
}

/// The fixed-size tail of every table file.
///
/// Format:
/// ```text
/// [properties_handle: varint64 x2]
/// [index_handle: varint64 x2]
/// [zero padding up to 40 bytes]
/// [magic: u64 LE]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footer {
    /// Handle to the properties block
    pub properties_handle: BlockHandle,
    /// Handle to the index block
    pub index_handle: BlockHandle,
}

impl Footer {
    /// Create a new Footer
    pub fn new(properties_handle: BlockHandle, index_handle: BlockHandle) -> Self {
        Self { properties_handle, index_handle }
    }

    /// Encodes the footer into exactly [`FOOTER_SIZE`] bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FOOTER_SIZE);
        self.properties_handle.encode_to(&mut buf);
        self.index_handle.encode_to(&mut buf);
        buf.resize(FOOTER_SIZE - 8, 0);
        buf.extend_from_slice(&MAGIC_NUMBER.to_le_bytes());
        buf
    }

    /// Decodes a footer, checking its size and magic number.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != FOOTER_SIZE {
            return Err(Error::corruption(format!(
                "footer is {} bytes, expected {}",
                data.len(),
                FOOTER_SIZE
            )));
        }

        let (handles, magic) = data.split_at(FOOTER_SIZE - 8);
        let mut magic_bytes = [0u8; 8];
        magic_bytes.copy_from_slice(magic);
        let magic = u64::from_le_bytes(magic_bytes);
        if magic != MAGIC_NUMBER {
            return Err(Error::corruption(format!(
                "bad table magic number {:#x}, not a table file",
                magic
            )));
        }

        let mut input = handles;
        let properties_handle = BlockHandle::decode_from(&mut input)?;
        let index_handle = BlockHandle::decode_from(&mut input)?;
        Ok(Self { properties_handle, index_handle })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_handle_encoding_is_compact() {
        let handle = BlockHandle::new(100, 50);
        assert_eq!(handle.encode().len(), 2);
        assert_eq!(BlockHandle::decode(&handle.encode()).unwrap(), handle);

        let large = BlockHandle::new(u64::MAX - 1, 1 << 40);
        assert!(large.encode().len() <= MAX_BLOCK_HANDLE_LEN);
        assert_eq!(BlockHandle::decode(&large.encode()).unwrap(), large);
    }

    #[test]
    fn test_block_handle_trailing_bytes() {
        let mut data = BlockHandle::new(1, 2).encode();
        data.push(0);
        assert!(BlockHandle::decode(&data).is_err());
    }

    #[test]
    fn test_block_handle_end_offset() {
        assert_eq!(BlockHandle::new(100, 50).end_offset(), Some(150));
        assert_eq!(BlockHandle::new(u64::MAX, 1).end_offset(), None);
    }

    #[test]
    fn test_footer_fits_largest_handles() {
        let footer = Footer::new(
            BlockHandle::new(u64::MAX, u64::MAX),
            BlockHandle::new(u64::MAX, u64::MAX),
        );
        let encoded = footer.encode();
        assert_eq!(encoded.len(), FOOTER_SIZE);
        assert_eq!(Footer::decode(&encoded).unwrap(), footer);
    }

    #[test]
    fn test_footer_rejects_wrong_magic_and_size() {
        let mut data = Footer::new(BlockHandle::new(0, 10), BlockHandle::new(10, 10)).encode();
        assert!(Footer::decode(&data[1..]).is_err());

        data[FOOTER_SIZE - 1] ^= 0xFF;
        assert!(matches!(Footer::decode(&data), Err(Error::Corruption(_))));
    }
}
