//! Variable-length integer coding for table metadata.
//!
//! Integers are written as LEB128: seven bits per byte, least significant
//! group first, with the high bit set on every byte but the last.

use crate::error::{Error, Result};
use bytes::BufMut;

/// Longest encoding of a u64.
pub const MAX_VARINT64_LEN: usize = 10;

pub fn put_varint64<B: BufMut>(buf: &mut B, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

pub fn put_varint32<B: BufMut>(buf: &mut B, value: u32) {
    put_varint64(buf, u64::from(value));
}

/// Reads a u64 from the front of `data`, advancing it past the encoding.
pub fn get_varint64(data: &mut &[u8]) -> Result<u64> {
    let mut value = 0u64;
    for (i, &byte) in data.iter().enumerate().take(MAX_VARINT64_LEN) {
        let bits = u64::from(byte & 0x7F);
        let shift = 7 * i as u32;
        if shift == 63 && bits > 1 {
            return Err(Error::corruption("varint overflows u64"));
        }
        value |= bits << shift;
        if byte & 0x80 == 0 {
            *data = &data[i + 1..];
            return Ok(value);
        }
    }
    Err(Error::corruption("truncated varint"))
}

pub fn get_varint32(data: &mut &[u8]) -> Result<u32> {
    u32::try_from(get_varint64(data)?).map_err(|_| Error::corruption("varint overflows u32"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_boundaries() {
        for value in [0u64, 1, 127, 128, 300, 16_383, 16_384, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            put_varint64(&mut buf, value);
            assert!(buf.len() <= MAX_VARINT64_LEN);

            let mut input = buf.as_slice();
            assert_eq!(get_varint64(&mut input).unwrap(), value);
            assert!(input.is_empty());
        }
    }

    #[test]
    fn test_varint_single_byte() {
        let mut buf = Vec::new();
        put_varint32(&mut buf, 100);
        assert_eq!(buf, vec![100]);
    }

    #[test]
    fn test_varint_advances_past_value() {
        let mut buf = Vec::new();
        put_varint32(&mut buf, 500);
        put_varint32(&mut buf, 7);
        let mut input = buf.as_slice();
        assert_eq!(get_varint32(&mut input).unwrap(), 500);
        assert_eq!(get_varint32(&mut input).unwrap(), 7);
    }

    #[test]
    fn test_varint_malformed() {
        let mut truncated: &[u8] = &[0x80, 0x80];
        assert!(get_varint64(&mut truncated).is_err());

        let mut overflow: &[u8] = &[0xFF; 11];
        assert!(get_varint64(&mut overflow).is_err());

        let mut buf = Vec::new();
        put_varint64(&mut buf, u64::from(u32::MAX) + 1);
        assert!(get_varint32(&mut buf.as_slice()).is_err());
    }
}
