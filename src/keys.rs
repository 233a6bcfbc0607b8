//! Key and span helpers shared by the rewriter, the scanner and the store.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A half-open key range `[key, end_key)`.
///
/// An empty `end_key` means the span has no explicit upper bound: it covers
/// only `key` when used as a lookup, and is treated as unbounded above when
/// used as a scan or write range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Inclusive start key.
    pub key: Vec<u8>,
    /// Exclusive end key.
    #[serde(default)]
    pub end_key: Vec<u8>,
}

impl Span {
    /// Creates a span covering `[key, end_key)`.
    pub fn new(key: impl Into<Vec<u8>>, end_key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into(), end_key: end_key.into() }
    }

    /// Returns true if `key` falls inside the span.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        key >= self.key.as_slice() && (self.end_key.is_empty() || key < self.end_key.as_slice())
    }

    /// Returns true if the span has an explicit end that is not after its start.
    pub fn is_inverted(&self) -> bool {
        !self.end_key.is_empty() && self.end_key <= self.key
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", pretty_key(&self.key), pretty_key(&self.end_key))
    }
}

/// Returns the smallest key that sorts after every key with the given prefix.
///
/// Trailing `0xFF` bytes are dropped and the last remaining byte incremented.
/// A prefix made only of `0xFF` bytes (or an empty prefix) has no successor
/// and yields None.
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let idx = prefix.iter().rposition(|&b| b != 0xFF)?;
    let mut out = prefix[..=idx].to_vec();
    out[idx] += 1;
    Some(out)
}

/// Renders a key for logs and error messages, escaping non-printable bytes.
pub fn pretty_key(key: &[u8]) -> String {
    let mut out = String::with_capacity(key.len() + 2);
    out.push('"');
    for &b in key {
        if b.is_ascii_graphic() || b == b' ' {
            if b == b'"' || b == b'\\' {
                out.push('\\');
            }
            out.push(b as char);
        } else {
            out.push_str(&format!("\\x{:02x}", b));
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_end() {
        assert_eq!(prefix_end(b"abc"), Some(b"abd".to_vec()));
        assert_eq!(prefix_end(&[0x01, 0xFF, 0xFF]), Some(vec![0x02]));
        assert_eq!(prefix_end(&[0xFF, 0xFF]), None);
        assert_eq!(prefix_end(b""), None);
    }

    #[test]
    fn test_prefix_end_bounds_prefixed_keys() {
        let end = prefix_end(b"table/51/").unwrap();
        assert!(b"table/51/zzzz".as_slice() < end.as_slice());
        assert!(b"table/51/\xff\xff".as_slice() < end.as_slice());
        assert!(b"table/52".as_slice() >= end.as_slice());
    }

    #[test]
    fn test_span_contains() {
        let span = Span::new(b"b".to_vec(), b"d".to_vec());
        assert!(!span.contains_key(b"a"));
        assert!(span.contains_key(b"b"));
        assert!(span.contains_key(b"c\xff"));
        assert!(!span.contains_key(b"d"));

        let open = Span::new(b"b".to_vec(), Vec::new());
        assert!(open.contains_key(b"zzz"));
        assert!(!open.contains_key(b"a"));
    }

    #[test]
    fn test_span_inverted() {
        assert!(Span::new(b"d".to_vec(), b"b".to_vec()).is_inverted());
        assert!(Span::new(b"d".to_vec(), b"d".to_vec()).is_inverted());
        assert!(!Span::new(b"d".to_vec(), Vec::new()).is_inverted());
    }

    #[test]
    fn test_pretty_key() {
        assert_eq!(pretty_key(b"foo"), "\"foo\"");
        assert_eq!(pretty_key(&[0x01, b'a']), "\"\\x01a\"");
    }
}
