//! Order-preserving key prefix rewriting.

use crate::error::{Error, Result};
use crate::keys::{prefix_end, pretty_key, Span};
use serde::{Deserialize, Serialize};

/// Replace a leading `old_prefix` with `new_prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyRewrite {
    /// Prefix of keys in the source keyspace.
    pub old_prefix: Vec<u8>,
    /// Prefix the matching keys are moved under.
    pub new_prefix: Vec<u8>,
}

impl KeyRewrite {
    /// Creates a new rule.
    pub fn new(old_prefix: impl Into<Vec<u8>>, new_prefix: impl Into<Vec<u8>>) -> Self {
        Self { old_prefix: old_prefix.into(), new_prefix: new_prefix.into() }
    }
}

/// An ordered set of prefix rewrite rules.
///
/// Rules are tried in declared order and the first whose `old_prefix`
/// matches wins. Construction rejects rule sets in which one `old_prefix` is
/// a prefix of another, so at most one rule can ever match a key.
///
/// Rewriting only swaps the matched prefix, so for two keys `a < b` under
/// the same rule, `rewrite_key(a) < rewrite_key(b)`.
///
/// # Example
///
/// ```rust
/// use kvimport::import::{KeyRewrite, KeyRewriter};
///
/// let kr = KeyRewriter::new(vec![KeyRewrite::new(b"/t/51/".to_vec(), b"/t/100/".to_vec())]).unwrap();
/// assert_eq!(kr.rewrite_key(b"/t/51/foo"), Some(b"/t/100/foo".to_vec()));
/// assert_eq!(kr.rewrite_key(b"/t/52/foo"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRewriter {
    rules: Vec<KeyRewrite>,
}

impl KeyRewriter {
    /// Creates a rewriter, rejecting ambiguous rule sets.
    pub fn new(rules: Vec<KeyRewrite>) -> Result<Self> {
        for (i, a) in rules.iter().enumerate() {
            for b in &rules[i + 1..] {
                if a.old_prefix.starts_with(&b.old_prefix) || b.old_prefix.starts_with(&a.old_prefix)
                {
                    return Err(Error::invalid_argument(format!(
                        "ambiguous rewrite rules: old prefixes {} and {} overlap",
                        pretty_key(&a.old_prefix),
                        pretty_key(&b.old_prefix)
                    )));
                }
            }
        }
        Ok(Self { rules })
    }

    /// The rules in declared order.
    pub fn rules(&self) -> &[KeyRewrite] {
        &self.rules
    }

    /// Rewrites `key` with the first matching rule, or returns None if no
    /// rule matches.
    pub fn rewrite_key(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.rules.iter().find(|rule| key.starts_with(&rule.old_prefix)).map(|rule| {
            let suffix = &key[rule.old_prefix.len()..];
            let mut out = Vec::with_capacity(rule.new_prefix.len() + suffix.len());
            out.extend_from_slice(&rule.new_prefix);
            out.extend_from_slice(suffix);
            out
        })
    }

    /// Rewrites an exclusive upper bound.
    ///
    /// A bound under a rule's old prefix is rewritten like any key. A bound
    /// equal to `prefix_end(old_prefix)` (the end of a whole rewritten
    /// keyspace) does not itself start with the old prefix and maps to
    /// `prefix_end(new_prefix)`.
    ///
    /// Fails with `UnrewritableKey` if no rule applies, and with
    /// `InvalidArgument` if the matching new prefix is all `0xFF` bytes and
    /// so has no successor to bound it.
    pub fn rewrite_end_key(&self, end: &[u8]) -> Result<Vec<u8>> {
        if let Some(rewritten) = self.rewrite_key(end) {
            return Ok(rewritten);
        }
        let rule = self
            .rules
            .iter()
            .find(|rule| prefix_end(&rule.old_prefix).as_deref() == Some(end))
            .ok_or_else(|| Error::UnrewritableKey { key: pretty_key(end) })?;
        prefix_end(&rule.new_prefix).ok_or_else(|| no_successor(&rule.new_prefix))
    }

    /// Computes a destination exclusive bound from the last key still inside
    /// a source range: rewrite it, then take its prefix successor.
    ///
    /// The bound always sorts after the rewritten key. A rewritten key made
    /// only of `0xFF` bytes has no such bound and is rejected with
    /// `InvalidArgument`.
    pub fn rewrite_exclusive_end(&self, last_key_inside: &[u8]) -> Result<Vec<u8>> {
        let rewritten = self
            .rewrite_key(last_key_inside)
            .ok_or_else(|| Error::UnrewritableKey { key: pretty_key(last_key_inside) })?;
        prefix_end(&rewritten).ok_or_else(|| no_successor(&rewritten))
    }

    /// Maps a source span into the destination keyspace.
    pub fn rewrite_span(&self, span: &Span) -> Result<Span> {
        let key = self
            .rewrite_key(&span.key)
            .ok_or_else(|| Error::UnrewritableKey { key: pretty_key(&span.key) })?;
        let end_key =
            if span.end_key.is_empty() { Vec::new() } else { self.rewrite_end_key(&span.end_key)? };
        Ok(Span { key, end_key })
    }
}

fn no_successor(key: &[u8]) -> Error {
    Error::invalid_argument(format!(
        "{} has no successor key to use as an exclusive bound",
        pretty_key(key)
    ))
}
