//! Immutable byte strings.

use std::fmt;

use crate::{
    heap::HeapId,
    types::{Kind, PyTrait, clamp_slice},
};

/// An immutable byte string.
///
/// Bytes are not required to be UTF-8; conversions to Rust text are lossy.
/// Comparison is lexicographic by byte value with length as the tiebreaker,
/// which is exactly the ordering of `[u8]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Str(Box<[u8]>);

impl Str {
    pub fn new(bytes: impl Into<Box<[u8]>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lossy UTF-8 rendering of the bytes.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }

    /// New string holding `self` followed by `other`.
    pub fn concat(&self, other: &Self) -> Self {
        let mut bytes = Vec::with_capacity(self.len() + other.len());
        bytes.extend_from_slice(&self.0);
        bytes.extend_from_slice(&other.0);
        Self(bytes.into_boxed_slice())
    }

    /// One-character string at `index`, or None when out of range.
    pub fn char_at(&self, index: usize) -> Option<Self> {
        self.0.get(index).map(|&b| Self(Box::new([b])))
    }

    /// Copy of the bytes in `[lo, hi)` after clamping both bounds to `[0, len]`.
    pub fn slice(&self, lo: i64, hi: i64) -> Self {
        let (lo, hi) = clamp_slice(lo, hi, self.len());
        Self(self.0[lo..hi].into())
    }
}

impl From<&str> for Str {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().into())
    }
}

impl From<String> for Str {
    fn from(s: String) -> Self {
        Self(s.into_bytes().into_boxed_slice())
    }
}

impl fmt::Display for Str {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl PyTrait for Str {
    fn py_kind(&self) -> Kind {
        Kind::Str
    }

    fn py_estimate_size(&self) -> usize {
        self.0.len()
    }

    fn py_len(&self) -> Option<usize> {
        Some(self.0.len())
    }

    fn py_dec_ref_ids(&mut self, _stack: &mut Vec<HeapId>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_bytewise_then_length() {
        assert!(Str::from("abc") < Str::from("abd"));
        assert!(Str::from("ab") < Str::from("abc"));
        assert!(Str::from("b") > Str::from("abc"));
    }

    #[test]
    fn slice_clamps_bounds() {
        let s = Str::from("hello");
        assert_eq!(s.slice(1, 3).as_bytes(), b"el");
        assert_eq!(s.slice(-4, 99).as_bytes(), b"hello");
        assert_eq!(s.slice(4, 2).as_bytes(), b"");
    }

    #[test]
    fn char_at_is_bounds_checked() {
        let s = Str::from("hi");
        assert_eq!(s.char_at(1).map(|c| c.to_string()), Some("i".to_owned()));
        assert!(s.char_at(2).is_none());
    }
}
