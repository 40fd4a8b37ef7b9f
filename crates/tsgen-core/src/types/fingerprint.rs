//! Schema fingerprint type.
//!
//! This module provides the [`Fingerprint`] newtype, a lowercase hexadecimal
//! SHA-256 digest used to decide whether a schema changed since the last
//! successful generation.

use std::fmt;

use sha2::{Digest, Sha256};

/// A SHA-256 content digest rendered as 64 lowercase hexadecimal characters.
///
/// Fingerprints are compared by value. Two fingerprints are equal exactly
/// when their digests are equal, so a stored fingerprint read back from disk
/// compares equal to a freshly computed one for the same schema.
///
/// # Examples
///
/// ```
/// use tsgen_core::Fingerprint;
///
/// let fp = Fingerprint::of_bytes(b"abc");
/// assert_eq!(
///     fp.as_str(),
///     "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
/// );
/// assert_eq!(Fingerprint::parse(fp.as_str()), Some(fp));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Length of the hexadecimal rendering.
    pub const HEX_LEN: usize = 64;

    /// Computes the fingerprint of a byte stream.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    /// Parses a fingerprint from its textual form.
    ///
    /// Surrounding whitespace is ignored and uppercase digits are accepted.
    /// Returns `None` unless the input is exactly [`HEX_LEN`](Self::HEX_LEN)
    /// hexadecimal characters.
    ///
    /// # Examples
    ///
    /// ```
    /// use tsgen_core::Fingerprint;
    ///
    /// assert!(Fingerprint::parse(&"ab".repeat(32)).is_some());
    /// assert!(Fingerprint::parse("not-a-digest").is_none());
    /// assert!(Fingerprint::parse(&"ab".repeat(31)).is_none());
    /// ```
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.len() != Self::HEX_LEN || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(text.to_ascii_lowercase()))
    }

    /// Returns the hexadecimal digest.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the first twelve characters, for log lines.
    #[inline]
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_of_bytes_empty_input() {
        let fp = Fingerprint::of_bytes(b"");
        assert_eq!(
            fp.as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(fp.as_str().len(), Fingerprint::HEX_LEN);
    }

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        let upper = format!("  {}\n", "AB".repeat(32));
        let fp = Fingerprint::parse(&upper).expect("valid fingerprint");
        assert_eq!(fp.as_str(), "ab".repeat(32));
    }

    #[test]
    fn test_parse_rejects_non_hex() {
        let mut text = "a".repeat(63);
        text.push('z');
        assert!(Fingerprint::parse(&text).is_none());
        assert!(Fingerprint::parse("").is_none());
    }

    #[test]
    fn test_short_and_display() {
        let fp = Fingerprint::of_bytes(b"abc");
        assert_eq!(fp.short(), "ba7816bf8f01");
        assert_eq!(fp.to_string(), fp.as_str());
    }
}
