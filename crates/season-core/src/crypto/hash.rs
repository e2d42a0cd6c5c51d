//! Blake3 hashing and the 32-byte content hash type.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Size of a Blake3 hash in bytes.
pub const HASH_SIZE: usize = 32;

/// A 32-byte content hash.
///
/// Serializes as a lowercase hex string so canonical JSON stays
/// byte-stable across backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash32(pub [u8; HASH_SIZE]);

/// Errors that can occur when parsing a hash from hex.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HashParseError {
    /// The input length is not exactly 64 hex characters.
    #[error("invalid hash length: expected 64 hex chars, got {actual}")]
    InvalidLength {
        /// The actual input length.
        actual: usize,
    },

    /// The input contains a non-hex character.
    #[error("invalid hex character {char:?} at offset {offset}")]
    InvalidChar {
        /// The offending character.
        char: char,
        /// Byte offset of the offending character.
        offset: usize,
    },
}

impl Hash32 {
    /// The all-zero hash, used as a placeholder for absent lineage.
    pub const ZERO: Self = Self([0u8; HASH_SIZE]);

    /// Returns the raw bytes of the hash.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Encodes the hash as a lowercase hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(HASH_SIZE * 2);
        for b in &self.0 {
            use std::fmt::Write as _;
            let _ = write!(out, "{b:02x}");
        }
        out
    }

    /// Returns the first `n` hex characters of the hash.
    ///
    /// Used for short identifiers such as audit pack filenames.
    #[must_use]
    pub fn hex_prefix(&self, n: usize) -> String {
        let mut hex = self.to_hex();
        hex.truncate(n);
        hex
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Hash32 {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != HASH_SIZE * 2 {
            return Err(HashParseError::InvalidLength { actual: s.len() });
        }
        if let Some((offset, char)) = s.char_indices().find(|(_, c)| !c.is_ascii_hexdigit()) {
            return Err(HashParseError::InvalidChar { char, offset });
        }
        let mut bytes = [0u8; HASH_SIZE];
        for (i, byte) in bytes.iter_mut().enumerate() {
            // All-hex and exact length are checked above.
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).unwrap_or(0);
        }
        Ok(Self(bytes))
    }
}

impl Serialize for Hash32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// Hasher for ledger artifacts using Blake3.
///
/// Every artifact kind hashes under its own domain tag, so identical
/// canonical bytes stored under two kinds produce distinct hashes.
pub struct ArtifactHasher;

impl ArtifactHasher {
    /// Hashes raw content without domain separation.
    ///
    /// Use this only for opaque byte streams (e.g. the audit pack body);
    /// artifact identity always goes through [`Self::hash_domain`].
    #[must_use]
    pub fn hash_content(content: &[u8]) -> Hash32 {
        Hash32(*blake3::hash(content).as_bytes())
    }

    /// Hashes content under a domain tag: `H(domain || content)`.
    #[must_use]
    pub fn hash_domain(domain: &[u8], content: &[u8]) -> Hash32 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(domain);
        hasher.update(content);
        Hash32(*hasher.finalize().as_bytes())
    }

    /// Combines an ordered list of hashes under a domain tag.
    ///
    /// This is the chaining primitive: `H(domain || h1 || h2 || ...)`.
    /// Any change to an upstream hash changes every hash combined over
    /// it, transitively.
    #[must_use]
    pub fn combine(domain: &[u8], parts: &[&Hash32]) -> Hash32 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(domain);
        for part in parts {
            hasher.update(part.as_bytes());
        }
        Hash32(*hasher.finalize().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_content_deterministic() {
        let a = ArtifactHasher::hash_content(b"season ledger");
        let b = ArtifactHasher::hash_content(b"season ledger");
        assert_eq!(a, b);
        assert_ne!(a, ArtifactHasher::hash_content(b"different"));
    }

    #[test]
    fn test_domain_separation() {
        let a = ArtifactHasher::hash_domain(b"KIND_A", b"content");
        let b = ArtifactHasher::hash_domain(b"KIND_B", b"content");
        assert_ne!(a, b);
    }

    #[test]
    fn test_combine_order_sensitive() {
        let h1 = ArtifactHasher::hash_content(b"one");
        let h2 = ArtifactHasher::hash_content(b"two");
        let ab = ArtifactHasher::combine(b"SEAL", &[&h1, &h2]);
        let ba = ArtifactHasher::combine(b"SEAL", &[&h2, &h1]);
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_hex_round_trip() {
        let hash = ArtifactHasher::hash_content(b"round trip");
        let hex = hash.to_hex();
        assert_eq!(hex.len(), 64);
        let parsed: Hash32 = hex.parse().unwrap();
        assert_eq!(parsed, hash);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            "abc".parse::<Hash32>(),
            Err(HashParseError::InvalidLength { actual: 3 })
        ));
        let bad = "zz".repeat(32);
        assert!(matches!(
            bad.parse::<Hash32>(),
            Err(HashParseError::InvalidChar { .. })
        ));
    }

    #[test]
    fn test_hex_prefix() {
        let hash = ArtifactHasher::hash_content(b"prefix");
        assert_eq!(hash.hex_prefix(12).len(), 12);
        assert!(hash.to_hex().starts_with(&hash.hex_prefix(12)));
    }
}
