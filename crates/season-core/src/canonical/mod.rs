//! Deterministic JSON canonicalization.
//!
//! All artifact hashing goes through this module: an artifact's identity
//! is the domain-separated hash of its canonical JSON form. The profile
//! is based on RFC 8785 (JCS — JSON Canonicalization Scheme) with
//! additional constraints for determinism across backends:
//!
//! - **Integer-only numbers**: floats are rejected. All share quantities
//!   in the ledger are fixed-point (parts-per-million) integers, so a
//!   float in an artifact is always a bug.
//! - **UTF-8 NFC normalized strings**: non-NFC strings are rejected.
//! - **Deterministic key ordering**: object keys are sorted
//!   lexicographically by UTF-8 byte order.
//! - **Maximum depth**: structures nested deeper than 128 levels are
//!   rejected.
//!
//! # Canonical output rules
//!
//! 1. Object keys sorted in byte order
//! 2. No whitespace between tokens
//! 3. Integers formatted without sign for zero, no leading zeros
//! 4. Strings use minimal escaping (only required escapes)
//!
//! # Example
//!
//! ```
//! use season_core::canonical::canonicalize;
//!
//! let value = serde_json::json!({"z": 1, "a": 2});
//! assert_eq!(canonicalize(&value).unwrap(), r#"{"a":2,"z":1}"#);
//! ```

mod json;

pub use json::{CanonicalError, MAX_DEPTH, canonical_bytes, canonicalize};
