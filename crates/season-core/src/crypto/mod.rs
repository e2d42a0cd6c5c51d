//! Cryptographic primitives for artifact identity.
//!
//! All artifact identity in the ledger is content-addressed: two
//! artifacts are equal iff the Blake3 hashes of their canonical
//! serializations are equal. Hashes are domain-separated per artifact
//! kind so the same bytes can never collide across kinds.

mod hash;

pub use hash::{ArtifactHasher, HASH_SIZE, Hash32, HashParseError};
