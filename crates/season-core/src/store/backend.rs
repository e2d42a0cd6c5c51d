//! Storage backend contract.
//!
//! Implemented twice (local authoritative store, optional remote
//! mirror) and composed by [`super::SeasonStore`]. A backend is a dumb
//! conditional key-value surface: all lifecycle policy lives above it.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::crypto::Hash32;

/// A stored artifact record: canonical bytes plus the content hash the
/// writer claimed for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Canonical artifact bytes.
    pub bytes: Vec<u8>,
    /// Content hash recorded at first write.
    pub hash: Hash32,
}

/// Outcome of a conditional put.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The key was empty; the record is now stored.
    Written,
    /// The key already held the same hash; nothing changed.
    AlreadyPresent,
    /// The key holds a different hash; nothing changed.
    Conflict {
        /// The hash already stored under the key.
        existing_hash: Hash32,
    },
}

/// Per-backend storage statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Total records stored.
    pub records: u64,
    /// Total stored bytes.
    pub total_bytes: u64,
    /// Record count per collection.
    pub collections: BTreeMap<String, u64>,
}

/// Errors surfaced by a storage backend.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackendError {
    /// Database error from `SQLite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error during storage operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored record is structurally invalid.
    #[error("corrupt record {collection}/{id}: {message}")]
    Corrupt {
        /// Collection of the corrupt record.
        collection: String,
        /// Id of the corrupt record.
        id: String,
        /// Description of the corruption.
        message: String,
    },
}

/// Conditional key-value contract for artifact persistence.
///
/// Implementations must be safe to call concurrently for the same key:
/// `put_if_absent_or_same_hash` is a compare-and-swap-once-ever, so two
/// racing first-writes of the same hash both succeed and racing writes
/// of different hashes resolve to exactly one winner.
///
/// Calls must be bounded in time by the implementation; the composed
/// store never wraps a backend call in its own timeout, and a slow
/// mirror must not be able to stall activation.
pub trait StorageBackend: Send + Sync {
    /// Reads the record stored under `(collection, id)`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if the backend cannot be read.
    fn get(&self, collection: &str, id: &str) -> Result<Option<StoredRecord>, BackendError>;

    /// Stores a record iff the key is empty or already holds the same
    /// hash.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if the backend cannot be written.
    fn put_if_absent_or_same_hash(
        &self,
        collection: &str,
        id: &str,
        bytes: &[u8],
        hash: &Hash32,
    ) -> Result<PutOutcome, BackendError>;

    /// Lists all ids in a collection, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if the backend cannot be read.
    fn list_ids(&self, collection: &str) -> Result<Vec<String>, BackendError>;

    /// Returns storage statistics.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if the backend cannot be read.
    fn stats(&self) -> Result<StoreStats, BackendError>;
}
