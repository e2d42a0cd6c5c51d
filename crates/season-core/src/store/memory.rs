//! In-memory storage backend for tests and ephemeral tooling.

use std::collections::HashMap;
use std::sync::RwLock;

use super::backend::{BackendError, PutOutcome, StorageBackend, StoreStats, StoredRecord};
use crate::crypto::Hash32;

/// In-memory conditional key-value store.
///
/// Not suitable for production durability; exists so the full write
/// path can be exercised hermetically.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<HashMap<(String, String), StoredRecord>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes a record outright. Test-only escape hatch for
    /// simulating mirror data loss; the production surface has no
    /// delete.
    pub fn remove(&self, collection: &str, id: &str) {
        self.records
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(&(collection.to_string(), id.to_string()));
    }

    /// Overwrites a record's bytes in place, keeping the stored hash.
    /// Test-only escape hatch for simulating silent corruption.
    pub fn corrupt(&self, collection: &str, id: &str, bytes: Vec<u8>) {
        let mut guard = self
            .records
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(record) = guard.get_mut(&(collection.to_string(), id.to_string())) {
            record.bytes = bytes;
        }
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, collection: &str, id: &str) -> Result<Option<StoredRecord>, BackendError> {
        let guard = self
            .records
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(guard.get(&(collection.to_string(), id.to_string())).cloned())
    }

    fn put_if_absent_or_same_hash(
        &self,
        collection: &str,
        id: &str,
        bytes: &[u8],
        hash: &Hash32,
    ) -> Result<PutOutcome, BackendError> {
        let mut guard = self
            .records
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let key = (collection.to_string(), id.to_string());
        match guard.get(&key) {
            Some(existing) if existing.hash == *hash => Ok(PutOutcome::AlreadyPresent),
            Some(existing) => Ok(PutOutcome::Conflict {
                existing_hash: existing.hash,
            }),
            None => {
                guard.insert(
                    key,
                    StoredRecord {
                        bytes: bytes.to_vec(),
                        hash: *hash,
                    },
                );
                Ok(PutOutcome::Written)
            }
        }
    }

    fn list_ids(&self, collection: &str) -> Result<Vec<String>, BackendError> {
        let guard = self
            .records
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut ids: Vec<String> = guard
            .keys()
            .filter(|(c, _)| c == collection)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn stats(&self) -> Result<StoreStats, BackendError> {
        let guard = self
            .records
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut stats = StoreStats::default();
        for ((collection, _), record) in guard.iter() {
            stats.records += 1;
            stats.total_bytes += record.bytes.len() as u64;
            *stats.collections.entry(collection.clone()).or_insert(0) += 1;
        }
        Ok(stats)
    }
}

/// A backend that fails every call. Test double for mirror fail-open
/// behavior.
#[derive(Debug, Default)]
pub struct FailingBackend;

impl StorageBackend for FailingBackend {
    fn get(&self, collection: &str, id: &str) -> Result<Option<StoredRecord>, BackendError> {
        Err(BackendError::Corrupt {
            collection: collection.to_string(),
            id: id.to_string(),
            message: "backend unavailable".to_string(),
        })
    }

    fn put_if_absent_or_same_hash(
        &self,
        collection: &str,
        id: &str,
        _bytes: &[u8],
        _hash: &Hash32,
    ) -> Result<PutOutcome, BackendError> {
        Err(BackendError::Corrupt {
            collection: collection.to_string(),
            id: id.to_string(),
            message: "backend unavailable".to_string(),
        })
    }

    fn list_ids(&self, collection: &str) -> Result<Vec<String>, BackendError> {
        Err(BackendError::Corrupt {
            collection: collection.to_string(),
            id: String::new(),
            message: "backend unavailable".to_string(),
        })
    }

    fn stats(&self) -> Result<StoreStats, BackendError> {
        Err(BackendError::Corrupt {
            collection: String::new(),
            id: String::new(),
            message: "backend unavailable".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::ArtifactHasher;

    #[test]
    fn test_put_then_get() {
        let backend = MemoryBackend::new();
        let hash = ArtifactHasher::hash_content(b"payload");
        let outcome = backend
            .put_if_absent_or_same_hash("c", "id", b"payload", &hash)
            .unwrap();
        assert_eq!(outcome, PutOutcome::Written);

        let record = backend.get("c", "id").unwrap().unwrap();
        assert_eq!(record.bytes, b"payload");
        assert_eq!(record.hash, hash);
    }

    #[test]
    fn test_same_hash_idempotent() {
        let backend = MemoryBackend::new();
        let hash = ArtifactHasher::hash_content(b"payload");
        backend
            .put_if_absent_or_same_hash("c", "id", b"payload", &hash)
            .unwrap();
        let outcome = backend
            .put_if_absent_or_same_hash("c", "id", b"payload", &hash)
            .unwrap();
        assert_eq!(outcome, PutOutcome::AlreadyPresent);
    }

    #[test]
    fn test_different_hash_conflicts() {
        let backend = MemoryBackend::new();
        let h1 = ArtifactHasher::hash_content(b"one");
        let h2 = ArtifactHasher::hash_content(b"two");
        backend
            .put_if_absent_or_same_hash("c", "id", b"one", &h1)
            .unwrap();
        let outcome = backend
            .put_if_absent_or_same_hash("c", "id", b"two", &h2)
            .unwrap();
        assert_eq!(outcome, PutOutcome::Conflict { existing_hash: h1 });

        // Stored value unchanged.
        assert_eq!(backend.get("c", "id").unwrap().unwrap().bytes, b"one");
    }

    #[test]
    fn test_list_ids_sorted() {
        let backend = MemoryBackend::new();
        for id in ["zeta", "alpha", "mid"] {
            let hash = ArtifactHasher::hash_content(id.as_bytes());
            backend
                .put_if_absent_or_same_hash("c", id, id.as_bytes(), &hash)
                .unwrap();
        }
        assert_eq!(backend.list_ids("c").unwrap(), vec!["alpha", "mid", "zeta"]);
    }
}
