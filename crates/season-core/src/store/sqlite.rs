//! `SQLite`-backed storage backend.
//!
//! Uses WAL mode for concurrent reads while writes are in progress.
//! The conditional put runs inside an immediate transaction so the
//! read-before-write check and the insert are atomic: racing
//! first-writes of different hashes resolve to exactly one winner.

// SQLite returns i64 for row counts and sizes; they're always
// non-negative here.
#![allow(clippy::cast_sign_loss)]

use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension, params};

use super::backend::{BackendError, PutOutcome, StorageBackend, StoreStats, StoredRecord};
use crate::crypto::{HASH_SIZE, Hash32};

const SCHEMA_SQL: &str = "\
CREATE TABLE IF NOT EXISTS artifacts (
    collection TEXT NOT NULL,
    id         TEXT NOT NULL,
    hash       BLOB NOT NULL,
    bytes      BLOB NOT NULL,
    stored_ms  INTEGER NOT NULL,
    PRIMARY KEY (collection, id)
);
";

/// `SQLite`-backed conditional key-value store.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Opens (or creates) a backend at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if the database cannot be opened or
    /// the schema cannot be applied.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Opens an in-memory backend (tests).
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if the database cannot be opened.
    pub fn open_in_memory() -> Result<Self, BackendError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, BackendError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn decode_hash(collection: &str, id: &str, blob: &[u8]) -> Result<Hash32, BackendError> {
        let bytes: [u8; HASH_SIZE] =
            blob.try_into()
                .map_err(|_| BackendError::Corrupt {
                    collection: collection.to_string(),
                    id: id.to_string(),
                    message: format!("hash blob has {} bytes, expected {HASH_SIZE}", blob.len()),
                })?;
        Ok(Hash32(bytes))
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

impl StorageBackend for SqliteBackend {
    fn get(&self, collection: &str, id: &str) -> Result<Option<StoredRecord>, BackendError> {
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let row: Option<(Vec<u8>, Vec<u8>)> = conn
            .query_row(
                "SELECT hash, bytes FROM artifacts WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((hash_blob, bytes)) => Ok(Some(StoredRecord {
                hash: Self::decode_hash(collection, id, &hash_blob)?,
                bytes,
            })),
        }
    }

    fn put_if_absent_or_same_hash(
        &self,
        collection: &str,
        id: &str,
        bytes: &[u8],
        hash: &Hash32,
    ) -> Result<PutOutcome, BackendError> {
        let mut conn = self
            .conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let existing: Option<Vec<u8>> = tx
            .query_row(
                "SELECT hash FROM artifacts WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;

        let outcome = match existing {
            Some(blob) => {
                let existing_hash = Self::decode_hash(collection, id, &blob)?;
                if existing_hash == *hash {
                    PutOutcome::AlreadyPresent
                } else {
                    PutOutcome::Conflict { existing_hash }
                }
            }
            None => {
                tx.execute(
                    "INSERT INTO artifacts (collection, id, hash, bytes, stored_ms)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        collection,
                        id,
                        hash.as_bytes().as_slice(),
                        bytes,
                        i64::try_from(Self::now_ms()).unwrap_or(i64::MAX)
                    ],
                )?;
                PutOutcome::Written
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    fn list_ids(&self, collection: &str) -> Result<Vec<String>, BackendError> {
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut stmt =
            conn.prepare("SELECT id FROM artifacts WHERE collection = ?1 ORDER BY id")?;
        let ids = stmt
            .query_map(params![collection], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn stats(&self) -> Result<StoreStats, BackendError> {
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut stmt = conn.prepare(
            "SELECT collection, COUNT(*), COALESCE(SUM(LENGTH(bytes)), 0)
             FROM artifacts GROUP BY collection ORDER BY collection",
        )?;
        let mut stats = StoreStats::default();
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        for row in rows {
            let (collection, count, bytes) = row?;
            stats.records += count as u64;
            stats.total_bytes += bytes as u64;
            stats.collections.insert(collection, count as u64);
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::ArtifactHasher;

    #[test]
    fn test_conflict_semantics_survive_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ledger.db");
        let h1 = ArtifactHasher::hash_content(b"one");

        {
            let backend = SqliteBackend::open(&path).unwrap();
            assert_eq!(
                backend
                    .put_if_absent_or_same_hash("c", "id", b"one", &h1)
                    .unwrap(),
                PutOutcome::Written
            );
        }

        let backend = SqliteBackend::open(&path).unwrap();
        let h2 = ArtifactHasher::hash_content(b"two");
        assert_eq!(
            backend
                .put_if_absent_or_same_hash("c", "id", b"two", &h2)
                .unwrap(),
            PutOutcome::Conflict { existing_hash: h1 }
        );
        assert_eq!(backend.get("c", "id").unwrap().unwrap().bytes, b"one");
    }

    #[test]
    fn test_stats_by_collection() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        for (collection, id) in [("a", "1"), ("a", "2"), ("b", "1")] {
            let hash = ArtifactHasher::hash_content(id.as_bytes());
            backend
                .put_if_absent_or_same_hash(collection, id, id.as_bytes(), &hash)
                .unwrap();
        }
        let stats = backend.stats().unwrap();
        assert_eq!(stats.records, 3);
        assert_eq!(stats.collections["a"], 2);
        assert_eq!(stats.collections["b"], 1);
    }
}
