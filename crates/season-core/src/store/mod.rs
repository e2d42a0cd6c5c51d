//! Write-once artifact store with lifecycle enforcement.
//!
//! The store composes two [`StorageBackend`]s — a local authoritative
//! store and an optional remote mirror — behind a single write path
//! that enforces, in order:
//!
//! 1. **Freeze dominance**: a frozen season rejects every write.
//! 2. **Finalization**: a `FINALIZED` end receipt blocks season-scoped
//!    writes.
//! 3. **Temporal lock**: writes must land inside the sealed window
//!    `[start_ms, end_ms)`; a missing window is tolerated with a
//!    one-time diagnostic.
//! 4. **Activation gate**: most season-scoped kinds require an
//!    `ACTIVATED` receipt.
//! 5. **Drift guard**: for activated seasons, the live protocol
//!    fingerprint must match the captured baseline; divergence freezes
//!    the season permanently.
//! 6. **Immutability**: a key that holds hash `h1` rejects any write of
//!    `h2 != h1`, forever. Re-writing the same hash is a no-op success.
//!
//! Every rejection emits an immutable [`ViolationRecord`] before
//! returning. Mirror writes are best-effort: failures are counted and
//! logged, never propagated.
//!
//! [`ViolationRecord`]: crate::artifact::ViolationRecord

mod backend;
mod memory;
mod season_store;
mod sqlite;

pub use backend::{BackendError, PutOutcome, StorageBackend, StoreStats, StoredRecord};
pub use memory::{FailingBackend, MemoryBackend};
pub use season_store::{MirrorWriteOutcome, RejectReason, SeasonStore, StoreError, WriteOutcome};
pub use sqlite::SqliteBackend;
