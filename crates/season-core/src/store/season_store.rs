//! The composed write-once store for season artifacts.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, warn};

use super::backend::{BackendError, PutOutcome, StorageBackend, StoreStats, StoredRecord};
use crate::artifact::{ActivationDecision, ActivationReceipt, ArtifactCodecError, ArtifactKind,
    ArtifactPayload, FreezeCause, FreezeState, SeasonEndReceipt, SeasonWindow, SealedContract,
    Severity, ViolationCode, ViolationRecord, decode_payload, encode_payload};
use crate::canonical;
use crate::clock::Clock;
use crate::crypto::{ArtifactHasher, Hash32};
use crate::freeze::{self, FreezeCheck, FreezeError};

/// Hard errors from the store: backend failures and codec bugs.
///
/// Lifecycle rejections are *not* errors — they come back as
/// [`WriteOutcome::Rejected`] so the caller can proceed with the
/// existing value.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The authoritative local backend failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// An artifact failed to encode or decode.
    #[error(transparent)]
    Codec(#[from] ArtifactCodecError),
}

impl From<FreezeError> for StoreError {
    fn from(err: FreezeError) -> Self {
        match err {
            FreezeError::Backend(e) => Self::Backend(e),
            FreezeError::Codec(e) => Self::Codec(e),
        }
    }
}

/// Why a write was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The season is frozen; every write is rejected.
    Frozen,
    /// A `FINALIZED` end receipt exists.
    Finalized,
    /// The write landed outside the sealed window.
    OutOfWindow {
        /// The clock reading at write time.
        now_ms: u64,
        /// The sealed window.
        window: SeasonWindow,
    },
    /// No `ACTIVATED` receipt exists for the season.
    ActivationRequired,
    /// The key already holds different content.
    ImmutabilityConflict {
        /// The hash already stored.
        existing_hash: Hash32,
        /// The hash that was attempted.
        attempted_hash: Hash32,
    },
    /// The drift guard froze the season during this write.
    Drift {
        /// Why the guard froze the season.
        cause: FreezeCause,
    },
}

/// Outcome of a write through the composed store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// First write; the record is now stored on the local backend.
    Wrote {
        /// The stored content hash.
        hash: Hash32,
    },
    /// The key already held the identical content; no-op success.
    AlreadyPresentSameHash {
        /// The stored content hash.
        hash: Hash32,
    },
    /// The write was rejected; a violation record was emitted.
    Rejected(RejectReason),
}

impl WriteOutcome {
    /// The stored hash, when the write was accepted.
    #[must_use]
    pub const fn hash(&self) -> Option<Hash32> {
        match self {
            Self::Wrote { hash } | Self::AlreadyPresentSameHash { hash } => Some(*hash),
            Self::Rejected(_) => None,
        }
    }

    /// Whether the artifact is durably stored after this call.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(
            self,
            Self::Wrote { .. } | Self::AlreadyPresentSameHash { .. }
        )
    }
}

/// Outcome of a best-effort mirror write.
///
/// Kept as an explicit type so the fail-open policy stays visible in
/// signatures: the error variant is counted and logged, never
/// propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorWriteOutcome {
    /// The mirror accepted the record (or already had it).
    Mirrored,
    /// No mirror is configured.
    Skipped,
    /// The mirror failed or diverged; the parity checker will surface
    /// it.
    Failed,
}

/// The composed write-once store.
pub struct SeasonStore {
    local: Arc<dyn StorageBackend>,
    mirror: Option<Arc<dyn StorageBackend>>,
    clock: Arc<dyn Clock>,
    config_hash: Hash32,
    /// Seasons already warned about a missing sealed window.
    window_warned: Mutex<HashSet<String>>,
    /// Fast path over the persisted `FROZEN` markers.
    frozen_cache: RwLock<HashSet<String>>,
    mirror_failures: AtomicU64,
}

impl SeasonStore {
    /// Creates a store over a local backend and an optional mirror.
    ///
    /// `config_hash` is the hash of the ledger configuration in force;
    /// it participates in the protocol fingerprint.
    pub fn new(
        local: Arc<dyn StorageBackend>,
        mirror: Option<Arc<dyn StorageBackend>>,
        clock: Arc<dyn Clock>,
        config_hash: Hash32,
    ) -> Self {
        Self {
            local,
            mirror,
            clock,
            config_hash,
            window_warned: Mutex::new(HashSet::new()),
            frozen_cache: RwLock::new(HashSet::new()),
            mirror_failures: AtomicU64::new(0),
        }
    }

    /// The authoritative local backend.
    #[must_use]
    pub fn local_backend(&self) -> &Arc<dyn StorageBackend> {
        &self.local
    }

    /// The remote mirror, when configured.
    #[must_use]
    pub fn mirror_backend(&self) -> Option<&Arc<dyn StorageBackend>> {
        self.mirror.as_ref()
    }

    /// Hash of the configuration in force.
    #[must_use]
    pub const fn config_hash(&self) -> Hash32 {
        self.config_hash
    }

    /// Number of mirror writes that failed since construction.
    #[must_use]
    pub fn mirror_failures(&self) -> u64 {
        self.mirror_failures.load(Ordering::Relaxed)
    }

    /// Reads a raw stored record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the local backend fails.
    pub fn read_record(
        &self,
        kind: ArtifactKind,
        id: &str,
    ) -> Result<Option<StoredRecord>, StoreError> {
        Ok(self.local.get(kind.collection(), id)?)
    }

    /// Reads and decodes a typed artifact with its stored hash.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails or the stored bytes
    /// do not decode into `T`.
    pub fn read<T: ArtifactPayload>(&self, id: &str) -> Result<Option<(T, Hash32)>, StoreError> {
        match self.local.get(T::KIND.collection(), id)? {
            None => Ok(None),
            Some(record) => {
                let payload = decode_payload::<T>(&record.bytes)?;
                Ok(Some((payload, record.hash)))
            }
        }
    }

    /// Lists all ids stored for a kind, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the local backend fails.
    pub fn list_ids(&self, kind: ArtifactKind) -> Result<Vec<String>, StoreError> {
        Ok(self.local.list_ids(kind.collection())?)
    }

    /// Local backend statistics.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the local backend fails.
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        Ok(self.local.stats()?)
    }

    /// Writes a typed artifact through the guarded write-once path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend or codec failure. Lifecycle
    /// rejections come back as [`WriteOutcome::Rejected`].
    pub fn write_artifact<T: ArtifactPayload>(
        &self,
        payload: &T,
    ) -> Result<WriteOutcome, StoreError> {
        let (bytes, hash) = encode_payload(payload)?;
        self.write_prepared(
            T::KIND,
            &payload.season_scope(),
            &payload.artifact_id(),
            &bytes,
            hash,
        )
    }

    /// Persists a failed activation attempt under an attempt-scoped
    /// key, leaving the canonical receipt key untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend or codec failure.
    pub fn write_activation_attempt(
        &self,
        receipt: &ActivationReceipt,
    ) -> Result<WriteOutcome, StoreError> {
        let value = serde_json::to_value(receipt).map_err(|e| ArtifactCodecError::Serialize {
            message: e.to_string(),
        })?;
        let bytes = canonical::canonical_bytes(&value).map_err(ArtifactCodecError::from)?;
        let hash = ArtifactHasher::hash_domain(ArtifactKind::ActivationAttempt.domain(), &bytes);
        let id = format!("{}/{}", receipt.season_id, hash.hex_prefix(16));
        self.write_prepared(
            ArtifactKind::ActivationAttempt,
            &receipt.season_id,
            &id,
            &bytes,
            hash,
        )
    }

    /// Whether the season is frozen (persisted truth, cached).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the local backend fails.
    pub fn is_frozen(&self, season_id: &str) -> Result<bool, StoreError> {
        {
            let cache = self
                .frozen_cache
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if cache.contains(season_id) {
                return Ok(true);
            }
        }
        let frozen = self
            .local
            .get(ArtifactKind::FreezeState.collection(), season_id)?
            .is_some();
        if frozen {
            self.frozen_cache
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .insert(season_id.to_string());
        }
        Ok(frozen)
    }

    /// Durably freezes a season. One-way; re-freezing is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the marker cannot be persisted.
    pub fn set_frozen(
        &self,
        season_id: &str,
        cause: FreezeCause,
        expected_fingerprint: Option<Hash32>,
        observed_fingerprint: Option<Hash32>,
    ) -> Result<(), StoreError> {
        if self.is_frozen(season_id)? {
            return Ok(());
        }
        let state = FreezeState {
            season_id: season_id.to_string(),
            cause,
            expected_fingerprint,
            observed_fingerprint,
        };
        let outcome = self.write_artifact(&state)?;
        debug_assert!(outcome.is_accepted(), "freeze marker write cannot be gated");
        self.frozen_cache
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(season_id.to_string());
        warn!(season_id, ?cause, "season frozen");
        Ok(())
    }

    /// The `ACTIVATED` receipt for a season, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend or decode failure.
    pub fn activated_receipt(
        &self,
        season_id: &str,
    ) -> Result<Option<(ActivationReceipt, Hash32)>, StoreError> {
        Ok(self
            .read::<ActivationReceipt>(season_id)?
            .filter(|(receipt, _)| receipt.decision == ActivationDecision::Activated))
    }

    /// The sealed window for a season, once a sealed contract exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend or decode failure.
    pub fn sealed_window(&self, season_id: &str) -> Result<Option<SeasonWindow>, StoreError> {
        Ok(self
            .read::<SealedContract>(season_id)?
            .map(|(sealed, _)| sealed.window))
    }

    /// All violations recorded for a season, sorted by record id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend or decode failure.
    pub fn violations_for(&self, season_id: &str) -> Result<Vec<ViolationRecord>, StoreError> {
        let mut out = Vec::new();
        for id in self.local.list_ids(ArtifactKind::Violation.collection())? {
            if let Some(record) = self.local.get(ArtifactKind::Violation.collection(), &id)? {
                let violation = decode_payload::<ViolationRecord>(&record.bytes)?;
                if violation.season_id == season_id {
                    out.push(violation);
                }
            }
        }
        Ok(out)
    }

    /// Records an anomaly observed outside the write path (replay
    /// mismatches, parity divergence, finalization hash mismatches).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the record cannot be persisted.
    pub fn record_violation(
        &self,
        code: ViolationCode,
        severity: Severity,
        season_id: &str,
        subject_kind: ArtifactKind,
        subject_id: &str,
        attempted_hash: Option<Hash32>,
        existing_hash: Option<Hash32>,
        detail: &str,
    ) -> Result<(), StoreError> {
        let violation = ViolationRecord {
            code,
            severity,
            season_id: season_id.to_string(),
            subject_collection: subject_kind.collection().to_string(),
            subject_id: subject_id.to_string(),
            attempted_hash,
            existing_hash,
            detail: detail.to_string(),
            observed_ms: self.clock.now_ms(),
        };
        warn!(
            season_id,
            code = ?violation.code,
            severity = ?violation.severity,
            subject = %format!("{}/{}", violation.subject_collection, violation.subject_id),
            detail,
            "violation recorded"
        );
        self.write_artifact(&violation)?;
        Ok(())
    }

    /// The guarded write path. See the module docs for the guard
    /// order.
    fn write_prepared(
        &self,
        kind: ArtifactKind,
        season_id: &str,
        id: &str,
        bytes: &[u8],
        hash: Hash32,
    ) -> Result<WriteOutcome, StoreError> {
        if !kind.audit_side() && kind != ArtifactKind::FreezeState {
            if let Some(rejection) = self.lifecycle_check(kind, season_id, id, hash)? {
                return Ok(WriteOutcome::Rejected(rejection));
            }
        }

        // Immutability: read-before-write, then conditional put. The
        // backend's compare-and-swap closes the race between the two.
        if let Some(existing) = self.local.get(kind.collection(), id)? {
            if existing.hash == hash {
                self.mirror_put(kind, id, bytes, &hash);
                return Ok(WriteOutcome::AlreadyPresentSameHash { hash });
            }
            return self.reject_conflict(kind, season_id, id, hash, existing.hash);
        }

        match self
            .local
            .put_if_absent_or_same_hash(kind.collection(), id, bytes, &hash)?
        {
            PutOutcome::Written => {
                debug!(collection = kind.collection(), id, %hash, "artifact stored");
                self.mirror_put(kind, id, bytes, &hash);
                Ok(WriteOutcome::Wrote { hash })
            }
            // Benign race: another first-write of the same hash won.
            PutOutcome::AlreadyPresent => {
                self.mirror_put(kind, id, bytes, &hash);
                Ok(WriteOutcome::AlreadyPresentSameHash { hash })
            }
            PutOutcome::Conflict { existing_hash } => {
                self.reject_conflict(kind, season_id, id, hash, existing_hash)
            }
        }
    }

    /// Runs the lifecycle guards; `Some(reason)` means the write is
    /// rejected (with the violation already recorded).
    fn lifecycle_check(
        &self,
        kind: ArtifactKind,
        season_id: &str,
        id: &str,
        hash: Hash32,
    ) -> Result<Option<RejectReason>, StoreError> {
        // Freeze dominates every other condition.
        if self.is_frozen(season_id)? {
            self.record_rejection(
                kind,
                season_id,
                id,
                ViolationCode::FrozenSeasonWrite,
                hash,
                None,
                "write rejected: season is frozen",
            )?;
            return Ok(Some(RejectReason::Frozen));
        }

        if kind.finalization_blocked() && self.read::<SeasonEndReceipt>(season_id)?.is_some() {
            self.record_rejection(
                kind,
                season_id,
                id,
                ViolationCode::PostFinalizationWrite,
                hash,
                None,
                "write rejected: season is finalized",
            )?;
            return Ok(Some(RejectReason::Finalized));
        }

        if kind.window_scoped() {
            match self.sealed_window(season_id)? {
                Some(window) => {
                    let now_ms = self.clock.now_ms();
                    if !window.contains(now_ms) {
                        self.record_rejection(
                            kind,
                            season_id,
                            id,
                            ViolationCode::OutOfWindowWrite,
                            hash,
                            None,
                            &format!(
                                "write at {now_ms} outside window [{}, {})",
                                window.start_ms, window.end_ms
                            ),
                        )?;
                        return Ok(Some(RejectReason::OutOfWindow { now_ms, window }));
                    }
                }
                None => {
                    let mut warned = self
                        .window_warned
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                    if warned.insert(season_id.to_string()) {
                        warn!(
                            season_id,
                            collection = kind.collection(),
                            "no sealed window yet; temporal lock not enforced"
                        );
                    }
                }
            }
        }

        if kind.activation_gated() && self.activated_receipt(season_id)?.is_none() {
            self.record_rejection(
                kind,
                season_id,
                id,
                ViolationCode::ActivationRequired,
                hash,
                None,
                "write rejected: season has no ACTIVATED receipt",
            )?;
            return Ok(Some(RejectReason::ActivationRequired));
        }

        // Drift guard: only meaningful once a season is activated. The
        // baseline itself is exempt — it is what the guard compares
        // against and is written moments after the receipt.
        if kind != ArtifactKind::FreezeBaseline
            && self.activated_receipt(season_id)?.is_some()
        {
            match freeze::evaluate(self.local.as_ref(), season_id, &self.config_hash)? {
                FreezeCheck::Ok => {}
                FreezeCheck::BaselineMissing => {
                    self.set_frozen(season_id, FreezeCause::BaselineMissing, None, None)?;
                    self.record_rejection(
                        kind,
                        season_id,
                        id,
                        ViolationCode::BaselineMissing,
                        hash,
                        None,
                        "activated season has no freeze baseline; frozen",
                    )?;
                    return Ok(Some(RejectReason::Drift {
                        cause: FreezeCause::BaselineMissing,
                    }));
                }
                FreezeCheck::Drift { expected, observed } => {
                    self.set_frozen(
                        season_id,
                        FreezeCause::Drift,
                        Some(expected),
                        Some(observed),
                    )?;
                    self.record_rejection(
                        kind,
                        season_id,
                        id,
                        ViolationCode::ProtocolDrift,
                        hash,
                        Some(expected),
                        &format!("fingerprint drift: expected {expected}, observed {observed}"),
                    )?;
                    return Ok(Some(RejectReason::Drift {
                        cause: FreezeCause::Drift,
                    }));
                }
            }
        }

        Ok(None)
    }

    fn reject_conflict(
        &self,
        kind: ArtifactKind,
        season_id: &str,
        id: &str,
        attempted_hash: Hash32,
        existing_hash: Hash32,
    ) -> Result<WriteOutcome, StoreError> {
        let code = if kind == ArtifactKind::ActivationReceipt {
            ViolationCode::ReceiptConflict
        } else {
            ViolationCode::ImmutableOverwrite
        };
        self.record_rejection(
            kind,
            season_id,
            id,
            code,
            attempted_hash,
            Some(existing_hash),
            "write rejected: key already holds different content",
        )?;
        Ok(WriteOutcome::Rejected(RejectReason::ImmutabilityConflict {
            existing_hash,
            attempted_hash,
        }))
    }

    fn record_rejection(
        &self,
        kind: ArtifactKind,
        season_id: &str,
        id: &str,
        code: ViolationCode,
        attempted_hash: Hash32,
        existing_hash: Option<Hash32>,
        detail: &str,
    ) -> Result<(), StoreError> {
        let severity = match code {
            ViolationCode::ProtocolDrift
            | ViolationCode::BaselineMissing
            | ViolationCode::FinalizationHashMismatch => Severity::Critical,
            _ => Severity::Error,
        };
        self.record_violation(
            code,
            severity,
            season_id,
            kind,
            id,
            Some(attempted_hash),
            existing_hash,
            detail,
        )
    }

    /// Best-effort mirror write. Failures are counted and logged,
    /// never propagated; the parity checker surfaces them later.
    fn mirror_put(
        &self,
        kind: ArtifactKind,
        id: &str,
        bytes: &[u8],
        hash: &Hash32,
    ) -> MirrorWriteOutcome {
        let Some(mirror) = &self.mirror else {
            return MirrorWriteOutcome::Skipped;
        };
        match mirror.put_if_absent_or_same_hash(kind.collection(), id, bytes, hash) {
            Ok(PutOutcome::Written | PutOutcome::AlreadyPresent) => MirrorWriteOutcome::Mirrored,
            Ok(PutOutcome::Conflict { existing_hash }) => {
                self.mirror_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    collection = kind.collection(),
                    id,
                    %existing_hash,
                    "mirror holds divergent content"
                );
                MirrorWriteOutcome::Failed
            }
            Err(error) => {
                self.mirror_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    collection = kind.collection(),
                    id,
                    %error,
                    "mirror write failed"
                );
                MirrorWriteOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ActivationContract, CompiledConstraints};
    use crate::clock::ManualClock;
    use crate::store::memory::{FailingBackend, MemoryBackend};

    fn test_store(now_ms: u64) -> SeasonStore {
        SeasonStore::new(
            Arc::new(MemoryBackend::new()),
            None,
            Arc::new(ManualClock::at(now_ms)),
            Hash32([0xCC; 32]),
        )
    }

    fn contract(season_id: &str) -> ActivationContract {
        ActivationContract {
            season_id: season_id.to_string(),
            window: SeasonWindow {
                start_ms: 1_000,
                end_ms: 2_000,
            },
            invariants: vec![],
            created_ms: 500,
        }
    }

    #[test]
    fn test_idempotent_write() {
        let store = test_store(1_100);
        let payload = contract("S1");

        let first = store.write_artifact(&payload).unwrap();
        let second = store.write_artifact(&payload).unwrap();

        let hash = first.hash().unwrap();
        assert!(matches!(first, WriteOutcome::Wrote { .. }));
        assert_eq!(
            second,
            WriteOutcome::AlreadyPresentSameHash { hash }
        );
        assert!(store.violations_for("S1").unwrap().is_empty());
    }

    #[test]
    fn test_immutability_conflict_records_one_violation() {
        let store = test_store(1_100);
        store.write_artifact(&contract("S1")).unwrap();

        let mut altered = contract("S1");
        altered.invariants.push("no-mint".to_string());
        let outcome = store.write_artifact(&altered).unwrap();

        assert!(matches!(
            outcome,
            WriteOutcome::Rejected(RejectReason::ImmutabilityConflict { .. })
        ));
        let violations = store.violations_for("S1").unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].code, ViolationCode::ImmutableOverwrite);

        // Stored value unchanged.
        let (stored, _) = store.read::<ActivationContract>("S1").unwrap().unwrap();
        assert!(stored.invariants.is_empty());
    }

    #[test]
    fn test_freeze_dominates() {
        let store = test_store(1_100);
        store
            .set_frozen("S1", FreezeCause::Drift, None, None)
            .unwrap();

        let outcome = store.write_artifact(&contract("S1")).unwrap();
        assert_eq!(outcome, WriteOutcome::Rejected(RejectReason::Frozen));

        let violations = store.violations_for("S1").unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].code, ViolationCode::FrozenSeasonWrite);
    }

    #[test]
    fn test_set_frozen_idempotent() {
        let store = test_store(1_100);
        store
            .set_frozen("S1", FreezeCause::Drift, None, None)
            .unwrap();
        store
            .set_frozen("S1", FreezeCause::BaselineMissing, None, None)
            .unwrap();

        let (state, _) = store.read::<FreezeState>("S1").unwrap().unwrap();
        assert_eq!(state.cause, FreezeCause::Drift);
    }

    #[test]
    fn test_activation_gate_blocks_ungated_season() {
        let store = test_store(1_100);
        let constraints = CompiledConstraints {
            season_id: "S1".to_string(),
            sealed: true,
            disabled_signal_types: vec![],
            excluded_communities: vec![],
            max_share_ppm: None,
            max_entries_per_community: None,
            settlement_delay_ms: None,
            treasuries: std::collections::BTreeMap::new(),
            compiled_ms: 900,
        };
        // Constraints are part of the pre-activation trio: allowed.
        assert!(store.write_artifact(&constraints).unwrap().is_accepted());

        // A canon bundle is activation-gated: rejected.
        let bundle = crate::artifact::CanonBundle {
            season_id: "S1".to_string(),
            community_id: "garden".to_string(),
            receipt_hash: Hash32::ZERO,
            constraints_hash: Hash32::ZERO,
            config_hash: Hash32::ZERO,
            signals_snapshot_hash: Hash32::ZERO,
            resolution_output_hash: Hash32::ZERO,
            bundle_hash: Hash32::ZERO,
        };
        let outcome = store.write_artifact(&bundle).unwrap();
        assert_eq!(
            outcome,
            WriteOutcome::Rejected(RejectReason::ActivationRequired)
        );
    }

    #[test]
    fn test_mirror_fail_open() {
        let store = SeasonStore::new(
            Arc::new(MemoryBackend::new()),
            Some(Arc::new(FailingBackend)),
            Arc::new(ManualClock::at(1_100)),
            Hash32([0xCC; 32]),
        );

        let outcome = store.write_artifact(&contract("S1")).unwrap();
        assert!(outcome.is_accepted(), "mirror failure must not block");
        assert_eq!(store.mirror_failures(), 1);
    }

    #[test]
    fn test_window_enforced_after_seal() {
        let clock = Arc::new(ManualClock::at(1_100));
        let store = SeasonStore::new(
            Arc::new(MemoryBackend::new()),
            None,
            Arc::clone(&clock) as Arc<dyn Clock>,
            Hash32([0xCC; 32]),
        );

        let sealed = SealedContract {
            season_id: "S1".to_string(),
            window: SeasonWindow {
                start_ms: 1_000,
                end_ms: 2_000,
            },
            contract_base_hash: Hash32([1; 32]),
            readiness_hash: Hash32([2; 32]),
            constraints_hash: Hash32([3; 32]),
            resolution_artifact_hash: Hash32([4; 32]),
            seal_hash: Hash32([5; 32]),
        };
        assert!(store.write_artifact(&sealed).unwrap().is_accepted());

        // Inside the window: trio writes pass the temporal lock.
        assert!(store.write_artifact(&contract("S1")).unwrap().is_accepted());

        // After the window closes, a new trio write is rejected.
        clock.set(2_000);
        let late = CompiledConstraints {
            season_id: "S1".to_string(),
            sealed: true,
            disabled_signal_types: vec![],
            excluded_communities: vec![],
            max_share_ppm: None,
            max_entries_per_community: None,
            settlement_delay_ms: None,
            treasuries: std::collections::BTreeMap::new(),
            compiled_ms: 900,
        };
        let outcome = store.write_artifact(&late).unwrap();
        assert!(matches!(
            outcome,
            WriteOutcome::Rejected(RejectReason::OutOfWindow { now_ms: 2_000, .. })
        ));
    }
}
