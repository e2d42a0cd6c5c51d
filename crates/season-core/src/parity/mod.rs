//! Dual-store parity checking.
//!
//! A read-only background audit: for an enumerated checklist of global
//! artifact kinds plus every indexed community bundle, read both
//! mirrors, normalize away known-volatile fields, and classify each
//! pair. The severity ordering is uniform and fail-closed (resolving
//! an inconsistency in earlier designs): anything missing on either
//! side or mismatched in normalized content is `FAIL`; `WARN` is
//! reserved for pairs whose raw bytes differ but whose normalized
//! content agrees.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::artifact::{ArtifactKind, MismatchKind, ParityMismatch, ParityReport, ParityStatus,
    Severity, ViolationCode};
use crate::canonical;
use crate::clock::Clock;
use crate::crypto::{ArtifactHasher, Hash32};
use crate::store::{SeasonStore, StoreError, StorageBackend, StoredRecord};

/// Global (one-per-season) kinds on the parity checklist. Community
/// bundles and content-addressed readiness decisions are enumerated
/// separately from their indexes.
const GLOBAL_CHECKLIST: [ArtifactKind; 12] = [
    ArtifactKind::ActivationContract,
    ArtifactKind::CompiledConstraints,
    ArtifactKind::SealedContract,
    ArtifactKind::ActivationReceipt,
    ArtifactKind::ResolutionArtifact,
    ArtifactKind::FreezeBaseline,
    ArtifactKind::FreezeState,
    ArtifactKind::SeasonEndReceipt,
    ArtifactKind::ArchiveBundle,
    ArtifactKind::SuccessorSeed,
    ArtifactKind::SuccessorCandidate,
    ArtifactKind::SuccessorAcknowledgement,
];

/// Field names stripped before comparison: wall-clock capture times
/// and mirror-side metadata that legitimately differ between stores.
const VOLATILE_FIELDS: [&str; 2] = ["observed_ms", "mirror_meta"];

/// Errors raised by a parity run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParityError {
    /// No mirror is configured; there is nothing to compare.
    #[error("no remote mirror configured")]
    NoMirror,

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of one parity run.
#[derive(Debug, Clone)]
pub struct ParityRun {
    /// The persisted report.
    pub report: ParityReport,
    /// The stored report hash.
    pub report_hash: Hash32,
}

/// Dual-store parity checker.
pub struct ParityChecker<'a> {
    store: &'a SeasonStore,
    clock: Arc<dyn Clock>,
}

impl<'a> ParityChecker<'a> {
    /// Creates a checker.
    pub fn new(store: &'a SeasonStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Runs the parity check for a season and persists the report.
    ///
    /// # Errors
    ///
    /// Returns [`ParityError::NoMirror`] without a configured mirror,
    /// or [`ParityError::Store`] on local-store failure. Mirror read
    /// failures classify the pair as `MISSING_REMOTE` rather than
    /// erroring — an unreachable mirror is indistinguishable from a
    /// missing one for audit purposes.
    pub fn run(&self, season_id: &str) -> Result<ParityRun, ParityError> {
        let mirror = self
            .store
            .mirror_backend()
            .ok_or(ParityError::NoMirror)?
            .clone();

        let mut mismatches = Vec::new();
        let mut checked_pairs: u64 = 0;

        for kind in GLOBAL_CHECKLIST {
            if let Some(mismatch) =
                self.check_pair(&mirror, kind, season_id, &mut checked_pairs)?
            {
                mismatches.push(mismatch);
            }
        }

        // Every indexed community bundle, from either side's index.
        let prefix = format!("{season_id}/");
        for id in self.union_ids(&mirror, ArtifactKind::CanonBundle)? {
            if !id.starts_with(&prefix) {
                continue;
            }
            if let Some(mismatch) =
                self.check_pair_id(&mirror, ArtifactKind::CanonBundle, &id, &mut checked_pairs)?
            {
                mismatches.push(mismatch);
            }
        }

        // Readiness decisions are content-addressed; membership in the
        // season is read from the payload.
        for id in self.union_ids(&mirror, ArtifactKind::ReadinessDecision)? {
            if !self.belongs_to_season(&mirror, ArtifactKind::ReadinessDecision, &id, season_id)? {
                continue;
            }
            if let Some(mismatch) = self.check_pair_id(
                &mirror,
                ArtifactKind::ReadinessDecision,
                &id,
                &mut checked_pairs,
            )? {
                mismatches.push(mismatch);
            }
        }

        let status = overall_status(&mismatches);
        let report = ParityReport {
            season_id: season_id.to_string(),
            status,
            checked_pairs,
            mismatches,
            observed_ms: self.clock.now_ms(),
        };

        if status == ParityStatus::Fail {
            self.store.record_violation(
                ViolationCode::ParityMismatch,
                Severity::Error,
                season_id,
                ArtifactKind::ParityReport,
                &report.artifact_id_hint(),
                None,
                None,
                &format!("{} mismatched pairs", report.mismatches.len()),
            )?;
        }

        let outcome = self.store.write_artifact(&report)?;
        let report_hash = outcome.hash().unwrap_or_else(|| {
            // Content-addressed id: a rejection here means an
            // identical report already exists, which is the same
            // report.
            report.content_hash()
        });

        info!(season_id, ?status, checked_pairs, "parity check complete");
        Ok(ParityRun {
            report,
            report_hash,
        })
    }

    fn check_pair(
        &self,
        mirror: &Arc<dyn StorageBackend>,
        kind: ArtifactKind,
        season_id: &str,
        checked_pairs: &mut u64,
    ) -> Result<Option<ParityMismatch>, ParityError> {
        self.check_pair_id(mirror, kind, season_id, checked_pairs)
    }

    /// Union of both sides' ids for a kind, sorted.
    fn union_ids(
        &self,
        mirror: &Arc<dyn StorageBackend>,
        kind: ArtifactKind,
    ) -> Result<Vec<String>, ParityError> {
        let mut ids = self.store.list_ids(kind)?;
        if let Ok(remote_ids) = mirror.list_ids(kind.collection()) {
            for id in remote_ids {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Whether either side's copy of a record claims the season.
    fn belongs_to_season(
        &self,
        mirror: &Arc<dyn StorageBackend>,
        kind: ArtifactKind,
        id: &str,
        season_id: &str,
    ) -> Result<bool, ParityError> {
        let record = match self.store.read_record(kind, id)? {
            Some(record) => Some(record),
            None => mirror.get(kind.collection(), id).ok().flatten(),
        };
        let Some(record) = record else {
            return Ok(false);
        };
        let season = serde_json::from_slice::<Value>(&record.bytes)
            .ok()
            .and_then(|v| v.get("season_id").and_then(|s| s.as_str().map(String::from)));
        Ok(season.as_deref() == Some(season_id))
    }

    fn check_pair_id(
        &self,
        mirror: &Arc<dyn StorageBackend>,
        kind: ArtifactKind,
        id: &str,
        checked_pairs: &mut u64,
    ) -> Result<Option<ParityMismatch>, ParityError> {
        let local = self.store.read_record(kind, id)?;
        let remote = mirror.get(kind.collection(), id).unwrap_or_else(|err| {
            warn!(collection = kind.collection(), id, %err, "mirror read failed");
            None
        });

        let (local, remote) = match (local, remote) {
            (None, None) => return Ok(None),
            (local, remote) => {
                *checked_pairs += 1;
                (local, remote)
            }
        };

        Ok(classify_pair(kind, id, local, remote))
    }
}

/// Classifies one local/remote pair. `None` means the pair matches.
fn classify_pair(
    kind: ArtifactKind,
    id: &str,
    local: Option<StoredRecord>,
    remote: Option<StoredRecord>,
) -> Option<ParityMismatch> {
    let mismatch = |mismatch_kind, local_hash, remote_hash| {
        Some(ParityMismatch {
            kind: mismatch_kind,
            collection: kind.collection().to_string(),
            id: id.to_string(),
            local_hash,
            remote_hash,
        })
    };

    match (local, remote) {
        (None, None) => None,
        (None, Some(remote)) => mismatch(MismatchKind::MissingLocal, None, Some(remote.hash)),
        (Some(local), None) => mismatch(MismatchKind::MissingRemote, Some(local.hash), None),
        (Some(local), Some(remote)) => {
            if local.bytes == remote.bytes && local.hash == remote.hash {
                return None;
            }
            let (Some(local_norm), Some(remote_norm)) =
                (normalized_hash(&local.bytes), normalized_hash(&remote.bytes))
            else {
                return mismatch(
                    MismatchKind::StructureMismatch,
                    Some(local.hash),
                    Some(remote.hash),
                );
            };
            if local_norm == remote_norm {
                mismatch(MismatchKind::VolatileOnly, Some(local.hash), Some(remote.hash))
            } else {
                mismatch(
                    MismatchKind::HashMismatch,
                    Some(local_norm),
                    Some(remote_norm),
                )
            }
        }
    }
}

/// Parses, strips volatile fields, and hashes one side's bytes.
/// `None` means the bytes are not structurally valid JSON.
fn normalized_hash(bytes: &[u8]) -> Option<Hash32> {
    let mut value: Value = serde_json::from_slice(bytes).ok()?;
    strip_volatile(&mut value);
    let canonical = canonical::canonical_bytes(&value).ok()?;
    Some(ArtifactHasher::hash_content(&canonical))
}

fn strip_volatile(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for field in VOLATILE_FIELDS {
                map.remove(field);
            }
            for nested in map.values_mut() {
                strip_volatile(nested);
            }
        }
        Value::Array(items) => {
            for nested in items {
                strip_volatile(nested);
            }
        }
        _ => {}
    }
}

fn overall_status(mismatches: &[ParityMismatch]) -> ParityStatus {
    if mismatches.is_empty() {
        ParityStatus::Pass
    } else if mismatches.iter().all(|m| m.kind.is_benign()) {
        ParityStatus::Warn
    } else {
        ParityStatus::Fail
    }
}

impl ParityReport {
    /// Short subject id for violation records about this report.
    fn artifact_id_hint(&self) -> String {
        format!("{}-parity", self.season_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(bytes: &[u8]) -> StoredRecord {
        StoredRecord {
            bytes: bytes.to_vec(),
            hash: ArtifactHasher::hash_content(bytes),
        }
    }

    #[test]
    fn test_identical_pair_matches() {
        let r = record(br#"{"a":1}"#);
        assert!(classify_pair(
            ArtifactKind::CanonBundle,
            "S1/garden",
            Some(r.clone()),
            Some(r)
        )
        .is_none());
    }

    #[test]
    fn test_missing_remote_classified() {
        let m = classify_pair(
            ArtifactKind::CanonBundle,
            "S1/garden",
            Some(record(br#"{"a":1}"#)),
            None,
        )
        .unwrap();
        assert_eq!(m.kind, MismatchKind::MissingRemote);
    }

    #[test]
    fn test_volatile_only_is_benign() {
        let local = record(br#"{"a":1,"observed_ms":100}"#);
        let remote = record(br#"{"a":1,"observed_ms":999}"#);
        let m = classify_pair(ArtifactKind::CanonBundle, "S1/garden", Some(local), Some(remote))
            .unwrap();
        assert_eq!(m.kind, MismatchKind::VolatileOnly);
        assert_eq!(overall_status(&[m]), ParityStatus::Warn);
    }

    #[test]
    fn test_content_divergence_fails() {
        let local = record(br#"{"a":1}"#);
        let remote = record(br#"{"a":2}"#);
        let m = classify_pair(ArtifactKind::CanonBundle, "S1/garden", Some(local), Some(remote))
            .unwrap();
        assert_eq!(m.kind, MismatchKind::HashMismatch);
        assert_eq!(overall_status(&[m]), ParityStatus::Fail);
    }

    #[test]
    fn test_unparseable_side_is_structure_mismatch() {
        let local = record(br#"{"a":1}"#);
        let remote = record(b"not-json");
        let m = classify_pair(ArtifactKind::CanonBundle, "S1/garden", Some(local), Some(remote))
            .unwrap();
        assert_eq!(m.kind, MismatchKind::StructureMismatch);
    }
}
