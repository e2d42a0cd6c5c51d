//! Season finalization and archival.

use serde::Serialize;
use tracing::{info, warn};

use super::{OrchestratorError, SeasonOrchestrator};
use crate::artifact::{AnomalyFlags, ArchiveBundle, ArtifactKind, CommunityBundleRef,
    FinalizationStatus, ReadinessDecision, ResolutionArtifact, SealedContract, SeasonEndReceipt,
    Severity, SuccessorSeed, ViolationCode, payload_hash};
use crate::crypto::Hash32;
use crate::store::WriteOutcome;

/// Terminal status of a finalize call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalizeStatus {
    /// This call closed the season.
    Finalized,
    /// The season was already closed; the existing receipt is
    /// returned.
    Noop,
    /// Nothing was written; see the reason.
    FailedSafe,
}

/// Why a finalize call failed safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalizeReason {
    /// `now < window.end_ms`.
    SeasonFinalizationPremature,
    /// No readiness/audit summary artifact exists.
    SeasonFinalizationMissingAudit,
    /// The season was never sealed/activated.
    SeasonNotActivated,
    /// A stored archive exists with a different recomputed hash.
    SeasonFinalizationHashMismatch,
    /// A required write was rejected by the store.
    StoreRejected,
}

/// Result of a finalize call.
#[derive(Debug, Clone, Serialize)]
pub struct FinalizeOutcome {
    /// What happened.
    pub status: FinalizeStatus,
    /// Hash of the end receipt, when one exists.
    pub end_receipt_hash: Option<Hash32>,
    /// Failure reason on `FAILED_SAFE`.
    pub reason: Option<FinalizeReason>,
}

impl FinalizeOutcome {
    fn failed_safe(reason: FinalizeReason) -> Self {
        Self {
            status: FinalizeStatus::FailedSafe,
            end_receipt_hash: None,
            reason: Some(reason),
        }
    }
}

impl SeasonOrchestrator {
    /// Finalizes a season: archive bundle, end receipt, successor
    /// seed.
    ///
    /// Requires `now >= window.end_ms` and an existing readiness/audit
    /// summary. All writes go through the write-once store, so partial
    /// or duplicate finalization attempts are safe to re-run. A
    /// re-finalize of an already-closed season is a no-op returning
    /// the existing receipt hash — unless the stored archive no longer
    /// matches its recomputation, which is a critical integrity
    /// violation, never silently accepted.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] on store failure.
    pub fn finalize(&self, season_id: &str) -> Result<FinalizeOutcome, OrchestratorError> {
        let Some((sealed, _)) = self.store.read::<SealedContract>(season_id)? else {
            return Ok(FinalizeOutcome::failed_safe(
                FinalizeReason::SeasonNotActivated,
            ));
        };

        let now_ms = self.clock.now_ms();
        if now_ms < sealed.window.end_ms {
            warn!(
                season_id,
                now_ms,
                end_ms = sealed.window.end_ms,
                "premature finalization refused"
            );
            return Ok(FinalizeOutcome::failed_safe(
                FinalizeReason::SeasonFinalizationPremature,
            ));
        }

        // The audit summary is the readiness decision the activation
        // receipt committed to.
        let Some((receipt, _)) = self.store.activated_receipt(season_id)? else {
            return Ok(FinalizeOutcome::failed_safe(
                FinalizeReason::SeasonNotActivated,
            ));
        };
        let audit_hash = match receipt.inputs.readiness_hash {
            Some(hash)
                if self
                    .store
                    .read::<ReadinessDecision>(&hash.to_hex())?
                    .is_some() =>
            {
                hash
            }
            _ => {
                return Ok(FinalizeOutcome::failed_safe(
                    FinalizeReason::SeasonFinalizationMissingAudit,
                ));
            }
        };

        let archive = self.build_archive(season_id)?;
        let archive_hash = payload_hash(&archive)?;

        // Re-finalize path: compare the recomputed archive against the
        // stored one before declaring a no-op.
        if let Some((_, existing_hash)) = self.store.read::<SeasonEndReceipt>(season_id)? {
            if let Some(stored_archive) = self
                .store
                .read_record(ArtifactKind::ArchiveBundle, season_id)?
            {
                if stored_archive.hash != archive_hash {
                    self.store.record_violation(
                        ViolationCode::FinalizationHashMismatch,
                        Severity::Critical,
                        season_id,
                        ArtifactKind::ArchiveBundle,
                        season_id,
                        Some(archive_hash),
                        Some(stored_archive.hash),
                        "recomputed archive hash disagrees with stored archive",
                    )?;
                    return Ok(FinalizeOutcome::failed_safe(
                        FinalizeReason::SeasonFinalizationHashMismatch,
                    ));
                }
            }
            return Ok(FinalizeOutcome {
                status: FinalizeStatus::Noop,
                end_receipt_hash: Some(existing_hash),
                reason: None,
            });
        }

        // Archive first, receipt last: receipt presence implies the
        // archive exists, so a crash in between heals on re-run.
        if !self.store.write_artifact(&archive)?.is_accepted() {
            return Ok(FinalizeOutcome::failed_safe(FinalizeReason::StoreRejected));
        }

        let end_receipt = SeasonEndReceipt {
            season_id: season_id.to_string(),
            status: FinalizationStatus::Finalized,
            archive_hash,
            audit_hash,
        };
        let end_receipt_hash = match self.store.write_artifact(&end_receipt)? {
            WriteOutcome::Wrote { hash } | WriteOutcome::AlreadyPresentSameHash { hash } => hash,
            WriteOutcome::Rejected(_) => {
                return Ok(FinalizeOutcome::failed_safe(FinalizeReason::StoreRejected));
            }
        };

        let constraints_hash = self
            .store
            .read_record(ArtifactKind::CompiledConstraints, season_id)?
            .map_or(Hash32::ZERO, |record| record.hash);
        let seed = SuccessorSeed {
            predecessor_id: season_id.to_string(),
            archive_hash,
            end_receipt_hash,
            constraints_hash,
        };
        if !self.store.write_artifact(&seed)?.is_accepted() {
            return Ok(FinalizeOutcome::failed_safe(FinalizeReason::StoreRejected));
        }

        info!(season_id, %end_receipt_hash, "season finalized");
        Ok(FinalizeOutcome {
            status: FinalizeStatus::Finalized,
            end_receipt_hash: Some(end_receipt_hash),
            reason: None,
        })
    }

    /// Builds the archive from the stored per-community bundles.
    fn build_archive(&self, season_id: &str) -> Result<ArchiveBundle, OrchestratorError> {
        let prefix = format!("{season_id}/");
        let mut community_bundles = Vec::new();
        let mut bundled_communities = std::collections::BTreeSet::new();
        for id in self.store.list_ids(ArtifactKind::CanonBundle)? {
            let Some(community_id) = id.strip_prefix(&prefix) else {
                continue;
            };
            if let Some(record) = self.store.read_record(ArtifactKind::CanonBundle, &id)? {
                bundled_communities.insert(community_id.to_string());
                community_bundles.push(CommunityBundleRef {
                    community_id: community_id.to_string(),
                    bundle_hash: record.hash,
                });
            }
        }
        community_bundles.sort_by(|a, b| a.community_id.cmp(&b.community_id));

        // Communities allocated by the resolution but missing a stored
        // bundle are an anomaly worth archiving.
        let missing_bundles = match self.store.read::<ResolutionArtifact>(season_id)? {
            None => 0,
            Some((resolution, _)) => resolution
                .entries
                .iter()
                .map(|e| &e.community_id)
                .collect::<std::collections::BTreeSet<_>>()
                .into_iter()
                .filter(|c| !bundled_communities.contains(*c))
                .count() as u64,
        };

        Ok(ArchiveBundle {
            season_id: season_id.to_string(),
            community_bundles,
            anomalies: AnomalyFlags {
                frozen: self.store.is_frozen(season_id)?,
                missing_bundles,
            },
        })
    }
}
