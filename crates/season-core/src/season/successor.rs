//! Successor candidate construction and acknowledgement.

use tracing::{info, warn};

use super::{OrchestratorError, SeasonOrchestrator};
use crate::artifact::{ArtifactKind, CandidateStatus, FinalizationStatus, SeasonEndReceipt,
    SeasonProposal, Severity, SuccessorAcknowledgement, SuccessorCandidateContract, SuccessorSeed,
    ViolationCode, payload_hash, PROPOSAL_DOMAIN};
use crate::canonical;
use crate::crypto::{ArtifactHasher, Hash32};
use crate::store::WriteOutcome;

/// Result of building a successor candidate.
#[derive(Debug, Clone)]
pub struct SuccessorOutcome {
    /// The candidate of record (this call's or the pre-existing one).
    pub candidate: SuccessorCandidateContract,
    /// The candidate's stored identity hash.
    pub candidate_hash: Hash32,
    /// Derived status: `READY` once validly acknowledged.
    pub status: CandidateStatus,
}

/// Result of acknowledging a candidate.
#[derive(Debug, Clone)]
pub struct AcknowledgeOutcome {
    /// The sealed acknowledgement hash.
    pub acknowledgement_hash: Hash32,
    /// Always `READY` on success.
    pub status: CandidateStatus,
}

impl SeasonOrchestrator {
    /// Builds a successor candidate from a `FINALIZED` predecessor.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Lineage`] if the predecessor's end
    /// receipt is missing or not `FINALIZED` — this is a process
    /// error at the API boundary, not a data anomaly. Returns
    /// [`OrchestratorError::Store`] on infrastructure failure.
    pub fn build_successor_candidate(
        &self,
        next_season_id: &str,
        prev_season_id: &str,
        proposal: SeasonProposal,
    ) -> Result<SuccessorOutcome, OrchestratorError> {
        let Some((end_receipt, end_receipt_hash)) =
            self.store.read::<SeasonEndReceipt>(prev_season_id)?
        else {
            return Err(OrchestratorError::Lineage {
                predecessor_id: prev_season_id.to_string(),
                detail: "has no end receipt".to_string(),
            });
        };
        if end_receipt.status != FinalizationStatus::Finalized {
            return Err(OrchestratorError::Lineage {
                predecessor_id: prev_season_id.to_string(),
                detail: "end receipt is not FINALIZED".to_string(),
            });
        }

        // Prefer the seed written at finalization; fall back to the
        // raw records for predecessors finalized by older builds.
        let (archive_hash, constraints_hash) =
            match self.store.read::<SuccessorSeed>(prev_season_id)? {
                Some((seed, _)) => (seed.archive_hash, seed.constraints_hash),
                None => {
                    let archive_hash = self
                        .store
                        .read_record(ArtifactKind::ArchiveBundle, prev_season_id)?
                        .map_or(Hash32::ZERO, |r| r.hash);
                    let constraints_hash = self
                        .store
                        .read_record(ArtifactKind::CompiledConstraints, prev_season_id)?
                        .map_or(Hash32::ZERO, |r| r.hash);
                    (archive_hash, constraints_hash)
                }
            };

        let input_hash = SuccessorCandidateContract::compute_input_hash(
            &archive_hash,
            &end_receipt_hash,
            &constraints_hash,
        );
        let proposal_hash = proposal_hash(&proposal)?;

        let candidate = SuccessorCandidateContract {
            next_season_id: next_season_id.to_string(),
            predecessor_id: prev_season_id.to_string(),
            status: CandidateStatus::Candidate,
            input_hash,
            proposal_hash,
            proposal,
        };

        match self.store.write_artifact(&candidate)? {
            WriteOutcome::Wrote { hash } | WriteOutcome::AlreadyPresentSameHash { hash } => {
                info!(next_season_id, prev_season_id, %hash, "successor candidate persisted");
                Ok(SuccessorOutcome {
                    candidate,
                    candidate_hash: hash,
                    status: self.successor_status(next_season_id)?,
                })
            }
            WriteOutcome::Rejected(_) => {
                // Write-once: an earlier candidate is the candidate of
                // record.
                warn!(next_season_id, "candidate already exists; returning stored");
                let (stored, hash) = self
                    .store
                    .read::<SuccessorCandidateContract>(next_season_id)?
                    .ok_or(OrchestratorError::StoreRejected { stage: "candidate" })?;
                Ok(SuccessorOutcome {
                    candidate: stored,
                    candidate_hash: hash,
                    status: self.successor_status(next_season_id)?,
                })
            }
        }
    }

    /// Acknowledges a candidate (the human-gated promotion to
    /// `READY`).
    ///
    /// Recomputes the candidate's identity hash from its stored bytes
    /// and refuses — recording the tamper — if it no longer matches.
    ///
    /// # Errors
    ///
    /// - [`OrchestratorError::MissingCandidate`] if no candidate
    ///   exists.
    /// - [`OrchestratorError::CandidateTampered`] if the identity
    ///   check fails.
    pub fn acknowledge(
        &self,
        next_season_id: &str,
    ) -> Result<AcknowledgeOutcome, OrchestratorError> {
        let Some((candidate, candidate_hash)) = self
            .store
            .read::<SuccessorCandidateContract>(next_season_id)?
        else {
            return Err(OrchestratorError::MissingCandidate {
                next_season_id: next_season_id.to_string(),
            });
        };

        if payload_hash(&candidate)? != candidate_hash {
            self.store.record_violation(
                ViolationCode::CandidateTampered,
                Severity::Critical,
                next_season_id,
                ArtifactKind::SuccessorCandidate,
                next_season_id,
                None,
                Some(candidate_hash),
                "candidate bytes no longer hash to their recorded identity",
            )?;
            return Err(OrchestratorError::CandidateTampered {
                next_season_id: next_season_id.to_string(),
            });
        }

        let ack = SuccessorAcknowledgement {
            next_season_id: next_season_id.to_string(),
            candidate_hash,
            acknowledgement_hash: SuccessorAcknowledgement::seal(&candidate_hash),
        };
        if !self.store.write_artifact(&ack)?.is_accepted() {
            return Err(OrchestratorError::StoreRejected {
                stage: "acknowledgement",
            });
        }

        info!(next_season_id, ack = %ack.acknowledgement_hash, "successor acknowledged");
        Ok(AcknowledgeOutcome {
            acknowledgement_hash: ack.acknowledgement_hash,
            status: CandidateStatus::Ready,
        })
    }

    /// Derived status of a successor candidate: `READY` iff a valid
    /// acknowledgement binds its current identity hash.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::MissingCandidate`] if no candidate
    /// exists, or [`OrchestratorError::Store`] on store failure.
    pub fn successor_status(
        &self,
        next_season_id: &str,
    ) -> Result<CandidateStatus, OrchestratorError> {
        let Some((_, candidate_hash)) = self
            .store
            .read::<SuccessorCandidateContract>(next_season_id)?
        else {
            return Err(OrchestratorError::MissingCandidate {
                next_season_id: next_season_id.to_string(),
            });
        };
        let ready = match self.store.read::<SuccessorAcknowledgement>(next_season_id)? {
            Some((ack, _)) => {
                ack.candidate_hash == candidate_hash
                    && ack.acknowledgement_hash == SuccessorAcknowledgement::seal(&candidate_hash)
            }
            None => false,
        };
        Ok(if ready {
            CandidateStatus::Ready
        } else {
            CandidateStatus::Candidate
        })
    }
}

/// Canonical hash of a season proposal under its own domain.
fn proposal_hash(proposal: &SeasonProposal) -> Result<Hash32, crate::store::StoreError> {
    let value = serde_json::to_value(proposal).map_err(|e| {
        crate::artifact::ArtifactCodecError::Serialize {
            message: e.to_string(),
        }
    })?;
    let bytes =
        canonical::canonical_bytes(&value).map_err(crate::artifact::ArtifactCodecError::from)?;
    Ok(ArtifactHasher::hash_domain(PROPOSAL_DOMAIN, &bytes))
}
