//! Successor candidate and acknowledgement artifacts.

use serde::{Deserialize, Serialize};

use super::season::SeasonWindow;
use super::{ArtifactKind, ArtifactPayload};
use crate::crypto::{ArtifactHasher, Hash32};

/// Domain tag for the successor input hash (predecessor lineage).
pub const SUCCESSOR_INPUT_DOMAIN: &[u8] = b"SL_SUCCESSOR_INPUT_V1";

/// Domain tag for the proposal hash over next-season parameters.
pub const PROPOSAL_DOMAIN: &[u8] = b"SL_SEASON_PROPOSAL_V1";

/// Domain tag for the acknowledgement hash.
pub const ACK_DOMAIN: &[u8] = b"SL_ACK_V1";

/// Lifecycle status of a successor candidate.
///
/// `READY` is a derived status: the stored contract always says
/// `CANDIDATE`; a valid write-once acknowledgement promotes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateStatus {
    /// Proposed, not yet acknowledged.
    Candidate,
    /// Acknowledged and eligible to gate the next season's readiness.
    Ready,
}

/// The proposed parameters of the next season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeasonProposal {
    /// The proposed season id.
    pub season_id: String,
    /// Proposed accounting window.
    pub window: SeasonWindow,
    /// Proposed invariants.
    pub invariants: Vec<String>,
    /// Proposed whale-clamp override in parts-per-million.
    pub max_share_ppm: Option<u32>,
}

/// A proposal for the next season, derivable only from a `FINALIZED`
/// predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuccessorCandidateContract {
    /// The proposed next season.
    pub next_season_id: String,
    /// The finalized predecessor.
    pub predecessor_id: String,
    /// Stored status; always `CANDIDATE` (promotion is derived).
    pub status: CandidateStatus,
    /// Hash over the predecessor's archive/receipt/constraints hashes.
    pub input_hash: Hash32,
    /// Hash over the proposed next-season parameters.
    pub proposal_hash: Hash32,
    /// The proposal itself.
    pub proposal: SeasonProposal,
}

impl SuccessorCandidateContract {
    /// Combines the predecessor lineage hashes into the input hash.
    #[must_use]
    pub fn compute_input_hash(
        archive_hash: &Hash32,
        end_receipt_hash: &Hash32,
        constraints_hash: &Hash32,
    ) -> Hash32 {
        ArtifactHasher::combine(
            SUCCESSOR_INPUT_DOMAIN,
            &[archive_hash, end_receipt_hash, constraints_hash],
        )
    }
}

impl ArtifactPayload for SuccessorCandidateContract {
    const KIND: ArtifactKind = ArtifactKind::SuccessorCandidate;

    fn artifact_id(&self) -> String {
        self.next_season_id.clone()
    }

    fn season_scope(&self) -> String {
        self.next_season_id.clone()
    }
}

/// The human-gated acknowledgement promoting a candidate to `READY`.
///
/// `acknowledgement_hash` is bound to the candidate's identity hash, so
/// a tampered candidate can never be promoted by a stale
/// acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuccessorAcknowledgement {
    /// The acknowledged next season.
    pub next_season_id: String,
    /// Identity hash of the candidate record at acknowledgement time.
    pub candidate_hash: Hash32,
    /// Seal over the candidate hash.
    pub acknowledgement_hash: Hash32,
}

impl SuccessorAcknowledgement {
    /// Seals an acknowledgement over a candidate's identity hash.
    #[must_use]
    pub fn seal(candidate_hash: &Hash32) -> Hash32 {
        ArtifactHasher::combine(ACK_DOMAIN, &[candidate_hash])
    }
}

impl ArtifactPayload for SuccessorAcknowledgement {
    const KIND: ArtifactKind = ArtifactKind::SuccessorAcknowledgement;

    fn artifact_id(&self) -> String {
        self.next_season_id.clone()
    }

    fn season_scope(&self) -> String {
        self.next_season_id.clone()
    }
}
