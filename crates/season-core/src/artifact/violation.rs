//! Immutable violation records.

use serde::{Deserialize, Serialize};

use super::{ArtifactKind, ArtifactPayload};
use crate::canonical;
use crate::crypto::{ArtifactHasher, Hash32};

/// Severity of a recorded violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Informational; no action required.
    Info,
    /// Suspicious but tolerated.
    Warn,
    /// A rejected operation.
    Error,
    /// An integrity breach requiring operator attention.
    Critical,
}

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationCode {
    /// A write attempted to replace an existing artifact with
    /// different content.
    ImmutableOverwrite,
    /// An activation receipt conflicted with the stored receipt.
    ReceiptConflict,
    /// A write landed outside the sealed season window.
    OutOfWindowWrite,
    /// A write arrived after the season was finalized.
    PostFinalizationWrite,
    /// A season-scoped write arrived before activation.
    ActivationRequired,
    /// A write arrived for a frozen season.
    FrozenSeasonWrite,
    /// The live protocol fingerprint diverged from its baseline.
    ProtocolDrift,
    /// An activated season had no captured baseline.
    BaselineMissing,
    /// A canon bundle failed replay verification.
    BundleReplayMismatch,
    /// The two storage mirrors disagreed about a bundle.
    MirrorDivergence,
    /// A recomputed archive hash disagreed with the stored archive.
    FinalizationHashMismatch,
    /// A parity check found mismatched or missing artifacts.
    ParityMismatch,
    /// A successor candidate's stored bytes no longer hash to its
    /// recorded identity.
    CandidateTampered,
}

/// An immutable record of a rejected or anomalous write.
///
/// Violations are content-addressed: the record's id is the hex of its
/// own content hash, so identical anomalies deduplicate and distinct
/// anomalies can never collide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViolationRecord {
    /// What went wrong.
    pub code: ViolationCode,
    /// How bad it is.
    pub severity: Severity,
    /// The season the violation is scoped to.
    pub season_id: String,
    /// Collection of the subject artifact.
    pub subject_collection: String,
    /// Id of the subject artifact.
    pub subject_id: String,
    /// Hash of what was attempted, when applicable.
    pub attempted_hash: Option<Hash32>,
    /// Hash of what already existed, when applicable.
    pub existing_hash: Option<Hash32>,
    /// Human-readable detail.
    pub detail: String,
    /// When the violation was observed (wall time; audit-side record).
    pub observed_ms: u64,
}

impl ViolationRecord {
    /// Computes the record's content hash — also its storage id.
    ///
    /// Falls back to hashing the debug representation if the record
    /// cannot be canonicalized (it always can: all fields are strings,
    /// enums, and integers).
    #[must_use]
    pub fn content_hash(&self) -> Hash32 {
        serde_json::to_value(self)
            .ok()
            .and_then(|v| canonical::canonical_bytes(&v).ok())
            .map_or_else(
                || ArtifactHasher::hash_domain(Self::KIND.domain(), format!("{self:?}").as_bytes()),
                |bytes| ArtifactHasher::hash_domain(Self::KIND.domain(), &bytes),
            )
    }
}

impl ArtifactPayload for ViolationRecord {
    const KIND: ArtifactKind = ArtifactKind::Violation;

    fn artifact_id(&self) -> String {
        self.content_hash().to_hex()
    }

    fn season_scope(&self) -> String {
        self.season_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_id_is_content_hash() {
        let violation = ViolationRecord {
            code: ViolationCode::ImmutableOverwrite,
            severity: Severity::Error,
            season_id: "S1".to_string(),
            subject_collection: "activation_receipt".to_string(),
            subject_id: "S1".to_string(),
            attempted_hash: Some(Hash32([7; 32])),
            existing_hash: Some(Hash32([8; 32])),
            detail: "conflicting receipt write".to_string(),
            observed_ms: 1_234,
        };
        assert_eq!(violation.artifact_id(), violation.content_hash().to_hex());

        let mut tweaked = violation.clone();
        tweaked.observed_ms = 1_235;
        assert_ne!(violation.artifact_id(), tweaked.artifact_id());
    }
}
