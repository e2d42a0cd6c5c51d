//! Typed artifact model and canonical hash-input shapes.
//!
//! Every artifact the ledger persists is one of the closed set of kinds
//! in [`ArtifactKind`]. Each kind has exactly one payload type, and each
//! payload type knows its kind at compile time via [`ArtifactPayload`],
//! so it is impossible to compute (say) a bundle hash from a receipt
//! shape.
//!
//! Artifact identity is defined as
//! `hash(kind.domain() || canonicalize(payload))` — see
//! [`payload_hash`]. The store indexes artifacts by `(collection, id)`
//! and records that hash alongside the canonical bytes.

mod closing;
mod constraints;
mod freeze_state;
mod kind;
mod parity_report;
mod resolution;
mod season;
mod successor;
mod violation;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use self::closing::{AnomalyFlags, ArchiveBundle, CommunityBundleRef, FinalizationStatus,
    SeasonEndReceipt, SuccessorSeed};
pub use self::constraints::CompiledConstraints;
pub use self::freeze_state::{FreezeBaseline, FreezeCause, FreezeState, FINGERPRINT_DOMAIN};
pub use self::kind::ArtifactKind;
pub use self::parity_report::{AuditPackManifest, MismatchKind, ParityMismatch, ParityReport,
    ParityStatus};
pub use self::resolution::{AllocationEntry, CanonBundle, ResolutionArtifact, BUNDLE_DOMAIN};
pub use self::season::{ActivationContract, ActivationDecision, ActivationFailure,
    ActivationReceipt, AuditVerdict, CommunityTally, ReadinessCall, ReadinessDecision,
    ReadinessReason, ReceiptInputs, SealedContract, SeasonWindow, SEAL_DOMAIN};
pub use self::successor::{CandidateStatus, SeasonProposal, SuccessorAcknowledgement,
    SuccessorCandidateContract, ACK_DOMAIN, PROPOSAL_DOMAIN, SUCCESSOR_INPUT_DOMAIN};
pub use self::violation::{Severity, ViolationCode, ViolationRecord};

use crate::canonical::{self, CanonicalError};
use crate::crypto::{ArtifactHasher, Hash32};

/// Errors that can occur while encoding or decoding artifacts.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ArtifactCodecError {
    /// The payload failed to serialize to a JSON value.
    #[error("artifact serialization failed: {message}")]
    Serialize {
        /// Description of the serialization failure.
        message: String,
    },

    /// The payload violated the canonical profile.
    #[error("artifact not canonicalizable: {0}")]
    Canonical(#[from] CanonicalError),

    /// Stored bytes failed to decode into the expected payload type.
    #[error("artifact decode failed for {kind:?}: {message}")]
    Decode {
        /// The kind that was being decoded.
        kind: ArtifactKind,
        /// Description of the decode failure.
        message: String,
    },
}

/// A payload type bound to exactly one artifact kind.
pub trait ArtifactPayload: Serialize + DeserializeOwned {
    /// The kind this payload persists under.
    const KIND: ArtifactKind;

    /// The id of this artifact within its kind's collection.
    fn artifact_id(&self) -> String;

    /// The season whose lifecycle guards apply to this artifact.
    fn season_scope(&self) -> String;
}

/// Encodes a payload to its canonical bytes and domain-separated hash.
///
/// # Errors
///
/// Returns [`ArtifactCodecError`] if the payload cannot be serialized or
/// violates the canonical profile.
pub fn encode_payload<T: ArtifactPayload>(
    payload: &T,
) -> Result<(Vec<u8>, Hash32), ArtifactCodecError> {
    let value = serde_json::to_value(payload).map_err(|e| ArtifactCodecError::Serialize {
        message: e.to_string(),
    })?;
    let bytes = canonical::canonical_bytes(&value)?;
    let hash = ArtifactHasher::hash_domain(T::KIND.domain(), &bytes);
    Ok((bytes, hash))
}

/// Computes the canonical content hash of a payload.
///
/// # Errors
///
/// Same as [`encode_payload`].
pub fn payload_hash<T: ArtifactPayload>(payload: &T) -> Result<Hash32, ArtifactCodecError> {
    encode_payload(payload).map(|(_, hash)| hash)
}

/// Decodes stored canonical bytes back into a payload type.
///
/// # Errors
///
/// Returns [`ArtifactCodecError::Decode`] if the bytes are not valid
/// JSON for the payload shape.
pub fn decode_payload<T: ArtifactPayload>(bytes: &[u8]) -> Result<T, ArtifactCodecError> {
    serde_json::from_slice(bytes).map_err(|e| ArtifactCodecError::Decode {
        kind: T::KIND,
        message: e.to_string(),
    })
}

/// A decoded artifact of any kind.
///
/// This is the read-side union used by `inspect` and the audit
/// exporter. Writes never go through this type; they use the concrete
/// payload types so the compiler enforces the kind/shape pairing.
#[derive(Debug, Clone)]
pub enum Artifact {
    /// `ACTIVATION_CONTRACT`
    ActivationContract(ActivationContract),
    /// `READINESS_DECISION`
    ReadinessDecision(ReadinessDecision),
    /// `COMPILED_CONSTRAINTS`
    CompiledConstraints(CompiledConstraints),
    /// `SEALED_CONTRACT`
    SealedContract(SealedContract),
    /// `ACTIVATION_RECEIPT`
    ActivationReceipt(ActivationReceipt),
    /// `ACTIVATION_ATTEMPT`
    ActivationAttempt(ActivationReceipt),
    /// `RESOLUTION_ARTIFACT`
    ResolutionArtifact(ResolutionArtifact),
    /// `CANON_BUNDLE`
    CanonBundle(CanonBundle),
    /// `FREEZE_BASELINE`
    FreezeBaseline(FreezeBaseline),
    /// `FREEZE_STATE`
    FreezeState(FreezeState),
    /// `SEASON_END_RECEIPT`
    SeasonEndReceipt(SeasonEndReceipt),
    /// `ARCHIVE_BUNDLE`
    ArchiveBundle(ArchiveBundle),
    /// `SUCCESSOR_SEED`
    SuccessorSeed(SuccessorSeed),
    /// `SUCCESSOR_CANDIDATE`
    SuccessorCandidate(SuccessorCandidateContract),
    /// `SUCCESSOR_ACKNOWLEDGEMENT`
    SuccessorAcknowledgement(SuccessorAcknowledgement),
    /// `VIOLATION`
    Violation(ViolationRecord),
    /// `PARITY_REPORT`
    ParityReport(ParityReport),
    /// `AUDIT_PACK_MANIFEST`
    AuditPackManifest(AuditPackManifest),
}

impl Artifact {
    /// Decodes stored bytes for the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactCodecError::Decode`] on malformed bytes.
    pub fn decode(kind: ArtifactKind, bytes: &[u8]) -> Result<Self, ArtifactCodecError> {
        let decode_err = |e: serde_json::Error| ArtifactCodecError::Decode {
            kind,
            message: e.to_string(),
        };
        Ok(match kind {
            ArtifactKind::ActivationContract => {
                Self::ActivationContract(serde_json::from_slice(bytes).map_err(decode_err)?)
            }
            ArtifactKind::ReadinessDecision => {
                Self::ReadinessDecision(serde_json::from_slice(bytes).map_err(decode_err)?)
            }
            ArtifactKind::CompiledConstraints => {
                Self::CompiledConstraints(serde_json::from_slice(bytes).map_err(decode_err)?)
            }
            ArtifactKind::SealedContract => {
                Self::SealedContract(serde_json::from_slice(bytes).map_err(decode_err)?)
            }
            ArtifactKind::ActivationReceipt => {
                Self::ActivationReceipt(serde_json::from_slice(bytes).map_err(decode_err)?)
            }
            ArtifactKind::ActivationAttempt => {
                Self::ActivationAttempt(serde_json::from_slice(bytes).map_err(decode_err)?)
            }
            ArtifactKind::ResolutionArtifact => {
                Self::ResolutionArtifact(serde_json::from_slice(bytes).map_err(decode_err)?)
            }
            ArtifactKind::CanonBundle => {
                Self::CanonBundle(serde_json::from_slice(bytes).map_err(decode_err)?)
            }
            ArtifactKind::FreezeBaseline => {
                Self::FreezeBaseline(serde_json::from_slice(bytes).map_err(decode_err)?)
            }
            ArtifactKind::FreezeState => {
                Self::FreezeState(serde_json::from_slice(bytes).map_err(decode_err)?)
            }
            ArtifactKind::SeasonEndReceipt => {
                Self::SeasonEndReceipt(serde_json::from_slice(bytes).map_err(decode_err)?)
            }
            ArtifactKind::ArchiveBundle => {
                Self::ArchiveBundle(serde_json::from_slice(bytes).map_err(decode_err)?)
            }
            ArtifactKind::SuccessorSeed => {
                Self::SuccessorSeed(serde_json::from_slice(bytes).map_err(decode_err)?)
            }
            ArtifactKind::SuccessorCandidate => {
                Self::SuccessorCandidate(serde_json::from_slice(bytes).map_err(decode_err)?)
            }
            ArtifactKind::SuccessorAcknowledgement => {
                Self::SuccessorAcknowledgement(serde_json::from_slice(bytes).map_err(decode_err)?)
            }
            ArtifactKind::Violation => {
                Self::Violation(serde_json::from_slice(bytes).map_err(decode_err)?)
            }
            ArtifactKind::ParityReport => {
                Self::ParityReport(serde_json::from_slice(bytes).map_err(decode_err)?)
            }
            ArtifactKind::AuditPackManifest => {
                Self::AuditPackManifest(serde_json::from_slice(bytes).map_err(decode_err)?)
            }
        })
    }

    /// The kind of this artifact.
    #[must_use]
    pub const fn kind(&self) -> ArtifactKind {
        match self {
            Self::ActivationContract(_) => ArtifactKind::ActivationContract,
            Self::ReadinessDecision(_) => ArtifactKind::ReadinessDecision,
            Self::CompiledConstraints(_) => ArtifactKind::CompiledConstraints,
            Self::SealedContract(_) => ArtifactKind::SealedContract,
            Self::ActivationReceipt(_) => ArtifactKind::ActivationReceipt,
            Self::ActivationAttempt(_) => ArtifactKind::ActivationAttempt,
            Self::ResolutionArtifact(_) => ArtifactKind::ResolutionArtifact,
            Self::CanonBundle(_) => ArtifactKind::CanonBundle,
            Self::FreezeBaseline(_) => ArtifactKind::FreezeBaseline,
            Self::FreezeState(_) => ArtifactKind::FreezeState,
            Self::SeasonEndReceipt(_) => ArtifactKind::SeasonEndReceipt,
            Self::ArchiveBundle(_) => ArtifactKind::ArchiveBundle,
            Self::SuccessorSeed(_) => ArtifactKind::SuccessorSeed,
            Self::SuccessorCandidate(_) => ArtifactKind::SuccessorCandidate,
            Self::SuccessorAcknowledgement(_) => ArtifactKind::SuccessorAcknowledgement,
            Self::Violation(_) => ArtifactKind::Violation,
            Self::ParityReport(_) => ArtifactKind::ParityReport,
            Self::AuditPackManifest(_) => ArtifactKind::AuditPackManifest,
        }
    }

    /// Serializes the decoded artifact back to a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactCodecError::Serialize`] on failure (should not
    /// happen for artifacts that decoded successfully).
    pub fn to_value(&self) -> Result<serde_json::Value, ArtifactCodecError> {
        let result = match self {
            Self::ActivationContract(a) => serde_json::to_value(a),
            Self::ReadinessDecision(a) => serde_json::to_value(a),
            Self::CompiledConstraints(a) => serde_json::to_value(a),
            Self::SealedContract(a) => serde_json::to_value(a),
            Self::ActivationReceipt(a) | Self::ActivationAttempt(a) => serde_json::to_value(a),
            Self::ResolutionArtifact(a) => serde_json::to_value(a),
            Self::CanonBundle(a) => serde_json::to_value(a),
            Self::FreezeBaseline(a) => serde_json::to_value(a),
            Self::FreezeState(a) => serde_json::to_value(a),
            Self::SeasonEndReceipt(a) => serde_json::to_value(a),
            Self::ArchiveBundle(a) => serde_json::to_value(a),
            Self::SuccessorSeed(a) => serde_json::to_value(a),
            Self::SuccessorCandidate(a) => serde_json::to_value(a),
            Self::SuccessorAcknowledgement(a) => serde_json::to_value(a),
            Self::Violation(a) => serde_json::to_value(a),
            Self::ParityReport(a) => serde_json::to_value(a),
            Self::AuditPackManifest(a) => serde_json::to_value(a),
        };
        result.map_err(|e| ArtifactCodecError::Serialize {
            message: e.to_string(),
        })
    }

    /// Recomputes the authoritative content hash from the decoded
    /// artifact itself.
    ///
    /// The audit exporter uses this to detect artifacts whose stored
    /// index hash no longer matches their content.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactCodecError`] if re-serialization fails.
    pub fn recomputed_hash(&self) -> Result<Hash32, ArtifactCodecError> {
        let value = self.to_value()?;
        let bytes = canonical::canonical_bytes(&value)?;
        Ok(ArtifactHasher::hash_domain(self.kind().domain(), &bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_hash_matches_union_recompute() {
        let contract = ActivationContract {
            season_id: "S1".to_string(),
            window: SeasonWindow {
                start_ms: 1_000,
                end_ms: 2_000,
            },
            invariants: vec!["no-mint".to_string()],
            created_ms: 900,
        };
        let direct = payload_hash(&contract).unwrap();

        let (bytes, stored) = encode_payload(&contract).unwrap();
        assert_eq!(direct, stored);

        let decoded = Artifact::decode(ArtifactKind::ActivationContract, &bytes).unwrap();
        assert_eq!(decoded.recomputed_hash().unwrap(), direct);
    }

    #[test]
    fn test_same_bytes_different_kind_different_hash() {
        // A receipt decoded as an attempt must still hash under the
        // attempt domain.
        let receipt = ActivationReceipt {
            season_id: "S1".to_string(),
            decision: ActivationDecision::NotActivated,
            inputs: ReceiptInputs::default(),
            seal_hash: None,
            failure_codes: vec![ActivationFailure::MissingReadinessDecision],
        };
        let (bytes, receipt_hash) = encode_payload(&receipt).unwrap();

        let as_attempt = Artifact::decode(ArtifactKind::ActivationAttempt, &bytes).unwrap();
        assert_ne!(as_attempt.recomputed_hash().unwrap(), receipt_hash);
    }

    #[test]
    fn test_decode_rejects_malformed_bytes() {
        let err = Artifact::decode(ArtifactKind::CanonBundle, b"{\"nope\":1}").unwrap_err();
        assert!(matches!(err, ArtifactCodecError::Decode { .. }));
    }
}
