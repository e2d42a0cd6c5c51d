//! The closed set of artifact kinds and their guard scopes.

use serde::{Deserialize, Serialize};

/// Every kind of artifact the ledger can persist.
///
/// The kind determines the storage collection, the hash domain tag, and
/// which write guards apply. Adding a kind here is the only way to make
/// the store accept a new artifact shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactKind {
    /// Unsealed activation proposal for a season.
    ActivationContract,
    /// Persisted readiness decision (`PROCEED`/`ABORT` with reasons).
    ReadinessDecision,
    /// Sealed season-scoped rule overrides.
    CompiledConstraints,
    /// Contract bound to its readiness decision and constraint set.
    SealedContract,
    /// Irreversible proof that a season is live.
    ActivationReceipt,
    /// A failed activation attempt (attempt-scoped key).
    ActivationAttempt,
    /// Output of the resolution engine.
    ResolutionArtifact,
    /// Per-community sealed allocation truth.
    CanonBundle,
    /// Protocol fingerprint captured at activation.
    FreezeBaseline,
    /// One-way frozen marker for a season.
    FreezeState,
    /// Terminal closing receipt for a season.
    SeasonEndReceipt,
    /// Hash of the sorted per-community bundle list plus anomaly flags.
    ArchiveBundle,
    /// Lineage seed written at finalization for the successor build.
    SuccessorSeed,
    /// Proposal for the next season, derived from a finalized predecessor.
    SuccessorCandidate,
    /// Human-gated acknowledgement promoting a candidate to `READY`.
    SuccessorAcknowledgement,
    /// Immutable record of a rejected or anomalous write.
    Violation,
    /// Cross-mirror consistency audit result.
    ParityReport,
    /// Ordered manifest over an exported audit pack.
    AuditPackManifest,
}

impl ArtifactKind {
    /// All kinds, in the canonical audit-export order.
    pub const ALL: [Self; 18] = [
        Self::ActivationContract,
        Self::ReadinessDecision,
        Self::CompiledConstraints,
        Self::SealedContract,
        Self::ActivationReceipt,
        Self::ActivationAttempt,
        Self::ResolutionArtifact,
        Self::CanonBundle,
        Self::FreezeBaseline,
        Self::FreezeState,
        Self::SeasonEndReceipt,
        Self::ArchiveBundle,
        Self::SuccessorSeed,
        Self::SuccessorCandidate,
        Self::SuccessorAcknowledgement,
        Self::Violation,
        Self::ParityReport,
        Self::AuditPackManifest,
    ];

    /// The storage collection this kind lives in.
    #[must_use]
    pub const fn collection(self) -> &'static str {
        match self {
            Self::ActivationContract => "activation_contract",
            Self::ReadinessDecision => "readiness_decision",
            Self::CompiledConstraints => "compiled_constraints",
            Self::SealedContract => "sealed_contract",
            Self::ActivationReceipt => "activation_receipt",
            Self::ActivationAttempt => "activation_attempt",
            Self::ResolutionArtifact => "resolution_artifact",
            Self::CanonBundle => "canon_bundle",
            Self::FreezeBaseline => "freeze_baseline",
            Self::FreezeState => "freeze_state",
            Self::SeasonEndReceipt => "season_end_receipt",
            Self::ArchiveBundle => "archive_bundle",
            Self::SuccessorSeed => "successor_seed",
            Self::SuccessorCandidate => "successor_candidate",
            Self::SuccessorAcknowledgement => "successor_ack",
            Self::Violation => "violation",
            Self::ParityReport => "parity_report",
            Self::AuditPackManifest => "audit_manifest",
        }
    }

    /// The wire/export type name for this kind.
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::ActivationContract => "ACTIVATION_CONTRACT",
            Self::ReadinessDecision => "READINESS_DECISION",
            Self::CompiledConstraints => "COMPILED_CONSTRAINTS",
            Self::SealedContract => "SEALED_CONTRACT",
            Self::ActivationReceipt => "ACTIVATION_RECEIPT",
            Self::ActivationAttempt => "ACTIVATION_ATTEMPT",
            Self::ResolutionArtifact => "RESOLUTION_ARTIFACT",
            Self::CanonBundle => "CANON_BUNDLE",
            Self::FreezeBaseline => "FREEZE_BASELINE",
            Self::FreezeState => "FREEZE_STATE",
            Self::SeasonEndReceipt => "SEASON_END_RECEIPT",
            Self::ArchiveBundle => "ARCHIVE_BUNDLE",
            Self::SuccessorSeed => "SUCCESSOR_SEED",
            Self::SuccessorCandidate => "SUCCESSOR_CANDIDATE",
            Self::SuccessorAcknowledgement => "SUCCESSOR_ACKNOWLEDGEMENT",
            Self::Violation => "VIOLATION",
            Self::ParityReport => "PARITY_REPORT",
            Self::AuditPackManifest => "AUDIT_PACK_MANIFEST",
        }
    }

    /// Domain tag for content hashing.
    ///
    /// Identical canonical bytes stored under two kinds must never
    /// produce the same hash.
    #[must_use]
    pub const fn domain(self) -> &'static [u8] {
        match self {
            Self::ActivationContract => b"SL_ACTIVATION_CONTRACT_V1",
            Self::ReadinessDecision => b"SL_READINESS_DECISION_V1",
            Self::CompiledConstraints => b"SL_COMPILED_CONSTRAINTS_V1",
            Self::SealedContract => b"SL_SEALED_CONTRACT_V1",
            Self::ActivationReceipt => b"SL_ACTIVATION_RECEIPT_V1",
            Self::ActivationAttempt => b"SL_ACTIVATION_ATTEMPT_V1",
            Self::ResolutionArtifact => b"SL_RESOLUTION_ARTIFACT_V1",
            Self::CanonBundle => b"SL_CANON_BUNDLE_V1",
            Self::FreezeBaseline => b"SL_FREEZE_BASELINE_V1",
            Self::FreezeState => b"SL_FREEZE_STATE_V1",
            Self::SeasonEndReceipt => b"SL_SEASON_END_RECEIPT_V1",
            Self::ArchiveBundle => b"SL_ARCHIVE_BUNDLE_V1",
            Self::SuccessorSeed => b"SL_SUCCESSOR_SEED_V1",
            Self::SuccessorCandidate => b"SL_SUCCESSOR_CANDIDATE_V1",
            Self::SuccessorAcknowledgement => b"SL_SUCCESSOR_ACK_V1",
            Self::Violation => b"SL_VIOLATION_V1",
            Self::ParityReport => b"SL_PARITY_REPORT_V1",
            Self::AuditPackManifest => b"SL_AUDIT_MANIFEST_V1",
        }
    }

    /// Whether writes of this kind must land inside the sealed season
    /// window `[start_ms, end_ms)`.
    ///
    /// Closing artifacts are exempt: finalization legitimately happens
    /// at or after `end_ms`.
    #[must_use]
    pub const fn window_scoped(self) -> bool {
        matches!(
            self,
            Self::ActivationContract
                | Self::ReadinessDecision
                | Self::CompiledConstraints
                | Self::SealedContract
                | Self::ActivationReceipt
                | Self::ActivationAttempt
                | Self::ResolutionArtifact
                | Self::CanonBundle
                | Self::FreezeBaseline
        )
    }

    /// Whether writes of this kind require an `ACTIVATED` receipt.
    ///
    /// The contract/readiness/constraints trio and the
    /// activation-sequence artifacts themselves are exempt; everything
    /// else season-scoped is gated.
    #[must_use]
    pub const fn activation_gated(self) -> bool {
        matches!(
            self,
            Self::ResolutionArtifact
                | Self::CanonBundle
                | Self::FreezeBaseline
                | Self::SeasonEndReceipt
                | Self::ArchiveBundle
                | Self::SuccessorSeed
        )
    }

    /// Whether a `FINALIZED` end receipt blocks further writes of this
    /// kind.
    ///
    /// Closing artifacts are exempt so a partially-finalized season can
    /// be healed by an idempotent re-run; audit-side artifacts are
    /// exempt so post-season audits can still record their results.
    #[must_use]
    pub const fn finalization_blocked(self) -> bool {
        matches!(
            self,
            Self::ActivationContract
                | Self::ReadinessDecision
                | Self::CompiledConstraints
                | Self::SealedContract
                | Self::ActivationReceipt
                | Self::ActivationAttempt
                | Self::ResolutionArtifact
                | Self::CanonBundle
                | Self::FreezeBaseline
        )
    }

    /// Audit-side kinds bypass the lifecycle guards entirely (only the
    /// immutability check applies). A frozen season must still be able
    /// to record its own violations.
    #[must_use]
    pub const fn audit_side(self) -> bool {
        matches!(
            self,
            Self::Violation | Self::ParityReport | Self::AuditPackManifest
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collections_unique() {
        let mut seen = std::collections::HashSet::new();
        for kind in ArtifactKind::ALL {
            assert!(seen.insert(kind.collection()), "{kind:?} collection reused");
        }
    }

    #[test]
    fn test_domains_unique() {
        let mut seen = std::collections::HashSet::new();
        for kind in ArtifactKind::ALL {
            assert!(seen.insert(kind.domain()), "{kind:?} domain reused");
        }
    }

    #[test]
    fn test_audit_side_kinds_unguarded() {
        for kind in ArtifactKind::ALL {
            if kind.audit_side() {
                assert!(!kind.window_scoped());
                assert!(!kind.activation_gated());
                assert!(!kind.finalization_blocked());
            }
        }
    }

    #[test]
    fn test_freeze_state_exempt_from_guards() {
        let kind = ArtifactKind::FreezeState;
        assert!(!kind.window_scoped());
        assert!(!kind.finalization_blocked());
        assert!(!kind.activation_gated());
    }
}
