//! Season contract, readiness, sealing, and activation artifacts.

use serde::{Deserialize, Serialize};

use super::{ArtifactKind, ArtifactPayload};
use crate::crypto::{ArtifactHasher, Hash32};

/// Domain tag for the contract seal hash.
pub const SEAL_DOMAIN: &[u8] = b"SL_SEAL_V1";

/// A season's half-open time window `[start_ms, end_ms)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeasonWindow {
    /// Inclusive start, milliseconds since the Unix epoch.
    pub start_ms: u64,
    /// Exclusive end, milliseconds since the Unix epoch.
    pub end_ms: u64,
}

impl SeasonWindow {
    /// Whether the given instant falls inside the window.
    #[must_use]
    pub const fn contains(&self, now_ms: u64) -> bool {
        now_ms >= self.start_ms && now_ms < self.end_ms
    }
}

/// The unsealed activation proposal for a season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivationContract {
    /// The season this contract proposes to activate.
    pub season_id: String,
    /// Proposed accounting window.
    pub window: SeasonWindow,
    /// Operator-declared invariants for the season.
    pub invariants: Vec<String>,
    /// Proposal creation time (operator-supplied input data).
    pub created_ms: u64,
}

impl ArtifactPayload for ActivationContract {
    const KIND: ArtifactKind = ArtifactKind::ActivationContract;

    fn artifact_id(&self) -> String {
        self.season_id.clone()
    }

    fn season_scope(&self) -> String {
        self.season_id.clone()
    }
}

/// Aggregate verdict of the readiness audit pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditVerdict {
    /// Every checked community verified clean.
    Pass,
    /// No failures, but some communities could not be judged.
    PassWithWarnings,
    /// At least one community failed replay verification.
    Fail,
}

/// The go/no-go call of a readiness evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadinessCall {
    /// Activation may proceed.
    Proceed,
    /// Activation is blocked; see the reasons list.
    Abort,
}

/// Enumerated reasons attached to an `ABORT` readiness call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadinessReason {
    /// No activation contract has been written for the season.
    MissingActivationContract,
    /// No compiled constraints have been written for the season.
    MissingConstraints,
    /// Constraints exist but are not sealed.
    ConstraintsUnsealed,
    /// The governance gate vetoed the season.
    MoralBlock,
    /// The batch replay audit failed for at least one community.
    AuditFail,
    /// This season was proposed as a successor but the hand-off was
    /// never acknowledged.
    HandoffUnacknowledged,
}

/// Per-outcome counts of the batch verification pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommunityTally {
    /// Communities checked in total.
    pub checked: u64,
    /// Communities whose bundles replayed clean.
    pub passed: u64,
    /// Communities whose bundles diverged.
    pub failed: u64,
    /// Communities that could not be judged (missing prerequisites).
    pub inconclusive: u64,
}

/// The persisted decision of a readiness evaluation.
///
/// Content-addressed: the storage id is the decision's own content
/// hash, so every distinct world state persists its own decision and
/// re-running readiness in an unchanged world is an idempotent no-op.
/// `activate` names the decision it depends on by exactly this hash.
/// Content is deterministic over the store and signal state — no wall
/// time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadinessDecision {
    /// The season evaluated.
    pub season_id: String,
    /// Aggregate audit verdict.
    pub audit: AuditVerdict,
    /// Go/no-go call.
    pub call: ReadinessCall,
    /// Sorted reasons for an abort (empty on proceed).
    pub reasons: Vec<ReadinessReason>,
    /// Batch verification counts.
    pub communities: CommunityTally,
}

impl ReadinessDecision {
    /// Computes the decision's content hash — also its storage id.
    #[must_use]
    pub fn content_hash(&self) -> Hash32 {
        serde_json::to_value(self)
            .ok()
            .and_then(|v| crate::canonical::canonical_bytes(&v).ok())
            .map_or_else(
                || ArtifactHasher::hash_domain(Self::KIND.domain(), format!("{self:?}").as_bytes()),
                |bytes| ArtifactHasher::hash_domain(Self::KIND.domain(), &bytes),
            )
    }
}

impl ArtifactPayload for ReadinessDecision {
    const KIND: ArtifactKind = ArtifactKind::ReadinessDecision;

    fn artifact_id(&self) -> String {
        self.content_hash().to_hex()
    }

    fn season_scope(&self) -> String {
        self.season_id.clone()
    }
}

/// The contract bound to the readiness decision and constraint set.
///
/// Produced exactly once per season. Content is fully derived from
/// upstream artifact hashes, so a crashed activation that re-runs
/// recomputes the identical seal and the re-write is idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SealedContract {
    /// The sealed season.
    pub season_id: String,
    /// The accounting window carried forward from the base contract.
    ///
    /// The temporal lock reads the window from here: a window only
    /// exists once a contract is sealed.
    pub window: SeasonWindow,
    /// Hash of the base activation contract.
    pub contract_base_hash: Hash32,
    /// Hash of the readiness decision the seal depends on.
    pub readiness_hash: Hash32,
    /// Hash of the compiled constraints.
    pub constraints_hash: Hash32,
    /// Hash of the resolution artifact proven deterministic.
    pub resolution_artifact_hash: Hash32,
    /// The seal over all four inputs.
    pub seal_hash: Hash32,
}

impl SealedContract {
    /// Computes the seal hash over the four input hashes.
    #[must_use]
    pub fn compute_seal(
        contract_base_hash: &Hash32,
        readiness_hash: &Hash32,
        constraints_hash: &Hash32,
        resolution_artifact_hash: &Hash32,
    ) -> Hash32 {
        ArtifactHasher::combine(
            SEAL_DOMAIN,
            &[
                contract_base_hash,
                readiness_hash,
                constraints_hash,
                resolution_artifact_hash,
            ],
        )
    }
}

impl ArtifactPayload for SealedContract {
    const KIND: ArtifactKind = ArtifactKind::SealedContract;

    fn artifact_id(&self) -> String {
        self.season_id.clone()
    }

    fn season_scope(&self) -> String {
        self.season_id.clone()
    }
}

/// Outcome of an activation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivationDecision {
    /// The season is live.
    Activated,
    /// The attempt failed; see `failure_codes`.
    NotActivated,
}

/// Failure codes carried by a `NOT_ACTIVATED` receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivationFailure {
    /// No readiness decision exists for the season.
    MissingReadinessDecision,
    /// The caller's decision hash does not match the stored decision.
    ReadinessHashMismatch,
    /// The stored readiness decision is an abort.
    ReadinessAborted,
    /// No activation contract exists.
    MissingActivationContract,
    /// No compiled constraints exist.
    MissingConstraints,
    /// Constraints exist but are not sealed.
    ConstraintsUnsealed,
    /// The contract was already sealed by a different activation.
    ContractAlreadySealed,
    /// The double-run produced divergent output hashes.
    NonDeterministicResolution,
    /// The resolution engine aborted on a post-hoc compliance check.
    ConstraintViolationAbort,
    /// A required store write was rejected.
    StoreRejected,
}

/// The hashes of every input an activation depended on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReceiptInputs {
    /// Hash of the base activation contract, when present.
    pub contract_base_hash: Option<Hash32>,
    /// Hash of the readiness decision, when present.
    pub readiness_hash: Option<Hash32>,
    /// Hash of the compiled constraints, when present.
    pub constraints_hash: Option<Hash32>,
    /// Hash of the resolution artifact, when one was produced.
    pub resolution_artifact_hash: Option<Hash32>,
}

/// The irreversible proof that a season is live — or the record of a
/// failed attempt.
///
/// The canonical receipt key holds only the single `ACTIVATED` receipt;
/// failed attempts persist under attempt-scoped (content-addressed)
/// keys so a later attempt can still succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivationReceipt {
    /// The season this receipt belongs to.
    pub season_id: String,
    /// Activation outcome.
    pub decision: ActivationDecision,
    /// Hashes of the inputs the decision depended on.
    pub inputs: ReceiptInputs,
    /// The contract seal, present iff `decision == ACTIVATED`.
    pub seal_hash: Option<Hash32>,
    /// Sorted failure codes, empty iff `decision == ACTIVATED`.
    pub failure_codes: Vec<ActivationFailure>,
}

impl ArtifactPayload for ActivationReceipt {
    const KIND: ArtifactKind = ArtifactKind::ActivationReceipt;

    fn artifact_id(&self) -> String {
        self.season_id.clone()
    }

    fn season_scope(&self) -> String {
        self.season_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_contains_half_open() {
        let window = SeasonWindow {
            start_ms: 100,
            end_ms: 200,
        };
        assert!(!window.contains(99));
        assert!(window.contains(100));
        assert!(window.contains(199));
        assert!(!window.contains(200));
    }

    #[test]
    fn test_seal_sensitive_to_every_input() {
        let a = Hash32([1; 32]);
        let b = Hash32([2; 32]);
        let c = Hash32([3; 32]);
        let d = Hash32([4; 32]);
        let seal = SealedContract::compute_seal(&a, &b, &c, &d);

        let x = Hash32([9; 32]);
        assert_ne!(seal, SealedContract::compute_seal(&x, &b, &c, &d));
        assert_ne!(seal, SealedContract::compute_seal(&a, &x, &c, &d));
        assert_ne!(seal, SealedContract::compute_seal(&a, &b, &x, &d));
        assert_ne!(seal, SealedContract::compute_seal(&a, &b, &c, &x));
    }
}
