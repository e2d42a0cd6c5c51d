//! Freeze baseline and frozen-marker artifacts.

use serde::{Deserialize, Serialize};

use super::{ArtifactKind, ArtifactPayload};
use crate::crypto::{ArtifactHasher, Hash32};

/// Domain tag for the protocol fingerprint.
pub const FINGERPRINT_DOMAIN: &[u8] = b"SL_FINGERPRINT_V1";

/// The protocol fingerprint captured at activation time.
///
/// The drift guard recomputes the fingerprint from the live store on
/// every post-activation write and compares it to this baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FreezeBaseline {
    /// The season this baseline covers.
    pub season_id: String,
    /// Hash of the sealed contract record.
    pub contract_hash: Hash32,
    /// Hash of the activation receipt record.
    pub receipt_hash: Hash32,
    /// Hash of the compiled constraints record.
    pub constraints_hash: Hash32,
    /// Hash of the ledger configuration in force at activation.
    pub config_hash: Hash32,
    /// Combined fingerprint over the four hashes above.
    pub fingerprint: Hash32,
}

impl FreezeBaseline {
    /// Combines the four protocol hashes into the fingerprint.
    #[must_use]
    pub fn compute_fingerprint(
        contract_hash: &Hash32,
        receipt_hash: &Hash32,
        constraints_hash: &Hash32,
        config_hash: &Hash32,
    ) -> Hash32 {
        ArtifactHasher::combine(
            FINGERPRINT_DOMAIN,
            &[contract_hash, receipt_hash, constraints_hash, config_hash],
        )
    }
}

impl ArtifactPayload for FreezeBaseline {
    const KIND: ArtifactKind = ArtifactKind::FreezeBaseline;

    fn artifact_id(&self) -> String {
        self.season_id.clone()
    }

    fn season_scope(&self) -> String {
        self.season_id.clone()
    }
}

/// Why a season was frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FreezeCause {
    /// The live fingerprint diverged from the baseline.
    Drift,
    /// No baseline was ever captured for an activated season.
    BaselineMissing,
}

/// The one-way frozen marker for a season.
///
/// Persisted through the same write-once store as every other artifact;
/// in-memory caching of this flag is a fast path only. There is no
/// unfreeze operation in the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FreezeState {
    /// The frozen season.
    pub season_id: String,
    /// Why the season froze.
    pub cause: FreezeCause,
    /// The baseline fingerprint, when one existed.
    pub expected_fingerprint: Option<Hash32>,
    /// The fingerprint observed at freeze time, when computable.
    pub observed_fingerprint: Option<Hash32>,
}

impl ArtifactPayload for FreezeState {
    const KIND: ArtifactKind = ArtifactKind::FreezeState;

    fn artifact_id(&self) -> String {
        self.season_id.clone()
    }

    fn season_scope(&self) -> String {
        self.season_id.clone()
    }
}
