//! Resolution output and per-community canon bundles.

use serde::{Deserialize, Serialize};

use super::{ArtifactKind, ArtifactPayload};
use crate::crypto::{ArtifactHasher, Hash32};

/// Domain tag for the canon bundle hash.
pub const BUNDLE_DOMAIN: &[u8] = b"SL_BUNDLE_V1";

/// One user's final share of a community's allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AllocationEntry {
    /// The community being allocated.
    pub community_id: String,
    /// The user receiving the share.
    pub user_id: String,
    /// Final share in parts-per-million of the community total,
    /// after the whale clamp.
    pub final_share_ppm: u32,
}

/// The output of the resolution engine.
///
/// Entries are sorted by `(community_id, user_id)` so identical inputs
/// always canonicalize to identical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolutionArtifact {
    /// The season resolved.
    pub season_id: String,
    /// Sorted allocation entries.
    pub entries: Vec<AllocationEntry>,
    /// Hash over the canonical resolution inputs.
    pub input_hash: Hash32,
    /// Hash of the compiled constraints used.
    pub constraint_hash: Hash32,
    /// Hash over the canonical entry list.
    pub output_hash: Hash32,
    /// The resolution timestamp — part of the inputs, never wall time.
    pub resolved_at_ms: u64,
}

impl ArtifactPayload for ResolutionArtifact {
    const KIND: ArtifactKind = ArtifactKind::ResolutionArtifact;

    fn artifact_id(&self) -> String {
        self.season_id.clone()
    }

    fn season_scope(&self) -> String {
        self.season_id.clone()
    }
}

/// The per-community unit of audit truth.
///
/// Binds the five upstream hashes into one `bundle_hash`; the replay
/// verifier recomputes every component independently and compares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CanonBundle {
    /// The season this bundle belongs to.
    pub season_id: String,
    /// The community this bundle covers.
    pub community_id: String,
    /// Hash of the activation receipt.
    pub receipt_hash: Hash32,
    /// Hash of the compiled constraints.
    pub constraints_hash: Hash32,
    /// Hash of the ledger configuration in force at activation.
    pub config_hash: Hash32,
    /// Hash of this community's deterministic signal snapshot.
    pub signals_snapshot_hash: Hash32,
    /// The resolution output hash.
    pub resolution_output_hash: Hash32,
    /// Combined hash over the five inputs above.
    pub bundle_hash: Hash32,
}

impl CanonBundle {
    /// Storage id for a bundle: `<season>/<community>`.
    #[must_use]
    pub fn bundle_id(season_id: &str, community_id: &str) -> String {
        format!("{season_id}/{community_id}")
    }

    /// Combines the five input hashes into the bundle hash.
    #[must_use]
    pub fn compute_bundle_hash(
        receipt_hash: &Hash32,
        constraints_hash: &Hash32,
        config_hash: &Hash32,
        signals_snapshot_hash: &Hash32,
        resolution_output_hash: &Hash32,
    ) -> Hash32 {
        ArtifactHasher::combine(
            BUNDLE_DOMAIN,
            &[
                receipt_hash,
                constraints_hash,
                config_hash,
                signals_snapshot_hash,
                resolution_output_hash,
            ],
        )
    }
}

impl ArtifactPayload for CanonBundle {
    const KIND: ArtifactKind = ArtifactKind::CanonBundle;

    fn artifact_id(&self) -> String {
        Self::bundle_id(&self.season_id, &self.community_id)
    }

    fn season_scope(&self) -> String {
        self.season_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_hash_changes_with_any_input() {
        let h = |b: u8| Hash32([b; 32]);
        let base = CanonBundle::compute_bundle_hash(&h(1), &h(2), &h(3), &h(4), &h(5));
        for i in 0..5u8 {
            let mut parts = [h(1), h(2), h(3), h(4), h(5)];
            parts[i as usize] = h(99);
            let tweaked = CanonBundle::compute_bundle_hash(
                &parts[0], &parts[1], &parts[2], &parts[3], &parts[4],
            );
            assert_ne!(base, tweaked, "input {i} did not affect bundle hash");
        }
    }

    #[test]
    fn test_bundle_id_shape() {
        assert_eq!(CanonBundle::bundle_id("S1", "garden"), "S1/garden");
    }
}
