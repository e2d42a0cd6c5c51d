//! Finalization artifacts: archive, end receipt, successor seed.

use serde::{Deserialize, Serialize};

use super::{ArtifactKind, ArtifactPayload};
use crate::crypto::Hash32;

/// Stable global anomaly flags recorded in the archive.
///
/// Only one-way or write-once facts belong here: the archive hash is
/// recomputed on every (idempotent) finalize call and compared against
/// the stored value, so volatile counters would produce false
/// integrity alarms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnomalyFlags {
    /// Whether the season was frozen at finalization time.
    pub frozen: bool,
    /// Communities present in the resolution output but missing a
    /// stored canon bundle.
    pub missing_bundles: u64,
}

/// Reference to one community's bundle inside the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommunityBundleRef {
    /// The community.
    pub community_id: String,
    /// Hash of the community's canon bundle record.
    pub bundle_hash: Hash32,
}

/// The season archive: the sorted per-community bundle-hash list plus
/// global anomaly flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchiveBundle {
    /// The archived season.
    pub season_id: String,
    /// Bundle references sorted by `community_id`.
    pub community_bundles: Vec<CommunityBundleRef>,
    /// Global anomaly flags.
    pub anomalies: AnomalyFlags,
}

impl ArtifactPayload for ArchiveBundle {
    const KIND: ArtifactKind = ArtifactKind::ArchiveBundle;

    fn artifact_id(&self) -> String {
        self.season_id.clone()
    }

    fn season_scope(&self) -> String {
        self.season_id.clone()
    }
}

/// Terminal status of a season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalizationStatus {
    /// The season is closed; no further season-scoped writes.
    Finalized,
}

/// The terminal closing receipt.
///
/// Once this exists with `FINALIZED` status, the season accepts no
/// further season-scoped writes, ever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeasonEndReceipt {
    /// The closed season.
    pub season_id: String,
    /// Terminal status.
    pub status: FinalizationStatus,
    /// Hash of the archive bundle record.
    pub archive_hash: Hash32,
    /// Hash of the readiness/audit summary the finalization required.
    pub audit_hash: Hash32,
}

impl ArtifactPayload for SeasonEndReceipt {
    const KIND: ArtifactKind = ArtifactKind::SeasonEndReceipt;

    fn artifact_id(&self) -> String {
        self.season_id.clone()
    }

    fn season_scope(&self) -> String {
        self.season_id.clone()
    }
}

/// Lineage seed written at finalization.
///
/// Captures the predecessor hashes a successor candidate derives its
/// input hash from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuccessorSeed {
    /// The finalized predecessor season.
    pub predecessor_id: String,
    /// Hash of the predecessor's archive record.
    pub archive_hash: Hash32,
    /// Hash of the predecessor's end receipt record.
    pub end_receipt_hash: Hash32,
    /// Hash of the predecessor's compiled constraints record.
    pub constraints_hash: Hash32,
}

impl ArtifactPayload for SuccessorSeed {
    const KIND: ArtifactKind = ArtifactKind::SuccessorSeed;

    fn artifact_id(&self) -> String {
        self.predecessor_id.clone()
    }

    fn season_scope(&self) -> String {
        self.predecessor_id.clone()
    }
}
