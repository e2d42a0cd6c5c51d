//! Parity report and audit pack manifest artifacts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ArtifactKind, ArtifactPayload};
use crate::canonical;
use crate::crypto::{ArtifactHasher, Hash32};

/// Overall parity status.
///
/// The severity ordering is uniform and fail-closed: anything missing
/// on either side or mismatched in content is `FAIL`; `WARN` is
/// reserved for pairs that differ only in known-volatile fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParityStatus {
    /// Mirrors agree on every checked pair.
    Pass,
    /// Only volatile-field differences remain.
    Warn,
    /// At least one pair is missing or mismatched.
    Fail,
}

/// Classification of one local/remote artifact pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MismatchKind {
    /// Present on the remote mirror only.
    MissingLocal,
    /// Present on the local store only.
    MissingRemote,
    /// Both present; normalized content hashes differ.
    HashMismatch,
    /// Both present; one side failed to parse or decode.
    StructureMismatch,
    /// Raw bytes differ but normalized content agrees.
    VolatileOnly,
}

impl MismatchKind {
    /// Whether this mismatch is benign (downgrades to `WARN`, not
    /// `FAIL`).
    #[must_use]
    pub const fn is_benign(self) -> bool {
        matches!(self, Self::VolatileOnly)
    }
}

/// One divergent pair found by the parity checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParityMismatch {
    /// The classification.
    pub kind: MismatchKind,
    /// Collection of the divergent artifact.
    pub collection: String,
    /// Id of the divergent artifact.
    pub id: String,
    /// Normalized local hash, when present.
    pub local_hash: Option<Hash32>,
    /// Normalized remote hash, when present.
    pub remote_hash: Option<Hash32>,
}

/// The persisted result of one parity check run.
///
/// Content-addressed: each run writes a distinct record keyed by its
/// own content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParityReport {
    /// The season checked.
    pub season_id: String,
    /// Overall status.
    pub status: ParityStatus,
    /// Number of pairs compared.
    pub checked_pairs: u64,
    /// Divergent pairs (empty on `PASS`).
    pub mismatches: Vec<ParityMismatch>,
    /// When the check ran (wall time; audit-side record).
    pub observed_ms: u64,
}

impl ParityReport {
    /// Computes the report's content hash — also its storage id.
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

impl ArtifactPayload for ParityReport {
    const KIND: ArtifactKind = ArtifactKind::ParityReport;

    fn artifact_id(&self) -> String {
        self.content_hash().to_hex()
    }

    fn season_scope(&self) -> String {
        self.season_id.clone()
    }
}

/// The ordered manifest terminating an audit pack export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditPackManifest {
    /// The exported season.
    pub season_id: String,
    /// Artifact type names in export order.
    pub artifact_order: Vec<String>,
    /// Per-type list of exported artifact hashes, in line order.
    pub artifact_hashes: BTreeMap<String, Vec<Hash32>>,
    /// Hash over the joined export lines.
    pub pack_hash: Hash32,
}

impl ArtifactPayload for AuditPackManifest {
    const KIND: ArtifactKind = ArtifactKind::AuditPackManifest;

    fn artifact_id(&self) -> String {
        format!("{}/{}", self.season_id, self.pack_hash.hex_prefix(12))
    }

    fn season_scope(&self) -> String {
        self.season_id.clone()
    }
}
