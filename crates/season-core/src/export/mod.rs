//! Hash-verified audit pack export.
//!
//! Assembles a newline-delimited export of a season's sealed
//! artifacts: one canonicalized record per artifact, terminated by a
//! manifest record carrying the ordered type list, the per-type hash
//! map, and the overall pack hash. Before anything is written, every
//! artifact's authoritative hash is recomputed from its own content —
//! a single disagreement aborts the whole export. A pack must never
//! ship a corrupted or drifted artifact.
//!
//! File format: `{type, artifact, artifactHash}` records, one per
//! line, then `{type: "AUDIT_PACK_MANIFEST", artifactOrder,
//! artifactHashes, packHash}`. Filename:
//! `<prefix>_<seasonId>_<first-12-hex-of-packHash>.jsonl`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use thiserror::Error;
use tracing::info;

use crate::artifact::{ActivationReceipt, Artifact, ArtifactCodecError, ArtifactKind,
    AuditPackManifest};
use crate::canonical::{self, CanonicalError};
use crate::crypto::{ArtifactHasher, Hash32};
use crate::store::{SeasonStore, StoreError};

/// Kinds every exportable season must have, in export order.
const REQUIRED_KINDS: [ArtifactKind; 9] = [
    ArtifactKind::ActivationContract,
    ArtifactKind::ReadinessDecision,
    ArtifactKind::CompiledConstraints,
    ArtifactKind::SealedContract,
    ArtifactKind::ActivationReceipt,
    ArtifactKind::ResolutionArtifact,
    ArtifactKind::FreezeBaseline,
    ArtifactKind::SeasonEndReceipt,
    ArtifactKind::ArchiveBundle,
];

/// Kinds included when present, in export order.
const OPTIONAL_KINDS: [ArtifactKind; 2] = [ArtifactKind::FreezeState, ArtifactKind::SuccessorSeed];

/// Errors that abort an export. Nothing is handed to the sink on any
/// of these.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExportError {
    /// A required artifact is missing; the season is not exportable.
    #[error("missing required artifact {kind:?} for season {season_id}")]
    MissingArtifact {
        /// The missing kind.
        kind: ArtifactKind,
        /// The season being exported.
        season_id: String,
    },

    /// An artifact's recomputed hash disagrees with its stored claim.
    #[error("artifact {collection}/{id} drifted: stored {stored}, recomputed {recomputed}")]
    HashMismatch {
        /// Collection of the drifted artifact.
        collection: String,
        /// Id of the drifted artifact.
        id: String,
        /// The hash the store claims.
        stored: Hash32,
        /// The hash recomputed from content.
        recomputed: Hash32,
    },

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An artifact failed to decode or re-serialize.
    #[error(transparent)]
    Codec(#[from] ArtifactCodecError),

    /// A record failed to canonicalize.
    #[error(transparent)]
    Canonical(#[from] CanonicalError),

    /// The sink could not accept the pack.
    #[error("audit sink failed: {0}")]
    Sink(#[from] std::io::Error),

    /// A received pack failed its self-check.
    #[error("pack integrity check failed: {detail}")]
    PackIntegrity {
        /// What is wrong with the pack.
        detail: String,
    },
}

/// Where finished packs go.
pub trait AuditSink {
    /// Accepts the finished pack bytes under the conventional
    /// filename.
    ///
    /// # Errors
    ///
    /// Returns [`std::io::Error`] if the pack cannot be persisted.
    fn write_pack(&self, filename: &str, bytes: &[u8]) -> Result<(), std::io::Error>;
}

/// Sink writing packs into a directory.
#[derive(Debug, Clone)]
pub struct FileAuditSink {
    dir: PathBuf,
}

impl FileAuditSink {
    /// Creates a sink rooted at `dir` (created if absent).
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The full path a filename lands at.
    #[must_use]
    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }
}

impl AuditSink for FileAuditSink {
    fn write_pack(&self, filename: &str, bytes: &[u8]) -> Result<(), std::io::Error> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.dir.join(filename), bytes)
    }
}

/// Summary of a completed export.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    /// The conventional filename the pack was written under.
    pub filename: String,
    /// Hash over the joined artifact lines.
    pub pack_hash: Hash32,
    /// Artifact lines in the pack (excluding the manifest).
    pub artifact_lines: u64,
    /// Total pack size in bytes.
    pub bytes: u64,
}

/// Audit pack exporter.
pub struct AuditExporter<'a> {
    store: &'a SeasonStore,
    prefix: String,
}

impl<'a> AuditExporter<'a> {
    /// Creates an exporter with the configured filename prefix.
    pub fn new(store: &'a SeasonStore, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// Exports a season's sealed artifacts to the sink.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] — and hands *nothing* to the sink — if
    /// any required artifact is missing or any artifact fails its
    /// hash recomputation.
    pub fn export(
        &self,
        season_id: &str,
        sink: &dyn AuditSink,
    ) -> Result<ExportSummary, ExportError> {
        let mut lines: Vec<String> = Vec::new();
        let mut artifact_order: Vec<String> = Vec::new();
        let mut artifact_hashes: BTreeMap<String, Vec<Hash32>> = BTreeMap::new();

        // Readiness decisions are content-addressed; the exported one
        // is the decision the activation receipt committed to.
        let readiness_id: Option<String> = self
            .store
            .read::<ActivationReceipt>(season_id)?
            .and_then(|(receipt, _)| receipt.inputs.readiness_hash.map(|h| h.to_hex()));

        for kind in REQUIRED_KINDS {
            let id = match (kind, &readiness_id) {
                (ArtifactKind::ReadinessDecision, Some(id)) => id.clone(),
                (ArtifactKind::ReadinessDecision, None) => {
                    return Err(ExportError::MissingArtifact {
                        kind,
                        season_id: season_id.to_string(),
                    });
                }
                _ => season_id.to_string(),
            };
            let Some(line) = self.export_one_id(kind, &id, &mut artifact_hashes)? else {
                return Err(ExportError::MissingArtifact {
                    kind,
                    season_id: season_id.to_string(),
                });
            };
            push_type(&mut artifact_order, kind);
            lines.push(line);

            // Bundles sit between the resolution artifact and the
            // closing artifacts, matching their production order.
            if kind == ArtifactKind::ResolutionArtifact {
                let prefix = format!("{season_id}/");
                for id in self.store.list_ids(ArtifactKind::CanonBundle)? {
                    if !id.starts_with(&prefix) {
                        continue;
                    }
                    if let Some(line) =
                        self.export_one_id(ArtifactKind::CanonBundle, &id, &mut artifact_hashes)?
                    {
                        push_type(&mut artifact_order, ArtifactKind::CanonBundle);
                        lines.push(line);
                    }
                }
            }
        }

        for kind in OPTIONAL_KINDS {
            if let Some(line) = self.export_one_id(kind, season_id, &mut artifact_hashes)? {
                push_type(&mut artifact_order, kind);
                lines.push(line);
            }
        }

        let pack_hash = ArtifactHasher::hash_content(lines.join("\n").as_bytes());

        let manifest = AuditPackManifest {
            season_id: season_id.to_string(),
            artifact_order: artifact_order.clone(),
            artifact_hashes: artifact_hashes.clone(),
            pack_hash,
        };
        let manifest_line = canonical::canonicalize(&json!({
            "type": ArtifactKind::AuditPackManifest.type_name(),
            "artifactOrder": artifact_order,
            "artifactHashes": artifact_hashes,
            "packHash": pack_hash,
        }))?;

        let mut body = lines.join("\n");
        body.push('\n');
        body.push_str(&manifest_line);
        body.push('\n');

        let filename = format!(
            "{}_{}_{}.jsonl",
            self.prefix,
            season_id,
            pack_hash.hex_prefix(12)
        );
        sink.write_pack(&filename, body.as_bytes())?;

        // The manifest is itself an artifact: persist it write-once so
        // later audits can prove which packs were produced.
        self.store.write_artifact(&manifest)?;

        info!(season_id, %filename, %pack_hash, "audit pack exported");
        Ok(ExportSummary {
            filename,
            pack_hash,
            artifact_lines: lines.len() as u64,
            bytes: body.len() as u64,
        })
    }

    /// Fetches, re-verifies, and serializes one artifact line.
    fn export_one_id(
        &self,
        kind: ArtifactKind,
        id: &str,
        artifact_hashes: &mut BTreeMap<String, Vec<Hash32>>,
    ) -> Result<Option<String>, ExportError> {
        let Some(record) = self.store.read_record(kind, id)? else {
            return Ok(None);
        };

        let artifact = Artifact::decode(kind, &record.bytes)?;
        let recomputed = artifact.recomputed_hash()?;
        if recomputed != record.hash {
            return Err(ExportError::HashMismatch {
                collection: kind.collection().to_string(),
                id: id.to_string(),
                stored: record.hash,
                recomputed,
            });
        }

        let line = canonical::canonicalize(&json!({
            "type": kind.type_name(),
            "artifact": artifact.to_value()?,
            "artifactHash": record.hash,
        }))?;

        artifact_hashes
            .entry(kind.type_name().to_string())
            .or_default()
            .push(record.hash);
        Ok(Some(line))
    }
}

fn push_type(order: &mut Vec<String>, kind: ArtifactKind) {
    let name = kind.type_name();
    if order.last().map(String::as_str) != Some(name) && !order.iter().any(|t| t == name) {
        order.push(name.to_string());
    }
}

/// Self-checks a received pack: every line must parse, the manifest
/// must be last, and the manifest's `packHash` must equal the hash of
/// the joined artifact lines.
///
/// # Errors
///
/// Returns [`ExportError::PackIntegrity`] describing the first
/// problem found.
pub fn verify_pack(bytes: &[u8]) -> Result<AuditPackManifest, ExportError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ExportError::PackIntegrity {
        detail: "pack is not UTF-8".to_string(),
    })?;
    let lines: Vec<&str> = text.lines().collect();
    let (&manifest_line, artifact_lines) =
        lines.split_last().ok_or(ExportError::PackIntegrity {
            detail: "pack is empty".to_string(),
        })?;

    let manifest_value: Value =
        serde_json::from_str(manifest_line).map_err(|e| ExportError::PackIntegrity {
            detail: format!("manifest line is not JSON: {e}"),
        })?;
    if manifest_value.get("type").and_then(Value::as_str)
        != Some(ArtifactKind::AuditPackManifest.type_name())
    {
        return Err(ExportError::PackIntegrity {
            detail: "last line is not the manifest".to_string(),
        });
    }
    let claimed: Hash32 = manifest_value
        .get("packHash")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .ok_or(ExportError::PackIntegrity {
            detail: "manifest carries no packHash".to_string(),
        })?;

    let recomputed = ArtifactHasher::hash_content(artifact_lines.join("\n").as_bytes());
    if recomputed != claimed {
        return Err(ExportError::PackIntegrity {
            detail: format!("packHash mismatch: claimed {claimed}, recomputed {recomputed}"),
        });
    }

    for (i, line) in artifact_lines.iter().enumerate() {
        let value: Value = serde_json::from_str(line).map_err(|e| ExportError::PackIntegrity {
            detail: format!("line {i} is not JSON: {e}"),
        })?;
        if value.get("artifactHash").is_none() {
            return Err(ExportError::PackIntegrity {
                detail: format!("line {i} carries no artifactHash"),
            });
        }
    }

    // Reconstruct the typed manifest for the caller. The manifest
    // record is flat; the season id is recovered from the first
    // artifact line.
    let season_id = artifact_lines
        .first()
        .and_then(|line| {
            serde_json::from_str::<Value>(line)
                .ok()?
                .get("artifact")?
                .get("season_id")?
                .as_str()
                .map(ToString::to_string)
        })
        .unwrap_or_default();
    let artifact_order = manifest_value
        .get("artifactOrder")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default();
    let artifact_hashes = manifest_value
        .get("artifactHashes")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();

    Ok(AuditPackManifest {
        season_id,
        artifact_order,
        artifact_hashes,
        pack_hash: claimed,
    })
}
