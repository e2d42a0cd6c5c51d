//! Sealed season-scoped rule overrides.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ArtifactKind, ArtifactPayload};

/// The sealed, season-scoped constraint set the resolution engine runs
/// under.
///
/// The resolution engine refuses to run against unsealed constraints or
/// constraints compiled for a different season — both are caller bugs,
/// not data anomalies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompiledConstraints {
    /// The season these constraints are scoped to.
    pub season_id: String,
    /// Whether the set is sealed. Only sealed constraints resolve.
    pub sealed: bool,
    /// Signal types excluded from mass accumulation.
    pub disabled_signal_types: Vec<String>,
    /// Communities excluded from allocation entirely.
    pub excluded_communities: Vec<String>,
    /// Per-user share ceiling override in parts-per-million.
    ///
    /// `None` falls back to the configured default (the whale clamp).
    pub max_share_ppm: Option<u32>,
    /// Governance limit: maximum allocation entries per community.
    pub max_entries_per_community: Option<u32>,
    /// Settlement delay: signals younger than this (relative to the
    /// resolution timestamp) do not settle into the allocation.
    pub settlement_delay_ms: Option<u64>,
    /// Sealed treasury units per community.
    ///
    /// Copied verbatim into the resolution inputs, so a replay
    /// verifier can reconstruct the exact inputs from stored
    /// artifacts alone.
    pub treasuries: BTreeMap<String, u64>,
    /// Compilation time (input data, set when the override set is
    /// compiled upstream).
    pub compiled_ms: u64,
}

impl ArtifactPayload for CompiledConstraints {
    const KIND: ArtifactKind = ArtifactKind::CompiledConstraints;

    fn artifact_id(&self) -> String {
        self.season_id.clone()
    }

    fn season_scope(&self) -> String {
        self.season_id.clone()
    }
}
