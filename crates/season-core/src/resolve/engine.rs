//! The resolution pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::checks::{self, ComplianceCheck};
use crate::artifact::{AllocationEntry, ArtifactCodecError, CompiledConstraints,
    ResolutionArtifact, payload_hash};
use crate::artifact::SeasonWindow;
use crate::canonical;
use crate::config::LedgerConfig;
use crate::crypto::{ArtifactHasher, Hash32};
use crate::signals::{Signal, SignalSnapshot, SignalSource, SignalSourceError};

/// Domain tag for the resolution input hash.
pub const RESOLUTION_INPUT_DOMAIN: &[u8] = b"SL_RESOLUTION_INPUT_V1";

/// Domain tag for the resolution output hash.
pub const RESOLUTION_OUTPUT_DOMAIN: &[u8] = b"SL_RESOLUTION_OUTPUT_V1";

/// The raw material a resolution runs over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolutionInputs {
    /// Signals to accumulate, already bounded to the season window by
    /// the snapshot builder.
    pub signals: Vec<Signal>,
    /// Treasury units per community. Every allocated community must
    /// have an entry (governance-limit compliance).
    pub treasuries: BTreeMap<String, u64>,
    /// The resolution timestamp. Part of the inputs — never wall
    /// clock — so double-runs see identical bytes.
    pub timestamp_ms: u64,
}

impl ResolutionInputs {
    /// Gathers resolution inputs from the signal log.
    ///
    /// Builds a deterministic snapshot per community over the season
    /// window, concatenates them in community order, and copies the
    /// sealed treasuries out of the constraints. Returns the inputs
    /// plus each community's snapshot hash (the bundle component).
    ///
    /// Both activation and replay verification construct their inputs
    /// through this one function, so the two can only diverge if the
    /// underlying log or constraints actually changed.
    ///
    /// # Errors
    ///
    /// Returns [`SignalSourceError`] if the log cannot be read.
    pub fn gather(
        source: &dyn SignalSource,
        communities: &[String],
        window: &SeasonWindow,
        constraints: &CompiledConstraints,
        timestamp_ms: u64,
    ) -> Result<(Self, BTreeMap<String, Hash32>), SignalSourceError> {
        let mut sorted: Vec<&String> = communities.iter().collect();
        sorted.sort();
        sorted.dedup();

        let mut signals = Vec::new();
        let mut snapshot_hashes = BTreeMap::new();
        for community_id in sorted {
            let snapshot = SignalSnapshot::build(source, community_id, window)?;
            snapshot_hashes.insert(community_id.clone(), snapshot.snapshot_hash());
            signals.extend(snapshot.signals);
        }

        Ok((
            Self {
                signals,
                treasuries: constraints.treasuries.clone(),
                timestamp_ms,
            },
            snapshot_hashes,
        ))
    }
}

/// Errors raised by the engine.
///
/// The configuration variants indicate caller bugs and are propagated;
/// [`ResolveError::ConstraintViolationAbort`] is the data-level abort
/// the orchestrator records on the failed attempt.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResolveError {
    /// The constraints are not sealed. Configuration error.
    #[error("constraints for season {season_id} are not sealed")]
    ConstraintsUnsealed {
        /// The offending season.
        season_id: String,
    },

    /// The constraints were compiled for a different season.
    /// Configuration error.
    #[error("constraint season mismatch: resolving {expected}, constraints are for {actual}")]
    SeasonMismatch {
        /// The season being resolved.
        expected: String,
        /// The season the constraints belong to.
        actual: String,
    },

    /// One or more post-hoc compliance checks failed.
    #[error("resolution aborted: {failed:?} failed compliance")]
    ConstraintViolationAbort {
        /// The checks that failed, in check order.
        failed: Vec<ComplianceCheck>,
    },

    /// Inputs or output failed to canonicalize.
    #[error(transparent)]
    Codec(#[from] ArtifactCodecError),
}

/// The constraint-aware resolution engine.
///
/// Holds the fixed signal-type weight table and the configured
/// defaults; per-season overrides come in through the compiled
/// constraints.
#[derive(Debug, Clone)]
pub struct ResolutionEngine {
    weights: BTreeMap<String, u64>,
    default_max_share_ppm: u32,
    default_max_entries_per_community: u32,
}

impl ResolutionEngine {
    /// Builds an engine from the ledger configuration.
    #[must_use]
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            weights: config.signal_weights.clone(),
            default_max_share_ppm: config.default_max_share_ppm,
            default_max_entries_per_community: config.default_max_entries_per_community,
        }
    }

    /// The effective share ceiling for a constraint set.
    #[must_use]
    pub fn effective_cap_ppm(&self, constraints: &CompiledConstraints) -> u32 {
        constraints.max_share_ppm.unwrap_or(self.default_max_share_ppm)
    }

    /// The effective per-community entry limit for a constraint set.
    #[must_use]
    pub fn effective_entry_limit(&self, constraints: &CompiledConstraints) -> u32 {
        constraints
            .max_entries_per_community
            .unwrap_or(self.default_max_entries_per_community)
    }

    /// Runs the full resolution pipeline.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::ConstraintsUnsealed`] /
    ///   [`ResolveError::SeasonMismatch`]: configuration errors, the
    ///   caller passed an invalid constraint set.
    /// - [`ResolveError::ConstraintViolationAbort`]: a post-hoc
    ///   compliance check failed.
    pub fn resolve(
        &self,
        season_id: &str,
        constraints: &CompiledConstraints,
        inputs: &ResolutionInputs,
    ) -> Result<ResolutionArtifact, ResolveError> {
        if !constraints.sealed {
            return Err(ResolveError::ConstraintsUnsealed {
                season_id: season_id.to_string(),
            });
        }
        if constraints.season_id != season_id {
            return Err(ResolveError::SeasonMismatch {
                expected: season_id.to_string(),
                actual: constraints.season_id.clone(),
            });
        }

        // (a) Filter by disabled signal types and excluded communities.
        let filtered: Vec<&Signal> = inputs
            .signals
            .iter()
            .filter(|s| !constraints.disabled_signal_types.contains(&s.signal_type))
            .filter(|s| !constraints.excluded_communities.contains(&s.community_id))
            .collect();

        // (b) Accumulate weighted mass per (community, user).
        let mut mass: BTreeMap<&str, BTreeMap<&str, u64>> = BTreeMap::new();
        for signal in &filtered {
            let weight = self.weights.get(&signal.signal_type).copied().unwrap_or(0);
            if weight == 0 {
                continue;
            }
            let user_mass = mass
                .entry(signal.community_id.as_str())
                .or_default()
                .entry(signal.actor_user_id.as_str())
                .or_insert(0);
            *user_mass = user_mass.saturating_add(weight);
        }

        // (c) Raw share per user, (d) clamped to the whale ceiling.
        let cap_ppm = self.effective_cap_ppm(constraints);
        let mut entries = Vec::new();
        for (community_id, users) in &mass {
            let total: u128 = users.values().map(|m| u128::from(*m)).sum();
            if total == 0 {
                continue;
            }
            for (user_id, user_mass) in users {
                let share_ppm =
                    u32::try_from(u128::from(*user_mass) * 1_000_000 / total).unwrap_or(1_000_000);
                entries.push(AllocationEntry {
                    community_id: (*community_id).to_string(),
                    user_id: (*user_id).to_string(),
                    final_share_ppm: share_ppm.min(cap_ppm),
                });
            }
        }
        // BTreeMap iteration already yields (community, user) order;
        // sort anyway so the invariant does not hinge on map choice.
        entries.sort_by(|a, b| {
            (&a.community_id, &a.user_id).cmp(&(&b.community_id, &b.user_id))
        });

        // (e) Five independent post-hoc compliance checks.
        let failed = checks::run_all(
            &entries,
            &filtered,
            constraints,
            inputs,
            cap_ppm,
            self.effective_entry_limit(constraints),
        );
        if !failed.is_empty() {
            return Err(ResolveError::ConstraintViolationAbort { failed });
        }

        // (f) Hash the inputs, the constraints, and the output.
        let input_hash = hash_under(RESOLUTION_INPUT_DOMAIN, inputs)?;
        let output_hash = hash_under(RESOLUTION_OUTPUT_DOMAIN, &entries)?;
        let constraint_hash = payload_hash(constraints)?;

        debug!(
            season_id,
            entries = entries.len(),
            %output_hash,
            "resolution complete"
        );

        Ok(ResolutionArtifact {
            season_id: season_id.to_string(),
            entries,
            input_hash,
            constraint_hash,
            output_hash,
            resolved_at_ms: inputs.timestamp_ms,
        })
    }
}

/// Canonical domain-separated hash of any serializable value.
fn hash_under<T: Serialize>(domain: &[u8], value: &T) -> Result<Hash32, ArtifactCodecError> {
    let json = serde_json::to_value(value).map_err(|e| ArtifactCodecError::Serialize {
        message: e.to_string(),
    })?;
    let bytes = canonical::canonical_bytes(&json)?;
    Ok(ArtifactHasher::hash_domain(domain, bytes.as_slice()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> ResolutionEngine {
        ResolutionEngine::new(&LedgerConfig::default())
    }

    fn constraints(season_id: &str) -> CompiledConstraints {
        CompiledConstraints {
            season_id: season_id.to_string(),
            sealed: true,
            disabled_signal_types: vec![],
            excluded_communities: vec![],
            max_share_ppm: None,
            max_entries_per_community: None,
            settlement_delay_ms: None,
            treasuries: BTreeMap::new(),
            compiled_ms: 900,
        }
    }

    fn signal(id: &str, community: &str, user: &str, signal_type: &str, ts_ms: u64) -> Signal {
        Signal {
            id: id.to_string(),
            community_id: community.to_string(),
            actor_user_id: user.to_string(),
            signal_type: signal_type.to_string(),
            target_id: None,
            ts_ms,
        }
    }

    fn inputs_for(signals: Vec<Signal>) -> ResolutionInputs {
        let mut treasuries = BTreeMap::new();
        for s in &signals {
            treasuries.entry(s.community_id.clone()).or_insert(1_000);
        }
        ResolutionInputs {
            signals,
            treasuries,
            timestamp_ms: 1_900,
        }
    }

    #[test]
    fn test_unsealed_constraints_refused() {
        let mut c = constraints("S1");
        c.sealed = false;
        let err = engine()
            .resolve("S1", &c, &inputs_for(vec![]))
            .unwrap_err();
        assert!(matches!(err, ResolveError::ConstraintsUnsealed { .. }));
    }

    #[test]
    fn test_season_mismatch_refused() {
        let c = constraints("S2");
        let err = engine()
            .resolve("S1", &c, &inputs_for(vec![]))
            .unwrap_err();
        assert!(matches!(err, ResolveError::SeasonMismatch { .. }));
    }

    #[test]
    fn test_shares_proportional_to_mass() {
        // alice: 3 posts (30 mass), bob: 1 post (10 mass).
        let signals = vec![
            signal("1", "garden", "alice", "post", 1_100),
            signal("2", "garden", "alice", "post", 1_200),
            signal("3", "garden", "alice", "post", 1_300),
            signal("4", "garden", "bob", "post", 1_400),
        ];
        // Raise the cap so proportionality is visible.
        let mut c = constraints("S1");
        c.max_share_ppm = Some(1_000_000);

        let artifact = engine().resolve("S1", &c, &inputs_for(signals)).unwrap();
        assert_eq!(artifact.entries.len(), 2);
        assert_eq!(artifact.entries[0].user_id, "alice");
        assert_eq!(artifact.entries[0].final_share_ppm, 750_000);
        assert_eq!(artifact.entries[1].user_id, "bob");
        assert_eq!(artifact.entries[1].final_share_ppm, 250_000);
    }

    #[test]
    fn test_whale_clamp_applies() {
        let signals = vec![
            signal("1", "garden", "whale", "purchase", 1_100),
            signal("2", "garden", "minnow", "reaction", 1_200),
        ];
        let artifact = engine()
            .resolve("S1", &constraints("S1"), &inputs_for(signals))
            .unwrap();

        let whale = artifact
            .entries
            .iter()
            .find(|e| e.user_id == "whale")
            .unwrap();
        assert_eq!(whale.final_share_ppm, 150_000);
    }

    #[test]
    fn test_disabled_signal_type_filtered() {
        let signals = vec![
            signal("1", "garden", "alice", "post", 1_100),
            signal("2", "garden", "bob", "reaction", 1_200),
        ];
        let mut c = constraints("S1");
        c.disabled_signal_types = vec!["reaction".to_string()];

        let artifact = engine().resolve("S1", &c, &inputs_for(signals)).unwrap();
        assert_eq!(artifact.entries.len(), 1);
        assert_eq!(artifact.entries[0].user_id, "alice");
    }

    #[test]
    fn test_excluded_community_filtered() {
        let signals = vec![
            signal("1", "garden", "alice", "post", 1_100),
            signal("2", "casino", "bob", "post", 1_200),
        ];
        let mut c = constraints("S1");
        c.excluded_communities = vec!["casino".to_string()];

        let artifact = engine().resolve("S1", &c, &inputs_for(signals)).unwrap();
        assert!(artifact.entries.iter().all(|e| e.community_id == "garden"));
    }

    #[test]
    fn test_determinism_double_run() {
        let signals = vec![
            signal("1", "garden", "alice", "post", 1_100),
            signal("2", "garden", "bob", "comment", 1_200),
            signal("3", "zoo", "carol", "subscription", 1_300),
        ];
        let c = constraints("S1");
        let inputs = inputs_for(signals);

        let first = engine().resolve("S1", &c, &inputs).unwrap();
        let second = engine().resolve("S1", &c, &inputs).unwrap();
        assert_eq!(first.output_hash, second.output_hash);
        assert_eq!(first.input_hash, second.input_hash);
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_treasury_aborts() {
        let signals = vec![signal("1", "garden", "alice", "post", 1_100)];
        let inputs = ResolutionInputs {
            signals,
            treasuries: BTreeMap::new(),
            timestamp_ms: 1_900,
        };
        let err = engine()
            .resolve("S1", &constraints("S1"), &inputs)
            .unwrap_err();
        match err {
            ResolveError::ConstraintViolationAbort { failed } => {
                assert!(failed.contains(&ComplianceCheck::GovernanceLimitCompliance));
            }
            other => panic!("expected abort, got {other:?}"),
        }
    }

    #[test]
    fn test_settlement_delay_aborts_on_young_signal() {
        let signals = vec![signal("1", "garden", "alice", "post", 1_850)];
        let mut c = constraints("S1");
        c.settlement_delay_ms = Some(100);

        let err = engine()
            .resolve("S1", &c, &inputs_for(signals))
            .unwrap_err();
        match err {
            ResolveError::ConstraintViolationAbort { failed } => {
                assert!(failed.contains(&ComplianceCheck::WindowCompliance));
            }
            other => panic!("expected abort, got {other:?}"),
        }
    }

    #[test]
    fn test_input_hash_sensitive_to_timestamp() {
        let signals = vec![signal("1", "garden", "alice", "post", 1_100)];
        let c = constraints("S1");

        let mut a = inputs_for(signals.clone());
        let mut b = inputs_for(signals);
        a.timestamp_ms = 1_900;
        b.timestamp_ms = 1_901;

        let ra = engine().resolve("S1", &c, &a).unwrap();
        let rb = engine().resolve("S1", &c, &b).unwrap();
        assert_ne!(ra.input_hash, rb.input_hash);
        // Output is unaffected by the timestamp alone.
        assert_eq!(ra.output_hash, rb.output_hash);
    }
}
