//! Canon bundle replay verification.
//!
//! The verifier is a pure read-side auditor: it loads the stored
//! bundle, independently rebuilds the signal snapshot, re-runs the
//! resolution engine, recombines the five input hashes, and compares
//! against the stored `bundle_hash`. The first divergent field
//! short-circuits to `FAIL` with that field named; missing
//! prerequisites short-circuit to `INCONCLUSIVE` — the bundle cannot
//! be judged, which is not the same as failing.
//!
//! Every non-`PASS` outcome and every local/mirror disagreement about
//! a bundle is recorded as a violation.

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::artifact::{ArtifactKind, CanonBundle, CompiledConstraints, ResolutionArtifact,
    SealedContract, Severity, ViolationCode};
use crate::resolve::{ResolutionEngine, ResolutionInputs, ResolveError};
use crate::signals::{SignalSource, SignalSourceError};
use crate::store::{SeasonStore, StoreError};

/// The component whose recomputation diverged from the stored bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DivergentField {
    /// Stored receipt hash no longer matches the receipt record.
    ReceiptHash,
    /// Stored constraints hash no longer matches the constraints
    /// record.
    ConstraintsHash,
    /// Stored config hash differs from the configuration in force.
    ConfigHash,
    /// Rebuilt signal snapshot hashes differently.
    SignalsSnapshotHash,
    /// Re-running the engine produced a different output hash.
    ResolutionOutputHash,
    /// Component hashes agree but the combined bundle hash does not.
    BundleHash,
}

/// The prerequisite whose absence made the bundle unjudgeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissingPrerequisite {
    /// No stored canon bundle for this community.
    Bundle,
    /// No `ACTIVATED` receipt for the season.
    Receipt,
    /// No compiled constraints for the season.
    Constraints,
    /// No sealed contract (and therefore no window to rebuild over).
    SealedContract,
    /// No stored resolution artifact (and therefore no replay
    /// timestamp).
    Resolution,
}

/// Result of a replay verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerifyOutcome {
    /// The recomputed bundle hash equals the stored one.
    Pass,
    /// A component diverged.
    Fail {
        /// The first divergent component.
        divergent: DivergentField,
    },
    /// A prerequisite artifact is missing; cannot judge.
    Inconclusive {
        /// The missing prerequisite.
        missing: MissingPrerequisite,
    },
}

/// Errors raised while verifying (distinct from a `FAIL` outcome).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VerifyError {
    /// The store could not be read.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The signal log could not be read.
    #[error(transparent)]
    Signals(#[from] SignalSourceError),

    /// The engine refused to run — a configuration error that
    /// indicates a caller bug, not bundle divergence.
    #[error(transparent)]
    Resolve(ResolveError),
}

/// Replay verifier over one store and signal log.
pub struct BundleVerifier<'a> {
    store: &'a SeasonStore,
    signals: &'a dyn SignalSource,
    engine: &'a ResolutionEngine,
}

impl<'a> BundleVerifier<'a> {
    /// Creates a verifier.
    pub fn new(
        store: &'a SeasonStore,
        signals: &'a dyn SignalSource,
        engine: &'a ResolutionEngine,
    ) -> Self {
        Self {
            store,
            signals,
            engine,
        }
    }

    /// Verifies one community's bundle for a season.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError`] on store/log failures or engine
    /// configuration errors; divergence and missing prerequisites are
    /// outcomes, not errors.
    pub fn verify(
        &self,
        season_id: &str,
        community_id: &str,
    ) -> Result<VerifyOutcome, VerifyError> {
        let outcome = self.replay(season_id, community_id)?;
        self.record_outcome(season_id, community_id, outcome)?;
        Ok(outcome)
    }

    fn replay(
        &self,
        season_id: &str,
        community_id: &str,
    ) -> Result<VerifyOutcome, VerifyError> {
        let bundle_id = CanonBundle::bundle_id(season_id, community_id);

        let Some((bundle, _)) = self.store.read::<CanonBundle>(&bundle_id)? else {
            return Ok(VerifyOutcome::Inconclusive {
                missing: MissingPrerequisite::Bundle,
            });
        };
        self.check_mirror_agreement(season_id, &bundle_id)?;

        let Some((_, receipt_hash)) = self.store.activated_receipt(season_id)? else {
            return Ok(VerifyOutcome::Inconclusive {
                missing: MissingPrerequisite::Receipt,
            });
        };
        let Some((constraints, constraints_hash)) =
            self.store.read::<CompiledConstraints>(season_id)?
        else {
            return Ok(VerifyOutcome::Inconclusive {
                missing: MissingPrerequisite::Constraints,
            });
        };
        let Some((sealed, _)) = self.store.read::<SealedContract>(season_id)? else {
            return Ok(VerifyOutcome::Inconclusive {
                missing: MissingPrerequisite::SealedContract,
            });
        };
        let Some((stored_resolution, _)) = self.store.read::<ResolutionArtifact>(season_id)?
        else {
            return Ok(VerifyOutcome::Inconclusive {
                missing: MissingPrerequisite::Resolution,
            });
        };

        // Component comparisons, cheapest first; the first divergence
        // wins.
        if bundle.receipt_hash != receipt_hash {
            return Ok(VerifyOutcome::Fail {
                divergent: DivergentField::ReceiptHash,
            });
        }
        if bundle.constraints_hash != constraints_hash {
            return Ok(VerifyOutcome::Fail {
                divergent: DivergentField::ConstraintsHash,
            });
        }
        if bundle.config_hash != self.store.config_hash() {
            return Ok(VerifyOutcome::Fail {
                divergent: DivergentField::ConfigHash,
            });
        }

        // Rebuild the exact signal snapshot and re-run the engine.
        let communities: Vec<String> = self
            .store
            .list_ids(ArtifactKind::CanonBundle)?
            .iter()
            .filter_map(|id| {
                id.strip_prefix(&format!("{season_id}/"))
                    .map(ToString::to_string)
            })
            .collect();
        let (inputs, snapshot_hashes) = ResolutionInputs::gather(
            self.signals,
            &communities,
            &sealed.window,
            &constraints,
            stored_resolution.resolved_at_ms,
        )?;

        let Some(snapshot_hash) = snapshot_hashes.get(community_id) else {
            return Ok(VerifyOutcome::Fail {
                divergent: DivergentField::SignalsSnapshotHash,
            });
        };
        if bundle.signals_snapshot_hash != *snapshot_hash {
            return Ok(VerifyOutcome::Fail {
                divergent: DivergentField::SignalsSnapshotHash,
            });
        }

        let fresh = match self.engine.resolve(season_id, &constraints, &inputs) {
            Ok(artifact) => artifact,
            // A replay that cannot even resolve is divergence, not a
            // caller bug.
            Err(ResolveError::ConstraintViolationAbort { .. }) => {
                return Ok(VerifyOutcome::Fail {
                    divergent: DivergentField::ResolutionOutputHash,
                });
            }
            Err(err) => return Err(VerifyError::Resolve(err)),
        };
        if bundle.resolution_output_hash != fresh.output_hash {
            return Ok(VerifyOutcome::Fail {
                divergent: DivergentField::ResolutionOutputHash,
            });
        }

        let recombined = CanonBundle::compute_bundle_hash(
            &bundle.receipt_hash,
            &bundle.constraints_hash,
            &bundle.config_hash,
            &bundle.signals_snapshot_hash,
            &bundle.resolution_output_hash,
        );
        if recombined != bundle.bundle_hash {
            return Ok(VerifyOutcome::Fail {
                divergent: DivergentField::BundleHash,
            });
        }

        debug!(season_id, community_id, "bundle replay verified");
        Ok(VerifyOutcome::Pass)
    }

    /// Compares the local and mirror copies of the bundle record and
    /// records a divergence violation when they disagree. Mirror read
    /// failures are fail-open: missing data is the parity checker's
    /// department.
    fn check_mirror_agreement(&self, season_id: &str, bundle_id: &str) -> Result<(), VerifyError> {
        let Some(mirror) = self.store.mirror_backend() else {
            return Ok(());
        };
        let collection = ArtifactKind::CanonBundle.collection();
        let local = self.store.read_record(ArtifactKind::CanonBundle, bundle_id)?;
        let remote = match mirror.get(collection, bundle_id) {
            Ok(remote) => remote,
            Err(_) => return Ok(()),
        };
        if let (Some(local), Some(remote)) = (local, remote) {
            if local.hash != remote.hash || local.bytes != remote.bytes {
                self.store.record_violation(
                    ViolationCode::MirrorDivergence,
                    Severity::Error,
                    season_id,
                    ArtifactKind::CanonBundle,
                    bundle_id,
                    Some(remote.hash),
                    Some(local.hash),
                    "local and mirror copies of bundle disagree",
                )?;
            }
        }
        Ok(())
    }

    fn record_outcome(
        &self,
        season_id: &str,
        community_id: &str,
        outcome: VerifyOutcome,
    ) -> Result<(), VerifyError> {
        let bundle_id = CanonBundle::bundle_id(season_id, community_id);
        match outcome {
            VerifyOutcome::Pass => Ok(()),
            VerifyOutcome::Fail { divergent } => Ok(self.store.record_violation(
                ViolationCode::BundleReplayMismatch,
                Severity::Error,
                season_id,
                ArtifactKind::CanonBundle,
                &bundle_id,
                None,
                None,
                &format!("replay diverged on {divergent:?}"),
            )?),
            VerifyOutcome::Inconclusive { missing } => Ok(self.store.record_violation(
                ViolationCode::BundleReplayMismatch,
                Severity::Info,
                season_id,
                ArtifactKind::CanonBundle,
                &bundle_id,
                None,
                None,
                &format!("replay inconclusive: missing {missing:?}"),
            )?),
        }
    }
}
