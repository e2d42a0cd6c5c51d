//! Irreversible season activation.

use tracing::{error, info, warn};

use super::{OrchestratorError, SeasonOrchestrator};
use crate::artifact::{ActivationContract, ActivationDecision, ActivationFailure,
    ActivationReceipt, CanonBundle, CompiledConstraints, ReadinessCall, ReadinessDecision,
    ReceiptInputs, SealedContract, payload_hash};
use crate::crypto::Hash32;
use crate::freeze;
use crate::resolve::{ResolutionInputs, ResolveError};
use crate::store::WriteOutcome;

/// Result of an activation call.
#[derive(Debug, Clone)]
pub struct ActivationOutcome {
    /// The receipt of record for the season.
    pub receipt: ActivationReceipt,
    /// Hash of the receipt record (canonical key for `ACTIVATED`,
    /// attempt-scoped for `NOT_ACTIVATED`).
    pub receipt_hash: Hash32,
    /// Whether this call performed the activation (as opposed to
    /// returning an existing receipt or a failed attempt).
    pub newly_activated: bool,
}

impl SeasonOrchestrator {
    /// Activates a season.
    ///
    /// Requires a stored `PROCEED` readiness decision whose hash
    /// matches `decision_hash`, a contract and sealed constraints, and
    /// a double-run determinism proof from the resolution engine. On
    /// success seals the contract, writes the irreversible receipt,
    /// captures the freeze baseline, and persists the resolution
    /// artifact plus one canon bundle per known community.
    ///
    /// Idempotent: an already-`ACTIVATED` season returns its existing
    /// receipt unchanged. Any failure path returns a `NOT_ACTIVATED`
    /// receipt with `failure_codes` and never retries automatically.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] on store/log failure or engine
    /// configuration errors.
    pub fn activate(
        &self,
        season_id: &str,
        decision_hash: &Hash32,
    ) -> Result<ActivationOutcome, OrchestratorError> {
        // Idempotency: an existing ACTIVATED receipt is returned
        // unchanged, with no new write.
        if let Some((receipt, receipt_hash)) = self.store.activated_receipt(season_id)? {
            info!(season_id, %receipt_hash, "season already activated");
            return Ok(ActivationOutcome {
                receipt,
                receipt_hash,
                newly_activated: false,
            });
        }

        let mut failures = Vec::new();
        let mut inputs = ReceiptInputs::default();

        // Decisions are content-addressed: the caller's hash IS the
        // lookup key.
        let readiness = self
            .store
            .read::<ReadinessDecision>(&decision_hash.to_hex())?;
        match &readiness {
            None => failures.push(ActivationFailure::MissingReadinessDecision),
            Some((decision, stored_hash)) => {
                inputs.readiness_hash = Some(*stored_hash);
                if stored_hash != decision_hash || decision.season_id != season_id {
                    failures.push(ActivationFailure::ReadinessHashMismatch);
                } else if decision.call != ReadinessCall::Proceed {
                    failures.push(ActivationFailure::ReadinessAborted);
                }
            }
        }

        let contract = self.store.read::<ActivationContract>(season_id)?;
        match &contract {
            None => failures.push(ActivationFailure::MissingActivationContract),
            Some((_, hash)) => inputs.contract_base_hash = Some(*hash),
        }

        let constraints = self.store.read::<CompiledConstraints>(season_id)?;
        match &constraints {
            None => failures.push(ActivationFailure::MissingConstraints),
            Some((c, hash)) => {
                inputs.constraints_hash = Some(*hash);
                if !c.sealed {
                    failures.push(ActivationFailure::ConstraintsUnsealed);
                }
            }
        }

        // Every None above pushed a failure code, so the happy arm
        // only matches when the prerequisites are all present.
        let ((contract, contract_base_hash), (constraints, constraints_hash), readiness_hash) =
            match (contract, constraints, readiness) {
                (Some(c), Some(k), Some((_, readiness_hash))) if failures.is_empty() => {
                    (c, k, readiness_hash)
                }
                _ => return self.fail_activation(season_id, inputs, failures),
            };

        // Determinism proof: run the engine twice on byte-identical
        // arguments and compare output hashes. The resolution
        // timestamp is the window end, so a crashed activation that
        // re-runs reproduces the identical artifact.
        let communities = self.signals.list_communities()?;
        let (resolution_inputs, snapshot_hashes) = ResolutionInputs::gather(
            self.signals.as_ref(),
            &communities,
            &contract.window,
            &constraints,
            contract.window.end_ms,
        )?;

        let first = match self
            .engine
            .resolve(season_id, &constraints, &resolution_inputs)
        {
            Ok(artifact) => artifact,
            Err(ResolveError::ConstraintViolationAbort { failed }) => {
                warn!(season_id, ?failed, "resolution aborted on compliance");
                return self.fail_activation(
                    season_id,
                    inputs,
                    vec![ActivationFailure::ConstraintViolationAbort],
                );
            }
            Err(err) => return Err(err.into()),
        };
        let second = self
            .engine
            .resolve(season_id, &constraints, &resolution_inputs)?;
        if first.output_hash != second.output_hash {
            error!(
                season_id,
                first = %first.output_hash,
                second = %second.output_hash,
                "determinism proof failed"
            );
            return self.fail_activation(
                season_id,
                inputs,
                vec![ActivationFailure::NonDeterministicResolution],
            );
        }

        let resolution = first;
        let resolution_artifact_hash = payload_hash(&resolution)?;
        inputs.resolution_artifact_hash = Some(resolution_artifact_hash);

        // Seal the contract over everything the decision depended on.
        let seal_hash = SealedContract::compute_seal(
            &contract_base_hash,
            &readiness_hash,
            &constraints_hash,
            &resolution_artifact_hash,
        );
        let sealed = SealedContract {
            season_id: season_id.to_string(),
            window: contract.window,
            contract_base_hash,
            readiness_hash,
            constraints_hash,
            resolution_artifact_hash,
            seal_hash,
        };
        if !self.store.write_artifact(&sealed)?.is_accepted() {
            return self.fail_activation(
                season_id,
                inputs,
                vec![ActivationFailure::ContractAlreadySealed],
            );
        }

        // The irreversible receipt.
        let receipt = ActivationReceipt {
            season_id: season_id.to_string(),
            decision: ActivationDecision::Activated,
            inputs,
            seal_hash: Some(seal_hash),
            failure_codes: vec![],
        };
        let receipt_hash = match self.store.write_artifact(&receipt)? {
            WriteOutcome::Wrote { hash } | WriteOutcome::AlreadyPresentSameHash { hash } => hash,
            WriteOutcome::Rejected(_) => {
                // Receipt conflict: if a concurrent activation won,
                // return its receipt; anything else is a hard stop.
                if let Some((receipt, receipt_hash)) = self.store.activated_receipt(season_id)? {
                    return Ok(ActivationOutcome {
                        receipt,
                        receipt_hash,
                        newly_activated: false,
                    });
                }
                return self
                    .fail_activation(season_id, inputs, vec![ActivationFailure::StoreRejected]);
            }
        };

        // Baseline before any further activated-season write, or the
        // drift guard would freeze the season on its own artifacts.
        let baseline = freeze::capture(
            self.store.local_backend().as_ref(),
            season_id,
            &self.store.config_hash(),
        )
        .map_err(crate::store::StoreError::from)?
        .ok_or(OrchestratorError::StoreRejected { stage: "baseline" })?;
        if !self.store.write_artifact(&baseline)?.is_accepted() {
            return Err(OrchestratorError::StoreRejected { stage: "baseline" });
        }

        if !self.store.write_artifact(&resolution)?.is_accepted() {
            return Err(OrchestratorError::StoreRejected { stage: "resolution" });
        }

        for (community_id, snapshot_hash) in &snapshot_hashes {
            let bundle_hash = CanonBundle::compute_bundle_hash(
                &receipt_hash,
                &constraints_hash,
                &self.store.config_hash(),
                snapshot_hash,
                &resolution.output_hash,
            );
            let bundle = CanonBundle {
                season_id: season_id.to_string(),
                community_id: community_id.clone(),
                receipt_hash,
                constraints_hash,
                config_hash: self.store.config_hash(),
                signals_snapshot_hash: *snapshot_hash,
                resolution_output_hash: resolution.output_hash,
                bundle_hash,
            };
            if !self.store.write_artifact(&bundle)?.is_accepted() {
                return Err(OrchestratorError::StoreRejected { stage: "bundle" });
            }
        }

        info!(season_id, %seal_hash, %receipt_hash, "season activated");
        Ok(ActivationOutcome {
            receipt,
            receipt_hash,
            newly_activated: true,
        })
    }

    /// Persists a `NOT_ACTIVATED` receipt under an attempt-scoped key
    /// and returns it. Never retries.
    fn fail_activation(
        &self,
        season_id: &str,
        inputs: ReceiptInputs,
        mut failure_codes: Vec<ActivationFailure>,
    ) -> Result<ActivationOutcome, OrchestratorError> {
        failure_codes.sort();
        failure_codes.dedup();
        warn!(season_id, ?failure_codes, "activation failed");

        let receipt = ActivationReceipt {
            season_id: season_id.to_string(),
            decision: ActivationDecision::NotActivated,
            inputs,
            seal_hash: None,
            failure_codes,
        };
        let outcome = self.store.write_activation_attempt(&receipt)?;
        let receipt_hash = outcome
            .hash()
            .ok_or(OrchestratorError::StoreRejected { stage: "attempt" })?;
        Ok(ActivationOutcome {
            receipt,
            receipt_hash,
            newly_activated: false,
        })
    }
}
