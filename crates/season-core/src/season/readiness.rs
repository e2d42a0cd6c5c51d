//! Readiness evaluation.

use tracing::{info, warn};

use super::{GateVerdict, OrchestratorError, SeasonOrchestrator};
use crate::artifact::{ActivationContract, AuditVerdict, CommunityTally, CompiledConstraints,
    ReadinessCall, ReadinessDecision, ReadinessReason, SuccessorAcknowledgement,
    SuccessorCandidateContract, payload_hash};
use crate::crypto::Hash32;
use crate::verify::{BundleVerifier, VerifyOutcome};

/// The persisted (or pre-existing) readiness decision with its hash.
#[derive(Debug, Clone)]
pub struct ReadinessOutcome {
    /// The decision in force for the season.
    pub decision: ReadinessDecision,
    /// The stored decision hash — the token `activate` must present.
    pub decision_hash: Hash32,
}

impl SeasonOrchestrator {
    /// Evaluates readiness for a season and persists the decision.
    ///
    /// Idempotent: decisions are content-addressed, so an unchanged
    /// world re-produces the identical artifact and the write is a
    /// no-op, while a changed world persists a new decision under a
    /// new hash. The returned `decision_hash` is the token `activate`
    /// must present.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] on store or signal-log failure.
    pub fn evaluate_readiness(
        &self,
        season_id: &str,
    ) -> Result<ReadinessOutcome, OrchestratorError> {
        let (audit, communities) = self.batch_audit(season_id)?;

        let mut reasons = Vec::new();
        if self
            .store
            .read::<ActivationContract>(season_id)?
            .is_none()
        {
            reasons.push(ReadinessReason::MissingActivationContract);
        }
        match self.store.read::<CompiledConstraints>(season_id)? {
            None => reasons.push(ReadinessReason::MissingConstraints),
            Some((constraints, _)) if !constraints.sealed => {
                reasons.push(ReadinessReason::ConstraintsUnsealed);
            }
            Some(_) => {}
        }
        if let GateVerdict::Block { reason } = self.gate.assess(season_id) {
            info!(season_id, %reason, "governance gate blocked season");
            reasons.push(ReadinessReason::MoralBlock);
        }
        if audit == AuditVerdict::Fail {
            reasons.push(ReadinessReason::AuditFail);
        }
        if !self.handoff_satisfied(season_id)? {
            reasons.push(ReadinessReason::HandoffUnacknowledged);
        }
        reasons.sort();
        reasons.dedup();

        let call = if reasons.is_empty() {
            ReadinessCall::Proceed
        } else {
            ReadinessCall::Abort
        };
        let decision = ReadinessDecision {
            season_id: season_id.to_string(),
            audit,
            call,
            reasons,
            communities,
        };

        let outcome = self.store.write_artifact(&decision)?;
        let decision_hash = match outcome.hash() {
            Some(hash) => hash,
            // A guard rejection (frozen/out-of-window season) leaves
            // the decision unpersisted; activation against it will
            // fail with MISSING_READINESS_DECISION.
            None => {
                warn!(season_id, "readiness decision write rejected");
                decision.content_hash()
            }
        };
        info!(season_id, ?call, %decision_hash, "readiness evaluated");
        Ok(ReadinessOutcome {
            decision,
            decision_hash,
        })
    }

    /// Re-runs replay verification for every known community and
    /// aggregates the verdict.
    fn batch_audit(
        &self,
        season_id: &str,
    ) -> Result<(AuditVerdict, CommunityTally), OrchestratorError> {
        let verifier = BundleVerifier::new(&self.store, self.signals.as_ref(), &self.engine);
        let mut tally = CommunityTally::default();

        for community_id in self.signals.list_communities()? {
            tally.checked += 1;
            match verifier.verify(season_id, &community_id) {
                Ok(VerifyOutcome::Pass) => tally.passed += 1,
                Ok(VerifyOutcome::Fail { .. }) => tally.failed += 1,
                Ok(VerifyOutcome::Inconclusive { .. }) => tally.inconclusive += 1,
                Err(err) => return Err(map_verify_error(err)),
            }
        }

        let verdict = if tally.failed > 0 {
            AuditVerdict::Fail
        } else if tally.inconclusive > 0 {
            AuditVerdict::PassWithWarnings
        } else {
            AuditVerdict::Pass
        };
        Ok((verdict, tally))
    }

    /// Whether the hand-off gate is satisfied for this season.
    ///
    /// Vacuously true when the season was never proposed as a
    /// successor (a genesis season). Otherwise the candidate must have
    /// a valid acknowledgement binding its current identity hash.
    fn handoff_satisfied(&self, season_id: &str) -> Result<bool, OrchestratorError> {
        let Some((candidate, candidate_hash)) =
            self.store.read::<SuccessorCandidateContract>(season_id)?
        else {
            return Ok(true);
        };
        // Recompute identity defensively; a tampered candidate can
        // never satisfy the gate.
        if payload_hash(&candidate)? != candidate_hash {
            return Ok(false);
        }
        let Some((ack, _)) = self.store.read::<SuccessorAcknowledgement>(season_id)? else {
            return Ok(false);
        };
        Ok(ack.candidate_hash == candidate_hash
            && ack.acknowledgement_hash == SuccessorAcknowledgement::seal(&candidate_hash))
    }
}

fn map_verify_error(err: crate::verify::VerifyError) -> OrchestratorError {
    match err {
        crate::verify::VerifyError::Store(e) => OrchestratorError::Store(e),
        crate::verify::VerifyError::Signals(e) => OrchestratorError::Signals(e),
        crate::verify::VerifyError::Resolve(e) => OrchestratorError::Resolve(e),
    }
}
