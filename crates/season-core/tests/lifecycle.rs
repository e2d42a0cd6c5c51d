//! End-to-end lifecycle tests over in-memory backends.
//!
//! Exercises the concrete operator scenario: seed a season, evaluate
//! readiness, activate (twice), attempt premature finalization,
//! finalize (twice), verify bundles, hand off to a successor, and
//! confirm the freeze and lineage guards hold along the way.

use std::collections::BTreeMap;
use std::sync::Arc;

use season_core::artifact::{ActivationContract, ActivationDecision, CandidateStatus,
    CompiledConstraints, ReadinessCall, ReadinessReason, SeasonEndReceipt, SeasonProposal,
    SeasonWindow, ViolationCode};
use season_core::clock::{Clock, ManualClock};
use season_core::config::LedgerConfig;
use season_core::crypto::Hash32;
use season_core::resolve::ResolutionEngine;
use season_core::season::{ConfigGovernanceGate, FinalizeReason, FinalizeStatus, GovernanceGate,
    OrchestratorError, SeasonOrchestrator};
use season_core::signals::{MemorySignalSource, Signal, SignalSource};
use season_core::store::{MemoryBackend, RejectReason, SeasonStore, StorageBackend, WriteOutcome};
use season_core::verify::{BundleVerifier, DivergentField, VerifyOutcome};

const T0: u64 = 1_000;
const T1: u64 = 2_000;

struct Harness {
    orchestrator: SeasonOrchestrator,
    store: Arc<SeasonStore>,
    local: Arc<MemoryBackend>,
    #[allow(dead_code)]
    mirror: Arc<MemoryBackend>,
    clock: Arc<ManualClock>,
    signals: Arc<MemorySignalSource>,
    config: LedgerConfig,
}

fn harness() -> Harness {
    let config = LedgerConfig::default();
    let local = Arc::new(MemoryBackend::new());
    let mirror = Arc::new(MemoryBackend::new());
    let clock = Arc::new(ManualClock::at(1_500));

    let local_dyn: Arc<dyn StorageBackend> = local.clone();
    let mirror_dyn: Arc<dyn StorageBackend> = mirror.clone();
    let clock_dyn: Arc<dyn Clock> = clock.clone();
    let store = Arc::new(SeasonStore::new(
        local_dyn,
        Some(mirror_dyn),
        clock_dyn,
        config.config_hash(),
    ));

    let signals = Arc::new(MemorySignalSource::new());
    let signals_dyn: Arc<dyn SignalSource> = signals.clone();
    let gate: Arc<dyn GovernanceGate> = Arc::new(ConfigGovernanceGate::new(&config));
    let clock_dyn: Arc<dyn Clock> = clock.clone();
    let orchestrator = SeasonOrchestrator::new(
        store.clone(),
        signals_dyn,
        gate,
        ResolutionEngine::new(&config),
        clock_dyn,
    );

    Harness {
        orchestrator,
        store,
        local,
        mirror,
        clock,
        signals,
        config,
    }
}

fn contract(season_id: &str) -> ActivationContract {
    ActivationContract {
        season_id: season_id.to_string(),
        window: SeasonWindow {
            start_ms: T0,
            end_ms: T1,
        },
        invariants: vec!["no-retroactive-weights".to_string()],
        created_ms: 900,
    }
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
        treasuries: BTreeMap::from([("garden".to_string(), 1_000), ("zoo".to_string(), 500)]),
        compiled_ms: 950,
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

/// Writes the pre-activation trio and seeds the signal log.
fn seed_season(h: &Harness, season_id: &str) {
    assert!(h
        .store
        .write_artifact(&contract(season_id))
        .unwrap()
        .is_accepted());
    assert!(h
        .store
        .write_artifact(&constraints(season_id))
        .unwrap()
        .is_accepted());
    h.signals.extend([
        signal("sig-1", "garden", "alice", "post", 1_100),
        signal("sig-2", "garden", "bob", "comment", 1_200),
        signal("sig-3", "zoo", "carol", "post", 1_300),
    ]);
}

/// Runs readiness + activation and returns the receipt hash.
fn activate_season(h: &Harness, season_id: &str) -> Hash32 {
    let readiness = h.orchestrator.evaluate_readiness(season_id).unwrap();
    assert_eq!(readiness.decision.call, ReadinessCall::Proceed);
    let outcome = h
        .orchestrator
        .activate(season_id, &readiness.decision_hash)
        .unwrap();
    assert_eq!(outcome.receipt.decision, ActivationDecision::Activated);
    outcome.receipt_hash
}

#[test]
fn test_concrete_operator_scenario() {
    let h = harness();
    seed_season(&h, "S1");

    // Readiness: nothing to audit yet, so pass-with-warnings, proceed.
    let readiness = h.orchestrator.evaluate_readiness("S1").unwrap();
    assert_eq!(readiness.decision.call, ReadinessCall::Proceed);
    assert!(readiness.decision.reasons.is_empty());

    // Activation is irreversible and idempotent.
    let first = h
        .orchestrator
        .activate("S1", &readiness.decision_hash)
        .unwrap();
    assert_eq!(first.receipt.decision, ActivationDecision::Activated);
    assert!(first.newly_activated);
    let seal = first.receipt.seal_hash.expect("activated receipt has seal");

    let again = h
        .orchestrator
        .activate("S1", &readiness.decision_hash)
        .unwrap();
    assert!(!again.newly_activated);
    assert_eq!(again.receipt_hash, first.receipt_hash);
    assert_eq!(again.receipt.seal_hash, Some(seal));

    // Premature finalization fails safe and writes nothing.
    let premature = h.orchestrator.finalize("S1").unwrap();
    assert_eq!(premature.status, FinalizeStatus::FailedSafe);
    assert_eq!(
        premature.reason,
        Some(FinalizeReason::SeasonFinalizationPremature)
    );
    assert!(h.store.read::<SeasonEndReceipt>("S1").unwrap().is_none());

    // At the window end, finalization closes the season.
    h.clock.set(T1);
    let finalized = h.orchestrator.finalize("S1").unwrap();
    assert_eq!(finalized.status, FinalizeStatus::Finalized);
    let end_hash = finalized.end_receipt_hash.expect("receipt hash");

    // Re-finalizing is a no-op returning the same receipt hash.
    let noop = h.orchestrator.finalize("S1").unwrap();
    assert_eq!(noop.status, FinalizeStatus::Noop);
    assert_eq!(noop.end_receipt_hash, Some(end_hash));
}

#[test]
fn test_activation_failure_leaves_season_activatable() {
    let h = harness();
    seed_season(&h, "S1");

    // Activating against a decision that was never evaluated fails
    // with a NOT_ACTIVATED attempt receipt.
    let bogus = Hash32([0xAB; 32]);
    let failed = h.orchestrator.activate("S1", &bogus).unwrap();
    assert_eq!(failed.receipt.decision, ActivationDecision::NotActivated);
    assert!(!failed.receipt.failure_codes.is_empty());
    assert!(!failed.newly_activated);

    // The canonical receipt key is untouched; a real activation still
    // succeeds afterwards.
    assert!(h.store.activated_receipt("S1").unwrap().is_none());
    activate_season(&h, "S1");
}

#[test]
fn test_bundle_replay_verifies_and_catches_tampering() {
    let h = harness();
    seed_season(&h, "S1");
    activate_season(&h, "S1");
    h.clock.set(T1);
    h.orchestrator.finalize("S1").unwrap();

    let verifier = BundleVerifier::new(&h.store, h.signals.as_ref(), h.orchestrator.engine());
    assert_eq!(
        verifier.verify("S1", "garden").unwrap(),
        VerifyOutcome::Pass
    );
    assert_eq!(verifier.verify("S1", "zoo").unwrap(), VerifyOutcome::Pass);

    // Tamper with one of the five input hashes inside the stored
    // bundle and re-verify.
    let record = h.local.get("canon_bundle", "S1/garden").unwrap().unwrap();
    let mut bundle: season_core::artifact::CanonBundle =
        serde_json::from_slice(&record.bytes).unwrap();
    bundle.receipt_hash = Hash32([9; 32]);
    h.local.corrupt(
        "canon_bundle",
        "S1/garden",
        serde_json::to_vec(&bundle).unwrap(),
    );

    assert_eq!(
        verifier.verify("S1", "garden").unwrap(),
        VerifyOutcome::Fail {
            divergent: DivergentField::ReceiptHash
        }
    );
    let violations = h.store.violations_for("S1").unwrap();
    assert!(violations
        .iter()
        .any(|v| v.code == ViolationCode::BundleReplayMismatch));
}

#[test]
fn test_missing_prerequisites_are_inconclusive_not_failures() {
    let h = harness();
    let verifier = BundleVerifier::new(&h.store, h.signals.as_ref(), h.orchestrator.engine());
    assert!(matches!(
        verifier.verify("S1", "garden").unwrap(),
        VerifyOutcome::Inconclusive { .. }
    ));
}

#[test]
fn test_lineage_guard_rejects_unfinalized_predecessor() {
    let h = harness();
    seed_season(&h, "S1");
    activate_season(&h, "S1");
    // S1 is live but not finalized.

    let proposal = SeasonProposal {
        season_id: "S2".to_string(),
        window: SeasonWindow {
            start_ms: T1,
            end_ms: 3_000,
        },
        invariants: vec![],
        max_share_ppm: None,
    };
    let err = h
        .orchestrator
        .build_successor_candidate("S2", "S1", proposal)
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Lineage { .. }));
    assert!(h
        .store
        .read::<season_core::artifact::SuccessorCandidateContract>("S2")
        .unwrap()
        .is_none());
}

#[test]
fn test_successor_handoff_gates_next_season_readiness() {
    let h = harness();
    seed_season(&h, "S1");
    activate_season(&h, "S1");
    h.clock.set(T1);
    h.orchestrator.finalize("S1").unwrap();

    let proposal = SeasonProposal {
        season_id: "S2".to_string(),
        window: SeasonWindow {
            start_ms: T1,
            end_ms: 3_000,
        },
        invariants: vec![],
        max_share_ppm: None,
    };
    let candidate = h
        .orchestrator
        .build_successor_candidate("S2", "S1", proposal)
        .unwrap();
    assert_eq!(candidate.status, CandidateStatus::Candidate);

    // Unacknowledged hand-off blocks the next season.
    let blocked = h.orchestrator.evaluate_readiness("S2").unwrap();
    assert_eq!(blocked.decision.call, ReadinessCall::Abort);
    assert!(blocked
        .decision
        .reasons
        .contains(&ReadinessReason::HandoffUnacknowledged));

    // Acknowledge, seed the new season, and readiness clears.
    let ack = h.orchestrator.acknowledge("S2").unwrap();
    assert_eq!(ack.status, CandidateStatus::Ready);
    assert_eq!(
        h.orchestrator.successor_status("S2").unwrap(),
        CandidateStatus::Ready
    );

    let mut next_contract = contract("S2");
    next_contract.window = SeasonWindow {
        start_ms: T1,
        end_ms: 3_000,
    };
    assert!(h.store.write_artifact(&next_contract).unwrap().is_accepted());
    assert!(h
        .store
        .write_artifact(&constraints("S2"))
        .unwrap()
        .is_accepted());

    let ready = h.orchestrator.evaluate_readiness("S2").unwrap();
    assert_eq!(ready.decision.call, ReadinessCall::Proceed);
    assert!(!ready
        .decision
        .reasons
        .contains(&ReadinessReason::HandoffUnacknowledged));
}

#[test]
fn test_config_drift_freezes_season_permanently() {
    let h = harness();
    seed_season(&h, "S1");
    activate_season(&h, "S1");

    // A second writer with a different configuration hash models a
    // config change under an activated season.
    let mut drifted_config = h.config.clone();
    drifted_config
        .signal_weights
        .insert("boost".to_string(), 99);
    let local_dyn: Arc<dyn StorageBackend> = h.local.clone();
    let clock_dyn: Arc<dyn Clock> = h.clock.clone();
    let drifted_store = SeasonStore::new(
        local_dyn,
        None,
        clock_dyn,
        drifted_config.config_hash(),
    );

    let outcome = drifted_store.write_artifact(&contract("S1")).unwrap();
    assert!(matches!(
        outcome,
        WriteOutcome::Rejected(RejectReason::Drift { .. })
    ));

    // The freeze marker is persisted truth: the original store sees it
    // and rejects every subsequent write for the season.
    assert!(h.store.is_frozen("S1").unwrap());
    let rejected = h.store.write_artifact(&contract("S1")).unwrap();
    assert_eq!(rejected, WriteOutcome::Rejected(RejectReason::Frozen));

    // Finalization cannot proceed on a frozen season.
    h.clock.set(T1);
    let finalize = h.orchestrator.finalize("S1").unwrap();
    assert_eq!(finalize.status, FinalizeStatus::FailedSafe);
    assert_eq!(finalize.reason, Some(FinalizeReason::StoreRejected));

    let violations = h.store.violations_for("S1").unwrap();
    assert!(violations
        .iter()
        .any(|v| v.code == ViolationCode::ProtocolDrift));
    assert!(violations
        .iter()
        .any(|v| v.code == ViolationCode::FrozenSeasonWrite));
}
