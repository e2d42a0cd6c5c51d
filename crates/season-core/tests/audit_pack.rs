//! Parity checking and audit pack export over a finalized season.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use season_core::artifact::{ActivationContract, ActivationDecision, CompiledConstraints,
    MismatchKind, ParityStatus, ResolutionArtifact, SeasonWindow};
use season_core::clock::{Clock, ManualClock};
use season_core::config::LedgerConfig;
use season_core::export::{AuditExporter, AuditSink, ExportError, verify_pack};
use season_core::parity::ParityChecker;
use season_core::resolve::ResolutionEngine;
use season_core::season::{ConfigGovernanceGate, GovernanceGate, SeasonOrchestrator};
use season_core::signals::{MemorySignalSource, Signal, SignalSource};
use season_core::store::{MemoryBackend, SeasonStore, StorageBackend};

const T0: u64 = 1_000;
const T1: u64 = 2_000;

fn clock_for(h: &Harness) -> Arc<dyn Clock> {
    h.clock.clone()
}

struct Harness {
    store: Arc<SeasonStore>,
    local: Arc<MemoryBackend>,
    mirror: Arc<MemoryBackend>,
    clock: Arc<ManualClock>,
    config: LedgerConfig,
}

/// Sink capturing packs in memory.
#[derive(Default)]
struct MemorySink {
    packs: Mutex<Vec<(String, Vec<u8>)>>,
}

impl AuditSink for MemorySink {
    fn write_pack(&self, filename: &str, bytes: &[u8]) -> Result<(), std::io::Error> {
        self.packs
            .lock()
            .unwrap()
            .push((filename.to_string(), bytes.to_vec()));
        Ok(())
    }
}

/// Builds a harness and drives "S1" all the way to FINALIZED.
fn finalized_harness() -> Harness {
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
    signals.extend([
        Signal {
            id: "sig-1".to_string(),
            community_id: "garden".to_string(),
            actor_user_id: "alice".to_string(),
            signal_type: "post".to_string(),
            target_id: None,
            ts_ms: 1_100,
        },
        Signal {
            id: "sig-2".to_string(),
            community_id: "garden".to_string(),
            actor_user_id: "bob".to_string(),
            signal_type: "comment".to_string(),
            target_id: None,
            ts_ms: 1_200,
        },
        Signal {
            id: "sig-3".to_string(),
            community_id: "zoo".to_string(),
            actor_user_id: "carol".to_string(),
            signal_type: "post".to_string(),
            target_id: None,
            ts_ms: 1_300,
        },
    ]);

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

    store
        .write_artifact(&ActivationContract {
            season_id: "S1".to_string(),
            window: SeasonWindow {
                start_ms: T0,
                end_ms: T1,
            },
            invariants: vec![],
            created_ms: 900,
        })
        .unwrap();
    store
        .write_artifact(&CompiledConstraints {
            season_id: "S1".to_string(),
            sealed: true,
            disabled_signal_types: vec![],
            excluded_communities: vec![],
            max_share_ppm: None,
            max_entries_per_community: None,
            settlement_delay_ms: None,
            treasuries: BTreeMap::from([
                ("garden".to_string(), 1_000),
                ("zoo".to_string(), 500),
            ]),
            compiled_ms: 950,
        })
        .unwrap();

    let readiness = orchestrator.evaluate_readiness("S1").unwrap();
    let activation = orchestrator
        .activate("S1", &readiness.decision_hash)
        .unwrap();
    assert_eq!(activation.receipt.decision, ActivationDecision::Activated);

    clock.set(T1);
    orchestrator.finalize("S1").unwrap();

    Harness {
        store,
        local,
        mirror,
        clock,
        config,
    }
}

#[test]
fn test_parity_pass_on_identical_mirrors() {
    let h = finalized_harness();
    let checker = ParityChecker::new(&h.store, clock_for(&h));

    let run = checker.run("S1").unwrap();
    assert_eq!(run.report.status, ParityStatus::Pass);
    assert!(run.report.mismatches.is_empty());
    assert!(run.report.checked_pairs > 0);
}

#[test]
fn test_parity_flags_missing_remote() {
    let h = finalized_harness();
    h.mirror.remove("canon_bundle", "S1/zoo");

    let checker = ParityChecker::new(&h.store, clock_for(&h));
    let run = checker.run("S1").unwrap();

    assert_eq!(run.report.status, ParityStatus::Fail);
    let missing: Vec<_> = run
        .report
        .mismatches
        .iter()
        .filter(|m| m.kind == MismatchKind::MissingRemote)
        .collect();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].id, "S1/zoo");
}

#[test]
fn test_export_pack_round_trip() {
    let h = finalized_harness();
    let exporter = AuditExporter::new(&h.store, h.config.audit_pack_prefix.clone());
    let sink = MemorySink::default();

    let summary = exporter.export("S1", &sink).unwrap();

    let packs = sink.packs.lock().unwrap();
    assert_eq!(packs.len(), 1);
    let (filename, bytes) = &packs[0];
    assert_eq!(filename, &summary.filename);
    assert_eq!(
        filename,
        &format!("seasonpack_S1_{}.jsonl", summary.pack_hash.hex_prefix(12))
    );

    // 9 required artifacts + 2 community bundles + the successor seed.
    assert_eq!(summary.artifact_lines, 12);

    let manifest = verify_pack(bytes).unwrap();
    assert_eq!(manifest.pack_hash, summary.pack_hash);
    assert_eq!(manifest.season_id, "S1");
    assert!(manifest
        .artifact_order
        .iter()
        .any(|t| t == "CANON_BUNDLE"));
}

#[test]
fn test_export_aborts_on_drifted_artifact() {
    let h = finalized_harness();

    // Corrupt the stored resolution artifact without touching its
    // claimed hash.
    let record = h
        .local
        .get("resolution_artifact", "S1")
        .unwrap()
        .unwrap();
    let mut resolution: ResolutionArtifact = serde_json::from_slice(&record.bytes).unwrap();
    for entry in &mut resolution.entries {
        entry.final_share_ppm = 999_999;
    }
    h.local.corrupt(
        "resolution_artifact",
        "S1",
        serde_json::to_vec(&resolution).unwrap(),
    );

    let exporter = AuditExporter::new(&h.store, h.config.audit_pack_prefix.clone());
    let sink = MemorySink::default();
    let err = exporter.export("S1", &sink).unwrap_err();

    assert!(matches!(err, ExportError::HashMismatch { .. }));
    assert!(sink.packs.lock().unwrap().is_empty(), "nothing may ship");
}

#[test]
fn test_unfinalized_season_is_not_exportable() {
    let h = finalized_harness();
    let exporter = AuditExporter::new(&h.store, h.config.audit_pack_prefix.clone());
    let sink = MemorySink::default();

    // "S2" has no artifacts at all.
    let err = exporter.export("S2", &sink).unwrap_err();
    assert!(matches!(err, ExportError::MissingArtifact { .. }));
    assert!(sink.packs.lock().unwrap().is_empty());
}
