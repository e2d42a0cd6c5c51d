//! Command implementations.
//!
//! Every command prints one structured JSON outcome to stdout and
//! reserves stderr for logs.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use serde_json::json;

use season_core::artifact::{ActivationContract, Artifact, ArtifactKind, CompiledConstraints,
    SeasonProposal, SeasonWindow};
use season_core::clock::SystemClock;
use season_core::config::LedgerConfig;
use season_core::export::{AuditExporter, FileAuditSink};
use season_core::parity::ParityChecker;
use season_core::resolve::ResolutionEngine;
use season_core::season::{ConfigGovernanceGate, SeasonOrchestrator};
use season_core::signals::SignalSource;
use season_core::store::{SeasonStore, SqliteBackend, StorageBackend, WriteOutcome};
use season_core::crypto::Hash32;

use crate::signal_log::{JsonlSignalLog, read_json_file};

/// Shared command context: config, store, orchestrator.
pub struct Context {
    config: LedgerConfig,
    store: Arc<SeasonStore>,
    orchestrator: SeasonOrchestrator,
    clock: Arc<SystemClock>,
}

impl Context {
    /// Builds the context from CLI paths.
    pub fn build(
        store_path: &Path,
        mirror_path: Option<&Path>,
        config_path: Option<&Path>,
        signals_path: Option<&Path>,
    ) -> Result<Self> {
        let config = match config_path {
            Some(path) => LedgerConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => LedgerConfig::default(),
        };

        let local: Arc<dyn StorageBackend> = Arc::new(
            SqliteBackend::open(store_path)
                .with_context(|| format!("opening store {}", store_path.display()))?,
        );
        let mirror: Option<Arc<dyn StorageBackend>> = match mirror_path {
            Some(path) => Some(Arc::new(
                SqliteBackend::open(path)
                    .with_context(|| format!("opening mirror {}", path.display()))?,
            )),
            None => None,
        };

        let clock = Arc::new(SystemClock);
        let store = Arc::new(SeasonStore::new(
            local,
            mirror,
            clock.clone(),
            config.config_hash(),
        ));

        tracing::debug!(
            store = %store_path.display(),
            mirrored = mirror_path.is_some(),
            "ledger store opened"
        );

        let signals: Arc<dyn SignalSource> = Arc::new(JsonlSignalLog::new(signals_path));
        let gate = Arc::new(ConfigGovernanceGate::new(&config));
        let engine = ResolutionEngine::new(&config);
        let orchestrator = SeasonOrchestrator::new(
            store.clone(),
            signals,
            gate,
            engine,
            clock.clone(),
        );

        Ok(Self {
            config,
            store,
            orchestrator,
            clock,
        })
    }
}

fn emit(value: serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// `seasonctl readiness <season>`
pub fn readiness(ctx: &Context, season_id: &str) -> Result<()> {
    let outcome = ctx.orchestrator.evaluate_readiness(season_id)?;
    emit(json!({
        "season_id": season_id,
        "decision": outcome.decision,
        "decision_hash": outcome.decision_hash,
    }))
}

/// `seasonctl activate <season> <decision-hash>`
pub fn activate(ctx: &Context, season_id: &str, decision_hash: &str) -> Result<()> {
    let decision_hash: Hash32 = decision_hash
        .parse()
        .context("decision hash must be 64 hex chars")?;
    let outcome = ctx.orchestrator.activate(season_id, &decision_hash)?;
    emit(json!({
        "season_id": season_id,
        "receipt": outcome.receipt,
        "receipt_hash": outcome.receipt_hash,
        "newly_activated": outcome.newly_activated,
    }))
}

/// `seasonctl finalize <season>`
pub fn finalize(ctx: &Context, season_id: &str) -> Result<()> {
    let outcome = ctx.orchestrator.finalize(season_id)?;
    emit(json!({
        "season_id": season_id,
        "outcome": outcome,
    }))
}

/// `seasonctl successor <next> <prev> --start-ms --end-ms`
pub fn successor(
    ctx: &Context,
    next_id: &str,
    prev_id: &str,
    start_ms: u64,
    end_ms: u64,
    invariants: Vec<String>,
) -> Result<()> {
    if end_ms <= start_ms {
        bail!("window end must be after start");
    }
    let proposal = SeasonProposal {
        season_id: next_id.to_string(),
        window: SeasonWindow { start_ms, end_ms },
        invariants,
        max_share_ppm: None,
    };
    let outcome = ctx
        .orchestrator
        .build_successor_candidate(next_id, prev_id, proposal)?;
    emit(json!({
        "next_season_id": next_id,
        "predecessor_id": prev_id,
        "candidate": outcome.candidate,
        "candidate_hash": outcome.candidate_hash,
        "status": outcome.status,
    }))
}

/// `seasonctl acknowledge <next>`
pub fn acknowledge(ctx: &Context, next_id: &str) -> Result<()> {
    let outcome = ctx.orchestrator.acknowledge(next_id)?;
    emit(json!({
        "next_season_id": next_id,
        "acknowledgement_hash": outcome.acknowledgement_hash,
        "status": outcome.status,
    }))
}

/// `seasonctl parity <season>`
pub fn parity(ctx: &Context, season_id: &str) -> Result<()> {
    let checker = ParityChecker::new(&ctx.store, ctx.clock.clone());
    let run = checker.run(season_id)?;
    emit(json!({
        "season_id": season_id,
        "report": run.report,
        "report_hash": run.report_hash,
        "mirror_write_failures": ctx.store.mirror_failures(),
    }))
}

/// `seasonctl export <season> --out-dir DIR`
pub fn export(ctx: &Context, season_id: &str, out_dir: &Path) -> Result<()> {
    let exporter = AuditExporter::new(&ctx.store, ctx.config.audit_pack_prefix.clone());
    let sink = FileAuditSink::new(out_dir);
    let summary = exporter.export(season_id, &sink)?;
    emit(json!({
        "season_id": season_id,
        "file": sink.path_for(&summary.filename),
        "pack_hash": summary.pack_hash,
        "artifact_lines": summary.artifact_lines,
        "bytes": summary.bytes,
    }))
}

/// `seasonctl inspect <season> [--kind K] [--stats] [--violations]`
pub fn inspect(
    ctx: &Context,
    season_id: &str,
    kind: Option<&str>,
    stats: bool,
    violations: bool,
) -> Result<()> {
    if stats {
        return emit(json!({
            "stats": ctx.store.stats()?,
            "frozen": ctx.store.is_frozen(season_id)?,
            "mirror_write_failures": ctx.store.mirror_failures(),
            "inspected_at": chrono::Utc::now().to_rfc3339(),
        }));
    }
    if violations {
        return emit(json!({
            "season_id": season_id,
            "violations": ctx.store.violations_for(season_id)?,
        }));
    }

    let kinds: Vec<ArtifactKind> = match kind {
        Some(name) => vec![parse_kind(name)?],
        None => ArtifactKind::ALL.to_vec(),
    };

    let mut artifacts = Vec::new();
    for kind in kinds {
        for id in ctx.store.list_ids(kind)? {
            if !id_belongs_to_season(kind, &id, season_id, ctx)? {
                continue;
            }
            if let Some(record) = ctx.store.read_record(kind, &id)? {
                let artifact = Artifact::decode(kind, &record.bytes)?;
                artifacts.push(json!({
                    "type": kind.type_name(),
                    "id": id,
                    "hash": record.hash,
                    "artifact": artifact.to_value()?,
                }));
            }
        }
    }
    emit(json!({
        "season_id": season_id,
        "artifacts": artifacts,
    }))
}

/// `seasonctl submit <contract|constraints> <file>`
pub fn submit(ctx: &Context, kind: &str, file: &Path) -> Result<()> {
    let outcome = match kind {
        "contract" => {
            let contract: ActivationContract = read_json_file(file)?;
            ctx.store.write_artifact(&contract)?
        }
        "constraints" => {
            let constraints: CompiledConstraints = read_json_file(file)?;
            ctx.store.write_artifact(&constraints)?
        }
        other => bail!("unknown submit kind {other:?}; expected contract or constraints"),
    };
    emit(match outcome {
        WriteOutcome::Wrote { hash } => json!({"status": "WROTE", "hash": hash}),
        WriteOutcome::AlreadyPresentSameHash { hash } => {
            json!({"status": "ALREADY_PRESENT", "hash": hash})
        }
        WriteOutcome::Rejected(reason) => json!({"status": "REJECTED", "reason": format!("{reason:?}")}),
    })
}

fn parse_kind(name: &str) -> Result<ArtifactKind> {
    ArtifactKind::ALL
        .into_iter()
        .find(|k| k.type_name().eq_ignore_ascii_case(name) || k.collection() == name)
        .with_context(|| format!("unknown artifact kind {name:?}"))
}

/// Whether a stored id belongs to the inspected season. Most kinds
/// key directly by season id; bundles/attempts/manifests prefix it;
/// violations and parity reports carry it in their payload.
fn id_belongs_to_season(
    kind: ArtifactKind,
    id: &str,
    season_id: &str,
    ctx: &Context,
) -> Result<bool> {
    if id == season_id || id.starts_with(&format!("{season_id}/")) {
        return Ok(true);
    }
    match kind {
        ArtifactKind::Violation | ArtifactKind::ParityReport | ArtifactKind::ReadinessDecision => {
            let Some(record) = ctx.store.read_record(kind, id)? else {
                return Ok(false);
            };
            let value: serde_json::Value = serde_json::from_slice(&record.bytes)?;
            Ok(value.get("season_id").and_then(|v| v.as_str()) == Some(season_id))
        }
        _ => Ok(false),
    }
}
