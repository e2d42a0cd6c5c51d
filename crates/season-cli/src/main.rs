//! seasonctl - operator CLI for the season protocol ledger.
//!
//! Host tool over the core library: readiness, activation,
//! finalization, succession, parity checking, audit export, and
//! artifact inspection. Every command prints a structured JSON
//! outcome; nothing is silently dropped.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;
mod signal_log;

/// seasonctl - season protocol ledger operator tool
#[derive(Parser, Debug)]
#[command(name = "seasonctl")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the local (authoritative) store database
    #[arg(long, default_value = "season-ledger.db")]
    store: PathBuf,

    /// Path to the remote-mirror store database, if any
    #[arg(long)]
    mirror: Option<PathBuf>,

    /// Path to the ledger configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the signal log (JSON lines)
    #[arg(long)]
    signals: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    // === Lifecycle ===
    /// Evaluate readiness for a season and persist the decision
    Readiness {
        /// Season id
        season: String,
    },

    /// Activate a season against a readiness decision hash
    Activate {
        /// Season id
        season: String,
        /// Hex hash of the PROCEED readiness decision
        decision_hash: String,
    },

    /// Finalize a season (archive + end receipt + successor seed)
    Finalize {
        /// Season id
        season: String,
    },

    /// Build a successor candidate from a finalized predecessor
    Successor {
        /// Proposed next season id
        next: String,
        /// Finalized predecessor season id
        prev: String,
        /// Proposed window start (ms since epoch)
        #[arg(long)]
        start_ms: u64,
        /// Proposed window end (ms since epoch)
        #[arg(long)]
        end_ms: u64,
        /// Proposed invariants (repeatable)
        #[arg(long = "invariant")]
        invariants: Vec<String>,
    },

    /// Acknowledge a successor candidate (promote to READY)
    Acknowledge {
        /// Candidate next-season id
        next: String,
    },

    // === Audit ===
    /// Run the dual-store parity check for a season
    Parity {
        /// Season id
        season: String,
    },

    /// Export a hash-verified audit pack for a season
    Export {
        /// Season id
        season: String,
        /// Directory the pack file is written into
        #[arg(long, default_value = "audit-packs")]
        out_dir: PathBuf,
    },

    /// Inspect stored artifacts for a season
    Inspect {
        /// Season id
        season: String,
        /// Artifact type to read back (e.g. CANON_BUNDLE)
        #[arg(long)]
        kind: Option<String>,
        /// Print store statistics instead of artifacts
        #[arg(long)]
        stats: bool,
        /// Print recorded violations for the season
        #[arg(long)]
        violations: bool,
    },

    // === Intake (host-side writes of external artifacts) ===
    /// Submit an activation contract or compiled constraints from a
    /// JSON file
    Submit {
        /// Artifact kind: contract | constraints
        kind: String,
        /// Path to the JSON payload
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let ctx = commands::Context::build(
        &cli.store,
        cli.mirror.as_deref(),
        cli.config.as_deref(),
        cli.signals.as_deref(),
    )?;

    match cli.command {
        Commands::Readiness { season } => commands::readiness(&ctx, &season),
        Commands::Activate {
            season,
            decision_hash,
        } => commands::activate(&ctx, &season, &decision_hash),
        Commands::Finalize { season } => commands::finalize(&ctx, &season),
        Commands::Successor {
            next,
            prev,
            start_ms,
            end_ms,
            invariants,
        } => commands::successor(&ctx, &next, &prev, start_ms, end_ms, invariants),
        Commands::Acknowledge { next } => commands::acknowledge(&ctx, &next),
        Commands::Parity { season } => commands::parity(&ctx, &season),
        Commands::Export { season, out_dir } => commands::export(&ctx, &season, &out_dir),
        Commands::Inspect {
            season,
            kind,
            stats,
            violations,
        } => commands::inspect(&ctx, &season, kind.as_deref(), stats, violations),
        Commands::Submit { kind, file } => commands::submit(&ctx, &kind, &file),
    }
}
