//! Season lifecycle orchestrator.
//!
//! Drives the state machine `READINESS_PENDING → READY → ACTIVATED →
//! FINALIZED`, with the orthogonal absorbing `FROZEN` state reachable
//! from `ACTIVATED` through the drift guard at any time. All state
//! lives in the write-once store; the orchestrator itself is
//! stateless, so re-entrant and duplicate calls are safe.
//!
//! Operation surface:
//!
//! - [`SeasonOrchestrator::evaluate_readiness`]: batch replay audit +
//!   governance gate + prerequisite presence → persisted
//!   `PROCEED`/`ABORT` decision.
//! - [`SeasonOrchestrator::activate`]: double-run determinism proof,
//!   contract seal, irreversible receipt, freeze baseline capture.
//! - [`SeasonOrchestrator::finalize`]: archive + end receipt +
//!   successor seed, only at or after the window end.
//! - [`SeasonOrchestrator::build_successor_candidate`] /
//!   [`SeasonOrchestrator::acknowledge`]: lineage-guarded hand-off to
//!   the next season.
//!
//! Data-state failures come back as tagged outcomes; only caller bugs
//! (lineage violations, unsealed constraints) surface as errors.

mod activate;
mod finalize;
mod gate;
mod readiness;
mod successor;

use std::sync::Arc;

use thiserror::Error;

pub use activate::ActivationOutcome;
pub use finalize::{FinalizeOutcome, FinalizeReason, FinalizeStatus};
pub use gate::{ConfigGovernanceGate, GateVerdict, GovernanceGate};
pub use readiness::ReadinessOutcome;
pub use successor::{AcknowledgeOutcome, SuccessorOutcome};

use crate::clock::Clock;
use crate::resolve::{ResolutionEngine, ResolveError};
use crate::signals::{SignalSource, SignalSourceError};
use crate::store::{SeasonStore, StoreError};

/// Errors raised by orchestrator operations.
///
/// These are process/caller errors or infrastructure failures —
/// legitimate data states (a failed activation, a premature
/// finalization) are returned as outcomes instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OrchestratorError {
    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The signal log could not be read.
    #[error(transparent)]
    Signals(#[from] SignalSourceError),

    /// The resolution engine refused to run (configuration error).
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// An artifact failed to encode while computing a chained hash.
    #[error(transparent)]
    Codec(#[from] crate::artifact::ArtifactCodecError),

    /// A successor was requested from a predecessor that is not
    /// `FINALIZED`.
    #[error("lineage violation: predecessor {predecessor_id} {detail}")]
    Lineage {
        /// The predecessor season.
        predecessor_id: String,
        /// What is wrong with it.
        detail: String,
    },

    /// `acknowledge` was called for a season with no candidate.
    #[error("no successor candidate exists for {next_season_id}")]
    MissingCandidate {
        /// The season with no candidate.
        next_season_id: String,
    },

    /// A candidate's stored bytes no longer hash to its recorded
    /// identity.
    #[error("successor candidate for {next_season_id} failed its identity check")]
    CandidateTampered {
        /// The season whose candidate is tampered.
        next_season_id: String,
    },

    /// A write the operation depends on was rejected by the store.
    #[error("store rejected the {stage} write")]
    StoreRejected {
        /// Which write was rejected.
        stage: &'static str,
    },
}

/// The season lifecycle orchestrator.
pub struct SeasonOrchestrator {
    store: Arc<SeasonStore>,
    signals: Arc<dyn SignalSource>,
    gate: Arc<dyn GovernanceGate>,
    engine: ResolutionEngine,
    clock: Arc<dyn Clock>,
}

impl SeasonOrchestrator {
    /// Creates an orchestrator over a store, signal log, governance
    /// gate, and engine.
    pub fn new(
        store: Arc<SeasonStore>,
        signals: Arc<dyn SignalSource>,
        gate: Arc<dyn GovernanceGate>,
        engine: ResolutionEngine,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            signals,
            gate,
            engine,
            clock,
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<SeasonStore> {
        &self.store
    }

    /// The resolution engine.
    #[must_use]
    pub const fn engine(&self) -> &ResolutionEngine {
        &self.engine
    }

    /// The signal source.
    #[must_use]
    pub fn signals(&self) -> &Arc<dyn SignalSource> {
        &self.signals
    }
}
