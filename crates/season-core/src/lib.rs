//! Core library for the season protocol ledger.
//!
//! A season is a time-boxed accounting epoch for community reward
//! allocation. This crate implements the deterministic, tamper-evident
//! state machine that governs a season's lifecycle: readiness evaluation,
//! irreversible activation, constraint-aware allocation resolution,
//! immutability and temporal enforcement, drift-triggered freezing,
//! finalization and archival, and hand-off to the successor season.
//!
//! # Components
//!
//! - [`crypto`]: Blake3 content hashing with per-artifact-kind domain
//!   separation
//! - [`canonical`]: deterministic JSON canonicalization (JCS profile,
//!   integer-only)
//! - [`artifact`]: the closed set of artifact kinds and their canonical
//!   hash-input shapes
//! - [`store`]: write-once artifact store with temporal lock, freeze
//!   dominance, and a best-effort remote mirror
//! - [`freeze`]: protocol fingerprint baseline and one-way drift freeze
//! - [`signals`]: append-only signal source contract and deterministic
//!   snapshotting
//! - [`resolve`]: the constraint-aware resolution engine
//! - [`season`]: the lifecycle orchestrator (readiness, activation,
//!   finalization, succession)
//! - [`verify`]: independent canon-bundle replay verification
//! - [`parity`]: dual-mirror parity checking
//! - [`export`]: hash-verified audit pack export
//! - [`config`]: ledger configuration (weight table, ceilings, limits)
//!
//! # Integrity policy
//!
//! The ledger fails closed for integrity and open for availability:
//! conflicting, out-of-window, or post-freeze writes are rejected and
//! recorded as immutable violation artifacts, while remote-mirror
//! failures are swallowed, counted, and surfaced later by the parity
//! checker. Data-state anomalies are returned as tagged outcomes; only
//! configuration errors (caller bugs) surface as hard errors.

pub mod artifact;
pub mod canonical;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod export;
pub mod freeze;
pub mod parity;
pub mod resolve;
pub mod season;
pub mod signals;
pub mod store;
pub mod verify;

pub use artifact::{Artifact, ArtifactKind};
pub use clock::{Clock, SystemClock};
pub use config::LedgerConfig;
pub use crypto::{ArtifactHasher, HASH_SIZE, Hash32};
pub use season::SeasonOrchestrator;
pub use store::{SeasonStore, WriteOutcome};
