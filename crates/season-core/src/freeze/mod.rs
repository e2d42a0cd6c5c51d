//! Freeze/drift guard.
//!
//! At activation time the orchestrator captures a [`FreezeBaseline`]:
//! the fingerprint `hash(contract_hash, receipt_hash, constraints_hash,
//! config_hash)` over the protocol state that produced the season. On
//! every subsequent write for an activated season the store recomputes
//! the live fingerprint and compares. A mismatch — or a missing
//! baseline — freezes the season permanently; there is no unfreeze in
//! the runtime.
//!
//! Freezing is a fail-closed decision: the check is pure hash
//! comparison over a handful of local reads and never touches the
//! mirror, so it cannot silently degrade to "allowed" when a remote is
//! slow.

use thiserror::Error;

use crate::artifact::{ArtifactCodecError, ArtifactKind, FreezeBaseline, decode_payload};
use crate::crypto::Hash32;
use crate::store::{BackendError, StorageBackend};

/// Outcome of a drift evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezeCheck {
    /// Live fingerprint matches the baseline; the write may proceed.
    Ok,
    /// No baseline was ever captured for this activated season.
    /// Treated as drift.
    BaselineMissing,
    /// The live fingerprint diverged from the baseline.
    Drift {
        /// The baseline fingerprint.
        expected: Hash32,
        /// The fingerprint observed now.
        observed: Hash32,
    },
}

/// Errors raised while evaluating the guard.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FreezeError {
    /// The local store could not be read.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A stored baseline failed to decode.
    #[error(transparent)]
    Codec(#[from] ArtifactCodecError),
}

/// Reads the stored hash of one protocol component, or the zero hash
/// when the component is missing.
///
/// A missing component after activation is itself divergence: the zero
/// placeholder guarantees the computed fingerprint cannot match a
/// baseline captured over real hashes.
fn component_hash(
    local: &dyn StorageBackend,
    kind: ArtifactKind,
    season_id: &str,
) -> Result<Hash32, BackendError> {
    Ok(local
        .get(kind.collection(), season_id)?
        .map_or(Hash32::ZERO, |record| record.hash))
}

/// Computes the live protocol fingerprint for a season.
///
/// # Errors
///
/// Returns [`FreezeError`] if the local store cannot be read.
pub fn live_fingerprint(
    local: &dyn StorageBackend,
    season_id: &str,
    config_hash: &Hash32,
) -> Result<Hash32, FreezeError> {
    let contract_hash = component_hash(local, ArtifactKind::SealedContract, season_id)?;
    let receipt_hash = component_hash(local, ArtifactKind::ActivationReceipt, season_id)?;
    let constraints_hash = component_hash(local, ArtifactKind::CompiledConstraints, season_id)?;
    Ok(FreezeBaseline::compute_fingerprint(
        &contract_hash,
        &receipt_hash,
        &constraints_hash,
        config_hash,
    ))
}

/// Evaluates the guard for an activated season.
///
/// # Errors
///
/// Returns [`FreezeError`] if the local store cannot be read or the
/// stored baseline is malformed.
pub fn evaluate(
    local: &dyn StorageBackend,
    season_id: &str,
    config_hash: &Hash32,
) -> Result<FreezeCheck, FreezeError> {
    let baseline = match local.get(ArtifactKind::FreezeBaseline.collection(), season_id)? {
        None => return Ok(FreezeCheck::BaselineMissing),
        Some(record) => decode_payload::<FreezeBaseline>(&record.bytes)?,
    };

    let observed = live_fingerprint(local, season_id, config_hash)?;
    if observed == baseline.fingerprint {
        Ok(FreezeCheck::Ok)
    } else {
        Ok(FreezeCheck::Drift {
            expected: baseline.fingerprint,
            observed,
        })
    }
}

/// Captures a baseline from the current store state.
///
/// Returns `None` if any of the three protocol records is missing —
/// the caller must not capture a baseline for a season that has not
/// fully activated.
///
/// # Errors
///
/// Returns [`FreezeError`] if the local store cannot be read.
pub fn capture(
    local: &dyn StorageBackend,
    season_id: &str,
    config_hash: &Hash32,
) -> Result<Option<FreezeBaseline>, FreezeError> {
    let contract = local.get(ArtifactKind::SealedContract.collection(), season_id)?;
    let receipt = local.get(ArtifactKind::ActivationReceipt.collection(), season_id)?;
    let constraints = local.get(ArtifactKind::CompiledConstraints.collection(), season_id)?;

    let (Some(contract), Some(receipt), Some(constraints)) = (contract, receipt, constraints)
    else {
        return Ok(None);
    };

    let fingerprint = FreezeBaseline::compute_fingerprint(
        &contract.hash,
        &receipt.hash,
        &constraints.hash,
        config_hash,
    );
    Ok(Some(FreezeBaseline {
        season_id: season_id.to_string(),
        contract_hash: contract.hash,
        receipt_hash: receipt.hash,
        constraints_hash: constraints.hash,
        config_hash: *config_hash,
        fingerprint,
    }))
}
