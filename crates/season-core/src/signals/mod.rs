//! Append-only signal source contract and deterministic snapshotting.
//!
//! The raw signal log is an external collaborator: the ledger only
//! requires an ordered read view of it. Snapshots are deterministic —
//! sorted by `(ts_ms, id)` with duplicate ids dropped — so the same log
//! state always hashes to the same `signals_snapshot_hash`, on any
//! backend, in any process.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artifact::SeasonWindow;
use crate::canonical;
use crate::crypto::{ArtifactHasher, Hash32};

/// Domain tag for signal snapshot hashes.
pub const SNAPSHOT_DOMAIN: &[u8] = b"SL_SIGNAL_SNAPSHOT_V1";

/// One recorded user action in a community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Signal {
    /// Unique signal id within the log.
    pub id: String,
    /// The community the action happened in.
    pub community_id: String,
    /// The acting user.
    pub actor_user_id: String,
    /// Signal type (weighted by the ledger configuration).
    pub signal_type: String,
    /// Optional target of the action (post id, user id, ...).
    pub target_id: Option<String>,
    /// When the action happened, milliseconds since the Unix epoch.
    pub ts_ms: u64,
}

/// Errors surfaced by a signal source.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SignalSourceError {
    /// The underlying log could not be read.
    #[error("signal source unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },
}

/// Read contract over the external append-only signal log.
pub trait SignalSource: Send + Sync {
    /// Lists signals for a community at or after `since_ms`, sorted by
    /// `(ts_ms, id)`.
    ///
    /// # Errors
    ///
    /// Returns [`SignalSourceError`] if the log cannot be read.
    fn list_signals(
        &self,
        community_id: &str,
        since_ms: u64,
    ) -> Result<Vec<Signal>, SignalSourceError>;

    /// Lists every community known to the log, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`SignalSourceError`] if the log cannot be read.
    fn list_communities(&self) -> Result<Vec<String>, SignalSourceError>;
}

/// In-memory signal source for tests and local tooling.
#[derive(Debug, Default)]
pub struct MemorySignalSource {
    signals: RwLock<Vec<Signal>>,
}

impl MemorySignalSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a signal to the log.
    pub fn push(&self, signal: Signal) {
        self.signals
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(signal);
    }

    /// Appends a batch of signals to the log.
    pub fn extend(&self, signals: impl IntoIterator<Item = Signal>) {
        self.signals
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .extend(signals);
    }
}

impl SignalSource for MemorySignalSource {
    fn list_signals(
        &self,
        community_id: &str,
        since_ms: u64,
    ) -> Result<Vec<Signal>, SignalSourceError> {
        let guard = self
            .signals
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut out: Vec<Signal> = guard
            .iter()
            .filter(|s| s.community_id == community_id && s.ts_ms >= since_ms)
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.ts_ms, &a.id).cmp(&(b.ts_ms, &b.id)));
        Ok(out)
    }

    fn list_communities(&self) -> Result<Vec<String>, SignalSourceError> {
        let guard = self
            .signals
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut communities: Vec<String> = guard
            .iter()
            .map(|s| s.community_id.clone())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        communities.sort();
        Ok(communities)
    }
}

/// A deterministic, window-bounded view of one community's signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignalSnapshot {
    /// The community snapshotted.
    pub community_id: String,
    /// Signals inside the window, sorted by `(ts_ms, id)`, unique ids.
    pub signals: Vec<Signal>,
}

impl SignalSnapshot {
    /// Builds the snapshot for a community over a season window.
    ///
    /// Re-sorts and dedups defensively: the source contract promises
    /// `(ts_ms, id)` order, but snapshot hashes must not depend on a
    /// collaborator honoring it.
    ///
    /// # Errors
    ///
    /// Returns [`SignalSourceError`] if the source cannot be read.
    pub fn build(
        source: &dyn SignalSource,
        community_id: &str,
        window: &SeasonWindow,
    ) -> Result<Self, SignalSourceError> {
        let raw = source.list_signals(community_id, window.start_ms)?;

        let mut by_id: BTreeMap<(u64, String), Signal> = BTreeMap::new();
        let mut seen_ids = std::collections::HashSet::new();
        for signal in raw {
            if signal.ts_ms >= window.end_ms {
                continue;
            }
            if !seen_ids.insert(signal.id.clone()) {
                continue;
            }
            by_id.insert((signal.ts_ms, signal.id.clone()), signal);
        }

        Ok(Self {
            community_id: community_id.to_string(),
            signals: by_id.into_values().collect(),
        })
    }

    /// Computes the snapshot hash over the canonical signal list.
    #[must_use]
    pub fn snapshot_hash(&self) -> Hash32 {
        serde_json::to_value(self)
            .ok()
            .and_then(|v| canonical::canonical_bytes(&v).ok())
            .map_or_else(
                || ArtifactHasher::hash_domain(SNAPSHOT_DOMAIN, format!("{self:?}").as_bytes()),
                |bytes| ArtifactHasher::hash_domain(SNAPSHOT_DOMAIN, &bytes),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(id: &str, community: &str, ts_ms: u64) -> Signal {
        Signal {
            id: id.to_string(),
            community_id: community.to_string(),
            actor_user_id: "user-1".to_string(),
            signal_type: "post".to_string(),
            target_id: None,
            ts_ms,
        }
    }

    #[test]
    fn test_snapshot_sorted_and_window_bounded() {
        let source = MemorySignalSource::new();
        source.push(signal("c", "garden", 150));
        source.push(signal("a", "garden", 150));
        source.push(signal("b", "garden", 120));
        source.push(signal("late", "garden", 200));
        source.push(signal("early", "garden", 50));

        let window = SeasonWindow {
            start_ms: 100,
            end_ms: 200,
        };
        let snapshot = SignalSnapshot::build(&source, "garden", &window).unwrap();

        let ids: Vec<&str> = snapshot.signals.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_snapshot_hash_independent_of_insertion_order() {
        let window = SeasonWindow {
            start_ms: 0,
            end_ms: 1_000,
        };

        let forward = MemorySignalSource::new();
        forward.push(signal("a", "garden", 10));
        forward.push(signal("b", "garden", 20));

        let backward = MemorySignalSource::new();
        backward.push(signal("b", "garden", 20));
        backward.push(signal("a", "garden", 10));

        let fwd = SignalSnapshot::build(&forward, "garden", &window).unwrap();
        let bwd = SignalSnapshot::build(&backward, "garden", &window).unwrap();
        assert_eq!(fwd.snapshot_hash(), bwd.snapshot_hash());
    }

    #[test]
    fn test_duplicate_ids_dropped() {
        let source = MemorySignalSource::new();
        source.push(signal("dup", "garden", 10));
        source.push(signal("dup", "garden", 10));

        let window = SeasonWindow {
            start_ms: 0,
            end_ms: 100,
        };
        let snapshot = SignalSnapshot::build(&source, "garden", &window).unwrap();
        assert_eq!(snapshot.signals.len(), 1);
    }

    #[test]
    fn test_list_communities_sorted_unique() {
        let source = MemorySignalSource::new();
        source.push(signal("1", "zoo", 10));
        source.push(signal("2", "garden", 10));
        source.push(signal("3", "zoo", 11));
        assert_eq!(source.list_communities().unwrap(), vec!["garden", "zoo"]);
    }
}
