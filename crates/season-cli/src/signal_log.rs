//! JSON-lines signal log reader.
//!
//! The production signal log is an external service; for operator
//! tooling a flat JSONL file of [`Signal`] records is enough. An
//! absent file behaves as an empty log, so read-only commands work
//! before any signals exist.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use season_core::signals::{Signal, SignalSource, SignalSourceError};

/// Signal source backed by a JSONL file.
#[derive(Debug)]
pub struct JsonlSignalLog {
    path: Option<PathBuf>,
}

impl JsonlSignalLog {
    /// Creates a log over the given file; `None` is an empty log.
    #[must_use]
    pub fn new(path: Option<&Path>) -> Self {
        Self {
            path: path.map(Path::to_path_buf),
        }
    }

    fn load(&self) -> Result<Vec<Signal>, SignalSourceError> {
        let Some(path) = &self.path else {
            return Ok(Vec::new());
        };
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| SignalSourceError::Unavailable {
                message: format!("{}: {e}", path.display()),
            })?;

        let mut signals = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let signal: Signal =
                serde_json::from_str(line).map_err(|e| SignalSourceError::Unavailable {
                    message: format!("{} line {}: {e}", path.display(), line_no + 1),
                })?;
            signals.push(signal);
        }
        Ok(signals)
    }
}

impl SignalSource for JsonlSignalLog {
    fn list_signals(
        &self,
        community_id: &str,
        since_ms: u64,
    ) -> Result<Vec<Signal>, SignalSourceError> {
        let mut signals: Vec<Signal> = self
            .load()?
            .into_iter()
            .filter(|s| s.community_id == community_id && s.ts_ms >= since_ms)
            .collect();
        signals.sort_by(|a, b| (a.ts_ms, &a.id).cmp(&(b.ts_ms, &b.id)));
        Ok(signals)
    }

    fn list_communities(&self) -> Result<Vec<String>, SignalSourceError> {
        let mut communities: Vec<String> = self
            .load()?
            .into_iter()
            .map(|s| s.community_id)
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        communities.sort();
        Ok(communities)
    }
}

/// Loads and validates a JSON artifact payload from a file.
pub fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}
