//! Governance (moral) gate consulted during readiness.

use crate::config::LedgerConfig;

/// Verdict of the governance gate for a season.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateVerdict {
    /// The season may proceed.
    Allow,
    /// The season is vetoed.
    Block {
        /// Why the gate vetoed the season.
        reason: String,
    },
}

/// Gate consulted by readiness evaluation before any season can
/// proceed to activation.
pub trait GovernanceGate: Send + Sync {
    /// Assesses a season.
    fn assess(&self, season_id: &str) -> GateVerdict;
}

/// Config-driven gate: blocks the seasons listed in
/// `blocked_seasons`, allows everything else.
#[derive(Debug, Clone, Default)]
pub struct ConfigGovernanceGate {
    blocked: Vec<String>,
}

impl ConfigGovernanceGate {
    /// Builds the gate from the ledger configuration.
    #[must_use]
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            blocked: config.blocked_seasons.clone(),
        }
    }
}

impl GovernanceGate for ConfigGovernanceGate {
    fn assess(&self, season_id: &str) -> GateVerdict {
        if self.blocked.iter().any(|s| s == season_id) {
            GateVerdict::Block {
                reason: format!("season {season_id} is blocked by configuration"),
            }
        } else {
            GateVerdict::Allow
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_gate_blocks_listed_season() {
        let mut config = LedgerConfig::default();
        config.blocked_seasons.push("S-embargoed".to_string());
        let gate = ConfigGovernanceGate::new(&config);

        assert_eq!(gate.assess("S1"), GateVerdict::Allow);
        assert!(matches!(
            gate.assess("S-embargoed"),
            GateVerdict::Block { .. }
        ));
    }
}
