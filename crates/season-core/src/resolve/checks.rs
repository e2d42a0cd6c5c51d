//! Post-hoc compliance checks over a resolved allocation.
//!
//! Each check is independent and re-examines the finished entry list
//! against the constraints from scratch — none trusts that an earlier
//! pipeline stage did its job. A failed check aborts the resolution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::artifact::{AllocationEntry, CompiledConstraints};
use crate::signals::Signal;

use super::engine::ResolutionInputs;

/// The five compliance checks, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceCheck {
    /// No entry exceeds the effective share ceiling.
    CapCompliance,
    /// No excluded community received an allocation.
    ExclusionCompliance,
    /// No disabled signal type contributed mass.
    SignalFilterCompliance,
    /// Entry counts and treasury accountability per community.
    GovernanceLimitCompliance,
    /// Every contributing signal settled inside the allowed window.
    WindowCompliance,
}

/// Runs all five checks and returns the ones that failed.
pub(super) fn run_all(
    entries: &[AllocationEntry],
    contributing: &[&Signal],
    constraints: &CompiledConstraints,
    inputs: &ResolutionInputs,
    cap_ppm: u32,
    entry_limit: u32,
) -> Vec<ComplianceCheck> {
    let mut failed = Vec::new();

    if !cap_compliant(entries, cap_ppm) {
        failed.push(ComplianceCheck::CapCompliance);
    }
    if !exclusion_compliant(entries, constraints) {
        failed.push(ComplianceCheck::ExclusionCompliance);
    }
    if !signal_filter_compliant(contributing, constraints) {
        failed.push(ComplianceCheck::SignalFilterCompliance);
    }
    if !governance_compliant(entries, inputs, entry_limit) {
        failed.push(ComplianceCheck::GovernanceLimitCompliance);
    }
    if !window_compliant(contributing, constraints, inputs.timestamp_ms) {
        failed.push(ComplianceCheck::WindowCompliance);
    }

    failed
}

fn cap_compliant(entries: &[AllocationEntry], cap_ppm: u32) -> bool {
    entries.iter().all(|e| e.final_share_ppm <= cap_ppm)
}

fn exclusion_compliant(entries: &[AllocationEntry], constraints: &CompiledConstraints) -> bool {
    entries
        .iter()
        .all(|e| !constraints.excluded_communities.contains(&e.community_id))
}

fn signal_filter_compliant(contributing: &[&Signal], constraints: &CompiledConstraints) -> bool {
    contributing
        .iter()
        .all(|s| !constraints.disabled_signal_types.contains(&s.signal_type))
}

/// Every allocated community stays under the entry limit and has a
/// treasury entry to account against.
fn governance_compliant(
    entries: &[AllocationEntry],
    inputs: &ResolutionInputs,
    entry_limit: u32,
) -> bool {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for entry in entries {
        *counts.entry(entry.community_id.as_str()).or_insert(0) += 1;
    }
    counts.iter().all(|(community, count)| {
        *count <= u64::from(entry_limit) && inputs.treasuries.contains_key(*community)
    })
}

/// No future signals, and every signal is at least `settlement_delay_ms`
/// older than the resolution timestamp when a delay is configured.
fn window_compliant(
    contributing: &[&Signal],
    constraints: &CompiledConstraints,
    timestamp_ms: u64,
) -> bool {
    contributing.iter().all(|s| {
        if s.ts_ms > timestamp_ms {
            return false;
        }
        match constraints.settlement_delay_ms {
            Some(delay) => s.ts_ms.saturating_add(delay) <= timestamp_ms,
            None => true,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(community: &str, user: &str, share_ppm: u32) -> AllocationEntry {
        AllocationEntry {
            community_id: community.to_string(),
            user_id: user.to_string(),
            final_share_ppm: share_ppm,
        }
    }

    #[test]
    fn test_cap_check_catches_overage() {
        let entries = vec![entry("garden", "whale", 200_000)];
        assert!(!cap_compliant(&entries, 150_000));
        assert!(cap_compliant(&entries, 200_000));
    }

    #[test]
    fn test_governance_check_entry_limit() {
        let entries = vec![
            entry("garden", "a", 100),
            entry("garden", "b", 100),
            entry("garden", "c", 100),
        ];
        let inputs = ResolutionInputs {
            signals: vec![],
            treasuries: BTreeMap::from([("garden".to_string(), 1_000)]),
            timestamp_ms: 1_000,
        };
        assert!(governance_compliant(&entries, &inputs, 3));
        assert!(!governance_compliant(&entries, &inputs, 2));
    }

    #[test]
    fn test_window_check_rejects_future_signal() {
        let future = Signal {
            id: "f".to_string(),
            community_id: "garden".to_string(),
            actor_user_id: "alice".to_string(),
            signal_type: "post".to_string(),
            target_id: None,
            ts_ms: 2_000,
        };
        let constraints = CompiledConstraints {
            season_id: "S1".to_string(),
            sealed: true,
            disabled_signal_types: vec![],
            excluded_communities: vec![],
            max_share_ppm: None,
            max_entries_per_community: None,
            settlement_delay_ms: None,
            treasuries: BTreeMap::new(),
            compiled_ms: 0,
        };
        assert!(!window_compliant(&[&future], &constraints, 1_000));
    }
}
