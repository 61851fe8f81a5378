// Copyright (c) 2025 The Rivulet Project

//! Amendment flags: named protocol features that validators vote on.
//!
//! Votes are tallied at ledger close; an amendment with at least 80 %
//! of validator support becomes enabled. Transactions of a family whose
//! amendment is registered but not enabled fail with
//! `AMENDMENT_BLOCKED`. There is no further governance machinery.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Enable threshold in basis points.
const ENABLE_THRESHOLD_BPS: u64 = 8_000;

/// Lifecycle of an amendment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmendmentStatus {
    /// Proposed, gathering votes.
    Proposed,
    /// Enabled; gated features are live.
    Enabled,
}

/// A named amendment and its votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amendment {
    /// Feature name, e.g. `"Hooks"`.
    pub name: String,
    /// Current status.
    pub status: AmendmentStatus,
    /// Supporting validator ids.
    pub votes: BTreeSet<String>,
}

/// The amendment registry.
///
/// Features absent from the registry are considered always-on; only a
/// registered (pending) amendment can block its family.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AmendmentRegistry {
    amendments: BTreeMap<String, Amendment>,
}

/// The feature gating a transaction family, if any.
pub fn feature_for_tx_type(tx_type: u32) -> Option<&'static str> {
    match tx_type {
        22..=26 => Some("NFToken"),
        27..=32 => Some("AMM"),
        33..=34 => Some("PriceOracle"),
        35..=36 => Some("DID"),
        37..=42 => Some("MPToken"),
        43..=45 => Some("Credentials"),
        46..=49 => Some("XChainBridge"),
        50 => Some("Hooks"),
        _ => None,
    }
}

impl AmendmentRegistry {
    /// An empty registry: every feature enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending amendment. Its family blocks until enabled.
    pub fn propose(&mut self, name: &str) {
        self.amendments
            .entry(name.to_string())
            .or_insert_with(|| Amendment {
                name: name.to_string(),
                status: AmendmentStatus::Proposed,
                votes: BTreeSet::new(),
            });
    }

    /// Record or withdraw a validator's support.
    pub fn vote(&mut self, name: &str, validator_id: &str, support: bool) -> bool {
        let Some(amendment) = self.amendments.get_mut(name) else {
            return false;
        };
        if support {
            amendment.votes.insert(validator_id.to_string());
        } else {
            amendment.votes.remove(validator_id);
        }
        true
    }

    /// Tally votes at ledger close. Returns newly enabled names.
    pub fn process_at_close(&mut self, total_validators: usize) -> Vec<String> {
        let mut enabled = Vec::new();
        for amendment in self.amendments.values_mut() {
            if amendment.status == AmendmentStatus::Enabled {
                continue;
            }
            let needed = (total_validators as u64 * ENABLE_THRESHOLD_BPS).div_ceil(10_000);
            if total_validators > 0 && amendment.votes.len() as u64 >= needed {
                amendment.status = AmendmentStatus::Enabled;
                enabled.push(amendment.name.clone());
            }
        }
        enabled
    }

    /// Whether a named feature is live.
    pub fn is_enabled(&self, name: &str) -> bool {
        match self.amendments.get(name) {
            Some(amendment) => amendment.status == AmendmentStatus::Enabled,
            // Unregistered features are always-on.
            None => true,
        }
    }

    /// Whether a transaction type is blocked by a pending amendment.
    pub fn is_blocked(&self, tx_type: u32) -> bool {
        feature_for_tx_type(tx_type)
            .map(|feature| !self.is_enabled(feature))
            .unwrap_or(false)
    }

    /// All registered amendments.
    pub fn all(&self) -> impl Iterator<Item = &Amendment> {
        self.amendments.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_features_are_always_on() {
        let registry = AmendmentRegistry::new();
        assert!(registry.is_enabled("AMM"));
        assert!(!registry.is_blocked(27));
        assert!(!registry.is_blocked(0));
    }

    #[test]
    fn pending_amendments_block_their_family() {
        let mut registry = AmendmentRegistry::new();
        registry.propose("AMM");
        assert!(registry.is_blocked(27));
        assert!(registry.is_blocked(32));
        assert!(!registry.is_blocked(0));
    }

    #[test]
    fn eighty_percent_enables() {
        let mut registry = AmendmentRegistry::new();
        registry.propose("Hooks");
        for v in ["v1", "v2", "v3"] {
            registry.vote("Hooks", v, true);
        }
        // 3 of 4 = 75 %: not yet.
        assert!(registry.process_at_close(4).is_empty());
        registry.vote("Hooks", "v4", true);
        assert_eq!(registry.process_at_close(4), vec!["Hooks".to_string()]);
        assert!(!registry.is_blocked(50));
    }

    #[test]
    fn withdrawn_votes_count_against() {
        let mut registry = AmendmentRegistry::new();
        registry.propose("DID");
        registry.vote("DID", "v1", true);
        registry.vote("DID", "v1", false);
        assert!(registry.process_at_close(1).is_empty());
    }

    #[test]
    fn voting_on_unknown_amendment_is_refused() {
        let mut registry = AmendmentRegistry::new();
        assert!(!registry.vote("Nope", "v1", true));
    }
}
