// Copyright (c) 2025 The Rivulet Project

//! Negative UNL: validators temporarily excluded from quorum math.
//!
//! Validators that miss enough consecutive rounds are flagged so the
//! quorum denominator shrinks and the network keeps closing ledgers
//! while a minority is offline. Flagged validators are removed again
//! as soon as they resume participating, with a short sequence-based
//! cooldown before they can be re-flagged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Consecutive missed rounds before flagging.
pub const DEFAULT_MISS_THRESHOLD: u32 = 5;
/// Largest fraction of validators allowed on the negative UNL, bps.
const MAX_NEGATIVE_UNL_BPS: u64 = 2_500;
/// Ledger sequences before a removed validator may be re-flagged.
const READD_COOLDOWN_SEQS: i64 = 32;

/// A flagged validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegativeUnlEntry {
    /// Validator id.
    pub validator_id: String,
    /// Ledger sequence when flagged.
    pub ledger_seq: i64,
    /// Why it was flagged.
    pub reason: String,
}

/// The negative UNL tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegativeUnl {
    entries: BTreeMap<String, NegativeUnlEntry>,
    miss_counts: BTreeMap<String, u32>,
    removed_at_seq: BTreeMap<String, i64>,
    miss_threshold: u32,
}

impl Default for NegativeUnl {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            miss_counts: BTreeMap::new(),
            removed_at_seq: BTreeMap::new(),
            miss_threshold: DEFAULT_MISS_THRESHOLD,
        }
    }
}

impl NegativeUnl {
    /// A tracker with the default miss threshold.
    pub fn new() -> Self {
        Self::default()
    }

    /// A tracker with a custom miss threshold.
    pub fn with_threshold(miss_threshold: u32) -> Self {
        Self {
            miss_threshold: miss_threshold.max(1),
            ..Self::default()
        }
    }

    /// Number of flagged validators.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is flagged.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a validator is flagged.
    pub fn contains(&self, validator_id: &str) -> bool {
        self.entries.contains_key(validator_id)
    }

    /// Record whether a validator participated in a round.
    pub fn record_participation(&mut self, validator_id: &str, participated: bool) {
        if participated {
            self.miss_counts.insert(validator_id.to_string(), 0);
        } else {
            *self.miss_counts.entry(validator_id.to_string()).or_insert(0) += 1;
        }
    }

    /// Flag validators whose miss count crossed the threshold, bounded
    /// by the maximum negative-UNL fraction. Returns newly flagged ids.
    pub fn check_and_update(&mut self, total_validators: usize, ledger_seq: i64) -> Vec<String> {
        let max_size =
            ((total_validators as u64 * MAX_NEGATIVE_UNL_BPS) / 10_000).max(1) as usize;
        let mut added = Vec::new();
        let candidates: Vec<(String, u32)> = self
            .miss_counts
            .iter()
            .map(|(v, c)| (v.clone(), *c))
            .collect();
        for (validator_id, count) in candidates {
            if self.entries.contains_key(&validator_id) || count < self.miss_threshold {
                continue;
            }
            if self.entries.len() >= max_size {
                break;
            }
            if let Some(removed_seq) = self.removed_at_seq.get(&validator_id) {
                if ledger_seq - removed_seq < READD_COOLDOWN_SEQS {
                    continue;
                }
            }
            self.entries.insert(
                validator_id.clone(),
                NegativeUnlEntry {
                    validator_id: validator_id.clone(),
                    ledger_seq,
                    reason: format!("missed {count} consecutive rounds"),
                },
            );
            added.push(validator_id);
        }
        added
    }

    /// Unflag a validator that resumed participating.
    pub fn remove(&mut self, validator_id: &str, ledger_seq: i64) -> bool {
        if self.entries.remove(validator_id).is_none() {
            return false;
        }
        self.miss_counts.insert(validator_id.to_string(), 0);
        self.removed_at_seq
            .insert(validator_id.to_string(), ledger_seq);
        true
    }

    /// Validators not currently flagged.
    pub fn effective_validators<'a>(&self, all: &'a [String]) -> Vec<&'a String> {
        all.iter().filter(|v| !self.contains(v)).collect()
    }

    /// Flagged entries in id order.
    pub fn entries(&self) -> impl Iterator<Item = &NegativeUnlEntry> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_after_threshold_misses() {
        let mut nunl = NegativeUnl::with_threshold(3);
        for _ in 0..2 {
            nunl.record_participation("v2", false);
        }
        assert!(nunl.check_and_update(8, 1).is_empty());
        nunl.record_participation("v2", false);
        assert_eq!(nunl.check_and_update(8, 1), vec!["v2".to_string()]);
        assert!(nunl.contains("v2"));
    }

    #[test]
    fn participation_resets_the_count() {
        let mut nunl = NegativeUnl::with_threshold(3);
        nunl.record_participation("v2", false);
        nunl.record_participation("v2", false);
        nunl.record_participation("v2", true);
        nunl.record_participation("v2", false);
        assert!(nunl.check_and_update(8, 1).is_empty());
    }

    #[test]
    fn size_is_capped_by_fraction() {
        let mut nunl = NegativeUnl::with_threshold(1);
        for v in ["v1", "v2", "v3"] {
            nunl.record_participation(v, false);
        }
        // 8 validators: at most 2 may be flagged.
        let added = nunl.check_and_update(8, 1);
        assert_eq!(added.len(), 2);
        assert_eq!(nunl.len(), 2);
    }

    #[test]
    fn cooldown_blocks_immediate_reflagging() {
        let mut nunl = NegativeUnl::with_threshold(1);
        nunl.record_participation("v2", false);
        nunl.check_and_update(8, 1);
        nunl.remove("v2", 5);
        assert!(!nunl.contains("v2"));

        nunl.record_participation("v2", false);
        assert!(nunl.check_and_update(8, 6).is_empty());
        assert_eq!(nunl.check_and_update(8, 5 + READD_COOLDOWN_SEQS), vec!["v2".to_string()]);
    }

    #[test]
    fn effective_validators_excludes_flagged() {
        let mut nunl = NegativeUnl::with_threshold(1);
        nunl.record_participation("v2", false);
        nunl.check_and_update(8, 1);
        let all = vec!["v1".to_string(), "v2".to_string(), "v3".to_string()];
        let effective = nunl.effective_validators(&all);
        assert_eq!(effective.len(), 2);
        assert!(!effective.iter().any(|v| *v == "v2"));
    }
}
