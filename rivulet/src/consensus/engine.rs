// Copyright (c) 2025 The Rivulet Project

//! The BFT voting engine.
//!
//! Validators exchange signed proposals naming the transaction set they
//! want in the next ledger. Agreement escalates over up to ten rounds
//! from a 50 % threshold to a final 80 % — above the 2/3 BFT safety
//! bound — while equivocators and bad signers are quarantined and
//! silent validators drift onto the negative UNL.
//!
//! All threshold math is integer basis points so every validator
//! tallies identically.

use std::collections::{BTreeMap, BTreeSet};

use riv_crypto_keys::{hash256, PrivateKey, PublicKey, Signature};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::negative_unl::NegativeUnl;

/// A validator's proposed transaction set for one `(seq, round)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Proposing validator.
    pub validator_id: String,
    /// Ledger sequence being voted on.
    pub ledger_seq: i64,
    /// Voting round.
    pub round_number: u32,
    /// Proposed transaction ids.
    pub tx_ids: BTreeSet<String>,
    /// Signature over the proposal digest; hex.
    #[serde(default)]
    pub signature: String,
}

impl Proposal {
    /// An unsigned proposal.
    pub fn new(
        validator_id: &str,
        ledger_seq: i64,
        round_number: u32,
        tx_ids: BTreeSet<String>,
    ) -> Self {
        Self {
            validator_id: validator_id.to_string(),
            ledger_seq,
            round_number,
            tx_ids,
            signature: String::new(),
        }
    }

    /// The canonical digest:
    /// `hash256("{vid}:{seq}:{round}:{sorted_comma_joined_tx_ids}")`.
    pub fn digest(&self) -> [u8; 32] {
        let joined: Vec<&str> = self.tx_ids.iter().map(String::as_str).collect();
        hash256(
            format!(
                "{}:{}:{}:{}",
                self.validator_id,
                self.ledger_seq,
                self.round_number,
                joined.join(",")
            )
            .as_bytes(),
        )
    }

    /// Sign the digest.
    pub fn sign(&mut self, key: &PrivateKey) {
        self.signature = key.sign(&self.digest()).to_hex();
    }

    /// Verify the signature against a registered public key.
    pub fn verify(&self, pubkey: &PublicKey) -> bool {
        match Signature::from_hex(&self.signature) {
            Ok(sig) => pubkey.verify(&self.digest(), &sig),
            Err(_) => false,
        }
    }
}

/// Threshold and round limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Round-0 agreement threshold in bps.
    pub initial_threshold_bps: u64,
    /// Final threshold in bps; must exceed 2/3 for safety.
    pub final_threshold_bps: u64,
    /// Maximum voting rounds.
    pub max_rounds: u32,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            initial_threshold_bps: 5_000,
            final_threshold_bps: 8_000,
            max_rounds: 10,
        }
    }
}

/// Statistics for one completed round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundStats {
    /// Round number.
    pub round: u32,
    /// Threshold used, bps.
    pub threshold_bps: u64,
    /// Proposals counted (honest, on-UNL).
    pub proposal_count: usize,
    /// Quorum denominator.
    pub effective_total: usize,
    /// Size of the agreed set at this threshold.
    pub agreed_count: usize,
    /// Byzantine validators so far.
    pub byzantine_count: usize,
}

/// The outcome of a successful consensus run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusResult {
    /// The agreed transaction set.
    pub agreed_tx_ids: BTreeSet<String>,
    /// Ledger sequence voted on.
    pub ledger_seq: i64,
    /// Rounds consumed.
    pub rounds_used: u32,
    /// Threshold in force when agreement was reached, bps.
    pub threshold_bps: u64,
    /// Quorum denominator at the end.
    pub total_validators: usize,
    /// Validators quarantined as Byzantine.
    pub byzantine_count: usize,
}

/// The per-ledger-sequence voting engine.
pub struct ConsensusEngine {
    /// This validator's id.
    pub my_id: String,
    my_key: Option<PrivateKey>,
    /// Trusted peer validators (excluding self).
    pub unl: Vec<String>,
    unl_pubkeys: BTreeMap<String, PublicKey>,
    /// Ledger sequence under vote.
    pub ledger_seq: i64,
    proposals: BTreeMap<String, Proposal>,
    my_tx_ids: BTreeSet<String>,
    byzantine: BTreeSet<String>,
    /// Unreliable-validator tracking.
    pub negative_unl: NegativeUnl,
    round: u32,
    config: ConsensusConfig,
    round_history: Vec<RoundStats>,
}

impl ConsensusEngine {
    /// A fresh engine for one ledger sequence.
    pub fn new(
        my_id: &str,
        my_key: Option<PrivateKey>,
        unl: Vec<String>,
        unl_pubkeys: BTreeMap<String, PublicKey>,
        ledger_seq: i64,
        config: ConsensusConfig,
    ) -> Self {
        Self {
            my_id: my_id.to_string(),
            my_key,
            unl,
            unl_pubkeys,
            ledger_seq,
            proposals: BTreeMap::new(),
            my_tx_ids: BTreeSet::new(),
            byzantine: BTreeSet::new(),
            negative_unl: NegativeUnl::new(),
            round: 0,
            config,
            round_history: Vec::new(),
        }
    }

    /// `f = floor((n - 1) / 3)` with `n = |unl| + 1`.
    pub fn max_byzantine_faults(&self) -> usize {
        self.unl.len() / 3
    }

    /// Set our own candidate set and emit the round-0 proposal.
    pub fn submit_transactions<I>(&mut self, tx_ids: I) -> Proposal
    where
        I: IntoIterator<Item = String>,
    {
        self.my_tx_ids = tx_ids.into_iter().collect();
        self.propose_own(0)
    }

    /// Our current candidate set.
    pub fn my_tx_ids(&self) -> &BTreeSet<String> {
        &self.my_tx_ids
    }

    /// Validators quarantined so far.
    pub fn byzantine_validators(&self) -> &BTreeSet<String> {
        &self.byzantine
    }

    /// Completed round statistics.
    pub fn round_history(&self) -> &[RoundStats] {
        &self.round_history
    }

    fn propose_own(&mut self, round: u32) -> Proposal {
        let mut proposal = Proposal::new(
            &self.my_id,
            self.ledger_seq,
            round,
            self.my_tx_ids.clone(),
        );
        if let Some(key) = &self.my_key {
            proposal.sign(key);
        }
        self.proposals
            .insert(self.my_id.clone(), proposal.clone());
        proposal
    }

    /// Register an incoming proposal.
    ///
    /// Rejects wrong-sequence and quarantined senders; a registered
    /// validator with a missing or invalid signature is quarantined;
    /// two different proposals for the same `(seq, round)` mark the
    /// sender Byzantine and drop both records.
    pub fn add_proposal(&mut self, proposal: Proposal) -> bool {
        let sender = proposal.validator_id.clone();
        if proposal.ledger_seq != self.ledger_seq {
            return false;
        }
        if self.byzantine.contains(&sender) {
            return false;
        }
        if let Some(pubkey) = self.unl_pubkeys.get(&sender) {
            if proposal.signature.is_empty() || !proposal.verify(pubkey) {
                warn!(validator = %sender, "bad proposal signature, quarantining");
                self.byzantine.insert(sender.clone());
                self.proposals.remove(&sender);
                return false;
            }
        }
        if let Some(previous) = self.proposals.get(&sender) {
            if previous.round_number == proposal.round_number
                && previous.digest() != proposal.digest()
            {
                warn!(validator = %sender, round = proposal.round_number, "equivocation detected");
                self.byzantine.insert(sender.clone());
                self.proposals.remove(&sender);
                return false;
            }
        }
        self.proposals.insert(sender, proposal);
        true
    }

    /// Threshold for a round in bps; reaches the final threshold
    /// exactly on the last round.
    fn threshold_for(&self, round: u32) -> u64 {
        let span = self.config.final_threshold_bps - self.config.initial_threshold_bps;
        let denom = (self.config.max_rounds.max(2) - 1) as u64;
        (self.config.initial_threshold_bps + span * round as u64 / denom)
            .min(self.config.final_threshold_bps)
    }

    /// Honest, on-UNL proposal senders.
    fn honest_senders(&self) -> Vec<&String> {
        self.proposals
            .keys()
            .filter(|v| !self.byzantine.contains(*v) && !self.negative_unl.contains(v))
            .collect()
    }

    /// Quorum denominator: honest proposal count, floored at
    /// `|unl| + 1 - |negative_unl|`.
    fn effective_total(&self) -> usize {
        let counted = self.honest_senders().len();
        let floor = (self.unl.len() + 1).saturating_sub(self.negative_unl.len());
        counted.max(floor)
    }

    /// Transactions appearing in at least `threshold x total` honest
    /// proposals. The vote count rounds up: a set only clears the bar
    /// when the agreeing fraction genuinely reaches the threshold, and
    /// quarantined validators shrink the denominator through the
    /// negative UNL rather than through lax rounding.
    fn agreed_at(&self, threshold_bps: u64) -> BTreeSet<String> {
        let total = self.effective_total();
        let needed = ((total as u64 * threshold_bps).div_ceil(10_000)).max(1) as usize;
        let mut counts: BTreeMap<&String, usize> = BTreeMap::new();
        for sender in self.honest_senders() {
            let proposal = &self.proposals[sender];
            for tx_id in &proposal.tx_ids {
                *counts.entry(tx_id).or_insert(0) += 1;
            }
        }
        counts
            .into_iter()
            .filter(|(_, count)| *count >= needed)
            .map(|(tx_id, _)| tx_id.clone())
            .collect()
    }

    /// Run one voting round. `Some` once the final threshold produced a
    /// non-empty agreed set.
    pub fn step_round(&mut self) -> Option<ConsensusResult> {
        if self.round >= self.config.max_rounds {
            return self.final_pass();
        }
        let round = self.round;
        let threshold_bps = self.threshold_for(round);
        let agreed = self.agreed_at(threshold_bps);

        self.round_history.push(RoundStats {
            round,
            threshold_bps,
            proposal_count: self.honest_senders().len(),
            effective_total: self.effective_total(),
            agreed_count: agreed.len(),
            byzantine_count: self.byzantine.len(),
        });

        // Silent validators drift onto the negative UNL; returners come
        // back off it.
        for validator in self.unl.clone() {
            let participated =
                self.proposals.contains_key(&validator) && !self.byzantine.contains(&validator);
            self.negative_unl
                .record_participation(&validator, participated);
            if participated && self.negative_unl.contains(&validator) {
                self.negative_unl.remove(&validator, self.ledger_seq);
            }
        }
        let flagged = self
            .negative_unl
            .check_and_update(self.unl.len() + 1, self.ledger_seq);
        if !flagged.is_empty() {
            debug!(?flagged, "validators moved to negative UNL");
        }

        if threshold_bps >= self.config.final_threshold_bps && !agreed.is_empty() {
            return Some(self.result(agreed, round + 1, threshold_bps));
        }

        // Converge: adopt the agreed set and re-propose at the next
        // round.
        self.my_tx_ids = agreed;
        self.round = round + 1;
        self.propose_own(self.round);
        None
    }

    /// Whether the round budget is spent.
    pub fn rounds_exhausted(&self) -> bool {
        self.round >= self.config.max_rounds
    }

    /// Run rounds to completion. `None` means consensus failed.
    pub fn run_rounds(&mut self) -> Option<ConsensusResult> {
        while self.round < self.config.max_rounds {
            if let Some(result) = self.step_round() {
                return Some(result);
            }
        }
        self.final_pass()
    }

    /// One more tally at the final threshold after the round budget is
    /// spent.
    pub fn final_pass(&self) -> Option<ConsensusResult> {
        let threshold = self.config.final_threshold_bps;
        let agreed = self.agreed_at(threshold);
        if agreed.is_empty() {
            return None;
        }
        Some(self.result(agreed, self.config.max_rounds, threshold))
    }

    fn result(
        &self,
        agreed: BTreeSet<String>,
        rounds_used: u32,
        threshold_bps: u64,
    ) -> ConsensusResult {
        ConsensusResult {
            agreed_tx_ids: agreed,
            ledger_seq: self.ledger_seq,
            rounds_used,
            threshold_bps,
            total_validators: self.effective_total(),
            byzantine_count: self.byzantine.len(),
        }
    }
}
