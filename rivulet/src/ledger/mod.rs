// Copyright (c) 2025 The Rivulet Project

//! The ledger: account state, sub-engines, the transaction application
//! engine and the close procedure.
//!
//! A [`Ledger`] exclusively owns all accounts, confidential outputs and
//! sub-engine state. It is strictly single-threaded: every mutation
//! happens inside [`Ledger::apply`] or [`Ledger::close_ledger`], both
//! of which run to completion without suspension.

pub mod account;
mod apply;
mod close;
pub mod invariants;
pub mod metadata;
pub mod rippling;

use std::collections::{BTreeMap, BTreeSet};

use riv_core_types::{Amount, LedgerHeader, Transaction, MICRO_PER_UNIT};
use serde::{Deserialize, Serialize};

use crate::engines::Engines;
use account::{Account, ConfidentialOutput, TrustLine};
use metadata::TxMetadata;

/// Ledger-wide parameters, all configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerParams {
    /// Initial native supply in micro-units.
    pub initial_supply: i128,
    /// Address holding the initial supply.
    pub genesis_account: String,
    /// Base account reserve in micro-units.
    pub base_reserve: i128,
    /// Additional reserve per owned object.
    pub owner_reserve_inc: i128,
    /// Minimum transaction fee in micro-units.
    pub min_fee: i128,
    /// Fee required to delete an account.
    pub account_delete_fee: i128,
    /// Minimum sequence before an account may be deleted.
    pub account_delete_min_seq: i64,
    /// Close-time rounding quantum in seconds.
    pub close_time_resolution: i64,
}

impl Default for LedgerParams {
    fn default() -> Self {
        Self {
            initial_supply: 100_000_000_000 * MICRO_PER_UNIT,
            genesis_account: "nGenesis".to_string(),
            base_reserve: 10 * MICRO_PER_UNIT,
            owner_reserve_inc: 2 * MICRO_PER_UNIT,
            min_fee: 10,
            account_delete_fee: 5 * MICRO_PER_UNIT,
            account_delete_min_seq: 256,
            close_time_resolution: 10,
        }
    }
}

/// Read-only summary of the ledger state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSummary {
    /// Open ledger sequence.
    pub current_sequence: i64,
    /// Number of closed ledgers.
    pub closed_ledgers: usize,
    /// Account count.
    pub accounts: usize,
    /// Pending transaction count.
    pub pending_txns: usize,
    /// Total supply in micro-units.
    pub total_supply: i128,
    /// Fees burned over the ledger's lifetime.
    pub total_burned: i128,
    /// Interest and claims minted.
    pub total_minted: i128,
    /// Spent key images.
    pub spent_key_images: usize,
    /// Stored confidential outputs.
    pub confidential_outputs: usize,
    /// Active stake principal.
    pub total_staked: i128,
    /// Hash of the last closed ledger.
    pub tip_hash: String,
}

/// The validator's ledger state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    /// Parameters this ledger runs with.
    pub params: LedgerParams,
    /// All accounts, sorted by address.
    pub accounts: BTreeMap<String, Account>,
    /// Key images spent by confidential payments.
    pub spent_key_images: BTreeSet<String>,
    /// Ids of every applied transaction, for duplicate suppression.
    pub applied_tx_ids: BTreeSet<String>,
    /// Confidential outputs keyed by stealth-address hex.
    pub confidential_outputs: BTreeMap<String, ConfidentialOutput>,
    /// Transactions applied since the last close.
    pub pending_txns: Vec<Transaction>,
    /// Metadata for every processed transaction.
    pub tx_metadata: Vec<TxMetadata>,
    /// Closed headers, oldest first.
    pub closed_ledgers: Vec<LedgerHeader>,
    /// Sequence of the open ledger.
    pub current_sequence: i64,
    /// Current native supply in micro-units.
    pub total_supply: i128,
    /// Supply at genesis.
    pub initial_supply: i128,
    /// Total fees and penalties burned.
    pub total_burned: i128,
    /// Total interest and cross-chain claims minted.
    pub total_minted: i128,
    /// Sub-engines.
    pub engines: Engines,
}

impl Ledger {
    /// A fresh ledger holding the whole supply on the genesis account.
    pub fn new(params: LedgerParams) -> Self {
        let mut accounts = BTreeMap::new();
        let mut genesis = Account::new(&params.genesis_account);
        genesis.balance = params.initial_supply;
        accounts.insert(params.genesis_account.clone(), genesis);

        Self {
            initial_supply: params.initial_supply,
            total_supply: params.initial_supply,
            total_burned: 0,
            total_minted: 0,
            accounts,
            spent_key_images: BTreeSet::new(),
            applied_tx_ids: BTreeSet::new(),
            confidential_outputs: BTreeMap::new(),
            pending_txns: Vec::new(),
            tx_metadata: Vec::new(),
            closed_ledgers: Vec::new(),
            current_sequence: 1,
            engines: Engines::default(),
            params,
        }
    }

    /// The reserve an account with `owner_count` objects must keep.
    pub fn reserve_for(&self, owner_count: i64) -> i128 {
        self.params.base_reserve + self.params.owner_reserve_inc * owner_count.max(0) as i128
    }

    // ---- read-only queries ----

    /// Look up an account.
    pub fn get_account(&self, address: &str) -> Option<&Account> {
        self.accounts.get(address)
    }

    /// Native balance of an account; 0 when absent.
    pub fn get_balance(&self, address: &str) -> i128 {
        self.accounts.get(address).map(|a| a.balance).unwrap_or(0)
    }

    /// Look up a trust line.
    pub fn get_trust_line(
        &self,
        holder: &str,
        currency: &str,
        issuer: &str,
    ) -> Option<&TrustLine> {
        self.accounts.get(holder)?.trust_line(currency, issuer)
    }

    /// Look up a confidential output by stealth-address hex.
    pub fn get_confidential_output(&self, stealth_hex: &str) -> Option<&ConfidentialOutput> {
        self.confidential_outputs.get(stealth_hex)
    }

    /// All confidential outputs, sorted by stealth key.
    pub fn get_all_confidential_outputs(&self) -> impl Iterator<Item = &ConfidentialOutput> {
        self.confidential_outputs.values()
    }

    /// Whether a key image was spent.
    pub fn is_key_image_spent(&self, key_image: &[u8]) -> bool {
        self.spent_key_images.contains(&hex::encode(key_image))
    }

    /// Whether a stealth address already carries an output.
    pub fn is_stealth_address_used(&self, stealth_hex: &str) -> bool {
        self.confidential_outputs.contains_key(stealth_hex)
    }

    /// Hash of the last closed header, or the zero hash.
    pub fn tip_hash(&self) -> String {
        self.closed_ledgers
            .last()
            .map(|h| h.hash.clone())
            .unwrap_or_else(LedgerHeader::zero_hash)
    }

    /// A read-only state summary.
    pub fn get_state_summary(&self) -> StateSummary {
        StateSummary {
            current_sequence: self.current_sequence,
            closed_ledgers: self.closed_ledgers.len(),
            accounts: self.accounts.len(),
            pending_txns: self.pending_txns.len(),
            total_supply: self.total_supply,
            total_burned: self.total_burned,
            total_minted: self.total_minted,
            spent_key_images: self.spent_key_images.len(),
            confidential_outputs: self.confidential_outputs.len(),
            total_staked: self.engines.staking.total_staked,
            tip_hash: self.tip_hash(),
        }
    }

    /// Build a payment from the genesis account, used at bootstrap to
    /// seed accounts.
    pub fn genesis_payment(&self, destination: &str, amount: i128, timestamp: i64) -> Transaction {
        Transaction::payment(
            &self.params.genesis_account,
            destination,
            Amount::native(amount),
            Amount::native(self.params.min_fee),
            0,
            timestamp,
        )
    }

    #[cfg(test)]
    pub(crate) fn ensure_account_for_test(&mut self, address: &str) {
        self.accounts
            .entry(address.to_string())
            .or_insert_with(|| Account::new(address));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_holds_the_whole_supply() {
        let ledger = Ledger::new(LedgerParams::default());
        assert_eq!(
            ledger.get_balance("nGenesis"),
            100_000_000_000 * MICRO_PER_UNIT
        );
        assert_eq!(ledger.total_supply, ledger.initial_supply);
        assert_eq!(ledger.current_sequence, 1);
        assert_eq!(ledger.tip_hash(), LedgerHeader::zero_hash());
    }

    #[test]
    fn reserve_scales_with_owner_count() {
        let ledger = Ledger::new(LedgerParams::default());
        assert_eq!(ledger.reserve_for(0), 10 * MICRO_PER_UNIT);
        assert_eq!(ledger.reserve_for(3), 16 * MICRO_PER_UNIT);
        assert_eq!(ledger.reserve_for(-2), 10 * MICRO_PER_UNIT);
    }

    #[test]
    fn summary_reflects_state() {
        let ledger = Ledger::new(LedgerParams::default());
        let summary = ledger.get_state_summary();
        assert_eq!(summary.accounts, 1);
        assert_eq!(summary.closed_ledgers, 0);
        assert_eq!(summary.total_supply, ledger.total_supply);
    }
}
