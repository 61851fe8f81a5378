// Copyright (c) 2025 The Rivulet Project

//! Ledger close: stake maturation, canonical ordering, tx/state roots
//! and the hash-chained header.

use riv_core_types::{LedgerHeader, ShaMap};
use riv_crypto_keys::hash256;
use tracing::{error, info};

use super::invariants::{Checkpoint, InvariantChecker};
use super::Ledger;

impl Ledger {
    /// Close the open ledger.
    ///
    /// `close_time` is injected by the validator task (never read from a
    /// clock here) and rounded down to the configured resolution before
    /// it enters the header hash, so validators applying the same
    /// consensus result write the same close time.
    pub fn close_ledger(&mut self, close_time: i64) -> LedgerHeader {
        let resolution = self.params.close_time_resolution.max(1);
        let close_time = close_time - close_time.rem_euclid(resolution);
        let parent_hash = self.tip_hash();

        // Mature stakes first: interest is minted into supply.
        let payouts = self.engines.staking.mature_stakes(close_time);
        for (address, principal, interest) in payouts {
            let account = self
                .accounts
                .entry(address.clone())
                .or_insert_with(|| super::account::Account::new(&address));
            account.balance += principal + interest;
            self.total_supply += interest;
            self.total_minted += interest;
        }

        // Canonical ordering makes the tx root identical across
        // validators regardless of submission order.
        self.pending_txns
            .sort_by_cached_key(|tx| tx.canonical_key());

        let mut tx_map = ShaMap::new();
        for tx in &self.pending_txns {
            let tx_id = tx.tx_id();
            tx_map.insert(hash256(tx_id.as_bytes()), tx_id.into_bytes());
        }
        let tx_hash = tx_map.root_hex();

        let mut state_map = ShaMap::new();
        for (address, account) in &self.accounts {
            let digest = format!("{address}|{}|{}", account.balance, account.sequence);
            state_map.insert(hash256(address.as_bytes()), digest.into_bytes());
        }
        for (stealth_hex, output) in &self.confidential_outputs {
            let key = format!("ct:{stealth_hex}");
            state_map.insert(
                hash256(key.as_bytes()),
                hex::encode(&output.commitment).into_bytes(),
            );
        }
        let state_hash = state_map.root_hex();

        let mut header = LedgerHeader {
            sequence: self.current_sequence,
            parent_hash,
            tx_hash,
            state_hash,
            close_time,
            tx_count: self.pending_txns.len() as i64,
            total_native: self.total_supply,
            hash: String::new(),
        };
        header.hash = header.compute_hash();

        info!(
            seq = header.sequence,
            tx_count = header.tx_count,
            hash = %header.hash,
            "ledger closed"
        );

        self.closed_ledgers.push(header.clone());
        self.pending_txns.clear();
        self.current_sequence += 1;

        // The supply invariants must also hold at every close. A
        // failure here means the ledger should stop making progress and
        // wait for an operator.
        if let Err(message) = InvariantChecker::verify(self, &Checkpoint::default()) {
            error!(seq = header.sequence, %message, "invariant violated at close");
        }
        header
    }

    /// Tally amendment votes against the validator-set size. Called by
    /// the owning node alongside close.
    pub fn tally_amendments(&mut self, total_validators: usize) -> Vec<String> {
        self.engines.amendments.process_at_close(total_validators)
    }
}

#[cfg(test)]
mod tests {
    use super::super::LedgerParams;
    use super::*;
    use riv_core_types::{Amount, ResultCode, StakeTier, Transaction, TxBody, TxHeader};

    fn funded_ledger() -> Ledger {
        let mut ledger = Ledger::new(LedgerParams::default());
        let tx = ledger.genesis_payment("nAlice", 1_000 * 1_000_000, 100);
        assert_eq!(ledger.apply(&tx), ResultCode::Success);
        ledger
    }

    #[test]
    fn closed_ledgers_form_a_strict_chain() {
        let mut ledger = funded_ledger();
        let first = ledger.close_ledger(1_000);
        let second = ledger.close_ledger(1_010);
        assert_eq!(first.sequence + 1, second.sequence);
        assert_eq!(second.parent_hash, first.hash);
        assert_eq!(first.parent_hash, LedgerHeader::zero_hash());
        assert!(ledger.pending_txns.is_empty());
    }

    #[test]
    fn close_time_is_rounded_to_resolution() {
        let mut ledger = funded_ledger();
        let header = ledger.close_ledger(1_234_567);
        assert_eq!(header.close_time % 10, 0);
        assert_eq!(header.close_time, 1_234_560);
    }

    #[test]
    fn header_binds_the_supply() {
        let mut ledger = funded_ledger();
        let header = ledger.close_ledger(2_000);
        assert_eq!(header.total_native, ledger.total_supply);
    }

    #[test]
    fn stake_maturity_mints_interest_at_close() {
        let mut ledger = funded_ledger();
        let stake = Transaction::new(
            TxHeader {
                account: "nAlice".into(),
                amount: Amount::native_units(100),
                fee: Amount::native(10),
                sequence: 0,
                timestamp: 1_000,
                ..TxHeader::default()
            },
            TxBody::Stake {
                tier: StakeTier::Days30,
            },
        );
        assert_eq!(ledger.apply(&stake), ResultCode::Success);
        let record = ledger.engines.staking.get(&stake.tx_id()).unwrap().clone();
        let supply_before = ledger.total_supply;
        let balance_before = ledger.get_balance("nAlice");

        ledger.close_ledger(record.maturity_time);

        let interest = record.maturity_interest();
        assert!(interest > 0);
        assert_eq!(ledger.total_supply, supply_before + interest);
        assert_eq!(ledger.total_minted, interest);
        assert_eq!(
            ledger.get_balance("nAlice"),
            balance_before + record.amount + interest
        );
    }

    #[test]
    fn pending_txns_close_in_canonical_order() {
        let mut ledger = Ledger::new(LedgerParams::default());
        // Two independent payments from genesis (wildcard sequence).
        let a = ledger.genesis_payment("nBob", 50_000_000, 100);
        let b = ledger.genesis_payment("nAlice", 50_000_000, 101);
        assert_eq!(ledger.apply(&a), ResultCode::Success);
        assert_eq!(ledger.apply(&b), ResultCode::Success);
        ledger.close_ledger(1_000);
        // Both are Payments from the same account; the tie breaks on
        // tx id, which close applied before hashing.
        assert!(ledger.pending_txns.is_empty());
    }
}
