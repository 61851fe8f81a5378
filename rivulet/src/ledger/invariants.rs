// Copyright (c) 2025 The Rivulet Project

//! Checkpointing and post-transaction invariant checks.
//!
//! Before a transaction mutates anything, the state machine opens a
//! [`Checkpoint`]. Account pre-images are captured lazily: every
//! mutating accessor on the ledger records the pre-image of an account
//! the first time it is touched. Sub-engine state is checkpointed as a
//! whole the first time a handler reaches for it. Rollback restores the
//! pre-images in sorted address order and removes anything the
//! transaction appended to the key-image and output sets.

use std::collections::BTreeMap;

use tracing::warn;

use super::account::Account;
use super::Ledger;
use crate::engines::Engines;

/// Reversible state captured for one transaction.
#[derive(Debug, Clone, Default)]
pub struct Checkpoint {
    /// Pre-images of touched accounts. `None` = did not exist.
    pub accounts: BTreeMap<String, Option<Account>>,
    /// Supply counters before the transaction.
    pub total_supply: i128,
    /// Burn counter before.
    pub total_burned: i128,
    /// Mint counter before.
    pub total_minted: i128,
    /// Whole-engine checkpoint, taken on first engine touch.
    pub engines: Option<Box<Engines>>,
    /// Key images this transaction recorded.
    pub added_key_images: Vec<String>,
    /// Stealth keys of outputs this transaction stored.
    pub added_outputs: Vec<String>,
}

impl Checkpoint {
    /// Record an account pre-image if not already captured.
    pub fn touch(&mut self, address: &str, current: Option<&Account>) {
        self.accounts
            .entry(address.to_string())
            .or_insert_with(|| current.cloned());
    }

    /// Pre-image owner count of an account, when captured.
    fn pre_owner_count(&self, address: &str) -> Option<i64> {
        self.accounts
            .get(address)
            .and_then(|pre| pre.as_ref().map(|a| a.owner_count))
    }

    /// Pre-image balance of an account, when captured.
    fn pre_balance(&self, address: &str) -> Option<i128> {
        self.accounts
            .get(address)
            .and_then(|pre| pre.as_ref().map(|a| a.balance))
    }

    /// Pre-image sequence of an account, when captured.
    fn pre_sequence(&self, address: &str) -> Option<i64> {
        self.accounts
            .get(address)
            .and_then(|pre| pre.as_ref().map(|a| a.sequence))
    }
}

/// Verifies the ledger invariants after a successful application.
pub struct InvariantChecker;

impl InvariantChecker {
    /// Run every check. Returns the first failure as a message.
    pub fn verify(ledger: &Ledger, cp: &Checkpoint) -> Result<(), String> {
        Self::check_supply_formula(ledger)?;
        Self::check_supply_distribution(ledger)?;
        Self::check_touched_accounts(ledger, cp)?;
        Self::check_trust_line_limits(ledger, cp)?;
        Ok(())
    }

    /// `total_supply == initial_supply - burned + minted`, non-negative.
    fn check_supply_formula(ledger: &Ledger) -> Result<(), String> {
        let expected = ledger.initial_supply - ledger.total_burned + ledger.total_minted;
        if ledger.total_supply != expected {
            return Err(format!(
                "supply formula violated: {} != {} - {} + {}",
                ledger.total_supply,
                ledger.initial_supply,
                ledger.total_burned,
                ledger.total_minted
            ));
        }
        if ledger.total_supply < 0 {
            return Err("total supply is negative".to_string());
        }
        Ok(())
    }

    /// Supply equals balances plus everything locked in sub-engines.
    fn check_supply_distribution(ledger: &Ledger) -> Result<(), String> {
        let balances: i128 = ledger.accounts.values().map(|a| a.balance).sum();
        let locked = ledger.engines.total_native_locked();
        if balances + locked != ledger.total_supply {
            return Err(format!(
                "supply mismatch: balances {} + locked {} != supply {}",
                balances, locked, ledger.total_supply
            ));
        }
        Ok(())
    }

    /// Touched accounts: no negative balance, monotone sequence, owner
    /// reserve held when the balance fell, owner count non-negative.
    fn check_touched_accounts(ledger: &Ledger, cp: &Checkpoint) -> Result<(), String> {
        for address in cp.accounts.keys() {
            let Some(account) = ledger.accounts.get(address) else {
                // Deleted this transaction; nothing left to check.
                continue;
            };
            if account.balance < 0 {
                return Err(format!("negative balance on {address}"));
            }
            if account.owner_count < 0 {
                return Err(format!("negative owner count on {address}"));
            }
            if let Some(pre_seq) = cp.pre_sequence(address) {
                if account.sequence < pre_seq {
                    return Err(format!(
                        "sequence decreased on {address}: {} -> {}",
                        pre_seq, account.sequence
                    ));
                }
            }
            let balance_fell = cp
                .pre_balance(address)
                .map(|pre| account.balance < pre)
                .unwrap_or(false);
            let ownership_reduced = cp
                .pre_owner_count(address)
                .map(|pre| account.owner_count < pre)
                .unwrap_or(false);
            if balance_fell && !ownership_reduced {
                let reserve = ledger.reserve_for(account.owner_count);
                if account.balance < reserve {
                    return Err(format!(
                        "balance {} below reserve {} on {address}",
                        account.balance, reserve
                    ));
                }
            }
        }
        Ok(())
    }

    /// No trust line above its limit on touched accounts.
    fn check_trust_line_limits(ledger: &Ledger, cp: &Checkpoint) -> Result<(), String> {
        for address in cp.accounts.keys() {
            let Some(account) = ledger.accounts.get(address) else {
                continue;
            };
            for ((currency, issuer), line) in &account.trust_lines {
                if line.balance > line.limit {
                    return Err(format!(
                        "trust line {currency}/{issuer} on {address}: balance {} above limit {}",
                        line.balance, line.limit
                    ));
                }
            }
        }
        Ok(())
    }
}

impl Ledger {
    /// Open a checkpoint capturing the supply counters.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            total_supply: self.total_supply,
            total_burned: self.total_burned,
            total_minted: self.total_minted,
            ..Checkpoint::default()
        }
    }

    /// Restore everything a checkpoint recorded, in sorted order.
    pub fn rollback(&mut self, cp: Checkpoint) {
        for (address, pre) in cp.accounts {
            match pre {
                Some(account) => {
                    self.accounts.insert(address, account);
                }
                None => {
                    self.accounts.remove(&address);
                }
            }
        }
        self.total_supply = cp.total_supply;
        self.total_burned = cp.total_burned;
        self.total_minted = cp.total_minted;
        if let Some(engines) = cp.engines {
            self.engines = *engines;
        }
        for key_image in &cp.added_key_images {
            self.spent_key_images.remove(key_image);
        }
        for stealth in &cp.added_outputs {
            self.confidential_outputs.remove(stealth);
        }
        if !cp.added_key_images.is_empty() || !cp.added_outputs.is_empty() {
            warn!(
                key_images = cp.added_key_images.len(),
                outputs = cp.added_outputs.len(),
                "rolled back confidential artifacts"
            );
        }
    }

    /// Checkpoint the sub-engines once per transaction.
    pub fn checkpoint_engines(&self, cp: &mut Checkpoint) {
        if cp.engines.is_none() {
            cp.engines = Some(Box::new(self.engines.clone()));
        }
    }

    /// Mutable account access that records the pre-image.
    pub fn account_mut(&mut self, cp: &mut Checkpoint, address: &str) -> Option<&mut Account> {
        cp.touch(address, self.accounts.get(address));
        self.accounts.get_mut(address)
    }

    /// Fetch-or-create an account, recording the pre-image.
    pub fn account_mut_or_create(&mut self, cp: &mut Checkpoint, address: &str) -> &mut Account {
        cp.touch(address, self.accounts.get(address));
        self.accounts
            .entry(address.to_string())
            .or_insert_with(|| Account::new(address))
    }

    /// Remove an account, recording the pre-image.
    pub fn remove_account(&mut self, cp: &mut Checkpoint, address: &str) -> Option<Account> {
        cp.touch(address, self.accounts.get(address));
        self.accounts.remove(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerParams;

    #[test]
    fn rollback_restores_accounts_and_counters() {
        let mut ledger = Ledger::new(LedgerParams::default());
        ledger.ensure_account_for_test("nAlice");
        ledger.accounts.get_mut("nAlice").unwrap().balance = 500;
        ledger.total_supply += 500;
        let snapshot_supply = ledger.total_supply;

        let mut cp = ledger.checkpoint();
        ledger.account_mut(&mut cp, "nAlice").unwrap().balance = 7;
        ledger.account_mut_or_create(&mut cp, "nGhost").balance = 3;
        ledger.total_supply -= 100;
        ledger.total_burned += 100;

        ledger.rollback(cp);
        assert_eq!(ledger.accounts["nAlice"].balance, 500);
        assert!(!ledger.accounts.contains_key("nGhost"));
        assert_eq!(ledger.total_supply, snapshot_supply);
        assert_eq!(ledger.total_burned, 0);
    }

    #[test]
    fn rollback_restores_engines_when_checkpointed() {
        let mut ledger = Ledger::new(LedgerParams::default());
        let mut cp = ledger.checkpoint();
        ledger.checkpoint_engines(&mut cp);
        ledger
            .engines
            .escrows
            .create("esc", "nA", "nB", 5, "", 0, 0, 0)
            .unwrap();
        assert_eq!(ledger.engines.escrows.total_locked(), 5);
        ledger.rollback(cp);
        assert_eq!(ledger.engines.escrows.total_locked(), 0);
    }

    #[test]
    fn supply_formula_check_catches_drift() {
        let mut ledger = Ledger::new(LedgerParams::default());
        let cp = ledger.checkpoint();
        ledger.total_supply += 1;
        assert!(InvariantChecker::verify(&ledger, &cp).is_err());
    }

    #[test]
    fn reserve_check_fires_only_when_balance_falls() {
        let params = LedgerParams::default();
        let reserve = params.base_reserve;
        let mut ledger = Ledger::new(params);

        // A new account credited below the reserve is fine.
        let mut cp = ledger.checkpoint();
        let account = ledger.account_mut_or_create(&mut cp, "nNew");
        account.balance = reserve / 2;
        ledger.total_supply += reserve / 2;
        ledger.total_minted += reserve / 2;
        assert!(InvariantChecker::verify(&ledger, &cp).is_ok());

        // The same account spending below the reserve is not.
        let mut cp = ledger.checkpoint();
        let account = ledger.account_mut(&mut cp, "nNew").unwrap();
        account.balance -= 1;
        ledger.total_supply -= 1;
        ledger.total_burned += 1;
        assert!(InvariantChecker::verify(&ledger, &cp).is_err());
    }
}
