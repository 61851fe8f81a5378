// Copyright (c) 2025 The Rivulet Project

//! Checks: deferred pull-payments cashed by the recipient.

use std::collections::BTreeMap;

use riv_core_types::Amount;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a check operation was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckError {
    /// No check with that id.
    #[error("check {0} not found")]
    NotFound(String),
    /// Already cashed or cancelled.
    #[error("check {0} already resolved")]
    AlreadyResolved(String),
    /// Past the expiration time.
    #[error("check {0} has expired")]
    Expired(String),
    /// The requested amount exceeds send_max.
    #[error("amount exceeds send_max")]
    ExceedsSendMax,
    /// The cashable amount is below deliver_min.
    #[error("amount below deliver_min")]
    BelowDeliverMin,
    /// Only the destination cashes; only the parties cancel.
    #[error("not permitted for this account")]
    NotPermitted,
}

/// A single check on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckEntry {
    /// Unique id (= creating tx id).
    pub check_id: String,
    /// Creator / payer.
    pub account: String,
    /// Authorized casher.
    pub destination: String,
    /// Maximum the creator authorizes (value + currency + issuer).
    pub send_max: Amount,
    /// Expiration; 0 = never.
    pub expiration: i64,
    /// Creation time.
    pub create_time: i64,
    /// Resolved by cashing.
    pub cashed: bool,
    /// Resolved by cancellation.
    pub cancelled: bool,
    /// Micro-units actually cashed.
    pub cashed_amount: i128,
}

/// All checks on the ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckManager {
    checks: BTreeMap<String, CheckEntry>,
}

impl CheckManager {
    /// An empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and store a new check.
    pub fn create(
        &mut self,
        check_id: &str,
        account: &str,
        destination: &str,
        send_max: Amount,
        expiration: i64,
        now: i64,
    ) -> &CheckEntry {
        let entry = CheckEntry {
            check_id: check_id.to_string(),
            account: account.to_string(),
            destination: destination.to_string(),
            send_max,
            expiration,
            create_time: now,
            cashed: false,
            cancelled: false,
            cashed_amount: 0,
        };
        self.checks.entry(check_id.to_string()).or_insert(entry)
    }

    /// Cash a check. `amount == 0` cashes the full send_max. Returns
    /// the entry and the micro-units to transfer.
    pub fn cash(
        &mut self,
        check_id: &str,
        casher: &str,
        amount: i128,
        deliver_min: i128,
        now: i64,
    ) -> Result<(&CheckEntry, i128), CheckError> {
        let entry = self
            .checks
            .get_mut(check_id)
            .ok_or_else(|| CheckError::NotFound(check_id.to_string()))?;
        if entry.cashed || entry.cancelled {
            return Err(CheckError::AlreadyResolved(check_id.to_string()));
        }
        if entry.destination != casher {
            return Err(CheckError::NotPermitted);
        }
        if entry.expiration > 0 && now >= entry.expiration {
            return Err(CheckError::Expired(check_id.to_string()));
        }
        let cash_amount = if amount > 0 { amount } else { entry.send_max.value };
        if cash_amount > entry.send_max.value {
            return Err(CheckError::ExceedsSendMax);
        }
        if deliver_min > 0 && cash_amount < deliver_min {
            return Err(CheckError::BelowDeliverMin);
        }
        entry.cashed = true;
        entry.cashed_amount = cash_amount;
        Ok((entry, cash_amount))
    }

    /// Cancel a check. Either party may cancel; anyone may cancel an
    /// expired check.
    pub fn cancel(
        &mut self,
        check_id: &str,
        requester: &str,
        now: i64,
    ) -> Result<&CheckEntry, CheckError> {
        let entry = self
            .checks
            .get_mut(check_id)
            .ok_or_else(|| CheckError::NotFound(check_id.to_string()))?;
        if entry.cashed || entry.cancelled {
            return Err(CheckError::AlreadyResolved(check_id.to_string()));
        }
        let expired = entry.expiration > 0 && now >= entry.expiration;
        if requester != entry.account && requester != entry.destination && !expired {
            return Err(CheckError::NotPermitted);
        }
        entry.cancelled = true;
        Ok(entry)
    }

    /// Look up a check.
    pub fn get(&self, check_id: &str) -> Option<&CheckEntry> {
        self.checks.get(check_id)
    }

    /// Unresolved checks involving an account.
    pub fn for_account(&self, account: &str) -> Vec<&CheckEntry> {
        self.checks
            .values()
            .filter(|c| {
                (c.account == account || c.destination == account) && !c.cashed && !c.cancelled
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> CheckManager {
        let mut m = CheckManager::new();
        m.create(
            "chk-1",
            "nAlice",
            "nBob",
            Amount::native(500_000),
            1_000,
            10,
        );
        m
    }

    #[test]
    fn destination_cashes_within_bounds() {
        let mut m = manager();
        let (_, cashed) = m.cash("chk-1", "nBob", 200_000, 0, 100).unwrap();
        assert_eq!(cashed, 200_000);
        assert!(matches!(
            m.cash("chk-1", "nBob", 1, 0, 100).unwrap_err(),
            CheckError::AlreadyResolved(_)
        ));
    }

    #[test]
    fn zero_amount_cashes_the_full_send_max() {
        let mut m = manager();
        let (_, cashed) = m.cash("chk-1", "nBob", 0, 0, 100).unwrap();
        assert_eq!(cashed, 500_000);
    }

    #[test]
    fn bounds_are_enforced() {
        let mut m = manager();
        assert_eq!(
            m.cash("chk-1", "nBob", 600_000, 0, 100).unwrap_err(),
            CheckError::ExceedsSendMax
        );
        assert_eq!(
            m.cash("chk-1", "nBob", 100_000, 200_000, 100).unwrap_err(),
            CheckError::BelowDeliverMin
        );
    }

    #[test]
    fn only_the_destination_cashes() {
        let mut m = manager();
        assert_eq!(
            m.cash("chk-1", "nMallory", 1, 0, 100).unwrap_err(),
            CheckError::NotPermitted
        );
    }

    #[test]
    fn expiry_blocks_cashing_but_frees_cancelling() {
        let mut m = manager();
        assert!(matches!(
            m.cash("chk-1", "nBob", 1, 0, 1_000).unwrap_err(),
            CheckError::Expired(_)
        ));
        // A stranger can sweep an expired check.
        assert!(m.cancel("chk-1", "nMallory", 1_000).is_ok());
    }

    #[test]
    fn parties_can_cancel_any_time() {
        let mut m = manager();
        assert!(m.cancel("chk-1", "nAlice", 100).is_ok());
        let mut m = manager();
        assert!(m.cancel("chk-1", "nBob", 100).is_ok());
        let mut m = manager();
        assert_eq!(
            m.cancel("chk-1", "nMallory", 100).unwrap_err(),
            CheckError::NotPermitted
        );
    }
}
