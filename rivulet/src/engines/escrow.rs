// Copyright (c) 2025 The Rivulet Project

//! Escrows: native funds locked until a time or crypto-condition.

use std::collections::BTreeMap;

use riv_crypto_keys::hash256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an escrow operation was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EscrowError {
    /// No escrow with that id.
    #[error("escrow {0} not found")]
    NotFound(String),
    /// Already finished or cancelled.
    #[error("escrow {0} already resolved")]
    AlreadyResolved(String),
    /// finish_after has not passed yet.
    #[error("escrow cannot finish before {0}")]
    NotReady(i64),
    /// Past cancel_after; only cancel works now.
    #[error("escrow has expired")]
    Expired,
    /// The fulfillment does not hash to the condition.
    #[error("fulfillment does not match condition")]
    BadCondition,
    /// cancel_after is unset or has not passed.
    #[error("escrow cannot be cancelled yet")]
    NotCancellable,
    /// finish_after must precede cancel_after.
    #[error("finish_after must be before cancel_after")]
    BadTimeBounds,
}

/// A single escrow held on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowEntry {
    /// Unique id (= creating tx id).
    pub escrow_id: String,
    /// Creator and funder.
    pub account: String,
    /// Recipient on finish.
    pub destination: String,
    /// Locked native micro-units.
    pub amount: i128,
    /// `hash256` hex of the fulfillment; empty = unconditional.
    pub condition: String,
    /// Earliest finish time; 0 = immediately.
    pub finish_after: i64,
    /// Time after which only cancel works; 0 = never.
    pub cancel_after: i64,
    /// Creation time.
    pub create_time: i64,
    /// Resolved by finish.
    pub finished: bool,
    /// Resolved by cancel.
    pub cancelled: bool,
}

impl EscrowEntry {
    fn check_finish(&self, fulfillment: &str, now: i64) -> Result<(), EscrowError> {
        if self.finished || self.cancelled {
            return Err(EscrowError::AlreadyResolved(self.escrow_id.clone()));
        }
        if self.finish_after > 0 && now < self.finish_after {
            return Err(EscrowError::NotReady(self.finish_after));
        }
        if self.cancel_after > 0 && now >= self.cancel_after {
            return Err(EscrowError::Expired);
        }
        if !self.condition.is_empty() {
            let computed = hex::encode(hash256(fulfillment.as_bytes()));
            if fulfillment.is_empty() || computed != self.condition {
                return Err(EscrowError::BadCondition);
            }
        }
        Ok(())
    }

    fn check_cancel(&self, now: i64) -> Result<(), EscrowError> {
        if self.finished || self.cancelled {
            return Err(EscrowError::AlreadyResolved(self.escrow_id.clone()));
        }
        if self.cancel_after <= 0 || now < self.cancel_after {
            return Err(EscrowError::NotCancellable);
        }
        Ok(())
    }
}

/// All escrows on the ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EscrowManager {
    escrows: BTreeMap<String, EscrowEntry>,
}

impl EscrowManager {
    /// An empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and store a new escrow.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &mut self,
        escrow_id: &str,
        account: &str,
        destination: &str,
        amount: i128,
        condition: &str,
        finish_after: i64,
        cancel_after: i64,
        now: i64,
    ) -> Result<&EscrowEntry, EscrowError> {
        if cancel_after > 0 && finish_after > 0 && finish_after >= cancel_after {
            return Err(EscrowError::BadTimeBounds);
        }
        let entry = EscrowEntry {
            escrow_id: escrow_id.to_string(),
            account: account.to_string(),
            destination: destination.to_string(),
            amount,
            condition: condition.to_string(),
            finish_after,
            cancel_after,
            create_time: now,
            finished: false,
            cancelled: false,
        };
        Ok(self.escrows.entry(escrow_id.to_string()).or_insert(entry))
    }

    /// Finish an escrow; returns the entry for settlement.
    pub fn finish(
        &mut self,
        escrow_id: &str,
        fulfillment: &str,
        now: i64,
    ) -> Result<&EscrowEntry, EscrowError> {
        let entry = self
            .escrows
            .get_mut(escrow_id)
            .ok_or_else(|| EscrowError::NotFound(escrow_id.to_string()))?;
        entry.check_finish(fulfillment, now)?;
        entry.finished = true;
        Ok(entry)
    }

    /// Cancel an escrow; returns the entry for refund.
    pub fn cancel(&mut self, escrow_id: &str, now: i64) -> Result<&EscrowEntry, EscrowError> {
        let entry = self
            .escrows
            .get_mut(escrow_id)
            .ok_or_else(|| EscrowError::NotFound(escrow_id.to_string()))?;
        entry.check_cancel(now)?;
        entry.cancelled = true;
        Ok(entry)
    }

    /// Look up an escrow.
    pub fn get(&self, escrow_id: &str) -> Option<&EscrowEntry> {
        self.escrows.get(escrow_id)
    }

    /// Unresolved escrows for an account.
    pub fn for_account(&self, account: &str) -> Vec<&EscrowEntry> {
        self.escrows
            .values()
            .filter(|e| e.account == account && !e.finished && !e.cancelled)
            .collect()
    }

    /// Native micro-units currently locked.
    pub fn total_locked(&self) -> i128 {
        self.escrows
            .values()
            .filter(|e| !e.finished && !e.cancelled)
            .map(|e| e.amount)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with(
        condition: &str,
        finish_after: i64,
        cancel_after: i64,
    ) -> EscrowManager {
        let mut m = EscrowManager::new();
        m.create(
            "esc-1", "nAlice", "nBob", 500_000_000, condition, finish_after, cancel_after, 100,
        )
        .unwrap();
        m
    }

    #[test]
    fn unconditional_escrow_finishes_after_time() {
        let mut m = manager_with("", 1_000, 0);
        assert_eq!(
            m.finish("esc-1", "", 999).unwrap_err(),
            EscrowError::NotReady(1_000)
        );
        let entry = m.finish("esc-1", "", 1_000).unwrap();
        assert!(entry.finished);
        assert_eq!(m.total_locked(), 0);
    }

    #[test]
    fn condition_must_match() {
        let condition = hex::encode(hash256(b"open sesame"));
        let mut m = manager_with(&condition, 0, 0);
        assert_eq!(
            m.finish("esc-1", "wrong", 10).unwrap_err(),
            EscrowError::BadCondition
        );
        assert!(m.finish("esc-1", "open sesame", 10).is_ok());
    }

    #[test]
    fn cancel_only_after_cancel_after() {
        let mut m = manager_with("", 0, 2_000);
        assert_eq!(
            m.cancel("esc-1", 1_999).unwrap_err(),
            EscrowError::NotCancellable
        );
        assert!(m.cancel("esc-1", 2_000).is_ok());
        // Already resolved afterwards.
        assert!(matches!(
            m.finish("esc-1", "", 2_001).unwrap_err(),
            EscrowError::AlreadyResolved(_)
        ));
    }

    #[test]
    fn finish_blocked_past_cancel_after() {
        let mut m = manager_with("", 0, 2_000);
        assert_eq!(m.finish("esc-1", "", 2_500).unwrap_err(), EscrowError::Expired);
    }

    #[test]
    fn bad_time_bounds_rejected_at_create() {
        let mut m = EscrowManager::new();
        let err = m.create("e", "nA", "nB", 1, "", 300, 200, 0);
        assert_eq!(err.unwrap_err(), EscrowError::BadTimeBounds);
    }

    #[test]
    fn escrow_without_cancel_after_never_cancels() {
        let mut m = manager_with("", 0, 0);
        assert_eq!(
            m.cancel("esc-1", i64::MAX).unwrap_err(),
            EscrowError::NotCancellable
        );
    }
}
