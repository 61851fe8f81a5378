// Copyright (c) 2025 The Rivulet Project

//! Pending-transaction pool with fee escalation.
//!
//! Admission charges the *open-ledger cost*: the base fee while the
//! open set is under the per-ledger target, then a quadratically
//! escalating multiple of it. Transactions that cannot pay the
//! escalated cost are queued and drain into the open set, best fee
//! first, when a ledger closes.

use std::collections::BTreeMap;

use riv_core_types::Transaction;
use thiserror::Error;
use tracing::debug;

/// Default target transactions per ledger before escalation.
pub const DEFAULT_TARGET_PER_LEDGER: usize = 25;
/// Default queue bound.
pub const DEFAULT_MAX_QUEUE: usize = 2_000;
/// Age in seconds after which a pooled transaction is evicted.
pub const MAX_TX_AGE_SECS: i64 = 3_600;

/// Why a submission was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MempoolError {
    /// Already pooled or queued.
    #[error("transaction already known")]
    Duplicate,
    /// Below the unescalated minimum fee.
    #[error("fee below minimum {0}")]
    BelowMinFee(i128),
    /// Below the escalated open-ledger cost and the queue is full.
    #[error("queue full")]
    QueueFull,
}

/// Where a submission landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Straight into the open set.
    Open,
    /// Queued behind the escalated fee.
    Queued,
}

/// The pending pool.
#[derive(Debug, Default)]
pub struct Mempool {
    open: BTreeMap<String, Transaction>,
    queued: BTreeMap<String, Transaction>,
    target_per_ledger: usize,
    max_queue: usize,
}

impl Mempool {
    /// A pool with default limits.
    pub fn new() -> Self {
        Self {
            open: BTreeMap::new(),
            queued: BTreeMap::new(),
            target_per_ledger: DEFAULT_TARGET_PER_LEDGER,
            max_queue: DEFAULT_MAX_QUEUE,
        }
    }

    /// Open-set size.
    pub fn len(&self) -> usize {
        self.open.len()
    }

    /// Whether the open set is empty.
    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Queued count.
    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    /// The fee a new submission must pay right now: the base fee until
    /// the open set hits the target, then base times the square of the
    /// fill ratio.
    pub fn open_ledger_cost(&self, base_fee: i128) -> i128 {
        let count = self.open.len();
        if count < self.target_per_ledger {
            return base_fee;
        }
        let ratio = (count + 1) as i128;
        let target = self.target_per_ledger as i128;
        let numerator = base_fee * ratio * ratio;
        let denominator = target * target;
        (numerator + denominator - 1) / denominator
    }

    /// Submit a transaction.
    pub fn submit(&mut self, tx: Transaction, base_fee: i128) -> Result<Admission, MempoolError> {
        let tx_id = tx.tx_id();
        if self.open.contains_key(&tx_id) || self.queued.contains_key(&tx_id) {
            return Err(MempoolError::Duplicate);
        }
        let fee = tx.header.fee.value;
        if fee < base_fee {
            return Err(MempoolError::BelowMinFee(base_fee));
        }
        if fee >= self.open_ledger_cost(base_fee) {
            debug!(tx_id = %tx_id, "admitted to open pool");
            self.open.insert(tx_id, tx);
            return Ok(Admission::Open);
        }
        if self.queued.len() >= self.max_queue {
            return Err(MempoolError::QueueFull);
        }
        debug!(tx_id = %tx_id, "queued behind escalated fee");
        self.queued.insert(tx_id, tx);
        Ok(Admission::Queued)
    }

    /// Transaction ids for the next proposal, best fee first with the
    /// id as the deterministic tiebreak.
    pub fn proposal_set(&self, max: usize) -> Vec<String> {
        let mut ids: Vec<(&String, i128)> = self
            .open
            .iter()
            .map(|(id, tx)| (id, tx.header.fee.value))
            .collect();
        ids.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ids.into_iter().take(max).map(|(id, _)| id.clone()).collect()
    }

    /// Look up a pooled transaction.
    pub fn get(&self, tx_id: &str) -> Option<&Transaction> {
        self.open.get(tx_id)
    }

    /// Remove a transaction wherever it sits.
    pub fn remove(&mut self, tx_id: &str) -> Option<Transaction> {
        self.open.remove(tx_id).or_else(|| self.queued.remove(tx_id))
    }

    /// Drop transactions that were applied in a closed ledger, then
    /// drain the queue, best fee first, into the freed open set.
    pub fn on_ledger_close(&mut self, applied: impl IntoIterator<Item = String>) {
        for tx_id in applied {
            self.remove(&tx_id);
        }
        let mut waiting: Vec<(String, i128)> = self
            .queued
            .iter()
            .map(|(id, tx)| (id.clone(), tx.header.fee.value))
            .collect();
        waiting.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        for (tx_id, _) in waiting {
            if self.open.len() >= self.target_per_ledger {
                break;
            }
            if let Some(tx) = self.queued.remove(&tx_id) {
                self.open.insert(tx_id, tx);
            }
        }
    }

    /// Evict transactions older than the age bound.
    pub fn evict_stale(&mut self, now: i64) {
        let cutoff = now - MAX_TX_AGE_SECS;
        self.open.retain(|_, tx| tx.header.timestamp >= cutoff);
        self.queued.retain(|_, tx| tx.header.timestamp >= cutoff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riv_core_types::Amount;

    fn payment(n: i64, fee: i128) -> Transaction {
        Transaction::payment(
            "nAlice",
            "nBob",
            Amount::native_units(1),
            Amount::native(fee),
            n,
            1_000,
        )
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut pool = Mempool::new();
        pool.submit(payment(1, 10), 10).unwrap();
        assert_eq!(
            pool.submit(payment(1, 10), 10).unwrap_err(),
            MempoolError::Duplicate
        );
    }

    #[test]
    fn below_minimum_fee_is_rejected() {
        let mut pool = Mempool::new();
        assert_eq!(
            pool.submit(payment(1, 5), 10).unwrap_err(),
            MempoolError::BelowMinFee(10)
        );
    }

    #[test]
    fn cost_escalates_past_the_target() {
        let mut pool = Mempool::new();
        assert_eq!(pool.open_ledger_cost(10), 10);
        for n in 0..DEFAULT_TARGET_PER_LEDGER {
            pool.submit(payment(n as i64, 100_000), 10).unwrap();
        }
        // (26/25)^2 of the base fee, integer math.
        assert!(pool.open_ledger_cost(10) > 10);
    }

    #[test]
    fn cheap_transactions_queue_and_drain_on_close() {
        let mut pool = Mempool::new();
        for n in 0..DEFAULT_TARGET_PER_LEDGER {
            pool.submit(payment(n as i64, 1_000), 10).unwrap();
        }
        let admission = pool.submit(payment(999, 10), 10).unwrap();
        assert_eq!(admission, Admission::Queued);
        assert_eq!(pool.queued_len(), 1);

        let applied = pool.proposal_set(100);
        pool.on_ledger_close(applied);
        assert_eq!(pool.queued_len(), 0);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn proposal_set_orders_by_fee_then_id() {
        let mut pool = Mempool::new();
        pool.submit(payment(1, 10), 10).unwrap();
        pool.submit(payment(2, 500), 10).unwrap();
        pool.submit(payment(3, 50), 10).unwrap();
        let set = pool.proposal_set(2);
        assert_eq!(set.len(), 2);
        assert_eq!(pool.get(&set[0]).unwrap().header.fee.value, 500);
        assert_eq!(pool.get(&set[1]).unwrap().header.fee.value, 50);
    }

    #[test]
    fn stale_transactions_are_evicted() {
        let mut pool = Mempool::new();
        pool.submit(payment(1, 10), 10).unwrap();
        pool.evict_stale(1_000 + MAX_TX_AGE_SECS + 1);
        assert!(pool.is_empty());
    }
}
