// Copyright (c) 2025 The Rivulet Project

//! Per-transaction metadata: affected ledger entries, balance changes
//! and the delivered amount, stored alongside the applied transaction.

use riv_core_types::ResultCode;
use serde::{Deserialize, Serialize};

/// How a ledger entry was affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeAction {
    /// The entry was created.
    Created,
    /// The entry was modified.
    Modified,
    /// The entry was deleted.
    Deleted,
}

/// A single affected ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedNode {
    /// What happened to it.
    pub action: NodeAction,
    /// Entry kind, e.g. `"AccountRoot"`.
    pub entry_type: String,
    /// Entry identifier (address, object id, ...).
    pub ledger_index: String,
}

/// Native balance delta for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    /// Account address.
    pub account: String,
    /// Balance before the transaction, micro-units.
    pub previous_balance: i128,
    /// Balance after, micro-units.
    pub final_balance: i128,
}

impl BalanceChange {
    /// Signed delta.
    pub fn delta(&self) -> i128 {
        self.final_balance - self.previous_balance
    }
}

/// Full metadata record for one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxMetadata {
    /// Transaction id.
    pub tx_id: String,
    /// Index within the open ledger.
    pub tx_index: usize,
    /// Transaction type name.
    pub tx_type: String,
    /// Numeric result code.
    pub result_code: i32,
    /// Result name, e.g. `"tecUNFUNDED"`.
    pub result_name: String,
    /// Best-effort diagnostic for failures.
    pub message: String,
    /// Affected ledger entries.
    pub affected_nodes: Vec<AffectedNode>,
    /// Native balance changes of touched accounts.
    pub balance_changes: Vec<BalanceChange>,
    /// Amount actually delivered, when the type delivers value.
    pub delivered_amount: Option<i128>,
}

impl TxMetadata {
    /// Build a record for a result.
    pub fn new(tx_id: &str, tx_index: usize, tx_type: &str, result: ResultCode) -> Self {
        Self {
            tx_id: tx_id.to_string(),
            tx_index,
            tx_type: tx_type.to_string(),
            result_code: result.code(),
            result_name: result.name().to_string(),
            message: String::new(),
            affected_nodes: Vec::new(),
            balance_changes: Vec::new(),
            delivered_amount: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_carries_code_and_name() {
        let meta = TxMetadata::new("abc", 2, "Payment", ResultCode::Unfunded);
        assert_eq!(meta.result_code, 101);
        assert_eq!(meta.result_name, "tecUNFUNDED");
        assert_eq!(meta.tx_index, 2);
    }

    #[test]
    fn balance_change_delta() {
        let change = BalanceChange {
            account: "nA".into(),
            previous_balance: 10,
            final_balance: 4,
        };
        assert_eq!(change.delta(), -6);
    }
}
