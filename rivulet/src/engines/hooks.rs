// Copyright (c) 2025 The Rivulet Project

//! Account hooks: declarative guard rules evaluated before a sending
//! account's transactions apply.
//!
//! Hooks here are data, not code: a rule either caps payment size,
//! restricts destinations, or denies transaction types. Each account
//! has four slots.

use std::collections::BTreeMap;

use riv_core_types::{HookRule, Transaction, TxBody};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hook slots per account.
pub const MAX_HOOKS_PER_ACCOUNT: usize = 4;

/// Why installing a hook failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HookError {
    /// Slot index outside `0..4`.
    #[error("hook position out of range")]
    BadPosition,
}

/// Outcome of evaluating the hooks on a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookVerdict {
    /// All installed rules passed.
    Accept,
    /// A rule rejected the transaction.
    Reject {
        /// Slot of the rejecting rule.
        position: usize,
        /// Human-readable reason.
        reason: String,
    },
}

/// All installed hooks, keyed by account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HooksManager {
    hooks: BTreeMap<String, Vec<Option<HookRule>>>,
}

impl HooksManager {
    /// An empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or clear a rule at a slot. Returns the previous rule.
    pub fn set_hook(
        &mut self,
        account: &str,
        position: usize,
        rule: Option<HookRule>,
    ) -> Result<Option<HookRule>, HookError> {
        if position >= MAX_HOOKS_PER_ACCOUNT {
            return Err(HookError::BadPosition);
        }
        let slots = self
            .hooks
            .entry(account.to_string())
            .or_insert_with(|| vec![None; MAX_HOOKS_PER_ACCOUNT]);
        let previous = slots[position].take();
        slots[position] = rule;
        if slots.iter().all(Option::is_none) {
            self.hooks.remove(account);
        }
        Ok(previous)
    }

    /// Installed rules for an account, in slot order.
    pub fn hooks_for(&self, account: &str) -> Vec<(usize, &HookRule)> {
        self.hooks
            .get(account)
            .map(|slots| {
                slots
                    .iter()
                    .enumerate()
                    .filter_map(|(i, r)| r.as_ref().map(|r| (i, r)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of occupied slots for an account.
    pub fn count_for(&self, account: &str) -> usize {
        self.hooks_for(account).len()
    }

    /// Evaluate the sender's hooks against a transaction.
    pub fn evaluate(&self, sender: &str, tx: &Transaction) -> HookVerdict {
        for (position, rule) in self.hooks_for(sender) {
            match rule {
                HookRule::MaxAmount { limit } => {
                    if matches!(tx.body, TxBody::Payment { .. })
                        && tx.header.amount.value > *limit
                    {
                        return HookVerdict::Reject {
                            position,
                            reason: format!("payment exceeds hook limit {limit}"),
                        };
                    }
                }
                HookRule::DestinationAllowList { allowed } => {
                    if matches!(tx.body, TxBody::Payment { .. })
                        && !allowed.contains(&tx.header.destination)
                    {
                        return HookVerdict::Reject {
                            position,
                            reason: format!(
                                "destination {} not on allow list",
                                tx.header.destination
                            ),
                        };
                    }
                }
                HookRule::TypeDenyList { denied } => {
                    if denied.contains(&tx.tx_type()) {
                        return HookVerdict::Reject {
                            position,
                            reason: format!("tx type {} denied by hook", tx.tx_type()),
                        };
                    }
                }
            }
        }
        HookVerdict::Accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riv_core_types::Amount;

    fn payment(to: &str, units: i128) -> Transaction {
        Transaction::payment(
            "nSender",
            to,
            Amount::native_units(units),
            Amount::native(10),
            1,
            0,
        )
    }

    #[test]
    fn max_amount_rule_caps_payments() {
        let mut m = HooksManager::new();
        m.set_hook(
            "nSender",
            0,
            Some(HookRule::MaxAmount { limit: 5_000_000 }),
        )
        .unwrap();
        assert_eq!(m.evaluate("nSender", &payment("nBob", 5)), HookVerdict::Accept);
        assert!(matches!(
            m.evaluate("nSender", &payment("nBob", 6)),
            HookVerdict::Reject { position: 0, .. }
        ));
        // Other senders are unaffected.
        assert_eq!(m.evaluate("nOther", &payment("nBob", 6)), HookVerdict::Accept);
    }

    #[test]
    fn allow_list_rule() {
        let mut m = HooksManager::new();
        m.set_hook(
            "nSender",
            1,
            Some(HookRule::DestinationAllowList {
                allowed: vec!["nBob".into()],
            }),
        )
        .unwrap();
        assert_eq!(m.evaluate("nSender", &payment("nBob", 1)), HookVerdict::Accept);
        assert!(matches!(
            m.evaluate("nSender", &payment("nEve", 1)),
            HookVerdict::Reject { position: 1, .. }
        ));
    }

    #[test]
    fn type_deny_list_blocks_whole_families() {
        let mut m = HooksManager::new();
        m.set_hook(
            "nSender",
            0,
            Some(HookRule::TypeDenyList { denied: vec![0] }),
        )
        .unwrap();
        assert!(matches!(
            m.evaluate("nSender", &payment("nBob", 1)),
            HookVerdict::Reject { .. }
        ));
    }

    #[test]
    fn clearing_the_last_slot_removes_the_account() {
        let mut m = HooksManager::new();
        m.set_hook("nSender", 0, Some(HookRule::MaxAmount { limit: 1 }))
            .unwrap();
        assert_eq!(m.count_for("nSender"), 1);
        let previous = m.set_hook("nSender", 0, None).unwrap();
        assert!(previous.is_some());
        assert_eq!(m.count_for("nSender"), 0);
    }

    #[test]
    fn position_bounds() {
        let mut m = HooksManager::new();
        assert_eq!(
            m.set_hook("nSender", 4, None).unwrap_err(),
            HookError::BadPosition
        );
    }
}
