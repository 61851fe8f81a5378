// Copyright (c) 2025 The Rivulet Project

//! On-ledger price oracles with median aggregation.

use std::collections::BTreeMap;

use riv_core_types::PriceEntry;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum price entries per document.
pub const MAX_PRICE_ENTRIES: usize = 10;
/// Maximum documents per owner.
pub const MAX_DOCUMENTS_PER_OWNER: usize = 100;

/// Why an oracle operation was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// Too many entries or documents.
    #[error("oracle limit exceeded")]
    LimitExceeded,
    /// No document with that id for this owner.
    #[error("oracle {0} not found")]
    NotFound(String),
}

/// A price document owned by an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Oracle {
    /// Owner address.
    pub owner: String,
    /// Document id under the owner.
    pub document_id: i64,
    /// Price entries.
    pub entries: Vec<PriceEntry>,
    /// Last update time.
    pub last_update: i64,
}

/// All oracles, keyed `owner:document_id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleManager {
    oracles: BTreeMap<String, Oracle>,
}

fn oracle_key(owner: &str, document_id: i64) -> String {
    format!("{owner}:{document_id}")
}

impl OracleManager {
    /// An empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or update a document. Returns whether it was created.
    pub fn set_oracle(
        &mut self,
        owner: &str,
        document_id: i64,
        entries: Vec<PriceEntry>,
        now: i64,
    ) -> Result<bool, OracleError> {
        if entries.is_empty() || entries.len() > MAX_PRICE_ENTRIES {
            return Err(OracleError::LimitExceeded);
        }
        let key = oracle_key(owner, document_id);
        let creating = !self.oracles.contains_key(&key);
        if creating && self.documents_for(owner).len() >= MAX_DOCUMENTS_PER_OWNER {
            return Err(OracleError::LimitExceeded);
        }
        self.oracles.insert(
            key,
            Oracle {
                owner: owner.to_string(),
                document_id,
                entries,
                last_update: now,
            },
        );
        Ok(creating)
    }

    /// Delete a document.
    pub fn delete_oracle(&mut self, owner: &str, document_id: i64) -> Result<(), OracleError> {
        let key = oracle_key(owner, document_id);
        self.oracles
            .remove(&key)
            .map(|_| ())
            .ok_or(OracleError::NotFound(key))
    }

    /// Look up a document.
    pub fn get(&self, owner: &str, document_id: i64) -> Option<&Oracle> {
        self.oracles.get(&oracle_key(owner, document_id))
    }

    /// All documents published by an owner.
    pub fn documents_for(&self, owner: &str) -> Vec<&Oracle> {
        self.oracles.values().filter(|o| o.owner == owner).collect()
    }

    /// Median price for a pair across all oracles. `None` without data.
    pub fn aggregate_price(&self, base: &str, quote: &str) -> Option<i128> {
        let mut prices: Vec<i128> = self
            .oracles
            .values()
            .flat_map(|o| o.entries.iter())
            .filter(|e| e.base_asset == base && e.quote_asset == quote)
            .map(|e| e.price)
            .collect();
        if prices.is_empty() {
            return None;
        }
        prices.sort_unstable();
        let mid = prices.len() / 2;
        Some(if prices.len() % 2 == 1 {
            prices[mid]
        } else {
            (prices[mid - 1] + prices[mid]) / 2
        })
    }
}
