// Copyright (c) 2025 The Rivulet Project

//! The validator node: boundary validation, the mempool, the consensus
//! cycle, and recovery through the byte store.
//!
//! The node owns the ledger exclusively. External collaborators submit
//! decoded transactions through [`ValidatorNode::receive_transaction`]
//! and read state through the snapshot queries; all mutation funnels
//! through the apply/close path on this task.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use riv_core_types::{ResultCode, Transaction};
use riv_crypto_keys::{PrivateKey, PublicKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::consensus::{
    ConsensusConfig, ConsensusEngine, ConsensusResult, Proposal, RoundDriver,
};
use crate::ledger::{Ledger, StateSummary};
use crate::mempool::Mempool;
use crate::storage::{header_key, Store, SNAPSHOT_KEY};

/// Why a transaction was refused at the boundary, before the state
/// machine ever saw it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// Structural problem in the decoded transaction.
    #[error("malformed transaction: {0}")]
    Malformed(String),
    /// The attached signature does not verify.
    #[error("invalid signature")]
    BadSignature,
    /// The mempool refused it.
    #[error("mempool: {0}")]
    Mempool(String),
}

/// Node status for operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatus {
    /// Validator id.
    pub node_id: String,
    /// UNL size (excluding self).
    pub unl_size: usize,
    /// Open pool size.
    pub mempool: usize,
    /// Ledger summary.
    pub ledger: StateSummary,
}

/// A single validator node.
pub struct ValidatorNode {
    /// The owned ledger.
    pub ledger: Ledger,
    /// Pending pool.
    pub mempool: Mempool,
    my_id: String,
    my_key: Option<PrivateKey>,
    unl: Vec<String>,
    unl_pubkeys: BTreeMap<String, PublicKey>,
    consensus_config: ConsensusConfig,
    round_timeout: Duration,
    store: Box<dyn Store>,
}

impl ValidatorNode {
    /// Build a node from config, recovering state from the store when a
    /// snapshot exists.
    pub fn new(config: &Config, mut store: Box<dyn Store>) -> Result<Self> {
        let params = config.ledger.to_params()?;
        let ledger = match store.get(SNAPSHOT_KEY)? {
            Some(bytes) => {
                let ledger: Ledger =
                    bincode::deserialize(&bytes).context("corrupt state snapshot")?;
                info!(
                    seq = ledger.current_sequence,
                    closed = ledger.closed_ledgers.len(),
                    "recovered ledger from store"
                );
                ledger
            }
            None => Ledger::new(params),
        };

        let my_key = if config.node.key_seed.is_empty() {
            None
        } else {
            Some(PrivateKey::from_bytes(&riv_crypto_keys::hash256(
                config.node.key_seed.as_bytes(),
            ))?)
        };

        let mut unl = Vec::new();
        let mut unl_pubkeys = BTreeMap::new();
        for validator in &config.consensus.validators {
            unl.push(validator.id.clone());
            if !validator.pubkey.is_empty() {
                let pubkey = PublicKey::from_hex(&validator.pubkey)
                    .map_err(|e| anyhow::anyhow!("bad pubkey for {}: {e}", validator.id))?;
                unl_pubkeys.insert(validator.id.clone(), pubkey);
            }
        }

        Ok(Self {
            ledger,
            mempool: Mempool::new(),
            my_id: config.node.id.clone(),
            my_key,
            unl,
            unl_pubkeys,
            consensus_config: config.consensus.to_engine_config(),
            round_timeout: Duration::from_millis(config.consensus.round_timeout_ms),
            store,
        })
    }

    /// This node's validator id.
    pub fn node_id(&self) -> &str {
        &self.my_id
    }

    /// The validator signing key's public half, when configured.
    pub fn validator_pubkey(&self) -> Option<PublicKey> {
        self.my_key.as_ref().map(|k| k.public_key())
    }

    /// Boundary entry point: validate and pool a decoded transaction.
    ///
    /// Malformed input and bad signatures are rejected here; decode
    /// failures never reach the state machine.
    pub fn receive_transaction(&mut self, tx: Transaction) -> Result<String, SubmitError> {
        if tx.header.account.is_empty() {
            return Err(SubmitError::Malformed("missing account".to_string()));
        }
        if tx.header.fee.value < 0 || tx.header.amount.value < 0 {
            return Err(SubmitError::Malformed("negative amount".to_string()));
        }
        // Confidential payments authenticate through their ring
        // signature inside the state machine; anything else carrying a
        // signature must verify against the canonical preimage.
        let has_signature = !tx.signature.is_empty() || !tx.signing_pubkey.is_empty();
        if has_signature && !tx.verify_signature() {
            return Err(SubmitError::BadSignature);
        }
        let tx_id = tx.tx_id();
        self.mempool
            .submit(tx, self.ledger.params.min_fee)
            .map_err(|e| SubmitError::Mempool(e.to_string()))?;
        Ok(tx_id)
    }

    /// A fresh consensus engine for the open ledger sequence.
    pub fn new_engine(&self) -> ConsensusEngine {
        ConsensusEngine::new(
            &self.my_id,
            self.my_key.clone(),
            self.unl.clone(),
            self.unl_pubkeys.clone(),
            self.ledger.current_sequence,
            self.consensus_config.clone(),
        )
    }

    /// Our signed proposal over the current pool.
    pub fn create_proposal(&self) -> Proposal {
        let mut proposal = Proposal::new(
            &self.my_id,
            self.ledger.current_sequence,
            0,
            self.mempool.proposal_set(usize::MAX).into_iter().collect(),
        );
        if let Some(key) = &self.my_key {
            proposal.sign(key);
        }
        proposal
    }

    /// Run one consensus cycle: propose the pool, drive rounds against
    /// incoming proposals, and on agreement apply the result and close.
    pub async fn run_consensus_cycle(
        &mut self,
        proposals: &mut mpsc::Receiver<Proposal>,
        cancel: &CancellationToken,
        close_time: i64,
    ) -> Result<Option<ConsensusResult>> {
        let mut engine = self.new_engine();
        engine.submit_transactions(self.mempool.proposal_set(usize::MAX));
        let mut driver = RoundDriver::new(engine, self.round_timeout);
        let result = driver.run(proposals, cancel).await;

        if let Some(result) = &result {
            self.apply_consensus_result(result, close_time)?;
        }
        Ok(result)
    }

    /// Apply an agreed transaction set and close the ledger.
    ///
    /// Transactions apply in canonical `(tx_type, account, sequence,
    /// tx_id)` order, which is what makes the resulting roots identical
    /// across validators regardless of arrival order.
    pub fn apply_consensus_result(
        &mut self,
        result: &ConsensusResult,
        close_time: i64,
    ) -> Result<usize> {
        let mut agreed: Vec<Transaction> = result
            .agreed_tx_ids
            .iter()
            .filter_map(|tx_id| self.mempool.get(tx_id).cloned())
            .collect();
        agreed.sort_by_cached_key(|tx| tx.canonical_key());

        let mut applied = 0;
        for tx in &agreed {
            let code = self.ledger.apply(tx);
            if code == ResultCode::Success {
                applied += 1;
            } else {
                warn!(tx_id = %tx.tx_id(), code = code.name(), "agreed tx failed to apply");
            }
        }

        self.ledger
            .tally_amendments(self.unl.len() + 1)
            .iter()
            .for_each(|name| info!(amendment = %name, "amendment enabled"));

        let header = self.ledger.close_ledger(close_time);
        self.mempool
            .on_ledger_close(result.agreed_tx_ids.iter().cloned());
        self.persist(&header.sequence)?;
        Ok(applied)
    }

    fn persist(&mut self, closed_seq: &i64) -> Result<()> {
        if let Some(header) = self.ledger.closed_ledgers.last() {
            self.store.put(
                &header_key(*closed_seq),
                &bincode::serialize(header).context("serialize header")?,
            )?;
        }
        self.store.put(
            SNAPSHOT_KEY,
            &bincode::serialize(&self.ledger).context("serialize snapshot")?,
        )?;
        Ok(())
    }

    /// Operator status.
    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            node_id: self.my_id.clone(),
            unl_size: self.unl.len(),
            mempool: self.mempool.len(),
            ledger: self.ledger.get_state_summary(),
        }
    }
}
