// Copyright (c) 2025 The Rivulet Project

//! Async round driver for the consensus engine.
//!
//! The engine itself is synchronous and deterministic; this driver owns
//! the only suspension points of the node: waiting for proposals to
//! arrive between rounds, per-round wall-clock budgets, and the single
//! cancellation signal. Cancellation aborts the current wait and
//! returns the best result available, or nothing.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::engine::{ConsensusEngine, ConsensusResult, Proposal};

/// Default wall-clock budget per voting round.
pub const DEFAULT_ROUND_TIMEOUT: Duration = Duration::from_secs(2);

/// Drives an engine through its rounds while feeding it proposals.
pub struct RoundDriver {
    engine: ConsensusEngine,
    round_timeout: Duration,
}

impl RoundDriver {
    /// Wrap an engine with a per-round timeout.
    pub fn new(engine: ConsensusEngine, round_timeout: Duration) -> Self {
        Self {
            engine,
            round_timeout,
        }
    }

    /// Access the wrapped engine.
    pub fn engine(&self) -> &ConsensusEngine {
        &self.engine
    }

    /// Run rounds until agreement, exhaustion or cancellation.
    ///
    /// Proposals arriving on `proposals` are registered in arrival
    /// order. Each round waits out its budget (or the channel closing)
    /// before tallying, then proceeds with whatever arrived.
    pub async fn run(
        &mut self,
        proposals: &mut mpsc::Receiver<Proposal>,
        cancel: &CancellationToken,
    ) -> Option<ConsensusResult> {
        loop {
            let deadline = Instant::now() + self.round_timeout;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!(seq = self.engine.ledger_seq, "consensus cancelled");
                        return self.engine.final_pass();
                    }
                    _ = sleep_until(deadline) => break,
                    incoming = proposals.recv() => match incoming {
                        Some(proposal) => {
                            let accepted = self.engine.add_proposal(proposal);
                            debug!(accepted, "proposal received");
                        }
                        // Ingress gone: stop waiting, tally what we have.
                        None => break,
                    },
                }
            }
            match self.engine.step_round() {
                Some(result) => {
                    info!(
                        seq = result.ledger_seq,
                        rounds = result.rounds_used,
                        agreed = result.agreed_tx_ids.len(),
                        byzantine = result.byzantine_count,
                        "consensus reached"
                    );
                    return Some(result);
                }
                None => {
                    if self.engine.rounds_exhausted() {
                        return self.engine.final_pass();
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::engine::ConsensusConfig;
    use std::collections::{BTreeMap, BTreeSet};

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn driver() -> RoundDriver {
        let mut engine = ConsensusEngine::new(
            "v1",
            None,
            vec!["v2".to_string(), "v3".to_string()],
            BTreeMap::new(),
            1,
            ConsensusConfig::default(),
        );
        engine.submit_transactions(["tx1".to_string()]);
        RoundDriver::new(engine, Duration::from_millis(10))
    }

    #[tokio::test]
    async fn proposals_arriving_mid_round_are_counted() {
        let mut driver = driver();
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        tx.send(Proposal::new("v2", 1, 0, set(&["tx1"]))).await.unwrap();
        tx.send(Proposal::new("v3", 1, 0, set(&["tx1"]))).await.unwrap();
        drop(tx);

        let result = driver.run(&mut rx, &cancel).await.expect("consensus");
        assert!(result.agreed_tx_ids.contains("tx1"));
    }

    #[tokio::test]
    async fn cancellation_returns_best_effort() {
        let mut driver = driver();
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        tx.send(Proposal::new("v2", 1, 0, set(&["tx1"]))).await.unwrap();
        tx.send(Proposal::new("v3", 1, 0, set(&["tx1"]))).await.unwrap();
        cancel.cancel();

        // Unanimity means even the cancelled path can hand back the
        // final-threshold tally.
        let result = driver.run(&mut rx, &cancel).await;
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn silence_fails_consensus() {
        let mut driver = driver();
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        drop(tx);
        // Only our own proposal: 1 of 3 never reaches 80 %.
        assert!(driver.run(&mut rx, &cancel).await.is_none());
    }
}
