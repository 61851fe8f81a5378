// Copyright (c) 2025 The Rivulet Project

//! Multi-validator consensus scenarios, including the equivocation
//! quarantine and cross-node agreement safety.

use std::collections::{BTreeMap, BTreeSet};

use riv_core_types::{Amount, Transaction};
use rivulet::consensus::{ConsensusConfig, ConsensusEngine, Proposal};

fn set(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

fn engine_for(my_id: &str, all: &[&str]) -> ConsensusEngine {
    let unl: Vec<String> = all
        .iter()
        .filter(|v| **v != my_id)
        .map(|v| v.to_string())
        .collect();
    ConsensusEngine::new(
        my_id,
        None,
        unl,
        BTreeMap::new(),
        7,
        ConsensusConfig::default(),
    )
}

#[test]
fn equivocator_is_quarantined_and_consensus_proceeds() {
    // UNL = {v1..v4}; v2 sends two different proposals for the same
    // (seq, round).
    let validators = ["v1", "v2", "v3", "v4"];
    let mut engine = engine_for("v1", &validators);
    engine.submit_transactions(["tx1".to_string()]);

    assert!(engine.add_proposal(Proposal::new("v2", 7, 0, set(&["tx1"]))));
    assert!(!engine.add_proposal(Proposal::new("v2", 7, 0, set(&["txEVIL"]))));
    assert!(engine.byzantine_validators().contains("v2"));

    engine.add_proposal(Proposal::new("v3", 7, 0, set(&["tx1"])));
    engine.add_proposal(Proposal::new("v4", 7, 0, set(&["tx1"])));

    let result = engine.run_rounds().expect("consensus despite equivocator");
    assert_eq!(result.agreed_tx_ids, set(&["tx1"]));
    assert_eq!(result.byzantine_count, 1);
    assert_eq!(result.ledger_seq, 7);
    // The equivocator's vote is gone from the tally; the remaining
    // validators agree unanimously.
    assert_eq!(result.total_validators, 3);
}

#[test]
fn honest_nodes_reach_identical_agreed_sets() {
    // Safety: every honest node sees the same proposals and must return
    // the same agreed set.
    let validators = ["v1", "v2", "v3", "v4", "v5"];
    let candidate_sets: BTreeMap<&str, BTreeSet<String>> = [
        ("v1", set(&["tx1", "tx2"])),
        ("v2", set(&["tx1", "tx2"])),
        ("v3", set(&["tx1", "tx2", "tx3"])),
        ("v4", set(&["tx1", "tx2"])),
        ("v5", set(&["tx1"])),
    ]
    .into_iter()
    .collect();

    let mut agreed_sets = Vec::new();
    for me in validators {
        let mut engine = engine_for(me, &validators);
        engine.submit_transactions(candidate_sets[me].iter().cloned());
        for other in validators.iter().filter(|v| **v != me) {
            engine.add_proposal(Proposal::new(
                other,
                7,
                0,
                candidate_sets[other].clone(),
            ));
        }
        let result = engine.run_rounds().expect("consensus");
        agreed_sets.push(result.agreed_tx_ids);
    }
    for window in agreed_sets.windows(2) {
        assert_eq!(window[0], window[1]);
    }
    // tx1 is universal; tx3 is a minority view.
    assert!(agreed_sets[0].contains("tx1"));
    assert!(!agreed_sets[0].contains("tx3"));
}

#[test]
fn agreed_set_applies_identically_on_every_validator() {
    // End to end: two validator ledgers apply the same agreed set and
    // close with identical hashes.
    use riv_core_types::ResultCode;
    use rivulet::ledger::{Ledger, LedgerParams};

    let txs: Vec<Transaction> = (0..3)
        .map(|i| {
            Transaction::payment(
                "nGenesis",
                &format!("nAcct{i}"),
                Amount::native_units(100),
                Amount::native(10),
                0,
                100 + i,
            )
        })
        .collect();
    let tx_ids: BTreeSet<String> = txs.iter().map(|t| t.tx_id()).collect();

    let close = |order: Vec<&Transaction>| {
        let mut ledger = Ledger::new(LedgerParams::default());
        let mut sorted: Vec<&Transaction> = order;
        sorted.sort_by_cached_key(|tx| tx.canonical_key());
        for tx in sorted {
            assert_eq!(ledger.apply(tx), ResultCode::Success);
        }
        ledger.close_ledger(9_000)
    };

    let header_a = close(txs.iter().collect());
    let header_b = close(txs.iter().rev().collect());
    assert_eq!(header_a.hash, header_b.hash);
    assert_eq!(header_a.tx_count as usize, tx_ids.len());
}

#[test]
fn silent_validators_drift_onto_the_negative_unl() {
    let validators = ["v1", "v2", "v3", "v4", "v5", "v6", "v7", "v8"];
    let mut engine = engine_for("v1", &validators);
    engine.submit_transactions(["tx1".to_string()]);
    // Everyone but v8 proposes.
    for v in &validators[1..7] {
        engine.add_proposal(Proposal::new(v, 7, 0, set(&["tx1"])));
    }
    let result = engine.run_rounds().expect("consensus with one silent");
    assert!(result.agreed_tx_ids.contains("tx1"));
    assert!(engine.negative_unl.contains("v8"));
}
