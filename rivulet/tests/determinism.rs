// Copyright (c) 2025 The Rivulet Project

//! Cross-validator determinism: two ledgers fed the same transactions
//! in different orders converge on identical roots and header hashes.

use proptest::prelude::*;
use riv_core_types::{Amount, ResultCode, Transaction};
use rivulet::ledger::{Ledger, LedgerParams};

const GENESIS: &str = "nGenesis";

fn payment(to: &str, units: i128, timestamp: i64) -> Transaction {
    Transaction::payment(
        GENESIS,
        to,
        Amount::native_units(units),
        Amount::native(10),
        0,
        timestamp,
    )
}

#[test]
fn permuted_submission_orders_converge() {
    // Independent transactions applied in opposite orders: the close
    // must produce identical tx, state and header hashes.
    let txs = vec![
        payment("nDora", 40, 104),
        payment("nAlice", 10, 101),
        payment("nCarol", 30, 103),
        payment("nBob", 20, 102),
    ];

    let mut forward = Ledger::new(LedgerParams::default());
    for tx in &txs {
        assert_eq!(forward.apply(tx), ResultCode::Success);
    }
    let header_a = forward.close_ledger(5_000);

    let mut reverse = Ledger::new(LedgerParams::default());
    for tx in txs.iter().rev() {
        assert_eq!(reverse.apply(tx), ResultCode::Success);
    }
    let header_b = reverse.close_ledger(5_000);

    assert_eq!(header_a.tx_hash, header_b.tx_hash);
    assert_eq!(header_a.state_hash, header_b.state_hash);
    assert_eq!(header_a.hash, header_b.hash);
}

#[test]
fn two_validators_replaying_the_same_history_agree() {
    let run = || {
        let mut ledger = Ledger::new(LedgerParams::default());
        for (i, to) in ["nAlice", "nBob", "nCarol"].iter().enumerate() {
            assert_eq!(
                ledger.apply(&payment(to, 100, 100 + i as i64)),
                ResultCode::Success
            );
        }
        let first = ledger.close_ledger(10_000);
        assert_eq!(
            ledger.apply(&payment("nDora", 5, 200)),
            ResultCode::Success
        );
        let second = ledger.close_ledger(10_020);
        (first, second)
    };
    let (a1, a2) = run();
    let (b1, b2) = run();
    assert_eq!(a1, b1);
    assert_eq!(a2, b2);
    // And the chain links hold.
    assert_eq!(a2.parent_hash, a1.hash);
    assert_eq!(a2.sequence, a1.sequence + 1);
}

#[test]
fn signing_preimages_are_byte_identical_for_equal_transactions() {
    let a = payment("nAlice", 42, 100);
    let b = payment("nAlice", 42, 100);
    assert_eq!(a.signing_preimage(), b.signing_preimage());
    assert_eq!(a.tx_id(), b.tx_id());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Supply conservation over arbitrary payment workloads: the formula
    /// `total_supply = initial - burned + minted` survives any sequence
    /// of (possibly failing) payments.
    #[test]
    fn supply_formula_is_conserved(
        amounts in proptest::collection::vec(1i128..2_000, 1..20),
    ) {
        let mut ledger = Ledger::new(LedgerParams::default());
        let accounts = ["nAlice", "nBob", "nCarol"];
        for (i, amount) in amounts.iter().enumerate() {
            let from = accounts[i % accounts.len()];
            let to = accounts[(i + 1) % accounts.len()];
            // Seed from genesis now and then; otherwise shuffle between
            // the accounts (many of these fail harmlessly).
            let tx = if i % 4 == 0 {
                payment(from, *amount, 100 + i as i64)
            } else {
                Transaction::payment(
                    from,
                    to,
                    Amount::native_units(*amount),
                    Amount::native(10),
                    0,
                    100 + i as i64,
                )
            };
            let _ = ledger.apply(&tx);
            prop_assert_eq!(
                ledger.total_supply,
                ledger.initial_supply - ledger.total_burned + ledger.total_minted
            );
        }
        ledger.close_ledger(50_000);
        prop_assert_eq!(
            ledger.total_supply,
            ledger.initial_supply - ledger.total_burned + ledger.total_minted
        );
        prop_assert!(ledger.total_supply >= 0);
    }

    /// Applied ids track successes exactly.
    #[test]
    fn applied_ids_match_success_count(count in 1usize..10) {
        let mut ledger = Ledger::new(LedgerParams::default());
        let mut successes = 0;
        for i in 0..count {
            let tx = payment("nAlice", 10, 100 + i as i64);
            if ledger.apply(&tx) == ResultCode::Success {
                successes += 1;
                prop_assert!(ledger.applied_tx_ids.contains(&tx.tx_id()));
            }
        }
        prop_assert_eq!(ledger.applied_tx_ids.len(), successes);
    }
}
