// Copyright (c) 2025 The Rivulet Project

//! Multi-hop IOU rippling: trust-graph snapshot and deterministic
//! bounded path search.
//!
//! When a direct trust line is absent, a payment can still ripple
//! through intermediaries. A hop `a -> b` carries value either by `b`
//! accepting freshly issued IOUs of `a` (an *issue* hop, capacity =
//! `b`'s remaining credit toward `a`) or by `a` redeeming IOUs of `b`
//! it already holds (a *redeem* hop, capacity = `a`'s balance on its
//! line toward `b`).
//!
//! Path search is depth-first over sorted adjacency with a hop cap, so
//! enumeration order is identical on every validator. Candidate paths
//! are ranked by deliverable amount descending, hop count ascending,
//! then lexicographic hop sequence.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Ledger;

/// Maximum hops in a ripple path.
pub const MAX_PATH_HOPS: usize = 6;
/// Cap on candidate paths examined per payment.
const MAX_CANDIDATE_PATHS: usize = 16;

/// How a hop carries value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HopKind {
    /// `from` issues its own IOU to `to`.
    Issue,
    /// `from` redeems IOUs issued by `to`.
    Redeem,
}

/// One hop of a ripple path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hop {
    /// Paying account.
    pub from: String,
    /// Receiving account.
    pub to: String,
    /// Hop mechanism.
    pub kind: HopKind,
    /// Micro-units this hop can carry right now.
    pub capacity: i128,
}

/// A discovered payment path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentPath {
    /// Hops from source to destination.
    pub hops: Vec<Hop>,
    /// Micro-units deliverable end to end.
    pub deliverable: i128,
}

impl PaymentPath {
    fn sort_key(&self) -> (i128, usize, Vec<(String, String, HopKind)>) {
        (
            -self.deliverable,
            self.hops.len(),
            self.hops
                .iter()
                .map(|h| (h.from.clone(), h.to.clone(), h.kind))
                .collect(),
        )
    }
}

/// A snapshot of trust relations for one currency.
#[derive(Debug, Clone, Default)]
pub struct TrustGraph {
    /// `from -> [(to, kind, capacity)]`, adjacency in sorted order.
    edges: BTreeMap<String, Vec<(String, HopKind, i128)>>,
}

impl TrustGraph {
    /// Build the graph for `currency` from the ledger.
    ///
    /// For every trust line `(holder, currency, issuer)`:
    /// - `issuer -> holder` (Issue) with capacity `limit - balance`,
    /// - `holder -> issuer` (Redeem) with capacity `balance`.
    /// Frozen and no-ripple lines contribute no edges.
    pub fn build(ledger: &Ledger, currency: &str) -> Self {
        let mut edges: BTreeMap<String, Vec<(String, HopKind, i128)>> = BTreeMap::new();
        for (holder, account) in &ledger.accounts {
            for ((cur, issuer), line) in &account.trust_lines {
                if cur != currency || line.frozen || line.no_ripple {
                    continue;
                }
                let credit = line.available_credit();
                if credit > 0 {
                    edges
                        .entry(issuer.clone())
                        .or_default()
                        .push((holder.clone(), HopKind::Issue, credit));
                }
                if line.balance > 0 {
                    edges
                        .entry(holder.clone())
                        .or_default()
                        .push((issuer.clone(), HopKind::Redeem, line.balance));
                }
            }
        }
        for list in edges.values_mut() {
            list.sort();
        }
        Self { edges }
    }

    /// Outgoing edges of an account, sorted.
    pub fn edges_from(&self, account: &str) -> &[(String, HopKind, i128)] {
        self.edges.get(account).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Deterministic bounded best-first path finder.
pub struct PathFinder<'a> {
    graph: &'a TrustGraph,
}

impl<'a> PathFinder<'a> {
    /// A finder over a graph snapshot.
    pub fn new(graph: &'a TrustGraph) -> Self {
        Self { graph }
    }

    /// Find the best path from `source` to `destination` able to carry
    /// up to `amount`. `None` when nothing can be delivered.
    pub fn find_best_path(
        &self,
        source: &str,
        destination: &str,
        amount: i128,
    ) -> Option<PaymentPath> {
        let mut paths = Vec::new();
        let mut current: Vec<Hop> = Vec::new();
        let mut visited = vec![source.to_string()];
        self.depth_first(
            source,
            destination,
            amount,
            &mut current,
            &mut visited,
            &mut paths,
        );
        paths.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        paths.into_iter().next().filter(|p| p.deliverable > 0)
    }

    fn depth_first(
        &self,
        current_account: &str,
        destination: &str,
        amount: i128,
        current: &mut Vec<Hop>,
        visited: &mut Vec<String>,
        paths: &mut Vec<PaymentPath>,
    ) {
        if paths.len() >= MAX_CANDIDATE_PATHS || current.len() >= MAX_PATH_HOPS {
            return;
        }
        for (next, kind, capacity) in self.graph.edges_from(current_account) {
            if visited.iter().any(|v| v == next) {
                continue;
            }
            current.push(Hop {
                from: current_account.to_string(),
                to: next.clone(),
                kind: *kind,
                capacity: *capacity,
            });
            if next == destination {
                let bottleneck = current.iter().map(|h| h.capacity).min().unwrap_or(0);
                paths.push(PaymentPath {
                    hops: current.clone(),
                    deliverable: bottleneck.min(amount),
                });
            } else {
                visited.push(next.clone());
                self.depth_first(next, destination, amount, current, visited, paths);
                visited.pop();
            }
            current.pop();
        }
    }
}

/// Execute a path for `amount` micro-units of `currency`.
///
/// Capacities were computed from current state, so execution cannot
/// fail; every touched account is recorded in the checkpoint by the
/// caller's account helpers.
pub fn execute_path(
    ledger: &mut Ledger,
    cp: &mut super::invariants::Checkpoint,
    path: &PaymentPath,
    currency: &str,
    amount: i128,
) {
    for hop in &path.hops {
        match hop.kind {
            HopKind::Issue => {
                // `to` holds a line toward `from`; its balance rises.
                let account = ledger
                    .account_mut(cp, &hop.to)
                    .expect("path accounts exist");
                let line = account
                    .trust_line_mut(currency, &hop.from)
                    .expect("issue hop implies a line");
                line.balance += amount;
            }
            HopKind::Redeem => {
                // `from` holds a line toward `to`; its balance falls.
                let account = ledger
                    .account_mut(cp, &hop.from)
                    .expect("path accounts exist");
                let line = account
                    .trust_line_mut(currency, &hop.to)
                    .expect("redeem hop implies a line");
                line.balance -= amount;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Ledger, LedgerParams};
    use crate::ledger::account::TrustLine;

    fn ledger_with_lines(lines: &[(&str, &str, &str, i128, i128)]) -> Ledger {
        // (holder, currency, issuer, limit, balance)
        let mut ledger = Ledger::new(LedgerParams::default());
        for (holder, currency, issuer, limit, balance) in lines {
            ledger.ensure_account_for_test(holder);
            ledger.ensure_account_for_test(issuer);
            let account = ledger.accounts.get_mut(*holder).unwrap();
            account.trust_lines.insert(
                (currency.to_string(), issuer.to_string()),
                TrustLine {
                    balance: *balance,
                    ..TrustLine::with_limit(*limit)
                },
            );
        }
        ledger
    }

    #[test]
    fn single_issue_hop() {
        let ledger = ledger_with_lines(&[("nBob", "USD", "nAlice", 1_000, 0)]);
        let graph = TrustGraph::build(&ledger, "USD");
        let path = PathFinder::new(&graph)
            .find_best_path("nAlice", "nBob", 400)
            .unwrap();
        assert_eq!(path.hops.len(), 1);
        assert_eq!(path.hops[0].kind, HopKind::Issue);
        assert_eq!(path.deliverable, 400);
    }

    #[test]
    fn two_hop_ripple_through_intermediary() {
        // Alice holds 500 of Mid's IOUs; Bob trusts Mid for 1000.
        let ledger = ledger_with_lines(&[
            ("nAlice", "USD", "nMid", 1_000, 500),
            ("nBob", "USD", "nMid", 1_000, 0),
        ]);
        let graph = TrustGraph::build(&ledger, "USD");
        let path = PathFinder::new(&graph)
            .find_best_path("nAlice", "nBob", 300)
            .unwrap();
        assert_eq!(path.hops.len(), 2);
        assert_eq!(path.hops[0].kind, HopKind::Redeem);
        assert_eq!(path.hops[1].kind, HopKind::Issue);
        assert_eq!(path.deliverable, 300);
    }

    #[test]
    fn bottleneck_caps_delivery() {
        let ledger = ledger_with_lines(&[
            ("nAlice", "USD", "nMid", 1_000, 200),
            ("nBob", "USD", "nMid", 1_000, 950),
        ]);
        let graph = TrustGraph::build(&ledger, "USD");
        let path = PathFinder::new(&graph)
            .find_best_path("nAlice", "nBob", 500)
            .unwrap();
        // Redeem capacity 200, issue capacity 50.
        assert_eq!(path.deliverable, 50);
    }

    #[test]
    fn frozen_and_no_ripple_lines_are_invisible() {
        let mut ledger = ledger_with_lines(&[("nBob", "USD", "nAlice", 1_000, 0)]);
        ledger
            .accounts
            .get_mut("nBob")
            .unwrap()
            .trust_line_mut("USD", "nAlice")
            .unwrap()
            .frozen = true;
        let graph = TrustGraph::build(&ledger, "USD");
        assert!(PathFinder::new(&graph)
            .find_best_path("nAlice", "nBob", 1)
            .is_none());
    }

    #[test]
    fn no_path_yields_none() {
        let ledger = ledger_with_lines(&[("nBob", "USD", "nCarol", 100, 0)]);
        let graph = TrustGraph::build(&ledger, "USD");
        assert!(PathFinder::new(&graph)
            .find_best_path("nAlice", "nBob", 10)
            .is_none());
    }

    #[test]
    fn execution_moves_balances_along_the_path() {
        let mut ledger = ledger_with_lines(&[
            ("nAlice", "USD", "nMid", 1_000, 500),
            ("nBob", "USD", "nMid", 1_000, 0),
        ]);
        let graph = TrustGraph::build(&ledger, "USD");
        let path = PathFinder::new(&graph)
            .find_best_path("nAlice", "nBob", 300)
            .unwrap();
        let mut cp = ledger.checkpoint();
        execute_path(&mut ledger, &mut cp, &path, "USD", 300);
        assert_eq!(
            ledger.accounts["nAlice"].trust_line("USD", "nMid").unwrap().balance,
            200
        );
        assert_eq!(
            ledger.accounts["nBob"].trust_line("USD", "nMid").unwrap().balance,
            300
        );
    }
}
