// Copyright (c) 2025 The Rivulet Project

//! Limit-order book with price-time priority.
//!
//! Each book is keyed by a trading pair string `"BASE/COUNTER"` where a
//! leg is `CUR` for the native asset or `CUR.issuer` for an IOU. Bids
//! buy the base, asks sell it. Matching is best price first, then
//! earliest submission. Prices are ppm ratios: counter micro-units per
//! base micro-unit scaled by 1e6, so a price of 2_000_000 means two
//! counter units per base unit. A price of zero is a market order.
//!
//! Supports GTC, IOC and FOK time-in-force, order expiration, and
//! auto-bridging of cross-currency submissions through the native
//! asset.

use std::collections::BTreeMap;

use riv_core_types::{mul_ratio_floor, PPM};
use serde::{Deserialize, Serialize};

/// Side of the book an order rests on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    /// Buy the base with the counter.
    Buy,
    /// Sell the base for the counter.
    Sell,
}

/// Time-in-force for a submitted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Rest on the book until filled or cancelled.
    Gtc,
    /// Fill what matches immediately, cancel the rest.
    Ioc,
    /// Fill entirely now or not at all.
    Fok,
}

/// Order lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Resting with its full quantity.
    Open,
    /// Resting with some quantity filled.
    PartiallyFilled,
    /// Fully filled and removed.
    Filled,
    /// Cancelled and removed.
    Cancelled,
}

/// A single limit order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique id (the creating tx id for ledger offers).
    pub order_id: String,
    /// Owning account.
    pub account: String,
    /// Trading pair, e.g. `"USD.nIssuer/NXF"`.
    pub pair: String,
    /// Book side.
    pub side: Side,
    /// Price in ppm of counter per base; 0 = market.
    pub price_ppm: u128,
    /// Original base quantity in micro-units.
    pub quantity: i128,
    /// Unfilled base quantity.
    pub remaining: i128,
    /// Submission index for time priority.
    pub submitted: u64,
    /// Lifecycle state.
    pub status: OrderStatus,
    /// Time-in-force.
    pub time_in_force: TimeInForce,
    /// Expiration timestamp; 0 = never.
    pub expiration: i64,
}

impl Order {
    fn is_expired(&self, now: i64) -> bool {
        self.expiration > 0 && now >= self.expiration
    }
}

/// Record of a single match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    /// Resting order that was hit.
    pub maker_order_id: String,
    /// Resting order's owner.
    pub maker_account: String,
    /// Incoming order.
    pub taker_order_id: String,
    /// Incoming order's owner.
    pub taker_account: String,
    /// Pair the fill happened on.
    pub pair: String,
    /// Side of the *taker*.
    pub taker_side: Side,
    /// Execution price (the maker's price).
    pub price_ppm: u128,
    /// Base micro-units exchanged.
    pub base_quantity: i128,
}

impl Fill {
    /// Counter micro-units exchanged for the base quantity.
    pub fn counter_quantity(&self) -> i128 {
        mul_ratio_floor(self.base_quantity, self.price_ppm as i128, PPM as i128)
    }
}

/// Format a pair leg: `CUR` for native, `CUR.issuer` for an IOU.
pub fn leg(currency: &str, issuer: &str) -> String {
    if issuer.is_empty() {
        currency.to_string()
    } else {
        format!("{currency}.{issuer}")
    }
}

/// Parse a pair leg back into `(currency, issuer)`.
pub fn parse_leg(leg: &str) -> (String, String) {
    match leg.split_once('.') {
        Some((currency, issuer)) => (currency.to_string(), issuer.to_string()),
        None => (leg.to_string(), String::new()),
    }
}

/// The native pair leg.
pub const NATIVE_LEG: &str = "NXF";

/// In-memory order book for all trading pairs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBook {
    asks: BTreeMap<String, Vec<Order>>,
    bids: BTreeMap<String, Vec<Order>>,
    /// order_id -> (pair, side) locator for cancels.
    locators: BTreeMap<String, (String, Side)>,
    fills: Vec<Fill>,
    next_submission: u64,
}

impl OrderBook {
    /// An empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit a limit order; returns the fills executed immediately.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_order(
        &mut self,
        account: &str,
        pair: &str,
        side: Side,
        price_ppm: u128,
        quantity: i128,
        order_id: &str,
        time_in_force: TimeInForce,
        expiration: i64,
        now: i64,
    ) -> Vec<Fill> {
        self.purge_expired(pair, now);

        let mut order = Order {
            order_id: order_id.to_string(),
            account: account.to_string(),
            pair: pair.to_string(),
            side,
            price_ppm,
            quantity,
            remaining: quantity,
            submitted: self.next_submission,
            status: OrderStatus::Open,
            time_in_force,
            expiration,
        };
        self.next_submission += 1;

        if time_in_force == TimeInForce::Fok && self.available_liquidity(&order, now) < quantity {
            return Vec::new();
        }

        let fills = self.match_order(&mut order, now);

        if order.remaining > 0 {
            match time_in_force {
                TimeInForce::Ioc | TimeInForce::Fok => {
                    order.status = OrderStatus::Cancelled;
                }
                TimeInForce::Gtc => {
                    order.status = if order.remaining < quantity {
                        OrderStatus::PartiallyFilled
                    } else {
                        OrderStatus::Open
                    };
                    self.insert(order);
                }
            }
        }
        fills
    }

    /// Auto-bridge a cross-currency market order through the native
    /// asset: sell the source leg for NXF, then buy the target leg.
    pub fn submit_auto_bridged(
        &mut self,
        account: &str,
        src_leg: &str,
        dst_leg: &str,
        quantity: i128,
        order_id: &str,
        now: i64,
    ) -> Vec<Fill> {
        if src_leg == NATIVE_LEG || dst_leg == NATIVE_LEG {
            let pair = format!("{dst_leg}/{src_leg}");
            return self.submit_order(
                account,
                &pair,
                Side::Buy,
                0,
                quantity,
                order_id,
                TimeInForce::Ioc,
                0,
                now,
            );
        }

        let mut fills = self.submit_order(
            account,
            &format!("{NATIVE_LEG}/{src_leg}"),
            Side::Buy,
            0,
            quantity,
            &format!("{order_id}-leg1"),
            TimeInForce::Ioc,
            0,
            now,
        );
        let native_received: i128 = fills.iter().map(|f| f.base_quantity).sum();
        if native_received > 0 {
            fills.extend(self.submit_order(
                account,
                &format!("{dst_leg}/{NATIVE_LEG}"),
                Side::Buy,
                0,
                native_received,
                &format!("{order_id}-leg2"),
                TimeInForce::Ioc,
                0,
                now,
            ));
        }
        fills
    }

    /// Cancel a resting order. Best effort: false when absent.
    pub fn cancel_order(&mut self, order_id: &str) -> bool {
        let Some((pair, side)) = self.locators.remove(order_id) else {
            return false;
        };
        let book = match side {
            Side::Sell => self.asks.get_mut(&pair),
            Side::Buy => self.bids.get_mut(&pair),
        };
        if let Some(list) = book {
            if let Some(pos) = list.iter().position(|o| o.order_id == order_id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Whether an order is still resting.
    pub fn has_order(&self, order_id: &str) -> bool {
        self.locators.contains_key(order_id)
    }

    /// Top-of-book snapshot for a pair.
    pub fn book_snapshot(&self, pair: &str, depth: usize) -> (Vec<Order>, Vec<Order>) {
        let asks = self
            .asks
            .get(pair)
            .map(|v| v.iter().take(depth).cloned().collect())
            .unwrap_or_default();
        let bids = self
            .bids
            .get(pair)
            .map(|v| v.iter().take(depth).cloned().collect())
            .unwrap_or_default();
        (asks, bids)
    }

    /// Recent fills, newest last.
    pub fn fills(&self, limit: usize) -> &[Fill] {
        let start = self.fills.len().saturating_sub(limit);
        &self.fills[start..]
    }

    /// All pairs with any resting order.
    pub fn pairs(&self) -> Vec<String> {
        let mut pairs: Vec<String> = self
            .asks
            .keys()
            .chain(self.bids.keys())
            .cloned()
            .collect();
        pairs.sort_unstable();
        pairs.dedup();
        pairs
    }

    fn match_order(&mut self, taker: &mut Order, now: i64) -> Vec<Fill> {
        let mut fills = Vec::new();
        let book = match taker.side {
            Side::Buy => self.asks.entry(taker.pair.clone()).or_default(),
            Side::Sell => self.bids.entry(taker.pair.clone()).or_default(),
        };

        while taker.remaining > 0 && !book.is_empty() {
            if book[0].is_expired(now) {
                let mut expired = book.remove(0);
                expired.status = OrderStatus::Cancelled;
                self.locators.remove(&expired.order_id);
                continue;
            }
            let best = &mut book[0];
            if taker.price_ppm > 0 {
                let crossed = match taker.side {
                    Side::Buy => best.price_ppm <= taker.price_ppm,
                    Side::Sell => best.price_ppm >= taker.price_ppm,
                };
                if !crossed {
                    break;
                }
            }

            let fill_qty = taker.remaining.min(best.remaining);
            fills.push(Fill {
                maker_order_id: best.order_id.clone(),
                maker_account: best.account.clone(),
                taker_order_id: taker.order_id.clone(),
                taker_account: taker.account.clone(),
                pair: taker.pair.clone(),
                taker_side: taker.side,
                price_ppm: best.price_ppm,
                base_quantity: fill_qty,
            });
            taker.remaining -= fill_qty;
            best.remaining -= fill_qty;

            if best.remaining == 0 {
                best.status = OrderStatus::Filled;
                self.locators.remove(&best.order_id);
                book.remove(0);
            } else {
                best.status = OrderStatus::PartiallyFilled;
            }
        }
        self.fills.extend(fills.iter().cloned());
        fills
    }

    fn available_liquidity(&self, taker: &Order, now: i64) -> i128 {
        let book = match taker.side {
            Side::Buy => self.asks.get(&taker.pair),
            Side::Sell => self.bids.get(&taker.pair),
        };
        let Some(book) = book else { return 0 };
        let mut total = 0i128;
        for order in book {
            if order.is_expired(now) {
                continue;
            }
            if taker.price_ppm > 0 {
                let crossed = match taker.side {
                    Side::Buy => order.price_ppm <= taker.price_ppm,
                    Side::Sell => order.price_ppm >= taker.price_ppm,
                };
                if !crossed {
                    break;
                }
            }
            total += order.remaining;
            if total >= taker.remaining {
                break;
            }
        }
        total
    }

    fn purge_expired(&mut self, pair: &str, now: i64) {
        let mut removed = Vec::new();
        for book in [self.asks.get_mut(pair), self.bids.get_mut(pair)]
            .into_iter()
            .flatten()
        {
            book.retain(|order| {
                if order.is_expired(now) {
                    removed.push(order.order_id.clone());
                    false
                } else {
                    true
                }
            });
        }
        for order_id in removed {
            self.locators.remove(&order_id);
        }
    }

    fn insert(&mut self, order: Order) {
        self.locators
            .insert(order.order_id.clone(), (order.pair.clone(), order.side));
        let book = match order.side {
            Side::Sell => self.asks.entry(order.pair.clone()).or_default(),
            Side::Buy => self.bids.entry(order.pair.clone()).or_default(),
        };
        // Asks: lowest price first. Bids: highest price first. Ties by
        // submission order.
        let key = |o: &Order| match o.side {
            Side::Sell => (o.price_ppm as i128, o.submitted),
            Side::Buy => (-(o.price_ppm as i128), o.submitted),
        };
        let pos = book
            .binary_search_by_key(&key(&order), |o| key(o))
            .unwrap_or_else(|p| p);
        book.insert(pos, order);
    }
}
