// Copyright (c) 2025 The Rivulet Project

//! Automated market maker: constant-product pools with LP tokens,
//! trading-fee voting and a 24-hour auction slot.

use std::collections::BTreeMap;

use riv_crypto_keys::hash256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::order_book::leg;

/// Maximum trading fee: 10 % in basis points.
pub const MAX_TRADING_FEE_BPS: u32 = 1_000;
/// Maximum concurrent fee votes per pool.
const MAX_VOTES: usize = 8;
/// Auction slot duration in seconds.
const AUCTION_SLOT_SECS: i64 = 86_400;

/// Why an AMM operation was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmmError {
    /// No pool with that id.
    #[error("pool {0} not found")]
    NotFound(String),
    /// A pool for this pair already exists.
    #[error("pool for this pair already exists")]
    AlreadyExists,
    /// Asset legs are malformed or identical.
    #[error("invalid asset pair")]
    BadAssets,
    /// Deposit amounts are zero or initial deposit is empty.
    #[error("deposit amounts must be positive")]
    EmptyDeposit,
    /// The account holds too few LP tokens.
    #[error("insufficient LP tokens")]
    InsufficientLp,
    /// Trading fee above the cap.
    #[error("trading fee above {MAX_TRADING_FEE_BPS} bps")]
    FeeTooHigh,
    /// All vote slots are taken by heavier holders.
    #[error("vote slots full")]
    VoteSlotsFull,
    /// The bid does not beat the standing slot.
    #[error("bid too low")]
    BidTooLow,
    /// Only the pool creator may delete it.
    #[error("not the pool creator")]
    NotCreator,
    /// Other accounts still hold LP tokens.
    #[error("pool still has outside LP holders")]
    PoolNotEmpty,
}

/// A fee vote weighted by the voter's LP holding at vote time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeVote {
    /// Voter account.
    pub account: String,
    /// Proposed fee in bps.
    pub fee_bps: u32,
    /// LP weight at vote time.
    pub weight: i128,
}

/// The discounted-fee auction slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionSlot {
    /// Slot holder.
    pub owner: String,
    /// Expiry time.
    pub expires: i64,
    /// Winning bid in native micro-units (burned).
    pub bid_paid: i128,
}

/// A constant-product liquidity pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmmPool {
    /// Unique id derived from the asset pair.
    pub pool_id: String,
    /// Pool creator.
    pub creator: String,
    /// First asset leg (`CUR` or `CUR.issuer`), lexicographically first.
    pub asset_a: String,
    /// Second asset leg.
    pub asset_b: String,
    /// Reserve of asset A in micro-units.
    pub reserve_a: i128,
    /// Reserve of asset B in micro-units.
    pub reserve_b: i128,
    /// Outstanding LP tokens.
    pub lp_total: i128,
    /// LP token balances.
    pub lp_balances: BTreeMap<String, i128>,
    /// Current trading fee in bps.
    pub trading_fee_bps: u32,
    /// Active fee votes.
    pub votes: Vec<FeeVote>,
    /// Active auction slot, if any.
    pub auction_slot: Option<AuctionSlot>,
}

impl AmmPool {
    /// The constant-product invariant `reserve_a * reserve_b`.
    pub fn invariant(&self) -> i128 {
        self.reserve_a * self.reserve_b
    }

    /// Effective fee for a trader: the auction-slot holder pays a tenth.
    pub fn effective_fee_bps(&self, account: &str, now: i64) -> u32 {
        match &self.auction_slot {
            Some(slot) if slot.owner == account && now < slot.expires => {
                self.trading_fee_bps / 10
            }
            _ => self.trading_fee_bps,
        }
    }
}

fn isqrt(value: u128) -> u128 {
    if value < 2 {
        return value;
    }
    let mut x = value;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + value / x) / 2;
    }
    x
}

/// All AMM pools on the ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AmmManager {
    pools: BTreeMap<String, AmmPool>,
}

impl AmmManager {
    /// An empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic pool id for an asset pair, order-independent.
    pub fn pool_id(cur_a: &str, iss_a: &str, cur_b: &str, iss_b: &str) -> String {
        let mut legs = [leg(cur_a, iss_a), leg(cur_b, iss_b)];
        legs.sort();
        hex::encode(&hash256(format!("amm:{}/{}", legs[0], legs[1]).as_bytes())[..16])
    }

    /// Create a pool with an initial double-sided deposit. Returns the
    /// pool id and the LP tokens minted to the creator.
    #[allow(clippy::too_many_arguments)]
    pub fn create_pool(
        &mut self,
        creator: &str,
        cur_a: &str,
        iss_a: &str,
        amount_a: i128,
        cur_b: &str,
        iss_b: &str,
        amount_b: i128,
        trading_fee_bps: u32,
    ) -> Result<(String, i128), AmmError> {
        let leg_a = leg(cur_a, iss_a);
        let leg_b = leg(cur_b, iss_b);
        if leg_a == leg_b {
            return Err(AmmError::BadAssets);
        }
        if amount_a <= 0 || amount_b <= 0 {
            return Err(AmmError::EmptyDeposit);
        }
        if trading_fee_bps > MAX_TRADING_FEE_BPS {
            return Err(AmmError::FeeTooHigh);
        }
        let pool_id = Self::pool_id(cur_a, iss_a, cur_b, iss_b);
        if self.pools.contains_key(&pool_id) {
            return Err(AmmError::AlreadyExists);
        }

        // Keep the legs in sorted order so reserves are unambiguous.
        let (asset_a, asset_b, reserve_a, reserve_b) = if leg_a < leg_b {
            (leg_a, leg_b, amount_a, amount_b)
        } else {
            (leg_b, leg_a, amount_b, amount_a)
        };

        let lp = isqrt(reserve_a as u128 * reserve_b as u128) as i128;
        let mut lp_balances = BTreeMap::new();
        lp_balances.insert(creator.to_string(), lp);

        self.pools.insert(
            pool_id.clone(),
            AmmPool {
                pool_id: pool_id.clone(),
                creator: creator.to_string(),
                asset_a,
                asset_b,
                reserve_a,
                reserve_b,
                lp_total: lp,
                lp_balances,
                trading_fee_bps,
                votes: Vec::new(),
                auction_slot: None,
            },
        );
        Ok((pool_id, lp))
    }

    /// Deposit into a pool. Double-sided when both amounts are positive,
    /// single-sided otherwise. Returns the LP tokens minted.
    pub fn deposit(
        &mut self,
        pool_id: &str,
        account: &str,
        amount_a: i128,
        amount_b: i128,
    ) -> Result<i128, AmmError> {
        let pool = self
            .pools
            .get_mut(pool_id)
            .ok_or_else(|| AmmError::NotFound(pool_id.to_string()))?;
        if amount_a <= 0 && amount_b <= 0 {
            return Err(AmmError::EmptyDeposit);
        }

        let minted = if amount_a > 0 && amount_b > 0 {
            let by_a = pool.lp_total * amount_a / pool.reserve_a;
            let by_b = pool.lp_total * amount_b / pool.reserve_b;
            pool.reserve_a += amount_a;
            pool.reserve_b += amount_b;
            by_a.min(by_b)
        } else if amount_a > 0 {
            // Single-sided: half the value enters as if swapped first.
            let minted = pool.lp_total * amount_a / (2 * pool.reserve_a);
            pool.reserve_a += amount_a;
            minted
        } else {
            let minted = pool.lp_total * amount_b / (2 * pool.reserve_b);
            pool.reserve_b += amount_b;
            minted
        };

        pool.lp_total += minted;
        *pool.lp_balances.entry(account.to_string()).or_insert(0) += minted;
        Ok(minted)
    }

    /// Withdraw a proportional share by burning LP tokens. Returns the
    /// amounts of each asset released.
    pub fn withdraw(
        &mut self,
        pool_id: &str,
        account: &str,
        lp_tokens: i128,
    ) -> Result<(i128, i128), AmmError> {
        let pool = self
            .pools
            .get_mut(pool_id)
            .ok_or_else(|| AmmError::NotFound(pool_id.to_string()))?;
        let held = pool.lp_balances.get(account).copied().unwrap_or(0);
        if lp_tokens <= 0 || lp_tokens > held {
            return Err(AmmError::InsufficientLp);
        }
        let out_a = pool.reserve_a * lp_tokens / pool.lp_total;
        let out_b = pool.reserve_b * lp_tokens / pool.lp_total;
        pool.reserve_a -= out_a;
        pool.reserve_b -= out_b;
        pool.lp_total -= lp_tokens;
        *pool.lp_balances.get_mut(account).expect("held checked") -= lp_tokens;
        if pool.lp_balances[account] == 0 {
            pool.lp_balances.remove(account);
        }
        Ok((out_a, out_b))
    }

    /// Cast a fee vote weighted by current LP holdings.
    pub fn vote(
        &mut self,
        pool_id: &str,
        account: &str,
        fee_bps: u32,
    ) -> Result<u32, AmmError> {
        if fee_bps > MAX_TRADING_FEE_BPS {
            return Err(AmmError::FeeTooHigh);
        }
        let pool = self
            .pools
            .get_mut(pool_id)
            .ok_or_else(|| AmmError::NotFound(pool_id.to_string()))?;
        let weight = pool.lp_balances.get(account).copied().unwrap_or(0);
        if weight <= 0 {
            return Err(AmmError::InsufficientLp);
        }

        if let Some(vote) = pool.votes.iter_mut().find(|v| v.account == account) {
            vote.fee_bps = fee_bps;
            vote.weight = weight;
        } else if pool.votes.len() < MAX_VOTES {
            pool.votes.push(FeeVote {
                account: account.to_string(),
                fee_bps,
                weight,
            });
        } else {
            // Evict the lightest standing vote if this voter is heavier.
            let (lightest, min_weight) = pool
                .votes
                .iter()
                .enumerate()
                .min_by_key(|(_, v)| v.weight)
                .map(|(i, v)| (i, v.weight))
                .expect("votes non-empty");
            if weight <= min_weight {
                return Err(AmmError::VoteSlotsFull);
            }
            pool.votes[lightest] = FeeVote {
                account: account.to_string(),
                fee_bps,
                weight,
            };
        }

        let total: i128 = pool.votes.iter().map(|v| v.weight).sum();
        let weighted: i128 = pool
            .votes
            .iter()
            .map(|v| v.fee_bps as i128 * v.weight)
            .sum();
        pool.trading_fee_bps = (weighted / total) as u32;
        Ok(pool.trading_fee_bps)
    }

    /// Bid for the auction slot. The bid must beat any unexpired slot.
    /// The bid amount is burned by the caller.
    pub fn bid(
        &mut self,
        pool_id: &str,
        account: &str,
        bid: i128,
        now: i64,
    ) -> Result<&AuctionSlot, AmmError> {
        let pool = self
            .pools
            .get_mut(pool_id)
            .ok_or_else(|| AmmError::NotFound(pool_id.to_string()))?;
        if bid <= 0 {
            return Err(AmmError::BidTooLow);
        }
        if let Some(slot) = &pool.auction_slot {
            if now < slot.expires && bid <= slot.bid_paid {
                return Err(AmmError::BidTooLow);
            }
        }
        pool.auction_slot = Some(AuctionSlot {
            owner: account.to_string(),
            expires: now + AUCTION_SLOT_SECS,
            bid_paid: bid,
        });
        Ok(pool.auction_slot.as_ref().expect("just set"))
    }

    /// Delete a pool. Only the creator, and only once no one else holds
    /// LP tokens. Returns the final reserves for settlement.
    pub fn delete_pool(
        &mut self,
        pool_id: &str,
        account: &str,
    ) -> Result<(String, String, i128, i128), AmmError> {
        let pool = self
            .pools
            .get(pool_id)
            .ok_or_else(|| AmmError::NotFound(pool_id.to_string()))?;
        if pool.creator != account {
            return Err(AmmError::NotCreator);
        }
        let outside = pool
            .lp_balances
            .keys()
            .any(|holder| holder != account);
        if outside {
            return Err(AmmError::PoolNotEmpty);
        }
        let pool = self.pools.remove(pool_id).expect("looked up above");
        Ok((pool.asset_a, pool.asset_b, pool.reserve_a, pool.reserve_b))
    }

    /// Look up a pool.
    pub fn get(&self, pool_id: &str) -> Option<&AmmPool> {
        self.pools.get(pool_id)
    }

    /// Native micro-units held across all pool reserves.
    pub fn total_native_locked(&self) -> i128 {
        self.pools
            .values()
            .map(|p| {
                let mut locked = 0;
                if p.asset_a == "NXF" {
                    locked += p.reserve_a;
                }
                if p.asset_b == "NXF" {
                    locked += p.reserve_b;
                }
                locked
            })
            .sum()
    }

    /// Number of pools.
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }
}
