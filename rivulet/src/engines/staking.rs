// Copyright (c) 2025 The Rivulet Project

//! Transaction-based staking with dynamic interest.
//!
//! Stakes are created by Stake transactions; at maturity the ledger
//! closer returns principal plus interest. Early cancellation is
//! possible but carries a penalty that scales with the tier's yield and
//! decays linearly to zero at maturity.
//!
//! The base APY per tier is adjusted by a demand multiplier derived
//! from the network staking ratio, fixed at stake creation:
//!
//! ```text
//! multiplier = clamp(0.5, 2.0, 1 + (target - staked/circulating) * 3)
//! ```
//!
//! with target ratio 30 %. All arithmetic is integer basis points and
//! ppm; interest and payouts round toward zero.

use std::collections::BTreeMap;

use riv_core_types::StakeTier;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Seconds in a year (365.25 days).
pub const SECONDS_PER_YEAR: i64 = 31_557_600;

/// Minimum stake: 1 NXF.
pub const MIN_STAKE_AMOUNT: i128 = 1_000_000;

/// Target staking ratio in basis points of circulating supply.
const TARGET_STAKE_RATIO_BPS: i128 = 3_000;
/// Sensitivity of the demand multiplier.
const DEMAND_SENSITIVITY: i128 = 3;
/// Demand multiplier bounds, in basis points of 1.0.
const MIN_MULTIPLIER_BPS: i128 = 5_000;
const MAX_MULTIPLIER_BPS: i128 = 20_000;

/// Interest penalty: forfeit 50 %..90 % of accrued interest.
const BASE_INTEREST_PENALTY_BPS: u64 = 5_000;
const INTEREST_PENALTY_SCALE_BPS: u64 = 4_000;
/// Principal penalty: burn 2 %..10 % of principal.
const BASE_PRINCIPAL_PENALTY_BPS: u64 = 200;
const PRINCIPAL_PENALTY_SCALE_BPS: u64 = 800;

/// Lock duration and base APY (bps) for a tier.
pub fn tier_params(tier: StakeTier) -> (i64, u64) {
    match tier {
        StakeTier::Flexible => (0, 200),
        StakeTier::Days30 => (30 * 86_400, 500),
        StakeTier::Days90 => (90 * 86_400, 800),
        StakeTier::Days180 => (180 * 86_400, 1_200),
        StakeTier::Days365 => (365 * 86_400, 1_500),
    }
}

/// Highest base APY across tiers, used to normalize penalty scaling.
const MAX_BASE_APY_BPS: u64 = 1_500;

/// Demand multiplier in basis points of 1.0.
pub fn demand_multiplier_bps(total_staked: i128, circulating: i128) -> i128 {
    if circulating <= 0 {
        return 10_000;
    }
    let ratio_bps = total_staked * 10_000 / circulating;
    let raw = 10_000 + (TARGET_STAKE_RATIO_BPS - ratio_bps) * DEMAND_SENSITIVITY;
    raw.clamp(MIN_MULTIPLIER_BPS, MAX_MULTIPLIER_BPS)
}

/// Why a staking operation was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StakeError {
    /// A stake with this tx id already exists.
    #[error("stake for tx {0} already recorded")]
    AlreadyRecorded(String),
    /// Below the minimum stake amount.
    #[error("minimum stake is {MIN_STAKE_AMOUNT} micro")]
    BelowMinimum,
    /// No such stake.
    #[error("stake {0} not found")]
    NotFound(String),
    /// The stake belongs to another account.
    #[error("stake {0} belongs to another account")]
    WrongOwner(String),
    /// The stake is already matured or cancelled.
    #[error("stake {0} already resolved")]
    AlreadyResolved(String),
}

/// A stake tied to the transaction that created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeRecord {
    /// Identifier; equals the creating tx id.
    pub stake_id: String,
    /// Staker address.
    pub address: String,
    /// Principal locked, micro-units.
    pub amount: i128,
    /// Lock tier.
    pub tier: StakeTier,
    /// Base APY at creation, bps.
    pub base_apy_bps: u64,
    /// Base APY times the demand multiplier at creation, bps.
    pub effective_apy_bps: u64,
    /// Lock duration, seconds (0 for Flexible).
    pub lock_duration: i64,
    /// Creation time.
    pub start_time: i64,
    /// Maturity time (0 for Flexible).
    pub maturity_time: i64,
    /// Circulating supply when the stake was created.
    pub circulating_at_start: i128,
    /// Set once matured at close.
    pub matured: bool,
    /// Set on early cancellation.
    pub cancelled: bool,
    /// Amount actually paid out.
    pub payout_amount: i128,
}

impl StakeRecord {
    /// Interest accrued so far at the effective APY, rounded down.
    pub fn accrued_interest(&self, now: i64) -> i128 {
        let elapsed = (now - self.start_time).max(0) as i128;
        self.amount * self.effective_apy_bps as i128 * elapsed
            / (10_000 * SECONDS_PER_YEAR as i128)
    }

    /// Full interest at maturity (locked tiers only).
    pub fn maturity_interest(&self) -> i128 {
        if self.lock_duration <= 0 {
            return 0;
        }
        self.amount * self.effective_apy_bps as i128 * self.lock_duration as i128
            / (10_000 * SECONDS_PER_YEAR as i128)
    }

    /// Whether the lock period has expired (never for Flexible).
    pub fn is_mature(&self, now: i64) -> bool {
        self.tier != StakeTier::Flexible && now >= self.maturity_time
    }

    /// Still counted against the pool.
    pub fn is_active(&self) -> bool {
        !self.matured && !self.cancelled
    }

    /// Penalty remaining as a ppm fraction: 1.0 at start, 0 at maturity.
    fn decay_ppm(&self, now: i64) -> i128 {
        if self.lock_duration <= 0 {
            return 0;
        }
        let elapsed = ((now - self.start_time).max(0) as i128).min(self.lock_duration as i128);
        1_000_000 - elapsed * 1_000_000 / self.lock_duration as i128
    }

    /// Early-cancel payout breakdown:
    /// `(payout, interest_kept, interest_forfeited, principal_penalty)`.
    pub fn early_cancel_payout(&self, now: i64) -> (i128, i128, i128, i128) {
        let interest = self.accrued_interest(now);
        let decay = self.decay_ppm(now);

        let tier_ratio_bps = self.base_apy_bps * 10_000 / MAX_BASE_APY_BPS;
        let ip_bps =
            BASE_INTEREST_PENALTY_BPS + INTEREST_PENALTY_SCALE_BPS * tier_ratio_bps / 10_000;
        let pp_bps =
            BASE_PRINCIPAL_PENALTY_BPS + PRINCIPAL_PENALTY_SCALE_BPS * tier_ratio_bps / 10_000;

        let interest_forfeited = interest * ip_bps as i128 * decay / (10_000 * 1_000_000);
        let principal_penalty = self.amount * pp_bps as i128 * decay / (10_000 * 1_000_000);

        let interest_kept = interest - interest_forfeited;
        let payout = self.amount - principal_penalty + interest_kept;
        (payout, interest_kept, interest_forfeited, principal_penalty)
    }
}

/// All stake records, network-wide.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StakingPool {
    stakes: BTreeMap<String, StakeRecord>,
    by_address: BTreeMap<String, Vec<String>>,
    /// Sum of active principal, micro-units.
    pub total_staked: i128,
    /// Interest credited over the pool's lifetime.
    pub total_interest_paid: i128,
}

/// A maturity payout: `(address, principal, interest)`.
pub type MaturityPayout = (String, i128, i128);

impl StakingPool {
    /// An empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stake from an applied Stake transaction. The tx id is
    /// the stake id, so one transaction creates at most one stake.
    pub fn record_stake(
        &mut self,
        tx_id: &str,
        address: &str,
        amount: i128,
        tier: StakeTier,
        circulating: i128,
        now: i64,
    ) -> Result<&StakeRecord, StakeError> {
        if self.stakes.contains_key(tx_id) {
            return Err(StakeError::AlreadyRecorded(tx_id.to_string()));
        }
        if amount < MIN_STAKE_AMOUNT {
            return Err(StakeError::BelowMinimum);
        }
        let (lock_duration, base_apy_bps) = tier_params(tier);
        let multiplier = demand_multiplier_bps(self.total_staked, circulating);
        let effective_apy_bps = (base_apy_bps as i128 * multiplier / 10_000) as u64;
        let record = StakeRecord {
            stake_id: tx_id.to_string(),
            address: address.to_string(),
            amount,
            tier,
            base_apy_bps,
            effective_apy_bps,
            lock_duration,
            start_time: now,
            maturity_time: if lock_duration > 0 { now + lock_duration } else { 0 },
            circulating_at_start: circulating,
            matured: false,
            cancelled: false,
            payout_amount: 0,
        };
        self.total_staked += amount;
        self.by_address
            .entry(address.to_string())
            .or_default()
            .push(tx_id.to_string());
        Ok(self.stakes.entry(tx_id.to_string()).or_insert(record))
    }

    /// Process all stakes whose lock expired at or before `now`.
    /// Returns the payouts so the closer can credit each account.
    pub fn mature_stakes(&mut self, now: i64) -> Vec<MaturityPayout> {
        let mut payouts = Vec::new();
        for record in self.stakes.values_mut() {
            if !record.is_active() || record.tier == StakeTier::Flexible {
                continue;
            }
            if now >= record.maturity_time {
                let interest = record.maturity_interest();
                record.matured = true;
                record.payout_amount = record.amount + interest;
                self.total_staked -= record.amount;
                self.total_interest_paid += interest;
                payouts.push((record.address.clone(), record.amount, interest));
            }
        }
        payouts
    }

    /// Cancel a stake early. Returns
    /// `(payout, interest_kept, interest_forfeited, principal_penalty)`.
    pub fn cancel_stake(
        &mut self,
        stake_id: &str,
        requester: &str,
        now: i64,
    ) -> Result<(i128, i128, i128, i128), StakeError> {
        let record = self
            .stakes
            .get_mut(stake_id)
            .ok_or_else(|| StakeError::NotFound(stake_id.to_string()))?;
        if record.address != requester {
            return Err(StakeError::WrongOwner(stake_id.to_string()));
        }
        if record.matured || record.cancelled {
            return Err(StakeError::AlreadyResolved(stake_id.to_string()));
        }
        let (payout, kept, forfeited, principal_penalty) = record.early_cancel_payout(now);
        record.cancelled = true;
        record.payout_amount = payout;
        self.total_staked -= record.amount;
        if kept > 0 {
            self.total_interest_paid += kept;
        }
        Ok((payout, kept, forfeited, principal_penalty))
    }

    /// Look up a record.
    pub fn get(&self, stake_id: &str) -> Option<&StakeRecord> {
        self.stakes.get(stake_id)
    }

    /// Active stakes for an address.
    pub fn active_stakes(&self, address: &str) -> Vec<&StakeRecord> {
        self.by_address
            .get(address)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.stakes.get(id))
                    .filter(|record| record.is_active())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of active stakes.
    pub fn active_count(&self) -> usize {
        self.stakes.values().filter(|r| r.is_active()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CIRCULATING: i128 = 100_000_000_000 * 1_000_000;

    fn pool_with_stake(tier: StakeTier, amount: i128) -> (StakingPool, String) {
        let mut pool = StakingPool::new();
        pool.record_stake("stake-1", "nAlice", amount, tier, CIRCULATING, 1_000)
            .unwrap();
        (pool, "stake-1".to_string())
    }

    #[test]
    fn demand_multiplier_tracks_the_target_ratio() {
        // Nothing staked: multiplier is pinned at 1.9 (capped by raw formula).
        assert_eq!(demand_multiplier_bps(0, 10_000), 19_000);
        // At exactly the 30 % target: 1.0.
        assert_eq!(demand_multiplier_bps(3_000, 10_000), 10_000);
        // Everything staked: clamped at the floor.
        assert_eq!(demand_multiplier_bps(10_000, 10_000), 5_000);
    }

    #[test]
    fn minimum_stake_is_enforced() {
        let mut pool = StakingPool::new();
        let err = pool.record_stake("s", "nA", MIN_STAKE_AMOUNT - 1, StakeTier::Days30, 1, 0);
        assert_eq!(err.unwrap_err(), StakeError::BelowMinimum);
    }

    #[test]
    fn duplicate_tx_id_is_rejected() {
        let (mut pool, id) = pool_with_stake(StakeTier::Days30, 10_000_000);
        let err = pool.record_stake(&id, "nAlice", 10_000_000, StakeTier::Days30, 1, 0);
        assert!(matches!(err.unwrap_err(), StakeError::AlreadyRecorded(_)));
    }

    #[test]
    fn maturity_pays_principal_plus_interest() {
        let (mut pool, id) = pool_with_stake(StakeTier::Days365, 1_000 * 1_000_000);
        let record = pool.get(&id).unwrap().clone();
        let payouts = pool.mature_stakes(record.maturity_time);
        assert_eq!(payouts.len(), 1);
        let (address, principal, interest) = &payouts[0];
        assert_eq!(address, "nAlice");
        assert_eq!(*principal, 1_000 * 1_000_000);
        assert_eq!(*interest, record.maturity_interest());
        assert!(*interest > 0);
        assert_eq!(pool.total_staked, 0);
    }

    #[test]
    fn not_yet_mature_stakes_stay_put() {
        let (mut pool, id) = pool_with_stake(StakeTier::Days30, 10_000_000);
        let maturity = pool.get(&id).unwrap().maturity_time;
        assert!(pool.mature_stakes(maturity - 1).is_empty());
        assert!(pool.get(&id).unwrap().is_active());
    }

    #[test]
    fn early_cancel_at_start_burns_the_maximum_penalty() {
        let (mut pool, id) = pool_with_stake(StakeTier::Days365, 1_000 * 1_000_000);
        let (payout, kept, _, principal_penalty) =
            pool.cancel_stake(&id, "nAlice", 1_000).unwrap();
        // Full decay: the 365-day tier burns 10 % of principal.
        assert_eq!(principal_penalty, 100 * 1_000_000);
        assert_eq!(kept, 0);
        assert_eq!(payout, 900 * 1_000_000);
    }

    #[test]
    fn penalty_decays_to_zero_at_maturity() {
        let (mut pool, id) = pool_with_stake(StakeTier::Days90, 1_000 * 1_000_000);
        let record = pool.get(&id).unwrap().clone();
        let (payout, kept, forfeited, principal_penalty) = pool
            .cancel_stake(&id, "nAlice", record.maturity_time)
            .unwrap();
        assert_eq!(principal_penalty, 0);
        assert_eq!(forfeited, 0);
        assert_eq!(payout, record.amount + kept);
    }

    #[test]
    fn flexible_stakes_cancel_without_penalty() {
        let (mut pool, id) = pool_with_stake(StakeTier::Flexible, 50_000_000);
        let (payout, _, forfeited, principal_penalty) =
            pool.cancel_stake(&id, "nAlice", 5_000).unwrap();
        assert_eq!(forfeited, 0);
        assert_eq!(principal_penalty, 0);
        assert!(payout >= 50_000_000);
    }

    #[test]
    fn only_the_owner_can_cancel() {
        let (mut pool, id) = pool_with_stake(StakeTier::Days30, 10_000_000);
        let err = pool.cancel_stake(&id, "nBob", 2_000);
        assert!(matches!(err.unwrap_err(), StakeError::WrongOwner(_)));
    }
}
