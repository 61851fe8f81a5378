// Copyright (c) 2025 The Rivulet Project

//! Payment channels: rapid off-ledger micropayments with on-ledger
//! open, fund, claim and close.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a channel operation was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// No channel with that id.
    #[error("channel {0} not found")]
    NotFound(String),
    /// The channel is closed.
    #[error("channel {0} is closed")]
    Closed(String),
    /// The channel passed its cancel_after.
    #[error("channel {0} has expired")]
    Expired(String),
    /// Claims must be monotonically increasing and within the deposit.
    #[error("claim balance out of range")]
    BadClaim,
    /// Only the channel parties may act here.
    #[error("not a channel party")]
    NotParty,
    /// The settle delay has not elapsed.
    #[error("settle delay not elapsed until {0}")]
    SettleDelay(i64),
}

/// A unidirectional payment channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentChannel {
    /// Unique id (= creating tx id).
    pub channel_id: String,
    /// Creator and funder.
    pub account: String,
    /// Recipient of claims.
    pub destination: String,
    /// Total native micro-units deposited.
    pub amount: i128,
    /// Cumulative micro-units already claimed by the destination.
    pub balance: i128,
    /// Seconds the creator must wait after requesting close.
    pub settle_delay: i64,
    /// Hex public key authorized to sign claims.
    pub public_key: String,
    /// Absolute expiration; 0 = none.
    pub cancel_after: i64,
    /// Creation time.
    pub create_time: i64,
    /// The creator requested close.
    pub close_requested: bool,
    /// When close was requested.
    pub close_request_time: i64,
    /// Fully settled.
    pub closed: bool,
}

impl PaymentChannel {
    /// Micro-units still claimable.
    pub fn available(&self) -> i128 {
        (self.amount - self.balance).max(0)
    }
}

/// Outcome of a close request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The channel is now closed; the remainder refunds the creator.
    Closed {
        /// Unclaimed micro-units returned to the creator.
        remainder: i128,
    },
    /// The settle-delay clock started; the channel stays open.
    DelayStarted,
}

/// All payment channels on the ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelManager {
    channels: BTreeMap<String, PaymentChannel>,
}

impl ChannelManager {
    /// An empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new channel.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &mut self,
        channel_id: &str,
        account: &str,
        destination: &str,
        amount: i128,
        settle_delay: i64,
        public_key: &str,
        cancel_after: i64,
        now: i64,
    ) -> &PaymentChannel {
        let channel = PaymentChannel {
            channel_id: channel_id.to_string(),
            account: account.to_string(),
            destination: destination.to_string(),
            amount,
            balance: 0,
            settle_delay,
            public_key: public_key.to_string(),
            cancel_after,
            create_time: now,
            close_requested: false,
            close_request_time: 0,
            closed: false,
        };
        self.channels
            .entry(channel_id.to_string())
            .or_insert(channel)
    }

    /// Add funds to an open channel. Only the creator may fund.
    pub fn fund(
        &mut self,
        channel_id: &str,
        funder: &str,
        additional: i128,
    ) -> Result<&PaymentChannel, ChannelError> {
        let channel = self
            .channels
            .get_mut(channel_id)
            .ok_or_else(|| ChannelError::NotFound(channel_id.to_string()))?;
        if channel.closed {
            return Err(ChannelError::Closed(channel_id.to_string()));
        }
        if channel.account != funder {
            return Err(ChannelError::NotParty);
        }
        channel.amount += additional;
        Ok(channel)
    }

    /// Claim a new cumulative balance. Returns the incremental payout
    /// owed to the destination.
    pub fn claim(
        &mut self,
        channel_id: &str,
        new_balance: i128,
        now: i64,
    ) -> Result<i128, ChannelError> {
        let channel = self
            .channels
            .get_mut(channel_id)
            .ok_or_else(|| ChannelError::NotFound(channel_id.to_string()))?;
        if channel.closed {
            return Err(ChannelError::Closed(channel_id.to_string()));
        }
        if channel.cancel_after > 0 && now >= channel.cancel_after {
            return Err(ChannelError::Expired(channel_id.to_string()));
        }
        if new_balance < channel.balance || new_balance > channel.amount {
            return Err(ChannelError::BadClaim);
        }
        let payout = new_balance - channel.balance;
        channel.balance = new_balance;
        Ok(payout)
    }

    /// Request or finalize closure.
    ///
    /// The destination closes immediately. The creator starts the
    /// settle-delay clock on the first request and closes once it has
    /// elapsed.
    pub fn request_close(
        &mut self,
        channel_id: &str,
        requester: &str,
        now: i64,
    ) -> Result<CloseOutcome, ChannelError> {
        let channel = self
            .channels
            .get_mut(channel_id)
            .ok_or_else(|| ChannelError::NotFound(channel_id.to_string()))?;
        if channel.closed {
            return Err(ChannelError::Closed(channel_id.to_string()));
        }
        if requester == channel.destination {
            channel.closed = true;
            return Ok(CloseOutcome::Closed {
                remainder: channel.available(),
            });
        }
        if requester != channel.account {
            return Err(ChannelError::NotParty);
        }
        if channel.close_requested {
            let settle_at = channel.close_request_time + channel.settle_delay;
            if now >= settle_at {
                channel.closed = true;
                return Ok(CloseOutcome::Closed {
                    remainder: channel.available(),
                });
            }
            return Err(ChannelError::SettleDelay(settle_at));
        }
        channel.close_requested = true;
        channel.close_request_time = now;
        Ok(CloseOutcome::DelayStarted)
    }

    /// Look up a channel.
    pub fn get(&self, channel_id: &str) -> Option<&PaymentChannel> {
        self.channels.get(channel_id)
    }

    /// Open channels involving an account.
    pub fn for_account(&self, account: &str) -> Vec<&PaymentChannel> {
        self.channels
            .values()
            .filter(|c| !c.closed && (c.account == account || c.destination == account))
            .collect()
    }

    /// Native micro-units locked in open channels.
    pub fn total_locked(&self) -> i128 {
        self.channels
            .values()
            .filter(|c| !c.closed)
            .map(|c| c.available())
            .sum()
    }
}
