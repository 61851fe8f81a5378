// Copyright (c) 2025 The Rivulet Project

//! Sub-engines invoked by the state machine.
//!
//! Each manager owns its own state and is reached only through the
//! [`Ledger`](crate::ledger::Ledger); none of them hold references back
//! into accounts. All managers are plain values so the invariant
//! checker can checkpoint them by cloning.

pub mod amendments;
pub mod amm;
pub mod channels;
pub mod checks;
pub mod credentials;
pub mod did;
pub mod escrow;
pub mod hooks;
pub mod mpt;
pub mod nftoken;
pub mod oracle;
pub mod order_book;
pub mod staking;
pub mod tickets;
pub mod xchain;

use serde::{Deserialize, Serialize};

/// The full set of sub-engines owned by a ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Engines {
    /// DEX order book.
    pub order_book: order_book::OrderBook,
    /// Staking pool.
    pub staking: staking::StakingPool,
    /// Escrows.
    pub escrows: escrow::EscrowManager,
    /// Payment channels.
    pub channels: channels::ChannelManager,
    /// Checks.
    pub checks: checks::CheckManager,
    /// AMM pools.
    pub amm: amm::AmmManager,
    /// NFTs and NFT offers.
    pub nftokens: nftoken::NfTokenManager,
    /// Price oracles.
    pub oracles: oracle::OracleManager,
    /// DID documents.
    pub dids: did::DidManager,
    /// Multi-purpose tokens.
    pub mpt: mpt::MptManager,
    /// Credentials.
    pub credentials: credentials::CredentialManager,
    /// Cross-chain bridges.
    pub xchain: xchain::XChainManager,
    /// Account hooks.
    pub hooks: hooks::HooksManager,
    /// Tickets.
    pub tickets: tickets::TicketManager,
    /// Amendment registry.
    pub amendments: amendments::AmendmentRegistry,
}

impl Engines {
    /// Native micro-units locked across all sub-engines: escrows, open
    /// channels, AMM reserves, cross-chain commits and stake principal.
    pub fn total_native_locked(&self) -> i128 {
        self.escrows.total_locked()
            + self.channels.total_locked()
            + self.amm.total_native_locked()
            + self.xchain.total_locked()
            + self.staking.total_staked
    }
}
