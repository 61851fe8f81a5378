// Copyright (c) 2025 The Rivulet Project

//! Core data model for the Rivulet ledger.
//!
//! Everything consensus ultimately binds lives here: fixed-point
//! amounts, the transaction sum type with its signing preimage, the
//! result-code taxonomy, ledger headers with their hash layout, and the
//! SHAMap authenticated map that produces the tx/state roots.

#![deny(missing_docs)]

mod amount;
mod header;
mod result;
mod shamap;
mod transaction;

pub use amount::{
    mul_bps_floor, mul_ppm_ceil, mul_ppm_floor, mul_ratio_floor, Amount, MICRO_PER_UNIT,
    NATIVE_CURRENCY, PPM, RATE_ONE,
};
pub use header::LedgerHeader;
pub use result::ResultCode;
pub use shamap::ShaMap;
pub use transaction::{
    AccountFlag, ConfidentialProof, HookRule, PriceEntry, SignerEntry, StakeTier, Transaction,
    TxBody, TxHeader,
};
