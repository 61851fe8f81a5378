// Copyright (c) 2025 The Rivulet Project

//! Closed-ledger headers.

use serde::{Deserialize, Serialize};

use crate::amount::MICRO_PER_UNIT;
use riv_crypto_keys::hash256;

/// Header of a closed ledger. Immutable after close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerHeader {
    /// Ledger sequence number.
    pub sequence: i64,
    /// Hex hash of the previous header; all zeroes for genesis.
    pub parent_hash: String,
    /// Root of the transaction SHAMap.
    pub tx_hash: String,
    /// Root of the state SHAMap.
    pub state_hash: String,
    /// Close time in seconds, rounded to the network resolution.
    pub close_time: i64,
    /// Number of transactions closed in this ledger.
    pub tx_count: i64,
    /// Total native supply at close, in micro-units.
    pub total_native: i128,
    /// This header's own hash, set at close.
    pub hash: String,
}

impl LedgerHeader {
    /// The serialization hashed into `hash`: big-endian `i64` sequence,
    /// UTF-8 parent/tx/state hash hex, big-endian `i64` close time and
    /// tx count, and a big-endian `f64` human view of the supply. The
    /// `f64` is a lossy view; the canonical supply is the integer.
    pub fn serialize_for_hash(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 * 4 + self.parent_hash.len() * 3);
        out.extend_from_slice(&self.sequence.to_be_bytes());
        out.extend_from_slice(self.parent_hash.as_bytes());
        out.extend_from_slice(self.tx_hash.as_bytes());
        out.extend_from_slice(self.state_hash.as_bytes());
        out.extend_from_slice(&self.close_time.to_be_bytes());
        out.extend_from_slice(&self.tx_count.to_be_bytes());
        let display_supply = self.total_native as f64 / MICRO_PER_UNIT as f64;
        out.extend_from_slice(&display_supply.to_be_bytes());
        out
    }

    /// Compute and return the header hash.
    pub fn compute_hash(&self) -> String {
        hex::encode(hash256(&self.serialize_for_hash()))
    }

    /// The zero parent hash used by the genesis ledger.
    pub fn zero_hash() -> String {
        "0".repeat(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LedgerHeader {
        LedgerHeader {
            sequence: 3,
            parent_hash: "ab".repeat(32),
            tx_hash: "cd".repeat(32),
            state_hash: "ef".repeat(32),
            close_time: 1_700_000_000,
            tx_count: 4,
            total_native: 100_000_000_000 * MICRO_PER_UNIT,
            hash: String::new(),
        }
    }

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(sample().compute_hash(), sample().compute_hash());
    }

    #[test]
    fn hash_covers_every_field() {
        let base = sample().compute_hash();
        for mutate in [
            |h: &mut LedgerHeader| h.sequence += 1,
            |h: &mut LedgerHeader| h.parent_hash = "00".repeat(32),
            |h: &mut LedgerHeader| h.tx_hash = "00".repeat(32),
            |h: &mut LedgerHeader| h.state_hash = "00".repeat(32),
            |h: &mut LedgerHeader| h.close_time += 10,
            |h: &mut LedgerHeader| h.tx_count += 1,
            |h: &mut LedgerHeader| h.total_native -= 1_000_000,
        ] {
            let mut header = sample();
            mutate(&mut header);
            assert_ne!(header.compute_hash(), base);
        }
    }

    #[test]
    fn zero_hash_is_64_zeroes() {
        assert_eq!(LedgerHeader::zero_hash().len(), 64);
        assert!(LedgerHeader::zero_hash().chars().all(|c| c == '0'));
    }
}
