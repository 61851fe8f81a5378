// Copyright (c) 2025 The Rivulet Project

//! Cross-chain bridge attestation skeleton: bridges, commits, witness
//! attestations and quorum-gated claims.

use std::collections::{BTreeMap, BTreeSet};

use riv_crypto_keys::hash256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default witness quorum.
pub const DEFAULT_MIN_WITNESSES: usize = 1;

/// Why a bridge operation was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum XChainError {
    /// A bridge for these doors already exists.
    #[error("bridge already exists")]
    BridgeExists,
    /// No bridge with that id.
    #[error("bridge {0} not found")]
    BridgeNotFound(String),
    /// No claim with that id.
    #[error("claim {0} not found")]
    ClaimNotFound(i64),
    /// The claim has no commit backing it.
    #[error("claim {0} has no commit")]
    NotCommitted(i64),
    /// Not enough witness attestations yet.
    #[error("attestation quorum not reached")]
    NoQuorum,
    /// The claim was already redeemed.
    #[error("claim {0} already redeemed")]
    AlreadyClaimed(i64),
}

/// A bridge between two door accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeDefinition {
    /// Deterministic bridge id.
    pub bridge_id: String,
    /// Door on the locking chain.
    pub locking_door: String,
    /// Door on the issuing chain.
    pub issuing_door: String,
    /// Bridged currency code.
    pub currency: String,
}

/// A claim being attested across the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    /// Claim id, unique per bridge.
    pub claim_id: i64,
    /// Who committed value on the locking side.
    pub committer: String,
    /// Destination on the issuing side.
    pub destination: String,
    /// Micro-units committed.
    pub amount: i128,
    /// Witnesses that attested.
    pub attestations: BTreeSet<String>,
    /// Value locked on the locking side.
    pub committed: bool,
    /// Redeemed on the issuing side.
    pub claimed: bool,
}

/// All bridges and claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XChainManager {
    bridges: BTreeMap<String, BridgeDefinition>,
    /// bridge_id -> claim_id -> record.
    claims: BTreeMap<String, BTreeMap<i64, ClaimRecord>>,
    /// Required attestations before a claim can redeem.
    pub min_witnesses: usize,
    /// Native micro-units locked by commits.
    locked: i128,
}

impl Default for XChainManager {
    fn default() -> Self {
        Self {
            bridges: BTreeMap::new(),
            claims: BTreeMap::new(),
            min_witnesses: DEFAULT_MIN_WITNESSES,
            locked: 0,
        }
    }
}

impl XChainManager {
    /// A manager with the default witness quorum.
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a bridge. Returns its id.
    pub fn create_bridge(
        &mut self,
        locking_door: &str,
        issuing_door: &str,
        currency: &str,
    ) -> Result<String, XChainError> {
        let bridge_id = hex::encode(
            &hash256(format!("bridge:{locking_door}:{issuing_door}:{currency}").as_bytes())[..16],
        );
        if self.bridges.contains_key(&bridge_id) {
            return Err(XChainError::BridgeExists);
        }
        self.bridges.insert(
            bridge_id.clone(),
            BridgeDefinition {
                bridge_id: bridge_id.clone(),
                locking_door: locking_door.to_string(),
                issuing_door: issuing_door.to_string(),
                currency: currency.to_string(),
            },
        );
        Ok(bridge_id)
    }

    /// Commit value against a claim id on the locking side. The caller
    /// has already debited the committer.
    pub fn commit(
        &mut self,
        bridge_id: &str,
        claim_id: i64,
        committer: &str,
        destination: &str,
        amount: i128,
    ) -> Result<(), XChainError> {
        if !self.bridges.contains_key(bridge_id) {
            return Err(XChainError::BridgeNotFound(bridge_id.to_string()));
        }
        let claims = self.claims.entry(bridge_id.to_string()).or_default();
        let record = claims.entry(claim_id).or_insert_with(|| ClaimRecord {
            claim_id,
            committer: committer.to_string(),
            destination: destination.to_string(),
            amount: 0,
            attestations: BTreeSet::new(),
            committed: false,
            claimed: false,
        });
        record.committed = true;
        record.amount += amount;
        record.destination = destination.to_string();
        self.locked += amount;
        Ok(())
    }

    /// Record a witness attestation for a claim.
    pub fn add_attestation(
        &mut self,
        bridge_id: &str,
        claim_id: i64,
        witness: &str,
    ) -> Result<usize, XChainError> {
        if !self.bridges.contains_key(bridge_id) {
            return Err(XChainError::BridgeNotFound(bridge_id.to_string()));
        }
        let record = self
            .claims
            .get_mut(bridge_id)
            .and_then(|c| c.get_mut(&claim_id))
            .ok_or(XChainError::ClaimNotFound(claim_id))?;
        record.attestations.insert(witness.to_string());
        Ok(record.attestations.len())
    }

    /// Redeem a claim on the issuing side. Requires a commit and the
    /// witness quorum. Returns `(destination, amount)` for the caller
    /// to credit and mint.
    pub fn claim(
        &mut self,
        bridge_id: &str,
        claim_id: i64,
    ) -> Result<(String, i128), XChainError> {
        if !self.bridges.contains_key(bridge_id) {
            return Err(XChainError::BridgeNotFound(bridge_id.to_string()));
        }
        let record = self
            .claims
            .get_mut(bridge_id)
            .and_then(|c| c.get_mut(&claim_id))
            .ok_or(XChainError::ClaimNotFound(claim_id))?;
        if record.claimed {
            return Err(XChainError::AlreadyClaimed(claim_id));
        }
        if !record.committed {
            return Err(XChainError::NotCommitted(claim_id));
        }
        if record.attestations.len() < self.min_witnesses {
            return Err(XChainError::NoQuorum);
        }
        record.claimed = true;
        Ok((record.destination.clone(), record.amount))
    }

    /// Look up a bridge.
    pub fn get_bridge(&self, bridge_id: &str) -> Option<&BridgeDefinition> {
        self.bridges.get(bridge_id)
    }

    /// Look up a claim.
    pub fn get_claim(&self, bridge_id: &str, claim_id: i64) -> Option<&ClaimRecord> {
        self.claims.get(bridge_id)?.get(&claim_id)
    }

    /// Native micro-units locked by commits.
    pub fn total_locked(&self) -> i128 {
        self.locked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (XChainManager, String) {
        let mut m = XChainManager {
            min_witnesses: 2,
            ..XChainManager::default()
        };
        let id = m.create_bridge("nLockDoor", "nIssueDoor", "NXF").unwrap();
        (m, id)
    }

    #[test]
    fn commit_attest_claim_flow() {
        let (mut m, bridge) = setup();
        m.commit(&bridge, 1, "nAlice", "nBob", 500_000).unwrap();
        assert_eq!(m.total_locked(), 500_000);

        assert_eq!(m.claim(&bridge, 1).unwrap_err(), XChainError::NoQuorum);
        m.add_attestation(&bridge, 1, "nW1").unwrap();
        assert_eq!(m.claim(&bridge, 1).unwrap_err(), XChainError::NoQuorum);
        m.add_attestation(&bridge, 1, "nW2").unwrap();

        let (destination, amount) = m.claim(&bridge, 1).unwrap();
        assert_eq!(destination, "nBob");
        assert_eq!(amount, 500_000);
        assert_eq!(
            m.claim(&bridge, 1).unwrap_err(),
            XChainError::AlreadyClaimed(1)
        );
    }

    #[test]
    fn duplicate_witnesses_do_not_double_count() {
        let (mut m, bridge) = setup();
        m.commit(&bridge, 1, "nAlice", "nBob", 1).unwrap();
        m.add_attestation(&bridge, 1, "nW1").unwrap();
        assert_eq!(m.add_attestation(&bridge, 1, "nW1").unwrap(), 1);
        assert_eq!(m.claim(&bridge, 1).unwrap_err(), XChainError::NoQuorum);
    }

    #[test]
    fn attestation_requires_a_claim() {
        let (mut m, bridge) = setup();
        assert_eq!(
            m.add_attestation(&bridge, 9, "nW1").unwrap_err(),
            XChainError::ClaimNotFound(9)
        );
    }

    #[test]
    fn duplicate_bridge_rejected() {
        let (mut m, _) = setup();
        assert_eq!(
            m.create_bridge("nLockDoor", "nIssueDoor", "NXF").unwrap_err(),
            XChainError::BridgeExists
        );
    }
}
