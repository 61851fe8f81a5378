// Copyright (c) 2025 The Rivulet Project

//! Account keys for Rivulet wallets.
//!
//! An account holds two private scalars: the *view* key, which lets its
//! owner detect confidential outputs addressed to them, and the *spend*
//! key, which is needed to actually spend. The pair of public points is
//! published as a [`PublicAddress`]; the ledger-side account address is
//! a short hash of that pair.

#![deny(missing_docs)]

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use rand_core::{CryptoRng, RngCore};
use riv_crypto_keys::{hash256, hash_to_scalar};
use riv_ring_signature::{recover_onetime_private, stealth_recover};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

const VIEW_SEED_DOMAIN: &[u8] = b"riv.account.view";
const SPEND_SEED_DOMAIN: &[u8] = b"riv.account.spend";

/// A full account key: view and spend private scalars.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AccountKey {
    view_private: Scalar,
    spend_private: Scalar,
}

impl AccountKey {
    /// Generate a fresh random account.
    pub fn from_random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self {
            view_private: Scalar::random(rng),
            spend_private: Scalar::random(rng),
        }
    }

    /// Derive an account deterministically from seed bytes.
    pub fn from_seed(seed: &[u8]) -> Self {
        Self {
            view_private: hash_to_scalar(VIEW_SEED_DOMAIN, &[seed]),
            spend_private: hash_to_scalar(SPEND_SEED_DOMAIN, &[seed]),
        }
    }

    /// The view private scalar.
    pub fn view_private(&self) -> &Scalar {
        &self.view_private
    }

    /// The spend private scalar.
    pub fn spend_private(&self) -> &Scalar {
        &self.spend_private
    }

    /// The public address for this account.
    pub fn public_address(&self) -> PublicAddress {
        PublicAddress {
            view_public: RistrettoPoint::mul_base(&self.view_private)
                .compress()
                .to_bytes(),
            spend_public: RistrettoPoint::mul_base(&self.spend_private)
                .compress()
                .to_bytes(),
        }
    }

    /// Check whether a stealth output belongs to this account.
    pub fn owns_output(
        &self,
        one_time_address: &[u8; 32],
        ephemeral_pub: &[u8; 32],
        view_tag: u8,
    ) -> bool {
        let spend_pub = self.public_address().spend_public;
        match stealth_recover(&self.view_private, &spend_pub, ephemeral_pub, view_tag) {
            Some(addr) => &addr == one_time_address,
            None => false,
        }
    }

    /// Recover the one-time private key for an owned output.
    ///
    /// Call only after [`Self::owns_output`] returned true.
    pub fn recover_spend_key(&self, ephemeral_pub: &[u8; 32]) -> Option<Scalar> {
        recover_onetime_private(&self.view_private, &self.spend_private, ephemeral_pub)
    }
}

impl core::fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "AccountKey({})", self.public_address().address())
    }
}

/// The public half of an account: view and spend public keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicAddress {
    /// Compressed view public key `V = a*G`.
    pub view_public: [u8; 32],
    /// Compressed spend public key `S = s*G`.
    pub spend_public: [u8; 32],
}

impl PublicAddress {
    /// The ledger address string: `n` followed by 20 bytes of the hash
    /// of both public keys.
    pub fn address(&self) -> String {
        let mut data = [0u8; 64];
        data[..32].copy_from_slice(&self.view_public);
        data[32..].copy_from_slice(&self.spend_public);
        let digest = hash256(&data);
        format!("n{}", hex::encode(&digest[..20]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use riv_ring_signature::stealth_generate;

    #[test]
    fn seed_derivation_is_deterministic() {
        let a = AccountKey::from_seed(b"alice");
        let b = AccountKey::from_seed(b"alice");
        assert_eq!(a.public_address(), b.public_address());
        assert_ne!(
            a.public_address(),
            AccountKey::from_seed(b"bob").public_address()
        );
    }

    #[test]
    fn address_is_stable_and_prefixed() {
        let key = AccountKey::from_seed(b"carol");
        let addr = key.public_address().address();
        assert!(addr.starts_with('n'));
        assert_eq!(addr.len(), 41);
        assert_eq!(addr, key.public_address().address());
    }

    #[test]
    fn owns_output_detects_own_and_rejects_foreign() {
        let mine = AccountKey::from_random(&mut OsRng);
        let theirs = AccountKey::from_random(&mut OsRng);
        let addr = mine.public_address();

        let out = stealth_generate(&addr.view_public, &addr.spend_public, &mut OsRng).unwrap();
        assert!(mine.owns_output(&out.one_time_address, &out.ephemeral_pub, out.view_tag));
        assert!(!theirs.owns_output(&out.one_time_address, &out.ephemeral_pub, out.view_tag));
    }

    #[test]
    fn recovered_spend_key_matches_output() {
        let key = AccountKey::from_random(&mut OsRng);
        let addr = key.public_address();
        let out = stealth_generate(&addr.view_public, &addr.spend_public, &mut OsRng).unwrap();
        let x = key.recover_spend_key(&out.ephemeral_pub).unwrap();
        let p = RistrettoPoint::mul_base(&x).compress().to_bytes();
        assert_eq!(p, out.one_time_address);
    }
}
