// Copyright (c) 2025 The Rivulet Project

//! Key images.
//!
//! `I = x * Hp(P)` where `x` is a one-time private key and `P = x*G` its
//! public key. The image is unique per key but unlinkable to it, which
//! is what makes ring-signature double-spend detection possible.

use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use riv_crypto_keys::hash_to_point;

const KEY_IMAGE_DOMAIN: &[u8] = b"riv.key_image";

/// Hash a public key to a point for key-image construction.
pub(crate) fn hash_pubkey_to_point(pubkey: &RistrettoPoint) -> RistrettoPoint {
    hash_to_point(KEY_IMAGE_DOMAIN, pubkey.compress().as_bytes())
}

/// The key image of a one-time key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct KeyImage {
    bytes: [u8; 32],
}

impl KeyImage {
    /// Compute the key image of a one-time private key.
    pub fn from_private(private: &Scalar) -> Self {
        let public = RistrettoPoint::mul_base(private);
        let point = hash_pubkey_to_point(&public) * private;
        Self {
            bytes: point.compress().to_bytes(),
        }
    }

    /// Wrap raw bytes (already-validated wire form).
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self { bytes: arr })
    }

    /// The 32-byte encoding.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.bytes
    }

    /// Hex encoding, used as the ledger's spent-set key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Decompress into a group element. `None` if the bytes are not a
    /// valid point.
    pub(crate) fn decompress(&self) -> Option<RistrettoPoint> {
        CompressedRistretto(self.bytes).decompress()
    }
}
