// Copyright (c) 2025 The Rivulet Project

//! Key types and signing primitives for Rivulet.
//!
//! All keys live on the Ristretto group. Signing is Schnorr over a
//! 32-byte digest with a deterministic nonce, so two signatures over the
//! same digest by the same key are byte-identical. `hash256` is
//! BLAKE2b-256 and is the single content hash used across the ledger,
//! the consensus engine and the wire layouts.

#![deny(missing_docs)]

use blake2::digest::consts::U32;
use blake2::{Blake2b, Blake2b512, Digest};
use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use displaydoc::Display;
use rand_core::{CryptoRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// BLAKE2b with a 32-byte output.
pub type Blake2b256 = Blake2b<U32>;

/// Domain separator for signing nonces.
const NONCE_DOMAIN: &[u8] = b"riv.schnorr.nonce";
/// Domain separator for signature challenges.
const CHALLENGE_DOMAIN: &[u8] = b"riv.schnorr.challenge";

/// Length of a serialized signature (R || s).
pub const SIGNATURE_LEN: usize = 64;

/// An error when parsing key or signature material.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum KeyError {
    /// wrong byte length
    LengthMismatch,
    /// bytes do not encode a valid group element
    InvalidPoint,
    /// bytes do not encode a valid scalar
    InvalidScalar,
}

impl std::error::Error for KeyError {}

/// Compute the BLAKE2b-256 digest of `bytes`.
pub fn hash256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Hash arbitrary byte chunks to a scalar via BLAKE2b-512.
pub fn hash_to_scalar(domain: &[u8], chunks: &[&[u8]]) -> Scalar {
    let mut hasher = Blake2b512::new();
    hasher.update(domain);
    for chunk in chunks {
        hasher.update(chunk);
    }
    Scalar::from_hash(hasher)
}

/// Hash arbitrary bytes to a Ristretto point.
pub fn hash_to_point(domain: &[u8], bytes: &[u8]) -> RistrettoPoint {
    let mut hasher = Blake2b512::new();
    hasher.update(domain);
    hasher.update(bytes);
    RistrettoPoint::from_hash(hasher)
}

/// A private key: a Ristretto scalar. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey(Scalar);

impl PrivateKey {
    /// Generate a fresh random key.
    pub fn from_random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self(Scalar::random(rng))
    }

    /// Build a key from 32 bytes, reduced mod the group order.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| KeyError::LengthMismatch)?;
        Ok(Self(Scalar::from_bytes_mod_order(arr)))
    }

    /// The raw scalar bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// The matching public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(RistrettoPoint::mul_base(&self.0))
    }

    /// Borrow the underlying scalar.
    pub fn as_scalar(&self) -> &Scalar {
        &self.0
    }

    /// Sign a 32-byte digest.
    ///
    /// The nonce is derived from the key and the digest, so signing is
    /// deterministic and never reuses a nonce across messages.
    pub fn sign(&self, digest: &[u8; 32]) -> Signature {
        let k = hash_to_scalar(NONCE_DOMAIN, &[&self.0.to_bytes(), digest]);
        let big_r = RistrettoPoint::mul_base(&k);
        let pubkey = self.public_key();
        let e = challenge(&big_r.compress(), &pubkey, digest);
        let s = k + e * self.0;
        Signature {
            r: big_r.compress().to_bytes(),
            s: s.to_bytes(),
        }
    }
}

impl From<Scalar> for PrivateKey {
    fn from(scalar: Scalar) -> Self {
        Self(scalar)
    }
}

impl core::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "PrivateKey(<redacted>)")
    }
}

/// A public key: a Ristretto point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(RistrettoPoint);

impl PublicKey {
    /// Parse a compressed 32-byte encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| KeyError::LengthMismatch)?;
        CompressedRistretto(arr)
            .decompress()
            .map(Self)
            .ok_or(KeyError::InvalidPoint)
    }

    /// Parse a hex-encoded compressed point.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::LengthMismatch)?;
        Self::from_bytes(&bytes)
    }

    /// The compressed 32-byte encoding.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.compress().to_bytes()
    }

    /// Hex encoding of the compressed point.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Borrow the underlying point.
    pub fn as_point(&self) -> &RistrettoPoint {
        &self.0
    }

    /// Verify a signature over a 32-byte digest. Never panics.
    pub fn verify(&self, digest: &[u8; 32], sig: &Signature) -> bool {
        let big_r = match CompressedRistretto(sig.r).decompress() {
            Some(p) => p,
            None => return false,
        };
        let s = match Option::<Scalar>::from(Scalar::from_canonical_bytes(sig.s)) {
            Some(s) => s,
            None => return false,
        };
        let e = challenge(&CompressedRistretto(sig.r), self, digest);
        RistrettoPoint::mul_base(&s) == big_r + e * self.0
    }
}

impl From<RistrettoPoint> for PublicKey {
    fn from(point: RistrettoPoint) -> Self {
        Self(point)
    }
}

/// A Schnorr signature: nonce commitment `R` and response `s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    /// Compressed nonce point.
    pub r: [u8; 32],
    /// Response scalar.
    pub s: [u8; 32],
}

impl Signature {
    /// Serialize as `R || s`.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        let mut out = [0u8; SIGNATURE_LEN];
        out[..32].copy_from_slice(&self.r);
        out[32..].copy_from_slice(&self.s);
        out
    }

    /// Parse from a 64-byte encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != SIGNATURE_LEN {
            return Err(KeyError::LengthMismatch);
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Ok(Self { r, s })
    }

    /// Hex encoding of `R || s`.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Parse from hex.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::LengthMismatch)?;
        Self::from_bytes(&bytes)
    }
}

/// Generate a fresh keypair.
pub fn keypair<R: RngCore + CryptoRng>(rng: &mut R) -> (PrivateKey, PublicKey) {
    let private = PrivateKey::from_random(rng);
    let public = private.public_key();
    (private, public)
}

/// The group generator, exposed for commitment construction.
pub fn basepoint() -> RistrettoPoint {
    RISTRETTO_BASEPOINT_POINT
}

fn challenge(big_r: &CompressedRistretto, pubkey: &PublicKey, digest: &[u8; 32]) -> Scalar {
    hash_to_scalar(
        CHALLENGE_DOMAIN,
        &[big_r.as_bytes(), &pubkey.to_bytes(), digest],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn sign_and_verify_roundtrip() {
        let (private, public) = keypair(&mut OsRng);
        let digest = hash256(b"rivulet test message");
        let sig = private.sign(&digest);
        assert!(public.verify(&digest, &sig));
    }

    #[test]
    fn verify_rejects_wrong_digest() {
        let (private, public) = keypair(&mut OsRng);
        let sig = private.sign(&hash256(b"message one"));
        assert!(!public.verify(&hash256(b"message two"), &sig));
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let (private, _) = keypair(&mut OsRng);
        let (_, other_public) = keypair(&mut OsRng);
        let digest = hash256(b"payload");
        let sig = private.sign(&digest);
        assert!(!other_public.verify(&digest, &sig));
    }

    #[test]
    fn signing_is_deterministic() {
        let (private, _) = keypair(&mut OsRng);
        let digest = hash256(b"stable");
        assert_eq!(private.sign(&digest).to_bytes(), private.sign(&digest).to_bytes());
    }

    #[test]
    fn signature_byte_roundtrip() {
        let (private, _) = keypair(&mut OsRng);
        let sig = private.sign(&hash256(b"abc"));
        let parsed = Signature::from_bytes(&sig.to_bytes()).unwrap();
        assert_eq!(sig, parsed);
    }

    #[test]
    fn public_key_hex_roundtrip() {
        let (_, public) = keypair(&mut OsRng);
        let parsed = PublicKey::from_hex(&public.to_hex()).unwrap();
        assert_eq!(public, parsed);
    }

    #[test]
    fn corrupted_signature_rejected() {
        let (private, public) = keypair(&mut OsRng);
        let digest = hash256(b"tamper");
        let mut bytes = private.sign(&digest).to_bytes();
        bytes[7] ^= 0x40;
        // A corrupted R may fail to decompress or just fail verification.
        if let Ok(sig) = Signature::from_bytes(&bytes) {
            assert!(!public.verify(&digest, &sig));
        }
    }

    #[test]
    fn hash256_is_stable() {
        assert_eq!(hash256(b"a"), hash256(b"a"));
        assert_ne!(hash256(b"a"), hash256(b"b"));
    }
}
