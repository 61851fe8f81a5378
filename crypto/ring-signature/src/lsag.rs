// Copyright (c) 2025 The Rivulet Project

//! Linkable spontaneous anonymous group (LSAG) signatures.
//!
//! A ring signature proves that one of `n` public keys signed the
//! message without revealing which. The key image `I = x * Hp(P)` links
//! every signature made with the same key, so a second spend of the same
//! output is detectable while the signer stays hidden.
//!
//! The challenge chain walks the ring exactly the way the CLSAG round
//! hash does: `c[i+1] = H(m, I, L_i, R_i)` with `L = s*G + c*P` and
//! `R = s*Hp(P) + c*I`, closing when the chain returns to `c[0]`.

use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use rand_core::{CryptoRng, RngCore};
use riv_crypto_keys::hash_to_scalar;

use crate::key_image::{hash_pubkey_to_point, KeyImage};
use crate::RingError;

const ROUND_DOMAIN: &[u8] = b"riv.lsag.round";

/// Minimum accepted ring size (the real key plus at least one decoy).
pub const MIN_RING_SIZE: usize = 2;

/// An LSAG signature with its ring embedded.
///
/// Carrying the ring members in the signature keeps the wire contract a
/// single opaque byte string: `ring_verify` needs nothing but the bytes
/// and the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingSignature {
    /// Compressed ring member public keys.
    pub ring: Vec<[u8; 32]>,
    /// Key image of the real signer.
    pub key_image: KeyImage,
    /// Initial challenge `c[0]`.
    pub c_zero: [u8; 32],
    /// One response scalar per ring member.
    pub responses: Vec<[u8; 32]>,
}

impl RingSignature {
    /// Sign `message` with `signer_private`, hiding it at
    /// `signer_index` within `ring`.
    pub fn sign<R: RngCore + CryptoRng>(
        message: &[u8; 32],
        signer_private: &Scalar,
        ring: &[[u8; 32]],
        signer_index: usize,
        rng: &mut R,
    ) -> Result<Self, RingError> {
        let n = ring.len();
        if n < MIN_RING_SIZE {
            return Err(RingError::RingTooSmall);
        }
        if signer_index >= n {
            return Err(RingError::IndexOutOfBounds);
        }

        let points = decompress_ring(ring)?;
        let signer_public = RistrettoPoint::mul_base(signer_private);
        if points[signer_index] != signer_public {
            return Err(RingError::InvalidRingMember);
        }

        let key_image = KeyImage::from_private(signer_private);
        let image_point = key_image
            .decompress()
            .ok_or(RingError::InvalidRingMember)?;

        let mut challenges = vec![Scalar::ZERO; n];
        let mut responses = vec![Scalar::ZERO; n];

        let alpha = Scalar::random(rng);
        let hp_signer = hash_pubkey_to_point(&signer_public);
        challenges[(signer_index + 1) % n] = round_hash(
            message,
            &key_image,
            &RistrettoPoint::mul_base(&alpha),
            &(hp_signer * alpha),
        );

        for step in 1..n {
            let i = (signer_index + step) % n;
            let next = (i + 1) % n;
            responses[i] = Scalar::random(rng);
            let hp_i = hash_pubkey_to_point(&points[i]);
            let l = RistrettoPoint::mul_base(&responses[i]) + points[i] * challenges[i];
            let r = hp_i * responses[i] + image_point * challenges[i];
            challenges[next] = round_hash(message, &key_image, &l, &r);
        }

        responses[signer_index] = alpha - challenges[signer_index] * signer_private;

        Ok(Self {
            ring: ring.to_vec(),
            key_image,
            c_zero: challenges[0].to_bytes(),
            responses: responses.iter().map(|s| s.to_bytes()).collect(),
        })
    }

    /// Verify the signature over `message`. Never panics.
    pub fn verify(&self, message: &[u8; 32]) -> bool {
        let n = self.ring.len();
        if n < MIN_RING_SIZE || self.responses.len() != n {
            return false;
        }
        let points = match decompress_ring(&self.ring) {
            Ok(p) => p,
            Err(_) => return false,
        };
        let image_point = match self.key_image.decompress() {
            Some(p) => p,
            None => return false,
        };
        let c_zero = Scalar::from_bytes_mod_order(self.c_zero);

        let mut c = c_zero;
        for i in 0..n {
            let s = Scalar::from_bytes_mod_order(self.responses[i]);
            let hp_i = hash_pubkey_to_point(&points[i]);
            let l = RistrettoPoint::mul_base(&s) + points[i] * c;
            let r = hp_i * s + image_point * c;
            c = round_hash(message, &self.key_image, &l, &r);
        }
        c == c_zero
    }

    /// Serialize: `u32-be ring size || ring || key image || c0 || responses`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let n = self.ring.len();
        let mut out = Vec::with_capacity(4 + 32 * (2 * n + 2));
        out.extend_from_slice(&(n as u32).to_be_bytes());
        for member in &self.ring {
            out.extend_from_slice(member);
        }
        out.extend_from_slice(&self.key_image.to_bytes());
        out.extend_from_slice(&self.c_zero);
        for response in &self.responses {
            out.extend_from_slice(response);
        }
        out
    }

    /// Parse the byte layout produced by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RingError> {
        if bytes.len() < 4 {
            return Err(RingError::MalformedBytes);
        }
        let n = u32::from_be_bytes(bytes[..4].try_into().expect("4 bytes")) as usize;
        let expected = 4 + 32 * (2 * n + 2);
        if n < MIN_RING_SIZE || bytes.len() != expected {
            return Err(RingError::MalformedBytes);
        }
        let mut offset = 4;
        let mut take = |out: &mut [u8; 32]| {
            out.copy_from_slice(&bytes[offset..offset + 32]);
            offset += 32;
        };

        let mut ring = Vec::with_capacity(n);
        for _ in 0..n {
            let mut member = [0u8; 32];
            take(&mut member);
            ring.push(member);
        }
        let mut image = [0u8; 32];
        take(&mut image);
        let mut c_zero = [0u8; 32];
        take(&mut c_zero);
        let mut responses = Vec::with_capacity(n);
        for _ in 0..n {
            let mut response = [0u8; 32];
            take(&mut response);
            responses.push(response);
        }

        Ok(Self {
            ring,
            key_image: KeyImage::from_bytes(&image).ok_or(RingError::MalformedBytes)?,
            c_zero,
            responses,
        })
    }
}

/// Provider contract: sign and return opaque bytes.
pub fn ring_sign<R: RngCore + CryptoRng>(
    message: &[u8; 32],
    signer_private: &Scalar,
    ring: &[[u8; 32]],
    signer_index: usize,
    rng: &mut R,
) -> Result<Vec<u8>, RingError> {
    RingSignature::sign(message, signer_private, ring, signer_index, rng).map(|s| s.to_bytes())
}

/// Provider contract: verify opaque bytes against a message.
pub fn ring_verify(sig_bytes: &[u8], message: &[u8; 32]) -> bool {
    match RingSignature::from_bytes(sig_bytes) {
        Ok(sig) => sig.verify(message),
        Err(_) => false,
    }
}

fn decompress_ring(ring: &[[u8; 32]]) -> Result<Vec<RistrettoPoint>, RingError> {
    ring.iter()
        .map(|bytes| {
            CompressedRistretto(*bytes)
                .decompress()
                .ok_or(RingError::InvalidRingMember)
        })
        .collect()
}

fn round_hash(
    message: &[u8; 32],
    key_image: &KeyImage,
    l: &RistrettoPoint,
    r: &RistrettoPoint,
) -> Scalar {
    hash_to_scalar(
        ROUND_DOMAIN,
        &[
            message,
            &key_image.to_bytes(),
            l.compress().as_bytes(),
            r.compress().as_bytes(),
        ],
    )
}
