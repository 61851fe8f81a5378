// Copyright (c) 2025 The Rivulet Project

//! Bitwise range proofs.
//!
//! Proves that a Pedersen commitment `C = v*G + b*H` commits to a value
//! `0 <= v < 2^64` without revealing it. The value is decomposed into
//! bit commitments `C_i = b_i*2^i*G + r_i*H` with `sum(r_i) = b`, so the
//! bit commitments sum to `C`. Each bit carries a two-branch ring proof
//! that `C_i` commits to either `0` or `2^i`.

use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use rand_core::{CryptoRng, RngCore};
use riv_crypto_keys::hash_to_scalar;

use crate::pedersen::pedersen_h;
use crate::RingError;

const BIT_DOMAIN: &[u8] = b"riv.range.bit";

/// Number of bits covered by a proof.
pub const RANGE_PROOF_BITS: usize = 64;

/// Serialized length: per bit, commitment plus `(e0, s0, s1)`.
pub const RANGE_PROOF_LEN: usize = RANGE_PROOF_BITS * 128;

/// A per-bit two-branch ring proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BitProof {
    commitment: [u8; 32],
    e_zero: [u8; 32],
    s_zero: [u8; 32],
    s_one: [u8; 32],
}

/// A full 64-bit range proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeProof {
    bits: Vec<BitProof>,
}

impl RangeProof {
    /// Prove that `value` is in range, with the given blinding factor.
    ///
    /// The commitment this proof verifies against is
    /// `pedersen_commit(value, blinding)`.
    pub fn new<R: RngCore + CryptoRng>(
        value: u64,
        blinding: &Scalar,
        rng: &mut R,
    ) -> Self {
        let h = pedersen_h();

        // Split the blinding across the bit commitments so they sum to C.
        let mut bit_blindings: Vec<Scalar> = (0..RANGE_PROOF_BITS - 1)
            .map(|_| Scalar::random(rng))
            .collect();
        let partial: Scalar = bit_blindings.iter().sum();
        bit_blindings.push(blinding - partial);

        let mut bits = Vec::with_capacity(RANGE_PROOF_BITS);
        for (i, r_i) in bit_blindings.iter().enumerate() {
            let bit = (value >> i) & 1;
            let weight = Scalar::from(1u128 << i);
            let commitment = if bit == 1 {
                RistrettoPoint::mul_base(&weight) + h * r_i
            } else {
                h * r_i
            };
            bits.push(prove_bit(&commitment, i, bit == 1, r_i, &h, rng));
        }
        Self { bits }
    }

    /// Verify this proof against a compressed commitment.
    pub fn verify(&self, commitment: &[u8; 32]) -> bool {
        if self.bits.len() != RANGE_PROOF_BITS {
            return false;
        }
        let target = match CompressedRistretto(*commitment).decompress() {
            Some(p) => p,
            None => return false,
        };
        let h = pedersen_h();

        let mut sum = RistrettoPoint::identity();
        for (i, bit) in self.bits.iter().enumerate() {
            let c_i = match CompressedRistretto(bit.commitment).decompress() {
                Some(p) => p,
                None => return false,
            };
            if !verify_bit(bit, &c_i, i, &h) {
                return false;
            }
            sum += c_i;
        }
        sum == target
    }

    /// Serialize to the fixed wire layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(RANGE_PROOF_LEN);
        for bit in &self.bits {
            out.extend_from_slice(&bit.commitment);
            out.extend_from_slice(&bit.e_zero);
            out.extend_from_slice(&bit.s_zero);
            out.extend_from_slice(&bit.s_one);
        }
        out
    }

    /// Parse the wire layout.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RingError> {
        if bytes.len() != RANGE_PROOF_LEN {
            return Err(RingError::MalformedBytes);
        }
        let mut bits = Vec::with_capacity(RANGE_PROOF_BITS);
        for chunk in bytes.chunks_exact(128) {
            let mut commitment = [0u8; 32];
            let mut e_zero = [0u8; 32];
            let mut s_zero = [0u8; 32];
            let mut s_one = [0u8; 32];
            commitment.copy_from_slice(&chunk[0..32]);
            e_zero.copy_from_slice(&chunk[32..64]);
            s_zero.copy_from_slice(&chunk[64..96]);
            s_one.copy_from_slice(&chunk[96..128]);
            bits.push(BitProof {
                commitment,
                e_zero,
                s_zero,
                s_one,
            });
        }
        Ok(Self { bits })
    }
}

/// Provider contract: prove and return opaque bytes.
pub fn range_prove<R: RngCore + CryptoRng>(
    value: u64,
    blinding: &[u8; 32],
    rng: &mut R,
) -> Vec<u8> {
    let b = Scalar::from_bytes_mod_order(*blinding);
    RangeProof::new(value, &b, rng).to_bytes()
}

/// Provider contract: verify opaque bytes against a commitment.
pub fn range_verify(proof: &[u8], commitment: &[u8; 32]) -> bool {
    match RangeProof::from_bytes(proof) {
        Ok(p) => p.verify(commitment),
        Err(_) => false,
    }
}

/// Two-branch ring proof that `commitment` is `r*H` (branch 0) or
/// `2^i*G + r*H` (branch 1).
fn prove_bit<R: RngCore + CryptoRng>(
    commitment: &RistrettoPoint,
    index: usize,
    bit_set: bool,
    secret: &Scalar,
    h: &RistrettoPoint,
    rng: &mut R,
) -> BitProof {
    let weight = Scalar::from(1u128 << index);
    let p_zero = *commitment;
    let p_one = commitment - RistrettoPoint::mul_base(&weight);
    let c_bytes = commitment.compress().to_bytes();

    let alpha = Scalar::random(rng);

    let (e_zero, s_zero, s_one) = if !bit_set {
        // Secret branch 0: simulate branch 1.
        let e_one = bit_challenge(&c_bytes, index, &(h * alpha));
        let s_one = Scalar::random(rng);
        let e_zero = bit_challenge(&c_bytes, index, &(h * s_one - p_one * e_one));
        let s_zero = alpha + e_zero * secret;
        (e_zero, s_zero, s_one)
    } else {
        // Secret branch 1: simulate branch 0.
        let e_zero = bit_challenge(&c_bytes, index, &(h * alpha));
        let s_zero = Scalar::random(rng);
        let e_one = bit_challenge(&c_bytes, index, &(h * s_zero - p_zero * e_zero));
        let s_one = alpha + e_one * secret;
        (e_zero, s_zero, s_one)
    };

    BitProof {
        commitment: c_bytes,
        e_zero: e_zero.to_bytes(),
        s_zero: s_zero.to_bytes(),
        s_one: s_one.to_bytes(),
    }
}

fn verify_bit(bit: &BitProof, c_i: &RistrettoPoint, index: usize, h: &RistrettoPoint) -> bool {
    let weight = Scalar::from(1u128 << index);
    let p_zero = *c_i;
    let p_one = c_i - RistrettoPoint::mul_base(&weight);

    let e_zero = Scalar::from_bytes_mod_order(bit.e_zero);
    let s_zero = Scalar::from_bytes_mod_order(bit.s_zero);
    let s_one = Scalar::from_bytes_mod_order(bit.s_one);

    let e_one = bit_challenge(&bit.commitment, index, &(h * s_zero - p_zero * e_zero));
    let e_zero_check = bit_challenge(&bit.commitment, index, &(h * s_one - p_one * e_one));
    e_zero_check == e_zero
}

fn bit_challenge(commitment: &[u8; 32], index: usize, point: &RistrettoPoint) -> Scalar {
    hash_to_scalar(
        BIT_DOMAIN,
        &[
            commitment,
            &(index as u32).to_be_bytes(),
            point.compress().as_bytes(),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pedersen::pedersen_commit;
    use rand::rngs::OsRng;

    #[test]
    fn prove_verify_roundtrip() {
        let blinding = [9u8; 32];
        let commitment = pedersen_commit(1_234_567, &blinding);
        let proof = range_prove(1_234_567, &blinding, &mut OsRng);
        assert!(range_verify(&proof, &commitment));
    }

    #[test]
    fn zero_and_max_values_prove() {
        for value in [0u64, u64::MAX] {
            let blinding = [3u8; 32];
            let commitment = pedersen_commit(value, &blinding);
            let proof = range_prove(value, &blinding, &mut OsRng);
            assert!(range_verify(&proof, &commitment));
        }
    }

    #[test]
    fn wrong_commitment_rejected() {
        let blinding = [5u8; 32];
        let proof = range_prove(777, &blinding, &mut OsRng);
        let other = pedersen_commit(778, &blinding);
        assert!(!range_verify(&proof, &other));
    }

    #[test]
    fn tampered_proof_rejected() {
        let blinding = [5u8; 32];
        let commitment = pedersen_commit(777, &blinding);
        let mut proof = range_prove(777, &blinding, &mut OsRng);
        proof[200] ^= 1;
        assert!(!range_verify(&proof, &commitment));
    }

    #[test]
    fn wrong_length_rejected() {
        assert!(!range_verify(&[0u8; 100], &[0u8; 32]));
    }
}
