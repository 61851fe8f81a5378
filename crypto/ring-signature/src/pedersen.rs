// Copyright (c) 2025 The Rivulet Project

//! Pedersen commitments.
//!
//! `C = v*G + b*H` where `G` is the group basepoint and `H` is derived
//! by hashing `G` to a point, so `log_G(H)` is unknown to everyone.

use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use riv_crypto_keys::{basepoint, hash_to_point};

const H_DOMAIN: &[u8] = b"riv.pedersen.h";

/// The second Pedersen generator `H`.
///
/// Deterministically derived from the basepoint; its discrete log with
/// respect to `G` is unknown.
pub fn pedersen_h() -> RistrettoPoint {
    hash_to_point(H_DOMAIN, basepoint().compress().as_bytes())
}

/// A Pedersen commitment to an amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Commitment {
    /// The committed point.
    pub point: RistrettoPoint,
}

impl Commitment {
    /// Commit to `value` with blinding factor `blinding`.
    pub fn new(value: u64, blinding: &Scalar) -> Self {
        let point = RistrettoPoint::mul_base(&Scalar::from(value)) + pedersen_h() * blinding;
        Self { point }
    }

    /// Compressed 32-byte encoding.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.point.compress().to_bytes()
    }

    /// Parse a compressed encoding. `None` on an invalid point.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 32] = bytes.try_into().ok()?;
        CompressedRistretto(arr)
            .decompress()
            .map(|point| Self { point })
    }
}

/// Commit to `value` with a 32-byte blinding factor, returning the
/// compressed commitment. This is the provider contract entry point.
pub fn pedersen_commit(value: u64, blinding: &[u8; 32]) -> [u8; 32] {
    let b = Scalar::from_bytes_mod_order(*blinding);
    Commitment::new(value, &b).to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn commitment_is_deterministic() {
        let blinding = [7u8; 32];
        assert_eq!(pedersen_commit(42, &blinding), pedersen_commit(42, &blinding));
    }

    #[test]
    fn commitment_hides_value_with_blinding() {
        assert_ne!(pedersen_commit(42, &[1u8; 32]), pedersen_commit(42, &[2u8; 32]));
        assert_ne!(pedersen_commit(42, &[1u8; 32]), pedersen_commit(43, &[1u8; 32]));
    }

    #[test]
    fn commitments_are_homomorphic() {
        let b1 = Scalar::random(&mut OsRng);
        let b2 = Scalar::random(&mut OsRng);
        let sum = Commitment::new(30, &(b1 + b2));
        let lhs = Commitment::new(10, &b1).point + Commitment::new(20, &b2).point;
        assert_eq!(lhs, sum.point);
    }

    #[test]
    fn h_differs_from_g() {
        assert_ne!(pedersen_h(), basepoint());
    }
}
