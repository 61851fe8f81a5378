// Copyright (c) 2025 The Rivulet Project

//! One-time (stealth) keys.
//!
//! For a recipient with keys `(V, S)` where `V = a*G` is the view public
//! key and `S = s*G` the spend public key:
//!
//! - the sender picks a random `r`, publishes `R = r*G`, and derives the
//!   one-time address `P = Hs(r*V)*G + S`;
//! - the recipient computes `a*R = r*V` by DH symmetry and recognises
//!   the output by recomputing `P`;
//! - only the recipient can derive the spend key `x = Hs(a*R) + s`.
//!
//! A one-byte view tag derived from the shared secret lets wallets skip
//! expensive recovery on ~255/256 of foreign outputs.

use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use rand_core::{CryptoRng, RngCore};
use riv_crypto_keys::{hash256, hash_to_scalar};

const STEALTH_DOMAIN: &[u8] = b"riv.stealth.hs";
const VIEW_TAG_DOMAIN: &[u8] = b"riv.stealth.tag";

/// The sender-side result of deriving a one-time output key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StealthOutput {
    /// One-time address `P` that only the recipient can spend.
    pub one_time_address: [u8; 32],
    /// Ephemeral public key `R = r*G`.
    pub ephemeral_pub: [u8; 32],
    /// One-byte scan hint.
    pub view_tag: u8,
    /// Compressed shared-secret point `r*V`.
    pub shared_secret: [u8; 32],
}

/// Derive a fresh one-time output key for a recipient.
pub fn stealth_generate<R: RngCore + CryptoRng>(
    view_pub: &[u8; 32],
    spend_pub: &[u8; 32],
    rng: &mut R,
) -> Option<StealthOutput> {
    let v = CompressedRistretto(*view_pub).decompress()?;
    let s = CompressedRistretto(*spend_pub).decompress()?;

    let r = Scalar::random(rng);
    let ephemeral = RistrettoPoint::mul_base(&r);
    let shared = v * r;
    let shared_bytes = shared.compress().to_bytes();

    let one_time = RistrettoPoint::mul_base(&shared_scalar(&shared_bytes)) + s;

    Some(StealthOutput {
        one_time_address: one_time.compress().to_bytes(),
        ephemeral_pub: ephemeral.compress().to_bytes(),
        view_tag: view_tag(&shared_bytes),
        shared_secret: shared_bytes,
    })
}

/// Recipient-side recovery: recompute the one-time address from the
/// ephemeral key. Returns `None` when the view tag or any point fails,
/// which is the common case for outputs addressed to someone else.
pub fn stealth_recover(
    view_priv: &Scalar,
    spend_pub: &[u8; 32],
    ephemeral_pub: &[u8; 32],
    expected_view_tag: u8,
) -> Option<[u8; 32]> {
    let r_point = CompressedRistretto(*ephemeral_pub).decompress()?;
    let s = CompressedRistretto(*spend_pub).decompress()?;

    let shared = r_point * view_priv;
    let shared_bytes = shared.compress().to_bytes();
    if view_tag(&shared_bytes) != expected_view_tag {
        return None;
    }

    let one_time = RistrettoPoint::mul_base(&shared_scalar(&shared_bytes)) + s;
    Some(one_time.compress().to_bytes())
}

/// Derive the one-time private key `x = Hs(a*R) + s`.
pub fn recover_onetime_private(
    view_priv: &Scalar,
    spend_priv: &Scalar,
    ephemeral_pub: &[u8; 32],
) -> Option<Scalar> {
    let r_point = CompressedRistretto(*ephemeral_pub).decompress()?;
    let shared = r_point * view_priv;
    Some(shared_scalar(&shared.compress().to_bytes()) + spend_priv)
}

fn shared_scalar(shared_bytes: &[u8; 32]) -> Scalar {
    hash_to_scalar(STEALTH_DOMAIN, &[shared_bytes])
}

fn view_tag(shared_bytes: &[u8; 32]) -> u8 {
    hash256(&[VIEW_TAG_DOMAIN, shared_bytes.as_slice()].concat())[0]
}
