// Copyright (c) 2025 The Rivulet Project

//! Confidential payment pipeline: stealth outputs, range proofs, ring
//! signatures, key images and double-spend detection, exercised through
//! the real cryptography.

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use rand::rngs::OsRng;
use riv_account_keys::AccountKey;
use riv_core_types::{Amount, ConfidentialProof, ResultCode, Transaction, TxBody, TxHeader};
use riv_ring_signature::{pedersen_commit, range_prove, ring_sign, stealth_generate};
use rivulet::ledger::{Ledger, LedgerParams};

const GENESIS: &str = "nGenesis";

fn funded_ledger(sender: &str) -> Ledger {
    let mut ledger = Ledger::new(LedgerParams::default());
    let tx = Transaction::payment(
        GENESIS,
        sender,
        Amount::native_units(1_000),
        Amount::native(0),
        0,
        100,
    );
    assert_eq!(ledger.apply(&tx), ResultCode::Success);
    ledger
}

/// Build a fully proven confidential payment from `sender`.
fn confidential_payment(
    sender: &str,
    recipient: &AccountKey,
    value: u64,
    timestamp: i64,
) -> Transaction {
    let address = recipient.public_address();
    let stealth =
        stealth_generate(&address.view_public, &address.spend_public, &mut OsRng).unwrap();

    let blinding = [42u8; 32];
    let commitment = pedersen_commit(value, &blinding);
    let range_proof = range_prove(value, &blinding, &mut OsRng);

    // The spend key being consumed, hidden in a ring of decoys.
    let spend_private = Scalar::random(&mut OsRng);
    let mut ring: Vec<[u8; 32]> = (0..4)
        .map(|_| {
            RistrettoPoint::mul_base(&Scalar::random(&mut OsRng))
                .compress()
                .to_bytes()
        })
        .collect();
    ring.push(RistrettoPoint::mul_base(&spend_private).compress().to_bytes());
    let signer_index = ring.len() - 1;

    let mut tx = Transaction::new(
        TxHeader {
            account: sender.to_string(),
            fee: Amount::native(10),
            sequence: 0,
            timestamp,
            ..TxHeader::default()
        },
        TxBody::Payment {
            partial: false,
            deliver_min: 0,
            send_max: 0,
            confidential: Some(ConfidentialProof {
                commitment: commitment.to_vec(),
                stealth_address: stealth.one_time_address.to_vec(),
                ephemeral_pub: stealth.ephemeral_pub.to_vec(),
                range_proof,
                key_image: Vec::new(),
                view_tag: stealth.view_tag,
                ring_signature: Vec::new(),
            }),
        },
    );

    // The ring signature covers the signing digest (which excludes the
    // signature itself); the wire key image must match the one inside.
    let digest = tx.signing_digest();
    let sig_bytes = ring_sign(&digest, &spend_private, &ring, signer_index, &mut OsRng).unwrap();
    let parsed = riv_ring_signature::RingSignature::from_bytes(&sig_bytes).unwrap();
    if let TxBody::Payment {
        confidential: Some(proof),
        ..
    } = &mut tx.body
    {
        proof.key_image = parsed.key_image.to_bytes().to_vec();
        proof.ring_signature = sig_bytes;
    }
    tx
}

#[test]
fn confidential_payment_stores_an_unspent_output() {
    let mut ledger = funded_ledger("nAlice");
    let recipient = AccountKey::from_seed(b"bob");
    let tx = confidential_payment("nAlice", &recipient, 750_000, 200);

    assert_eq!(ledger.apply(&tx), ResultCode::Success);

    let proof = tx.confidential().unwrap();
    let stealth_hex = hex::encode(&proof.stealth_address);
    let output = ledger.get_confidential_output(&stealth_hex).expect("stored");
    assert!(!output.spent);
    assert_eq!(output.tx_id, tx.tx_id());
    assert_eq!(output.commitment, proof.commitment);
    assert!(ledger.is_key_image_spent(&proof.key_image));
    assert!(ledger.is_stealth_address_used(&stealth_hex));

    // Only the recipient detects and can spend the output.
    let stealth_addr: [u8; 32] = proof.stealth_address.as_slice().try_into().unwrap();
    let ephemeral: [u8; 32] = proof.ephemeral_pub.as_slice().try_into().unwrap();
    assert!(recipient.owns_output(&stealth_addr, &ephemeral, proof.view_tag));
    let other = AccountKey::from_seed(b"mallory");
    assert!(!other.owns_output(&stealth_addr, &ephemeral, proof.view_tag));

    // The amount appears nowhere in the ledger.
    assert_eq!(ledger.get_state_summary().confidential_outputs, 1);
}

#[test]
fn reused_key_image_is_a_double_spend() {
    let mut ledger = funded_ledger("nAlice");
    let recipient = AccountKey::from_seed(b"bob");
    let tx = confidential_payment("nAlice", &recipient, 500_000, 200);
    assert_eq!(ledger.apply(&tx), ResultCode::Success);

    // A different payment spending the same input: same key image.
    let mut replay = confidential_payment("nAlice", &recipient, 500_000, 201);
    if let (
        TxBody::Payment {
            confidential: Some(new_proof),
            ..
        },
        Some(old_proof),
    ) = (&mut replay.body, tx.confidential())
    {
        new_proof.key_image = old_proof.key_image.clone();
        new_proof.ring_signature = old_proof.ring_signature.clone();
    }
    // The replayed ring signature no longer matches this tx's digest.
    assert_eq!(ledger.apply(&replay), ResultCode::BadSig);
}

#[test]
fn tampered_range_proof_is_rejected() {
    let mut ledger = funded_ledger("nAlice");
    let recipient = AccountKey::from_seed(b"bob");
    let mut tx = confidential_payment("nAlice", &recipient, 500_000, 200);
    if let TxBody::Payment {
        confidential: Some(proof),
        ..
    } = &mut tx.body
    {
        proof.range_proof[100] ^= 1;
    }
    assert_eq!(ledger.apply(&tx), ResultCode::BadSig);
    assert_eq!(ledger.get_state_summary().confidential_outputs, 0);
}

#[test]
fn wire_key_image_must_match_the_ring_signature() {
    let mut ledger = funded_ledger("nAlice");
    let recipient = AccountKey::from_seed(b"bob");
    let mut tx = confidential_payment("nAlice", &recipient, 500_000, 200);
    if let TxBody::Payment {
        confidential: Some(proof),
        ..
    } = &mut tx.body
    {
        proof.key_image = vec![0u8; 32];
    }
    // Changing the key image changes the digest, so the ring signature
    // itself no longer verifies.
    assert_eq!(ledger.apply(&tx), ResultCode::BadSig);
}

#[test]
fn fee_burn_and_sequence_apply_to_confidential_payments() {
    let mut ledger = funded_ledger("nAlice");
    let recipient = AccountKey::from_seed(b"bob");
    let balance_before = ledger.get_balance("nAlice");
    let seq_before = ledger.get_account("nAlice").unwrap().sequence;
    let burned_before = ledger.total_burned;

    let tx = confidential_payment("nAlice", &recipient, 250_000, 200);
    assert_eq!(ledger.apply(&tx), ResultCode::Success);

    assert_eq!(ledger.get_balance("nAlice"), balance_before - 10);
    assert_eq!(ledger.get_account("nAlice").unwrap().sequence, seq_before + 1);
    assert_eq!(ledger.total_burned, burned_before + 10);
}

#[test]
fn second_spend_with_fresh_signature_hits_the_spent_set() {
    // A properly re-signed transaction that reuses the same one-time
    // key produces the same key image and must be caught by the ledger.
    let mut ledger = funded_ledger("nAlice");
    let recipient = AccountKey::from_seed(b"bob");

    let spend_private = Scalar::random(&mut OsRng);
    let build = |timestamp: i64| {
        let address = recipient.public_address();
        let stealth =
            stealth_generate(&address.view_public, &address.spend_public, &mut OsRng).unwrap();
        let blinding = [7u8; 32];
        let ring = vec![
            RistrettoPoint::mul_base(&Scalar::random(&mut OsRng)).compress().to_bytes(),
            RistrettoPoint::mul_base(&spend_private).compress().to_bytes(),
        ];
        let mut tx = Transaction::new(
            TxHeader {
                account: "nAlice".to_string(),
                fee: Amount::native(10),
                timestamp,
                ..TxHeader::default()
            },
            TxBody::Payment {
                partial: false,
                deliver_min: 0,
                send_max: 0,
                confidential: Some(ConfidentialProof {
                    commitment: pedersen_commit(1_000, &blinding).to_vec(),
                    stealth_address: stealth.one_time_address.to_vec(),
                    ephemeral_pub: stealth.ephemeral_pub.to_vec(),
                    range_proof: range_prove(1_000, &blinding, &mut OsRng),
                    key_image: Vec::new(),
                    view_tag: stealth.view_tag,
                    ring_signature: Vec::new(),
                }),
            },
        );
        let digest = tx.signing_digest();
        let sig = ring_sign(&digest, &spend_private, &ring, 1, &mut OsRng).unwrap();
        let parsed = riv_ring_signature::RingSignature::from_bytes(&sig).unwrap();
        if let TxBody::Payment {
            confidential: Some(proof),
            ..
        } = &mut tx.body
        {
            proof.key_image = parsed.key_image.to_bytes().to_vec();
            proof.ring_signature = sig;
        }
        tx
    };

    assert_eq!(ledger.apply(&build(200)), ResultCode::Success);
    assert_eq!(ledger.apply(&build(300)), ResultCode::KeyImageSpent);
}
