// Copyright (c) 2025 The Rivulet Project

//! The transaction application engine.
//!
//! `apply(tx)` is deterministic given `(ledger, tx)`: no clocks, no
//! randomness, no unordered iteration. Every transaction runs the same
//! protocol: duplicate suppression, checkpoint, common preamble (source
//! lookup, sequence or ticket, amendment gate, hooks, fee burn),
//! type dispatch, invariant verification, then commit or full rollback.
//! Failed transactions leave the ledger bit-identical to the
//! pre-checkpoint state and surface only through metadata.

use riv_core_types::{
    mul_ppm_ceil, mul_ppm_floor, AccountFlag, Amount, ResultCode, Transaction, TxBody,
    PPM, RATE_ONE,
};
use riv_ring_signature::{range_verify, ring_verify, RingSignature};
use tracing::{debug, warn};

use super::account::{ConfidentialOutput, SignerList, TrustLine};
use super::invariants::{Checkpoint, InvariantChecker};
use super::metadata::{AffectedNode, BalanceChange, NodeAction, TxMetadata};
use super::rippling::{execute_path, PathFinder, TrustGraph};
use super::Ledger;
use crate::engines::amm::AmmError;
use crate::engines::channels::{ChannelError, CloseOutcome};
use crate::engines::checks::CheckError;
use crate::engines::credentials::CredentialError;
use crate::engines::did::DidError;
use crate::engines::escrow::EscrowError;
use crate::engines::hooks::{HookError, HookVerdict};
use crate::engines::mpt::MptError;
use crate::engines::nftoken::NftError;
use crate::engines::oracle::OracleError;
use crate::engines::order_book::{leg, parse_leg, Fill, Side, TimeInForce, NATIVE_LEG};
use crate::engines::staking::StakeError;
use crate::engines::tickets::TicketError;
use crate::engines::xchain::XChainError;

/// A deterministic failure: result code plus diagnostic.
type Failure = (ResultCode, String);

/// What a successful handler reports back.
#[derive(Debug, Default)]
struct Outcome {
    /// Amount actually delivered, for value-moving types.
    delivered: Option<i128>,
}

impl Outcome {
    fn delivered(amount: i128) -> Self {
        Self {
            delivered: Some(amount),
        }
    }
}

fn fail<T>(code: ResultCode, message: impl Into<String>) -> Result<T, Failure> {
    Err((code, message.into()))
}

impl Ledger {
    /// Apply a transaction. Returns the result code; metadata is
    /// appended either way.
    pub fn apply(&mut self, tx: &Transaction) -> ResultCode {
        let tx_id = tx.tx_id();
        if self.applied_tx_ids.contains(&tx_id) {
            let meta = self.failure_metadata(tx, &tx_id, ResultCode::Duplicate, "already applied");
            self.tx_metadata.push(meta);
            return ResultCode::Duplicate;
        }

        let mut cp = self.checkpoint();
        match self.dispatch(tx, &tx_id, &mut cp) {
            Ok(outcome) => {
                if let Err(message) = InvariantChecker::verify(self, &cp) {
                    warn!(tx_id = %tx_id, %message, "invariant failed, rolling back");
                    self.rollback(cp);
                    let meta = self.failure_metadata(
                        tx,
                        &tx_id,
                        ResultCode::InvariantFailed,
                        &message,
                    );
                    self.tx_metadata.push(meta);
                    return ResultCode::InvariantFailed;
                }
                let meta = self.success_metadata(tx, &tx_id, &cp, &outcome);
                self.tx_metadata.push(meta);
                self.pending_txns.push(tx.clone());
                self.applied_tx_ids.insert(tx_id.clone());
                debug!(tx_id = %tx_id, tx_type = tx.body.type_name(), "applied");
                ResultCode::Success
            }
            Err((code, message)) => {
                self.rollback(cp);
                debug!(tx_id = %tx_id, code = code.name(), %message, "rejected");
                let meta = self.failure_metadata(tx, &tx_id, code, &message);
                self.tx_metadata.push(meta);
                code
            }
        }
    }

    // ---- protocol steps ----

    fn dispatch(
        &mut self,
        tx: &Transaction,
        tx_id: &str,
        cp: &mut Checkpoint,
    ) -> Result<Outcome, Failure> {
        self.preamble(tx, cp)?;
        match &tx.body {
            TxBody::Payment {
                partial,
                deliver_min,
                confidential,
                ..
            } => match confidential {
                Some(proof) => self.apply_confidential_payment(tx, tx_id, cp, proof),
                None => self.apply_transparent_payment(tx, cp, *partial, *deliver_min),
            },
            TxBody::TrustSet {
                limit_amount,
                quality_in,
                quality_out,
                set_auth,
                clear_auth,
                set_no_ripple,
                clear_no_ripple,
                set_freeze,
                clear_freeze,
            } => self.apply_trust_set(
                tx,
                cp,
                limit_amount,
                *quality_in,
                *quality_out,
                [
                    *set_auth,
                    *clear_auth,
                    *set_no_ripple,
                    *clear_no_ripple,
                    *set_freeze,
                    *clear_freeze,
                ],
            ),
            TxBody::OfferCreate {
                taker_pays,
                taker_gets,
                immediate_or_cancel,
                fill_or_kill,
                expiration,
            } => self.apply_offer_create(
                tx,
                tx_id,
                cp,
                taker_pays,
                taker_gets,
                *immediate_or_cancel,
                *fill_or_kill,
                *expiration,
            ),
            TxBody::OfferCancel { offer_sequence } => {
                self.apply_offer_cancel(tx, cp, *offer_sequence)
            }
            TxBody::AccountSet {
                set_flag,
                clear_flag,
                domain,
                transfer_rate,
            } => self.apply_account_set(tx, cp, set_flag, clear_flag, domain, transfer_rate),
            TxBody::SetRegularKey { regular_key } => {
                let account = self
                    .account_mut(cp, &tx.header.account)
                    .expect("preamble fetched source");
                account.regular_key = regular_key.clone();
                Ok(Outcome::default())
            }
            TxBody::SignerListSet { quorum, entries } => {
                self.apply_signer_list_set(tx, cp, *quorum, entries)
            }
            TxBody::DepositPreauth {
                authorize,
                unauthorize,
            } => self.apply_deposit_preauth(tx, cp, authorize, unauthorize),
            TxBody::TicketCreate { count } => self.apply_ticket_create(tx, cp, *count),
            TxBody::AccountDelete => self.apply_account_delete(tx, cp),
            TxBody::EscrowCreate {
                condition,
                finish_after,
                cancel_after,
            } => self.apply_escrow_create(tx, tx_id, cp, condition, *finish_after, *cancel_after),
            TxBody::EscrowFinish {
                escrow_id,
                fulfillment,
            } => self.apply_escrow_finish(tx, cp, escrow_id, fulfillment),
            TxBody::EscrowCancel { escrow_id } => self.apply_escrow_cancel(tx, cp, escrow_id),
            TxBody::ChannelCreate {
                settle_delay,
                public_key,
                cancel_after,
            } => self.apply_channel_create(tx, tx_id, cp, *settle_delay, public_key, *cancel_after),
            TxBody::ChannelFund { channel_id } => self.apply_channel_fund(tx, cp, channel_id),
            TxBody::ChannelClaim {
                channel_id,
                balance,
                close,
            } => self.apply_channel_claim(tx, cp, channel_id, *balance, *close),
            TxBody::CheckCreate { expiration } => {
                self.apply_check_create(tx, tx_id, cp, *expiration)
            }
            TxBody::CheckCash {
                check_id,
                cash_amount,
                deliver_min,
            } => self.apply_check_cash(tx, cp, check_id, *cash_amount, *deliver_min),
            TxBody::CheckCancel { check_id } => self.apply_check_cancel(tx, cp, check_id),
            TxBody::Stake { tier } => self.apply_stake(tx, tx_id, cp, *tier),
            TxBody::Unstake { stake_id } => self.apply_unstake(tx, cp, stake_id),
            TxBody::Clawback => self.apply_clawback(tx, cp),
            TxBody::NfTokenMint {
                taxon,
                uri,
                transferable,
                burnable,
            } => self.apply_nft_mint(tx, cp, *taxon, uri, *transferable, *burnable),
            TxBody::NfTokenBurn { nftoken_id } => self.apply_nft_burn(tx, cp, nftoken_id),
            TxBody::NfTokenOfferCreate {
                nftoken_id,
                is_sell,
                offer_destination,
                expiration,
            } => self.apply_nft_offer_create(
                tx,
                tx_id,
                cp,
                nftoken_id,
                *is_sell,
                offer_destination,
                *expiration,
            ),
            TxBody::NfTokenOfferAccept { offer_id } => {
                self.apply_nft_offer_accept(tx, cp, offer_id)
            }
            TxBody::NfTokenOfferCancel { offer_id } => {
                self.apply_nft_offer_cancel(tx, cp, offer_id)
            }
            TxBody::AmmCreate {
                asset_a,
                asset_b,
                trading_fee_bps,
            } => self.apply_amm_create(tx, cp, asset_a, asset_b, *trading_fee_bps),
            TxBody::AmmDeposit {
                pool_id,
                amount_a,
                amount_b,
            } => self.apply_amm_deposit(tx, cp, pool_id, *amount_a, *amount_b),
            TxBody::AmmWithdraw { pool_id, lp_tokens } => {
                self.apply_amm_withdraw(tx, cp, pool_id, *lp_tokens)
            }
            TxBody::AmmVote {
                pool_id,
                trading_fee_bps,
            } => {
                self.checkpoint_engines(cp);
                self.engines
                    .amm
                    .vote(pool_id, &tx.header.account, *trading_fee_bps)
                    .map_err(amm_failure)?;
                Ok(Outcome::default())
            }
            TxBody::AmmBid { pool_id } => self.apply_amm_bid(tx, cp, pool_id),
            TxBody::AmmDelete { pool_id } => self.apply_amm_delete(tx, cp, pool_id),
            TxBody::OracleSet {
                document_id,
                entries,
            } => self.apply_oracle_set(tx, cp, *document_id, entries),
            TxBody::OracleDelete { document_id } => {
                self.apply_oracle_delete(tx, cp, *document_id)
            }
            TxBody::DidSet { uri, data } => self.apply_did_set(tx, cp, uri, data),
            TxBody::DidDelete => self.apply_did_delete(tx, cp),
            TxBody::MptIssuanceCreate {
                max_supply,
                asset_scale,
                metadata,
                require_auth,
                can_transfer,
                can_clawback,
            } => self.apply_mpt_issuance_create(
                tx,
                cp,
                *max_supply,
                *asset_scale,
                metadata,
                *require_auth,
                *can_transfer,
                *can_clawback,
            ),
            TxBody::MptIssuanceDestroy { issuance_id } => {
                self.apply_mpt_issuance_destroy(tx, cp, issuance_id)
            }
            TxBody::MptAuthorize {
                issuance_id,
                holder,
                unauthorize,
            } => {
                self.checkpoint_engines(cp);
                self.engines
                    .mpt
                    .authorize(issuance_id, &tx.header.account, holder, *unauthorize)
                    .map_err(mpt_failure)?;
                Ok(Outcome::default())
            }
            TxBody::MptMint {
                issuance_id,
                mpt_amount,
            } => {
                self.checkpoint_engines(cp);
                self.engines
                    .mpt
                    .mint(
                        issuance_id,
                        &tx.header.account,
                        &tx.header.destination,
                        *mpt_amount,
                    )
                    .map_err(mpt_failure)?;
                Ok(Outcome::delivered(*mpt_amount))
            }
            TxBody::MptTransfer {
                issuance_id,
                mpt_amount,
            } => {
                self.checkpoint_engines(cp);
                self.engines
                    .mpt
                    .transfer(
                        issuance_id,
                        &tx.header.account,
                        &tx.header.destination,
                        *mpt_amount,
                    )
                    .map_err(mpt_failure)?;
                Ok(Outcome::delivered(*mpt_amount))
            }
            TxBody::MptClawback {
                issuance_id,
                holder,
                mpt_amount,
            } => {
                self.checkpoint_engines(cp);
                let clawed = self
                    .engines
                    .mpt
                    .clawback(issuance_id, &tx.header.account, holder, *mpt_amount)
                    .map_err(mpt_failure)?;
                Ok(Outcome::delivered(clawed))
            }
            TxBody::CredentialCreate {
                subject,
                credential_type,
                uri,
                expiration,
            } => self.apply_credential_create(tx, cp, subject, credential_type, uri, *expiration),
            TxBody::CredentialAccept { credential_id } => {
                self.checkpoint_engines(cp);
                self.engines
                    .credentials
                    .accept(credential_id, &tx.header.account)
                    .map_err(credential_failure)?;
                Ok(Outcome::default())
            }
            TxBody::CredentialDelete { credential_id } => {
                self.apply_credential_delete(tx, cp, credential_id)
            }
            TxBody::XChainCreateBridge {
                locking_door,
                issuing_door,
                currency,
            } => self.apply_xchain_create_bridge(tx, cp, locking_door, issuing_door, currency),
            TxBody::XChainCommit {
                bridge_id,
                claim_id,
            } => self.apply_xchain_commit(tx, cp, bridge_id, *claim_id),
            TxBody::XChainAddAttestation {
                bridge_id,
                claim_id,
                witness,
            } => {
                self.checkpoint_engines(cp);
                self.engines
                    .xchain
                    .add_attestation(bridge_id, *claim_id, witness)
                    .map_err(xchain_failure)?;
                Ok(Outcome::default())
            }
            TxBody::XChainClaim {
                bridge_id,
                claim_id,
            } => self.apply_xchain_claim(tx, cp, bridge_id, *claim_id),
            TxBody::HookSet { position, rule } => {
                self.apply_hook_set(tx, cp, *position as usize, rule.clone())
            }
            TxBody::AmendmentVote { amendment, support } => {
                self.checkpoint_engines(cp);
                if !self
                    .engines
                    .amendments
                    .vote(amendment, &tx.header.account, *support)
                {
                    return fail(ResultCode::NoEntry, format!("unknown amendment {amendment}"));
                }
                Ok(Outcome::default())
            }
            // Unknown types succeed without mutating anything beyond the
            // preamble.
            TxBody::Unknown { .. } => Ok(Outcome::default()),
        }
    }

    /// Common preamble: source fetch, sequence/ticket, amendment gate,
    /// hooks, fee burn, sequence bump.
    fn preamble(&mut self, tx: &Transaction, cp: &mut Checkpoint) -> Result<(), Failure> {
        let address = tx.header.account.clone();
        let Some(source) = self.accounts.get(&address) else {
            return fail(ResultCode::Unfunded, format!("account {address} does not exist"));
        };

        let uses_ticket = !tx.header.ticket_id.is_empty();
        if uses_ticket {
            if !self.engines.tickets.has(&tx.header.ticket_id, &address) {
                return fail(ResultCode::BadSeq, "no such ticket");
            }
        } else if tx.header.sequence != 0 {
            if tx.header.sequence < source.sequence {
                return fail(
                    ResultCode::SeqTooLow,
                    format!("expected seq {}, got {}", source.sequence, tx.header.sequence),
                );
            }
            if tx.header.sequence > source.sequence {
                return fail(
                    ResultCode::BadSeq,
                    format!("expected seq {}, got {}", source.sequence, tx.header.sequence),
                );
            }
        }

        if self.engines.amendments.is_blocked(tx.tx_type()) {
            return fail(ResultCode::AmendmentBlocked, "feature amendment not enabled");
        }

        if !matches!(tx.body, TxBody::HookSet { .. }) {
            if let HookVerdict::Reject { position, reason } =
                self.engines.hooks.evaluate(&address, tx)
            {
                return fail(
                    ResultCode::HooksRejected,
                    format!("hook {position} rejected: {reason}"),
                );
            }
        }

        let fee = tx.header.fee.value;
        if fee < 0 || !tx.header.fee.is_native() {
            return fail(ResultCode::InsufFee, "fee must be native and non-negative");
        }
        {
            let source = self
                .account_mut(cp, &address)
                .expect("source existence checked above");
            if source.balance < fee {
                return fail(ResultCode::InsufFee, "cannot cover fee");
            }
            source.balance -= fee;
            if !uses_ticket {
                source.sequence += 1;
            }
        }
        if uses_ticket {
            self.checkpoint_engines(cp);
            match self.engines.tickets.consume(&tx.header.ticket_id, &address) {
                Ok(_) => {
                    let source = self.account_mut(cp, &address).expect("still present");
                    source.tickets.remove(&tx.header.ticket_id);
                    source.owner_count -= 1;
                }
                Err(TicketError::NotFound(_)) | Err(TicketError::BadCount) => {
                    return fail(ResultCode::BadSeq, "ticket vanished");
                }
            }
        }
        // Fees are burned permanently.
        self.total_supply -= fee;
        self.total_burned += fee;
        Ok(())
    }

    // ---- payments ----

    fn apply_confidential_payment(
        &mut self,
        tx: &Transaction,
        tx_id: &str,
        cp: &mut Checkpoint,
        proof: &riv_core_types::ConfidentialProof,
    ) -> Result<Outcome, Failure> {
        let commitment: [u8; 32] = proof
            .commitment
            .as_slice()
            .try_into()
            .map_err(|_| (ResultCode::BadSig, "malformed commitment".to_string()))?;

        if !range_verify(&proof.range_proof, &commitment) {
            return fail(ResultCode::BadSig, "invalid range proof");
        }
        let digest = tx.signing_digest();
        if !ring_verify(&proof.ring_signature, &digest) {
            return fail(ResultCode::BadSig, "invalid ring signature");
        }
        // The key image on the wire must be the one inside the ring
        // signature, otherwise the spent-set entry would not bind.
        let parsed = RingSignature::from_bytes(&proof.ring_signature)
            .map_err(|_| (ResultCode::BadSig, "malformed ring signature".to_string()))?;
        if parsed.key_image.to_bytes().as_slice() != proof.key_image.as_slice() {
            return fail(ResultCode::BadSig, "key image mismatch");
        }

        let key_image_hex = hex::encode(&proof.key_image);
        if self.spent_key_images.contains(&key_image_hex) {
            return fail(ResultCode::KeyImageSpent, "key image already spent");
        }
        let stealth_hex = hex::encode(&proof.stealth_address);
        if self.confidential_outputs.contains_key(&stealth_hex) {
            return fail(ResultCode::Duplicate, "stealth address already used");
        }

        self.confidential_outputs.insert(
            stealth_hex.clone(),
            ConfidentialOutput {
                commitment: proof.commitment.clone(),
                stealth_address: proof.stealth_address.clone(),
                ephemeral_pub: proof.ephemeral_pub.clone(),
                range_proof: proof.range_proof.clone(),
                view_tag: proof.view_tag,
                tx_id: tx_id.to_string(),
                spent: false,
            },
        );
        cp.added_outputs.push(stealth_hex);
        self.spent_key_images.insert(key_image_hex.clone());
        cp.added_key_images.push(key_image_hex);

        // The plaintext amount is never stored.
        Ok(Outcome::default())
    }

    fn apply_transparent_payment(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        partial: bool,
        deliver_min: i128,
    ) -> Result<Outcome, Failure> {
        let source = tx.header.account.clone();
        let destination = tx.header.destination.clone();
        if destination.is_empty() || destination == source {
            return fail(ResultCode::NoPermission, "invalid destination");
        }
        let amount = tx.header.amount.clone();
        if amount.value <= 0 {
            return fail(ResultCode::NoPermission, "amount must be positive");
        }

        // Destination gates apply whether or not it exists yet.
        if let Some(dest) = self.accounts.get(&destination) {
            if dest.flags.require_dest && tx.header.destination_tag == 0 {
                return fail(ResultCode::DstTagNeeded, "destination requires a tag");
            }
            if dest.flags.deposit_auth && !dest.deposit_preauth.contains(&source) {
                return fail(
                    ResultCode::NoPermission,
                    "destination requires deposit preauthorization",
                );
            }
        }

        if amount.is_native() {
            let src = self.accounts.get(&source).expect("preamble fetched source");
            if src.balance < amount.value {
                return fail(ResultCode::Unfunded, "insufficient balance");
            }
            let post = src.balance - amount.value;
            if post < self.reserve_for(src.owner_count) {
                return fail(ResultCode::Unfunded, "would dip below reserve");
            }
            self.account_mut(cp, &source).expect("present").balance -= amount.value;
            self.account_mut_or_create(cp, &destination).balance += amount.value;
            return Ok(Outcome::delivered(amount.value));
        }

        self.apply_iou_payment(tx, cp, &amount, partial, deliver_min)
    }

    fn apply_iou_payment(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        amount: &Amount,
        partial: bool,
        deliver_min: i128,
    ) -> Result<Outcome, Failure> {
        let source = tx.header.account.clone();
        let destination = tx.header.destination.clone();
        let currency = amount.currency.clone();
        let issuer = amount.issuer.clone();
        if issuer.is_empty() {
            return fail(ResultCode::NoPermission, "IOU amount needs an issuer");
        }

        // Issuer-side reads.
        let (issuer_frozen, issuer_requires_auth, transfer_rate_ppm) = self
            .accounts
            .get(&issuer)
            .map(|a| (a.flags.global_freeze, a.flags.require_auth, a.transfer_rate_ppm()))
            .unwrap_or((false, false, RATE_ONE as u64));

        if issuer_frozen && source != issuer && destination != issuer {
            return fail(ResultCode::GlobalFreeze, "issuer has a global freeze");
        }

        // Sender-side capacity checks (no mutation yet).
        let sender_line = if source != issuer {
            let line = self
                .accounts
                .get(&source)
                .and_then(|a| a.trust_line(&currency, &issuer))
                .cloned();
            match line {
                None => {
                    // No direct line: attempt multi-hop rippling.
                    return self.apply_rippled_payment(
                        tx,
                        cp,
                        &currency,
                        amount.value,
                        partial,
                        deliver_min,
                    );
                }
                Some(line) => {
                    if issuer_requires_auth && !line.authorized {
                        return fail(ResultCode::RequireAuth, "sender line not authorized");
                    }
                    if line.no_ripple {
                        return fail(ResultCode::NoRipple, "sender line has no-ripple set");
                    }
                    if line.frozen {
                        return fail(ResultCode::Frozen, "sender line is frozen");
                    }
                    Some(line)
                }
            }
        } else {
            None
        };

        // Gross units the sender can fund through transfer rate and
        // outbound quality; debits round up, deliveries round down.
        let combined_ppm = sender_line
            .as_ref()
            .map(|line| transfer_rate_ppm * line.quality_out_ppm() / PPM)
            .unwrap_or(PPM);
        let mut gross = amount.value;
        if let Some(line) = &sender_line {
            let funded = line.balance * PPM as i128 / combined_ppm as i128;
            if funded < gross {
                if !partial {
                    return fail(ResultCode::Unfunded, "sender line underfunded");
                }
                gross = funded;
            }
            if gross <= 0 {
                return fail(ResultCode::Unfunded, "nothing deliverable");
            }
        }

        // Recipient-side clamp, still before any mutation.
        let (delivered, gross_needed) = if destination != issuer {
            let recipient_line = self
                .accounts
                .get(&destination)
                .and_then(|a| a.trust_line(&currency, &issuer))
                .cloned();
            let Some(line) = recipient_line else {
                return fail(ResultCode::NoLine, "recipient has no trust line");
            };
            if issuer_requires_auth && !line.authorized {
                return fail(ResultCode::RequireAuth, "recipient line not authorized");
            }
            if line.frozen {
                return fail(ResultCode::Frozen, "recipient line is frozen");
            }
            let quality_in = line.quality_in_ppm();
            let credit_full = mul_ppm_floor(gross, quality_in);
            let credited = credit_full.min(line.available_credit());
            if credited < credit_full && !partial {
                return fail(ResultCode::PartialPayment, "recipient limit would overflow");
            }
            if credited <= 0 {
                return fail(ResultCode::PartialPayment, "recipient line is full");
            }
            // Gross needed to deliver the clamped credit.
            let needed = {
                let numerator = credited * PPM as i128;
                let denominator = quality_in as i128;
                ((numerator + denominator - 1) / denominator).min(gross)
            };
            (credited, needed)
        } else {
            // Redeeming against the issuer consumes the IOU outright.
            (gross, gross)
        };

        if partial && deliver_min > 0 && delivered < deliver_min {
            return fail(ResultCode::PartialPayment, "below deliver_min");
        }

        // Mutate: debit the sender, credit the recipient.
        if sender_line.is_some() {
            let debit = mul_ppm_ceil(gross_needed, combined_ppm);
            let account = self.account_mut(cp, &source).expect("present");
            let line = account
                .trust_line_mut(&currency, &issuer)
                .expect("line read above");
            line.balance -= debit.min(line.balance);
        }
        if destination != issuer {
            let account = self.account_mut(cp, &destination).expect("line read above");
            account
                .trust_line_mut(&currency, &issuer)
                .expect("line read above")
                .balance += delivered;
        }
        Ok(Outcome::delivered(delivered))
    }

    fn apply_rippled_payment(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        currency: &str,
        amount: i128,
        partial: bool,
        deliver_min: i128,
    ) -> Result<Outcome, Failure> {
        let graph = TrustGraph::build(self, currency);
        let finder = PathFinder::new(&graph);
        let Some(path) =
            finder.find_best_path(&tx.header.account, &tx.header.destination, amount)
        else {
            return fail(ResultCode::NoLine, "no ripple path");
        };
        let delivered = path.deliverable.min(amount);
        if delivered <= 0 {
            return fail(ResultCode::NoLine, "no ripple capacity");
        }
        if delivered < amount && !partial {
            return fail(ResultCode::Unfunded, "path cannot carry the full amount");
        }
        if partial && deliver_min > 0 && delivered < deliver_min {
            return fail(ResultCode::PartialPayment, "below deliver_min");
        }
        execute_path(self, cp, &path, currency, delivered);
        Ok(Outcome::delivered(delivered))
    }

    // ---- trust lines ----

    #[allow(clippy::too_many_arguments)]
    fn apply_trust_set(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        limit_amount: &Amount,
        quality_in: u32,
        quality_out: u32,
        flags: [bool; 6],
    ) -> Result<Outcome, Failure> {
        let [set_auth, clear_auth, set_no_ripple, clear_no_ripple, set_freeze, clear_freeze] =
            flags;
        let account_addr = tx.header.account.clone();
        let currency = limit_amount.currency.clone();
        let peer = limit_amount.issuer.clone();
        if peer.is_empty() || peer == account_addr || limit_amount.is_native() {
            return fail(ResultCode::NoPermission, "invalid trust line target");
        }

        let issuer_side = set_auth || clear_auth || set_freeze || clear_freeze;
        if issuer_side {
            // The submitter acts as issuer on the peer's line toward it.
            let holder = peer;
            let issuer = account_addr;
            let Some(holder_account) = self.account_mut(cp, &holder) else {
                return fail(ResultCode::NoEntry, "holder account missing");
            };
            let Some(line) = holder_account.trust_line_mut(&currency, &issuer) else {
                return fail(ResultCode::NoEntry, "no such trust line");
            };
            if set_auth {
                line.authorized = true;
            }
            if clear_auth {
                line.authorized = false;
            }
            if set_freeze {
                line.frozen = true;
            }
            if clear_freeze {
                line.frozen = false;
            }
            return Ok(Outcome::default());
        }

        // Holder side: create or update own line.
        let (owner_count, balance) = {
            let account = self.accounts.get(&account_addr).expect("preamble");
            (account.owner_count, account.balance)
        };
        let key = (currency.clone(), peer.clone());
        let exists = self
            .accounts
            .get(&account_addr)
            .map(|a| a.trust_lines.contains_key(&key))
            .unwrap_or(false);
        if !exists && balance < self.reserve_for(owner_count + 1) {
            return fail(ResultCode::OwnerReserve, "reserve for new trust line");
        }

        let account = self.account_mut(cp, &account_addr).expect("preamble");
        let line = account
            .trust_lines
            .entry(key)
            .or_insert_with(|| TrustLine::with_limit(0));
        line.limit = limit_amount.value;
        if quality_in != 0 {
            line.quality_in = quality_in;
        }
        if quality_out != 0 {
            line.quality_out = quality_out;
        }
        if set_no_ripple {
            line.no_ripple = true;
        }
        if clear_no_ripple {
            line.no_ripple = false;
        }
        if !exists {
            account.owner_count += 1;
        } else if limit_amount.value == 0 && line.balance == 0 {
            // A zeroed, empty line is removed.
            account.trust_lines.remove(&(currency, peer));
            account.owner_count -= 1;
        }
        Ok(Outcome::default())
    }

    // ---- offers ----

    #[allow(clippy::too_many_arguments)]
    fn apply_offer_create(
        &mut self,
        tx: &Transaction,
        tx_id: &str,
        cp: &mut Checkpoint,
        taker_pays: &Amount,
        taker_gets: &Amount,
        immediate_or_cancel: bool,
        fill_or_kill: bool,
        expiration: i64,
    ) -> Result<Outcome, Failure> {
        if taker_pays.value <= 0 || taker_gets.value <= 0 {
            return fail(ResultCode::NoPermission, "offer amounts must be positive");
        }
        let account_addr = tx.header.account.clone();
        let base_leg = leg(&taker_gets.currency, &taker_gets.issuer);
        let counter_leg = leg(&taker_pays.currency, &taker_pays.issuer);

        // The offer owner must currently hold what it is selling.
        if taker_gets.is_native() {
            let account = self.accounts.get(&account_addr).expect("preamble");
            if account.balance < taker_gets.value {
                return fail(ResultCode::Unfunded, "cannot fund offer");
            }
        } else {
            let held = self
                .accounts
                .get(&account_addr)
                .and_then(|a| a.trust_line(&taker_gets.currency, &taker_gets.issuer))
                .map(|l| l.balance)
                .unwrap_or(0);
            if held < taker_gets.value {
                return fail(ResultCode::Unfunded, "cannot fund offer");
            }
        }

        let time_in_force = if fill_or_kill {
            TimeInForce::Fok
        } else if immediate_or_cancel {
            TimeInForce::Ioc
        } else {
            TimeInForce::Gtc
        };

        self.checkpoint_engines(cp);
        let fills = if base_leg != NATIVE_LEG && counter_leg != NATIVE_LEG {
            // No native side: auto-bridge through NXF, selling the
            // offered leg and buying the wanted one.
            self.engines.order_book.submit_auto_bridged(
                &account_addr,
                &base_leg,
                &counter_leg,
                taker_gets.value,
                tx_id,
                tx.header.timestamp,
            )
        } else {
            let pair = format!("{base_leg}/{counter_leg}");
            let price_ppm =
                (taker_pays.value as u128 * PPM as u128 / taker_gets.value as u128).max(1);
            self.engines.order_book.submit_order(
                &account_addr,
                &pair,
                Side::Sell,
                price_ppm,
                taker_gets.value,
                tx_id,
                time_in_force,
                expiration,
                tx.header.timestamp,
            )
        };

        let mut filled_base = 0;
        for fill in &fills {
            self.settle_fill(cp, fill)?;
            filled_base += fill.base_quantity;
        }
        self.release_consumed_offers(cp, &fills);

        if self.engines.order_book.has_order(tx_id) {
            let (owner_count, balance) = {
                let account = self.accounts.get(&account_addr).expect("preamble");
                (account.owner_count, account.balance)
            };
            if balance < self.reserve_for(owner_count + 1) {
                // Cannot afford to keep the remainder on the book.
                self.engines.order_book.cancel_order(tx_id);
            } else {
                let account = self.account_mut(cp, &account_addr).expect("preamble");
                account.open_offers.push((tx.header.sequence, tx_id.to_string()));
                account.owner_count += 1;
            }
        }
        Ok(Outcome::delivered(filled_base))
    }

    fn apply_offer_cancel(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        offer_sequence: i64,
    ) -> Result<Outcome, Failure> {
        let account_addr = tx.header.account.clone();
        let order_id = self
            .accounts
            .get(&account_addr)
            .and_then(|a| {
                a.open_offers
                    .iter()
                    .find(|(seq, _)| *seq == offer_sequence)
                    .map(|(_, id)| id.clone())
            });
        // Best effort: a missing offer is not an error.
        if let Some(order_id) = order_id {
            self.checkpoint_engines(cp);
            self.engines.order_book.cancel_order(&order_id);
            let account = self.account_mut(cp, &account_addr).expect("preamble");
            account.open_offers.retain(|(_, id)| id != &order_id);
            account.owner_count -= 1;
        }
        Ok(Outcome::default())
    }

    /// Settle one fill: base flows seller to buyer, counter the other
    /// way. Moves clamp at available funds, which keeps settlement
    /// deterministic even when a maker spent its funding after resting.
    fn settle_fill(&mut self, cp: &mut Checkpoint, fill: &Fill) -> Result<(), Failure> {
        let (base_name, counter_name) = fill
            .pair
            .split_once('/')
            .ok_or((ResultCode::NoPermission, "malformed pair".to_string()))?;
        let (base_payer, base_receiver) = match fill.taker_side {
            Side::Sell => (fill.taker_account.clone(), fill.maker_account.clone()),
            Side::Buy => (fill.maker_account.clone(), fill.taker_account.clone()),
        };
        let counter_amount = fill.counter_quantity();

        self.move_asset(cp, base_name, &base_payer, &base_receiver, fill.base_quantity);
        self.move_asset(cp, counter_name, &base_receiver, &base_payer, counter_amount);
        Ok(())
    }

    /// Move up to `amount` of a pair leg between accounts, clamping at
    /// the payer's holdings and the receiver's line limit.
    fn move_asset(
        &mut self,
        cp: &mut Checkpoint,
        leg_name: &str,
        payer: &str,
        receiver: &str,
        amount: i128,
    ) -> i128 {
        if amount <= 0 || payer == receiver {
            return 0;
        }
        let (currency, issuer) = parse_leg(leg_name);
        if issuer.is_empty() {
            let available = self.get_balance(payer);
            let moved = amount.min(available);
            if moved > 0 {
                self.account_mut(cp, payer).expect("has balance").balance -= moved;
                self.account_mut_or_create(cp, receiver).balance += moved;
            }
            return moved;
        }
        let held = self
            .accounts
            .get(payer)
            .and_then(|a| a.trust_line(&currency, &issuer))
            .map(|l| l.balance)
            .unwrap_or(0);
        let headroom = self
            .accounts
            .get(receiver)
            .and_then(|a| a.trust_line(&currency, &issuer))
            .map(|l| l.available_credit())
            .unwrap_or(0);
        let moved = amount.min(held).min(headroom);
        if moved > 0 {
            self.account_mut(cp, payer)
                .expect("held > 0")
                .trust_line_mut(&currency, &issuer)
                .expect("held > 0")
                .balance -= moved;
            self.account_mut(cp, receiver)
                .expect("headroom > 0")
                .trust_line_mut(&currency, &issuer)
                .expect("headroom > 0")
                .balance += moved;
        }
        moved
    }

    /// Drop book-consumed offers from their owners' accounts.
    fn release_consumed_offers(&mut self, cp: &mut Checkpoint, fills: &[Fill]) {
        for fill in fills {
            if !self.engines.order_book.has_order(&fill.maker_order_id) {
                let maker = fill.maker_account.clone();
                if let Some(account) = self.account_mut(cp, &maker) {
                    let before = account.open_offers.len();
                    account
                        .open_offers
                        .retain(|(_, id)| id != &fill.maker_order_id);
                    if account.open_offers.len() < before {
                        account.owner_count -= 1;
                    }
                }
            }
        }
    }

    // ---- account management ----

    fn apply_account_set(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        set_flag: &Option<AccountFlag>,
        clear_flag: &Option<AccountFlag>,
        domain: &Option<String>,
        transfer_rate: &Option<u32>,
    ) -> Result<Outcome, Failure> {
        if let Some(rate) = transfer_rate {
            if *rate != 0 && (*rate < RATE_ONE || *rate > 2 * RATE_ONE) {
                return fail(ResultCode::NoPermission, "transfer rate out of range");
            }
        }
        let account = self
            .account_mut(cp, &tx.header.account)
            .expect("preamble fetched source");
        if let Some(flag) = set_flag {
            account.flags.apply(*flag, true);
        }
        if let Some(flag) = clear_flag {
            account.flags.apply(*flag, false);
        }
        if let Some(domain) = domain {
            account.domain = domain.clone();
        }
        if let Some(rate) = transfer_rate {
            account.transfer_rate = if *rate == 0 { RATE_ONE } else { *rate };
        }
        Ok(Outcome::default())
    }

    fn apply_signer_list_set(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        quorum: u32,
        entries: &[riv_core_types::SignerEntry],
    ) -> Result<Outcome, Failure> {
        let account_addr = tx.header.account.clone();
        if quorum == 0 {
            // Remove the list.
            let account = self.account_mut(cp, &account_addr).expect("preamble");
            if account.signer_list.take().is_some() {
                account.owner_count -= 1;
            }
            return Ok(Outcome::default());
        }
        if entries.is_empty() {
            return fail(ResultCode::NoPermission, "quorum set but no signers");
        }
        let mut seen = std::collections::BTreeSet::new();
        for entry in entries {
            if entry.account == account_addr {
                return fail(
                    ResultCode::NoPermission,
                    "account cannot be in its own signer list",
                );
            }
            if !seen.insert(&entry.account) {
                return fail(ResultCode::NoPermission, "duplicate signer");
            }
        }
        let total: u32 = entries.iter().map(|e| e.weight).sum();
        if total < quorum {
            return fail(
                ResultCode::NoPermission,
                format!("total weight {total} below quorum {quorum}"),
            );
        }
        let account = self.account_mut(cp, &account_addr).expect("preamble");
        if account.signer_list.is_none() {
            account.owner_count += 1;
        }
        account.signer_list = Some(SignerList {
            quorum,
            entries: entries.to_vec(),
        });
        Ok(Outcome::default())
    }

    fn apply_deposit_preauth(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        authorize: &str,
        unauthorize: &str,
    ) -> Result<Outcome, Failure> {
        let account = self
            .account_mut(cp, &tx.header.account)
            .expect("preamble fetched source");
        if !authorize.is_empty() && account.deposit_preauth.insert(authorize.to_string()) {
            account.owner_count += 1;
        }
        if !unauthorize.is_empty() && account.deposit_preauth.remove(unauthorize) {
            account.owner_count -= 1;
        }
        Ok(Outcome::default())
    }

    fn apply_ticket_create(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        count: u32,
    ) -> Result<Outcome, Failure> {
        let account_addr = tx.header.account.clone();
        let (owner_count, balance, base_seq) = {
            let account = self.accounts.get(&account_addr).expect("preamble");
            (account.owner_count, account.balance, account.sequence)
        };
        if balance < self.reserve_for(owner_count + count as i64) {
            return fail(ResultCode::OwnerReserve, "reserve for tickets");
        }
        self.checkpoint_engines(cp);
        let ids = self
            .engines
            .tickets
            .create(&account_addr, base_seq, count)
            .map_err(|e| (ResultCode::NoPermission, e.to_string()))?;
        let account = self.account_mut(cp, &account_addr).expect("preamble");
        for id in &ids {
            account.tickets.insert(id.clone());
        }
        account.owner_count += count as i64;
        Ok(Outcome::default())
    }

    fn apply_account_delete(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
    ) -> Result<Outcome, Failure> {
        let account_addr = tx.header.account.clone();
        let destination = tx.header.destination.clone();
        if tx.header.fee.value < self.params.account_delete_fee {
            return fail(
                ResultCode::InsufFee,
                format!(
                    "account deletion requires a fee of at least {}",
                    self.params.account_delete_fee
                ),
            );
        }
        if destination.is_empty() || destination == account_addr {
            return fail(ResultCode::NoPermission, "invalid beneficiary");
        }
        if !self.accounts.contains_key(&destination) {
            return fail(ResultCode::NoEntry, "beneficiary does not exist");
        }
        let account = self.accounts.get(&account_addr).expect("preamble");
        if account.owner_count > 0 {
            return fail(ResultCode::NoPermission, "account still owns objects");
        }
        if !account.trust_lines.is_empty() {
            return fail(ResultCode::NoPermission, "account still has trust lines");
        }
        if account.sequence < self.params.account_delete_min_seq {
            return fail(
                ResultCode::NoPermission,
                format!("sequence below {}", self.params.account_delete_min_seq),
            );
        }
        let residual = account.balance;
        self.remove_account(cp, &account_addr);
        self.account_mut(cp, &destination)
            .expect("existence checked")
            .balance += residual;
        Ok(Outcome::delivered(residual))
    }

    // ---- escrows ----

    fn apply_escrow_create(
        &mut self,
        tx: &Transaction,
        tx_id: &str,
        cp: &mut Checkpoint,
        condition: &str,
        finish_after: i64,
        cancel_after: i64,
    ) -> Result<Outcome, Failure> {
        let account_addr = tx.header.account.clone();
        let destination = tx.header.destination.clone();
        let amount = tx.header.amount.value;
        if destination.is_empty() {
            return fail(ResultCode::NoPermission, "escrow requires a destination");
        }
        if !tx.header.amount.is_native() || amount <= 0 {
            return fail(ResultCode::NoPermission, "escrow amount must be native");
        }
        let account = self.accounts.get(&account_addr).expect("preamble");
        if account.balance < amount
            || account.balance - amount < self.reserve_for(account.owner_count + 1)
        {
            return fail(ResultCode::Unfunded, "cannot fund escrow");
        }
        self.checkpoint_engines(cp);
        self.engines
            .escrows
            .create(
                tx_id,
                &account_addr,
                &destination,
                amount,
                condition,
                finish_after,
                cancel_after,
                tx.header.timestamp,
            )
            .map_err(|e| match e {
                EscrowError::BadTimeBounds => {
                    (ResultCode::EscrowBadCondition, e.to_string())
                }
                other => (ResultCode::NoPermission, other.to_string()),
            })?;
        let account = self.account_mut(cp, &account_addr).expect("preamble");
        account.balance -= amount;
        account.owner_count += 1;
        Ok(Outcome::default())
    }

    fn apply_escrow_finish(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        escrow_id: &str,
        fulfillment: &str,
    ) -> Result<Outcome, Failure> {
        self.checkpoint_engines(cp);
        let (creator, destination, amount) = {
            let entry = self
                .engines
                .escrows
                .finish(escrow_id, fulfillment, tx.header.timestamp)
                .map_err(escrow_failure)?;
            (entry.account.clone(), entry.destination.clone(), entry.amount)
        };
        self.account_mut_or_create(cp, &destination).balance += amount;
        if let Some(account) = self.account_mut(cp, &creator) {
            account.owner_count -= 1;
        }
        Ok(Outcome::delivered(amount))
    }

    fn apply_escrow_cancel(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        escrow_id: &str,
    ) -> Result<Outcome, Failure> {
        self.checkpoint_engines(cp);
        let (creator, amount) = {
            let entry = self
                .engines
                .escrows
                .cancel(escrow_id, tx.header.timestamp)
                .map_err(escrow_failure)?;
            (entry.account.clone(), entry.amount)
        };
        if let Some(account) = self.account_mut(cp, &creator) {
            account.balance += amount;
            account.owner_count -= 1;
        }
        Ok(Outcome::delivered(amount))
    }

    // ---- payment channels ----

    fn apply_channel_create(
        &mut self,
        tx: &Transaction,
        tx_id: &str,
        cp: &mut Checkpoint,
        settle_delay: i64,
        public_key: &str,
        cancel_after: i64,
    ) -> Result<Outcome, Failure> {
        let account_addr = tx.header.account.clone();
        let destination = tx.header.destination.clone();
        let amount = tx.header.amount.value;
        if destination.is_empty() || settle_delay <= 0 {
            return fail(ResultCode::NoPermission, "channel needs destination and delay");
        }
        if !tx.header.amount.is_native() || amount <= 0 {
            return fail(ResultCode::NoPermission, "channel amount must be native");
        }
        let account = self.accounts.get(&account_addr).expect("preamble");
        if account.balance < amount
            || account.balance - amount < self.reserve_for(account.owner_count + 1)
        {
            return fail(ResultCode::Unfunded, "cannot fund channel");
        }
        self.checkpoint_engines(cp);
        self.engines.channels.create(
            tx_id,
            &account_addr,
            &destination,
            amount,
            settle_delay,
            public_key,
            cancel_after,
            tx.header.timestamp,
        );
        let account = self.account_mut(cp, &account_addr).expect("preamble");
        account.balance -= amount;
        account.owner_count += 1;
        Ok(Outcome::default())
    }

    fn apply_channel_fund(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        channel_id: &str,
    ) -> Result<Outcome, Failure> {
        let account_addr = tx.header.account.clone();
        let amount = tx.header.amount.value;
        if amount <= 0 {
            return fail(ResultCode::NoPermission, "fund amount must be positive");
        }
        let account = self.accounts.get(&account_addr).expect("preamble");
        if account.balance < amount {
            return fail(ResultCode::Unfunded, "cannot fund channel");
        }
        self.checkpoint_engines(cp);
        self.engines
            .channels
            .fund(channel_id, &account_addr, amount)
            .map_err(channel_failure)?;
        self.account_mut(cp, &account_addr).expect("preamble").balance -= amount;
        Ok(Outcome::default())
    }

    fn apply_channel_claim(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        channel_id: &str,
        claim_balance: i128,
        close: bool,
    ) -> Result<Outcome, Failure> {
        self.checkpoint_engines(cp);
        let mut delivered = 0;
        if claim_balance > 0 {
            let payout = self
                .engines
                .channels
                .claim(channel_id, claim_balance, tx.header.timestamp)
                .map_err(channel_failure)?;
            let destination = self
                .engines
                .channels
                .get(channel_id)
                .expect("claim succeeded")
                .destination
                .clone();
            self.account_mut_or_create(cp, &destination).balance += payout;
            delivered = payout;
        }
        if close {
            match self
                .engines
                .channels
                .request_close(channel_id, &tx.header.account, tx.header.timestamp)
            {
                Ok(CloseOutcome::Closed { remainder }) => {
                    let creator = self
                        .engines
                        .channels
                        .get(channel_id)
                        .expect("just closed")
                        .account
                        .clone();
                    if let Some(account) = self.account_mut(cp, &creator) {
                        account.balance += remainder;
                        account.owner_count -= 1;
                    }
                }
                Ok(CloseOutcome::DelayStarted) => {}
                Err(ChannelError::SettleDelay(_)) => {}
                Err(e) => return Err(channel_failure(e)),
            }
        }
        Ok(Outcome::delivered(delivered))
    }

    // ---- checks ----

    fn apply_check_create(
        &mut self,
        tx: &Transaction,
        tx_id: &str,
        cp: &mut Checkpoint,
        expiration: i64,
    ) -> Result<Outcome, Failure> {
        let destination = tx.header.destination.clone();
        if destination.is_empty() {
            return fail(ResultCode::NoPermission, "check requires a destination");
        }
        if tx.header.amount.value <= 0 {
            return fail(ResultCode::NoPermission, "send_max must be positive");
        }
        self.checkpoint_engines(cp);
        self.engines.checks.create(
            tx_id,
            &tx.header.account,
            &destination,
            tx.header.amount.clone(),
            expiration,
            tx.header.timestamp,
        );
        let account_addr = tx.header.account.clone();
        self.account_mut(cp, &account_addr).expect("preamble").owner_count += 1;
        Ok(Outcome::default())
    }

    fn apply_check_cash(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        check_id: &str,
        cash_amount: i128,
        deliver_min: i128,
    ) -> Result<Outcome, Failure> {
        self.checkpoint_engines(cp);
        let (creator, send_max, amount) = {
            let (entry, amount) = self
                .engines
                .checks
                .cash(
                    check_id,
                    &tx.header.account,
                    cash_amount,
                    deliver_min,
                    tx.header.timestamp,
                )
                .map_err(check_failure)?;
            (entry.account.clone(), entry.send_max.clone(), amount)
        };
        let casher = tx.header.account.clone();
        let delivered = if send_max.is_native() {
            let available = self.get_balance(&creator);
            if available < amount {
                return fail(ResultCode::Unfunded, "check writer cannot pay");
            }
            self.account_mut(cp, &creator).expect("exists").balance -= amount;
            self.account_mut(cp, &casher).expect("preamble").balance += amount;
            amount
        } else {
            let moved = self.move_asset(
                cp,
                &leg(&send_max.currency, &send_max.issuer),
                &creator,
                &casher,
                amount,
            );
            if moved <= 0 {
                return fail(ResultCode::Unfunded, "check writer cannot pay");
            }
            moved
        };
        if let Some(account) = self.account_mut(cp, &creator) {
            account.owner_count -= 1;
        }
        Ok(Outcome::delivered(delivered))
    }

    fn apply_check_cancel(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        check_id: &str,
    ) -> Result<Outcome, Failure> {
        self.checkpoint_engines(cp);
        let creator = {
            let entry = self
                .engines
                .checks
                .cancel(check_id, &tx.header.account, tx.header.timestamp)
                .map_err(check_failure)?;
            entry.account.clone()
        };
        if let Some(account) = self.account_mut(cp, &creator) {
            account.owner_count -= 1;
        }
        Ok(Outcome::default())
    }

    // ---- staking ----

    fn apply_stake(
        &mut self,
        tx: &Transaction,
        tx_id: &str,
        cp: &mut Checkpoint,
        tier: riv_core_types::StakeTier,
    ) -> Result<Outcome, Failure> {
        let account_addr = tx.header.account.clone();
        let amount = tx.header.amount.value;
        if !tx.header.amount.is_native() || amount <= 0 {
            return fail(ResultCode::NoPermission, "stake amount must be native");
        }
        let account = self.accounts.get(&account_addr).expect("preamble");
        if account.balance < amount
            || account.balance - amount < self.reserve_for(account.owner_count)
        {
            return fail(ResultCode::Unfunded, "cannot fund stake");
        }
        self.checkpoint_engines(cp);
        self.engines
            .staking
            .record_stake(
                tx_id,
                &account_addr,
                amount,
                tier,
                self.total_supply,
                tx.header.timestamp,
            )
            .map_err(|e| match e {
                StakeError::BelowMinimum => (ResultCode::Unfunded, e.to_string()),
                StakeError::AlreadyRecorded(_) => (ResultCode::Duplicate, e.to_string()),
                other => (ResultCode::StakeLocked, other.to_string()),
            })?;
        self.account_mut(cp, &account_addr).expect("preamble").balance -= amount;
        Ok(Outcome::default())
    }

    fn apply_unstake(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        stake_id: &str,
    ) -> Result<Outcome, Failure> {
        self.checkpoint_engines(cp);
        let (payout, interest_kept, _forfeited, principal_penalty) = self
            .engines
            .staking
            .cancel_stake(stake_id, &tx.header.account, tx.header.timestamp)
            .map_err(|e| (ResultCode::StakeLocked, e.to_string()))?;
        let account_addr = tx.header.account.clone();
        self.account_mut(cp, &account_addr).expect("preamble").balance += payout;
        // The principal penalty burns; interest kept is minted now.
        self.total_supply -= principal_penalty;
        self.total_burned += principal_penalty;
        self.total_supply += interest_kept;
        self.total_minted += interest_kept;
        Ok(Outcome::delivered(payout))
    }

    // ---- clawback ----

    fn apply_clawback(&mut self, tx: &Transaction, cp: &mut Checkpoint) -> Result<Outcome, Failure> {
        let issuer = tx.header.account.clone();
        let holder = tx.header.destination.clone();
        let amount = &tx.header.amount;
        let allowed = self
            .accounts
            .get(&issuer)
            .map(|a| a.flags.allow_clawback)
            .unwrap_or(false);
        if !allowed {
            return fail(ResultCode::ClawbackDisabled, "issuer has not enabled clawback");
        }
        if amount.is_native() || amount.issuer != issuer {
            return fail(ResultCode::NoPermission, "can only claw back own IOUs");
        }
        let Some(holder_account) = self.account_mut(cp, &holder) else {
            return fail(ResultCode::NoEntry, "holder does not exist");
        };
        let Some(line) = holder_account.trust_line_mut(&amount.currency, &issuer) else {
            return fail(ResultCode::NoEntry, "holder has no such line");
        };
        let clawed = amount.value.min(line.balance).max(0);
        line.balance -= clawed;
        Ok(Outcome::delivered(clawed))
    }

    // ---- NFTs ----

    fn apply_nft_mint(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        taxon: i64,
        uri: &str,
        transferable: bool,
        burnable: bool,
    ) -> Result<Outcome, Failure> {
        let account_addr = tx.header.account.clone();
        let account = self.accounts.get(&account_addr).expect("preamble");
        if account.balance < self.reserve_for(account.owner_count + 1) {
            return fail(ResultCode::OwnerReserve, "reserve for NFT");
        }
        self.checkpoint_engines(cp);
        self.engines
            .nftokens
            .mint(&account_addr, taxon, uri, transferable, burnable);
        self.account_mut(cp, &account_addr).expect("preamble").owner_count += 1;
        Ok(Outcome::default())
    }

    fn apply_nft_burn(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        nftoken_id: &str,
    ) -> Result<Outcome, Failure> {
        self.checkpoint_engines(cp);
        let owner = self
            .engines
            .nftokens
            .get_token(nftoken_id)
            .map(|t| t.owner.clone());
        self.engines
            .nftokens
            .burn(nftoken_id, &tx.header.account)
            .map_err(nft_failure)?;
        if let Some(owner) = owner {
            if let Some(account) = self.account_mut(cp, &owner) {
                account.owner_count -= 1;
            }
        }
        Ok(Outcome::default())
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_nft_offer_create(
        &mut self,
        tx: &Transaction,
        tx_id: &str,
        cp: &mut Checkpoint,
        nftoken_id: &str,
        is_sell: bool,
        offer_destination: &str,
        expiration: i64,
    ) -> Result<Outcome, Failure> {
        let account_addr = tx.header.account.clone();
        let price = tx.header.amount.value;
        if price < 0 || !tx.header.amount.is_native() {
            return fail(ResultCode::NoPermission, "NFT offers are priced in native");
        }
        if !is_sell {
            // A buy offer must be coverable right now.
            let account = self.accounts.get(&account_addr).expect("preamble");
            if account.balance < price {
                return fail(ResultCode::Unfunded, "cannot cover buy offer");
            }
        }
        self.checkpoint_engines(cp);
        self.engines
            .nftokens
            .create_offer(
                tx_id,
                nftoken_id,
                &account_addr,
                price,
                is_sell,
                offer_destination,
                expiration,
            )
            .map_err(nft_failure)?;
        self.account_mut(cp, &account_addr).expect("preamble").owner_count += 1;
        Ok(Outcome::default())
    }

    fn apply_nft_offer_accept(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        offer_id: &str,
    ) -> Result<Outcome, Failure> {
        self.checkpoint_engines(cp);
        let offer_owner = self
            .engines
            .nftokens
            .get_offer(offer_id)
            .map(|o| o.owner.clone());
        let trade = self
            .engines
            .nftokens
            .accept_offer(offer_id, &tx.header.account, tx.header.timestamp)
            .map_err(nft_failure)?;
        if trade.amount > 0 {
            let buyer_balance = self.get_balance(&trade.buyer);
            if buyer_balance < trade.amount {
                return fail(ResultCode::Unfunded, "buyer cannot pay");
            }
            let buyer = trade.buyer.clone();
            let seller = trade.seller.clone();
            self.account_mut(cp, &buyer).expect("balance checked").balance -= trade.amount;
            self.account_mut_or_create(cp, &seller).balance += trade.amount;
        }
        // The consumed offer no longer charges its creator's reserve.
        if let Some(owner) = offer_owner {
            if let Some(account) = self.account_mut(cp, &owner) {
                account.owner_count -= 1;
            }
        }
        Ok(Outcome::delivered(trade.amount))
    }

    fn apply_nft_offer_cancel(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        offer_id: &str,
    ) -> Result<Outcome, Failure> {
        self.checkpoint_engines(cp);
        self.engines
            .nftokens
            .cancel_offer(offer_id, &tx.header.account)
            .map_err(nft_failure)?;
        let account_addr = tx.header.account.clone();
        self.account_mut(cp, &account_addr).expect("preamble").owner_count -= 1;
        Ok(Outcome::default())
    }

    // ---- AMM ----

    fn apply_amm_create(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        asset_a: &Amount,
        asset_b: &Amount,
        trading_fee_bps: u32,
    ) -> Result<Outcome, Failure> {
        let account_addr = tx.header.account.clone();
        self.debit_asset(cp, &account_addr, asset_a)?;
        self.debit_asset(cp, &account_addr, asset_b)?;
        self.checkpoint_engines(cp);
        self.engines
            .amm
            .create_pool(
                &account_addr,
                &asset_a.currency,
                &asset_a.issuer,
                asset_a.value,
                &asset_b.currency,
                &asset_b.issuer,
                asset_b.value,
                trading_fee_bps,
            )
            .map_err(amm_failure)?;
        self.account_mut(cp, &account_addr).expect("preamble").owner_count += 1;
        Ok(Outcome::default())
    }

    fn apply_amm_deposit(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        pool_id: &str,
        amount_a: i128,
        amount_b: i128,
    ) -> Result<Outcome, Failure> {
        let account_addr = tx.header.account.clone();
        let (leg_a, leg_b) = {
            let pool = self
                .engines
                .amm
                .get(pool_id)
                .ok_or((ResultCode::AmmBalance, format!("pool {pool_id} not found")))?;
            (pool.asset_a.clone(), pool.asset_b.clone())
        };
        if amount_a > 0 {
            self.debit_leg(cp, &account_addr, &leg_a, amount_a)?;
        }
        if amount_b > 0 {
            self.debit_leg(cp, &account_addr, &leg_b, amount_b)?;
        }
        self.checkpoint_engines(cp);
        self.engines
            .amm
            .deposit(pool_id, &account_addr, amount_a, amount_b)
            .map_err(amm_failure)?;
        Ok(Outcome::default())
    }

    fn apply_amm_withdraw(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        pool_id: &str,
        lp_tokens: i128,
    ) -> Result<Outcome, Failure> {
        let account_addr = tx.header.account.clone();
        let (leg_a, leg_b) = {
            let pool = self
                .engines
                .amm
                .get(pool_id)
                .ok_or((ResultCode::AmmBalance, format!("pool {pool_id} not found")))?;
            (pool.asset_a.clone(), pool.asset_b.clone())
        };
        self.checkpoint_engines(cp);
        let (out_a, out_b) = self
            .engines
            .amm
            .withdraw(pool_id, &account_addr, lp_tokens)
            .map_err(amm_failure)?;
        self.credit_leg(cp, &account_addr, &leg_a, out_a);
        self.credit_leg(cp, &account_addr, &leg_b, out_b);
        Ok(Outcome::default())
    }

    fn apply_amm_bid(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        pool_id: &str,
    ) -> Result<Outcome, Failure> {
        let account_addr = tx.header.account.clone();
        let bid = tx.header.amount.value;
        if !tx.header.amount.is_native() || bid <= 0 {
            return fail(ResultCode::AmmBalance, "bid must be positive native");
        }
        let balance = self.get_balance(&account_addr);
        if balance < bid {
            return fail(ResultCode::AmmBalance, "cannot cover bid");
        }
        self.checkpoint_engines(cp);
        self.engines
            .amm
            .bid(pool_id, &account_addr, bid, tx.header.timestamp)
            .map_err(amm_failure)?;
        // The winning bid is burned.
        self.account_mut(cp, &account_addr).expect("preamble").balance -= bid;
        self.total_supply -= bid;
        self.total_burned += bid;
        Ok(Outcome::default())
    }

    fn apply_amm_delete(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        pool_id: &str,
    ) -> Result<Outcome, Failure> {
        let account_addr = tx.header.account.clone();
        self.checkpoint_engines(cp);
        let (leg_a, leg_b, reserve_a, reserve_b) = self
            .engines
            .amm
            .delete_pool(pool_id, &account_addr)
            .map_err(amm_failure)?;
        self.credit_leg(cp, &account_addr, &leg_a, reserve_a);
        self.credit_leg(cp, &account_addr, &leg_b, reserve_b);
        self.account_mut(cp, &account_addr).expect("preamble").owner_count -= 1;
        Ok(Outcome::default())
    }

    fn debit_asset(
        &mut self,
        cp: &mut Checkpoint,
        account: &str,
        amount: &Amount,
    ) -> Result<(), Failure> {
        if amount.value <= 0 {
            return fail(ResultCode::AmmBalance, "asset amounts must be positive");
        }
        self.debit_leg(cp, account, &leg(&amount.currency, &amount.issuer), amount.value)
    }

    fn debit_leg(
        &mut self,
        cp: &mut Checkpoint,
        account: &str,
        leg_name: &str,
        amount: i128,
    ) -> Result<(), Failure> {
        let (currency, issuer) = parse_leg(leg_name);
        if issuer.is_empty() {
            if self.get_balance(account) < amount {
                return fail(ResultCode::AmmBalance, "insufficient native funds");
            }
            self.account_mut(cp, account).expect("balance checked").balance -= amount;
        } else {
            let held = self
                .accounts
                .get(account)
                .and_then(|a| a.trust_line(&currency, &issuer))
                .map(|l| l.balance)
                .unwrap_or(0);
            if held < amount {
                return fail(ResultCode::AmmBalance, "insufficient IOU funds");
            }
            self.account_mut(cp, account)
                .expect("held checked")
                .trust_line_mut(&currency, &issuer)
                .expect("held checked")
                .balance -= amount;
        }
        Ok(())
    }

    fn credit_leg(&mut self, cp: &mut Checkpoint, account: &str, leg_name: &str, amount: i128) {
        if amount <= 0 {
            return;
        }
        let (currency, issuer) = parse_leg(leg_name);
        if issuer.is_empty() {
            self.account_mut_or_create(cp, account).balance += amount;
        } else {
            let holder = self.account_mut_or_create(cp, account);
            let line = holder
                .trust_lines
                .entry((currency, issuer))
                .or_insert_with(|| TrustLine::with_limit(0));
            line.balance += amount;
            // Returned reserves may exceed the old limit; lift it so the
            // limit invariant keeps holding.
            if line.balance > line.limit {
                line.limit = line.balance;
            }
        }
    }

    // ---- oracles, DIDs ----

    fn apply_oracle_set(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        document_id: i64,
        entries: &[riv_core_types::PriceEntry],
    ) -> Result<Outcome, Failure> {
        self.checkpoint_engines(cp);
        let created = self
            .engines
            .oracles
            .set_oracle(
                &tx.header.account,
                document_id,
                entries.to_vec(),
                tx.header.timestamp,
            )
            .map_err(|e: OracleError| (ResultCode::OracleLimit, e.to_string()))?;
        if created {
            let account_addr = tx.header.account.clone();
            self.account_mut(cp, &account_addr).expect("preamble").owner_count += 1;
        }
        Ok(Outcome::default())
    }

    fn apply_oracle_delete(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        document_id: i64,
    ) -> Result<Outcome, Failure> {
        self.checkpoint_engines(cp);
        self.engines
            .oracles
            .delete_oracle(&tx.header.account, document_id)
            .map_err(|e: OracleError| match e {
                OracleError::NotFound(_) => (ResultCode::NoEntry, e.to_string()),
                other => (ResultCode::OracleLimit, other.to_string()),
            })?;
        let account_addr = tx.header.account.clone();
        self.account_mut(cp, &account_addr).expect("preamble").owner_count -= 1;
        Ok(Outcome::default())
    }

    fn apply_did_set(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        uri: &str,
        data: &str,
    ) -> Result<Outcome, Failure> {
        self.checkpoint_engines(cp);
        let created = self
            .engines
            .dids
            .set_did(&tx.header.account, uri, data, tx.header.timestamp)
            .map_err(|e: DidError| (ResultCode::NoPermission, e.to_string()))?;
        if created {
            let account_addr = tx.header.account.clone();
            self.account_mut(cp, &account_addr).expect("preamble").owner_count += 1;
        }
        Ok(Outcome::default())
    }

    fn apply_did_delete(&mut self, tx: &Transaction, cp: &mut Checkpoint) -> Result<Outcome, Failure> {
        self.checkpoint_engines(cp);
        self.engines
            .dids
            .delete_did(&tx.header.account)
            .map_err(|e: DidError| (ResultCode::NoEntry, e.to_string()))?;
        let account_addr = tx.header.account.clone();
        self.account_mut(cp, &account_addr).expect("preamble").owner_count -= 1;
        Ok(Outcome::default())
    }

    // ---- MPT, credentials ----

    #[allow(clippy::too_many_arguments)]
    fn apply_mpt_issuance_create(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        max_supply: i128,
        asset_scale: u8,
        metadata: &str,
        require_auth: bool,
        can_transfer: bool,
        can_clawback: bool,
    ) -> Result<Outcome, Failure> {
        self.checkpoint_engines(cp);
        self.engines.mpt.create_issuance(
            &tx.header.account,
            tx.header.sequence,
            max_supply,
            asset_scale,
            metadata,
            require_auth,
            can_transfer,
            can_clawback,
        );
        let account_addr = tx.header.account.clone();
        self.account_mut(cp, &account_addr).expect("preamble").owner_count += 1;
        Ok(Outcome::default())
    }

    fn apply_mpt_issuance_destroy(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        issuance_id: &str,
    ) -> Result<Outcome, Failure> {
        self.checkpoint_engines(cp);
        self.engines
            .mpt
            .destroy_issuance(issuance_id, &tx.header.account)
            .map_err(mpt_failure)?;
        let account_addr = tx.header.account.clone();
        self.account_mut(cp, &account_addr).expect("preamble").owner_count -= 1;
        Ok(Outcome::default())
    }

    fn apply_credential_create(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        subject: &str,
        credential_type: &str,
        uri: &str,
        expiration: i64,
    ) -> Result<Outcome, Failure> {
        self.checkpoint_engines(cp);
        self.engines
            .credentials
            .create(&tx.header.account, subject, credential_type, uri, expiration)
            .map_err(credential_failure)?;
        let account_addr = tx.header.account.clone();
        self.account_mut(cp, &account_addr).expect("preamble").owner_count += 1;
        Ok(Outcome::default())
    }

    fn apply_credential_delete(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        credential_id: &str,
    ) -> Result<Outcome, Failure> {
        self.checkpoint_engines(cp);
        let issuer = self
            .engines
            .credentials
            .get(credential_id)
            .map(|c| c.issuer.clone());
        self.engines
            .credentials
            .delete(credential_id, &tx.header.account, tx.header.timestamp)
            .map_err(credential_failure)?;
        if let Some(issuer) = issuer {
            if let Some(account) = self.account_mut(cp, &issuer) {
                account.owner_count -= 1;
            }
        }
        Ok(Outcome::default())
    }

    // ---- cross-chain ----

    fn apply_xchain_create_bridge(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        locking_door: &str,
        issuing_door: &str,
        currency: &str,
    ) -> Result<Outcome, Failure> {
        self.checkpoint_engines(cp);
        self.engines
            .xchain
            .create_bridge(locking_door, issuing_door, currency)
            .map_err(xchain_failure)?;
        let account_addr = tx.header.account.clone();
        self.account_mut(cp, &account_addr).expect("preamble").owner_count += 1;
        Ok(Outcome::default())
    }

    fn apply_xchain_commit(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        bridge_id: &str,
        claim_id: i64,
    ) -> Result<Outcome, Failure> {
        let account_addr = tx.header.account.clone();
        let amount = tx.header.amount.value;
        if !tx.header.amount.is_native() || amount <= 0 {
            return fail(ResultCode::NoPermission, "commit amount must be native");
        }
        if self.get_balance(&account_addr) < amount {
            return fail(ResultCode::Unfunded, "cannot fund commit");
        }
        self.checkpoint_engines(cp);
        self.engines
            .xchain
            .commit(
                bridge_id,
                claim_id,
                &account_addr,
                &tx.header.destination,
                amount,
            )
            .map_err(xchain_failure)?;
        self.account_mut(cp, &account_addr).expect("preamble").balance -= amount;
        Ok(Outcome::default())
    }

    fn apply_xchain_claim(
        &mut self,
        _tx: &Transaction,
        cp: &mut Checkpoint,
        bridge_id: &str,
        claim_id: i64,
    ) -> Result<Outcome, Failure> {
        self.checkpoint_engines(cp);
        let (destination, amount) = self
            .engines
            .xchain
            .claim(bridge_id, claim_id)
            .map_err(xchain_failure)?;
        // The issuing side mints the claimed value into supply.
        self.account_mut_or_create(cp, &destination).balance += amount;
        self.total_supply += amount;
        self.total_minted += amount;
        Ok(Outcome::delivered(amount))
    }

    // ---- hooks ----

    fn apply_hook_set(
        &mut self,
        tx: &Transaction,
        cp: &mut Checkpoint,
        position: usize,
        rule: Option<riv_core_types::HookRule>,
    ) -> Result<Outcome, Failure> {
        self.checkpoint_engines(cp);
        let installing = rule.is_some();
        let previous = self
            .engines
            .hooks
            .set_hook(&tx.header.account, position, rule)
            .map_err(|e: HookError| (ResultCode::NoPermission, e.to_string()))?;
        let account_addr = tx.header.account.clone();
        let account = self.account_mut(cp, &account_addr).expect("preamble");
        match (previous.is_some(), installing) {
            (false, true) => account.owner_count += 1,
            (true, false) => account.owner_count -= 1,
            _ => {}
        }
        Ok(Outcome::default())
    }

    // ---- metadata ----

    fn success_metadata(
        &self,
        tx: &Transaction,
        tx_id: &str,
        cp: &Checkpoint,
        outcome: &Outcome,
    ) -> TxMetadata {
        let mut meta = TxMetadata::new(
            tx_id,
            self.tx_metadata.len(),
            tx.body.type_name(),
            ResultCode::Success,
        );
        meta.delivered_amount = outcome.delivered;
        for (address, pre) in &cp.accounts {
            let post = self.accounts.get(address);
            let (action, previous_balance, final_balance) = match (pre, post) {
                (None, Some(account)) => (NodeAction::Created, 0, account.balance),
                (Some(before), None) => (NodeAction::Deleted, before.balance, 0),
                (Some(before), Some(account)) => {
                    if before == account {
                        continue;
                    }
                    (NodeAction::Modified, before.balance, account.balance)
                }
                (None, None) => continue,
            };
            meta.affected_nodes.push(AffectedNode {
                action,
                entry_type: "AccountRoot".to_string(),
                ledger_index: address.clone(),
            });
            if previous_balance != final_balance {
                meta.balance_changes.push(BalanceChange {
                    account: address.clone(),
                    previous_balance,
                    final_balance,
                });
            }
        }
        meta
    }

    fn failure_metadata(
        &self,
        tx: &Transaction,
        tx_id: &str,
        code: ResultCode,
        message: &str,
    ) -> TxMetadata {
        let mut meta = TxMetadata::new(tx_id, self.tx_metadata.len(), tx.body.type_name(), code);
        meta.message = message.to_string();
        meta
    }
}

// ---- engine error mappings ----

fn escrow_failure(e: EscrowError) -> Failure {
    let code = match e {
        EscrowError::NotFound(_) => ResultCode::NoEntry,
        EscrowError::NotReady(_) | EscrowError::Expired | EscrowError::NotCancellable => {
            ResultCode::EscrowNotReady
        }
        EscrowError::BadCondition | EscrowError::BadTimeBounds => ResultCode::EscrowBadCondition,
        EscrowError::AlreadyResolved(_) => ResultCode::NoPermission,
    };
    (code, e.to_string())
}

fn channel_failure(e: ChannelError) -> Failure {
    let code = match e {
        ChannelError::NotFound(_) => ResultCode::NoEntry,
        ChannelError::Closed(_) | ChannelError::Expired(_) => ResultCode::PaychanExpired,
        ChannelError::BadClaim | ChannelError::NotParty | ChannelError::SettleDelay(_) => {
            ResultCode::NoPermission
        }
    };
    (code, e.to_string())
}

fn check_failure(e: CheckError) -> Failure {
    let code = match e {
        CheckError::NotFound(_) => ResultCode::NoEntry,
        CheckError::AlreadyResolved(_) | CheckError::Expired(_) => ResultCode::CheckExpired,
        CheckError::ExceedsSendMax | CheckError::BelowDeliverMin | CheckError::NotPermitted => {
            ResultCode::NoPermission
        }
    };
    (code, e.to_string())
}

fn nft_failure(e: NftError) -> Failure {
    let code = match e {
        NftError::TokenNotFound(_) | NftError::OfferNotFound(_) => ResultCode::NoEntry,
        NftError::AlreadyBurned(_) | NftError::OfferResolved(_) => ResultCode::NftokenExists,
        NftError::OfferExpired(_) | NftError::NotPermitted => ResultCode::NoPermission,
    };
    (code, e.to_string())
}

fn amm_failure(e: AmmError) -> Failure {
    (ResultCode::AmmBalance, e.to_string())
}

fn mpt_failure(e: MptError) -> Failure {
    let code = match e {
        MptError::NotFound(_) => ResultCode::NoEntry,
        MptError::MaxSupply => ResultCode::MptMaxSupply,
        MptError::ClawbackDisabled => ResultCode::ClawbackDisabled,
        MptError::InsufficientUnits => ResultCode::Unfunded,
        MptError::NotIssuer
        | MptError::Outstanding
        | MptError::NotAuthorized
        | MptError::TransferDisabled => ResultCode::NoPermission,
    };
    (code, e.to_string())
}

fn credential_failure(e: CredentialError) -> Failure {
    let code = match e {
        CredentialError::AlreadyExists => ResultCode::CredentialExists,
        CredentialError::NotFound(_) => ResultCode::NoEntry,
        CredentialError::InvalidFields | CredentialError::NotPermitted => ResultCode::NoPermission,
    };
    (code, e.to_string())
}

fn xchain_failure(e: XChainError) -> Failure {
    let code = match e {
        XChainError::BridgeNotFound(_) | XChainError::ClaimNotFound(_) => ResultCode::NoEntry,
        XChainError::NoQuorum | XChainError::NotCommitted(_) => ResultCode::XchainNoQuorum,
        XChainError::BridgeExists | XChainError::AlreadyClaimed(_) => ResultCode::NoPermission,
    };
    (code, e.to_string())
}
