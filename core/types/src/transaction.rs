// Copyright (c) 2025 The Rivulet Project

//! Transactions.
//!
//! A transaction is a fixed header (accounts, amount, fee, sequence,
//! timestamp, memo) plus a body variant carrying the fields specific to
//! its type. The signing preimage is a fixed byte layout over both; the
//! variant-specific fields enter it as canonical sorted-key JSON so the
//! preimage stays deterministic without a per-type wire format.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::amount::Amount;
use riv_crypto_keys::{hash256, PrivateKey, PublicKey, Signature};

/// A deterministic flag/extra-field map (sorted keys).
type FlagMap = Map<String, Value>;

/// Account-level flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountFlag {
    /// Incoming payments must carry a destination tag.
    RequireDest,
    /// The master key may no longer sign.
    DisableMaster,
    /// Trust lines default to rippling enabled.
    DefaultRipple,
    /// All issued IOUs are frozen.
    GlobalFreeze,
    /// Incoming payments require preauthorization.
    DepositAuth,
    /// The issuer may claw back issued IOUs.
    AllowClawback,
    /// New trust lines require issuer authorization.
    RequireAuth,
}

impl AccountFlag {
    /// Stable name used in flag JSON.
    pub fn name(self) -> &'static str {
        match self {
            AccountFlag::RequireDest => "require_dest",
            AccountFlag::DisableMaster => "disable_master",
            AccountFlag::DefaultRipple => "default_ripple",
            AccountFlag::GlobalFreeze => "global_freeze",
            AccountFlag::DepositAuth => "deposit_auth",
            AccountFlag::AllowClawback => "allow_clawback",
            AccountFlag::RequireAuth => "require_auth",
        }
    }
}

/// Staking lock tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StakeTier {
    /// No lock, no penalty, lowest yield.
    Flexible,
    /// 30-day lock.
    Days30,
    /// 90-day lock.
    Days90,
    /// 180-day lock.
    Days180,
    /// 365-day lock.
    Days365,
}

impl StakeTier {
    /// Parse the numeric tier tag.
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(StakeTier::Flexible),
            1 => Some(StakeTier::Days30),
            2 => Some(StakeTier::Days90),
            3 => Some(StakeTier::Days180),
            4 => Some(StakeTier::Days365),
            _ => None,
        }
    }

    /// Numeric tier tag.
    pub fn as_u8(self) -> u8 {
        match self {
            StakeTier::Flexible => 0,
            StakeTier::Days30 => 1,
            StakeTier::Days90 => 2,
            StakeTier::Days180 => 3,
            StakeTier::Days365 => 4,
        }
    }
}

/// A weighted signer in a signer list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerEntry {
    /// Signer account address.
    pub account: String,
    /// Vote weight toward the quorum.
    pub weight: u32,
}

/// A single oracle price entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEntry {
    /// Asset being priced, e.g. `"NXF"`.
    pub base_asset: String,
    /// Quote asset, e.g. `"USD"`.
    pub quote_asset: String,
    /// Price in micro-units of the quote asset.
    pub price: i128,
}

/// A declarative hook rule installed on an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum HookRule {
    /// Reject outgoing payments above a micro-unit limit.
    MaxAmount {
        /// Largest permitted payment in micro-units.
        limit: i128,
    },
    /// Reject outgoing payments to destinations outside the list.
    DestinationAllowList {
        /// Permitted destination addresses.
        allowed: Vec<String>,
    },
    /// Reject listed transaction types outright.
    TypeDenyList {
        /// Denied `tx_type` values.
        denied: Vec<u32>,
    },
}

/// Privacy material attached to a confidential payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidentialProof {
    /// Pedersen commitment to the amount.
    pub commitment: Vec<u8>,
    /// One-time recipient address.
    pub stealth_address: Vec<u8>,
    /// Ephemeral DH public key.
    pub ephemeral_pub: Vec<u8>,
    /// Range proof over the commitment.
    pub range_proof: Vec<u8>,
    /// Key image of the spent input.
    pub key_image: Vec<u8>,
    /// One-byte scan hint.
    pub view_tag: u8,
    /// Linkable ring signature (excluded from its own preimage).
    pub ring_signature: Vec<u8>,
}

/// The fixed transaction header shared by every type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TxHeader {
    /// Source account address.
    pub account: String,
    /// Destination address; empty when the type has none.
    #[serde(default)]
    pub destination: String,
    /// Primary amount; zero native when the type has none.
    #[serde(default)]
    pub amount: Amount,
    /// Fee, always native.
    #[serde(default)]
    pub fee: Amount,
    /// Account sequence; 0 is the wildcard.
    #[serde(default)]
    pub sequence: i64,
    /// Submission timestamp (seconds).
    #[serde(default)]
    pub timestamp: i64,
    /// Destination tag; 0 when absent.
    #[serde(default)]
    pub destination_tag: i64,
    /// Source tag; 0 when absent.
    #[serde(default)]
    pub source_tag: i64,
    /// Free-form memo.
    #[serde(default)]
    pub memo: String,
    /// Ticket consumed instead of a sequence, when set.
    #[serde(default)]
    pub ticket_id: String,
}

/// Type-specific transaction payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxBody {
    /// Value transfer; confidential when privacy material is attached.
    Payment {
        /// Allow delivering less than the requested amount.
        partial: bool,
        /// Lower bound on delivery for partial payments (micro-units).
        deliver_min: i128,
        /// Cap on what the sender is willing to spend (micro-units).
        send_max: i128,
        /// Privacy material for the confidential branch.
        confidential: Option<ConfidentialProof>,
    },
    /// Create or update a trust line.
    TrustSet {
        /// New limit for the line.
        limit_amount: Amount,
        /// Inbound quality in ppm (0 = unchanged).
        quality_in: u32,
        /// Outbound quality in ppm (0 = unchanged).
        quality_out: u32,
        /// Authorize the peer (issuer only).
        set_auth: bool,
        /// Clear authorization.
        clear_auth: bool,
        /// Set the no-ripple flag.
        set_no_ripple: bool,
        /// Clear the no-ripple flag.
        clear_no_ripple: bool,
        /// Freeze the line (issuer only).
        set_freeze: bool,
        /// Unfreeze the line.
        clear_freeze: bool,
    },
    /// Place an offer on the order book.
    OfferCreate {
        /// What the taker pays the offer owner.
        taker_pays: Amount,
        /// What the taker receives.
        taker_gets: Amount,
        /// Fill what matches now, cancel the rest.
        immediate_or_cancel: bool,
        /// Fill entirely or not at all.
        fill_or_kill: bool,
        /// Expiration timestamp; 0 = never.
        expiration: i64,
    },
    /// Withdraw an open offer.
    OfferCancel {
        /// Sequence of the offer to cancel.
        offer_sequence: i64,
    },
    /// Set or clear account flags, domain and transfer rate.
    AccountSet {
        /// Flag to set.
        set_flag: Option<AccountFlag>,
        /// Flag to clear.
        clear_flag: Option<AccountFlag>,
        /// New domain, when present.
        domain: Option<String>,
        /// New transfer rate in ppm (1_000_000..=2_000_000).
        transfer_rate: Option<u32>,
    },
    /// Assign a regular signing key.
    SetRegularKey {
        /// New regular key address; empty clears it.
        regular_key: String,
    },
    /// Install or clear a signer list.
    SignerListSet {
        /// Required quorum weight; 0 removes the list.
        quorum: u32,
        /// Weighted signers.
        entries: Vec<SignerEntry>,
    },
    /// Preauthorize or revoke a depositor.
    DepositPreauth {
        /// Address to authorize; empty for none.
        authorize: String,
        /// Address to revoke; empty for none.
        unauthorize: String,
    },
    /// Reserve future sequence numbers as tickets.
    TicketCreate {
        /// Number of tickets (1..=250).
        count: u32,
    },
    /// Delete the account, sending the residue to the destination.
    AccountDelete,
    /// Lock funds until a time/condition is met.
    EscrowCreate {
        /// SHA-256 hex of the fulfillment; empty = none.
        condition: String,
        /// Earliest finish time; 0 = immediately.
        finish_after: i64,
        /// Time after which only cancel works; 0 = never.
        cancel_after: i64,
    },
    /// Release an escrow to its destination.
    EscrowFinish {
        /// Escrow to finish.
        escrow_id: String,
        /// Preimage of the condition.
        fulfillment: String,
    },
    /// Return an escrow to its creator.
    EscrowCancel {
        /// Escrow to cancel.
        escrow_id: String,
    },
    /// Open a payment channel.
    ChannelCreate {
        /// Seconds the creator must wait after requesting close.
        settle_delay: i64,
        /// Hex public key authorized to sign claims.
        public_key: String,
        /// Absolute expiration; 0 = none.
        cancel_after: i64,
    },
    /// Add funds to a channel.
    ChannelFund {
        /// Channel to fund.
        channel_id: String,
    },
    /// Claim a cumulative balance from a channel.
    ChannelClaim {
        /// Channel to claim from.
        channel_id: String,
        /// New cumulative claimed balance in micro-units.
        balance: i128,
        /// Also request/perform close.
        close: bool,
    },
    /// Create a deferred pull payment.
    CheckCreate {
        /// Expiration; 0 = never.
        expiration: i64,
    },
    /// Cash a check.
    CheckCash {
        /// Check to cash.
        check_id: String,
        /// Exact amount to cash; 0 = the full send_max.
        cash_amount: i128,
        /// Minimum acceptable delivery; 0 = none.
        deliver_min: i128,
    },
    /// Cancel a check.
    CheckCancel {
        /// Check to cancel.
        check_id: String,
    },
    /// Lock funds into the staking pool.
    Stake {
        /// Lock tier.
        tier: StakeTier,
    },
    /// Cancel a stake before maturity.
    Unstake {
        /// Stake (= creating tx id) to cancel.
        stake_id: String,
    },
    /// Claw back issued IOUs from a holder.
    Clawback,
    /// Mint an NFT.
    NfTokenMint {
        /// Issuer-chosen collection tag.
        taxon: i64,
        /// Metadata URI.
        uri: String,
        /// Whether the token can change hands.
        transferable: bool,
        /// Whether the issuer may burn it later.
        burnable: bool,
    },
    /// Burn an NFT.
    NfTokenBurn {
        /// Token to burn.
        nftoken_id: String,
    },
    /// Offer to buy or sell an NFT.
    NfTokenOfferCreate {
        /// Token the offer concerns.
        nftoken_id: String,
        /// True for sell offers.
        is_sell: bool,
        /// Restrict acceptance to this address; empty = anyone.
        offer_destination: String,
        /// Expiration; 0 = never.
        expiration: i64,
    },
    /// Accept an NFT offer.
    NfTokenOfferAccept {
        /// Offer to accept.
        offer_id: String,
    },
    /// Cancel an NFT offer.
    NfTokenOfferCancel {
        /// Offer to cancel.
        offer_id: String,
    },
    /// Create an AMM pool.
    AmmCreate {
        /// First deposited asset.
        asset_a: Amount,
        /// Second deposited asset.
        asset_b: Amount,
        /// Trading fee in basis points (<= 1000).
        trading_fee_bps: u32,
    },
    /// Deposit into an AMM pool.
    AmmDeposit {
        /// Pool to deposit into.
        pool_id: String,
        /// Asset-A micro-units (0 = single-sided on B).
        amount_a: i128,
        /// Asset-B micro-units (0 = single-sided on A).
        amount_b: i128,
    },
    /// Withdraw from an AMM pool.
    AmmWithdraw {
        /// Pool to withdraw from.
        pool_id: String,
        /// LP tokens to redeem.
        lp_tokens: i128,
    },
    /// Vote on a pool's trading fee.
    AmmVote {
        /// Pool voted on.
        pool_id: String,
        /// Proposed fee in basis points.
        trading_fee_bps: u32,
    },
    /// Bid for a pool's auction slot.
    AmmBid {
        /// Pool bid on.
        pool_id: String,
    },
    /// Delete an empty AMM pool.
    AmmDelete {
        /// Pool to delete.
        pool_id: String,
    },
    /// Publish or update an oracle price document.
    OracleSet {
        /// Document id under the owner.
        document_id: i64,
        /// Price entries (<= 10).
        entries: Vec<PriceEntry>,
    },
    /// Delete an oracle document.
    OracleDelete {
        /// Document id to delete.
        document_id: i64,
    },
    /// Set the account's DID document.
    DidSet {
        /// Document URI.
        uri: String,
        /// Hex payload.
        data: String,
    },
    /// Delete the account's DID document.
    DidDelete,
    /// Create a multi-purpose token issuance.
    MptIssuanceCreate {
        /// Maximum mintable supply; 0 = unbounded.
        max_supply: i128,
        /// Decimal places of the token.
        asset_scale: u8,
        /// Issuer metadata.
        metadata: String,
        /// Holders require issuer authorization.
        require_auth: bool,
        /// Holders may transfer between themselves.
        can_transfer: bool,
        /// Issuer may claw back.
        can_clawback: bool,
    },
    /// Destroy an (outstanding-free) issuance.
    MptIssuanceDestroy {
        /// Issuance to destroy.
        issuance_id: String,
    },
    /// Authorize or revoke an MPT holder.
    MptAuthorize {
        /// Issuance concerned.
        issuance_id: String,
        /// Holder address.
        holder: String,
        /// Revoke instead of authorize.
        unauthorize: bool,
    },
    /// Mint MPT units to a holder.
    MptMint {
        /// Issuance minted from.
        issuance_id: String,
        /// Units to mint.
        mpt_amount: i128,
    },
    /// Transfer MPT units.
    MptTransfer {
        /// Issuance transferred.
        issuance_id: String,
        /// Units to move.
        mpt_amount: i128,
    },
    /// Claw back MPT units from a holder.
    MptClawback {
        /// Issuance concerned.
        issuance_id: String,
        /// Holder clawed from.
        holder: String,
        /// Units to claw back.
        mpt_amount: i128,
    },
    /// Issue a credential to a subject.
    CredentialCreate {
        /// Subject account.
        subject: String,
        /// Credential type tag.
        credential_type: String,
        /// Evidence URI.
        uri: String,
        /// Expiration; 0 = never.
        expiration: i64,
    },
    /// Subject accepts a credential.
    CredentialAccept {
        /// Credential accepted.
        credential_id: String,
    },
    /// Delete a credential.
    CredentialDelete {
        /// Credential deleted.
        credential_id: String,
    },
    /// Define a cross-chain bridge.
    XChainCreateBridge {
        /// Door account on the locking chain.
        locking_door: String,
        /// Door account on the issuing chain.
        issuing_door: String,
        /// Bridged currency code.
        currency: String,
    },
    /// Lock value against a claim id.
    XChainCommit {
        /// Bridge committed to.
        bridge_id: String,
        /// Claim id the commit funds.
        claim_id: i64,
    },
    /// Witness attestation for a claim.
    XChainAddAttestation {
        /// Bridge concerned.
        bridge_id: String,
        /// Claim attested.
        claim_id: i64,
        /// Witness identity.
        witness: String,
    },
    /// Claim attested value on the issuing side.
    XChainClaim {
        /// Bridge claimed against.
        bridge_id: String,
        /// Claim id redeemed.
        claim_id: i64,
    },
    /// Install or clear a hook rule.
    HookSet {
        /// Slot position (0..4).
        position: u8,
        /// Rule to install; `None` clears the slot.
        rule: Option<HookRule>,
    },
    /// Validator vote on an amendment.
    AmendmentVote {
        /// Amendment name.
        amendment: String,
        /// Support or veto.
        support: bool,
    },
    /// A type this implementation does not know. Applies as a no-op.
    Unknown {
        /// The raw type tag from the wire.
        raw_type: u32,
    },
}

impl TxBody {
    /// The numeric transaction type used in the canonical order and the
    /// signing preimage.
    pub fn tx_type(&self) -> u32 {
        match self {
            TxBody::Payment { .. } => 0,
            TxBody::TrustSet { .. } => 1,
            TxBody::OfferCreate { .. } => 2,
            TxBody::OfferCancel { .. } => 3,
            TxBody::AccountSet { .. } => 4,
            TxBody::SetRegularKey { .. } => 5,
            TxBody::SignerListSet { .. } => 6,
            TxBody::DepositPreauth { .. } => 7,
            TxBody::TicketCreate { .. } => 8,
            TxBody::AccountDelete => 9,
            TxBody::EscrowCreate { .. } => 10,
            TxBody::EscrowFinish { .. } => 11,
            TxBody::EscrowCancel { .. } => 12,
            TxBody::ChannelCreate { .. } => 13,
            TxBody::ChannelFund { .. } => 14,
            TxBody::ChannelClaim { .. } => 15,
            TxBody::CheckCreate { .. } => 16,
            TxBody::CheckCash { .. } => 17,
            TxBody::CheckCancel { .. } => 18,
            TxBody::Stake { .. } => 19,
            TxBody::Unstake { .. } => 20,
            TxBody::Clawback => 21,
            TxBody::NfTokenMint { .. } => 22,
            TxBody::NfTokenBurn { .. } => 23,
            TxBody::NfTokenOfferCreate { .. } => 24,
            TxBody::NfTokenOfferAccept { .. } => 25,
            TxBody::NfTokenOfferCancel { .. } => 26,
            TxBody::AmmCreate { .. } => 27,
            TxBody::AmmDeposit { .. } => 28,
            TxBody::AmmWithdraw { .. } => 29,
            TxBody::AmmVote { .. } => 30,
            TxBody::AmmBid { .. } => 31,
            TxBody::AmmDelete { .. } => 32,
            TxBody::OracleSet { .. } => 33,
            TxBody::OracleDelete { .. } => 34,
            TxBody::DidSet { .. } => 35,
            TxBody::DidDelete => 36,
            TxBody::MptIssuanceCreate { .. } => 37,
            TxBody::MptIssuanceDestroy { .. } => 38,
            TxBody::MptAuthorize { .. } => 39,
            TxBody::MptMint { .. } => 40,
            TxBody::MptTransfer { .. } => 41,
            TxBody::MptClawback { .. } => 42,
            TxBody::CredentialCreate { .. } => 43,
            TxBody::CredentialAccept { .. } => 44,
            TxBody::CredentialDelete { .. } => 45,
            TxBody::XChainCreateBridge { .. } => 46,
            TxBody::XChainCommit { .. } => 47,
            TxBody::XChainAddAttestation { .. } => 48,
            TxBody::XChainClaim { .. } => 49,
            TxBody::HookSet { .. } => 50,
            TxBody::AmendmentVote { .. } => 51,
            TxBody::Unknown { raw_type } => *raw_type,
        }
    }

    /// Human-readable type name for logs and metadata.
    pub fn type_name(&self) -> &'static str {
        match self {
            TxBody::Payment { .. } => "Payment",
            TxBody::TrustSet { .. } => "TrustSet",
            TxBody::OfferCreate { .. } => "OfferCreate",
            TxBody::OfferCancel { .. } => "OfferCancel",
            TxBody::AccountSet { .. } => "AccountSet",
            TxBody::SetRegularKey { .. } => "SetRegularKey",
            TxBody::SignerListSet { .. } => "SignerListSet",
            TxBody::DepositPreauth { .. } => "DepositPreauth",
            TxBody::TicketCreate { .. } => "TicketCreate",
            TxBody::AccountDelete => "AccountDelete",
            TxBody::EscrowCreate { .. } => "EscrowCreate",
            TxBody::EscrowFinish { .. } => "EscrowFinish",
            TxBody::EscrowCancel { .. } => "EscrowCancel",
            TxBody::ChannelCreate { .. } => "PaymentChannelCreate",
            TxBody::ChannelFund { .. } => "PaymentChannelFund",
            TxBody::ChannelClaim { .. } => "PaymentChannelClaim",
            TxBody::CheckCreate { .. } => "CheckCreate",
            TxBody::CheckCash { .. } => "CheckCash",
            TxBody::CheckCancel { .. } => "CheckCancel",
            TxBody::Stake { .. } => "Stake",
            TxBody::Unstake { .. } => "Unstake",
            TxBody::Clawback => "Clawback",
            TxBody::NfTokenMint { .. } => "NFTokenMint",
            TxBody::NfTokenBurn { .. } => "NFTokenBurn",
            TxBody::NfTokenOfferCreate { .. } => "NFTokenCreateOffer",
            TxBody::NfTokenOfferAccept { .. } => "NFTokenAcceptOffer",
            TxBody::NfTokenOfferCancel { .. } => "NFTokenCancelOffer",
            TxBody::AmmCreate { .. } => "AMMCreate",
            TxBody::AmmDeposit { .. } => "AMMDeposit",
            TxBody::AmmWithdraw { .. } => "AMMWithdraw",
            TxBody::AmmVote { .. } => "AMMVote",
            TxBody::AmmBid { .. } => "AMMBid",
            TxBody::AmmDelete { .. } => "AMMDelete",
            TxBody::OracleSet { .. } => "OracleSet",
            TxBody::OracleDelete { .. } => "OracleDelete",
            TxBody::DidSet { .. } => "DIDSet",
            TxBody::DidDelete => "DIDDelete",
            TxBody::MptIssuanceCreate { .. } => "MPTokenIssuanceCreate",
            TxBody::MptIssuanceDestroy { .. } => "MPTokenIssuanceDestroy",
            TxBody::MptAuthorize { .. } => "MPTokenAuthorize",
            TxBody::MptMint { .. } => "MPTokenMint",
            TxBody::MptTransfer { .. } => "MPTokenTransfer",
            TxBody::MptClawback { .. } => "MPTokenClawback",
            TxBody::CredentialCreate { .. } => "CredentialCreate",
            TxBody::CredentialAccept { .. } => "CredentialAccept",
            TxBody::CredentialDelete { .. } => "CredentialDelete",
            TxBody::XChainCreateBridge { .. } => "XChainCreateBridge",
            TxBody::XChainCommit { .. } => "XChainCommit",
            TxBody::XChainAddAttestation { .. } => "XChainAddAttestation",
            TxBody::XChainClaim { .. } => "XChainClaim",
            TxBody::HookSet { .. } => "HookSet",
            TxBody::AmendmentVote { .. } => "AmendmentVote",
            TxBody::Unknown { .. } => "Unknown",
        }
    }
}

/// A complete transaction: header, typed body, optional signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Fixed fields common to every type.
    pub header: TxHeader,
    /// Type-specific payload.
    pub body: TxBody,
    /// Hex Schnorr signature over the signing digest.
    #[serde(default)]
    pub signature: String,
    /// Hex public key the signature verifies against.
    #[serde(default)]
    pub signing_pubkey: String,
}

impl Transaction {
    /// Build an unsigned transaction.
    pub fn new(header: TxHeader, body: TxBody) -> Self {
        Self {
            header,
            body,
            signature: String::new(),
            signing_pubkey: String::new(),
        }
    }

    /// Convenience constructor for a transparent payment.
    pub fn payment(
        account: &str,
        destination: &str,
        amount: Amount,
        fee: Amount,
        sequence: i64,
        timestamp: i64,
    ) -> Self {
        Self::new(
            TxHeader {
                account: account.to_string(),
                destination: destination.to_string(),
                amount,
                fee,
                sequence,
                timestamp,
                ..TxHeader::default()
            },
            TxBody::Payment {
                partial: false,
                deliver_min: 0,
                send_max: 0,
                confidential: None,
            },
        )
    }

    /// Convenience constructor for a trust-line update.
    pub fn trust_set(
        account: &str,
        limit_amount: Amount,
        fee: Amount,
        sequence: i64,
        timestamp: i64,
    ) -> Self {
        Self::new(
            TxHeader {
                account: account.to_string(),
                fee,
                sequence,
                timestamp,
                ..TxHeader::default()
            },
            TxBody::TrustSet {
                limit_amount,
                quality_in: 0,
                quality_out: 0,
                set_auth: false,
                clear_auth: false,
                set_no_ripple: false,
                clear_no_ripple: false,
                set_freeze: false,
                clear_freeze: false,
            },
        )
    }

    /// The numeric transaction type.
    pub fn tx_type(&self) -> u32 {
        self.body.tx_type()
    }

    /// Whether this is a confidential payment.
    pub fn is_confidential(&self) -> bool {
        matches!(
            &self.body,
            TxBody::Payment {
                confidential: Some(_),
                ..
            }
        )
    }

    /// The confidential material, when present.
    pub fn confidential(&self) -> Option<&ConfidentialProof> {
        match &self.body {
            TxBody::Payment { confidential, .. } => confidential.as_ref(),
            _ => None,
        }
    }

    /// The signing preimage.
    ///
    /// Layout, in order: `u32-be tx_type`, account, destination, amount,
    /// fee, `i64-be` sequence and timestamp, the optional amounts
    /// (limit_amount, taker_pays, taker_gets) when present, the optional
    /// non-zero `i64`s (offer_sequence, destination_tag, source_tag),
    /// the memo, the privacy fields (commitment, stealth address, range
    /// proof, key image — the ring signature is excluded from its own
    /// preimage), and finally the canonical sorted-key JSON of the
    /// type-specific flags when non-empty.
    pub fn signing_preimage(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);
        out.extend_from_slice(&self.tx_type().to_be_bytes());
        out.extend_from_slice(self.header.account.as_bytes());
        out.extend_from_slice(self.header.destination.as_bytes());
        self.header.amount.encode_wire(&mut out);
        self.header.fee.encode_wire(&mut out);
        out.extend_from_slice(&self.header.sequence.to_be_bytes());
        out.extend_from_slice(&self.header.timestamp.to_be_bytes());

        if let TxBody::TrustSet { limit_amount, .. } = &self.body {
            limit_amount.encode_wire(&mut out);
        }
        if let TxBody::OfferCreate {
            taker_pays,
            taker_gets,
            ..
        } = &self.body
        {
            taker_pays.encode_wire(&mut out);
            taker_gets.encode_wire(&mut out);
        }

        if let TxBody::OfferCancel { offer_sequence } = &self.body {
            if *offer_sequence != 0 {
                out.extend_from_slice(&offer_sequence.to_be_bytes());
            }
        }
        if self.header.destination_tag != 0 {
            out.extend_from_slice(&self.header.destination_tag.to_be_bytes());
        }
        if self.header.source_tag != 0 {
            out.extend_from_slice(&self.header.source_tag.to_be_bytes());
        }

        out.extend_from_slice(self.header.memo.as_bytes());

        if let Some(privacy) = self.confidential() {
            out.extend_from_slice(&privacy.commitment);
            out.extend_from_slice(&privacy.stealth_address);
            out.extend_from_slice(&privacy.range_proof);
            out.extend_from_slice(&privacy.key_image);
        }

        let flags = self.flag_map();
        if !flags.is_empty() {
            let json = serde_json::to_string(&Value::Object(flags))
                .expect("flag maps contain only plain JSON values");
            out.extend_from_slice(json.as_bytes());
        }
        out
    }

    /// The signing digest: `hash256` of the preimage.
    pub fn signing_digest(&self) -> [u8; 32] {
        hash256(&self.signing_preimage())
    }

    /// The transaction id.
    ///
    /// `hash256(preimage)` hex; confidential payments append the ring
    /// signature so the id also commits to the spend proof.
    pub fn tx_id(&self) -> String {
        let mut preimage = self.signing_preimage();
        if let Some(privacy) = self.confidential() {
            preimage.extend_from_slice(&privacy.ring_signature);
        }
        hex::encode(hash256(&preimage))
    }

    /// Sign with a private key, recording the public key.
    pub fn sign_with(&mut self, key: &PrivateKey) {
        let digest = self.signing_digest();
        self.signature = key.sign(&digest).to_hex();
        self.signing_pubkey = key.public_key().to_hex();
    }

    /// Verify the attached signature. Unsigned transactions fail.
    pub fn verify_signature(&self) -> bool {
        let pubkey = match PublicKey::from_hex(&self.signing_pubkey) {
            Ok(k) => k,
            Err(_) => return false,
        };
        let sig = match Signature::from_hex(&self.signature) {
            Ok(s) => s,
            Err(_) => return false,
        };
        pubkey.verify(&self.signing_digest(), &sig)
    }

    /// The canonical ordering key: `(tx_type, account, sequence, tx_id)`.
    pub fn canonical_key(&self) -> (u32, String, i64, String) {
        (
            self.tx_type(),
            self.header.account.clone(),
            self.header.sequence,
            self.tx_id(),
        )
    }

    /// Type-specific fields as a sorted-key JSON map.
    ///
    /// `serde_json`'s map is BTree-backed, so serialization of this map
    /// is the canonical sorted-key JSON the preimage requires. Large
    /// integers are emitted as decimal strings.
    pub fn flag_map(&self) -> FlagMap {
        let mut m = FlagMap::new();
        let big = |v: i128| Value::String(v.to_string());
        match &self.body {
            TxBody::Payment {
                partial,
                deliver_min,
                send_max,
                ..
            } => {
                if *partial {
                    m.insert("tfPartialPayment".into(), Value::Bool(true));
                }
                if *deliver_min != 0 {
                    m.insert("deliver_min".into(), big(*deliver_min));
                }
                if *send_max != 0 {
                    m.insert("send_max".into(), big(*send_max));
                }
            }
            TxBody::TrustSet {
                quality_in,
                quality_out,
                set_auth,
                clear_auth,
                set_no_ripple,
                clear_no_ripple,
                set_freeze,
                clear_freeze,
                ..
            } => {
                if *quality_in != 0 {
                    m.insert("quality_in".into(), Value::from(*quality_in));
                }
                if *quality_out != 0 {
                    m.insert("quality_out".into(), Value::from(*quality_out));
                }
                for (name, on) in [
                    ("tfSetfAuth", set_auth),
                    ("tfClearfAuth", clear_auth),
                    ("tfSetNoRipple", set_no_ripple),
                    ("tfClearNoRipple", clear_no_ripple),
                    ("tfSetFreeze", set_freeze),
                    ("tfClearFreeze", clear_freeze),
                ] {
                    if *on {
                        m.insert(name.into(), Value::Bool(true));
                    }
                }
            }
            TxBody::OfferCreate {
                immediate_or_cancel,
                fill_or_kill,
                expiration,
                ..
            } => {
                if *immediate_or_cancel {
                    m.insert("tfImmediateOrCancel".into(), Value::Bool(true));
                }
                if *fill_or_kill {
                    m.insert("tfFillOrKill".into(), Value::Bool(true));
                }
                if *expiration != 0 {
                    m.insert("expiration".into(), Value::from(*expiration));
                }
            }
            TxBody::OfferCancel { .. } => {}
            TxBody::AccountSet {
                set_flag,
                clear_flag,
                domain,
                transfer_rate,
            } => {
                if let Some(flag) = set_flag {
                    m.insert("set_flag".into(), Value::String(flag.name().into()));
                }
                if let Some(flag) = clear_flag {
                    m.insert("clear_flag".into(), Value::String(flag.name().into()));
                }
                if let Some(domain) = domain {
                    m.insert("domain".into(), Value::String(domain.clone()));
                }
                if let Some(rate) = transfer_rate {
                    m.insert("transfer_rate".into(), Value::from(*rate));
                }
            }
            TxBody::SetRegularKey { regular_key } => {
                m.insert("regular_key".into(), Value::String(regular_key.clone()));
            }
            TxBody::SignerListSet { quorum, entries } => {
                m.insert("signer_quorum".into(), Value::from(*quorum));
                let list: Vec<Value> = entries
                    .iter()
                    .map(|e| {
                        let mut entry = FlagMap::new();
                        entry.insert("account".into(), Value::String(e.account.clone()));
                        entry.insert("weight".into(), Value::from(e.weight));
                        Value::Object(entry)
                    })
                    .collect();
                m.insert("signer_entries".into(), Value::Array(list));
            }
            TxBody::DepositPreauth {
                authorize,
                unauthorize,
            } => {
                if !authorize.is_empty() {
                    m.insert("authorize".into(), Value::String(authorize.clone()));
                }
                if !unauthorize.is_empty() {
                    m.insert("unauthorize".into(), Value::String(unauthorize.clone()));
                }
            }
            TxBody::TicketCreate { count } => {
                m.insert("ticket_count".into(), Value::from(*count));
            }
            TxBody::AccountDelete => {}
            TxBody::EscrowCreate {
                condition,
                finish_after,
                cancel_after,
            } => {
                if !condition.is_empty() {
                    m.insert("condition".into(), Value::String(condition.clone()));
                }
                if *finish_after != 0 {
                    m.insert("finish_after".into(), Value::from(*finish_after));
                }
                if *cancel_after != 0 {
                    m.insert("cancel_after".into(), Value::from(*cancel_after));
                }
            }
            TxBody::EscrowFinish {
                escrow_id,
                fulfillment,
            } => {
                m.insert("escrow_id".into(), Value::String(escrow_id.clone()));
                if !fulfillment.is_empty() {
                    m.insert("fulfillment".into(), Value::String(fulfillment.clone()));
                }
            }
            TxBody::EscrowCancel { escrow_id } => {
                m.insert("escrow_id".into(), Value::String(escrow_id.clone()));
            }
            TxBody::ChannelCreate {
                settle_delay,
                public_key,
                cancel_after,
            } => {
                m.insert("settle_delay".into(), Value::from(*settle_delay));
                if !public_key.is_empty() {
                    m.insert("public_key".into(), Value::String(public_key.clone()));
                }
                if *cancel_after != 0 {
                    m.insert("cancel_after".into(), Value::from(*cancel_after));
                }
            }
            TxBody::ChannelFund { channel_id } => {
                m.insert("channel_id".into(), Value::String(channel_id.clone()));
            }
            TxBody::ChannelClaim {
                channel_id,
                balance,
                close,
            } => {
                m.insert("channel_id".into(), Value::String(channel_id.clone()));
                m.insert("claim_balance".into(), big(*balance));
                if *close {
                    m.insert("tfClose".into(), Value::Bool(true));
                }
            }
            TxBody::CheckCreate { expiration } => {
                if *expiration != 0 {
                    m.insert("expiration".into(), Value::from(*expiration));
                }
            }
            TxBody::CheckCash {
                check_id,
                cash_amount,
                deliver_min,
            } => {
                m.insert("check_id".into(), Value::String(check_id.clone()));
                if *cash_amount != 0 {
                    m.insert("cash_amount".into(), big(*cash_amount));
                }
                if *deliver_min != 0 {
                    m.insert("deliver_min".into(), big(*deliver_min));
                }
            }
            TxBody::CheckCancel { check_id } => {
                m.insert("check_id".into(), Value::String(check_id.clone()));
            }
            TxBody::Stake { tier } => {
                m.insert("stake_tier".into(), Value::from(tier.as_u8()));
            }
            TxBody::Unstake { stake_id } => {
                m.insert("stake_id".into(), Value::String(stake_id.clone()));
            }
            TxBody::Clawback => {}
            TxBody::NfTokenMint {
                taxon,
                uri,
                transferable,
                burnable,
            } => {
                m.insert("taxon".into(), Value::from(*taxon));
                if !uri.is_empty() {
                    m.insert("uri".into(), Value::String(uri.clone()));
                }
                m.insert("transferable".into(), Value::Bool(*transferable));
                m.insert("burnable".into(), Value::Bool(*burnable));
            }
            TxBody::NfTokenBurn { nftoken_id } => {
                m.insert("nftoken_id".into(), Value::String(nftoken_id.clone()));
            }
            TxBody::NfTokenOfferCreate {
                nftoken_id,
                is_sell,
                offer_destination,
                expiration,
            } => {
                m.insert("nftoken_id".into(), Value::String(nftoken_id.clone()));
                m.insert("is_sell".into(), Value::Bool(*is_sell));
                if !offer_destination.is_empty() {
                    m.insert(
                        "offer_destination".into(),
                        Value::String(offer_destination.clone()),
                    );
                }
                if *expiration != 0 {
                    m.insert("expiration".into(), Value::from(*expiration));
                }
            }
            TxBody::NfTokenOfferAccept { offer_id } | TxBody::NfTokenOfferCancel { offer_id } => {
                m.insert("offer_id".into(), Value::String(offer_id.clone()));
            }
            TxBody::AmmCreate {
                asset_a,
                asset_b,
                trading_fee_bps,
            } => {
                m.insert("asset_a_currency".into(), Value::String(asset_a.currency.clone()));
                m.insert("asset_a_issuer".into(), Value::String(asset_a.issuer.clone()));
                m.insert("asset_a_value".into(), big(asset_a.value));
                m.insert("asset_b_currency".into(), Value::String(asset_b.currency.clone()));
                m.insert("asset_b_issuer".into(), Value::String(asset_b.issuer.clone()));
                m.insert("asset_b_value".into(), big(asset_b.value));
                m.insert("trading_fee".into(), Value::from(*trading_fee_bps));
            }
            TxBody::AmmDeposit {
                pool_id,
                amount_a,
                amount_b,
            } => {
                m.insert("pool_id".into(), Value::String(pool_id.clone()));
                if *amount_a != 0 {
                    m.insert("amount_a".into(), big(*amount_a));
                }
                if *amount_b != 0 {
                    m.insert("amount_b".into(), big(*amount_b));
                }
            }
            TxBody::AmmWithdraw { pool_id, lp_tokens } => {
                m.insert("pool_id".into(), Value::String(pool_id.clone()));
                m.insert("lp_tokens".into(), big(*lp_tokens));
            }
            TxBody::AmmVote {
                pool_id,
                trading_fee_bps,
            } => {
                m.insert("pool_id".into(), Value::String(pool_id.clone()));
                m.insert("trading_fee".into(), Value::from(*trading_fee_bps));
            }
            TxBody::AmmBid { pool_id } | TxBody::AmmDelete { pool_id } => {
                m.insert("pool_id".into(), Value::String(pool_id.clone()));
            }
            TxBody::OracleSet {
                document_id,
                entries,
            } => {
                m.insert("document_id".into(), Value::from(*document_id));
                let list: Vec<Value> = entries
                    .iter()
                    .map(|e| {
                        let mut entry = FlagMap::new();
                        entry.insert("base_asset".into(), Value::String(e.base_asset.clone()));
                        entry.insert("quote_asset".into(), Value::String(e.quote_asset.clone()));
                        entry.insert("price".into(), big(e.price));
                        Value::Object(entry)
                    })
                    .collect();
                m.insert("price_data".into(), Value::Array(list));
            }
            TxBody::OracleDelete { document_id } => {
                m.insert("document_id".into(), Value::from(*document_id));
            }
            TxBody::DidSet { uri, data } => {
                if !uri.is_empty() {
                    m.insert("uri".into(), Value::String(uri.clone()));
                }
                if !data.is_empty() {
                    m.insert("data".into(), Value::String(data.clone()));
                }
            }
            TxBody::DidDelete => {}
            TxBody::MptIssuanceCreate {
                max_supply,
                asset_scale,
                metadata,
                require_auth,
                can_transfer,
                can_clawback,
            } => {
                if *max_supply != 0 {
                    m.insert("max_supply".into(), big(*max_supply));
                }
                m.insert("asset_scale".into(), Value::from(*asset_scale));
                if !metadata.is_empty() {
                    m.insert("metadata".into(), Value::String(metadata.clone()));
                }
                m.insert("require_auth".into(), Value::Bool(*require_auth));
                m.insert("can_transfer".into(), Value::Bool(*can_transfer));
                m.insert("can_clawback".into(), Value::Bool(*can_clawback));
            }
            TxBody::MptIssuanceDestroy { issuance_id } => {
                m.insert("issuance_id".into(), Value::String(issuance_id.clone()));
            }
            TxBody::MptAuthorize {
                issuance_id,
                holder,
                unauthorize,
            } => {
                m.insert("issuance_id".into(), Value::String(issuance_id.clone()));
                m.insert("holder".into(), Value::String(holder.clone()));
                if *unauthorize {
                    m.insert("unauthorize".into(), Value::Bool(true));
                }
            }
            TxBody::MptMint {
                issuance_id,
                mpt_amount,
            }
            | TxBody::MptTransfer {
                issuance_id,
                mpt_amount,
            } => {
                m.insert("issuance_id".into(), Value::String(issuance_id.clone()));
                m.insert("mpt_amount".into(), big(*mpt_amount));
            }
            TxBody::MptClawback {
                issuance_id,
                holder,
                mpt_amount,
            } => {
                m.insert("issuance_id".into(), Value::String(issuance_id.clone()));
                m.insert("holder".into(), Value::String(holder.clone()));
                m.insert("mpt_amount".into(), big(*mpt_amount));
            }
            TxBody::CredentialCreate {
                subject,
                credential_type,
                uri,
                expiration,
            } => {
                m.insert("subject".into(), Value::String(subject.clone()));
                m.insert(
                    "credential_type".into(),
                    Value::String(credential_type.clone()),
                );
                if !uri.is_empty() {
                    m.insert("uri".into(), Value::String(uri.clone()));
                }
                if *expiration != 0 {
                    m.insert("expiration".into(), Value::from(*expiration));
                }
            }
            TxBody::CredentialAccept { credential_id }
            | TxBody::CredentialDelete { credential_id } => {
                m.insert("credential_id".into(), Value::String(credential_id.clone()));
            }
            TxBody::XChainCreateBridge {
                locking_door,
                issuing_door,
                currency,
            } => {
                m.insert("locking_door".into(), Value::String(locking_door.clone()));
                m.insert("issuing_door".into(), Value::String(issuing_door.clone()));
                m.insert("currency".into(), Value::String(currency.clone()));
            }
            TxBody::XChainCommit {
                bridge_id,
                claim_id,
            }
            | TxBody::XChainClaim {
                bridge_id,
                claim_id,
            } => {
                m.insert("bridge_id".into(), Value::String(bridge_id.clone()));
                m.insert("claim_id".into(), Value::from(*claim_id));
            }
            TxBody::XChainAddAttestation {
                bridge_id,
                claim_id,
                witness,
            } => {
                m.insert("bridge_id".into(), Value::String(bridge_id.clone()));
                m.insert("claim_id".into(), Value::from(*claim_id));
                m.insert("witness".into(), Value::String(witness.clone()));
            }
            TxBody::HookSet { position, rule } => {
                m.insert("position".into(), Value::from(*position));
                if let Some(rule) = rule {
                    m.insert(
                        "rule".into(),
                        serde_json::to_value(rule).expect("hook rules are plain data"),
                    );
                }
            }
            TxBody::AmendmentVote { amendment, support } => {
                m.insert("amendment".into(), Value::String(amendment.clone()));
                m.insert("support".into(), Value::Bool(*support));
            }
            TxBody::Unknown { .. } => {}
        }
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn sample_payment() -> Transaction {
        Transaction::payment(
            "nAlice",
            "nBob",
            Amount::native_units(100),
            Amount::native(10),
            1,
            1_700_000_000,
        )
    }

    #[test]
    fn preimage_is_deterministic() {
        let tx = sample_payment();
        assert_eq!(tx.signing_preimage(), tx.signing_preimage());
        assert_eq!(tx.tx_id(), tx.tx_id());
    }

    #[test]
    fn equal_transactions_have_identical_preimages() {
        assert_eq!(
            sample_payment().signing_preimage(),
            sample_payment().signing_preimage()
        );
    }

    #[test]
    fn preimage_excludes_the_signature() {
        let mut signed = sample_payment();
        let key = riv_crypto_keys::PrivateKey::from_random(&mut OsRng);
        signed.sign_with(&key);
        assert_eq!(signed.signing_preimage(), sample_payment().signing_preimage());
        assert!(signed.verify_signature());
    }

    #[test]
    fn amount_changes_the_id() {
        let a = sample_payment();
        let mut b = sample_payment();
        b.header.amount = Amount::native_units(101);
        assert_ne!(a.tx_id(), b.tx_id());
    }

    #[test]
    fn destination_tag_enters_preimage_only_when_nonzero() {
        let plain = sample_payment();
        let mut tagged = sample_payment();
        tagged.header.destination_tag = 7;
        assert!(tagged.signing_preimage().len() > plain.signing_preimage().len());
    }

    #[test]
    fn flag_json_is_sorted() {
        let tx = Transaction::new(
            TxHeader {
                account: "nAlice".into(),
                ..TxHeader::default()
            },
            TxBody::ChannelClaim {
                channel_id: "chan".into(),
                balance: 5,
                close: true,
            },
        );
        let json = serde_json::to_string(&Value::Object(tx.flag_map())).unwrap();
        let chan = json.find("channel_id").unwrap();
        let claim = json.find("claim_balance").unwrap();
        let close = json.find("tfClose").unwrap();
        assert!(chan < claim && claim < close);
    }

    #[test]
    fn unsigned_transaction_fails_verification() {
        assert!(!sample_payment().verify_signature());
    }

    #[test]
    fn canonical_key_orders_by_type_then_account() {
        let pay = sample_payment();
        let trust = Transaction::trust_set(
            "nAaron",
            Amount::iou(1_000_000, "USD", "nIssuer"),
            Amount::native(10),
            1,
            0,
        );
        assert!(pay.canonical_key() < trust.canonical_key());
    }

    #[test]
    fn confidential_id_commits_to_ring_signature() {
        let confidential = |ring: Vec<u8>| {
            Transaction::new(
                TxHeader {
                    account: "nAlice".into(),
                    fee: Amount::native(10),
                    sequence: 1,
                    ..TxHeader::default()
                },
                TxBody::Payment {
                    partial: false,
                    deliver_min: 0,
                    send_max: 0,
                    confidential: Some(ConfidentialProof {
                        commitment: vec![1; 32],
                        stealth_address: vec![2; 32],
                        ephemeral_pub: vec![3; 32],
                        range_proof: vec![4; 64],
                        key_image: vec![5; 32],
                        view_tag: 9,
                        ring_signature: ring,
                    }),
                },
            )
        };
        let a = confidential(vec![6; 64]);
        let b = confidential(vec![7; 64]);
        // Same preimage (ring signature excluded) but different ids.
        assert_eq!(a.signing_digest(), b.signing_digest());
        assert_ne!(a.tx_id(), b.tx_id());
    }
}
