// Copyright (c) 2025 The Rivulet Project

//! Transaction result taxonomy.
//!
//! `0` is success; `101..=140` are deterministic failures. Every code
//! has a `tec*` display name that surfaces in transaction metadata.

use serde::{Deserialize, Serialize};

/// Result of applying a transaction to the ledger.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(i32)]
pub enum ResultCode {
    /// The transaction applied and mutated state.
    Success = 0,
    /// Source account missing or cannot fund the operation.
    Unfunded = 101,
    /// No trust line and no ripple path could deliver.
    NoLine = 102,
    /// Fee cannot be paid.
    InsufFee = 103,
    /// Sequence does not match the account's next expected.
    BadSeq = 104,
    /// Signature, ring signature or range proof failed.
    BadSig = 105,
    /// The key image was already spent.
    KeyImageSpent = 106,
    /// Stake missing, foreign, or otherwise unusable.
    StakeLocked = 107,
    /// The tx id was already applied.
    Duplicate = 108,
    /// The operation is not permitted for this account.
    NoPermission = 109,
    /// Escrow condition/fulfillment mismatch or bad time bounds.
    EscrowBadCondition = 110,
    /// Escrow cannot be finished or cancelled yet.
    EscrowNotReady = 111,
    /// Payment channel closed or expired.
    PaychanExpired = 112,
    /// Check expired or already resolved.
    CheckExpired = 113,
    /// Trust line has the no-ripple flag set.
    NoRipple = 114,
    /// Trust line is frozen.
    Frozen = 115,
    /// Referenced ledger object does not exist.
    NoEntry = 116,
    /// The required amendment is not enabled.
    AmendmentBlocked = 117,
    /// NFT already exists / already burned.
    NftokenExists = 118,
    /// AMM pool operation failed on balances.
    AmmBalance = 119,
    /// Issuer has not enabled clawback.
    ClawbackDisabled = 120,
    /// A hook on the sending account rejected the transaction.
    HooksRejected = 121,
    /// Cross-chain claim lacks attestation quorum.
    XchainNoQuorum = 122,
    /// MPT mint would exceed max supply.
    MptMaxSupply = 123,
    /// Credential already exists.
    CredentialExists = 124,
    /// Oracle document or entry limit exceeded.
    OracleLimit = 125,
    /// DID already exists.
    DidExists = 126,
    /// A post-apply invariant failed; the transaction was rolled back.
    InvariantFailed = 127,
    /// Only part of the requested amount could be delivered.
    PartialPayment = 128,
    /// The trust line requires issuer authorization.
    RequireAuth = 129,
    /// The destination requires a destination tag.
    DstTagNeeded = 130,
    /// The issuer has a global freeze in effect.
    GlobalFreeze = 131,
    /// The transaction would dip below the owner reserve.
    OwnerReserve = 132,
    /// Sequence is lower than the account's next expected.
    SeqTooLow = 133,
}

impl ResultCode {
    /// Whether the transaction applied.
    pub fn is_success(self) -> bool {
        self == ResultCode::Success
    }

    /// Numeric code.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Display name surfaced in metadata.
    pub fn name(self) -> &'static str {
        match self {
            ResultCode::Success => "tesSUCCESS",
            ResultCode::Unfunded => "tecUNFUNDED",
            ResultCode::NoLine => "tecNO_LINE",
            ResultCode::InsufFee => "tecINSUF_FEE",
            ResultCode::BadSeq => "tecBAD_SEQ",
            ResultCode::BadSig => "tecBAD_SIG",
            ResultCode::KeyImageSpent => "tecKEY_IMAGE_SPENT",
            ResultCode::StakeLocked => "tecSTAKE_LOCKED",
            ResultCode::Duplicate => "tecDUPLICATE",
            ResultCode::NoPermission => "tecNO_PERMISSION",
            ResultCode::EscrowBadCondition => "tecESCROW_BAD_CONDITION",
            ResultCode::EscrowNotReady => "tecESCROW_NOT_READY",
            ResultCode::PaychanExpired => "tecPAYCHAN_EXPIRED",
            ResultCode::CheckExpired => "tecCHECK_EXPIRED",
            ResultCode::NoRipple => "tecNO_RIPPLE",
            ResultCode::Frozen => "tecFROZEN",
            ResultCode::NoEntry => "tecNO_ENTRY",
            ResultCode::AmendmentBlocked => "tecAMENDMENT_BLOCKED",
            ResultCode::NftokenExists => "tecNFTOKEN_EXISTS",
            ResultCode::AmmBalance => "tecAMM_BALANCE",
            ResultCode::ClawbackDisabled => "tecCLAWBACK_DISABLED",
            ResultCode::HooksRejected => "tecHOOKS_REJECTED",
            ResultCode::XchainNoQuorum => "tecXCHAIN_NO_QUORUM",
            ResultCode::MptMaxSupply => "tecMPT_MAX_SUPPLY",
            ResultCode::CredentialExists => "tecCREDENTIAL_EXISTS",
            ResultCode::OracleLimit => "tecORACLE_LIMIT",
            ResultCode::DidExists => "tecDID_EXISTS",
            ResultCode::InvariantFailed => "tecINVARIANT_FAILED",
            ResultCode::PartialPayment => "tecPARTIAL_PAYMENT",
            ResultCode::RequireAuth => "tecREQUIRE_AUTH",
            ResultCode::DstTagNeeded => "tecDST_TAG_NEEDED",
            ResultCode::GlobalFreeze => "tecGLOBAL_FREEZE",
            ResultCode::OwnerReserve => "tecOWNER_RESERVE",
            ResultCode::SeqTooLow => "tecSEQ_TOO_LOW",
        }
    }
}

impl core::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_sit_in_their_bands() {
        assert_eq!(ResultCode::Success.code(), 0);
        assert_eq!(ResultCode::Unfunded.code(), 101);
        assert_eq!(ResultCode::SeqTooLow.code(), 133);
        assert!(ResultCode::Success.is_success());
        assert!(!ResultCode::Duplicate.is_success());
    }

    #[test]
    fn names_follow_the_tec_convention() {
        assert_eq!(ResultCode::Success.name(), "tesSUCCESS");
        assert_eq!(ResultCode::Unfunded.name(), "tecUNFUNDED");
        assert_eq!(ResultCode::GlobalFreeze.name(), "tecGLOBAL_FREEZE");
    }
}
