// Copyright (c) 2025 The Rivulet Project

//! Accounts, trust lines and confidential outputs.

use std::collections::{BTreeMap, BTreeSet};

use riv_core_types::{AccountFlag, SignerEntry, RATE_ONE};
use serde::{Deserialize, Serialize};

/// Account-level flag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccountFlags {
    /// Incoming payments must carry a destination tag.
    pub require_dest: bool,
    /// The master key may no longer sign.
    pub disable_master: bool,
    /// Trust lines default to rippling enabled.
    pub default_ripple: bool,
    /// All IOUs issued by this account are frozen.
    pub global_freeze: bool,
    /// Incoming payments require preauthorization.
    pub deposit_auth: bool,
    /// The issuer may claw back issued IOUs.
    pub allow_clawback: bool,
    /// New trust lines require issuer authorization.
    pub require_auth: bool,
}

impl AccountFlags {
    /// Set or clear a single flag.
    pub fn apply(&mut self, flag: AccountFlag, value: bool) {
        match flag {
            AccountFlag::RequireDest => self.require_dest = value,
            AccountFlag::DisableMaster => self.disable_master = value,
            AccountFlag::DefaultRipple => self.default_ripple = value,
            AccountFlag::GlobalFreeze => self.global_freeze = value,
            AccountFlag::DepositAuth => self.deposit_auth = value,
            AccountFlag::AllowClawback => self.allow_clawback = value,
            AccountFlag::RequireAuth => self.require_auth = value,
        }
    }
}

/// A directed IOU credit relation `(holder, currency, issuer)`.
///
/// `balance` is how much the issuer currently owes the holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustLine {
    /// Current balance in micro-units.
    pub balance: i128,
    /// The holder's limit.
    pub limit: i128,
    /// The issuer-side limit.
    pub peer_limit: i128,
    /// Rippling through this line is disabled.
    pub no_ripple: bool,
    /// The line is frozen.
    pub frozen: bool,
    /// The issuer authorized this line.
    pub authorized: bool,
    /// Inbound quality in ppm; 0 means 1.0.
    pub quality_in: u32,
    /// Outbound quality in ppm; 0 means 1.0.
    pub quality_out: u32,
}

impl TrustLine {
    /// A fresh line with a limit and nothing else.
    pub fn with_limit(limit: i128) -> Self {
        Self {
            balance: 0,
            limit,
            peer_limit: 0,
            no_ripple: false,
            frozen: false,
            authorized: false,
            quality_in: 0,
            quality_out: 0,
        }
    }

    /// Effective inbound quality in ppm.
    pub fn quality_in_ppm(&self) -> u64 {
        if self.quality_in == 0 {
            RATE_ONE as u64
        } else {
            self.quality_in as u64
        }
    }

    /// Effective outbound quality in ppm.
    pub fn quality_out_ppm(&self) -> u64 {
        if self.quality_out == 0 {
            RATE_ONE as u64
        } else {
            self.quality_out as u64
        }
    }

    /// How much more the holder can receive before hitting the limit.
    pub fn available_credit(&self) -> i128 {
        (self.limit - self.balance).max(0)
    }
}

/// Key of a trust line under its holder: `(currency, issuer)`.
pub type TrustLineKey = (String, String);

/// A weighted multi-signature list installed on an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerList {
    /// Required total weight.
    pub quorum: u32,
    /// Weighted signers.
    pub entries: Vec<SignerEntry>,
}

impl SignerList {
    /// Sum of all signer weights.
    pub fn total_weight(&self) -> u32 {
        self.entries.iter().map(|e| e.weight).sum()
    }

    /// Whether the given signing accounts meet the quorum.
    pub fn meets_quorum(&self, signers: &BTreeSet<String>) -> bool {
        let weight: u32 = self
            .entries
            .iter()
            .filter(|e| signers.contains(&e.account))
            .map(|e| e.weight)
            .sum();
        weight >= self.quorum
    }
}

/// A ledger account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Address string.
    pub address: String,
    /// Native balance in micro-units.
    pub balance: i128,
    /// Next expected sequence.
    pub sequence: i64,
    /// Objects charged against the reserve.
    pub owner_count: i64,
    /// Trust lines keyed by `(currency, issuer)`.
    pub trust_lines: BTreeMap<TrustLineKey, TrustLine>,
    /// Open offers as `(sequence, order_id)` pairs.
    pub open_offers: Vec<(i64, String)>,
    /// Transfer rate in ppm; `RATE_ONE` = no fee.
    pub transfer_rate: u32,
    /// Flag set.
    pub flags: AccountFlags,
    /// Regular signing key address; empty = none.
    pub regular_key: String,
    /// Domain string.
    pub domain: String,
    /// Preauthorized depositors.
    pub deposit_preauth: BTreeSet<String>,
    /// Outstanding ticket ids.
    pub tickets: BTreeSet<String>,
    /// Installed signer list.
    pub signer_list: Option<SignerList>,
    /// Key-type tag, e.g. `"ristretto"`.
    pub key_type: String,
}

impl Account {
    /// A fresh account with a zero balance and sequence 1.
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            balance: 0,
            sequence: 1,
            owner_count: 0,
            trust_lines: BTreeMap::new(),
            open_offers: Vec::new(),
            transfer_rate: RATE_ONE,
            flags: AccountFlags::default(),
            regular_key: String::new(),
            domain: String::new(),
            deposit_preauth: BTreeSet::new(),
            tickets: BTreeSet::new(),
            signer_list: None,
            key_type: "ristretto".to_string(),
        }
    }

    /// Transfer rate in ppm, clamped to the valid band.
    pub fn transfer_rate_ppm(&self) -> u64 {
        self.transfer_rate.clamp(RATE_ONE, 2 * RATE_ONE) as u64
    }

    /// Look up a trust line.
    pub fn trust_line(&self, currency: &str, issuer: &str) -> Option<&TrustLine> {
        self.trust_lines
            .get(&(currency.to_string(), issuer.to_string()))
    }

    /// Mutable trust line access.
    pub fn trust_line_mut(&mut self, currency: &str, issuer: &str) -> Option<&mut TrustLine> {
        self.trust_lines
            .get_mut(&(currency.to_string(), issuer.to_string()))
    }
}

/// A confidential UTXO note. The amount exists only inside the
/// commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidentialOutput {
    /// Pedersen commitment to the amount.
    pub commitment: Vec<u8>,
    /// One-time recipient address.
    pub stealth_address: Vec<u8>,
    /// Ephemeral DH public key.
    pub ephemeral_pub: Vec<u8>,
    /// Range proof over the commitment.
    pub range_proof: Vec<u8>,
    /// One-byte scan hint.
    pub view_tag: u8,
    /// Creating transaction id.
    pub tx_id: String,
    /// Marked once a later transaction spends it.
    pub spent: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_account_shape() {
        let account = Account::new("nAlice");
        assert_eq!(account.balance, 0);
        assert_eq!(account.sequence, 1);
        assert_eq!(account.owner_count, 0);
        assert_eq!(account.transfer_rate, RATE_ONE);
    }

    #[test]
    fn trust_line_qualities_default_to_one() {
        let line = TrustLine::with_limit(1_000);
        assert_eq!(line.quality_in_ppm(), RATE_ONE as u64);
        assert_eq!(line.quality_out_ppm(), RATE_ONE as u64);
        assert_eq!(line.available_credit(), 1_000);
    }

    #[test]
    fn signer_list_quorum() {
        let list = SignerList {
            quorum: 3,
            entries: vec![
                SignerEntry { account: "nA".into(), weight: 2 },
                SignerEntry { account: "nB".into(), weight: 1 },
                SignerEntry { account: "nC".into(), weight: 1 },
            ],
        };
        let mut signers = BTreeSet::new();
        signers.insert("nA".to_string());
        assert!(!list.meets_quorum(&signers));
        signers.insert("nB".to_string());
        assert!(list.meets_quorum(&signers));
    }

    #[test]
    fn flags_apply() {
        let mut flags = AccountFlags::default();
        flags.apply(AccountFlag::GlobalFreeze, true);
        assert!(flags.global_freeze);
        flags.apply(AccountFlag::GlobalFreeze, false);
        assert!(!flags.global_freeze);
    }
}
