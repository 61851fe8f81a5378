// Copyright (c) 2025 The Rivulet Project

//! Non-fungible tokens: mint, burn, and the buy/sell offer flow.

use std::collections::BTreeMap;

use riv_crypto_keys::hash256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an NFT operation was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NftError {
    /// No token with that id.
    #[error("token {0} not found")]
    TokenNotFound(String),
    /// The token was already burned.
    #[error("token {0} already burned")]
    AlreadyBurned(String),
    /// No offer with that id.
    #[error("offer {0} not found")]
    OfferNotFound(String),
    /// The offer was already accepted or cancelled.
    #[error("offer {0} already resolved")]
    OfferResolved(String),
    /// The offer expired.
    #[error("offer {0} has expired")]
    OfferExpired(String),
    /// The acting account lacks the right to do this.
    #[error("not permitted")]
    NotPermitted,
}

/// A minted token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NfToken {
    /// Deterministic token id.
    pub nftoken_id: String,
    /// Minting issuer.
    pub issuer: String,
    /// Current owner.
    pub owner: String,
    /// Issuer-chosen collection tag.
    pub taxon: i64,
    /// Metadata URI.
    pub uri: String,
    /// Whether the token can change hands.
    pub transferable: bool,
    /// Whether the issuer may burn it after transfer.
    pub burnable: bool,
    /// Mint serial under the issuer.
    pub serial: u64,
    /// Burned flag.
    pub burned: bool,
}

/// A buy or sell offer for a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NfTokenOffer {
    /// Unique id (= creating tx id).
    pub offer_id: String,
    /// Token concerned.
    pub nftoken_id: String,
    /// Offer creator.
    pub owner: String,
    /// Price in native micro-units.
    pub amount: i128,
    /// True when the token owner is selling.
    pub is_sell: bool,
    /// Restrict acceptance to this account; empty = anyone.
    pub destination: String,
    /// Expiration; 0 = never.
    pub expiration: i64,
    /// Accepted flag.
    pub accepted: bool,
    /// Cancelled flag.
    pub cancelled: bool,
}

/// A settled trade: who pays whom, and the token that moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftTrade {
    /// Account paying the price.
    pub buyer: String,
    /// Account receiving the price.
    pub seller: String,
    /// Price in native micro-units.
    pub amount: i128,
    /// Token changing hands.
    pub nftoken_id: String,
}

/// All tokens and offers on the ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NfTokenManager {
    tokens: BTreeMap<String, NfToken>,
    offers: BTreeMap<String, NfTokenOffer>,
    serials: BTreeMap<String, u64>,
}

impl NfTokenManager {
    /// An empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a token to its issuer. Returns the new token id.
    pub fn mint(
        &mut self,
        issuer: &str,
        taxon: i64,
        uri: &str,
        transferable: bool,
        burnable: bool,
    ) -> String {
        let serial = self.serials.entry(issuer.to_string()).or_insert(0);
        *serial += 1;
        let nftoken_id = hex::encode(
            &hash256(format!("nft:{issuer}:{taxon}:{serial}").as_bytes())[..20],
        );
        self.tokens.insert(
            nftoken_id.clone(),
            NfToken {
                nftoken_id: nftoken_id.clone(),
                issuer: issuer.to_string(),
                owner: issuer.to_string(),
                taxon,
                uri: uri.to_string(),
                transferable,
                burnable,
                serial: *serial,
                burned: false,
            },
        );
        nftoken_id
    }

    /// Burn a token. The owner always may; the issuer may when the
    /// token was minted burnable.
    pub fn burn(&mut self, nftoken_id: &str, requester: &str) -> Result<(), NftError> {
        let token = self
            .tokens
            .get_mut(nftoken_id)
            .ok_or_else(|| NftError::TokenNotFound(nftoken_id.to_string()))?;
        if token.burned {
            return Err(NftError::AlreadyBurned(nftoken_id.to_string()));
        }
        let allowed =
            token.owner == requester || (token.burnable && token.issuer == requester);
        if !allowed {
            return Err(NftError::NotPermitted);
        }
        token.burned = true;
        Ok(())
    }

    /// Create a buy or sell offer.
    #[allow(clippy::too_many_arguments)]
    pub fn create_offer(
        &mut self,
        offer_id: &str,
        nftoken_id: &str,
        owner: &str,
        amount: i128,
        is_sell: bool,
        destination: &str,
        expiration: i64,
    ) -> Result<&NfTokenOffer, NftError> {
        let token = self
            .tokens
            .get(nftoken_id)
            .ok_or_else(|| NftError::TokenNotFound(nftoken_id.to_string()))?;
        if token.burned {
            return Err(NftError::AlreadyBurned(nftoken_id.to_string()));
        }
        if is_sell && token.owner != owner {
            return Err(NftError::NotPermitted);
        }
        if !is_sell && token.owner == owner {
            return Err(NftError::NotPermitted);
        }
        if !token.transferable && owner != token.issuer && !is_sell {
            return Err(NftError::NotPermitted);
        }
        let offer = NfTokenOffer {
            offer_id: offer_id.to_string(),
            nftoken_id: nftoken_id.to_string(),
            owner: owner.to_string(),
            amount,
            is_sell,
            destination: destination.to_string(),
            expiration,
            accepted: false,
            cancelled: false,
        };
        Ok(self.offers.entry(offer_id.to_string()).or_insert(offer))
    }

    /// Accept an offer and move the token. Returns the trade to settle.
    pub fn accept_offer(
        &mut self,
        offer_id: &str,
        acceptor: &str,
        now: i64,
    ) -> Result<NftTrade, NftError> {
        let offer = self
            .offers
            .get_mut(offer_id)
            .ok_or_else(|| NftError::OfferNotFound(offer_id.to_string()))?;
        if offer.accepted || offer.cancelled {
            return Err(NftError::OfferResolved(offer_id.to_string()));
        }
        if offer.expiration > 0 && now >= offer.expiration {
            return Err(NftError::OfferExpired(offer_id.to_string()));
        }
        if !offer.destination.is_empty() && offer.destination != acceptor {
            return Err(NftError::NotPermitted);
        }
        let token = self
            .tokens
            .get_mut(&offer.nftoken_id)
            .ok_or_else(|| NftError::TokenNotFound(offer.nftoken_id.clone()))?;
        if token.burned {
            return Err(NftError::AlreadyBurned(token.nftoken_id.clone()));
        }

        let (buyer, seller) = if offer.is_sell {
            // Acceptor buys from the offer creator (the token owner).
            if token.owner != offer.owner {
                return Err(NftError::NotPermitted);
            }
            (acceptor.to_string(), offer.owner.clone())
        } else {
            // The token owner accepts a buy offer.
            if token.owner != acceptor {
                return Err(NftError::NotPermitted);
            }
            (offer.owner.clone(), acceptor.to_string())
        };

        offer.accepted = true;
        token.owner = buyer.clone();
        Ok(NftTrade {
            buyer,
            seller,
            amount: offer.amount,
            nftoken_id: offer.nftoken_id.clone(),
        })
    }

    /// Cancel an offer. Only its creator may.
    pub fn cancel_offer(&mut self, offer_id: &str, requester: &str) -> Result<(), NftError> {
        let offer = self
            .offers
            .get_mut(offer_id)
            .ok_or_else(|| NftError::OfferNotFound(offer_id.to_string()))?;
        if offer.accepted || offer.cancelled {
            return Err(NftError::OfferResolved(offer_id.to_string()));
        }
        if offer.owner != requester {
            return Err(NftError::NotPermitted);
        }
        offer.cancelled = true;
        Ok(())
    }

    /// Look up a token.
    pub fn get_token(&self, nftoken_id: &str) -> Option<&NfToken> {
        self.tokens.get(nftoken_id)
    }

    /// Look up an offer.
    pub fn get_offer(&self, offer_id: &str) -> Option<&NfTokenOffer> {
        self.offers.get(offer_id)
    }

    /// Unburned tokens owned by an account.
    pub fn tokens_for(&self, account: &str) -> Vec<&NfToken> {
        self.tokens
            .values()
            .filter(|t| t.owner == account && !t.burned)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_assigns_unique_ids() {
        let mut m = NfTokenManager::new();
        let a = m.mint("nIssuer", 1, "ipfs://a", true, false);
        let b = m.mint("nIssuer", 1, "ipfs://a", true, false);
        assert_ne!(a, b);
        assert_eq!(m.tokens_for("nIssuer").len(), 2);
    }

    #[test]
    fn sell_offer_accept_moves_token_and_pays_seller() {
        let mut m = NfTokenManager::new();
        let id = m.mint("nIssuer", 1, "", true, false);
        m.create_offer("off-1", &id, "nIssuer", 5_000_000, true, "", 0)
            .unwrap();
        let trade = m.accept_offer("off-1", "nBuyer", 100).unwrap();
        assert_eq!(trade.buyer, "nBuyer");
        assert_eq!(trade.seller, "nIssuer");
        assert_eq!(trade.amount, 5_000_000);
        assert_eq!(m.get_token(&id).unwrap().owner, "nBuyer");
    }

    #[test]
    fn buy_offer_accept_reverses_the_flow() {
        let mut m = NfTokenManager::new();
        let id = m.mint("nIssuer", 1, "", true, false);
        m.create_offer("off-1", &id, "nCollector", 9_000_000, false, "", 0)
            .unwrap();
        let trade = m.accept_offer("off-1", "nIssuer", 100).unwrap();
        assert_eq!(trade.buyer, "nCollector");
        assert_eq!(trade.seller, "nIssuer");
        assert_eq!(m.get_token(&id).unwrap().owner, "nCollector");
    }

    #[test]
    fn only_the_owner_creates_sell_offers() {
        let mut m = NfTokenManager::new();
        let id = m.mint("nIssuer", 1, "", true, false);
        let err = m.create_offer("off-1", &id, "nStranger", 1, true, "", 0);
        assert_eq!(err.unwrap_err(), NftError::NotPermitted);
    }

    #[test]
    fn destination_restricted_offers() {
        let mut m = NfTokenManager::new();
        let id = m.mint("nIssuer", 1, "", true, false);
        m.create_offer("off-1", &id, "nIssuer", 1, true, "nVip", 0)
            .unwrap();
        assert_eq!(
            m.accept_offer("off-1", "nPleb", 0).unwrap_err(),
            NftError::NotPermitted
        );
        assert!(m.accept_offer("off-1", "nVip", 0).is_ok());
    }

    #[test]
    fn burn_rules() {
        let mut m = NfTokenManager::new();
        let id = m.mint("nIssuer", 1, "", true, true);
        // Transfer away via sell offer.
        m.create_offer("off-1", &id, "nIssuer", 1, true, "", 0).unwrap();
        m.accept_offer("off-1", "nBuyer", 0).unwrap();
        // Burnable: the issuer can still burn it.
        assert!(m.burn(&id, "nIssuer").is_ok());
        assert!(matches!(
            m.burn(&id, "nBuyer").unwrap_err(),
            NftError::AlreadyBurned(_)
        ));
    }

    #[test]
    fn expired_offers_cannot_be_accepted() {
        let mut m = NfTokenManager::new();
        let id = m.mint("nIssuer", 1, "", true, false);
        m.create_offer("off-1", &id, "nIssuer", 1, true, "", 50).unwrap();
        assert!(matches!(
            m.accept_offer("off-1", "nBuyer", 50).unwrap_err(),
            NftError::OfferExpired(_)
        ));
    }

    #[test]
    fn cancel_is_creator_only() {
        let mut m = NfTokenManager::new();
        let id = m.mint("nIssuer", 1, "", true, false);
        m.create_offer("off-1", &id, "nIssuer", 1, true, "", 0).unwrap();
        assert_eq!(
            m.cancel_offer("off-1", "nOther").unwrap_err(),
            NftError::NotPermitted
        );
        assert!(m.cancel_offer("off-1", "nIssuer").is_ok());
    }
}
