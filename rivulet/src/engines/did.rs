// Copyright (c) 2025 The Rivulet Project

//! Decentralized identifiers: one document per account.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum hex payload length (256 bytes).
pub const MAX_DATA_LENGTH: usize = 512;
/// Maximum URI length.
pub const MAX_URI_LENGTH: usize = 256;

/// Why a DID operation was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DidError {
    /// URI or data exceed their limits, or both are empty.
    #[error("invalid DID document")]
    InvalidDocument,
    /// The account has no document.
    #[error("no DID for {0}")]
    NotFound(String),
}

/// A DID document anchored to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidDocument {
    /// Owning account.
    pub account: String,
    /// Document URI.
    pub uri: String,
    /// Hex payload.
    pub data: String,
    /// Last update time.
    pub updated: i64,
}

impl DidDocument {
    /// The `did:riv:` identifier for this document.
    pub fn did_id(&self) -> String {
        format!("did:riv:{}", self.account)
    }
}

/// All DID documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DidManager {
    documents: BTreeMap<String, DidDocument>,
}

impl DidManager {
    /// An empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace an account's document. Returns whether it was
    /// created.
    pub fn set_did(
        &mut self,
        account: &str,
        uri: &str,
        data: &str,
        now: i64,
    ) -> Result<bool, DidError> {
        if (uri.is_empty() && data.is_empty())
            || uri.len() > MAX_URI_LENGTH
            || data.len() > MAX_DATA_LENGTH
        {
            return Err(DidError::InvalidDocument);
        }
        let creating = !self.documents.contains_key(account);
        self.documents.insert(
            account.to_string(),
            DidDocument {
                account: account.to_string(),
                uri: uri.to_string(),
                data: data.to_string(),
                updated: now,
            },
        );
        Ok(creating)
    }

    /// Delete an account's document.
    pub fn delete_did(&mut self, account: &str) -> Result<(), DidError> {
        self.documents
            .remove(account)
            .map(|_| ())
            .ok_or_else(|| DidError::NotFound(account.to_string()))
    }

    /// Look up by account.
    pub fn get(&self, account: &str) -> Option<&DidDocument> {
        self.documents.get(account)
    }

    /// Resolve a `did:riv:<account>` identifier.
    pub fn resolve(&self, did_id: &str) -> Option<&DidDocument> {
        did_id
            .strip_prefix("did:riv:")
            .and_then(|account| self.documents.get(account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_resolve_delete() {
        let mut m = DidManager::new();
        assert!(m.set_did("nAlice", "https://example.com/doc", "", 5).unwrap());
        assert_eq!(
            m.resolve("did:riv:nAlice").unwrap().uri,
            "https://example.com/doc"
        );
        assert!(!m.set_did("nAlice", "https://example.com/v2", "", 6).unwrap());
        m.delete_did("nAlice").unwrap();
        assert!(m.get("nAlice").is_none());
        assert!(matches!(
            m.delete_did("nAlice").unwrap_err(),
            DidError::NotFound(_)
        ));
    }

    #[test]
    fn validation_limits() {
        let mut m = DidManager::new();
        assert_eq!(
            m.set_did("nA", "", "", 0).unwrap_err(),
            DidError::InvalidDocument
        );
        let long = "x".repeat(MAX_URI_LENGTH + 1);
        assert_eq!(
            m.set_did("nA", &long, "", 0).unwrap_err(),
            DidError::InvalidDocument
        );
    }
}
