// Copyright (c) 2025 The Rivulet Project

//! Credentials: issuer-to-subject attestations with acceptance.

use std::collections::BTreeMap;

use riv_crypto_keys::hash256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum credential-type tag length.
pub const MAX_TYPE_LENGTH: usize = 64;
/// Maximum URI length.
pub const MAX_URI_LENGTH: usize = 256;

/// Why a credential operation was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// An identical credential already exists.
    #[error("credential already exists")]
    AlreadyExists,
    /// Type or URI exceed their limits.
    #[error("invalid credential fields")]
    InvalidFields,
    /// No credential with that id.
    #[error("credential {0} not found")]
    NotFound(String),
    /// Only the subject accepts; only the parties delete.
    #[error("not permitted")]
    NotPermitted,
}

/// A single credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Deterministic id over `(issuer, subject, type)`.
    pub credential_id: String,
    /// Issuing account.
    pub issuer: String,
    /// Subject account.
    pub subject: String,
    /// Type tag, e.g. `"kyc"`.
    pub credential_type: String,
    /// Evidence URI.
    pub uri: String,
    /// Expiration; 0 = never.
    pub expiration: i64,
    /// Accepted by the subject.
    pub accepted: bool,
}

impl Credential {
    /// Valid means accepted and unexpired.
    pub fn is_valid(&self, now: i64) -> bool {
        self.accepted && (self.expiration == 0 || now < self.expiration)
    }
}

/// All credentials on the ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialManager {
    credentials: BTreeMap<String, Credential>,
}

/// Deterministic credential id.
pub fn credential_id(issuer: &str, subject: &str, credential_type: &str) -> String {
    hex::encode(&hash256(format!("cred:{issuer}:{subject}:{credential_type}").as_bytes())[..16])
}

impl CredentialManager {
    /// An empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a credential. Returns its id.
    pub fn create(
        &mut self,
        issuer: &str,
        subject: &str,
        credential_type: &str,
        uri: &str,
        expiration: i64,
    ) -> Result<String, CredentialError> {
        if credential_type.is_empty()
            || credential_type.len() > MAX_TYPE_LENGTH
            || uri.len() > MAX_URI_LENGTH
        {
            return Err(CredentialError::InvalidFields);
        }
        let id = credential_id(issuer, subject, credential_type);
        if self.credentials.contains_key(&id) {
            return Err(CredentialError::AlreadyExists);
        }
        self.credentials.insert(
            id.clone(),
            Credential {
                credential_id: id.clone(),
                issuer: issuer.to_string(),
                subject: subject.to_string(),
                credential_type: credential_type.to_string(),
                uri: uri.to_string(),
                expiration,
                accepted: false,
            },
        );
        Ok(id)
    }

    /// Subject accepts a credential.
    pub fn accept(&mut self, credential_id: &str, subject: &str) -> Result<(), CredentialError> {
        let cred = self
            .credentials
            .get_mut(credential_id)
            .ok_or_else(|| CredentialError::NotFound(credential_id.to_string()))?;
        if cred.subject != subject {
            return Err(CredentialError::NotPermitted);
        }
        cred.accepted = true;
        Ok(())
    }

    /// Delete a credential. Issuer or subject; anyone once expired.
    pub fn delete(
        &mut self,
        credential_id: &str,
        requester: &str,
        now: i64,
    ) -> Result<(), CredentialError> {
        let cred = self
            .credentials
            .get(credential_id)
            .ok_or_else(|| CredentialError::NotFound(credential_id.to_string()))?;
        let expired = cred.expiration > 0 && now >= cred.expiration;
        if requester != cred.issuer && requester != cred.subject && !expired {
            return Err(CredentialError::NotPermitted);
        }
        self.credentials.remove(credential_id);
        Ok(())
    }

    /// Look up a credential.
    pub fn get(&self, credential_id: &str) -> Option<&Credential> {
        self.credentials.get(credential_id)
    }

    /// Whether a valid credential of this type exists.
    pub fn check(&self, issuer: &str, subject: &str, credential_type: &str, now: i64) -> bool {
        self.credentials
            .get(&credential_id(issuer, subject, credential_type))
            .map(|c| c.is_valid(now))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_accept_check() {
        let mut m = CredentialManager::new();
        let id = m.create("nIssuer", "nSubject", "kyc", "", 0).unwrap();
        assert!(!m.check("nIssuer", "nSubject", "kyc", 0));
        assert_eq!(
            m.accept(&id, "nImposter").unwrap_err(),
            CredentialError::NotPermitted
        );
        m.accept(&id, "nSubject").unwrap();
        assert!(m.check("nIssuer", "nSubject", "kyc", 0));
    }

    #[test]
    fn duplicates_are_refused() {
        let mut m = CredentialManager::new();
        m.create("nIssuer", "nSubject", "kyc", "", 0).unwrap();
        assert_eq!(
            m.create("nIssuer", "nSubject", "kyc", "", 0).unwrap_err(),
            CredentialError::AlreadyExists
        );
    }

    #[test]
    fn expired_credentials_fail_checks_and_are_sweepable() {
        let mut m = CredentialManager::new();
        let id = m.create("nIssuer", "nSubject", "kyc", "", 100).unwrap();
        m.accept(&id, "nSubject").unwrap();
        assert!(m.check("nIssuer", "nSubject", "kyc", 99));
        assert!(!m.check("nIssuer", "nSubject", "kyc", 100));
        // A stranger can delete only once expired.
        assert_eq!(
            m.delete(&id, "nStranger", 99).unwrap_err(),
            CredentialError::NotPermitted
        );
        m.delete(&id, "nStranger", 100).unwrap();
        assert!(m.get(&id).is_none());
    }
}
