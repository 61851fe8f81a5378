// Copyright (c) 2025 The Rivulet Project

//! Tickets: reserved sequence numbers usable out of order.

use std::collections::BTreeMap;

use riv_crypto_keys::hash256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum tickets per TicketCreate.
pub const MAX_TICKETS_PER_CREATE: u32 = 250;

/// Why a ticket operation was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TicketError {
    /// Count outside `1..=250`.
    #[error("ticket count must be 1..={MAX_TICKETS_PER_CREATE}")]
    BadCount,
    /// No such ticket for this account.
    #[error("ticket {0} not found")]
    NotFound(String),
}

/// A reserved sequence slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Deterministic ticket id.
    pub ticket_id: String,
    /// Owning account.
    pub account: String,
    /// The reserved sequence value.
    pub ticket_seq: i64,
}

/// All outstanding tickets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TicketManager {
    tickets: BTreeMap<String, Ticket>,
}

impl TicketManager {
    /// An empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `count` tickets starting at `base_seq`. Returns their ids.
    pub fn create(
        &mut self,
        account: &str,
        base_seq: i64,
        count: u32,
    ) -> Result<Vec<String>, TicketError> {
        if count == 0 || count > MAX_TICKETS_PER_CREATE {
            return Err(TicketError::BadCount);
        }
        let mut ids = Vec::with_capacity(count as usize);
        for offset in 0..count as i64 {
            let ticket_seq = base_seq + offset;
            let ticket_id =
                hex::encode(&hash256(format!("ticket:{account}:{ticket_seq}").as_bytes())[..16]);
            self.tickets.insert(
                ticket_id.clone(),
                Ticket {
                    ticket_id: ticket_id.clone(),
                    account: account.to_string(),
                    ticket_seq,
                },
            );
            ids.push(ticket_id);
        }
        Ok(ids)
    }

    /// Consume a ticket for its owner.
    pub fn consume(&mut self, ticket_id: &str, account: &str) -> Result<Ticket, TicketError> {
        match self.tickets.get(ticket_id) {
            Some(ticket) if ticket.account == account => {
                Ok(self.tickets.remove(ticket_id).expect("present"))
            }
            _ => Err(TicketError::NotFound(ticket_id.to_string())),
        }
    }

    /// Whether a ticket exists for this owner.
    pub fn has(&self, ticket_id: &str, account: &str) -> bool {
        self.tickets
            .get(ticket_id)
            .map(|t| t.account == account)
            .unwrap_or(false)
    }

    /// Outstanding tickets for an account.
    pub fn count_for(&self, account: &str) -> usize {
        self.tickets.values().filter(|t| t.account == account).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_consume() {
        let mut m = TicketManager::new();
        let ids = m.create("nAlice", 10, 3).unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(m.count_for("nAlice"), 3);

        let ticket = m.consume(&ids[1], "nAlice").unwrap();
        assert_eq!(ticket.ticket_seq, 11);
        assert_eq!(m.count_for("nAlice"), 2);
        assert!(matches!(
            m.consume(&ids[1], "nAlice").unwrap_err(),
            TicketError::NotFound(_)
        ));
    }

    #[test]
    fn tickets_are_owner_bound() {
        let mut m = TicketManager::new();
        let ids = m.create("nAlice", 10, 1).unwrap();
        assert!(!m.has(&ids[0], "nBob"));
        assert!(matches!(
            m.consume(&ids[0], "nBob").unwrap_err(),
            TicketError::NotFound(_)
        ));
        assert!(m.has(&ids[0], "nAlice"));
    }

    #[test]
    fn count_bounds() {
        let mut m = TicketManager::new();
        assert_eq!(m.create("nA", 1, 0).unwrap_err(), TicketError::BadCount);
        assert_eq!(m.create("nA", 1, 251).unwrap_err(), TicketError::BadCount);
    }
}
