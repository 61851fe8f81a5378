// Copyright (c) 2025 The Rivulet Project

//! Rivulet node library: a validator for an IOU/trust-line value
//! transfer network with confidential payments.
//!
//! The core pipeline is the deterministic state machine
//! ([`ledger::Ledger::apply`]), the hash-chained close procedure
//! ([`ledger::Ledger::close_ledger`]) and the BFT voting engine
//! ([`consensus::ConsensusEngine`]). Everything else — mempool, config,
//! storage, CLI — exists to feed and drive those three.

#![deny(clippy::print_stdout)]

pub mod commands;
pub mod config;
pub mod consensus;
pub mod engines;
pub mod ledger;
pub mod mempool;
pub mod node;
pub mod storage;
