// Copyright (c) 2025 The Rivulet Project

//! BFT consensus: proposals, the voting engine, negative-UNL tracking
//! and the async round driver.

mod driver;
mod engine;
mod negative_unl;

pub use driver::{RoundDriver, DEFAULT_ROUND_TIMEOUT};
pub use engine::{
    ConsensusConfig, ConsensusEngine, ConsensusResult, Proposal, RoundStats,
};
pub use negative_unl::{NegativeUnl, NegativeUnlEntry};
