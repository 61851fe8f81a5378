// Copyright (c) 2025 The Rivulet Project

//! TOML configuration for a Rivulet node.
//!
//! Everything the protocol depends on is configurable here: initial
//! supply, genesis account, validator identity and key, UNL membership
//! and public keys, consensus thresholds, and reserve parameters.
//! Amounts are decimal strings parsed into micro-units.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use riv_core_types::Amount;
use serde::{Deserialize, Serialize};

use crate::consensus::ConsensusConfig;
use crate::ledger::LedgerParams;

/// Top-level node configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Identity settings.
    #[serde(default)]
    pub node: NodeSection,
    /// Ledger economics.
    #[serde(default)]
    pub ledger: LedgerSection,
    /// Consensus thresholds and UNL.
    #[serde(default)]
    pub consensus: ConsensusSection,
    /// Persistence settings.
    #[serde(default)]
    pub storage: StorageSection,
}

/// Validator identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSection {
    /// Validator id used in proposals.
    #[serde(default = "default_node_id")]
    pub id: String,
    /// Seed for the validator signing key; empty runs unsigned.
    #[serde(default)]
    pub key_seed: String,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            id: default_node_id(),
            key_seed: String::new(),
        }
    }
}

fn default_node_id() -> String {
    "validator-1".to_string()
}

/// Ledger economics, amounts as decimal unit strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSection {
    /// Initial native supply in whole units.
    #[serde(default = "default_supply")]
    pub initial_supply: String,
    /// Address credited with the supply at genesis.
    #[serde(default = "default_genesis_account")]
    pub genesis_account: String,
    /// Base account reserve in units.
    #[serde(default = "default_base_reserve")]
    pub base_reserve: String,
    /// Per-object reserve increment in units.
    #[serde(default = "default_owner_reserve")]
    pub owner_reserve: String,
    /// Minimum transaction fee in units.
    #[serde(default = "default_min_fee")]
    pub min_fee: String,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            initial_supply: default_supply(),
            genesis_account: default_genesis_account(),
            base_reserve: default_base_reserve(),
            owner_reserve: default_owner_reserve(),
            min_fee: default_min_fee(),
        }
    }
}

fn default_supply() -> String {
    "100000000000".to_string()
}

fn default_genesis_account() -> String {
    "nGenesis".to_string()
}

fn default_base_reserve() -> String {
    "10".to_string()
}

fn default_owner_reserve() -> String {
    "2".to_string()
}

fn default_min_fee() -> String {
    "0.00001".to_string()
}

impl LedgerSection {
    /// Parse into ledger parameters.
    pub fn to_params(&self) -> Result<LedgerParams> {
        let parse = |label: &str, s: &str| {
            Amount::parse_units(s).ok_or_else(|| anyhow!("invalid {label} amount: {s}"))
        };
        Ok(LedgerParams {
            initial_supply: parse("initial_supply", &self.initial_supply)?,
            genesis_account: self.genesis_account.clone(),
            base_reserve: parse("base_reserve", &self.base_reserve)?,
            owner_reserve_inc: parse("owner_reserve", &self.owner_reserve)?,
            min_fee: parse("min_fee", &self.min_fee)?,
            ..LedgerParams::default()
        })
    }
}

/// A trusted validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorEntry {
    /// Validator id.
    pub id: String,
    /// Hex public key; empty accepts unsigned proposals.
    #[serde(default)]
    pub pubkey: String,
}

/// Consensus thresholds and UNL membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusSection {
    /// Round-0 agreement threshold.
    #[serde(default = "default_initial_threshold")]
    pub initial_threshold: f64,
    /// Final threshold; must exceed 2/3.
    #[serde(default = "default_final_threshold")]
    pub final_threshold: f64,
    /// Maximum voting rounds.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    /// Per-round wall-clock budget in milliseconds.
    #[serde(default = "default_round_timeout_ms")]
    pub round_timeout_ms: u64,
    /// Ledger close interval in seconds for the run loop.
    #[serde(default = "default_close_interval")]
    pub close_interval_secs: u64,
    /// Trusted validators (excluding self).
    #[serde(default)]
    pub validators: Vec<ValidatorEntry>,
}

impl Default for ConsensusSection {
    fn default() -> Self {
        Self {
            initial_threshold: default_initial_threshold(),
            final_threshold: default_final_threshold(),
            max_rounds: default_max_rounds(),
            round_timeout_ms: default_round_timeout_ms(),
            close_interval_secs: default_close_interval(),
            validators: Vec::new(),
        }
    }
}

fn default_initial_threshold() -> f64 {
    0.50
}

fn default_final_threshold() -> f64 {
    0.80
}

fn default_max_rounds() -> u32 {
    10
}

fn default_round_timeout_ms() -> u64 {
    2_000
}

fn default_close_interval() -> u64 {
    10
}

impl ConsensusSection {
    /// Thresholds in integer bps for the engine.
    pub fn to_engine_config(&self) -> ConsensusConfig {
        ConsensusConfig {
            initial_threshold_bps: (self.initial_threshold * 10_000.0).round() as u64,
            final_threshold_bps: (self.final_threshold * 10_000.0).round() as u64,
            max_rounds: self.max_rounds.max(1),
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    /// Directory for the flat-file store.
    #[serde(default = "default_data_dir_string")]
    pub data_dir: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir_string(),
        }
    }
}

fn default_data_dir_string() -> String {
    default_data_dir().to_string_lossy().into_owned()
}

impl Config {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config from {}", path.display()))
    }

    /// Save to a TOML file with restrictive permissions.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("failed to write config to {}", path.display()))?;

        // The key seed lives in here.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))
                .with_context(|| format!("failed to set permissions on {}", path.display()))?;
        }
        Ok(())
    }
}

/// Default data directory: `~/.rivulet`.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".rivulet")
}

/// Default config file path.
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("rivulet.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn config_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rivulet.toml");
        let mut config = Config::default();
        config.node.id = "validator-7".to_string();
        config.consensus.validators.push(ValidatorEntry {
            id: "validator-8".to_string(),
            pubkey: String::new(),
        });
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.node.id, "validator-7");
        assert_eq!(loaded.consensus.validators.len(), 1);
        assert_eq!(loaded.consensus.final_threshold, 0.80);
    }

    #[test]
    fn ledger_section_parses_amounts() {
        let params = LedgerSection::default().to_params().unwrap();
        assert_eq!(params.initial_supply, 100_000_000_000 * 1_000_000);
        assert_eq!(params.base_reserve, 10_000_000);
        assert_eq!(params.min_fee, 10);
    }

    #[test]
    fn bad_amounts_are_rejected() {
        let section = LedgerSection {
            min_fee: "not-a-number".to_string(),
            ..LedgerSection::default()
        };
        assert!(section.to_params().is_err());
    }

    #[test]
    fn thresholds_convert_to_bps() {
        let engine = ConsensusSection::default().to_engine_config();
        assert_eq!(engine.initial_threshold_bps, 5_000);
        assert_eq!(engine.final_threshold_bps, 8_000);
        assert_eq!(engine.max_rounds, 10);
    }
}
