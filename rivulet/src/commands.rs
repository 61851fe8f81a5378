// Copyright (c) 2025 The Rivulet Project

//! CLI command implementations.

// The CLI is the one place that talks to stdout directly.
#![allow(clippy::print_stdout)]

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use riv_account_keys::AccountKey;
use riv_core_types::{Amount, Transaction};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{Config, StorageSection};
use crate::node::ValidatorNode;
use crate::storage::FileStore;

/// Resolve the configured data directory.
fn data_dir(storage: &StorageSection) -> PathBuf {
    PathBuf::from(&storage.data_dir)
}

fn open_node(config: &Config) -> Result<ValidatorNode> {
    let store = FileStore::open(data_dir(&config.storage))?;
    ValidatorNode::new(config, Box::new(store))
}

/// `init`: write a fresh config file.
pub fn init(path: &Path, node_id: &str, key_seed: Option<String>) -> Result<()> {
    if path.exists() {
        return Err(anyhow!("config already exists at {}", path.display()));
    }
    let mut config = Config::default();
    config.node.id = node_id.to_string();
    if let Some(seed) = key_seed {
        config.node.key_seed = seed;
    }
    config.save(path)?;
    println!("wrote {}", path.display());
    Ok(())
}

/// `status`: print the node status as JSON.
pub fn status(config: &Config) -> Result<()> {
    let node = open_node(config)?;
    let status = node.status();
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

/// `address`: derive and print the account address for a seed.
pub fn address(seed: &str) -> Result<()> {
    let key = AccountKey::from_seed(seed.as_bytes());
    let public = key.public_address();
    println!("address: {}", public.address());
    println!("view_public: {}", hex::encode(public.view_public));
    println!("spend_public: {}", hex::encode(public.spend_public));
    Ok(())
}

/// `send`: build, sign and locally apply a payment, then close.
pub async fn send(config: &Config, seed: &str, destination: &str, amount: &str) -> Result<()> {
    let micro = Amount::parse_units(amount)
        .filter(|v| *v > 0)
        .ok_or_else(|| anyhow!("invalid amount: {amount}"))?;

    let mut node = open_node(config)?;
    let account_key = AccountKey::from_seed(seed.as_bytes());
    let source = account_key.public_address().address();
    let signing_key = riv_crypto_keys::PrivateKey::from_bytes(&riv_crypto_keys::hash256(
        seed.as_bytes(),
    ))?;

    let now = unix_now();
    let mut tx = Transaction::payment(
        &source,
        destination,
        Amount::native(micro),
        Amount::native(node.ledger.params.min_fee),
        0,
        now,
    );
    tx.sign_with(&signing_key);

    let tx_id = node
        .receive_transaction(tx)
        .map_err(|e| anyhow!("rejected: {e}"))?;
    info!(%tx_id, "submitted");

    run_one_cycle(&mut node, now).await?;
    println!("applied {tx_id}");
    println!("{}", serde_json::to_string_pretty(&node.status())?);
    Ok(())
}

/// `run`: close ledgers on an interval until interrupted.
pub async fn run(config: &Config) -> Result<()> {
    let mut node = open_node(config)?;
    info!(node_id = %node.node_id(), "node started");
    if let Some(pubkey) = node.validator_pubkey() {
        info!(validator_pubkey = %pubkey.to_hex(), "validator key loaded");
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        interrupt.cancel();
    });

    let interval = std::time::Duration::from_secs(config.consensus.close_interval_secs.max(1));
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("shutting down");
                return Ok(());
            }
            _ = tokio::time::sleep(interval) => {}
        }
        if node.mempool.is_empty() {
            continue;
        }
        run_one_cycle(&mut node, unix_now()).await?;
    }
}

/// One consensus cycle with no peer ingress wired up. On a single
/// validator (empty UNL) this is its own quorum; with peers configured
/// the transport layer is expected to feed the channel.
async fn run_one_cycle(node: &mut ValidatorNode, close_time: i64) -> Result<()> {
    let (ingress, mut proposals) = mpsc::channel(64);
    // No transport wired up here: closing the ingress lets every round
    // tally immediately instead of waiting out its timeout.
    drop(ingress);
    let cancel = CancellationToken::new();
    match node
        .run_consensus_cycle(&mut proposals, &cancel, close_time)
        .await
        .context("consensus cycle")?
    {
        Some(result) => {
            info!(
                agreed = result.agreed_tx_ids.len(),
                rounds = result.rounds_used,
                "ledger advanced"
            );
        }
        None => {
            info!("consensus failed; pool retained for the next cycle");
        }
    }
    Ok(())
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
