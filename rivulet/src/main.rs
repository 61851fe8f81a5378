// Copyright (c) 2025 The Rivulet Project

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rivulet::{commands, config};

#[derive(Parser)]
#[command(name = "rivulet")]
#[command(about = "A validator node for an IOU/trust-line value-transfer network", long_about = None)]
struct Cli {
    /// Path to the config file (default: ~/.rivulet/rivulet.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a fresh config file
    Init {
        /// Validator id for proposals
        #[arg(long, default_value = "validator-1")]
        node_id: String,

        /// Seed for the validator signing key (omit to run unsigned)
        #[arg(long)]
        key_seed: Option<String>,
    },

    /// Run the node, closing ledgers on an interval
    Run,

    /// Print node and ledger status
    Status,

    /// Derive the account address for a wallet seed
    Address {
        /// Wallet seed phrase
        seed: String,
    },

    /// Send a payment and close a ledger locally
    Send {
        /// Wallet seed phrase of the sender
        seed: String,

        /// Destination address
        destination: String,

        /// Amount in whole units, e.g. "12.5"
        amount: String,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli
        .config
        .map(std::path::PathBuf::from)
        .unwrap_or_else(config::default_config_path);

    match cli.command {
        Commands::Init { node_id, key_seed } => {
            commands::init(&config_path, &node_id, key_seed)
        }
        Commands::Run => {
            let config = config::Config::load(&config_path)?;
            commands::run(&config).await
        }
        Commands::Status => {
            let config = config::Config::load(&config_path)?;
            commands::status(&config)
        }
        Commands::Address { seed } => commands::address(&seed),
        Commands::Send {
            seed,
            destination,
            amount,
        } => {
            let config = config::Config::load(&config_path)?;
            commands::send(&config, &seed, &destination, &amount).await
        }
    }
}
