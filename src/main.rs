//! Asset Airlift
//!
//! Migrates every token holding and the native balance of the configured
//! source account to a newly generated account, writing the new account's
//! credentials and the outcome of every transfer to a report file.

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(dead_code)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use asset_airlift::config::Config;
use asset_airlift::holdings::{HoldingsSource, RoutescanSource};
use asset_airlift::nonce_manager::NonceSequencer;
use asset_airlift::rpc_manager::{ChainClient, EthersClient};
use asset_airlift::tx_builder::{AbiSet, ContractRegistry, TransferContext, TxSettings};
use asset_airlift::wallet::Account;
use asset_airlift::{Migration, MigrationOptions};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "airlift.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Fetch and report holdings without sending any transaction
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.json_logs)?;

    info!("Starting Asset Airlift");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    info!("Loading configuration from: {}", args.config.display());
    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    config.validate().context("Invalid configuration")?;

    // validate() guarantees both are present
    let source = Account::from_credentials(
        config.source.address.as_deref().unwrap_or_default(),
        config.source.private_key.as_deref().unwrap_or_default(),
    )
    .context("Failed to load source account")?;
    info!("Source account: {:?}", source.address());

    info!(
        "Connecting to {} (chain id {})",
        config.network.rpc_url, config.network.chain_id
    );
    let client: Arc<dyn ChainClient> =
        Arc::new(EthersClient::new(&config.network).context("Failed to create RPC client")?);
    let holdings_source: Arc<dyn HoldingsSource> = Arc::new(
        RoutescanSource::new(&config.holdings).context("Failed to create holdings client")?,
    );

    let sequencer = Arc::new(NonceSequencer::new(client.clone(), source.address()));
    let contracts = ContractRegistry::new(AbiSet::load().context("Failed to load ABIs")?);
    let ctx = Arc::new(TransferContext::new(
        client,
        source,
        sequencer,
        contracts,
        TxSettings::from(&config.network),
    ));

    if args.dry_run {
        warn!("Dry run: holdings will be reported, nothing will be transferred");
    }
    let options = MigrationOptions {
        dry_run: args.dry_run,
        max_in_flight: config.dispatch.max_in_flight,
        report_dir: config.report.output_dir.clone(),
        echo: true,
    };

    match Migration::new(ctx, holdings_source, options).run().await {
        Ok(summary) => {
            info!(
                "Migration to {:?} finished: {} confirmed, {} failed, {} skipped",
                summary.destination,
                summary.confirmed(),
                summary.failed(),
                summary.skipped()
            );
            info!("Report written to {}", summary.report_path.display());
            Ok(())
        }
        Err(e) => {
            error!("Migration aborted: {:#}", e);
            Err(e)
        }
    }
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "asset_airlift=debug,airlift=debug,info"
    } else {
        "asset_airlift=info,airlift=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }

    Ok(())
}
