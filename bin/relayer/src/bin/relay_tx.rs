//! Relay the message sent by a single L2 transaction.

use action::relay::RelayOutcome;
use alloy_primitives::TxHash;
use clap::Parser;
use message::message_hash;
use relayer::{config::Config, connect, init_tracing, KeyArgs};
use tracing::info;

#[derive(Parser)]
#[command(name = "relay-tx")]
#[command(about = "Relay the L2 to L1 message sent by one L2 transaction")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(flatten)]
    keys: KeyArgs,

    /// L2 transaction that sent the message
    #[arg(long)]
    tx_hash: TxHash,

    /// Dry-run mode: simulate the relay without sending a transaction
    #[arg(long)]
    dry_run: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = Config::from_file(&cli.config)?;
    if cli.dry_run {
        config.dry_run = true;
    }
    config.validate()?;

    let relayer = connect(&config, &cli.keys).await?;
    let (sent, outcome) = relayer.relay_transaction(cli.tx_hash).await?;
    let hash = message_hash(&sent.message);

    match outcome {
        RelayOutcome::Relayed(result) => info!(
            message_hash = %hash,
            tx_hash = %result.tx_hash,
            block = result.block_number,
            "Message relayed"
        ),
        RelayOutcome::AlreadyRelayed => info!(message_hash = %hash, "Message was already relayed"),
        RelayOutcome::DryRun => info!(message_hash = %hash, "Relay simulated successfully"),
    }

    Ok(())
}
