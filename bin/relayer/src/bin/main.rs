use clap::Parser;
use relayer::{
    config::Config,
    connect, init_tracing,
    metrics::{install_prometheus_exporter, Metrics},
    relay_loop::RelayLoop,
    signal::setup_signal_handler,
    KeyArgs,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "relayer")]
#[command(about = "Relay finalized L2 to L1 messages")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(flatten)]
    keys: KeyArgs,

    /// Batch index to start from, overriding the config file
    #[arg(long)]
    start_batch_index: Option<u64>,

    /// Dry-run mode: simulate relays without sending transactions
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

    info!("Starting relayer");

    let mut config = Config::from_file(&cli.config)?;
    if cli.dry_run {
        config.dry_run = true;
    }
    if let Some(start) = cli.start_batch_index {
        config.start_batch_index = start;
    }
    config.validate()?;

    info!("Loaded config: {}", cli.config);
    info!("  L1 RPC URL: {}", config.l1_rpc_url);
    info!("  L2 RPC URL: {}", config.l2_rpc_url);
    info!("  Start batch: {}", config.start_batch_index);
    info!("  Polling interval: {:?}", config.polling_interval());
    if config.dry_run {
        info!("  Mode: DRY-RUN (no transactions will be sent)");
    }

    if let Some(port) = config.metrics_port {
        install_prometheus_exporter(port)?;
        info!("Prometheus metrics on port {}", port);
    }

    let relayer = connect(&config, &cli.keys).await?;
    let mut relay_loop = RelayLoop::new(
        relayer,
        config.polling_interval(),
        config.start_batch_index,
        Metrics::new(),
    );
    setup_signal_handler(relay_loop.cancel_token());

    relay_loop.run().await
}
