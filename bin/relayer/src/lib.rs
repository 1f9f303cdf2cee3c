pub mod config;
pub mod metrics;
pub mod relay_loop;
pub mod relayer;
pub mod signal;

use crate::{config::Config, relayer::Relayer};
use action::relay::{ChainMessenger, L1Messenger, ProofParams};
use alloy_provider::Provider;
use batch::ChainBatchSource;
use client::Credentials;
use message::ChainMessageSource;
use proof::ChainWitnessSource;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Relayer talking to real L1 and L2 nodes.
pub type ChainRelayer<P1, P2> = Relayer<
    ChainBatchSource<P1>,
    ChainMessageSource<P2>,
    ChainWitnessSource<P2>,
    ChainMessenger<P1>,
>;

/// Signing key options shared by the binaries.
#[derive(clap::Args)]
pub struct KeyArgs {
    /// Private key for signing relay transactions (hex string, with or without 0x prefix)
    #[arg(
        short = 'k',
        long,
        env = "PRIVATE_KEY",
        hide_env_values = true,
        conflicts_with = "mnemonic"
    )]
    pub private_key: Option<String>,

    /// Mnemonic phrase to derive the signing key from
    #[arg(long, env = "MNEMONIC", hide_env_values = true)]
    pub mnemonic: Option<String>,

    /// Account index in the mnemonic derivation path
    #[arg(long, default_value_t = 0)]
    pub mnemonic_index: u32,
}

impl KeyArgs {
    pub fn credentials(&self) -> eyre::Result<Credentials> {
        match (&self.private_key, &self.mnemonic) {
            (Some(key), _) => Ok(Credentials::PrivateKey(key.clone())),
            (None, Some(phrase)) => Ok(Credentials::Mnemonic {
                phrase: phrase.clone(),
                index: self.mnemonic_index,
            }),
            (None, None) => eyre::bail!("Set PRIVATE_KEY or MNEMONIC to sign relay transactions"),
        }
    }
}

/// Initialise the global tracing subscriber, `info` unless `RUST_LOG` says otherwise.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Connect to both chains and build a relayer for the configured network.
///
/// Fails if either endpoint serves a chain other than the configured one, or
/// if the address manager registers a relayer other than the signing account.
pub async fn connect(
    config: &Config,
    keys: &KeyArgs,
) -> eyre::Result<ChainRelayer<impl Provider + Clone + 'static, impl Provider + Clone + 'static>> {
    let network = config.network_config();
    let signer = keys.credentials()?.signer()?;
    let from = signer.address();

    let l1_provider = client::create_provider(&config.l1_rpc_url).await?;
    let l2_provider = client::create_provider(&config.l2_rpc_url).await?;

    let l1_chain_id = client::fetch_chain_id(&l1_provider).await?;
    let l2_chain_id = client::fetch_chain_id(&l2_provider).await?;
    network.check_chain_ids(l1_chain_id, l2_chain_id)?;

    info!("Connected:");
    info!("  Network: {:?}", network.network_type);
    info!("  L1 chain id: {}", l1_chain_id);
    info!("  L2 chain id: {}", l2_chain_id);
    info!("  StateCommitmentChain: {}", network.l1.state_commitment_chain);
    info!("  L1 messenger: {}", network.l1.l1_messenger);
    info!("  L2 messenger: {}", network.l2.l2_messenger);
    info!("  Relayer account: {}", from);
    if let Some(address_manager) = network.l1.address_manager {
        info!("  Address manager: {}", address_manager);
    }

    let signer_fn = client::local_signer_fn(signer, l1_chain_id, l1_provider.clone());
    let messenger = ChainMessenger::new(
        l1_provider.clone(),
        signer_fn,
        network.l1.l1_messenger,
        from,
        l1_chain_id,
    )
    .with_gas_limit(config.relay_gas_limit)
    .with_address_manager(network.l1.address_manager);
    messenger.check_relayer().await?;

    let params = ProofParams {
        l2_messenger: network.l2.l2_messenger,
        message_passer: network.l2.message_passer,
        block_offset: network.l2.block_offset,
    };

    Ok(Relayer::new(
        ChainBatchSource::new(
            l1_provider,
            network.l1.state_commitment_chain,
            network.l1.start_block,
        )
        .with_logs_interval(config.get_logs_interval),
        ChainMessageSource::new(l2_provider.clone(), network.l2.l2_messenger),
        ChainWitnessSource::new(l2_provider),
        messenger,
        params,
        config.dry_run,
    ))
}
