use alloy_consensus::TxEnvelope;
use alloy_network::{eip2718::Encodable2718, EthereumWallet, TransactionBuilder};
use alloy_primitives::{Address, Bytes};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer_local::{coins_bip39::English, MnemonicBuilder, PrivateKeySigner};
use std::{fmt, future::Future, pin::Pin, sync::Arc};
use thiserror::Error;

/// A function that signs a transaction request and returns signed bytes.
pub type SignerFn = Arc<
    dyn Fn(TransactionRequest) -> Pin<Box<dyn Future<Output = eyre::Result<Bytes>> + Send>>
        + Send
        + Sync,
>;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Error parsing or validating URLs
    #[error("Invalid RPC URL: {0}")]
    InvalidUrl(String),

    /// Error connecting to the RPC endpoint
    #[error("Connection error: {0}")]
    Connection(String),

    /// Error with private key
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// Error deriving a key from a mnemonic
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),
}

/// Key material for the account that submits relay transactions.
#[derive(Clone)]
pub enum Credentials {
    /// Hex encoded private key
    PrivateKey(String),
    /// BIP-39 phrase, derived at `m/44'/60'/0'/0/{index}`
    Mnemonic { phrase: String, index: u32 },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrivateKey(_) => f.write_str("PrivateKey(..)"),
            Self::Mnemonic { index, .. } => write!(f, "Mnemonic {{ index: {index}, .. }}"),
        }
    }
}

impl Credentials {
    /// Build the local signer these credentials describe.
    pub fn signer(&self) -> Result<PrivateKeySigner, ClientError> {
        match self {
            Self::PrivateKey(key) => key
                .parse()
                .map_err(|e| ClientError::InvalidPrivateKey(format!("{}", e))),
            Self::Mnemonic { phrase, index } => MnemonicBuilder::<English>::default()
                .phrase(phrase.as_str())
                .derivation_path(format!("m/44'/60'/0'/0/{index}"))
                .map_err(|e| ClientError::InvalidMnemonic(format!("{}", e)))?
                .build()
                .map_err(|e| ClientError::InvalidMnemonic(format!("{}", e))),
        }
    }
}

/// Convenience function to create an ethereum rpc provider from url.
pub async fn create_provider(
    rpc_url: &str,
) -> Result<impl Provider + Clone + 'static, ClientError> {
    let url = rpc_url
        .parse()
        .map_err(|e| ClientError::InvalidUrl(format!("{}", e)))?;
    let provider = ProviderBuilder::new().connect_http(url);

    Ok(provider)
}

/// Ask the endpoint which chain it serves.
pub async fn fetch_chain_id<P>(provider: &P) -> Result<u64, ClientError>
where
    P: Provider,
{
    provider
        .get_chain_id()
        .await
        .map_err(|e| ClientError::Connection(format!("{}", e)))
}

/// Create a SignerFn from a local signer and provider.
///
/// The provider is used to fill transaction fields (nonce, gas, fees) before
/// signing locally.
pub fn local_signer_fn<P>(signer: PrivateKeySigner, chain_id: u64, provider: P) -> SignerFn
where
    P: Provider + Clone + 'static,
{
    let from_address = signer.address();
    let wallet = EthereumWallet::from(signer);

    Arc::new(move |tx: TransactionRequest| {
        let wallet = wallet.clone();
        let provider = provider.clone();
        Box::pin(async move {
            let filled_tx = fill_transaction(tx, &provider, from_address, chain_id).await?;

            // Build and sign the typed transaction
            let tx_envelope: TxEnvelope = filled_tx
                .build(&wallet)
                .await
                .map_err(|e| eyre::eyre!("{}", e))?;

            // Encode to EIP-2718 bytes
            let mut encoded = Vec::new();
            tx_envelope.encode_2718(&mut encoded);
            Ok(Bytes::from(encoded))
        })
    })
}

/// Fill missing transaction fields using the provider.
///
/// Fields already set on `tx` are kept, so a fixed gas limit skips estimation.
pub async fn fill_transaction<P>(
    mut tx: TransactionRequest,
    provider: &P,
    from: Address,
    chain_id: u64,
) -> eyre::Result<TransactionRequest>
where
    P: Provider,
{
    if tx.from.is_none() {
        tx.from = Some(from);
    }

    if tx.chain_id.is_none() {
        tx.chain_id = Some(chain_id);
    }

    if tx.nonce.is_none() {
        let nonce = provider.get_transaction_count(from).await?;
        tx.nonce = Some(nonce);
    }

    // Fees first: gas estimation may need them
    if tx.max_fee_per_gas.is_none() || tx.max_priority_fee_per_gas.is_none() {
        let fee_estimate = provider.estimate_eip1559_fees().await?;
        if tx.max_fee_per_gas.is_none() {
            tx.max_fee_per_gas = Some(fee_estimate.max_fee_per_gas);
        }
        if tx.max_priority_fee_per_gas.is_none() {
            tx.max_priority_fee_per_gas = Some(fee_estimate.max_priority_fee_per_gas);
        }
    }

    if tx.gas.is_none() {
        let gas_estimate = provider.estimate_gas(tx.clone()).await?;
        // +20%
        tx.gas = Some(gas_estimate + gas_estimate / 5);
    }

    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const ANVIL_ADDRESS: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    const TEST_MNEMONIC: &str = "test test test test test test test test test test test junk";

    #[tokio::test]
    async fn test_invalid_url() {
        let result = create_provider("not a url").await;
        assert!(result.is_err());
    }

    #[test]
    fn test_private_key_signer() {
        let signer = Credentials::PrivateKey(ANVIL_KEY.to_string())
            .signer()
            .unwrap();
        assert_eq!(signer.address(), ANVIL_ADDRESS);
    }

    #[test]
    fn test_mnemonic_signer() {
        let credentials = Credentials::Mnemonic {
            phrase: TEST_MNEMONIC.to_string(),
            index: 0,
        };
        assert_eq!(credentials.signer().unwrap().address(), ANVIL_ADDRESS);

        let second = Credentials::Mnemonic {
            phrase: TEST_MNEMONIC.to_string(),
            index: 1,
        };
        assert_eq!(
            second.signer().unwrap().address(),
            address!("70997970C51812dc3A010C7d01b50e0d17dc79C8")
        );
    }

    #[test]
    fn test_invalid_credentials() {
        assert!(matches!(
            Credentials::PrivateKey("0x1234".to_string()).signer(),
            Err(ClientError::InvalidPrivateKey(_))
        ));
        assert!(matches!(
            Credentials::Mnemonic {
                phrase: "not a real phrase".to_string(),
                index: 0
            }
            .signer(),
            Err(ClientError::InvalidMnemonic(_))
        ));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let debug = format!("{:?}", Credentials::PrivateKey(ANVIL_KEY.to_string()));
        assert!(!debug.contains("ac0974"));

        let debug = format!(
            "{:?}",
            Credentials::Mnemonic {
                phrase: TEST_MNEMONIC.to_string(),
                index: 2
            }
        );
        assert!(!debug.contains("junk"));
        assert!(debug.contains("index: 2"));
    }
}
