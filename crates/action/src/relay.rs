//! Relay message action.
//!
//! Assembles `L1CrossDomainMessenger.relayMessage` calls from a message, the
//! batch that committed its state root and the proofs tying the two together,
//! and submits them to L1.

use crate::{Action, SignerFn};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_provider::Provider;
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::SolCall;
use batch::{StateRootBatch, StateRootBatchHeader};
use binding::ovm::{
    ChainInclusionProof, IL1CrossDomainMessenger, ILibAddressManager, L2MessageInclusionProof,
    L2_MESSAGE_RELAYER_NAME,
};
use message::{message_hash, storage_slot, CrossChainMessage, SentMessage};
use proof::{build_inclusion_proof, MerkleProof, StateTrieProof, WitnessSource};
use std::future::Future;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RelayError {
    /// Proof inputs that do not describe the same state root
    #[error("Invalid proof inputs: {0}")]
    InvalidProofInputs(String),

    /// The messenger rejected the call in simulation
    #[error("Relay simulation failed: {0}")]
    SimulationFailed(String),

    /// The relay transaction was mined but reverted
    #[error("Relay transaction {tx_hash} reverted")]
    Reverted { tx_hash: B256 },

    /// The address manager names a different relayer account
    #[error("OVM_L2MessageRelayer ({registered}) is not set to relayer account {signer}")]
    UnauthorizedRelayer { registered: Address, signer: Address },
}

/// Check the relayer registered in the address manager against our account.
///
/// An unset (zero) registration means anyone may relay.
pub fn verify_relayer(registered: Address, signer: Address) -> Result<(), RelayError> {
    if registered.is_zero() || registered == signer {
        return Ok(());
    }
    Err(RelayError::UnauthorizedRelayer { registered, signer })
}

/// ABI-encode a `relayMessage` call proving `message` against `header`.
///
/// `tx_index_in_batch` selects the state root within the batch; the Merkle
/// proof must be for that same position.
pub fn build_relay_call_data(
    message: &CrossChainMessage,
    header: &StateRootBatchHeader,
    state_roots: &[B256],
    tx_index_in_batch: u64,
    merkle_proof: &MerkleProof,
    trie_proof: &StateTrieProof,
) -> Result<Bytes, RelayError> {
    if state_roots.len() as u64 != header.batch_size {
        return Err(RelayError::InvalidProofInputs(format!(
            "{} state roots for a batch of size {}",
            state_roots.len(),
            header.batch_size
        )));
    }
    if tx_index_in_batch >= header.batch_size {
        return Err(RelayError::InvalidProofInputs(format!(
            "index {} outside batch of size {}",
            tx_index_in_batch, header.batch_size
        )));
    }
    if merkle_proof.index != tx_index_in_batch {
        return Err(RelayError::InvalidProofInputs(format!(
            "Merkle proof for index {}, expected {}",
            merkle_proof.index, tx_index_in_batch
        )));
    }

    let proof = L2MessageInclusionProof {
        stateRoot: state_roots[tx_index_in_batch as usize],
        stateRootBatchHeader: header.to_abi(),
        stateRootProof: ChainInclusionProof {
            index: U256::from(tx_index_in_batch),
            siblings: merkle_proof.siblings.clone(),
        },
        stateTrieWitness: trie_proof.account_proof.clone(),
        storageTrieWitness: trie_proof.storage_proof.clone(),
    };

    Ok(IL1CrossDomainMessenger::relayMessageCall {
        _target: message.target,
        _sender: message.sender,
        _message: message.payload.clone(),
        _messageNonce: message.nonce,
        _proof: proof,
    }
    .abi_encode()
    .into())
}

/// L2 addresses and offset needed to prove a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofParams {
    /// L2CrossDomainMessenger, the sender recorded by the message passer
    pub l2_messenger: Address,
    /// L2ToL1MessagePasser whose storage is proven
    pub message_passer: Address,
    /// L2 blocks before the first committed state root
    pub block_offset: u64,
}

/// Build both proofs for `sent` and assemble the relay call data.
///
/// `batch` must be the batch whose range covers the message's transaction.
/// A [`proof::ProofError::ProofUnavailable`] from the witness source is
/// returned unchanged inside the report so callers can retry later.
pub async fn assemble_relay<W>(
    witnesses: &W,
    sent: &SentMessage,
    batch: &StateRootBatch,
    params: ProofParams,
) -> eyre::Result<Bytes>
where
    W: WitnessSource,
{
    let header = &batch.header;
    let tx_index = sent.tx_index(params.block_offset).ok_or_else(|| {
        RelayError::InvalidProofInputs(format!(
            "L2 block {} precedes the first committed state root",
            sent.block_number
        ))
    })?;
    let index_in_batch = header.index_in_batch(tx_index).ok_or_else(|| {
        RelayError::InvalidProofInputs(format!(
            "transaction index {} not in batch {}",
            tx_index, header.batch_index
        ))
    })?;

    let merkle_proof = build_inclusion_proof(&batch.state_roots, index_in_batch)?;

    let slot = storage_slot(&sent.message, params.l2_messenger);
    let trie_proof = witnesses
        .fetch_storage_witness(sent.block_number, params.message_passer, slot)
        .await?;

    debug!(
        batch_index = header.batch_index,
        index_in_batch,
        siblings = merkle_proof.siblings.len(),
        slot = %slot,
        "Assembled relay proofs"
    );

    Ok(build_relay_call_data(
        &sent.message,
        header,
        &batch.state_roots,
        index_in_batch,
        &merkle_proof,
        &trie_proof,
    )?)
}

/// The L1 side of relaying.
pub trait L1Messenger: Send + Sync {
    /// Fail if the deployment only accepts relays from another account.
    fn check_relayer(&self) -> impl Future<Output = eyre::Result<()>> + Send;

    /// Whether the message with this hash has already been executed.
    fn is_relayed(&self, message_hash: B256) -> impl Future<Output = eyre::Result<bool>> + Send;

    /// Dry-run the relay call against the latest L1 state.
    fn simulate(&self, call_data: Bytes) -> impl Future<Output = eyre::Result<()>> + Send;

    /// Send the relay call and wait for its receipt.
    fn submit(&self, call_data: Bytes) -> impl Future<Output = eyre::Result<crate::Result>> + Send;
}

/// L1CrossDomainMessenger reached through a provider and a signer.
pub struct ChainMessenger<P> {
    provider: P,
    signer: SignerFn,
    messenger_address: Address,
    from: Address,
    chain_id: u64,
    gas_limit: Option<u64>,
    address_manager: Option<Address>,
}

impl<P> ChainMessenger<P>
where
    P: Provider + Clone,
{
    pub fn new(
        provider: P,
        signer: SignerFn,
        messenger_address: Address,
        from: Address,
        chain_id: u64,
    ) -> Self {
        Self {
            provider,
            signer,
            messenger_address,
            from,
            chain_id,
            gas_limit: None,
            address_manager: None,
        }
    }

    /// Check the relayer registered in this Lib_AddressManager.
    pub const fn with_address_manager(mut self, address_manager: Option<Address>) -> Self {
        self.address_manager = address_manager;
        self
    }

    /// Use a fixed gas limit instead of estimating.
    pub const fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    /// Address relay transactions are sent from.
    pub const fn from_address(&self) -> Address {
        self.from
    }

    fn relay_request(&self, call_data: Bytes) -> TransactionRequest {
        let tx = TransactionRequest::default()
            .to(self.messenger_address)
            .from(self.from)
            .input(call_data.into());
        match self.gas_limit {
            Some(gas_limit) => tx.gas_limit(gas_limit),
            None => tx,
        }
    }
}

impl<P> L1Messenger for ChainMessenger<P>
where
    P: Provider + Clone,
{
    async fn check_relayer(&self) -> eyre::Result<()> {
        let Some(address_manager) = self.address_manager else {
            return Ok(());
        };
        let manager = ILibAddressManager::new(address_manager, &self.provider);
        let registered = manager
            .getAddress(L2_MESSAGE_RELAYER_NAME.to_string())
            .call()
            .await?;
        verify_relayer(registered, self.from)?;
        Ok(())
    }

    async fn is_relayed(&self, message_hash: B256) -> eyre::Result<bool> {
        let messenger = IL1CrossDomainMessenger::new(self.messenger_address, &self.provider);
        let relayed = messenger.successfulMessages(message_hash).call().await?;
        Ok(relayed)
    }

    async fn simulate(&self, call_data: Bytes) -> eyre::Result<()> {
        self.provider
            .call(self.relay_request(call_data))
            .await
            .map_err(|e| RelayError::SimulationFailed(e.to_string()))?;
        Ok(())
    }

    async fn submit(&self, call_data: Bytes) -> eyre::Result<crate::Result> {
        let tx_request = self.relay_request(call_data);

        // Fill transaction fields (nonce, gas, fees) using our provider
        let filled_tx =
            client::fill_transaction(tx_request, &self.provider, self.from, self.chain_id).await?;

        let signed_tx = (self.signer)(filled_tx).await?;

        let pending = self.provider.send_raw_transaction(&signed_tx).await?;
        let receipt = pending.get_receipt().await?;

        if !receipt.status() {
            return Err(RelayError::Reverted {
                tx_hash: receipt.transaction_hash,
            }
            .into());
        }

        Ok(crate::Result {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_used: Some(U256::from(receipt.gas_used)),
        })
    }
}

/// What happened when a relay was attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The relay transaction was mined successfully
    Relayed(crate::Result),
    /// Someone already executed the message
    AlreadyRelayed,
    /// Simulation passed; nothing was sent
    DryRun,
}

/// Input data for relaying one message.
#[derive(Debug, Clone)]
pub struct Relay {
    /// The message being relayed
    pub message: CrossChainMessage,
    /// Assembled `relayMessage` call data
    pub call_data: Bytes,
}

/// Action to relay a message on L1.
pub struct RelayAction<'a, M> {
    messenger: &'a M,
    action: Relay,
    message_hash: B256,
    dry_run: bool,
}

impl<'a, M> RelayAction<'a, M>
where
    M: L1Messenger,
{
    pub fn new(messenger: &'a M, action: Relay, dry_run: bool) -> Self {
        let message_hash = message_hash(&action.message);
        Self {
            messenger,
            action,
            message_hash,
            dry_run,
        }
    }

    /// Hash identifying the message on L1.
    pub const fn message_hash(&self) -> B256 {
        self.message_hash
    }

    /// Relay unless already relayed; simulate before sending.
    pub async fn relay(&mut self) -> eyre::Result<RelayOutcome> {
        debug!("{}", self.description());

        if !self.is_ready().await? {
            return Ok(RelayOutcome::AlreadyRelayed);
        }

        if self.dry_run {
            self.messenger.simulate(self.action.call_data.clone()).await?;
            info!(
                message_hash = %self.message_hash,
                target = %self.action.message.target,
                call_data = %self.action.call_data,
                "Dry run: relay transaction not sent"
            );
            return Ok(RelayOutcome::DryRun);
        }

        let result = self.execute().await?;
        Ok(RelayOutcome::Relayed(result))
    }
}

impl<M> Action for RelayAction<'_, M>
where
    M: L1Messenger,
{
    async fn is_ready(&self) -> eyre::Result<bool> {
        Ok(!self.is_completed().await?)
    }

    async fn is_completed(&self) -> eyre::Result<bool> {
        self.messenger.is_relayed(self.message_hash).await
    }

    async fn execute(&mut self) -> eyre::Result<crate::Result> {
        if self.dry_run {
            eyre::bail!("Dry run: relay transaction not sent");
        }

        self.messenger.simulate(self.action.call_data.clone()).await?;
        let result = self.messenger.submit(self.action.call_data.clone()).await?;

        info!(
            tx_hash = %result.tx_hash,
            block_number = result.block_number,
            gas_used = ?result.gas_used,
            message_hash = %self.message_hash,
            "Message relayed on L1"
        );

        Ok(result)
    }

    fn description(&self) -> String {
        format!(
            "Relaying message {} (nonce {}) to {}",
            self.message_hash, self.action.message.nonce, self.action.message.target
        )
    }
}
