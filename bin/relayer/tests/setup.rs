//! In-memory chain fakes shared across integration tests.
#![allow(dead_code)] // not every test file uses every helper

use action::{
    relay::{verify_relayer, L1Messenger, ProofParams},
    Result as ActionResult,
};
use alloy_primitives::{keccak256, Address, Bytes, TxHash, B256, U256};
use alloy_sol_types::SolCall;
use batch::{
    BatchError, IndexedEventSource, StateBatchSource, StateRootBatch, StateRootBatchHeader,
};
use binding::ovm::{IL1CrossDomainMessenger, L2_MESSENGER_ADDRESS, MESSAGE_PASSER_ADDRESS};
use message::{message_hash, CrossChainMessage, MessageError, MessageSource, SentMessage};
use proof::{compute_root, ProofError, StateTrieProof, WitnessSource};
use relayer::{metrics::Metrics, relay_loop::RelayLoop, relayer::Relayer};
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Duration,
};

pub const BLOCK_OFFSET: u64 = 1;
pub const POLLING_INTERVAL: Duration = Duration::from_millis(10);

/// Account the fake messenger relays from.
pub const RELAYER_ACCOUNT: Address = Address::repeat_byte(0x5c);

pub fn params() -> ProofParams {
    ProofParams {
        l2_messenger: L2_MESSENGER_ADDRESS,
        message_passer: MESSAGE_PASSER_ADDRESS,
        block_offset: BLOCK_OFFSET,
    }
}

pub fn message(nonce: u64) -> CrossChainMessage {
    CrossChainMessage {
        target: Address::with_last_byte(0xaa),
        sender: Address::with_last_byte(0xbb),
        payload: Bytes::from(nonce.to_be_bytes().to_vec()),
        nonce: U256::from(nonce),
    }
}

/// `count` distinct state roots derived from `seed`.
pub fn state_roots(seed: u8, count: usize) -> Vec<B256> {
    (0..count)
        .map(|i| keccak256([seed, i as u8]))
        .collect()
}

fn message_from_call_data(call_data: &Bytes) -> CrossChainMessage {
    let call = IL1CrossDomainMessenger::relayMessageCall::abi_decode(call_data)
        .expect("relay call data should decode");
    CrossChainMessage {
        target: call._target,
        sender: call._sender,
        payload: call._message,
        nonce: call._messageNonce,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Batches
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct BatchState {
    batches: Vec<StateRootBatch>,
    challenged: HashSet<u64>,
    fail_reads: bool,
    /// Header reads never complete
    stalled: bool,
}

/// StateCommitmentChain stand-in.
#[derive(Clone, Default)]
pub struct FakeBatches {
    state: Arc<Mutex<BatchState>>,
}

impl FakeBatches {
    /// Append a batch committing `roots` right after the previous one.
    pub fn push_batch(&self, roots: Vec<B256>) -> StateRootBatchHeader {
        let mut state = self.state.lock().unwrap();
        let prev_total_elements = state.batches.last().map_or(0, |b| b.header.end());
        let header = StateRootBatchHeader {
            batch_index: state.batches.len() as u64,
            batch_root: compute_root(&roots).unwrap_or(B256::ZERO),
            batch_size: roots.len() as u64,
            prev_total_elements,
            extra_data: Bytes::new(),
        };
        state
            .batches
            .push(StateRootBatch::new(header.clone(), roots).unwrap());
        header
    }

    pub fn set_challenged(&self, batch_index: u64, challenged: bool) {
        let mut state = self.state.lock().unwrap();
        if challenged {
            state.challenged.insert(batch_index);
        } else {
            state.challenged.remove(&batch_index);
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    pub fn set_stalled(&self, stalled: bool) {
        self.state.lock().unwrap().stalled = stalled;
    }

    fn check_reads(&self) -> Result<(), BatchError> {
        if self.state.lock().unwrap().fail_reads {
            return Err(BatchError::Rpc("connection refused".to_string()));
        }
        Ok(())
    }
}

impl IndexedEventSource for FakeBatches {
    async fn total_batches(&self) -> Result<u64, BatchError> {
        self.check_reads()?;
        Ok(self.state.lock().unwrap().batches.len() as u64)
    }

    async fn header_at(&self, batch_index: u64) -> Result<Option<StateRootBatchHeader>, BatchError> {
        self.check_reads()?;
        let stalled = self.state.lock().unwrap().stalled;
        if stalled {
            std::future::pending::<()>().await;
        }
        let state = self.state.lock().unwrap();
        Ok(state
            .batches
            .get(batch_index as usize)
            .map(|b| b.header.clone()))
    }
}

impl StateBatchSource for FakeBatches {
    async fn batch(&self, header: &StateRootBatchHeader) -> Result<StateRootBatch, BatchError> {
        self.check_reads()?;
        let state = self.state.lock().unwrap();
        state
            .batches
            .get(header.batch_index as usize)
            .cloned()
            .ok_or(BatchError::UnknownBatch(header.batch_index))
    }

    async fn inside_challenge_window(&self, header: &StateRootBatchHeader) -> Result<bool, BatchError> {
        self.check_reads()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .challenged
            .contains(&header.batch_index))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

/// L2CrossDomainMessenger event log stand-in.
#[derive(Clone, Default)]
pub struct FakeMessages {
    sent: Arc<Mutex<Vec<SentMessage>>>,
}

impl FakeMessages {
    /// Record `message` as sent by a transaction in L2 block `block_number`.
    pub fn emit(&self, message: CrossChainMessage, block_number: u64) -> SentMessage {
        let mut sent = self.sent.lock().unwrap();
        let log_index = sent.iter().filter(|s| s.block_number == block_number).count() as u64;
        let mut seed = block_number.to_be_bytes().to_vec();
        seed.extend_from_slice(&log_index.to_be_bytes());
        let entry = SentMessage {
            message,
            block_number,
            tx_hash: keccak256(seed),
            log_index,
        };
        sent.push(entry.clone());
        entry
    }
}

impl MessageSource for FakeMessages {
    async fn sent_messages(&self, from_block: u64, to_block: u64) -> Result<Vec<SentMessage>, MessageError> {
        let mut messages: Vec<SentMessage> = self
            .sent
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.block_number >= from_block && s.block_number <= to_block)
            .cloned()
            .collect();
        messages.sort_by_key(|s| (s.block_number, s.log_index));
        Ok(messages)
    }

    async fn find_message_by_tx_hash(&self, tx_hash: TxHash) -> Result<Option<SentMessage>, MessageError> {
        Ok(self
            .sent
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.tx_hash == tx_hash)
            .cloned())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Witnesses
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct WitnessState {
    unavailable: bool,
    rpc_error: bool,
    requests: Vec<(u64, Address, B256)>,
}

/// `eth_getProof` stand-in that records every request.
#[derive(Clone, Default)]
pub struct FakeWitnesses {
    state: Arc<Mutex<WitnessState>>,
}

impl FakeWitnesses {
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    pub fn set_rpc_error(&self, rpc_error: bool) {
        self.state.lock().unwrap().rpc_error = rpc_error;
    }

    /// `(block, contract, slot)` of every witness requested so far.
    pub fn requests(&self) -> Vec<(u64, Address, B256)> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn proof() -> StateTrieProof {
        StateTrieProof::from_nodes(&[Bytes::from_static(&[0x01])], &[Bytes::from_static(&[0x02])])
    }
}

impl WitnessSource for FakeWitnesses {
    async fn fetch_storage_witness(
        &self,
        block: u64,
        contract: Address,
        slot: B256,
    ) -> Result<StateTrieProof, ProofError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push((block, contract, slot));
        if state.unavailable {
            return Err(ProofError::ProofUnavailable {
                block,
                reason: "missing trie node".to_string(),
            });
        }
        if state.rpc_error {
            return Err(ProofError::Rpc {
                block,
                reason: "invalid params: storage keys must be 32 bytes".to_string(),
            });
        }
        Ok(Self::proof())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// L1 messenger
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MessengerState {
    relayed: HashSet<B256>,
    submissions: Vec<Bytes>,
    simulations: usize,
    /// Messages whose simulation reverts
    reverting: HashSet<B256>,
    fail_submit: bool,
    relay_despite_failure: bool,
    /// OVM_L2MessageRelayer entry of the address manager
    registered_relayer: Address,
}

/// L1CrossDomainMessenger stand-in.
#[derive(Clone, Default)]
pub struct FakeMessenger {
    state: Arc<Mutex<MessengerState>>,
}

impl FakeMessenger {
    pub fn mark_relayed(&self, message: &CrossChainMessage) {
        self.state
            .lock()
            .unwrap()
            .relayed
            .insert(message_hash(message));
    }

    pub fn is_marked_relayed(&self, message: &CrossChainMessage) -> bool {
        self.state
            .lock()
            .unwrap()
            .relayed
            .contains(&message_hash(message))
    }

    pub fn revert_on(&self, message: &CrossChainMessage) {
        self.state
            .lock()
            .unwrap()
            .reverting
            .insert(message_hash(message));
    }

    /// Make every submission fail, optionally after the relay landed.
    pub fn set_fail_submit(&self, fail: bool, relay_despite_failure: bool) {
        let mut state = self.state.lock().unwrap();
        state.fail_submit = fail;
        state.relay_despite_failure = relay_despite_failure;
    }

    /// Call data of every submitted relay, in order.
    pub fn submissions(&self) -> Vec<Bytes> {
        self.state.lock().unwrap().submissions.clone()
    }

    /// Messages decoded from the submitted relays, in order.
    pub fn submitted_messages(&self) -> Vec<CrossChainMessage> {
        self.submissions()
            .iter()
            .map(message_from_call_data)
            .collect()
    }

    pub fn simulations(&self) -> usize {
        self.state.lock().unwrap().simulations
    }

    /// Register `relayer` as the only account allowed to relay; zero allows any.
    pub fn set_registered_relayer(&self, relayer: Address) {
        self.state.lock().unwrap().registered_relayer = relayer;
    }
}

impl L1Messenger for FakeMessenger {
    async fn check_relayer(&self) -> eyre::Result<()> {
        let registered = self.state.lock().unwrap().registered_relayer;
        verify_relayer(registered, RELAYER_ACCOUNT)?;
        Ok(())
    }

    async fn is_relayed(&self, message_hash: B256) -> eyre::Result<bool> {
        Ok(self.state.lock().unwrap().relayed.contains(&message_hash))
    }

    async fn simulate(&self, call_data: Bytes) -> eyre::Result<()> {
        let hash = message_hash(&message_from_call_data(&call_data));
        let mut state = self.state.lock().unwrap();
        state.simulations += 1;
        if state.reverting.contains(&hash) {
            eyre::bail!("execution reverted: Provided message could not be verified.");
        }
        Ok(())
    }

    async fn submit(&self, call_data: Bytes) -> eyre::Result<ActionResult> {
        let hash = message_hash(&message_from_call_data(&call_data));
        let mut state = self.state.lock().unwrap();
        if state.fail_submit {
            if state.relay_despite_failure {
                state.relayed.insert(hash);
            }
            eyre::bail!("connection reset while waiting for receipt");
        }
        state.relayed.insert(hash);
        state.submissions.push(call_data.clone());
        Ok(ActionResult {
            tx_hash: keccak256(&call_data),
            block_number: Some(state.submissions.len() as u64),
            gas_used: None,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────────────────────────

pub type FakeRelayer = Relayer<FakeBatches, FakeMessages, FakeWitnesses, FakeMessenger>;
pub type FakeRelayLoop = RelayLoop<FakeBatches, FakeMessages, FakeWitnesses, FakeMessenger>;

/// Handles onto one set of fakes; clones share state.
#[derive(Clone, Default)]
pub struct Harness {
    pub batches: FakeBatches,
    pub messages: FakeMessages,
    pub witnesses: FakeWitnesses,
    pub messenger: FakeMessenger,
}

impl Harness {
    pub fn relayer(&self, dry_run: bool) -> FakeRelayer {
        Relayer::new(
            self.batches.clone(),
            self.messages.clone(),
            self.witnesses.clone(),
            self.messenger.clone(),
            params(),
            dry_run,
        )
    }

    pub fn relay_loop(&self, start_batch_index: u64, dry_run: bool) -> FakeRelayLoop {
        RelayLoop::new(
            self.relayer(dry_run),
            POLLING_INTERVAL,
            start_batch_index,
            Metrics::new(),
        )
    }

    /// Emit a message from the L2 transaction with index `tx_index`.
    pub fn emit_at_tx_index(&self, message: CrossChainMessage, tx_index: u64) -> SentMessage {
        self.messages.emit(message, tx_index + BLOCK_OFFSET)
    }
}
