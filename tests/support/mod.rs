//! Shared test support: an in-memory transport standing in for a node.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ibc_proto::cosmos::bank::v1beta1::MsgSend as RawMsgSend;
use ibc_proto::cosmos::tx::v1beta1::{AuthInfo, Tx, TxBody, TxRaw};
use prost::Message;
use tokio::sync::Notify;

use veridian_sdk::account::{Account, AccountNumber, AccountSequence};
use veridian_sdk::address::AccAddress;
use veridian_sdk::bank::MsgSend;
use veridian_sdk::client::{tx_hash, ChainClient};
use veridian_sdk::coin::Coin;
use veridian_sdk::config::ChainConfig;
use veridian_sdk::error::Error;
use veridian_sdk::keyring::{KeyEntry, Store};
use veridian_sdk::msg::Msg;
use veridian_sdk::transport::Transport;
use veridian_sdk::tx::types::{BroadcastMode, GasInfo, TxResult};

/// One transaction accepted by the fake node, decoded for assertions.
#[derive(Clone, Debug)]
pub struct BroadcastRecord {
    /// Bech32 sender of the first message.
    pub sender: String,
    /// Sequence the transaction was signed with.
    pub sequence: u64,
    /// Number of messages packed into the transaction.
    pub messages: usize,
    /// Encoded size of the transaction in bytes.
    pub size: usize,
    /// Broadcast mode the caller asked for.
    pub mode: BroadcastMode,
}

#[derive(Default)]
struct MockState {
    /// On-chain account state: address -> (account number, next sequence).
    accounts: Mutex<HashMap<String, (u64, u64)>>,
    /// Counts of Query/Account calls per address.
    queries: Mutex<HashMap<String, usize>>,
    /// Scripted broadcast outcomes, consumed one per attempt. `Some(code)`
    /// rejects the transaction, `None` accepts it. An empty queue accepts.
    script: Mutex<VecDeque<Option<u32>>>,
    /// Transactions accepted so far.
    broadcasts: Mutex<Vec<BroadcastRecord>>,
    /// All broadcast calls, accepted or not.
    attempts: AtomicUsize,
    /// Simulate calls served.
    simulations: AtomicUsize,
    /// Gas figures returned by simulation.
    sim_gas_wanted: AtomicU64,
    sim_gas_used: AtomicU64,
    /// Block height, bumped per accepted transaction.
    height: AtomicI64,
    /// Sender whose next broadcast parks until the gate opens.
    hold_sender: Mutex<Option<String>>,
    /// Sender whose accepted broadcast opens the gate.
    release_sender: Mutex<Option<String>>,
    gate: Notify,
}

/// A transport that never touches the network.
///
/// Cloning shares the underlying state, so tests keep a handle for
/// assertions while the client owns another.
#[derive(Clone, Default)]
pub struct MockTransport(Arc<MockState>);

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the on-chain state for `address`.
    pub fn set_account(&self, address: &str, number: u64, sequence: u64) {
        self.0
            .accounts
            .lock()
            .unwrap()
            .insert(address.to_string(), (number, sequence));
    }

    /// How many times `address` was queried.
    pub fn queries_for(&self, address: &str) -> usize {
        self.0
            .queries
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .unwrap_or(0)
    }

    /// Make the next `count` broadcasts fail with `code`.
    pub fn fail_next_broadcasts(&self, count: usize, code: u32) {
        let mut script = self.0.script.lock().unwrap();
        for _ in 0..count {
            script.push_back(Some(code));
        }
    }

    /// Let the next `count` broadcasts through before any scripted failures.
    pub fn pass_next_broadcasts(&self, count: usize) {
        let mut script = self.0.script.lock().unwrap();
        for _ in 0..count {
            script.push_back(None);
        }
    }

    /// Transactions accepted so far, in order.
    pub fn broadcasts(&self) -> Vec<BroadcastRecord> {
        self.0.broadcasts.lock().unwrap().clone()
    }

    /// Broadcast calls made, including rejected ones.
    pub fn broadcast_attempts(&self) -> usize {
        self.0.attempts.load(Ordering::SeqCst)
    }

    pub fn simulations(&self) -> usize {
        self.0.simulations.load(Ordering::SeqCst)
    }

    /// Gas figures simulation reports.
    pub fn set_simulated_gas(&self, gas_wanted: u64, gas_used: u64) {
        self.0.sim_gas_wanted.store(gas_wanted, Ordering::SeqCst);
        self.0.sim_gas_used.store(gas_used, Ordering::SeqCst);
    }

    /// Park the next broadcast from `sender` until the gate opens.
    pub fn hold_next_broadcast_from(&self, sender: &str) {
        *self.0.hold_sender.lock().unwrap() = Some(sender.to_string());
    }

    /// Open the gate once `sender` gets a transaction accepted.
    pub fn release_gate_after(&self, sender: &str) {
        *self.0.release_sender.lock().unwrap() = Some(sender.to_string());
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn query_account(&self, address: &str) -> Result<Account, Error> {
        *self
            .0
            .queries
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_insert(0) += 1;

        let (number, sequence) = self
            .0
            .accounts
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .ok_or_else(|| Error::empty_query_account(address.to_string()))?;

        Ok(Account::new(
            address,
            AccountNumber::new(number),
            AccountSequence::new(sequence),
        ))
    }

    async fn broadcast_tx(&self, tx_bytes: Vec<u8>, mode: BroadcastMode) -> Result<TxResult, Error> {
        self.0.attempts.fetch_add(1, Ordering::SeqCst);

        let record = decode_broadcast(&tx_bytes, mode);

        let parked = {
            let mut hold = self.0.hold_sender.lock().unwrap();
            if hold.as_deref() == Some(record.sender.as_str()) {
                hold.take();
                true
            } else {
                false
            }
        };
        if parked {
            self.0.gate.notified().await;
        }

        if let Some(Some(code)) = self.0.script.lock().unwrap().pop_front() {
            return Err(Error::broadcast(
                code,
                "scripted failure".to_string(),
                String::new(),
            ));
        }

        // An accepted transaction consumes the sequence it was signed with.
        {
            let mut accounts = self.0.accounts.lock().unwrap();
            if let Some(entry) = accounts.get_mut(&record.sender) {
                entry.1 = record.sequence + 1;
            }
        }

        let releases = {
            let mut release = self.0.release_sender.lock().unwrap();
            if release.as_deref() == Some(record.sender.as_str()) {
                release.take();
                true
            } else {
                false
            }
        };
        if releases {
            self.0.gate.notify_one();
        }

        let height = self.0.height.fetch_add(1, Ordering::SeqCst) + 1;
        let hash = tx_hash(&tx_bytes);
        self.0.broadcasts.lock().unwrap().push(record);

        Ok(TxResult {
            hash,
            height,
            code: 0,
            raw_log: String::new(),
            gas_wanted: 0,
            gas_used: 0,
        })
    }

    async fn simulate_tx(&self, _tx: Tx) -> Result<GasInfo, Error> {
        self.0.simulations.fetch_add(1, Ordering::SeqCst);

        Ok(GasInfo {
            gas_wanted: self.0.sim_gas_wanted.load(Ordering::SeqCst),
            gas_used: self.0.sim_gas_used.load(Ordering::SeqCst),
        })
    }
}

fn decode_broadcast(tx_bytes: &[u8], mode: BroadcastMode) -> BroadcastRecord {
    let tx_raw = TxRaw::decode(tx_bytes).expect("broadcast bytes must decode as TxRaw");
    let body = TxBody::decode(tx_raw.body_bytes.as_slice()).expect("body must decode");
    let auth_info =
        AuthInfo::decode(tx_raw.auth_info_bytes.as_slice()).expect("auth info must decode");

    let sender = body
        .messages
        .first()
        .and_then(|any| RawMsgSend::decode(any.value.as_slice()).ok())
        .map(|msg| msg.from_address)
        .unwrap_or_default();

    let sequence = auth_info
        .signer_infos
        .first()
        .map(|signer| signer.sequence)
        .unwrap_or_default();

    BroadcastRecord {
        sender,
        sequence,
        messages: body.messages.len(),
        size: tx_bytes.len(),
        mode,
    }
}

/// Default config with the engine tunables overridden. Round-trips through
/// serde because the bounded fields only deserialize.
pub fn config_with(max_msg_num: usize, max_tx_size: usize) -> ChainConfig {
    serde_json::from_value(serde_json::json!({
        "id": "veridian-1",
        "grpc_addr": "http://localhost:9090",
        "account_prefix": "vrd",
        "max_msg_num": max_msg_num,
        "max_tx_size": max_tx_size,
    }))
    .expect("test config must parse")
}

/// Client over a mock transport with a single key named `name`, its account
/// seeded at the given number and sequence.
pub fn client_with_key(
    config: ChainConfig,
    transport: MockTransport,
    name: &str,
    number: u64,
    sequence: u64,
) -> (ChainClient<MockTransport>, KeyEntry) {
    let mut client = ChainClient::with_transport(config, Store::Memory, transport.clone())
        .expect("client must build");

    let (key, _mnemonic) = client.create_key(name).expect("key generation");
    transport.set_account(&key.account, number, sequence);

    (client, key)
}

/// Single-coin transfer from `key` to a fixed recipient.
pub fn send_msg(key: &KeyEntry, amount: u128) -> Box<dyn Msg> {
    let from = AccAddress::from_bech32(&key.account).expect("key address");
    let to = AccAddress::from_bytes("vrd", &[9; 20]).expect("recipient");

    Box::new(MsgSend::new(from, to, vec![Coin::new("uvrd", amount)]))
}

/// A transfer that encodes well past a kilobyte: one coin per denom,
/// `coins` denoms.
pub fn wide_send_msg(key: &KeyEntry, coins: usize) -> Box<dyn Msg> {
    let from = AccAddress::from_bech32(&key.account).expect("key address");
    let to = AccAddress::from_bytes("vrd", &[9; 20]).expect("recipient");

    let amount = (0..coins)
        .map(|i| Coin::new(format!("coin{:03}", i), 1))
        .collect();

    Box::new(MsgSend::new(from, to, amount))
}

/// The shard a sender name maps to, mirroring the client's FNV-1 table.
/// Lets tests pick sender names that do or do not contend.
pub fn shard_of(key: &str, shards: usize) -> usize {
    let mut hash: u32 = 2_166_136_261;
    for byte in key.as_bytes() {
        hash = hash.wrapping_mul(16_777_619);
        hash ^= u32::from(*byte);
    }

    hash as usize % shards
}
