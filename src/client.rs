//! The chain client: builds, signs and broadcasts transactions, tracking
//! per-sender account state across calls.

use core::fmt;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, error, info, instrument, warn};

use crate::account::Account;
use crate::cache::AccountCache;
use crate::coin::to_min_coins;
use crate::config::{ChainConfig, Memo};
use crate::error::Error;
use crate::keyring::{CoinType, KeyEntry, KeyRing, Store};
use crate::locker::AccountLocker;
use crate::msg::{collect_signers, Msg};
use crate::transport::{GrpcTransport, Transport};
use crate::tx::builder::TxBuilder;
use crate::tx::factory::{Factory, SignerEntry};
use crate::tx::types::{BaseTx, BroadcastMode, TxResult};

// Delay in milliseconds before retrying a failed broadcast within a batch.
const BROADCAST_RETRY_DELAY: u64 = 300;

// A batch send aborts on its third broadcast failure. The budget is shared
// across the whole call, not per batch.
const BROADCAST_TRY_THRESHOLD: u32 = 3;

/// A batch send that stopped early.
///
/// Batches broadcast before the abort stay committed on chain; their results
/// are carried here rather than dropped.
#[derive(Debug)]
pub struct BatchSendError {
    /// Results of the batches committed before the abort.
    pub committed: Vec<TxResult>,
    /// Position the failing batch would have taken in the results.
    pub batch_index: usize,
    /// The failure that ended the call.
    pub error: Error,
}

impl BatchSendError {
    fn new(committed: Vec<TxResult>, error: Error) -> Self {
        let batch_index = committed.len();
        Self {
            committed,
            batch_index,
            error,
        }
    }
}

impl From<Error> for BatchSendError {
    fn from(error: Error) -> Self {
        Self::new(Vec::new(), error)
    }
}

impl fmt::Display for BatchSendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "batch {} failed after {} committed transactions: {}",
            self.batch_index,
            self.committed.len(),
            self.error
        )
    }
}

impl std::error::Error for BatchSendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Client for one chain, generic over the network transport.
///
/// Holds the keyring, the per-sender account cache and the sender locker.
/// Cheap to share behind an `Arc`; all transaction paths take `&self`.
pub struct ChainClient<T> {
    config: ChainConfig,
    transport: T,
    keyring: KeyRing,
    cache: AccountCache,
    locker: AccountLocker,
}

impl ChainClient<GrpcTransport> {
    /// Client over a gRPC transport built from the configured endpoint.
    pub fn new(config: ChainConfig, store: Store) -> Result<Self, Error> {
        let transport = GrpcTransport::from_config(&config)?;
        Self::with_transport(config, store, transport)
    }
}

impl<T: Transport> ChainClient<T> {
    pub fn with_transport(config: ChainConfig, store: Store, transport: T) -> Result<Self, Error> {
        config.validate()?;

        let keyring =
            KeyRing::new(store, &config.account_prefix, &config.id).map_err(Error::keyring)?;
        let cache = AccountCache::new(
            config.account_cache_capacity,
            Duration::from_secs(config.account_cache_ttl_secs),
        );
        let locker = AccountLocker::new(usize::from(config.lock_shards));

        Ok(Self {
            config,
            transport,
            keyring,
            cache,
            locker,
        })
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn keyring(&self) -> &KeyRing {
        &self.keyring
    }

    pub fn keyring_mut(&mut self) -> &mut KeyRing {
        &mut self.keyring
    }

    /// Generate a fresh key under `name`, returning it with its mnemonic.
    pub fn create_key(&mut self, name: &str) -> Result<(KeyEntry, String), Error> {
        self.keyring
            .generate_key(name, CoinType::default())
            .map_err(Error::keyring)
    }

    /// Recover a key from its mnemonic phrase and store it under `name`.
    pub fn recover_key(&mut self, name: &str, mnemonic: &str) -> Result<KeyEntry, Error> {
        self.keyring
            .recover_key(name, mnemonic, CoinType::default())
            .map_err(Error::keyring)
    }

    pub fn get_key(&self, name: &str) -> Result<KeyEntry, Error> {
        self.keyring.get_key(name).map_err(Error::keyring)
    }

    pub fn key_by_account(&self, account: &str) -> Result<KeyEntry, Error> {
        self.keyring.key_by_account(account).map_err(Error::keyring)
    }

    pub fn remove_key(&mut self, name: &str) -> Result<(), Error> {
        self.keyring.remove_key(name).map_err(Error::keyring)
    }

    pub fn keys(&self) -> Result<Vec<(String, KeyEntry)>, Error> {
        self.keyring.keys().map_err(Error::keyring)
    }

    /// Current account state for `address`, straight from the node.
    pub async fn query_account(&self, address: &str) -> Result<Account, Error> {
        self.transport.query_account(address).await
    }

    /// Account resolution used by builds.
    ///
    /// A cache hit hands out the next sequence and records it as the last
    /// one handed out; a miss refreshes from the node and hands out the
    /// fetched value.
    pub async fn query_and_refresh_account(&self, address: &str) -> Result<Account, Error> {
        match self.cache.get(address) {
            Some(mut account) => {
                account.sequence.increment_mut();
                self.cache.insert(account.clone());
                Ok(account)
            }
            None => self.refresh_account(address).await,
        }
    }

    /// Drop the cached state for `address` so the next build refetches it.
    pub fn invalidate_account(&self, address: &str) {
        self.cache.invalidate(address);
        debug!(address = %address, "cache invalidate");
    }

    async fn refresh_account(&self, address: &str) -> Result<Account, Error> {
        let account = self.transport.query_account(address).await?;

        info!(
            sequence = %account.sequence,
            number = %account.number,
            "refresh: retrieved account",
        );

        self.cache.insert(account.clone());
        Ok(account)
    }

    /// Build and sign one transaction, returning the broadcastable bytes.
    pub async fn build_and_sign(
        &self,
        msgs: &[Box<dyn Msg>],
        base_tx: &BaseTx,
    ) -> Result<Vec<u8>, Error> {
        let (tx_bytes, _, _) = self.build_tx(msgs, base_tx).await?;
        Ok(tx_bytes)
    }

    /// Hash the transaction exactly as the chain will index it.
    pub async fn build_tx_hash(
        &self,
        msgs: &[Box<dyn Msg>],
        base_tx: &BaseTx,
    ) -> Result<String, Error> {
        let (tx_bytes, _, _) = self.build_tx(msgs, base_tx).await?;
        Ok(tx_hash(&tx_bytes))
    }

    /// Build, sign and broadcast one transaction.
    ///
    /// The built transaction must fit the configured size limit; this path
    /// has no batch shrinking and no retry. A broadcast failure invalidates
    /// the sender's cached account state.
    pub async fn build_and_send(
        &self,
        msgs: &[Box<dyn Msg>],
        base_tx: &BaseTx,
    ) -> Result<TxResult, Error> {
        let mode = base_tx.mode.unwrap_or(self.config.broadcast_mode);

        let (tx_bytes, builder, address) = self.build_tx(msgs, base_tx).await?;

        let max_tx_size = usize::from(self.config.max_tx_size);
        if tx_bytes.len() > max_tx_size {
            return Err(Error::tx_size_exceeded(tx_bytes.len(), max_tx_size));
        }

        match self
            .broadcast_or_simulate(tx_bytes, &builder, mode, base_tx.simulate)
            .await
        {
            Ok(result) => Ok(result),
            Err(e) => {
                self.invalidate_account(&address);
                error!("broadcast transaction failed: {}", e);
                Err(e)
            }
        }
    }

    /// Send a message list as a series of transactions, at most
    /// `max_msg_num` messages each.
    ///
    /// The sender's lock shard is held for the whole call. An oversized
    /// transaction halves the batch size and repartitions the unsent
    /// remainder; a failed broadcast invalidates the cached account state
    /// and retries the same batch. Three broadcast failures across the call
    /// abort it, returning the committed results inside the error.
    #[instrument(skip_all, fields(id = %self.config.id, msgs = msgs.len(), from = %base_tx.from))]
    pub async fn send_batch(
        &self,
        msgs: Vec<Box<dyn Msg>>,
        base_tx: &BaseTx,
    ) -> Result<Vec<TxResult>, BatchSendError> {
        if msgs.is_empty() {
            return Err(Error::empty_message_list().into());
        }

        for msg in &msgs {
            msg.validate_basic().map_err(BatchSendError::from)?;
        }
        debug!("messages validated");

        let max_tx_size = usize::from(self.config.max_tx_size);
        let mode = base_tx.mode.unwrap_or(self.config.broadcast_mode);

        // Serialize against other calls for this sender. Dropped on every
        // exit path below.
        let _guard = self.locker.lock(&base_tx.from).await;

        let mut committed: Vec<TxResult> = Vec::new();
        let mut remaining: &[Box<dyn Msg>] = &msgs;
        let mut batch = usize::from(self.config.max_msg_num);
        let mut try_count = 0u32;

        'resize: loop {
            let mut offset = 0;

            while offset < remaining.len() {
                let end = usize::min(offset + batch, remaining.len());
                let chunk = &remaining[offset..end];

                // A retry rebuilds the chunk so the signature covers the
                // freshly fetched account state.
                loop {
                    let (tx_bytes, builder, address) = match self.build_tx(chunk, base_tx).await {
                        Ok(built) => built,
                        Err(e) => return Err(BatchSendError::new(committed, e)),
                    };

                    if tx_bytes.len() > max_tx_size {
                        debug!(
                            batch,
                            size = tx_bytes.len(),
                            max = max_tx_size,
                            "tx is too large"
                        );

                        if batch == 1 {
                            // Shrinking cannot help a single message.
                            return Err(BatchSendError::new(
                                committed,
                                Error::oversized_message(tx_bytes.len(), max_tx_size),
                            ));
                        }

                        self.invalidate_account(&address);
                        // Repartition what has not been sent yet; committed
                        // batches are never resent.
                        remaining = &remaining[offset..];
                        batch /= 2;
                        continue 'resize;
                    }

                    match self
                        .broadcast_or_simulate(tx_bytes, &builder, mode, base_tx.simulate)
                        .await
                    {
                        Ok(result) => {
                            info!(
                                hash = %result.hash,
                                height = result.height,
                                "broadcast transaction success",
                            );
                            committed.push(result);
                            break;
                        }
                        Err(e) => {
                            self.invalidate_account(&address);
                            try_count += 1;

                            if try_count >= BROADCAST_TRY_THRESHOLD {
                                error!(try_count, "broadcast transaction failed: {}", e);
                                return Err(BatchSendError::new(committed, e));
                            }

                            warn!(
                                address = %address,
                                try_count,
                                "broadcast failed, retrying the batch: {}", e,
                            );
                            tokio::time::sleep(Duration::from_millis(BROADCAST_RETRY_DELAY))
                                .await;
                        }
                    }
                }

                offset = end;
            }

            break;
        }

        Ok(committed)
    }

    /// Resolve per-call options against the configuration and account
    /// state, producing a factory ready to build.
    async fn prepare(
        &self,
        key: KeyEntry,
        msgs: &[Box<dyn Msg>],
        base_tx: &BaseTx,
    ) -> Result<Factory, Error> {
        let mut factory = Factory::new(&self.config.id)
            .with_sign_mode(base_tx.sign_mode)
            .with_gas(self.config.gas)
            .with_memo(self.config.memo.clone());

        let sender = key.account.clone();

        // Explicit account state bypasses the cache entirely.
        let (account_number, sequence) = if base_tx.account_number != 0 && base_tx.sequence != 0 {
            (base_tx.account_number, base_tx.sequence)
        } else {
            let account = self.query_and_refresh_account(&sender).await?;
            (account.number.to_u64(), account.sequence.to_u64())
        };

        factory = factory.with_signer(SignerEntry {
            key,
            account_number,
            sequence,
        });

        // Co-signers required by the messages beyond the sender.
        for signer in collect_signers(msgs) {
            if signer.as_str() == sender {
                continue;
            }

            let key = self.keyring.key_by_account(signer.as_str()).map_err(Error::keyring)?;
            let account = self.query_and_refresh_account(signer.as_str()).await?;

            factory = factory.with_signer(SignerEntry {
                key,
                account_number: account.number.to_u64(),
                sequence: account.sequence.to_u64(),
            });
        }

        let fee = if !base_tx.fee.is_empty() && base_tx.fee.iter().all(|c| c.is_valid()) {
            to_min_coins(&base_tx.fee, &self.config.denoms)?
        } else {
            to_min_coins(&self.config.fee, &self.config.denoms)?
        };
        factory = factory.with_fee(fee);

        if base_tx.gas > 0 {
            factory = factory.with_gas(base_tx.gas);
        }

        if !base_tx.memo.is_empty() {
            let memo = Memo::new(base_tx.memo.clone()).map_err(Error::invalid_memo)?;
            factory = factory.with_memo(memo);
        }

        Ok(factory)
    }

    async fn build_tx(
        &self,
        msgs: &[Box<dyn Msg>],
        base_tx: &BaseTx,
    ) -> Result<(Vec<u8>, TxBuilder, String), Error> {
        let key = self.keyring.get_key(&base_tx.from).map_err(Error::keyring)?;
        let address = key.account.clone();

        let factory = self.prepare(key, msgs, base_tx).await?;
        let (tx_bytes, builder) = factory.build_and_sign(msgs)?;
        debug!("sign transaction success");

        Ok((tx_bytes, builder, address))
    }

    async fn broadcast_or_simulate(
        &self,
        tx_bytes: Vec<u8>,
        builder: &TxBuilder,
        mode: BroadcastMode,
        simulate: bool,
    ) -> Result<TxResult, Error> {
        if simulate {
            let gas_info = self.transport.simulate_tx(builder.tx()).await?;
            debug!(gas_used = gas_info.gas_used, "tx simulation succeeded");

            return Ok(TxResult {
                gas_wanted: gas_info.gas_wanted as i64,
                gas_used: gas_info.gas_used as i64,
                ..TxResult::default()
            });
        }

        self.transport.broadcast_tx(tx_bytes, mode).await
    }
}

/// Uppercase hex SHA-256 over signed transaction bytes, the form chains
/// index transactions under.
pub fn tx_hash(tx_bytes: &[u8]) -> String {
    hex::encode_upper(Sha256::digest(tx_bytes))
}
