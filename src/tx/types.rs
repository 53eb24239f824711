//! Per-call transaction options and broadcast results.

use core::fmt;

use ibc_proto::cosmos::base::abci::v1beta1::{GasInfo as RawGasInfo, TxResponse};
use serde_derive::{Deserialize, Serialize};

use crate::coin::DecCoin;

/// How a signed transaction is handed to the node.
///
/// `Sync` waits for `CheckTx`, `Async` returns immediately and `Commit`
/// blocks until the transaction is included in a block.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastMode {
    Sync,
    Async,
    Commit,
}

impl BroadcastMode {
    /// Wire value of `cosmos.tx.v1beta1.BroadcastMode`.
    pub fn to_proto(self) -> i32 {
        match self {
            Self::Commit => 1,
            Self::Sync => 2,
            Self::Async => 3,
        }
    }
}

impl Default for BroadcastMode {
    fn default() -> Self {
        Self::Sync
    }
}

impl fmt::Display for BroadcastMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync => write!(f, "sync"),
            Self::Async => write!(f, "async"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

/// Scheme used to produce the bytes a signer commits to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SignMode {
    /// Protobuf `SignDoc` signing, the default.
    Direct,
    /// Canonical JSON signing for ledger-style signers.
    LegacyAminoJson,
}

impl SignMode {
    /// Wire value of `cosmos.tx.signing.v1beta1.SignMode`.
    pub fn to_proto(self) -> i32 {
        match self {
            Self::Direct => 1,
            Self::LegacyAminoJson => 127,
        }
    }
}

impl Default for SignMode {
    fn default() -> Self {
        Self::Direct
    }
}

impl fmt::Display for SignMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::LegacyAminoJson => write!(f, "legacy-amino-json"),
        }
    }
}

/// Per-call sending options.
///
/// Only `from` is required; everything left at its default is filled in
/// from the chain configuration when the transaction is prepared.
#[derive(Clone, Debug, Default)]
pub struct BaseTx {
    /// Name of the signing key in the keyring.
    pub from: String,

    /// Fee to pay, in base or display denomination. Empty means the
    /// configured default fee.
    pub fee: Vec<DecCoin>,

    /// Gas limit. Zero means the configured default.
    pub gas: u64,

    /// Transaction memo. Empty means the configured memo.
    pub memo: String,

    /// Broadcast mode override.
    pub mode: Option<BroadcastMode>,

    pub sign_mode: SignMode,

    /// Run the built transaction through the node's simulator instead of
    /// broadcasting it; the result reports the gas consumed.
    pub simulate: bool,

    /// Explicit account number. Together with a non-zero `sequence` this
    /// bypasses the account cache entirely.
    pub account_number: u64,

    /// Explicit sequence, see `account_number`.
    pub sequence: u64,
}

impl BaseTx {
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            ..Default::default()
        }
    }

    pub fn with_fee(mut self, fee: Vec<DecCoin>) -> Self {
        self.fee = fee;
        self
    }

    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = gas;
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn with_mode(mut self, mode: BroadcastMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_sign_mode(mut self, sign_mode: SignMode) -> Self {
        self.sign_mode = sign_mode;
        self
    }

    pub fn with_simulate(mut self, simulate: bool) -> Self {
        self.simulate = simulate;
        self
    }

    pub fn with_account(mut self, account_number: u64, sequence: u64) -> Self {
        self.account_number = account_number;
        self.sequence = sequence;
        self
    }
}

/// Outcome of a broadcast transaction, reduced to the fields callers act on.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    pub hash: String,
    pub height: i64,
    pub code: u32,
    pub raw_log: String,
    pub gas_wanted: i64,
    pub gas_used: i64,
}

impl From<TxResponse> for TxResult {
    fn from(resp: TxResponse) -> Self {
        Self {
            hash: resp.txhash,
            height: resp.height,
            code: resp.code,
            raw_log: resp.raw_log,
            gas_wanted: resp.gas_wanted,
            gas_used: resp.gas_used,
        }
    }
}

/// Gas consumption reported by a simulation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasInfo {
    pub gas_wanted: u64,
    pub gas_used: u64,
}

impl From<RawGasInfo> for GasInfo {
    fn from(info: RawGasInfo) -> Self {
        Self {
            gas_wanted: info.gas_wanted,
            gas_used: info.gas_used,
        }
    }
}
