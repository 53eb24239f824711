//! Client configuration for a single chain.

pub mod types;

use http::Uri;
use serde_derive::{Deserialize, Serialize};

use crate::coin::{DecCoin, DenomMetadata};
use crate::error::Error;
use crate::tx::types::BroadcastMode;

pub use types::{LockShards, MaxMsgNum, MaxTxSize, Memo};

/// Defaults for various fields
pub mod default {
    use super::*;

    pub fn gas() -> u64 {
        200_000
    }

    pub fn fee() -> Vec<DecCoin> {
        vec![DecCoin::new("uvrd", "2000")]
    }

    pub fn denoms() -> Vec<DenomMetadata> {
        vec![DenomMetadata::new("uvrd", "vrd", 6)]
    }

    pub fn account_cache_ttl_secs() -> u64 {
        60
    }

    pub fn account_cache_capacity() -> u64 {
        100
    }
}

/// Per-chain client configuration.
///
/// Everything a [`ChainClient`](crate::client::ChainClient) needs to talk to
/// one chain: endpoint, address encoding, fee defaults, and the engine
/// tunables (batch ceiling, tx size cap, lock table width, cache lifetime).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChainConfig {
    /// Chain identifier, e.g. `veridian-1`. Signed over in every transaction.
    pub id: String,

    /// gRPC endpoint of a full node, e.g. `http://localhost:9090`.
    pub grpc_addr: String,

    /// Bech32 human-readable prefix for account addresses.
    pub account_prefix: String,

    /// Default gas limit when `BaseTx.gas` is zero.
    #[serde(default = "default::gas")]
    pub gas: u64,

    /// Default fee when `BaseTx.fee` is empty or invalid. May be expressed
    /// in display units; it is converted to minimum units per build.
    #[serde(default = "default::fee")]
    pub fee: Vec<DecCoin>,

    /// Default memo attached when `BaseTx.memo` is empty.
    #[serde(default)]
    pub memo: Memo,

    /// Default broadcast mode when `BaseTx.mode` is unset.
    #[serde(default)]
    pub broadcast_mode: BroadcastMode,

    /// Known denominations and their display/base unit relationship.
    #[serde(default = "default::denoms")]
    pub denoms: Vec<DenomMetadata>,

    #[serde(default)]
    pub max_msg_num: MaxMsgNum,

    #[serde(default)]
    pub max_tx_size: MaxTxSize,

    #[serde(default)]
    pub lock_shards: LockShards,

    #[serde(default = "default::account_cache_ttl_secs")]
    pub account_cache_ttl_secs: u64,

    #[serde(default = "default::account_cache_capacity")]
    pub account_cache_capacity: u64,
}

impl ChainConfig {
    /// Check the parts serde cannot: the endpoint URI, prefix, and denom
    /// registry coherence.
    pub fn validate(&self) -> Result<(), Error> {
        if self.id.is_empty() {
            return Err(Error::config("chain id must not be empty".to_string()));
        }

        self.grpc_addr
            .parse::<Uri>()
            .map_err(|e| Error::invalid_uri(self.grpc_addr.clone(), e))?;

        if self.account_prefix.is_empty() {
            return Err(Error::config(
                "account prefix must not be empty".to_string(),
            ));
        }

        if self.denoms.is_empty() {
            return Err(Error::config(
                "at least one denomination must be registered".to_string(),
            ));
        }

        for d in &self.denoms {
            d.validate()?;
        }

        Ok(())
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            id: "veridian-1".to_string(),
            grpc_addr: "http://localhost:9090".to_string(),
            account_prefix: "vrd".to_string(),
            gas: default::gas(),
            fee: default::fee(),
            memo: Memo::default(),
            broadcast_mode: BroadcastMode::default(),
            denoms: default::denoms(),
            max_msg_num: MaxMsgNum::default(),
            max_tx_size: MaxTxSize::default(),
            lock_shards: LockShards::default(),
            account_cache_ttl_secs: default::account_cache_ttl_secs(),
            account_cache_capacity: default::account_cache_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let config: ChainConfig = serde_json::from_str(
            r#"{
                "id": "veridian-1",
                "grpc_addr": "http://localhost:9090",
                "account_prefix": "vrd"
            }"#,
        )
        .expect("could not parse config");

        assert_eq!(config.gas, 200_000);
        assert_eq!(usize::from(config.max_msg_num), 100);
        assert_eq!(config.account_cache_ttl_secs, 60);
        config.validate().expect("default config must validate");
    }

    #[test]
    fn reject_bad_grpc_addr() {
        let config = ChainConfig {
            grpc_addr: "not a uri at all \u{7f}".to_string(),
            ..ChainConfig::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_oversized_memo() {
        let res = serde_json::from_str::<ChainConfig>(&format!(
            r#"{{
                "id": "veridian-1",
                "grpc_addr": "http://localhost:9090",
                "account_prefix": "vrd",
                "memo": "{}"
            }}"#,
            "m".repeat(64),
        ));

        assert!(res.is_err());
    }
}
