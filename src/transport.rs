//! Network boundary: account queries, broadcast and simulation.

use async_trait::async_trait;
use http::uri::Uri;
use ibc_proto::cosmos::auth::v1beta1::query_client::QueryClient;
use ibc_proto::cosmos::auth::v1beta1::{BaseAccount, EthAccount, QueryAccountRequest};
use ibc_proto::cosmos::tx::v1beta1::service_client::ServiceClient;
use ibc_proto::cosmos::tx::v1beta1::{BroadcastTxRequest, SimulateRequest, Tx};
use prost::Message;
use tracing::debug;

use crate::account::Account;
use crate::config::ChainConfig;
use crate::error::Error;
use crate::tx::types::{BroadcastMode, GasInfo, TxResult};

/// Everything the client needs from a node.
///
/// The engine talks to the chain exclusively through this trait, which lets
/// tests drive it with a scripted in-memory implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the current account number and sequence for `address`.
    async fn query_account(&self, address: &str) -> Result<Account, Error>;

    /// Submit signed transaction bytes under the given broadcast mode.
    ///
    /// A response carrying a non-zero code is reported as an error, not as
    /// a result.
    async fn broadcast_tx(
        &self,
        tx_bytes: Vec<u8>,
        mode: BroadcastMode,
    ) -> Result<TxResult, Error>;

    /// Run the transaction through the node's simulator and report the gas
    /// it consumed.
    async fn simulate_tx(&self, tx: Tx) -> Result<GasInfo, Error>;
}

/// gRPC transport against a full node. Connections are established per call.
#[derive(Clone, Debug)]
pub struct GrpcTransport {
    grpc_addr: Uri,
}

impl GrpcTransport {
    pub fn new(grpc_addr: Uri) -> Self {
        Self { grpc_addr }
    }

    pub fn from_config(config: &ChainConfig) -> Result<Self, Error> {
        let grpc_addr = config
            .grpc_addr
            .parse::<Uri>()
            .map_err(|e| Error::invalid_uri(config.grpc_addr.clone(), e))?;

        Ok(Self::new(grpc_addr))
    }
}

#[async_trait]
impl Transport for GrpcTransport {
    async fn query_account(&self, address: &str) -> Result<Account, Error> {
        debug!(address = %address, "querying account");

        let mut client = QueryClient::connect(self.grpc_addr.clone())
            .await
            .map_err(Error::grpc_transport)?;

        let request = tonic::Request::new(QueryAccountRequest {
            address: address.to_string(),
        });

        let response = client.account(request).await;

        // Querying for an account might fail, i.e. if the account doesn't actually exist
        let resp_account = match response
            .map_err(|e| Error::grpc_status(e, "query_account".to_owned()))?
            .into_inner()
            .account
        {
            Some(account) => account,
            None => return Err(Error::empty_query_account(address.to_string())),
        };

        let base_account = if resp_account.type_url == "/cosmos.auth.v1beta1.BaseAccount" {
            BaseAccount::decode(resp_account.value.as_slice())
                .map_err(|e| Error::protobuf_decode("BaseAccount".to_string(), e))?
        } else if resp_account.type_url.ends_with(".EthAccount") {
            EthAccount::decode(resp_account.value.as_slice())
                .map_err(|e| Error::protobuf_decode("EthAccount".to_string(), e))?
                .base_account
                .ok_or_else(Error::empty_base_account)?
        } else {
            return Err(Error::unknown_account_type(resp_account.type_url));
        };

        Ok(base_account.into())
    }

    async fn broadcast_tx(
        &self,
        tx_bytes: Vec<u8>,
        mode: BroadcastMode,
    ) -> Result<TxResult, Error> {
        debug!(size = tx_bytes.len(), mode = %mode, "broadcasting tx");

        let mut client = ServiceClient::connect(self.grpc_addr.clone())
            .await
            .map_err(Error::grpc_transport)?;

        let request = tonic::Request::new(BroadcastTxRequest {
            tx_bytes,
            mode: mode.to_proto(),
        });

        let response = client
            .broadcast_tx(request)
            .await
            .map_err(|e| Error::grpc_status(e, "broadcast_tx".to_owned()))?
            .into_inner();

        let tx_response = response
            .tx_response
            .ok_or_else(Error::empty_broadcast_response)?;

        if tx_response.code != 0 {
            return Err(Error::broadcast(
                tx_response.code,
                tx_response.raw_log,
                tx_response.txhash,
            ));
        }

        Ok(tx_response.into())
    }

    async fn simulate_tx(&self, tx: Tx) -> Result<GasInfo, Error> {
        let mut tx_bytes = vec![];
        Message::encode(&tx, &mut tx_bytes)
            .map_err(|e| Error::protobuf_encode("Transaction".to_string(), e))?;

        debug!(size = tx_bytes.len(), "simulating tx");

        let req = SimulateRequest {
            tx_bytes,
            ..Default::default()
        };

        let mut client = ServiceClient::connect(self.grpc_addr.clone())
            .await
            .map_err(Error::grpc_transport)?;

        let response = client
            .simulate(tonic::Request::new(req))
            .await
            .map_err(|e| Error::grpc_status(e, "simulate".to_owned()))?
            .into_inner();

        let gas_info = response.gas_info.ok_or_else(Error::empty_simulate_gas)?;

        Ok(gas_info.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_addresses_parse_into_transports() {
        let config = ChainConfig::default();
        assert!(GrpcTransport::from_config(&config).is_ok());

        let config = ChainConfig {
            grpc_addr: "not a uri at all \u{7f}".to_string(),
            ..ChainConfig::default()
        };
        assert!(GrpcTransport::from_config(&config).is_err());
    }
}
