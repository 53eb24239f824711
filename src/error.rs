//! Errors raised by the SDK.

use flex_error::{define_error, TraceError};
use http::uri::InvalidUri;
use prost::{DecodeError, EncodeError};

use crate::keyring::errors::Error as KeyringError;

define_error! {
    Error {
        Config
            { reason: String }
            |e| { format!("invalid configuration: {}", e.reason) },

        InvalidUri
            { uri: String }
            [ TraceError<InvalidUri> ]
            |e| { format!("could not parse gRPC address as a valid URI: {}", e.uri) },

        EmptyMessageList
            |_| { "must have at least one message in list" },

        MessageValidation
            { type_url: String, reason: String }
            |e| { format!("message {} failed validation: {}", e.type_url, e.reason) },

        InvalidAddress
            { address: String, reason: String }
            |e| { format!("invalid account address {}: {}", e.address, e.reason) },

        InvalidCoin
            { coin: String, reason: String }
            |e| { format!("invalid coin \"{}\": {}", e.coin, e.reason) },

        UnknownDenom
            { denom: String }
            |e| { format!("denomination {} is not registered for this chain", e.denom) },

        InvalidMemo
            { reason: String }
            |e| { format!("invalid memo: {}", e.reason) },

        Keyring
            [ KeyringError ]
            |_| { "keyring error" },

        MissingSignerKey
            { address: String }
            |e| { format!("no key in the keyring for signer address {}", e.address) },

        InvalidSignatureData
            { reason: String }
            |e| { format!("malformed signature data: {}", e.reason) },

        InvalidPublicKey
            { type_url: String }
            |e| { format!("cannot decode public key of unknown protobuf type: {}", e.type_url) },

        TxSizeExceeded
            { size: usize, max: usize }
            |e| {
                format!("transaction of {} bytes exceeds the maximum transaction size of {} bytes",
                    e.size, e.max)
            },

        OversizedMessage
            { size: usize, max: usize }
            |e| {
                format!("a single message encodes to {} bytes, larger than the maximum transaction size of {} bytes; it can never be broadcast",
                    e.size, e.max)
            },

        Broadcast
            { code: u32, log: String, hash: String }
            |e| { format!("broadcast failed with code {}: {}", e.code, e.log) },

        EmptyBroadcastResponse
            |_| { "node returned an empty broadcast response" },

        EmptySimulateGas
            |_| { "simulation response carried no gas info" },

        GrpcStatus
            { status: tonic::Status, query: String }
            |e| { format!("gRPC call `{}` failed with status: {}", e.query, e.status) },

        GrpcTransport
            [ TraceError<tonic::transport::Error> ]
            |_| { "error in underlying transport when making gRPC call" },

        EmptyQueryAccount
            { address: String }
            |e| { format!("Query/Account RPC returned an empty account for address: {}", e.address) },

        UnknownAccountType
            { type_url: String }
            |e| { format!("failed to deserialize account of an unknown protobuf type: {}", e.type_url) },

        EmptyBaseAccount
            |_| { "empty BaseAccount within EthAccount" },

        ProtobufDecode
            { payload_type: String }
            [ TraceError<DecodeError> ]
            |e| { format!("error decoding protocol buffer for {}", e.payload_type) },

        ProtobufEncode
            { payload_type: String }
            [ TraceError<EncodeError> ]
            |e| { format!("error encoding protocol buffer for {}", e.payload_type) },

        Json
            { payload_type: String }
            [ TraceError<serde_json::Error> ]
            |e| { format!("error encoding {} as canonical JSON", e.payload_type) },
    }
}

impl Error {
    /// Whether a failed broadcast may be retried with a refreshed account.
    ///
    /// Size overflows and validation failures are deterministic and must
    /// not be retried; everything that reached the wire may be transient.
    pub fn is_retryable_broadcast(&self) -> bool {
        matches!(
            self.detail(),
            ErrorDetail::Broadcast(_)
                | ErrorDetail::EmptyBroadcastResponse(_)
                | ErrorDetail::GrpcStatus(_)
                | ErrorDetail::GrpcTransport(_)
        )
    }
}
