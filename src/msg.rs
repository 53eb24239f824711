//! The message abstraction every module-level transaction payload implements.

use ibc_proto::google::protobuf::Any;
use prost::Message;
use serde_json::Value;

use crate::address::AccAddress;
use crate::error::Error;

/// A unit of intent carried inside a transaction body.
///
/// Implementations self-validate, name their required signers, and provide
/// both wire encodings: a protobuf [`Any`] for the transaction body and the
/// legacy amino JSON envelope used by `SIGN_MODE_LEGACY_AMINO_JSON`.
/// Messages are treated as immutable once validated.
pub trait Msg: Send + Sync {
    /// Module routing key, e.g. `bank`.
    fn route(&self) -> &'static str;

    /// Protobuf type URL, e.g. `/cosmos.bank.v1beta1.MsgSend`.
    fn type_url(&self) -> &'static str;

    /// Stateless validity checks. Must pass before any network interaction.
    fn validate_basic(&self) -> Result<(), Error>;

    /// Addresses that must sign a transaction carrying this message.
    ///
    /// A message with no signers cannot be valid.
    fn signers(&self) -> Vec<AccAddress>;

    fn to_any(&self) -> Result<Any, Error>;

    /// The amino envelope `{"type": ..., "value": ...}`.
    fn to_amino_json(&self) -> Result<Value, Error>;
}

/// Pack a prost message into an [`Any`] under the given type URL.
pub fn encode_to_any<M: Message>(type_url: &str, msg: &M) -> Result<Any, Error> {
    let mut value = Vec::new();
    Message::encode(msg, &mut value)
        .map_err(|e| Error::protobuf_encode(type_url.to_string(), e))?;

    Ok(Any {
        type_url: type_url.to_string(),
        value,
    })
}

/// Signer addresses across all messages, de-duplicated in first-seen order.
///
/// This order defines the positional alignment of signer infos and raw
/// signatures for the whole transaction.
pub fn collect_signers(msgs: &[Box<dyn Msg>]) -> Vec<AccAddress> {
    let mut signers: Vec<AccAddress> = Vec::new();
    for msg in msgs {
        for signer in msg.signers() {
            if !signers.contains(&signer) {
                signers.push(signer);
            }
        }
    }
    signers
}
