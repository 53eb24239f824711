//! Canonical sign bytes for each supported sign mode.

use ibc_proto::cosmos::tx::v1beta1::SignDoc;
use prost::Message;
use serde_derive::Serialize;
use serde_json::json;

use crate::error::Error;
use crate::msg::Msg;
use crate::tx::builder::TxBuilder;
use crate::tx::types::SignMode;

/// Metadata identifying the signer a sign doc is produced for.
#[derive(Clone, Debug)]
pub struct SignerData {
    pub address: String,
    pub chain_id: String,
    pub account_number: u64,
    pub sequence: u64,
}

/// Canonical bytes for `signer` to sign over the current draft.
///
/// Deterministic given the mode, the signer metadata and the builder
/// contents, so independent signers of the same draft produce mutually
/// verifiable signatures.
pub fn sign_bytes(
    mode: SignMode,
    signer: &SignerData,
    msgs: &[Box<dyn Msg>],
    builder: &mut TxBuilder,
) -> Result<Vec<u8>, Error> {
    match mode {
        SignMode::Direct => direct_sign_bytes(signer, builder),
        SignMode::LegacyAminoJson => amino_sign_bytes(signer, msgs, builder),
    }
}

fn direct_sign_bytes(signer: &SignerData, builder: &mut TxBuilder) -> Result<Vec<u8>, Error> {
    let sign_doc = SignDoc {
        body_bytes: builder.body_bytes()?,
        auth_info_bytes: builder.auth_info_bytes()?,
        chain_id: signer.chain_id.clone(),
        account_number: signer.account_number,
    };

    // A protobuf serialization of a SignDoc
    let mut signdoc_buf = Vec::new();
    Message::encode(&sign_doc, &mut signdoc_buf)
        .map_err(|e| Error::protobuf_encode("SignDoc".to_string(), e))?;

    Ok(signdoc_buf)
}

/// Legacy amino sign doc.
///
/// Field names are serialized in lexicographic order and all integers are
/// strings, matching the canonical JSON the chain verifies against.
#[derive(Serialize)]
struct StdSignDoc {
    account_number: String,
    chain_id: String,
    fee: StdFee,
    memo: String,
    msgs: Vec<serde_json::Value>,
    sequence: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_height: Option<String>,
}

#[derive(Serialize)]
struct StdFee {
    amount: Vec<serde_json::Value>,
    gas: String,
}

fn amino_sign_bytes(
    signer: &SignerData,
    msgs: &[Box<dyn Msg>],
    builder: &mut TxBuilder,
) -> Result<Vec<u8>, Error> {
    let amount = builder
        .fee_amount()
        .iter()
        .map(|coin| json!({ "amount": coin.amount, "denom": coin.denom }))
        .collect();

    let msgs = msgs
        .iter()
        .map(|msg| msg.to_amino_json())
        .collect::<Result<Vec<_>, _>>()?;

    let doc = StdSignDoc {
        account_number: signer.account_number.to_string(),
        chain_id: signer.chain_id.clone(),
        fee: StdFee {
            amount,
            gas: builder.gas().to_string(),
        },
        memo: builder.memo().to_string(),
        msgs,
        sequence: signer.sequence.to_string(),
        timeout_height: match builder.timeout_height() {
            0 => None,
            height => Some(height.to_string()),
        },
    };

    serde_json::to_vec(&doc).map_err(|e| Error::json("StdSignDoc".to_string(), e))
}
