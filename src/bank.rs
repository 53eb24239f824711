//! Bank module messages: plain and multi-party coin transfers.

use std::collections::BTreeMap;

use ibc_proto::cosmos::bank::v1beta1::{
    Input as RawInput, MsgMultiSend as RawMsgMultiSend, MsgSend as RawMsgSend,
    Output as RawOutput,
};
use ibc_proto::google::protobuf::Any;
use serde_json::{json, Value};

use crate::address::AccAddress;
use crate::coin::Coin;
use crate::error::Error;
use crate::msg::{encode_to_any, Msg};

pub const TYPE_URL_MSG_SEND: &str = "/cosmos.bank.v1beta1.MsgSend";
pub const TYPE_URL_MSG_MULTI_SEND: &str = "/cosmos.bank.v1beta1.MsgMultiSend";

const AMINO_TYPE_MSG_SEND: &str = "cosmos-sdk/MsgSend";
const AMINO_TYPE_MSG_MULTI_SEND: &str = "cosmos-sdk/MsgMultiSend";

/// Transfer of coins from a single sender to a single recipient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsgSend {
    pub from_address: AccAddress,
    pub to_address: AccAddress,
    pub amount: Vec<Coin>,
}

impl MsgSend {
    pub fn new(from_address: AccAddress, to_address: AccAddress, amount: Vec<Coin>) -> Self {
        Self {
            from_address,
            to_address,
            amount,
        }
    }
}

impl Msg for MsgSend {
    fn route(&self) -> &'static str {
        "bank"
    }

    fn type_url(&self) -> &'static str {
        TYPE_URL_MSG_SEND
    }

    fn validate_basic(&self) -> Result<(), Error> {
        validate_coins(TYPE_URL_MSG_SEND, &self.amount)
    }

    fn signers(&self) -> Vec<AccAddress> {
        vec![self.from_address.clone()]
    }

    fn to_any(&self) -> Result<Any, Error> {
        let raw = RawMsgSend {
            from_address: self.from_address.to_string(),
            to_address: self.to_address.to_string(),
            amount: self.amount.iter().map(Coin::to_proto).collect(),
        };
        encode_to_any(TYPE_URL_MSG_SEND, &raw)
    }

    fn to_amino_json(&self) -> Result<Value, Error> {
        Ok(json!({
            "type": AMINO_TYPE_MSG_SEND,
            "value": {
                "amount": self.amount.iter().map(Coin::to_amino_json).collect::<Vec<_>>(),
                "from_address": self.from_address.to_string(),
                "to_address": self.to_address.to_string(),
            }
        }))
    }
}

/// One funding leg of a multi-send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Input {
    pub address: AccAddress,
    pub coins: Vec<Coin>,
}

/// One receiving leg of a multi-send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Output {
    pub address: AccAddress,
    pub coins: Vec<Coin>,
}

/// Atomic transfer with multiple funding and receiving legs.
///
/// Every input address is a required signer, and the per-denom totals on
/// both sides must match exactly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsgMultiSend {
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
}

impl MsgMultiSend {
    pub fn new(inputs: Vec<Input>, outputs: Vec<Output>) -> Self {
        Self { inputs, outputs }
    }
}

impl Msg for MsgMultiSend {
    fn route(&self) -> &'static str {
        "bank"
    }

    fn type_url(&self) -> &'static str {
        TYPE_URL_MSG_MULTI_SEND
    }

    fn validate_basic(&self) -> Result<(), Error> {
        if self.inputs.is_empty() {
            return Err(Error::message_validation(
                TYPE_URL_MSG_MULTI_SEND.to_string(),
                "no inputs".to_string(),
            ));
        }
        if self.outputs.is_empty() {
            return Err(Error::message_validation(
                TYPE_URL_MSG_MULTI_SEND.to_string(),
                "no outputs".to_string(),
            ));
        }

        let mut in_totals: BTreeMap<&str, u128> = BTreeMap::new();
        for input in &self.inputs {
            validate_coins(TYPE_URL_MSG_MULTI_SEND, &input.coins)?;
            accumulate(TYPE_URL_MSG_MULTI_SEND, &mut in_totals, &input.coins)?;
        }

        let mut out_totals: BTreeMap<&str, u128> = BTreeMap::new();
        for output in &self.outputs {
            validate_coins(TYPE_URL_MSG_MULTI_SEND, &output.coins)?;
            accumulate(TYPE_URL_MSG_MULTI_SEND, &mut out_totals, &output.coins)?;
        }

        if in_totals != out_totals {
            return Err(Error::message_validation(
                TYPE_URL_MSG_MULTI_SEND.to_string(),
                "sum of inputs does not equal sum of outputs".to_string(),
            ));
        }

        Ok(())
    }

    fn signers(&self) -> Vec<AccAddress> {
        self.inputs.iter().map(|i| i.address.clone()).collect()
    }

    fn to_any(&self) -> Result<Any, Error> {
        let raw = RawMsgMultiSend {
            inputs: self
                .inputs
                .iter()
                .map(|i| RawInput {
                    address: i.address.to_string(),
                    coins: i.coins.iter().map(Coin::to_proto).collect(),
                })
                .collect(),
            outputs: self
                .outputs
                .iter()
                .map(|o| RawOutput {
                    address: o.address.to_string(),
                    coins: o.coins.iter().map(Coin::to_proto).collect(),
                })
                .collect(),
        };
        encode_to_any(TYPE_URL_MSG_MULTI_SEND, &raw)
    }

    fn to_amino_json(&self) -> Result<Value, Error> {
        let inputs: Vec<Value> = self
            .inputs
            .iter()
            .map(|i| {
                json!({
                    "address": i.address.to_string(),
                    "coins": i.coins.iter().map(Coin::to_amino_json).collect::<Vec<_>>(),
                })
            })
            .collect();

        let outputs: Vec<Value> = self
            .outputs
            .iter()
            .map(|o| {
                json!({
                    "address": o.address.to_string(),
                    "coins": o.coins.iter().map(Coin::to_amino_json).collect::<Vec<_>>(),
                })
            })
            .collect();

        Ok(json!({
            "type": AMINO_TYPE_MSG_MULTI_SEND,
            "value": {
                "inputs": inputs,
                "outputs": outputs,
            }
        }))
    }
}

fn validate_coins(type_url: &str, coins: &[Coin]) -> Result<(), Error> {
    if coins.is_empty() {
        return Err(Error::message_validation(
            type_url.to_string(),
            "empty coin list".to_string(),
        ));
    }

    let mut seen: Vec<&str> = Vec::new();
    for coin in coins {
        coin.validate()
            .map_err(|e| Error::message_validation(type_url.to_string(), e))?;
        if seen.contains(&coin.denom.as_str()) {
            return Err(Error::message_validation(
                type_url.to_string(),
                format!("duplicate denom {}", coin.denom),
            ));
        }
        seen.push(&coin.denom);
    }

    Ok(())
}

fn accumulate<'a>(
    type_url: &str,
    totals: &mut BTreeMap<&'a str, u128>,
    coins: &'a [Coin],
) -> Result<(), Error> {
    for coin in coins {
        let entry = totals.entry(&coin.denom).or_insert(0);
        *entry = entry.checked_add(coin.amount).ok_or_else(|| {
            Error::message_validation(
                type_url.to_string(),
                format!("amount overflow for denom {}", coin.denom),
            )
        })?;
    }
    Ok(())
}
