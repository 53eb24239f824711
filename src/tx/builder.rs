//! Mutable accumulator for a transaction under construction.

use ibc_proto::cosmos::base::v1beta1::Coin as RawCoin;
use ibc_proto::cosmos::tx::v1beta1::{AuthInfo, Fee, SignerInfo, Tx, TxBody, TxRaw};
use ibc_proto::google::protobuf::Any;
use prost::Message;

use crate::address::AccAddress;
use crate::coin::Coin;
use crate::config::Memo;
use crate::error::Error;
use crate::msg::{collect_signers, Msg};
use crate::tx::signature::{PublicKey, SignatureData, SignatureV2};

/// Accumulates body, auth info and signatures, and hands out the protobuf
/// serializations of the first two.
///
/// The body and auth info encodings are memoized and every mutator touching
/// them drops the cached form, so repeated signing rounds over the same
/// draft do not re-encode.
#[derive(Clone, Debug, Default)]
pub struct TxBuilder {
    body: TxBody,
    auth_info: AuthInfo,
    signatures: Vec<Vec<u8>>,
    signers: Vec<AccAddress>,
    body_bytes: Option<Vec<u8>>,
    auth_info_bytes: Option<Vec<u8>>,
}

impl TxBuilder {
    pub fn new() -> Self {
        Self {
            auth_info: AuthInfo {
                signer_infos: Vec::new(),
                fee: Some(Fee::default()),

                // Since Cosmos SDK v0.46.0
                tip: None,
            },
            ..Default::default()
        }
    }

    /// Set the message list and derive the signer set from it.
    ///
    /// Signers are the message signer addresses de-duplicated in first-seen
    /// order; this order fixes the positional alignment of signer infos and
    /// raw signatures.
    pub fn set_msgs(&mut self, msgs: &[Box<dyn Msg>]) -> Result<(), Error> {
        let mut messages = Vec::with_capacity(msgs.len());
        for msg in msgs {
            messages.push(msg.to_any()?);
        }

        self.body.messages = messages;
        self.signers = collect_signers(msgs);
        self.body_bytes = None;

        Ok(())
    }

    pub fn set_memo(&mut self, memo: &Memo) {
        self.body.memo = memo.to_string();
        self.body_bytes = None;
    }

    pub fn set_timeout_height(&mut self, timeout_height: u64) {
        self.body.timeout_height = timeout_height;
        self.body_bytes = None;
    }

    pub fn set_extension_options(&mut self, options: Vec<Any>) {
        self.body.extension_options = options;
        self.body_bytes = None;
    }

    pub fn set_non_critical_extension_options(&mut self, options: Vec<Any>) {
        self.body.non_critical_extension_options = options;
        self.body_bytes = None;
    }

    pub fn set_gas_limit(&mut self, gas_limit: u64) {
        self.fee_mut().gas_limit = gas_limit;
        self.auth_info_bytes = None;
    }

    pub fn set_fee_amount(&mut self, amount: &[Coin]) {
        self.fee_mut().amount = amount.iter().map(Coin::to_proto).collect();
        self.auth_info_bytes = None;
    }

    pub fn set_fee_payer(&mut self, payer: &str) {
        self.fee_mut().payer = payer.to_string();
        self.auth_info_bytes = None;
    }

    pub fn set_fee_granter(&mut self, granter: &str) {
        self.fee_mut().granter = granter.to_string();
        self.auth_info_bytes = None;
    }

    /// Install one signature per discovered signer, positionally aligned.
    ///
    /// Calling this with a count that does not match the signer set is a
    /// defect in the calling code, not a runtime condition.
    pub fn set_signatures(&mut self, signatures: Vec<SignatureV2>) -> Result<(), Error> {
        assert_eq!(
            signatures.len(),
            self.signers.len(),
            "got {} signatures for {} signers",
            signatures.len(),
            self.signers.len(),
        );

        let mut signer_infos = Vec::with_capacity(signatures.len());
        let mut raw_signatures = Vec::with_capacity(signatures.len());

        for sig in &signatures {
            signer_infos.push(SignerInfo {
                public_key: Some(sig.public_key.to_any()?),
                mode_info: Some(sig.data.mode_info()),
                sequence: sig.sequence,
            });
            raw_signatures.push(sig.data.to_raw_bytes()?);
        }

        self.auth_info.signer_infos = signer_infos;
        self.signatures = raw_signatures;
        self.auth_info_bytes = None;

        Ok(())
    }

    pub fn signers(&self) -> &[AccAddress] {
        &self.signers
    }

    pub fn msgs(&self) -> &[Any] {
        &self.body.messages
    }

    pub fn memo(&self) -> &str {
        &self.body.memo
    }

    pub fn timeout_height(&self) -> u64 {
        self.body.timeout_height
    }

    pub fn fee(&self) -> Option<&Fee> {
        self.auth_info.fee.as_ref()
    }

    pub fn gas(&self) -> u64 {
        self.fee().map(|fee| fee.gas_limit).unwrap_or(0)
    }

    pub fn signatures(&self) -> &[Vec<u8>] {
        &self.signatures
    }

    /// Structured view over the installed signatures.
    pub fn signatures_v2(&self) -> Result<Vec<SignatureV2>, Error> {
        self.auth_info
            .signer_infos
            .iter()
            .zip(self.signatures.iter())
            .map(|(info, raw)| {
                let pk_any = info.public_key.as_ref().ok_or_else(|| {
                    Error::invalid_signature_data("signer info has no public key".to_string())
                })?;
                let mode_info = info.mode_info.as_ref().ok_or_else(|| {
                    Error::invalid_signature_data("signer info has no mode info".to_string())
                })?;

                Ok(SignatureV2 {
                    public_key: PublicKey::try_from(pk_any)?,
                    data: SignatureData::from_parts(mode_info, raw)?,
                    sequence: info.sequence,
                })
            })
            .collect()
    }

    /// Protobuf serialization of the body, memoized until the next body
    /// mutation.
    pub fn body_bytes(&mut self) -> Result<Vec<u8>, Error> {
        if let Some(bytes) = &self.body_bytes {
            return Ok(bytes.clone());
        }

        let mut buf = Vec::new();
        Message::encode(&self.body, &mut buf)
            .map_err(|e| Error::protobuf_encode("TxBody".to_string(), e))?;

        self.body_bytes = Some(buf.clone());
        Ok(buf)
    }

    /// Protobuf serialization of the auth info, memoized until the next
    /// auth info mutation.
    pub fn auth_info_bytes(&mut self) -> Result<Vec<u8>, Error> {
        if let Some(bytes) = &self.auth_info_bytes {
            return Ok(bytes.clone());
        }

        let mut buf = Vec::new();
        Message::encode(&self.auth_info, &mut buf)
            .map_err(|e| Error::protobuf_encode("AuthInfo".to_string(), e))?;

        self.auth_info_bytes = Some(buf.clone());
        Ok(buf)
    }

    /// The broadcastable `TxRaw` serialization.
    pub fn encoded_tx(&mut self) -> Result<Vec<u8>, Error> {
        let tx_raw = TxRaw {
            body_bytes: self.body_bytes()?,
            auth_info_bytes: self.auth_info_bytes()?,
            signatures: self.signatures.clone(),
        };

        let mut tx_bytes = Vec::new();
        Message::encode(&tx_raw, &mut tx_bytes)
            .map_err(|e| Error::protobuf_encode("Transaction".to_string(), e))?;

        Ok(tx_bytes)
    }

    /// The full `Tx` form used by gas simulation.
    pub fn tx(&self) -> Tx {
        Tx {
            body: Some(self.body.clone()),
            auth_info: Some(self.auth_info.clone()),
            signatures: self.signatures.clone(),
        }
    }

    /// Fee amounts currently set, in proto form.
    pub fn fee_amount(&self) -> &[RawCoin] {
        self.fee().map(|fee| fee.amount.as_slice()).unwrap_or(&[])
    }

    fn fee_mut(&mut self) -> &mut Fee {
        self.auth_info.fee.get_or_insert_with(Fee::default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::MsgSend;
    use crate::tx::signature::SignatureData;

    fn addr(byte: u8) -> AccAddress {
        AccAddress::from_bytes("vrd", &[byte; 20]).unwrap()
    }

    fn msgs() -> Vec<Box<dyn Msg>> {
        vec![
            Box::new(MsgSend::new(addr(1), addr(2), vec![Coin::new("uvrd", 10)])),
            Box::new(MsgSend::new(addr(1), addr(3), vec![Coin::new("uvrd", 20)])),
        ]
    }

    fn signature(sequence: u64) -> SignatureV2 {
        SignatureV2 {
            public_key: PublicKey::Secp256k1(vec![2; 33]),
            data: SignatureData::Single {
                mode: 1,
                signature: vec![9; 64],
            },
            sequence,
        }
    }

    #[test]
    fn body_mutators_invalidate_the_cached_encoding() {
        let mut builder = TxBuilder::new();
        builder.set_msgs(&msgs()).unwrap();

        let before = builder.body_bytes().unwrap();
        assert_eq!(builder.body_bytes().unwrap(), before);

        builder.set_memo(&Memo::new("updated").unwrap());
        let after = builder.body_bytes().unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn auth_info_mutators_invalidate_the_cached_encoding() {
        let mut builder = TxBuilder::new();
        builder.set_msgs(&msgs()).unwrap();
        builder.set_gas_limit(200_000);

        let before = builder.auth_info_bytes().unwrap();
        builder.set_fee_amount(&[Coin::new("uvrd", 2000)]);

        assert_ne!(builder.auth_info_bytes().unwrap(), before);
        assert_eq!(builder.gas(), 200_000);
    }

    #[test]
    fn signers_are_deduplicated_in_first_seen_order() {
        let mut builder = TxBuilder::new();
        builder.set_msgs(&msgs()).unwrap();

        assert_eq!(builder.signers(), &[addr(1)]);
    }

    #[test]
    #[should_panic(expected = "got 2 signatures for 1 signers")]
    fn mismatched_signature_count_is_a_defect() {
        let mut builder = TxBuilder::new();
        builder.set_msgs(&msgs()).unwrap();

        let _ = builder.set_signatures(vec![signature(7), signature(8)]);
    }

    #[test]
    fn signatures_round_trip_through_the_structured_view() {
        let mut builder = TxBuilder::new();
        builder.set_msgs(&msgs()).unwrap();
        builder.set_signatures(vec![signature(7)]).unwrap();

        let views = builder.signatures_v2().unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0], signature(7));
    }

    #[test]
    fn encoded_tx_decodes_back_to_its_parts() {
        let memo = Memo::new("transfer").unwrap();

        let mut builder = TxBuilder::new();
        builder.set_msgs(&msgs()).unwrap();
        builder.set_memo(&memo);
        builder.set_timeout_height(120);
        builder.set_gas_limit(200_000);
        builder.set_fee_amount(&[Coin::new("uvrd", 2000)]);
        builder.set_signatures(vec![signature(7)]).unwrap();

        let tx_bytes = builder.encoded_tx().unwrap();
        let tx_raw = TxRaw::decode(tx_bytes.as_slice()).unwrap();

        let body = TxBody::decode(tx_raw.body_bytes.as_slice()).unwrap();
        assert_eq!(body.messages.len(), 2);
        assert_eq!(body.memo, "transfer");
        assert_eq!(body.timeout_height, 120);

        let auth_info = AuthInfo::decode(tx_raw.auth_info_bytes.as_slice()).unwrap();
        let fee = auth_info.fee.unwrap();
        assert_eq!(fee.gas_limit, 200_000);
        assert_eq!(fee.amount[0].amount, "2000");
        assert_eq!(auth_info.signer_infos.len(), 1);
        assert_eq!(auth_info.signer_infos[0].sequence, 7);

        assert_eq!(tx_raw.signatures, vec![vec![9; 64]]);
    }
}
