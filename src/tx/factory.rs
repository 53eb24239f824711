//! One-shot build pipeline turning messages into signed transaction bytes.

use crate::address::AccAddress;
use crate::coin::Coin;
use crate::config::Memo;
use crate::error::Error;
use crate::keyring::KeyEntry;
use crate::msg::Msg;
use crate::tx::builder::TxBuilder;
use crate::tx::sign_mode::{sign_bytes, SignerData};
use crate::tx::signature::{PublicKey, SignatureData, SignatureV2};
use crate::tx::types::SignMode;

/// A signer resolved to its key and account state.
#[derive(Clone, Debug)]
pub struct SignerEntry {
    pub key: KeyEntry,
    pub account_number: u64,
    pub sequence: u64,
}

/// Carries everything a single build needs: resolved chain id, fee, gas,
/// memo and the signer set. The per-call resolution of these values from
/// the base options happens in the client; the factory itself never touches
/// the network.
#[derive(Clone, Debug)]
pub struct Factory {
    chain_id: String,
    sign_mode: SignMode,
    gas: u64,
    fee: Vec<Coin>,
    memo: Memo,
    timeout_height: u64,
    signers: Vec<SignerEntry>,
}

impl Factory {
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            sign_mode: SignMode::default(),
            gas: 0,
            fee: Vec::new(),
            memo: Memo::default(),
            timeout_height: 0,
            signers: Vec::new(),
        }
    }

    pub fn with_sign_mode(mut self, sign_mode: SignMode) -> Self {
        self.sign_mode = sign_mode;
        self
    }

    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = gas;
        self
    }

    pub fn with_fee(mut self, fee: Vec<Coin>) -> Self {
        self.fee = fee;
        self
    }

    pub fn with_memo(mut self, memo: Memo) -> Self {
        self.memo = memo;
        self
    }

    pub fn with_timeout_height(mut self, timeout_height: u64) -> Self {
        self.timeout_height = timeout_height;
        self
    }

    pub fn with_signer(mut self, signer: SignerEntry) -> Self {
        self.signers.push(signer);
        self
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn sign_mode(&self) -> SignMode {
        self.sign_mode
    }

    pub fn gas(&self) -> u64 {
        self.gas
    }

    pub fn fee(&self) -> &[Coin] {
        &self.fee
    }

    pub fn memo(&self) -> &Memo {
        &self.memo
    }

    pub fn signers(&self) -> &[SignerEntry] {
        &self.signers
    }

    /// Build, sign and serialize a transaction carrying `msgs`.
    ///
    /// Signing is two-pass: placeholder signer infos are installed first so
    /// the auth info every sign doc commits to is final, then each signer
    /// signs and the placeholders are replaced.
    pub fn build_and_sign(&self, msgs: &[Box<dyn Msg>]) -> Result<(Vec<u8>, TxBuilder), Error> {
        if msgs.is_empty() {
            return Err(Error::empty_message_list());
        }

        for msg in msgs {
            msg.validate_basic()?;
        }

        let mut builder = TxBuilder::new();
        builder.set_msgs(msgs)?;
        builder.set_memo(&self.memo);
        builder.set_timeout_height(self.timeout_height);
        builder.set_gas_limit(self.gas);
        builder.set_fee_amount(&self.fee);

        let signers = builder.signers().to_vec();

        let mut entries = Vec::with_capacity(signers.len());
        let mut placeholders = Vec::with_capacity(signers.len());
        for signer in &signers {
            let entry = self.signer_entry(signer)?;

            placeholders.push(SignatureV2 {
                public_key: PublicKey::Secp256k1(entry.key.public_key_bytes()),
                data: SignatureData::Single {
                    mode: self.sign_mode.to_proto(),
                    signature: Vec::new(),
                },
                sequence: entry.sequence,
            });
            entries.push(entry);
        }
        builder.set_signatures(placeholders)?;

        let mut signatures = Vec::with_capacity(entries.len());
        for entry in &entries {
            let signer_data = SignerData {
                address: entry.key.account.clone(),
                chain_id: self.chain_id.clone(),
                account_number: entry.account_number,
                sequence: entry.sequence,
            };

            let to_sign = sign_bytes(self.sign_mode, &signer_data, msgs, &mut builder)?;
            let signature = entry.key.sign(&to_sign).map_err(Error::keyring)?;

            signatures.push(SignatureV2 {
                public_key: PublicKey::Secp256k1(entry.key.public_key_bytes()),
                data: SignatureData::Single {
                    mode: self.sign_mode.to_proto(),
                    signature,
                },
                sequence: entry.sequence,
            });
        }
        builder.set_signatures(signatures)?;

        let tx_bytes = builder.encoded_tx()?;

        Ok((tx_bytes, builder))
    }

    fn signer_entry(&self, signer: &AccAddress) -> Result<SignerEntry, Error> {
        self.signers
            .iter()
            .find(|entry| entry.key.account == signer.as_str())
            .cloned()
            .ok_or_else(|| Error::missing_signer_key(signer.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibc_proto::cosmos::tx::v1beta1::{AuthInfo, SignDoc, TxBody, TxRaw};
    use k256::ecdsa::{signature::Verifier, Signature, VerifyingKey};
    use prost::Message;

    use crate::bank::MsgSend;
    use crate::keyring::{CoinType, KeyRing, Store};

    fn keyring_with(name: &str) -> (KeyRing, KeyEntry) {
        let mut keyring = KeyRing::new(Store::Memory, "vrd", "veridian-1").unwrap();
        let (key, _) = keyring.generate_key(name, CoinType::default()).unwrap();
        (keyring, key)
    }

    fn factory(key: KeyEntry) -> Factory {
        Factory::new("veridian-1")
            .with_gas(200_000)
            .with_fee(vec![Coin::new("uvrd", 2000)])
            .with_memo(Memo::new("payment").unwrap())
            .with_signer(SignerEntry {
                key,
                account_number: 7,
                sequence: 42,
            })
    }

    fn send_msg(key: &KeyEntry, amount: u128) -> Box<dyn Msg> {
        let from = AccAddress::from_bech32(&key.account).unwrap();
        let to = AccAddress::from_bytes("vrd", &[9; 20]).unwrap();
        Box::new(MsgSend::new(from, to, vec![Coin::new("uvrd", amount)]))
    }

    #[test]
    fn built_tx_decodes_and_its_signature_verifies() {
        let (_, key) = keyring_with("alice");
        let factory = factory(key.clone());

        let msgs = vec![send_msg(&key, 1000)];
        let (tx_bytes, _) = factory.build_and_sign(&msgs).unwrap();

        let tx_raw = TxRaw::decode(tx_bytes.as_slice()).unwrap();

        let body = TxBody::decode(tx_raw.body_bytes.as_slice()).unwrap();
        assert_eq!(body.messages.len(), 1);
        assert_eq!(body.memo, "payment");

        let auth_info = AuthInfo::decode(tx_raw.auth_info_bytes.as_slice()).unwrap();
        assert_eq!(auth_info.signer_infos.len(), 1);
        assert_eq!(auth_info.signer_infos[0].sequence, 42);

        // The signature must verify over the sign doc rebuilt from the
        // broadcast bytes alone.
        let sign_doc = SignDoc {
            body_bytes: tx_raw.body_bytes.clone(),
            auth_info_bytes: tx_raw.auth_info_bytes.clone(),
            chain_id: "veridian-1".to_string(),
            account_number: 7,
        };
        let mut doc_bytes = Vec::new();
        Message::encode(&sign_doc, &mut doc_bytes).unwrap();

        let verifying_key = VerifyingKey::from_sec1_bytes(&key.public_key_bytes()).unwrap();
        let signature = Signature::from_slice(&tx_raw.signatures[0]).unwrap();
        verifying_key.verify(&doc_bytes, &signature).unwrap();
    }

    #[test]
    fn amino_mode_signs_the_canonical_json() {
        let (_, key) = keyring_with("alice");
        let factory = factory(key.clone()).with_sign_mode(SignMode::LegacyAminoJson);

        let msgs = vec![send_msg(&key, 1000)];
        let (tx_bytes, builder) = factory.build_and_sign(&msgs).unwrap();

        let tx_raw = TxRaw::decode(tx_bytes.as_slice()).unwrap();
        let auth_info = AuthInfo::decode(tx_raw.auth_info_bytes.as_slice()).unwrap();

        // Mode info carries the amino wire value.
        use ibc_proto::cosmos::tx::v1beta1::mode_info::{Single, Sum};
        let mode_info = auth_info.signer_infos[0].mode_info.clone().unwrap();
        assert_eq!(mode_info.sum, Some(Sum::Single(Single { mode: 127 })));

        let views = builder.signatures_v2().unwrap();
        match &views[0].data {
            SignatureData::Single { mode, signature } => {
                assert_eq!(*mode, 127);
                assert_eq!(signature.len(), 64);
            }
            _ => panic!("expected single signature data"),
        }
    }

    #[test]
    fn missing_signer_key_aborts_the_build() {
        let (_, key) = keyring_with("alice");
        let (_, stranger) = keyring_with("bob");

        let factory = factory(key);
        let msgs = vec![send_msg(&stranger, 1000)];

        assert!(factory.build_and_sign(&msgs).is_err());
    }

    #[test]
    fn invalid_message_aborts_before_signing() {
        let (_, key) = keyring_with("alice");
        let factory = factory(key.clone());

        let msgs = vec![send_msg(&key, 0)];
        assert!(factory.build_and_sign(&msgs).is_err());
    }

    #[test]
    fn empty_message_list_is_rejected() {
        let (_, key) = keyring_with("alice");
        let factory = factory(key);

        assert!(factory.build_and_sign(&[]).is_err());
    }
}
