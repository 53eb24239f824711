//! Public keys and signature data for single and multisig signers.

use ibc_proto::cosmos::crypto::multisig::v1beta1::{CompactBitArray, MultiSignature};
use ibc_proto::cosmos::tx::v1beta1::mode_info::{Multi, Single, Sum};
use ibc_proto::cosmos::tx::v1beta1::ModeInfo;
use ibc_proto::google::protobuf::Any;
use prost::Message;

use crate::error::Error;

pub const TYPE_URL_SECP256K1_PUB_KEY: &str = "/cosmos.crypto.secp256k1.PubKey";
pub const TYPE_URL_LEGACY_AMINO_PUB_KEY: &str = "/cosmos.crypto.multisig.LegacyAminoPubKey";

/// `cosmos.crypto.multisig.LegacyAminoPubKey`.
///
/// Declared here because the generated proto bindings only cover the
/// `v1beta1` part of the multisig package.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RawLegacyAminoPubKey {
    #[prost(uint32, tag = "1")]
    pub threshold: u32,
    #[prost(message, repeated, tag = "2")]
    pub public_keys: ::prost::alloc::vec::Vec<Any>,
}

/// A signer's public key, in the forms carried inside a `SignerInfo`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublicKey {
    /// Compressed SEC1 secp256k1 key bytes.
    Secp256k1(Vec<u8>),

    /// Amino multisig key: any `threshold` of the member keys must sign.
    LegacyAminoMultisig {
        threshold: u32,
        public_keys: Vec<PublicKey>,
    },
}

impl PublicKey {
    pub fn to_any(&self) -> Result<Any, Error> {
        match self {
            Self::Secp256k1(bytes) => {
                // A bare scalar encodes as field 1, which matches the
                // single-field PubKey message.
                let mut buf = Vec::new();
                Message::encode(bytes, &mut buf)
                    .map_err(|e| Error::protobuf_encode("PubKey".to_string(), e))?;

                Ok(Any {
                    type_url: TYPE_URL_SECP256K1_PUB_KEY.to_string(),
                    value: buf,
                })
            }

            Self::LegacyAminoMultisig {
                threshold,
                public_keys,
            } => {
                let raw = RawLegacyAminoPubKey {
                    threshold: *threshold,
                    public_keys: public_keys
                        .iter()
                        .map(PublicKey::to_any)
                        .collect::<Result<Vec<_>, _>>()?,
                };

                let mut buf = Vec::new();
                Message::encode(&raw, &mut buf)
                    .map_err(|e| Error::protobuf_encode("LegacyAminoPubKey".to_string(), e))?;

                Ok(Any {
                    type_url: TYPE_URL_LEGACY_AMINO_PUB_KEY.to_string(),
                    value: buf,
                })
            }
        }
    }
}

impl TryFrom<&Any> for PublicKey {
    type Error = Error;

    fn try_from(any: &Any) -> Result<Self, Self::Error> {
        match any.type_url.as_str() {
            TYPE_URL_SECP256K1_PUB_KEY => {
                let bytes = <Vec<u8> as Message>::decode(any.value.as_slice())
                    .map_err(|e| Error::protobuf_decode("PubKey".to_string(), e))?;

                Ok(Self::Secp256k1(bytes))
            }

            TYPE_URL_LEGACY_AMINO_PUB_KEY => {
                let raw = RawLegacyAminoPubKey::decode(any.value.as_slice())
                    .map_err(|e| Error::protobuf_decode("LegacyAminoPubKey".to_string(), e))?;

                let public_keys = raw
                    .public_keys
                    .iter()
                    .map(PublicKey::try_from)
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(Self::LegacyAminoMultisig {
                    threshold: raw.threshold,
                    public_keys,
                })
            }

            _ => Err(Error::invalid_public_key(any.type_url.clone())),
        }
    }
}

/// Signature payload, mirroring the shape of the mode info it travels with.
#[derive(Clone, Debug, PartialEq)]
pub enum SignatureData {
    Single {
        /// Wire value of the sign mode the signature was produced under.
        mode: i32,
        signature: Vec<u8>,
    },

    Multi {
        bit_array: CompactBitArray,
        signatures: Vec<SignatureData>,
    },
}

impl SignatureData {
    /// The `ModeInfo` describing this signature.
    pub fn mode_info(&self) -> ModeInfo {
        match self {
            Self::Single { mode, .. } => ModeInfo {
                sum: Some(Sum::Single(Single { mode: *mode })),
            },

            Self::Multi {
                bit_array,
                signatures,
            } => ModeInfo {
                sum: Some(Sum::Multi(Multi {
                    bitarray: Some(bit_array.clone()),
                    mode_infos: signatures.iter().map(SignatureData::mode_info).collect(),
                })),
            },
        }
    }

    /// The raw signature bytes placed in `TxRaw.signatures`.
    ///
    /// Multisig data is wrapped in a `MultiSignature` message.
    pub fn to_raw_bytes(&self) -> Result<Vec<u8>, Error> {
        match self {
            Self::Single { signature, .. } => Ok(signature.clone()),

            Self::Multi { signatures, .. } => {
                let multi = MultiSignature {
                    signatures: signatures
                        .iter()
                        .map(SignatureData::to_raw_bytes)
                        .collect::<Result<Vec<_>, _>>()?,
                };

                let mut buf = Vec::new();
                Message::encode(&multi, &mut buf)
                    .map_err(|e| Error::protobuf_encode("MultiSignature".to_string(), e))?;

                Ok(buf)
            }
        }
    }

    /// Rebuild signature data from a `ModeInfo` and the matching raw bytes.
    pub fn from_parts(mode_info: &ModeInfo, raw: &[u8]) -> Result<Self, Error> {
        match &mode_info.sum {
            Some(Sum::Single(single)) => Ok(Self::Single {
                mode: single.mode,
                signature: raw.to_vec(),
            }),

            Some(Sum::Multi(multi)) => {
                let bit_array = multi.bitarray.clone().ok_or_else(|| {
                    Error::invalid_signature_data("multisig mode info has no bit array".to_string())
                })?;

                let decoded = MultiSignature::decode(raw)
                    .map_err(|e| Error::protobuf_decode("MultiSignature".to_string(), e))?;

                if decoded.signatures.len() != multi.mode_infos.len() {
                    return Err(Error::invalid_signature_data(format!(
                        "multisig carries {} signatures but mode info describes {}",
                        decoded.signatures.len(),
                        multi.mode_infos.len(),
                    )));
                }

                let signatures = multi
                    .mode_infos
                    .iter()
                    .zip(decoded.signatures.iter())
                    .map(|(info, sig)| SignatureData::from_parts(info, sig))
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(Self::Multi {
                    bit_array,
                    signatures,
                })
            }

            None => Err(Error::invalid_signature_data(
                "mode info is empty".to_string(),
            )),
        }
    }
}

/// A full signature: who signed, with what data, at which sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct SignatureV2 {
    pub public_key: PublicKey,
    pub data: SignatureData,
    pub sequence: u64,
}

/// Empty multisig signature data sized for `n_keys` member keys.
pub fn new_multisig_data(n_keys: usize) -> SignatureData {
    SignatureData::Multi {
        bit_array: bit_array_new(n_keys),
        signatures: Vec::new(),
    }
}

/// Insert a member signature at key position `index`.
///
/// Signatures are kept ordered by member index; signing the same index
/// twice replaces the earlier signature.
pub fn add_signature(
    multi: &mut SignatureData,
    index: usize,
    signature: SignatureData,
) -> Result<(), Error> {
    match multi {
        SignatureData::Multi {
            bit_array,
            signatures,
        } => {
            if index >= bit_array_count(bit_array) {
                return Err(Error::invalid_signature_data(format!(
                    "signer index {} out of range for {} member keys",
                    index,
                    bit_array_count(bit_array),
                )));
            }

            let position = num_true_bits_before(bit_array, index);
            if bit_array_get(bit_array, index) {
                signatures[position] = signature;
            } else {
                bit_array_set(bit_array, index, true);
                signatures.insert(position, signature);
            }

            Ok(())
        }

        SignatureData::Single { .. } => Err(Error::invalid_signature_data(
            "cannot add a member signature to single signature data".to_string(),
        )),
    }
}

/// A compact bit array able to hold `bits` bits, all unset.
pub fn bit_array_new(bits: usize) -> CompactBitArray {
    CompactBitArray {
        extra_bits_stored: (bits % 8) as u32,
        elems: vec![0; (bits + 7) / 8],
    }
}

/// Number of bits the array holds.
pub fn bit_array_count(bit_array: &CompactBitArray) -> usize {
    if bit_array.extra_bits_stored == 0 {
        bit_array.elems.len() * 8
    } else {
        (bit_array.elems.len() - 1) * 8 + bit_array.extra_bits_stored as usize
    }
}

/// Whether the bit at `index` is set. Out of range reads as unset.
///
/// Bits are stored most significant first within each byte.
pub fn bit_array_get(bit_array: &CompactBitArray, index: usize) -> bool {
    if index >= bit_array_count(bit_array) {
        return false;
    }

    bit_array.elems[index >> 3] & (1u8 << (7 - (index % 8))) > 0
}

/// Set or clear the bit at `index`. Returns false when out of range.
pub fn bit_array_set(bit_array: &mut CompactBitArray, index: usize, value: bool) -> bool {
    if index >= bit_array_count(bit_array) {
        return false;
    }

    if value {
        bit_array.elems[index >> 3] |= 1u8 << (7 - (index % 8));
    } else {
        bit_array.elems[index >> 3] &= !(1u8 << (7 - (index % 8)));
    }

    true
}

/// Number of set bits strictly before `index`.
pub fn num_true_bits_before(bit_array: &CompactBitArray, index: usize) -> usize {
    (0..index).filter(|&i| bit_array_get(bit_array, i)).count()
}
