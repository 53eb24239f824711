//! Bech32-encoded account addresses.

use core::fmt;

use bech32::{FromBase32, ToBase32, Variant};

use crate::error::Error;

/// Length in bytes of a raw account address (ripemd160 output).
pub const ADDRESS_LEN: usize = 20;

/// An account address: 20 raw bytes plus their canonical bech32 rendering.
///
/// The bech32 text is normalized on construction, so equality and hashing
/// over it are stable regardless of the input casing.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccAddress {
    account: String,
    bytes: Vec<u8>,
}

impl AccAddress {
    /// Parse a bech32 string, verifying checksum, variant, and payload size.
    pub fn from_bech32(address: &str) -> Result<Self, Error> {
        let (hrp, data, variant) = bech32::decode(address)
            .map_err(|e| Error::invalid_address(address.to_string(), e.to_string()))?;

        if variant != Variant::Bech32 {
            return Err(Error::invalid_address(
                address.to_string(),
                "expected the bech32 (non-m) variant".to_string(),
            ));
        }

        let bytes = Vec::<u8>::from_base32(&data)
            .map_err(|e| Error::invalid_address(address.to_string(), e.to_string()))?;

        if bytes.len() != ADDRESS_LEN {
            return Err(Error::invalid_address(
                address.to_string(),
                format!("expected {} payload bytes, got {}", ADDRESS_LEN, bytes.len()),
            ));
        }

        Self::from_bytes(&hrp, &bytes)
    }

    /// Encode raw address bytes under the given bech32 prefix.
    pub fn from_bytes(hrp: &str, bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != ADDRESS_LEN {
            return Err(Error::invalid_address(
                hex::encode(bytes),
                format!("expected {} payload bytes, got {}", ADDRESS_LEN, bytes.len()),
            ));
        }

        let account = bech32::encode(hrp, bytes.to_base32(), Variant::Bech32)
            .map_err(|e| Error::invalid_address(hex::encode(bytes), e.to_string()))?;

        Ok(Self {
            account,
            bytes: bytes.to_vec(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_str(&self) -> &str {
        &self.account
    }
}

impl fmt::Display for AccAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_round_trip() {
        let addr = AccAddress::from_bytes("vrd", &[7u8; ADDRESS_LEN]).unwrap();
        assert!(addr.as_str().starts_with("vrd1"));

        let parsed = AccAddress::from_bech32(addr.as_str()).unwrap();
        assert_eq!(parsed, addr);
        assert_eq!(parsed.as_bytes(), &[7u8; ADDRESS_LEN]);
    }

    #[test]
    fn uppercase_input_normalizes() {
        let addr = AccAddress::from_bytes("vrd", &[9u8; ADDRESS_LEN]).unwrap();
        let upper = addr.as_str().to_uppercase();

        let parsed = AccAddress::from_bech32(&upper).unwrap();
        assert_eq!(parsed.as_str(), addr.as_str());
    }

    #[test]
    fn reject_wrong_payload_size() {
        assert!(AccAddress::from_bytes("vrd", &[1u8; 19]).is_err());
    }

    #[test]
    fn reject_garbage() {
        assert!(AccAddress::from_bech32("vrd1qqqqnotanaddress").is_err());
        assert!(AccAddress::from_bech32("").is_err());
    }
}
