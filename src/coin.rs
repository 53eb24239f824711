//! Coin amounts and denomination handling.
//!
//! Fees may be declared in display units (e.g. `1.5 vrd`); the chain only
//! accepts minimum units (`1500000 uvrd`). Conversion goes through the
//! configured denom registry and uses integer string arithmetic throughout.

use core::fmt;

use serde_derive::{Deserialize, Serialize};
use serde_json::json;

use crate::error::Error;

/// A coin amount in minimum (base) units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: u128,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u128) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    pub fn to_proto(&self) -> ibc_proto::cosmos::base::v1beta1::Coin {
        ibc_proto::cosmos::base::v1beta1::Coin {
            denom: self.denom.clone(),
            amount: self.amount.to_string(),
        }
    }

    /// Legacy amino JSON form: amounts are strings.
    pub fn to_amino_json(&self) -> serde_json::Value {
        json!({
            "amount": self.amount.to_string(),
            "denom": self.denom,
        })
    }

    /// Denom and amount checks shared by message validation.
    pub fn validate(&self) -> Result<(), String> {
        validate_denom(&self.denom)?;
        if self.amount == 0 {
            return Err(format!("coin {} has zero amount", self.denom));
        }
        Ok(())
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// A coin amount as given by the caller: any registered denom, decimal
/// amounts allowed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecCoin {
    pub denom: String,
    pub amount: String,
}

impl DecCoin {
    pub fn new(denom: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.into(),
        }
    }

    /// Well-formedness only; registry membership is checked on conversion.
    pub fn is_valid(&self) -> bool {
        validate_denom(&self.denom).is_ok() && parse_decimal_parts(&self.amount).is_ok()
    }
}

impl fmt::Display for DecCoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Relationship between a base (minimum) unit and its display unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenomMetadata {
    /// Minimum unit, e.g. `uvrd`. All on-chain amounts use this.
    pub base: String,
    /// Display unit, e.g. `vrd`.
    pub display: String,
    /// `1 display == 10^exponent base`.
    pub exponent: u8,
}

impl DenomMetadata {
    pub fn new(base: impl Into<String>, display: impl Into<String>, exponent: u8) -> Self {
        Self {
            base: base.into(),
            display: display.into(),
            exponent,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        validate_denom(&self.base)
            .map_err(|reason| Error::invalid_coin(self.base.clone(), reason))?;
        validate_denom(&self.display)
            .map_err(|reason| Error::invalid_coin(self.display.clone(), reason))?;

        if self.base == self.display {
            return Err(Error::invalid_coin(
                self.base.clone(),
                "base and display units must differ".to_string(),
            ));
        }

        // 10^exponent must stay representable in u128 arithmetic
        if self.exponent > 38 {
            return Err(Error::invalid_coin(
                self.display.clone(),
                format!("exponent {} is out of range", self.exponent),
            ));
        }

        Ok(())
    }
}

/// Convert caller-facing coins into minimum-unit coins.
pub fn to_min_coins(coins: &[DecCoin], registry: &[DenomMetadata]) -> Result<Vec<Coin>, Error> {
    coins.iter().map(|c| to_min_coin(c, registry)).collect()
}

/// Convert one coin into its minimum unit through the registry.
pub fn to_min_coin(coin: &DecCoin, registry: &[DenomMetadata]) -> Result<Coin, Error> {
    for meta in registry {
        if coin.denom == meta.base {
            let amount = decimal_to_integer(&coin.amount, 0)
                .map_err(|reason| Error::invalid_coin(coin.to_string(), reason))?;
            return Ok(Coin::new(meta.base.clone(), amount));
        }

        if coin.denom == meta.display {
            let amount = decimal_to_integer(&coin.amount, meta.exponent)
                .map_err(|reason| Error::invalid_coin(coin.to_string(), reason))?;
            return Ok(Coin::new(meta.base.clone(), amount));
        }
    }

    Err(Error::unknown_denom(coin.denom.clone()))
}

/// Scale a non-negative decimal string by `10^exponent` into a u128.
///
/// Fails on malformed input, on fractional digits beyond what the exponent
/// can absorb, and on overflow.
fn decimal_to_integer(amount: &str, exponent: u8) -> Result<u128, String> {
    let (int_part, frac_part) = parse_decimal_parts(amount)?;

    if frac_part.len() > exponent as usize {
        return Err(format!(
            "{} fractional digits cannot be represented in minimum units (max {})",
            frac_part.len(),
            exponent
        ));
    }

    let int: u128 = int_part
        .parse()
        .map_err(|_| "integer part out of range".to_string())?;

    let scale = 10u128
        .checked_pow(exponent as u32)
        .ok_or_else(|| "exponent out of range".to_string())?;

    let mut value = int
        .checked_mul(scale)
        .ok_or_else(|| "amount out of range".to_string())?;

    if !frac_part.is_empty() {
        let frac: u128 = frac_part
            .parse()
            .map_err(|_| "fractional part out of range".to_string())?;
        let frac_scale = 10u128.pow((exponent as usize - frac_part.len()) as u32);
        value = value
            .checked_add(frac * frac_scale)
            .ok_or_else(|| "amount out of range".to_string())?;
    }

    Ok(value)
}

/// Split a decimal string into integer and fractional digit runs.
fn parse_decimal_parts(amount: &str) -> Result<(&str, &str), String> {
    let (int_part, frac_part) = match amount.split_once('.') {
        Some((i, f)) => (i, f),
        None => (amount, ""),
    };

    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("malformed decimal amount: {:?}", amount));
    }

    if amount.contains('.') && (frac_part.is_empty() || !frac_part.bytes().all(|b| b.is_ascii_digit()))
    {
        return Err(format!("malformed decimal amount: {:?}", amount));
    }

    Ok((int_part, frac_part))
}

/// Denominations follow the usual chain rules: start with a lowercase
/// letter, 3 to 128 chars from [a-z0-9/].
pub fn validate_denom(denom: &str) -> Result<(), String> {
    if denom.len() < 3 || denom.len() > 128 {
        return Err(format!("denom {:?} must be 3 to 128 characters", denom));
    }

    let mut bytes = denom.bytes();
    let first = bytes.next().expect("length checked above");
    if !first.is_ascii_lowercase() {
        return Err(format!("denom {:?} must start with a lowercase letter", denom));
    }

    if !bytes.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'/') {
        return Err(format!("denom {:?} contains invalid characters", denom));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Vec<DenomMetadata> {
        vec![DenomMetadata::new("uvrd", "vrd", 6)]
    }

    #[test]
    fn convert_display_to_min() {
        let coin = to_min_coin(&DecCoin::new("vrd", "1.5"), &registry()).unwrap();
        assert_eq!(coin, Coin::new("uvrd", 1_500_000));
    }

    #[test]
    fn convert_base_passes_through() {
        let coin = to_min_coin(&DecCoin::new("uvrd", "2000"), &registry()).unwrap();
        assert_eq!(coin, Coin::new("uvrd", 2000));
    }

    #[test]
    fn base_unit_must_be_integral() {
        assert!(to_min_coin(&DecCoin::new("uvrd", "1.5"), &registry()).is_err());
    }

    #[test]
    fn reject_excess_precision() {
        assert!(to_min_coin(&DecCoin::new("vrd", "0.0000001"), &registry()).is_err());
        assert!(to_min_coin(&DecCoin::new("vrd", "0.000001"), &registry()).is_ok());
    }

    #[test]
    fn reject_unknown_denom() {
        assert!(to_min_coin(&DecCoin::new("uatom", "1"), &registry()).is_err());
    }

    #[test]
    fn reject_malformed_amounts() {
        for bad in [".5", "1.", "1.2.3", "-1", "", "12a"] {
            assert!(
                to_min_coin(&DecCoin::new("uvrd", bad), &registry()).is_err(),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn denom_rules() {
        assert!(validate_denom("uvrd").is_ok());
        assert!(validate_denom("ibc/27394fb092d2").is_ok());
        assert!(validate_denom("UVRD").is_err());
        assert!(validate_denom("ab").is_err());
        assert!(validate_denom("1abc").is_err());
    }
}
