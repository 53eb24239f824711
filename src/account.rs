//! Account identity as tracked by the chain: a stable account number and a
//! per-transaction sequence.

use core::fmt;

use ibc_proto::cosmos::auth::v1beta1::BaseAccount;

/// Client-side view of an on-chain account.
///
/// The sequence recorded here is the one to use for the *next* transaction;
/// it only ever moves forward. Owned by the account cache, read-copied by
/// the factory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub address: String,
    pub number: AccountNumber,
    pub sequence: AccountSequence,
}

impl Account {
    pub fn new(address: impl Into<String>, number: AccountNumber, sequence: AccountSequence) -> Self {
        Self {
            address: address.into(),
            number,
            sequence,
        }
    }
}

impl From<BaseAccount> for Account {
    fn from(value: BaseAccount) -> Self {
        Self {
            address: value.address,
            number: AccountNumber::new(value.account_number),
            sequence: AccountSequence::new(value.sequence),
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (number {}, sequence {})",
            self.address, self.number, self.sequence
        )
    }
}

/// Newtype for account numbers
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct AccountNumber(u64);

impl AccountNumber {
    pub fn new(number: u64) -> Self {
        Self(number)
    }

    pub fn to_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype for account sequence numbers
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct AccountSequence(u64);

impl AccountSequence {
    pub fn new(sequence: u64) -> Self {
        Self(sequence)
    }

    pub fn to_u64(self) -> u64 {
        self.0
    }

    pub fn increment(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn increment_mut(&mut self) {
        self.0 += 1
    }
}

impl fmt::Display for AccountSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
