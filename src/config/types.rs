//! Configuration-related types.
//!
//! Implements defaults, as well as serializing and
//! deserializing with bound verification.

use core::fmt;

use serde::de::Unexpected;
use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

const DEFAULT_MAX_MSG_NUM: usize = 100;
const DEFAULT_MAX_TX_SIZE: usize = 2 * 1048576; // 2 MBytes
const DEFAULT_LOCK_SHARDS: usize = 16;

const MIN_MAX_MSG_NUM: usize = 1;
const BOUND_MAX_MSG_NUM: usize = 100;
const BOUND_MAX_TX_SIZE: usize = 8 * 1048576; // 8 MBytes
const BOUND_LOCK_SHARDS: usize = 4096;
const MAX_MEMO_LEN: usize = 50;

/// Upper bound on the number of messages packed into one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxMsgNum(usize);

impl Default for MaxMsgNum {
    fn default() -> Self {
        Self(DEFAULT_MAX_MSG_NUM)
    }
}

impl<'de> Deserialize<'de> for MaxMsgNum {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let u = usize::deserialize(deserializer)?;

        if !(MIN_MAX_MSG_NUM..=BOUND_MAX_MSG_NUM).contains(&u) {
            return Err(D::Error::invalid_value(
                Unexpected::Unsigned(u as u64),
                &format!(
                    "a usize between {} and {}",
                    MIN_MAX_MSG_NUM, BOUND_MAX_MSG_NUM
                )
                .as_str(),
            ));
        }

        Ok(MaxMsgNum(u))
    }
}

impl Serialize for MaxMsgNum {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl From<MaxMsgNum> for usize {
    fn from(m: MaxMsgNum) -> Self {
        m.0
    }
}

/// Maximum encoded size of a single transaction, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxTxSize(usize);

impl Default for MaxTxSize {
    fn default() -> Self {
        Self(DEFAULT_MAX_TX_SIZE)
    }
}

impl<'de> Deserialize<'de> for MaxTxSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let u = usize::deserialize(deserializer)?;

        if u > BOUND_MAX_TX_SIZE {
            return Err(D::Error::invalid_value(
                Unexpected::Unsigned(u as u64),
                &format!("a usize less than {}", BOUND_MAX_TX_SIZE).as_str(),
            ));
        }

        Ok(MaxTxSize(u))
    }
}

impl Serialize for MaxTxSize {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl From<MaxTxSize> for usize {
    fn from(m: MaxTxSize) -> Self {
        m.0
    }
}

/// Number of slots in the sharded sender lock table.
///
/// Senders hashing into the same slot serialize against each other; the
/// default matches the expected sender concurrency of a single client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockShards(usize);

impl LockShards {
    pub fn new(n: usize) -> Option<Self> {
        if (1..=BOUND_LOCK_SHARDS).contains(&n) {
            Some(Self(n))
        } else {
            None
        }
    }
}

impl Default for LockShards {
    fn default() -> Self {
        Self(DEFAULT_LOCK_SHARDS)
    }
}

impl<'de> Deserialize<'de> for LockShards {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let u = usize::deserialize(deserializer)?;

        LockShards::new(u).ok_or_else(|| {
            D::Error::invalid_value(
                Unexpected::Unsigned(u as u64),
                &format!("a usize between 1 and {}", BOUND_LOCK_SHARDS).as_str(),
            )
        })
    }
}

impl Serialize for LockShards {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl From<LockShards> for usize {
    fn from(l: LockShards) -> Self {
        l.0
    }
}

/// A memo attached to transactions, bounded to what nodes accept by default.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Memo(String);

impl Memo {
    pub fn new(memo: impl Into<String>) -> Result<Self, String> {
        let memo = memo.into();
        if memo.len() > MAX_MEMO_LEN {
            return Err(format!(
                "memo of {} chars exceeds the maximum length of {}",
                memo.len(),
                MAX_MEMO_LEN
            ));
        }

        Ok(Self(memo))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Memo {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let m = String::deserialize(deserializer)?;

        Memo::new(m).map_err(|e| D::Error::custom(format!("invalid memo: {}", e)))
    }
}

impl Serialize for Memo {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl fmt::Display for Memo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
