//! Sharded per-sender locking.
//!
//! Senders are mapped onto a fixed pool of mutexes by an FNV-32 hash of the
//! sender key, so unrelated senders proceed in parallel while calls for the
//! same sender serialize. Two senders hashing to the same shard contend on
//! the same mutex; that collision is accepted. The locks are not reentrant:
//! taking the same sender's lock twice from one task deadlocks.

use tokio::sync::{Mutex, MutexGuard};

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

#[derive(Debug)]
pub struct AccountLocker {
    shards: Vec<Mutex<()>>,
}

impl AccountLocker {
    /// Create a locker with `size` shards. `size` must be non-zero.
    pub fn new(size: usize) -> Self {
        let shards = (0..size).map(|_| Mutex::new(())).collect();
        Self { shards }
    }

    /// Acquire the shard guarding `key`, waiting until it is free.
    ///
    /// The shard stays locked for as long as the returned guard lives.
    pub async fn lock(&self, key: &str) -> MutexGuard<'_, ()> {
        self.shards[self.shard_index(key)].lock().await
    }

    fn shard_index(&self, key: &str) -> usize {
        let mut hash = FNV_OFFSET_BASIS;
        for byte in key.as_bytes() {
            hash = hash.wrapping_mul(FNV_PRIME);
            hash ^= u32::from(*byte);
        }
        hash as usize % self.shards.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn indexes_are_stable_and_in_range() {
        let locker = AccountLocker::new(16);
        for key in ["alice", "bob", "", "vrd1qqqsyqcyq5rqwzqfpg9scrgwpugpzysnrujsuw"] {
            let index = locker.shard_index(key);
            assert!(index < 16);
            assert_eq!(index, locker.shard_index(key));
        }
    }

    #[tokio::test]
    async fn same_key_serializes() {
        let locker = AccountLocker::new(16);

        let guard = locker.lock("alice").await;
        let blocked = timeout(Duration::from_millis(20), locker.lock("alice")).await;
        assert!(blocked.is_err());

        drop(guard);
        let reacquired = timeout(Duration::from_millis(20), locker.lock("alice")).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn distinct_shards_do_not_block_each_other() {
        let locker = AccountLocker::new(16);

        let alice_shard = locker.shard_index("alice");
        let other = (0..64)
            .map(|i| format!("sender-{i}"))
            .find(|key| locker.shard_index(key) != alice_shard)
            .unwrap();

        let _guard = locker.lock("alice").await;
        let acquired = timeout(Duration::from_millis(20), locker.lock(&other)).await;
        assert!(acquired.is_ok());
    }
}
