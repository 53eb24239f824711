//! TTL-bounded cache of per-sender account state.

use std::time::Duration;

use moka::sync;

use crate::account::Account;

/// Concurrency-safe account store keyed by bech32 address.
///
/// Entries go stale three ways: per-entry TTL expiry, explicit invalidation
/// after a broadcast failure, and eviction under capacity pressure. All of
/// them force the next build to refetch the account from the network.
///
/// Safe to share across tasks without the sender locker; distinct senders
/// read and write their entries concurrently.
#[derive(Clone)]
pub struct AccountCache {
    accounts: sync::Cache<String, Account>,
}

impl AccountCache {
    pub fn new(capacity: u64, ttl: Duration) -> AccountCache {
        let accounts = sync::Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();

        AccountCache { accounts }
    }

    pub fn get(&self, address: &str) -> Option<Account> {
        self.accounts.get(address)
    }

    /// Store (or overwrite) the entry for `account.address`, restarting its
    /// TTL window.
    pub fn insert(&self, account: Account) {
        self.accounts.insert(account.address.clone(), account);
    }

    pub fn invalidate(&self, address: &str) {
        self.accounts.invalidate(address);
    }
}
