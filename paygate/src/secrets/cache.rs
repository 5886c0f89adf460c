//! TTL cache of resolved webhook HMAC keys.

use std::time::Duration;

use moka::future::Cache;

/// HMAC keys keyed by merchant account (case-insensitive).
///
/// Entries expire after the configured TTL so rotated keys are picked up without a restart.
/// Concurrent inserts for the same merchant are harmless; the last write wins.
#[derive(Clone)]
pub struct KeyCache {
    inner: Cache<String, String>,
}

impl KeyCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder().max_capacity(max_capacity).time_to_live(ttl).build(),
        }
    }

    fn cache_key(merchant_account: &str) -> String {
        merchant_account.trim().to_lowercase()
    }

    pub async fn get(&self, merchant_account: &str) -> Option<String> {
        let hit = self.inner.get(&Self::cache_key(merchant_account)).await;
        if hit.is_some() {
            tracing::debug!(merchant_account, "HMAC key cache hit");
        }
        hit
    }

    pub async fn insert(&self, merchant_account: &str, key: String) {
        self.inner.insert(Self::cache_key(merchant_account), key).await;
    }
}

impl std::fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCache").field("entries", &self.inner.entry_count()).finish()
    }
}
