use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use leaselock::{AtomicScript, LockError, LockStore};

/// One held key: the owner token and when the lease lapses.
#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory [`LockStore`] backed by a [`DashMap`].
///
/// Each operation touches a single map entry under its shard lock, which
/// gives the same indivisibility the protocol expects from server-side
/// scripts.
#[derive(Debug, Clone, Default)]
pub struct MemoryLockStore {
    entries: Arc<DashMap<String, Entry>>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn set_if_not_exists(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, LockError> {
        // Evict a lapsed lease lazily before deciding.
        self.entries.remove_if(key, |_, entry| entry.is_expired());

        match self.entries.entry(key.to_owned()) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                if occupied.get().value == value {
                    // Same token re-acquiring, e.g. after an ambiguous
                    // timeout: reset the lease.
                    occupied.get_mut().expires_at = Instant::now() + ttl;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(Entry {
                    value: value.to_owned(),
                    expires_at: Instant::now() + ttl,
                });
                Ok(true)
            }
        }
    }

    async fn eval_atomic(
        &self,
        script: AtomicScript,
        keys: &[&str],
        args: &[&str],
    ) -> Result<i64, LockError> {
        let key = keys
            .first()
            .ok_or_else(|| LockError::StoreUnavailable("missing lock key".into()))?;
        let token = args
            .first()
            .ok_or_else(|| LockError::StoreUnavailable("missing owner token".into()))?;

        match script {
            AtomicScript::Release => {
                let removed = self
                    .entries
                    .remove_if(*key, |_, entry| !entry.is_expired() && entry.value == *token);
                Ok(i64::from(removed.is_some()))
            }
            AtomicScript::Renew => {
                let ttl_ms: u64 = args
                    .get(1)
                    .and_then(|ms| ms.parse().ok())
                    .ok_or_else(|| LockError::StoreUnavailable("missing renew TTL".into()))?;

                let Some(mut entry) = self.entries.get_mut(*key) else {
                    return Ok(0);
                };
                if entry.is_expired() || entry.value != *token {
                    return Ok(0);
                }
                entry.expires_at = Instant::now() + Duration::from_millis(ttl_ms);
                Ok(1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn same_token_reacquire_resets_the_lease() {
        let store = MemoryLockStore::new();

        assert!(
            store
                .set_if_not_exists("k", "tok", Duration::from_secs(2))
                .await
                .unwrap()
        );

        tokio::time::advance(Duration::from_secs(1)).await;
        // Retried attempt with the same token lands and re-arms the TTL.
        assert!(
            store
                .set_if_not_exists("k", "tok", Duration::from_secs(2))
                .await
                .unwrap()
        );

        // Original TTL would have lapsed here; the reset one has not.
        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!(
            !store
                .set_if_not_exists("k", "other", Duration::from_secs(2))
                .await
                .unwrap()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn release_of_expired_entry_reports_not_owner() {
        let store = MemoryLockStore::new();
        store
            .set_if_not_exists("k", "tok", Duration::from_secs(1))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;

        let res = store
            .eval_atomic(AtomicScript::Release, &["k"], &["tok"])
            .await
            .unwrap();
        assert_eq!(res, 0, "an expired lease is gone, even for its owner");
    }

    #[tokio::test]
    async fn renew_rejects_foreign_token_without_mutation() {
        let store = MemoryLockStore::new();
        store
            .set_if_not_exists("k", "tok", Duration::from_secs(60))
            .await
            .unwrap();

        let res = store
            .eval_atomic(AtomicScript::Renew, &["k"], &["intruder", "60000"])
            .await
            .unwrap();
        assert_eq!(res, 0);

        // Owner still holds the key.
        let res = store
            .eval_atomic(AtomicScript::Release, &["k"], &["tok"])
            .await
            .unwrap();
        assert_eq!(res, 1);
    }
}
