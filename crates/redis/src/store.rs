use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::Script;

use leaselock::{AtomicScript, LockError, LockStore};

use crate::config::RedisConfig;
use crate::scripts;

/// Redis-backed [`LockStore`].
///
/// All operations run as Lua scripts so the ownership check and the
/// follow-up mutation are indivisible at the server. Keys are namespaced
/// under the configured prefix; TTLs travel in milliseconds (`PX` /
/// `PEXPIRE`).
///
/// Every pool or Redis error surfaces as [`LockError::StoreUnavailable`]:
/// deadlines are the caller's concern (see the [`LockStore`] contract), so
/// this backend never classifies its client library's errors as timeouts.
pub struct RedisLockStore {
    pool: Pool,
    prefix: String,
}

impl RedisLockStore {
    /// Create a new `RedisLockStore` from the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::StoreUnavailable`] if the pool cannot be
    /// created.
    pub fn new(config: &RedisConfig) -> Result<Self, LockError> {
        let cfg = Config::from_url(&config.url);
        let pool = cfg
            .builder()
            .map(|b| {
                b.max_size(config.pool_size)
                    .wait_timeout(Some(config.connection_timeout))
                    .runtime(Runtime::Tokio1)
                    .build()
            })
            .map_err(|e| LockError::StoreUnavailable(e.to_string()))?
            .map_err(|e| LockError::StoreUnavailable(e.to_string()))?;

        Ok(Self {
            pool,
            prefix: config.prefix.clone(),
        })
    }

    /// Build the full Redis key for a lock.
    fn lock_key(&self, key: &str) -> String {
        format!("{}:lock:{}", self.prefix, key)
    }

    /// Obtain a connection from the pool.
    async fn conn(&self) -> Result<deadpool_redis::Connection, LockError> {
        self.pool
            .get()
            .await
            .map_err(|e| LockError::StoreUnavailable(e.to_string()))
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn set_if_not_exists(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, LockError> {
        let redis_key = self.lock_key(key);
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);

        let mut conn = self.conn().await?;
        let result: i64 = Script::new(scripts::LEASE_ACQUIRE)
            .key(&redis_key)
            .arg(value)
            .arg(ttl_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| LockError::StoreUnavailable(e.to_string()))?;

        Ok(result == 1)
    }

    async fn eval_atomic(
        &self,
        script: AtomicScript,
        keys: &[&str],
        args: &[&str],
    ) -> Result<i64, LockError> {
        let source = match script {
            AtomicScript::Release => scripts::LEASE_RELEASE,
            AtomicScript::Renew => scripts::LEASE_RENEW,
        };

        let script = Script::new(source);
        let mut prepared = script.prepare_invoke();
        for key in keys {
            prepared.key(self.lock_key(key));
        }
        for arg in args {
            prepared.arg(*arg);
        }

        let mut conn = self.conn().await?;
        prepared
            .invoke_async(&mut conn)
            .await
            .map_err(|e| LockError::StoreUnavailable(e.to_string()))
    }
}

impl std::fmt::Debug for RedisLockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisLockStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::RedisConfig;

    fn test_config() -> RedisConfig {
        RedisConfig {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            prefix: format!("leaselock-test-{}", uuid::Uuid::new_v4()),
            ..RedisConfig::default()
        }
    }

    #[tokio::test]
    async fn lock_conformance() {
        let store = RedisLockStore::new(&test_config()).expect("pool creation should succeed");
        leaselock::testing::run_lock_conformance_tests(Arc::new(store))
            .await
            .expect("conformance tests should pass");
    }

    #[tokio::test]
    async fn unreachable_store_reports_unavailable() {
        // Nothing listens on this port; the pool wait/connect fails fast.
        let config = RedisConfig {
            url: String::from("redis://127.0.0.1:1"),
            connection_timeout: Duration::from_millis(200),
            ..RedisConfig::default()
        };
        let store = RedisLockStore::new(&config).expect("pool creation is lazy");

        let err = store
            .set_if_not_exists("k", "tok", Duration::from_secs(1))
            .await
            .expect_err("connecting should fail");
        assert!(matches!(err, LockError::StoreUnavailable(_)));
    }
}
