use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::error::LockError;
use crate::lock::Lock;
use crate::retry::RetryStrategy;
use crate::singleflight::SingleFlight;
use crate::store::LockStore;

/// Entry point for acquiring locks against a [`LockStore`].
///
/// The client is cheap to share behind an `Arc`; the store capability is
/// stateless from its perspective and the only local mutable state is the
/// per-key deduplication registry.
pub struct LockClient {
    store: Arc<dyn LockStore>,
    flights: SingleFlight<Result<Arc<Lock>, LockError>>,
}

impl LockClient {
    pub fn new(store: Arc<dyn LockStore>) -> Self {
        Self {
            store,
            flights: SingleFlight::new(),
        }
    }

    /// Attempt to acquire `key` exactly once.
    ///
    /// A fresh ownership token is generated per call; the returned handle is
    /// the only holder of that token.
    ///
    /// # Errors
    ///
    /// [`LockError::AlreadyLocked`] if another owner currently holds the
    /// key, or [`LockError::StoreUnavailable`] on a store failure.
    pub async fn try_acquire(&self, key: &str, lease: Duration) -> Result<Lock, LockError> {
        let token = Uuid::new_v4().to_string();

        if self.store.set_if_not_exists(key, &token, lease).await? {
            Ok(Lock::new(
                Arc::clone(&self.store),
                key.to_owned(),
                token,
                lease,
            ))
        } else {
            Err(LockError::AlreadyLocked)
        }
    }

    /// Acquire `key`, retrying contended and timed-out attempts per
    /// `retry`.
    ///
    /// Each attempt is bounded by `attempt_timeout`. Contention
    /// (`AlreadyLocked`) and ambiguous timeouts are retryable; a definitive
    /// store failure aborts immediately without consulting the strategy,
    /// since it signals the store is unreachable rather than mere
    /// contention. One token is used across all attempts, so an attempt that
    /// applied at the store but timed out on the answer is recovered by the
    /// next attempt rather than contending with itself.
    ///
    /// # Errors
    ///
    /// [`LockError::Exhausted`] wrapping the last per-attempt cause once the
    /// retry budget runs out, [`LockError::Cancelled`] if `cancel` fires
    /// during an in-flight attempt or the wait between attempts, or
    /// [`LockError::StoreUnavailable`].
    pub async fn acquire<R: RetryStrategy>(
        &self,
        key: &str,
        lease: Duration,
        attempt_timeout: Duration,
        mut retry: R,
        cancel: &CancellationToken,
    ) -> Result<Lock, LockError> {
        let token = Uuid::new_v4().to_string();

        loop {
            // Cancellation must unblock a pending store call too, not just
            // the wait between attempts.
            let attempt = tokio::select! {
                () = cancel.cancelled() => return Err(LockError::Cancelled),
                res = tokio::time::timeout(
                    attempt_timeout,
                    self.store.set_if_not_exists(key, &token, lease),
                ) => res,
            };

            let cause = match attempt {
                Ok(Ok(true)) => {
                    return Ok(Lock::new(
                        Arc::clone(&self.store),
                        key.to_owned(),
                        token,
                        lease,
                    ));
                }
                Ok(Ok(false)) => LockError::AlreadyLocked,
                // Definitive store failure: not worth retrying.
                Ok(Err(e)) => return Err(e),
                Err(_elapsed) => LockError::Timeout(attempt_timeout),
            };

            let Some(wait) = retry.next() else {
                return Err(LockError::Exhausted(Box::new(cause)));
            };
            debug!(key, wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                   cause = %cause, "lock attempt failed; retrying");

            tokio::select! {
                () = cancel.cancelled() => return Err(LockError::Cancelled),
                () = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// [`acquire`](LockClient::acquire), deduplicated per key.
    ///
    /// Concurrent callers for the same key within one in-flight window share
    /// a single underlying acquisition: all of them receive the same
    /// `Arc<Lock>` on success or the same error on failure. Callers arriving
    /// after the in-flight attempt resolves start a fresh one. This reduces
    /// store load under thundering-herd contention but does not change lock
    /// semantics: callers sharing a handle share the lease and must
    /// coordinate its release themselves.
    ///
    /// # Errors
    ///
    /// As [`acquire`](LockClient::acquire); additionally
    /// [`LockError::Cancelled`] if `cancel` fires while waiting on another
    /// caller's in-flight attempt.
    pub async fn acquire_deduped<R: RetryStrategy>(
        &self,
        key: &str,
        lease: Duration,
        attempt_timeout: Duration,
        retry: R,
        cancel: &CancellationToken,
    ) -> Result<Arc<Lock>, LockError> {
        let shared = self
            .flights
            .run(key, cancel, || async {
                self.acquire(key, lease, attempt_timeout, retry, cancel)
                    .await
                    .map(Arc::new)
            })
            .await;

        match shared {
            Some(result) => result,
            None => Err(LockError::Cancelled),
        }
    }
}

impl std::fmt::Debug for LockClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockClient").finish_non_exhaustive()
    }
}
