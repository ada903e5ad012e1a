use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::LockError;
use crate::store::{AtomicScript, LockStore};

/// A successfully acquired lease on a lock key.
///
/// Created only by [`LockClient`](crate::LockClient) acquisition; terminated
/// by [`release`](Lock::release) or by the renewal loop observing the lease
/// is gone. Dropping a handle without releasing is safe: the key expires at
/// the store after its TTL.
///
/// Handles obtained from a deduplicated acquisition are shared between the
/// callers that joined the same in-flight attempt; those callers must
/// coordinate release among themselves.
pub struct Lock {
    store: Arc<dyn LockStore>,
    key: String,
    token: String,
    lease: Duration,
    stop: CancellationToken,
}

impl Lock {
    pub(crate) fn new(store: Arc<dyn LockStore>, key: String, token: String, lease: Duration) -> Self {
        Self {
            store,
            key,
            token,
            lease,
            stop: CancellationToken::new(),
        }
    }

    /// The lock key this lease covers.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The lease duration each renewal resets the key's TTL to.
    pub fn lease(&self) -> Duration {
        self.lease
    }

    /// The opaque ownership token stored at the key for this lease.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Release the lease.
    ///
    /// The handle is terminal afterwards whether or not the store still held
    /// our token: any running [`auto_renew`](Lock::auto_renew) loop is
    /// signalled to stop in every outcome.
    ///
    /// # Errors
    ///
    /// [`LockError::NotOwner`] if the key was absent or held under a
    /// different token: the lease was already lost, and the caller must not
    /// assume its critical section was protected up to this point.
    pub async fn release(&self) -> Result<(), LockError> {
        let res = self
            .store
            .eval_atomic(AtomicScript::Release, &[&self.key], &[&self.token])
            .await;
        self.stop.cancel();

        match res? {
            1 => Ok(()),
            _ => Err(LockError::NotOwner),
        }
    }

    /// Reset the key's TTL to the lease duration, once.
    ///
    /// # Errors
    ///
    /// [`LockError::NotOwner`] if the stored token no longer matches;
    /// renewal never resurrects a lease another process now owns.
    pub async fn renew_once(&self) -> Result<(), LockError> {
        let ttl_ms = self.lease.as_millis().to_string();
        let res = self
            .store
            .eval_atomic(AtomicScript::Renew, &[&self.key], &[&self.token, &ttl_ms])
            .await?;

        match res {
            1 => Ok(()),
            _ => Err(LockError::NotOwner),
        }
    }

    /// Periodically renew the lease until released or until renewal becomes
    /// impossible.
    ///
    /// Every `interval`, attempts [`renew_once`](Lock::renew_once) bounded
    /// by `renew_timeout`. A timed-out renewal is retried immediately with
    /// no backoff: failing to extend the lease before it expires breaks
    /// exclusivity, so renewal is time-critical. The loop stays responsive
    /// to [`release`](Lock::release) both between ticks and while a renewal
    /// is in flight.
    ///
    /// Returns `Ok(())` on a clean stop via `release`.
    ///
    /// # Errors
    ///
    /// [`LockError::NotOwner`] once the lease is gone, or
    /// [`LockError::StoreUnavailable`] on a definitive store failure.
    pub async fn auto_renew(
        &self,
        interval: Duration,
        renew_timeout: Duration,
    ) -> Result<(), LockError> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the lease was just set.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = self.stop.cancelled() => return Ok(()),
                _ = ticker.tick() => {}
            }

            // Renew until it succeeds or fails terminally, retrying
            // timeouts immediately.
            loop {
                tokio::select! {
                    () = self.stop.cancelled() => return Ok(()),
                    res = tokio::time::timeout(renew_timeout, self.renew_once()) => {
                        match res {
                            Err(_elapsed) => {
                                warn!(key = %self.key, "lease renewal timed out; retrying");
                            }
                            Ok(Ok(())) => {
                                debug!(key = %self.key, "lease renewed");
                                break;
                            }
                            Ok(Err(e)) => return Err(e),
                        }
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for Lock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lock")
            .field("key", &self.key)
            .field("lease", &self.lease)
            .finish_non_exhaustive()
    }
}
