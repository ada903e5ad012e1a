use std::time::Duration;

use thiserror::Error;

/// Errors from lock acquisition, renewal, and release.
///
/// The enum is `Clone` so a deduplicated acquisition can hand the same
/// failure to every caller that shared the in-flight attempt.
#[derive(Debug, Clone, Error)]
pub enum LockError {
    /// The key is currently held under another owner token.
    ///
    /// Definitive: retried by [`LockClient::acquire`](crate::LockClient::acquire)
    /// per its retry strategy, surfaced as-is by
    /// [`try_acquire`](crate::LockClient::try_acquire).
    #[error("lock already held by another owner")]
    AlreadyLocked,

    /// The handle's token no longer matches the stored value: the lease
    /// expired, was released, or was re-acquired by someone else. The
    /// critical section must no longer be assumed protected.
    #[error("lock not held by this owner")]
    NotOwner,

    /// The store did not answer within the caller's deadline. The outcome
    /// is ambiguous: the operation may or may not have applied.
    #[error("store did not answer within {0:?}")]
    Timeout(Duration),

    /// Definitive connectivity or protocol failure at the store. Never
    /// retried; surfaced immediately.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The retry budget was consumed without a successful acquisition.
    /// Wraps the last per-attempt cause.
    #[error("retry budget exhausted")]
    Exhausted(#[source] Box<LockError>),

    /// Caller-initiated cancellation observed while waiting.
    #[error("cancelled while waiting for lock")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_preserves_cause() {
        let err = LockError::Exhausted(Box::new(LockError::Timeout(Duration::from_secs(1))));
        let source = std::error::Error::source(&err).expect("exhausted should carry a source");
        assert!(source.to_string().contains("did not answer"));
    }
}
