use std::time::Duration;

use async_trait::async_trait;

use crate::error::LockError;

/// Identifier for one of the store's ownership-checked atomic procedures.
///
/// Backends map each variant to a server-side script (or an equivalent
/// native compare-and-act primitive) that runs as a single indivisible unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomicScript {
    /// "If the value at the key equals the token, delete the key and
    /// return 1; otherwise return 0."
    Release,
    /// "If the value at the key equals the token, reset its TTL to the
    /// given duration and return 1; otherwise return 0."
    Renew,
}

/// Capability the lock protocol requires from a key-value store.
///
/// # Atomicity
///
/// Both operations must execute atomically at the store: no partial
/// application may be visible to other callers. On Redis this means Lua
/// scripts; a store without scripting must offer a native ownership-checked
/// compare-and-delete / compare-and-expire primitive instead.
///
/// # Error classification
///
/// Every error a backend returns is treated as **definitive**
/// ([`LockError::StoreUnavailable`]). Deadlines are imposed by the core with
/// `tokio::time::timeout` around the store future, so an ambiguous
/// "no answer in time" outcome ([`LockError::Timeout`]) never depends on the
/// backend client library's own error taxonomy.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Atomically set `key` to `value` with the given TTL if the key does
    /// not already exist.
    ///
    /// Returns `true` if the key was set. An existing key whose stored value
    /// already equals `value` also counts as success, with the TTL reset:
    /// an acquisition attempt repeated after an ambiguous timeout is
    /// idempotent for the same token. An existing key under a different
    /// value is never overwritten; the call returns `false`.
    async fn set_if_not_exists(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, LockError>;

    /// Run one of the ownership-checked atomic procedures.
    ///
    /// `keys` carries the lock key; `args` carries the owner token and, for
    /// [`AtomicScript::Renew`], the new TTL in milliseconds. Returns the
    /// script's integer result: 1 = ownership matched and the action was
    /// applied, 0 = not owner (nothing mutated).
    async fn eval_atomic(
        &self,
        script: AtomicScript,
        keys: &[&str],
        args: &[&str],
    ) -> Result<i64, LockError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify the store seam stays object safe.
    fn _assert_dyn_lock_store(_: &dyn LockStore) {}
}
