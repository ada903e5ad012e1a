//! Conformance test suite for [`LockStore`] backends.
//!
//! Call [`run_lock_conformance_tests`] from a backend's test module with a
//! fresh store instance. The suite exercises the whole protocol through
//! [`LockClient`], so it validates the backend's atomicity and ownership
//! semantics as observed by callers, not its wire details.

use std::sync::Arc;
use std::time::Duration;

use crate::client::LockClient;
use crate::error::LockError;
use crate::store::LockStore;

/// Run the full lock protocol conformance suite against `store`.
///
/// # Errors
///
/// Returns an error if any store call fails in a way the scenario does not
/// expect; assertion failures panic with a description of the violated
/// property.
pub async fn run_lock_conformance_tests(store: Arc<dyn LockStore>) -> Result<(), LockError> {
    let client = LockClient::new(store);
    test_acquire_contend_release(&client).await?;
    test_ownership_guard(&client).await?;
    test_stale_handle_cannot_touch_new_owner(&client).await?;
    test_renewal_extends_lifetime(&client).await?;
    test_watchdog_stops_cleanly_on_release(&client).await?;
    Ok(())
}

/// Acquire, contend, release, re-acquire.
async fn test_acquire_contend_release(client: &LockClient) -> Result<(), LockError> {
    let lease = Duration::from_secs(60);

    let first = client.try_acquire("conformance-basic", lease).await?;
    assert_eq!(first.key(), "conformance-basic");

    let second = client.try_acquire("conformance-basic", lease).await;
    assert!(
        matches!(second, Err(LockError::AlreadyLocked)),
        "second acquire before expiry must report AlreadyLocked"
    );

    first.release().await?;

    let third = client.try_acquire("conformance-basic", lease).await?;
    third.release().await?;
    Ok(())
}

/// A released handle can neither release nor renew again.
async fn test_ownership_guard(client: &LockClient) -> Result<(), LockError> {
    let lock = client
        .try_acquire("conformance-guard", Duration::from_secs(60))
        .await?;
    lock.release().await?;

    assert!(
        matches!(lock.release().await, Err(LockError::NotOwner)),
        "release after release must report NotOwner"
    );
    assert!(
        matches!(lock.renew_once().await, Err(LockError::NotOwner)),
        "renew after release must report NotOwner"
    );
    Ok(())
}

/// A stale handle must not mutate a key now held under another token.
async fn test_stale_handle_cannot_touch_new_owner(client: &LockClient) -> Result<(), LockError> {
    let lease = Duration::from_secs(60);

    let stale = client.try_acquire("conformance-stale", lease).await?;
    stale.release().await?;
    let current = client.try_acquire("conformance-stale", lease).await?;

    assert!(
        matches!(stale.release().await, Err(LockError::NotOwner)),
        "stale release must not delete the new owner's key"
    );
    assert!(
        matches!(stale.renew_once().await, Err(LockError::NotOwner)),
        "stale renew must not extend the new owner's lease"
    );

    // The current owner was untouched by either stale call.
    current.renew_once().await?;
    current.release().await?;
    Ok(())
}

/// Renewal keeps a short lease alive well past its original duration.
async fn test_renewal_extends_lifetime(client: &LockClient) -> Result<(), LockError> {
    let lease = Duration::from_secs(1);
    let lock = client.try_acquire("conformance-renew", lease).await?;

    for _ in 0..3 {
        tokio::time::sleep(Duration::from_millis(600)).await;
        lock.renew_once().await?;
        let competitor = client.try_acquire("conformance-renew", lease).await;
        assert!(
            matches!(competitor, Err(LockError::AlreadyLocked)),
            "renewed lock must stay exclusive past its original lease"
        );
    }

    lock.release().await?;
    Ok(())
}

/// The watchdog holds the lock until release, then returns cleanly.
async fn test_watchdog_stops_cleanly_on_release(client: &LockClient) -> Result<(), LockError> {
    let lease = Duration::from_secs(1);
    let lock = Arc::new(client.try_acquire("conformance-watchdog", lease).await?);

    let watchdog = {
        let lock = Arc::clone(&lock);
        tokio::spawn(async move {
            lock.auto_renew(Duration::from_millis(200), Duration::from_secs(5))
                .await
        })
    };

    // Hold past the original lease; the watchdog keeps it alive.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let competitor = client.try_acquire("conformance-watchdog", lease).await;
    assert!(
        matches!(competitor, Err(LockError::AlreadyLocked)),
        "watchdog must keep the lease alive past its original duration"
    );

    lock.release().await?;
    let outcome = watchdog.await.expect("watchdog task should not panic");
    assert!(
        outcome.is_ok(),
        "watchdog must stop cleanly on release, got {outcome:?}"
    );
    Ok(())
}
