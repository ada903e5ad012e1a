//! Per-key request coalescing.
//!
//! While one call for a key is in flight, further calls for the same key
//! wait for its result instead of starting their own. Callers that arrive
//! after the in-flight call resolves start a fresh one.

use std::future::Future;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// A registry of in-flight calls keyed by string.
///
/// `T` must be `Clone`: every waiter receives its own copy of the leader's
/// result.
pub struct SingleFlight<T: Clone + Send + 'static> {
    inflight: DashMap<String, broadcast::Sender<T>>,
}

impl<T: Clone + Send + 'static> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            inflight: DashMap::new(),
        }
    }
}

impl<T: Clone + Send + 'static> SingleFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` for `key`, unless a call for the same key is already in
    /// flight, in which case wait for that call's result.
    ///
    /// Returns `None` if `cancel` fires while waiting on another caller's
    /// attempt. The leader's own cancellation is whatever `work` produces;
    /// if the leader's future is dropped instead, waiters observe the
    /// channel closing and elect a new leader among themselves.
    pub async fn run<F, Fut>(&self, key: &str, cancel: &CancellationToken, work: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let tx = loop {
            match self.inflight.entry(key.to_owned()) {
                Entry::Occupied(entry) => {
                    let mut rx = entry.get().subscribe();
                    drop(entry);
                    tokio::select! {
                        res = rx.recv() => match res {
                            Ok(value) => return Some(value),
                            // Leader vanished without sending; try to take over.
                            Err(_) => {}
                        },
                        () = cancel.cancelled() => return None,
                    }
                }
                Entry::Vacant(entry) => {
                    let (tx, _rx) = broadcast::channel(1);
                    entry.insert(tx.clone());
                    break tx;
                }
            }
        };

        // Leader path. The guard unregisters the flight even if this future
        // is dropped mid-work, closing the channel for waiters.
        let flight = FlightGuard {
            inflight: &self.inflight,
            key,
        };
        let value = work().await;
        drop(flight);
        // Waiters subscribed while the entry existed; late arrivals start a
        // fresh flight. Nobody listening is fine.
        let _ = tx.send(value.clone());
        Some(value)
    }
}

struct FlightGuard<'a, T: Clone + Send + 'static> {
    inflight: &'a DashMap<String, broadcast::Sender<T>>,
    key: &'a str,
}

impl<T: Clone + Send + 'static> Drop for FlightGuard<'_, T> {
    fn drop(&mut self) {
        self.inflight.remove(self.key);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_execution() {
        let flights = Arc::new(SingleFlight::<u64>::new());
        let executions = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flights = Arc::clone(&flights);
            let executions = Arc::clone(&executions);
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                flights
                    .run("k", &cancel, || async {
                        executions.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        42_u64
                    })
                    .await
            }));
        }

        for h in handles {
            assert_eq!(h.await.expect("task should not panic"), Some(42));
        }
        assert_eq!(executions.load(Ordering::SeqCst), 1, "one underlying call");
    }

    #[tokio::test]
    async fn sequential_callers_execute_separately() {
        let flights = SingleFlight::<u64>::new();
        let cancel = CancellationToken::new();
        let executions = AtomicUsize::new(0);

        for expected in [1, 2] {
            let res = flights
                .run("k", &cancel, || async {
                    executions.fetch_add(1, Ordering::SeqCst);
                    7_u64
                })
                .await;
            assert_eq!(res, Some(7));
            assert_eq!(executions.load(Ordering::SeqCst), expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn waiter_cancellation_returns_none() {
        let flights = Arc::new(SingleFlight::<u64>::new());
        let leader_cancel = CancellationToken::new();

        let leader = {
            let flights = Arc::clone(&flights);
            let cancel = leader_cancel.clone();
            tokio::spawn(async move {
                flights
                    .run("k", &cancel, || async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        1_u64
                    })
                    .await
            })
        };
        // Let the leader register its flight.
        tokio::task::yield_now().await;

        let waiter_cancel = CancellationToken::new();
        let waiter = {
            let flights = Arc::clone(&flights);
            let cancel = waiter_cancel.clone();
            tokio::spawn(async move { flights.run("k", &cancel, || async { 2_u64 }).await })
        };
        tokio::task::yield_now().await;

        waiter_cancel.cancel();
        assert_eq!(waiter.await.expect("waiter should not panic"), None);

        leader.abort();
        let _ = leader.await;
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_leader_hands_over_to_waiter() {
        let flights = Arc::new(SingleFlight::<u64>::new());
        let cancel = CancellationToken::new();

        let leader = {
            let flights = Arc::clone(&flights);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                flights
                    .run("k", &cancel, || async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        1_u64
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;

        let waiter = {
            let flights = Arc::clone(&flights);
            let cancel = cancel.clone();
            tokio::spawn(async move { flights.run("k", &cancel, || async { 2_u64 }).await })
        };
        tokio::task::yield_now().await;

        // Killing the leader must not strand the waiter; it becomes the new
        // leader and runs its own work.
        leader.abort();
        let _ = leader.await;
        assert_eq!(waiter.await.expect("waiter should not panic"), Some(2));
    }
}
