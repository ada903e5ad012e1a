//! In-memory [`LockStore`] backend.
//!
//! Backs the lock protocol with a process-local [`DashMap`], mainly for
//! tests and single-process deployments. TTL expiry is lazy: an expired
//! entry is treated as absent and evicted on the next touch of its key.
//! Timekeeping uses [`tokio::time::Instant`], so paused-time tests advance
//! leases deterministically.
//!
//! [`LockStore`]: leaselock::LockStore

mod store;

pub use store::MemoryLockStore;
