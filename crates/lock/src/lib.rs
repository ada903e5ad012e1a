//! Lease-based distributed mutual exclusion over an atomic key-value store.
//!
//! Independent processes coordinate exclusive access to a named resource
//! through a shared store that offers atomic set-if-not-exists and
//! ownership-checked scripted operations (a single-instance Redis-like
//! store). Ownership is proven by an opaque per-acquisition token; leases
//! expire at the store unless renewed, so a crashed holder never deadlocks
//! its competitors.
//!
//! # Components
//!
//! - [`LockClient`]: the acquisition engine. [`try_acquire`](LockClient::try_acquire)
//!   once, [`acquire`](LockClient::acquire) with retry/backoff, and
//!   [`acquire_deduped`](LockClient::acquire_deduped) collapsing concurrent
//!   callers for one key into a single underlying attempt.
//! - [`Lock`]: a held lease, with [`release`](Lock::release),
//!   [`renew_once`](Lock::renew_once), and the [`auto_renew`](Lock::auto_renew)
//!   watchdog loop that keeps a long critical section protected.
//! - [`RetryStrategy`] / [`FixedInterval`]: pluggable backoff policy.
//! - [`LockStore`]: the capability a backend store must provide; see
//!   `leaselock-redis` and `leaselock-memory` for implementations, and the
//!   [`testing`] module for the conformance suite backends run against
//!   themselves.
//!
//! # Guarantees
//!
//! Mutual exclusion holds as far as the backing store's atomicity does: on a
//! single store instance, at most one live handle exists per key until its
//! lease expires or is released. Only the owner token can release or renew;
//! a stale holder can never resurrect a lease someone else now owns. This is
//! not a consensus protocol: no fencing-token validation downstream, no
//! quorum across stores, no FIFO fairness among waiters.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use leaselock::{FixedInterval, LockClient};
//! use tokio_util::sync::CancellationToken;
//!
//! let client = LockClient::new(store);
//! let lock = client
//!     .acquire(
//!         "orders:reindex",
//!         Duration::from_secs(30),
//!         Duration::from_secs(1),
//!         FixedInterval::new(Duration::from_millis(100), 10),
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//!
//! // Critical section...
//!
//! lock.release().await?;
//! ```

pub mod client;
pub mod error;
pub mod lock;
pub mod retry;
pub mod singleflight;
pub mod store;
pub mod testing;

pub use client::LockClient;
pub use error::LockError;
pub use lock::Lock;
pub use retry::{FixedInterval, RetryStrategy};
pub use singleflight::SingleFlight;
pub use store::{AtomicScript, LockStore};
