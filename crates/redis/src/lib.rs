//! Redis backend for the leaselock protocol.
//!
//! Implements [`LockStore`] with `SET NX PX`-style Lua scripts over a
//! `deadpool-redis` connection pool.
//!
//! # Lock consistency
//!
//! The guarantees depend on the Redis deployment:
//!
//! | Deployment | Mutual exclusion | Notes |
//! |------------|------------------|-------|
//! | Single instance | Strong | Full mutual exclusion guaranteed |
//! | Sentinel | Weak | Lease may be lost during failover |
//! | Cluster | Weak | Lease may be lost during failover |
//!
//! Redis replication is asynchronous: if a master fails right after an
//! acquisition but before the write reaches a replica, the promoted master
//! has no lock key and a second client can acquire the "same" lock. Use
//! this backend against a single instance, or where occasional duplicate
//! execution is tolerable.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use leaselock::LockClient;
//! use leaselock_redis::{RedisConfig, RedisLockStore};
//!
//! let store = RedisLockStore::new(&RedisConfig::new("redis://localhost:6379"))?;
//! let client = LockClient::new(Arc::new(store));
//! ```
//!
//! [`LockStore`]: leaselock::LockStore

mod config;
mod scripts;
mod store;

pub use config::RedisConfig;
pub use store::RedisLockStore;
