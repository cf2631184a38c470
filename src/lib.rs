//! dbcache - A durable database-backed cache store
//!
//! Stores opaque values under string keys in a shared durable store, with
//! TTL expiration, namespace isolation, optional value versioning, optional
//! compression, atomic counters and size-bound eviction. Independent
//! processes may share one backing store; all coordination happens through
//! the store's own atomic primitives.

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use backend::{Backend, Durability, PurgeFilter, SqliteBackend};
pub use cache::{CacheStore, Entry, ReadOptions, StatsSnapshot, WriteOptions};
pub use config::Config;
pub use error::{Result, StoreError};
pub use tasks::spawn_cleanup_task;
