//! Backing Store Module
//!
//! The narrow interface between the cache engine and the durable store,
//! plus the concrete SQLite implementation.
//!
//! All cross-caller coordination happens through the store's own atomicity
//! primitives: upserts absorb duplicate-insert races, increments are
//! single-statement adds, and deletes are idempotent, so the engine never
//! needs locks of its own.

mod sqlite;

pub use sqlite::{Durability, SqliteBackend};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::cache::Entry;
use crate::error::Result;

// == Purge Filter ==
/// Bulk-delete predicate: rows that are expired as of an instant OR created
/// before a cutoff, optionally restricted to one namespace.
///
/// With only a namespace set, every row in the namespace matches. With
/// nothing set, nothing matches; whole-store wipes go through
/// [`Backend::truncate`].
#[derive(Debug, Clone, Default)]
pub struct PurgeFilter {
    /// Match rows whose `expires_at` is set and at or before this instant
    pub expired_at: Option<DateTime<Utc>>,
    /// Match rows whose `created_at` is strictly before this cutoff
    pub created_before: Option<DateTime<Utc>>,
    /// Restrict matches to keys under this namespace prefix
    pub namespace: Option<String>,
}

impl PurgeFilter {
    /// Filter matching every row expired as of `now`.
    pub fn expired(now: DateTime<Utc>) -> Self {
        Self {
            expired_at: Some(now),
            ..Self::default()
        }
    }

    /// Filter matching every row in a namespace.
    pub fn namespace(namespace: &str) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            ..Self::default()
        }
    }
}

// == Backend Trait ==
/// Operations the cache engine requires from a durable store.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Point lookup. Raw read: no expiry filtering.
    async fn get(&self, key: &[u8]) -> Result<Option<Entry>>;

    /// Bulk lookup by key set, one round trip. Order of the returned rows
    /// is unspecified; absent keys are simply missing from the result.
    async fn get_many(&self, keys: &[Vec<u8>]) -> Result<Vec<Entry>>;

    /// Inserts a new row or overwrites an existing row's value, version,
    /// expiry and compression tag in one atomic operation. `created_at` is
    /// preserved on overwrite. A uniqueness conflict caused by a concurrent
    /// insert of the same key resolves as success, never as an error.
    async fn upsert(&self, entry: &Entry) -> Result<()>;

    /// Batched [`Backend::upsert`] with the same per-row guarantees. Rows
    /// not yet present are inserted with their given `created_at`.
    async fn upsert_many(&self, entries: &[Entry]) -> Result<()>;

    /// Removes the row if present. Removing an absent key is not an error.
    async fn delete(&self, key: &[u8]) -> Result<()>;

    /// Bulk delete of rows matching the filter. Returns the number deleted.
    async fn delete_where(&self, filter: &PurgeFilter) -> Result<usize>;

    /// Counts rows, fresh-only unless `include_expired`, optionally scoped
    /// to a namespace.
    async fn count(&self, namespace: Option<&str>, include_expired: bool) -> Result<u64>;

    /// Removes every row, without iterating them.
    async fn truncate(&self) -> Result<()>;

    /// Returns up to `limit` keys ordered by `created_at` ascending.
    async fn oldest_keys(&self, limit: usize) -> Result<Vec<Vec<u8>>>;

    /// If the key is absent, inserts `initial` as-is; if present, adds
    /// `delta` to the stored numeric bytes in one atomic statement, never
    /// read-then-write. Stored bytes that do not parse as an integer are
    /// treated as zero by the store's arithmetic.
    async fn atomic_add(&self, initial: &Entry, delta: i64) -> Result<()>;
}
