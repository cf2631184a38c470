//! Cache Engine Module
//!
//! Orchestrates key normalization, entry encoding, and the backing store to
//! implement the full cache operation surface, applying expiry and version
//! policy and absorbing concurrent write races through the store's upsert
//! contract.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{Backend, PurgeFilter};
use crate::cache::{codec, key, CacheStats, Compression, Entry, Evictor, StatsSnapshot};
use crate::config::Config;
use crate::error::{Result, StoreError};

// == Operation Options ==
/// Options applied to read-side operations.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Namespace partitioning the key space
    pub namespace: Option<String>,
    /// Version tag the stored entry must not conflict with
    pub version: Option<String>,
}

/// Options applied to write-side operations.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Namespace partitioning the key space
    pub namespace: Option<String>,
    /// Version tag recorded on the entry
    pub version: Option<String>,
    /// Relative TTL; the store default applies when neither this nor
    /// `expires_at` is given
    pub expires_in: Option<Duration>,
    /// Absolute expiration instant; wins over `expires_in` when both are set
    pub expires_at: Option<DateTime<Utc>>,
}

// == Cache Store ==
/// Durable cache store engine.
///
/// Every instance is independent; instances coordinate only through the
/// shared backing store, whose atomic upsert and add primitives make
/// concurrent writers safe without in-process locking.
pub struct CacheStore {
    backend: Arc<dyn Backend>,
    compression: Option<Compression>,
    default_ttl: Option<Duration>,
    evictor: Option<Evictor>,
    auto_cleanup: bool,
    stats: CacheStats,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new CacheStore on top of a backing store.
    ///
    /// # Errors
    /// Fails immediately with `UnsupportedCompression` when the configured
    /// scheme name is unknown, rather than lazily at first write.
    pub fn new(backend: Arc<dyn Backend>, config: Config) -> Result<Self> {
        let compression = match &config.compression {
            Some(name) => Some(Compression::from_name(name)?),
            None => None,
        };
        Ok(Self {
            backend,
            compression,
            default_ttl: config.default_ttl.map(Duration::from_secs),
            evictor: config.max_entries.map(Evictor::new),
            auto_cleanup: config.auto_cleanup,
            stats: CacheStats::new(),
        })
    }

    // == Read ==
    /// Retrieves a value by name.
    ///
    /// Absent, expired, and version-mismatched entries all read as `None`.
    /// An expired row is left in place for `cleanup` to reclaim; a version
    /// mismatch never deletes.
    pub async fn read<T: DeserializeOwned>(
        &self,
        name: &str,
        opts: &ReadOptions,
    ) -> Result<Option<T>> {
        let key = key::normalize(name, opts.namespace.as_deref())?;
        let Some(entry) = self.backend.get(&key).await? else {
            self.stats.record_miss();
            return Ok(None);
        };
        if entry.is_expired() || entry.mismatched(opts.version.as_deref()) {
            self.stats.record_miss();
            return Ok(None);
        }
        let value = decode_entry(&entry)?;
        self.stats.record_hit();
        Ok(Some(value))
    }

    // == Exists ==
    /// Checks whether a fresh, version-compatible entry is stored under the
    /// name. A stored null value still exists.
    pub async fn exists(&self, name: &str, opts: &ReadOptions) -> Result<bool> {
        let key = key::normalize(name, opts.namespace.as_deref())?;
        let Some(entry) = self.backend.get(&key).await? else {
            return Ok(false);
        };
        Ok(!entry.is_expired() && !entry.mismatched(opts.version.as_deref()))
    }

    // == Write ==
    /// Stores a value under a name, overwriting any existing entry.
    ///
    /// A race with a concurrent insert of the same key is absorbed by the
    /// backing store's upsert; both writers succeed and one value survives.
    pub async fn write<T: Serialize>(
        &self,
        name: &str,
        value: &T,
        opts: &WriteOptions,
    ) -> Result<()> {
        let entry = self.build_entry(name, value, opts)?;
        self.backend.upsert(&entry).await?;
        debug!(name, "wrote cache entry");
        self.after_write().await
    }

    // == Delete ==
    /// Removes an entry by name. Succeeds whether or not the key existed.
    pub async fn delete(&self, name: &str, namespace: Option<&str>) -> Result<()> {
        let key = key::normalize(name, namespace)?;
        self.backend.delete(&key).await?;
        debug!(name, "deleted cache entry");
        if self.auto_cleanup {
            self.backend
                .delete_where(&PurgeFilter::expired(Utc::now()))
                .await?;
        }
        Ok(())
    }

    // == Read Many ==
    /// Retrieves several values in one backing-store round trip.
    ///
    /// Returns only the hits, as `(name, value)` pairs preserving the
    /// caller's requested order. Expired rows found during the pass are
    /// deleted eagerly, since the scan already paid for finding them.
    /// Rows that fail to decode are skipped with a warning; one bad row
    /// never aborts the rest of the batch.
    pub async fn read_many<T: DeserializeOwned>(
        &self,
        names: &[&str],
        opts: &ReadOptions,
    ) -> Result<Vec<(String, T)>> {
        let mut keyed = Vec::with_capacity(names.len());
        for name in names {
            keyed.push((key::normalize(name, opts.namespace.as_deref())?, *name));
        }

        let keys: Vec<Vec<u8>> = keyed.iter().map(|(key, _)| key.clone()).collect();
        let rows = self.backend.get_many(&keys).await?;
        let by_key: HashMap<&[u8], &Entry> =
            rows.iter().map(|entry| (entry.key.as_slice(), entry)).collect();

        let mut results = Vec::new();
        for (key, name) in &keyed {
            let Some(entry) = by_key.get(key.as_slice()).copied() else {
                self.stats.record_miss();
                continue;
            };
            if entry.is_expired() {
                self.backend.delete(key).await?;
                self.stats.record_miss();
                continue;
            }
            if entry.mismatched(opts.version.as_deref()) {
                self.stats.record_miss();
                continue;
            }
            match decode_entry::<T>(entry) {
                Ok(value) => {
                    self.stats.record_hit();
                    results.push((name.to_string(), value));
                }
                Err(err) => {
                    warn!(name = %name, %err, "skipping undecodable entry in bulk read");
                    self.stats.record_miss();
                }
            }
        }
        Ok(results)
    }

    // == Write Many ==
    /// Stores several values in one batched upsert. Entries not yet present
    /// are created with a fresh creation timestamp.
    pub async fn write_many<T: Serialize>(
        &self,
        entries: &[(&str, T)],
        opts: &WriteOptions,
    ) -> Result<()> {
        let mut rows = Vec::with_capacity(entries.len());
        for (name, value) in entries {
            rows.push(self.build_entry(name, value, opts)?);
        }
        self.backend.upsert_many(&rows).await?;
        debug!(count = rows.len(), "wrote cache entries in bulk");
        self.after_write().await
    }

    // == Increment ==
    /// Atomically adds `delta` to the counter stored under the name,
    /// creating it with `delta` as the initial value when absent.
    ///
    /// Counters live as plain decimal bytes so the backing store's native
    /// arithmetic can add to them in place: no decode/re-encode round trip,
    /// and never any compression.
    pub async fn increment(&self, name: &str, delta: i64, opts: &WriteOptions) -> Result<()> {
        let key = key::normalize(name, opts.namespace.as_deref())?;
        let now = Utc::now();
        let initial = Entry {
            key,
            value: delta.to_string().into_bytes(),
            compression: None,
            version: opts.version.clone(),
            created_at: now,
            expires_at: self.resolve_expiry(opts, now),
        };
        self.backend.atomic_add(&initial, delta).await?;
        self.after_write().await
    }

    // == Decrement ==
    /// Atomically subtracts `delta` from the counter stored under the name.
    pub async fn decrement(&self, name: &str, delta: i64, opts: &WriteOptions) -> Result<()> {
        self.increment(name, -delta, opts).await
    }

    // == Cleanup ==
    /// Deletes every expired entry, plus entries created before
    /// `older_than` when given, optionally scoped to one namespace.
    ///
    /// Returns the number of entries deleted.
    pub async fn cleanup(
        &self,
        namespace: Option<&str>,
        older_than: Option<DateTime<Utc>>,
    ) -> Result<usize> {
        let filter = PurgeFilter {
            expired_at: Some(Utc::now()),
            created_before: older_than,
            namespace: namespace.map(String::from),
        };
        let deleted = self.backend.delete_where(&filter).await?;
        if deleted > 0 {
            info!(deleted, "cleanup removed entries");
        }
        Ok(deleted)
    }

    // == Clear ==
    /// Removes every entry in the namespace, or the entire store when no
    /// namespace is given (via table truncation rather than row deletes).
    pub async fn clear(&self, namespace: Option<&str>) -> Result<()> {
        match namespace {
            Some(ns) => {
                self.backend.delete_where(&PurgeFilter::namespace(ns)).await?;
            }
            None => self.backend.truncate().await?,
        }
        info!(namespace = namespace.unwrap_or("<all>"), "cleared cache");
        Ok(())
    }

    // == Count ==
    /// Counts stored entries, fresh-only unless `include_expired`.
    pub async fn count(&self, namespace: Option<&str>, include_expired: bool) -> Result<u64> {
        self.backend.count(namespace, include_expired).await
    }

    // == Stats ==
    /// Returns a snapshot of the hit/miss/eviction counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn build_entry<T: Serialize>(&self, name: &str, value: &T, opts: &WriteOptions) -> Result<Entry> {
        let key = key::normalize(name, opts.namespace.as_deref())?;
        let json = serde_json::to_value(value)?;
        let (payload, compression) = codec::encode(&json, self.compression)?;
        let now = Utc::now();
        Ok(Entry {
            key,
            value: payload,
            compression,
            version: opts.version.clone(),
            created_at: now,
            expires_at: self.resolve_expiry(opts, now),
        })
    }

    fn resolve_expiry(&self, opts: &WriteOptions, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if opts.expires_at.is_some() {
            return opts.expires_at;
        }
        opts.expires_in
            .or(self.default_ttl)
            .map(|ttl| now + chrono::Duration::milliseconds(ttl.as_millis() as i64))
    }

    async fn after_write(&self) -> Result<()> {
        if self.auto_cleanup {
            let purged = self
                .backend
                .delete_where(&PurgeFilter::expired(Utc::now()))
                .await?;
            if purged > 0 {
                debug!(purged, "auto-cleanup purged expired entries");
            }
        }
        if let Some(evictor) = &self.evictor {
            if evictor.enforce(self.backend.as_ref()).await? {
                self.stats.record_eviction();
                info!("evicted oldest entry to enforce the size cap");
            }
        }
        Ok(())
    }
}

fn decode_entry<T: DeserializeOwned>(entry: &Entry) -> Result<T> {
    let value = codec::decode(&entry.value, entry.compression.as_deref())?;
    serde_json::from_value(value).map_err(StoreError::from)
}
