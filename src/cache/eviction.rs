//! Eviction Manager Module
//!
//! Enforces an optional maximum entry count after each write: expired rows
//! are reclaimed first, and only if the store is still over budget is the
//! single oldest entry deleted.

use chrono::Utc;
use tracing::debug;

use crate::backend::{Backend, PurgeFilter};
use crate::error::Result;

// == Evictor ==
/// Enforces the configured maximum entry count.
#[derive(Debug, Clone, Copy)]
pub struct Evictor {
    max_entries: u64,
}

impl Evictor {
    /// Creates an Evictor with the given entry cap.
    pub fn new(max_entries: u64) -> Self {
        Self { max_entries }
    }

    // == Enforce ==
    /// Runs one enforcement round against the backing store.
    ///
    /// If the total row count (expired rows included) exceeds the cap, an
    /// unscoped expired-entry purge runs first. If the store is still over
    /// budget, exactly one row is deleted: the oldest by creation time.
    ///
    /// One round per write means sustained write pressure converges on the
    /// cap gradually rather than being clamped in a single call.
    ///
    /// Returns true when an entry was evicted.
    pub async fn enforce(&self, backend: &dyn Backend) -> Result<bool> {
        if backend.count(None, true).await? <= self.max_entries {
            return Ok(false);
        }

        let purged = backend
            .delete_where(&PurgeFilter::expired(Utc::now()))
            .await?;
        if purged > 0 {
            debug!(purged, "reclaimed expired entries before eviction");
        }
        if backend.count(None, true).await? <= self.max_entries {
            return Ok(false);
        }

        let mut evicted = false;
        for key in backend.oldest_keys(1).await? {
            backend.delete(&key).await?;
            evicted = true;
        }
        Ok(evicted)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::backend::SqliteBackend;
    use crate::cache::Entry;

    fn backend() -> SqliteBackend {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend.create_schema().unwrap();
        backend
    }

    fn entry(key: &[u8], age_secs: i64) -> Entry {
        Entry {
            key: key.to_vec(),
            value: b"1".to_vec(),
            compression: None,
            version: None,
            created_at: Utc::now() - Duration::seconds(age_secs),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_under_cap_is_untouched() {
        let backend = backend();
        backend.upsert(&entry(b"a", 10)).await.unwrap();

        let evicted = Evictor::new(2).enforce(&backend).await.unwrap();
        assert!(!evicted);
        assert_eq!(backend.count(None, true).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_expired_rows_reclaimed_before_eviction() {
        let backend = backend();
        let mut stale = entry(b"stale", 30);
        stale.expires_at = Some(Utc::now() - Duration::seconds(1));
        backend.upsert(&stale).await.unwrap();
        backend.upsert(&entry(b"a", 20)).await.unwrap();
        backend.upsert(&entry(b"b", 10)).await.unwrap();

        // Cleanup alone brings the store under the cap; no live row dies
        let evicted = Evictor::new(2).enforce(&backend).await.unwrap();
        assert!(!evicted);
        assert!(backend.get(b"stale").await.unwrap().is_none());
        assert!(backend.get(b"a").await.unwrap().is_some());
        assert!(backend.get(b"b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_oldest_entry_evicted_when_cleanup_not_enough() {
        let backend = backend();
        backend.upsert(&entry(b"oldest", 30)).await.unwrap();
        backend.upsert(&entry(b"mid", 20)).await.unwrap();
        backend.upsert(&entry(b"newest", 10)).await.unwrap();

        let evicted = Evictor::new(2).enforce(&backend).await.unwrap();
        assert!(evicted);
        assert!(backend.get(b"oldest").await.unwrap().is_none());
        assert_eq!(backend.count(None, true).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_single_round_deletes_one_row() {
        let backend = backend();
        for (i, key) in [&b"a"[..], b"b", b"c", b"d"].iter().enumerate() {
            backend
                .upsert(&entry(key, 40 - i as i64 * 10))
                .await
                .unwrap();
        }

        // Two over budget: one round only reclaims a single entry
        Evictor::new(2).enforce(&backend).await.unwrap();
        assert_eq!(backend.count(None, true).await.unwrap(), 3);
    }
}
