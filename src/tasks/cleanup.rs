//! Expiry Cleanup Task
//!
//! Background task that periodically removes expired cache entries from the
//! backing store.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;

/// Spawns a background task that periodically purges expired entries.
///
/// The task runs in an infinite loop, sleeping for the specified interval
/// between cleanup runs. Cleanup is idempotent and race-safe, so several
/// processes sharing one backing store may each run their own task.
///
/// # Arguments
/// * `store` - Shared cache store to clean
/// * `cleanup_interval_secs` - Interval in seconds between cleanup runs
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_cleanup_task(store: Arc<CacheStore>, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting expiry cleanup task with interval of {} seconds",
            cleanup_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            match store.cleanup(None, None).await {
                Ok(removed) if removed > 0 => {
                    info!("Expiry cleanup: removed {} expired entries", removed);
                }
                Ok(_) => {
                    debug!("Expiry cleanup: no expired entries found");
                }
                Err(err) => {
                    warn!("Expiry cleanup failed: {}", err);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::backend::SqliteBackend;
    use crate::cache::WriteOptions;
    use crate::config::Config;

    fn store() -> Arc<CacheStore> {
        let backend = Arc::new(SqliteBackend::open_in_memory().unwrap());
        backend.create_schema().unwrap();
        Arc::new(CacheStore::new(backend, Config::default()).unwrap())
    }

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let store = store();

        let opts = WriteOptions {
            expires_at: Some(Utc::now() - chrono::Duration::seconds(1)),
            ..WriteOptions::default()
        };
        store.write("expired", &"value", &opts).await.unwrap();
        assert_eq!(store.count(None, true).await.unwrap(), 1);

        let handle = spawn_cleanup_task(store.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(store.count(None, true).await.unwrap(), 0);
        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_valid_entries() {
        let store = store();

        let opts = WriteOptions {
            expires_in: Some(Duration::from_secs(3600)),
            ..WriteOptions::default()
        };
        store.write("long_lived", &"value", &opts).await.unwrap();

        let handle = spawn_cleanup_task(store.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let value: Option<String> = store
            .read("long_lived", &Default::default())
            .await
            .unwrap();
        assert_eq!(value.as_deref(), Some("value"));
        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let handle = spawn_cleanup_task(store(), 1);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
