//! Table Warm-up Task
//!
//! Background task that resolves the backing table at startup, retrying
//! transient failures until the table is ready or a fatal verdict is reached.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cache::DistributedCache;

/// Spawns a background task that resolves the cache's backing table.
///
/// The task stops once the table is ready, when resolution fails fatally
/// (schema mismatch, missing table under `RequireExisting`) or when
/// `shutdown` is cancelled. Cache operations keep resolving lazily on their
/// own, so the server is usable while this task is still retrying.
///
/// # Arguments
/// * `cache` - shared cache engine
/// * `retry_interval_secs` - seconds to wait between failed attempts
/// * `shutdown` - token cancelled during graceful shutdown
pub fn spawn_warmup_task(
    cache: Arc<DistributedCache>,
    retry_interval_secs: u64,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(retry_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Resolving table '{}' in the background",
            cache.options().table_name
        );

        loop {
            match cache.ensure_ready_with_cancel(&shutdown).await {
                Ok(()) => return,
                Err(err) if err.is_fatal() => {
                    error!("Table warm-up stopped: {}", err);
                    return;
                }
                Err(_) if shutdown.is_cancelled() => return,
                Err(err) => warn!(
                    "Table warm-up failed, retrying in {} seconds: {}",
                    interval.as_secs(),
                    err
                ),
            }

            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheOptions, CreationPolicy};
    use crate::store::{InMemoryTableStore, StoreError, StoreOperation};

    fn cache_over(store: &Arc<InMemoryTableStore>, options: CacheOptions) -> Arc<DistributedCache> {
        Arc::new(DistributedCache::new(store.clone(), options).unwrap())
    }

    fn fast_polling() -> CacheOptions {
        CacheOptions::new("cache").with_table_polling(Duration::from_millis(1), Some(10))
    }

    #[tokio::test]
    async fn test_warmup_resolves_table() {
        let store = Arc::new(InMemoryTableStore::with_activation_delay(2));
        let cache = cache_over(&store, fast_polling());

        let handle = spawn_warmup_task(cache.clone(), 1, CancellationToken::new());
        handle.await.unwrap();

        assert!(cache.is_ready());
        assert_eq!(store.call_counts().create_table, 1);
    }

    #[tokio::test]
    async fn test_warmup_retries_transient_failure() {
        let store = Arc::new(InMemoryTableStore::new());
        store.inject_fault(
            StoreOperation::DescribeTable,
            StoreError::Unavailable("starting".to_string()),
        );
        let cache = cache_over(&store, fast_polling());

        let handle = spawn_warmup_task(cache.clone(), 1, CancellationToken::new());
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("warm-up should finish after one retry")
            .unwrap();

        assert!(cache.is_ready());
    }

    #[tokio::test]
    async fn test_warmup_stops_on_fatal_error() {
        let store = Arc::new(InMemoryTableStore::new());
        let cache = cache_over(
            &store,
            fast_polling().with_creation_policy(CreationPolicy::RequireExisting),
        );

        let handle = spawn_warmup_task(cache.clone(), 1, CancellationToken::new());
        handle.await.unwrap();

        assert!(!cache.is_ready());
        assert_eq!(store.call_counts().describe_table, 1);
    }

    #[tokio::test]
    async fn test_warmup_stops_on_shutdown() {
        let store = Arc::new(InMemoryTableStore::with_activation_delay(u32::MAX));
        let options = CacheOptions::new("cache").with_table_polling(Duration::from_millis(5), None);
        let cache = cache_over(&store, options);
        let shutdown = CancellationToken::new();

        let handle = spawn_warmup_task(cache.clone(), 1, shutdown.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("warm-up should stop on shutdown")
            .unwrap();
        assert!(!cache.is_ready());
    }
}
