//! Cache Engine Module
//!
//! `DistributedCache` implements get / set / refresh / remove on top of a
//! [`TableStore`]. Every operation validates its input, resolves the backing
//! table on first use and then issues a single store call (plus, for reads,
//! an optional sliding refresh or expired-item cleanup).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{
    validate_key, validate_value, CacheItem, CacheStats, CacheStatsSnapshot, EntryOptions,
    ReadDecision,
};
use crate::clock::{Clock, SystemClock};
use crate::config::CacheOptions;
use crate::error::{CacheError, Result};
use crate::store::{cancellable, DeleteCondition, ItemProjection, StoreError, TableStore};
use crate::table::{ResolverPhase, TableDescriptor, TableResolver};

// == Distributed Cache ==
/// Byte cache backed by a schema-validated key-value table.
///
/// Share it as `Arc<DistributedCache>`; all methods take `&self`.
pub struct DistributedCache {
    store: Arc<dyn TableStore>,
    resolver: TableResolver,
    options: CacheOptions,
    /// Expiration applied to a `set` that requests none
    defaults: EntryOptions,
    clock: Arc<dyn Clock>,
    stats: CacheStats,
}

impl DistributedCache {
    // == Constructor ==
    /// Creates an engine reading time from the system clock.
    ///
    /// No store call is made until the first operation.
    pub fn new(store: Arc<dyn TableStore>, options: CacheOptions) -> Result<Self> {
        Self::with_clock(store, options, Arc::new(SystemClock))
    }

    /// Creates an engine driven by `clock`.
    pub fn with_clock(
        store: Arc<dyn TableStore>,
        options: CacheOptions,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            resolver: TableResolver::new(store.clone(), options.clone()),
            defaults: options.default_entry_options(),
            store,
            options,
            clock,
            stats: CacheStats::new(),
        })
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    // == Readiness ==
    /// True once the backing table has been resolved.
    pub fn is_ready(&self) -> bool {
        self.resolver.descriptor().is_some()
    }

    /// Resolution phase, readable while an attempt is in flight.
    pub fn phase(&self) -> ResolverPhase {
        self.resolver.phase()
    }

    /// Resolves the backing table without touching any item.
    pub async fn ensure_ready(&self) -> Result<()> {
        self.ensure_ready_with_cancel(&CancellationToken::new()).await
    }

    pub async fn ensure_ready_with_cancel(&self, cancel: &CancellationToken) -> Result<()> {
        self.resolver.resolve(cancel).await.map(|_| ())
    }

    // == Get ==
    /// Returns the cached bytes, or `None` on a miss.
    ///
    /// A live item with a sliding window has its expiration pushed forward
    /// before the value is returned. An expired item is a miss and gets
    /// deleted on a best-effort basis.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.get_with_cancel(key, &CancellationToken::new()).await
    }

    pub async fn get_with_cancel(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        let table = self.resolver.resolve(cancel).await?;

        let item = cancellable(cancel, self.store.get_item(table, key, ItemProjection::Full))
            .await?;
        let Some(item) = item else {
            debug!("Cache miss for key '{}'", key);
            self.stats.record_miss();
            return Ok(None);
        };

        let now = self.clock.now();
        match item.expiration.on_read(now) {
            ReadDecision::Expired => {
                debug!("Key '{}' expired", key);
                self.stats.record_expired();
                self.remove_expired(table, &item, cancel).await;
                Ok(None)
            }
            ReadDecision::Live { refreshed } => {
                let Some(value) = item.value else {
                    debug!("Key '{}' has no cached value", key);
                    self.stats.record_miss();
                    return Ok(None);
                };
                // A window already pinned at its absolute cap has nothing to write
                if let Some(next) =
                    refreshed.filter(|next| next.current != item.expiration.current)
                {
                    self.slide(table, key, item.expiration.current, next.current, cancel)
                        .await?;
                }
                self.stats.record_hit();
                Ok(Some(value))
            }
        }
    }

    // == Set ==
    /// Stores `value` under `key`, replacing any existing item.
    pub async fn set(&self, key: &str, value: Vec<u8>, options: EntryOptions) -> Result<()> {
        self.set_with_cancel(key, value, options, &CancellationToken::new())
            .await
    }

    pub async fn set_with_cancel(
        &self,
        key: &str,
        value: Vec<u8>,
        options: EntryOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        validate_key(key)?;
        validate_value(&value)?;
        let expiration = options.resolve(self.clock.now(), &self.defaults)?;

        let table = self.resolver.resolve(cancel).await?;
        let item = CacheItem::new(key, value, expiration);
        cancellable(cancel, self.store.put_item(table, item)).await?;

        self.stats.record_write();
        debug!("Stored key '{}' (expires {:?})", key, expiration.current);
        Ok(())
    }

    // == Refresh ==
    /// Slides the expiration of `key` without transferring its value.
    ///
    /// Absent keys and items without a sliding window are left untouched.
    pub async fn refresh(&self, key: &str) -> Result<()> {
        self.refresh_with_cancel(key, &CancellationToken::new()).await
    }

    pub async fn refresh_with_cancel(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        validate_key(key)?;
        let table = self.resolver.resolve(cancel).await?;

        let item = cancellable(
            cancel,
            self.store
                .get_item(table, key, ItemProjection::ExpirationOnly),
        )
        .await?;
        let Some(item) = item else {
            debug!("Nothing to refresh for key '{}'", key);
            return Ok(());
        };

        match item.expiration.on_read(self.clock.now()) {
            ReadDecision::Expired => {
                debug!("Key '{}' expired before refresh", key);
                self.remove_expired(table, &item, cancel).await;
            }
            ReadDecision::Live {
                refreshed: Some(next),
            } if next.current != item.expiration.current => {
                self.slide(table, key, item.expiration.current, next.current, cancel)
                    .await?;
            }
            ReadDecision::Live { .. } => {}
        }
        Ok(())
    }

    // == Remove ==
    /// Deletes `key`; removing an absent key succeeds.
    pub async fn remove(&self, key: &str) -> Result<()> {
        self.remove_with_cancel(key, &CancellationToken::new()).await
    }

    pub async fn remove_with_cancel(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        validate_key(key)?;
        let table = self.resolver.resolve(cancel).await?;

        cancellable(
            cancel,
            self.store.delete_item(table, key, DeleteCondition::Always),
        )
        .await?;

        self.stats.record_removal();
        debug!("Removed key '{}'", key);
        Ok(())
    }

    // == Internal Helpers ==
    /// Moves the current expiration from `observed` to `next`.
    ///
    /// Losing the race to a concurrent writer is not an error.
    async fn slide(
        &self,
        table: &TableDescriptor,
        key: &str,
        observed: Option<DateTime<Utc>>,
        next: Option<DateTime<Utc>>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let updated = cancellable(
            cancel,
            self.store.update_expiration(table, key, observed, next),
        )
        .await;

        match updated {
            Ok(()) => {
                self.stats.record_refresh();
                Ok(())
            }
            Err(CacheError::Store(StoreError::ConditionFailed)) => {
                debug!("Key '{}' changed concurrently, skipping refresh", key);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Best-effort delete of an item observed as expired.
    ///
    /// Only deletes if the item still carries the expiration that was read,
    /// so a concurrent `set` is never clobbered. Failures are logged only.
    async fn remove_expired(
        &self,
        table: &TableDescriptor,
        item: &CacheItem,
        cancel: &CancellationToken,
    ) {
        let condition = DeleteCondition::ExpirationEquals(item.expiration.current);
        match cancellable(cancel, self.store.delete_item(table, &item.key, condition)).await {
            Ok(()) => debug!("Deleted expired key '{}'", item.key),
            Err(CacheError::Store(StoreError::ConditionFailed)) => {
                debug!("Expired key '{}' was rewritten, keeping it", item.key)
            }
            Err(err) => warn!("Failed to delete expired key '{}': {}", item.key, err),
        }
    }
}
