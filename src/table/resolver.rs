//! Table Resolver
//!
//! Ensures a usable backing table exists before the first cache operation.
//!
//! Resolution runs at most once at a time per resolver: the first caller
//! drives it while holding an async mutex, later callers wait on the same
//! mutex and then observe the outcome. Success is published through a
//! `OnceLock` so steady-state calls never lock or touch the store. The
//! observable phase lives in a separate, briefly held cell so it can be read
//! while an attempt is in flight.

use std::sync::{Arc, Mutex as StdMutex, MutexGuard, OnceLock, PoisonError};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{CacheOptions, CreationPolicy};
use crate::error::{CacheError, Result};
use crate::store::{cancellable, StoreError, TableMetadata, TableStore};
use crate::table::{validate, TableDescriptor};

// == Resolver State ==
/// Observable phase of a resolver.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolverPhase {
    /// No attempt has succeeded yet; the next call starts one
    Unresolved,
    /// An attempt is in flight
    Resolving,
    /// The table is validated and active
    Ready(TableDescriptor),
    /// A fatal verdict was reached; every later call repeats it
    Failed(CacheError),
}

/// Puts an abandoned attempt back to `Unresolved`.
///
/// Covers both transient errors and callers dropping the resolve future.
struct AttemptGuard<'a> {
    phase: &'a StdMutex<ResolverPhase>,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if *phase == ResolverPhase::Resolving {
            *phase = ResolverPhase::Unresolved;
        }
    }
}

// == Table Resolver ==
pub struct TableResolver {
    store: Arc<dyn TableStore>,
    options: CacheOptions,
    ready: OnceLock<TableDescriptor>,
    /// Never held across an await
    phase: StdMutex<ResolverPhase>,
    /// Serialises attempts
    attempt_lock: Mutex<()>,
}

impl TableResolver {
    // == Constructor ==
    pub fn new(store: Arc<dyn TableStore>, options: CacheOptions) -> Self {
        Self {
            store,
            options,
            ready: OnceLock::new(),
            phase: StdMutex::new(ResolverPhase::Unresolved),
            attempt_lock: Mutex::new(()),
        }
    }

    /// Returns the descriptor if resolution already succeeded.
    pub fn descriptor(&self) -> Option<&TableDescriptor> {
        self.ready.get()
    }

    /// Current phase without triggering or waiting for resolution.
    pub fn phase(&self) -> ResolverPhase {
        match self.ready.get() {
            Some(descriptor) => ResolverPhase::Ready(descriptor.clone()),
            None => self.lock_phase().clone(),
        }
    }

    fn lock_phase(&self) -> MutexGuard<'_, ResolverPhase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // == Resolve ==
    /// Returns the validated table, resolving it on first use.
    ///
    /// Fatal verdicts (`SchemaMismatch`, `TableNotFound`) are remembered and
    /// returned again without store calls. Transient failures, including
    /// cancellation, leave the resolver unresolved so a later call retries.
    pub async fn resolve(&self, cancel: &CancellationToken) -> Result<&TableDescriptor> {
        if let Some(descriptor) = self.ready.get() {
            return Ok(descriptor);
        }

        let _attempt = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CacheError::Cancelled),
            guard = self.attempt_lock.lock() => guard,
        };

        // Another caller may have finished while we waited for the lock
        if let Some(descriptor) = self.ready.get() {
            debug!("Table '{}' resolved by a concurrent caller", self.options.table_name);
            return Ok(descriptor);
        }

        let guard = {
            let mut phase = self.lock_phase();
            if let ResolverPhase::Failed(err) = &*phase {
                return Err(err.clone());
            }
            *phase = ResolverPhase::Resolving;
            AttemptGuard { phase: &self.phase }
        };

        let outcome = self.attempt(cancel).await;
        match outcome {
            Ok(descriptor) => {
                info!(
                    "Table '{}' is ready (partition key '{}')",
                    descriptor.name, descriptor.partition_key_attribute
                );
                *self.lock_phase() = ResolverPhase::Ready(descriptor.clone());
                drop(guard);
                Ok(self.ready.get_or_init(|| descriptor))
            }
            Err(err) if err.is_fatal() => {
                warn!("Table '{}' cannot be used: {}", self.options.table_name, err);
                *self.lock_phase() = ResolverPhase::Failed(err.clone());
                drop(guard);
                Err(err)
            }
            Err(err) => {
                debug!(
                    "Resolution of table '{}' failed, will retry on next call: {}",
                    self.options.table_name, err
                );
                drop(guard);
                Err(err)
            }
        }
    }

    /// One full describe / create / wait / validate pass.
    async fn attempt(&self, cancel: &CancellationToken) -> Result<TableDescriptor> {
        let name = &self.options.table_name;
        let described = cancellable(cancel, self.store.describe_table(name)).await?;

        let metadata = match described {
            Some(metadata) => metadata,
            None => match self.options.creation_policy {
                CreationPolicy::RequireExisting => {
                    return Err(CacheError::TableNotFound(name.clone()));
                }
                CreationPolicy::CreateIfMissing => {
                    self.create_table(cancel).await?;
                    self.wait_until_active(cancel).await?
                }
            },
        };

        let descriptor = validate(&metadata, &self.options.partition_key_attribute).map_err(
            |reason| CacheError::SchemaMismatch {
                table: name.clone(),
                reason,
            },
        )?;

        if !metadata.is_active() {
            self.wait_until_active(cancel).await?;
        }

        Ok(descriptor)
    }

    /// Issues CreateTable, treating "already exists" as success.
    async fn create_table(&self, cancel: &CancellationToken) -> Result<()> {
        let name = &self.options.table_name;
        info!(
            "Creating table '{}' with partition key '{}'",
            name, self.options.partition_key_attribute
        );

        let created = cancellable(
            cancel,
            self.store
                .create_table(name, &self.options.partition_key_attribute),
        )
        .await;

        match created {
            Err(CacheError::Store(StoreError::ResourceInUse(reason))) => {
                warn!(
                    "Table '{}' is already being created elsewhere ({}), waiting for it",
                    name, reason
                );
                Ok(())
            }
            other => other,
        }
    }

    // == Wait Until Active ==
    /// Polls DescribeTable until the table reports active.
    ///
    /// A table that is briefly invisible right after creation keeps being
    /// polled. Bounded by `table_poll_max_attempts` when set.
    async fn wait_until_active(&self, cancel: &CancellationToken) -> Result<TableMetadata> {
        let name = &self.options.table_name;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            match cancellable(cancel, self.store.describe_table(name)).await? {
                Some(metadata) if metadata.is_active() => return Ok(metadata),
                Some(metadata) => debug!(
                    "Table '{}' is {:?} (poll {})",
                    name, metadata.status, attempts
                ),
                None => debug!("Table '{}' not visible yet (poll {})", name, attempts),
            }

            if let Some(max) = self.options.table_poll_max_attempts {
                if attempts >= max {
                    return Err(CacheError::TableNotActive {
                        table: name.clone(),
                        attempts,
                    });
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(CacheError::Cancelled),
                _ = tokio::time::sleep(self.options.table_poll_interval) => {}
            }
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        AttributeType, InMemoryTableStore, KeyRole, KeySchemaElement, StoreOperation, TableStatus,
    };
    use crate::table::SchemaViolation;
    use std::time::Duration;

    fn options(policy: CreationPolicy) -> CacheOptions {
        CacheOptions::new("cache")
            .with_creation_policy(policy)
            .with_table_polling(Duration::from_millis(1), Some(50))
    }

    fn resolver(store: &Arc<InMemoryTableStore>, options: CacheOptions) -> TableResolver {
        TableResolver::new(store.clone(), options)
    }

    #[tokio::test]
    async fn test_creates_missing_table_once() {
        let store = Arc::new(InMemoryTableStore::with_activation_delay(3));
        let resolver = resolver(&store, options(CreationPolicy::CreateIfMissing));
        let token = CancellationToken::new();

        for _ in 0..5 {
            let descriptor = resolver.resolve(&token).await.unwrap();
            assert_eq!(descriptor.name, "cache");
        }

        let calls = store.call_counts();
        assert_eq!(calls.create_table, 1);
        let describes_after_ready = calls.describe_table;

        resolver.resolve(&token).await.unwrap();
        assert_eq!(store.call_counts().describe_table, describes_after_ready);
    }

    #[tokio::test]
    async fn test_require_existing_never_creates() {
        let store = Arc::new(InMemoryTableStore::new());
        let resolver = resolver(&store, options(CreationPolicy::RequireExisting));
        let token = CancellationToken::new();

        let err = resolver.resolve(&token).await.unwrap_err();
        assert_eq!(err, CacheError::TableNotFound("cache".to_string()));
        assert_eq!(store.call_counts().create_table, 0);

        // Fatal verdict is remembered
        let err = resolver.resolve(&token).await.unwrap_err();
        assert_eq!(err, CacheError::TableNotFound("cache".to_string()));
        assert_eq!(store.call_counts().describe_table, 1);
        assert!(matches!(resolver.phase(), ResolverPhase::Failed(_)));
    }

    #[tokio::test]
    async fn test_existing_table_is_validated() {
        let store = Arc::new(InMemoryTableStore::new());
        store
            .insert_table(TableMetadata::new(
                "cache",
                TableStatus::Active,
                vec![
                    KeySchemaElement::partition("id"),
                    KeySchemaElement::new("version", KeyRole::Sort, AttributeType::Number),
                ],
            ));
        let resolver = resolver(&store, options(CreationPolicy::CreateIfMissing));
        let token = CancellationToken::new();

        for _ in 0..3 {
            let err = resolver.resolve(&token).await.unwrap_err();
            assert_eq!(
                err,
                CacheError::SchemaMismatch {
                    table: "cache".to_string(),
                    reason: SchemaViolation::InvalidKeySchema { elements: 2 },
                }
            );
        }
        assert_eq!(store.call_counts().describe_table, 1);
        assert_eq!(store.call_counts().create_table, 0);
    }

    #[tokio::test]
    async fn test_existing_creating_table_is_awaited() {
        let store = Arc::new(InMemoryTableStore::with_activation_delay(2));
        store
            .insert_table(TableMetadata::new(
                "cache",
                TableStatus::Creating,
                vec![KeySchemaElement::partition("id")],
            ));
        let resolver = resolver(&store, options(CreationPolicy::RequireExisting));

        assert!(resolver.resolve(&CancellationToken::new()).await.is_ok());
        assert_eq!(store.call_counts().create_table, 0);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_creates_once() {
        let store = Arc::new(InMemoryTableStore::with_activation_delay(5));
        let resolver = Arc::new(resolver(&store, options(CreationPolicy::CreateIfMissing)));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let resolver = resolver.clone();
            handles.push(tokio::spawn(async move {
                resolver
                    .resolve(&CancellationToken::new())
                    .await
                    .map(|d| d.clone())
            }));
        }

        for handle in handles {
            let descriptor = handle.await.unwrap().unwrap();
            assert_eq!(descriptor.partition_key_attribute, "id");
        }
        assert_eq!(store.call_counts().create_table, 1);
    }

    #[tokio::test]
    async fn test_duplicate_create_is_absorbed() {
        let store = Arc::new(InMemoryTableStore::new());
        // Another process created the table but describe has not caught up yet
        store.create_table("cache", "id").await.unwrap();
        store.hide_tables_for_describes(1);

        let resolver = resolver(&store, options(CreationPolicy::CreateIfMissing));
        assert!(resolver.resolve(&CancellationToken::new()).await.is_ok());
        assert_eq!(store.call_counts().create_table, 2);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let store = Arc::new(InMemoryTableStore::new());
        store.inject_fault(
            StoreOperation::DescribeTable,
            StoreError::Throttled("slow down".to_string()),
        );
        let resolver = resolver(&store, options(CreationPolicy::CreateIfMissing));
        let token = CancellationToken::new();

        let err = resolver.resolve(&token).await.unwrap_err();
        assert!(matches!(err, CacheError::Store(StoreError::Throttled(_))));
        assert_eq!(resolver.phase(), ResolverPhase::Unresolved);

        assert!(resolver.resolve(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_poll_bound_reports_not_active() {
        let store = Arc::new(InMemoryTableStore::with_activation_delay(100));
        let options = CacheOptions::new("cache")
            .with_table_polling(Duration::from_millis(1), Some(3));
        let resolver = resolver(&store, options);

        let err = resolver.resolve(&CancellationToken::new()).await.unwrap_err();
        assert_eq!(
            err,
            CacheError::TableNotActive {
                table: "cache".to_string(),
                attempts: 3,
            }
        );
        assert_eq!(resolver.phase(), ResolverPhase::Unresolved);
    }

    #[tokio::test]
    async fn test_phase_is_readable_during_slow_activation() {
        let store = Arc::new(InMemoryTableStore::with_activation_delay(1_000_000));
        let options = CacheOptions::new("cache")
            .with_table_polling(Duration::from_millis(5), None);
        let resolver = Arc::new(resolver(&store, options));
        assert_eq!(resolver.phase(), ResolverPhase::Unresolved);

        let token = CancellationToken::new();
        let handle = {
            let resolver = resolver.clone();
            let token = token.clone();
            tokio::spawn(async move { resolver.resolve(&token).await.map(|d| d.clone()) })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        let phase = tokio::time::timeout(Duration::from_millis(500), async { resolver.phase() })
            .await
            .expect("phase must not wait for the attempt");
        assert_eq!(phase, ResolverPhase::Resolving);

        token.cancel();
        assert_eq!(handle.await.unwrap(), Err(CacheError::Cancelled));
        assert_eq!(resolver.phase(), ResolverPhase::Unresolved);
    }

    #[tokio::test]
    async fn test_dropped_attempt_returns_to_unresolved() {
        let store = Arc::new(InMemoryTableStore::with_activation_delay(1_000_000));
        let options = CacheOptions::new("cache")
            .with_table_polling(Duration::from_millis(5), None);
        let resolver = resolver(&store, options);

        let attempt = tokio::time::timeout(
            Duration::from_millis(30),
            resolver.resolve(&CancellationToken::new()),
        )
        .await;
        assert!(attempt.is_err());
        assert_eq!(resolver.phase(), ResolverPhase::Unresolved);
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_leaves_unresolved() {
        let store = Arc::new(InMemoryTableStore::with_activation_delay(1_000));
        let options = CacheOptions::new("cache")
            .with_table_polling(Duration::from_millis(5), None);
        let resolver = resolver(&store, options);
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            canceller.cancel();
        });

        let err = resolver.resolve(&token).await.unwrap_err();
        assert_eq!(err, CacheError::Cancelled);
        assert_eq!(resolver.phase(), ResolverPhase::Unresolved);
        assert!(resolver.descriptor().is_none());

        // The table exists now, so a retry never issues a second create
        store.set_activation_delay(0);
        assert!(resolver.resolve(&CancellationToken::new()).await.is_ok());
        assert_eq!(store.call_counts().create_table, 1);
    }
}
