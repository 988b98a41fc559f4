//! End-to-end scenarios for the cache engine over the in-memory table store.

use std::sync::Arc;
use std::time::Duration;

use table_cache::{
    store::{AttributeType, KeyRole, KeySchemaElement, TableMetadata, TableStatus, TableStore},
    table::{ResolverPhase, SchemaViolation},
    CacheError, CacheOptions, CreationPolicy, DistributedCache, EntryOptions, InMemoryTableStore,
};
use tokio_util::sync::CancellationToken;

fn fast(options: CacheOptions) -> CacheOptions {
    options.with_table_polling(Duration::from_millis(2), Some(50))
}

fn engine(store: &Arc<InMemoryTableStore>, options: CacheOptions) -> Arc<DistributedCache> {
    Arc::new(DistributedCache::new(store.clone(), options).unwrap())
}

#[tokio::test]
async fn scenario_set_get_remove() {
    let store = Arc::new(InMemoryTableStore::with_activation_delay(2));
    let cache = engine(&store, fast(CacheOptions::new("cache")));

    cache.set("a", vec![1, 2, 3], EntryOptions::new()).await.unwrap();
    assert_eq!(cache.get("a").await.unwrap(), Some(vec![1, 2, 3]));

    cache.remove("a").await.unwrap();
    assert_eq!(cache.get("a").await.unwrap(), None);
    assert_eq!(cache.get("missing").await.unwrap(), None);

    assert_eq!(store.call_counts().create_table, 1);
}

#[tokio::test]
async fn scenario_composite_key_table_is_rejected_without_retry() {
    let store = Arc::new(InMemoryTableStore::new());
    store.insert_table(TableMetadata::new(
        "cache",
        TableStatus::Active,
        vec![
            KeySchemaElement::partition("id"),
            KeySchemaElement::new("created", KeyRole::Sort, AttributeType::Number),
        ],
    ));
    let cache = engine(&store, fast(CacheOptions::new("cache")));

    for _ in 0..2 {
        let err = cache
            .set("a", vec![1], EntryOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CacheError::SchemaMismatch {
                reason: SchemaViolation::InvalidKeySchema { elements: 2 },
                ..
            }
        ));
    }
    assert_eq!(store.call_counts().describe_table, 1);
    assert_eq!(store.call_counts().put_item, 0);
}

#[tokio::test]
async fn scenario_custom_partition_key() {
    let store = Arc::new(InMemoryTableStore::new());
    store.insert_table(TableMetadata::new(
        "sessions",
        TableStatus::Active,
        vec![KeySchemaElement::partition("session_id")],
    ));

    let mismatched = engine(&store, fast(CacheOptions::new("sessions")));
    assert!(matches!(
        mismatched.get("k").await,
        Err(CacheError::SchemaMismatch {
            reason: SchemaViolation::InvalidKeyName { .. },
            ..
        })
    ));

    let matching = engine(
        &store,
        fast(CacheOptions::new("sessions").with_partition_key_attribute("session_id")),
    );
    matching.set("k", b"v".to_vec(), EntryOptions::new()).await.unwrap();
    assert_eq!(matching.get("k").await.unwrap(), Some(b"v".to_vec()));
}

#[tokio::test]
async fn scenario_require_existing_on_missing_table() {
    let store = Arc::new(InMemoryTableStore::new());
    let cache = engine(
        &store,
        fast(CacheOptions::new("cache").with_creation_policy(CreationPolicy::RequireExisting)),
    );

    assert_eq!(
        cache.ensure_ready().await,
        Err(CacheError::TableNotFound("cache".to_string()))
    );
    assert_eq!(store.call_counts().create_table, 0);
    assert!(store.describe_table("cache").await.unwrap().is_none());
}

#[tokio::test]
async fn scenario_concurrent_first_use_creates_once() {
    let store = Arc::new(InMemoryTableStore::with_activation_delay(5));
    let cache = engine(&store, fast(CacheOptions::new("cache")));

    let mut handles = Vec::new();
    for i in 0..24u8 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            let key = format!("key-{}", i % 4);
            cache.set(&key, vec![i], EntryOptions::new()).await?;
            cache.get(&key).await
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap().unwrap().is_some());
    }
    assert_eq!(store.call_counts().create_table, 1);
    assert!(cache.is_ready());
}

#[tokio::test]
async fn scenario_cancelled_activation_is_retryable() {
    let store = Arc::new(InMemoryTableStore::with_activation_delay(u32::MAX));
    let cache = engine(
        &store,
        CacheOptions::new("cache").with_table_polling(Duration::from_millis(2), None),
    );

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let err = cache
        .set_with_cancel("a", vec![1], EntryOptions::new(), &token)
        .await
        .unwrap_err();
    assert_eq!(err, CacheError::Cancelled);
    assert_eq!(cache.phase(), ResolverPhase::Unresolved);

    store.set_activation_delay(0);
    cache.set("a", vec![1], EntryOptions::new()).await.unwrap();
    assert_eq!(cache.get("a").await.unwrap(), Some(vec![1]));
    assert_eq!(store.call_counts().create_table, 1);
}

#[tokio::test]
async fn scenario_default_expiration_from_options() {
    let store = Arc::new(InMemoryTableStore::new());
    let cache = engine(
        &store,
        fast(CacheOptions::new("cache").with_default_absolute_expiration_relative_to_now(
            Duration::from_secs(600),
        )),
    );

    cache.set("a", vec![1], EntryOptions::new()).await.unwrap();
    let stored = store.item("cache", "a").unwrap();
    assert!(stored.expiration.absolute.is_some());
    assert_eq!(stored.expiration.absolute, stored.expiration.current);

    // Explicit options replace the defaults entirely
    cache
        .set(
            "b",
            vec![1],
            EntryOptions::new().with_sliding_expiration(Duration::from_secs(30)),
        )
        .await
        .unwrap();
    let stored = store.item("cache", "b").unwrap();
    assert!(stored.expiration.absolute.is_none());
    assert!(stored.expiration.sliding.is_some());
}
