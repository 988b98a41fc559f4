//! In-Memory Table Store
//!
//! A process-local [`TableStore`] holding tables as HashMaps. It mimics the
//! behaviour of a managed table service closely enough to exercise the cache:
//! tables start out `Creating` and turn `Active` after a configurable number
//! of describes, conditional writes are honoured, and faults can be injected
//! per operation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::cache::CacheItem;
use crate::store::{
    DeleteCondition, ItemProjection, KeySchemaElement, StoreError, StoreResult, TableMetadata,
    TableStatus, TableStore,
};
use crate::table::TableDescriptor;

// == Store Operation ==
/// Operations faults can be injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    DescribeTable,
    CreateTable,
    GetItem,
    PutItem,
    UpdateExpiration,
    DeleteItem,
}

/// Number of calls the store has received per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCallCounts {
    pub describe_table: u64,
    pub create_table: u64,
    pub get_item: u64,
    pub put_item: u64,
    pub update_expiration: u64,
    pub delete_item: u64,
}

#[derive(Debug, Default)]
struct CallCounters {
    describe_table: AtomicU64,
    create_table: AtomicU64,
    get_item: AtomicU64,
    put_item: AtomicU64,
    update_expiration: AtomicU64,
    delete_item: AtomicU64,
}

impl CallCounters {
    fn record(&self, operation: StoreOperation) {
        let counter = match operation {
            StoreOperation::DescribeTable => &self.describe_table,
            StoreOperation::CreateTable => &self.create_table,
            StoreOperation::GetItem => &self.get_item,
            StoreOperation::PutItem => &self.put_item,
            StoreOperation::UpdateExpiration => &self.update_expiration,
            StoreOperation::DeleteItem => &self.delete_item,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StoreCallCounts {
        StoreCallCounts {
            describe_table: self.describe_table.load(Ordering::Relaxed),
            create_table: self.create_table.load(Ordering::Relaxed),
            get_item: self.get_item.load(Ordering::Relaxed),
            put_item: self.put_item.load(Ordering::Relaxed),
            update_expiration: self.update_expiration.load(Ordering::Relaxed),
            delete_item: self.delete_item.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
struct MemoryTable {
    metadata: TableMetadata,
    /// Describes left before a `Creating` table turns `Active`
    pending_polls: u32,
    items: HashMap<String, CacheItem>,
}

// == In-Memory Table Store ==
#[derive(Debug, Default)]
pub struct InMemoryTableStore {
    tables: Mutex<HashMap<String, MemoryTable>>,
    activation_delay: AtomicU32,
    hidden_describes: AtomicU32,
    faults: Mutex<Vec<(StoreOperation, StoreError)>>,
    calls: CallCounters,
}

impl InMemoryTableStore {
    // == Constructor ==
    /// Store whose new tables are active on the first describe.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose new tables stay `Creating` for `polls` describes.
    pub fn with_activation_delay(polls: u32) -> Self {
        let store = Self::new();
        store.activation_delay.store(polls, Ordering::Relaxed);
        store
    }

    /// Changes the activation delay, including for tables still creating.
    pub fn set_activation_delay(&self, polls: u32) {
        self.activation_delay.store(polls, Ordering::Relaxed);
        for table in self.lock_tables().values_mut() {
            table.pending_polls = table.pending_polls.min(polls);
        }
    }

    /// Registers a table as if it had been created out of band.
    pub fn insert_table(&self, metadata: TableMetadata) {
        let pending_polls = match metadata.status {
            TableStatus::Creating => self.activation_delay.load(Ordering::Relaxed),
            _ => 0,
        };
        self.lock_tables().insert(
            metadata.name.clone(),
            MemoryTable {
                metadata,
                pending_polls,
                items: HashMap::new(),
            },
        );
    }

    /// Makes the next `count` describes report every table as missing.
    pub fn hide_tables_for_describes(&self, count: u32) {
        self.hidden_describes.store(count, Ordering::Relaxed);
    }

    /// Makes the next call to `operation` fail with `error`.
    pub fn inject_fault(&self, operation: StoreOperation, error: StoreError) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((operation, error));
    }

    pub fn call_counts(&self) -> StoreCallCounts {
        self.calls.snapshot()
    }

    /// Raw stored item, bypassing expiration.
    pub fn item(&self, table: &str, key: &str) -> Option<CacheItem> {
        self.lock_tables()
            .get(table)
            .and_then(|t| t.items.get(key).cloned())
    }

    /// Number of rows physically present in `table`.
    pub fn len(&self, table: &str) -> usize {
        self.lock_tables().get(table).map_or(0, |t| t.items.len())
    }

    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    fn lock_tables(&self) -> MutexGuard<'_, HashMap<String, MemoryTable>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Counts the call and pops an injected fault for it, if any.
    fn enter(&self, operation: StoreOperation) -> StoreResult<()> {
        self.calls.record(operation);
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        match faults.iter().position(|(op, _)| *op == operation) {
            Some(index) => Err(faults.remove(index).1),
            None => Ok(()),
        }
    }

    fn with_items<T>(
        &self,
        table: &TableDescriptor,
        f: impl FnOnce(&mut HashMap<String, CacheItem>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut tables = self.lock_tables();
        let stored = tables
            .get_mut(&table.name)
            .ok_or_else(|| StoreError::Internal(format!("Table '{}' does not exist", table.name)))?;
        if !stored.metadata.is_active() {
            return Err(StoreError::ResourceInUse(format!(
                "Table '{}' is {:?}",
                table.name, stored.metadata.status
            )));
        }
        f(&mut stored.items)
    }
}

#[async_trait]
impl TableStore for InMemoryTableStore {
    async fn describe_table(&self, name: &str) -> StoreResult<Option<TableMetadata>> {
        self.enter(StoreOperation::DescribeTable)?;

        let hidden = self
            .hidden_describes
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();
        if hidden {
            return Ok(None);
        }

        let mut tables = self.lock_tables();
        let Some(table) = tables.get_mut(name) else {
            return Ok(None);
        };
        if table.metadata.status == TableStatus::Creating {
            if table.pending_polls == 0 {
                table.metadata.status = TableStatus::Active;
            } else {
                table.pending_polls -= 1;
            }
        }
        Ok(Some(table.metadata.clone()))
    }

    async fn create_table(&self, name: &str, partition_key_attribute: &str) -> StoreResult<()> {
        self.enter(StoreOperation::CreateTable)?;

        let mut tables = self.lock_tables();
        if let Some(existing) = tables.get(name) {
            return Err(StoreError::ResourceInUse(format!(
                "Table '{}' already exists ({:?})",
                name, existing.metadata.status
            )));
        }
        tables.insert(
            name.to_string(),
            MemoryTable {
                metadata: TableMetadata::new(
                    name,
                    TableStatus::Creating,
                    vec![KeySchemaElement::partition(partition_key_attribute)],
                ),
                pending_polls: self.activation_delay.load(Ordering::Relaxed),
                items: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn get_item(
        &self,
        table: &TableDescriptor,
        key: &str,
        projection: ItemProjection,
    ) -> StoreResult<Option<CacheItem>> {
        self.enter(StoreOperation::GetItem)?;
        self.with_items(table, |items| {
            Ok(items.get(key).map(|item| match projection {
                ItemProjection::Full => item.clone(),
                ItemProjection::ExpirationOnly => item.expiration_only(),
            }))
        })
    }

    async fn put_item(&self, table: &TableDescriptor, item: CacheItem) -> StoreResult<()> {
        self.enter(StoreOperation::PutItem)?;
        self.with_items(table, |items| {
            items.insert(item.key.clone(), item);
            Ok(())
        })
    }

    async fn update_expiration(
        &self,
        table: &TableDescriptor,
        key: &str,
        expected: Option<DateTime<Utc>>,
        current: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        self.enter(StoreOperation::UpdateExpiration)?;
        self.with_items(table, |items| match items.get_mut(key) {
            Some(item) if item.expiration.current == expected => {
                item.expiration.current = current;
                Ok(())
            }
            _ => Err(StoreError::ConditionFailed),
        })
    }

    async fn delete_item(
        &self,
        table: &TableDescriptor,
        key: &str,
        condition: DeleteCondition,
    ) -> StoreResult<()> {
        self.enter(StoreOperation::DeleteItem)?;
        self.with_items(table, |items| {
            if let (DeleteCondition::ExpirationEquals(expected), Some(item)) =
                (condition, items.get(key))
            {
                if item.expiration.current != expected {
                    return Err(StoreError::ConditionFailed);
                }
            }
            items.remove(key);
            Ok(())
        })
    }
}
