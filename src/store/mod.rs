//! Store Module
//!
//! The port through which the cache talks to its backing key-value table,
//! plus an in-process reference implementation.
//!
//! Adapters for a real table service implement [`TableStore`]; everything
//! above this module is written against the trait only.

mod memory;

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::cache::CacheItem;
use crate::error::{CacheError, Result};
use crate::table::TableDescriptor;

pub use memory::{InMemoryTableStore, StoreCallCounts, StoreOperation};

// == Store Error ==
/// Failures reported by a store adapter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Table already exists or is being created/deleted
    #[error("Resource in use: {0}")]
    ResourceInUse(String),

    /// A conditional write or delete found the item absent or changed
    #[error("Conditional check failed")]
    ConditionFailed,

    /// The store rejected the call due to rate limiting
    #[error("Request throttled: {0}")]
    Throttled(String),

    /// Network or service outage
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Anything else the adapter could not classify
    #[error("Store internal error: {0}")]
    Internal(String),
}

impl StoreError {
    // == Is Conflict ==
    /// Idempotency conflicts mean "someone else already did it".
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::ResourceInUse(_))
    }
}

/// Result type returned by store adapters.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// == Table Metadata ==
/// Lifecycle status reported by DescribeTable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
    Creating,
    Active,
    Updating,
    Deleting,
}

/// Role of a key schema element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    Partition,
    Sort,
}

/// Scalar attribute types a key may be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Number,
    Binary,
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeType::String => write!(f, "S"),
            AttributeType::Number => write!(f, "N"),
            AttributeType::Binary => write!(f, "B"),
        }
    }
}

/// One component of a table's primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchemaElement {
    pub attribute_name: String,
    pub role: KeyRole,
    pub attribute_type: AttributeType,
}

impl KeySchemaElement {
    pub fn new(attribute_name: impl Into<String>, role: KeyRole, attribute_type: AttributeType) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            role,
            attribute_type,
        }
    }

    /// A string-typed partition key element.
    pub fn partition(attribute_name: impl Into<String>) -> Self {
        Self::new(attribute_name, KeyRole::Partition, AttributeType::String)
    }
}

/// Result of DescribeTable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMetadata {
    pub name: String,
    pub status: TableStatus,
    pub key_schema: Vec<KeySchemaElement>,
}

impl TableMetadata {
    pub fn new(name: impl Into<String>, status: TableStatus, key_schema: Vec<KeySchemaElement>) -> Self {
        Self {
            name: name.into(),
            status,
            key_schema,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == TableStatus::Active
    }
}

// == Request Shapes ==
/// Which attributes a read should transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemProjection {
    /// Key, value and expiration attributes
    Full,
    /// Key and expiration attributes only; `value` comes back as `None`
    ExpirationOnly,
}

/// Guard applied to a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteCondition {
    Always,
    /// Delete only if the stored current expiration still equals this
    ExpirationEquals(Option<DateTime<Utc>>),
}

// == Table Store Port ==
/// Capabilities the cache needs from the backing table service.
///
/// Implementations must be safe for concurrent use. Item calls receive the
/// validated [`TableDescriptor`] so adapters know the table name and the
/// partition key attribute to address items by.
#[async_trait]
pub trait TableStore: Send + Sync + 'static {
    /// Returns `None` when the table does not exist.
    async fn describe_table(&self, name: &str) -> StoreResult<Option<TableMetadata>>;

    /// Starts creating a table with a single string partition key.
    ///
    /// Completion is asynchronous: the table is `Creating` until a later
    /// describe reports it `Active`. A table that already exists yields
    /// [`StoreError::ResourceInUse`].
    async fn create_table(&self, name: &str, partition_key_attribute: &str) -> StoreResult<()>;

    async fn get_item(
        &self,
        table: &TableDescriptor,
        key: &str,
        projection: ItemProjection,
    ) -> StoreResult<Option<CacheItem>>;

    /// Unconditional upsert replacing every attribute of the item.
    async fn put_item(&self, table: &TableDescriptor, item: CacheItem) -> StoreResult<()>;

    /// Rewrites only the current-expiration attribute.
    ///
    /// Fails with [`StoreError::ConditionFailed`] if the item is absent or its
    /// current expiration no longer equals `expected`.
    async fn update_expiration(
        &self,
        table: &TableDescriptor,
        key: &str,
        expected: Option<DateTime<Utc>>,
        current: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;

    /// Deleting an absent key succeeds.
    async fn delete_item(
        &self,
        table: &TableDescriptor,
        key: &str,
        condition: DeleteCondition,
    ) -> StoreResult<()>;
}

// == Cancellation ==
/// Runs a store call unless `cancel` fires first.
pub async fn cancellable<T, F>(cancel: &CancellationToken, call: F) -> Result<T>
where
    F: Future<Output = StoreResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CacheError::Cancelled),
        result = call => result.map_err(CacheError::from),
    }
}
