//! Table Cache - A distributed byte cache over a key-value table
//!
//! Provides get/set/refresh/remove with sliding and absolute expiration,
//! backed by a table that is validated (and created if allowed) on first use.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod store;
pub mod table;
pub mod tasks;

pub use api::AppState;
pub use cache::{DistributedCache, EntryOptions};
pub use config::{CacheOptions, Config, CreationPolicy};
pub use error::{CacheError, Result};
pub use store::{InMemoryTableStore, TableStore};
pub use tasks::spawn_warmup_task;
