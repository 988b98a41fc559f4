//! Cache Module
//!
//! Provides the distributed cache engine with sliding and absolute expiration
//! enforced through item-level timestamps.

mod engine;
mod entry;
mod expiration;
mod stats;


// Re-export public types
pub use engine::DistributedCache;
pub use entry::{CacheItem, EntryOptions};
pub use expiration::{ExpirationState, ReadDecision};
pub use stats::{CacheStats, CacheStatsSnapshot};

use crate::error::{CacheError, Result};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 2048;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 400 * 1024; // 400 KiB

// == Validation ==
/// Rejects keys the backing table cannot address.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidRequest("Key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidRequest(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}

/// Rejects values larger than a single item may hold.
pub fn validate_value(value: &[u8]) -> Result<()> {
    if value.len() > MAX_VALUE_SIZE {
        return Err(CacheError::InvalidRequest(format!(
            "Value exceeds maximum size of {} bytes",
            MAX_VALUE_SIZE
        )));
    }
    Ok(())
}
