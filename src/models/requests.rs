//! Request DTOs for the cache server API
//!
//! The value of a `set` travels as the raw request body; its expiration
//! options travel as query parameters.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::cache::EntryOptions;

/// Query parameters for the SET operation (PUT /cache/:key)
///
/// # Fields
/// - `absolute`: RFC 3339 timestamp after which the item is dead
/// - `ttl`: absolute expiration in seconds from now, wins over `absolute`
/// - `sliding`: sliding window in seconds
///
/// Omitting all three applies the server's default expiration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetParams {
    #[serde(default)]
    pub absolute: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ttl: Option<u64>,
    #[serde(default)]
    pub sliding: Option<u64>,
}

impl SetParams {
    /// Converts the parameters into engine entry options.
    pub fn to_entry_options(&self) -> EntryOptions {
        EntryOptions {
            absolute_expiration: self.absolute,
            absolute_expiration_relative_to_now: self.ttl.map(Duration::from_secs),
            sliding_expiration: self.sliding.map(Duration::from_secs),
        }
    }
}
