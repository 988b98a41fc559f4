//! Cache Entry Module
//!
//! Defines the item stored per key and the expiration options callers
//! attach to a `set`.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cache::ExpirationState;
use crate::error::{CacheError, Result};

// == Cache Item ==
/// The unit the backing table holds per key.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheItem {
    /// Partition key
    pub key: String,
    /// Cached bytes; None marks a bookkeeping row with no value
    pub value: Option<Vec<u8>>,
    /// Expiration attributes
    pub expiration: ExpirationState,
}

impl CacheItem {
    // == Constructor ==
    pub fn new(key: impl Into<String>, value: Vec<u8>, expiration: ExpirationState) -> Self {
        Self {
            key: key.into(),
            value: Some(value),
            expiration,
        }
    }

    // == Expiration Projection ==
    /// Copy of the item carrying only key and expiration attributes.
    pub fn expiration_only(&self) -> Self {
        Self {
            key: self.key.clone(),
            value: None,
            expiration: self.expiration,
        }
    }
}

// == Entry Options ==
/// Expiration requested for a single `set`.
///
/// When no field is set the cache-wide defaults apply. When both absolute
/// forms are set, the relative one wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryOptions {
    pub absolute_expiration: Option<DateTime<Utc>>,
    pub absolute_expiration_relative_to_now: Option<Duration>,
    pub sliding_expiration: Option<Duration>,
}

impl EntryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_absolute_expiration(mut self, at: DateTime<Utc>) -> Self {
        self.absolute_expiration = Some(at);
        self
    }

    pub fn with_absolute_expiration_relative_to_now(mut self, ttl: Duration) -> Self {
        self.absolute_expiration_relative_to_now = Some(ttl);
        self
    }

    pub fn with_sliding_expiration(mut self, window: Duration) -> Self {
        self.sliding_expiration = Some(window);
        self
    }

    /// True when no expiration was requested.
    pub fn is_empty(&self) -> bool {
        self.absolute_expiration.is_none()
            && self.absolute_expiration_relative_to_now.is_none()
            && self.sliding_expiration.is_none()
    }

    // == Resolve ==
    /// Turns the request into the initial expiration state at `now`.
    ///
    /// `defaults` replaces `self` entirely when `self` is empty.
    pub fn resolve(&self, now: DateTime<Utc>, defaults: &EntryOptions) -> Result<ExpirationState> {
        let options = if self.is_empty() { defaults } else { self };

        let absolute = match options.absolute_expiration_relative_to_now {
            Some(ttl) => {
                let ttl = to_delta(ttl, "absolute expiration relative to now")?;
                Some(now.checked_add_signed(ttl).ok_or_else(|| {
                    CacheError::InvalidRequest(
                        "Absolute expiration relative to now is out of range".to_string(),
                    )
                })?)
            }
            None => options.absolute_expiration,
        };

        if let Some(at) = absolute {
            if at <= now {
                return Err(CacheError::InvalidRequest(
                    "The absolute expiration value must be in the future".to_string(),
                ));
            }
        }

        let sliding = options
            .sliding_expiration
            .map(|window| to_delta(window, "sliding expiration"))
            .transpose()?;
        if let Some(window) = sliding {
            if now.checked_add_signed(window).is_none() {
                return Err(CacheError::InvalidRequest(
                    "Sliding expiration is out of range".to_string(),
                ));
            }
        }

        Ok(ExpirationState::compute_initial(now, absolute, sliding))
    }
}

/// Converts a positive std duration into a chrono one.
fn to_delta(duration: Duration, what: &str) -> Result<chrono::Duration> {
    if duration.is_zero() {
        return Err(CacheError::InvalidRequest(format!(
            "The {} value must be positive",
            what
        )));
    }
    chrono::Duration::from_std(duration)
        .map_err(|_| CacheError::InvalidRequest(format!("The {} value is out of range", what)))
}
