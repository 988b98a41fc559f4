//! Configuration Module
//!
//! Cache options and loading of server configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::EntryOptions;
use crate::error::{CacheError, Result};

// == Creation Policy ==
/// What to do when the backing table does not exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CreationPolicy {
    /// Create the table and wait for it to become active
    #[default]
    CreateIfMissing,
    /// Fail with `TableNotFound`
    RequireExisting,
}

impl FromStr for CreationPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "create_if_missing" | "create" => Ok(CreationPolicy::CreateIfMissing),
            "require_existing" | "existing" => Ok(CreationPolicy::RequireExisting),
            other => Err(CacheError::InvalidConfig(format!(
                "Unknown creation policy '{}'",
                other
            ))),
        }
    }
}

// == Cache Options ==
/// Immutable snapshot the engine is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheOptions {
    /// Name of the backing table
    pub table_name: String,
    /// Attribute the table is partitioned by
    pub partition_key_attribute: String,
    /// Behaviour when the table is missing
    pub creation_policy: CreationPolicy,
    /// Absolute expiration applied when a `set` requests none
    pub default_absolute_expiration_relative_to_now: Option<Duration>,
    /// Sliding expiration applied when a `set` requests none
    pub default_sliding_expiration: Option<Duration>,
    /// Pause between DescribeTable polls while waiting for activation
    pub table_poll_interval: Duration,
    /// Upper bound on activation polls, None = poll until cancelled
    pub table_poll_max_attempts: Option<u32>,
}

impl CacheOptions {
    pub const DEFAULT_PARTITION_KEY: &'static str = "id";
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
    pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 120;

    // == Constructor ==
    /// Options for `table_name` with every other setting at its default.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            partition_key_attribute: Self::DEFAULT_PARTITION_KEY.to_string(),
            creation_policy: CreationPolicy::default(),
            default_absolute_expiration_relative_to_now: None,
            default_sliding_expiration: None,
            table_poll_interval: Self::DEFAULT_POLL_INTERVAL,
            table_poll_max_attempts: Some(Self::DEFAULT_POLL_MAX_ATTEMPTS),
        }
    }

    pub fn with_partition_key_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.partition_key_attribute = attribute.into();
        self
    }

    pub fn with_creation_policy(mut self, policy: CreationPolicy) -> Self {
        self.creation_policy = policy;
        self
    }

    pub fn with_default_absolute_expiration_relative_to_now(mut self, ttl: Duration) -> Self {
        self.default_absolute_expiration_relative_to_now = Some(ttl);
        self
    }

    pub fn with_default_sliding_expiration(mut self, window: Duration) -> Self {
        self.default_sliding_expiration = Some(window);
        self
    }

    pub fn with_table_polling(mut self, interval: Duration, max_attempts: Option<u32>) -> Self {
        self.table_poll_interval = interval;
        self.table_poll_max_attempts = max_attempts;
        self
    }

    // == Default Entry Options ==
    /// Expiration used by a `set` that requests none.
    pub fn default_entry_options(&self) -> EntryOptions {
        EntryOptions {
            absolute_expiration: None,
            absolute_expiration_relative_to_now: self.default_absolute_expiration_relative_to_now,
            sliding_expiration: self.default_sliding_expiration,
        }
    }

    // == Validate ==
    pub fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            return Err(CacheError::InvalidConfig(
                "Table name cannot be empty".to_string(),
            ));
        }
        if self.partition_key_attribute.trim().is_empty() {
            return Err(CacheError::InvalidConfig(
                "Partition key attribute cannot be empty".to_string(),
            ));
        }
        let zero = |d: Option<Duration>| d.map_or(false, |d| d.is_zero());
        if zero(self.default_absolute_expiration_relative_to_now)
            || zero(self.default_sliding_expiration)
        {
            return Err(CacheError::InvalidConfig(
                "Default expirations must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// == Server Config ==
/// Server configuration parameters.
///
/// All values except the table name have sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Options handed to the cache engine
    pub cache: CacheOptions,
    /// HTTP server port
    pub server_port: u16,
    /// Seconds between table resolution attempts at startup
    pub warmup_retry_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TABLE_NAME` - Backing table name (required)
    /// - `CACHE_PARTITION_KEY` - Partition key attribute (default: id)
    /// - `CACHE_CREATION_POLICY` - `create_if_missing` or `require_existing`; anything else is an error
    /// - `CACHE_DEFAULT_TTL` - Default absolute expiration in seconds (optional)
    /// - `CACHE_DEFAULT_SLIDING` - Default sliding expiration in seconds (optional)
    /// - `CACHE_TABLE_POLL_INTERVAL_MS` - Activation poll interval (default: 1000)
    /// - `CACHE_TABLE_POLL_MAX_ATTEMPTS` - Activation poll bound, 0 = unbounded (default: 120)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `WARMUP_RETRY_INTERVAL` - Seconds between startup resolution attempts (default: 5)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`Config::from_env`] but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let table_name = lookup("CACHE_TABLE_NAME")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| CacheError::InvalidConfig("CACHE_TABLE_NAME must be set".to_string()))?;

        let parsed = |name: &str| lookup(name).and_then(|v| v.trim().parse::<u64>().ok());

        // A mistyped policy must not silently allow table creation
        let creation_policy = match lookup("CACHE_CREATION_POLICY") {
            Some(raw) => raw.parse()?,
            None => CreationPolicy::default(),
        };

        let max_attempts = match parsed("CACHE_TABLE_POLL_MAX_ATTEMPTS") {
            Some(0) => None,
            Some(n) => Some(u32::try_from(n).unwrap_or(u32::MAX)),
            None => Some(CacheOptions::DEFAULT_POLL_MAX_ATTEMPTS),
        };

        let cache = CacheOptions {
            table_name,
            partition_key_attribute: lookup("CACHE_PARTITION_KEY")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| CacheOptions::DEFAULT_PARTITION_KEY.to_string()),
            creation_policy,
            default_absolute_expiration_relative_to_now: parsed("CACHE_DEFAULT_TTL")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            default_sliding_expiration: parsed("CACHE_DEFAULT_SLIDING")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            table_poll_interval: parsed("CACHE_TABLE_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(CacheOptions::DEFAULT_POLL_INTERVAL),
            table_poll_max_attempts: max_attempts,
        };
        cache.validate()?;

        Ok(Self {
            cache,
            server_port: lookup("SERVER_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            warmup_retry_interval: parsed("WARMUP_RETRY_INTERVAL").unwrap_or(5),
        })
    }
}
