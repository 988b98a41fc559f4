//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing JSON response bodies.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::CacheStatsSnapshot;

/// Response body for the SET operation (PUT /cache/:key)
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
    /// Number of bytes stored
    pub size: usize,
}

impl SetResponse {
    /// Creates a new SetResponse
    pub fn new(key: impl Into<String>, size: usize) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
            size,
        }
    }
}

/// Response body for the REFRESH operation (POST /cache/:key/refresh)
#[derive(Debug, Clone, Serialize)]
pub struct RefreshResponse {
    pub message: String,
    pub key: String,
}

impl RefreshResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' refreshed", key),
            key,
        }
    }
}

/// Response body for the DELETE operation (DELETE /cache/:key)
///
/// Returned for absent keys too, since removal is idempotent.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key that was deleted
    pub key: String,
}

impl DeleteResponse {
    /// Creates a new DeleteResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses, expirations included
    pub misses: u64,
    /// Misses caused by an elapsed expiration
    pub expired: u64,
    /// Sliding windows moved forward
    pub refreshes: u64,
    /// Successful writes
    pub writes: u64,
    /// Successful removals
    pub removals: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStatsSnapshot> for StatsResponse {
    fn from(stats: CacheStatsSnapshot) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            expired: stats.expired,
            refreshes: stats.refreshes,
            writes: stats.writes,
            removals: stats.removals,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status ("healthy" once the table is ready, "starting" before)
    pub status: String,
    /// Whether the backing table has been resolved
    pub table_ready: bool,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse stamped with `now`
    pub fn new(table_ready: bool, now: DateTime<Utc>) -> Self {
        let status = if table_ready { "healthy" } else { "starting" };
        Self {
            status: status.to_string(),
            table_ready,
            timestamp: now.to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_response_serialize() {
        let resp = SetResponse::new("my_key", 3);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["key"], "my_key");
        assert_eq!(json["size"], 3);
        assert!(json["message"].as_str().unwrap().contains("successfully"));
    }

    #[test]
    fn test_delete_response_serialize() {
        let resp = DeleteResponse::new("deleted_key");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("deleted_key"));
        assert!(json.contains("deleted"));
    }

    #[test]
    fn test_refresh_response_serialize() {
        let json = serde_json::to_value(RefreshResponse::new("k")).unwrap();
        assert_eq!(json["key"], "k");
    }

    #[test]
    fn test_stats_response_hit_rate() {
        let snapshot = CacheStatsSnapshot {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        let resp = StatsResponse::from(snapshot);
        assert!((resp.hit_rate - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_stats_response_zero_requests() {
        let resp = StatsResponse::from(CacheStatsSnapshot::default());
        assert_eq!(resp.hit_rate, 0.0);
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::new(true, Utc::now());
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["table_ready"], true);
        assert!(json["timestamp"].is_string());

        assert_eq!(HealthResponse::new(false, Utc::now()).status, "starting");
    }

    #[test]
    fn test_error_response_serialize() {
        let json = serde_json::to_string(&ErrorResponse::new("boom")).unwrap();
        assert_eq!(json, r#"{"error":"boom"}"#);
    }
}
