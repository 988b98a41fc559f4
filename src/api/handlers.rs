//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;

use crate::cache::DistributedCache;
use crate::config::Config;
use crate::error::Result;
use crate::models::{
    DeleteResponse, ErrorResponse, HealthResponse, RefreshResponse, SetParams, SetResponse,
    StatsResponse,
};
use crate::store::TableStore;

/// Application state shared across all handlers.
///
/// The engine is internally synchronized, so handlers share it through a
/// plain `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<DistributedCache>,
}

impl AppState {
    /// Creates a new AppState around an existing engine.
    pub fn new(cache: Arc<DistributedCache>) -> Self {
        Self { cache }
    }

    /// Builds the engine over `store` using the loaded configuration.
    pub fn from_config(config: &Config, store: Arc<dyn TableStore>) -> Result<Self> {
        let cache = DistributedCache::new(store, config.cache.clone())?;
        Ok(Self::new(Arc::new(cache)))
    }
}

/// Handler for PUT /cache/:key
///
/// Stores the raw request body; expiration comes from the query string.
pub async fn set_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<SetParams>,
    body: Bytes,
) -> Result<Json<SetResponse>> {
    let size = body.len();
    state
        .cache
        .set(&key, body.to_vec(), params.to_entry_options())
        .await?;

    Ok(Json(SetResponse::new(key, size)))
}

/// Handler for GET /cache/:key
///
/// Responds with the stored bytes as `application/octet-stream`, or 404.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response> {
    let response = match state.cache.get(&key).await? {
        Some(value) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            value,
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!("Key not found: {}", key))),
        )
            .into_response(),
    };
    Ok(response)
}

/// Handler for POST /cache/:key/refresh
pub async fn refresh_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<RefreshResponse>> {
    state.cache.refresh(&key).await?;
    Ok(Json(RefreshResponse::new(key)))
}

/// Handler for DELETE /cache/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    state.cache.remove(&key).await?;
    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.stats()))
}

/// Handler for GET /health
///
/// Never triggers table resolution; it only reports whether it happened.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::new(state.cache.is_ready(), Utc::now()))
}
