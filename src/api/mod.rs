//! API Module
//!
//! HTTP handlers and routing for the cache server REST API.
//!
//! # Endpoints
//! - `PUT /cache/:key` - Store the request body under a key
//! - `GET /cache/:key` - Retrieve the bytes stored under a key
//! - `POST /cache/:key/refresh` - Slide a key's expiration forward
//! - `DELETE /cache/:key` - Delete a key
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
