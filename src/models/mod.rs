//! Request and Response models for the cache server API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! deserializing query parameters and serializing JSON response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::SetParams;
pub use responses::{
    DeleteResponse, ErrorResponse, HealthResponse, RefreshResponse, SetResponse, StatsResponse,
};
