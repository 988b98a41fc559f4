//! Background Tasks Module
//!
//! Contains background tasks that run alongside the HTTP server.
//!
//! # Tasks
//! - Table warm-up: resolves the backing table at startup so the first
//!   request does not pay for table creation

mod warmup;

pub use warmup::spawn_warmup_task;
