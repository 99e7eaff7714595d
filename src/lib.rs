//! Blueprint - a service scaffold
//!
//! One example RPC operation behind a sliding-window rate limiter and a
//! write-through response cache, with per-call metrics and health checks.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod rate_limit;
pub mod service;
pub mod tasks;

pub use api::{create_router, AppState};
pub use config::Config;
pub use error::{CacheError, ServiceError};
pub use rate_limit::RateLimiter;
pub use service::{Blueprint, BlueprintHandler};
pub use tasks::spawn_cleanup_task;
