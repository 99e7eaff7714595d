//! API Module
//!
//! HTTP handlers and routing for the blueprint service.
//!
//! # Endpoints
//! - `POST /v1/call` - Greet a caller
//! - `GET /health` - Health check endpoint
//! - `GET /metrics` - Handler metrics
//! - `POST /metrics/reset` - Reset handler metrics
//! - `GET /cache/stats` - Cache statistics

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
