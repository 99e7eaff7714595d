//! Request and Response models for the blueprint API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{CallRequest, MAX_NAME_LENGTH};
pub use responses::{
    CallResponse, ErrorResponse, HealthResponse, MetricsResponse, StatsResponse,
};
