//! Response DTOs for the blueprint API
//!
//! Defines the structure of outgoing response bodies.

use serde::{Deserialize, Serialize};

use crate::cache::CacheStats;
use crate::service::Metrics;

/// Response body for the Call operation (POST /v1/call)
///
/// Also the value cached under `call:<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallResponse {
    pub message: String,
}

impl CallResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response body for the cache stats endpoint (GET /cache/stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            sets: stats.sets,
            deletes: stats.deletes,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// Response body for the metrics endpoint (GET /metrics)
#[derive(Debug, Clone, Serialize)]
pub struct MetricsResponse {
    pub total_requests: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Running latency estimate in milliseconds
    pub avg_response_time_ms: f64,
}

impl From<Metrics> for MetricsResponse {
    fn from(metrics: Metrics) -> Self {
        Self {
            total_requests: metrics.total_requests,
            successful_calls: metrics.successful_calls,
            failed_calls: metrics.failed_calls,
            cache_hits: metrics.cache_hits,
            cache_misses: metrics.cache_misses,
            avg_response_time_ms: metrics.avg_response_time.as_secs_f64() * 1000.0,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// RPC status code name, e.g. `INVALID_ARGUMENT`
    pub code: String,
    /// Error message safe to show the caller
    pub error: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            error: error.into(),
        }
    }
}
