//! Error types for the blueprint service
//!
//! Provides unified error handling using thiserror. `ServiceError` is the
//! only type that crosses the RPC boundary; everything below it is wrapped
//! with operation context and logged before being reduced to an error class.

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Service Error Enum ==
/// Error classes surfaced to RPC callers.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Caller-supplied input is malformed
    #[error("{0}")]
    InvalidArgument(String),

    /// Admission control rejected the call
    #[error("rate limit exceeded")]
    ResourceExhausted { retry_after: Duration },

    /// The bounded request context expired before the call finished
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Business logic or backend failure; detail is logged, never returned
    #[error("internal server error")]
    Internal,

    /// A dependency failed its liveness probe
    #[error("{0} unavailable")]
    Unavailable(&'static str),

    /// Method exists on the RPC surface but has no implementation
    #[error("method {0} not implemented")]
    Unimplemented(&'static str),
}

impl ServiceError {
    /// RPC status code name for this error class.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::InvalidArgument(_) => "INVALID_ARGUMENT",
            ServiceError::ResourceExhausted { .. } => "RESOURCE_EXHAUSTED",
            ServiceError::DeadlineExceeded => "DEADLINE_EXCEEDED",
            ServiceError::Internal => "INTERNAL",
            ServiceError::Unavailable(_) => "UNAVAILABLE",
            ServiceError::Unimplemented(_) => "UNIMPLEMENTED",
        }
    }

    /// HTTP status carrying this error class.
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ServiceError::ResourceExhausted { .. } => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            ServiceError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Unimplemented(_) => StatusCode::NOT_IMPLEMENTED,
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse::new(self.code(), self.to_string()));
        let mut response = (self.status(), body).into_response();

        if let ServiceError::ResourceExhausted { retry_after } = self {
            // Retry-After is whole seconds; round up so clients never retry early
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
        }

        response
    }
}

// == Backend Error Enum ==
/// Failure reported by a key-value backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Backend could not be reached
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Backend rejected or failed a command
    #[error("{command} failed: {message}")]
    Command {
        command: &'static str,
        message: String,
    },
}

// == Cache Error Enum ==
/// Errors raised by the cache store.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Value could not be serialized
    #[error("failed to encode value for key {key}: {source}")]
    Encoding {
        key: String,
        source: serde_json::Error,
    },

    /// Stored payload could not be deserialized into the requested type
    #[error("failed to decode cached value for key {key}: {source}")]
    Decoding {
        key: String,
        source: serde_json::Error,
    },

    /// Key absent (never set, deleted, or expired)
    #[error("key {0} not found")]
    NotFound(String),

    /// Backend removed fewer keys than requested; removals are not rolled back
    #[error("expected to delete {requested} keys, but deleted {deleted}")]
    PartialDelete { requested: u64, deleted: u64 },

    /// Default-TTL write failed on every attempt
    #[error("failed to set cache key {key} after {attempts} attempts: {source}")]
    RetriesExhausted {
        key: String,
        attempts: u32,
        source: BackendError,
    },

    /// Single-key backend operation failed
    #[error("cache operation on {key} failed: {source}")]
    Backend { key: String, source: BackendError },

    /// Pipeline as a whole failed; earlier commands may already be applied
    #[error("pipeline of {commands} commands failed: {source}")]
    Pipeline {
        commands: usize,
        source: BackendError,
    },

    /// Liveness probe failed
    #[error("cache backend unavailable: {0}")]
    BackendUnavailable(#[source] BackendError),
}

impl CacheError {
    /// True for an ordinary miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }

    /// True when part of a batch operation succeeded.
    pub fn is_partial(&self) -> bool {
        matches!(self, CacheError::PartialDelete { .. })
    }
}

// == Store Error Enum ==
/// Errors raised by the persistent store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store task failed: {0}")]
    Join(String),
}

// == Config Error ==
/// Every missing or unparseable configuration key, collected in one pass.
#[derive(Error, Debug, Default, PartialEq, Eq)]
#[error("{}", describe_config_error(.missing, .invalid))]
pub struct ConfigError {
    /// Required keys that were not set
    pub missing: Vec<&'static str>,
    /// Keys whose values failed to parse, with the offending value
    pub invalid: Vec<(&'static str, String)>,
}

impl ConfigError {
    /// True if no problem was recorded.
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }
}

fn describe_config_error(missing: &[&'static str], invalid: &[(&'static str, String)]) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing required configuration: {}", missing.join(", ")));
    }
    if !invalid.is_empty() {
        let values: Vec<String> = invalid
            .iter()
            .map(|(key, value)| format!("{key}={value:?}"))
            .collect();
        parts.push(format!("invalid configuration values: {}", values.join(", ")));
    }
    parts.join("; ")
}

// == Result Type Aliases ==
/// Convenience Result type for RPC operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Convenience Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;
