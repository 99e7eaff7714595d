//! Request DTOs for the blueprint API
//!
//! Defines the structure of incoming request bodies.

use serde::{Deserialize, Serialize};

/// Maximum accepted length of `name`, in characters
pub const MAX_NAME_LENGTH: usize = 100;

/// Request body for the Call operation (POST /v1/call)
///
/// # Fields
/// - `name`: Who to greet; also the rate-limit identifier and cache key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRequest {
    /// Caller-supplied name
    #[serde(default)]
    pub name: String,
}

impl CallRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.name.is_empty() {
            return Some("name is required".to_string());
        }
        if self.name.chars().count() > MAX_NAME_LENGTH {
            return Some(format!(
                "name is too long: must be at most {MAX_NAME_LENGTH} characters"
            ));
        }
        None
    }
}
