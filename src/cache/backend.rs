//! Key-Value Backend Module
//!
//! The narrow capability the cache store needs from a key-value server.
//! Keys are fully qualified (already prefixed); values are opaque bytes.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::BackendError;

/// Remaining lifetime of a key as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// Key does not exist
    Missing,
    /// Key exists without an expiry
    Persistent,
    /// Key expires after the given duration
    Expires(Duration),
}

/// One command in a pipelined round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get(String),
    SetEx {
        key: String,
        value: Vec<u8>,
        ttl: Duration,
    },
    Del(Vec<String>),
}

/// Reply to a pipelined command, positionally matching the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Value(Option<Vec<u8>>),
    Ok,
    Deleted(u64),
}

/// Key-value backend capability.
///
/// Pipelines are a single round trip but not transactional: if a command
/// fails, the ones before it stay applied and the whole pipeline errors.
#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError>;

    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), BackendError>;

    /// Deletes the given keys, returning how many existed.
    async fn del(&self, keys: &[String]) -> Result<u64, BackendError>;

    async fn exists(&self, key: &str) -> Result<bool, BackendError>;

    /// Sets a new TTL. Returns false if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, BackendError>;

    async fn ttl(&self, key: &str) -> Result<KeyTtl, BackendError>;

    /// Cursor-based iteration over keys matching a glob pattern.
    ///
    /// Start with cursor 0; iteration is complete when the returned cursor is 0.
    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(Vec<String>, u64), BackendError>;

    async fn pipeline(&self, commands: Vec<Command>) -> Result<Vec<Reply>, BackendError>;

    async fn ping(&self) -> Result<(), BackendError>;
}
