//! Redis Backend Module
//!
//! [`KvBackend`] over a Redis server. A [`ConnectionManager`] multiplexes
//! one connection and reconnects on its own after a drop; each call clones
//! the manager handle.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError, Value};
use tracing::debug;

use crate::cache::backend::{Command, KeyTtl, KvBackend, Reply};
use crate::error::BackendError;

/// Upper bound on establishing the first connection
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// == Redis Backend ==
/// Key-value backend talking to a Redis server.
#[derive(Clone)]
pub struct RedisBackend {
    manager: ConnectionManager,
}

impl RedisBackend {
    // == Constructor ==
    /// Connects to the server at `url` and verifies it answers PING.
    ///
    /// # Arguments
    /// * `url` - Connection URL, e.g. `redis://:password@localhost:6379/0`
    ///
    /// # Returns
    /// - `BackendError::Command` if the URL cannot be parsed
    /// - `BackendError::Unavailable` if the server is not reachable within
    ///   [`CONNECT_TIMEOUT`]
    pub async fn connect(url: &str) -> Result<Self, BackendError> {
        let client = redis::Client::open(url).map_err(|e| BackendError::Command {
            command: "CONNECT",
            message: e.to_string(),
        })?;

        let manager = tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                BackendError::Unavailable(format!(
                    "no connection after {}s",
                    CONNECT_TIMEOUT.as_secs()
                ))
            })?
            .map_err(backend_error("CONNECT"))?;

        let backend = Self { manager };
        backend.ping().await?;
        debug!("redis backend connected");
        Ok(backend)
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

/// Maps a client error to the backend error class for `command`.
fn backend_error(command: &'static str) -> impl Fn(RedisError) -> BackendError {
    move |e| {
        if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout()
        {
            BackendError::Unavailable(e.to_string())
        } else {
            BackendError::Command {
                command,
                message: e.to_string(),
            }
        }
    }
}

/// Millisecond TTL argument; sub-millisecond durations round up to 1.
fn ttl_millis(ttl: Duration) -> u64 {
    if ttl.is_zero() {
        return 0;
    }
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Decodes a PTTL reply: -2 for a missing key, -1 for no expiry.
fn key_ttl(millis: i64) -> KeyTtl {
    match millis {
        -2 => KeyTtl::Missing,
        m if m < 0 => KeyTtl::Persistent,
        m => KeyTtl::Expires(Duration::from_millis(m.unsigned_abs())),
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        self.conn().get(key).await.map_err(backend_error("GET"))
    }

    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), BackendError> {
        redis::cmd("PSETEX")
            .arg(key)
            .arg(ttl_millis(ttl))
            .arg(value)
            .query_async(&mut self.conn())
            .await
            .map_err(backend_error("PSETEX"))
    }

    async fn del(&self, keys: &[String]) -> Result<u64, BackendError> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.conn().del(keys).await.map_err(backend_error("DEL"))
    }

    async fn exists(&self, key: &str) -> Result<bool, BackendError> {
        self.conn().exists(key).await.map_err(backend_error("EXISTS"))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, BackendError> {
        // PEXPIRE with 0 deletes the key, matching a non-positive TTL
        redis::cmd("PEXPIRE")
            .arg(key)
            .arg(ttl_millis(ttl))
            .query_async(&mut self.conn())
            .await
            .map_err(backend_error("PEXPIRE"))
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, BackendError> {
        let millis: i64 = self.conn().pttl(key).await.map_err(backend_error("PTTL"))?;
        Ok(key_ttl(millis))
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(Vec<String>, u64), BackendError> {
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count.max(1))
            .query_async(&mut self.conn())
            .await
            .map_err(backend_error("SCAN"))?;
        Ok((keys, next))
    }

    async fn pipeline(&self, commands: Vec<Command>) -> Result<Vec<Reply>, BackendError> {
        let mut pipe = redis::pipe();
        for command in &commands {
            match command {
                Command::Get(key) => {
                    pipe.cmd("GET").arg(key);
                }
                Command::SetEx { key, value, ttl } => {
                    pipe.cmd("PSETEX").arg(key).arg(ttl_millis(*ttl)).arg(value);
                }
                Command::Del(keys) => {
                    pipe.cmd("DEL").arg(keys);
                }
            }
        }

        let values: Vec<Value> = pipe
            .query_async(&mut self.conn())
            .await
            .map_err(backend_error("PIPELINE"))?;

        commands
            .iter()
            .zip(values.iter())
            .map(|(command, value)| {
                let reply = match command {
                    Command::Get(_) => Reply::Value(redis::from_redis_value(value)?),
                    Command::SetEx { .. } => Reply::Ok,
                    Command::Del(_) => Reply::Deleted(redis::from_redis_value(value)?),
                };
                Ok(reply)
            })
            .collect::<Result<Vec<Reply>, RedisError>>()
            .map_err(backend_error("PIPELINE"))
    }

    async fn ping(&self) -> Result<(), BackendError> {
        let _: String = redis::cmd("PING")
            .query_async(&mut self.conn())
            .await
            .map_err(backend_error("PING"))?;
        Ok(())
    }
}
