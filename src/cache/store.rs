//! Cache Store Module
//!
//! Typed write-through cache over a [`KvBackend`]: JSON encoding, key
//! prefixing, retried writes, pipelined batches, and operation statistics.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::cache::backend::{Command, KeyTtl, KvBackend, Reply};
use crate::cache::CacheStats;
use crate::error::{CacheError, CacheResult};

/// Default key namespace
pub const DEFAULT_PREFIX: &str = "blueprint";
/// Default TTL applied by [`CacheStore::set`]
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);
/// Default number of write attempts for [`CacheStore::set`]
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Base backoff between write attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Keys fetched per scan round trip during [`CacheStore::flush`]
const SCAN_PAGE_SIZE: usize = 100;

// == Cache Options ==
/// Construction options for a [`CacheStore`].
///
/// Empty or zero values fall back to the defaults.
///
/// ```rust
/// # use blueprint::cache::CacheOptions;
/// # use std::time::Duration;
/// let options = CacheOptions::new()
///     .prefix("orders")
///     .default_ttl(Duration::from_secs(600))
///     .max_retries(5);
/// ```
#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub prefix: String,
    pub default_ttl: Duration,
    /// Total write attempts, including the first
    pub max_retries: u32,
    /// Backoff unit; attempt `n` waits `retry_delay * n` before the next try
    pub retry_delay: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            default_ttl: DEFAULT_TTL,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl CacheOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn max_retries(mut self, attempts: u32) -> Self {
        self.max_retries = attempts;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn normalized(mut self) -> Self {
        if self.prefix.is_empty() {
            self.prefix = DEFAULT_PREFIX.to_string();
        }
        if self.default_ttl.is_zero() {
            self.default_ttl = DEFAULT_TTL;
        }
        if self.max_retries == 0 {
            self.max_retries = DEFAULT_MAX_RETRIES;
        }
        if self.retry_delay.is_zero() {
            self.retry_delay = DEFAULT_RETRY_DELAY;
        }
        self
    }
}

// == Cache Store ==
/// Write-through cache over a shared key-value backend.
///
/// Entries live in the backend; the store keeps only its configuration and
/// a mutex-guarded [`CacheStats`]. Every logical key is stored as
/// `<prefix>:<key>`.
pub struct CacheStore {
    backend: Arc<dyn KvBackend>,
    options: CacheOptions,
    stats: Mutex<CacheStats>,
}

impl CacheStore {
    // == Constructors ==
    /// Creates a store with default options.
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self::with_options(backend, CacheOptions::default())
    }

    pub fn with_options(backend: Arc<dyn KvBackend>, options: CacheOptions) -> Self {
        Self {
            backend,
            options: options.normalized(),
            stats: Mutex::new(CacheStats::new()),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.options.prefix
    }

    /// Fully qualified backend key for a logical key.
    pub fn full_key(&self, key: &str) -> String {
        format!("{}:{}", self.options.prefix, key)
    }

    // == Set ==
    /// Stores `value` under `key` with the default TTL.
    ///
    /// Backend failures are retried up to `max_retries` attempts with linear
    /// backoff (`retry_delay * attempt`).
    ///
    /// # Arguments
    /// * `key` - Logical key, stored as `<prefix>:<key>`
    /// * `value` - Any serializable value; encoded as JSON before the first attempt
    ///
    /// # Returns
    /// - `Ok(())` once a write is confirmed; `sets` grows by one
    /// - `CacheError::Encoding` if `value` cannot be serialized; nothing is written
    /// - `CacheError::RetriesExhausted` if every attempt failed
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> CacheResult<()> {
        let data = encode(key, value)?;
        let full_key = self.full_key(key);

        let mut attempt = 1;
        loop {
            match self
                .backend
                .set_ex(&full_key, data.clone(), self.options.default_ttl)
                .await
            {
                Ok(()) => {
                    self.update_stats(|s| s.record_sets(1));
                    return Ok(());
                }
                Err(source) if attempt >= self.options.max_retries => {
                    return Err(CacheError::RetriesExhausted {
                        key: full_key,
                        attempts: attempt,
                        source,
                    });
                }
                Err(e) => {
                    let delay = self.options.retry_delay * attempt;
                    warn!(
                        key = %full_key,
                        attempt,
                        max_retries = self.options.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying cache write"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    // == Set With TTL ==
    /// Stores `value` under `key` with an explicit TTL, in a single attempt.
    pub async fn set_with_ttl<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> CacheResult<()> {
        let data = encode(key, value)?;
        let full_key = self.full_key(key);

        self.backend
            .set_ex(&full_key, data, ttl)
            .await
            .map_err(|source| CacheError::Backend {
                key: full_key,
                source,
            })?;

        self.update_stats(|s| s.record_sets(1));
        Ok(())
    }

    // == Get ==
    /// Fetches and decodes the value stored under `key`.
    ///
    /// A present payload counts as a hit even if it then fails to decode;
    /// that case is reported as [`CacheError::Decoding`].
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<T> {
        let data = self.get_raw(key).await?;
        serde_json::from_slice(&data).map_err(|source| CacheError::Decoding {
            key: self.full_key(key),
            source,
        })
    }

    /// Fetches the raw payload stored under `key`.
    pub async fn get_raw(&self, key: &str) -> CacheResult<Vec<u8>> {
        let full_key = self.full_key(key);

        match self.backend.get(&full_key).await {
            Ok(Some(data)) => {
                self.update_stats(|s| s.record_hits(1));
                Ok(data)
            }
            Ok(None) => {
                self.update_stats(|s| s.record_misses(1));
                Err(CacheError::NotFound(full_key))
            }
            Err(source) => Err(CacheError::Backend {
                key: full_key,
                source,
            }),
        }
    }

    // == Delete ==
    /// Deletes `keys` in one backend round trip.
    ///
    /// `deletes` grows by the number of keys requested once the backend
    /// answers.
    ///
    /// # Arguments
    /// * `keys` - Logical keys; an empty slice makes no backend call
    ///
    /// # Returns
    /// - `Ok(n)` with the number of keys that existed, where `n` is either
    ///   all of them or zero (already gone is a no-op)
    /// - `CacheError::PartialDelete` if only some existed; the removed keys
    ///   are not restored
    pub async fn delete(&self, keys: &[&str]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let full_keys: Vec<String> = keys.iter().map(|key| self.full_key(key)).collect();
        let requested = full_keys.len() as u64;

        let deleted = self
            .backend
            .del(&full_keys)
            .await
            .map_err(|source| CacheError::Backend {
                key: full_keys.join(","),
                source,
            })?;

        self.update_stats(|s| s.record_deletes(requested));

        if deleted > 0 && deleted < requested {
            return Err(CacheError::PartialDelete { requested, deleted });
        }
        Ok(deleted)
    }

    // == Pass-through Queries ==
    pub async fn exists(&self, key: &str) -> CacheResult<bool> {
        let full_key = self.full_key(key);
        self.backend
            .exists(&full_key)
            .await
            .map_err(|source| CacheError::Backend {
                key: full_key,
                source,
            })
    }

    /// Resets the TTL of `key`. Returns false if the key does not exist.
    pub async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let full_key = self.full_key(key);
        self.backend
            .expire(&full_key, ttl)
            .await
            .map_err(|source| CacheError::Backend {
                key: full_key,
                source,
            })
    }

    pub async fn ttl(&self, key: &str) -> CacheResult<KeyTtl> {
        let full_key = self.full_key(key);
        self.backend
            .ttl(&full_key)
            .await
            .map_err(|source| CacheError::Backend {
                key: full_key,
                source,
            })
    }

    // == Flush ==
    /// Deletes every key under this store's prefix. Not counted in stats.
    pub async fn flush(&self) -> CacheResult<u64> {
        let pattern = format!("{}:*", self.options.prefix);
        let mut keys = Vec::new();
        let mut cursor = 0;

        loop {
            let (page, next) = self
                .backend
                .scan(cursor, &pattern, SCAN_PAGE_SIZE)
                .await
                .map_err(|source| CacheError::Backend {
                    key: pattern.clone(),
                    source,
                })?;
            keys.extend(page);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        if keys.is_empty() {
            return Ok(0);
        }

        let deleted = self
            .backend
            .del(&keys)
            .await
            .map_err(|source| CacheError::Backend {
                key: pattern,
                source,
            })?;

        debug!(prefix = %self.options.prefix, deleted, "cache flushed");
        Ok(deleted)
    }

    // == Batch Operations ==
    /// Writes all `items` with `ttl` in one pipeline.
    ///
    /// Every item is encoded before anything is sent. The pipeline is not
    /// transactional: a failure part-way leaves earlier writes in place.
    pub async fn set_batch<T: Serialize>(&self, items: &[(&str, T)], ttl: Duration) -> CacheResult<()> {
        if items.is_empty() {
            return Ok(());
        }

        let mut commands = Vec::with_capacity(items.len());
        for (key, value) in items {
            commands.push(Command::SetEx {
                key: self.full_key(key),
                value: encode(key, value)?,
                ttl,
            });
        }

        let count = commands.len();
        self.backend
            .pipeline(commands)
            .await
            .map_err(|source| CacheError::Pipeline {
                commands: count,
                source,
            })?;

        self.update_stats(|s| s.record_sets(count as u64));
        Ok(())
    }

    /// Fetches `keys` in one pipeline.
    ///
    /// # Arguments
    /// * `keys` - Logical keys to look up
    ///
    /// # Returns
    /// - A map from logical key to decoded value. Absent keys are left out
    ///   and counted as misses. Payloads that fail to decode count as hits
    ///   and are left out with a warning.
    /// - `CacheError::Pipeline` if the round trip failed; no stats move
    pub async fn get_batch<T: DeserializeOwned>(&self, keys: &[&str]) -> CacheResult<HashMap<String, T>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let commands: Vec<Command> = keys
            .iter()
            .map(|key| Command::Get(self.full_key(key)))
            .collect();
        let count = commands.len();

        let replies = self
            .backend
            .pipeline(commands)
            .await
            .map_err(|source| CacheError::Pipeline {
                commands: count,
                source,
            })?;

        let mut found = HashMap::with_capacity(keys.len());
        let (mut hits, mut misses) = (0, 0);

        for (key, reply) in keys.iter().zip(replies) {
            match reply {
                Reply::Value(Some(data)) => {
                    hits += 1;
                    match serde_json::from_slice(&data) {
                        Ok(value) => {
                            found.insert((*key).to_string(), value);
                        }
                        Err(e) => {
                            warn!(key = %self.full_key(key), error = %e, "failed to decode batch entry");
                        }
                    }
                }
                Reply::Value(None) => misses += 1,
                other => {
                    warn!(key = %self.full_key(key), reply = ?other, "unexpected pipeline reply");
                }
            }
        }

        self.update_stats(|s| {
            s.record_hits(hits);
            s.record_misses(misses);
        });
        Ok(found)
    }

    // == Stats ==
    /// Returns a snapshot of the operation counters.
    pub fn stats(&self) -> CacheStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn reset_stats(&self) {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner) = CacheStats::new();
    }

    // == Ping ==
    /// Liveness probe against the backend.
    pub async fn ping(&self) -> CacheResult<()> {
        self.backend
            .ping()
            .await
            .map_err(CacheError::BackendUnavailable)
    }

    fn update_stats(&self, f: impl FnOnce(&mut CacheStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut stats);
    }
}

fn encode<T: Serialize + ?Sized>(key: &str, value: &T) -> CacheResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|source| CacheError::Encoding {
        key: key.to_string(),
        source,
    })
}
