//! In-Memory Backend Module
//!
//! Default [`KvBackend`]: a key-ordered map of TTL entries bounded by LRU
//! eviction. Expired entries are dropped lazily on access and eagerly by
//! [`cleanup_expired`](MemoryBackend::cleanup_expired).

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use globset::Glob;
use tokio::time::Instant;

use crate::cache::backend::{Command, KeyTtl, KvBackend, Reply};
use crate::cache::{CacheEntry, LruTracker};
use crate::error::BackendError;

// == Memory Backend ==
/// Thread-safe in-process key-value backend.
#[derive(Debug)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
    /// Maximum number of entries before LRU eviction kicks in
    max_entries: usize,
}

/// Outstanding scan cursors kept before the oldest is forgotten
const MAX_OPEN_CURSORS: usize = 1024;

#[derive(Debug, Default)]
struct Inner {
    /// Ordered by key so a scan can resume after the last key it returned
    entries: BTreeMap<String, CacheEntry>,
    lru: LruTracker,
    evictions: u64,
    /// Scan cursor id -> last key handed out under it
    cursors: BTreeMap<u64, String>,
    next_cursor: u64,
}

impl MemoryBackend {
    // == Constructor ==
    /// Creates an empty backend holding at most `max_entries` keys.
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_entries: max_entries.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // == Cleanup Expired ==
    /// Removes all expired entries, returning how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        self.lock().cleanup_expired(Instant::now())
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries dropped to make room since creation.
    pub fn evictions(&self) -> u64 {
        self.lock().evictions
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl Inner {
    /// Returns the live entry for `key`, dropping it first if expired.
    fn live(&mut self, key: &str, now: Instant) -> Option<&mut CacheEntry> {
        if self.entries.get(key).is_some_and(|e| e.is_expired_at(now)) {
            self.entries.remove(key);
            self.lru.remove(key);
            return None;
        }
        self.entries.get_mut(key)
    }

    fn get(&mut self, key: &str, now: Instant) -> Option<Vec<u8>> {
        let value = self.live(key, now)?.value.clone();
        self.lru.touch(key);
        Some(value)
    }

    fn set_ex(
        &mut self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
        max_entries: usize,
    ) -> Result<(), BackendError> {
        if ttl.is_zero() {
            return Err(BackendError::Command {
                command: "SETEX",
                message: format!("invalid expire time for key {key}"),
            });
        }

        if !self.entries.contains_key(key) && self.entries.len() >= max_entries {
            // Prefer reclaiming expired space over evicting live keys
            if self.cleanup_expired(Instant::now()) == 0 {
                if let Some(evicted) = self.lru.evict_oldest() {
                    self.entries.remove(&evicted);
                    self.evictions += 1;
                }
            }
        }

        self.entries
            .insert(key.to_string(), CacheEntry::new(value, Some(ttl)));
        self.lru.touch(key);
        Ok(())
    }

    fn del(&mut self, keys: &[String], now: Instant) -> u64 {
        let mut deleted = 0;
        for key in keys {
            if self.live(key, now).is_some() {
                self.entries.remove(key);
                self.lru.remove(key);
                deleted += 1;
            }
        }
        deleted
    }

    /// Registers a cursor that resumes after `last`.
    fn open_cursor(&mut self, last: String) -> u64 {
        if self.cursors.len() >= MAX_OPEN_CURSORS {
            self.cursors.pop_first();
        }
        // Zero is reserved for "start" and "done"
        self.next_cursor = self.next_cursor.wrapping_add(1).max(1);
        self.cursors.insert(self.next_cursor, last);
        self.next_cursor
    }

    fn cleanup_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.entries.remove(key);
            self.lru.remove(key);
        }
        expired.len()
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        Ok(self.lock().get(key, Instant::now()))
    }

    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), BackendError> {
        self.lock().set_ex(key, value, ttl, self.max_entries)
    }

    async fn del(&self, keys: &[String]) -> Result<u64, BackendError> {
        Ok(self.lock().del(keys, Instant::now()))
    }

    async fn exists(&self, key: &str) -> Result<bool, BackendError> {
        Ok(self.lock().live(key, Instant::now()).is_some())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, BackendError> {
        let mut inner = self.lock();
        let now = Instant::now();
        if ttl.is_zero() {
            // Non-positive TTL deletes the key outright
            return Ok(inner.del(&[key.to_string()], now) == 1);
        }
        let updated = match inner.live(key, now) {
            Some(entry) => {
                entry.expire_in(ttl);
                true
            }
            None => false,
        };
        Ok(updated)
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, BackendError> {
        let mut inner = self.lock();
        let ttl = match inner.live(key, Instant::now()) {
            None => KeyTtl::Missing,
            Some(entry) => match entry.ttl_remaining() {
                Some(remaining) => KeyTtl::Expires(remaining),
                None => KeyTtl::Persistent,
            },
        };
        Ok(ttl)
    }

    /// Keys present for the whole iteration are returned exactly once, even
    /// if other keys are added, deleted or expire between pages.
    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(Vec<String>, u64), BackendError> {
        let matcher = Glob::new(pattern)
            .map_err(|e| BackendError::Command {
                command: "SCAN",
                message: format!("invalid pattern {pattern}: {e}"),
            })?
            .compile_matcher();

        let mut inner = self.lock();
        let now = Instant::now();

        let after = match cursor {
            0 => None,
            id => Some(inner.cursors.remove(&id).ok_or_else(|| BackendError::Command {
                command: "SCAN",
                message: format!("unknown cursor {id}"),
            })?),
        };
        let lower = match &after {
            Some(last) => Bound::Excluded(last.as_str()),
            None => Bound::Unbounded,
        };

        let page_size = count.max(1);
        let page: Vec<String> = inner
            .entries
            .range::<str, _>((lower, Bound::Unbounded))
            .filter(|(key, entry)| !entry.is_expired_at(now) && matcher.is_match(key.as_str()))
            .take(page_size)
            .map(|(key, _)| key.clone())
            .collect();

        let next_cursor = match page.last() {
            Some(last) if page.len() == page_size => inner.open_cursor(last.clone()),
            _ => 0,
        };
        Ok((page, next_cursor))
    }

    async fn pipeline(&self, commands: Vec<Command>) -> Result<Vec<Reply>, BackendError> {
        let mut inner = self.lock();
        let now = Instant::now();
        let mut replies = Vec::with_capacity(commands.len());

        for command in commands {
            let reply = match command {
                Command::Get(key) => Reply::Value(inner.get(&key, now)),
                Command::SetEx { key, value, ttl } => {
                    inner.set_ex(&key, value, ttl, self.max_entries)?;
                    Reply::Ok
                }
                Command::Del(keys) => Reply::Deleted(inner.del(&keys, now)),
            };
            replies.push(reply);
        }
        Ok(replies)
    }

    async fn ping(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(300);

    #[tokio::test]
    async fn test_backend_set_and_get() {
        let backend = MemoryBackend::new(100);

        backend.set_ex("key1", b"value1".to_vec(), TTL).await.unwrap();

        assert_eq!(backend.get("key1").await.unwrap(), Some(b"value1".to_vec()));
        assert_eq!(backend.get("missing").await.unwrap(), None);
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_backend_rejects_zero_ttl() {
        let backend = MemoryBackend::new(100);

        let result = backend.set_ex("key", b"v".to_vec(), Duration::ZERO).await;
        assert!(matches!(result, Err(BackendError::Command { command: "SETEX", .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_ttl_expiration() {
        let backend = MemoryBackend::new(100);
        backend
            .set_ex("key1", b"v".to_vec(), Duration::from_secs(1))
            .await
            .unwrap();

        assert!(backend.exists("key1").await.unwrap());
        tokio::time::advance(Duration::from_millis(1100)).await;

        assert!(!backend.exists("key1").await.unwrap());
        assert_eq!(backend.ttl("key1").await.unwrap(), KeyTtl::Missing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_expire_and_ttl() {
        let backend = MemoryBackend::new(100);
        backend.set_ex("key1", b"v".to_vec(), TTL).await.unwrap();

        assert!(backend.expire("key1", Duration::from_secs(5)).await.unwrap());
        assert_eq!(
            backend.ttl("key1").await.unwrap(),
            KeyTtl::Expires(Duration::from_secs(5))
        );
        assert!(!backend.expire("missing", Duration::from_secs(5)).await.unwrap());

        assert!(backend.expire("key1", Duration::ZERO).await.unwrap());
        assert!(!backend.exists("key1").await.unwrap());
    }

    #[tokio::test]
    async fn test_backend_del_counts_existing_only() {
        let backend = MemoryBackend::new(100);
        backend.set_ex("a", b"1".to_vec(), TTL).await.unwrap();
        backend.set_ex("b", b"2".to_vec(), TTL).await.unwrap();

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(backend.del(&keys).await.unwrap(), 2);
        assert_eq!(backend.del(&keys).await.unwrap(), 0);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_backend_lru_eviction() {
        let backend = MemoryBackend::new(3);
        backend.set_ex("key1", b"1".to_vec(), TTL).await.unwrap();
        backend.set_ex("key2", b"2".to_vec(), TTL).await.unwrap();
        backend.set_ex("key3", b"3".to_vec(), TTL).await.unwrap();

        // Touch key1 so key2 becomes least recently used
        backend.get("key1").await.unwrap();
        backend.set_ex("key4", b"4".to_vec(), TTL).await.unwrap();

        assert_eq!(backend.len(), 3);
        assert_eq!(backend.evictions(), 1);
        assert!(backend.exists("key1").await.unwrap());
        assert!(!backend.exists("key2").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_cleanup_expired() {
        let backend = MemoryBackend::new(100);
        backend
            .set_ex("short", b"1".to_vec(), Duration::from_secs(1))
            .await
            .unwrap();
        backend
            .set_ex("long", b"2".to_vec(), Duration::from_secs(10))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_millis(1100)).await;

        assert_eq!(backend.cleanup_expired(), 1);
        assert_eq!(backend.len(), 1);
        assert!(backend.exists("long").await.unwrap());
    }

    #[tokio::test]
    async fn test_backend_scan_pages_through_matches() {
        let backend = MemoryBackend::new(100);
        for i in 0..5 {
            backend
                .set_ex(&format!("svc:{i}"), b"v".to_vec(), TTL)
                .await
                .unwrap();
        }
        backend.set_ex("other:1", b"v".to_vec(), TTL).await.unwrap();

        let mut cursor = 0;
        let mut seen = Vec::new();
        loop {
            let (page, next) = backend.scan(cursor, "svc:*", 2).await.unwrap();
            assert!(page.len() <= 2);
            seen.extend(page);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        assert_eq!(seen, vec!["svc:0", "svc:1", "svc:2", "svc:3", "svc:4"]);
    }

    #[tokio::test]
    async fn test_backend_pipeline_is_not_transactional() {
        let backend = MemoryBackend::new(100);

        let result = backend
            .pipeline(vec![
                Command::SetEx {
                    key: "first".into(),
                    value: b"1".to_vec(),
                    ttl: TTL,
                },
                Command::SetEx {
                    key: "bad".into(),
                    value: b"2".to_vec(),
                    ttl: Duration::ZERO,
                },
            ])
            .await;

        assert!(result.is_err());
        assert!(backend.exists("first").await.unwrap());
        assert!(!backend.exists("bad").await.unwrap());
    }

    #[tokio::test]
    async fn test_backend_pipeline_replies_in_order() {
        let backend = MemoryBackend::new(100);
        backend.set_ex("a", b"1".to_vec(), TTL).await.unwrap();

        let replies = backend
            .pipeline(vec![
                Command::Get("a".into()),
                Command::Get("b".into()),
                Command::Del(vec!["a".into()]),
            ])
            .await
            .unwrap();

        assert_eq!(
            replies,
            vec![
                Reply::Value(Some(b"1".to_vec())),
                Reply::Value(None),
                Reply::Deleted(1)
            ]
        );
    }

    async fn scan_all(backend: &MemoryBackend, pattern: &str) -> Vec<String> {
        let mut cursor = 0;
        let mut seen = Vec::new();
        loop {
            let (page, next) = backend.scan(cursor, pattern, 2).await.unwrap();
            seen.extend(page);
            if next == 0 {
                return seen;
            }
            cursor = next;
        }
    }

    #[tokio::test]
    async fn test_backend_scan_glob_patterns() {
        let backend = MemoryBackend::new(100);
        for key in ["blueprint:call:Alice", "blueprint:call:Bob", "abc", "ac", "other:call"] {
            backend.set_ex(key, b"v".to_vec(), TTL).await.unwrap();
        }

        assert_eq!(
            scan_all(&backend, "blueprint:*").await,
            vec!["blueprint:call:Alice", "blueprint:call:Bob"]
        );
        assert_eq!(scan_all(&backend, "a?c").await, vec!["abc"]);
        assert_eq!(scan_all(&backend, "ac").await, vec!["ac"]);
        assert_eq!(scan_all(&backend, "*").await.len(), 5);
    }

    #[tokio::test]
    async fn test_backend_scan_rejects_invalid_pattern() {
        let backend = MemoryBackend::new(100);

        let result = backend.scan(0, "blueprint:[", 10).await;

        assert!(matches!(result, Err(BackendError::Command { command: "SCAN", .. })));
    }

    #[tokio::test]
    async fn test_backend_scan_rejects_unknown_cursor() {
        let backend = MemoryBackend::new(100);

        let result = backend.scan(42, "*", 10).await;

        assert!(matches!(result, Err(BackendError::Command { command: "SCAN", .. })));
    }

    #[tokio::test]
    async fn test_backend_scan_survives_delete_between_pages() {
        let backend = MemoryBackend::new(100);
        for key in ["p:a", "p:b", "p:c", "p:d"] {
            backend.set_ex(key, b"v".to_vec(), TTL).await.unwrap();
        }

        let (first, cursor) = backend.scan(0, "p:*", 2).await.unwrap();
        assert_eq!(first, vec!["p:a", "p:b"]);
        assert_ne!(cursor, 0);

        backend.del(&["p:a".to_string()]).await.unwrap();

        let mut seen = first;
        let mut cursor = cursor;
        while cursor != 0 {
            let (page, next) = backend.scan(cursor, "p:*", 2).await.unwrap();
            seen.extend(page);
            cursor = next;
        }

        assert_eq!(seen, vec!["p:a", "p:b", "p:c", "p:d"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_scan_survives_expiry_between_pages() {
        let backend = MemoryBackend::new(100);
        backend
            .set_ex("p:a", b"v".to_vec(), Duration::from_secs(1))
            .await
            .unwrap();
        for key in ["p:b", "p:c"] {
            backend.set_ex(key, b"v".to_vec(), TTL).await.unwrap();
        }

        let (first, cursor) = backend.scan(0, "p:*", 1).await.unwrap();
        assert_eq!(first, vec!["p:a"]);

        tokio::time::advance(Duration::from_secs(2)).await;

        let (second, cursor) = backend.scan(cursor, "p:*", 1).await.unwrap();
        assert_eq!(second, vec!["p:b"]);
        let (third, _) = backend.scan(cursor, "p:*", 1).await.unwrap();
        assert_eq!(third, vec!["p:c"]);
    }
}
