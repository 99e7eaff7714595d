//! Configuration Module
//!
//! Handles loading and managing service configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::CacheOptions;
use crate::error::ConfigError;
use crate::service::HandlerConfig;

/// Service configuration parameters.
///
/// `SERVER_HOST` and `SERVER_PORT` are required; everything else has a
/// default.
#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    /// Name used in greetings and as the default cache prefix
    pub service_name: String,
    pub cache_prefix: String,
    /// TTL applied by plain cache writes
    pub cache_default_ttl: Duration,
    /// TTL of cached call responses
    pub cache_response_ttl: Duration,
    pub cache_max_retries: u32,
    pub cache_retry_delay: Duration,
    /// Redis server URL; the in-memory backend is used when unset
    pub redis_url: Option<String>,
    /// Capacity of the in-memory backend
    pub cache_max_entries: usize,
    pub rate_limit_requests: usize,
    pub rate_limit_window: Duration,
    pub request_timeout: Duration,
    pub cleanup_interval: Duration,
    /// Drain period for in-flight requests on shutdown
    pub shutdown_timeout: Duration,
    /// SQLite database file; no persistent store when unset
    pub database_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 50051,
            service_name: "blueprint".to_string(),
            cache_prefix: "blueprint".to_string(),
            cache_default_ttl: Duration::from_secs(3600),
            cache_response_ttl: Duration::from_secs(300),
            cache_max_retries: 3,
            cache_retry_delay: Duration::from_millis(100),
            redis_url: None,
            cache_max_entries: 10_000,
            rate_limit_requests: 100,
            rate_limit_window: Duration::from_secs(60),
            request_timeout: Duration::from_secs(30),
            cleanup_interval: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(10),
            database_path: None,
        }
    }
}

/// Collects values and problems while reading configuration keys.
struct Reader<F> {
    lookup: F,
    error: ConfigError,
}

impl<F: Fn(&str) -> Option<String>> Reader<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.trim().is_empty())
    }

    fn required<T: FromStr>(&mut self, key: &'static str, fallback: T) -> T {
        match self.get(key) {
            Some(raw) => self.parse(key, raw, fallback),
            None => {
                self.error.missing.push(key);
                fallback
            }
        }
    }

    fn optional<T: FromStr>(&mut self, key: &'static str, default: T) -> T {
        match self.get(key) {
            Some(raw) => self.parse(key, raw, default),
            None => default,
        }
    }

    fn parse<T: FromStr>(&mut self, key: &'static str, raw: String, fallback: T) -> T {
        match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                self.error.invalid.push((key, raw));
                fallback
            }
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// # Environment Variables
    /// - `SERVER_HOST`, `SERVER_PORT` - Listener address (required)
    /// - `SERVICE_NAME` - Service name (default: blueprint)
    /// - `CACHE_PREFIX` - Cache key namespace (default: service name)
    /// - `CACHE_DEFAULT_TTL` - Default cache TTL in seconds (default: 3600)
    /// - `CACHE_RESPONSE_TTL` - Cached response TTL in seconds (default: 300)
    /// - `CACHE_MAX_RETRIES` - Cache write attempts (default: 3)
    /// - `CACHE_RETRY_DELAY_MS` - Retry backoff unit in ms (default: 100)
    /// - `REDIS_URL` - Redis server, e.g. `redis://localhost:6379/0` (default: in-memory)
    /// - `CACHE_MAX_ENTRIES` - In-memory backend capacity (default: 10000)
    /// - `RATE_LIMIT_REQUESTS` - Admissions per window (default: 100)
    /// - `RATE_LIMIT_WINDOW_SECS` - Window length (default: 60)
    /// - `REQUEST_TIMEOUT_SECS` - Per-call deadline (default: 30)
    /// - `CLEANUP_INTERVAL_SECS` - Sweep frequency (default: 30)
    /// - `SHUTDOWN_TIMEOUT_SECS` - Shutdown drain period (default: 10)
    /// - `DATABASE_PATH` - SQLite file (default: none)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through `lookup`, reporting every missing or
    /// invalid key at once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let mut reader = Reader {
            lookup,
            error: ConfigError::default(),
        };

        let server_host = reader.required("SERVER_HOST", defaults.server_host);
        let server_port = reader.required("SERVER_PORT", defaults.server_port);
        let service_name = reader.optional("SERVICE_NAME", defaults.service_name);
        let cache_prefix = reader.optional("CACHE_PREFIX", service_name.clone());
        let cache_default_ttl = reader.optional("CACHE_DEFAULT_TTL", 3600);
        let cache_response_ttl = reader.optional("CACHE_RESPONSE_TTL", 300);
        let cache_max_retries = reader.optional("CACHE_MAX_RETRIES", defaults.cache_max_retries);
        let cache_retry_delay_ms = reader.optional("CACHE_RETRY_DELAY_MS", 100);
        let redis_url = reader.get("REDIS_URL");
        let cache_max_entries = reader.optional("CACHE_MAX_ENTRIES", defaults.cache_max_entries);
        let rate_limit_requests =
            reader.optional("RATE_LIMIT_REQUESTS", defaults.rate_limit_requests);
        let rate_limit_window = reader.optional("RATE_LIMIT_WINDOW_SECS", 60);
        let request_timeout = reader.optional("REQUEST_TIMEOUT_SECS", 30);
        let cleanup_interval = reader.optional("CLEANUP_INTERVAL_SECS", 30);
        let shutdown_timeout = reader.optional("SHUTDOWN_TIMEOUT_SECS", 10);
        let database_path = reader.get("DATABASE_PATH").map(PathBuf::from);

        if !reader.error.is_empty() {
            return Err(reader.error);
        }

        Ok(Self {
            server_host,
            server_port,
            service_name,
            cache_prefix,
            cache_default_ttl: Duration::from_secs(cache_default_ttl),
            cache_response_ttl: Duration::from_secs(cache_response_ttl),
            cache_max_retries,
            cache_retry_delay: Duration::from_millis(cache_retry_delay_ms),
            redis_url,
            cache_max_entries,
            rate_limit_requests,
            rate_limit_window: Duration::from_secs(rate_limit_window),
            request_timeout: Duration::from_secs(request_timeout),
            cleanup_interval: Duration::from_secs(cleanup_interval),
            shutdown_timeout: Duration::from_secs(shutdown_timeout),
            database_path,
        })
    }

    /// `host:port` for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions::new()
            .prefix(self.cache_prefix.clone())
            .default_ttl(self.cache_default_ttl)
            .max_retries(self.cache_max_retries)
            .retry_delay(self.cache_retry_delay)
    }

    pub fn handler_config(&self) -> HandlerConfig {
        HandlerConfig {
            service_name: self.service_name.clone(),
            request_timeout: self.request_timeout,
            response_ttl: self.cache_response_ttl,
            ..HandlerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.bind_address(), "127.0.0.1:50051");
        assert_eq!(config.cache_max_entries, 10_000);
        assert_eq!(config.rate_limit_requests, 100);
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_config_required_only() {
        let config =
            Config::from_lookup(lookup(&[("SERVER_HOST", "0.0.0.0"), ("SERVER_PORT", "8080")]))
                .unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.service_name, "blueprint");
        assert_eq!(config.cache_prefix, "blueprint");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.cache_retry_delay, Duration::from_millis(100));
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn test_redis_url_selects_backend() {
        let config = Config::from_lookup(lookup(&[
            ("SERVER_HOST", "localhost"),
            ("SERVER_PORT", "50051"),
            ("REDIS_URL", "redis://cache:6379/2"),
        ]))
        .unwrap();

        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379/2"));
    }

    #[test]
    fn test_cache_prefix_follows_service_name() {
        let config = Config::from_lookup(lookup(&[
            ("SERVER_HOST", "localhost"),
            ("SERVER_PORT", "50051"),
            ("SERVICE_NAME", "orders"),
        ]))
        .unwrap();

        assert_eq!(config.cache_prefix, "orders");
        assert_eq!(config.handler_config().service_name, "orders");
        assert_eq!(config.cache_options().prefix, "orders");
    }

    #[test]
    fn test_missing_keys_reported_together() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();

        assert_eq!(err.missing, vec!["SERVER_HOST", "SERVER_PORT"]);
        assert!(err.invalid.is_empty());
    }

    #[test]
    fn test_invalid_and_missing_reported_together() {
        let err = Config::from_lookup(lookup(&[
            ("SERVER_PORT", "http"),
            ("CACHE_MAX_RETRIES", "three"),
            ("DATABASE_PATH", "/tmp/blueprint.db"),
        ]))
        .unwrap_err();

        assert_eq!(err.missing, vec!["SERVER_HOST"]);
        assert_eq!(
            err.invalid,
            vec![
                ("SERVER_PORT", "http".to_string()),
                ("CACHE_MAX_RETRIES", "three".to_string())
            ]
        );
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let err = Config::from_lookup(lookup(&[("SERVER_HOST", "  "), ("SERVER_PORT", "1")]))
            .unwrap_err();

        assert_eq!(err.missing, vec!["SERVER_HOST"]);
    }
}
