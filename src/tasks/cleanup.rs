//! Cleanup Task
//!
//! Background task that periodically removes expired cache entries and
//! forgets idle rate-limiter identifiers.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::MemoryBackend;
use crate::rate_limit::RateLimiter;

/// Spawns a background task that sweeps the backend and the limiter.
///
/// `backend` is `None` when the cache lives in a server that expires keys
/// itself. The first sweep runs one `interval` after spawning. The returned handle
/// is aborted during graceful shutdown.
///
/// # Example
/// ```ignore
/// let backend = Arc::new(MemoryBackend::new(10_000));
/// let limiter = Arc::new(RateLimiter::default());
/// let cleanup_handle = spawn_cleanup_task(Some(backend), limiter, Duration::from_secs(30));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(
    backend: Option<Arc<MemoryBackend>>,
    limiter: Arc<RateLimiter>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            interval_secs = interval.as_secs(),
            "Starting cleanup task"
        );

        loop {
            tokio::time::sleep(interval).await;

            let expired = backend.as_ref().map_or(0, |b| b.cleanup_expired());
            let idle = limiter.sweep();

            if expired > 0 || idle > 0 {
                info!(expired, idle, "Cleanup: removed expired entries and idle identifiers");
            } else {
                debug!("Cleanup: nothing to remove");
            }
        }
    })
}
