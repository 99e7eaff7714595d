//! Rate Limiter Module
//!
//! Per-identifier sliding-window admission control.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Default admissions per window
pub const DEFAULT_LIMIT: usize = 100;
/// Default window length
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

// == Decision ==
/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Request admitted; `remaining` more fit in the current window
    Allowed { remaining: usize },
    /// Request rejected; a slot frees up after `retry_after`
    Denied { retry_after: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

// == Rate Limiter ==
/// Sliding-window request counter keyed by identifier.
///
/// Each identifier keeps the instants of its admitted requests. A check
/// drops instants at or before `now - window`, rejects if `limit` remain,
/// and otherwise records `now`. One mutex covers the whole map so the
/// prune/decide/record sequence is atomic.
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    requests: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    // == Constructor ==
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            requests: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    // == Allow ==
    /// Admits or rejects one request for `identifier` at the current instant.
    pub fn allow(&self, identifier: &str) -> bool {
        self.allow_at(identifier, Instant::now())
    }

    pub fn allow_at(&self, identifier: &str, now: Instant) -> bool {
        self.check_at(identifier, now).is_allowed()
    }

    // == Check ==
    /// Like [`allow`](Self::allow), but reports remaining capacity or the
    /// wait until the next slot.
    pub fn check(&self, identifier: &str) -> Decision {
        self.check_at(identifier, Instant::now())
    }

    /// Admission decision for `identifier` as of `now`.
    ///
    /// # Arguments
    /// * `identifier` - Caller key; each one has its own window
    /// * `now` - Decision time; timestamps at or before `now - window` are dropped
    ///
    /// # Returns
    /// - `Decision::Allowed` with the slots left after recording this request
    /// - `Decision::Denied` with the wait until the oldest timestamp leaves
    ///   the window; nothing is recorded
    pub fn check_at(&self, identifier: &str, now: Instant) -> Decision {
        let window_start = now.checked_sub(self.window);
        let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);

        let timestamps = requests.entry(identifier.to_string()).or_default();

        // Timestamps are appended in order, so expired ones sit at the front
        if let Some(start) = window_start {
            while timestamps.front().is_some_and(|t| *t <= start) {
                timestamps.pop_front();
            }
        }

        if timestamps.len() >= self.limit {
            let retry_after = timestamps
                .front()
                .map(|earliest| (*earliest + self.window).saturating_duration_since(now))
                .unwrap_or(self.window);
            return Decision::Denied { retry_after };
        }

        timestamps.push_back(now);
        Decision::Allowed {
            remaining: self.limit - timestamps.len(),
        }
    }

    // == Sweep ==
    /// Forgets identifiers with no request inside the window ending at `now`.
    ///
    /// Returns the number of identifiers removed.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let Some(window_start) = now.checked_sub(self.window) else {
            return 0;
        };
        let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);

        let before = requests.len();
        requests.retain(|_, timestamps| timestamps.back().is_some_and(|t| *t > window_start));
        before - requests.len()
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Number of identifiers currently holding window state.
    pub fn tracked_identifiers(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_admits_up_to_limit() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));

        assert!(limiter.allow("alice"));
        assert!(limiter.allow("alice"));
        assert!(limiter.allow("alice"));
        assert!(!limiter.allow("alice"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_identifiers_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));

        assert!(limiter.allow("alice"));
        assert!(limiter.allow("bob"));
        assert!(!limiter.allow("alice"));
        assert_eq!(limiter.tracked_identifiers(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_does_not_record() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10));
        let start = Instant::now();

        assert!(limiter.allow_at("id", start));
        assert!(limiter.allow_at("id", start + Duration::from_secs(5)));
        for i in 0..4 {
            assert!(!limiter.allow_at("id", start + Duration::from_secs(6 + i)));
        }

        // Only the first admission has left the window
        assert!(limiter.allow_at("id", start + Duration::from_secs(10)));
        assert!(!limiter.allow_at("id", start + Duration::from_secs(11)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_boundary_is_exclusive() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();

        assert!(limiter.allow_at("id", start));
        assert!(!limiter.allow_at("id", start + Duration::from_millis(59_999)));
        assert!(limiter.allow_at("id", start + Duration::from_secs(60)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hundred_and_first_call_is_denied() {
        let limiter = RateLimiter::default();

        for _ in 0..100 {
            assert!(limiter.allow("Alice"));
        }
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(
            limiter.check("Alice"),
            Decision::Denied {
                retry_after: Duration::from_secs(30)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_reports_remaining() {
        let limiter = RateLimiter::new(3, Duration::from_secs(1));

        assert_eq!(limiter.check("id"), Decision::Allowed { remaining: 2 });
        assert_eq!(limiter.check("id"), Decision::Allowed { remaining: 1 });
        assert_eq!(limiter.check("id"), Decision::Allowed { remaining: 0 });
        assert!(!limiter.check("id").is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_admission_resumes_after_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1));
        assert!(limiter.allow("id"));
        assert!(limiter.allow("id"));
        assert!(!limiter.allow("id"));

        tokio::time::advance(Duration::from_secs(1)).await;

        assert!(limiter.allow("id"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_limit_denies_everything() {
        let limiter = RateLimiter::new(0, Duration::from_secs(5));

        assert_eq!(
            limiter.check("id"),
            Decision::Denied {
                retry_after: Duration::from_secs(5)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_drops_idle_identifiers() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60));
        limiter.allow("idle");
        tokio::time::advance(Duration::from_secs(45)).await;
        limiter.allow("active");

        tokio::time::advance(Duration::from_secs(20)).await;

        assert_eq!(limiter.sweep(), 1);
        assert_eq!(limiter.tracked_identifiers(), 1);
        assert!(limiter.allow("idle"));
    }

    #[test]
    fn test_concurrent_admissions_respect_limit() {
        use std::sync::Arc;

        let limiter = Arc::new(RateLimiter::new(50, Duration::from_secs(60)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || (0..20).filter(|_| limiter.allow("shared")).count())
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
    }
}
