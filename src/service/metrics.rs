//! Metrics Module
//!
//! Per-handler call counters and the running latency estimate.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::time::Instant;

// == Metrics ==
/// Snapshot of handler counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metrics {
    pub total_requests: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Recency-weighted latency: each sample is averaged with the previous
    /// value, so older samples decay geometrically
    pub avg_response_time: Duration,
}

// == Metrics Recorder ==
/// Shared metrics behind a read/write lock.
///
/// Writers take the lock exclusively; [`snapshot`](Self::snapshot) only
/// needs shared access.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    inner: RwLock<Metrics>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one finished call.
    pub fn record(&self, duration: Duration, success: bool) {
        let mut metrics = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        metrics.total_requests += 1;
        if success {
            metrics.successful_calls += 1;
        } else {
            metrics.failed_calls += 1;
        }

        metrics.avg_response_time = if metrics.avg_response_time.is_zero() {
            duration
        } else {
            (metrics.avg_response_time + duration) / 2
        };
    }

    pub fn record_cache_hit(&self) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .cache_hits += 1;
    }

    pub fn record_cache_miss(&self) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .cache_misses += 1;
    }

    pub fn snapshot(&self) -> Metrics {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn reset(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Metrics::default();
    }
}

// == Call Timer ==
/// Records a call into a [`MetricsRecorder`] when dropped.
///
/// The call counts as failed unless [`mark_success`](Self::mark_success) was
/// called first, which also covers futures dropped mid-flight.
#[derive(Debug)]
pub struct CallTimer {
    recorder: Arc<MetricsRecorder>,
    started: Instant,
    success: bool,
}

impl CallTimer {
    pub fn start(recorder: Arc<MetricsRecorder>) -> Self {
        Self {
            recorder,
            started: Instant::now(),
            success: false,
        }
    }

    pub fn mark_success(&mut self) {
        self.success = true;
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for CallTimer {
    fn drop(&mut self) {
        self.recorder.record(self.started.elapsed(), self.success);
    }
}
