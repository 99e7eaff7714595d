//! Request Context Module
//!
//! Deadline carried through one call.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{Result, ServiceError};

// == Request Context ==
/// Bounded execution context for a single call.
///
/// Every suspension after admission goes through [`run`](Self::run), so once
/// the deadline passes the pending backend call is dropped and the caller
/// sees [`ServiceError::DeadlineExceeded`].
#[derive(Debug, Clone, Copy)]
pub struct RequestContext {
    deadline: Instant,
}

impl RequestContext {
    /// Context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self { deadline }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Fails with `DeadlineExceeded` if the deadline has already passed.
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_expired() {
            Err(ServiceError::DeadlineExceeded)
        } else {
            Ok(())
        }
    }

    /// Drives `fut` until it completes or the deadline passes.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output> {
        tokio::time::timeout_at(self.deadline, fut)
            .await
            .map_err(|_| ServiceError::DeadlineExceeded)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_context_remaining() {
        let ctx = RequestContext::with_timeout(Duration::from_secs(30));
        tokio::time::advance(Duration::from_secs(10)).await;

        assert_eq!(ctx.remaining(), Duration::from_secs(20));
        assert!(ctx.ensure_active().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_expires() {
        let ctx = RequestContext::with_timeout(Duration::from_secs(1));
        tokio::time::advance(Duration::from_secs(1)).await;

        assert!(ctx.is_expired());
        assert_eq!(ctx.remaining(), Duration::ZERO);
        assert!(matches!(
            ctx.ensure_active(),
            Err(ServiceError::DeadlineExceeded)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_completes_within_deadline() {
        let ctx = RequestContext::with_timeout(Duration::from_secs(5));

        let value = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                42
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_abandons_slow_future() {
        let ctx = RequestContext::with_timeout(Duration::from_secs(1));

        let result = ctx
            .run(tokio::time::sleep(Duration::from_secs(60)))
            .await;

        assert!(matches!(result, Err(ServiceError::DeadlineExceeded)));
    }
}
