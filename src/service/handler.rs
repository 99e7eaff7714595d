//! Request Handler Module
//!
//! The RPC surface and the handler that drives one `Call` through
//! validation, admission, cache lookup, business logic and cache population.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheStats, CacheStore};
use crate::error::{Result, ServiceError};
use crate::models::{CallRequest, CallResponse};
use crate::rate_limit::{Decision, RateLimiter};
use crate::service::{
    BusinessLogic, CallTimer, DefaultLogic, Metrics, MetricsRecorder, PersistentStore,
    RequestContext,
};

pub const CALL_METHOD: &str = "Blueprint.Call";
pub const HEALTH_CHECK_METHOD: &str = "Blueprint.HealthCheck";

// == RPC Surface ==
/// Operations exposed to remote callers.
///
/// Every method defaults to `Unimplemented`, so adding an operation here
/// does not break existing implementers.
#[async_trait]
pub trait Blueprint: Send + Sync {
    async fn call(&self, _request: CallRequest) -> Result<CallResponse> {
        Err(ServiceError::Unimplemented(CALL_METHOD))
    }

    async fn health_check(&self) -> Result<()> {
        Err(ServiceError::Unimplemented(HEALTH_CHECK_METHOD))
    }
}

// == Handler Config ==
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Name used in greetings
    pub service_name: String,
    /// Deadline for everything after admission
    pub request_timeout: Duration,
    /// TTL of cached responses
    pub response_ttl: Duration,
    pub store_ping_timeout: Duration,
    pub cache_ping_timeout: Duration,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            service_name: "blueprint".to_string(),
            request_timeout: Duration::from_secs(30),
            response_ttl: Duration::from_secs(300),
            store_ping_timeout: Duration::from_secs(2),
            cache_ping_timeout: Duration::from_secs(5),
        }
    }
}

// == Blueprint Handler ==
/// Concrete [`Blueprint`] implementation.
///
/// Cache, limiter and store are shared with the rest of the process; the
/// metrics recorder is owned here.
pub struct BlueprintHandler {
    config: HandlerConfig,
    cache: Arc<CacheStore>,
    limiter: Arc<RateLimiter>,
    store: Option<Arc<dyn PersistentStore>>,
    logic: Arc<dyn BusinessLogic>,
    metrics: Arc<MetricsRecorder>,
}

/// Builder for [`BlueprintHandler`].
pub struct HandlerBuilder {
    config: HandlerConfig,
    cache: Arc<CacheStore>,
    limiter: Arc<RateLimiter>,
    store: Option<Arc<dyn PersistentStore>>,
    logic: Option<Arc<dyn BusinessLogic>>,
}

impl HandlerBuilder {
    /// Persistent store probed by health checks and the default logic.
    pub fn store(mut self, store: Arc<dyn PersistentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replaces [`DefaultLogic`].
    pub fn logic(mut self, logic: Arc<dyn BusinessLogic>) -> Self {
        self.logic = Some(logic);
        self
    }

    pub fn build(self) -> BlueprintHandler {
        let logic = self
            .logic
            .unwrap_or_else(|| Arc::new(DefaultLogic::new(self.store.clone())));

        BlueprintHandler {
            config: self.config,
            cache: self.cache,
            limiter: self.limiter,
            store: self.store,
            logic,
            metrics: Arc::new(MetricsRecorder::new()),
        }
    }
}

impl BlueprintHandler {
    pub fn builder(
        config: HandlerConfig,
        cache: Arc<CacheStore>,
        limiter: Arc<RateLimiter>,
    ) -> HandlerBuilder {
        HandlerBuilder {
            config,
            cache,
            limiter,
            store: None,
            logic: None,
        }
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    // == Metrics ==
    pub fn get_metrics(&self) -> Metrics {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Cache key for a call's response.
    pub fn cache_key(name: &str) -> String {
        format!("call:{name}")
    }

    async fn process_call(&self, request: &CallRequest) -> Result<CallResponse> {
        if let Some(message) = request.validate() {
            return Err(ServiceError::InvalidArgument(message));
        }

        if let Decision::Denied { retry_after } = self.limiter.check(&request.name) {
            return Err(ServiceError::ResourceExhausted { retry_after });
        }

        let ctx = RequestContext::with_timeout(self.config.request_timeout);
        let cache_key = Self::cache_key(&request.name);

        match ctx.run(self.cache.get::<CallResponse>(&cache_key)).await? {
            Ok(cached) => {
                self.metrics.record_cache_hit();
                debug!(method = CALL_METHOD, name = %request.name, cache_key = %cache_key, cache_hit = true, "cache hit");
                return Ok(cached);
            }
            Err(e) if e.is_not_found() => {
                self.metrics.record_cache_miss();
                debug!(method = CALL_METHOD, name = %request.name, cache_key = %cache_key, cache_hit = false, "cache miss");
            }
            Err(e) => {
                self.metrics.record_cache_miss();
                warn!(method = CALL_METHOD, cache_key = %cache_key, error = %e, "cache lookup failed, computing response");
            }
        }

        let mut response = CallResponse::new(format!(
            "Hello {} from {}",
            request.name, self.config.service_name
        ));

        ctx.ensure_active()?;
        if let Err(e) = ctx
            .run(self.logic.process(&ctx, request, &mut response))
            .await?
        {
            if matches!(
                e.downcast_ref::<ServiceError>(),
                Some(ServiceError::DeadlineExceeded)
            ) {
                return Err(ServiceError::DeadlineExceeded);
            }
            error!(method = CALL_METHOD, name = %request.name, error = %format!("{e:#}"), "business logic failed");
            return Err(ServiceError::Internal);
        }

        match ctx
            .run(
                self.cache
                    .set_with_ttl(&cache_key, &response, self.config.response_ttl),
            )
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(method = CALL_METHOD, cache_key = %cache_key, error = %e, "failed to cache response");
            }
            Err(e) => {
                warn!(method = CALL_METHOD, cache_key = %cache_key, error = %e, "cache write abandoned");
            }
        }

        Ok(response)
    }
}

#[async_trait]
impl Blueprint for BlueprintHandler {
    async fn call(&self, request: CallRequest) -> Result<CallResponse> {
        let mut timer = CallTimer::start(self.metrics.clone());

        let result = self.process_call(&request).await;
        let duration_ms = timer.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => {
                timer.mark_success();
                info!(method = CALL_METHOD, name = %request.name, duration_ms, "call completed");
            }
            Err(e) => {
                warn!(method = CALL_METHOD, name = %request.name, duration_ms, error = %e, "call failed");
            }
        }

        result
    }

    async fn health_check(&self) -> Result<()> {
        if let Some(store) = &self.store {
            match tokio::time::timeout(self.config.store_ping_timeout, store.ping()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(method = HEALTH_CHECK_METHOD, error = %e, "persistent store ping failed");
                    return Err(ServiceError::Unavailable("persistent store"));
                }
                Err(_) => {
                    warn!(method = HEALTH_CHECK_METHOD, "persistent store ping timed out");
                    return Err(ServiceError::Unavailable("persistent store"));
                }
            }
        }

        match tokio::time::timeout(self.config.cache_ping_timeout, self.cache.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!(method = HEALTH_CHECK_METHOD, error = %e, "cache ping failed");
                Err(ServiceError::Unavailable("cache"))
            }
            Err(_) => {
                warn!(method = HEALTH_CHECK_METHOD, "cache ping timed out");
                Err(ServiceError::Unavailable("cache"))
            }
        }
    }
}
