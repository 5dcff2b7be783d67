//! Pipeline composition: cache lookup, rate-limit acquisition, and a retry
//! loop over the breaker-gated, middleware-wrapped operation.
//!
//! Each building block is independently usable; the pipeline only wires
//! them together around a caller-supplied operation. Under sustained
//! failure a caller sees, in order: rate-limit waits, retries with growing
//! backoff, then fail-fast [`CircuitOpen`](crate::ResilienceError::CircuitOpen)
//! rejections until the breaker's recovery timeout elapses.

use crate::cache::{cache_key, CacheConfig, ResponseCache};
use crate::context::{OperationResult, RequestContext, ResponseContext};
use crate::errors::{ResilienceError, ResilienceResult};
use crate::middleware::{Middleware, MiddlewareChain};
use crate::resilience::{
    CircuitBreaker, CircuitBreakerConfig, RateLimitConfig, RateLimiter, RetryConfig,
    RetryExecutor, RetryHook,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Configuration for the assembled pipeline.
///
/// The breaker, rate limiter, and cache are optional layers; `None` skips
/// the layer entirely. Caching changes observable behavior (an operation
/// may not run at all), so it is opt-in.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Retry policy for the innermost loop
    pub retry: RetryConfig,
    /// Circuit breaker layer, if any
    pub circuit_breaker: Option<CircuitBreakerConfig>,
    /// Rate limiter layer, if any
    pub rate_limit: Option<RateLimitConfig>,
    /// Response cache layer, if any
    pub cache: Option<CacheConfig>,
    /// Whether rate-limit acquisition blocks until capacity frees up.
    /// When false, exhausted capacity surfaces as
    /// [`ResilienceError::RateLimitExceeded`] instead of waiting.
    pub wait_for_capacity: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            circuit_breaker: Some(CircuitBreakerConfig::default()),
            rate_limit: None,
            cache: None,
            wait_for_capacity: true,
        }
    }
}

/// Wraps operations with the configured resilience layers.
pub struct ResiliencePipeline {
    middleware: MiddlewareChain,
    retry: RetryExecutor,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    rate_limiter: Option<Arc<RateLimiter>>,
    cache: Option<Arc<ResponseCache>>,
    wait_for_capacity: bool,
}

impl ResiliencePipeline {
    /// Creates a pipeline from the given configuration.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            middleware: MiddlewareChain::new(),
            retry: RetryExecutor::new(config.retry),
            circuit_breaker: config.circuit_breaker.map(|c| Arc::new(CircuitBreaker::new(c))),
            rate_limiter: config.rate_limit.map(|c| Arc::new(RateLimiter::new(c))),
            cache: config.cache.map(|c| Arc::new(ResponseCache::new(c))),
            wait_for_capacity: config.wait_for_capacity,
        }
    }

    /// Creates a builder for configuring the pipeline.
    pub fn builder() -> ResiliencePipelineBuilder {
        ResiliencePipelineBuilder::new()
    }

    /// Creates a pipeline with every layer disabled and a single attempt.
    ///
    /// Operations pass straight through; useful as a drop-in during tests
    /// or while bringing a new client up.
    pub fn passthrough() -> Self {
        Self::new(PipelineConfig {
            retry: RetryConfig {
                max_attempts: 1,
                ..Default::default()
            },
            circuit_breaker: None,
            rate_limit: None,
            cache: None,
            wait_for_capacity: true,
        })
    }

    /// The middleware chain applied around every attempt.
    pub fn middleware(&self) -> &MiddlewareChain {
        &self.middleware
    }

    /// The circuit breaker, if configured.
    pub fn circuit_breaker(&self) -> Option<&Arc<CircuitBreaker>> {
        self.circuit_breaker.as_ref()
    }

    /// The rate limiter, if configured.
    pub fn rate_limiter(&self) -> Option<&Arc<RateLimiter>> {
        self.rate_limiter.as_ref()
    }

    /// The response cache, if configured.
    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    /// Executes `operation` through the pipeline.
    ///
    /// Layer order: cache lookup, rate-limit acquisition, then the retry
    /// loop — each attempt passes the circuit-breaker gate and runs the
    /// middleware chain around one invocation of `operation`. A fresh clone
    /// of `ctx` is used per attempt; the final attempt's metadata is written
    /// back into `ctx` so collaborators can read recorded state afterward.
    /// Successful results are inserted into the cache on the way out.
    pub async fn execute<F, Fut>(
        &self,
        ctx: &mut RequestContext,
        operation: F,
    ) -> ResilienceResult<OperationResult>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = ResilienceResult<OperationResult>> + Send,
    {
        let cached = self.cache.as_ref().map(|cache| (cache, cache_key(ctx)));
        if let Some((cache, key)) = &cached {
            if let Some(hit) = cache.get(key) {
                debug!(target = %ctx.target, "Cache hit, short-circuiting operation");
                return Ok(hit);
            }
        }

        if let Some(limiter) = &self.rate_limiter {
            if self.wait_for_capacity {
                limiter.acquire().await;
            } else if !limiter.try_acquire() {
                return Err(ResilienceError::RateLimitExceeded {
                    message: "no capacity in the current window".to_string(),
                    retry_after: Some(limiter.wait_time()),
                });
            }
        }

        let base_ctx = ctx.clone();
        let final_metadata: Mutex<Option<HashMap<String, Value>>> = Mutex::new(None);

        let result = self
            .retry
            .execute(&base_ctx.target, || {
                self.run_attempt(&base_ctx, &operation, &final_metadata)
            })
            .await;

        if let Some(metadata) = final_metadata.into_inner() {
            ctx.metadata = metadata;
        }

        if let (Some((cache, key)), Ok(result)) = (&cached, &result) {
            if result.success {
                cache.set(key.clone(), result.clone());
            }
        }

        result
    }

    /// One attempt: breaker gate around the middleware-wrapped operation.
    async fn run_attempt<F, Fut>(
        &self,
        base_ctx: &RequestContext,
        operation: &F,
        final_metadata: &Mutex<Option<HashMap<String, Value>>>,
    ) -> ResilienceResult<OperationResult>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = ResilienceResult<OperationResult>> + Send,
    {
        let attempt = || async move {
            let mut attempt_ctx = base_ctx.clone();

            if let Err(e) = self.middleware.process_request(&mut attempt_ctx).await {
                *final_metadata.lock() = Some(attempt_ctx.metadata);
                return Err(e);
            }

            match operation().await {
                Ok(result) => {
                    let mut response_ctx =
                        ResponseContext::new(result, attempt_ctx.metadata);
                    let outcome = self.middleware.process_response(&mut response_ctx).await;
                    *final_metadata.lock() = Some(response_ctx.metadata);
                    outcome?;
                    Ok(response_ctx.result)
                }
                Err(e) => {
                    let substitute = self.middleware.process_error(&attempt_ctx, &e).await;
                    *final_metadata.lock() = Some(attempt_ctx.metadata);
                    match substitute {
                        Some(result) => Ok(result),
                        None => Err(e),
                    }
                }
            }
        };

        match &self.circuit_breaker {
            Some(breaker) => breaker.call(attempt).await,
            None => attempt().await,
        }
    }
}

/// Builder for configuring a [`ResiliencePipeline`].
pub struct ResiliencePipelineBuilder {
    config: PipelineConfig,
    retry_hook: Option<Arc<dyn RetryHook>>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl ResiliencePipelineBuilder {
    /// Creates a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            retry_hook: None,
            middleware: Vec::new(),
        }
    }

    /// Sets the retry configuration.
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.config.retry = config;
        self
    }

    /// Adds a hook consulted before every retry.
    pub fn retry_hook(mut self, hook: Arc<dyn RetryHook>) -> Self {
        self.retry_hook = Some(hook);
        self
    }

    /// Enables the circuit breaker layer.
    pub fn circuit_breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.config.circuit_breaker = Some(config);
        self
    }

    /// Disables the circuit breaker layer.
    pub fn without_circuit_breaker(mut self) -> Self {
        self.config.circuit_breaker = None;
        self
    }

    /// Enables the rate limiter layer.
    pub fn rate_limit_config(mut self, config: RateLimitConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Enables the response cache layer.
    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.config.cache = Some(config);
        self
    }

    /// Sets whether rate-limit acquisition blocks or fails fast.
    pub fn wait_for_capacity(mut self, wait: bool) -> Self {
        self.config.wait_for_capacity = wait;
        self
    }

    /// Appends a middleware to the chain.
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Builds the pipeline.
    pub fn build(self) -> ResiliencePipeline {
        let mut pipeline = ResiliencePipeline::new(self.config);
        if let Some(hook) = self.retry_hook {
            pipeline.retry = RetryExecutor::new(pipeline.retry.config().clone()).with_hook(hook);
        }
        for middleware in self.middleware {
            pipeline.middleware.add(middleware);
        }
        pipeline
    }
}

impl Default for ResiliencePipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
