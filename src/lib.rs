//! # Resilience & Interception Pipeline
//!
//! Production-ready resilience building blocks for API clients.
//!
//! ## Features
//!
//! - Middleware chain with onion-ordered request/response/error hooks
//! - Retry with exponential backoff, jitter, and per-kind error policies
//! - Circuit breaker with fail-fast rejection and probing recovery
//! - Sliding-window rate limiter with burst allowance
//! - TTL- and size-bounded response cache with deterministic keys
//! - Comprehensive observability (tracing, metrics)
//!
//! The crate performs no I/O itself. Protocol clients hand it their network
//! call as a zero-argument async operation and get back the same
//! `Result`-shaped contract, hardened against partial failure.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use integrations_resilience::{
//!     OperationResult, PipelineConfig, RequestContext, ResiliencePipeline,
//! };
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = ResiliencePipeline::new(PipelineConfig::default());
//!
//!     let mut ctx = RequestContext::new("GET", "https://api.example.com/v1/items");
//!     let result = pipeline
//!         .execute(&mut ctx, || async {
//!             // the real network call goes here
//!             Ok(OperationResult::ok(
//!                 Some(200),
//!                 Duration::from_millis(12),
//!                 Bytes::from_static(b"{}"),
//!             ))
//!         })
//!         .await?;
//!
//!     assert!(result.success);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - `context` - Request/response context and the operation result contract
//! - `middleware` - Ordered interception chain and built-in middleware
//! - `resilience` - Retry executor, circuit breaker, rate limiter
//! - `cache` - Response cache with TTL expiry and FIFO eviction
//! - `pipeline` - Composition of all layers around one operation
//! - `errors` - Error taxonomy
//! - `observability` - Metrics collection and logging setup

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod cache;
pub mod context;
pub mod errors;
pub mod middleware;
pub mod observability;
pub mod pipeline;
pub mod resilience;

// Re-exports for convenience
pub use cache::{cache_key, CacheConfig, ResponseCache, SENSITIVE_HEADERS};
pub use context::{OperationResult, RequestContext, ResponseContext};
pub use errors::{ErrorKind, ResilienceError, ResilienceResult};
pub use middleware::{
    HeaderInjectMiddleware, LoggingMiddleware, MetricsMiddleware, Middleware, MiddlewareChain,
};
pub use observability::{
    InMemoryMetricsCollector, LogFormat, LogLevel, LoggingConfig, MetricsCollector,
    NoopMetricsCollector,
};
pub use pipeline::{PipelineConfig, ResiliencePipeline, ResiliencePipelineBuilder};
pub use resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerHook, CircuitBreakerStats, CircuitState,
    RateLimitConfig, RateLimiter, RetryConfig, RetryContext, RetryDecision, RetryExecutor,
    RetryHook,
};

/// The default total attempt budget for retries
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// The default consecutive-failure threshold that opens the breaker
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// The default time the breaker stays open before probing, in seconds
pub const DEFAULT_RECOVERY_TIMEOUT_SECS: u64 = 30;

/// The default cache entry time-to-live, in seconds
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
