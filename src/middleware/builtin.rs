//! Built-in middleware: logging, metrics, and header injection.

use crate::context::{OperationResult, RequestContext, ResponseContext};
use crate::errors::{ErrorKind, ResilienceError, ResilienceResult};
use crate::middleware::Middleware;
use crate::observability::{metric_names, MetricsCollector};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Metadata key holding the dispatch timestamp in unix milliseconds.
pub const META_START_MS: &str = "timing.start_ms";

/// Metadata key holding the observed elapsed time in milliseconds.
pub const META_ELAPSED_MS: &str = "timing.elapsed_ms";

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Logs the lifecycle of every operation and stamps timing metadata.
///
/// Writes [`META_START_MS`] into the request metadata before dispatch and
/// [`META_ELAPSED_MS`] after completion, so collaborators can read the
/// recorded latency from the context afterward.
#[derive(Debug, Default)]
pub struct LoggingMiddleware;

impl LoggingMiddleware {
    /// Creates the logging middleware.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn on_request(&self, ctx: &mut RequestContext) -> ResilienceResult<()> {
        ctx.metadata
            .insert(META_START_MS.to_string(), json!(now_millis()));
        debug!(
            method = %ctx.method,
            target = %ctx.target,
            "Dispatching operation"
        );
        Ok(())
    }

    async fn on_response(&self, ctx: &mut ResponseContext) -> ResilienceResult<()> {
        let elapsed = ctx
            .metadata
            .get(META_START_MS)
            .and_then(|v| v.as_u64())
            .map(|start| now_millis().saturating_sub(start));
        if let Some(elapsed) = elapsed {
            ctx.metadata
                .insert(META_ELAPSED_MS.to_string(), json!(elapsed));
        }
        debug!(
            status = ctx.result.status.map(u64::from),
            latency_ms = ctx.result.latency.as_millis() as u64,
            "Operation completed"
        );
        Ok(())
    }

    async fn on_error(
        &self,
        ctx: &RequestContext,
        error: &ResilienceError,
    ) -> Option<OperationResult> {
        warn!(
            method = %ctx.method,
            target = %ctx.target,
            error = %error,
            "Operation failed"
        );
        None
    }
}

/// Records operation counters and latency histograms.
pub struct MetricsMiddleware {
    collector: Arc<dyn MetricsCollector>,
}

impl MetricsMiddleware {
    /// Creates a metrics middleware writing to the given collector.
    pub fn new(collector: Arc<dyn MetricsCollector>) -> Self {
        Self { collector }
    }

    fn kind_label(kind: ErrorKind) -> &'static str {
        match kind {
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Server => "server",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Validation => "validation",
            ErrorKind::Authentication => "authentication",
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }
}

#[async_trait]
impl Middleware for MetricsMiddleware {
    async fn on_request(&self, ctx: &mut RequestContext) -> ResilienceResult<()> {
        self.collector.increment_counter(
            metric_names::OPERATION_COUNT,
            1,
            &[("method", ctx.method.as_str())],
        );
        Ok(())
    }

    async fn on_response(&self, ctx: &mut ResponseContext) -> ResilienceResult<()> {
        self.collector.record_histogram(
            metric_names::OPERATION_DURATION_MS,
            ctx.result.latency.as_millis() as f64,
            &[],
        );
        Ok(())
    }

    async fn on_error(
        &self,
        _ctx: &RequestContext,
        error: &ResilienceError,
    ) -> Option<OperationResult> {
        self.collector.increment_counter(
            metric_names::OPERATION_ERRORS,
            1,
            &[("kind", Self::kind_label(error.kind()))],
        );
        None
    }
}

/// Injects a header only when the request does not already carry it.
///
/// The auth use case: a default credential that individual requests may
/// override by setting the header themselves.
pub struct HeaderInjectMiddleware {
    name: String,
    value: String,
}

impl HeaderInjectMiddleware {
    /// Creates a middleware injecting `name: value` when absent.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[async_trait]
impl Middleware for HeaderInjectMiddleware {
    async fn on_request(&self, ctx: &mut RequestContext) -> ResilienceResult<()> {
        ctx.headers
            .entry(self.name.clone())
            .or_insert_with(|| self.value.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::InMemoryMetricsCollector;
    use bytes::Bytes;
    use std::time::Duration;

    #[tokio::test]
    async fn test_header_inject_when_absent() {
        let middleware = HeaderInjectMiddleware::new("authorization", "Bearer default");
        let mut ctx = RequestContext::new("GET", "/items");

        middleware.on_request(&mut ctx).await.unwrap();

        assert_eq!(ctx.headers.get("authorization").unwrap(), "Bearer default");
    }

    #[tokio::test]
    async fn test_header_inject_preserves_existing() {
        let middleware = HeaderInjectMiddleware::new("authorization", "Bearer default");
        let mut ctx =
            RequestContext::new("GET", "/items").header("authorization", "Bearer mine");

        middleware.on_request(&mut ctx).await.unwrap();

        assert_eq!(ctx.headers.get("authorization").unwrap(), "Bearer mine");
    }

    #[tokio::test]
    async fn test_logging_middleware_stamps_timing_metadata() {
        let middleware = LoggingMiddleware::new();
        let mut ctx = RequestContext::new("GET", "/items");

        middleware.on_request(&mut ctx).await.unwrap();
        assert!(ctx.metadata.contains_key(META_START_MS));

        let result = OperationResult::ok(Some(200), Duration::from_millis(3), Bytes::new());
        let mut response = ResponseContext::new(result, ctx.metadata.clone());
        middleware.on_response(&mut response).await.unwrap();
        assert!(response.metadata.contains_key(META_ELAPSED_MS));
    }

    #[tokio::test]
    async fn test_metrics_middleware_counts() {
        let collector = Arc::new(InMemoryMetricsCollector::new());
        let middleware = MetricsMiddleware::new(collector.clone());

        let mut ctx = RequestContext::new("GET", "/items");
        middleware.on_request(&mut ctx).await.unwrap();
        middleware.on_request(&mut ctx).await.unwrap();

        assert_eq!(
            collector.get_counter("resilience.operations.total:method=GET"),
            2
        );

        let error = ResilienceError::Timeout {
            message: "deadline".to_string(),
        };
        assert!(middleware.on_error(&ctx, &error).await.is_none());
        assert_eq!(
            collector.get_counter("resilience.operations.errors:kind=timeout"),
            1
        );

        let result = OperationResult::ok(Some(200), Duration::from_millis(7), Bytes::new());
        let mut response = ResponseContext::new(result, Default::default());
        middleware.on_response(&mut response).await.unwrap();
        assert_eq!(
            collector
                .get_histogram("resilience.operations.duration_ms")
                .len(),
            1
        );
    }
}
