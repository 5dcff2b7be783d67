//! Observability for the pipeline: metrics collection and logging setup.
//!
//! Metrics collectors are caller-owned, internally synchronized instances
//! injected wherever instrumentation is wanted (see the metrics middleware);
//! they are never process-wide singletons.

mod logging;
mod metrics;

pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use metrics::{
    metric_names, InMemoryMetricsCollector, MetricsCollector, NoopMetricsCollector,
};
