//! Metrics collection for pipeline instrumentation.
//!
//! Collectors are injected into the pipeline (typically via the metrics
//! middleware) rather than registered globally; one collector instance may
//! be shared by several protocol clients and is internally synchronized.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Sink for pipeline metrics.
///
/// Implementations record counters, histograms, and gauges. All methods are
/// invoked concurrently from many operations sharing one instance.
pub trait MetricsCollector: Send + Sync {
    /// Increments a counter by the given value.
    fn increment_counter(&self, name: &str, value: u64, labels: &[(&str, &str)]);

    /// Records a value in a histogram.
    fn record_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]);

    /// Sets a gauge to the given value.
    fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]);
}

/// In-memory metrics collector for testing and simple use cases.
#[derive(Default)]
pub struct InMemoryMetricsCollector {
    counters: RwLock<HashMap<String, AtomicU64>>,
    histograms: RwLock<HashMap<String, Vec<f64>>>,
    gauges: RwLock<HashMap<String, f64>>,
}

impl InMemoryMetricsCollector {
    /// Creates a new in-memory metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the current value of a counter, or 0 if it does not exist.
    pub fn get_counter(&self, name: &str) -> u64 {
        self.counters
            .read()
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Gets all recorded values for a histogram.
    pub fn get_histogram(&self, name: &str) -> Vec<f64> {
        self.histograms
            .read()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Gets the current value of a gauge.
    pub fn get_gauge(&self, name: &str) -> Option<f64> {
        self.gauges.read().get(name).copied()
    }

    /// Resets all metrics.
    pub fn reset(&self) {
        self.counters.write().clear();
        self.histograms.write().clear();
        self.gauges.write().clear();
    }

    fn make_key(name: &str, labels: &[(&str, &str)]) -> String {
        if labels.is_empty() {
            name.to_string()
        } else {
            let label_str: Vec<String> = labels
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            format!("{}:{}", name, label_str.join(","))
        }
    }
}

impl MetricsCollector for InMemoryMetricsCollector {
    fn increment_counter(&self, name: &str, value: u64, labels: &[(&str, &str)]) {
        let key = Self::make_key(name, labels);
        let mut counters = self.counters.write();
        counters
            .entry(key)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(value, Ordering::Relaxed);
    }

    fn record_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let key = Self::make_key(name, labels);
        let mut histograms = self.histograms.write();
        histograms.entry(key).or_default().push(value);
    }

    fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let key = Self::make_key(name, labels);
        let mut gauges = self.gauges.write();
        gauges.insert(key, value);
    }
}

/// No-op metrics collector.
///
/// Discards all metrics. Useful when metrics collection is not needed.
pub struct NoopMetricsCollector;

impl MetricsCollector for NoopMetricsCollector {
    fn increment_counter(&self, _name: &str, _value: u64, _labels: &[(&str, &str)]) {}
    fn record_histogram(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}
    fn set_gauge(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}
}

/// Pre-defined metric names for pipeline instrumentation.
pub mod metric_names {
    /// Total number of operations executed through the pipeline
    pub const OPERATION_COUNT: &str = "resilience.operations.total";

    /// Duration of operations in milliseconds
    pub const OPERATION_DURATION_MS: &str = "resilience.operations.duration_ms";

    /// Total number of operation errors
    pub const OPERATION_ERRORS: &str = "resilience.operations.errors";

    /// Number of retry attempts made
    pub const RETRY_ATTEMPTS: &str = "resilience.retry.attempts";

    /// Number of times rate limit capacity was exhausted
    pub const RATE_LIMIT_HITS: &str = "resilience.rate_limit.hits";

    /// Current state of the circuit breaker (0=closed, 1=open, 2=half-open)
    pub const CIRCUIT_BREAKER_STATE: &str = "resilience.circuit_breaker.state";

    /// Number of cache hits
    pub const CACHE_HITS: &str = "resilience.cache.hits";

    /// Number of cache misses
    pub const CACHE_MISSES: &str = "resilience.cache.misses";
}
