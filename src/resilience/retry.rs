//! Retry executor with exponential backoff and jitter.

use crate::errors::{ErrorKind, ResilienceError, ResilienceResult};
use crate::DEFAULT_MAX_ATTEMPTS;
use async_trait::async_trait;
use rand::Rng;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total invocation budget, including the first attempt. Must be ≥ 1.
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Multiplier applied to the delay after each retry
    pub backoff_multiplier: f64,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Whether to perturb each delay uniformly within ±10%
    pub jitter: bool,
    /// Error kinds eligible for retry; everything else propagates immediately
    pub retryable_errors: HashSet<ErrorKind>,
}

impl RetryConfig {
    /// The error kinds retried by default: transient failures only.
    pub fn default_retryable_errors() -> HashSet<ErrorKind> {
        [
            ErrorKind::Network,
            ErrorKind::Timeout,
            ErrorKind::Server,
            ErrorKind::RateLimit,
        ]
        .into_iter()
        .collect()
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            jitter: true,
            retryable_errors: Self::default_retryable_errors(),
        }
    }
}

/// Re-invokes a failing operation with exponential backoff.
///
/// The executor wraps an operation without changing its signature: callers
/// hand in a closure producing one attempt and get back the first success
/// or the error that exhausted the policy. The inter-attempt sleep is a
/// plain `tokio` sleep, so dropping the returned future cancels the wait.
pub struct RetryExecutor {
    config: RetryConfig,
    retry_hook: Option<Arc<dyn RetryHook>>,
}

impl RetryExecutor {
    /// Creates a new retry executor with the given configuration.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            retry_hook: None,
        }
    }

    /// Adds a hook consulted before every retry.
    pub fn with_hook(mut self, hook: Arc<dyn RetryHook>) -> Self {
        self.retry_hook = Some(hook);
        self
    }

    /// Returns the configuration in effect.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Executes the given operation with retry logic.
    ///
    /// On success the result is returned immediately. A failure is retried
    /// only when its kind is in `retryable_errors` and the invocation budget
    /// is not exhausted; otherwise it propagates without further delay.
    pub async fn execute<F, Fut, T>(&self, operation: &str, f: F) -> ResilienceResult<T>
    where
        F: Fn() -> Fut + Send,
        Fut: Future<Output = ResilienceResult<T>> + Send,
        T: Send,
    {
        let mut attempt: u32 = 0;

        loop {
            match f().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    let retryable = self.config.retryable_errors.contains(&e.kind());
                    if !retryable || attempt + 1 >= self.config.max_attempts {
                        return Err(e);
                    }

                    let mut delay = self.nominal_delay(attempt);
                    if self.config.jitter {
                        delay = Self::jittered(delay);
                    }

                    if let Some(hook) = &self.retry_hook {
                        let decision = hook
                            .on_retry(RetryContext {
                                attempt,
                                error: e.clone(),
                                delay,
                                operation: operation.to_string(),
                            })
                            .await;
                        match decision {
                            RetryDecision::Abort => return Err(e),
                            RetryDecision::Retry(custom_delay) => delay = custom_delay,
                            RetryDecision::Default => {}
                        }
                    }

                    debug!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying after failure"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Backoff before the retry following attempt number `attempt`.
    ///
    /// `min(base_delay * backoff_multiplier^attempt, max_delay)` — the
    /// sequence is non-decreasing and capped for any multiplier ≥ 1.
    fn nominal_delay(&self, attempt: u32) -> Duration {
        let exp = self.config.base_delay.as_secs_f64()
            * self.config.backoff_multiplier.powi(attempt as i32);
        // Clamp in float space; the exponential overflows Duration range
        // long before the cap for large attempt counts.
        let capped = exp.min(self.config.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Redraws a delay uniformly from `[0.9, 1.1] × delay`.
    fn jittered(delay: Duration) -> Duration {
        let factor = rand::thread_rng().gen_range(0.9..=1.1);
        Duration::from_secs_f64(delay.as_secs_f64() * factor)
    }
}

/// Hook for custom retry behavior.
#[async_trait]
pub trait RetryHook: Send + Sync {
    /// Invoked after a retryable failure, before the backoff sleep.
    async fn on_retry(&self, context: RetryContext) -> RetryDecision;
}

/// Context information for a retry attempt.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Zero-based index of the attempt that just failed
    pub attempt: u32,
    /// The error that triggered the retry
    pub error: ResilienceError,
    /// The delay the executor is about to sleep
    pub delay: Duration,
    /// Caller-supplied operation label
    pub operation: String,
}

/// Decision on how to proceed with a retry.
#[derive(Debug)]
pub enum RetryDecision {
    /// Use the default retry behavior
    Default,
    /// Retry with a custom delay
    Retry(Duration),
    /// Abort the retry and return the error
    Abort,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            jitter: false,
            ..Default::default()
        }
    }

    fn server_error() -> ResilienceError {
        ResilienceError::Server {
            message: "Service unavailable".to_string(),
            status_code: Some(503),
        }
    }

    #[tokio::test]
    async fn test_succeeds_on_first_attempt() {
        let executor = RetryExecutor::new(fast_config(3));
        let calls = AtomicU32::new(0);

        let result = executor
            .execute("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_error_until_success() {
        let executor = RetryExecutor::new(fast_config(5));
        let calls = AtomicU32::new(0);

        let result = executor
            .execute("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(server_error())
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let executor = RetryExecutor::new(fast_config(5));
        let calls = AtomicU32::new(0);

        let result: ResilienceResult<u32> = executor
            .execute("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(ResilienceError::Authentication {
                        message: "Invalid key".to_string(),
                    })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invocations_bounded_by_max_attempts() {
        let executor = RetryExecutor::new(fast_config(3));
        let calls = AtomicU32::new(0);

        let result: ResilienceResult<u32> = executor
            .execute("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(server_error()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_single_attempt_config_never_sleeps() {
        let executor = RetryExecutor::new(fast_config(1));
        let calls = AtomicU32::new(0);

        let started = std::time::Instant::now();
        let result: ResilienceResult<u32> = executor
            .execute("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(server_error()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_millis(10));
    }

    #[test]
    fn test_nominal_delays_non_decreasing_and_capped() {
        let executor = RetryExecutor::new(RetryConfig {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(5),
            jitter: false,
            retryable_errors: RetryConfig::default_retryable_errors(),
        });

        let delays: Vec<Duration> = (0..10).map(|a| executor.nominal_delay(a)).collect();

        assert_eq!(delays[0], Duration::from_millis(100));
        assert_eq!(delays[1], Duration::from_millis(200));
        assert_eq!(delays[2], Duration::from_millis(400));
        for pair in delays.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert!(delays.iter().all(|d| *d <= Duration::from_secs(5)));
        assert_eq!(delays[9], Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let nominal = Duration::from_millis(1000);
        for _ in 0..200 {
            let jittered = RetryExecutor::jittered(nominal);
            assert!(jittered >= Duration::from_millis(900));
            assert!(jittered <= Duration::from_millis(1100));
        }
    }

    struct AbortHook;

    #[async_trait]
    impl RetryHook for AbortHook {
        async fn on_retry(&self, _context: RetryContext) -> RetryDecision {
            RetryDecision::Abort
        }
    }

    #[tokio::test]
    async fn test_hook_abort_stops_retrying() {
        let executor = RetryExecutor::new(fast_config(5)).with_hook(Arc::new(AbortHook));
        let calls = AtomicU32::new(0);

        let result: ResilienceResult<u32> = executor
            .execute("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(server_error()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    struct CustomDelayHook {
        seen: Arc<parking_lot::Mutex<Vec<RetryContext>>>,
    }

    #[async_trait]
    impl RetryHook for CustomDelayHook {
        async fn on_retry(&self, context: RetryContext) -> RetryDecision {
            self.seen.lock().push(context);
            RetryDecision::Retry(Duration::from_millis(1))
        }
    }

    #[tokio::test]
    async fn test_hook_sees_attempt_and_error() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let executor = RetryExecutor::new(fast_config(3)).with_hook(Arc::new(CustomDelayHook {
            seen: seen.clone(),
        }));
        let calls = AtomicU32::new(0);

        let result: ResilienceResult<u32> = executor
            .execute("flaky", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(server_error()) }
            })
            .await;

        assert!(result.is_err());
        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].attempt, 0);
        assert_eq!(seen[1].attempt, 1);
        assert_eq!(seen[0].operation, "flaky");
    }
}
