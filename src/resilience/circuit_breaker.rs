//! Circuit breaker: fail fast once an operation's failure streak crosses a
//! threshold, self-heal through a probing state.

use crate::errors::{ResilienceError, ResilienceResult};
use crate::{DEFAULT_FAILURE_THRESHOLD, DEFAULT_RECOVERY_TIMEOUT_SECS};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// Time the circuit stays open before allowing a probing call
    pub recovery_timeout: Duration,
    /// Consecutive successes in half-open that close the circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: Duration::from_secs(DEFAULT_RECOVERY_TIMEOUT_SECS),
            success_threshold: 3,
        }
    }
}

/// Circuit breaker state.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CircuitState {
    /// Circuit is closed, calls flow normally
    Closed,
    /// Circuit is open, calls are rejected without being attempted
    Open,
    /// Circuit is half-open, probing whether the service recovered
    HalfOpen,
}

/// Read-only snapshot of breaker counters.
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    /// Current state
    pub state: CircuitState,
    /// Current consecutive failure streak
    pub consecutive_failures: u32,
    /// Current consecutive success streak (meaningful only in half-open)
    pub consecutive_successes: u32,
    /// Time until the breaker will allow a probe, if currently open
    pub time_until_half_open: Option<Duration>,
}

/// Hook for circuit breaker state changes.
pub trait CircuitBreakerHook: Send + Sync {
    /// Invoked after every state transition.
    fn on_state_change(&self, old_state: CircuitState, new_state: CircuitState);
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    // Set only while state is Open.
    opened_at: Option<Instant>,
    // Set while a half-open probe is in flight; concurrent calls are
    // rejected until the probe records its outcome.
    probe_in_flight: bool,
}

/// Circuit breaker implementation.
///
/// The entire gate — read state, possibly invoke, record outcome, possibly
/// transition — runs per call through [`call`](CircuitBreaker::call). The
/// half-open state admits a single probe at a time; callers arriving while
/// a probe is in flight are rejected with
/// [`ResilienceError::CircuitOpen`].
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
    hook: Option<Arc<dyn CircuitBreakerHook>>,
}

impl CircuitBreaker {
    /// Creates a new circuit breaker in the closed state.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
            hook: None,
        }
    }

    /// Adds a hook notified on every state transition.
    pub fn with_hook(mut self, hook: Arc<dyn CircuitBreakerHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Invokes `operation` through the breaker gate.
    ///
    /// While open and the recovery timeout has not elapsed, the operation is
    /// **not** invoked; the call fails fast with
    /// [`ResilienceError::CircuitOpen`] carrying the time until a probe will
    /// be admitted. The breaker never transforms a real operation error.
    pub async fn call<F, Fut, T>(&self, operation: F) -> ResilienceResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ResilienceResult<T>>,
    {
        let is_probe = self.admit()?;

        let result = ProbeGuard::run(self, is_probe, operation()).await;
        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }
        result
    }

    /// Decides whether a call may proceed. Returns whether it is a half-open
    /// probe. Performs the lazy open → half-open transition.
    fn admit(&self) -> ResilienceResult<bool> {
        let (outcome, transition) = {
            let mut inner = self.inner.lock();
            match inner.state {
                CircuitState::Closed => (Ok(false), None),
                CircuitState::Open => {
                    let elapsed = inner
                        .opened_at
                        .map(|at| at.elapsed())
                        .unwrap_or(Duration::ZERO);
                    if elapsed >= self.config.recovery_timeout {
                        let transition =
                            self.transition(&mut inner, CircuitState::HalfOpen);
                        inner.probe_in_flight = true;
                        (Ok(true), transition)
                    } else {
                        (
                            Err(ResilienceError::CircuitOpen {
                                retry_after: Some(self.config.recovery_timeout - elapsed),
                            }),
                            None,
                        )
                    }
                }
                CircuitState::HalfOpen => {
                    if inner.probe_in_flight {
                        (Err(ResilienceError::CircuitOpen { retry_after: None }), None)
                    } else {
                        inner.probe_in_flight = true;
                        (Ok(true), None)
                    }
                }
            }
        };
        self.notify(transition);
        outcome
    }

    fn record_success(&self) {
        let transition = {
            let mut inner = self.inner.lock();
            inner.consecutive_failures = 0;
            if inner.state == CircuitState::HalfOpen {
                inner.probe_in_flight = false;
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    self.transition(&mut inner, CircuitState::Closed)
                } else {
                    None
                }
            } else {
                None
            }
        };
        self.notify(transition);
    }

    fn record_failure(&self) {
        let transition = {
            let mut inner = self.inner.lock();
            inner.consecutive_failures += 1;
            match inner.state {
                CircuitState::HalfOpen => {
                    inner.probe_in_flight = false;
                    self.transition(&mut inner, CircuitState::Open)
                }
                CircuitState::Closed => {
                    if inner.consecutive_failures >= self.config.failure_threshold {
                        self.transition(&mut inner, CircuitState::Open)
                    } else {
                        None
                    }
                }
                CircuitState::Open => None,
            }
        };
        self.notify(transition);
    }

    /// Applies a state change under the lock. Returns the transition for
    /// hook notification, which must happen after the lock is released —
    /// hooks may call back into the breaker.
    fn transition(
        &self,
        inner: &mut BreakerInner,
        new_state: CircuitState,
    ) -> Option<(CircuitState, CircuitState)> {
        let old_state = inner.state;
        if old_state == new_state {
            return None;
        }
        inner.state = new_state;
        inner.consecutive_successes = 0;
        match new_state {
            CircuitState::Open => {
                inner.opened_at = Some(Instant::now());
                warn!(?old_state, "Circuit breaker opened");
            }
            CircuitState::Closed => {
                inner.opened_at = None;
                inner.consecutive_failures = 0;
                debug!(?old_state, "Circuit breaker closed");
            }
            CircuitState::HalfOpen => {
                inner.opened_at = None;
                debug!("Circuit breaker half-open, probing");
            }
        }
        Some((old_state, new_state))
    }

    fn notify(&self, transition: Option<(CircuitState, CircuitState)>) {
        if let (Some(hook), Some((old_state, new_state))) = (&self.hook, transition) {
            hook.on_state_change(old_state, new_state);
        }
    }

    /// Forces the breaker back to closed and zeroes all counters.
    ///
    /// Manual override for tests and operational tooling.
    pub fn reset(&self) {
        let transition = {
            let mut inner = self.inner.lock();
            inner.probe_in_flight = false;
            inner.consecutive_failures = 0;
            self.transition(&mut inner, CircuitState::Closed)
        };
        self.notify(transition);
    }

    /// Returns the current state without mutating it.
    ///
    /// The lazy open → half-open transition happens only inside
    /// [`call`](CircuitBreaker::call); an elapsed recovery timeout is not
    /// reflected here until the next call.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Returns a read-only snapshot of the breaker counters.
    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.inner.lock();
        let time_until_half_open = match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(at)) => Some(
                self.config
                    .recovery_timeout
                    .saturating_sub(at.elapsed()),
            ),
            _ => None,
        };
        CircuitBreakerStats {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            consecutive_successes: inner.consecutive_successes,
            time_until_half_open,
        }
    }
}

/// Clears the probe-in-flight flag if the probe future is dropped before
/// its outcome is recorded, so a cancelled probe cannot wedge the breaker
/// in half-open.
struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl<'a> ProbeGuard<'a> {
    async fn run<T>(
        breaker: &'a CircuitBreaker,
        is_probe: bool,
        fut: impl Future<Output = ResilienceResult<T>>,
    ) -> ResilienceResult<T> {
        let mut guard = ProbeGuard {
            breaker,
            armed: is_probe,
        };
        let result = fut.await;
        guard.armed = false;
        result
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.inner.lock().probe_in_flight = false;
        }
    }
}
