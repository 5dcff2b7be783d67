//! Sliding-window rate limiter with burst allowance.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::debug;

/// Configuration for rate limiting.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Steady-state request budget per window
    pub max_requests: usize,
    /// Width of the sliding window
    pub window: Duration,
    /// Extra capacity above `max_requests` allowed in short spikes
    pub burst: usize,
}

impl RateLimitConfig {
    /// Creates a configuration with the default burst allowance:
    /// 10% of `max_requests`, rounded to the nearest whole request.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            burst: (max_requests as f64 * 0.1).round() as usize,
        }
    }

    /// Overrides the burst allowance.
    pub fn with_burst(mut self, burst: usize) -> Self {
        self.burst = burst;
        self
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(60, Duration::from_secs(60))
    }
}

/// Gates operation start rate using a sliding time window.
///
/// One limiter instance is typically shared by every request of a client;
/// all mutation happens under a single lock around the timestamp window.
/// The blocking [`acquire`](RateLimiter::acquire) wait is a plain `tokio`
/// sleep — dropping the future cancels it.
pub struct RateLimiter {
    config: RateLimitConfig,
    window: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Creates a new rate limiter with the given configuration.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            window: Mutex::new(VecDeque::with_capacity(
                config.max_requests + config.burst,
            )),
            config,
        }
    }

    /// Returns the configuration in effect.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn capacity(&self) -> usize {
        self.config.max_requests + self.config.burst
    }

    /// Drops every timestamp that has left the window.
    fn purge(&self, window: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = window.front() {
            if now.duration_since(*oldest) >= self.config.window {
                window.pop_front();
            } else {
                break;
            }
        }
    }

    /// Acquires a slot, waiting as long as necessary.
    ///
    /// The lock is released across the wait and the whole capacity check is
    /// repeated afterwards — concurrent callers may have taken the freed
    /// slot. This path never fails; impatient callers should wrap it in a
    /// deadline or use [`try_acquire`](RateLimiter::try_acquire).
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let now = Instant::now();
                let mut window = self.window.lock();
                self.purge(&mut window, now);
                if window.len() < self.capacity() {
                    window.push_back(now);
                    return;
                }
                match window.front() {
                    Some(oldest) => {
                        (*oldest + self.config.window).saturating_duration_since(now)
                    }
                    // Degenerate zero-capacity configuration: re-check once
                    // per window.
                    None => self.config.window,
                }
            };
            debug!(
                wait_ms = wait.as_millis() as u64,
                "Rate limit capacity exhausted, waiting"
            );
            sleep(wait).await;
        }
    }

    /// Acquires a slot if capacity is available right now.
    ///
    /// Returns false without waiting — and without mutating the window
    /// beyond the stale-entry purge — when capacity is exhausted.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut window = self.window.lock();
        self.purge(&mut window, now);
        if window.len() < self.capacity() {
            window.push_back(now);
            true
        } else {
            false
        }
    }

    /// Returns how many slots are currently available.
    pub fn remaining(&self) -> usize {
        let now = Instant::now();
        let mut window = self.window.lock();
        self.purge(&mut window, now);
        self.capacity() - window.len()
    }

    /// Returns the time until a slot frees up, or zero if one is available.
    pub fn wait_time(&self) -> Duration {
        let now = Instant::now();
        let mut window = self.window.lock();
        self.purge(&mut window, now);
        if window.len() < self.capacity() {
            return Duration::ZERO;
        }
        match window.front() {
            Some(oldest) => (*oldest + self.config.window).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    /// Clears the window entirely.
    pub fn reset(&self) {
        self.window.lock().clear();
        debug!("Rate limiter reset");
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("remaining", &self.remaining())
            .finish()
    }
}
