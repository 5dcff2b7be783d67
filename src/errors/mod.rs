//! Error types for the resilience pipeline.
//!
//! The taxonomy distinguishes transient failures (eligible for retry) from
//! permanent ones, and gives fail-fast breaker rejections their own variant
//! so callers can tell them apart from real operation failures.

mod error;

pub use error::{ErrorKind, ResilienceError, ResilienceResult};
