//! Middleware chain: ordered interception of requests, responses, and errors.
//!
//! Request hooks run in registration order; response and error hooks run in
//! reverse registration order (onion model). The error walk is the single
//! recovery point of the pipeline — the first hook to produce a substitute
//! result converts a failure into a success.

mod builtin;
mod chain;

pub use builtin::{
    HeaderInjectMiddleware, LoggingMiddleware, MetricsMiddleware, META_ELAPSED_MS, META_START_MS,
};
pub use chain::{Middleware, MiddlewareChain};
