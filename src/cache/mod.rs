//! Response cache: TTL-bounded, size-bounded short-circuiting of
//! idempotent operations.
//!
//! Keys are derived deterministically from the request context with
//! credential-bearing headers excluded — a deliberate hit-rate/security
//! trade-off documented on [`SENSITIVE_HEADERS`].

mod key;
mod store;

pub use key::{cache_key, SENSITIVE_HEADERS};
pub use store::{CacheConfig, ResponseCache};
