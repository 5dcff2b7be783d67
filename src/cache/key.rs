//! Deterministic cache-key derivation.

use crate::context::RequestContext;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Header names excluded from cache-key derivation.
///
/// Dropping credential-bearing headers collapses requests that differ only
/// in credentials onto one key, maximizing hit rate. The flip side: a cache
/// instance must be scoped to a single security principal, or responses can
/// leak across principals. See [`ResponseCache`](super::ResponseCache).
pub const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
];

/// Derives the cache key for a request.
///
/// The key is a hex SHA-256 digest over the method, target, sorted params,
/// sorted normalized headers (lowercased names, sensitive names excluded),
/// and the body bytes. Two contexts with the same normalized fields always
/// produce the same key regardless of map iteration order.
pub fn cache_key(ctx: &RequestContext) -> String {
    let mut hasher = Sha256::new();

    hasher.update(ctx.method.as_bytes());
    hasher.update(b"\n");
    hasher.update(ctx.target.as_bytes());
    hasher.update(b"\n");

    let params: BTreeMap<&String, String> = ctx
        .params
        .iter()
        .map(|(k, v)| (k, v.to_string()))
        .collect();
    for (name, value) in params {
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b"&");
    }
    hasher.update(b"\n");

    let headers: BTreeMap<String, &String> = ctx
        .headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value))
        .filter(|(name, _)| !SENSITIVE_HEADERS.contains(&name.as_str()))
        .collect();
    for (name, value) in headers {
        hasher.update(name.as_bytes());
        hasher.update(b":");
        hasher.update(value.as_bytes());
        hasher.update(b";");
    }
    hasher.update(b"\n");

    if let Some(body) = &ctx.body {
        hasher.update(body);
    }

    hex::encode(hasher.finalize())
}
