//! Request and response context shared across the pipeline.
//!
//! Protocol clients populate a [`RequestContext`] before invoking the
//! pipeline and read its `metadata` afterward (recorded latency, timers,
//! anything a middleware left behind). The pipeline never interprets the
//! request fields itself; only [`OperationResult`] is inspected for
//! retry and circuit-breaker decisions.

use bytes::Bytes;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Mutable context describing one request/response exchange.
///
/// A fresh clone is created for every attempt; middleware may mutate
/// `headers` and `metadata` in place before the operation is dispatched.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Operation method (e.g. an HTTP verb or RPC name)
    pub method: String,
    /// Endpoint identifier (URL, queue name, procedure path)
    pub target: String,
    /// Request headers; insertion order is irrelevant
    pub headers: HashMap<String, String>,
    /// Request parameters
    pub params: HashMap<String, Value>,
    /// Opaque request body
    pub body: Option<Bytes>,
    /// Free-form state passed between middleware (timers, tags)
    pub metadata: HashMap<String, Value>,
}

impl RequestContext {
    /// Creates a context for the given method and target.
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
            ..Default::default()
        }
    }

    /// Sets a header, replacing any existing value.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets a request parameter.
    pub fn param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    /// Sets the request body.
    pub fn body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }
}

/// The outcome of one completed attempt.
///
/// Produced by the innermost transport call. This is the only type whose
/// fields the pipeline interprets: `success` feeds the circuit breaker and
/// `status` feeds error classification.
#[derive(Debug, Clone)]
pub struct OperationResult {
    /// Whether the attempt succeeded
    pub success: bool,
    /// Status or outcome code reported by the transport
    pub status: Option<u16>,
    /// Time the attempt took
    pub latency: Duration,
    /// Opaque response payload
    pub payload: Bytes,
}

impl OperationResult {
    /// Creates a successful result.
    pub fn ok(status: Option<u16>, latency: Duration, payload: Bytes) -> Self {
        Self {
            success: true,
            status,
            latency,
            payload,
        }
    }

    /// Creates a failed result.
    pub fn failed(status: Option<u16>, latency: Duration, payload: Bytes) -> Self {
        Self {
            success: false,
            status,
            latency,
            payload,
        }
    }
}

/// Context handed to response-phase middleware.
///
/// One instance per attempt; discarded once response-phase processing is
/// done. The final attempt's metadata is merged back into the caller's
/// [`RequestContext`].
#[derive(Debug, Clone)]
pub struct ResponseContext {
    /// Result of the completed attempt
    pub result: OperationResult,
    /// Free-form state passed between middleware
    pub metadata: HashMap<String, Value>,
}

impl ResponseContext {
    /// Creates a response context from an attempt result, carrying over the
    /// request-phase metadata.
    pub fn new(result: OperationResult, metadata: HashMap<String, Value>) -> Self {
        Self { result, metadata }
    }
}
