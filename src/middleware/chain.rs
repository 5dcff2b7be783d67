//! Middleware trait and ordered interception chain.

use crate::context::{OperationResult, RequestContext, ResponseContext};
use crate::errors::{ResilienceError, ResilienceResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

/// Interception hooks around an operation.
///
/// All three hooks are optional and default to no-ops; implement only the
/// phases you care about. Middleware communicates exclusively through side
/// effects and context mutation — hooks receive no return channel other
/// than the error-substitution path of [`on_error`](Middleware::on_error).
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Called before the operation is dispatched, in registration order.
    ///
    /// May mutate headers and metadata in place. Returning an error aborts
    /// the chain and propagates to the caller without dispatching.
    async fn on_request(&self, _ctx: &mut RequestContext) -> ResilienceResult<()> {
        Ok(())
    }

    /// Called after a successful attempt, in reverse registration order.
    ///
    /// The middleware registered last sees the response first, mirroring how
    /// it was the last to see the outgoing request.
    async fn on_response(&self, _ctx: &mut ResponseContext) -> ResilienceResult<()> {
        Ok(())
    }

    /// Called when an attempt fails, in reverse registration order.
    ///
    /// Returning `Some(result)` substitutes the error with that result and
    /// stops the walk; remaining hooks never see the error. Returning `None`
    /// lets the error continue to the next hook and, ultimately, the caller.
    async fn on_error(
        &self,
        _ctx: &RequestContext,
        _error: &ResilienceError,
    ) -> Option<OperationResult> {
        None
    }
}

/// Ordered collection of middleware applied around every operation.
///
/// Registration order determines hook order: request hooks run first-to-last,
/// response and error hooks run last-to-first (onion model). The chain may
/// be shared and mutated concurrently; registration is guarded by a lock and
/// each processing pass works on a snapshot of the list.
#[derive(Default)]
pub struct MiddlewareChain {
    entries: RwLock<Vec<Arc<dyn Middleware>>>,
}

impl MiddlewareChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware to the end of the chain.
    pub fn add(&self, middleware: Arc<dyn Middleware>) {
        self.entries.write().push(middleware);
    }

    /// Removes a previously added middleware.
    ///
    /// Identity is by handle (`Arc` pointer), so keep a clone of the `Arc`
    /// you registered. Returns true if the middleware was found and removed.
    pub fn remove(&self, middleware: &Arc<dyn Middleware>) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|entry| !Arc::ptr_eq(entry, middleware));
        entries.len() != before
    }

    /// Returns the number of registered middleware.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if no middleware is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<dyn Middleware>> {
        self.entries.read().clone()
    }

    /// Runs every request hook in registration order.
    ///
    /// The first hook error aborts the walk and propagates.
    pub async fn process_request(&self, ctx: &mut RequestContext) -> ResilienceResult<()> {
        for middleware in self.snapshot() {
            middleware.on_request(ctx).await?;
        }
        Ok(())
    }

    /// Runs every response hook in reverse registration order.
    pub async fn process_response(&self, ctx: &mut ResponseContext) -> ResilienceResult<()> {
        for middleware in self.snapshot().iter().rev() {
            middleware.on_response(ctx).await?;
        }
        Ok(())
    }

    /// Walks error hooks in reverse registration order.
    ///
    /// Returns the first substitute result produced by a hook, or `None` if
    /// every hook declined and the original error should propagate.
    pub async fn process_error(
        &self,
        ctx: &RequestContext,
        error: &ResilienceError,
    ) -> Option<OperationResult> {
        for middleware in self.snapshot().iter().rev() {
            if let Some(result) = middleware.on_error(ctx, error).await {
                return Some(result);
            }
        }
        None
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("len", &self.len())
            .finish()
    }
}
