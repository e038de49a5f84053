//! Middleware and chain composition.
//!
//! A [`Middleware`] wraps the rest of a chain. It receives the request and a
//! [`Next`] handle to everything inside it, and may:
//!
//! - call `next.run(request)` and return the response as-is or transformed,
//! - replace the request before calling `next`,
//! - return a response without calling `next` at all.
//!
//! # Composition
//!
//! Each middleware is a tower [`Layer`](tower_layer::Layer) over the service
//! inside it, and the terminal handler is the innermost service. Given
//! middlewares `[a, b]` and handler `h`, [`MiddlewareChain`] produces
//!
//! ```text
//! a.process(req, ─▶ b.process(req, ─▶ h.handle(req)))
//! ```
//!
//! so `a` sees the request first and the response last.

mod builtin;
mod chain;

pub use builtin::{LoggingMiddleware, StopPropagationMiddleware};
pub use chain::{ChainService, ComposedHandler, MiddlewareChain, MiddlewareLayer, MiddlewareService};

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tower::ServiceExt;

use crate::context::Request;
use crate::handler::{HandlerResult, IntoHandlerResult};

/// A wrapper around the downstream part of a chain.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn process(&self, request: Request, next: Next) -> HandlerResult;
}

/// A shared, type-erased middleware.
pub type BoxedMiddleware = Arc<dyn Middleware>;

#[async_trait]
impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    async fn process(&self, request: Request, next: Next) -> HandlerResult {
        (**self).process(request, next).await
    }
}

// ============================================================================
// Next
// ============================================================================

/// The remainder of a chain, as seen from one middleware.
///
/// Consumed by [`Next::run`], so a middleware calls downstream at most once.
#[derive(Clone)]
pub struct Next {
    inner: ChainService,
}

impl Next {
    pub(crate) fn new(inner: ChainService) -> Self {
        Self { inner }
    }

    /// Runs the inner middlewares and the terminal handler.
    pub async fn run(self, request: Request) -> HandlerResult {
        self.inner.oneshot(request).await
    }
}

// ============================================================================
// MiddlewareFn
// ============================================================================

/// Adapts an async closure into a [`Middleware`].
#[derive(Clone)]
pub struct MiddlewareFn<F>(F);

#[async_trait]
impl<F, Fut> Middleware for MiddlewareFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoHandlerResult,
{
    async fn process(&self, request: Request, next: Next) -> HandlerResult {
        (self.0)(request, next).await.into_handler_result()
    }
}

/// Creates a middleware from an async closure.
///
/// ```rust,ignore
/// let tag = middleware_fn(|req: Request, next: Next| async move {
///     let res = next.run(req.with_attribute("via", "tag")).await?;
///     Ok::<_, BoxError>(res.with_attribute("tagged", true))
/// });
/// ```
pub fn middleware_fn<F, Fut>(f: F) -> MiddlewareFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoHandlerResult,
{
    MiddlewareFn(f)
}
