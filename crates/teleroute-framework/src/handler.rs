//! Terminal request handlers.
//!
//! A [`RequestHandler`] turns a [`Request`] into a [`Response`]. Every
//! middleware chain ends in exactly one. Handlers are registered as
//! ready-made values: either a type implementing the trait or a closure
//! wrapped with [`handler_fn`].
//!
//! # Return values
//!
//! Closures passed to [`handler_fn`] may return anything implementing
//! [`IntoHandlerResult`]:
//!
//! ```rust,ignore
//! // Plain response
//! handler_fn(|_req| async { Response::handled() });
//!
//! // Unit, treated as `Response::handled()`
//! handler_fn(|req| async move { info!(id = req.update().update_id, "seen") });
//!
//! // Fallible
//! handler_fn(|req| async move {
//!     req.api().call("sendMessage", params).await?;
//!     Ok::<_, BoxError>(Response::handled())
//! });
//! ```
//!
//! An `Err` is not a routing signal: the orchestrator treats it as a failure
//! of that group alone and moves on to the next one.

use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tower::Service;

use crate::context::{Request, Response};
use crate::error::BoxError;

/// Result produced by handlers and middleware.
pub type HandlerResult = Result<Response, BoxError>;

/// Terminal unit of a middleware chain.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    async fn handle(&self, request: Request) -> HandlerResult;
}

/// A shared, type-erased request handler.
pub type BoxedRequestHandler = Arc<dyn RequestHandler>;

#[async_trait]
impl<H: RequestHandler + ?Sized> RequestHandler for Arc<H> {
    async fn handle(&self, request: Request) -> HandlerResult {
        (**self).handle(request).await
    }
}

// ============================================================================
// IntoHandlerResult
// ============================================================================

/// Types a handler closure may return.
pub trait IntoHandlerResult: Send + 'static {
    fn into_handler_result(self) -> HandlerResult;
}

impl IntoHandlerResult for Response {
    fn into_handler_result(self) -> HandlerResult {
        Ok(self)
    }
}

impl IntoHandlerResult for () {
    fn into_handler_result(self) -> HandlerResult {
        Ok(Response::handled())
    }
}

impl<E> IntoHandlerResult for Result<Response, E>
where
    E: Into<BoxError> + Send + 'static,
{
    fn into_handler_result(self) -> HandlerResult {
        self.map_err(Into::into)
    }
}

// ============================================================================
// HandlerFn
// ============================================================================

/// Adapts an async closure into a [`RequestHandler`].
#[derive(Clone)]
pub struct HandlerFn<F>(F);

#[async_trait]
impl<F, Fut> RequestHandler for HandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoHandlerResult,
{
    async fn handle(&self, request: Request) -> HandlerResult {
        (self.0)(request).await.into_handler_result()
    }
}

/// Creates a request handler from an async closure.
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoHandlerResult,
{
    HandlerFn(f)
}

// ============================================================================
// HandlerService
// ============================================================================

/// A tower [`Service`] calling a single request handler.
///
/// This is the innermost service of every middleware chain.
#[derive(Clone)]
pub struct HandlerService {
    handler: BoxedRequestHandler,
}

impl HandlerService {
    pub fn new(handler: BoxedRequestHandler) -> Self {
        Self { handler }
    }
}

impl Service<Request> for HandlerService {
    type Response = Response;
    type Error = BoxError;
    type Future = BoxFuture<'static, HandlerResult>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let handler = Arc::clone(&self.handler);
        async move { handler.handle(request).await }.boxed()
    }
}
