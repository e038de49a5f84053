//! Onion composition of middlewares around a terminal handler.

use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tower::util::BoxCloneSyncService;
use tower::{Service, ServiceExt};
use tower_layer::Layer;

use super::{BoxedMiddleware, Middleware, Next};
use crate::context::{Request, Response};
use crate::error::BoxError;
use crate::handler::{BoxedRequestHandler, HandlerResult, HandlerService, RequestHandler};

/// A type-erased, cloneable chain of services.
pub type ChainService = BoxCloneSyncService<Request, Response, BoxError>;

// ============================================================================
// MiddlewareLayer
// ============================================================================

/// A tower [`Layer`] that puts one middleware in front of a service.
#[derive(Clone)]
pub struct MiddlewareLayer {
    middleware: BoxedMiddleware,
}

impl MiddlewareLayer {
    pub fn new<M: Middleware>(middleware: M) -> Self {
        Self::from_boxed(Arc::new(middleware))
    }

    pub fn from_boxed(middleware: BoxedMiddleware) -> Self {
        Self { middleware }
    }
}

impl<S> Layer<S> for MiddlewareLayer {
    type Service = MiddlewareService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MiddlewareService {
            middleware: Arc::clone(&self.middleware),
            inner,
        }
    }
}

/// The service produced by [`MiddlewareLayer`].
///
/// Each call hands the middleware a fresh [`Next`] wrapping a clone of the
/// inner service.
pub struct MiddlewareService<S> {
    middleware: BoxedMiddleware,
    inner: S,
}

impl<S: Clone> Clone for MiddlewareService<S> {
    fn clone(&self) -> Self {
        MiddlewareService {
            middleware: Arc::clone(&self.middleware),
            inner: self.inner.clone(),
        }
    }
}

impl<S> Service<Request> for MiddlewareService<S>
where
    S: Service<Request, Response = Response, Error = BoxError> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = BoxError;
    type Future = BoxFuture<'static, HandlerResult>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // `Next::run` drives readiness of the inner service itself.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let middleware = Arc::clone(&self.middleware);
        let next = Next::new(BoxCloneSyncService::new(self.inner.clone()));
        async move { middleware.process(request, next).await }.boxed()
    }
}

// ============================================================================
// MiddlewareChain
// ============================================================================

/// Builder composing an ordered list of middlewares around a handler.
///
/// The first middleware added is the outermost.
///
/// ```rust,ignore
/// let handler = MiddlewareChain::new(Arc::new(reply_handler))
///     .with(LoggingMiddleware::new())
///     .with(auth)
///     .build();
/// ```
pub struct MiddlewareChain {
    handler: BoxedRequestHandler,
    middlewares: Vec<BoxedMiddleware>,
}

impl MiddlewareChain {
    pub fn new(handler: BoxedRequestHandler) -> Self {
        Self {
            handler,
            middlewares: Vec::new(),
        }
    }

    /// Appends a middleware inside all previously added ones.
    pub fn with<M: Middleware>(self, middleware: M) -> Self {
        self.with_boxed(Arc::new(middleware))
    }

    pub fn with_boxed(mut self, middleware: BoxedMiddleware) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn with_all(mut self, middlewares: impl IntoIterator<Item = BoxedMiddleware>) -> Self {
        self.middlewares.extend(middlewares);
        self
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Composes the chain into a tower service.
    ///
    /// Wraps from the inside out: the terminal handler first, then each
    /// middleware from last to first.
    pub fn into_service(self) -> ChainService {
        let innermost = ChainService::new(HandlerService::new(self.handler));
        self.middlewares
            .into_iter()
            .rev()
            .fold(innermost, |service, middleware| {
                ChainService::new(MiddlewareLayer::from_boxed(middleware).layer(service))
            })
    }

    /// Composes the chain into a single request handler.
    pub fn build(self) -> ComposedHandler {
        ComposedHandler {
            service: self.into_service(),
        }
    }
}

/// A request handler backed by a composed middleware chain.
#[derive(Clone)]
pub struct ComposedHandler {
    service: ChainService,
}

impl ComposedHandler {
    pub fn into_service(self) -> ChainService {
        self.service
    }
}

#[async_trait]
impl RequestHandler for ComposedHandler {
    async fn handle(&self, request: Request) -> HandlerResult {
        self.service.clone().oneshot(request).await
    }
}
