//! Handler groups, the unit of registration.
//!
//! A [`HandlerGroup`] binds a [`Checker`], a terminal [`RequestHandler`], an
//! ordered middleware list and an integer priority. Groups are immutable once
//! built; the orchestrator only reads them.
//!
//! # Example
//!
//! ```rust,ignore
//! let group = HandlerGroup::builder()
//!     .name("greeter")
//!     .checker(CommandChecker::new("start"))
//!     .middleware(LoggingMiddleware::new())
//!     .priority(10)
//!     .handler(handler_fn(greet))
//!     .build()?;
//! ```
//!
//! # Cheap Cloning
//!
//! `HandlerGroup` keeps its fields behind one `Arc`, so cloning a group (for
//! example into the orchestrator's sorted snapshot) never copies the
//! middleware list.

use std::fmt;
use std::sync::Arc;

use crate::checker::{AnyChecker, BoxedChecker, Checker};
use crate::error::RegistrationError;
use crate::handler::{BoxedRequestHandler, RequestHandler};
use crate::middleware::{BoxedMiddleware, ComposedHandler, Middleware, MiddlewareChain};

const UNNAMED: &str = "unnamed";

struct HandlerGroupInner {
    name: Option<String>,
    checker: BoxedChecker,
    handler: BoxedRequestHandler,
    middlewares: Vec<BoxedMiddleware>,
    priority: i32,
}

/// An immutable {checker, handler, middlewares, priority} binding.
#[derive(Clone)]
pub struct HandlerGroup {
    inner: Arc<HandlerGroupInner>,
}

impl HandlerGroup {
    /// Creates an unnamed group from its four parts.
    pub fn new<C, H>(
        checker: C,
        handler: H,
        middlewares: Vec<BoxedMiddleware>,
        priority: i32,
    ) -> Self
    where
        C: Checker,
        H: RequestHandler,
    {
        Self::from_parts(None, Arc::new(checker), Arc::new(handler), middlewares, priority)
    }

    /// Creates a named group from its four parts.
    pub fn named<C, H>(
        name: impl Into<String>,
        checker: C,
        handler: H,
        middlewares: Vec<BoxedMiddleware>,
        priority: i32,
    ) -> Self
    where
        C: Checker,
        H: RequestHandler,
    {
        Self::from_parts(
            Some(name.into()),
            Arc::new(checker),
            Arc::new(handler),
            middlewares,
            priority,
        )
    }

    fn from_parts(
        name: Option<String>,
        checker: BoxedChecker,
        handler: BoxedRequestHandler,
        middlewares: Vec<BoxedMiddleware>,
        priority: i32,
    ) -> Self {
        Self {
            inner: Arc::new(HandlerGroupInner {
                name,
                checker,
                handler,
                middlewares,
                priority,
            }),
        }
    }

    pub fn builder() -> HandlerGroupBuilder {
        HandlerGroupBuilder::new()
    }

    pub fn checker(&self) -> &BoxedChecker {
        &self.inner.checker
    }

    pub fn handler(&self) -> &BoxedRequestHandler {
        &self.inner.handler
    }

    /// Returns the middlewares, outermost first.
    pub fn middlewares(&self) -> &[BoxedMiddleware] {
        &self.inner.middlewares
    }

    pub fn priority(&self) -> i32 {
        self.inner.priority
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Returns the name, or `"unnamed"`, for logs and events.
    pub fn label(&self) -> &str {
        self.name().unwrap_or(UNNAMED)
    }

    /// Composes this group's middlewares around its handler.
    pub fn chain(&self) -> ComposedHandler {
        MiddlewareChain::new(Arc::clone(&self.inner.handler))
            .with_all(self.inner.middlewares.iter().cloned())
            .build()
    }
}

impl fmt::Debug for HandlerGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerGroup")
            .field("name", &self.label())
            .field("priority", &self.inner.priority)
            .field("middlewares", &self.inner.middlewares.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// HandlerGroupBuilder
// =============================================================================

/// Builder for [`HandlerGroup`].
///
/// Without an explicit checker the group matches every update. A terminal
/// handler is required.
#[derive(Default)]
pub struct HandlerGroupBuilder {
    name: Option<String>,
    checker: Option<BoxedChecker>,
    handler: Option<BoxedRequestHandler>,
    middlewares: Vec<BoxedMiddleware>,
    priority: i32,
}

impl HandlerGroupBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn checker<C: Checker>(self, checker: C) -> Self {
        self.checker_boxed(Arc::new(checker))
    }

    pub fn checker_boxed(mut self, checker: BoxedChecker) -> Self {
        self.checker = Some(checker);
        self
    }

    pub fn handler<H: RequestHandler>(self, handler: H) -> Self {
        self.handler_boxed(Arc::new(handler))
    }

    pub fn handler_boxed(mut self, handler: BoxedRequestHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Appends a middleware inside the ones added before it.
    pub fn middleware<M: Middleware>(self, middleware: M) -> Self {
        self.middleware_boxed(Arc::new(middleware))
    }

    pub fn middleware_boxed(mut self, middleware: BoxedMiddleware) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Higher priorities run first. Defaults to `0`.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn build(self) -> Result<HandlerGroup, RegistrationError> {
        let Some(handler) = self.handler else {
            return Err(RegistrationError::MissingHandler(
                self.name.unwrap_or_else(|| UNNAMED.to_string()),
            ));
        };
        Ok(HandlerGroup::from_parts(
            self.name,
            self.checker.unwrap_or_else(|| Arc::new(AnyChecker)),
            handler,
            self.middlewares,
            self.priority,
        ))
    }
}
