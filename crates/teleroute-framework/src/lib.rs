//! # teleroute framework
//!
//! The update dispatch kernel.
//!
//! This layer provides:
//! - Checkers deciding whether a handler group applies to an update
//! - Onion-style middleware chains built on tower layers
//! - Handler groups with priorities, and plugins bundling them
//! - Immutable per-dispatch [`Request`] and [`Response`] values
//! - Lifecycle events and the [`UpdateHandler`] orchestrator
//!
//! Built-in plugins are available with the `builtin-plugins` feature.

pub mod checker;
pub mod context;
pub mod error;
pub mod event;
pub mod group;
pub mod handler;
pub mod kernel;
pub mod middleware;
pub mod plugin;
pub mod routing;

pub use checker::{
    AndChecker, AnyChecker, BoxedChecker, Checker, CommandChecker, FnChecker, KindChecker,
    checker_fn,
};
pub use context::{Attributes, Request, Response, ResponseStatus};
pub use error::{
    AttributeError, AttributeResult, BoxError, GroupFailure, KernelError, KernelResult,
    RegistrationError,
};
pub use event::{
    BoxedEventDispatcher, ChannelEventDispatcher, EventDispatcher, KernelEvent,
    ListenerEventDispatcher, ListenerFlow, NoopEventDispatcher,
};
pub use group::{HandlerGroup, HandlerGroupBuilder};
pub use handler::{
    BoxedRequestHandler, HandlerFn, HandlerResult, IntoHandlerResult, RequestHandler, handler_fn,
};
pub use kernel::{DispatchPolicy, UpdateHandler, UpdateHandlerBuilder};
pub use middleware::{
    BoxedMiddleware, LoggingMiddleware, Middleware, MiddlewareChain, MiddlewareFn, Next,
    StopPropagationMiddleware, middleware_fn,
};
pub use plugin::{Plugin, PluginBundle};
pub use routing::{
    on, on_any, on_callback_query, on_command, on_edited_message, on_inline_query, on_message,
};

#[cfg(feature = "builtin-plugins")]
pub use plugin::builtin::LoggingPlugin;
