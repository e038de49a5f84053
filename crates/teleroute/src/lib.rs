//! # teleroute
//!
//! A middleware-driven update dispatch kernel for Telegram bots.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────┐     ┌─────────────────────────────────────────┐
//! │ UpdateSource │────▶│ UpdateHandler │────▶│ group "/start" (prio 10): checker ▶ chain │
//! │ (pull batch) │     │  (per update) │────▶│ group "message" (prio 0): checker ▶ chain │
//! └──────────────┘     └───────────────┘────▶│ ...                                       │
//!                                            └─────────────────────────────────────────┘
//! ```
//!
//! - **Update sources** yield batches of updates; order is preserved
//! - **Handler groups** pair a checker with a handler wrapped in middlewares
//! - **Plugins** bundle groups under a unique name
//! - **Events** report every step of a dispatch to an optional dispatcher
//! - **Runtime** loads configuration, sets up logging and listens until shutdown
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use teleroute::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (source, tx) = QueueUpdateSource::new();
//!     let runtime = TelerouteRuntime::builder(source).build()?;
//!
//!     runtime.register_plugin(&plugin! {
//!         name: "greeter",
//!         groups: [
//!             on_command("start")
//!                 .handler(handler_fn(|_req: Request| async { Response::handled() }))
//!                 .build()?,
//!         ],
//!     })?;
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: read `teleroute.toml` (default)
//! - `yaml-config`: read `teleroute.yaml`
//! - `json-log`: JSON log lines
//! - `builtin-plugins`: ship [`LoggingPlugin`](framework::LoggingPlugin)

pub use teleroute_core as core;
pub use teleroute_framework as framework;
pub use teleroute_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use teleroute::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use teleroute_runtime::{RuntimeError, RuntimeResult, TelerouteRuntime};

    // Kernel
    pub use teleroute_framework::{DispatchPolicy, KernelError, UpdateHandler};

    // Groups and plugins
    pub use teleroute_framework::{HandlerGroup, Plugin, PluginBundle, plugin};

    // Route convenience functions
    pub use teleroute_framework::routing::{
        on, on_any, on_callback_query, on_command, on_edited_message, on_inline_query, on_message,
    };

    // Handlers, middleware and checkers
    pub use teleroute_framework::{
        BoxError, Checker, CommandChecker, HandlerResult, KindChecker, Middleware, Next, Request,
        RequestHandler, Response, ResponseStatus, checker_fn, handler_fn, middleware_fn,
    };

    // Events
    pub use teleroute_framework::{
        ChannelEventDispatcher, EventDispatcher, KernelEvent, ListenerEventDispatcher,
        ListenerFlow,
    };

    // Updates, sources and the API client
    pub use teleroute_core::{
        ApiClient, Message, QueueUpdateSource, Update, UpdateKind, UpdateSource, UpdateType,
        WebhookUpdateSource,
    };

    // Logging macros
    pub use teleroute_runtime::prelude::*;
}
