//! Process-level orchestration around the dispatch kernel.
//!
//! ```rust,ignore
//! use teleroute_runtime::TelerouteRuntime;
//!
//! // Loads teleroute.toml from the current directory plus TELEROUTE_* variables.
//! let runtime = TelerouteRuntime::builder(source)
//!     .profile("production")
//!     .build()?;
//!
//! runtime.register_plugin(&my_plugin)?;
//! runtime.run().await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use teleroute_core::{ApiClient, UpdateSource};
use teleroute_framework::{
    EventDispatcher, HandlerGroup, Plugin, UpdateHandler, UpdateHandlerBuilder,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{Span, info};

use crate::config::{ConfigLoader, TelerouteConfig};
use crate::error::RuntimeResult;
use crate::logging;

/// Owns a configured [`UpdateHandler`] and drives it until shutdown.
pub struct TelerouteRuntime {
    config: TelerouteConfig,
    handler: Arc<UpdateHandler>,
}

impl TelerouteRuntime {
    /// Starts a builder that loads configuration from files and environment.
    pub fn builder<S: UpdateSource>(source: S) -> RuntimeBuilder {
        RuntimeBuilder::new(source)
    }

    /// Creates a runtime from an already loaded configuration.
    ///
    /// Installs the global subscriber unless one is already set.
    pub fn from_config<S: UpdateSource>(config: &TelerouteConfig, source: S) -> Self {
        Self::assemble(config.clone(), UpdateHandler::builder(source))
    }

    fn assemble(config: TelerouteConfig, kernel: UpdateHandlerBuilder) -> Self {
        logging::init_from_config(&config.logging);

        let handler = kernel.policy(config.dispatch.policy).build();
        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            poll_interval_secs = config.dispatch.poll_interval_secs,
            policy = ?config.dispatch.policy,
            "Runtime initialized from configuration"
        );

        Self {
            config,
            handler: Arc::new(handler),
        }
    }

    pub fn config(&self) -> &TelerouteConfig {
        &self.config
    }

    /// The kernel; clone the `Arc` to register groups from another task.
    pub fn handler(&self) -> &Arc<UpdateHandler> {
        &self.handler
    }

    pub fn register_plugin<P: Plugin + ?Sized>(&self, plugin: &P) -> RuntimeResult<()> {
        self.handler.register_plugin(plugin)?;
        Ok(())
    }

    pub fn add_handler_group(&self, group: HandlerGroup) {
        self.handler.add_handler_group(group);
    }

    /// Listens until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        let shutdown = ShutdownSignal::install()?;
        info!("teleroute is running. Press Ctrl+C to stop.");
        self.run_until(shutdown.recv()).await
    }

    /// Listens until `shutdown` resolves or the update source closes.
    ///
    /// The batch in flight when `shutdown` resolves is finished first.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let token = CancellationToken::new();
        let listener = self
            .handler
            .listen_until(self.config.dispatch.poll_interval_secs, token.clone());
        tokio::pin!(listener);

        tokio::select! {
            result = &mut listener => {
                result?;
                info!("Runtime stopped");
                return Ok(());
            }
            () = shutdown => {
                info!("Shutdown requested, finishing current batch");
                token.cancel();
            }
        }

        listener.await?;
        info!("Runtime stopped");
        Ok(())
    }
}

impl std::fmt::Debug for TelerouteRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelerouteRuntime")
            .field("config", &self.config)
            .field("handler", &self.handler)
            .finish()
    }
}

/// Ctrl+C, plus SIGTERM on unix.
struct ShutdownSignal {
    #[cfg(unix)]
    sigterm: signal::unix::Signal,
}

impl ShutdownSignal {
    /// Registers the handlers up front so a failure surfaces before listening.
    fn install() -> std::io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            sigterm: signal::unix::signal(signal::unix::SignalKind::terminate())?,
        })
    }

    #[cfg(unix)]
    async fn recv(mut self) {
        tokio::select! {
            Ok(()) = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
            _ = self.sigterm.recv() => info!("Received SIGTERM, shutting down"),
        }
    }

    #[cfg(not(unix))]
    async fn recv(self) {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for [`TelerouteRuntime`].
///
/// Configuration comes from a [`ConfigLoader`] searching the current
/// directory; the kernel collaborators are passed straight through.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    kernel: UpdateHandlerBuilder,
}

impl RuntimeBuilder {
    pub fn new<S: UpdateSource>(source: S) -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            kernel: UpdateHandlerBuilder::new(Arc::new(source)),
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the profile (e.g. "development", "production").
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges configuration values programmatically.
    pub fn merge(mut self, config: TelerouteConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    pub fn api_client<C: ApiClient>(mut self, client: C) -> Self {
        self.kernel = self.kernel.api_client(client);
        self
    }

    pub fn event_dispatcher<D: EventDispatcher>(mut self, dispatcher: D) -> Self {
        self.kernel = self.kernel.event_dispatcher(dispatcher);
        self
    }

    /// Sets the parent span of every dispatch.
    pub fn span(mut self, span: Span) -> Self {
        self.kernel = self.kernel.span(span);
        self
    }

    /// Loads and validates the configuration, then builds the runtime.
    pub fn build(self) -> RuntimeResult<TelerouteRuntime> {
        let config = self.config_loader.load()?;
        Ok(TelerouteRuntime::assemble(config, self.kernel))
    }
}
