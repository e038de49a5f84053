//! # teleroute runtime
//!
//! The process around the dispatch kernel:
//!
//! - Layered configuration (defaults, files, `TELEROUTE_*` environment)
//! - `tracing` subscriber setup driven by that configuration
//! - [`TelerouteRuntime`], which listens until Ctrl+C, SIGTERM or a custom
//!   shutdown future
//!
//! ```ignore
//! use teleroute_core::QueueUpdateSource;
//! use teleroute_runtime::TelerouteRuntime;
//!
//! #[tokio::main]
//! async fn main() -> teleroute_runtime::RuntimeResult<()> {
//!     let (source, tx) = QueueUpdateSource::new();
//!     let runtime = TelerouteRuntime::builder(source).build()?;
//!     runtime.register_plugin(&my_plugin)?;
//!     runtime.run().await
//! }
//! ```
//!
//! # Feature Flags
//!
//! - `toml-config`: read `teleroute.toml`
//! - `yaml-config`: read `teleroute.yaml`
//! - `json-log`: allow `logging.format = "json"`

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{
    ConfigError, ConfigLoader, ConfigResult, Profile, TelerouteConfig, load_config,
    load_config_from_file,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{RuntimeBuilder, TelerouteRuntime};

pub use tracing;
pub use tracing_subscriber;

/// Logging macros for handler code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
